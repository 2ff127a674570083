//! Outbound transports and domain routing.
//!
//! Each sending domain is bound to one [`Sender`] at startup. A request is
//! routed by the domain of its `sender` address, e.g.
//! `no-reply@example.com` → `example.com`.
//!
//! ## Implementations
//!
//! - [`MailgunSender`]: Mailgun HTTP API
//! - [`SmtpSender`]: SMTP relay via lettre
//! - [`NoopSender`]: logs and discards

pub mod mailgun;
pub mod noop;
pub mod smtp;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{SendError, TransportError};
use crate::request::RenderedMessage;

pub use mailgun::MailgunSender;
pub use noop::NoopSender;
pub use smtp::SmtpSender;

/// Delivers a rendered email.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Send `message`, returning the provider-assigned message id.
    async fn send(&self, message: &RenderedMessage) -> Result<String, TransportError>;
}

/// Immutable mapping from sending domain to [`Sender`].
///
/// Built once with [`TransportRegistry::builder`]; there is no way to
/// change it afterwards, so it can be shared freely between requests.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    senders: HashMap<String, Arc<dyn Sender>>,
}

/// Accumulates domain registrations for a [`TransportRegistry`].
#[derive(Default)]
pub struct TransportRegistryBuilder {
    senders: HashMap<String, Arc<dyn Sender>>,
}

impl TransportRegistryBuilder {
    /// Bind `domain` to `sender`. Keys are stored lowercase without `@`;
    /// registering a domain twice keeps the last sender.
    pub fn register(mut self, domain: &str, sender: Arc<dyn Sender>) -> Self {
        let domain = domain.trim().trim_start_matches('@').to_lowercase();
        if self.senders.insert(domain.clone(), sender).is_some() {
            warn!(domain = %domain, "transport_domain_reregistered");
        }
        self
    }

    pub fn build(self) -> TransportRegistry {
        TransportRegistry {
            senders: self.senders,
        }
    }
}

impl TransportRegistry {
    pub fn builder() -> TransportRegistryBuilder {
        TransportRegistryBuilder::default()
    }

    /// Build the registry described by the environment configuration.
    pub fn from_config(config: &Config, client: &Client) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(domains) = &config.mailgun_domains {
            let Some(api_key) = config.mailgun_api_key.as_deref() else {
                bail!("MAILGUN_DOMAINS is set but MAILGUN_API_KEY is missing");
            };
            for (domain, mailgun_domain) in domains {
                let sender = MailgunSender::new(
                    client.clone(),
                    &config.mailgun_api_base,
                    mailgun_domain,
                    api_key,
                );
                info!(domain = %domain, mailgun_domain = %mailgun_domain, transport = "mailgun", "transport_registered");
                builder = builder.register(domain, Arc::new(sender));
            }
        }

        if let Some(domains) = &config.smtp_domains {
            let Some(host) = config.smtp_host.as_deref() else {
                bail!("SMTP_DOMAINS is set but SMTP_HOST is missing");
            };
            let credentials = match (&config.smtp_username, &config.smtp_password) {
                (Some(user), Some(password)) => Some((user.clone(), password.clone())),
                (None, None) => None,
                _ => bail!("SMTP_USERNAME and SMTP_PASSWORD must be set together"),
            };
            let sender: Arc<dyn Sender> =
                Arc::new(SmtpSender::new(host, config.smtp_port, credentials));
            for domain in domains {
                info!(domain = %domain, host = %host, transport = "smtp", "transport_registered");
                builder = builder.register(domain, Arc::clone(&sender));
            }
        }

        if let Some(domains) = &config.noop_domains {
            let sender: Arc<dyn Sender> = Arc::new(NoopSender::new());
            for domain in domains {
                info!(domain = %domain, transport = "noop", "transport_registered");
                builder = builder.register(domain, Arc::clone(&sender));
            }
        }

        let registry = builder.build();
        if registry.is_empty() {
            warn!("transport_registry_empty");
        }
        Ok(registry)
    }

    /// Select the sender for `sender_address` by its domain.
    ///
    /// The lookup is an exact, case-sensitive match on the registered keys.
    pub fn route(&self, sender_address: &str) -> Result<Arc<dyn Sender>, SendError> {
        let no_route = |domain: &str| SendError::NoRoute {
            domain: domain.to_string(),
            sender: sender_address.to_string(),
        };

        let domain = sender_domain(sender_address).ok_or_else(|| no_route(""))?;
        self.senders
            .get(domain)
            .cloned()
            .ok_or_else(|| no_route(domain))
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.senders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut domains: Vec<_> = self.domains().collect();
        domains.sort_unstable();
        f.debug_struct("TransportRegistry")
            .field("domains", &domains)
            .finish()
    }
}

/// Domain part of an address: everything after the last `@`.
///
/// For `Name <user@domain>` the closing `>` is dropped.
pub fn sender_domain(address: &str) -> Option<&str> {
    let at = address.rfind('@')?;
    let domain = address[at + 1..].trim();
    let domain = domain.strip_suffix('>').unwrap_or(domain);
    Some(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedSender(&'static str);

    #[async_trait]
    impl Sender for NamedSender {
        async fn send(&self, _message: &RenderedMessage) -> Result<String, TransportError> {
            Ok(self.0.to_string())
        }
    }

    fn message() -> RenderedMessage {
        RenderedMessage {
            sender: "no-reply@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "<p>Hi</p>".to_string(),
            to: vec!["b@y.com".to_string()],
            cc: vec![],
            bcc: vec![],
        }
    }

    fn registry() -> TransportRegistry {
        TransportRegistry::builder()
            .register("example.com", Arc::new(NamedSender("T")))
            .register("@Other.ORG", Arc::new(NamedSender("O")))
            .build()
    }

    #[test]
    fn test_sender_domain() {
        assert_eq!(sender_domain("no-reply@example.com"), Some("example.com"));
        assert_eq!(sender_domain("a@b@example.com"), Some("example.com"));
        assert_eq!(sender_domain("Example <no-reply@example.com>"), Some("example.com"));
        assert_eq!(sender_domain("no-domain"), None);
    }

    #[tokio::test]
    async fn test_route_registered_domain() {
        let sender = registry().route("no-reply@example.com").unwrap();
        assert_eq!(sender.send(&message()).await.unwrap(), "T");
    }

    #[tokio::test]
    async fn test_register_normalizes_keys() {
        let sender = registry().route("a@other.org").unwrap();
        assert_eq!(sender.send(&message()).await.unwrap(), "O");
    }

    #[test]
    fn test_route_unknown_domain() {
        match registry().route("no-reply@unknown.org") {
            Err(SendError::NoRoute { domain, sender }) => {
                assert_eq!(domain, "unknown.org");
                assert_eq!(sender, "no-reply@unknown.org");
            }
            Err(other) => panic!("Expected NoRoute, got {:?}", other),
            Ok(_) => panic!("Expected NoRoute, got a sender"),
        }
    }

    #[test]
    fn test_route_is_case_sensitive() {
        assert!(registry().route("no-reply@Example.com").is_err());
    }

    #[test]
    fn test_route_without_at() {
        assert!(matches!(
            registry().route("no-reply"),
            Err(SendError::NoRoute { .. })
        ));
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            mailgun_api_key: Some("key".to_string()),
            mailgun_domains: Some(vec![("example.com".to_string(), "mg.example.com".to_string())]),
            noop_domains: Some(vec!["test.local".to_string()]),
            ..Config::default()
        };

        let registry = TransportRegistry::from_config(&config, &Client::new()).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.route("a@example.com").is_ok());
        assert!(registry.route("a@test.local").is_ok());
    }

    #[test]
    fn test_from_config_requires_mailgun_key() {
        let config = Config {
            mailgun_domains: Some(vec![("example.com".to_string(), "example.com".to_string())]),
            ..Config::default()
        };

        assert!(TransportRegistry::from_config(&config, &Client::new()).is_err());
    }

    #[test]
    fn test_from_config_requires_smtp_host() {
        let config = Config {
            smtp_domains: Some(vec!["example.com".to_string()]),
            ..Config::default()
        };

        assert!(TransportRegistry::from_config(&config, &Client::new()).is_err());
    }
}
