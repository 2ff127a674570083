//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables. Malformed values fall
//! back to their defaults with a warning.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Deadline for a single dispatch, measured from when it begins.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 10_000;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the CloudEvents receiver to listen on
    pub port: u16,

    /// Template store location (`file:///dir`, `mem://`, `https://host/prefix/`)
    pub template_bucket: Option<String>,

    /// Dispatch deadline in milliseconds
    pub send_timeout_ms: u64,

    // =========================================================================
    // Mailgun
    // =========================================================================
    /// Mailgun private API key
    pub mailgun_api_key: Option<String>,

    /// Mailgun API base URL (EU accounts use https://api.eu.mailgun.net)
    pub mailgun_api_base: String,

    /// Sender domains routed through Mailgun, paired with their Mailgun domain
    pub mailgun_domains: Option<Vec<(String, String)>>,

    // =========================================================================
    // SMTP
    // =========================================================================
    /// SMTP relay host
    pub smtp_host: Option<String>,

    /// SMTP relay port
    pub smtp_port: u16,

    pub smtp_username: Option<String>,

    pub smtp_password: Option<String>,

    /// Sender domains routed through the SMTP relay
    pub smtp_domains: Option<Vec<String>>,

    // =========================================================================
    // Noop
    // =========================================================================
    /// Sender domains whose emails are logged and discarded
    pub noop_domains: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            template_bucket: None,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            mailgun_api_key: None,
            mailgun_api_base: "https://api.mailgun.net".to_string(),
            mailgun_domains: None,
            smtp_host: None,
            smtp_port: 25,
            smtp_username: None,
            smtp_password: None,
            smtp_domains: None,
            noop_domains: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_number("PORT", defaults.port),

            template_bucket: non_empty_var("TEMPLATE_BUCKET").or_else(|| non_empty_var("BUCKET")),

            send_timeout_ms: parse_number("SEND_TIMEOUT_MS", defaults.send_timeout_ms),

            mailgun_api_key: non_empty_var("MAILGUN_API_KEY"),

            mailgun_api_base: non_empty_var("MAILGUN_API_BASE")
                .unwrap_or(defaults.mailgun_api_base),

            mailgun_domains: parse_csv("MAILGUN_DOMAINS")
                .map(|entries| entries.iter().map(|e| parse_domain_pair(e)).collect()),

            smtp_host: non_empty_var("SMTP_HOST"),

            smtp_port: parse_number("SMTP_PORT", defaults.smtp_port),

            smtp_username: non_empty_var("SMTP_USERNAME"),

            smtp_password: non_empty_var("SMTP_PASSWORD"),

            smtp_domains: parse_csv("SMTP_DOMAINS"),

            noop_domains: parse_csv("NOOP_DOMAINS"),
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a numeric variable, warning and using `default` when malformed.
fn parse_number<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Split `sender_domain=provider_domain`; a bare domain maps to itself.
fn parse_domain_pair(entry: &str) -> (String, String) {
    match entry.split_once('=') {
        Some((domain, provider)) if !provider.trim().is_empty() => {
            (domain.trim().to_string(), provider.trim().to_string())
        }
        Some((domain, _)) => (domain.trim().to_string(), domain.trim().to_string()),
        None => (entry.to_string(), entry.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_valid() {
        env::set_var("TEST_NUMBER_VALID", "9000");
        assert_eq!(parse_number("TEST_NUMBER_VALID", 1u16), 9000);
        env::remove_var("TEST_NUMBER_VALID");
    }

    #[test]
    fn test_parse_number_invalid_uses_default() {
        env::set_var("TEST_NUMBER_INVALID", "lots");
        assert_eq!(parse_number("TEST_NUMBER_INVALID", 25u16), 25);
        env::remove_var("TEST_NUMBER_INVALID");
    }

    #[test]
    fn test_parse_number_default() {
        assert_eq!(parse_number("NONEXISTENT_NUMBER_VAR", 10u64), 10);
    }

    #[test]
    fn test_parse_csv() {
        env::set_var("TEST_CSV", "foo, bar, ,baz");
        let result = parse_csv("TEST_CSV");
        assert_eq!(
            result,
            Some(vec!["foo".to_string(), "bar".to_string(), "baz".to_string()])
        );
        env::remove_var("TEST_CSV");
    }

    #[test]
    fn test_parse_domain_pair() {
        assert_eq!(
            parse_domain_pair("tommymay.dev=mg.tommymay.dev"),
            ("tommymay.dev".to_string(), "mg.tommymay.dev".to_string())
        );
        assert_eq!(
            parse_domain_pair("example.com"),
            ("example.com".to_string(), "example.com".to_string())
        );
        assert_eq!(
            parse_domain_pair("example.com="),
            ("example.com".to_string(), "example.com".to_string())
        );
    }

    #[test]
    fn test_default_send_timeout() {
        assert_eq!(Config::default().send_timeout(), Duration::from_secs(10));
    }
}
