//! Mailgun HTTP API transport.
//!
//! Reference: https://documentation.mailgun.com/docs/mailgun/api-reference/openapi-final/tag/Messages/

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use super::Sender;
use crate::error::TransportError;
use crate::request::RenderedMessage;

/// Sends through `POST {api_base}/v3/{domain}/messages`.
#[derive(Debug, Clone)]
pub struct MailgunSender {
    client: Client,
    api_base: String,
    domain: String,
    api_key: String,
}

/// Successful response body from the messages endpoint.
#[derive(Debug, Deserialize)]
struct MailgunResponse {
    id: String,
    #[serde(default)]
    message: String,
}

impl MailgunSender {
    pub fn new(client: Client, api_base: &str, domain: &str, api_key: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            domain: domain.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v3/{}/messages", self.api_base, self.domain)
    }

    /// Form fields for `message`. Recipient fields repeat once per address.
    fn form(message: &RenderedMessage) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("from", message.sender.clone()),
            ("subject", message.subject.clone()),
            ("html", message.body.clone()),
        ];
        form.extend(message.to.iter().map(|a| ("to", a.clone())));
        form.extend(message.cc.iter().map(|a| ("cc", a.clone())));
        form.extend(message.bcc.iter().map(|a| ("bcc", a.clone())));
        form
    }
}

#[async_trait]
impl Sender for MailgunSender {
    async fn send(&self, message: &RenderedMessage) -> Result<String, TransportError> {
        let response = self
            .client
            .post(self.endpoint())
            .basic_auth("api", Some(&self.api_key))
            .form(&Self::form(message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            warn!(
                domain = %self.domain,
                status = status.as_u16(),
                body_preview = %preview,
                "mailgun_send_rejected"
            );
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MailgunResponse = response.json().await?;
        info!(
            domain = %self.domain,
            message_id = %parsed.id,
            response = %parsed.message,
            "mailgun_send_accepted"
        );

        Ok(parsed.id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use super::*;

    type Captured = Arc<Mutex<Vec<(String, Vec<(String, String)>, Option<String>)>>>;

    fn message() -> RenderedMessage {
        RenderedMessage {
            sender: "no-reply@example.com".to_string(),
            subject: "Hello".to_string(),
            body: "<p>Hi</p>".to_string(),
            to: vec!["a@y.com".to_string(), "b@y.com".to_string()],
            cc: vec!["c@y.com".to_string()],
            bcc: vec!["d@y.com".to_string()],
        }
    }

    /// Serve a fake messages endpoint answering with `status`.
    async fn fake_mailgun(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();

        let handler = move |State(captured): State<Captured>,
                            Path(domain): Path<String>,
                            headers: HeaderMap,
                            Form(fields): Form<Vec<(String, String)>>| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            captured.lock().unwrap().push((domain, fields, auth));
            let body: Value = if status.is_success() {
                json!({"id": "<20240101.1@mg.example.com>", "message": "Queued. Thank you."})
            } else {
                json!({"message": "Invalid private key"})
            };
            (status, Json(body))
        };

        let app = Router::new()
            .route("/v3/:domain/messages", post(handler))
            .with_state(captured.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), captured)
    }

    #[test]
    fn test_endpoint() {
        let sender = MailgunSender::new(Client::new(), "https://api.mailgun.net/", "mg.example.com", "k");
        assert_eq!(sender.endpoint(), "https://api.mailgun.net/v3/mg.example.com/messages");
    }

    #[test]
    fn test_form_repeats_recipients() {
        let form = MailgunSender::form(&message());

        assert!(form.contains(&("from", "no-reply@example.com".to_string())));
        assert!(form.contains(&("html", "<p>Hi</p>".to_string())));
        let to: Vec<_> = form.iter().filter(|(k, _)| *k == "to").map(|(_, v)| v.as_str()).collect();
        assert_eq!(to, ["a@y.com", "b@y.com"]);
        assert!(form.contains(&("cc", "c@y.com".to_string())));
        assert!(form.contains(&("bcc", "d@y.com".to_string())));
    }

    #[tokio::test]
    async fn test_send_accepted() {
        let (base, captured) = fake_mailgun(StatusCode::OK).await;
        let sender = MailgunSender::new(Client::new(), &base, "mg.example.com", "secret");

        let id = sender.send(&message()).await.unwrap();

        assert_eq!(id, "<20240101.1@mg.example.com>");
        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let (domain, fields, auth) = &captured[0];
        assert_eq!(domain, "mg.example.com");
        assert!(fields.contains(&("subject".to_string(), "Hello".to_string())));
        assert!(fields.contains(&("bcc".to_string(), "d@y.com".to_string())));
        // base64("api:secret")
        assert_eq!(auth.as_deref(), Some("Basic YXBpOnNlY3JldA=="));
    }

    #[tokio::test]
    async fn test_send_rejected() {
        let (base, _captured) = fake_mailgun(StatusCode::UNAUTHORIZED).await;
        let sender = MailgunSender::new(Client::new(), &base, "mg.example.com", "wrong");

        match sender.send(&message()).await {
            Err(TransportError::Rejected { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid private key"));
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }
}
