//! Email Send - posts a send request to a running email worker.
//!
//! Usage: `email-send [--pubsub] [--target URL] <request.json>`
//!
//! The request file is sent as a binary-mode CloudEvent. With `--pubsub` it
//! is wrapped the way Eventarc relays Pub/Sub messages.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Client;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use email_worker::event::{PubSubMessage, PubSubPayload, PUBSUB_MESSAGE_PUBLISHED};
use email_worker::{CloudEvent, SendRequest};

const DEFAULT_TARGET: &str = "http://localhost:8080/";
const DIRECT_EVENT_TYPE: &str = "dev.email-worker.send";

/// Post a send request to a running email worker
#[derive(Parser, Debug)]
#[command(name = "email-send")]
#[command(version)]
struct Args {
    /// Wrap the request in a Pub/Sub "message published" event
    #[arg(long)]
    pubsub: bool,

    /// Receiver URL
    #[arg(long, env = "EMAIL_WORKER_URL", default_value = DEFAULT_TARGET)]
    target: String,

    /// JSON file holding the send request
    path: PathBuf,
}

/// Wrap `request` in the CloudEvent the worker expects.
fn build_event(request: &SendRequest, pubsub: bool) -> Result<CloudEvent> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
    let id = format!("email-send-{}", now.as_nanos());

    let event = if pubsub {
        let payload = PubSubPayload {
            subscription: "projects/local/subscriptions/email-send".to_string(),
            message: PubSubMessage {
                message_id: id.clone(),
                publish_time: now.as_secs().to_string(),
                data: serde_json::to_vec(request)?,
                ..Default::default()
            },
        };
        CloudEvent::new(id, "//email-send", PUBSUB_MESSAGE_PUBLISHED).with_json_data(&payload)?
    } else {
        CloudEvent::new(id, "//email-send", DIRECT_EVENT_TYPE).with_json_data(request)?
    };

    Ok(event)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    let args = Args::parse();

    let contents = tokio::fs::read(&args.path)
        .await
        .with_context(|| format!("Failed to read {}", args.path.display()))?;
    let request: SendRequest = serde_json::from_slice(&contents)
        .with_context(|| format!("Invalid send request in {}", args.path.display()))?;

    let event = build_event(&request, args.pubsub)?;

    let mut http = Client::new().post(&args.target);
    for (name, value) in event.binary_headers() {
        http = http.header(name, value);
    }
    let response = http
        .body(event.data.clone().unwrap_or_default())
        .send()
        .await
        .context("Failed to reach email worker")?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    info!(
        event_id = %event.id,
        target = %args.target,
        pubsub = args.pubsub,
        status = status.as_u16(),
        response = %body,
        "email_send_posted"
    );

    if !status.is_success() {
        bail!("email worker answered {status}: {body}");
    }

    Ok(())
}
