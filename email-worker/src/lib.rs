//! Email Worker - CloudEvents-driven email dispatcher.
//!
//! Each inbound event carries one send request, either directly or wrapped
//! in a Pub/Sub message. The request is decoded, validated, rendered from an
//! inline body or a stored template, routed by sender domain, and handed to
//! that domain's transport.
//!
//! ## Architecture
//!
//! ```text
//! CloudEvent → extract → validate → render → route → Sender
//!                                                     ├── Mailgun
//!                                                     ├── SMTP
//!                                                     └── Noop
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod request;
pub mod template;
pub mod transport;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{Dispatcher, Outcome};
pub use error::{Disposition, SendError};
pub use event::{CloudEvent, Event};
pub use request::{RenderedMessage, SendRequest};
pub use transport::{Sender, TransportRegistry};
pub use web::AppState;
