//! Send request decoding and validation.
//!
//! ## Processing Flow
//!
//! ```text
//! Event → extract() → SendRequest → validate() → ok
//! ```

pub mod extract;
pub mod recipients;
pub mod types;
pub mod validate;

pub use extract::extract;
pub use recipients::Recipients;
pub use types::{RenderedMessage, SendRequest};
pub use validate::validate;
