//! # Adapters Layer (Hexagonal Architecture)
//!
//! Production implementations of the outbound ports.

mod clock;
mod http;

pub use clock::SystemClock;
pub use http::{default_headers, HttpTransport, XML_MEDIA_TYPE};
