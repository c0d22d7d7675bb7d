//! Cross-cutting stages wrapped around the relay.
//!
//! Each stage is a [`tower::Layer`] over [`Call`](crate::server::service::call::Call)
//! and composes with [`tower::ServiceBuilder`]. The order used by the server
//! is logging (outermost), then validation, then the relay:
//!
//! ```text
//! client -> Logging -> Validate -> Relay -> model
//! ```
//!
//! so rejected requests are logged too, while the relay only ever sees valid
//! ones.

pub mod logging;
pub mod validate;

pub use logging::{Logging, LoggingLayer};
pub use validate::{Validate, ValidateLayer};
