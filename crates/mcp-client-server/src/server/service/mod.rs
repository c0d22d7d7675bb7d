//! gRPC service implementation.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC entry point (`ChatService`).
//! - [`relay`] - the model call and its fragmentation into a stream.
//! - [`call`] - the call type carried through the middleware pipeline.
//! - [`stream`] - response stream that cancels its call on drop.

pub mod call;
pub mod handler;
pub mod relay;
pub mod stream;
