//! Model client adapter.
//!
//! The relay talks to the language model through [`ModelBackend`], a single
//! non-streaming `generate` call. [`gemini::GeminiSession`] is the production
//! implementation; tests plug in stubs.

pub mod gemini;
pub mod types;

use core::future::Future;
use mcp_client_core::Result;
use tokio_util::sync::CancellationToken;
use types::GenerateContentResponse;

/// A long-lived handle to a generative language model.
///
/// Implementations are shared across all concurrent calls, so they must be
/// safe to use from many tasks at once.
pub trait ModelBackend: Send + Sync {
    /// Runs one generation with `system_instruction` as the system directive
    /// and `user_text` as the single user turn.
    ///
    /// Implementations must return [`mcp_client_core::Error::RequestCancelled`]
    /// once `cancel` fires, without waiting for the model.
    fn generate(
        &self,
        cancel: &CancellationToken,
        system_instruction: &str,
        user_text: &str,
    ) -> impl Future<Output = Result<GenerateContentResponse>> + Send;
}
