use super::{
    ModelBackend,
    types::{GenerateContentRequest, GenerateContentResponse},
};
use mcp_client_core::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// A process-wide session with the Gemini API.
///
/// Built once at startup and shared by reference across all calls. The inner
/// [`reqwest::Client`] pools connections and is safe to use concurrently, so
/// no lock guards the session.
///
/// Requests carry no timeout of their own; the call's cancellation token
/// bounds them.
#[derive(Debug, Clone)]
pub struct GeminiSession {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl GeminiSession {
    /// # Errors
    ///
    /// [`Error::NotConfigured`] when `api_key` is blank or the HTTP client
    /// cannot be built.
    pub fn new(api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::NotConfigured {
                reason: "missing Gemini API key".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::NotConfigured {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Overrides the API base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn post(&self, body: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Backend {
                reason: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Error::Backend {
                reason: format!("HTTP {status}: {error_body}"),
            });
        }

        response.json().await.map_err(|e| Error::Backend {
            reason: format!("failed to parse response: {e}"),
        })
    }
}

impl ModelBackend for GeminiSession {
    async fn generate(
        &self,
        cancel: &CancellationToken,
        system_instruction: &str,
        user_text: &str,
    ) -> Result<GenerateContentResponse> {
        if cancel.is_cancelled() {
            return Err(Error::RequestCancelled);
        }

        let body = GenerateContentRequest::new(system_instruction, user_text);
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::RequestCancelled),
            result = self.post(&body) => result,
        }
    }
}
