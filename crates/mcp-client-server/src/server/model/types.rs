//! Wire types for the `generateContent` endpoint of the generative language
//! API. Only the fields the relay reads or writes are modelled.

use mcp_client_core::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    pub fn new(system_instruction: &str, user_text: &str) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(system_instruction)],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(user_text)],
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A content part. Non-text parts (inline data, function calls, ...) decode
/// with `text: None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

impl GenerateContentResponse {
    /// Consumes the response and returns the content parts of the first
    /// candidate, in the order the model produced them.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyResult`] when there is no candidate, or when the first
    /// candidate carries no content parts.
    pub fn into_first_candidate_parts(self) -> Result<Vec<Part>> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(Error::EmptyResult {
                reason: "no response from model".to_string(),
            });
        };

        match candidate.content {
            Some(content) if !content.parts.is_empty() => Ok(content.parts),
            _ => Err(Error::EmptyResult {
                reason: "empty response from model".to_string(),
            }),
        }
    }
}
