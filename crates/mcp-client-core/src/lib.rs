#![doc = include_str!("../README.md")]

mod common;
pub use common::*;

/// Protobuf messages and service bindings generated from
/// `proto/mcpclient/v1/mcpclient.proto`.
///
/// ## Service
///
/// - `McpClientService.SendMessage` - Forwards one user turn to the model and
///   streams back the non-empty text parts of the first candidate.
///
/// ## Messages
///
/// - [`SendMessageRequest`](proto::SendMessageRequest) - `content` (user turn)
///   and `instructions` (system instruction). Both must be non-empty; see
///   [`validator::Validate`].
/// - [`SendMessageResponse`](proto::SendMessageResponse) - one text fragment.
pub mod proto {
    tonic::include_proto!("mcpclient.v1");

    /// Encoded descriptor set for the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("mcpclient_descriptor");
}

// Public re-export so downstream crates validate against the same version.
pub use validator;

#[cfg(test)]
mod tests {
    use super::proto::SendMessageRequest;
    use validator::Validate;

    fn request(content: &str, instructions: &str) -> SendMessageRequest {
        SendMessageRequest {
            content: content.to_string(),
            instructions: instructions.to_string(),
        }
    }

    #[test]
    fn accepts_non_empty_fields() {
        assert!(request("hello", "be brief").validate().is_ok());
    }

    #[test]
    fn rejects_empty_content() {
        let errors = request("", "be brief").validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("content"));
        assert!(!fields.contains_key("instructions"));
    }

    #[test]
    fn rejects_empty_instructions() {
        let errors = request("hello", "").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("instructions"));
    }
}
