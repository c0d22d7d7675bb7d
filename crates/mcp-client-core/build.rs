use std::env;
use std::path::PathBuf;

const SEND_MESSAGE_REQUEST: &str = ".mcpclient.v1.SendMessageRequest";

/// Builds the gRPC client and server code for the `mcpclient.proto` definition
/// using `tonic-prost-build`.
///
/// The generated request message derives [`validator::Validate`]; its field
/// constraints are declared below as field attributes.
///
/// # Files and Paths
///
/// - Proto file: `proto/mcpclient/v1/mcpclient.proto`
/// - Includes: `proto/`
/// - Descriptor set: `$OUT_DIR/mcpclient_descriptor.bin` (served by the
///   reflection endpoints)
///
/// # Output
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("mcpclient.v1");
/// }
/// ```
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("mcpclient_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    config
        .file_descriptor_set_path(&descriptor_path)
        .type_attribute(SEND_MESSAGE_REQUEST, "#[derive(::validator::Validate)]")
        .field_attribute(
            format!("{SEND_MESSAGE_REQUEST}.content"),
            r#"#[validate(length(min = 1, message = "content must not be empty"))]"#,
        )
        .field_attribute(
            format!("{SEND_MESSAGE_REQUEST}.instructions"),
            r#"#[validate(length(min = 1, message = "instructions must not be empty"))]"#,
        );

    tonic_prost_build::configure().compile_with_config(
        config,
        &["proto/mcpclient/v1/mcpclient.proto"],
        &["proto"],
    )?;

    Ok(())
}
