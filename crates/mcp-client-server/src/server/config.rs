use crate::server::{
    model::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL},
    telemetry::LogFormat,
};
use anyhow::{Context, bail};
use axum::http::HeaderValue;
use clap::Parser;
use core::time::Duration;
use secrecy::{ExposeSecret, SecretString};

/// Default ceiling for a single request or response message: 10 MiB.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Runtime configuration for the `mcp-client-server` binary.
///
/// All values are parsed from CLI arguments or environment variables. Before
/// parsing, `.env` and `config/dev.env` are loaded into the environment when
/// present, so either file can carry the two required settings.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mcp-client-server",
    version,
    about = "A gRPC service that relays chat turns to Gemini and streams the reply"
)]
pub struct CliArgs {
    /// API key used to authenticate against the Gemini API.
    ///
    /// Environment variable: `GEMINI_API_KEY`
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, value_parser = parse_secret)]
    pub gemini_api_key: SecretString,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:9090" or "/tmp/mcp-client.sock"
    ///
    /// Environment variable: `GRPC_SERVER_ADDRESS`
    #[arg(long, env = "GRPC_SERVER_ADDRESS")]
    pub grpc_server_address: String,

    /// Model used for every `SendMessage` call.
    ///
    /// Environment variable: `GEMINI_MODEL`
    #[arg(long, env = "GEMINI_MODEL", default_value_t = String::from(DEFAULT_MODEL))]
    pub gemini_model: String,

    /// Base URL of the generative language API.
    ///
    /// Environment variable: `GEMINI_BASE_URL`
    #[arg(long, env = "GEMINI_BASE_URL", default_value_t = String::from(DEFAULT_BASE_URL))]
    pub gemini_base_url: String,

    /// Maximum size in bytes of a decoded request or an encoded response
    /// message.
    ///
    /// Environment variable: `MAX_MESSAGE_BYTES`
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,

    /// Capacity of the buffer between the relay task and the gRPC response
    /// stream.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Upper bound, in seconds, on the whole shutdown sequence. When it
    /// elapses the process exits without waiting for the remaining cleanup.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,

    /// Location returned (302) for any path that is not a registered gRPC
    /// route.
    ///
    /// Environment variable: `REDIRECT_URL`
    #[arg(long, env = "REDIRECT_URL", default_value_t = String::from("https://darwishdev.com"))]
    pub redirect_url: String,

    /// Console log format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Listen on a Unix socket instead of TCP. If set, `GRPC_SERVER_ADDRESS`
    /// must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,
}

fn parse_secret(value: &str) -> Result<SecretString, core::convert::Infallible> {
    Ok(SecretString::from(value.to_string()))
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub api_key: SecretString,
    pub server_addr: String,
    pub model: String,
    pub base_url: String,
    pub max_message_bytes: usize,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
    pub redirect_location: HeaderValue,
    pub log_format: LogFormat,
    pub uds: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.gemini_api_key.expose_secret().trim().is_empty() {
            bail!("GEMINI_API_KEY must not be empty");
        }

        if args.grpc_server_address.trim().is_empty() {
            bail!("GRPC_SERVER_ADDRESS must not be empty");
        }

        if args.max_message_bytes == 0 {
            bail!("MAX_MESSAGE_BYTES must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.shutdown_timeout_secs == 0 {
            bail!("SHUTDOWN_TIMEOUT_SECS must be greater than 0");
        }

        let redirect_location = HeaderValue::from_str(&args.redirect_url)
            .with_context(|| format!("REDIRECT_URL is not a valid header value: {}", args.redirect_url))?;

        Ok(Self {
            api_key: args.gemini_api_key,
            server_addr: args.grpc_server_address,
            model: args.gemini_model,
            base_url: args.gemini_base_url.trim_end_matches('/').to_string(),
            max_message_bytes: args.max_message_bytes,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            redirect_location,
            log_format: args.log_format,
            uds: args.uds,
        })
    }
}
