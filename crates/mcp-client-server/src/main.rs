#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use futures::Stream;
use mcp_client_core::proto::mcp_client_service_server::McpClientServiceServer;
use server::{
    config::{CliArgs, ServerConfig},
    lifecycle::{self, ShutdownCoordinator},
    model::gemini::GeminiSession,
    service::{handler::ChatService, relay::Relay},
    telemetry::{TelemetryProviders, init_telemetry},
    transport::{build_routes, cors_layer},
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Server, server::Connected};
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;

type RelayService = ChatService<GeminiSession>;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Either file may carry the required settings; real env vars win.
    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_filename("config/dev.env");

    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry(config.log_format)?;

    let session = GeminiSession::new(config.api_key.clone())?
        .with_base_url(config.base_url.clone())
        .with_model(config.model.clone());

    if config.uds {
        #[cfg(unix)]
        {
            use tokio::net::UnixListener;
            use tokio_stream::wrappers::UnixListenerStream;
            let uds_path = config.server_addr.clone();
            let uds = UnixListener::bind(&uds_path)?;
            let incoming = UnixListenerStream::new(uds);
            log_startup_info(&uds_path, &config);
            let res = run_server_with_incoming(providers, session, incoming, config).await;
            // TODO: Best effort to clean up the socket file although a panic
            // might leave it behind.
            let _ = std::fs::remove_file(&uds_path);
            res
        }
        #[cfg(not(unix))]
        {
            anyhow::bail!("Unix domain sockets are not supported on this platform");
        }
    } else {
        let tcp_path = config.server_addr.clone();
        let tcp = TcpListener::bind(&tcp_path).await?;
        let incoming = TcpListenerStream::new(tcp);
        log_startup_info(&tcp_path, &config);
        run_server_with_incoming(providers, session, incoming, config).await
    }
}

async fn run_server_with_incoming<I, IO, IE>(
    providers: TelemetryProviders,
    session: GeminiSession,
    incoming: I,
    config: ServerConfig,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>> + Send + 'static,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IO::ConnectInfo: Clone + Send + Sync + 'static,
    IE: Into<tower::BoxError> + Send + 'static,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<McpClientServiceServer<RelayService>>()
        .await;

    let service = ChatService::new(Relay::new(Arc::new(session)), config.stream_buffer_size);
    let routes = build_routes(service.clone(), health_service, &config)?;

    let router = Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer())
                .layer(GrpcWebLayer::new()),
        )
        .add_routes(routes);

    // `stop` ends the accept loop; `trigger` wakes the shutdown waiter if the
    // listener fails on its own; `stopped` fires once the serve task is done.
    let stop = CancellationToken::new();
    let trigger = CancellationToken::new();
    let stopped = CancellationToken::new();

    let server = {
        let stop = stop.clone();
        let trigger = trigger.clone();
        let stopped = stopped.clone();
        tokio::spawn(async move {
            let _stopped = stopped.drop_guard();
            let res = router
                .serve_with_incoming_shutdown(incoming, stop.cancelled_owned())
                .await;
            if let Err(ref e) = res {
                tracing::error!(error = %e, "gRPC server exited with error");
                trigger.cancel();
            }
            res
        })
    };

    let mut coordinator = ShutdownCoordinator::new(config.shutdown_timeout);
    coordinator
        .register("chat-service", {
            let service = service.clone();
            move || async move {
                service.shutdown();
                anyhow::Ok(())
            }
        })
        .register("grpc-server", move || async move {
            health_reporter
                .set_not_serving::<McpClientServiceServer<RelayService>>()
                .await;
            stop.cancel();
            stopped.cancelled().await;
            anyhow::Ok(())
        })
        .register("telemetry", move || async move { providers.shutdown() });

    let shutdown = tokio::spawn(lifecycle::graceful_shutdown(coordinator, trigger)).await?;

    // The serve result stays out of the coordinator so a transport error
    // ends the process with a failure.
    server.await?.context("gRPC server failed")?;
    shutdown?;

    tracing::info!("Service shut down successfully");
    anyhow::Ok(())
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting chat relay on {} with full config: {:#?}",
            addr,
            config
        );
    } else {
        tracing::info!(
            "Starting chat relay on {} with model {}",
            addr,
            config.model
        );
    }
}
