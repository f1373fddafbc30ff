//! Society Server - HTTP CRUD service for society members.
//!
//! Serves the users resource over an in-process hierarchical datastore.
//!
//! # Usage
//!
//! ```text
//! SOCIETY_LISTEN=0.0.0.0:8080 USERS_BASE_PATH=/v1 society-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SOCIETY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//! | `USERS_NAMESPACE` | `NeverLand` | Datastore namespace for all keys |
//! | `USERS_LIST_LIMIT` | `10` | Maximum users returned by a list |
//! | `USERS_BASE_PATH` | *(empty)* | Route prefix, e.g. `/v1` |
//! | `USERS_API_KEY` | *(unset)* | Bearer token required when set |
//! | `USERS_DOCUMENTATION_URL` | `http://abhijit-kar.com/swagger/` | Advertised in `OPTIONS` responses |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use society_core::{LogFormat, SocietyConfig};
use society_datastore::MemoryDatastore;
use society_users_core::{SocietyUsers, SocietyUsersHandler, UsersConfig};
use society_users_http::{PreflightDocument, UsersHttpConfig, UsersHttpService, UsersRouter};

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

type Service = UsersHttpService<SocietyUsersHandler>;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

/// Build the [`UsersHttpConfig`] from the application [`UsersConfig`].
fn build_users_http_config(config: &UsersConfig) -> UsersHttpConfig {
    UsersHttpConfig {
        base_path: config.base_path.clone(),
        api_key: config.api_key.clone(),
        preflight: PreflightDocument {
            endpoint: config.documentation_url.clone(),
            ..PreflightDocument::default()
        },
    }
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: Service) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let conn = http.serve_connection(TokioIo::new(stream), service.clone());
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Check a running server with a preflight request.
///
/// Succeeds when the server answers `OPTIONS <base>/users` with 200, which
/// needs neither a token nor a reachable store.
async fn run_health_check(addr: &str, base_path: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = health_check_request(addr, base_path);
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.starts_with("HTTP/1.1 200") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

/// The preflight request sent by the health check, with `base_path`
/// normalized the same way the router normalizes it.
fn health_check_request(addr: &str, base_path: &str) -> String {
    let router = UsersRouter::new(base_path);
    let base = router.base_path();
    format!("OPTIONS {base}/users HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n")
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = SocietyConfig::from_env().context("invalid server configuration")?;
    let users_config = UsersConfig::from_env().context("invalid users configuration")?;

    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr, &users_config.base_path)
            .await
            .is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level, config.log_format)?;

    info!(
        namespace = %users_config.namespace,
        list_limit = users_config.list_limit,
        base_path = %users_config.base_path,
        auth = users_config.api_key.is_some(),
        "initializing users service",
    );
    let store = Arc::new(MemoryDatastore::new());
    let provider = SocietyUsers::new(store, users_config.clone());
    let handler = SocietyUsersHandler::new(Arc::new(provider));
    let http_config = build_users_http_config(&users_config);
    let service = UsersHttpService::new(Arc::new(handler), http_config);

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, version = VERSION, "starting Society Server");

    serve(listener, service).await
}
