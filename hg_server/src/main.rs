//! Multi-room hold'em server.
//!
//! Spawns one actor task per room via the `home_game` registry and serves
//! the HTTP/WebSocket boundary with axum.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use pico_args::Arguments;

use home_game::net::session::SessionDirectory;
use home_game::room::registry::RoomRegistry;

use hg_server::api::auth::AuthService;
use hg_server::{api, config, logging, metrics};

const HELP: &str = "\
Run a multi-room hold'em home-game server

USAGE:
  hg_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Game HTTP/WebSocket bind address
  JWT_SECRET               Access token signing secret
  METRICS_BIND             Prometheus scrape address (unset disables metrics)
  RUST_LOG                 Log filter (e.g. info,home_game=debug)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind_override: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;

    logging::init();

    let config = config::ServerConfig::from_env(bind_override)?;

    if let Some(addr) = config.metrics_bind {
        metrics::init(addr).map_err(Error::msg)?;
        tracing::info!("metrics exporter listening on {addr}");
    }

    let sessions = SessionDirectory::new();
    let registry = RoomRegistry::new(sessions);

    let state = api::AppState {
        auth: Arc::new(AuthService::new(&config.jwt_secret)),
        registry,
    };
    let app = api::create_router(state);

    tracing::info!("starting server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
}
