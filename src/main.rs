//! Fire Command Router (spec §4.E) — also serves the operator status
//! surface (spec §4.J) and the EA heartbeat intake (spec §3 "EA
//! Instance") on the same HTTP port.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalfire_core::api::state::AppState;
use signalfire_core::config::Config;
use signalfire_core::ea_ipc::EaIpc;
use signalfire_core::observation::ObservationClient;
use signalfire_core::store::Store;
use signalfire_core::streams::StreamClient;
use signalfire_core::{api, fire, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env().context("load configuration")?;
    info!(port = cfg.port, "fire command router starting");

    let store = Store::new(&cfg.database_path).context("open state store")?;
    let stream = StreamClient::connect(&cfg.redis_url, cfg.stream_max_len)
        .await
        .context("connect to redis stream backend")?;
    let observation = ObservationClient::connect(&cfg.observation_pull_addr);
    let ea_ipc = Arc::new(EaIpc::new(&cfg.ea_ipc_dir));

    let port = cfg.port;
    let state = AppState {
        store,
        stream,
        observation,
        ea_ipc,
        cfg: Arc::new(cfg),
    };

    let app = Router::new()
        .route("/fire", post(fire::submit_fire))
        .route("/heartbeat", post(api::heartbeat::heartbeat))
        .route("/status", get(api::status::status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let shutdown_flag = shutdown::install();
    let listener = TcpListener::bind(("0.0.0.0", port)).await.context("bind HTTP listener")?;
    info!(port, "fire command router listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !shutdown::is_set(&shutdown_flag) {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        })
        .await
        .context("http server error")?;

    Ok(())
}
