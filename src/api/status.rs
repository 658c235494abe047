//! Operator status surface (spec §4.J) — the HTTP twin of the `status`
//! CLI command, mounted on the Fire Command Router so the mode and
//! stream health are visible without shelling into a box.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use serde::Serialize;

use crate::streams::signals_stream_key;

use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct EaStatus {
    pub target_uuid: String,
    pub user_id: String,
    pub age_seconds: i64,
    pub fresh: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub mode: &'static str,
    pub signals_stream_len: usize,
    pub signals_pending: u64,
    pub ea_instances: Vec<EaStatus>,
}

pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let flags = state.cfg.flags;
    let mode = if flags.is_legacy() {
        "legacy"
    } else if flags.is_shadow() {
        "shadow"
    } else {
        "redis-only"
    };

    let signals_stream_len = state
        .stream
        .len(&signals_stream_key())
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    let signals_pending = state
        .stream
        .pending_summary(&signals_stream_key(), &state.cfg.signals_group)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?
        .count;

    let now = Utc::now();
    let ea_instances = state
        .store
        .ea_instances()
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?
        .repo()
        .list_all()
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?
        .into_iter()
        .map(|ea| EaStatus {
            target_uuid: ea.target_uuid.clone(),
            user_id: ea.user_id.clone(),
            age_seconds: ea.age(now).num_seconds(),
            fresh: ea.is_fresh(now, state.cfg.ea_freshness),
        })
        .collect();

    Ok(Json(StatusResponse {
        mode,
        signals_stream_len,
        signals_pending,
        ea_instances,
    }))
}
