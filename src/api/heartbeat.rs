//! EA heartbeat intake (spec §3 "EA Instance": "registered on first
//! heartbeat ... considered fresh if now - last_seen < 180s").
//!
//! This is the missing half of the freshness gate: without a writer,
//! `ea_instances` never gets a row and every fire submission dead-ends at
//! "no EA registered for user_id" (spec §4.E step 1). The broker-side
//! agent (or its local relay) posts here on whatever cadence it likes;
//! the router only ever reads the table it writes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::observation::EventEnvelope;
use crate::schema::EventType;

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub target_uuid: String,
    pub user_id: String,
    pub balance: Option<f64>,
    pub equity: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub target_uuid: String,
    pub accepted: bool,
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, StatusCode> {
    let now = Utc::now();
    state
        .store
        .ea_instances()
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?
        .repo()
        .upsert_heartbeat(&req.target_uuid, &req.user_id, now, req.balance, req.equity)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    state.observation.publish(
        EventEnvelope::new(
            EventType::BalanceUpdate,
            "fire-router",
            serde_json::json!({
                "target_uuid": req.target_uuid,
                "balance": req.balance,
                "equity": req.equity,
            }),
        )
        .with_user(req.user_id.clone()),
    );

    info!(target_uuid = %req.target_uuid, user_id = %req.user_id, "heartbeat recorded");

    Ok(Json(HeartbeatResponse {
        target_uuid: req.target_uuid,
        accepted: true,
    }))
}
