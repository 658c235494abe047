//! Fire Command Router (spec §4.E).
//! Mission: the one HTTP entry point that turns a user's intent into a
//! `Fire` row and, mode permitting, a durable dispatch — at most one
//! trade attempt per `idem_key`, under any of the three cutover modes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::ea_ipc::FireInstruction;
use crate::observation::EventEnvelope;
use crate::schema::{self, EventType};
use crate::store::models::{Direction, Fire, FireStatus};
use crate::streams::fire_stream_key;

use super::idempotency;

#[derive(Debug, Deserialize)]
pub struct FireRequest {
    pub user_id: String,
    pub signal_id: Option<String>,
    pub symbol: String,
    pub direction: String,
    pub lot: f64,
    pub sl: f64,
    pub tp: f64,
    pub idem_key: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct FireResponse {
    pub fire_id: String,
    pub status: String,
    pub deduplicated: bool,
}

#[derive(Debug, Serialize)]
pub struct FireRejected {
    pub reason: String,
}

pub async fn submit_fire(
    State(state): State<AppState>,
    Json(req): Json<FireRequest>,
) -> Result<Json<FireResponse>, (StatusCode, Json<FireRejected>)> {
    let reject = |reason: &str| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(FireRejected {
                reason: reason.to_string(),
            }),
        )
    };

    let symbol = schema::normalize(&req.symbol);
    if schema::is_forbidden(&symbol) || !schema::is_valid_symbol(&symbol) {
        return Err(reject("symbol outside the closed 15-pair set"));
    }

    let direction = Direction::parse(&req.direction).ok_or_else(|| reject("direction must be BUY or SELL"))?;

    if req.lot < state.cfg.min_lot || req.lot > state.cfg.max_lot {
        return Err(reject("lot outside [min_lot, max_lot]"));
    }

    let ea_repo = state.store.ea_instances().map_err(|_| reject("state store unavailable"))?;
    let ea = ea_repo
        .repo()
        .find_by_user(&req.user_id)
        .map_err(|_| reject("state store unavailable"))?
        .ok_or_else(|| reject("no EA registered for user_id"))?;

    let now = Utc::now();
    if !ea.is_fresh(now, state.cfg.ea_freshness) {
        return Err(reject("target EA heartbeat is stale"));
    }
    let target_uuid = ea.target_uuid.clone();

    let bucket = idempotency::ts_bucket(now);
    let idem_key = req
        .idem_key
        .clone()
        .unwrap_or_else(|| idempotency::derive(&req.user_id, req.signal_id.as_deref(), req.lot, bucket));

    let fires_repo = state.store.fires().map_err(|_| reject("state store unavailable"))?;
    if let Some(existing) = fires_repo
        .repo()
        .find_by_idem(&req.user_id, &idem_key)
        .map_err(|_| reject("state store unavailable"))?
    {
        return Ok(Json(FireResponse {
            fire_id: existing.fire_id,
            status: "deduplicated".to_string(),
            deduplicated: true,
        }));
    }

    let fire_id = Uuid::new_v4().to_string();
    let fire = Fire {
        fire_id: fire_id.clone(),
        idem_key,
        user_id: req.user_id.clone(),
        signal_id: req.signal_id.clone(),
        target_uuid: target_uuid.clone(),
        symbol: symbol.clone(),
        direction,
        lot: req.lot,
        sl: req.sl,
        tp: req.tp,
        comment: req.comment.clone(),
        status: FireStatus::Pending,
        ticket: None,
        created_at: now,
        updated_at: now,
    };
    if fires_repo.repo().insert_pending(&fire).is_err() {
        // A concurrent request with the same (user_id, idem_key) won the
        // UNIQUE-index race between our find_by_idem miss and this insert.
        // Spec §3/§8: concurrent duplicates still resolve to the same
        // fire_id, never an error.
        let existing = fires_repo
            .repo()
            .find_by_idem(&req.user_id, &fire.idem_key)
            .map_err(|_| reject("state store unavailable"))?
            .ok_or_else(|| reject("idempotency conflict"))?;
        return Ok(Json(FireResponse {
            fire_id: existing.fire_id,
            status: "deduplicated".to_string(),
            deduplicated: true,
        }));
    }

    if req.dry_run {
        state.observation.publish(
            EventEnvelope::new(
                EventType::FireCommand,
                "fire-router",
                serde_json::json!({
                    "fire_id": fire_id, "user_id": req.user_id, "symbol": symbol,
                    "direction": direction.as_str(), "lot": req.lot, "dry_run": true,
                }),
            )
            .with_user(req.user_id.clone()),
        );
        return Ok(Json(FireResponse {
            fire_id,
            status: "dry_run".to_string(),
            deduplicated: false,
        }));
    }

    let flags = state.cfg.flags;
    if flags.is_legacy() || flags.is_shadow() {
        let instruction = FireInstruction {
            fire_id: fire_id.clone(),
            symbol: symbol.clone(),
            direction,
            lot: req.lot,
            price: 0.0,
            tp: req.tp,
            sl: req.sl,
            comment: req.comment.clone(),
        };
        if let Err(e) = state.ea_ipc.write_fire(&target_uuid, &instruction) {
            warn!(error = %e, fire_id, "fire router: direct IPC write failed");
        }
    }

    if flags.is_shadow() || flags.is_redis_only() {
        state
            .stream
            .append(
                &fire_stream_key(&target_uuid),
                &[
                    ("fire_id", fire_id.as_str()),
                    ("user_id", req.user_id.as_str()),
                    ("signal_id", req.signal_id.as_deref().unwrap_or("")),
                    ("symbol", symbol.as_str()),
                    ("direction", direction.as_str()),
                    ("lot", &req.lot.to_string()),
                    ("sl", &req.sl.to_string()),
                    ("tp", &req.tp.to_string()),
                    ("comment", req.comment.as_deref().unwrap_or("")),
                    ("dry_run", "false"),
                ],
            )
            .await
            .map_err(|_| reject("stream backend unavailable"))?;
    }

    fires_repo
        .repo()
        .set_status(&fire_id, FireStatus::Enqueued, Utc::now())
        .map_err(|_| reject("state store unavailable"))?;

    if flags.is_legacy() {
        // No bridge consumes this fire in legacy mode; the direct IPC
        // write above is the dispatch, so mark it routed immediately.
        fires_repo
            .repo()
            .set_status(&fire_id, FireStatus::Routed, Utc::now())
            .map_err(|_| reject("state store unavailable"))?;
    }

    state.observation.publish(
        EventEnvelope::new(
            EventType::FireCommand,
            "fire-router",
            serde_json::json!({
                "fire_id": fire_id, "user_id": req.user_id, "target_uuid": target_uuid,
                "symbol": symbol, "direction": direction.as_str(), "lot": req.lot,
            }),
        )
        .with_user(req.user_id.clone()),
    );

    info!(fire_id, user_id = %req.user_id, target_uuid, "fire router: enqueued");

    Ok(Json(FireResponse {
        fire_id,
        status: "enqueued".to_string(),
        deduplicated: false,
    }))
}
