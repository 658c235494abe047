//! Operational Cutover Scripts (spec §4.J).
//! Mission: the single source of operational truth for cutover mode —
//! idempotent promote/rollback plus a status and smoke-test surface.

use std::fs;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Exit codes spec §6 assigns to the operator surface.
pub const EXIT_OK: i32 = 0;
pub const EXIT_CONFIG_ERROR: i32 = 2;
pub const EXIT_REMOTE_UNAVAILABLE: i32 = 3;

#[derive(Parser)]
#[command(name = "cutover", about = "Operational cutover surface for the signal-and-fire event bus")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the Fire Command Router's operator status surface.
    #[arg(long, env = "ROUTER_BASE_URL", default_value = "http://127.0.0.1:8090")]
    pub router_base_url: String,

    /// Where supervisor state is persisted across cutover/rollback.
    #[arg(long, env = "SUPERVISOR_STATE_PATH", default_value = "./supervisor_state.json")]
    pub supervisor_state_path: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Prints current mode, stream lengths, consumer lag, EA freshness.
    Status,
    /// Promotes stream-only (redis-only) mode.
    Cutover,
    /// Reinstates the legacy direct-IPC path.
    Rollback,
    /// Issues a dry_run fire and expects a round-trip without EA-side execution.
    Smoke {
        #[arg(long, default_value = "42")]
        user_id: String,
        #[arg(long, default_value = "EURUSD")]
        symbol: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorState {
    pub shadow_only: bool,
    pub bridge_enqueue: bool,
    pub saved_at: String,
}

fn save_supervisor_state(path: &str, shadow_only: bool, bridge_enqueue: bool) -> Result<()> {
    let state = SupervisorState {
        shadow_only,
        bridge_enqueue,
        saved_at: chrono::Utc::now().to_rfc3339(),
    };
    fs::write(path, serde_json::to_string_pretty(&state)?).context("write supervisor state")?;
    Ok(())
}

/// Runs the selected subcommand, returning the process exit code.
pub async fn run(cli: Cli) -> i32 {
    match cli.command {
        Command::Status => cmd_status(&cli.router_base_url).await,
        Command::Cutover => cmd_cutover(&cli.supervisor_state_path),
        Command::Rollback => cmd_rollback(&cli.supervisor_state_path),
        Command::Smoke { user_id, symbol } => cmd_smoke(&cli.router_base_url, &user_id, &symbol).await,
    }
}

fn cmd_cutover(state_path: &str) -> i32 {
    match save_supervisor_state(state_path, true, true) {
        Ok(()) => {
            info!("cutover: promoted to redis-only mode (SHADOW_ONLY=1 BRIDGE_ENQUEUE=1)");
            println!("mode promoted to redis-only; restart components with SHADOW_ONLY=1 BRIDGE_ENQUEUE=1");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("cutover: failed to save supervisor state: {e:#}");
            EXIT_CONFIG_ERROR
        }
    }
}

fn cmd_rollback(state_path: &str) -> i32 {
    match save_supervisor_state(state_path, false, false) {
        Ok(()) => {
            info!("rollback: reinstated legacy direct-IPC mode (SHADOW_ONLY=0 BRIDGE_ENQUEUE=0)");
            println!("mode rolled back to legacy; restart components with SHADOW_ONLY=0 BRIDGE_ENQUEUE=0");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("rollback: failed to save supervisor state: {e:#}");
            EXIT_CONFIG_ERROR
        }
    }
}

async fn cmd_status(base_url: &str) -> i32 {
    let client = reqwest::Client::new();
    match client.get(format!("{base_url}/status")).send().await {
        Ok(resp) if resp.status().is_success() => {
            match resp.text().await {
                Ok(body) => {
                    println!("{body}");
                    EXIT_OK
                }
                Err(e) => {
                    eprintln!("status: failed to read response body: {e:#}");
                    EXIT_REMOTE_UNAVAILABLE
                }
            }
        }
        Ok(resp) => {
            eprintln!("status: router returned {}", resp.status());
            EXIT_REMOTE_UNAVAILABLE
        }
        Err(e) => {
            eprintln!("status: router unreachable: {e:#}");
            EXIT_REMOTE_UNAVAILABLE
        }
    }
}

async fn cmd_smoke(base_url: &str, user_id: &str, symbol: &str) -> i32 {
    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "user_id": user_id,
        "symbol": symbol,
        "direction": "BUY",
        "lot": 0.01,
        "sl": 0.0,
        "tp": 0.0,
        "dry_run": true,
    });

    match client.post(format!("{base_url}/fire")).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => {
            println!("smoke: dry_run fire round-tripped successfully");
            EXIT_OK
        }
        Ok(resp) => {
            eprintln!("smoke: router rejected dry_run fire with {}", resp.status());
            EXIT_REMOTE_UNAVAILABLE
        }
        Err(e) => {
            eprintln!("smoke: router unreachable: {e:#}");
            EXIT_REMOTE_UNAVAILABLE
        }
    }
}
