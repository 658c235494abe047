//! Runtime configuration
//! Mission: Centralize every environment-driven knob in one place

use std::env;
use std::time::Duration;

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// The two operational flags that select one of the three fire-path modes
/// (direct-IPC / shadow / redis-only), per spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoverFlags {
    /// Webapp skips direct IPC and publishes to the stream instead.
    pub shadow_only: bool,
    /// Dispatch bridge forwards stream entries onward to the EA IPC path.
    pub bridge_enqueue: bool,
}

impl CutoverFlags {
    pub fn from_env() -> Self {
        Self {
            shadow_only: env_flag("SHADOW_ONLY", false),
            bridge_enqueue: env_flag("BRIDGE_ENQUEUE", true),
        }
    }

    /// Direct-IPC-only (legacy): webapp writes IPC directly, no stream forwarding.
    pub fn is_legacy(&self) -> bool {
        !self.shadow_only && !self.bridge_enqueue
    }

    /// Shadow (dual): webapp writes IPC and publishes to stream; bridge log-only.
    pub fn is_shadow(&self) -> bool {
        !self.shadow_only && self.bridge_enqueue
    }

    /// Redis-only (target): webapp publishes to stream only; bridge forwards to IPC.
    pub fn is_redis_only(&self) -> bool {
        self.shadow_only && self.bridge_enqueue
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite path for the state store.
    pub database_path: String,
    /// HTTP port for the Fire Command Router / operator status surface.
    pub port: u16,
    /// Prometheus exporter port for the watchdog's operational gauges.
    pub metrics_port: u16,

    /// Redis connection string backing the signals stream and per-EA fire streams.
    pub redis_url: String,
    /// Consumer group name for the signals stream (spec: `relay`).
    pub signals_group: String,
    /// Consumer group name for per-EA fire streams (spec: `dispatch`).
    pub fire_group: String,
    /// Approximate retention cap per stream (spec: 250 000 entries).
    pub stream_max_len: usize,

    /// Upstream push socket the Signal Ingest Bridge connects to.
    pub upstream_socket_addr: String,
    /// PULL socket address producers connect to on the observation bus.
    pub observation_pull_addr: String,
    /// PUB socket address subscribers connect to on the observation bus.
    pub observation_pub_addr: String,

    /// Mission-materialization HTTP endpoint.
    pub mission_endpoint: String,

    /// EA freshness threshold (spec: 180s).
    pub ea_freshness: Duration,
    /// Dispatch-side "EA unreachable" threshold — longer than
    /// `ea_freshness` (spec §4.F "if the EA has been stale for longer
    /// than a second, longer threshold, ack and reject with
    /// `ea_unreachable`"). Default 10 minutes.
    pub ea_unreachable_threshold: Duration,
    /// Stuck-fire watchdog threshold (spec: 120s).
    pub stuck_fire_threshold: Duration,
    /// Stream-lag length threshold (spec: 10 000 entries).
    pub stream_lag_len_threshold: usize,
    /// Stream consumer idle threshold (spec: 120s).
    pub stream_idle_threshold: Duration,
    /// Backup recency threshold (spec: 24h).
    pub backup_recency_threshold: Duration,
    /// Path to the most recent durable state-store backup; its mtime is
    /// what the backup-recency watchdog check reads.
    pub backup_path: String,
    /// Idempotency index retention window (open question, resolved: 24h).
    pub idem_retention: Duration,

    /// Minimum/maximum accepted lot size for a fire.
    pub min_lot: f64,
    pub max_lot: f64,

    /// Directory the EA IPC channel writes fire files into / watches for confirmations.
    pub ea_ipc_dir: String,

    /// Pager webhook URL (optional; falls back to the local pager log on failure).
    pub pager_webhook_url: Option<String>,
    pub pager_log_path: String,

    pub flags: CutoverFlags,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./eventbus.db".to_string()),
            port: env_parse("PORT", 8090),
            metrics_port: env_parse("METRICS_PORT", 9100),

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            signals_group: env::var("SIGNALS_GROUP").unwrap_or_else(|_| "relay".to_string()),
            fire_group: env::var("FIRE_GROUP").unwrap_or_else(|_| "dispatch".to_string()),
            stream_max_len: env_parse("STREAM_MAX_LEN", 250_000),

            upstream_socket_addr: env::var("UPSTREAM_SOCKET_ADDR")
                .unwrap_or_else(|_| "tcp://127.0.0.1:5556".to_string()),
            observation_pull_addr: env::var("OBSERVATION_PULL_ADDR")
                .unwrap_or_else(|_| "tcp://127.0.0.1:5570".to_string()),
            observation_pub_addr: env::var("OBSERVATION_PUB_ADDR")
                .unwrap_or_else(|_| "tcp://127.0.0.1:5571".to_string()),

            mission_endpoint: env::var("MISSION_ENDPOINT")
                .unwrap_or_else(|_| "http://127.0.0.1:8091/missions".to_string()),

            ea_freshness: Duration::from_secs(env_parse("EA_FRESHNESS_SECS", 180)),
            ea_unreachable_threshold: Duration::from_secs(env_parse(
                "EA_UNREACHABLE_SECS",
                600,
            )),
            stuck_fire_threshold: Duration::from_secs(env_parse("STUCK_FIRE_SECS", 120)),
            stream_lag_len_threshold: env_parse("STREAM_LAG_LEN", 10_000),
            stream_idle_threshold: Duration::from_secs(env_parse("STREAM_IDLE_SECS", 120)),
            backup_recency_threshold: Duration::from_secs(env_parse(
                "BACKUP_RECENCY_SECS",
                24 * 3600,
            )),
            backup_path: env::var("BACKUP_PATH").unwrap_or_else(|_| "./backups/latest.db".to_string()),
            idem_retention: Duration::from_secs(env_parse("IDEM_RETENTION_SECS", 24 * 3600)),

            min_lot: env_parse("MIN_LOT", 0.01),
            max_lot: env_parse("MAX_LOT", 50.0),

            ea_ipc_dir: env::var("EA_IPC_DIR").unwrap_or_else(|_| "./ea_ipc".to_string()),

            pager_webhook_url: env::var("PAGER_WEBHOOK_URL").ok(),
            pager_log_path: env::var("PAGER_LOG_PATH")
                .unwrap_or_else(|_| "./pager.log".to_string()),

            flags: CutoverFlags::from_env(),
        })
    }
}
