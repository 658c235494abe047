//! DDL for the state store (component K, spec §4.K / §6.1).

pub const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS signals (
    signal_id   TEXT PRIMARY KEY,
    symbol      TEXT NOT NULL,
    direction   TEXT NOT NULL,
    entry       REAL NOT NULL,
    sl          REAL NOT NULL,
    tp          REAL NOT NULL,
    confidence  REAL NOT NULL,
    pattern     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    streamed    INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_signals_streamed ON signals(streamed);

CREATE TABLE IF NOT EXISTS fires (
    fire_id     TEXT PRIMARY KEY,
    idem_key    TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    signal_id   TEXT NULL,
    target_uuid TEXT NOT NULL,
    symbol      TEXT NOT NULL,
    direction   TEXT NOT NULL,
    lot         REAL NOT NULL,
    sl          REAL NOT NULL,
    tp          REAL NOT NULL,
    comment     TEXT NULL,
    status      TEXT NOT NULL,
    ticket      TEXT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE(user_id, idem_key)
);

CREATE INDEX IF NOT EXISTS idx_fires_status ON fires(status);
CREATE INDEX IF NOT EXISTS idx_fires_target ON fires(target_uuid);

CREATE TABLE IF NOT EXISTS ea_instances (
    target_uuid TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    last_seen   TEXT NOT NULL,
    balance     REAL NULL,
    equity      REAL NULL,
    symbol_map  TEXT NULL
);

CREATE TABLE IF NOT EXISTS confirmations (
    fire_id     TEXT NOT NULL,
    sequence    INTEGER NOT NULL,
    ticket      TEXT NOT NULL,
    fill_price  REAL NOT NULL,
    fill_volume REAL NOT NULL,
    status      TEXT NOT NULL,
    broker_ts   TEXT NOT NULL,
    PRIMARY KEY (fire_id, sequence)
);

CREATE TABLE IF NOT EXISTS events (
    event_id       TEXT PRIMARY KEY,
    event_type     TEXT NOT NULL,
    timestamp      TEXT NOT NULL,
    source         TEXT NOT NULL,
    correlation_id TEXT NULL,
    user_id        TEXT NULL,
    data           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_events_correlation ON events(correlation_id);
"#;
