//! Redis Streams wrapper providing the consumer-group semantics spec §5/§6
//! require: per-stream FIFO, ack'd pending entries, claim/redeliver for
//! stalled consumers, and an approximate retention cap on append.
//!
//! No teacher module does this — grounded on the `redis` crate usage
//! across the retrieval pack (see DESIGN.md). The reconnect/backoff shape
//! in [`StreamClient::connect`] mirrors the teacher's doubling-backoff-
//! capped-at-30s reconnect loop used elsewhere for its own feed sockets.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisResult};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct PendingSummary {
    pub count: u64,
}

#[derive(Clone)]
pub struct StreamClient {
    manager: ConnectionManager,
    max_len: usize,
}

impl StreamClient {
    /// Connects with exponential backoff capped at 30s, matching the
    /// reconnect budget spec §4.B asks of the ingest bridge.
    pub async fn connect(redis_url: &str, max_len: usize) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid redis url")?;

        let mut delay = Duration::from_secs(1);
        let max_delay = Duration::from_secs(30);
        loop {
            match ConnectionManager::new(client.clone()).await {
                Ok(manager) => {
                    info!(redis_url, "connected to redis stream backend");
                    return Ok(Self { manager, max_len });
                }
                Err(e) => {
                    warn!(error = %e, delay_secs = delay.as_secs(), "redis connection failed; retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
            }
        }
    }

    /// Idempotently creates the consumer group, tolerating `BUSYGROUP`
    /// (the group already exists) — spec §6 "groups are idempotently
    /// created at bridge startup".
    pub async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let result: RedisResult<()> = conn
            .xgroup_create_mkstream(stream, group, "$")
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e).context("create consumer group"),
        }
    }

    /// Appends an entry and trims the stream to its approximate retention
    /// cap (spec §6 "Retention capped at 250 000 entries; approximate trim
    /// on append").
    pub async fn append(&self, stream: &str, fields: &[(&str, &str)]) -> Result<String> {
        let mut conn = self.manager.clone();
        let id: String = conn
            .xadd_maxlen(
                stream,
                redis::streams::StreamMaxlen::Approx(self.max_len),
                "*",
                fields,
            )
            .await
            .context("append stream entry")?;
        Ok(id)
    }

    /// Blocking read as a member of `group`, per spec §5 "Stream reads use
    /// blocking calls with a timeout (default 5s) to allow graceful
    /// shutdown signals".
    pub async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>> {
        let mut conn = self.manager.clone();
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block.as_millis() as usize);

        let reply: StreamReadReply = conn
            .xread_options(&[stream], &[">"], &opts)
            .await
            .context("read from consumer group")?;

        Ok(flatten_reply(reply))
    }

    pub async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.xack(stream, group, &[id]).await.context("ack entry")?;
        Ok(())
    }

    pub async fn pending_summary(&self, stream: &str, group: &str) -> Result<PendingSummary> {
        let mut conn = self.manager.clone();
        let reply: redis::streams::StreamPendingReply = conn
            .xpending(stream, group)
            .await
            .context("xpending summary")?;
        let count = match reply {
            redis::streams::StreamPendingReply::Empty => 0,
            redis::streams::StreamPendingReply::Data(data) => data.count as u64,
        };
        Ok(PendingSummary { count })
    }

    /// Claims entries idle for longer than `min_idle` so a stalled
    /// consumer's work is redelivered to a healthy one (spec §4.C periodic
    /// `XPENDING` scan / spec §8 invariant 4).
    pub async fn claim_stale(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamEntry>> {
        let mut conn = self.manager.clone();
        let (_cursor, entries, _deleted): (String, Vec<redis::streams::StreamId>, Vec<String>) = conn
            .xautoclaim(stream, group, consumer, min_idle.as_millis() as i64, "0")
            .await
            .context("autoclaim stale entries")?;

        Ok(entries
            .into_iter()
            .take(count)
            .map(|entry| StreamEntry {
                id: entry.id,
                fields: stream_map_to_fields(entry.map),
            })
            .collect())
    }

    pub async fn len(&self, stream: &str) -> Result<usize> {
        let mut conn = self.manager.clone();
        let len: usize = conn.xlen(stream).await.context("stream length")?;
        Ok(len)
    }
}

fn flatten_reply(reply: StreamReadReply) -> Vec<StreamEntry> {
    let mut out = Vec::new();
    for key in reply.keys {
        for entry in key.ids {
            out.push(StreamEntry {
                id: entry.id,
                fields: stream_map_to_fields(entry.map),
            });
        }
    }
    out
}

fn stream_map_to_fields(
    map: HashMap<String, redis::Value>,
) -> HashMap<String, String> {
    map.into_iter()
        .filter_map(|(k, v)| match v {
            redis::Value::Data(bytes) => {
                String::from_utf8(bytes).ok().map(|s| (k, s))
            }
            redis::Value::Status(s) => Some((k, s)),
            _ => None,
        })
        .collect()
}
