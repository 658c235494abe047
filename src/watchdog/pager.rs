//! Pager sink (spec §4.I, SPEC_FULL.md §4.L).
//! Mission: get a human-readable alert out, preferring a webhook and
//! always falling back to a local append-only log on failure.

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

pub struct Pager {
    client: Client,
    webhook_url: Option<String>,
    log_path: String,
}

impl Pager {
    pub fn new(webhook_url: Option<String>, log_path: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
            log_path,
        }
    }

    pub async fn alert(&self, message: &str) {
        if let Some(url) = &self.webhook_url {
            let body = json!({ "text": message, "source": "signalfire-watchdog" });
            match self.client.post(url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => return,
                Ok(resp) => warn!(status = %resp.status(), "pager webhook returned non-2xx"),
                Err(e) => warn!(error = %e, "pager webhook call failed"),
            }
        }

        if let Err(e) = self.append_local(message) {
            warn!(error = %e, "pager: failed to write local fallback log");
        }
    }

    fn append_local(&self, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .context("open pager log")?;
        writeln!(file, "{} {}", Utc::now().to_rfc3339(), message).context("write pager log")?;
        Ok(())
    }
}
