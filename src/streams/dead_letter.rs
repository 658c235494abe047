//! Dead-letter stream helper.
//! Mission: move poisoned entries out of the main stream after they
//! exceed their retry budget, per spec §7 taxonomy entry `Poisoned`.

use anyhow::Result;

use super::client::StreamClient;

pub struct DeadLetter<'a> {
    client: &'a StreamClient,
}

impl<'a> DeadLetter<'a> {
    pub fn new(client: &'a StreamClient) -> Self {
        Self { client }
    }

    fn dead_stream_name(source_stream: &str) -> String {
        format!("{source_stream}.dead")
    }

    /// Appends the original entry payload plus the failure reason to the
    /// stream's dead-letter sibling. The caller is still responsible for
    /// acking the original entry.
    pub async fn move_entry(
        &self,
        source_stream: &str,
        entry_id: &str,
        payload: &str,
        reason: &str,
        attempts: u32,
    ) -> Result<()> {
        let dead_stream = Self::dead_stream_name(source_stream);
        self.client
            .append(
                &dead_stream,
                &[
                    ("source_stream", source_stream),
                    ("original_id", entry_id),
                    ("payload", payload),
                    ("reason", reason),
                    ("attempts", &attempts.to_string()),
                ],
            )
            .await?;
        Ok(())
    }
}
