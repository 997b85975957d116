// lootgate/src/engine/dispatcher.rs
//
// Writes outcomes to output JSONL files.
//   chat_out.jsonl        — every non-silent response, for the chat transport
//   moderator_queue.jsonl — anomaly records, for human review
//   audit_log.jsonl       — every handled event with its outcome
// Wire chat_out.jsonl to your chat client's send path in production.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::events::{InboundEvent, Outcome};

pub const CHAT_OUT:        &str = "chat_out.jsonl";
pub const MODERATOR_QUEUE: &str = "moderator_queue.jsonl";
pub const AUDIT_LOG:       &str = "audit_log.jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub channel:   String,
    pub text:      String,
    pub broadcast: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct AuditEntry<'a> {
    event:      &'a InboundEvent,
    outcome:    &'a Outcome,
    handled_at: DateTime<Utc>,
}

pub struct Dispatcher {
    out:     PathBuf,
    channel: String,
}

impl Dispatcher {
    pub fn new(output_dir: impl Into<PathBuf>, channel: impl Into<String>) -> Result<Self> {
        let out: PathBuf = output_dir.into();
        std::fs::create_dir_all(&out)
            .with_context(|| format!("creating output directory {}", out.display()))?;
        Ok(Self { out, channel: channel.into() })
    }

    #[cfg(test)]
    pub fn output_dir(&self) -> &std::path::Path {
        &self.out
    }

    pub async fn dispatch(&self, event: &InboundEvent, outcome: &Outcome) -> Result<Option<ChatLine>> {
        let mut said = None;

        if let Some(text) = &outcome.response {
            let line = ChatLine {
                channel:   self.channel.clone(),
                text:      text.clone(),
                broadcast: outcome.side_effects.broadcast_ranking,
                timestamp: event.now,
            };
            self.write(CHAT_OUT, &(serde_json::to_string(&line)? + "\n")).await?;
            said = Some(line);
        }

        if let Some(record) = &outcome.anomaly {
            self.write(MODERATOR_QUEUE, &(serde_json::to_string(record)? + "\n")).await?;
            debug!(user = %record.user_id, "anomaly queued for review");
        }

        // Stamped from the event, so replays produce identical audit lines.
        let audit = AuditEntry { event, outcome, handled_at: event.now };
        self.write(AUDIT_LOG, &(serde_json::to_string(&audit)? + "\n")).await?;

        Ok(said)
    }

    async fn write(&self, file: &str, content: &str) -> Result<()> {
        let mut f = OpenOptions::new().create(true).append(true)
            .open(self.out.join(file)).await?;
        f.write_all(content.as_bytes()).await?;
        Ok(())
    }
}
