// lootgate/src/feed.rs
//
// Chat feed sources. Each reads JSONL ChatMessage lines and pushes them into
// the pipeline channel in file order.
//
//   tail    — follow a live file, starting at its end
//   replay  — play a captured file, pacing by message timestamps / speed

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::events::ChatMessage;

fn parse_line(line: &str) -> Option<ChatMessage> {
    let line = line.trim();
    if line.is_empty() { return None; }
    match serde_json::from_str::<ChatMessage>(line) {
        Ok(msg) => Some(msg),
        Err(e)  => { warn!("Parse error: {}", e); None }
    }
}

pub async fn tail_jsonl(path: PathBuf, tx: mpsc::Sender<ChatMessage>, seek_end: bool) -> Result<()> {
    let file      = tokio::fs::File::open(&path).await?;
    let mut lines = BufReader::new(file).lines();

    if seek_end {
        while lines.next_line().await?.is_some() {}  // consume existing
    }

    info!("Tailing {}", path.display());
    loop {
        match lines.next_line().await? {
            Some(line) => {
                if let Some(msg) = parse_line(&line) {
                    if tx.send(msg).await.is_err() { break; }
                }
            }
            None => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    Ok(())
}

/// Longest single pause between replayed messages.
pub const MAX_REPLAY_WAIT: Duration = Duration::from_secs(3600);

/// Wall-clock pause for a recorded gap of `delta_ms` at `speed`.
/// None when pacing is off (speed 0) or the gap is not positive.
fn replay_wait(delta_ms: i64, speed: f64) -> Option<Duration> {
    if speed.is_nan() || speed <= 0.0 || delta_ms <= 0 {
        return None;
    }
    let wait = Duration::try_from_secs_f64(delta_ms as f64 / 1000.0 / speed)
        .unwrap_or(MAX_REPLAY_WAIT);
    Some(wait.min(MAX_REPLAY_WAIT))
}

/// Timestamps are kept as recorded so cooldowns replay faithfully; `speed`
/// only scales the wall-clock pacing (0 = as fast as possible).
pub async fn replay_jsonl(path: PathBuf, tx: mpsc::Sender<ChatMessage>, speed: f64) -> Result<usize> {
    let content  = tokio::fs::read_to_string(&path).await?;
    let messages: Vec<ChatMessage> = content.lines().filter_map(parse_line).collect();
    info!("Replaying {} messages from {}", messages.len(), path.display());

    let mut prev_ts: Option<DateTime<Utc>> = None;
    let mut sent    = 0usize;
    for msg in messages {
        if let (Some(prev), Some(ts)) = (prev_ts, msg.timestamp) {
            if let Some(wait) = replay_wait((ts - prev).num_milliseconds(), speed) {
                tokio::time::sleep(wait).await;
            }
        }
        if msg.timestamp.is_some() { prev_ts = msg.timestamp; }
        if tx.send(msg).await.is_err() { break; }
        sent += 1;
    }
    Ok(sent)
}
