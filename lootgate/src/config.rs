// lootgate/src/config.rs
//
// Daemon configuration. Defaults → optional JSON file → CLI flags, later
// layers winning. Game policy (cooldowns, tier odds, suspicion threshold)
// is fixed in code.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Slowest accepted replay pacing (other than 0, which disables pacing).
pub const MIN_REPLAY_SPEED: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel:             String,   // broadcaster login; always privileged
    pub feed_path:           PathBuf,  // JSONL chat feed (tail/replay)
    pub data_dir:            PathBuf,  // snapshot store directory
    pub output_dir:          PathBuf,  // chat_out / moderator_queue / audit_log
    pub replay_speed:        f64,      // 0 = no pacing
    pub seed:                Option<u64>,
    pub stats_interval_secs: u64,
    pub ephemeral:           bool,     // keep snapshots in memory, never touch data_dir
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel:             "blackelespanolito".to_string(),
            feed_path:           PathBuf::from("/tmp/lootgate_feed.jsonl"),
            data_dir:            PathBuf::from("./lootgate_data"),
            output_dir:          PathBuf::from("/tmp/lootgate_output"),
            replay_speed:        1.0,
            seed:                None,
            stats_interval_secs: 30,
            ephemeral:           false,
        }
    }
}

impl Config {
    /// Defaults, or the given JSON file layered over them.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else { return Ok(Self::default()) };
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&body)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.channel.trim().is_empty(), "channel must not be empty");
        anyhow::ensure!(self.replay_speed.is_finite()
            && (self.replay_speed == 0.0 || self.replay_speed >= MIN_REPLAY_SPEED),
            "replay_speed must be 0 (no pacing) or a finite value >= {}", MIN_REPLAY_SPEED);
        anyhow::ensure!(self.stats_interval_secs > 0, "stats_interval_secs must be > 0");
        Ok(())
    }
}
