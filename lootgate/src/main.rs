// lootgate/src/main.rs
//
// lootgate — chat heist draws, leaderboard and scripted-timing detection
//
// Two operational modes:
//   tail    — tail a live JSONL chat feed (one ChatMessage per line)
//   replay  — replay a captured feed, timestamps preserved, pacing scaled
//
// Events are handled strictly one at a time: the feed task pushes into an
// mpsc channel and a single consumer owns the session controller.
//
// Usage:
//   lootgate --mode tail --path /var/log/chat/feed.jsonl --channel mystream
//   lootgate --mode replay --path captured.jsonl --speed 0 --seed 7
//   lootgate --config lootgate.json

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod clock;
mod config;
mod engine;
mod events;
mod feed;
mod render;
mod state;
mod store;

use clock::{Clock, SystemClock};
use config::Config;
use engine::dispatcher::{ChatLine, Dispatcher};
use engine::drawer::{RandomSource, StdRandom};
use engine::session::SessionController;
use events::{ChatMessage, Outcome, RewardTier};
use store::{JsonDirStore, MemoryStore, SnapshotStore};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "lootgate",
    about   = "Chat heist draws, leaderboard and scripted-timing detection",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, value_enum, default_value = "tail")]
    mode: Mode,

    #[arg(long, help = "JSON config file (CLI flags override it)")]
    config: Option<PathBuf>,

    #[arg(long, help = "JSONL chat feed path")]
    path: Option<PathBuf>,

    #[arg(long, help = "Replay speed multiplier (0 = no pacing)")]
    speed: Option<f64>,

    #[arg(long, help = "Output directory for chat/moderator/audit logs")]
    output: Option<PathBuf>,

    #[arg(long, help = "Snapshot store directory")]
    data_dir: Option<PathBuf>,

    #[arg(long, help = "Broadcaster login (always privileged)")]
    channel: Option<String>,

    #[arg(long, help = "Seed the reward RNG for reproducible replays")]
    seed: Option<u64>,

    #[arg(long, help = "Keep all state in memory (dry-run replays)")]
    ephemeral: bool,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    Tail,    // tail a live JSONL feed
    Replay,  // replay a static JSONL file
}

impl Cli {
    fn into_config(self) -> Result<(Mode, Config)> {
        let mut cfg = Config::load(self.config.as_deref())?;
        if let Some(p) = self.path     { cfg.feed_path    = p; }
        if let Some(s) = self.speed    { cfg.replay_speed = s; }
        if let Some(o) = self.output   { cfg.output_dir   = o; }
        if let Some(d) = self.data_dir { cfg.data_dir     = d; }
        if let Some(c) = self.channel  { cfg.channel      = c; }
        if self.seed.is_some()         { cfg.seed         = self.seed; }
        if self.ephemeral              { cfg.ephemeral    = true; }
        cfg.validate()?;
        Ok((self.mode, cfg))
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

struct Pipeline {
    session:    SessionController,
    dispatcher: Dispatcher,
    clock:      Arc<dyn Clock>,
    channel:    String,
    handled:    u64,
}

impl Pipeline {
    fn new(cfg: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let store: Box<dyn SnapshotStore> = if cfg.ephemeral {
            info!("Ephemeral run: snapshots kept in memory only");
            Box::new(MemoryStore::new())
        } else {
            Box::new(JsonDirStore::open(&cfg.data_dir)?)
        };
        let random: Box<dyn RandomSource> = match cfg.seed {
            Some(seed) => Box::new(StdRandom::seeded(seed)),
            None       => Box::new(StdRandom::from_entropy()),
        };
        Ok(Self {
            session:    SessionController::open(store, random),
            dispatcher: Dispatcher::new(&cfg.output_dir, cfg.channel.clone())?,
            clock,
            channel:    cfg.channel.clone(),
            handled:    0,
        })
    }

    async fn process(&mut self, msg: ChatMessage) -> Option<Outcome> {
        let event = msg.into_event(&self.channel, self.clock.as_ref())?;
        self.handled += 1;

        let outcome = self.session.handle(&event);

        match self.dispatcher.dispatch(&event, &outcome).await {
            Ok(Some(line)) => print_chat(&line, &outcome),
            Ok(None)       => {}
            Err(e)         => error!("Dispatch failed: {}", e),
        }
        Some(outcome)
    }

    fn log_stats(&self, start: Instant) {
        let counters = self.session.counters();
        info!(
            uptime_secs = start.elapsed().as_secs(),
            handled     = self.handled,
            draws       = counters.total_draws,
            legendary   = self.session.legendary().len(),
            players     = self.session.ledger().len(),
            tracked     = self.session.intervals().n_users(),
            anomalies   = self.session.anomalies().len(),
            state       = ?self.session.state(),
            "stats"
        );
    }
}

// ── Terminal output ───────────────────────────────────────────────────────────

fn print_banner(cfg: &Config) {
    println!("\x1b[1m");
    println!("  lootgate  \x1b[0m\x1b[90mchat heists · leaderboard · scripted-timing detection\x1b[0m");
    let data = if cfg.ephemeral { "memory".to_string() } else { cfg.data_dir.display().to_string() };
    println!("  \x1b[90mchannel={}  data={}  output={}\x1b[0m\n",
        cfg.channel, data, cfg.output_dir.display());
}

fn print_chat(line: &ChatLine, outcome: &Outcome) {
    let color = match outcome.draw.map(|d| d.tier) {
        Some(RewardTier::Legendary) => "\x1b[93;1m",
        Some(RewardTier::Epic)      => "\x1b[91m",
        Some(RewardTier::UltraRare) => "\x1b[95m",
        Some(RewardTier::Rare)      => "\x1b[94m",
        Some(RewardTier::Common)    => "\x1b[96m",
        None                        => "\x1b[90m",
    };
    let reset = "\x1b[0m";
    println!("{}[#{}] {}{}", color, line.channel, line.text, reset);
    if let Some(a) = &outcome.anomaly {
        println!("  \x1b[91;1m⚑ {} gap={:.3}s recent={:?}{}", a.user_id, a.gap_secs, a.recent_gaps_secs, reset);
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("lootgate=info".parse()?))
        .compact().init();

    let (mode, cfg) = Cli::parse().into_config()?;
    let mut pipeline = Pipeline::new(&cfg, Arc::new(SystemClock))?;
    let start = Instant::now();
    let (tx, mut rx) = mpsc::channel::<ChatMessage>(1024);

    print_banner(&cfg);

    let path = cfg.feed_path.clone();
    match mode {
        Mode::Tail => {
            println!("  Mode: \x1b[96mTAIL\x1b[0m  |  {}\n", path.display());
            tokio::spawn(async move {
                if let Err(e) = feed::tail_jsonl(path, tx, true).await {
                    error!("Tail feed stopped: {}", e);
                }
            });
        }
        Mode::Replay => {
            let speed = cfg.replay_speed;
            println!("  Mode: \x1b[93mREPLAY\x1b[0m  |  {}  speed={:.1}x\n", path.display(), speed);
            tokio::spawn(async move {
                if let Err(e) = feed::replay_jsonl(path, tx, speed).await {
                    error!("Replay feed stopped: {}", e);
                }
            });
        }
    }

    println!("  Press Ctrl+C to stop.\n");

    let mut stats = tokio::time::interval(tokio::time::Duration::from_secs(cfg.stats_interval_secs));
    stats.tick().await;

    // Single consumer: one event runs to completion before the next is read.
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(msg) => { pipeline.process(msg).await; }
                None      => break,
            },
            _ = stats.tick() => pipeline.log_stats(start),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    pipeline.log_stats(start);
    Ok(())
}
