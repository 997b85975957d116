// lootgate/src/events.rs
//
// Shared event types and all domain types flowing through lootgate.
// Inbound: chat feed lines → InboundEvent.
// Outbound: Outcome (response text + side effects) for the chat sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Case-insensitive user identity. Always stored trimmed and lowercased;
/// every ledger/cooldown/interval key is derived from this form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for UserId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    StartSystem,   // !iniciar
    StopSystem,    // !fin
    ResetRanking,  // !resetrank
    ShowRanking,   // !ranking
    PerformAction, // !atraco
}

impl Command {
    /// Parse a raw chat message. Only exact commands (trimmed, any case) match.
    pub fn from_chat(message: &str) -> Option<Self> {
        match message.trim().to_lowercase().as_str() {
            "!iniciar"   => Some(Self::StartSystem),
            "!fin"       => Some(Self::StopSystem),
            "!resetrank" => Some(Self::ResetRanking),
            "!ranking"   => Some(Self::ShowRanking),
            "!atraco"    => Some(Self::PerformAction),
            _            => None,
        }
    }

    pub fn requires_privilege(self) -> bool {
        matches!(self, Self::StartSystem | Self::StopSystem | Self::ResetRanking)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartSystem   => write!(f, "start_system"),
            Self::StopSystem    => write!(f, "stop_system"),
            Self::ResetRanking  => write!(f, "reset_ranking"),
            Self::ShowRanking   => write!(f, "show_ranking"),
            Self::PerformAction => write!(f, "perform_action"),
        }
    }
}

/// One event presented to the session controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub user_id:       UserId,
    pub command:       Command,
    pub now:           DateTime<Utc>,
    pub is_privileged: bool,
}

// ── Chat feed ─────────────────────────────────────────────────────────────────

/// One line of the JSONL chat feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username:     String,
    pub message:      String,
    #[serde(default)]
    pub is_moderator: bool,
    #[serde(default)]
    pub timestamp:    Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Convert to an inbound event. Non-command chatter yields None.
    /// The channel's broadcaster is privileged alongside moderators.
    pub fn into_event(self, channel: &str, clock: &dyn Clock) -> Option<InboundEvent> {
        let command = Command::from_chat(&self.message)?;
        let user_id = UserId::new(&self.username);
        let is_privileged = self.is_moderator || user_id.as_str() == channel.trim().to_lowercase();
        Some(InboundEvent {
            user_id,
            command,
            now: self.timestamp.unwrap_or_else(|| clock.now()),
            is_privileged,
        })
    }
}

// ── Rewards ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTier {
    Common,
    Rare,
    UltraRare,
    Epic,
    Legendary,
}

impl RewardTier {
    #[cfg(test)]
    pub const ALL: [RewardTier; 5] = [
        Self::Common, Self::Rare, Self::UltraRare, Self::Epic, Self::Legendary,
    ];

    pub fn points(self) -> u64 {
        match self {
            Self::Common    => 1,
            Self::Rare      => 5,
            Self::UltraRare => 25,
            Self::Epic      => 100,
            Self::Legendary => 500,
        }
    }

    /// Item shown in chat when this tier is drawn.
    pub fn item_name(self) -> &'static str {
        match self {
            Self::Common    => "Mil-Spec Bluecase",
            Self::Rare      => "Restricted Violetcase",
            Self::UltraRare => "Classified Pinkcase",
            Self::Epic      => "Covert Redcase",
            Self::Legendary => "KNIFE!! Yellowcase",
        }
    }
}

impl std::fmt::Display for RewardTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Common    => write!(f, "common"),
            Self::Rare      => write!(f, "rare"),
            Self::UltraRare => write!(f, "ultra_rare"),
            Self::Epic      => write!(f, "epic"),
            Self::Legendary => write!(f, "legendary"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawSummary {
    pub tier:      RewardTier,
    pub points:    u64,
    pub new_total: u64,
}

// ── Detection records ─────────────────────────────────────────────────────────

/// Logged when a user's inter-action gap sits at or just above the cooldown floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub user_id:          UserId,
    pub gap_secs:         f64,
    pub recent_gaps_secs: Vec<f64>, // last 3 gaps, oldest first
    pub timestamp:        DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendaryDrop {
    pub user_id:   UserId,
    pub timestamp: DateTime<Utc>,
}

// ── Outcome ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffects {
    pub persist:           bool,  // every touched store was saved
    pub broadcast_ranking: bool,
}

/// Result handed back to the chat collaborator. `response == None` means
/// nothing is said in chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub response:     Option<String>,
    pub side_effects: SideEffects,
    pub draw:         Option<DrawSummary>,
    pub anomaly:      Option<AnomalyRecord>,
}

impl Outcome {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn say(text: impl Into<String>) -> Self {
        Self { response: Some(text.into()), ..Self::default() }
    }

    #[cfg(test)]
    pub fn is_silent(&self) -> bool {
        self.response.is_none()
    }
}
