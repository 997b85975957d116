// lootgate/src/render.rs
//
// Chat-facing text for every outcome.

use crate::events::{Command, RewardTier, UserId};
use crate::state::ledger::LedgerEntry;

pub const RANKING_SIZE: usize = 5;

pub fn system_started() -> String {
    "The heist system has started! Use !atraco to try your luck.".to_string()
}

pub fn already_started() -> String {
    "The heist system is already active.".to_string()
}

pub fn system_stopped() -> String {
    "The heist system has ended! Thanks for playing.".to_string()
}

pub fn already_stopped() -> String {
    "The heist system is already inactive.".to_string()
}

pub fn ranking_reset() -> String {
    "The ranking has been reset! All scores are back to zero.".to_string()
}

pub fn denied(user: &UserId, command: Command) -> String {
    let what = match command {
        Command::StartSystem  => "start the heist system",
        Command::StopSystem   => "stop the heist system",
        Command::ResetRanking => "reset the ranking",
        Command::ShowRanking | Command::PerformAction => "do that",
    };
    format!("{}, only moderators can {}.", user, what)
}

pub fn cooldown(user: &UserId, remaining_secs: i64) -> String {
    format!("{}, wait {} seconds before attempting another heist.", user, remaining_secs)
}

pub fn draw(user: &UserId, tier: RewardTier, points: u64, total: u64) -> String {
    format!(
        "{}, you pulled off a heist and got a {}! +{} points. You now have {} points.",
        user, tier.item_name(), points, total
    )
}

pub fn ranking(top: &[LedgerEntry]) -> String {
    if top.is_empty() {
        return "No scores recorded yet. Use !atraco to get started!".to_string();
    }
    let rows: Vec<String> = top.iter().enumerate()
        .map(|(i, e)| format!("{}. {} ({} points)", i + 1, e.user_id, e.points))
        .collect();
    format!("Top {} players: {}", top.len(), rows.join(" "))
}
