pub mod counters;
pub mod intervals;
pub mod journal;
pub mod ledger;
