//! # Performance: Per-Day Worker Metrics
//!
//! Pure arithmetic behind the `worker_performance` table: efficiency, elapsed
//! session minutes, the incremental per-count update, and the window ranking
//! used by the leaderboard.
//!
//! ## Efficiency
//!
//! `efficiency = round(bins_counted / (minutes_taken / 60), 2)`, i.e. bins per
//! hour to two decimals, and `0` whenever `minutes_taken` is zero.
//!
//! ## Ranking
//!
//! The leaderboard ranks only the rows it returns: sort by efficiency
//! descending, truncate to the requested limit, then number the survivors
//! 1..n. A worker outside the window gets no rank from that pass. Ties are
//! broken by more bins counted, then by username, so a pass is deterministic.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bins per hour, rounded to two decimals; zero when no time was recorded.
pub fn efficiency(bins_counted: i32, minutes_taken: i32) -> f64 {
    if minutes_taken <= 0 {
        return 0.0;
    }
    let hours = f64::from(minutes_taken) / 60.0;
    round2(f64::from(bins_counted) / hours)
}

/// Whole minutes between session start and end, rounded to the nearest minute.
/// An end before the start counts as zero.
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i32 {
    let secs = (end - start).num_seconds().max(0);
    let minutes = (secs + 30) / 60;
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

/// Minutes a count submission should record for its session: the elapsed
/// time once the session has ended, `None` (keep what is stored) otherwise.
pub fn session_minutes(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Option<i32> {
    end.map(|end| elapsed_minutes(start, end))
}

/// The calendar day performance rows are keyed by.
pub fn business_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Running totals of one worker on one day.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DayTotals {
    pub bins_counted: i32,
    pub quantity_counted: i64,
    pub minutes_taken: i32,
    pub efficiency: f64,
}

impl DayTotals {
    /// Totals with the time replaced (session end) and efficiency refreshed.
    pub fn with_minutes(&self, minutes_taken: i32) -> DayTotals {
        DayTotals {
            minutes_taken,
            efficiency: efficiency(self.bins_counted, minutes_taken),
            ..*self
        }
    }
}

/// A row that can take part in a leaderboard pass.
pub trait Standing {
    fn efficiency(&self) -> f64;
    fn bins_counted(&self) -> i32;
    fn username(&self) -> &str;
    fn set_ranking(&mut self, rank: i32);
}

/// Sort by efficiency descending, keep the first `limit` rows and rank them 1..n.
pub fn rank_window<T: Standing>(mut rows: Vec<T>, limit: usize) -> Vec<T> {
    rows.sort_by(|a, b| {
        b.efficiency()
            .total_cmp(&a.efficiency())
            .then_with(|| b.bins_counted().cmp(&a.bins_counted()))
            .then_with(|| a.username().cmp(b.username()))
    });
    rows.truncate(limit);
    for (position, row) in rows.iter_mut().enumerate() {
        row.set_ranking(i32::try_from(position + 1).unwrap_or(i32::MAX));
    }
    rows
}
