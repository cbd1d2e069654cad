//! Historical baseline: the average surfer count observed at a given hour.

use crate::history::HistoryError;

/// Averages below this are treated as "no usable data".
pub const MIN_MEANINGFUL_AVERAGE: f64 = 1.0;
pub const NIGHT_BASELINE: f64 = 0.0;
pub const DAY_BASELINE: f64 = 1.0;

/// Read-only access to aggregated surfer counts.
pub trait HistoricalSource: Send + Sync + std::fmt::Debug {
    /// Average count over all observations whose timestamp falls in `hour`.
    ///
    /// Returns `Ok(None)` when no rows match.
    fn average_count_for_hour(&self, hour: u8) -> Result<Option<f64>, HistoryError>;
}

/// Night window, 22:00 through 05:59, wrapping midnight.
pub fn is_night_hour(hour: u8) -> bool {
    hour >= 22 || hour <= 5
}

pub fn baseline_for_hour(source: &dyn HistoricalSource, hour: u8) -> Result<f64, HistoryError> {
    match source.average_count_for_hour(hour)? {
        Some(avg) if avg >= MIN_MEANINGFUL_AVERAGE => Ok(avg),
        _ if is_night_hour(hour) => Ok(NIGHT_BASELINE),
        // Keeps the rule-based estimate from multiplying out to zero during the day.
        _ => Ok(DAY_BASELINE),
    }
}
