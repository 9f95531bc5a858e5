//! Battery trend analysis: charge detection, staleness, depletion forecasting.
//!
//! All operations here are pure functions over a slice of readings plus an
//! injected `now_ms`. They never read the wall clock, never mutate their
//! input, and signal "insufficient signal" with `None` rather than an error -
//! no prediction is better than a wrong one.
//!
//! The forecast works on the longest *drainage run*: a maximal subsequence of
//! time-ordered readings that is monotonically non-increasing in percentage.
//! A jump of more than [`CHARGING_THRESHOLD_PERCENT`] points between
//! consecutive readings is treated as a charge cycle and ends the run; the
//! fit is an ordinary least-squares line over the winning run.
//!
//! # Example
//!
//! ```
//! use trmnl_battery::{predict_battery_depletion, BatteryReading};
//!
//! const DAY_MS: i64 = 86_400_000;
//! let readings: Vec<_> = [90.0, 80.0, 70.0, 60.0]
//!     .iter()
//!     .enumerate()
//!     .map(|(day, &pct)| BatteryReading::new("dev", day as i64 * DAY_MS, pct))
//!     .collect();
//!
//! let prediction = predict_battery_depletion(&readings, 3 * DAY_MS).unwrap();
//! assert_eq!(prediction.data_points_used, 4);
//! assert!((prediction.drainage_rate_percent_per_day - 10.0).abs() < 1e-9);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reading::BatteryReading;

/// Upward jump between consecutive readings treated as a charge cycle
/// rather than sensor noise, in percentage points.
pub const CHARGING_THRESHOLD_PERCENT: f64 = 50.0;

/// Age beyond which history is considered unrepresentative of current
/// usage: 183 days (~6 months) in milliseconds.
pub const STALE_DATA_THRESHOLD_MS: i64 = 183 * 24 * 60 * 60 * 1000;

/// Milliseconds per day, as a float for day-unit regression math.
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// Minimum samples required before any depletion forecast is attempted.
pub const MIN_READINGS_FOR_PREDICTION: usize = 3;

/// Forecasts further out than this are treated as noise-dominated fits.
pub const MAX_FORECAST_DAYS: f64 = 1825.0;

/// Why a device's battery history should be purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearHistoryReason {
    /// A charge cycle was detected; the pre-charge trend no longer
    /// predicts future depletion.
    ChargingDetected,

    /// The oldest reading is past the freshness horizon.
    StaleData,

    /// Both of the above.
    Both,
}

/// A depletion forecast computed from a drainage run.
///
/// Ephemeral: computed per call from caller-supplied readings, never
/// persisted by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryPrediction {
    /// Absolute predicted time the battery reaches 0%, epoch milliseconds
    pub depletion_time_ms: i64,

    /// Average percent lost per day over the selected drainage run
    pub drainage_rate_percent_per_day: f64,

    /// Number of samples contributing to the regression
    pub data_points_used: usize,
}

impl BatteryPrediction {
    /// Predicted depletion time as a UTC datetime, for display layers.
    pub fn depletion_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.depletion_time_ms).unwrap_or_default()
    }

    /// Format the remaining time as human-readable text.
    ///
    /// Whole days remaining are decomposed into flat 30-day months, weeks,
    /// and days; zero-valued units are omitted unless nothing else remains.
    ///
    /// # Example
    ///
    /// ```
    /// use trmnl_battery::BatteryPrediction;
    ///
    /// let prediction = BatteryPrediction {
    ///     depletion_time_ms: 95 * 86_400_000,
    ///     drainage_rate_percent_per_day: 1.0,
    ///     data_points_used: 4,
    /// };
    /// assert_eq!(prediction.format_time_remaining(0), "3 months, 5 days");
    /// ```
    pub fn format_time_remaining(&self, now_ms: i64) -> String {
        let remaining_ms = self.depletion_time_ms - now_ms;
        if remaining_ms <= 0 {
            return "Battery depleted".to_string();
        }

        let total_days = remaining_ms / MS_PER_DAY as i64;
        let months = total_days / 30;
        let weeks = (total_days % 30) / 7;
        let days = (total_days % 30) % 7;

        let mut parts = Vec::new();
        if months > 0 {
            parts.push(pluralize(months, "month"));
        }
        if weeks > 0 {
            parts.push(pluralize(weeks, "week"));
        }
        if days > 0 || parts.is_empty() {
            parts.push(pluralize(days, "day"));
        }
        parts.join(", ")
    }
}

fn pluralize(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Sort readings by timestamp ascending without touching the input.
///
/// The sort is stable, so readings sharing a timestamp keep list order.
fn sorted_by_time(readings: &[BatteryReading]) -> Vec<&BatteryReading> {
    let mut sorted: Vec<&BatteryReading> = readings.iter().collect();
    sorted.sort_by_key(|r| r.timestamp_ms);
    sorted
}

/// Check whether a charge cycle occurred anywhere in the history.
///
/// True iff some pair of consecutive readings (in time order) rises by more
/// than [`CHARGING_THRESHOLD_PERCENT`] points. Order of the input slice does
/// not matter; zero or one readings are trivially false.
pub fn has_charging_event(readings: &[BatteryReading]) -> bool {
    sorted_by_time(readings)
        .windows(2)
        .any(|pair| pair[1].percent_charged - pair[0].percent_charged > CHARGING_THRESHOLD_PERCENT)
}

/// Check whether the oldest reading is past the freshness horizon.
///
/// Empty histories are not stale. `now_ms` is injected so callers stay in
/// control of the clock.
pub fn has_stale_data(readings: &[BatteryReading], now_ms: i64) -> bool {
    match readings.iter().map(|r| r.timestamp_ms).min() {
        Some(oldest) => now_ms - oldest > STALE_DATA_THRESHOLD_MS,
        None => false,
    }
}

/// Whether the history should be purged before it corrupts future forecasts.
pub fn should_clear_history(readings: &[BatteryReading], now_ms: i64) -> bool {
    has_charging_event(readings) || has_stale_data(readings, now_ms)
}

/// Classify why the history should be purged, or `None` if it is still good.
pub fn clear_history_reason(
    readings: &[BatteryReading],
    now_ms: i64,
) -> Option<ClearHistoryReason> {
    let charging = has_charging_event(readings);
    let stale = has_stale_data(readings, now_ms);
    match (charging, stale) {
        (true, true) => Some(ClearHistoryReason::Both),
        (true, false) => Some(ClearHistoryReason::ChargingDetected),
        (false, true) => Some(ClearHistoryReason::StaleData),
        (false, false) => None,
    }
}

/// Walk the time-ordered readings and return the longest drainage run.
///
/// The walk carries a current run and the best run seen so far:
/// - a jump over the charging threshold closes the current run (keeping it
///   as best only if strictly longer) and starts a new run at the
///   post-charge reading;
/// - a non-increasing reading extends the current run;
/// - a small increase is dropped entirely - neither appended nor a new
///   run start.
fn longest_drainage_run<'a>(sorted: &[&'a BatteryReading]) -> Vec<&'a BatteryReading> {
    let Some(&first) = sorted.first() else {
        return Vec::new();
    };

    let mut best: Vec<&BatteryReading> = Vec::new();
    let mut current: Vec<&BatteryReading> = vec![first];
    let mut last_kept = first;

    for pair in sorted.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.percent_charged - prev.percent_charged > CHARGING_THRESHOLD_PERCENT {
            if current.len() > best.len() {
                best = current;
            }
            current = vec![next];
            last_kept = next;
        } else if next.percent_charged <= last_kept.percent_charged {
            current.push(next);
            last_kept = next;
        }
        // Small rise: noise, dropped from the run.
    }

    if current.len() > best.len() {
        best = current;
    }
    best
}

/// Predict when the battery reaches 0%, or `None` if there is no usable
/// signal.
///
/// Fits an ordinary least-squares line (percent against days elapsed) over
/// the longest drainage run and extrapolates to the zero crossing. Returns
/// `None` when:
/// - fewer than [`MIN_READINGS_FOR_PREDICTION`] readings exist, or the
///   longest drainage run has fewer points than that;
/// - the fitted slope is non-negative (battery not draining);
/// - the fitted zero crossing is not in the future relative to `now_ms`;
/// - the forecast lies more than [`MAX_FORECAST_DAYS`] out.
pub fn predict_battery_depletion(
    readings: &[BatteryReading],
    now_ms: i64,
) -> Option<BatteryPrediction> {
    if readings.len() < MIN_READINGS_FOR_PREDICTION {
        return None;
    }

    let sorted = sorted_by_time(readings);
    let run = longest_drainage_run(&sorted);
    if run.len() < MIN_READINGS_FOR_PREDICTION {
        tracing::debug!(
            run_len = run.len(),
            "longest drainage run too short for regression"
        );
        return None;
    }

    let first_ts = run[0].timestamp_ms;
    let n = run.len() as f64;

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;
    for reading in &run {
        let x = (reading.timestamp_ms - first_ts) as f64 / MS_PER_DAY;
        let y = reading.percent_charged;
        sum_x += x;
        sum_y += y;
        sum_xx += x * x;
        sum_xy += x * y;
    }

    let denom = n * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        // All run timestamps coincide; the fit is undefined.
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;

    if slope >= 0.0 {
        tracing::debug!(slope, "battery not decreasing over drainage run");
        return None;
    }

    let days_until_depleted = -intercept / slope;
    if days_until_depleted <= 0.0 {
        return None;
    }

    let current_days_elapsed = (now_ms - first_ts) as f64 / MS_PER_DAY;
    let remaining_days = days_until_depleted - current_days_elapsed;
    if remaining_days <= 0.0 || remaining_days > MAX_FORECAST_DAYS {
        tracing::debug!(remaining_days, "forecast outside plausible window");
        return None;
    }

    Some(BatteryPrediction {
        depletion_time_ms: now_ms + (remaining_days * MS_PER_DAY) as i64,
        drainage_rate_percent_per_day: -slope,
        data_points_used: run.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 86_400_000;

    fn reading(timestamp_ms: i64, percent: f64) -> BatteryReading {
        BatteryReading::new("AA:BB:CC:DD:EE:FF", timestamp_ms, percent)
    }

    fn daily(percents: &[f64]) -> Vec<BatteryReading> {
        percents
            .iter()
            .enumerate()
            .map(|(day, &pct)| reading(day as i64 * DAY_MS, pct))
            .collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_charging_event_detection() {
        assert!(!has_charging_event(&[]));
        assert!(!has_charging_event(&[reading(0, 50.0)]));

        // Steady drain, no event
        assert!(!has_charging_event(&daily(&[90.0, 80.0, 70.0])));

        // 15% -> 95% jump
        assert!(has_charging_event(&daily(&[20.0, 15.0, 95.0, 85.0])));

        // Exactly 50 points is not an event; just over is
        assert!(!has_charging_event(&daily(&[40.0, 90.0])));
        assert!(has_charging_event(&daily(&[40.0, 90.1])));
    }

    #[test]
    fn test_charging_event_order_independent() {
        let mut readings = daily(&[20.0, 15.0, 95.0, 85.0]);
        readings.reverse();
        assert!(has_charging_event(&readings));

        // Unsorted input must not fabricate an event
        let shuffled = vec![reading(2 * DAY_MS, 70.0), reading(0, 90.0), reading(DAY_MS, 80.0)];
        assert!(!has_charging_event(&shuffled));
    }

    #[test]
    fn test_stale_data() {
        let now = 400 * DAY_MS;
        assert!(!has_stale_data(&[], now));

        // Oldest reading 200 days old: stale
        assert!(has_stale_data(&[reading(200 * DAY_MS, 50.0)], now));

        // Oldest reading 100 days old: fresh
        assert!(!has_stale_data(&[reading(300 * DAY_MS, 50.0)], now));

        // Exactly at the horizon is not stale
        assert!(!has_stale_data(
            &[reading(now - STALE_DATA_THRESHOLD_MS, 50.0)],
            now
        ));
        assert!(has_stale_data(
            &[reading(now - STALE_DATA_THRESHOLD_MS - 1, 50.0)],
            now
        ));
    }

    #[test]
    fn test_clear_history_reason() {
        let now = 400 * DAY_MS;

        assert_eq!(clear_history_reason(&[], now), None);
        assert_eq!(clear_history_reason(&daily(&[90.0, 85.0]), 2 * DAY_MS), None);

        // Charging only
        assert_eq!(
            clear_history_reason(&daily(&[20.0, 95.0]), 2 * DAY_MS),
            Some(ClearHistoryReason::ChargingDetected)
        );

        // Stale only
        assert_eq!(
            clear_history_reason(&[reading(0, 90.0), reading(DAY_MS, 85.0)], now),
            Some(ClearHistoryReason::StaleData)
        );

        // Both
        assert_eq!(
            clear_history_reason(&[reading(0, 20.0), reading(DAY_MS, 95.0)], now),
            Some(ClearHistoryReason::Both)
        );
    }

    #[test]
    fn test_should_clear_history_matches_reason() {
        let now = 400 * DAY_MS;
        let cases = [
            daily(&[90.0, 85.0]),
            daily(&[20.0, 95.0]),
            vec![reading(0, 90.0)],
            vec![],
        ];
        for readings in &cases {
            assert_eq!(
                should_clear_history(readings, now),
                clear_history_reason(readings, now).is_some()
            );
        }
    }

    #[test]
    fn test_prediction_linear_drain() {
        // 10%/day from 90%: fit crosses zero at day 9
        let readings = daily(&[90.0, 80.0, 70.0, 60.0]);
        let now = 3 * DAY_MS;

        let prediction = predict_battery_depletion(&readings, now).unwrap();
        assert_eq!(prediction.data_points_used, 4);
        assert_close(prediction.drainage_rate_percent_per_day, 10.0);
        assert_eq!(prediction.depletion_time_ms, 9 * DAY_MS);
    }

    #[test]
    fn test_prediction_requires_three_readings() {
        assert!(predict_battery_depletion(&[], 0).is_none());
        assert!(predict_battery_depletion(&daily(&[90.0]), DAY_MS).is_none());
        assert!(predict_battery_depletion(&daily(&[90.0, 80.0]), DAY_MS).is_none());
    }

    #[test]
    fn test_prediction_uses_post_charge_run() {
        // Charge jump at day 2: pre-charge run has 2 points, post-charge 3
        let readings = daily(&[20.0, 15.0, 95.0, 85.0, 75.0]);
        let now = 4 * DAY_MS;

        assert!(has_charging_event(&readings));
        let prediction = predict_battery_depletion(&readings, now).unwrap();
        assert_eq!(prediction.data_points_used, 3);
        assert_close(prediction.drainage_rate_percent_per_day, 10.0);
    }

    #[test]
    fn test_prediction_short_run_rejected() {
        // Charge jumps every other day: no run reaches 3 points
        let readings = daily(&[20.0, 15.0, 95.0, 90.0]);
        assert!(predict_battery_depletion(&readings, 3 * DAY_MS).is_none());
    }

    #[test]
    fn test_prediction_non_decreasing_rejected() {
        // Flat percentages fit slope 0
        let readings = daily(&[80.0, 80.0, 80.0, 80.0]);
        assert!(predict_battery_depletion(&readings, 3 * DAY_MS).is_none());
    }

    #[test]
    fn test_prediction_small_rise_dropped_from_run() {
        // The 71% bump is below the charging threshold: dropped, not a new
        // run, so the fit still sees a clean 10%/day drain.
        let readings = vec![
            reading(0, 90.0),
            reading(DAY_MS, 80.0),
            reading(2 * DAY_MS, 70.0),
            reading(2 * DAY_MS + DAY_MS / 2, 71.0),
            reading(3 * DAY_MS, 60.0),
        ];
        let prediction = predict_battery_depletion(&readings, 3 * DAY_MS).unwrap();
        assert_eq!(prediction.data_points_used, 4);
        assert_close(prediction.drainage_rate_percent_per_day, 10.0);
    }

    #[test]
    fn test_prediction_already_past_rejected() {
        // Depletion fits at day 9; asking at day 20 is in the past
        let readings = daily(&[90.0, 80.0, 70.0, 60.0]);
        assert!(predict_battery_depletion(&readings, 20 * DAY_MS).is_none());
    }

    #[test]
    fn test_prediction_unrealistic_horizon_rejected() {
        // ~0.01%/day drain: zero crossing millennia out
        let readings = daily(&[90.0, 89.99, 89.98]);
        assert!(predict_battery_depletion(&readings, 2 * DAY_MS).is_none());
    }

    #[test]
    fn test_prediction_coincident_timestamps_rejected() {
        let readings = vec![reading(0, 90.0), reading(0, 80.0), reading(0, 70.0)];
        assert!(predict_battery_depletion(&readings, DAY_MS).is_none());
    }

    #[test]
    fn test_prediction_idempotent_and_input_untouched() {
        let readings = vec![reading(2 * DAY_MS, 70.0), reading(0, 90.0), reading(DAY_MS, 80.0)];
        let snapshot = readings.clone();
        let now = 2 * DAY_MS;

        let first = predict_battery_depletion(&readings, now);
        let second = predict_battery_depletion(&readings, now);
        assert_eq!(first, second);
        assert_eq!(readings, snapshot);
    }

    #[test]
    fn test_format_time_remaining() {
        let at = |days: i64| BatteryPrediction {
            depletion_time_ms: days * DAY_MS,
            drainage_rate_percent_per_day: 1.0,
            data_points_used: 3,
        };

        // 95 days: 3 months + 5 days, zero weeks omitted
        assert_eq!(at(95).format_time_remaining(0), "3 months, 5 days");
        // 90 days: exactly 3 months
        assert_eq!(at(90).format_time_remaining(0), "3 months");
        // 40 days: 1 month, 1 week, 3 days
        assert_eq!(at(40).format_time_remaining(0), "1 month, 1 week, 3 days");
        // 6 days
        assert_eq!(at(6).format_time_remaining(0), "6 days");
        // 1 day
        assert_eq!(at(1).format_time_remaining(0), "1 day");
        // Under a day still shows a days part
        let half_day = BatteryPrediction {
            depletion_time_ms: DAY_MS / 2,
            drainage_rate_percent_per_day: 1.0,
            data_points_used: 3,
        };
        assert_eq!(half_day.format_time_remaining(0), "0 days");
    }

    #[test]
    fn test_format_time_remaining_depleted() {
        let prediction = BatteryPrediction {
            depletion_time_ms: 1000,
            drainage_rate_percent_per_day: 1.0,
            data_points_used: 3,
        };
        assert_eq!(prediction.format_time_remaining(1000), "Battery depleted");
        assert_eq!(prediction.format_time_remaining(2000), "Battery depleted");
    }

    #[test]
    fn test_clear_history_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&ClearHistoryReason::ChargingDetected).unwrap(),
            "\"charging_detected\""
        );
        assert_eq!(
            serde_json::to_string(&ClearHistoryReason::StaleData).unwrap(),
            "\"stale_data\""
        );
        assert_eq!(
            serde_json::to_string(&ClearHistoryReason::Both).unwrap(),
            "\"both\""
        );
    }

    #[test]
    fn test_prediction_serialization() {
        let prediction = BatteryPrediction {
            depletion_time_ms: 9 * DAY_MS,
            drainage_rate_percent_per_day: 10.0,
            data_points_used: 4,
        };
        let json = serde_json::to_string(&prediction).unwrap();
        assert!(json.contains("\"depletion_time_ms\":777600000000"));
        assert!(json.contains("\"data_points_used\":4"));

        let back: BatteryPrediction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prediction);
    }
}
