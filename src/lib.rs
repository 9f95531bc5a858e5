//! # trmnl-battery
//!
//! Battery telemetry history and depletion forecasting for
//! [TRMNL](https://usetrmnl.com) e-ink displays.
//!
//! TRMNL devices report battery state with every poll (the `Battery-Voltage`
//! header in BYOS mode, or device telemetry from the cloud API). This crate
//! turns that stream of per-device readings into answers a companion app can
//! act on:
//!
//! - **Charge detection**: did a charge cycle happen anywhere in the history?
//! - **Staleness**: is the history too old to describe current usage?
//! - **Depletion forecast**: when does the battery hit 0%, fitted by linear
//!   regression over the longest contiguous drainage run?
//!
//! Every operation is a pure function over a slice of readings plus an
//! injected `now` in epoch milliseconds. Nothing here reads the wall clock,
//! performs I/O, or keeps hidden state, so calls are safe from any thread
//! and trivially testable. Forecasts that can't be trusted come back as
//! `None`, never as an error.
//!
//! ## Quick start
//!
//! ```
//! use trmnl_battery::{BatteryHistory, BatteryReading};
//!
//! const DAY_MS: i64 = 86_400_000;
//!
//! let mut history = BatteryHistory::new();
//! for (day, pct) in [90.0, 80.0, 70.0, 60.0].iter().enumerate() {
//!     let reading = BatteryReading::new("AA:BB:CC:DD:EE:FF", day as i64 * DAY_MS, *pct);
//!     history.record(reading)?;
//! }
//!
//! let now_ms = 3 * DAY_MS;
//! if history.clear_if_unreliable("AA:BB:CC:DD:EE:FF", now_ms).is_none() {
//!     if let Some(prediction) = history.predict("AA:BB:CC:DD:EE:FF", now_ms) {
//!         // "6 days"
//!         println!("{}", prediction.format_time_remaining(now_ms));
//!     }
//! }
//! # Ok::<(), trmnl_battery::Error>(())
//! ```
//!
//! ## Polling loop
//!
//! The intended shape is one [`BatteryHistory::record`] per polling cycle,
//! followed by [`BatteryHistory::clear_if_unreliable`]: a charge event makes
//! the pre-charge trend meaningless for forecasting, and readings older than
//! ~6 months no longer describe current usage, so either condition purges the
//! device's history before the next fit.

mod error;
mod history;
mod reading;
mod trend;

pub use error::Error;
pub use history::BatteryHistory;
pub use reading::{voltage_to_percent, BatteryReading, BATTERY_MAX_MV, BATTERY_MIN_MV};
pub use trend::{
    clear_history_reason, has_charging_event, has_stale_data, predict_battery_depletion,
    should_clear_history, BatteryPrediction, ClearHistoryReason, CHARGING_THRESHOLD_PERCENT,
    MAX_FORECAST_DAYS, MIN_READINGS_FOR_PREDICTION, MS_PER_DAY, STALE_DATA_THRESHOLD_MS,
};
