//! In-memory per-device reading store.
//!
//! One reading is recorded per polling cycle; readings are kept sorted by
//! timestamp per device. This mirrors the query shape a persistent store
//! would expose (by device, by time range) so the analyzer can be driven the
//! same way against either. Durable persistence is the host application's
//! concern; [`BatteryReading`] serializes with serde for that purpose.

use std::collections::HashMap;

use crate::error::Error;
use crate::reading::BatteryReading;
use crate::trend::{self, BatteryPrediction, ClearHistoryReason};

/// Battery reading history for any number of devices.
///
/// # Example
///
/// ```
/// use trmnl_battery::{BatteryHistory, BatteryReading};
///
/// let mut history = BatteryHistory::new();
/// history.record(BatteryReading::new("AA:BB", 0, 90.0))?;
/// history.record(BatteryReading::new("AA:BB", 86_400_000, 80.0))?;
///
/// assert_eq!(history.len("AA:BB"), 2);
/// # Ok::<(), trmnl_battery::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct BatteryHistory {
    devices: HashMap<String, Vec<BatteryReading>>,
}

impl BatteryHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one reading, keeping the device's history sorted by timestamp.
    ///
    /// Readings sharing a timestamp keep arrival order. Malformed readings
    /// are rejected here so they never reach the analyzer.
    pub fn record(&mut self, reading: BatteryReading) -> Result<(), Error> {
        if let Some(reason) = reading.malformed_reason() {
            return Err(Error::InvalidReading {
                reason: reason.to_string(),
            });
        }

        let readings = self.devices.entry(reading.device_id.clone()).or_default();
        let at = readings.partition_point(|r| r.timestamp_ms <= reading.timestamp_ms);
        readings.insert(at, reading);
        Ok(())
    }

    /// All readings for a device, oldest first. Empty if unknown.
    pub fn readings(&self, device_id: &str) -> &[BatteryReading] {
        self.devices.get(device_id).map_or(&[], Vec::as_slice)
    }

    /// Readings for a device within `[from_ms, to_ms)`.
    pub fn readings_between(&self, device_id: &str, from_ms: i64, to_ms: i64) -> &[BatteryReading] {
        let readings = self.readings(device_id);
        let start = readings.partition_point(|r| r.timestamp_ms < from_ms);
        let end = readings.partition_point(|r| r.timestamp_ms < to_ms);
        &readings[start..end]
    }

    /// Number of readings recorded for a device.
    pub fn len(&self, device_id: &str) -> usize {
        self.readings(device_id).len()
    }

    /// Whether a device has no recorded readings.
    pub fn is_empty(&self, device_id: &str) -> bool {
        self.readings(device_id).is_empty()
    }

    /// Devices with at least one reading.
    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.devices
            .iter()
            .filter(|(_, readings)| !readings.is_empty())
            .map(|(id, _)| id.as_str())
    }

    /// Drop all readings for a device, returning how many were removed.
    pub fn clear_device(&mut self, device_id: &str) -> usize {
        self.devices.remove(device_id).map_or(0, |r| r.len())
    }

    /// Purge a device's history if it can no longer back a forecast.
    ///
    /// Runs the clear-history classification; on a hit the history is
    /// dropped and the reason returned. Meant to run after each polling
    /// cycle so a charge event or stale data never corrupts the next
    /// prediction.
    pub fn clear_if_unreliable(
        &mut self,
        device_id: &str,
        now_ms: i64,
    ) -> Option<ClearHistoryReason> {
        let reason = trend::clear_history_reason(self.readings(device_id), now_ms)?;
        let removed = self.clear_device(device_id);
        tracing::info!(device_id, ?reason, removed, "cleared battery history");
        Some(reason)
    }

    /// Forecast depletion for a device from its recorded history.
    pub fn predict(&self, device_id: &str, now_ms: i64) -> Option<BatteryPrediction> {
        trend::predict_battery_depletion(self.readings(device_id), now_ms)
    }
}
