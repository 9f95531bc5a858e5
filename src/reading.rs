//! Battery telemetry records.
//!
//! One [`BatteryReading`] is appended per polling cycle, either from the
//! `Battery-Voltage` header a device sends in BYOS mode or from the cloud
//! API's device telemetry. The trend analyzer treats readings as read-only
//! input; this module also owns the LiPo voltage-to-percent curve used when
//! only a raw voltage is available.

use serde::{Deserialize, Serialize};

/// LiPo battery minimum voltage in millivolts (0%)
pub const BATTERY_MIN_MV: u32 = 3000;

/// LiPo battery maximum voltage in millivolts (100%)
pub const BATTERY_MAX_MV: u32 = 4200;

/// Convert battery voltage (in millivolts) to a fractional percentage.
///
/// Uses the standard LiPo voltage curve: 3.0V (0%) to 4.2V (100%),
/// clamped at both ends.
///
/// # Example
///
/// ```
/// use trmnl_battery::voltage_to_percent;
///
/// assert_eq!(voltage_to_percent(4200), 100.0);
/// assert_eq!(voltage_to_percent(3600), 50.0);
/// assert_eq!(voltage_to_percent(3000), 0.0);
/// ```
pub fn voltage_to_percent(voltage_mv: u32) -> f64 {
    if voltage_mv <= BATTERY_MIN_MV {
        0.0
    } else if voltage_mv >= BATTERY_MAX_MV {
        100.0
    } else {
        f64::from(voltage_mv - BATTERY_MIN_MV) * 100.0 / f64::from(BATTERY_MAX_MV - BATTERY_MIN_MV)
    }
}

/// A single battery telemetry sample for one device.
///
/// Timestamps are epoch milliseconds, matching what the store persists.
/// `battery_voltage` is informational passthrough; the analysis itself only
/// looks at `percent_charged` and `timestamp_ms`.
///
/// # Example
///
/// ```
/// use trmnl_battery::BatteryReading;
///
/// let reading = BatteryReading::new("AA:BB:CC:DD:EE:FF", 1_700_000_000_000, 87.5)
///     .with_voltage(4.05);
///
/// assert_eq!(reading.percent_charged, 87.5);
/// assert!(reading.is_well_formed());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    /// Device identifier (MAC address in BYOS mode)
    pub device_id: String,

    /// Sample time, milliseconds since epoch
    pub timestamp_ms: i64,

    /// Battery charge in percent, 0.0 to 100.0
    pub percent_charged: f64,

    /// Raw battery voltage in volts, if the source reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f32>,
}

impl BatteryReading {
    /// Create a new reading from an already-known percentage.
    pub fn new(device_id: impl Into<String>, timestamp_ms: i64, percent_charged: f64) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp_ms,
            percent_charged,
            battery_voltage: None,
        }
    }

    /// Create a reading from a raw voltage (in volts, e.g. "4.2" from the
    /// `Battery-Voltage` header), deriving the percentage from the LiPo curve.
    pub fn from_voltage(device_id: impl Into<String>, timestamp_ms: i64, voltage: f32) -> Self {
        let voltage_mv = (voltage * 1000.0) as u32;
        Self {
            device_id: device_id.into(),
            timestamp_ms,
            percent_charged: voltage_to_percent(voltage_mv),
            battery_voltage: Some(voltage),
        }
    }

    /// Attach the raw voltage as passthrough.
    #[must_use]
    pub fn with_voltage(mut self, voltage: f32) -> Self {
        self.battery_voltage = Some(voltage);
        self
    }

    /// Check that this reading is safe to hand to the analyzer.
    ///
    /// The analyzer does not validate input; malformed readings must be
    /// rejected before they reach the store.
    pub fn is_well_formed(&self) -> bool {
        self.malformed_reason().is_none()
    }

    pub(crate) fn malformed_reason(&self) -> Option<&'static str> {
        if self.timestamp_ms < 0 {
            return Some("negative timestamp");
        }
        if !self.percent_charged.is_finite() {
            return Some("non-finite percentage");
        }
        if !(0.0..=100.0).contains(&self.percent_charged) {
            return Some("percentage outside 0..=100");
        }
        if let Some(v) = self.battery_voltage {
            if !v.is_finite() {
                return Some("non-finite voltage");
            }
        }
        None
    }
}
