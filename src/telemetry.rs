//! Telemetry payload format and the remote-side batch transmitter.
//!
//! A telemetry payload is UTF-8 text of comma separated `key:value`
//! pairs drawn from a closed key set. Integer keys are emitted without a
//! decimal point, `tv` with two decimals, and the literal `nan` means
//! "sensor absent or disabled". Receivers must ignore unknown keys, so
//! the set can grow without flag days.

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use heapless::{String, Vec};

use crate::config::NodeId;
use crate::link::LinkEngine;
use crate::protocol::MAX_PAYLOAD_LEN;
use crate::radio::RadioDriver;

pub const MAX_BATCH_READINGS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryKey {
    /// `batt`, battery percent 0..100.
    BatteryPercent,
    /// `pd`, pulses counted since the previous report.
    PulseDelta,
    /// `tv`, cumulative total volume in liters.
    TotalVolume,
    /// `ec`, the remote's local error count.
    ErrorCount,
    /// `tsr`, seconds since the remote's last daily reset.
    TimeSinceReset,
}

impl TelemetryKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryKey::BatteryPercent => "batt",
            TelemetryKey::PulseDelta => "pd",
            TelemetryKey::TotalVolume => "tv",
            TelemetryKey::ErrorCount => "ec",
            TelemetryKey::TimeSinceReset => "tsr",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "batt" => Some(TelemetryKey::BatteryPercent),
            "pd" => Some(TelemetryKey::PulseDelta),
            "tv" => Some(TelemetryKey::TotalVolume),
            "ec" => Some(TelemetryKey::ErrorCount),
            "tsr" => Some(TelemetryKey::TimeSinceReset),
            _ => None,
        }
    }

    /// Only `tv` carries decimals on the wire.
    pub fn is_float(&self) -> bool {
        matches!(self, TelemetryKey::TotalVolume)
    }
}

/// One sensor value headed for the wire. NaN encodes absent/disabled.
#[derive(Debug, Clone, Copy)]
pub struct Reading {
    pub key: TelemetryKey,
    pub value: f32,
}

impl Reading {
    pub fn new(key: TelemetryKey, value: f32) -> Self {
        Self { key, value }
    }

    pub fn absent(key: TelemetryKey) -> Self {
        Self {
            key,
            value: f32::NAN,
        }
    }
}

/// Formats a batch as `k1:v1,k2:v2,...`. `None` when the result would not
/// fit a single frame payload; there is no splitting.
pub fn format_batch(readings: &[Reading]) -> Option<String<MAX_PAYLOAD_LEN>> {
    let mut out: String<MAX_PAYLOAD_LEN> = String::new();
    for (i, reading) in readings.iter().enumerate() {
        if i > 0 {
            out.push(',').ok()?;
        }
        out.push_str(reading.key.as_str()).ok()?;
        out.push(':').ok()?;
        if reading.value.is_nan() {
            out.push_str("nan").ok()?;
        } else if reading.key.is_float() {
            write!(out, "{:.2}", reading.value).ok()?;
        } else {
            write!(out, "{}", reading.value as u32).ok()?;
        }
    }
    Some(out)
}

/// Relay-side view of one parsed payload. A field stays `None` when the
/// key was missing, `nan`, or unparseable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParsedTelemetry {
    pub battery_percent: Option<u32>,
    pub pulse_delta: Option<u32>,
    pub total_volume: Option<f32>,
    pub error_count: Option<u32>,
    pub time_since_reset_sec: Option<u32>,
}

pub fn parse_payload(text: &str) -> ParsedTelemetry {
    let mut parsed = ParsedTelemetry::default();
    for pair in text.split(',') {
        let Some((key_str, value_str)) = pair.split_once(':') else {
            continue;
        };
        // Unknown keys are future extensions, skip without complaint.
        let Some(key) = TelemetryKey::from_str(key_str) else {
            continue;
        };
        if value_str == "nan" {
            continue;
        }
        match key {
            TelemetryKey::BatteryPercent => parsed.battery_percent = value_str.parse().ok(),
            TelemetryKey::PulseDelta => parsed.pulse_delta = value_str.parse().ok(),
            TelemetryKey::TotalVolume => parsed.total_volume = value_str.parse().ok(),
            TelemetryKey::ErrorCount => parsed.error_count = value_str.parse().ok(),
            TelemetryKey::TimeSinceReset => parsed.time_since_reset_sec = value_str.parse().ok(),
        }
    }
    parsed
}

/// Accumulates one batch of readings and hands it to the link when the
/// node is connected and the radio is free. A single buffer, not a
/// queue: a new batch is accepted only once the previous one has been
/// handed over.
pub struct BatchTransmitter {
    master_id: NodeId,
    batch: Vec<Reading, MAX_BATCH_READINGS>,
}

impl BatchTransmitter {
    pub fn new(master_id: NodeId) -> Self {
        Self {
            master_id,
            batch: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Append one reading to the in-progress batch.
    pub fn add_reading(&mut self, reading: Reading) -> bool {
        if self.batch.push(reading).is_err() {
            log::warn!("[batch] buffer full, reading dropped");
            return false;
        }
        true
    }

    /// Stage a whole batch at once. Refused while the previous batch is
    /// still waiting for the link.
    pub fn queue_batch(&mut self, readings: &[Reading]) -> bool {
        if !self.batch.is_empty() {
            return false;
        }
        for reading in readings {
            if !self.add_reading(*reading) {
                self.batch.clear();
                return false;
            }
        }
        true
    }

    /// Called from the scheduler. Submits the pending batch when the link
    /// is connected and idle; keeps it for the next round otherwise.
    /// Oversized batches are dropped whole, there is no splitting.
    pub fn update<R, D>(&mut self, _now: u32, link: &mut LinkEngine<R, D>) -> bool
    where
        R: RadioDriver,
        D: DelayNs,
    {
        if self.batch.is_empty() {
            return false;
        }
        if !link.is_connected() || !link.is_ready_for_tx() {
            return false;
        }

        let Some(payload) = format_batch(&self.batch) else {
            log::warn!("[batch] formatted batch exceeds payload limit, dropped");
            self.batch.clear();
            return false;
        };

        if link.send_data(self.master_id, payload.as_bytes(), true) {
            log::debug!("[batch] queued telemetry '{}'", payload.as_str());
            self.batch.clear();
            true
        } else {
            // Outbox contention; the batch stays for the next update.
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mixed_batch() {
        let readings = [
            Reading::new(TelemetryKey::BatteryPercent, 73.0),
            Reading::new(TelemetryKey::PulseDelta, 9.0),
            Reading::new(TelemetryKey::TotalVolume, 0.02),
            Reading::new(TelemetryKey::ErrorCount, 0.0),
            Reading::new(TelemetryKey::TimeSinceReset, 10.0),
        ];
        let payload = format_batch(&readings).unwrap();
        assert_eq!(payload.as_str(), "batt:73,pd:9,tv:0.02,ec:0,tsr:10");
    }

    #[test]
    fn test_format_disabled_sensor_as_nan() {
        let readings = [
            Reading::absent(TelemetryKey::PulseDelta),
            Reading::absent(TelemetryKey::TotalVolume),
        ];
        let payload = format_batch(&readings).unwrap();
        assert_eq!(payload.as_str(), "pd:nan,tv:nan");
    }

    #[test]
    fn test_format_total_volume_two_decimals() {
        let readings = [Reading::new(TelemetryKey::TotalVolume, 1234.5)];
        assert_eq!(format_batch(&readings).unwrap().as_str(), "tv:1234.50");
    }

    #[test]
    fn test_format_overflow_is_refused() {
        // Enough large values to break the 57 byte budget.
        let readings = [
            Reading::new(TelemetryKey::TotalVolume, 99_999_999.0),
            Reading::new(TelemetryKey::ErrorCount, 4_000_000_000.0),
            Reading::new(TelemetryKey::TimeSinceReset, 4_000_000_000.0),
            Reading::new(TelemetryKey::PulseDelta, 4_000_000_000.0),
            Reading::new(TelemetryKey::BatteryPercent, 100.0),
            Reading::new(TelemetryKey::ErrorCount, 4_000_000_000.0),
        ];
        assert!(format_batch(&readings).is_none());
    }

    #[test]
    fn test_parse_full_payload() {
        let parsed = parse_payload("batt:73,pd:9,tv:0.02,ec:0,tsr:10");
        assert_eq!(parsed.battery_percent, Some(73));
        assert_eq!(parsed.pulse_delta, Some(9));
        assert_eq!(parsed.total_volume, Some(0.02));
        assert_eq!(parsed.error_count, Some(0));
        assert_eq!(parsed.time_since_reset_sec, Some(10));
    }

    #[test]
    fn test_parse_skips_nan_and_unknown_keys() {
        let parsed = parse_payload("pd:nan,humidity:55,tv:3.50,x:1");
        assert_eq!(parsed.pulse_delta, None);
        assert_eq!(parsed.battery_percent, None);
        assert_eq!(parsed.total_volume, Some(3.5));
    }

    #[test]
    fn test_parse_tolerates_garbage() {
        let parsed = parse_payload("::,,tv,pd:,:9,tv:abc,ec:7");
        assert_eq!(parsed.total_volume, None);
        assert_eq!(parsed.pulse_delta, None);
        assert_eq!(parsed.error_count, Some(7));
    }

    #[test]
    fn test_parse_empty_payload() {
        assert_eq!(parse_payload(""), ParsedTelemetry::default());
    }

    #[test]
    fn test_queue_batch_refused_while_pending() {
        let mut batch = BatchTransmitter::new(1);
        let readings = [Reading::new(TelemetryKey::PulseDelta, 4.0)];
        assert!(batch.queue_batch(&readings));
        assert!(!batch.queue_batch(&readings));
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_update_defers_while_link_busy() {
        use crate::config::{LinkConfig, NodeMode, RadioParams};
        use crate::radio::testing::{NoDelay, ScriptedRadio};
        use crate::radio::RadioEvent;

        let mut link = LinkEngine::new(
            ScriptedRadio::new(),
            NoDelay,
            RadioParams::default(),
            LinkConfig::default(),
        );
        assert!(link.begin(NodeMode::Master, 1));

        // Wedge the radio mid-transmission.
        link.radio_mut().auto_tx_done = false;
        assert!(link.send_data(2, b"x", false));
        link.tick(0);
        assert!(link.is_tx_busy());

        let mut batch = BatchTransmitter::new(2);
        assert!(batch.queue_batch(&[Reading::new(TelemetryKey::PulseDelta, 1.0)]));
        assert!(!batch.update(50, &mut link));
        assert!(!batch.is_empty());

        // Completion frees the channel and the batch is handed over.
        link.radio_mut().injected.push_back(RadioEvent::TxDone);
        link.tick(100);
        assert!(batch.update(150, &mut link));
        assert!(batch.is_empty());
    }
}
