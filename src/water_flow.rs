//! Water flow metering from a pulse output sensor (YF-S201 class).
//!
//! The interrupt handler does exactly one thing: bump a shared counter.
//! Everything else (delta accounting, volume conversion, persistence)
//! runs from the scheduler context. The snapshot-and-zero read executes
//! inside a critical section so edges landing mid-read are never lost,
//! they simply accumulate into the next read.

use core::cell::Cell;

use critical_section::Mutex;

use crate::persistence::KvStore;
use crate::telemetry::{Reading, TelemetryKey};

/// Nominal pulses per liter for the YF-S201 in this plumbing.
pub const PULSES_PER_LITER: u16 = 450;

const NAMESPACE: &str = "water_meter";
const KEY_TOTAL_PULSES: &str = "totalPulses";

/// Counter cell shared between the edge ISR and the reader. Lives in a
/// `static` so the interrupt handler can reach it.
pub struct PulseShared {
    count: Mutex<Cell<u32>>,
}

impl PulseShared {
    pub const fn new() -> Self {
        Self {
            count: Mutex::new(Cell::new(0)),
        }
    }

    /// The entire ISR body.
    #[inline]
    pub fn record_pulse(&self) {
        critical_section::with(|cs| {
            let cell = self.count.borrow(cs);
            cell.set(cell.get().wrapping_add(1));
        });
    }

    /// Snapshot and zero in one critical section.
    pub fn take(&self) -> u32 {
        critical_section::with(|cs| {
            let cell = self.count.borrow(cs);
            let snapshot = cell.get();
            cell.set(0);
            snapshot
        })
    }

    pub fn peek(&self) -> u32 {
        critical_section::with(|cs| self.count.borrow(cs).get())
    }
}

impl Default for PulseShared {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WaterFlowSensor {
    pulses: &'static PulseShared,
    enabled: bool,
    pulses_per_liter: u16,
    total_pulses: u32,
}

impl WaterFlowSensor {
    pub fn new(pulses: &'static PulseShared, enabled: bool, pulses_per_liter: u16) -> Self {
        Self {
            pulses,
            enabled,
            pulses_per_liter: if pulses_per_liter == 0 {
                PULSES_PER_LITER
            } else {
                pulses_per_liter
            },
            total_pulses: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn total_pulses(&self) -> u32 {
        self.total_pulses
    }

    pub fn total_volume_liters(&self) -> f32 {
        self.total_pulses as f32 / self.pulses_per_liter as f32
    }

    /// Restore the accumulated total after a reboot.
    pub fn load_total<P: KvStore>(&mut self, store: &mut P) {
        if !store.open(NAMESPACE) {
            log::warn!("[flow] persistence open failed, starting at zero");
            return;
        }
        self.total_pulses = store.get_u32(KEY_TOTAL_PULSES, 0);
        store.close();
        log::info!(
            "[flow] restored total: {} pulses ({:.2} L)",
            self.total_pulses,
            self.total_volume_liters()
        );
    }

    /// Flash the running total. Called every minute by the persistence
    /// task and immediately after a reset command.
    pub fn save_total<P: KvStore>(&mut self, store: &mut P) -> bool {
        if !store.open(NAMESPACE) {
            log::warn!("[flow] persistence open failed, total not saved");
            return false;
        }
        let ok = store.put_u32(KEY_TOTAL_PULSES, self.total_pulses);
        store.close();
        if !ok {
            log::warn!("[flow] failed to persist total ({} pulses)", self.total_pulses);
        }
        ok
    }

    /// Consume the pulses accumulated since the previous read and emit
    /// the `pd`/`tv` pair. A disabled sensor reports `nan` for both so
    /// consumers can tell "no sensor" from "no flow".
    pub fn read(&mut self, _now: u32) -> (Reading, Reading) {
        if !self.enabled {
            return (
                Reading::absent(TelemetryKey::PulseDelta),
                Reading::absent(TelemetryKey::TotalVolume),
            );
        }

        let delta = self.pulses.take();
        self.total_pulses = self.total_pulses.wrapping_add(delta);

        (
            Reading::new(TelemetryKey::PulseDelta, delta as f32),
            Reading::new(TelemetryKey::TotalVolume, self.total_volume_liters()),
        )
    }

    /// Daily reset: zero the total and persist right away.
    pub fn reset_total<P: KvStore>(&mut self, store: &mut P) {
        self.total_pulses = 0;
        // Pulses counted before the reset landed belong to the old day.
        let _ = self.pulses.take();
        self.save_total(store);
        log::info!("[flow] total volume reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_pulse_accounting() {
        static PULSES: PulseShared = PulseShared::new();
        let mut sensor = WaterFlowSensor::new(&PULSES, true, PULSES_PER_LITER);

        for _ in 0..9 {
            PULSES.record_pulse();
        }
        let (pd, tv) = sensor.read(1_000);
        assert_eq!(pd.value, 9.0);
        assert!((tv.value - 9.0 / 450.0).abs() < 1e-6);

        // Nothing new since the read.
        let (pd, tv) = sensor.read(2_000);
        assert_eq!(pd.value, 0.0);
        assert!((tv.value - 9.0 / 450.0).abs() < 1e-6);
    }

    #[test]
    fn test_total_accumulates_across_reads() {
        static PULSES: PulseShared = PulseShared::new();
        let mut sensor = WaterFlowSensor::new(&PULSES, true, 450);

        for _ in 0..450 {
            PULSES.record_pulse();
        }
        sensor.read(1_000);
        for _ in 0..225 {
            PULSES.record_pulse();
        }
        let (_, tv) = sensor.read(2_000);
        assert_eq!(sensor.total_pulses(), 675);
        assert!((tv.value - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_disabled_sensor_reports_nan() {
        static PULSES: PulseShared = PulseShared::new();
        let mut sensor = WaterFlowSensor::new(&PULSES, false, 450);

        PULSES.record_pulse();
        let (pd, tv) = sensor.read(1_000);
        assert!(pd.value.is_nan());
        assert!(tv.value.is_nan());
    }

    #[test]
    fn test_persistence_roundtrip() {
        static PULSES: PulseShared = PulseShared::new();
        let mut store = MemoryStore::new();
        let mut sensor = WaterFlowSensor::new(&PULSES, true, 450);

        for _ in 0..42 {
            PULSES.record_pulse();
        }
        sensor.read(500);
        assert!(sensor.save_total(&mut store));

        // Reboot.
        let mut restored = WaterFlowSensor::new(&PULSES, true, 450);
        restored.load_total(&mut store);
        assert_eq!(restored.total_pulses(), 42);
    }

    #[test]
    fn test_reset_total_persists_zero() {
        static PULSES: PulseShared = PulseShared::new();
        let mut store = MemoryStore::new();
        let mut sensor = WaterFlowSensor::new(&PULSES, true, 450);

        for _ in 0..10 {
            PULSES.record_pulse();
        }
        sensor.read(500);
        sensor.save_total(&mut store);
        sensor.reset_total(&mut store);

        assert_eq!(sensor.total_pulses(), 0);
        let mut restored = WaterFlowSensor::new(&PULSES, true, 450);
        restored.load_total(&mut store);
        assert_eq!(restored.total_pulses(), 0);
    }

    #[test]
    fn test_take_zeroes_exactly_once() {
        static PULSES: PulseShared = PulseShared::new();
        PULSES.record_pulse();
        PULSES.record_pulse();
        assert_eq!(PULSES.peek(), 2);
        assert_eq!(PULSES.take(), 2);
        assert_eq!(PULSES.take(), 0);
    }
}
