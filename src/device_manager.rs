//! Relay-side bookkeeping for every remote that has ever reported in.
//!
//! A record is created at first sight, fed by each telemetry frame,
//! reset every 24 hours (a `ResetWaterVolume` command goes back to the
//! remote in the same pass) and flushed to persistence whenever dirty.
//! The set of known devices survives reboots through the `dev_manager`
//! namespace; each record lives in its own `dev_<id>` namespace.

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use heapless::{FnvIndexMap, String};

use crate::config::NodeId;
use crate::link::LinkEngine;
use crate::persistence::{KvStore, MAX_STR_VALUE_LEN};
use crate::protocol::CommandType;
use crate::radio::RadioDriver;
use crate::telemetry;
use crate::water_flow::PULSES_PER_LITER;

pub const MAX_DEVICES: usize = 16;

const MANAGER_NAMESPACE: &str = "dev_manager";
const KEY_DEVICE_LIST: &str = "device_list";

#[derive(Debug, Clone, Copy)]
pub struct DeviceRecord {
    pub device_id: NodeId,
    pub last_reset_ms: u32,
    pub daily_volume_liters: f32,
    pub error_count: u32,
    pub last_message_ms: u32,
    pub time_since_reset_sec: u32,
    pub last_tsr_sec: u32,
    pub dirty: bool,
}

impl DeviceRecord {
    fn new(device_id: NodeId, now: u32) -> Self {
        Self {
            device_id,
            last_reset_ms: now,
            daily_volume_liters: 0.0,
            error_count: 0,
            last_message_ms: now,
            time_since_reset_sec: 0,
            last_tsr_sec: 0,
            dirty: true,
        }
    }
}

pub struct DeviceManager {
    devices: FnvIndexMap<NodeId, DeviceRecord, MAX_DEVICES>,
    reset_interval_ms: u32,
}

impl DeviceManager {
    pub fn new(reset_interval_ms: u32) -> Self {
        Self {
            devices: FnvIndexMap::new(),
            reset_interval_ms,
        }
    }

    /// Load the device list and every per-device record.
    pub fn begin<P: KvStore>(&mut self, store: &mut P, now: u32) {
        let list = if store.open(MANAGER_NAMESPACE) {
            let list = store.get_str(KEY_DEVICE_LIST, "");
            store.close();
            list
        } else {
            log::warn!("[devmgr] persistence open failed, starting empty");
            return;
        };

        for part in list.split(',') {
            let Ok(id) = part.trim().parse::<NodeId>() else {
                continue;
            };
            if id == 0 {
                continue;
            }
            let mut record = DeviceRecord::new(id, now);
            let ns = device_namespace(id);
            if store.open(ns.as_str()) {
                record.last_reset_ms = store.get_u32("lastReset", now);
                record.daily_volume_liters = store.get_f32("dailyVol", 0.0);
                record.error_count = store.get_u32("errorCount", 0);
                record.last_tsr_sec = store.get_u32("lastTsr", 0);
                store.close();
            }
            record.dirty = false;
            if self.devices.insert(id, record).is_err() {
                log::warn!("[devmgr] device table full, {} not restored", id);
                break;
            }
            log::info!("[devmgr] restored device {}", id);
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn device(&self, id: NodeId) -> Option<&DeviceRecord> {
        self.devices.get(&id)
    }

    /// Ingest one telemetry payload from `src`. Unknown keys are ignored,
    /// `nan` fields skipped, so remotes can run older or newer firmware.
    pub fn handle_telemetry(&mut self, src: NodeId, payload: &str, now: u32) {
        let Some(record) = self.get_or_create(src, now) else {
            return;
        };
        record.last_message_ms = now;

        let parsed = telemetry::parse_payload(payload);
        if let Some(tv) = parsed.total_volume {
            record.daily_volume_liters = tv;
        }
        if let Some(ec) = parsed.error_count {
            record.error_count = ec;
        }
        if let Some(tsr) = parsed.time_since_reset_sec {
            record.time_since_reset_sec = tsr;
        }

        // Instantaneous flow from the pulse delta over the tsr delta of
        // the previous report.
        if let Some(pd) = parsed.pulse_delta {
            if record.last_tsr_sec > 0 {
                let delta_sec = record
                    .time_since_reset_sec
                    .saturating_sub(record.last_tsr_sec);
                if delta_sec > 0 {
                    let flow_lpm =
                        (pd as f32 * 60.0) / (PULSES_PER_LITER as f32 * delta_sec as f32);
                    log::debug!(
                        "[devmgr] device {} flow {:.2} L/min ({} pulses over {} s)",
                        src,
                        flow_lpm,
                        pd,
                        delta_sec
                    );
                }
            }
        }
        record.last_tsr_sec = record.time_since_reset_sec;
        record.dirty = true;
    }

    /// Periodic pass: issue due daily resets and flush dirty records.
    pub fn update<R, D, P>(&mut self, now: u32, link: &mut LinkEngine<R, D>, store: &mut P)
    where
        R: RadioDriver,
        D: DelayNs,
        P: KvStore,
    {
        let mut due: heapless::Vec<NodeId, MAX_DEVICES> = heapless::Vec::new();
        for (id, record) in self.devices.iter() {
            if now.wrapping_sub(record.last_reset_ms) > self.reset_interval_ms {
                let _ = due.push(*id);
            }
        }

        for id in due {
            if let Some(record) = self.devices.get_mut(&id) {
                log::info!(
                    "[devmgr] device {} reached its reset period, final daily volume {:.2} L",
                    id,
                    record.daily_volume_liters
                );
                let cmd = [CommandType::ResetWaterVolume as u8];
                if !link.send_data(id, &cmd, true) {
                    log::warn!("[devmgr] reset command to {} refused by outbox", id);
                }
                record.daily_volume_liters = 0.0;
                record.error_count = 0;
                record.last_reset_ms = now;
                record.dirty = true;
            }
        }

        let mut flushed_any = false;
        for (_, record) in self.devices.iter_mut() {
            if record.dirty {
                save_record(store, record);
                flushed_any = true;
            }
        }
        if flushed_any {
            self.save_device_list(store);
        }
    }

    fn get_or_create(&mut self, id: NodeId, now: u32) -> Option<&mut DeviceRecord> {
        if id == 0 {
            return None;
        }
        if !self.devices.contains_key(&id) {
            log::info!("[devmgr] first sighting of device {}", id);
            if self.devices.insert(id, DeviceRecord::new(id, now)).is_err() {
                log::warn!("[devmgr] device table full, ignoring {}", id);
                return None;
            }
        }
        self.devices.get_mut(&id)
    }

    fn save_device_list<P: KvStore>(&self, store: &mut P) {
        let mut list: String<MAX_STR_VALUE_LEN> = String::new();
        for (i, id) in self.devices.keys().enumerate() {
            if i > 0 && list.push(',').is_err() {
                break;
            }
            if write!(list, "{}", id).is_err() {
                log::warn!("[devmgr] device list truncated");
                break;
            }
        }
        if !store.open(MANAGER_NAMESPACE) {
            log::warn!("[devmgr] persistence open failed, list not saved");
            return;
        }
        if !store.put_str(KEY_DEVICE_LIST, list.as_str()) {
            log::warn!("[devmgr] failed to persist device list");
        }
        store.close();
    }
}

fn device_namespace(id: NodeId) -> String<16> {
    let mut ns: String<16> = String::new();
    let _ = write!(ns, "dev_{}", id);
    ns
}

fn save_record<P: KvStore>(store: &mut P, record: &mut DeviceRecord) {
    let ns = device_namespace(record.device_id);
    if !store.open(ns.as_str()) {
        log::warn!("[devmgr] persistence open failed for {}", ns.as_str());
        return;
    }
    let mut ok = store.put_u32("lastReset", record.last_reset_ms);
    ok &= store.put_f32("dailyVol", record.daily_volume_liters);
    ok &= store.put_u32("errorCount", record.error_count);
    ok &= store.put_u32("lastTsr", record.last_tsr_sec);
    store.close();
    if ok {
        record.dirty = false;
        log::debug!("[devmgr] saved state for device {}", record.device_id);
    } else {
        log::warn!("[devmgr] save failed for device {}", record.device_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LinkConfig, NodeMode, RadioParams};
    use crate::persistence::MemoryStore;
    use crate::protocol::{Frame, FrameType};
    use crate::radio::testing::{NoDelay, ScriptedRadio};

    const DAY_MS: u32 = 24 * 60 * 60 * 1_000;

    fn relay_link() -> LinkEngine<ScriptedRadio, NoDelay> {
        let mut link = LinkEngine::new(
            ScriptedRadio::new(),
            NoDelay,
            RadioParams::default(),
            LinkConfig::default(),
        );
        assert!(link.begin(NodeMode::Master, 1));
        link
    }

    #[test]
    fn test_record_created_on_first_sighting() {
        let mut dm = DeviceManager::new(DAY_MS);
        dm.handle_telemetry(3, "batt:80,tv:1.25,ec:2,tsr:60", 5_000);

        let record = dm.device(3).unwrap();
        assert_eq!(record.device_id, 3);
        assert_eq!(record.last_reset_ms, 5_000);
        assert_eq!(record.last_message_ms, 5_000);
        assert_eq!(record.daily_volume_liters, 1.25);
        assert_eq!(record.error_count, 2);
        assert_eq!(record.last_tsr_sec, 60);
        assert!(record.dirty);
        assert_eq!(dm.device_count(), 1);
    }

    #[test]
    fn test_nan_fields_leave_state_untouched() {
        let mut dm = DeviceManager::new(DAY_MS);
        dm.handle_telemetry(3, "tv:2.50,ec:1,tsr:30", 1_000);
        dm.handle_telemetry(3, "tv:nan,ec:nan,tsr:60", 2_000);

        let record = dm.device(3).unwrap();
        assert_eq!(record.daily_volume_liters, 2.5);
        assert_eq!(record.error_count, 1);
        assert_eq!(record.time_since_reset_sec, 60);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut dm = DeviceManager::new(DAY_MS);
        dm.handle_telemetry(3, "frobnicate:9,tv:1.00", 1_000);
        assert_eq!(dm.device(3).unwrap().daily_volume_liters, 1.0);
    }

    #[test]
    fn test_daily_reset_sends_command_and_zeroes_state() {
        let mut dm = DeviceManager::new(DAY_MS);
        let mut link = relay_link();
        let mut store = MemoryStore::new();

        dm.handle_telemetry(3, "tv:42.00,ec:5,tsr:100", 0);
        dm.update(1_000, &mut link, &mut store);
        // Nothing due yet.
        assert_eq!(dm.device(3).unwrap().daily_volume_liters, 42.0);

        dm.update(DAY_MS + 1_000, &mut link, &mut store);
        let record = dm.device(3).unwrap();
        assert_eq!(record.daily_volume_liters, 0.0);
        assert_eq!(record.error_count, 0);
        assert_eq!(record.last_reset_ms, DAY_MS + 1_000);

        // The reset command left through the link.
        link.tick(DAY_MS + 1_050);
        let sent = &link.radio_mut().sent;
        assert_eq!(sent.len(), 1);
        let frame = Frame::decode(&sent[0]).unwrap();
        assert_eq!(frame.frame_type, FrameType::Data);
        assert!(frame.require_ack());
        assert_eq!(frame.dst, 3);
        assert_eq!(&frame.payload[..], &[CommandType::ResetWaterVolume as u8]);

        // And the zeroed state was flushed.
        assert!(store.open("dev_3"));
        assert_eq!(store.get_f32("dailyVol", -1.0), 0.0);
        assert_eq!(store.get_u32("errorCount", 99), 0);
        store.close();
    }

    #[test]
    fn test_state_survives_reboot() {
        let mut store = MemoryStore::new();
        let mut link = relay_link();

        let mut dm = DeviceManager::new(DAY_MS);
        dm.handle_telemetry(3, "tv:7.25,ec:4,tsr:900", 10_000);
        dm.handle_telemetry(9, "tv:0.50,ec:0,tsr:60", 11_000);
        dm.update(12_000, &mut link, &mut store);

        // Reboot.
        let mut restored = DeviceManager::new(DAY_MS);
        restored.begin(&mut store, 0);
        assert_eq!(restored.device_count(), 2);
        let record = restored.device(3).unwrap();
        assert_eq!(record.daily_volume_liters, 7.25);
        assert_eq!(record.error_count, 4);
        assert_eq!(record.last_tsr_sec, 900);
        assert!(!record.dirty);
        assert!(restored.device(9).is_some());
    }

    #[test]
    fn test_flow_rate_needs_prior_tsr() {
        let mut dm = DeviceManager::new(DAY_MS);
        // First report: no prior tsr, flow calc is skipped but tsr sticks.
        dm.handle_telemetry(3, "pd:450,tsr:60", 1_000);
        assert_eq!(dm.device(3).unwrap().last_tsr_sec, 60);
        // Second report: 450 pulses over 60 s is one liter a minute.
        dm.handle_telemetry(3, "pd:450,tsr:120", 2_000);
        assert_eq!(dm.device(3).unwrap().last_tsr_sec, 120);
    }

    #[test]
    fn test_invalid_source_ignored() {
        let mut dm = DeviceManager::new(DAY_MS);
        dm.handle_telemetry(0, "tv:1.00", 1_000);
        assert_eq!(dm.device_count(), 0);
    }
}
