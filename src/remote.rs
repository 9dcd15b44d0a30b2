//! Remote (slave) application: wires the link engine, the water flow
//! sensor and the batch transmitter to the scheduler, and answers
//! commands coming back from the relay.

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::config::{NodeMode, RemoteConfig};
use crate::link::{LinkEngine, LinkEvent};
use crate::persistence::KvStore;
use crate::protocol::CommandType;
use crate::radio::RadioDriver;
use crate::scheduler::{Scheduler, MAX_TASKS};
use crate::services::{BatteryMonitor, StatusDisplay};
use crate::telemetry::{BatchTransmitter, Reading, TelemetryKey, MAX_BATCH_READINGS};
use crate::water_flow::WaterFlowSensor;

const APP_STATE_NAMESPACE: &str = "app_state";
const KEY_ERROR_COUNT: &str = "errorCount";
const KEY_LAST_RESET_MS: &str = "lastResetMs";

/// Delivery bookkeeping kept by the application on top of the link's own
/// counters: first-attempt successes, retried successes, and losses.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageStats {
    pub successful: u32,
    pub recovered: u32,
    pub dropped: u32,
}

pub struct RemoteApp<R, D, P, B, DS> {
    pub link: LinkEngine<R, D>,
    pub batch: BatchTransmitter,
    pub flow: WaterFlowSensor,
    pub store: P,
    pub battery: B,
    pub display: DS,

    cfg: RemoteConfig,
    pub heartbeat_on: bool,
    error_count: u32,
    last_reset_ms: u32,
    last_successful_ack_ms: u32,
    stats: MessageStats,
}

impl<R, D, P, B, DS> RemoteApp<R, D, P, B, DS>
where
    R: RadioDriver,
    D: DelayNs,
    P: KvStore,
    B: BatteryMonitor,
    DS: StatusDisplay,
{
    pub fn new(
        radio: R,
        delay: D,
        flow: WaterFlowSensor,
        store: P,
        battery: B,
        display: DS,
        cfg: RemoteConfig,
    ) -> Self {
        let link = LinkEngine::new(radio, delay, cfg.radio.clone(), cfg.link.clone());
        let batch = BatchTransmitter::new(cfg.master_node_id);
        Self {
            link,
            batch,
            flow,
            store,
            battery,
            display,
            cfg,
            heartbeat_on: false,
            error_count: 0,
            last_reset_ms: 0,
            last_successful_ack_ms: 0,
            stats: MessageStats::default(),
        }
    }

    /// Bring the node up: radio, persisted state, and an initial
    /// telemetry batch that goes out as soon as the link is up. The
    /// engine registers with the master on its first tick.
    pub fn begin(&mut self, now: u32) -> bool {
        if !self.link.begin(NodeMode::Slave, self.cfg.self_id) {
            log::error!("[remote] link init failed");
            return false;
        }
        self.link.set_master_node_id(self.cfg.master_node_id);

        if self.store.open(APP_STATE_NAMESPACE) {
            self.error_count = self.store.get_u32(KEY_ERROR_COUNT, 0);
            self.last_reset_ms = self.store.get_u32(KEY_LAST_RESET_MS, 0);
            self.store.close();
        } else {
            log::warn!("[remote] app state unavailable");
        }
        self.flow.load_total(&mut self.store);

        self.battery.update(now);
        let readings = self.collect_readings(now);
        self.batch.queue_batch(&readings);

        log::info!(
            "[remote] up, id={} master={} errors={}",
            self.cfg.self_id,
            self.cfg.master_node_id,
            self.error_count
        );
        true
    }

    pub fn register_tasks(sched: &mut Scheduler<Self, MAX_TASKS>, cfg: &RemoteConfig, now: u32) {
        sched.register("heartbeat", Self::task_heartbeat, cfg.heartbeat_interval_ms, now);
        sched.register("battery", Self::task_battery, cfg.battery_interval_ms, now);
        if cfg.water_flow_enabled {
            sched.register("persistence", Self::task_persistence, cfg.persistence_interval_ms, now);
        }
        sched.register("sensors", Self::task_sensors, cfg.telemetry_report_interval_ms, now);
        sched.register("lora_tx", Self::task_lora_tx, cfg.lora_tx_interval_ms, now);
        sched.register("lora", Self::task_lora, cfg.lora_tick_interval_ms, now);
        sched.register("lora_watchdog", Self::task_lora_watchdog, cfg.watchdog_interval_ms, now);
        sched.register("display", Self::task_display, cfg.display_update_interval_ms, now);
        sched.register("status", Self::task_status, 60_000, now);
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn last_reset_ms(&self) -> u32 {
        self.last_reset_ms
    }

    pub fn message_stats(&self) -> MessageStats {
        self.stats
    }

    fn task_heartbeat(&mut self, _now: u32) {
        self.heartbeat_on = !self.heartbeat_on;
        self.display.set_heartbeat(self.heartbeat_on);
    }

    fn task_battery(&mut self, now: u32) {
        self.battery.update(now);
        self.display
            .set_battery(self.battery.percent(), self.battery.is_charging());
    }

    fn task_persistence(&mut self, _now: u32) {
        if self.flow.is_enabled() {
            self.flow.save_total(&mut self.store);
        }
    }

    /// Sample every sensor into the batch. Skipped while disconnected or
    /// while the previous batch is still pending, in which case pulses
    /// keep accumulating and nothing is lost.
    fn task_sensors(&mut self, now: u32) {
        if !self.link.is_connected() {
            return;
        }
        if !self.batch.is_empty() {
            log::debug!("[remote] previous batch pending, skipping this interval");
            return;
        }
        let readings = self.collect_readings(now);
        self.batch.queue_batch(&readings);
    }

    fn task_lora_tx(&mut self, now: u32) {
        self.batch.update(now, &mut self.link);
    }

    fn task_lora(&mut self, now: u32) {
        self.link.tick(now);
        while let Some(event) = self.link.poll_event() {
            self.handle_link_event(event, now);
        }
        self.display
            .set_link_status(self.link.is_connected(), self.link.last_rssi_dbm());
    }

    fn task_lora_watchdog(&mut self, now: u32) {
        if now.wrapping_sub(self.last_successful_ack_ms) > self.cfg.max_quiet_ms {
            log::warn!("[remote] no ACK for {} ms, forcing reconnect", self.cfg.max_quiet_ms);
            self.link.force_reconnect();
            // Give the fresh registration a chance before firing again.
            self.last_successful_ack_ms = now;
        }
    }

    fn task_display(&mut self, now: u32) {
        self.display.update(now);
    }

    fn task_status(&mut self, now: u32) {
        let link_stats = self.link.stats();
        log::info!(
            "[remote] uptime={}s conn={:?} tx={} rx={} ok={} rec={} drop={} errors={}",
            now / 1_000,
            self.link.connection_state(),
            link_stats.frames_sent,
            link_stats.frames_received,
            self.stats.successful,
            self.stats.recovered,
            self.stats.dropped,
            self.error_count
        );
    }

    fn collect_readings(&mut self, now: u32) -> Vec<Reading, MAX_BATCH_READINGS> {
        let mut readings: Vec<Reading, MAX_BATCH_READINGS> = Vec::new();
        let _ = readings.push(Reading::new(
            TelemetryKey::BatteryPercent,
            self.battery.percent() as f32,
        ));
        let (pd, tv) = self.flow.read(now);
        let _ = readings.push(pd);
        let _ = readings.push(tv);
        let _ = readings.push(Reading::new(TelemetryKey::ErrorCount, self.error_count as f32));
        let tsr_sec = now.wrapping_sub(self.last_reset_ms) / 1_000;
        let _ = readings.push(Reading::new(TelemetryKey::TimeSinceReset, tsr_sec as f32));
        readings
    }

    fn handle_link_event(&mut self, event: LinkEvent, now: u32) {
        match event {
            LinkEvent::DataReceived { src, payload } => {
                self.handle_command(src, &payload, now);
            }
            LinkEvent::AckReceived { attempts, .. } => {
                if attempts <= 1 {
                    self.stats.successful += 1;
                } else {
                    self.stats.recovered += 1;
                }
                self.last_successful_ack_ms = now;
            }
            LinkEvent::MessageDropped { msg_id, attempts } => {
                log::warn!("[remote] message {} dropped after {} attempts", msg_id, attempts);
                self.stats.dropped += 1;
                self.error_count += 1;
                self.persist_app_state();
            }
        }
    }

    fn handle_command(&mut self, src: u8, payload: &[u8], now: u32) {
        let Some(&opcode) = payload.first() else {
            return;
        };
        match CommandType::from_byte(opcode) {
            Some(CommandType::ResetWaterVolume) => {
                log::info!("[remote] daily reset commanded by {}", src);
                self.flow.reset_total(&mut self.store);
                self.error_count = 0;
                self.last_reset_ms = now;
                self.persist_app_state();
                self.link.reset_stats();
            }
            None => {
                // Newer relays may speak commands we do not know yet.
                log::debug!("[remote] unknown command 0x{:02X} from {}", opcode, src);
            }
        }
    }

    fn persist_app_state(&mut self) {
        if !self.store.open(APP_STATE_NAMESPACE) {
            log::warn!("[remote] app state open failed");
            return;
        }
        let mut ok = self.store.put_u32(KEY_ERROR_COUNT, self.error_count);
        ok &= self.store.put_u32(KEY_LAST_RESET_MS, self.last_reset_ms);
        self.store.close();
        if !ok {
            log::warn!("[remote] app state write failed");
        }
    }
}
