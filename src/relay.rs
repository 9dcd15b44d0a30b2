//! Relay (master) application: receives telemetry frames, feeds the
//! device manager, republishes payloads to MQTT and keeps its own error
//! counter durable.

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use heapless::String;

use crate::config::{NodeMode, RelayConfig};
use crate::device_manager::DeviceManager;
use crate::link::{LinkEngine, LinkEvent};
use crate::persistence::KvStore;
use crate::radio::RadioDriver;
use crate::scheduler::{Scheduler, MAX_TASKS};
use crate::services::{BatteryMonitor, MqttPublisher, StatusDisplay, WifiLink};

const APP_STATE_NAMESPACE: &str = "app_state";
const KEY_ERROR_COUNT: &str = "errorCount";
const KEY_LAST_RESET_MS: &str = "lastResetMs";

pub struct RelayApp<R, D, P, B, DS, W, M> {
    pub link: LinkEngine<R, D>,
    pub devices: DeviceManager,
    pub store: P,
    pub battery: B,
    pub display: DS,
    pub wifi: W,
    pub mqtt: M,

    cfg: RelayConfig,
    pub heartbeat_on: bool,
    error_count: u32,
    last_daily_reset_ms: u32,
}

impl<R, D, P, B, DS, W, M> RelayApp<R, D, P, B, DS, W, M>
where
    R: RadioDriver,
    D: DelayNs,
    P: KvStore,
    B: BatteryMonitor,
    DS: StatusDisplay,
    W: WifiLink,
    M: MqttPublisher,
{
    pub fn new(
        radio: R,
        delay: D,
        store: P,
        battery: B,
        display: DS,
        wifi: W,
        mqtt: M,
        cfg: RelayConfig,
    ) -> Self {
        let link = LinkEngine::new(radio, delay, cfg.radio.clone(), cfg.link.clone());
        let devices = DeviceManager::new(cfg.device_reset_interval_ms);
        Self {
            link,
            devices,
            store,
            battery,
            display,
            wifi,
            mqtt,
            cfg,
            heartbeat_on: false,
            error_count: 0,
            last_daily_reset_ms: 0,
        }
    }

    pub fn begin(&mut self, now: u32) -> bool {
        if !self.link.begin(NodeMode::Master, self.cfg.self_id) {
            log::error!("[relay] link init failed");
            return false;
        }

        if self.store.open(APP_STATE_NAMESPACE) {
            self.error_count = self.store.get_u32(KEY_ERROR_COUNT, 0);
            self.last_daily_reset_ms = self.store.get_u32(KEY_LAST_RESET_MS, 0);
            self.store.close();
        } else {
            log::warn!("[relay] app state unavailable");
        }
        self.devices.begin(&mut self.store, now);

        log::info!(
            "[relay] up, id={} known devices={} errors={}",
            self.cfg.self_id,
            self.devices.device_count(),
            self.error_count
        );
        true
    }

    pub fn register_tasks(sched: &mut Scheduler<Self, MAX_TASKS>, cfg: &RelayConfig, now: u32) {
        sched.register("heartbeat", Self::task_heartbeat, cfg.heartbeat_interval_ms, now);
        sched.register("battery", Self::task_battery, cfg.battery_interval_ms, now);
        sched.register("display", Self::task_display, cfg.display_update_interval_ms, now);
        sched.register("lora", Self::task_lora, cfg.lora_tick_interval_ms, now);
        sched.register("device_manager", Self::task_device_manager, cfg.device_manager_interval_ms, now);
        sched.register("daily_reset", Self::task_daily_reset, cfg.daily_reset_interval_ms, now);
        sched.register("wifi", Self::task_wifi, cfg.wifi_check_interval_ms, now);
        sched.register("status", Self::task_status, 60_000, now);
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
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

    fn task_display(&mut self, now: u32) {
        self.display.update(now);
    }

    fn task_lora(&mut self, now: u32) {
        self.link.tick(now);
        while let Some(event) = self.link.poll_event() {
            self.handle_link_event(event, now);
        }
        self.display.set_peer_count(self.link.peer_count());
    }

    fn task_device_manager(&mut self, now: u32) {
        self.devices.update(now, &mut self.link, &mut self.store);
    }

    /// The relay zeroes its own error counter once per day, on the same
    /// cadence it imposes on the remotes.
    fn task_daily_reset(&mut self, now: u32) {
        if now.wrapping_sub(self.last_daily_reset_ms) >= self.cfg.device_reset_interval_ms {
            log::info!("[relay] daily error counter reset");
            self.error_count = 0;
            self.last_daily_reset_ms = now;
            self.persist_app_state();
        }
    }

    fn task_wifi(&mut self, now: u32) {
        self.wifi.update(now);
        self.display
            .set_wifi_status(self.wifi.is_connected(), self.wifi.signal_strength_percent());
    }

    fn task_status(&mut self, now: u32) {
        let link_stats = self.link.stats();
        log::info!(
            "[relay] uptime={}s peers={}/{} devices={} tx={} rx={} errors={}",
            now / 1_000,
            self.link.peer_count(),
            self.link.total_peer_count(),
            self.devices.device_count(),
            link_stats.frames_sent,
            link_stats.frames_received,
            self.error_count
        );
    }

    fn handle_link_event(&mut self, event: LinkEvent, now: u32) {
        match event {
            LinkEvent::DataReceived { src, payload } => {
                let Ok(text) = core::str::from_utf8(&payload) else {
                    log::warn!("[relay] non UTF-8 payload from {}", src);
                    return;
                };
                log::info!("[relay] telemetry from {}: '{}'", src, text);
                self.devices.handle_telemetry(src, text, now);
                self.publish_telemetry(src, &payload);
            }
            LinkEvent::AckReceived { src, msg_id, .. } => {
                log::debug!("[relay] ACK from {} for msgId {}", src, msg_id);
            }
            LinkEvent::MessageDropped { msg_id, attempts } => {
                log::warn!("[relay] command {} dropped after {} attempts", msg_id, attempts);
                self.error_count += 1;
                self.persist_app_state();
            }
        }
    }

    fn publish_telemetry(&mut self, src: u8, payload: &[u8]) {
        let mut topic: String<24> = String::new();
        let _ = write!(topic, "remote-{}", src);
        if !self.mqtt.publish(topic.as_str(), payload) {
            log::warn!("[relay] publish to '{}' failed", topic.as_str());
            self.error_count += 1;
            self.persist_app_state();
        }
    }

    fn persist_app_state(&mut self) {
        if !self.store.open(APP_STATE_NAMESPACE) {
            log::warn!("[relay] app state open failed");
            return;
        }
        let mut ok = self.store.put_u32(KEY_ERROR_COUNT, self.error_count);
        ok &= self.store.put_u32(KEY_LAST_RESET_MS, self.last_daily_reset_ms);
        self.store.close();
        if !ok {
            log::warn!("[relay] app state write failed");
        }
    }
}
