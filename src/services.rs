//! Collaborator ports: battery, WiFi, display and MQTT.
//!
//! Each is a function shaped object the scheduler pokes with `update`
//! plus a handful of accessors or setters. The core never depends on
//! their state; a node runs fine with the no-op stand-ins below.

/// Battery gauge. The voltage-to-percent mapping lives behind this port.
pub trait BatteryMonitor {
    fn update(&mut self, now_ms: u32);

    /// 0..=100.
    fn percent(&self) -> u8;

    fn is_charging(&self) -> bool;
}

/// Station-mode WiFi link owned by the relay.
pub trait WifiLink {
    fn update(&mut self, now_ms: u32);

    fn is_connected(&self) -> bool;

    /// 0..=100, negative when unknown.
    fn signal_strength_percent(&self) -> i8;
}

/// Status display. The apps push the few values the header renders.
pub trait StatusDisplay {
    fn update(&mut self, now_ms: u32);

    fn set_heartbeat(&mut self, on: bool);

    fn set_link_status(&mut self, connected: bool, rssi_dbm: i16);

    fn set_peer_count(&mut self, count: usize);

    fn set_wifi_status(&mut self, connected: bool, strength_percent: i8);

    fn set_battery(&mut self, percent: u8, charging: bool);
}

/// Outbound-only MQTT publisher. The collaborator owns broker session,
/// base topic, QoS and retain policy; the relay only supplies a topic
/// suffix and the raw payload.
pub trait MqttPublisher {
    fn publish(&mut self, topic_suffix: &str, payload: &[u8]) -> bool;

    fn is_ready(&self) -> bool;
}

/// Display stand-in for headless nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl StatusDisplay for NullDisplay {
    fn update(&mut self, _now_ms: u32) {}
    fn set_heartbeat(&mut self, _on: bool) {}
    fn set_link_status(&mut self, _connected: bool, _rssi_dbm: i16) {}
    fn set_peer_count(&mut self, _count: usize) {}
    fn set_wifi_status(&mut self, _connected: bool, _strength_percent: i8) {}
    fn set_battery(&mut self, _percent: u8, _charging: bool) {}
}

/// Battery stand-in reporting a fixed level, for bench setups without a
/// gauge wired up.
#[derive(Debug, Clone, Copy)]
pub struct FixedBattery {
    pub percent: u8,
    pub charging: bool,
}

impl FixedBattery {
    pub fn new(percent: u8) -> Self {
        Self {
            percent,
            charging: false,
        }
    }
}

impl BatteryMonitor for FixedBattery {
    fn update(&mut self, _now_ms: u32) {}

    fn percent(&self) -> u8 {
        self.percent
    }

    fn is_charging(&self) -> bool {
        self.charging
    }
}
