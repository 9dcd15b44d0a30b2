//! Node, radio, link and application configuration.

use heapless::String;

/// Node address on the air. `1..=254` are assignable, `0` is reserved as
/// invalid and `255` addresses every listener.
pub type NodeId = u8;

pub const INVALID_NODE_ID: NodeId = 0;

pub const BROADCAST_NODE_ID: NodeId = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    /// The relay. Exactly one per network.
    Master,
    /// A remote. Configured with the id of its master.
    Slave,
}

/// LoRa modem parameters handed to the radio driver at `begin`.
#[derive(Debug, Clone)]
pub struct RadioParams {
    pub frequency_hz: u32,

    pub tx_power_dbm: i8,

    /// Bandwidth code per SX126x, 0x00 = 7.81 kHz .. 0x06 = 500 kHz;
    /// the default 0x04 is 125 kHz.
    pub bandwidth: u8,

    pub spreading_factor: u8,

    /// Coding rate code, 1 = 4/5 .. 4 = 4/8.
    pub coding_rate: u8,

    pub preamble_length: u16,

    pub iq_inverted: bool,
}

impl Default for RadioParams {
    fn default() -> Self {
        Self {
            frequency_hz: 868_000_000,
            tx_power_dbm: 14,
            bandwidth: 0x04,
            spreading_factor: 7,
            coding_rate: 1,
            preamble_length: 8,
            iq_inverted: false,
        }
    }
}

/// Tunables of the datagram engine. The typical values follow the field
/// deployment; everything is overridable per node.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Per-attempt wait for an ACK before a retry is scheduled.
    pub ack_timeout_ms: u32,

    /// Attempts after which a require-ack message is dropped.
    pub max_retries: u8,

    /// Peer liveness window, also the slave's connection timeout.
    pub peer_timeout_ms: u32,

    /// TX watchdog: longest tolerated silence after a send.
    pub tx_guard_ms: u32,

    /// Consecutive stuck-TX events before the radio is reinitialized.
    pub tx_stuck_reinit_count: u8,

    /// Cadence of slave re-registration attempts while disconnected.
    pub reconnect_attempt_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 1_500,
            max_retries: 4,
            peer_timeout_ms: 15_000,
            tx_guard_ms: 8_000,
            tx_stuck_reinit_count: 3,
            reconnect_attempt_ms: 5_000,
        }
    }
}

/// MQTT collaborator settings. The publisher owns the session; the relay
/// only hands it topic suffixes and payload bytes.
#[derive(Debug, Clone, Default)]
pub struct MqttParams {
    pub enabled: bool,
    pub broker_host: String<64>,
    pub broker_port: u16,
    pub client_id: String<32>,
    pub username: String<32>,
    pub password: String<32>,
    pub base_topic: String<64>,
    pub qos: u8,
    pub retain: bool,
}

/// Remote (slave) application configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub self_id: NodeId,
    pub master_node_id: NodeId,

    pub radio: RadioParams,
    pub link: LinkConfig,

    pub heartbeat_interval_ms: u32,
    pub battery_interval_ms: u32,
    pub display_update_interval_ms: u32,
    pub lora_tick_interval_ms: u32,
    pub lora_tx_interval_ms: u32,
    pub telemetry_report_interval_ms: u32,
    pub persistence_interval_ms: u32,
    pub watchdog_interval_ms: u32,

    /// Quiet time without a successful ACK before the watchdog forces a
    /// reconnect.
    pub max_quiet_ms: u32,

    pub water_flow_enabled: bool,
    pub pulses_per_liter: u16,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            self_id: INVALID_NODE_ID,
            master_node_id: INVALID_NODE_ID,
            radio: RadioParams::default(),
            link: LinkConfig::default(),
            heartbeat_interval_ms: 1_000,
            battery_interval_ms: 1_000,
            display_update_interval_ms: 200,
            lora_tick_interval_ms: 50,
            lora_tx_interval_ms: 1_000,
            telemetry_report_interval_ms: 5_000,
            persistence_interval_ms: 60_000,
            watchdog_interval_ms: 30_000,
            max_quiet_ms: 60_000,
            water_flow_enabled: true,
            pulses_per_liter: crate::water_flow::PULSES_PER_LITER,
        }
    }
}

/// Relay (master) application configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub self_id: NodeId,

    pub radio: RadioParams,
    pub link: LinkConfig,
    pub mqtt: MqttParams,

    pub heartbeat_interval_ms: u32,
    pub battery_interval_ms: u32,
    pub display_update_interval_ms: u32,
    pub lora_tick_interval_ms: u32,
    pub device_manager_interval_ms: u32,
    pub daily_reset_interval_ms: u32,
    pub wifi_check_interval_ms: u32,

    /// Age at which a remote's daily counters are reset from the relay.
    pub device_reset_interval_ms: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            self_id: INVALID_NODE_ID,
            radio: RadioParams::default(),
            link: LinkConfig::default(),
            mqtt: MqttParams::default(),
            heartbeat_interval_ms: 1_000,
            battery_interval_ms: 1_000,
            display_update_interval_ms: 800,
            lora_tick_interval_ms: 50,
            device_manager_interval_ms: 5_000,
            daily_reset_interval_ms: 3_600_000,
            wifi_check_interval_ms: 1_000,
            device_reset_interval_ms: 24 * 60 * 60 * 1_000,
        }
    }
}
