#![cfg_attr(not(test), no_std)]

//! Two-tier LoRa farm telemetry network.
//!
//! Battery powered remote nodes count water-flow pulses and report them,
//! together with battery and health data, over a reliable LoRa datagram
//! link to a single relay. The relay republishes each remote's payload to
//! an MQTT broker and commands the remotes to reset their daily counters.
//!
//! The crate is `no_std` and allocation free. Hardware is reached through
//! narrow ports: [`radio::RadioDriver`] for the transceiver (an SX1262
//! implementation over `embedded-hal` is included), [`persistence::KvStore`]
//! for flash-backed key/value state, and the collaborator traits in
//! [`services`] for battery, WiFi, display and MQTT.

pub mod config;
pub mod device_manager;
pub mod link;
pub mod persistence;
pub mod protocol;
pub mod radio;
pub mod relay;
pub mod remote;
pub mod scheduler;
pub mod services;
pub mod sx1262;
pub mod telemetry;
pub mod water_flow;

pub use config::{NodeId, NodeMode};
pub use link::{ConnectionState, LinkEngine, LinkEvent};
