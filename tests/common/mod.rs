//! Shared test harness: a scripted radio pair and collaborator stubs.

#![allow(dead_code)]

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use farmlink::config::RadioParams;
use farmlink::radio::{RadioDriver, RadioError, RadioEvent, RadioState};
use farmlink::services::{MqttPublisher, WifiLink};

/// Radio double: transmissions land in `sent`, reception and completion
/// are injected by the test. TX completion is immediate unless
/// `auto_tx_done` is cleared (for stuck-radio scenarios).
pub struct SimRadio {
    pub sent: Vec<Vec<u8>>,
    pub injected: VecDeque<RadioEvent>,
    pub auto_tx_done: bool,
    pub begin_count: u32,
    pub state: RadioState,
}

impl SimRadio {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            injected: VecDeque::new(),
            auto_tx_done: true,
            begin_count: 0,
            state: RadioState::Sleep,
        }
    }

    pub fn inject_rx(&mut self, data: &[u8], rssi_dbm: i16, snr_db: i8) {
        let mut v = heapless::Vec::new();
        v.extend_from_slice(data).unwrap();
        self.injected.push_back(RadioEvent::RxDone {
            data: v,
            rssi_dbm,
            snr_db,
        });
    }

    /// Drain everything transmitted since the last call.
    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl RadioDriver for SimRadio {
    fn begin(&mut self, _params: &RadioParams) -> Result<(), RadioError> {
        self.begin_count += 1;
        self.state = RadioState::Standby;
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.sent.push(frame.to_vec());
        self.state = RadioState::Tx;
        if self.auto_tx_done {
            self.injected.push_back(RadioEvent::TxDone);
        }
        Ok(())
    }

    fn enter_rx_continuous(&mut self) -> Result<(), RadioError> {
        self.state = RadioState::Rx;
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), RadioError> {
        self.state = RadioState::Sleep;
        Ok(())
    }

    fn standby(&mut self) -> Result<(), RadioError> {
        self.state = RadioState::Standby;
        Ok(())
    }

    fn process_irq(&mut self) -> Option<RadioEvent> {
        self.injected.pop_front()
    }

    fn state(&self) -> RadioState {
        self.state
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub struct StubWifi {
    pub connected: bool,
}

impl StubWifi {
    pub fn new() -> Self {
        Self { connected: true }
    }
}

impl WifiLink for StubWifi {
    fn update(&mut self, _now_ms: u32) {}
    fn is_connected(&self) -> bool {
        self.connected
    }
    fn signal_strength_percent(&self) -> i8 {
        if self.connected {
            75
        } else {
            -1
        }
    }
}

pub struct RecordingMqtt {
    pub published: Vec<(String, Vec<u8>)>,
    pub fail: bool,
}

impl RecordingMqtt {
    pub fn new() -> Self {
        Self {
            published: Vec::new(),
            fail: false,
        }
    }
}

impl MqttPublisher for RecordingMqtt {
    fn publish(&mut self, topic_suffix: &str, payload: &[u8]) -> bool {
        if self.fail {
            return false;
        }
        self.published
            .push((topic_suffix.to_string(), payload.to_vec()));
        true
    }

    fn is_ready(&self) -> bool {
        !self.fail
    }
}
