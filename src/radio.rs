//! Radio port used by the datagram engine.
//!
//! The port is deliberately narrow: one outstanding TX at a time,
//! completion and reception surface through [`RadioDriver::process_irq`],
//! and the driver never re-enters RX on its own between transmissions.
//! Direction changes are owned by the engine, which walks the radio
//! through `sleep -> standby -> send` with small settling delays.

use heapless::Vec;

use crate::config::RadioParams;
use crate::protocol::MAX_FRAME_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    Sleep,
    Standby,
    Tx,
    Rx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    Spi,

    BusyTimeout,

    InvalidConfig,

    TxTimeout,

    RxTimeout,

    CrcError,

    BufferOverflow,
}

/// Event drained from the driver's IRQ lines. At most one per
/// `process_irq` call; the caller polls every tick.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    TxDone,
    TxTimeout,
    RxDone {
        data: Vec<u8, MAX_FRAME_LEN>,
        rssi_dbm: i16,
        snr_db: i8,
    },
}


pub trait RadioDriver {
    /// One-shot initialization with the given modem parameters. Also used
    /// to recover a wedged transceiver; the driver must tolerate being
    /// reinitialized at any point.
    fn begin(&mut self, params: &RadioParams) -> Result<(), RadioError>;

    /// Non-blocking transmit. Completion is reported as
    /// [`RadioEvent::TxDone`] or [`RadioEvent::TxTimeout`]; after either,
    /// the driver sits in `Standby`.
    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError>;

    /// Park in continuous receive.
    fn enter_rx_continuous(&mut self) -> Result<(), RadioError>;

    fn sleep(&mut self) -> Result<(), RadioError>;

    fn standby(&mut self) -> Result<(), RadioError>;

    /// Drain pending IRQ bits. Must be invoked frequently (the engine
    /// calls it once per tick).
    fn process_irq(&mut self) -> Option<RadioEvent>;

    fn state(&self) -> RadioState;
}
