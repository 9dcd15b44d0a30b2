//! SX1262 transceiver driver implementing the [`RadioDriver`] port over
//! `embedded-hal` SPI and GPIO traits. Command opcodes and register
//! addresses follow the SX126x datasheet.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use heapless::Vec;

use crate::config::RadioParams;
use crate::protocol::MAX_FRAME_LEN;
use crate::radio::{RadioDriver, RadioError, RadioEvent, RadioState};

#[allow(dead_code)]
mod opcode {
    pub const SET_SLEEP: u8 = 0x84;
    pub const SET_STANDBY: u8 = 0x80;
    pub const SET_TX: u8 = 0x83;
    pub const SET_RX: u8 = 0x82;
    pub const SET_REGULATOR_MODE: u8 = 0x96;
    pub const CALIBRATE: u8 = 0x89;
    pub const CALIBRATE_IMAGE: u8 = 0x98;
    pub const SET_PA_CONFIG: u8 = 0x95;

    pub const WRITE_REGISTER: u8 = 0x0D;
    pub const READ_REGISTER: u8 = 0x1D;
    pub const WRITE_BUFFER: u8 = 0x0E;
    pub const READ_BUFFER: u8 = 0x1E;

    pub const SET_DIO_IRQ_PARAMS: u8 = 0x08;
    pub const GET_IRQ_STATUS: u8 = 0x12;
    pub const CLEAR_IRQ_STATUS: u8 = 0x02;
    pub const SET_DIO2_AS_RF_SWITCH_CTRL: u8 = 0x9D;
    pub const SET_DIO3_AS_TCXO_CTRL: u8 = 0x97;

    pub const SET_RF_FREQUENCY: u8 = 0x86;
    pub const SET_PACKET_TYPE: u8 = 0x8A;
    pub const SET_TX_PARAMS: u8 = 0x8E;
    pub const SET_MODULATION_PARAMS: u8 = 0x8B;
    pub const SET_PACKET_PARAMS: u8 = 0x8C;
    pub const SET_BUFFER_BASE_ADDRESS: u8 = 0x8F;

    pub const GET_RX_BUFFER_STATUS: u8 = 0x13;
    pub const GET_PACKET_STATUS: u8 = 0x14;
    pub const GET_DEVICE_ERRORS: u8 = 0x17;
    pub const CLEAR_DEVICE_ERRORS: u8 = 0x07;
}

#[allow(dead_code)]
mod register {
    pub const IQ_POLARITY: u16 = 0x0736;
    pub const LORA_SYNC_WORD_MSB: u16 = 0x0740;
    pub const LORA_SYNC_WORD_LSB: u16 = 0x0741;
    pub const RX_GAIN: u16 = 0x08AC;
}

pub mod irq {
    pub const TX_DONE: u16 = 1 << 0;
    pub const RX_DONE: u16 = 1 << 1;
    pub const HEADER_ERR: u16 = 1 << 5;
    pub const CRC_ERR: u16 = 1 << 6;
    pub const TIMEOUT: u16 = 1 << 9;
    pub const ALL: u16 = 0x03FF;
}

/// Private LoRa sync word used by the whole network.
const LORA_SYNC_WORD: u8 = 0x12;

/// TX completion guard programmed into SET_TX, in 15.625 us ticks.
/// Roughly five seconds, far beyond any frame at the slowest settings.
const TX_TIMEOUT_TICKS: u32 = 320_000;

pub struct Sx1262<SPI, NSS, RESET, BUSY, DIO1, DELAY> {
    spi: SPI,
    nss: NSS,
    reset: RESET,
    busy: BUSY,
    dio1: DIO1,
    delay: DELAY,
    params: RadioParams,
    state: RadioState,
}

impl<SPI, NSS, RESET, BUSY, DIO1, DELAY, E> Sx1262<SPI, NSS, RESET, BUSY, DIO1, DELAY>
where
    SPI: SpiDevice<Error = E>,
    NSS: OutputPin,
    RESET: OutputPin,
    BUSY: InputPin,
    DIO1: InputPin,
    DELAY: DelayNs,
{
    pub fn new(spi: SPI, nss: NSS, reset: RESET, busy: BUSY, dio1: DIO1, delay: DELAY) -> Self {
        Self {
            spi,
            nss,
            reset,
            busy,
            dio1,
            delay,
            params: RadioParams::default(),
            state: RadioState::Sleep,
        }
    }

    fn hard_reset(&mut self) {
        let _ = self.reset.set_low();
        self.delay.delay_ms(1);
        let _ = self.reset.set_high();
        self.delay.delay_ms(10);
    }

    fn wait_busy(&mut self) -> Result<(), RadioError> {
        for _ in 0..100 {
            match self.busy.is_high() {
                Ok(false) => return Ok(()),
                Ok(true) => {}
                Err(_) => {}
            }
            self.delay.delay_ms(1);
        }
        Err(RadioError::BusyTimeout)
    }

    fn wait_busy_extended(&mut self) -> Result<(), RadioError> {
        // Calibration and TCXO start can hold BUSY for hundreds of ms.
        for _ in 0..500 {
            match self.busy.is_high() {
                Ok(false) => return Ok(()),
                Ok(true) => {}
                Err(_) => {}
            }
            self.delay.delay_ms(1);
        }
        Err(RadioError::BusyTimeout)
    }

    fn write_command(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.wait_busy()?;
        let _ = self.nss.set_low();
        let result = self.spi.write(data);
        let _ = self.nss.set_high();
        result.map_err(|_| RadioError::Spi)
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), RadioError> {
        self.wait_busy()?;
        let _ = self.nss.set_low();
        let result = self.spi.transfer(rx, tx);
        let _ = self.nss.set_high();
        result.map_err(|_| RadioError::Spi)
    }

    fn write_register(&mut self, addr: u16, value: u8) -> Result<(), RadioError> {
        self.write_command(&[opcode::WRITE_REGISTER, (addr >> 8) as u8, addr as u8, value])
    }

    fn read_register(&mut self, addr: u16) -> Result<u8, RadioError> {
        let mut rx = [0u8; 5];
        self.transfer(
            &[opcode::READ_REGISTER, (addr >> 8) as u8, addr as u8, 0x00],
            &mut rx,
        )?;
        Ok(rx[4])
    }

    fn get_irq_status(&mut self) -> Result<u16, RadioError> {
        let mut rx = [0u8; 4];
        self.transfer(&[opcode::GET_IRQ_STATUS, 0, 0, 0], &mut rx)?;
        Ok(((rx[2] as u16) << 8) | (rx[3] as u16))
    }

    fn clear_irq(&mut self, flags: u16) -> Result<(), RadioError> {
        self.write_command(&[opcode::CLEAR_IRQ_STATUS, (flags >> 8) as u8, flags as u8])
    }

    fn clear_errors(&mut self) -> Result<(), RadioError> {
        self.write_command(&[opcode::CLEAR_DEVICE_ERRORS, 0x00, 0x00])
    }

    fn configure(&mut self, params: &RadioParams) -> Result<(), RadioError> {
        log::info!(
            "[sx1262] freq={} Hz sf={} bw={} cr={} pwr={} dBm preamble={} iq_inv={}",
            params.frequency_hz,
            params.spreading_factor,
            params.bandwidth,
            params.coding_rate,
            params.tx_power_dbm,
            params.preamble_length,
            params.iq_inverted
        );

        if params.spreading_factor < 7 || params.spreading_factor > 12 {
            return Err(RadioError::InvalidConfig);
        }
        if params.bandwidth > 6 {
            return Err(RadioError::InvalidConfig);
        }

        let freq_reg = freq_to_reg(params.frequency_hz);
        self.write_command(&[
            opcode::SET_RF_FREQUENCY,
            (freq_reg >> 24) as u8,
            (freq_reg >> 16) as u8,
            (freq_reg >> 8) as u8,
            freq_reg as u8,
        ])?;

        self.write_command(&[opcode::SET_PA_CONFIG, 0x04, 0x07, 0x00, 0x01])?;

        let power = params.tx_power_dbm.clamp(-9, 22) as u8;
        self.write_command(&[opcode::SET_TX_PARAMS, power.wrapping_add(9), 0x04])?;

        let ldro = if ldro_required(params.spreading_factor, params.bandwidth) {
            0x01
        } else {
            0x00
        };
        self.write_command(&[
            opcode::SET_MODULATION_PARAMS,
            params.spreading_factor,
            params.bandwidth,
            params.coding_rate,
            ldro,
        ])?;

        self.write_command(&[
            opcode::SET_PACKET_PARAMS,
            (params.preamble_length >> 8) as u8,
            params.preamble_length as u8,
            0x00, // explicit header
            MAX_FRAME_LEN as u8,
            0x01, // CRC on
            0x00,
        ])?;

        let mut iq_cfg = self.read_register(register::IQ_POLARITY)?;
        if params.iq_inverted {
            iq_cfg &= !0x04;
        } else {
            iq_cfg |= 0x04;
        }
        self.write_register(register::IQ_POLARITY, iq_cfg)?;

        let sync_msb = (LORA_SYNC_WORD & 0xF0) | 0x04;
        let sync_lsb = ((LORA_SYNC_WORD & 0x0F) << 4) | 0x04;
        self.write_register(register::LORA_SYNC_WORD_MSB, sync_msb)?;
        self.write_register(register::LORA_SYNC_WORD_LSB, sync_lsb)?;

        self.write_command(&[opcode::SET_BUFFER_BASE_ADDRESS, 0x00, 0x00])?;

        self.write_command(&[
            opcode::SET_DIO_IRQ_PARAMS,
            (irq::ALL >> 8) as u8,
            irq::ALL as u8,
            (irq::ALL >> 8) as u8,
            irq::ALL as u8,
            0x00,
            0x00,
            0x00,
            0x00,
        ])?;

        // Boosted RX gain.
        self.write_register(register::RX_GAIN, 0x96)?;

        self.params = params.clone();
        Ok(())
    }

    fn read_rx_frame(&mut self) -> Result<(Vec<u8, MAX_FRAME_LEN>, i16, i8), RadioError> {
        let mut buf_status = [0u8; 4];
        self.transfer(&[opcode::GET_RX_BUFFER_STATUS, 0, 0, 0], &mut buf_status)?;
        let payload_len = buf_status[2] as usize;
        let start_offset = buf_status[3];

        let mut pkt_status = [0u8; 5];
        self.transfer(&[opcode::GET_PACKET_STATUS, 0, 0, 0, 0], &mut pkt_status)?;
        let rssi = -((pkt_status[2] as i16) / 2);
        let snr = (pkt_status[3] as i8) / 4;

        if payload_len == 0 || payload_len > MAX_FRAME_LEN {
            return Err(RadioError::BufferOverflow);
        }

        let mut read_cmd = [0u8; MAX_FRAME_LEN + 3];
        read_cmd[0] = opcode::READ_BUFFER;
        read_cmd[1] = start_offset;
        read_cmd[2] = 0;

        let total = payload_len + 3;
        let mut rx_buf = [0u8; MAX_FRAME_LEN + 3];
        self.transfer(&read_cmd[..total], &mut rx_buf[..total])?;

        let mut data = Vec::new();
        for &b in &rx_buf[3..total] {
            let _ = data.push(b);
        }
        Ok((data, rssi, snr))
    }
}

impl<SPI, NSS, RESET, BUSY, DIO1, DELAY, E> RadioDriver for Sx1262<SPI, NSS, RESET, BUSY, DIO1, DELAY>
where
    SPI: SpiDevice<Error = E>,
    NSS: OutputPin,
    RESET: OutputPin,
    BUSY: InputPin,
    DIO1: InputPin,
    DELAY: DelayNs,
{
    fn begin(&mut self, params: &RadioParams) -> Result<(), RadioError> {
        self.hard_reset();
        self.wait_busy_extended()?;

        // DIO3 drives the TCXO at 1.8 V, 6.4 ms startup.
        self.write_command(&[opcode::SET_DIO3_AS_TCXO_CTRL, 0x02, 0x00, 0x01, 0x40])?;
        self.delay.delay_ms(10);
        self.wait_busy_extended()?;

        self.write_command(&[opcode::SET_STANDBY, 0x01])?;
        self.state = RadioState::Standby;
        self.wait_busy()?;

        // DC-DC regulator.
        self.write_command(&[opcode::SET_REGULATOR_MODE, 0x01])?;
        self.wait_busy()?;

        self.write_command(&[opcode::CALIBRATE, 0x7F])?;
        self.wait_busy_extended()?;
        self.clear_errors()?;

        // Image calibration for the 863..870 MHz band.
        self.write_command(&[opcode::CALIBRATE_IMAGE, 0xD7, 0xDB])?;
        self.wait_busy()?;

        self.write_command(&[opcode::SET_DIO2_AS_RF_SWITCH_CTRL, 0x01])?;
        self.write_command(&[opcode::SET_PACKET_TYPE, 0x01])?;

        self.configure(params)
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        if frame.is_empty() || frame.len() > MAX_FRAME_LEN {
            return Err(RadioError::BufferOverflow);
        }

        self.standby()?;

        let mut cmd: Vec<u8, { MAX_FRAME_LEN + 2 }> = Vec::new();
        let _ = cmd.push(opcode::WRITE_BUFFER);
        let _ = cmd.push(0x00);
        let _ = cmd.extend_from_slice(frame);
        self.write_command(&cmd)?;

        self.write_command(&[
            opcode::SET_PACKET_PARAMS,
            (self.params.preamble_length >> 8) as u8,
            self.params.preamble_length as u8,
            0x00,
            frame.len() as u8,
            0x01,
            0x00,
        ])?;

        self.clear_irq(irq::ALL)?;
        self.write_command(&[
            opcode::SET_TX,
            (TX_TIMEOUT_TICKS >> 16) as u8,
            (TX_TIMEOUT_TICKS >> 8) as u8,
            TX_TIMEOUT_TICKS as u8,
        ])?;
        self.state = RadioState::Tx;
        Ok(())
    }

    fn enter_rx_continuous(&mut self) -> Result<(), RadioError> {
        self.standby()?;
        self.clear_irq(irq::ALL)?;
        // 0xFFFFFF keeps the receiver open until told otherwise.
        self.write_command(&[opcode::SET_RX, 0xFF, 0xFF, 0xFF])?;
        self.state = RadioState::Rx;
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), RadioError> {
        if self.state == RadioState::Sleep {
            return Ok(());
        }
        // Sleep entry is only legal from standby; warm start retains the
        // configuration.
        self.write_command(&[opcode::SET_STANDBY, 0x01])?;
        self.write_command(&[opcode::SET_SLEEP, 0x04])?;
        self.state = RadioState::Sleep;
        Ok(())
    }

    fn standby(&mut self) -> Result<(), RadioError> {
        if self.state == RadioState::Sleep {
            // NSS low wakes the chip from sleep.
            let _ = self.nss.set_low();
            self.delay.delay_ms(1);
            let _ = self.nss.set_high();
            self.wait_busy_extended()?;
        }
        self.write_command(&[opcode::SET_STANDBY, 0x01])?;
        self.state = RadioState::Standby;
        Ok(())
    }

    fn process_irq(&mut self) -> Option<RadioEvent> {
        if !self.dio1.is_high().unwrap_or(false) {
            return None;
        }

        let status = self.get_irq_status().ok()?;
        let _ = self.clear_irq(irq::ALL);

        match self.state {
            RadioState::Tx => {
                if status & irq::TX_DONE != 0 {
                    self.state = RadioState::Standby;
                    return Some(RadioEvent::TxDone);
                }
                if status & irq::TIMEOUT != 0 {
                    self.state = RadioState::Standby;
                    return Some(RadioEvent::TxTimeout);
                }
                None
            }
            RadioState::Rx => {
                if status & (irq::CRC_ERR | irq::HEADER_ERR) != 0 {
                    log::debug!("[sx1262] rx crc/header error");
                    return None;
                }
                if status & irq::RX_DONE != 0 {
                    match self.read_rx_frame() {
                        Ok((data, rssi_dbm, snr_db)) => {
                            return Some(RadioEvent::RxDone {
                                data,
                                rssi_dbm,
                                snr_db,
                            })
                        }
                        Err(e) => {
                            log::warn!("[sx1262] rx read failed: {:?}", e);
                            return None;
                        }
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn state(&self) -> RadioState {
        self.state
    }
}

#[inline]
fn freq_to_reg(frequency_hz: u32) -> u32 {
    ((frequency_hz as u64 * (1 << 25)) / 32_000_000) as u32
}

fn bandwidth_hz(code: u8) -> u32 {
    match code {
        0x00 => 7_810,
        0x01 => 15_630,
        0x02 => 31_250,
        0x03 => 62_500,
        0x04 => 125_000,
        0x05 => 250_000,
        0x06 => 500_000,
        _ => 125_000,
    }
}

/// Low data rate optimization is mandatory once the symbol time passes
/// 16.38 ms.
fn ldro_required(spreading_factor: u8, bandwidth: u8) -> bool {
    let symbol_time_us = ((1u32 << spreading_factor) * 1_000_000) / bandwidth_hz(bandwidth);
    symbol_time_us > 16_380
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embedded_hal::spi::Operation;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct FakeSpi {
        writes: StdVec<StdVec<u8>>,
        responses: VecDeque<StdVec<u8>>,
    }

    impl embedded_hal::spi::ErrorType for FakeSpi {
        type Error = Infallible;
    }

    impl SpiDevice<u8> for FakeSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
            for op in operations {
                match op {
                    Operation::Write(w) => self.writes.push(w.to_vec()),
                    Operation::Transfer(r, w) => {
                        self.writes.push(w.to_vec());
                        let resp = self.responses.pop_front().unwrap_or_default();
                        for (i, b) in r.iter_mut().enumerate() {
                            *b = resp.get(i).copied().unwrap_or(0);
                        }
                    }
                    Operation::Read(r) => r.fill(0),
                    Operation::TransferInPlace(_) => {}
                    Operation::DelayNs(_) => {}
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeOutput;

    impl embedded_hal::digital::ErrorType for FakeOutput {
        type Error = Infallible;
    }

    impl OutputPin for FakeOutput {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct FakeInput {
        high: Rc<Cell<bool>>,
    }

    impl FakeInput {
        fn new(high: bool) -> Self {
            Self {
                high: Rc::new(Cell::new(high)),
            }
        }
    }

    impl embedded_hal::digital::ErrorType for FakeInput {
        type Error = Infallible;
    }

    impl InputPin for FakeInput {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high.get())
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high.get())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn make_radio(
        dio1: FakeInput,
    ) -> Sx1262<FakeSpi, FakeOutput, FakeOutput, FakeInput, FakeInput, NoDelay> {
        Sx1262::new(
            FakeSpi::default(),
            FakeOutput,
            FakeOutput,
            FakeInput::new(false),
            dio1,
            NoDelay,
        )
    }

    fn spi(radio: &mut Sx1262<FakeSpi, FakeOutput, FakeOutput, FakeInput, FakeInput, NoDelay>) -> &mut FakeSpi {
        &mut radio.spi
    }

    #[test]
    fn test_freq_to_reg() {
        // 868 MHz with a 32 MHz crystal and a 2^25 divider.
        assert_eq!(freq_to_reg(868_000_000), 0x3640_0000);
        assert_eq!(freq_to_reg(915_000_000), 0x3930_0000);
    }

    #[test]
    fn test_ldro_rule() {
        assert!(!ldro_required(7, 0x04));
        assert!(!ldro_required(10, 0x04));
        assert!(ldro_required(11, 0x04));
        assert!(ldro_required(12, 0x04));
        assert!(!ldro_required(11, 0x05));
    }

    #[test]
    fn test_begin_programs_frequency_and_sync_word() {
        let dio1 = FakeInput::new(false);
        let mut radio = make_radio(dio1);
        // IQ polarity register read during configure.
        spi(&mut radio).responses.push_back(vec![0, 0, 0, 0, 0x0D]);

        radio.begin(&RadioParams::default()).unwrap();
        assert_eq!(radio.state(), RadioState::Standby);

        let writes = &radio.spi.writes;
        assert!(writes
            .iter()
            .any(|w| w.as_slice() == [opcode::SET_RF_FREQUENCY, 0x36, 0x40, 0x00, 0x00]));
        // Sync word 0x12 nibbles land in 0x0740/0x0741 with the 0x?4 pad.
        assert!(writes
            .iter()
            .any(|w| w.as_slice() == [opcode::WRITE_REGISTER, 0x07, 0x40, 0x14]));
        assert!(writes
            .iter()
            .any(|w| w.as_slice() == [opcode::WRITE_REGISTER, 0x07, 0x41, 0x24]));
    }

    #[test]
    fn test_begin_rejects_invalid_modulation() {
        let mut radio = make_radio(FakeInput::new(false));
        let mut params = RadioParams::default();
        params.spreading_factor = 6;
        assert_eq!(radio.begin(&params), Err(RadioError::InvalidConfig));
    }

    #[test]
    fn test_send_enters_tx_and_completion_is_polled() {
        let dio1 = FakeInput::new(false);
        let flag = dio1.high.clone();
        let mut radio = make_radio(dio1.clone());
        spi(&mut radio).responses.push_back(vec![0, 0, 0, 0, 0x0D]);
        radio.begin(&RadioParams::default()).unwrap();

        radio.send(b"\x01\x01\x01\x03\x01\x00\x01").unwrap();
        assert_eq!(radio.state(), RadioState::Tx);
        assert!(radio.spi.writes.iter().any(|w| w[0] == opcode::SET_TX));

        // Nothing pending while DIO1 is low.
        assert!(radio.process_irq().is_none());

        flag.set(true);
        spi(&mut radio).responses.push_back(vec![0, 0, 0x00, 0x01]); // TX_DONE
        match radio.process_irq() {
            Some(RadioEvent::TxDone) => {}
            other => panic!("expected TxDone, got {:?}", other),
        }
        assert_eq!(radio.state(), RadioState::Standby);
    }

    #[test]
    fn test_tx_timeout_event() {
        let dio1 = FakeInput::new(false);
        let flag = dio1.high.clone();
        let mut radio = make_radio(dio1.clone());
        spi(&mut radio).responses.push_back(vec![0, 0, 0, 0, 0x0D]);
        radio.begin(&RadioParams::default()).unwrap();
        radio.send(b"\x01\x01\x01\x03\x01\x00\x01").unwrap();

        flag.set(true);
        spi(&mut radio).responses.push_back(vec![0, 0, 0x02, 0x00]); // TIMEOUT
        assert!(matches!(radio.process_irq(), Some(RadioEvent::TxTimeout)));
        assert_eq!(radio.state(), RadioState::Standby);
    }

    #[test]
    fn test_rx_frame_is_read_with_signal_quality() {
        let dio1 = FakeInput::new(false);
        let flag = dio1.high.clone();
        let mut radio = make_radio(dio1.clone());
        spi(&mut radio).responses.push_back(vec![0, 0, 0, 0, 0x0D]);
        radio.begin(&RadioParams::default()).unwrap();
        radio.enter_rx_continuous().unwrap();
        assert_eq!(radio.state(), RadioState::Rx);

        flag.set(true);
        let spi = spi(&mut radio);
        spi.responses.push_back(vec![0, 0, 0x00, 0x02]); // RX_DONE
        spi.responses.push_back(vec![0, 0, 5, 0]); // len 5 at offset 0
        spi.responses.push_back(vec![0, 0, 120, 20, 0]); // rssi -60, snr 5
        let mut frame = vec![0, 0, 0];
        frame.extend_from_slice(b"hello");
        spi.responses.push_back(frame);

        match radio.process_irq() {
            Some(RadioEvent::RxDone {
                data,
                rssi_dbm,
                snr_db,
            }) => {
                assert_eq!(&data[..], b"hello");
                assert_eq!(rssi_dbm, -60);
                assert_eq!(snr_db, 5);
            }
            _ => panic!("expected RxDone"),
        }
    }

    #[test]
    fn test_crc_error_is_swallowed() {
        let dio1 = FakeInput::new(false);
        let flag = dio1.high.clone();
        let mut radio = make_radio(dio1.clone());
        spi(&mut radio).responses.push_back(vec![0, 0, 0, 0, 0x0D]);
        radio.begin(&RadioParams::default()).unwrap();
        radio.enter_rx_continuous().unwrap();

        flag.set(true);
        spi(&mut radio).responses.push_back(vec![0, 0, 0x00, 0x42]); // RX_DONE | CRC_ERR
        assert!(radio.process_irq().is_none());
        assert_eq!(radio.state(), RadioState::Rx);
    }
}
