//! JTAG controller: owns the USB transport and the MPSSE command buffer,
//! and exposes the two primitive shift operations the engine composes.
//!
//! Grounded directly on the adapter's own `JtagController` (`configure`,
//! `close`, `set_frequency`, `write_tdi_read_tdo`, `write_tms_tdi_read_tdo`,
//! `_stack_cmd`, `sync`): commands accumulate in a buffer and are only
//! flushed once it would overflow the write FIFO, or when a read result is
//! actually needed.
use crate::bitvec::BitVector;
use crate::error::JtagError;
use crate::mpsse;
use crate::transport::UsbTransport;
use log::{debug, info};
use std::time::Duration;

/// Adapter-level configuration: everything that differs between "a JTAG
/// adapter" in the abstract and one particular FTDI part wired to one
/// particular board.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// `ftdi://<vendor>:<product>/<interface>` URL identifying the device.
    pub url: String,
    /// MPSSE master clock, fixed at 60 MHz on every FTDI part this backend
    /// targets.
    pub base_clock_hz: u32,
    /// Upper bound `set_frequency` will clamp to.
    pub max_frequency_hz: u32,
    /// Whether `TRST_BIT` should be driven as part of the JTAG pin group.
    /// When false, TRST is left as an input (high-z).
    pub drive_trst: bool,
    /// Bulk transfer timeout.
    pub usb_timeout: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            url: "ftdi://0403:6010/1".to_string(),
            base_clock_hz: 60_000_000,
            max_frequency_hz: 30_000_000,
            drive_trst: true,
            usb_timeout: Duration::from_millis(500),
        }
    }
}

/// Bridges XVC shift requests to FTDI MPSSE opcodes over USB.
pub struct JtagController {
    config: AdapterConfig,
    transport: Option<UsbTransport>,
    pending: Vec<u8>,
    pending_reads: usize,
    write_fifo_max: usize,
    read_fifo_max: usize,
}

impl JtagController {
    pub fn new(config: AdapterConfig) -> JtagController {
        JtagController {
            config,
            transport: None,
            pending: Vec::new(),
            pending_reads: 0,
            write_fifo_max: 0,
            read_fifo_max: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Opens the USB transport, puts the adapter in MPSSE mode and drives
    /// the JTAG pins to their idle levels. Returns an error if already
    /// configured.
    pub fn configure(&mut self) -> Result<(), JtagError> {
        if self.transport.is_some() {
            return Err(JtagError::AlreadyOpen);
        }
        let transport =
            UsbTransport::open(&self.config.url, self.config.usb_timeout).map_err(JtagError::DeviceUnavailable)?;
        // Reserve headroom for the trailing SEND_IMMEDIATE byte this
        // controller always appends before a flush.
        self.write_fifo_max = transport.fifo_len().saturating_sub(1);
        self.read_fifo_max = transport.fifo_len().saturating_sub(2);
        self.transport = Some(transport);

        let direction = if self.config.drive_trst {
            mpsse::JTAG_DIRECTION
        } else {
            mpsse::JTAG_DIRECTION & !mpsse::TRST_BIT
        };
        let outputs = if self.config.drive_trst {
            mpsse::JTAG_IDLE_OUTPUTS
        } else {
            mpsse::JTAG_IDLE_OUTPUTS & !mpsse::TRST_BIT
        };
        self.stack(&mpsse::set_bits_low(outputs, direction));
        self.stack(&mpsse::set_bits_high(0, 0));
        self.flush_no_read()?;
        info!("JTAG controller configured against {}", self.config.url);
        Ok(())
    }

    /// Closes the USB transport. Idempotent: calling this on an already-
    /// closed controller is a no-op, which is what a signal handler racing
    /// normal shutdown needs.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            debug!("JTAG controller closed");
        }
    }

    /// Sets the TCK frequency, clamped to `max_frequency_hz`. Returns the
    /// frequency the divisor arithmetic actually yields, which may be
    /// lower than requested (divisors are integral).
    pub fn set_frequency(&mut self, requested_hz: u32) -> Result<u32, JtagError> {
        if self.transport.is_none() {
            return Err(JtagError::NotOpen);
        }
        let clamped = requested_hz.min(self.config.max_frequency_hz).max(1);
        // MPSSE clock = base / ((1 + divisor) * 2)
        let divisor = (self.config.base_clock_hz / (2 * clamped)).saturating_sub(1);
        let divisor = divisor.min(u16::MAX as u32) as u16;
        self.stack(&mpsse::set_clock_divisor(divisor));
        self.flush_no_read()?;
        let actual = self.config.base_clock_hz / (2 * (divisor as u32 + 1));
        debug!("set TCK frequency: requested {} Hz, divisor {}, actual {} Hz", requested_hz, divisor, actual);
        Ok(actual)
    }

    /// Drives the TAP through 5 bits of TMS=1, returning it to
    /// Test-Logic-Reset, bypassing the engine's own chunking since this
    /// never needs TDI/TDO bookkeeping.
    pub fn reset_tap(&mut self) -> Result<(), JtagError> {
        let tms = BitVector::from_wire(&[0b0001_1111], 5).expect("5 bits fit one byte");
        let cmd = mpsse::encode_tms(&tms, true);
        self.stack(&cmd);
        self.flush_no_read()?;
        Ok(())
    }

    /// Shifts a whole-byte chunk of TDI, returning the captured TDO bytes.
    /// `data.len()` must not exceed this controller's round-trip maximum
    /// (`max_byte_chunk`).
    pub fn write_tdi_read_tdo(&mut self, data: &[u8]) -> Result<Vec<u8>, JtagError> {
        let max = self.max_byte_chunk();
        if data.len() > max {
            return Err(JtagError::ChunkTooLarge { got: data.len(), max });
        }
        self.stack(&mpsse::encode_bytes(data));
        self.flush_with_read(data.len())
    }

    /// Shifts 1..=8 bits of TDI, returning the captured TDO bits.
    pub fn write_bits_read_tdo(&mut self, bits: &BitVector) -> Result<BitVector, JtagError> {
        let len = bits.len();
        if len == 0 || len > mpsse::MAX_BIT_CHUNK {
            return Err(JtagError::InvalidLength { got: len, max: mpsse::MAX_BIT_CHUNK });
        }
        self.stack(&mpsse::encode_bits(bits));
        let response = self.flush_with_read(1)?;
        Ok(mpsse::decode_bit_response(response[0], len))
    }

    /// Shifts 1..=7 bits of TMS, holding TDI constant, returning the
    /// captured TDO bits.
    pub fn write_tms_read_tdo(&mut self, tms: &BitVector, tdi: bool) -> Result<BitVector, JtagError> {
        let len = tms.len();
        if len == 0 || len > mpsse::MAX_TMS_CHUNK {
            return Err(JtagError::InvalidLength { got: len, max: mpsse::MAX_TMS_CHUNK });
        }
        self.stack(&mpsse::encode_tms(tms, tdi));
        let response = self.flush_with_read(1)?;
        Ok(mpsse::decode_bit_response(response[0], len))
    }

    /// The largest whole-byte chunk a single round trip can carry without
    /// overflowing either FIFO.
    pub fn max_byte_chunk(&self) -> usize {
        self.read_fifo_max.max(1).min(self.write_fifo_max.saturating_sub(3).max(1))
    }

    pub fn read_fifo_len(&self) -> usize {
        self.read_fifo_max
    }

    pub fn write_fifo_len(&self) -> usize {
        self.write_fifo_max
    }

    fn stack(&mut self, cmd: &[u8]) {
        if self.pending.len() + cmd.len() + 1 >= self.write_fifo_max.max(cmd.len() + 1) {
            // Flushing here would require a read-back the caller hasn't
            // asked for yet; this only happens if a caller stacks more
            // than one command before reading, which no code path in this
            // crate does today.
            debug!("pending MPSSE buffer nearing FIFO limit before an expected flush");
        }
        self.pending.extend_from_slice(cmd);
    }

    fn flush_no_read(&mut self) -> Result<(), JtagError> {
        self.flush_with_read(0).map(|_| ())
    }

    fn flush_with_read(&mut self, expected_bytes: usize) -> Result<Vec<u8>, JtagError> {
        let transport = self.transport.as_ref().ok_or(JtagError::NotOpen)?;
        self.pending.push(mpsse::SEND_IMMEDIATE);
        transport.write(&self.pending)?;
        self.pending.clear();
        if expected_bytes == 0 {
            return Ok(Vec::new());
        }
        let data = transport.read_exact(expected_bytes)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_clamps_to_reasonable_values() {
        let config = AdapterConfig::default();
        assert!(config.max_frequency_hz <= config.base_clock_hz);
    }

    #[test]
    fn max_byte_chunk_reserves_opcode_framing_headroom() {
        let mut controller = JtagController::new(AdapterConfig::default());
        controller.write_fifo_max = 100;
        controller.read_fifo_max = 50;
        assert!(controller.max_byte_chunk() <= 50);
        assert!(controller.max_byte_chunk() <= 97);
    }
}
