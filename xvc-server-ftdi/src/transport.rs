//! USB bulk transport to an FTDI MPSSE-capable adapter.
//!
//! Chunked bulk write/read over `rusb` follows the same shape as
//! `adamgreig-ffp`'s `Programmer::write` (one bulk OUT/IN round trip per
//! chunk, with a timeout and a short-read check on every chunk) but adds
//! the two FTDI-specific wrinkles that device has none of: every bulk IN
//! transfer is prefixed by two modem-status bytes the caller never asked
//! for, and the adapter must be put into MPSSE mode with vendor control
//! requests before any bulk traffic makes sense.
use crate::error::UsbError;
use log::{debug, trace};
use std::time::Duration;

const FTDI_VENDOR_REQUEST: u8 = 0x40;
const SIO_RESET: u8 = 0x00;
const SIO_SET_LATENCY_TIMER: u8 = 0x09;
const SIO_SET_BITMODE: u8 = 0x0B;
const BITMODE_RESET: u16 = 0x00;
const BITMODE_MPSSE: u16 = 0x02;
const SIO_RESET_PURGE_RX: u16 = 1;
const SIO_RESET_PURGE_TX: u16 = 2;

/// Number of bytes an FTDI device prepends to every bulk IN transfer
/// (modem status + line status), which never carry payload data.
const STATUS_BYTES: usize = 2;

/// Chip families this transport recognises, each with a known FIFO depth.
/// Mirrors the per-chip FIFO table the donor adapter queries from pyftdi;
/// without a pyusb-style descriptor database we key off the USB bcdDevice
/// field instead, falling back to the smallest known FIFO when unsure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipType {
    Ft2232h,
    Ft232h,
    Ft4232h,
    Other,
}

impl ChipType {
    /// `major`/`minor` come from the device descriptor's `bcdDevice` field,
    /// which FTDI uses as a de facto chip-family tag (0x0700 = FT2232H,
    /// 0x0800 = FT4232H, 0x0900 = FT232H).
    fn from_bcd_device(major: u8, minor: u8) -> ChipType {
        match (major, minor) {
            (0x07, 0x00) => ChipType::Ft2232h,
            (0x09, 0x00) => ChipType::Ft232h,
            (0x08, 0x00) => ChipType::Ft4232h,
            _ => ChipType::Other,
        }
    }

    /// FIFO depth in bytes, read and write side (FTDI's H-series parts use
    /// the same depth for both directions).
    pub fn fifo_len(self) -> usize {
        match self {
            ChipType::Ft2232h | ChipType::Ft232h | ChipType::Ft4232h => 4096,
            ChipType::Other => 384,
        }
    }
}

/// A parsed `ftdi://<vendor>:<product>/<interface>` adapter URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtdiUrl {
    pub vendor: u16,
    pub product: u16,
    pub interface: u8,
}

impl FtdiUrl {
    pub fn parse(url: &str) -> Result<FtdiUrl, UsbError> {
        let invalid = |reason: &'static str| UsbError::InvalidUrl {
            url: url.to_string(),
            reason,
        };
        let rest = url.strip_prefix("ftdi://").ok_or_else(|| invalid("missing 'ftdi://' scheme"))?;
        let (ids, interface) = rest.split_once('/').ok_or_else(|| invalid("missing '/<interface>'"))?;
        let (vendor, product) = ids.split_once(':').ok_or_else(|| invalid("missing '<vendor>:<product>'"))?;
        let vendor = u16::from_str_radix(vendor, 16).map_err(|_| invalid("vendor id is not hex"))?;
        let product = u16::from_str_radix(product, 16).map_err(|_| invalid("product id is not hex"))?;
        let interface: u8 = interface.parse().map_err(|_| invalid("interface is not a number"))?;
        Ok(FtdiUrl { vendor, product, interface })
    }

    fn endpoints(self) -> (u8, u8) {
        let n = self.interface + 1;
        (n, 0x80 | n)
    }
}

/// An open bulk transport to one FTDI MPSSE interface.
pub struct UsbTransport {
    handle: rusb::DeviceHandle<rusb::Context>,
    interface: u8,
    out_ep: u8,
    in_ep: u8,
    chip: ChipType,
    timeout: Duration,
}

impl UsbTransport {
    /// Opens the device matching `url`, claims its interface, resets it
    /// and switches it into MPSSE mode. Bulk traffic is not meaningful
    /// before this returns.
    pub fn open(url: &str, timeout: Duration) -> Result<UsbTransport, UsbError> {
        let parsed = FtdiUrl::parse(url)?;
        let context = rusb::Context::new()?;
        let devices = context.devices()?;
        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if descriptor.vendor_id() != parsed.vendor || descriptor.product_id() != parsed.product {
                continue;
            }
            let mut handle = device.open()?;
            let _ = handle.set_auto_detach_kernel_driver(true);
            handle.claim_interface(parsed.interface)?;
            let (out_ep, in_ep) = parsed.endpoints();
            let version = descriptor.device_version();
            let chip = ChipType::from_bcd_device(version.major(), version.minor());
            let mut transport = UsbTransport {
                handle,
                interface: parsed.interface,
                out_ep,
                in_ep,
                chip,
                timeout,
            };
            transport.reset_and_enter_mpsse()?;
            debug!("opened {} (chip {:?}, endpoints out={:#04x} in={:#04x})", url, chip, out_ep, in_ep);
            return Ok(transport);
        }
        Err(UsbError::DeviceNotFound { url: url.to_string() })
    }

    fn reset_and_enter_mpsse(&mut self) -> Result<(), UsbError> {
        self.vendor_out(SIO_RESET, 0)?;
        self.vendor_out(SIO_SET_BITMODE, BITMODE_RESET)?;
        self.vendor_out(SIO_SET_BITMODE, (BITMODE_MPSSE << 8) | 0x00FF)?;
        self.vendor_out(SIO_SET_LATENCY_TIMER, 1)?;
        self.purge()?;
        Ok(())
    }

    fn vendor_out(&self, request: u8, value: u16) -> Result<(), UsbError> {
        self.handle
            .write_control(FTDI_VENDOR_REQUEST, request, value, 0, &[], self.timeout)?;
        Ok(())
    }

    /// Discards anything sitting in either FIFO, for use after an error or
    /// before the first command of a session.
    pub fn purge(&self) -> Result<(), UsbError> {
        self.vendor_out(SIO_RESET, SIO_RESET_PURGE_RX)?;
        self.vendor_out(SIO_RESET, SIO_RESET_PURGE_TX)?;
        Ok(())
    }

    /// FIFO depth this transport believes the adapter has, in bytes.
    pub fn fifo_len(&self) -> usize {
        self.chip.fifo_len()
    }

    /// Writes the whole command buffer in FIFO-sized chunks.
    pub fn write(&self, data: &[u8]) -> Result<(), UsbError> {
        for chunk in data.chunks(self.fifo_len()) {
            trace!("usb write {} bytes", chunk.len());
            let n = self.handle.write_bulk(self.out_ep, chunk, self.timeout)?;
            if n != chunk.len() {
                return Err(UsbError::ShortRead {
                    expected: chunk.len(),
                    got: n,
                });
            }
        }
        Ok(())
    }

    /// Reads exactly `len` payload bytes, transparently stripping the two
    /// status bytes FTDI prepends to every bulk IN transfer.
    pub fn read_exact(&self, len: usize) -> Result<Vec<u8>, UsbError> {
        let mut out = Vec::with_capacity(len);
        let chunk_payload = self.fifo_len().saturating_sub(STATUS_BYTES).max(1);
        while out.len() < len {
            let want = (len - out.len()).min(chunk_payload);
            let mut buf = vec![0u8; want + STATUS_BYTES];
            let n = self.handle.read_bulk(self.in_ep, &mut buf, self.timeout)?;
            if n < STATUS_BYTES {
                return Err(UsbError::ShortRead { expected: want, got: 0 });
            }
            let payload = &buf[STATUS_BYTES..n];
            trace!("usb read {} payload bytes (of {} requested)", payload.len(), want);
            out.extend_from_slice(payload);
        }
        out.truncate(len);
        Ok(out)
    }

    /// Releases the claimed interface. Called from `Drop` as well, so this
    /// is safe to call more than once.
    pub fn close(&mut self) {
        let _ = self.handle.release_interface(self.interface);
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_url() {
        let url = FtdiUrl::parse("ftdi://0403:6010/1").unwrap();
        assert_eq!(url.vendor, 0x0403);
        assert_eq!(url.product, 0x6010);
        assert_eq!(url.interface, 1);
    }

    #[test]
    fn endpoints_follow_interface_plus_one_convention() {
        let url = FtdiUrl::parse("ftdi://0403:6010/0").unwrap();
        assert_eq!(url.endpoints(), (0x01, 0x81));
        let url = FtdiUrl::parse("ftdi://0403:6010/1").unwrap();
        assert_eq!(url.endpoints(), (0x02, 0x82));
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(FtdiUrl::parse("usb://0403:6010/0").is_err());
        assert!(FtdiUrl::parse("ftdi://0403/0").is_err());
        assert!(FtdiUrl::parse("ftdi://0403:6010").is_err());
        assert!(FtdiUrl::parse("ftdi://zzzz:6010/0").is_err());
    }

    #[test]
    fn chip_fifo_len_defaults_conservatively() {
        assert_eq!(ChipType::Other.fifo_len(), 384);
        assert_eq!(ChipType::Ft232h.fifo_len(), 4096);
    }
}
