//! Error types for the FTDI/MPSSE backend.
//!
//! Follows the hand-written `Display`/`Error`/`From` style already used by
//! [`xvc_protocol::error::ReadError`] rather than a derive-macro error
//! crate, to keep error handling consistent across this workspace.
use std::{error::Error, fmt::Display, time::Duration};

/// Errors from the USB bulk transport.
#[derive(Debug)]
pub enum UsbError {
    /// The underlying libusb transfer failed for a reason other than a
    /// timeout.
    Transfer(rusb::Error),
    /// A bulk transfer did not complete within its configured deadline.
    Timeout { requested: usize, timeout: Duration },
    /// A read returned fewer bytes than the caller demanded, even though
    /// the transfer itself did not time out or error.
    ShortRead { expected: usize, got: usize },
    /// No FTDI device matched the requested URL.
    DeviceNotFound { url: String },
    /// The URL could not be parsed as `ftdi://<vendor>:<product>/<interface>`.
    InvalidUrl { url: String, reason: &'static str },
}

impl From<rusb::Error> for UsbError {
    fn from(value: rusb::Error) -> Self {
        match value {
            rusb::Error::Timeout => UsbError::Timeout {
                requested: 0,
                timeout: Duration::ZERO,
            },
            other => UsbError::Transfer(other),
        }
    }
}

impl Display for UsbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsbError::Transfer(e) => write!(f, "USB transfer error: {}", e),
            UsbError::Timeout {
                requested,
                timeout,
            } => write!(
                f,
                "USB transfer of {} bytes timed out after {:?}",
                requested, timeout
            ),
            UsbError::ShortRead { expected, got } => write!(
                f,
                "USB read returned {} bytes, expected {}",
                got, expected
            ),
            UsbError::DeviceNotFound { url } => {
                write!(f, "no FTDI device found for URL '{}'", url)
            }
            UsbError::InvalidUrl { url, reason } => {
                write!(f, "invalid FTDI URL '{}': {}", url, reason)
            }
        }
    }
}

impl Error for UsbError {}

/// Errors from the JTAG controller and shift engine.
#[derive(Debug)]
pub enum JtagError {
    /// `configure()` was called on a controller that is already open.
    AlreadyOpen,
    /// An operation requiring an open controller was called before
    /// `configure()` or after `close()`.
    NotOpen,
    /// A bit-chunk fell outside the range the MPSSE opcode family
    /// supports (1..=8 for bulk bit ops, 1..=7 for TMS ops). Indicates a
    /// bug in the shift engine's own chunking, not bad client input.
    InvalidLength { got: usize, max: usize },
    /// The caller requested a byte chunk larger than both FIFOs can hold
    /// in one round trip, bypassing the engine's own chunking.
    ChunkTooLarge { got: usize, max: usize },
    /// The adapter could not be opened at startup.
    DeviceUnavailable(UsbError),
    /// Wraps a transport failure encountered mid-shift.
    Usb(UsbError),
}

impl From<UsbError> for JtagError {
    fn from(value: UsbError) -> Self {
        JtagError::Usb(value)
    }
}

impl From<crate::bitvec::InvalidLength> for JtagError {
    fn from(value: crate::bitvec::InvalidLength) -> Self {
        JtagError::InvalidLength {
            got: value.bit_len,
            max: value.available_bits,
        }
    }
}

impl Display for JtagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JtagError::AlreadyOpen => write!(f, "JTAG controller is already configured"),
            JtagError::NotOpen => write!(f, "JTAG controller is not configured"),
            JtagError::InvalidLength { got, max } => {
                write!(f, "invalid bit-chunk length {} (max {})", got, max)
            }
            JtagError::ChunkTooLarge { got, max } => {
                write!(f, "chunk of {} bytes exceeds round-trip maximum of {}", got, max)
            }
            JtagError::DeviceUnavailable(e) => write!(f, "device unavailable: {}", e),
            JtagError::Usb(e) => write!(f, "{}", e),
        }
    }
}

impl Error for JtagError {}
