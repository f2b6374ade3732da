//! Software `XvcServer` backend used by this crate's integration tests.
//!
//! `FakeJtag` implements the trait with a plain loopback: shifted TDI
//! bits come back unchanged as TDO. That's enough to exercise the wire
//! protocol, framing, and the length-preservation invariant end to end
//! without needing real hardware. It deliberately does not reimplement
//! the FTDI backend's MPSSE partitioning or ISE Capture-IR workaround —
//! those are unit-tested directly in `xvc-server-ftdi`.
use std::sync::Mutex;
use xvc_server::XvcServer;

pub struct FakeJtag {
    max_frequency_hz: Mutex<u32>,
}

impl FakeJtag {
    pub fn new(max_frequency_hz: u32) -> FakeJtag {
        FakeJtag {
            max_frequency_hz: Mutex::new(max_frequency_hz),
        }
    }
}

impl Default for FakeJtag {
    fn default() -> Self {
        FakeJtag::new(1_000_000)
    }
}

impl XvcServer for FakeJtag {
    fn set_tck(&self, period_ns: u32) -> u32 {
        let max_hz = *self.max_frequency_hz.lock().expect("mutex poisoned");
        let requested_hz = if period_ns == 0 {
            u32::MAX
        } else {
            (1_000_000_000u64 / period_ns as u64).min(u32::MAX as u64) as u32
        };
        let actual_hz = requested_hz.min(max_hz).max(1);
        (1_000_000_000u64 / actual_hz as u64) as u32
    }

    fn shift(&self, num_bits: u32, _tms: Box<[u8]>, tdi: Box<[u8]>) -> Box<[u8]> {
        let len = num_bits.div_ceil(8) as usize;
        let mut out = tdi.into_vec();
        out.resize(len, 0);
        out.into_boxed_slice()
    }

    fn max_vector_len(&self) -> u32 {
        4096
    }
}
