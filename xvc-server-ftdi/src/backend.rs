//! `XvcServer` trait implementation: the hardware-facing half of the XVC
//! protocol handler. Converts wire bytes to bit-vectors and back, applies
//! the ISE Capture-IR workaround, and drives the shift engine.
//!
//! Grounded on the donor's own `impl XvcServer for ...` backends (log at
//! each stage, return an empty box on shift error since the XVC 1.0
//! protocol has no error channel) and on the original server's Capture-IR
//! workaround check.
use crate::bitvec::BitVector;
use crate::controller::JtagController;
use crate::engine;
use crate::tap::{track, TapState};
use log::{error, trace, warn};
use std::sync::Mutex;
use xvc_server::XvcServer;

/// The 5-bit TMS pattern (index 0 first: 1,0,1,1,1) that, from Exit1-IR,
/// triggers the Capture-IR workaround. Wire-packed LSB-first this is
/// `0x1D`.
const ISE_WORKAROUND_TMS: u8 = 0x1D;
const ISE_WORKAROUND_LEN: u32 = 5;
/// The TDO response the workaround returns without touching hardware:
/// 5 bits, all set, wire-packed.
const ISE_WORKAROUND_TDO: u8 = 0x1F;

/// Pulled out of `shift` so the decision can be unit-tested without a
/// hardware-backed controller.
fn is_ise_workaround(tap_state: TapState, num_bits: u32, tms: &[u8]) -> bool {
    num_bits == ISE_WORKAROUND_LEN
        && tap_state == TapState::Exit1Ir
        && tms.first() == Some(&ISE_WORKAROUND_TMS)
}

struct State {
    controller: JtagController,
    tap_state: TapState,
}

/// Bridges `xvc-server`'s blocking, `&self`-based trait to the FTDI
/// controller and shift engine, which need `&mut self`. The donor's own
/// backends face the same mismatch and resolve it the same way: one
/// mutex around the whole device, since only one client is ever being
/// served at a time anyway.
pub struct FtdiBackend {
    state: Mutex<State>,
}

impl FtdiBackend {
    /// Takes ownership of an already-`configure`d controller.
    pub fn new(controller: JtagController) -> FtdiBackend {
        FtdiBackend {
            state: Mutex::new(State {
                controller,
                tap_state: TapState::TestLogicReset,
            }),
        }
    }

    /// Releases the USB device. Safe to call more than once; this is what
    /// the process's signal handler calls before exiting.
    pub fn close(&self) {
        self.state.lock().expect("backend mutex poisoned").controller.close();
    }
}

impl XvcServer for FtdiBackend {
    fn set_tck(&self, period_ns: u32) -> u32 {
        let mut state = self.state.lock().expect("backend mutex poisoned");
        // period_ns == 0 would mean "infinite frequency"; clamp it to the
        // controller's own ceiling instead of dividing by zero.
        let requested_hz = if period_ns == 0 {
            u32::MAX
        } else {
            (1_000_000_000u64 / period_ns as u64).min(u32::MAX as u64) as u32
        };
        match state.controller.set_frequency(requested_hz.max(1)) {
            Ok(actual_hz) if actual_hz > 0 => (1_000_000_000u64 / actual_hz as u64) as u32,
            Ok(_) => period_ns,
            Err(e) => {
                error!("set_tck failed: {}", e);
                period_ns
            }
        }
    }

    fn shift(&self, num_bits: u32, tms: Box<[u8]>, tdi: Box<[u8]>) -> Box<[u8]> {
        let mut state = self.state.lock().expect("backend mutex poisoned");

        if is_ise_workaround(state.tap_state, num_bits, &tms) {
            trace!("ISE Capture-IR workaround triggered, bypassing hardware");
            // TAP state is explicitly left unchanged: the workaround
            // substitutes for the shift entirely, it doesn't perform one.
            return Box::new([ISE_WORKAROUND_TDO]);
        }

        let tms_bits = match BitVector::from_wire(&tms, num_bits as usize) {
            Ok(bits) => bits,
            Err(e) => {
                error!("shift: invalid TMS vector: {}", e);
                return Box::default();
            }
        };
        let tdi_bits = match BitVector::from_wire(&tdi, num_bits as usize) {
            Ok(bits) => bits,
            Err(e) => {
                error!("shift: invalid TDI vector: {}", e);
                return Box::default();
            }
        };

        let next_tap_state = track(state.tap_state, tms_bits.iter());
        let tdo_bits = match engine::shift(&mut state.controller, &tms_bits, &tdi_bits) {
            Ok(bits) => bits,
            Err(e) => {
                error!("shift: engine error: {}", e);
                return Box::default();
            }
        };
        state.tap_state = next_tap_state;

        tdo_bits.to_wire().into_boxed_slice()
    }

    fn max_vector_len(&self) -> u32 {
        let state = match self.state.try_lock() {
            Ok(state) => state,
            Err(_) => {
                warn!("max_vector_len called while backend busy; reporting a conservative default");
                return 4096;
            }
        };
        // spec's getinfo formula is min(tms_max + tdi_max, 2*tdo_max); with
        // this controller tms_max == tdi_max == tdo_max == max_byte_chunk
        // (the read FIFO is always the binding constraint), so it reduces
        // to 2 * max_byte_chunk.
        (2 * state.controller.max_byte_chunk()) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workaround_requires_exact_state_length_and_pattern() {
        assert!(is_ise_workaround(TapState::Exit1Ir, 5, &[0x1D]));
    }

    #[test]
    fn workaround_rejects_wrong_state() {
        assert!(!is_ise_workaround(TapState::ShiftIr, 5, &[0x1D]));
    }

    #[test]
    fn workaround_rejects_wrong_length() {
        assert!(!is_ise_workaround(TapState::Exit1Ir, 4, &[0x1D]));
        assert!(!is_ise_workaround(TapState::Exit1Ir, 6, &[0x1D, 0x00]));
    }

    #[test]
    fn workaround_rejects_wrong_tms_pattern() {
        assert!(!is_ise_workaround(TapState::Exit1Ir, 5, &[0x1E]));
    }

    #[test]
    fn workaround_rejects_empty_tms() {
        assert!(!is_ise_workaround(TapState::Exit1Ir, 5, &[]));
    }
}
