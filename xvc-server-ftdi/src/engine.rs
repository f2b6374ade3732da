//! The shift engine: partitions one `shift:` command's TMS/TDI vectors
//! into the fewest MPSSE opcodes that still produce the right TDO bits.
//!
//! No single donor file implements this exact algorithm; it follows from
//! the opcode families `mpsse` exposes and the FIFO-bounded round-trip
//! `controller` exposes. The key observation is that within any maximal
//! run of identical TMS bits, the MPSSE opcode family handles the whole
//! run in one or a few round trips:
//!
//! - a run of `TMS = 0` never changes TAP state, so it can be shifted as
//!   plain TDI/TDO bytes (and a trailing sub-byte remainder) with the
//!   `RW_BYTES_PVE_NVE_MSB` / `RW_BITS_PVE_NVE_MSB` opcodes. These opcodes
//!   never drive TMS at all, so TMS must already be low before one runs;
//! - a run of `TMS = 1` only walks the TAP state graph, so it can be
//!   shifted in <=7-bit chunks with `RW_BITS_TMS_PVE_NVE`, which holds TDI
//!   at one level for the whole chunk (the chunk's last bit's TDI value,
//!   per the invariant that TDI doesn't matter mid-run). A `TMS = 1` run
//!   absorbs the one TMS=0 bit immediately after it, so its last opcode
//!   explicitly latches TMS back low before any following bulk-TDI opcode
//!   runs.
//!
//! Splitting the cursor at TMS-run boundaries keeps the opcode count
//! proportional to the number of TAP-state transitions the vector makes,
//! not to its length.
use crate::bitvec::BitVector;
use crate::error::JtagError;
use crate::mpsse;

/// The two primitive round trips the engine composes. Implemented by
/// [`crate::controller::JtagController`]; kept as a trait so the
/// partitioning logic can be tested without real hardware.
pub trait ShiftPrimitives {
    fn write_tdi_read_tdo(&mut self, data: &[u8]) -> Result<Vec<u8>, JtagError>;
    fn write_bits_read_tdo(&mut self, bits: &BitVector) -> Result<BitVector, JtagError>;
    fn write_tms_read_tdo(&mut self, tms: &BitVector, tdi: bool) -> Result<BitVector, JtagError>;
    fn max_byte_chunk(&self) -> usize;
}

impl ShiftPrimitives for crate::controller::JtagController {
    fn write_tdi_read_tdo(&mut self, data: &[u8]) -> Result<Vec<u8>, JtagError> {
        crate::controller::JtagController::write_tdi_read_tdo(self, data)
    }

    fn write_bits_read_tdo(&mut self, bits: &BitVector) -> Result<BitVector, JtagError> {
        crate::controller::JtagController::write_bits_read_tdo(self, bits)
    }

    fn write_tms_read_tdo(&mut self, tms: &BitVector, tdi: bool) -> Result<BitVector, JtagError> {
        crate::controller::JtagController::write_tms_read_tdo(self, tms, tdi)
    }

    fn max_byte_chunk(&self) -> usize {
        crate::controller::JtagController::max_byte_chunk(self)
    }
}

/// Shifts `tms`/`tdi` (equal length) through the TAP, returning the
/// captured TDO bits in the same order.
pub fn shift<C: ShiftPrimitives>(
    controller: &mut C,
    tms: &BitVector,
    tdi: &BitVector,
) -> Result<BitVector, JtagError> {
    if tms.len() != tdi.len() {
        return Err(JtagError::InvalidLength {
            got: tdi.len(),
            max: tms.len(),
        });
    }
    let n = tms.len();
    let mut result = BitVector::new();
    let mut cursor = 0;
    while cursor < n {
        let run_tms = tms.get(cursor).expect("cursor < n");
        if run_tms {
            // The raw run of 1s ends at the next 0 (or the vector's end);
            // absorb that trailing 0 bit into the TMS run so the run's
            // last opcode explicitly drives TMS low before anything else.
            let ones_end = tms.find_first(false, cursor).unwrap_or(n);
            let run_end = if ones_end < n { ones_end + 1 } else { n };
            shift_tms_run(controller, tms, tdi, cursor, run_end, &mut result)?;
            cursor = run_end;
        } else {
            let run_end = tms.find_first(true, cursor).unwrap_or(n);
            shift_tdi_run(controller, tdi, cursor, run_end, &mut result)?;
            cursor = run_end;
        }
    }
    Ok(result)
}

/// A maximal run of `TMS = 0`: bulk-shifts TDI byte-chunked up to the
/// controller's round-trip maximum, with a final sub-byte remainder.
fn shift_tdi_run<C: ShiftPrimitives>(
    controller: &mut C,
    tdi: &BitVector,
    start: usize,
    end: usize,
    result: &mut BitVector,
) -> Result<(), JtagError> {
    let mut pos = start;
    while pos < end {
        let remaining = end - pos;
        if remaining >= 8 {
            let max_bytes = controller.max_byte_chunk().max(1);
            let chunk_bytes = (remaining / 8).min(max_bytes);
            let chunk_bits = chunk_bytes * 8;
            let wire = tdi.slice(pos, pos + chunk_bits).to_wire();
            let response = controller.write_tdi_read_tdo(&wire)?;
            result.extend(&BitVector::from_wire(&response, chunk_bits).expect("exact byte count"));
            pos += chunk_bits;
        } else {
            let chunk = tdi.slice(pos, end);
            let response = controller.write_bits_read_tdo(&chunk)?;
            result.extend(&response);
            pos = end;
        }
    }
    Ok(())
}

/// A run of `TMS = 1` plus its absorbed trailing `TMS = 0` bit: walks the
/// TAP state graph in <=7-bit chunks. TDI is held constant for each chunk
/// at that chunk's own last bit, not the run's first bit — MPSSE only
/// carries one TDI level per TMS opcode, so each chunk picks it up fresh.
fn shift_tms_run<C: ShiftPrimitives>(
    controller: &mut C,
    tms: &BitVector,
    tdi: &BitVector,
    start: usize,
    end: usize,
    result: &mut BitVector,
) -> Result<(), JtagError> {
    let mut pos = start;
    while pos < end {
        let chunk_len = (end - pos).min(mpsse::MAX_TMS_CHUNK);
        let chunk = tms.slice(pos, pos + chunk_len);
        let tdi_level = tdi.get(pos + chunk_len - 1).unwrap_or(false);
        let response = controller.write_tms_read_tdo(&chunk, tdi_level)?;
        result.extend(&response);
        pos += chunk_len;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records which opcode family each call used, and answers with
    /// whatever TDI/TMS pattern it was given (a loopback), so the tests
    /// below can check both opcode counts and end-to-end bit fidelity.
    struct FakeController {
        max_byte_chunk: usize,
        byte_calls: Vec<usize>,
        bit_calls: Vec<usize>,
        tms_calls: Vec<(usize, bool)>,
    }

    impl FakeController {
        fn new(max_byte_chunk: usize) -> Self {
            FakeController {
                max_byte_chunk,
                byte_calls: Vec::new(),
                bit_calls: Vec::new(),
                tms_calls: Vec::new(),
            }
        }
    }

    impl ShiftPrimitives for FakeController {
        fn write_tdi_read_tdo(&mut self, data: &[u8]) -> Result<Vec<u8>, JtagError> {
            self.byte_calls.push(data.len());
            Ok(data.to_vec())
        }

        fn write_bits_read_tdo(&mut self, bits: &BitVector) -> Result<BitVector, JtagError> {
            self.bit_calls.push(bits.len());
            Ok(bits.clone())
        }

        fn write_tms_read_tdo(&mut self, tms: &BitVector, tdi: bool) -> Result<BitVector, JtagError> {
            self.tms_calls.push((tms.len(), tdi));
            Ok(BitVector::from_iter(std::iter::repeat(tdi).take(tms.len())))
        }

        fn max_byte_chunk(&self) -> usize {
            self.max_byte_chunk
        }
    }

    #[test]
    fn all_zero_tms_run_uses_bulk_byte_opcode() {
        let mut fake = FakeController::new(64);
        let tms = BitVector::from_wire(&[0x00, 0x00], 16).unwrap();
        let tdi = BitVector::from_wire(&[0xA5, 0x3C], 16).unwrap();
        let tdo = shift(&mut fake, &tms, &tdi).unwrap();
        assert_eq!(tdo, tdi);
        assert_eq!(fake.byte_calls, vec![2]);
        assert!(fake.tms_calls.is_empty());
    }

    #[test]
    fn sub_byte_tail_uses_bit_opcode() {
        let mut fake = FakeController::new(64);
        let tms = BitVector::from_wire(&[0x00], 5).unwrap();
        let tdi = BitVector::from_wire(&[0b0001_0101], 5).unwrap();
        let tdo = shift(&mut fake, &tms, &tdi).unwrap();
        assert_eq!(tdo, tdi);
        assert!(fake.byte_calls.is_empty());
        assert_eq!(fake.bit_calls, vec![5]);
    }

    #[test]
    fn tms_run_longer_than_seven_bits_splits_into_chunks() {
        let mut fake = FakeController::new(64);
        let tms = BitVector::from_wire(&[0xFF, 0x01], 9).unwrap();
        let tdi = BitVector::from_wire(&[0x00, 0x00], 9).unwrap();
        shift(&mut fake, &tms, &tdi).unwrap();
        assert_eq!(fake.tms_calls, vec![(7, false), (2, false)]);
    }

    #[test]
    fn mixed_run_sequence_matches_expected_opcode_pattern() {
        // 3 zero bits, 2 one bits, 4 zero bits: the TMS=1 run absorbs the
        // first of the trailing zero bits, so it's shifted as a 3-bit TMS
        // chunk (indices 3,4,5), leaving only 3 zero bits afterward
        // (indices 6,7,8).
        let mut fake = FakeController::new(64);
        let tms = BitVector::from_wire(&[0b0001_1000, 0x00], 9).unwrap();
        let tdi = BitVector::from_wire(&[0x00, 0x00], 9).unwrap();
        shift(&mut fake, &tms, &tdi).unwrap();
        assert_eq!(fake.bit_calls, vec![3, 3]);
        assert_eq!(fake.tms_calls, vec![(3, false)]);
    }

    #[test]
    fn tms_run_absorbs_trailing_zero_before_next_bulk_tdi_run() {
        // TMS=1 for 2 bits then TMS=0 for 9 bits: the TMS opcode must
        // cover 3 bits (absorbing the first trailing zero) so TMS is
        // explicitly driven low before the bulk TDI opcode, which never
        // touches TMS itself.
        let mut fake = FakeController::new(64);
        let tms = BitVector::from_wire(&[0b0000_0011, 0x00], 11).unwrap();
        let tdi = BitVector::from_wire(&[0xFF, 0xFF], 11).unwrap();
        shift(&mut fake, &tms, &tdi).unwrap();
        assert_eq!(fake.tms_calls.len(), 1);
        assert_eq!(fake.tms_calls[0].0, 3);
        assert_eq!(fake.byte_calls, vec![1]);
        assert_eq!(fake.bit_calls, vec![]);
    }

    #[test]
    fn byte_chunking_respects_controllers_round_trip_maximum() {
        let mut fake = FakeController::new(2); // 2-byte max chunk
        let tms = BitVector::from_wire(&[0x00, 0x00, 0x00], 24).unwrap();
        let tdi = BitVector::from_wire(&[0x11, 0x22, 0x33], 24).unwrap();
        shift(&mut fake, &tms, &tdi).unwrap();
        assert_eq!(fake.byte_calls, vec![2, 1]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut fake = FakeController::new(64);
        let tms = BitVector::from_wire(&[0x00], 4).unwrap();
        let tdi = BitVector::from_wire(&[0x00], 8).unwrap();
        assert!(shift(&mut fake, &tms, &tdi).is_err());
    }
}
