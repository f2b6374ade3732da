//! FTDI MPSSE (Multi-Protocol Synchronous Serial Engine) opcode encoding.
//!
//! Opcode values and framing are taken from FTDI's AN_108 and cross-checked
//! against `Ftdi.RW_BYTES_PVE_NVE_MSB` / `RW_BITS_PVE_NVE_MSB` /
//! `RW_BITS_TMS_PVE_NVE` in the adapter this backend's controller follows.
//! Every opcode this module emits reads TDO back (`RW_*`, never the
//! write-only `W_*` siblings) since XVC always needs a TDO response.
use crate::bitvec::BitVector;

/// Sets the low GPIO byte (ADBUS0-7: TCK, TDO, TDI, TMS, GPIOL0-3).
pub const SET_BITS_LOW: u8 = 0x80;
/// Sets the high GPIO byte (ACBUS0-7).
pub const SET_BITS_HIGH: u8 = 0x82;
/// Sets the TCK clock divisor.
pub const SET_CLOCK_DIVISOR: u8 = 0x86;
/// Flushes the command buffer and forces a response for every queued read.
pub const SEND_IMMEDIATE: u8 = 0x87;
/// Clock `N+1` bytes out and in, MSB first, write on the falling edge, read
/// on the rising edge.
pub const RW_BYTES_PVE_NVE_MSB: u8 = 0x39;
/// Clock `N+1` bits (1..=8) out and in, MSB first, same edges as above.
pub const RW_BITS_PVE_NVE_MSB: u8 = 0x3B;
/// Clock `N+1` TMS bits (1..=7) out, holding TDI constant, and read TDO
/// back.
pub const RW_BITS_TMS_PVE_NVE: u8 = 0x6B;

/// GPIO bit positions on ADBUS (the low byte), per the FT232H/FT2232H JTAG
/// pinout this adapter assumes.
pub const TCK_BIT: u8 = 0x01;
pub const TDI_BIT: u8 = 0x02;
pub const TDO_BIT: u8 = 0x04;
pub const TMS_BIT: u8 = 0x08;
pub const TRST_BIT: u8 = 0x10;
/// All ADBUS pins this adapter drives.
pub const JTAG_MASK: u8 = 0x1F;

/// Direction byte for `SET_BITS_LOW`: TCK, TDI, TMS and TRST are outputs;
/// TDO is the only input.
pub const JTAG_DIRECTION: u8 = TCK_BIT | TDI_BIT | TMS_BIT | TRST_BIT;

/// Idle output levels: TMS held high (idle in Run-Test/Idle or
/// Test-Logic-Reset), TRST deasserted high, clock and TDI low.
pub const JTAG_IDLE_OUTPUTS: u8 = TMS_BIT | TRST_BIT;

/// Maximum bits a single `RW_BITS_PVE_NVE_MSB` command can carry.
pub const MAX_BIT_CHUNK: usize = 8;
/// Maximum bits a single `RW_BITS_TMS_PVE_NVE` command can carry: the
/// opcode's length field is 3 bits wide and bit 7 of the data byte is
/// reserved for the constant TDI value.
pub const MAX_TMS_CHUNK: usize = 7;
/// Maximum bytes a single `RW_BYTES_PVE_NVE_MSB` command can carry (the
/// length field is a 16-bit count of `N+1` bytes).
pub const MAX_BYTE_CHUNK: usize = 1 << 16;

/// `SET_BITS_LOW value direction`.
pub fn set_bits_low(value: u8, direction: u8) -> [u8; 3] {
    [SET_BITS_LOW, value, direction]
}

/// `SET_BITS_HIGH value direction`.
pub fn set_bits_high(value: u8, direction: u8) -> [u8; 3] {
    [SET_BITS_HIGH, value, direction]
}

/// `SET_CLOCK_DIVISOR` with a precomputed 16-bit divisor.
pub fn set_clock_divisor(divisor: u16) -> [u8; 3] {
    let [lo, hi] = divisor.to_le_bytes();
    [SET_CLOCK_DIVISOR, lo, hi]
}

/// Encodes a whole-byte TDI/TDO transfer. `data` is wire-packed (LSB-first
/// within each byte, same as [`BitVector::to_wire`]); length must be in
/// `1..=MAX_BYTE_CHUNK`.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    debug_assert!(!data.is_empty() && data.len() <= MAX_BYTE_CHUNK);
    let n = (data.len() - 1) as u16;
    let [lo, hi] = n.to_le_bytes();
    let mut cmd = Vec::with_capacity(3 + data.len());
    cmd.push(RW_BYTES_PVE_NVE_MSB);
    cmd.push(lo);
    cmd.push(hi);
    cmd.extend_from_slice(data);
    cmd
}

/// Encodes a sub-byte TDI/TDO transfer (1..=8 bits).
pub fn encode_bits(bits: &BitVector) -> Vec<u8> {
    let len = bits.len();
    debug_assert!(len >= 1 && len <= MAX_BIT_CHUNK);
    let payload = bits.to_mpsse_msb_bytes();
    vec![RW_BITS_PVE_NVE_MSB, (len - 1) as u8, payload[0]]
}

/// Encodes a TMS transfer (1..=7 bits) with TDI held constant at
/// `tdi_value` for every clock of the chunk.
pub fn encode_tms(tms_bits: &BitVector, tdi_value: bool) -> Vec<u8> {
    let len = tms_bits.len();
    debug_assert!(len >= 1 && len <= MAX_TMS_CHUNK);
    let mut payload: u8 = 0;
    for (i, bit) in tms_bits.iter().enumerate() {
        if bit {
            payload |= 1 << i;
        }
    }
    if tdi_value {
        payload |= 0x80;
    }
    vec![RW_BITS_TMS_PVE_NVE, (len - 1) as u8, payload]
}

/// Decodes the single response byte a `RW_BITS_*` or `RW_BITS_TMS_*`
/// command produces: the captured bits occupy the top `len` bits of the
/// byte, MSB first — the same layout [`BitVector::to_mpsse_msb_bytes`]
/// produces for a `len`-bit vector.
pub fn decode_bit_response(byte: u8, len: usize) -> BitVector {
    BitVector::from_mpsse_msb(&[byte], len).expect("len <= 8 always fits one byte")
}

/// Decodes the `data.len()`-byte response a `RW_BYTES_*` command produces.
pub fn decode_byte_response(data: &[u8]) -> BitVector {
    BitVector::from_wire(data, data.len() * 8).expect("exact byte count always fits")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_bytes_frames_length_minus_one() {
        let cmd = encode_bytes(&[0xAA, 0xBB, 0xCC]);
        assert_eq!(cmd[0], RW_BYTES_PVE_NVE_MSB);
        assert_eq!(u16::from_le_bytes([cmd[1], cmd[2]]), 2);
        assert_eq!(&cmd[3..], &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn encode_bits_packs_msb_first() {
        let bits = BitVector::from_wire(&[0b0000_0001], 1).unwrap();
        let cmd = encode_bits(&bits);
        assert_eq!(cmd, vec![RW_BITS_PVE_NVE_MSB, 0, 0b1000_0000]);
    }

    #[test]
    fn encode_tms_holds_tdi_in_top_bit() {
        // TMS bits 1,0,1 (LSB-first in the payload), TDI held high.
        let tms = BitVector::from_wire(&[0b0000_0101], 3).unwrap();
        let cmd = encode_tms(&tms, true);
        assert_eq!(cmd[0], RW_BITS_TMS_PVE_NVE);
        assert_eq!(cmd[1], 2); // length - 1
        assert_eq!(cmd[2], 0b1000_0101);
    }

    #[test]
    fn bit_response_round_trips_through_encode() {
        let bits = BitVector::from_wire(&[0b0010_1101], 6).unwrap();
        let packed = bits.to_mpsse_msb_bytes();
        let decoded = decode_bit_response(packed[0], 6);
        assert_eq!(decoded, bits);
    }
}
