//! Big-endian integer codec for frame payloads.
//!
//! Every multi-byte integer on the BrickPi3 bus is sent most-significant byte
//! first. Encoding masks the value to the requested width without range
//! checks: callers rely on wrapping (e.g. `-1` as an 8-bit LED value becomes
//! `0xFF`). Decoding is unsigned; use [`sign_extend`] for signed fields.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Integer widths used by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W8 = 8,
    W16 = 16,
    W24 = 24,
    W32 = 32,
}

impl Width {
    pub const ALL: [Width; 4] = [Width::W8, Width::W16, Width::W24, Width::W32];

    /// Number of bits
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Number of bytes on the wire
    pub const fn bytes(self) -> usize {
        self as usize / 8
    }

    pub const fn mask(self) -> u64 {
        (1u64 << self.bits()) - 1
    }
}

/// Append `value` truncated to `width`, MSB first.
pub fn put_be<B: BufMut>(buf: &mut B, width: Width, value: i64) {
    buf.put_uint(value as u64 & width.mask(), width.bytes());
}

/// Encode `value` truncated to `width` as a standalone byte sequence.
pub fn encode_be(width: Width, value: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(width.bytes());
    put_be(&mut buf, width, value);
    buf.freeze()
}

/// Decode an unsigned big-endian integer.
///
/// # Panics
///
/// Panics if `bytes` is not exactly `width.bytes()` long. That is a caller
/// bug, not a wire condition.
pub fn decode_be(bytes: &[u8], width: Width) -> u32 {
    assert_eq!(
        bytes.len(),
        width.bytes(),
        "decode_be: {width:?} needs {} bytes, got {}",
        width.bytes(),
        bytes.len()
    );
    let mut cursor = bytes;
    cursor.get_uint(width.bytes()) as u32
}

/// Decode the integer of `width` starting at `offset` in `buf`.
///
/// # Panics
///
/// Panics if the field runs past the end of `buf`; callers check reply length first.
pub fn read_be(buf: &[u8], offset: usize, width: Width) -> u32 {
    decode_be(&buf[offset..offset + width.bytes()], width)
}

/// Reinterpret the low `width` bits of `value` as two's complement.
pub fn sign_extend(value: u32, width: Width) -> i32 {
    let shift = 32 - width.bits();
    ((value << shift) as i32) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [i64; 12] = [
        0,
        1,
        -1,
        0x7F,
        0x80,
        0xFF,
        0x1234,
        -1234,
        0x00AB_CDEF,
        0x1234_5678,
        i32::MIN as i64,
        0x1_0000_0001,
    ];

    #[test]
    fn test_decode_inverts_encode_modulo_width() {
        for width in Width::ALL {
            for value in SAMPLES {
                let encoded = encode_be(width, value);
                assert_eq!(encoded.len(), width.bytes());
                let expected = (value as u64 & width.mask()) as u32;
                assert_eq!(decode_be(&encoded, width), expected, "{width:?} {value:#x}");
            }
        }
    }

    #[test]
    fn test_msb_first() {
        assert_eq!(encode_be(Width::W16, 0x1234).as_ref(), &[0x12, 0x34]);
        assert_eq!(encode_be(Width::W24, 0x123456).as_ref(), &[0x12, 0x34, 0x56]);
        assert_eq!(encode_be(Width::W32, -2).as_ref(), &[0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(encode_be(Width::W8, -128).as_ref(), &[0x80]);
    }

    #[test]
    fn test_read_at_offset() {
        let reply = [0x00, 0x00, 0x00, 0xA5, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(read_be(&reply, 4, Width::W32), 0x0102_0304);
        assert_eq!(read_be(&reply, 6, Width::W16), 0x0304);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xFF, Width::W8), -1);
        assert_eq!(sign_extend(0x7F, Width::W8), 127);
        assert_eq!(sign_extend(0xFB2E, Width::W16), -1234);
        assert_eq!(sign_extend(0xFFFF_FFFF, Width::W32), -1);
        assert_eq!(sign_extend(0x80_0000, Width::W24), -0x80_0000);
    }

    #[test]
    #[should_panic(expected = "decode_be")]
    fn test_wrong_length_is_a_contract_violation() {
        decode_be(&[0x01, 0x02, 0x03], Width::W16);
    }
}
