//! Bounded Integer Sequence Encoding.
//!
//! BISE packs strings of integers whose alphabet size is 2^k, 3*2^k or
//! 5*2^k. Plain bits are emitted inline; trits are packed five at a time
//! into an 8-bit block and quints three at a time into a 7-bit block, with
//! the packed block bits interleaved between the plain bits of the values
//! they cover. Sequences can start at any bit offset in the output.

use crate::quant::{ise_sequence_bitcount, Quant};

/// Write `count` bits of `value` into `dst` starting at `bit_offset`,
/// little-endian within each byte. Bits beyond the end of `dst` are
/// silently dropped.
pub fn write_bits(dst: &mut [u8], bit_offset: usize, count: usize, value: u32) {
    debug_assert!(count <= 25);
    let value = value & ((1u32 << count) - 1);

    let mut byte = bit_offset / 8;
    let bit = bit_offset % 8;
    let mut v = (value as u64) << bit;
    let mut remaining = count + bit;

    while remaining > 0 {
        if let Some(slot) = dst.get_mut(byte) {
            *slot |= v as u8;
        }
        v >>= 8;
        remaining = remaining.saturating_sub(8);
        byte += 1;
    }
}

/// Read `count` bits from `src` starting at `bit_offset`. Bits beyond the
/// end of `src` read as zero.
pub fn read_bits(src: &[u8], bit_offset: usize, count: usize) -> u32 {
    debug_assert!(count <= 25);
    if count == 0 {
        return 0;
    }

    let mut byte = bit_offset / 8;
    let bit = bit_offset % 8;
    let mut v: u64 = 0;
    let mut read = 0;

    while read < count + bit {
        let b = src.get(byte).copied().unwrap_or(0);
        v |= (b as u64) << read;
        read += 8;
        byte += 1;
    }

    ((v >> bit) as u32) & ((1u32 << count) - 1)
}

// The canonical packed encodings of five trits into eight bits, indexed by
// t0 + 3*t1 + 9*t2 + 27*t3 + 81*t4.
#[rustfmt::skip]
static TRIT_ENCODE: [u8; 243] = [
    0x00, 0x01, 0x02, 0x04, 0x05, 0x06, 0x08, 0x09, 0x0A, 0x10, 0x11, 0x12, 0x14, 0x15, 0x16, 0x18,
    0x19, 0x1A, 0x03, 0x07, 0x0B, 0x13, 0x17, 0x1B, 0x0C, 0x0D, 0x0E, 0x20, 0x21, 0x22, 0x24, 0x25,
    0x26, 0x28, 0x29, 0x2A, 0x30, 0x31, 0x32, 0x34, 0x35, 0x36, 0x38, 0x39, 0x3A, 0x23, 0x27, 0x2B,
    0x33, 0x37, 0x3B, 0x2C, 0x2D, 0x2E, 0x40, 0x41, 0x42, 0x44, 0x45, 0x46, 0x48, 0x49, 0x4A, 0x50,
    0x51, 0x52, 0x54, 0x55, 0x56, 0x58, 0x59, 0x5A, 0x43, 0x47, 0x4B, 0x53, 0x57, 0x5B, 0x4C, 0x4D,
    0x4E, 0x80, 0x81, 0x82, 0x84, 0x85, 0x86, 0x88, 0x89, 0x8A, 0x90, 0x91, 0x92, 0x94, 0x95, 0x96,
    0x98, 0x99, 0x9A, 0x83, 0x87, 0x8B, 0x93, 0x97, 0x9B, 0x8C, 0x8D, 0x8E, 0xA0, 0xA1, 0xA2, 0xA4,
    0xA5, 0xA6, 0xA8, 0xA9, 0xAA, 0xB0, 0xB1, 0xB2, 0xB4, 0xB5, 0xB6, 0xB8, 0xB9, 0xBA, 0xA3, 0xA7,
    0xAB, 0xB3, 0xB7, 0xBB, 0xAC, 0xAD, 0xAE, 0xC0, 0xC1, 0xC2, 0xC4, 0xC5, 0xC6, 0xC8, 0xC9, 0xCA,
    0xD0, 0xD1, 0xD2, 0xD4, 0xD5, 0xD6, 0xD8, 0xD9, 0xDA, 0xC3, 0xC7, 0xCB, 0xD3, 0xD7, 0xDB, 0xCC,
    0xCD, 0xCE, 0x60, 0x61, 0x62, 0x64, 0x65, 0x66, 0x68, 0x69, 0x6A, 0x70, 0x71, 0x72, 0x74, 0x75,
    0x76, 0x78, 0x79, 0x7A, 0x63, 0x67, 0x6B, 0x73, 0x77, 0x7B, 0x6C, 0x6D, 0x6E, 0xE0, 0xE1, 0xE2,
    0xE4, 0xE5, 0xE6, 0xE8, 0xE9, 0xEA, 0xF0, 0xF1, 0xF2, 0xF4, 0xF5, 0xF6, 0xF8, 0xF9, 0xFA, 0xE3,
    0xE7, 0xEB, 0xF3, 0xF7, 0xFB, 0xEC, 0xED, 0xEE, 0x1C, 0x1D, 0x1E, 0x3C, 0x3D, 0x3E, 0x5C, 0x5D,
    0x5E, 0x9C, 0x9D, 0x9E, 0xBC, 0xBD, 0xBE, 0xDC, 0xDD, 0xDE, 0x1F, 0x3F, 0x5F, 0x9F, 0xBF, 0xDF,
    0x7C, 0x7D, 0x7E,
];

// The canonical packed encodings of three quints into seven bits, indexed
// by q0 + 5*q1 + 25*q2.
#[rustfmt::skip]
static QUINT_ENCODE: [u8; 125] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x10, 0x11, 0x12, 0x13, 0x14, 0x18,
    0x19, 0x1A, 0x1B, 0x1C, 0x05, 0x0D, 0x15, 0x1D, 0x06, 0x20, 0x21, 0x22, 0x23, 0x24, 0x28, 0x29,
    0x2A, 0x2B, 0x2C, 0x30, 0x31, 0x32, 0x33, 0x34, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x25, 0x2D, 0x35,
    0x3D, 0x0E, 0x40, 0x41, 0x42, 0x43, 0x44, 0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x50, 0x51, 0x52, 0x53,
    0x54, 0x58, 0x59, 0x5A, 0x5B, 0x5C, 0x45, 0x4D, 0x55, 0x5D, 0x16, 0x60, 0x61, 0x62, 0x63, 0x64,
    0x68, 0x69, 0x6A, 0x6B, 0x6C, 0x70, 0x71, 0x72, 0x73, 0x74, 0x78, 0x79, 0x7A, 0x7B, 0x7C, 0x65,
    0x6D, 0x75, 0x7D, 0x1E, 0x66, 0x67, 0x46, 0x47, 0x26, 0x6E, 0x6F, 0x4E, 0x4F, 0x2E, 0x76, 0x77,
    0x56, 0x57, 0x36, 0x7E, 0x7F, 0x5E, 0x5F, 0x3E, 0x27, 0x2F, 0x37, 0x3F, 0x1F,
];

/// Unpack an 8-bit trit block into five trits.
///
/// This is the format's decode procedure; it accepts all 256 byte values,
/// including the non-canonical ones, and is the exact inverse of
/// `TRIT_ENCODE` over canonical blocks.
fn decode_trit_block(t: u32) -> [u8; 5] {
    let (t4, t3, c);
    if (t >> 2) & 0b111 == 0b111 {
        c = ((t >> 5) & 0b111) << 2 | (t & 0b11);
        t4 = 2;
        t3 = 2;
    } else {
        c = t & 0b11111;
        if (t >> 5) & 0b11 == 0b11 {
            t4 = 2;
            t3 = (t >> 7) & 1;
        } else {
            t4 = (t >> 7) & 1;
            t3 = (t >> 5) & 0b11;
        }
    }

    let (t2, t1, t0);
    if c & 0b11 == 0b11 {
        t2 = 2;
        t1 = (c >> 4) & 1;
        t0 = ((c >> 2) & 0b10) | ((c >> 2) & (!c >> 3) & 1);
    } else if (c >> 2) & 0b11 == 0b11 {
        t2 = 2;
        t1 = 2;
        t0 = c & 0b11;
    } else {
        t2 = (c >> 4) & 1;
        t1 = (c >> 2) & 0b11;
        t0 = (c & 0b10) | (c & (!c >> 1) & 1);
    }

    [t0 as u8, t1 as u8, t2 as u8, t3 as u8, t4 as u8]
}

/// Unpack a 7-bit quint block into three quints.
fn decode_quint_block(q: u32) -> [u8; 3] {
    let (q2, q1, q0);
    if (q >> 1) & 0b11 == 0b11 && (q >> 5) & 0b11 == 0 {
        q2 = ((q & 1) << 2) | (((q >> 4) & !q & 1) << 1) | ((q >> 3) & !q & 1);
        q1 = 4;
        q0 = 4;
    } else {
        let c;
        if (q >> 1) & 0b11 == 0b11 {
            q2 = 4;
            c = (q & 0b11000) | (((!q >> 5) & 0b11) << 1) | (q & 1);
        } else {
            q2 = (q >> 5) & 0b11;
            c = q & 0b11111;
        }
        if c & 0b111 == 0b101 {
            q1 = 4;
            q0 = (c >> 3) & 0b11;
        } else {
            q1 = (c >> 3) & 0b11;
            q0 = c & 0b111;
        }
    }

    [q0 as u8, q1 as u8, q2 as u8]
}

// Interleaving schedule: how many bits of the packed trit/quint block are
// emitted after each value, and at which offset they sit in the block.
const TRIT_SEG_BITS: [usize; 5] = [2, 2, 1, 2, 1];
const TRIT_SEG_OFS: [usize; 5] = [0, 2, 4, 5, 7];
const QUINT_SEG_BITS: [usize; 3] = [3, 2, 2];
const QUINT_SEG_OFS: [usize; 3] = [0, 3, 5];

/// Encode a character string with BISE, writing
/// `ise_sequence_bitcount(count, quant)` bits starting at `bit_offset`.
///
/// Each input byte holds one character below the alphabet size; for trit
/// and quint alphabets the character packs the trit/quint above the plain
/// bits.
pub fn encode_ise(quant: Quant, src: &[u8], dst: &mut [u8], bit_offset: usize) {
    let bits = quant.bits() as usize;
    let mask = (1u32 << bits) - 1;
    let mut pos = bit_offset;

    if quant.trits() != 0 {
        for group in src.chunks(5) {
            let mut index = 0usize;
            for &ch in group.iter().rev() {
                index = index * 3 + (ch as usize >> bits);
            }
            let packed = TRIT_ENCODE[index] as u32;
            for (j, &ch) in group.iter().enumerate() {
                write_bits(dst, pos, bits, ch as u32 & mask);
                pos += bits;
                write_bits(dst, pos, TRIT_SEG_BITS[j], packed >> TRIT_SEG_OFS[j]);
                pos += TRIT_SEG_BITS[j];
            }
        }
    } else if quant.quints() != 0 {
        for group in src.chunks(3) {
            let mut index = 0usize;
            for &ch in group.iter().rev() {
                index = index * 5 + (ch as usize >> bits);
            }
            let packed = QUINT_ENCODE[index] as u32;
            for (j, &ch) in group.iter().enumerate() {
                write_bits(dst, pos, bits, ch as u32 & mask);
                pos += bits;
                write_bits(dst, pos, QUINT_SEG_BITS[j], packed >> QUINT_SEG_OFS[j]);
                pos += QUINT_SEG_BITS[j];
            }
        }
    } else {
        for &ch in src {
            write_bits(dst, pos, bits, ch as u32);
            pos += bits;
        }
    }
}

/// Decode a BISE character string; the exact inverse of `encode_ise` over
/// well-formed input. Bits past the end of `src` read as zero, so
/// arbitrary input never reads out of range.
pub fn decode_ise(quant: Quant, character_count: usize, src: &[u8], dst: &mut [u8], bit_offset: usize) {
    let bits = quant.bits() as usize;
    let mut pos = bit_offset;
    let mut out = 0usize;

    if quant.trits() != 0 {
        while out < character_count {
            let group_len = (character_count - out).min(5);
            let mut m = [0u32; 5];
            let mut packed = 0u32;
            for j in 0..group_len {
                m[j] = read_bits(src, pos, bits);
                pos += bits;
                packed |= read_bits(src, pos, TRIT_SEG_BITS[j]) << TRIT_SEG_OFS[j];
                pos += TRIT_SEG_BITS[j];
            }
            let trits = decode_trit_block(packed);
            for j in 0..group_len {
                dst[out] = (((trits[j] as u32) << bits) | m[j]) as u8;
                out += 1;
            }
        }
    } else if quant.quints() != 0 {
        while out < character_count {
            let group_len = (character_count - out).min(3);
            let mut m = [0u32; 3];
            let mut packed = 0u32;
            for j in 0..group_len {
                m[j] = read_bits(src, pos, bits);
                pos += bits;
                packed |= read_bits(src, pos, QUINT_SEG_BITS[j]) << QUINT_SEG_OFS[j];
                pos += QUINT_SEG_BITS[j];
            }
            let quints = decode_quint_block(packed);
            for j in 0..group_len {
                dst[out] = (((quints[j] as u32) << bits) | m[j]) as u8;
                out += 1;
            }
        }
    } else {
        while out < character_count {
            dst[out] = read_bits(src, pos, bits) as u8;
            pos += bits;
            out += 1;
        }
    }
}

/// The number of bits needed to encode a BISE sequence, assuming an
/// untrusted quant level index: invalid levels return an unencodable size
/// so callers reject them.
pub fn sequence_bitcount(character_count: u32, quant_index: usize) -> u32 {
    match Quant::from_index(quant_index) {
        Some(quant) => ise_sequence_bitcount(character_count, quant),
        None => 1024,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_bits() {
        let mut buf = [0u8; 16];
        write_bits(&mut buf, 3, 11, 0x5A5);
        assert_eq!(read_bits(&buf, 3, 11), 0x5A5);
        // Out of range reads are zero, out of range writes are dropped
        assert_eq!(read_bits(&buf, 126, 10), read_bits(&buf, 126, 2));
        write_bits(&mut buf, 126, 8, 0xFF);
        assert_eq!(buf[15] >> 6, 0b11);
    }

    #[test]
    fn test_trit_block_roundtrip() {
        for index in 0..243 {
            let trits = [
                (index % 3) as u8,
                (index / 3 % 3) as u8,
                (index / 9 % 3) as u8,
                (index / 27 % 3) as u8,
                (index / 81 % 3) as u8,
            ];
            let packed = TRIT_ENCODE[index] as u32;
            assert_eq!(decode_trit_block(packed), trits, "index {}", index);
        }
    }

    #[test]
    fn test_quint_block_roundtrip() {
        for index in 0..125 {
            let quints = [
                (index % 5) as u8,
                (index / 5 % 5) as u8,
                (index / 25 % 5) as u8,
            ];
            let packed = QUINT_ENCODE[index] as u32;
            assert_eq!(decode_quint_block(packed), quints, "index {}", index);
        }
    }

    fn roundtrip(quant: Quant, src: &[u8], bit_offset: usize) {
        let mut packed = [0u8; 32];
        encode_ise(quant, src, &mut packed, bit_offset);

        let bits = ise_sequence_bitcount(src.len() as u32, quant) as usize;
        // No bits written outside the declared range
        for i in 0..256 {
            let in_range = i >= bit_offset && i < bit_offset + bits;
            if !in_range {
                assert_eq!(read_bits(&packed, i, 1), 0, "stray bit at {}", i);
            }
        }

        let mut decoded = vec![0u8; src.len()];
        decode_ise(quant, src.len(), &packed, &mut decoded, bit_offset);
        assert_eq!(decoded, src);
    }

    #[test]
    fn test_ise_roundtrip_all_levels() {
        for q in 0..crate::quant::QUANT_METHOD_COUNT {
            let quant = Quant::from_index(q).unwrap();
            let levels = quant.levels();
            for count in 1..=24usize {
                let src: Vec<u8> = (0..count).map(|i| ((i as u32 * 7 + 3) % levels) as u8).collect();
                roundtrip(quant, &src, 0);
                roundtrip(quant, &src, 13);
            }
        }
    }

    #[test]
    fn test_sequence_bitcount_untrusted() {
        assert!(sequence_bitcount(10, 25) >= 129);
        assert_eq!(sequence_bitcount(16, Quant::Q16.index()), 64);
    }
}
