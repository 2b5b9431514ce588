//! Bit-level helpers for BITCOUNT, GETBIT, SETBIT and BITOP.
//!
//! Bits are numbered LSB-first within each byte: bit offset `o` lives in byte
//! `o / 8` at mask `1 << (o % 8)`.

use crate::args;
use bytes::BytesMut;

/// Largest bit offset SETBIT accepts (a 512 MB string).
pub const MAX_BIT_OFFSET: i64 = 512 * 1024 * 1024 * 8 - 1;

/// Operation of a BITOP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Not,
}

impl BitOp {
    /// Parses the operation keyword, ignoring ASCII case.
    pub fn parse(keyword: &[u8]) -> Option<Self> {
        [
            ("and", BitOp::And),
            ("or", BitOp::Or),
            ("xor", BitOp::Xor),
            ("not", BitOp::Not),
        ]
        .into_iter()
        .find(|(name, _)| args::eq_ignore_case(keyword, name))
        .map(|(_, op)| op)
    }
}

/// Number of set bits in `data`.
pub fn popcount(data: &[u8]) -> u64 {
    data.iter().map(|b| u64::from(b.count_ones())).sum()
}

/// Reads the bit at `offset`. Offsets outside the buffer read as 0.
pub fn get_bit(data: &[u8], offset: i64) -> u8 {
    if offset < 0 {
        return 0;
    }
    match data.get((offset >> 3) as usize) {
        Some(byte) => (byte >> (offset & 7)) & 1,
        None => 0,
    }
}

/// Writes the bit at `offset`, growing `buf` with zero bytes as needed.
///
/// Returns the previous value of the bit.
pub fn set_bit(buf: &mut BytesMut, offset: u64, on: bool) -> u8 {
    let idx = (offset >> 3) as usize;
    let mask = 1u8 << (offset & 7);
    if buf.len() <= idx {
        buf.resize(idx + 1, 0);
    }

    let old = u8::from(buf[idx] & mask != 0);
    if on {
        buf[idx] |= mask;
    } else {
        buf[idx] &= !mask;
    }
    old
}

/// Combines `sources` byte-wise.
///
/// The result is as long as the longest source; shorter sources are padded
/// with zero bytes on the right. `Not` only looks at the first source. No
/// sources yield an empty result.
pub fn bitop(op: BitOp, sources: &[&[u8]]) -> Vec<u8> {
    let combine: fn(u8, u8) -> u8 = match op {
        BitOp::And => |a, b| a & b,
        BitOp::Or => |a, b| a | b,
        BitOp::Xor => |a, b| a ^ b,
        BitOp::Not => {
            return sources
                .first()
                .map(|src| src.iter().map(|b| !b).collect())
                .unwrap_or_default();
        }
    };

    let Some((first, rest)) = sources.split_first() else {
        return Vec::new();
    };
    let len = sources.iter().map(|s| s.len()).max().unwrap_or(0);

    let mut acc = first.to_vec();
    acc.resize(len, 0);
    for src in rest {
        for (i, byte) in acc.iter_mut().enumerate() {
            *byte = combine(*byte, src.get(i).copied().unwrap_or(0));
        }
    }
    acc
}
