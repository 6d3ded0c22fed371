//! Bit-field extraction helpers for MIPS instruction words.

/// Extract an unsigned field of `length` bits starting at bit `start`.
#[inline]
pub const fn extract_bits(word: u32, start: u32, length: u32) -> u32 {
    if length == 0 {
        return 0;
    }
    if length >= 32 {
        return word >> start;
    }
    (word >> start) & ((1u32 << length) - 1)
}

/// Extract a field of `length` bits starting at bit `start`, sign-extended
/// from its high bit.
#[inline]
#[allow(clippy::cast_possible_wrap)]
pub const fn extract_signed_bits(word: u32, start: u32, length: u32) -> i32 {
    if length == 0 {
        return 0;
    }
    let field = extract_bits(word, start, length);
    if length >= 32 {
        return field as i32;
    }
    let shift = 32 - length;
    ((field << shift) as i32) >> shift
}

/// Target of a PC-relative branch: relative to the delay slot address.
#[inline]
#[allow(clippy::cast_sign_loss)]
pub const fn branch_target(offset: i32, address: u32) -> u32 {
    address
        .wrapping_add(4)
        .wrapping_add((offset as u32).wrapping_mul(4))
}

/// Target of a J-type jump: the 26-bit index replaces bits [27:2] of the
/// delay slot address.
#[inline]
pub const fn jump_target(index: u32, address: u32) -> u32 {
    (address.wrapping_add(4) & 0xF000_0000) | ((index & 0x03FF_FFFF) << 2)
}

/// Fields of at most 8 bits.
#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn narrow_field(word: u32, start: u32, length: u32) -> u8 {
    extract_bits(word, start, length) as u8
}

/// Extract opcode field (bits [31:26]).
#[inline]
pub const fn opcode(word: u32) -> u8 {
    narrow_field(word, 26, 6)
}

/// Extract rs field (bits [25:21]).
#[inline]
pub const fn rs(word: u32) -> u8 {
    narrow_field(word, 21, 5)
}

/// Extract rt field (bits [20:16]).
#[inline]
pub const fn rt(word: u32) -> u8 {
    narrow_field(word, 16, 5)
}

/// Extract rd field (bits [15:11]).
#[inline]
pub const fn rd(word: u32) -> u8 {
    narrow_field(word, 11, 5)
}

/// Extract shift amount (bits [10:6]).
#[inline]
pub const fn sa(word: u32) -> u8 {
    narrow_field(word, 6, 5)
}

/// Extract function field (bits [5:0]).
#[inline]
pub const fn funct(word: u32) -> u8 {
    narrow_field(word, 0, 6)
}

/// Signed 16-bit immediate.
#[inline]
pub const fn simm16(word: u32) -> i32 {
    extract_signed_bits(word, 0, 16)
}

/// Unsigned 16-bit immediate.
#[inline]
pub const fn uimm16(word: u32) -> u32 {
    extract_bits(word, 0, 16)
}

/// 26-bit jump index.
#[inline]
pub const fn target26(word: u32) -> u32 {
    extract_bits(word, 0, 26)
}
