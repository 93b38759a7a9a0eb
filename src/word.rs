//! 36-bit words and their fields.
//!
//! A word is always carried in a `u64`. Bits are numbered the PDP-10 way:
//! bit 0 is the sign (most significant) and bit 35 is the least
//! significant, so the opcode of an instruction lives in bits 0-8 and the
//! address part `Y` in bits 18-35.

pub type Word = u64;
pub type Address = u32;

pub const WORD_MASK: Word = 0o777777777777;
pub const HALF_MASK: Word = 0o777777;
pub const SIGN_BIT: Word = 0o400000000000;

// Out-of-band markers carried by tape-framed formats.
pub const START_FILE: Word = 1 << 36;
pub const START_RECORD: Word = 1 << 37;
pub const START_TAPE: Word = 1 << 38;
pub const TAG_MASK: Word = START_FILE | START_RECORD | START_TAPE;

pub const ADDRESS_SPACE: usize = 1 << 18;

#[inline]
pub fn strip_tags(word: Word) -> Word {
    word & !TAG_MASK
}

#[inline]
pub fn lh(word: Word) -> Word {
    (word >> 18) & HALF_MASK
}

#[inline]
pub fn rh(word: Word) -> Word {
    word & HALF_MASK
}

#[inline]
pub fn make(lh: Word, rh: Word) -> Word {
    ((lh & HALF_MASK) << 18) | (rh & HALF_MASK)
}

#[inline]
pub fn swap(word: Word) -> Word {
    make(rh(word), lh(word))
}

/// Interpret the low 36 bits as a two's-complement number.
#[inline]
pub fn sign_extend(word: Word) -> i64 {
    ((word << 28) as i64) >> 28
}

/// Sign-extend an 18-bit half.
#[inline]
pub fn sign_extend_half(half: Word) -> i64 {
    ((half << 46) as i64) >> 46
}

#[inline]
pub fn is_negative(word: Word) -> bool {
    word & SIGN_BIT != 0
}

#[inline]
pub fn opcode(word: Word) -> usize {
    ((word >> 27) & 0o777) as usize
}

#[inline]
pub fn ac_field(word: Word) -> usize {
    ((word >> 23) & 0o17) as usize
}

#[inline]
pub fn indirect(word: Word) -> bool {
    word & (1 << 22) != 0
}

#[inline]
pub fn index_field(word: Word) -> usize {
    ((word >> 18) & 0o17) as usize
}

#[inline]
pub fn y_field(word: Word) -> Address {
    (word & HALF_MASK) as Address
}

/// Assemble an instruction word from its fields.
pub const fn instruction(op: u32, ac: u32, indirect: bool, index: u32, y: u32) -> Word {
    ((op as Word & 0o777) << 27)
        | ((ac as Word & 0o17) << 23)
        | ((indirect as Word) << 22)
        | ((index as Word & 0o17) << 18)
        | (y as Word & HALF_MASK)
}

pub fn sixbit_to_string(word: Word) -> String {
    let mut s = String::with_capacity(6);
    for i in (0..6).rev() {
        let c = ((word >> (6 * i)) & 0o77) as u8;
        s.push((c + 0o40) as char);
    }
    s.trim_end().to_string()
}

/// Left-justified SIXBIT; characters outside the SIXBIT range are folded to
/// upper case or replaced by a blank.
pub fn string_to_sixbit(s: &str) -> Word {
    let mut word = 0;
    for (i, c) in s.chars().chain(std::iter::repeat(' ')).take(6).enumerate() {
        let c = c.to_ascii_uppercase() as u32;
        let c = if (0o40..0o140).contains(&c) { c - 0o40 } else { 0 };
        word |= (c as Word) << (30 - 6 * i);
    }
    word
}

const SQUOZE_CHARS: &[u8; 40] = b" 0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ.$%";
const SQUOZE_MASK: Word = 0o37777777777;

pub fn squoze_to_string(word: Word) -> String {
    let mut value = word & SQUOZE_MASK;
    let mut chars = [b' '; 6];
    for c in chars.iter_mut().rev() {
        *c = SQUOZE_CHARS[(value % 40) as usize];
        value /= 40;
    }
    String::from_utf8_lossy(&chars).trim().to_string()
}

pub fn string_to_squoze(s: &str) -> Word {
    let mut value = 0;
    for c in s.bytes().chain(std::iter::repeat(b' ')).take(6) {
        let c = c.to_ascii_uppercase();
        let code = SQUOZE_CHARS.iter().position(|&x| x == c).unwrap_or(0);
        value = value * 40 + code as Word;
    }
    value
}
