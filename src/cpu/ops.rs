//! Operate steps: what each PDP-10 instruction does once its operands are
//! in AR and BR.
//!
//! Families that differ only in a condition or function field are written
//! once with a const parameter; `gen_compiler!` builds the table that picks
//! the instance for a given field value at decode time.

use super::{
    regs::{Registers, AROV, DCK, FLAGS_MASK, TRAP1, USER},
    Cpu, Stop,
};
use crate::word::{
    is_negative, lh, make, rh, sign_extend, sign_extend_half, swap, Address, Word, HALF_MASK,
    SIGN_BIT, WORD_MASK,
};

type Result = std::result::Result<(), Stop>;

const MAGNITUDE: Word = 0o377777777777;
const DOUBLE_MASK: u128 = (1 << 72) - 1;
const ONE_ONE: Word = 0o000001000001;

macro_rules! gen_compiler {
    ($f:ident, [$($n:literal),*]) => {
        pub(super) mod $f {
            use crate::cpu::Uop;

            pub fn compile(n: usize) -> Uop {
                match n {
                    $($n => super::$f::<$n>,)*
                    _ => unreachable!(),
                }
            }
        }
    };
}

impl Registers {
    fn add(&mut self, a: Word, b: Word) -> Word {
        let sum = a + b;
        let cry0 = sum >> 36 != 0;
        let cry1 = ((a & MAGNITUDE) + (b & MAGNITUDE)) >> 35 != 0;
        self.set_carries(cry0, cry1);
        sum & WORD_MASK
    }

    fn sub(&mut self, a: Word, b: Word) -> Word {
        let nb = !b & WORD_MASK;
        let sum = a + nb + 1;
        let cry0 = sum >> 36 != 0;
        let cry1 = ((a & MAGNITUDE) + (nb & MAGNITUDE) + 1) >> 35 != 0;
        self.set_carries(cry0, cry1);
        sum & WORD_MASK
    }
}

#[inline]
fn condition<const C: usize>(a: i64, b: i64) -> bool {
    match C {
        0 => false,
        1 => a < b,
        2 => a == b,
        3 => a <= b,
        4 => true,
        5 => a >= b,
        6 => a != b,
        7 => a > b,
        _ => unreachable!(),
    }
}

pub(super) fn unimplemented(m: &mut Cpu) -> Result {
    let name = crate::disasm::mnemonic(m.regs.ir);
    Err(m.unimplemented(format!("instruction {name} ({:012o})", m.regs.ir)))
}

/// Local UUO: leave the instruction in 40 and execute 41.
pub(super) fn luuo(m: &mut Cpu) -> Result {
    let uuo = (m.regs.ir & 0o777740000000) | m.regs.ma as Word;
    m.write_memory(0o40, uuo)?;
    let handler = m.read_memory(0o41)?;
    m.execute_word(handler);
    Ok(())
}

// Full-word moves.

pub(super) fn mov(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.br;
    Ok(())
}

pub(super) fn movs(m: &mut Cpu) -> Result {
    m.regs.ar = swap(m.regs.br);
    Ok(())
}

pub(super) fn movn(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.sub(0, m.regs.br);
    Ok(())
}

pub(super) fn movm(m: &mut Cpu) -> Result {
    m.regs.ar = if is_negative(m.regs.br) {
        m.regs.sub(0, m.regs.br)
    } else {
        m.regs.br
    };
    Ok(())
}

// Fixed-point arithmetic.

pub(super) fn add(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.add(m.regs.ar, m.regs.br);
    Ok(())
}

pub(super) fn sub(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.sub(m.regs.ar, m.regs.br);
    Ok(())
}

pub(super) fn imul(m: &mut Cpu) -> Result {
    let p = sign_extend(m.regs.ar) as i128 * sign_extend(m.regs.br) as i128;
    if !(-(1i128 << 35)..(1i128 << 35)).contains(&p) {
        m.regs.set_overflow();
    }
    m.regs.ar = p as u64 & WORD_MASK;
    Ok(())
}

/// Double-length product: high word in AR, low word in MQ with the sign of
/// the product in bit 0.
pub(super) fn mul(m: &mut Cpu) -> Result {
    let p = sign_extend(m.regs.ar) as i128 * sign_extend(m.regs.br) as i128;
    if m.regs.ar == SIGN_BIT && m.regs.br == SIGN_BIT {
        m.regs.set_overflow();
    }
    m.regs.ar = (p >> 35) as u64 & WORD_MASK;
    m.regs.mq = (p as u64 & MAGNITUDE) | if p < 0 { SIGN_BIT } else { 0 };
    Ok(())
}

fn no_divide(m: &mut Cpu) {
    m.regs.flags |= AROV | TRAP1 | DCK;
    m.inhibit_store = true;
}

pub(super) fn idiv(m: &mut Cpu) -> Result {
    let (a, b) = (sign_extend(m.regs.ar), sign_extend(m.regs.br));
    if b == 0 || (a == -(1 << 35) && b == -1) {
        no_divide(m);
        return Ok(());
    }
    m.regs.ar = (a / b) as u64 & WORD_MASK;
    m.regs.mq = (a % b) as u64 & WORD_MASK;
    Ok(())
}

/// Divide the double word in AR,MQ.
pub(super) fn div(m: &mut Cpu) -> Result {
    let dividend = (sign_extend(m.regs.ar) as i128) << 35 | (m.regs.mq & MAGNITUDE) as i128;
    let divisor = sign_extend(m.regs.br) as i128;
    if divisor == 0 {
        no_divide(m);
        return Ok(());
    }
    let q = dividend / divisor;
    if !(-(1i128 << 35)..(1i128 << 35)).contains(&q) {
        no_divide(m);
        return Ok(());
    }
    m.regs.ar = q as u64 & WORD_MASK;
    m.regs.mq = (dividend % divisor) as u64 & WORD_MASK;
    Ok(())
}

// Shifts. The count is E taken as a signed 18-bit number; negative counts
// shift right.

fn shift_count(m: &Cpu) -> i64 {
    sign_extend_half(m.regs.br & HALF_MASK).clamp(-255, 255)
}

pub(super) fn lsh(m: &mut Cpu) -> Result {
    let n = shift_count(m);
    m.regs.ar = match n {
        36.. | ..=-36 => 0,
        0.. => (m.regs.ar << n) & WORD_MASK,
        _ => m.regs.ar >> -n,
    };
    Ok(())
}

pub(super) fn rot(m: &mut Cpu) -> Result {
    let n = shift_count(m).rem_euclid(36) as u32;
    let a = m.regs.ar;
    m.regs.ar = ((a << n) | (a >> (36 - n))) & WORD_MASK;
    Ok(())
}

pub(super) fn ash(m: &mut Cpu) -> Result {
    let n = shift_count(m).clamp(-72, 72);
    let v = sign_extend(m.regs.ar) as i128;
    let sign = m.regs.ar & SIGN_BIT;
    m.regs.ar = if n >= 0 {
        let shifted = v << n;
        if !(-(1i128 << 35)..(1i128 << 35)).contains(&shifted) {
            m.regs.set_overflow();
        }
        sign | (shifted as u64 & MAGNITUDE)
    } else {
        (v >> -n) as u64 & WORD_MASK
    };
    Ok(())
}

/// Count leading zeros into AC+1 and jump unless AC is zero.
pub(super) fn jffo(m: &mut Cpu) -> Result {
    let next = m.regs.ac_next();
    if m.regs.ar == 0 {
        m.regs.fm[next] = 0;
    } else {
        m.regs.fm[next] = (m.regs.ar.leading_zeros() - 28) as Word;
        m.regs.pc = m.regs.ma;
    }
    Ok(())
}

fn split_double(m: &mut Cpu, v: u128) {
    m.regs.ar = (v >> 36) as u64 & WORD_MASK;
    m.regs.mq = v as u64 & WORD_MASK;
}

fn double(m: &Cpu) -> u128 {
    (m.regs.ar as u128) << 36 | m.regs.mq as u128
}

pub(super) fn lshc(m: &mut Cpu) -> Result {
    let n = shift_count(m);
    let v = double(m);
    let r = match n {
        72.. | ..=-72 => 0,
        0.. => (v << n) & DOUBLE_MASK,
        _ => v >> -n,
    };
    split_double(m, r);
    Ok(())
}

pub(super) fn rotc(m: &mut Cpu) -> Result {
    let n = shift_count(m).rem_euclid(72) as u32;
    let v = double(m);
    split_double(m, ((v << n) | (v >> (72 - n))) & DOUBLE_MASK);
    Ok(())
}

// Exchange, block transfer, AOBJx.

pub(super) fn exch(m: &mut Cpu) -> Result {
    m.write_memory(m.regs.ma, m.regs.ar)?;
    m.regs.ar = m.regs.br;
    Ok(())
}

/// Copy from LH(AC) to RH(AC) up to and including E. The pointer is left in
/// AC unless the block overwrote the accumulator.
pub(super) fn blt(m: &mut Cpu) -> Result {
    let end = m.regs.ma;
    let mut src = lh(m.regs.ar) as Address;
    let mut dst = rh(m.regs.ar) as Address;
    let first = dst;
    loop {
        let word = m.read_memory(src)?;
        m.write_memory(dst, word)?;
        if dst >= end {
            break;
        }
        src = (src + 1) & HALF_MASK as Address;
        dst = (dst + 1) & HALF_MASK as Address;
    }
    let ac = m.regs.ac as Address;
    if (first..=dst).contains(&ac) {
        m.inhibit_store = true;
    }
    m.regs.ar = make(src as Word + 1, dst as Word + 1);
    Ok(())
}

pub(super) fn aobjp(m: &mut Cpu) -> Result {
    m.regs.ar = (m.regs.ar + ONE_ONE) & WORD_MASK;
    if !is_negative(m.regs.ar) {
        m.regs.pc = m.regs.ma;
    }
    Ok(())
}

pub(super) fn aobjn(m: &mut Cpu) -> Result {
    m.regs.ar = (m.regs.ar + ONE_ONE) & WORD_MASK;
    if is_negative(m.regs.ar) {
        m.regs.pc = m.regs.ma;
    }
    Ok(())
}

// Jumps.

/// JRST, JRSTF and HALT. Other AC bits are not supported.
pub(super) fn jrst(m: &mut Cpu) -> Result {
    let ac = m.regs.ac;
    if ac & !0o7 != 0 {
        return Err(m.unimplemented(format!("JRST {ac:o},")));
    }
    if ac & 0o2 != 0 {
        let user = m.regs.flags & USER;
        m.regs.flags = (lh(m.regs.mb) & FLAGS_MASK & !USER) | user;
    }
    m.regs.pc = m.regs.ma;
    if ac & 0o4 != 0 {
        return Err(Stop::Halt(m.regs.ma));
    }
    Ok(())
}

/// Jump if any flag selected by the AC field is set, clearing them.
pub(super) fn jfcl(m: &mut Cpu) -> Result {
    let mask = (m.regs.ac as Word) << 14;
    if m.regs.flags & mask != 0 {
        m.regs.flags &= !mask;
        m.regs.pc = m.regs.ma;
    }
    Ok(())
}

pub(super) fn xct(m: &mut Cpu) -> Result {
    let word = m.read_memory(m.regs.ma)?;
    m.execute_word(word);
    Ok(())
}

// Stack and subroutine calls.

pub(super) fn pushj(m: &mut Cpu) -> Result {
    m.regs.ar = (m.regs.ar + ONE_ONE) & WORD_MASK;
    let pc_word = m.regs.pc_word();
    m.write_memory(rh(m.regs.ar) as Address, pc_word)?;
    m.regs.pc = m.regs.ma;
    Ok(())
}

pub(super) fn push(m: &mut Cpu) -> Result {
    m.regs.ar = (m.regs.ar + ONE_ONE) & WORD_MASK;
    m.write_memory(rh(m.regs.ar) as Address, m.regs.br)?;
    Ok(())
}

pub(super) fn pop(m: &mut Cpu) -> Result {
    let word = m.read_memory(rh(m.regs.ar) as Address)?;
    m.write_memory(m.regs.ma, word)?;
    m.regs.ar = m.regs.ar.wrapping_sub(ONE_ONE) & WORD_MASK;
    Ok(())
}

pub(super) fn popj(m: &mut Cpu) -> Result {
    let word = m.read_memory(rh(m.regs.ar) as Address)?;
    m.regs.ar = m.regs.ar.wrapping_sub(ONE_ONE) & WORD_MASK;
    m.regs.pc = rh(word) as Address;
    Ok(())
}

pub(super) fn jsr(m: &mut Cpu) -> Result {
    let pc_word = m.regs.pc_word();
    m.write_memory(m.regs.ma, pc_word)?;
    m.regs.pc = (m.regs.ma + 1) & HALF_MASK as Address;
    Ok(())
}

pub(super) fn jsp(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.pc_word();
    m.regs.pc = m.regs.ma;
    Ok(())
}

pub(super) fn jsa(m: &mut Cpu) -> Result {
    m.write_memory(m.regs.ma, m.regs.ar)?;
    m.regs.ar = make(m.regs.ma as Word, m.regs.pc as Word);
    m.regs.pc = (m.regs.ma + 1) & HALF_MASK as Address;
    Ok(())
}

pub(super) fn jra(m: &mut Cpu) -> Result {
    m.regs.ar = m.read_memory(lh(m.regs.ar) as Address)?;
    m.regs.pc = m.regs.ma;
    Ok(())
}

// Compare, jump and skip families. The low three opcode bits select the
// condition.

fn cmp<const C: usize>(m: &mut Cpu) -> Result {
    if condition::<C>(sign_extend(m.regs.ar), sign_extend(m.regs.br)) {
        m.regs.skip();
    }
    Ok(())
}

gen_compiler!(cmp, [0, 1, 2, 3, 4, 5, 6, 7]);

fn jump<const C: usize>(m: &mut Cpu) -> Result {
    if condition::<C>(sign_extend(m.regs.ar), 0) {
        m.regs.pc = m.regs.ma;
    }
    Ok(())
}

gen_compiler!(jump, [0, 1, 2, 3, 4, 5, 6, 7]);

fn skip<const C: usize>(m: &mut Cpu) -> Result {
    if condition::<C>(sign_extend(m.regs.ar), 0) {
        m.regs.skip();
    }
    Ok(())
}

gen_compiler!(skip, [0, 1, 2, 3, 4, 5, 6, 7]);

fn aoj<const C: usize>(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.add(m.regs.ar, 1);
    jump::<C>(m)
}

gen_compiler!(aoj, [0, 1, 2, 3, 4, 5, 6, 7]);

fn aos<const C: usize>(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.add(m.regs.ar, 1);
    skip::<C>(m)
}

gen_compiler!(aos, [0, 1, 2, 3, 4, 5, 6, 7]);

fn soj<const C: usize>(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.sub(m.regs.ar, 1);
    jump::<C>(m)
}

gen_compiler!(soj, [0, 1, 2, 3, 4, 5, 6, 7]);

fn sos<const C: usize>(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.sub(m.regs.ar, 1);
    skip::<C>(m)
}

gen_compiler!(sos, [0, 1, 2, 3, 4, 5, 6, 7]);

/// The sixteen Boolean functions of AC and the operand. Bit 0 of `N` is the
/// result for AC=1, E=1; bit 1 for AC=0, E=1; bit 2 for AC=1, E=0; bit 3
/// for AC=0, E=0.
fn boolean<const N: usize>(m: &mut Cpu) -> Result {
    let (a, b) = (m.regs.ar, m.regs.br);
    let mut r = 0;
    if N & 1 != 0 {
        r |= a & b;
    }
    if N & 2 != 0 {
        r |= !a & b;
    }
    if N & 4 != 0 {
        r |= a & !b;
    }
    if N & 8 != 0 {
        r |= !a & !b;
    }
    m.regs.ar = r & WORD_MASK;
    Ok(())
}

gen_compiler!(boolean, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);

/// Half-word moves. `K` is opcode bits 3-6: destination half (right when
/// set), extension of the other half (none, zeros, ones, sign), and whether
/// the source half is the opposite one.
fn half<const K: usize>(m: &mut Cpu) -> Result {
    let to_right = K & 0o10 != 0;
    let cross = K & 0o1 != 0;
    let from_right = to_right != cross;

    let src = if from_right {
        rh(m.regs.br)
    } else {
        lh(m.regs.br)
    };
    let dst = m.regs.ar;
    let other = match (K >> 1) & 3 {
        0 if to_right => lh(dst),
        0 => rh(dst),
        1 => 0,
        2 => HALF_MASK,
        _ if src & 0o400000 != 0 => HALF_MASK,
        _ => 0,
    };

    m.regs.ar = if to_right {
        make(other, src)
    } else {
        make(src, other)
    };
    Ok(())
}

gen_compiler!(half, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);

/// Test instructions. The mask is already in BR; `K` holds the modification
/// (none, zero, complement, ones) in its high two bits and the skip
/// condition (never, all masked bits zero, always, some bit set) in the low
/// two.
fn test_bits<const K: usize>(m: &mut Cpu) -> Result {
    let (a, mask) = (m.regs.ar, m.regs.br);
    let t = a & mask;
    let take = match K & 3 {
        0 => false,
        1 => t == 0,
        2 => true,
        _ => t != 0,
    };
    m.regs.ar = match K >> 2 {
        0 => a,
        1 => a & !mask,
        2 => a ^ mask,
        _ => a | mask,
    };
    if take {
        m.regs.skip();
    }
    Ok(())
}

gen_compiler!(test_bits, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);

// Byte instructions. A byte pointer holds the position P (bits 0-5), the
// size S (bits 6-11) and an address part like an instruction's.

fn byte_fields(ptr: Word) -> (u32, u32) {
    (((ptr >> 30) & 0o77) as u32, ((ptr >> 24) & 0o77) as u32)
}

fn byte_mask(size: u32) -> Word {
    1u64.checked_shl(size).map_or(u64::MAX, |b| b - 1) & WORD_MASK
}

fn increment_pointer(ptr: Word) -> Word {
    let (p, s) = byte_fields(ptr);
    if p >= s {
        return (ptr & !(0o77 << 30)) | ((p - s) as Word) << 30;
    }
    let p = 36u32.wrapping_sub(s) & 0o77;
    let y = (rh(ptr) + 1) & HALF_MASK;
    (ptr & 0o007777000000) | (p as Word) << 30 | y
}

fn load_byte(m: &mut Cpu, ptr: Word) -> std::result::Result<Word, Stop> {
    let (p, s) = byte_fields(ptr);
    let address = m.calculate_ea(ptr)?;
    let word = m.read_memory(address)?;
    Ok(word.checked_shr(p).unwrap_or(0) & byte_mask(s))
}

fn deposit_byte(m: &mut Cpu, ptr: Word, byte: Word) -> Result {
    let (p, s) = byte_fields(ptr);
    let address = m.calculate_ea(ptr)?;
    let word = m.read_memory(address)?;
    let mask = byte_mask(s).checked_shl(p).unwrap_or(0) & WORD_MASK;
    let byte = byte.checked_shl(p).unwrap_or(0) & mask;
    m.write_memory(address, (word & !mask) | byte)?;
    Ok(())
}

pub(super) fn ibp(m: &mut Cpu) -> Result {
    m.regs.ar = increment_pointer(m.regs.br);
    Ok(())
}

pub(super) fn ldb(m: &mut Cpu) -> Result {
    let ptr = m.regs.br;
    m.regs.ar = load_byte(m, ptr)?;
    Ok(())
}

pub(super) fn ildb(m: &mut Cpu) -> Result {
    let ptr = increment_pointer(m.regs.br);
    m.write_memory(m.regs.ma, ptr)?;
    m.regs.ar = load_byte(m, ptr)?;
    Ok(())
}

pub(super) fn dpb(m: &mut Cpu) -> Result {
    let (ptr, byte) = (m.regs.br, m.regs.ar);
    deposit_byte(m, ptr, byte)
}

pub(super) fn idpb(m: &mut Cpu) -> Result {
    let ptr = increment_pointer(m.regs.br);
    m.write_memory(m.regs.ma, ptr)?;
    let byte = m.regs.ar;
    deposit_byte(m, ptr, byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_pointer_increment() {
        // 440700,,100: before the first 7-bit byte of word 100.
        let ptr = 0o440700000100;
        let ptr = increment_pointer(ptr);
        assert_eq!(ptr, 0o350700000100);
        let ptr = (1..5).fold(ptr, |p, _| increment_pointer(p));
        assert_eq!(ptr, 0o010700000100);
        // Fewer bits left than a byte: on to the next word.
        assert_eq!(increment_pointer(ptr), 0o350700000101);
    }

    #[test]
    fn byte_pointer_keeps_index_and_indirect() {
        assert_eq!(increment_pointer(0o000627000100), 0o360627000101);
    }

    #[test]
    fn byte_masks() {
        assert_eq!(byte_mask(7), 0o177);
        assert_eq!(byte_mask(36), WORD_MASK);
        assert_eq!(byte_mask(0), 0);
    }

    #[test]
    fn conditions() {
        assert!(!condition::<0>(1, 1));
        assert!(condition::<1>(-1, 0));
        assert!(condition::<3>(0, 0));
        assert!(condition::<5>(0, 0));
        assert!(condition::<6>(1, 0));
        assert!(condition::<7>(1, 0));
        assert!(!condition::<7>(0, 0));
    }
}
