use super::{
    cache::{Decoded, Slot},
    its, ops,
    uops::*,
    Uop,
};
use crate::word::{ac_field, index_field, indirect, opcode, y_field, Word, WORD_MASK};

const JRST: usize = 0o254;

#[derive(Clone, Copy)]
pub(super) struct Entry {
    read: Uop,
    operate: Uop,
    write: Uop,
}

fn entry(read: Uop, operate: Uop, write: Uop) -> Entry {
    Entry {
        read,
        operate,
        write,
    }
}

/// Operand steps for the four arithmetic modes (basic, immediate, memory,
/// both).
fn arith(op: usize, operate: Uop) -> Entry {
    match op & 3 {
        0 => entry(read_ac_mem, operate, write_ac),
        1 => entry(read_ac_imm, operate, write_ac),
        2 => entry(read_ac_mem, operate, write_mem),
        _ => entry(read_ac_mem, operate, write_both),
    }
}

/// Like [`arith`], for results that fill AC and AC+1.
fn arith_double(op: usize, operate: Uop, pair: bool) -> Entry {
    let (mem, imm): (Uop, Uop) = if pair {
        (read_pair_mem, read_pair_imm)
    } else {
        (read_ac_mem, read_ac_imm)
    };
    match op & 3 {
        0 => entry(mem, operate, write_pair),
        1 => entry(imm, operate, write_pair),
        2 => entry(mem, operate, write_mem),
        _ => entry(mem, operate, write_pair_both),
    }
}

fn moves(op: usize) -> Entry {
    let operate: Uop = match (op >> 2) & 3 {
        0 => ops::mov,
        1 => ops::movs,
        2 => ops::movn,
        _ => ops::movm,
    };
    match op & 3 {
        0 => entry(read_mem, operate, write_ac),
        1 => entry(read_imm, operate, write_ac),
        2 => entry(read_ac, operate, write_mem),
        _ => entry(read_mem, operate, write_self),
    }
}

fn boolean(op: usize) -> Entry {
    let function = (op >> 2) & 0o17;
    let operate = ops::boolean::compile(function);
    // SETZ, SETA, SETCA and SETO ignore the operand.
    let reads_memory = !matches!(function, 0 | 5 | 10 | 15);
    let read: Uop = if op & 3 == 1 || !reads_memory {
        read_ac_imm
    } else {
        read_ac_mem
    };
    match op & 3 {
        0 | 1 => entry(read, operate, write_ac),
        2 => entry(read, operate, write_mem),
        _ => entry(read, operate, write_both),
    }
}

fn half(op: usize) -> Entry {
    let kind = (op >> 2) & 0o17;
    let operate = ops::half::compile(kind);
    let extends = (kind >> 1) & 3 != 0;
    match op & 3 {
        0 => entry(read_ac_mem, operate, write_ac),
        1 => entry(read_ac_imm, operate, write_ac),
        // An extending store replaces the whole memory word.
        2 if extends => entry(read_ac, operate, write_mem),
        2 => entry(read_mem_ac, operate, write_mem),
        _ => entry(read_mem_mem, operate, write_self),
    }
}

fn test(op: usize) -> Entry {
    let modify = (op >> 4) & 3;
    let operate = ops::test_bits::compile(modify << 2 | (op >> 1) & 3);
    let left = op & 1 != 0;
    let read: Uop = match (op & 0o10 != 0, left) {
        (false, false) => read_ac_imm,
        (false, true) => read_ac_imm_swapped,
        (true, false) => read_ac_mem,
        (true, true) => read_ac_mem_swapped,
    };
    let write: Uop = if modify == 0 { write_none } else { write_ac };
    entry(read, operate, write)
}

fn lookup(op: usize) -> Entry {
    let cond = op & 7;
    match op {
        0o001..=0o037 => entry(read_none, ops::luuo, write_none),
        0o040..=0o077 | 0o104 => entry(read_none, its::muuo, write_none),

        0o133 => entry(read_mem, ops::ibp, write_mem),
        0o134 => entry(read_mem, ops::ildb, write_ac),
        0o135 => entry(read_mem, ops::ldb, write_ac),
        0o136 => entry(read_ac_mem, ops::idpb, write_none),
        0o137 => entry(read_ac_mem, ops::dpb, write_none),

        0o200..=0o217 => moves(op),
        0o220..=0o223 => arith(op, ops::imul),
        0o224..=0o227 => arith_double(op, ops::mul, false),
        0o230..=0o233 => arith_double(op, ops::idiv, false),
        0o234..=0o237 => arith_double(op, ops::div, true),

        0o240 => entry(read_ac_imm, ops::ash, write_ac),
        0o241 => entry(read_ac_imm, ops::rot, write_ac),
        0o242 => entry(read_ac_imm, ops::lsh, write_ac),
        0o243 => entry(read_ac_imm, ops::jffo, write_none),
        0o245 => entry(read_pair_imm, ops::rotc, write_pair),
        0o246 => entry(read_pair_imm, ops::lshc, write_pair),

        0o250 => entry(read_ac_mem, ops::exch, write_ac),
        0o251 => entry(read_ac_imm, ops::blt, write_ac),
        0o252 => entry(read_ac_imm, ops::aobjp, write_ac),
        0o253 => entry(read_ac_imm, ops::aobjn, write_ac),
        JRST => entry(read_none, ops::jrst, write_none),
        0o255 => entry(read_none, ops::jfcl, write_none),
        0o256 => entry(read_none, ops::xct, write_none),

        0o260 => entry(read_ac_imm, ops::pushj, write_ac),
        0o261 => entry(read_ac_mem, ops::push, write_ac),
        0o262 => entry(read_ac_imm, ops::pop, write_ac),
        0o263 => entry(read_ac_imm, ops::popj, write_ac),
        0o264 => entry(read_none, ops::jsr, write_none),
        0o265 => entry(read_none, ops::jsp, write_ac),
        0o266 => entry(read_ac_imm, ops::jsa, write_ac),
        0o267 => entry(read_ac_imm, ops::jra, write_ac),

        0o270..=0o273 => arith(op, ops::add),
        0o274..=0o277 => arith(op, ops::sub),

        0o300..=0o307 => entry(read_ac_imm, ops::cmp::compile(cond), write_none),
        0o310..=0o317 => entry(read_ac_mem, ops::cmp::compile(cond), write_none),
        0o320..=0o327 => entry(read_ac_imm, ops::jump::compile(cond), write_none),
        0o330..=0o337 => entry(read_mem_mem, ops::skip::compile(cond), write_ac_nonzero),
        0o340..=0o347 => entry(read_ac_imm, ops::aoj::compile(cond), write_ac),
        0o350..=0o357 => entry(read_mem_mem, ops::aos::compile(cond), write_self),
        0o360..=0o367 => entry(read_ac_imm, ops::soj::compile(cond), write_ac),
        0o370..=0o377 => entry(read_mem_mem, ops::sos::compile(cond), write_self),

        0o400..=0o477 => boolean(op),
        0o500..=0o577 => half(op),
        0o600..=0o677 => test(op),

        // UUO 0, floating point, ASHC, MAP and I/O.
        _ => entry(read_none, ops::unimplemented, write_none),
    }
}

/// Build the opcode table once per processor.
pub(super) fn table() -> Box<[Entry]> {
    (0..512).map(lookup).collect()
}

pub(super) fn decode(table: &[Entry], word: Word) -> Slot {
    let word = word & WORD_MASK;
    let op = opcode(word);
    let direct = !indirect(word) && index_field(word) == 0;
    if op == JRST && ac_field(word) == 0 && direct {
        return Slot::Jump(y_field(word));
    }

    let Entry {
        read,
        operate,
        write,
    } = table[op];
    Slot::Decoded(Decoded {
        ir: word,
        ea: !direct,
        read,
        operate,
        write,
    })
}
