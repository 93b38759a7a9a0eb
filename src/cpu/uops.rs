//! Operand fetch and result store steps.
//!
//! The read step loads AR (the destination side, normally the accumulator)
//! and BR (the source side, normally `C(E)` or `E` itself); the operate
//! step leaves its result in AR (and MQ for double results); the write step
//! stores it.

use super::{Cpu, Stop};
use crate::word::{make, swap, Word};

type Result = std::result::Result<(), Stop>;

pub(super) fn read_none(_: &mut Cpu) -> Result {
    Ok(())
}

pub(super) fn read_mem(m: &mut Cpu) -> Result {
    m.regs.br = m.read_memory(m.regs.ma)?;
    Ok(())
}

pub(super) fn read_imm(m: &mut Cpu) -> Result {
    m.regs.br = m.regs.ma as Word;
    Ok(())
}

pub(super) fn read_ac(m: &mut Cpu) -> Result {
    m.regs.br = m.regs.fm[m.regs.ac];
    Ok(())
}

pub(super) fn read_ac_mem(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.fm[m.regs.ac];
    m.regs.br = m.read_memory(m.regs.ma)?;
    Ok(())
}

pub(super) fn read_ac_imm(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.fm[m.regs.ac];
    m.regs.br = m.regs.ma as Word;
    Ok(())
}

/// Left-half immediate: `E,,0`.
pub(super) fn read_ac_imm_swapped(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.fm[m.regs.ac];
    m.regs.br = make(m.regs.ma as Word, 0);
    Ok(())
}

pub(super) fn read_ac_mem_swapped(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.fm[m.regs.ac];
    m.regs.br = swap(m.read_memory(m.regs.ma)?);
    Ok(())
}

/// Memory is the destination, the accumulator the source.
pub(super) fn read_mem_ac(m: &mut Cpu) -> Result {
    m.regs.ar = m.read_memory(m.regs.ma)?;
    m.regs.br = m.regs.fm[m.regs.ac];
    Ok(())
}

pub(super) fn read_mem_mem(m: &mut Cpu) -> Result {
    m.regs.ar = m.read_memory(m.regs.ma)?;
    m.regs.br = m.regs.ar;
    Ok(())
}

pub(super) fn read_pair_imm(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.fm[m.regs.ac];
    m.regs.mq = m.regs.fm[m.regs.ac_next()];
    m.regs.br = m.regs.ma as Word;
    Ok(())
}

pub(super) fn read_pair_mem(m: &mut Cpu) -> Result {
    m.regs.ar = m.regs.fm[m.regs.ac];
    m.regs.mq = m.regs.fm[m.regs.ac_next()];
    m.regs.br = m.read_memory(m.regs.ma)?;
    Ok(())
}

pub(super) fn write_none(_: &mut Cpu) -> Result {
    Ok(())
}

pub(super) fn write_ac(m: &mut Cpu) -> Result {
    m.regs.fm[m.regs.ac] = m.regs.ar;
    Ok(())
}

pub(super) fn write_mem(m: &mut Cpu) -> Result {
    m.write_memory(m.regs.ma, m.regs.ar)?;
    Ok(())
}

pub(super) fn write_both(m: &mut Cpu) -> Result {
    m.write_memory(m.regs.ma, m.regs.ar)?;
    m.regs.fm[m.regs.ac] = m.regs.ar;
    Ok(())
}

/// Memory, and the accumulator too unless it is AC 0.
pub(super) fn write_self(m: &mut Cpu) -> Result {
    m.write_memory(m.regs.ma, m.regs.ar)?;
    write_ac_nonzero(m)
}

pub(super) fn write_ac_nonzero(m: &mut Cpu) -> Result {
    if m.regs.ac != 0 {
        m.regs.fm[m.regs.ac] = m.regs.ar;
    }
    Ok(())
}

pub(super) fn write_pair(m: &mut Cpu) -> Result {
    m.regs.fm[m.regs.ac] = m.regs.ar;
    let next = m.regs.ac_next();
    m.regs.fm[next] = m.regs.mq;
    Ok(())
}

pub(super) fn write_pair_both(m: &mut Cpu) -> Result {
    m.write_memory(m.regs.ma, m.regs.ar)?;
    write_pair(m)
}
