use crate::word::{Address, Word, HALF_MASK};

// Processor flags, as they appear in the left half of a PC word.
pub const AROV: Word = 0o400000;
pub const CRY0: Word = 0o200000;
pub const CRY1: Word = 0o100000;
pub const FOV: Word = 0o040000;
pub const USER: Word = 0o010000;
pub const TRAP1: Word = 0o000200;
pub const DCK: Word = 0o000040;

pub const FLAGS_MASK: Word = 0o777740;

#[derive(Debug, Clone, Default)]
pub struct Registers {
    /// Address of the next instruction. While an instruction runs it
    /// already points past it, so skips add one and jumps overwrite it.
    pub pc: Address,
    /// AC field of the current instruction.
    pub ac: usize,
    pub flags: Word,
    pub ir: Word,
    pub ar: Word,
    pub br: Word,
    pub mq: Word,
    /// Effective address of the current instruction.
    pub ma: Address,
    /// Last word seen by the effective address calculation.
    pub mb: Word,
    /// Fast memory: the sixteen accumulators.
    pub fm: [Word; 16],
}

impl Registers {
    pub fn ac_next(&self) -> usize {
        (self.ac + 1) & 0o17
    }

    /// `flags,,PC` as stored by subroutine calls.
    pub fn pc_word(&self) -> Word {
        ((self.flags & FLAGS_MASK) << 18) | self.pc as Word
    }

    /// Skip the next instruction.
    pub(super) fn skip(&mut self) {
        self.pc = (self.pc + 1) & HALF_MASK as Address;
    }

    pub(super) fn set_carries(&mut self, cry0: bool, cry1: bool) {
        if cry0 {
            self.flags |= CRY0;
        }
        if cry1 {
            self.flags |= CRY1;
        }
        if cry0 != cry1 {
            self.flags |= AROV | TRAP1;
        }
    }

    pub(super) fn set_overflow(&mut self) {
        self.flags |= AROV | TRAP1;
    }
}
