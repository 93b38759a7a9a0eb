pub mod cpu;
pub mod disasm;
pub mod format;
pub mod insn;
pub mod memory;
pub mod word;
