//! The PDP-10 processor.
//!
//! Instructions are translated once into a uop triple (read operands,
//! operate, write back) stored in the per-address [`CodeCache`]. Running a
//! program means following the PC from slot to slot; a store to memory
//! throws the affected slot back to its stub so the word is decoded again.

pub mod cache;
mod decode;
mod its;
mod ops;
pub mod regs;
mod uops;

use std::io::{self, Read, Write};

use log::{debug, info, log_enabled, trace, Level};
use thiserror::Error;

pub use self::cache::{CodeCache, Slot, PAGE_SIZE};
use self::{cache::Decoded, decode::Entry, its::Its};
pub use self::regs::Registers;
use crate::{
    memory::{Memory, MemoryError},
    word::{ac_field, index_field, indirect, y_field, Address, Word, HALF_MASK, WORD_MASK},
};

pub(crate) type Uop = fn(&mut Cpu) -> Result<(), Stop>;

#[derive(Debug, Error)]
pub enum Fault {
    #[error("unmapped memory at {0:06o}")]
    Unmapped(Address),
    #[error("unimplemented {what} at {pc:06o}")]
    Unimplemented { what: String, pc: Address },
    #[error("console I/O failed: {0}")]
    Console(#[from] io::Error),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// How a program stopped without faulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Halt(Address),
    Logout,
}

/// Anything that ends the instruction stream; uops return it as an error
/// so `?` unwinds straight back to the driver.
#[derive(Debug)]
pub(crate) enum Stop {
    Halt(Address),
    Logout,
    Fault(Fault),
}

impl From<Fault> for Stop {
    fn from(f: Fault) -> Self {
        Stop::Fault(f)
    }
}

impl From<MemoryError> for Stop {
    fn from(e: MemoryError) -> Self {
        Stop::Fault(e.into())
    }
}

impl From<io::Error> for Stop {
    fn from(e: io::Error) -> Self {
        Stop::Fault(e.into())
    }
}

impl Stop {
    fn into_exit(self) -> Result<Exit, Fault> {
        match self {
            Stop::Halt(pc) => Ok(Exit::Halt(pc)),
            Stop::Logout => Ok(Exit::Logout),
            Stop::Fault(f) => Err(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    /// Decode once, run from the code cache.
    #[default]
    Cached,
    /// Decode every instruction every time.
    Interpreter,
}

impl std::str::FromStr for Engine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cached" => Ok(Engine::Cached),
            "interpreter" => Ok(Engine::Interpreter),
            _ => anyhow::bail!("unknown engine: {}", s),
        }
    }
}

pub struct Cpu {
    pub regs: Registers,
    memory: Memory,
    cache: CodeCache,
    table: Box<[Entry]>,
    engine: Engine,
    its: Its,
    // Address of the instruction being executed, for diagnostics.
    current: Address,
    // Set by an operation that must not store its result (no divide).
    inhibit_store: bool,
    // Word queued by XCT or an LUUO; the next step runs it in place of a
    // fetch from PC.
    pending: Option<Word>,
    inst_count: u64,
}

impl Drop for Cpu {
    fn drop(&mut self) {
        if log_enabled!(Level::Info) {
            info!("Overall instruction count: {}", self.inst_count);
        }
    }
}

impl Cpu {
    /// Take over `memory` and map every page: pages holding memory start out
    /// as stubs, the rest as unmapped.
    pub fn new(memory: Memory) -> Self {
        let mut cpu = Self {
            regs: Registers::default(),
            its: Its::new(memory.top()),
            memory,
            cache: CodeCache::new(),
            table: decode::table(),
            engine: Engine::default(),
            current: 0,
            inhibit_store: false,
            pending: None,
            inst_count: 0,
        };

        for base in (0..crate::word::ADDRESS_SPACE).step_by(PAGE_SIZE) {
            let base = base as Address;
            if cpu.memory.intersects(base, base + PAGE_SIZE as Address) {
                cpu.unpure_page(base);
            } else {
                cpu.unmapped_page(base);
            }
        }
        cpu
    }

    pub fn set_engine(&mut self, engine: Engine) {
        self.engine = engine;
    }

    pub fn set_console(&mut self, output: impl Write + 'static, input: impl Read + 'static) {
        self.its.set_console(Box::new(output), Box::new(input));
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn slot(&self, address: Address) -> Slot {
        self.cache.get(address)
    }

    pub fn get_word_at(&self, address: Address) -> Option<Word> {
        self.memory.get_at(address)
    }

    /// Store into the memory model directly (no accumulator aliasing) and
    /// drop any translation of the word.
    pub fn set_word_at(&mut self, address: Address, word: Word) -> Result<(), Fault> {
        self.memory.set_at(address, word)?;
        self.cache.invalidate_word(address);
        Ok(())
    }

    pub fn add_memory(&mut self, address: Address, data: Box<[Word]>) -> Result<(), Fault> {
        let len = data.len() as Address;
        self.memory.add(address, data)?;
        let end = address + len;
        let mut page = cache::page_base(address);
        while page < end {
            self.unpure_page(page);
            page += PAGE_SIZE as Address;
        }
        Ok(())
    }

    pub fn invalidate_word(&mut self, address: Address) {
        self.cache.invalidate_word(address);
    }

    pub fn pure_page(&mut self, address: Address) {
        self.cache.pure_page(address);
    }

    pub fn unpure_page(&mut self, address: Address) {
        self.cache.unpure_page(address);
    }

    pub fn unmapped_page(&mut self, address: Address) {
        self.cache.unmapped_page(address);
    }

    /// Operand read. Addresses below 20 are the accumulators.
    pub fn read_memory(&self, address: Address) -> Result<Word, Fault> {
        if address < 0o20 {
            return Ok(self.regs.fm[address as usize]);
        }
        self.memory
            .get_at(address)
            .ok_or(Fault::Unmapped(address))
    }

    /// Operand write. Every store to the memory model passes through here so
    /// that the code cache never runs a stale translation.
    pub fn write_memory(&mut self, address: Address, word: Word) -> Result<(), Fault> {
        if address < 0o20 {
            self.regs.fm[address as usize] = word & WORD_MASK;
            return Ok(());
        }
        self.set_word_at(address, word)
    }

    fn fetch(&self, address: Address) -> Result<Word, Fault> {
        self.memory
            .get_at(address)
            .ok_or(Fault::Unmapped(address))
    }

    /// Resolve index registers and indirection until a word without the
    /// indirect bit turns up. A loop of indirect words never ends, just like
    /// on the real machine.
    pub fn calculate_ea(&mut self, mut word: Word) -> Result<Address, Fault> {
        loop {
            let x = index_field(word);
            let mut ea = y_field(word) as Word;
            self.regs.mb = word;
            if x != 0 {
                ea = (ea + self.regs.fm[x]) & HALF_MASK;
                self.regs.mb = self.regs.fm[x];
            }
            if !indirect(word) {
                return Ok(ea as Address);
            }
            word = self.read_memory(ea as Address)?;
        }
    }

    pub(crate) fn unimplemented(&self, what: impl Into<String>) -> Stop {
        Stop::Fault(Fault::Unimplemented {
            what: what.into(),
            pc: self.current,
        })
    }

    fn decode(&self, word: Word) -> Slot {
        decode::decode(&self.table, word)
    }

    /// Decode every word of a pure page in one go.
    fn decode_page(&mut self, address: Address) {
        let base = cache::page_base(address);
        debug!("decoding pure page {base:06o}");
        for a in base..base + PAGE_SIZE as Address {
            let slot = match self.memory.get_at(a) {
                Some(word) => self.decode(word),
                None => Slot::Unmapped,
            };
            self.cache.set(a, slot);
        }
    }

    fn cached_slot(&mut self, pc: Address) -> Result<Slot, Stop> {
        loop {
            match self.cache.get(pc) {
                Slot::Stub => {
                    let word = self.fetch(pc)?;
                    let slot = self.decode(word);
                    debug!("decode {pc:06o}: {slot:?}");
                    self.cache.set(pc, slot);
                }
                Slot::PageStub => self.decode_page(pc),
                Slot::Unmapped => return Err(Fault::Unmapped(pc).into()),
                slot => return Ok(slot),
            }
        }
    }

    /// Run the instruction at PC, or the word queued by XCT or an LUUO.
    pub(crate) fn step(&mut self) -> Result<(), Stop> {
        if let Some(word) = self.pending.take() {
            trace!("{:06o}: xct {}", self.current, crate::disasm::format_instruction(word));
            self.inst_count += 1;
            let slot = self.decode(word);
            return self.execute(slot);
        }

        let pc = self.regs.pc;
        let slot = match self.engine {
            Engine::Cached => self.cached_slot(pc)?,
            Engine::Interpreter => {
                let word = self.fetch(pc)?;
                self.decode(word)
            }
        };

        if log_enabled!(Level::Trace) {
            if let Ok(word) = self.fetch(pc) {
                trace!("{pc:06o}: {}", crate::disasm::format_instruction(word));
            }
        }

        self.inst_count += 1;
        self.current = pc;
        self.regs.pc = (pc + 1) & HALF_MASK as Address;
        self.execute(slot)
    }

    /// Run a translated instruction. PC must already point past it.
    fn execute(&mut self, slot: Slot) -> Result<(), Stop> {
        match slot {
            Slot::Jump(to) => {
                self.regs.pc = to;
                Ok(())
            }
            Slot::Decoded(d) => self.execute_decoded(&d),
            Slot::Unmapped => Err(Fault::Unmapped(self.current).into()),
            Slot::Stub | Slot::PageStub => unreachable!("stub slots are decoded before they run"),
        }
    }

    fn execute_decoded(&mut self, d: &Decoded) -> Result<(), Stop> {
        self.regs.ir = d.ir;
        self.regs.ac = ac_field(d.ir);
        self.regs.ma = if d.ea {
            self.calculate_ea(d.ir)?
        } else {
            self.regs.mb = d.ir;
            y_field(d.ir)
        };
        self.inhibit_store = false;

        (d.read)(self)?;
        (d.operate)(self)?;
        if self.inhibit_store {
            return Ok(());
        }
        (d.write)(self)
    }

    /// Have the next step execute `word` as if it were at the current
    /// location, leaving PC alone (XCT and the LUUO trap). Chains of these
    /// take one step per word.
    pub(crate) fn execute_word(&mut self, word: Word) {
        self.pending = Some(word);
    }

    /// Run from `start` until the program halts or logs out. Faults end the
    /// run with an error.
    pub fn run(&mut self, start: Address) -> Result<Exit, Fault> {
        self.regs.pc = start & HALF_MASK as Address;
        self.pending = None;
        loop {
            if let Err(stop) = self.step() {
                return stop.into_exit();
            }
        }
    }

    /// Like [`Cpu::run`], but give up after `steps` instructions and return
    /// `None` if the program is still running.
    pub fn run_for(&mut self, start: Address, steps: u64) -> Result<Option<Exit>, Fault> {
        self.regs.pc = start & HALF_MASK as Address;
        self.pending = None;
        for _ in 0..steps {
            if let Err(stop) = self.step() {
                return stop.into_exit().map(Some);
            }
        }
        Ok(None)
    }
}

/// Load `memory` into a fresh processor and run it from `start`.
pub fn run(start: Address, memory: Memory) -> Result<Exit, Fault> {
    Cpu::new(memory).run(start)
}
