//! Per-address translation cache.
//!
//! Every address of the 18-bit space owns one slot. A slot is either a
//! stub that must be decoded before it runs, a decoded uop sequence, a
//! direct jump, or a marker for memory that does not exist. The cache must
//! be told about every store to guest memory, otherwise stale translations
//! keep running.

use log::{debug, info, log_enabled, Level};

use super::Uop;
use crate::word::{Address, Word, ADDRESS_SPACE, HALF_MASK};

pub const PAGE_SIZE: usize = 1024;

#[derive(Clone, Copy)]
pub struct Decoded {
    pub(super) ir: Word,
    /// Whether Y has to go through index and indirect resolution.
    pub(super) ea: bool,
    pub(super) read: Uop,
    pub(super) operate: Uop,
    pub(super) write: Uop,
}

impl Decoded {
    pub fn instruction(&self) -> Word {
        self.ir
    }
}

#[derive(Clone, Copy)]
pub enum Slot {
    Stub,
    /// Pure page: the first entry decodes the whole page.
    PageStub,
    Decoded(Decoded),
    /// `JRST Y` without index, indirection or AC bits.
    Jump(Address),
    Unmapped,
}

impl Slot {
    pub fn is_stub(&self) -> bool {
        matches!(self, Slot::Stub | Slot::PageStub)
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Stub => write!(f, "Stub"),
            Slot::PageStub => write!(f, "PageStub"),
            Slot::Decoded(d) => write!(f, "Decoded({:012o})", d.ir),
            Slot::Jump(to) => write!(f, "Jump({to:06o})"),
            Slot::Unmapped => write!(f, "Unmapped"),
        }
    }
}

#[derive(Default)]
struct CacheStats {
    decodes: usize,
    invalidations: usize,
    page_fills: usize,
}

pub struct CodeCache {
    slots: Box<[Slot]>,
    stats: CacheStats,
}

impl Drop for CodeCache {
    fn drop(&mut self) {
        if log_enabled!(Level::Info) {
            info!("Code cache:");
            info!("  decodes:       {}", self.stats.decodes);
            info!("  invalidations: {}", self.stats.invalidations);
            info!("  page fills:    {}", self.stats.page_fills);
        }
    }
}

pub fn page_base(address: Address) -> Address {
    address & !(PAGE_SIZE as Address - 1) & HALF_MASK as Address
}

fn index(address: Address) -> usize {
    (address & HALF_MASK as Address) as usize
}

impl CodeCache {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::Stub; ADDRESS_SPACE].into_boxed_slice(),
            stats: Default::default(),
        }
    }

    pub fn get(&self, address: Address) -> Slot {
        self.slots[index(address)]
    }

    pub(super) fn set(&mut self, address: Address, slot: Slot) {
        if !slot.is_stub() {
            self.stats.decodes += 1;
        }
        self.slots[index(address)] = slot;
    }

    /// The word at `address` changed; translate it again before running it.
    pub fn invalidate_word(&mut self, address: Address) {
        let slot = &mut self.slots[index(address)];
        if !matches!(slot, Slot::Stub) {
            self.stats.invalidations += 1;
            *slot = Slot::Stub;
        }
    }

    fn fill_page(&mut self, address: Address, slot: Slot) {
        let base = page_base(address) as usize;
        debug!("page {:06o}: {slot:?}", base);
        self.stats.page_fills += 1;
        self.slots[base..base + PAGE_SIZE].fill(slot);
    }

    /// The page holds code that does not change while it runs.
    pub fn pure_page(&mut self, address: Address) {
        self.fill_page(address, Slot::PageStub);
    }

    /// The page is writable; decode word by word.
    pub fn unpure_page(&mut self, address: Address) {
        self.fill_page(address, Slot::Stub);
    }

    pub fn unmapped_page(&mut self, address: Address) {
        self.fill_page(address, Slot::Unmapped);
    }
}
