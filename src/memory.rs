//! Sparse PDP-10 memory.
//!
//! Memory is a list of disjoint areas kept sorted by start address, each
//! owning its own buffer. Load images are rarely contiguous, so nothing is
//! allocated for the holes between areas.

use std::io::Read;

use thiserror::Error;

use crate::{
    format::{FormatError, WordReader},
    word::{strip_tags, Address, Word, ADDRESS_SPACE, WORD_MASK},
};

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("area {start:06o}-{end:06o} overlaps existing memory")]
    Overlap { start: Address, end: Address },
    #[error("area {start:06o}-{end:06o} is outside the address space")]
    OutOfRange { start: Address, end: Address },
    #[error("empty area at {start:06o}")]
    Empty { start: Address },
    #[error("out of memory growing the area table")]
    OutOfMemory,
    #[error(transparent)]
    Format(#[from] FormatError),
}

#[derive(Debug, Clone)]
pub struct Area {
    pub start: Address,
    pub end: Address,
    pub flags: u32,
    pub data: Box<[Word]>,
}

impl Area {
    fn contains(&self, address: Address) -> bool {
        (self.start..self.end).contains(&address)
    }
}

#[derive(Debug, Default)]
pub struct Memory {
    areas: Vec<Area>,
    current_area: usize,
    current_address: Option<Address>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Insert `data` as a new area starting at `address`.
    pub fn add(&mut self, address: Address, data: Box<[Word]>) -> Result<(), MemoryError> {
        self.add_with_flags(address, data, 0)
    }

    pub fn add_with_flags(
        &mut self,
        address: Address,
        data: Box<[Word]>,
        flags: u32,
    ) -> Result<(), MemoryError> {
        let start = address;
        if data.is_empty() {
            return Err(MemoryError::Empty { start });
        }
        let end = address as usize + data.len();
        if end > ADDRESS_SPACE {
            return Err(MemoryError::OutOfRange {
                start,
                end: end as Address,
            });
        }
        let end = end as Address;

        let ix = self.areas.partition_point(|a| a.start < start);
        let overlaps_prev = ix > 0 && self.areas[ix - 1].end > start;
        let overlaps_next = self.areas.get(ix).is_some_and(|a| a.start < end);
        if overlaps_prev || overlaps_next {
            return Err(MemoryError::Overlap { start, end });
        }

        self.areas
            .try_reserve(1)
            .map_err(|_| MemoryError::OutOfMemory)?;
        self.areas.insert(
            ix,
            Area {
                start,
                end,
                flags,
                data,
            },
        );
        Ok(())
    }

    /// Read words from `reader` into a fresh area at `address`. Returns the
    /// number of words loaded.
    pub fn load<R: Read>(
        &mut self,
        reader: &mut WordReader<R>,
        address: Address,
    ) -> Result<usize, MemoryError> {
        let mut data = vec![];
        while let Some(word) = reader.get_word()? {
            data.push(strip_tags(word));
        }
        let len = data.len();
        if len > 0 {
            self.add(address, data.into_boxed_slice())?;
        }
        log::debug!("loaded {len} words at {address:06o}");
        Ok(len)
    }

    pub fn find_area(&self, address: Address) -> Option<usize> {
        let ix = self.areas.partition_point(|a| a.end <= address);
        self.areas
            .get(ix)
            .filter(|a| a.contains(address))
            .map(|_| ix)
    }

    pub fn get_at(&self, address: Address) -> Option<Word> {
        let area = &self.areas[self.find_area(address)?];
        Some(area.data[(address - area.start) as usize])
    }

    /// Store a word. An address not covered by any area gets a new one-word
    /// area of its own, so the only failure is running out of memory.
    pub fn set_at(&mut self, address: Address, word: Word) -> Result<(), MemoryError> {
        let word = word & WORD_MASK;
        match self.find_area(address) {
            Some(ix) => {
                let area = &mut self.areas[ix];
                area.data[(address - area.start) as usize] = word;
                Ok(())
            }
            None => self.add(address, Box::new([word])),
        }
    }

    /// Position the iteration cursor at `address`, or back at the start of
    /// memory with `None`.
    pub fn set_address(&mut self, address: Option<Address>) {
        match address {
            None => {
                self.current_area = 0;
                self.current_address = None;
            }
            Some(address) => {
                self.current_area = self.areas.partition_point(|a| a.end <= address);
                self.current_address = Some(address);
            }
        }
    }

    /// Next mapped word in address order.
    pub fn get_next(&mut self) -> Option<(Address, Word)> {
        let area = self.areas.get(self.current_area)?;
        let address = match self.current_address {
            Some(a) if a >= area.start => a,
            _ => area.start,
        };
        let word = area.data[(address - area.start) as usize];

        if address + 1 >= area.end {
            self.current_area += 1;
            self.current_address = None;
        } else {
            self.current_address = Some(address + 1);
        }
        Some((address, word))
    }

    pub fn intersects(&self, start: Address, end: Address) -> bool {
        let ix = self.areas.partition_point(|a| a.end <= start);
        self.areas.get(ix).is_some_and(|a| a.start < end)
    }

    /// One past the highest mapped address.
    pub fn top(&self) -> Address {
        self.areas.last().map_or(0, |a| a.end)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn area(len: usize, fill: Word) -> Box<[Word]> {
        vec![fill; len].into_boxed_slice()
    }

    #[test]
    fn areas_stay_sorted() {
        let mut m = Memory::new();
        m.add(0o1000, area(0o100, 1)).unwrap();
        m.add(0o20, area(0o10, 2)).unwrap();
        m.add(0o400, area(0o200, 3)).unwrap();

        let starts: Vec<_> = m.areas().iter().map(|a| a.start).collect();
        assert_eq!(starts, vec![0o20, 0o400, 0o1000]);

        assert_eq!(m.get_at(0o27), Some(2));
        assert_eq!(m.get_at(0o30), None);
        assert_eq!(m.get_at(0o577), Some(3));
        assert_eq!(m.get_at(0o1077), Some(1));
        assert_eq!(m.get_at(0o1100), None);
        assert_eq!(m.get_at(0), None);
    }

    #[test]
    fn overlapping_add_is_refused() {
        let mut m = Memory::new();
        m.add(0o100, area(0o100, 0)).unwrap();
        assert!(matches!(
            m.add(0o150, area(1, 0)),
            Err(MemoryError::Overlap { .. })
        ));
        assert!(matches!(
            m.add(0o50, area(0o31, 0)),
            Err(MemoryError::Overlap { .. })
        ));
        // Adjacent on both sides is fine.
        m.add(0o50, area(0o30, 0)).unwrap();
        m.add(0o200, area(1, 0)).unwrap();
        assert_eq!(m.areas().len(), 3);
    }

    #[test]
    fn out_of_range_add_is_refused() {
        let mut m = Memory::new();
        assert!(matches!(
            m.add(0o777777, area(2, 0)),
            Err(MemoryError::OutOfRange { .. })
        ));
        m.add(0o777777, area(1, 0)).unwrap();
    }

    #[test]
    fn empty_add_is_refused() {
        let mut m = Memory::new();
        assert!(matches!(
            m.add(0o100, area(0, 0)),
            Err(MemoryError::Empty { start: 0o100 })
        ));
        assert!(m.areas().is_empty());

        m.add(0o200, area(1, 7)).unwrap();
        m.set_address(None);
        assert_eq!(m.get_next(), Some((0o200, 7)));
        assert_eq!(m.get_next(), None);
    }

    #[test]
    fn set_at_creates_areas() {
        let mut m = Memory::new();
        m.set_at(0o100, 5).unwrap();
        assert_eq!(m.get_at(0o100), Some(5));
        assert_eq!(m.areas().len(), 1);
        m.set_at(0o100, 6).unwrap();
        assert_eq!(m.get_at(0o100), Some(6));
        assert_eq!(m.areas().len(), 1);
    }

    #[test]
    fn cursor_walks_in_order() {
        let mut m = Memory::new();
        m.add(0o10, Box::new([1, 2])).unwrap();
        m.add(0o2, Box::new([3])).unwrap();

        m.set_address(None);
        let all: Vec<_> = std::iter::from_fn(|| m.get_next()).collect();
        assert_eq!(all, vec![(0o2, 3), (0o10, 1), (0o11, 2)]);
        assert_eq!(m.get_next(), None);

        m.set_address(Some(0o11));
        assert_eq!(m.get_next(), Some((0o11, 2)));
        m.set_address(Some(0o5));
        assert_eq!(m.get_next(), Some((0o10, 1)));
    }

    #[test]
    fn intersects_and_top() {
        let mut m = Memory::new();
        m.add(0o2000, area(0o10, 0)).unwrap();
        assert!(m.intersects(0o2000, 0o4000));
        assert!(m.intersects(0o1000, 0o2001));
        assert!(!m.intersects(0o1000, 0o2000));
        assert!(!m.intersects(0o2010, 0o3000));
        assert_eq!(m.top(), 0o2010);
    }

    proptest! {
        #[test]
        fn area_invariant(ranges in prop::collection::vec((0u32..0o1000, 1usize..0o20), 1..40)) {
            let mut m = Memory::new();
            let mut loaded = vec![];
            for (start, len) in ranges {
                if m.add(start, area(len, start as Word)).is_ok() {
                    loaded.push((start, len as u32));
                }
            }

            for pair in m.areas().windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
            for &(start, len) in &loaded {
                for a in start..start + len {
                    let ix = m.find_area(a).unwrap();
                    prop_assert_eq!(m.areas()[ix].start, start);
                }
            }
            for a in 0..0o1100 {
                let covered = loaded.iter().any(|&(s, l)| (s..s + l).contains(&a));
                prop_assert_eq!(m.get_at(a).is_some(), covered);
            }
        }

        #[test]
        fn round_trip(address in 0u32..(1 << 18), word in 0u64..=WORD_MASK) {
            let mut m = Memory::new();
            m.add(0o1000, area(0o1000, 0)).unwrap();
            m.set_at(address, word).unwrap();
            prop_assert_eq!(m.get_at(address), Some(word));
        }
    }
}
