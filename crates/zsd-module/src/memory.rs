use std::ops::Range;

use crate::codec::Address;
use crate::error::ModuleError;

/// Size of one linear memory page.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Pages addressable with 32-bit addresses (4 GiB).
pub const MAX_PAGES: u32 = 65_536;

/// The growable byte buffer every foreign address indexes into.
///
/// Memory only ever grows, one page at a time, and growth never moves
/// existing contents relative to address 0. Callers must not hold
/// slices across a growth; the borrow checker enforces this because
/// growth needs `&mut self`.
#[derive(Debug)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    maximum_pages: u32,
}

impl LinearMemory {
    /// Allocate `initial_pages` zeroed pages.
    ///
    /// # Errors
    ///
    /// - [`ModuleError::MaximumTooLarge`] if `maximum_pages` exceeds [`MAX_PAGES`].
    /// - [`ModuleError::InitialExceedsMaximum`] if `initial_pages > maximum_pages`.
    pub fn new(initial_pages: u32, maximum_pages: u32) -> Result<Self, ModuleError> {
        if maximum_pages > MAX_PAGES {
            return Err(ModuleError::MaximumTooLarge {
                maximum: maximum_pages,
                limit: MAX_PAGES,
            });
        }
        if initial_pages > maximum_pages {
            return Err(ModuleError::InitialExceedsMaximum {
                initial: initial_pages,
                maximum: maximum_pages,
            });
        }
        Ok(Self {
            bytes: vec![0; initial_pages as usize * PAGE_SIZE],
            maximum_pages,
        })
    }

    pub fn pages(&self) -> u32 {
        // Length is always a whole number of pages, at most MAX_PAGES.
        #[allow(clippy::cast_possible_truncation)]
        let pages = (self.bytes.len() / PAGE_SIZE) as u32;
        pages
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Grow by `delta` pages, returning the previous page count.
    ///
    /// # Errors
    ///
    /// [`ModuleError::GrowthRefused`] if the result would exceed the maximum.
    pub fn grow(&mut self, delta: u32) -> Result<u32, ModuleError> {
        let current = self.pages();
        let requested = u64::from(current) + u64::from(delta);
        if requested > u64::from(self.maximum_pages) {
            return Err(ModuleError::GrowthRefused {
                current,
                requested,
                maximum: self.maximum_pages,
            });
        }
        self.bytes.resize(requested as usize * PAGE_SIZE, 0);
        Ok(current)
    }

    /// Grow until at least `end` bytes are addressable.
    ///
    /// # Errors
    ///
    /// [`ModuleError::GrowthRefused`] if that needs more than the maximum.
    pub fn ensure(&mut self, end: usize) -> Result<(), ModuleError> {
        if end <= self.bytes.len() {
            return Ok(());
        }
        let needed = end.div_ceil(PAGE_SIZE) - self.pages() as usize;
        let delta = u32::try_from(needed).unwrap_or(u32::MAX);
        self.grow(delta).map(|_| ())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// `len` bytes at `address`, or `None` if any of them is unmapped.
    pub fn slice(&self, address: Address, len: u32) -> Option<&[u8]> {
        self.bytes.get(span(address, len)?)
    }

    pub fn slice_mut(&mut self, address: Address, len: u32) -> Option<&mut [u8]> {
        self.bytes.get_mut(span(address, len)?)
    }

    /// Borrow a read range and a write range at the same time.
    ///
    /// Returns `None` if either range is unmapped or the two overlap.
    /// Empty ranges never overlap anything.
    pub fn split_disjoint(
        &mut self,
        read: Range<usize>,
        write: Range<usize>,
    ) -> Option<(&[u8], &mut [u8])> {
        let len = self.bytes.len();
        if read.start > read.end || write.start > write.end || read.end > len || write.end > len {
            return None;
        }
        if read.is_empty() {
            return Some((&[], &mut self.bytes[write]));
        }
        if write.is_empty() {
            return Some((&self.bytes[read], &mut []));
        }
        if read.end <= write.start {
            let (low, high) = self.bytes.split_at_mut(write.start);
            let write_len = write.len();
            Some((&low[read], &mut high[..write_len]))
        } else if write.end <= read.start {
            let (low, high) = self.bytes.split_at_mut(read.start);
            let read_len = read.len();
            Some((&high[..read_len], &mut low[write]))
        } else {
            None
        }
    }
}

fn span(address: Address, len: u32) -> Option<Range<usize>> {
    let start = address as usize;
    let end = start.checked_add(len as usize)?;
    Some(start..end)
}
