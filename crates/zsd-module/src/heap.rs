use std::collections::BTreeMap;

use crate::codec::{Address, NULL};
use crate::memory::LinearMemory;

/// First address handed out by the heap. Everything below it is
/// reserved, so a null pointer (0) can never alias a live block.
pub const HEAP_BASE: Address = 1024;

/// Every block starts on this boundary, enough for any primitive.
pub const HEAP_ALIGN: u32 = 16;

/// Point-in-time counters for a heap, used to check for leaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Blocks currently allocated and not yet freed.
    pub live_allocations: usize,
    /// Bytes held by live blocks, after rounding to [`HEAP_ALIGN`].
    pub live_bytes: usize,
    /// Bytes parked on the free list, available for reuse.
    pub free_bytes: usize,
    /// Current size of linear memory.
    pub memory_size: usize,
}

/// A first-fit allocator over [`LinearMemory`].
///
/// Bookkeeping lives on the Rust side, not in headers inside linear
/// memory, so a codec writing out of bounds cannot corrupt it.
///
/// ```text
///   0        HEAP_BASE                                top         memory end
///   ├─reserved─┼──live──┼─free─┼──live──┼──live──┼──────┼─────unused─────┤
///                         ▲                         ▲
///                  reused first-fit          bump allocation grows
///                                           memory when needed
/// ```
///
/// Freed blocks are coalesced with their neighbours; a free block that
/// reaches `top` is returned to the bump region.
#[derive(Debug)]
pub struct Heap {
    top: Address,
    live: BTreeMap<Address, u32>,
    free: BTreeMap<Address, u32>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            top: HEAP_BASE,
            live: BTreeMap::new(),
            free: BTreeMap::new(),
        }
    }

    /// Allocate `len` bytes, growing `memory` if the bump region is
    /// exhausted. Returns [`NULL`] when the request cannot be satisfied.
    ///
    /// Zero-length requests get a minimal block with a unique address.
    pub fn alloc(&mut self, len: u32, memory: &mut LinearMemory) -> Address {
        let Some(size) = round_block(len) else {
            return NULL;
        };

        if let Some(address) = self.take_free(size) {
            self.live.insert(address, size);
            return address;
        }

        let Some(end) = self.top.checked_add(size) else {
            return NULL;
        };
        if let Err(error) = memory.ensure(end as usize) {
            tracing::debug!(len, %error, "heap exhausted");
            return NULL;
        }

        let address = self.top;
        self.top = end;
        self.live.insert(address, size);
        address
    }

    /// Release a block. Returns `false` (and leaves the heap untouched)
    /// if `address` is not a live block. Freeing [`NULL`] is a no-op.
    pub fn free(&mut self, address: Address) -> bool {
        if address == NULL {
            return true;
        }
        let Some(size) = self.live.remove(&address) else {
            tracing::warn!(address, "free of an address that is not a live block");
            return false;
        };
        self.insert_free(address, size);
        true
    }

    /// Size of the live block at `address`, after rounding.
    pub fn block_size(&self, address: Address) -> Option<u32> {
        self.live.get(&address).copied()
    }

    pub fn stats(&self, memory: &LinearMemory) -> HeapStats {
        HeapStats {
            live_allocations: self.live.len(),
            live_bytes: self.live.values().map(|&s| s as usize).sum(),
            free_bytes: self.free.values().map(|&s| s as usize).sum(),
            memory_size: memory.len(),
        }
    }

    fn take_free(&mut self, size: u32) -> Option<Address> {
        let (&address, &available) = self.free.iter().find(|&(_, &avail)| avail >= size)?;
        self.free.remove(&address);
        if available > size {
            self.free.insert(address + size, available - size);
        }
        Some(address)
    }

    fn insert_free(&mut self, mut address: Address, mut size: u32) {
        // Merge with the block that ends where this one starts.
        if let Some((&prev, &prev_size)) = self.free.range(..address).next_back() {
            if prev + prev_size == address {
                self.free.remove(&prev);
                address = prev;
                size += prev_size;
            }
        }
        // Merge with the block that starts where this one ends.
        if let Some(next_size) = self.free.remove(&(address + size)) {
            size += next_size;
        }

        if address + size == self.top {
            self.top = address;
        } else {
            self.free.insert(address, size);
        }
    }
}

fn round_block(len: u32) -> Option<u32> {
    let len = len.max(1);
    len.checked_add(HEAP_ALIGN - 1).map(|v| v & !(HEAP_ALIGN - 1))
}
