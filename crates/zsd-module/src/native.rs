use std::collections::HashMap;

use zstd::zstd_safe::{self, DCtx, InBuffer, OutBuffer};

use crate::codec::{
    Address, CONTENTSIZE_ERROR, CONTENTSIZE_UNKNOWN, CURSOR_RECORD_SIZE, ErrorNumber,
    ForeignCodec, ForeignHeap, NULL, error_number,
};
use crate::config::ModuleConfig;
use crate::error::ModuleError;
use crate::heap::{Heap, HeapStats};
use crate::memory::LinearMemory;

/// Heap bytes reserved per streaming context. The context state itself
/// lives on the Rust side; the reservation gives each handle a unique
/// address and makes leaked contexts visible in [`HeapStats`].
const DCTX_FOOTPRINT: u32 = 64;

/// An in-process foreign module: linear memory, a heap over it, and a
/// zstd codec that reads and writes only through addresses.
///
/// The codec never sees Rust references from the caller. Every input it
/// consumes and every byte it produces goes through the module's own
/// linear memory, and the streaming cursors are C structs living there
/// too, so callers drive it exactly as they would drive a compiled
/// module.
pub struct NativeModule {
    memory: LinearMemory,
    heap: Heap,
    contexts: HashMap<Address, DCtx<'static>>,
}

impl NativeModule {
    /// Instantiate a module with fresh linear memory.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError`] if the page limits in `config` are invalid.
    pub fn instantiate(config: &ModuleConfig) -> Result<Self, ModuleError> {
        let memory = LinearMemory::new(config.initial_pages, config.maximum_pages)?;
        tracing::debug!(
            initial_pages = config.initial_pages,
            maximum_pages = config.maximum_pages,
            "instantiated native zstd module"
        );
        Ok(Self {
            memory,
            heap: Heap::new(),
            contexts: HashMap::new(),
        })
    }

    /// Streaming contexts currently alive.
    pub fn live_contexts(&self) -> usize {
        self.contexts.len()
    }

    pub fn linear_memory(&self) -> &LinearMemory {
        &self.memory
    }
}

impl std::fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeModule")
            .field("pages", &self.memory.pages())
            .field("heap", &self.heap.stats(&self.memory))
            .field("contexts", &self.contexts.len())
            .finish()
    }
}

impl ForeignHeap for NativeModule {
    fn malloc(&mut self, len: u32) -> Address {
        self.heap.alloc(len, &mut self.memory)
    }

    fn free(&mut self, address: Address) {
        self.heap.free(address);
    }

    fn memory(&self) -> &[u8] {
        self.memory.bytes()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.bytes_mut()
    }

    fn stats(&self) -> HeapStats {
        self.heap.stats(&self.memory)
    }
}

impl ForeignCodec for NativeModule {
    fn frame_content_size(&mut self, src: Address, len: u32) -> u64 {
        let Some(input) = self.memory.slice(src, len) else {
            return CONTENTSIZE_ERROR;
        };
        match zstd_safe::get_frame_content_size(input) {
            Ok(Some(size)) => size,
            Ok(None) => CONTENTSIZE_UNKNOWN,
            Err(_) => CONTENTSIZE_ERROR,
        }
    }

    fn decompress(&mut self, dst: Address, capacity: u32, src: Address, len: u32) -> u32 {
        let Some((input, output)) = self
            .memory
            .split_disjoint(range(src, len), range(dst, capacity))
        else {
            return ErrorNumber::DstBufferWrong.code();
        };
        match zstd_safe::decompress(output, input) {
            Ok(written) => u32::try_from(written).unwrap_or(ErrorNumber::Generic.code()),
            Err(code) => narrow(code),
        }
    }

    fn error_name(&self, code: u32) -> &'static str {
        zstd_safe::get_error_name(widen(code))
    }

    fn dstream_in_size(&self) -> u32 {
        u32::try_from(DCtx::in_size()).unwrap_or(u32::MAX)
    }

    fn dstream_out_size(&self) -> u32 {
        u32::try_from(DCtx::out_size()).unwrap_or(u32::MAX)
    }

    fn create_dctx(&mut self) -> Address {
        let Some(dctx) = DCtx::try_create() else {
            return NULL;
        };
        let handle = self.heap.alloc(DCTX_FOOTPRINT, &mut self.memory);
        if handle != NULL {
            self.contexts.insert(handle, dctx);
        }
        handle
    }

    fn free_dctx(&mut self, dctx: Address) -> u32 {
        if dctx == NULL {
            return 0;
        }
        if self.contexts.remove(&dctx).is_none() {
            return ErrorNumber::Generic.code();
        }
        self.heap.free(dctx);
        0
    }

    fn decompress_stream(&mut self, dctx: Address, output: Address, input: Address) -> u32 {
        let Some(out) = Cursor::read(&self.memory, output) else {
            return ErrorNumber::DstBufferWrong.code();
        };
        let Some(inp) = Cursor::read(&self.memory, input) else {
            return ErrorNumber::SrcBufferWrong.code();
        };
        if out.pos > out.size {
            return ErrorNumber::DstBufferWrong.code();
        }
        if inp.pos > inp.size {
            return ErrorNumber::SrcSizeWrong.code();
        }
        let Some(context) = self.contexts.get_mut(&dctx) else {
            return ErrorNumber::Generic.code();
        };
        let Some((src, dst)) = self
            .memory
            .split_disjoint(range(inp.address, inp.size), range(out.address, out.size))
        else {
            return ErrorNumber::DstBufferWrong.code();
        };

        let mut in_buffer = InBuffer::around(src);
        in_buffer.set_pos(inp.pos as usize);
        let mut out_buffer = OutBuffer::around_pos(dst, out.pos as usize);
        let result = context.decompress_stream(&mut out_buffer, &mut in_buffer);
        let in_pos = in_buffer.pos();
        let out_pos = out_buffer.pos();

        // Both positions are bounded by their u32 sizes.
        #[allow(clippy::cast_possible_truncation)]
        let (in_pos, out_pos) = (in_pos as u32, out_pos as u32);
        Cursor::write_pos(&mut self.memory, input, in_pos);
        Cursor::write_pos(&mut self.memory, output, out_pos);

        match result {
            Ok(hint) => u32::try_from(hint).unwrap_or(HINT_CEILING),
            Err(code) => narrow(code),
        }
    }
}

/// Largest size hint reported; anything above would read as an error.
const HINT_CEILING: u32 = 0u32.wrapping_sub(crate::codec::MAX_ERROR_CODE);

/// An `{ address, size, pos }` record as laid out by a 32-bit C compiler.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    address: u32,
    size: u32,
    pos: u32,
}

impl Cursor {
    fn read(memory: &LinearMemory, at: Address) -> Option<Self> {
        let bytes = memory.slice(at, CURSOR_RECORD_SIZE)?;
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Some(Self {
            address: word(0),
            size: word(4),
            pos: word(8),
        })
    }

    fn write_pos(memory: &mut LinearMemory, at: Address, pos: u32) {
        if let Some(bytes) = memory.slice_mut(at.wrapping_add(8), 4) {
            bytes.copy_from_slice(&pos.to_le_bytes());
        }
    }
}

fn range(address: Address, len: u32) -> std::ops::Range<usize> {
    let start = address as usize;
    start..start + len as usize
}

/// Convert a native `size_t` zstd error into a 32-bit status word.
fn narrow(code: zstd_safe::ErrorCode) -> u32 {
    // Error numbers are below MAX_ERROR_CODE, so the cast is lossless.
    #[allow(clippy::cast_possible_truncation)]
    let number = 0usize.wrapping_sub(code) as u32;
    0u32.wrapping_sub(number)
}

/// Convert a 32-bit status word back into a native `size_t` code.
fn widen(code: u32) -> zstd_safe::ErrorCode {
    0usize.wrapping_sub(error_number(code) as usize)
}
