//! The ABI a foreign decompression module exposes.
//!
//! A foreign module speaks only in 32-bit addresses into its own linear
//! memory and in `size_t`-style status words. Everything here mirrors
//! the zstd C API as compiled for a 32-bit target:
//!
//! ```text
//! ┌─────────────────────────────────────┬───────────────────────────────┐
//! │ Rust                                │ C                             │
//! ├─────────────────────────────────────┼───────────────────────────────┤
//! │ frame_content_size(src, len)        │ ZSTD_getFrameContentSize      │
//! │ decompress(dst, cap, src, len)      │ ZSTD_decompress               │
//! │ is_error(code)                      │ ZSTD_isError                  │
//! │ error_name(code)                    │ ZSTD_getErrorName             │
//! │ dstream_in_size()                   │ ZSTD_DStreamInSize            │
//! │ dstream_out_size()                  │ ZSTD_DStreamOutSize           │
//! │ create_dctx() / free_dctx(ctx)      │ ZSTD_createDCtx / ZSTD_freeDCtx│
//! │ decompress_stream(ctx, out, in)     │ ZSTD_decompressStream         │
//! │ malloc(len) / free(addr)            │ malloc / free                 │
//! └─────────────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! Status words: a value `v` is an error when `v > -MAX_ERROR_CODE`
//! (as `u32`); the error number is `-v`.

use crate::heap::HeapStats;

/// An offset into a module's linear memory.
pub type Address = u32;

/// The null address. Never returned by a successful allocation.
pub const NULL: Address = 0;

/// `frame_content_size` result: the frame header omits the size.
pub const CONTENTSIZE_UNKNOWN: u64 = u64::MAX;

/// `frame_content_size` result: the input is not a valid frame header.
pub const CONTENTSIZE_ERROR: u64 = u64::MAX - 1;

/// Largest error number a status word can carry.
pub const MAX_ERROR_CODE: u32 = 120;

/// Size of an `{ address, size, pos }` cursor record on a 32-bit target.
pub const CURSOR_RECORD_SIZE: u32 = 12;

/// zstd error numbers the host side can raise on its own, in addition to
/// whatever the codec reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorNumber {
    Generic = 1,
    MemoryAllocation = 64,
    SrcSizeWrong = 72,
    DstBufferWrong = 104,
    SrcBufferWrong = 105,
}

impl ErrorNumber {
    /// Encode as a status word.
    pub const fn code(self) -> u32 {
        0u32.wrapping_sub(self as u32)
    }
}

/// Whether a status word denotes an error.
pub const fn is_error_code(code: u32) -> bool {
    code > 0u32.wrapping_sub(MAX_ERROR_CODE)
}

/// The error number carried by an error status word.
pub const fn error_number(code: u32) -> u32 {
    0u32.wrapping_sub(code)
}

/// The allocator half of a foreign module.
pub trait ForeignHeap {
    /// Allocate `len` bytes. Returns [`NULL`] on failure.
    fn malloc(&mut self, len: u32) -> Address;

    /// Release a block returned by [`malloc`](Self::malloc).
    fn free(&mut self, address: Address);

    /// The whole linear memory.
    fn memory(&self) -> &[u8];

    fn memory_mut(&mut self) -> &mut [u8];

    /// Allocation counters, for leak checks.
    fn stats(&self) -> HeapStats;
}

/// The decompression half of a foreign module.
pub trait ForeignCodec {
    /// Decompressed size recorded in the frame header at `src`, or one of
    /// [`CONTENTSIZE_UNKNOWN`] / [`CONTENTSIZE_ERROR`].
    fn frame_content_size(&mut self, src: Address, len: u32) -> u64;

    /// Decompress a whole frame. Returns bytes written or an error status.
    fn decompress(&mut self, dst: Address, capacity: u32, src: Address, len: u32) -> u32;

    fn is_error(&self, code: u32) -> bool {
        is_error_code(code)
    }

    /// Human-readable description of a status word.
    fn error_name(&self, code: u32) -> &'static str;

    /// Recommended input chunk size for streaming.
    fn dstream_in_size(&self) -> u32;

    /// Recommended output chunk size for streaming; one full block.
    fn dstream_out_size(&self) -> u32;

    /// Create a streaming context. Returns [`NULL`] on failure.
    fn create_dctx(&mut self) -> Address;

    /// Destroy a streaming context. Returns 0 or an error status.
    fn free_dctx(&mut self, dctx: Address) -> u32;

    /// Run one streaming step. `output` and `input` are addresses of
    /// cursor records (see [`CURSOR_RECORD_SIZE`]); both `pos` fields
    /// are advanced in place. Returns 0 when a frame is complete and
    /// flushed, a size hint for the next input when more is expected,
    /// or an error status.
    fn decompress_stream(&mut self, dctx: Address, output: Address, input: Address) -> u32;
}

/// A complete foreign module: heap plus codec over one linear memory.
pub trait ForeignModule: ForeignHeap + ForeignCodec {}

impl<T: ForeignHeap + ForeignCodec + ?Sized> ForeignModule for T {}
