use zsd_ctypes::{LayoutError, ViewError};
use zsd_module::ModuleError;

/// Errors that can occur while decompressing through a foreign module.
///
/// Codec failures keep the three categories a caller can tell apart by
/// message prefix; each carries the codec's own error name.
///
/// ```text
///   DecompressError
///   ├── FrameSize          ← frame header unreadable, or size not recorded
///   ├── Decompress         ← one-shot decompress returned an error status
///   ├── Stream             ← a streaming step failed, or the frame was cut short
///   ├── OutOfMemory        ← foreign malloc returned a null address
///   ├── CorruptRecord      ← a control record broke its cursor invariant
///   ├── RegionUnmapped     ← a region lies outside linear memory
///   ├── InputTooLarge      ← source does not fit a 32-bit address space
///   ├── View(ViewError)    ← from zsd-ctypes materialization
///   ├── Layout(LayoutError)
///   └── Module(ModuleError) ← from module instantiation
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    /// `frame_content_size` returned the unknown or error sentinel.
    #[error("frame size query failed: {reason}")]
    FrameSize { reason: &'static str },

    #[error("decompression failed: {0}")]
    Decompress(&'static str),

    #[error("stream decompression failed: {0}")]
    Stream(&'static str),

    /// The foreign allocator could not satisfy a request.
    #[error("foreign allocation of {requested} bytes failed")]
    OutOfMemory { requested: u32 },

    /// The codec left a cursor with `pos > size`, or `size` beyond the
    /// region it describes.
    #[error("{direction} record corrupt: pos {position}, size {size}, capacity {capacity}")]
    CorruptRecord {
        direction: &'static str,
        position: u32,
        size: u32,
        capacity: u32,
    },

    #[error("region of {len} bytes at {address:#x} is outside linear memory")]
    RegionUnmapped { address: u32, len: u32 },

    #[error("input of {len} bytes exceeds the 32-bit address space")]
    InputTooLarge { len: usize },

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Module(#[from] ModuleError),
}
