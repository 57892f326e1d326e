#![warn(clippy::pedantic)]
//! Foreign decompression modules: linear memory, a heap over it, and the
//! zstd ABI the decoder drives through 32-bit addresses.

pub mod codec;
pub mod config;
pub mod error;
pub mod heap;
pub mod memory;
pub mod native;

pub use codec::{
    Address, CONTENTSIZE_ERROR, CONTENTSIZE_UNKNOWN, ErrorNumber, ForeignCodec, ForeignHeap,
    ForeignModule, NULL,
};
pub use config::ModuleConfig;
pub use error::ModuleError;
pub use heap::HeapStats;
pub use memory::{LinearMemory, PAGE_SIZE};
pub use native::NativeModule;
