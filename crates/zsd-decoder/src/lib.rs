#![warn(clippy::pedantic)]
//! Zstd decompression through a foreign module's linear memory.
//!
//! The decoder never hands the codec a Rust reference. Input is copied
//! into the module's heap, the codec's cursors are C structs allocated
//! next to it, and output is read back out of the module:
//!
//! ```text
//!   &[u8] ──copy──► input region ◄── ZSTD_inBuffer { src, size, pos }
//!                        │
//!                  decompress_stream(ctx, out, in)
//!                        ▼
//!   chunk ◄──borrow── output region ◄── ZSTD_outBuffer { dst, size, pos }
//! ```
//!
//! Every foreign allocation belongs to a [`Session`] and is released
//! exactly once, whether the operation completes, stops early or fails.

pub mod config;
pub mod decompressor;
pub mod error;
pub mod record;
pub mod session;
pub mod streaming;

pub use config::DecoderConfig;
pub use decompressor::Decompressor;
pub use error::DecompressError;
pub use record::{BufferRecord, Direction};
pub use session::{Allocation, Region, Session};
pub use streaming::{ChunkStream, StreamState};
