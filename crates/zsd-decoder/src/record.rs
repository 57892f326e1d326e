//! The two control records the streaming codec reads and advances.
//!
//! On a 32-bit target `ZSTD_inBuffer` and `ZSTD_outBuffer` are both
//! three `u32` words:
//!
//! ```text
//!   offset 0   src / dst   address of the data region
//!   offset 4   size        bytes available (input) or capacity (output)
//!   offset 8   pos         cursor, advanced by the codec
//! ```

use std::sync::{Arc, LazyLock};

use zsd_ctypes::{LayoutError, MemoryInstance, PrimitiveKind, StructLayout, ViewError};

use crate::error::DecompressError;

static IN_BUFFER: LazyLock<Result<Arc<StructLayout>, LayoutError>> =
    LazyLock::new(|| cursor_layout("ZSTD_inBuffer", "src"));

static OUT_BUFFER: LazyLock<Result<Arc<StructLayout>, LayoutError>> =
    LazyLock::new(|| cursor_layout("ZSTD_outBuffer", "dst"));

fn cursor_layout(name: &str, address: &str) -> Result<Arc<StructLayout>, LayoutError> {
    StructLayout::builder(name)
        .field(address, PrimitiveKind::U32)
        .field("size", PrimitiveKind::U32)
        .field("pos", PrimitiveKind::U32)
        .build_shared()
}

/// Which side of a streaming step a record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// The shared layout for this direction's record.
    ///
    /// # Errors
    ///
    /// Never in practice; the layouts are three distinct `u32` fields.
    pub fn layout(self) -> Result<&'static Arc<StructLayout>, LayoutError> {
        let layout = match self {
            Direction::Input => &*IN_BUFFER,
            Direction::Output => &*OUT_BUFFER,
        };
        layout.as_ref().map_err(Clone::clone)
    }

    fn address_field(self) -> &'static str {
        match self {
            Direction::Input => "src",
            Direction::Output => "dst",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// Rust-side copy of a control record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferRecord {
    pub address: u32,
    pub size: u32,
    pub position: u32,
}

impl BufferRecord {
    /// A fresh record over `size` bytes at `address`, cursor at 0.
    pub fn new(address: u32, size: u32) -> Self {
        Self {
            address,
            size,
            position: 0,
        }
    }

    /// Read a record through a view of its layout.
    ///
    /// # Errors
    ///
    /// [`ViewError`] if `instance` is not a record of `direction`.
    pub fn load(instance: &MemoryInstance<'_>, direction: Direction) -> Result<Self, ViewError> {
        Ok(Self {
            address: instance.scalar::<u32>(direction.address_field())?.get(),
            size: instance.scalar::<u32>("size")?.get(),
            position: instance.scalar::<u32>("pos")?.get(),
        })
    }

    /// Write every field of the record through `instance`.
    ///
    /// # Errors
    ///
    /// [`ViewError`] if `instance` is not a record of `direction`.
    pub fn store(&self, instance: &MemoryInstance<'_>, direction: Direction) -> Result<(), ViewError> {
        instance.scalar::<u32>(direction.address_field())?.set(self.address);
        instance.scalar::<u32>("size")?.set(self.size);
        instance.scalar::<u32>("pos")?.set(self.position);
        Ok(())
    }

    /// Enforce `position <= size <= capacity`.
    ///
    /// # Errors
    ///
    /// [`DecompressError::CorruptRecord`] naming the direction.
    pub fn check(&self, direction: Direction, capacity: u32) -> Result<(), DecompressError> {
        if self.position <= self.size && self.size <= capacity {
            return Ok(());
        }
        Err(DecompressError::CorruptRecord {
            direction: direction.label(),
            position: self.position,
            size: self.size,
            capacity,
        })
    }

    /// Bytes between the cursor and `size`.
    pub fn remaining(&self) -> u32 {
        self.size.saturating_sub(self.position)
    }
}
