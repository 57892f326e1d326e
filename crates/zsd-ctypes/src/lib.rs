#![warn(clippy::pedantic)]
//! C-compatible struct layouts and zero-copy views over shared buffers.
//!
//! ```rust
//! use zsd_ctypes::{MemoryInstance, PrimitiveKind, StructLayout, view::share};
//!
//! let layout = StructLayout::builder("pair")
//!     .field("a", PrimitiveKind::U8)
//!     .field("b", PrimitiveKind::U32)
//!     .build()
//!     .unwrap();
//!
//! let mut bytes = vec![0u8; layout.size()];
//! let instance = MemoryInstance::new(&layout, share(&mut bytes), 0).unwrap();
//! instance.scalar::<u32>("b").unwrap().set(9);
//! assert_eq!(bytes[4], 9);
//! ```

pub mod error;
pub mod layout;
pub mod primitive;
pub mod view;

pub use error::{LayoutError, ViewError};
pub use layout::{ElementType, Field, FieldShape, FieldSpec, LayoutBuilder, StructLayout};
pub use primitive::{Primitive, PrimitiveKind, Value};
pub use view::{Array, FieldView, MemoryInstance, RawArray, RawScalar, Scalar, StructArray};
