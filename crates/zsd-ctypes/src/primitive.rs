use std::cell::Cell;
use std::fmt;

/// Primitive numeric kinds a struct field can hold.
///
/// Sizes and alignments follow the wasm32 C ABI, where every primitive
/// is naturally aligned and all values are little-endian:
///
/// ```text
/// ┌──────┬────────────┬──────┬───────┐
/// │ Kind │ C type     │ Size │ Align │
/// ├──────┼────────────┼──────┼───────┤
/// │ I8   │ int8_t     │ 1    │ 1     │
/// │ U8   │ uint8_t    │ 1    │ 1     │
/// │ I16  │ int16_t    │ 2    │ 2     │
/// │ U16  │ uint16_t   │ 2    │ 2     │
/// │ I32  │ int32_t    │ 4    │ 4     │
/// │ U32  │ uint32_t   │ 4    │ 4     │
/// │ I64  │ int64_t    │ 8    │ 8     │
/// │ U64  │ uint64_t   │ 8    │ 8     │
/// │ F32  │ float      │ 4    │ 4     │
/// │ F64  │ double     │ 8    │ 8     │
/// └──────┴────────────┴──────┴───────┘
/// ```
///
/// Pointers and `size_t` are 32 bits wide on wasm32 and are declared
/// as `U32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Width of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Required alignment in bytes. Equal to the size for every kind.
    pub const fn align(self) -> usize {
        self.size()
    }

    /// The C spelling of this kind, used when rendering layouts.
    pub const fn c_name(self) -> &'static str {
        match self {
            Self::I8 => "int8_t",
            Self::U8 => "uint8_t",
            Self::I16 => "int16_t",
            Self::U16 => "uint16_t",
            Self::I32 => "int32_t",
            Self::U32 => "uint32_t",
            Self::I64 => "int64_t",
            Self::U64 => "uint64_t",
            Self::F32 => "float",
            Self::F64 => "double",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A Rust type that can be read from and written to a primitive field.
///
/// Implemented for the ten numeric types matching [`PrimitiveKind`].
/// Reads and writes go through `Cell<u8>` slices so that several views
/// of one buffer can coexist; `cells` must be exactly `KIND.size()`
/// bytes long.
pub trait Primitive: Copy + fmt::Debug + PartialEq + sealed::Sealed {
    /// The field kind this type maps onto.
    const KIND: PrimitiveKind;

    /// Decode a little-endian value from `cells`.
    fn load(cells: &[Cell<u8>]) -> Self;

    /// Encode `self` little-endian into `cells`.
    fn store(self, cells: &[Cell<u8>]);

    /// Wrap `self` in the kind-erased [`Value`].
    fn into_value(self) -> Value;
}

/// A kind-erased primitive value, as read through a
/// [`RawScalar`](crate::view::RawScalar) or [`RawArray`](crate::view::RawArray).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

macro_rules! impl_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;

                fn load(cells: &[Cell<u8>]) -> Self {
                    let mut bytes = [0u8; size_of::<$ty>()];
                    for (byte, cell) in bytes.iter_mut().zip(cells) {
                        *byte = cell.get();
                    }
                    <$ty>::from_le_bytes(bytes)
                }

                fn store(self, cells: &[Cell<u8>]) {
                    for (cell, byte) in cells.iter().zip(self.to_le_bytes()) {
                        cell.set(byte);
                    }
                }

                fn into_value(self) -> Value {
                    Value::$kind(self)
                }
            }
        )*

        impl Value {
            /// The kind of this value.
            pub fn kind(self) -> PrimitiveKind {
                match self {
                    $(Self::$kind(_) => PrimitiveKind::$kind,)*
                }
            }

            /// Decode a value of `kind` from `cells`.
            pub fn load(kind: PrimitiveKind, cells: &[Cell<u8>]) -> Self {
                match kind {
                    $(PrimitiveKind::$kind => Self::$kind(<$ty>::load(cells)),)*
                }
            }

            /// Encode this value into `cells`.
            pub fn store(self, cells: &[Cell<u8>]) {
                match self {
                    $(Self::$kind(v) => v.store(cells),)*
                }
            }
        }

        impl fmt::Display for Value {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$kind(v) => write!(f, "{v}"),)*
                }
            }
        }
    };
}

impl_primitive! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(bytes: &mut [u8]) -> &[Cell<u8>] {
        Cell::from_mut(bytes).as_slice_of_cells()
    }

    #[test]
    fn sizes_match_rust_types() {
        assert_eq!(PrimitiveKind::I8.size(), size_of::<i8>());
        assert_eq!(PrimitiveKind::U16.size(), size_of::<u16>());
        assert_eq!(PrimitiveKind::U32.size(), size_of::<u32>());
        assert_eq!(PrimitiveKind::I64.size(), size_of::<i64>());
        assert_eq!(PrimitiveKind::F32.size(), size_of::<f32>());
        assert_eq!(PrimitiveKind::F64.size(), size_of::<f64>());
    }

    #[test]
    fn values_are_little_endian() {
        let mut bytes = [0u8; 4];
        0x1234_5678u32.store(cells(&mut bytes));
        assert_eq!(bytes, [0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn load_reads_what_store_wrote() {
        let mut bytes = [0u8; 8];
        let view = cells(&mut bytes);
        (-1.5f64).store(view);
        assert_eq!(f64::load(view), -1.5);
        assert_eq!(Value::load(PrimitiveKind::F64, view), Value::F64(-1.5));
    }

    #[test]
    fn value_reports_its_kind() {
        assert_eq!(Value::I16(-3).kind(), PrimitiveKind::I16);
        assert_eq!(7u8.into_value(), Value::U8(7));
        assert_eq!(Value::F32(0.5).to_string(), "0.5");
    }

    #[test]
    fn c_names_render() {
        assert_eq!(PrimitiveKind::U32.to_string(), "uint32_t");
        assert_eq!(PrimitiveKind::F32.c_name(), "float");
    }
}
