use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use crate::error::ViewError;
use crate::layout::{Field, FieldShape, StructLayout};
use crate::primitive::{Primitive, PrimitiveKind, Value};

/// Turn an exclusive byte buffer into a shareable aliasing arena.
///
/// Every view in this module borrows a `&[Cell<u8>]`. Because the
/// cells are shared, any number of views may overlap and each one
/// observes writes made through the others, while the borrow checker
/// still guarantees the buffer outlives all of them.
///
/// ```rust
/// use zsd_ctypes::view::share;
///
/// let mut bytes = [0u8; 4];
/// let cells = share(&mut bytes);
/// cells[0].set(7);
/// assert_eq!(bytes[0], 7);
/// ```
pub fn share(buffer: &mut [u8]) -> &[Cell<u8>] {
    Cell::from_mut(buffer).as_slice_of_cells()
}

/// A live view of one struct instance inside a shared buffer.
///
/// The instance is a handle: `(buffer, base offset, layout)`. It owns no
/// data, copies nothing, and is `Copy`. Every field handle it hands out
/// reads and writes `buffer[base + offset ..]` directly.
///
/// ```text
///   buffer ┌──────────────────────────────────────────────┐
///          │ ....... │ a │pad│   b   │  data[0..n]  │ ... │
///          └──────────────────────────────────────────────┘
///                    ▲ base
///                    └─ MemoryInstance { base, layout }
/// ```
///
/// Construction checks `buffer.len() >= base + layout.size()` once;
/// every field lies inside that range, so field access never goes out
/// of bounds afterwards.
#[derive(Clone, Copy)]
pub struct MemoryInstance<'a> {
    buffer: &'a [Cell<u8>],
    base: usize,
    layout: &'a StructLayout,
}

impl<'a> MemoryInstance<'a> {
    /// Materialize `layout` over `buffer` starting at `base`.
    ///
    /// # Errors
    ///
    /// [`ViewError::OutOfBounds`] if the buffer is shorter than
    /// `base + layout.size()`.
    pub fn new(
        layout: &'a StructLayout,
        buffer: &'a [Cell<u8>],
        base: usize,
    ) -> Result<Self, ViewError> {
        let required = base.saturating_add(layout.size());
        if buffer.len() < required {
            return Err(ViewError::OutOfBounds {
                layout: layout.name().to_owned(),
                required,
                available: buffer.len(),
            });
        }
        Ok(Self {
            buffer,
            base,
            layout,
        })
    }

    pub fn layout(&self) -> &'a StructLayout {
        self.layout
    }

    /// Offset of this instance inside its backing buffer.
    pub fn base(&self) -> usize {
        self.base
    }

    /// The `layout.size()` cells this instance spans.
    pub fn cells(&self) -> &'a [Cell<u8>] {
        &self.buffer[self.base..self.base + self.layout.size()]
    }

    /// Copy the instance's bytes out of the buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.cells().iter().map(Cell::get).collect()
    }

    /// Typed scalar handle for a field declared with repeat count 1.
    ///
    /// # Errors
    ///
    /// [`ViewError::NoSuchField`] or [`ViewError::KindMismatch`].
    pub fn scalar<T: Primitive>(&self, name: &str) -> Result<Scalar<'a, T>, ViewError> {
        let field = self.lookup(name)?;
        match field.shape() {
            FieldShape::Scalar { kind } if kind == T::KIND => Ok(Scalar {
                cells: self.span(field),
                _kind: PhantomData,
            }),
            found => Err(mismatch(field, &format!("a {} scalar", T::KIND), found)),
        }
    }

    /// Typed array handle for a primitive field with repeat count 0 or ≥2.
    ///
    /// # Errors
    ///
    /// [`ViewError::NoSuchField`] or [`ViewError::KindMismatch`].
    pub fn array<T: Primitive>(&self, name: &str) -> Result<Array<'a, T>, ViewError> {
        let field = self.lookup(name)?;
        match field.shape() {
            FieldShape::Array { kind, len } if kind == T::KIND => Ok(Array {
                name: field.name(),
                cells: self.span(field),
                len,
                _kind: PhantomData,
            }),
            found => Err(mismatch(field, &format!("a {} array", T::KIND), found)),
        }
    }

    /// The inline nested instance of a struct field with repeat count 0.
    ///
    /// # Errors
    ///
    /// [`ViewError::NoSuchField`] or [`ViewError::KindMismatch`].
    pub fn nested(&self, name: &str) -> Result<MemoryInstance<'a>, ViewError> {
        let field = self.lookup(name)?;
        match field.shape() {
            FieldShape::Struct { layout } => Ok(self.child(layout, field.offset())),
            found => Err(mismatch(field, "a nested struct", found)),
        }
    }

    /// The instance sequence of a struct field with repeat count ≥1.
    ///
    /// # Errors
    ///
    /// [`ViewError::NoSuchField`] or [`ViewError::KindMismatch`].
    pub fn struct_array(&self, name: &str) -> Result<StructArray<'a>, ViewError> {
        let field = self.lookup(name)?;
        match field.shape() {
            FieldShape::StructArray { layout, len } => Ok(StructArray {
                buffer: self.buffer,
                base: self.base + field.offset(),
                layout,
                len,
            }),
            found => Err(mismatch(field, "a nested struct array", found)),
        }
    }

    /// Kind-erased view of any field.
    ///
    /// # Errors
    ///
    /// [`ViewError::NoSuchField`].
    pub fn field(&self, name: &str) -> Result<FieldView<'a>, ViewError> {
        let field = self.lookup(name)?;
        Ok(self.materialize(field))
    }

    /// Every field, in declaration order, materialized as a [`FieldView`].
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, FieldView<'a>)> + use<'a> {
        let this = *self;
        self.layout
            .fields()
            .iter()
            .map(move |field| (field.name(), this.materialize(field)))
    }

    fn materialize(&self, field: &'a Field) -> FieldView<'a> {
        match field.shape() {
            FieldShape::Scalar { kind } => FieldView::Scalar(RawScalar {
                name: field.name(),
                cells: self.span(field),
                kind,
            }),
            FieldShape::Array { kind, len } => FieldView::Array(RawArray {
                cells: self.span(field),
                kind,
                len,
            }),
            FieldShape::Struct { layout } => FieldView::Struct(self.child(layout, field.offset())),
            FieldShape::StructArray { layout, len } => FieldView::StructArray(StructArray {
                buffer: self.buffer,
                base: self.base + field.offset(),
                layout,
                len,
            }),
        }
    }

    fn lookup(&self, name: &str) -> Result<&'a Field, ViewError> {
        self.layout.field(name).ok_or_else(|| ViewError::NoSuchField {
            layout: self.layout.name().to_owned(),
            field: name.to_owned(),
        })
    }

    fn span(&self, field: &Field) -> &'a [Cell<u8>] {
        let start = self.base + field.offset();
        &self.buffer[start..start + field.extent()]
    }

    fn child(&self, layout: &'a StructLayout, offset: usize) -> MemoryInstance<'a> {
        MemoryInstance {
            buffer: self.buffer,
            base: self.base + offset,
            layout,
        }
    }
}

fn mismatch(field: &Field, expected: &str, found: FieldShape<'_>) -> ViewError {
    ViewError::KindMismatch {
        field: field.name().to_owned(),
        expected: expected.to_owned(),
        found: found.to_string(),
    }
}

impl fmt::Debug for MemoryInstance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.layout.name());
        for (name, view) in self.fields() {
            out.field(name, &view);
        }
        out.finish()
    }
}

/// Handle to a scalar primitive field with explicit `get` / `set`.
#[derive(Clone, Copy)]
pub struct Scalar<'a, T> {
    cells: &'a [Cell<u8>],
    _kind: PhantomData<T>,
}

impl<T: Primitive> Scalar<'_, T> {
    pub fn get(&self) -> T {
        T::load(self.cells)
    }

    pub fn set(&self, value: T) {
        value.store(self.cells);
    }
}

impl<T: Primitive> fmt::Debug for Scalar<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

/// Handle to a fixed-length primitive array field.
#[derive(Clone, Copy)]
pub struct Array<'a, T> {
    name: &'a str,
    cells: &'a [Cell<u8>],
    len: usize,
    _kind: PhantomData<T>,
}

impl<'a, T: Primitive> Array<'a, T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.element(index).map(T::load)
    }

    /// Write one element.
    ///
    /// # Errors
    ///
    /// [`ViewError::IndexOutOfRange`] if `index >= len()`.
    pub fn set(&self, index: usize, value: T) -> Result<(), ViewError> {
        let cells = self.element(index).ok_or_else(|| ViewError::IndexOutOfRange {
            field: self.name.to_owned(),
            index,
            len: self.len,
        })?;
        value.store(cells);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + use<'a, T> {
        self.cells.chunks_exact(T::KIND.size()).map(T::load)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Overwrite every element from `values`.
    ///
    /// # Errors
    ///
    /// [`ViewError::LengthMismatch`] if `values.len() != len()`.
    pub fn copy_from_slice(&self, values: &[T]) -> Result<(), ViewError> {
        if values.len() != self.len {
            return Err(ViewError::LengthMismatch {
                field: self.name.to_owned(),
                expected: self.len,
                found: values.len(),
            });
        }
        for (cells, value) in self.cells.chunks_exact(T::KIND.size()).zip(values) {
            value.store(cells);
        }
        Ok(())
    }

    fn element(&self, index: usize) -> Option<&'a [Cell<u8>]> {
        let size = T::KIND.size();
        (index < self.len).then(|| &self.cells[index * size..(index + 1) * size])
    }
}

impl<T: Primitive> fmt::Debug for Array<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Handle to an array of nested struct instances.
///
/// Instance `i` starts at `field offset + i × layout.size()`.
#[derive(Clone, Copy)]
pub struct StructArray<'a> {
    buffer: &'a [Cell<u8>],
    base: usize,
    layout: &'a StructLayout,
    len: usize,
}

impl<'a> StructArray<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Layout of each element.
    pub fn layout(&self) -> &'a StructLayout {
        self.layout
    }

    pub fn get(&self, index: usize) -> Option<MemoryInstance<'a>> {
        (index < self.len).then(|| MemoryInstance {
            buffer: self.buffer,
            base: self.base + index * self.layout.size(),
            layout: self.layout,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = MemoryInstance<'a>> + use<'a> {
        let this = *self;
        (0..self.len).filter_map(move |i| this.get(i))
    }
}

impl fmt::Debug for StructArray<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Kind-erased scalar handle.
#[derive(Clone, Copy)]
pub struct RawScalar<'a> {
    name: &'a str,
    cells: &'a [Cell<u8>],
    kind: PrimitiveKind,
}

impl RawScalar<'_> {
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn value(&self) -> Value {
        Value::load(self.kind, self.cells)
    }

    /// Write `value`, which must be of this field's kind.
    ///
    /// # Errors
    ///
    /// [`ViewError::KindMismatch`] if `value.kind()` differs.
    pub fn set_value(&self, value: Value) -> Result<(), ViewError> {
        if value.kind() != self.kind {
            return Err(ViewError::KindMismatch {
                field: self.name.to_owned(),
                expected: format!("a {} value", self.kind),
                found: format!("a {} value", value.kind()),
            });
        }
        value.store(self.cells);
        Ok(())
    }
}

/// Kind-erased array handle.
#[derive(Clone, Copy)]
pub struct RawArray<'a> {
    cells: &'a [Cell<u8>],
    kind: PrimitiveKind,
    len: usize,
}

impl<'a> RawArray<'a> {
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        let size = self.kind.size();
        (index < self.len)
            .then(|| Value::load(self.kind, &self.cells[index * size..(index + 1) * size]))
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + use<'a> {
        let kind = self.kind;
        self.cells
            .chunks_exact(kind.size())
            .map(move |cells| Value::load(kind, cells))
    }
}

/// One materialized field, as produced by [`MemoryInstance::field`] and
/// [`MemoryInstance::fields`].
#[derive(Clone, Copy)]
pub enum FieldView<'a> {
    Scalar(RawScalar<'a>),
    Array(RawArray<'a>),
    Struct(MemoryInstance<'a>),
    StructArray(StructArray<'a>),
}

impl fmt::Debug for FieldView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => fmt::Debug::fmt(&scalar.value(), f),
            Self::Array(array) => f.debug_list().entries(array.values()).finish(),
            Self::Struct(instance) => fmt::Debug::fmt(instance, f),
            Self::StructArray(array) => fmt::Debug::fmt(array, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::layout::StructLayout;
    use crate::primitive::PrimitiveKind::*;

    fn point() -> Arc<StructLayout> {
        StructLayout::builder("point")
            .field("x", I16)
            .field("y", I16)
            .build_shared()
            .unwrap()
    }

    fn shape() -> StructLayout {
        StructLayout::builder("shape")
            .field("id", U32)
            .array("weights", F32, 3)
            .nested("origin", &point())
            .nested_array("corners", &point(), 2)
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_short_buffer() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size() - 1];
        let result = MemoryInstance::new(&layout, share(&mut bytes), 0);
        assert!(matches!(
            result,
            Err(ViewError::OutOfBounds { required, available, .. })
                if required == layout.size() && available == layout.size() - 1
        ));
    }

    #[test]
    fn rejects_base_past_end() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size() + 3];
        assert!(MemoryInstance::new(&layout, share(&mut bytes), 4).is_err());
        assert!(MemoryInstance::new(&layout, share(&mut bytes), 3).is_ok());
    }

    #[test]
    fn scalar_writes_land_in_buffer() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size() + 8];
        {
            let instance = MemoryInstance::new(&layout, share(&mut bytes), 8).unwrap();
            instance.scalar::<u32>("id").unwrap().set(0xDEAD_BEEF);
            assert_eq!(instance.scalar::<u32>("id").unwrap().get(), 0xDEAD_BEEF);
        }
        assert_eq!(&bytes[8..12], &0xDEAD_BEEFu32.to_le_bytes());
    }

    #[test]
    fn overlapping_views_observe_each_other() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size()];
        let cells = share(&mut bytes);
        let a = MemoryInstance::new(&layout, cells, 0).unwrap();
        let b = MemoryInstance::new(&layout, cells, 0).unwrap();

        a.array::<f32>("weights").unwrap().set(2, 1.25).unwrap();
        assert_eq!(b.array::<f32>("weights").unwrap().get(2), Some(1.25));
    }

    #[test]
    fn nested_instance_aliases_parent() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size()];
        let cells = share(&mut bytes);
        let instance = MemoryInstance::new(&layout, cells, 0).unwrap();

        let origin = instance.nested("origin").unwrap();
        origin.scalar::<i16>("y").unwrap().set(-7);

        let offset = layout.offset_of("origin").unwrap() + 2;
        assert_eq!(i16::load(&cells[offset..offset + 2]), -7);
    }

    #[test]
    fn struct_array_elements_are_spaced_by_size() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size()];
        let instance = MemoryInstance::new(&layout, share(&mut bytes), 0).unwrap();
        let corners = instance.struct_array("corners").unwrap();

        let field_offset = layout.offset_of("corners").unwrap();
        assert_eq!(corners.len(), 2);
        for (i, corner) in corners.iter().enumerate() {
            assert_eq!(corner.base(), field_offset + i * point().size());
        }
        assert!(corners.get(2).is_none());
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size()];
        let instance = MemoryInstance::new(&layout, share(&mut bytes), 0).unwrap();

        assert!(matches!(
            instance.scalar::<u16>("id"),
            Err(ViewError::KindMismatch { .. })
        ));
        assert!(matches!(
            instance.scalar::<f32>("weights"),
            Err(ViewError::KindMismatch { .. })
        ));
        assert!(matches!(
            instance.nested("corners"),
            Err(ViewError::KindMismatch { .. })
        ));
        assert!(matches!(
            instance.scalar::<u32>("missing"),
            Err(ViewError::NoSuchField { .. })
        ));
    }

    #[test]
    fn array_bounds_and_bulk_copy() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size()];
        let instance = MemoryInstance::new(&layout, share(&mut bytes), 0).unwrap();
        let weights = instance.array::<f32>("weights").unwrap();

        assert!(matches!(
            weights.set(3, 0.0),
            Err(ViewError::IndexOutOfRange { index: 3, len: 3, .. })
        ));
        assert!(weights.copy_from_slice(&[1.0, 2.0]).is_err());
        weights.copy_from_slice(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(weights.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn raw_scalar_checks_value_kind() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size()];
        let instance = MemoryInstance::new(&layout, share(&mut bytes), 0).unwrap();

        let FieldView::Scalar(id) = instance.field("id").unwrap() else {
            panic!("id should be a scalar");
        };
        let Err(ViewError::KindMismatch { expected, found, .. }) = id.set_value(Value::I8(1)) else {
            panic!("an int8_t value should not fit a uint32_t field");
        };
        assert_eq!(expected, "a uint32_t value");
        assert_eq!(found, "a int8_t value");
        id.set_value(Value::U32(42)).unwrap();
        assert_eq!(id.value(), Value::U32(42));
    }

    #[test]
    fn fields_walk_declaration_order() {
        let layout = shape();
        let mut bytes = vec![0u8; layout.size()];
        let instance = MemoryInstance::new(&layout, share(&mut bytes), 0).unwrap();

        let names: Vec<_> = instance.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["id", "weights", "origin", "corners"]);
    }

    #[test]
    fn debug_prints_live_values() {
        let layout = point();
        let mut bytes = vec![0u8; layout.size()];
        let instance = MemoryInstance::new(&layout, share(&mut bytes), 0).unwrap();
        instance.scalar::<i16>("x").unwrap().set(3);
        assert_eq!(format!("{instance:?}"), "point { x: I16(3), y: I16(0) }");
    }
}
