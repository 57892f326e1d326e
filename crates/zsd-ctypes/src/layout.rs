use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::LayoutError;
use crate::primitive::PrimitiveKind;

/// Round `n` up to the next multiple of `alignment`.
///
/// Returns `None` if the result does not fit in a `usize`.
/// `alignment` must be a non-zero power of two.
///
/// ```rust
/// use zsd_ctypes::layout::align_up;
///
/// assert_eq!(align_up(0, 4), Some(0));
/// assert_eq!(align_up(1, 4), Some(4));
/// assert_eq!(align_up(8, 8), Some(8));
/// assert_eq!(align_up(9, 8), Some(16));
/// ```
#[inline]
pub fn align_up(n: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    n.checked_add(alignment - 1).map(|v| v & !(alignment - 1))
}

/// The element type of a field: a primitive, or a previously computed
/// struct layout (which may itself contain nested structs).
#[derive(Clone, Debug, PartialEq)]
pub enum ElementType {
    Primitive(PrimitiveKind),
    Struct(Arc<StructLayout>),
}

impl ElementType {
    /// Size in bytes of one element.
    pub fn size(&self) -> usize {
        match self {
            Self::Primitive(kind) => kind.size(),
            Self::Struct(layout) => layout.size(),
        }
    }

    /// Alignment in bytes of one element.
    pub fn align(&self) -> usize {
        match self {
            Self::Primitive(kind) => kind.align(),
            Self::Struct(layout) => layout.align(),
        }
    }
}

impl From<PrimitiveKind> for ElementType {
    fn from(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }
}

impl From<Arc<StructLayout>> for ElementType {
    fn from(layout: Arc<StructLayout>) -> Self {
        Self::Struct(layout)
    }
}

impl From<&Arc<StructLayout>> for ElementType {
    fn from(layout: &Arc<StructLayout>) -> Self {
        Self::Struct(Arc::clone(layout))
    }
}

/// One entry of a field specification: `(name, element type, repeat count)`.
///
/// The repeat count has two readings, depending on the element type:
///
/// ```text
/// ┌───────────┬───────┬──────────────────────────────────────────┐
/// │ Element   │ Count │ Shape                                    │
/// ├───────────┼───────┼──────────────────────────────────────────┤
/// │ primitive │ 1     │ Scalar (explicit get/set)                │
/// │ primitive │ 0, ≥2 │ Array of max(count, 1) elements          │
/// │ struct    │ 0     │ Struct (one inline nested instance)      │
/// │ struct    │ ≥1    │ StructArray of `count` instances         │
/// └───────────┴───────┴──────────────────────────────────────────┘
/// ```
///
/// Layout only ever depends on `max(count, 1)`; the distinction between
/// 0 and 1 affects how the field is exposed, not where it lives.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub element: ElementType,
    pub count: usize,
}

impl FieldSpec {
    /// Create a field spec with an explicit repeat count.
    pub fn new(name: impl Into<String>, element: impl Into<ElementType>, count: usize) -> Self {
        Self {
            name: name.into(),
            element: element.into(),
            count,
        }
    }

    /// Create a field spec with the default repeat count of 1.
    pub fn scalar(name: impl Into<String>, element: impl Into<ElementType>) -> Self {
        Self::new(name, element, 1)
    }

    /// The shape this spec materializes as.
    pub fn shape(&self) -> FieldShape<'_> {
        match (&self.element, self.count) {
            (ElementType::Primitive(kind), 1) => FieldShape::Scalar { kind: *kind },
            (ElementType::Primitive(kind), count) => FieldShape::Array {
                kind: *kind,
                len: count.max(1),
            },
            (ElementType::Struct(layout), 0) => FieldShape::Struct { layout },
            (ElementType::Struct(layout), count) => FieldShape::StructArray { layout, len: count },
        }
    }
}

/// Closed set of field shapes, derived from a [`FieldSpec`].
///
/// Views dispatch on this instead of inspecting names or types at
/// runtime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldShape<'a> {
    Scalar { kind: PrimitiveKind },
    Array { kind: PrimitiveKind, len: usize },
    Struct { layout: &'a Arc<StructLayout> },
    StructArray { layout: &'a Arc<StructLayout>, len: usize },
}

impl fmt::Display for FieldShape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar { kind } => write!(f, "a {kind} scalar"),
            Self::Array { kind, len } => write!(f, "a {kind}[{len}] array"),
            Self::Struct { layout } => write!(f, "a struct {}", layout.name()),
            Self::StructArray { layout, len } => {
                write!(f, "a struct {}[{len}] array", layout.name())
            }
        }
    }
}

/// A field after placement: its spec plus its byte offset.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    spec: FieldSpec,
    offset: usize,
    extent: usize,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    pub fn shape(&self) -> FieldShape<'_> {
        self.spec.shape()
    }

    /// Byte offset from the start of the enclosing struct.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes occupied: element size × max(count, 1).
    pub fn extent(&self) -> usize {
        self.extent
    }

    fn declaration(&self) -> String {
        let name = self.name();
        match self.shape() {
            FieldShape::Scalar { kind } => format!("{kind} {name}"),
            FieldShape::Array { kind, len } => format!("{kind} {name}[{len}]"),
            FieldShape::Struct { layout } => format!("struct {} {name}", layout.name()),
            FieldShape::StructArray { layout, len } => {
                format!("struct {} {name}[{len}]", layout.name())
            }
        }
    }
}

/// Computed size, alignment and field offsets of a C struct.
///
/// Fields are placed in declaration order, never reordered, following
/// the C packing rules:
///
/// ```text
///   offset = 0, align = 1
///   for each field:
///       offset = round_up(offset, field.align)
///       place field at offset
///       offset += field.size × max(field.count, 1)
///       align   = max(align, field.align)
///   size = round_up(offset, align)
/// ```
///
/// For example `{ uint8_t a; uint32_t b; }` places `a` at 0, pads three
/// bytes, places `b` at 4, and has size 8 and alignment 4.
///
/// A layout is immutable once built. Share it with `Arc` to nest it
/// inside other layouts or to reuse it across many instances.
#[derive(Clone, Debug)]
pub struct StructLayout {
    name: String,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
    size: usize,
    align: usize,
}

impl StructLayout {
    /// Compute a layout from an ordered list of field specs.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::DuplicateField`] if two specs share a name.
    /// - [`LayoutError::SizeOverflow`] if the struct would not fit in
    ///   the address space.
    pub fn new(name: impl Into<String>, specs: Vec<FieldSpec>) -> Result<Self, LayoutError> {
        let name = name.into();
        let mut fields = Vec::with_capacity(specs.len());
        let mut index = HashMap::with_capacity(specs.len());
        let mut offset = 0usize;
        let mut align = 1usize;

        for spec in specs {
            let overflow = || LayoutError::SizeOverflow {
                layout: name.clone(),
                field: spec.name.clone(),
            };
            let field_align = spec.element.align();
            let extent = spec
                .element
                .size()
                .checked_mul(spec.count.max(1))
                .ok_or_else(overflow)?;
            let placed = align_up(offset, field_align).ok_or_else(overflow)?;
            let next = placed.checked_add(extent).ok_or_else(overflow)?;

            if index.insert(spec.name.clone(), fields.len()).is_some() {
                return Err(LayoutError::DuplicateField {
                    layout: name,
                    field: spec.name,
                });
            }

            fields.push(Field {
                spec,
                offset: placed,
                extent,
            });
            offset = next;
            align = align.max(field_align);
        }

        let size = align_up(offset, align).ok_or_else(|| LayoutError::SizeOverflow {
            layout: name.clone(),
            field: fields.last().map(|f| f.name().to_owned()).unwrap_or_default(),
        })?;

        Ok(Self {
            name,
            fields,
            index,
            size,
            align,
        })
    }

    /// Start a fluent builder for a struct named `name`.
    pub fn builder(name: impl Into<String>) -> LayoutBuilder {
        LayoutBuilder {
            name: name.into(),
            specs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes, including trailing padding.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment in bytes: the largest field alignment, or 1 when empty.
    pub fn align(&self) -> usize {
        self.align
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.field(name).map(Field::offset)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for StructLayout {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.size == other.size
            && self.align == other.align
            && self.fields == other.fields
    }
}

/// Renders the layout as an annotated C declaration.
///
/// ```text
/// struct pair {
///     uint8_t a; // offset 0
///     uint32_t b; // offset 4
/// }; // size 8, align 4
/// ```
impl fmt::Display for StructLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "struct {} {{", self.name)?;
        for field in &self.fields {
            writeln!(f, "    {}; // offset {}", field.declaration(), field.offset)?;
        }
        write!(f, "}}; // size {}, align {}", self.size, self.align)
    }
}

/// Fluent builder for [`StructLayout`].
///
/// Each method appends one field in declaration order and returns
/// `&mut Self` for chaining:
///
/// ```rust
/// use zsd_ctypes::{PrimitiveKind, StructLayout};
///
/// let layout = StructLayout::builder("pair")
///     .field("a", PrimitiveKind::U8)
///     .field("b", PrimitiveKind::U32)
///     .build()
///     .unwrap();
///
/// assert_eq!(layout.offset_of("b"), Some(4));
/// assert_eq!(layout.size(), 8);
/// ```
#[derive(Clone, Debug)]
pub struct LayoutBuilder {
    name: String,
    specs: Vec<FieldSpec>,
}

impl LayoutBuilder {
    /// Append a scalar primitive field (repeat count 1).
    pub fn field(&mut self, name: impl Into<String>, kind: PrimitiveKind) -> &mut Self {
        self.spec(FieldSpec::scalar(name, kind))
    }

    /// Append a fixed-length primitive array.
    pub fn array(&mut self, name: impl Into<String>, kind: PrimitiveKind, count: usize) -> &mut Self {
        self.spec(FieldSpec::new(name, kind, count))
    }

    /// Append one inline nested struct (repeat count 0).
    pub fn nested(&mut self, name: impl Into<String>, layout: &Arc<StructLayout>) -> &mut Self {
        self.spec(FieldSpec::new(name, layout, 0))
    }

    /// Append a fixed-length array of nested structs.
    pub fn nested_array(
        &mut self,
        name: impl Into<String>,
        layout: &Arc<StructLayout>,
        count: usize,
    ) -> &mut Self {
        self.spec(FieldSpec::new(name, layout, count))
    }

    /// Append an arbitrary spec.
    pub fn spec(&mut self, spec: FieldSpec) -> &mut Self {
        self.specs.push(spec);
        self
    }

    /// Compute the layout.
    ///
    /// # Errors
    ///
    /// See [`StructLayout::new`].
    pub fn build(&self) -> Result<StructLayout, LayoutError> {
        StructLayout::new(self.name.clone(), self.specs.clone())
    }

    /// Compute the layout and wrap it for sharing and nesting.
    ///
    /// # Errors
    ///
    /// See [`StructLayout::new`].
    pub fn build_shared(&self) -> Result<Arc<StructLayout>, LayoutError> {
        self.build().map(Arc::new)
    }
}
