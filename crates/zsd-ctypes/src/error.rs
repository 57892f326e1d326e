/// Errors raised while computing a struct layout.
///
/// Layout computation is pure arithmetic over a field list the caller
/// controls, so a well-formed list never fails. These variants exist for
/// the two ways a list can be malformed.
///
/// ```text
///   LayoutError
///   ├── DuplicateField  ← two fields share a name, name → offset is ambiguous
///   └── SizeOverflow    ← extent or offset arithmetic overflows usize
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("duplicate field `{field}` in struct {layout}")]
    DuplicateField { layout: String, field: String },

    #[error("struct {layout} overflows the address space at field `{field}`")]
    SizeOverflow { layout: String, field: String },
}

/// Errors raised while materializing or accessing a view.
///
/// `OutOfBounds` is the only error that can occur at materialization
/// time; it is raised before any view exists, so no partially-built
/// instance ever escapes. The remaining variants come from field lookup
/// and element access on a live instance.
///
/// ```text
///   ViewError
///   ├── OutOfBounds      ← buffer shorter than base + layout size
///   ├── NoSuchField      ← name not declared in the layout
///   ├── KindMismatch     ← typed accessor disagrees with the field shape
///   ├── IndexOutOfRange  ← element index ≥ field length
///   └── LengthMismatch   ← bulk copy with a slice of the wrong length
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error(
        "buffer too small for struct {layout}: need {required} bytes, have {available}"
    )]
    OutOfBounds {
        layout: String,
        required: usize,
        available: usize,
    },

    #[error("struct {layout} has no field `{field}`")]
    NoSuchField { layout: String, field: String },

    #[error("field `{field}` is {found}, not {expected}")]
    KindMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("index {index} out of range for field `{field}` of length {len}")]
    IndexOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },

    #[error("slice of length {found} does not fit field `{field}` of length {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        found: usize,
    },
}
