/// Errors raised while instantiating or growing a foreign module.
///
/// Codec failures are not represented here: the foreign codec reports
/// them as status codes (see [`crate::codec`]), exactly as a compiled
/// module would across its ABI.
///
/// ```text
///   ModuleError
///   ├── InitialExceedsMaximum  ← config asks for more initial pages than allowed
///   ├── MaximumTooLarge        ← page limit beyond the 32-bit address space
///   └── GrowthRefused          ← memory.grow past the configured maximum
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("initial memory of {initial} pages exceeds the maximum of {maximum}")]
    InitialExceedsMaximum { initial: u32, maximum: u32 },

    #[error("maximum of {maximum} pages exceeds the 32-bit address space ({limit} pages)")]
    MaximumTooLarge { maximum: u32, limit: u32 },

    #[error("cannot grow linear memory from {current} to {requested} pages (maximum {maximum})")]
    GrowthRefused {
        current: u32,
        requested: u64,
        maximum: u32,
    },
}
