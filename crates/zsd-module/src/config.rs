/// Configuration for instantiating a foreign module.
///
/// Passed explicitly at construction; there is no process-wide module.
///
/// ```text
/// ┌───────────────┬─────────┬──────────────────────────────────────────┐
/// │ Field         │ Default │ Purpose                                  │
/// ├───────────────┼─────────┼──────────────────────────────────────────┤
/// │ initial_pages │ 16      │ Linear memory at start (64 KiB pages)    │
/// │ maximum_pages │ 16384   │ Growth limit; 16384 pages = 1 GiB        │
/// └───────────────┴─────────┴──────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Pages of linear memory allocated when the module is instantiated.
    pub initial_pages: u32,

    /// Upper bound on linear memory. Allocations that would need more
    /// pages fail with a null address.
    pub maximum_pages: u32,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            initial_pages: 16,
            maximum_pages: 16_384,
        }
    }
}
