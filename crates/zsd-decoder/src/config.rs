use zsd_module::ModuleConfig;

/// Configuration for a [`Decompressor`](crate::Decompressor).
///
/// ```text
/// ┌───────────────────┬─────────┬────────────────────────────────────────┐
/// │ Field             │ Default │ Purpose                                │
/// ├───────────────────┼─────────┼────────────────────────────────────────┤
/// │ module            │ n/a     │ Linear memory limits for the module    │
/// │ input_chunk_size  │ None    │ Source bytes fed per refill            │
/// │ output_chunk_size │ None    │ Capacity of the output region          │
/// └───────────────────┴─────────┴────────────────────────────────────────┘
/// ```
///
/// `None` chunk sizes ask the codec for its recommendation
/// (`dstream_in_size` / `dstream_out_size`). An override of 0 is treated
/// as 1; the stream still makes progress, one byte at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Passed to [`NativeModule::instantiate`](zsd_module::NativeModule::instantiate)
    /// by [`Decompressor::init`](crate::Decompressor::init).
    pub module: ModuleConfig,

    pub input_chunk_size: Option<u32>,

    /// Smaller values yield more, smaller chunks. Chunking never changes
    /// the concatenated output.
    pub output_chunk_size: Option<u32>,
}
