use zsd_module::{CONTENTSIZE_ERROR, CONTENTSIZE_UNKNOWN, ForeignModule, NativeModule};

use crate::config::DecoderConfig;
use crate::error::DecompressError;
use crate::session::{Region, Session};
use crate::streaming::ChunkStream;

/// Decompresses zstd frames by driving a foreign module.
///
/// Two paths share one module:
///
/// ```text
///   decompress(src)                stream(src)
///   ───────────────                ───────────
///   copy src into module           allocate context, records, regions
///   query frame content size       per pull: refill input, step codec,
///   allocate exactly that much       yield the output region's prefix
///   one decompress call            release on exhaustion, failure, drop
///   copy out, release
/// ```
///
/// `stream` borrows the decompressor mutably, so at most one session is
/// ever in flight against the module.
#[derive(Debug)]
pub struct Decompressor<M = NativeModule> {
    module: M,
    config: DecoderConfig,
}

impl Decompressor<NativeModule> {
    /// Instantiate a [`NativeModule`] from `config.module`.
    ///
    /// # Errors
    ///
    /// [`DecompressError::Module`] if the memory limits are invalid.
    pub fn init(config: DecoderConfig) -> Result<Self, DecompressError> {
        let module = NativeModule::instantiate(&config.module)?;
        Ok(Self { module, config })
    }
}

impl<M: ForeignModule> Decompressor<M> {
    /// Use an already-instantiated module. `config.module` is ignored.
    pub fn with_module(module: M, config: DecoderConfig) -> Self {
        Self { module, config }
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Effective input refill size: the override, else the codec's
    /// recommendation.
    pub fn input_chunk_size(&self) -> u32 {
        self.config
            .input_chunk_size
            .unwrap_or_else(|| self.module.dstream_in_size())
            .max(1)
    }

    /// Effective output region size: the override, else one full block.
    pub fn output_chunk_size(&self) -> u32 {
        self.config
            .output_chunk_size
            .unwrap_or_else(|| self.module.dstream_out_size())
            .max(1)
    }

    /// Decompress a single frame whose header records its content size.
    ///
    /// # Errors
    ///
    /// - [`DecompressError::FrameSize`] if the header is unreadable or
    ///   omits the content size.
    /// - [`DecompressError::Decompress`] if the codec rejects the frame.
    /// - [`DecompressError::OutOfMemory`] if the module cannot hold the
    ///   input or the output.
    pub fn decompress(&mut self, source: &[u8]) -> Result<Vec<u8>, DecompressError> {
        let len = u32::try_from(source.len())
            .map_err(|_| DecompressError::InputTooLarge { len: source.len() })?;
        tracing::debug!(len, "one-shot decompress");

        let mut session = Session::new(&mut self.module);
        let src = session.allocate_bytes(len)?;
        session.write(src, source)?;

        let capacity = match session.module_mut().frame_content_size(src.address, len) {
            CONTENTSIZE_UNKNOWN => {
                return Err(DecompressError::FrameSize {
                    reason: "content size not recorded in the frame header",
                });
            }
            CONTENTSIZE_ERROR => {
                return Err(DecompressError::FrameSize {
                    reason: "input is not a valid zstd frame header",
                });
            }
            size => u32::try_from(size).map_err(|_| DecompressError::FrameSize {
                reason: "content size exceeds the 32-bit address space",
            })?,
        };

        let dst = session.allocate_bytes(capacity)?;
        let module = session.module_mut();
        let status = module.decompress(dst.address, capacity, src.address, len);
        if module.is_error(status) {
            return Err(DecompressError::Decompress(module.error_name(status)));
        }

        let output = session.bytes(Region { address: dst.address, len: status })?.to_vec();
        session.release_all();
        tracing::debug!(len, produced = output.len(), "one-shot decompress finished");
        Ok(output)
    }

    /// Open a streaming session over `source`.
    ///
    /// The source may hold several concatenated frames, and frames need
    /// not record their content size.
    ///
    /// # Errors
    ///
    /// [`DecompressError::OutOfMemory`] or [`DecompressError::Stream`] if
    /// the session's resources cannot be created.
    pub fn stream<'a>(&'a mut self, source: &'a [u8]) -> Result<ChunkStream<'a, M>, DecompressError> {
        let input_chunk = self.input_chunk_size();
        let output_chunk = self.output_chunk_size();
        ChunkStream::open(&mut self.module, source, input_chunk, output_chunk)
    }

    /// Stream `source` to completion, collecting every chunk.
    ///
    /// # Errors
    ///
    /// See [`stream`](Self::stream) and [`ChunkStream::next_chunk`].
    pub fn stream_to_vec(&mut self, source: &[u8]) -> Result<Vec<u8>, DecompressError> {
        let mut stream = self.stream(source)?;
        let mut output = Vec::new();
        while let Some(chunk) = stream.next_chunk() {
            output.extend_from_slice(chunk?);
        }
        Ok(output)
    }
}
