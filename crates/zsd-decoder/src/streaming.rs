use std::io;
use std::ops::Range;

use zsd_module::{Address, ForeignModule};

use crate::error::DecompressError;
use crate::record::{BufferRecord, Direction};
use crate::session::{Allocation, Region, Session};

/// Lifecycle of a [`ChunkStream`].
///
/// ```text
///   Idle ──► Feeding ──► Draining ──┐
///              ▲            │ ▲     │ chunk yielded while the
///              └────────────┘ └─────┘ input slice lasts, or while
///              slice consumed         the output region came back full
///
///   Feeding ── source empty ──► Exhausted
///   Draining ── codec error ──► Failed
/// ```
///
/// `Exhausted` and `Failed` are terminal. Every foreign resource is
/// released on entry to either, before control returns to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Feeding,
    Draining,
    Exhausted,
    Failed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Exhausted | StreamState::Failed)
    }
}

/// A streaming decompression session yielding output chunk by chunk.
///
/// Each chunk is a slice of the module's output region and borrows the
/// stream, so it must be consumed (or copied) before the next pull
/// overwrites it. The concatenation of all chunks equals the one-shot
/// decompression of the same input, independent of chunk sizes.
///
/// ```rust
/// use zsd_decoder::{DecoderConfig, Decompressor};
///
/// let frame = zstd::bulk::compress(&[42u8; 10_000], 3).unwrap();
/// let mut decompressor = Decompressor::init(DecoderConfig::default()).unwrap();
/// let mut stream = decompressor.stream(&frame).unwrap();
///
/// let mut total = 0;
/// while let Some(chunk) = stream.next_chunk() {
///     total += chunk.unwrap().len();
/// }
/// assert_eq!(total, 10_000);
/// ```
///
/// Dropping the stream early (or calling [`close`](Self::close)) releases
/// the codec context, both control records, and both data regions.
pub struct ChunkStream<'a, M: ForeignModule> {
    session: Session<'a, M>,
    source: &'a [u8],
    offset: usize,
    state: StreamState,
    context: Address,
    input: Allocation,
    output: Allocation,
    in_region: Region,
    out_region: Region,
    /// Last codec status; non-zero means a frame is still open.
    hint: u32,
    output_full: bool,
    consumed: u64,
    produced: u64,
    /// Bytes of the output region not yet handed to a reader.
    pending: Range<u32>,
}

impl<'a, M: ForeignModule> ChunkStream<'a, M> {
    /// Allocate the context, records and regions for a stream over
    /// `source`. Nothing is fed to the codec until the first pull.
    ///
    /// # Errors
    ///
    /// [`DecompressError::OutOfMemory`] or [`DecompressError::Stream`] if a
    /// resource cannot be created. Anything allocated before the failure
    /// is released.
    pub(crate) fn open(
        module: &'a mut M,
        source: &'a [u8],
        input_chunk: u32,
        output_chunk: u32,
    ) -> Result<Self, DecompressError> {
        let mut session = Session::new(module);
        let context = session.create_context()?;
        let input = session.allocate(Direction::Input.layout()?)?;
        let output = session.allocate(Direction::Output.layout()?)?;
        let in_region = session.allocate_bytes(input_chunk.max(1))?;
        let out_region = session.allocate_bytes(output_chunk.max(1))?;
        tracing::debug!(
            source = source.len(),
            input_chunk = in_region.len,
            output_chunk = out_region.len,
            "stream opened"
        );

        Ok(Self {
            session,
            source,
            offset: 0,
            state: StreamState::Idle,
            context,
            input,
            output,
            in_region,
            out_region,
            hint: 0,
            output_full: false,
            consumed: 0,
            produced: 0,
            pending: 0..0,
        })
    }

    /// Pull the next chunk.
    ///
    /// Returns `None` once the stream is exhausted, and after a failure
    /// has been reported.
    pub fn next_chunk(&mut self) -> Option<Result<&[u8], DecompressError>> {
        if self.pending.is_empty() {
            match self.advance() {
                Ok(Some(len)) => self.pending = 0..len,
                Ok(None) => return None,
                Err(error) => return Some(Err(error)),
            }
        }
        let window = std::mem::replace(&mut self.pending, 0..0);
        Some(self.output_window(window))
    }

    /// Stop early and release every foreign resource now.
    pub fn close(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!(
                consumed = self.consumed,
                produced = self.produced,
                "stream closed early"
            );
            self.transition(StreamState::Exhausted);
            self.release();
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Compressed bytes the codec has consumed so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Decompressed bytes produced so far.
    pub fn bytes_produced(&self) -> u64 {
        self.produced
    }

    pub fn module(&self) -> &M {
        self.session.module()
    }

    /// Run the state machine until a chunk is ready in the output region
    /// or the stream terminates.
    fn advance(&mut self) -> Result<Option<u32>, DecompressError> {
        loop {
            match self.state {
                StreamState::Exhausted | StreamState::Failed => return Ok(None),
                StreamState::Idle => self.transition(StreamState::Feeding),
                StreamState::Feeding => {
                    if self.offset == self.source.len() {
                        return self.finish().map(|()| None);
                    }
                    if let Err(error) = self.feed() {
                        return Err(self.fail(error));
                    }
                    self.transition(StreamState::Draining);
                }
                StreamState::Draining => match self.drain() {
                    Ok(Some(len)) => return Ok(Some(len)),
                    Ok(None) => self.transition(StreamState::Feeding),
                    Err(error) => return Err(self.fail(error)),
                },
            }
        }
    }

    /// Copy the next slice of the source into the input region and reset
    /// the input cursor.
    fn feed(&mut self) -> Result<(), DecompressError> {
        let source = self.source;
        let written = self.session.write(self.in_region, &source[self.offset..])?;
        self.offset += written as usize;
        self.store(Direction::Input, BufferRecord::new(self.in_region.address, written))
    }

    /// One codec step. `Ok(None)` means the input slice is used up and the
    /// codec holds no more output for it.
    fn drain(&mut self) -> Result<Option<u32>, DecompressError> {
        loop {
            let before = self.load(Direction::Input)?;
            // A full output region may hide buffered output, unless the
            // codec already reported the frame complete and flushed.
            let flushing = before.remaining() == 0;
            if flushing && !(self.output_full && self.hint != 0) {
                return Ok(None);
            }
            self.store(
                Direction::Output,
                BufferRecord::new(self.out_region.address, self.out_region.len),
            )?;

            let (context, output, input) = (
                self.context,
                self.output.address(),
                self.input.address(),
            );
            let module = self.session.module_mut();
            let status = module.decompress_stream(context, output, input);
            if module.is_error(status) {
                return Err(DecompressError::Stream(module.error_name(status)));
            }

            let after_in = self.load(Direction::Input)?;
            let after_out = self.load(Direction::Output)?;
            after_in.check(Direction::Input, self.in_region.len)?;
            after_out.check(Direction::Output, self.out_region.len)?;
            if after_in.position < before.position {
                return Err(DecompressError::CorruptRecord {
                    direction: Direction::Input.label(),
                    position: after_in.position,
                    size: after_in.size,
                    capacity: self.in_region.len,
                });
            }

            let consumed = after_in.position - before.position;
            self.consumed += u64::from(consumed);
            self.produced += u64::from(after_out.position);
            self.hint = status;
            self.output_full = after_out.position == after_out.size;
            tracing::trace!(consumed, produced = after_out.position, hint = status, "codec step");

            if after_out.position > 0 {
                return Ok(Some(after_out.position));
            }
            if consumed == 0 {
                if flushing {
                    return Ok(None);
                }
                return Err(DecompressError::Stream("codec made no progress"));
            }
        }
    }

    fn finish(&mut self) -> Result<(), DecompressError> {
        if self.hint != 0 {
            return Err(self.fail(DecompressError::Stream(
                "input ended before the frame was complete",
            )));
        }
        tracing::debug!(consumed = self.consumed, produced = self.produced, "stream exhausted");
        self.transition(StreamState::Exhausted);
        self.release();
        Ok(())
    }

    fn fail(&mut self, error: DecompressError) -> DecompressError {
        tracing::debug!(%error, consumed = self.consumed, produced = self.produced, "stream failed");
        self.transition(StreamState::Failed);
        self.release();
        error
    }

    /// Free the foreign regions. Any unread window pointed into them.
    fn release(&mut self) {
        self.pending = 0..0;
        self.session.release_all();
    }

    fn transition(&mut self, next: StreamState) {
        tracing::trace!(from = ?self.state, to = ?next, "stream state");
        self.state = next;
    }

    fn load(&mut self, direction: Direction) -> Result<BufferRecord, DecompressError> {
        let allocation = match direction {
            Direction::Input => &self.input,
            Direction::Output => &self.output,
        };
        let instance = self.session.instance(allocation)?;
        Ok(BufferRecord::load(&instance, direction)?)
    }

    fn store(&mut self, direction: Direction, record: BufferRecord) -> Result<(), DecompressError> {
        let allocation = match direction {
            Direction::Input => &self.input,
            Direction::Output => &self.output,
        };
        let instance = self.session.instance(allocation)?;
        Ok(record.store(&instance, direction)?)
    }

    fn output_window(&self, window: Range<u32>) -> Result<&[u8], DecompressError> {
        let region = self.out_region.prefix(window.end);
        Ok(&self.session.bytes(region)?[window.start as usize..])
    }
}

impl<M: ForeignModule> Drop for ChunkStream<'_, M> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!(
                consumed = self.consumed,
                produced = self.produced,
                "stream dropped before exhaustion"
            );
        }
    }
}

impl<M: ForeignModule> io::Read for ChunkStream<'_, M> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            match self.advance() {
                Ok(Some(len)) => self.pending = 0..len,
                Ok(None) => return Ok(0),
                Err(error) => return Err(io::Error::other(error)),
            }
        }
        let window = self.pending.clone();
        let available = self.output_window(window).map_err(io::Error::other)?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        // n fits: it is at most the pending window length.
        #[allow(clippy::cast_possible_truncation)]
        let advanced = n as u32;
        self.pending.start += advanced;
        Ok(n)
    }
}

impl<M: ForeignModule> std::fmt::Debug for ChunkStream<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("state", &self.state)
            .field("source_len", &self.source.len())
            .field("offset", &self.offset)
            .field("consumed", &self.consumed)
            .field("produced", &self.produced)
            .finish_non_exhaustive()
    }
}
