#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zsd_decoder::{DecoderConfig, Decompressor};
use zsd_module::{ForeignHeap, ModuleConfig};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    input_chunk: u16,
    output_chunk: u16,
    /// Pull at most this many chunks before dropping the stream.
    pulls: u8,
    data: Vec<u8>,
}

// Fuzz target: streaming decompression with arbitrary chunk sizes and
// early termination.
//
// Catches bugs in:
// - Cursor records left past their size
// - Stalls when the codec makes no progress
// - Contexts or regions leaked on drop, failure or exhaustion
fuzz_target!(|input: FuzzInput| {
    let config = DecoderConfig {
        module: ModuleConfig {
            initial_pages: 1,
            maximum_pages: 64,
        },
        input_chunk_size: Some(u32::from(input.input_chunk)),
        output_chunk_size: Some(u32::from(input.output_chunk)),
    };
    let mut decompressor = Decompressor::init(config).unwrap();
    {
        let Ok(mut stream) = decompressor.stream(&input.data) else {
            return;
        };
        for _ in 0..input.pulls {
            match stream.next_chunk() {
                Some(Ok(chunk)) => assert!(!chunk.is_empty()),
                Some(Err(_)) | None => break,
            }
        }
    }
    assert_eq!(decompressor.module().stats().live_allocations, 0);
    assert_eq!(decompressor.module().live_contexts(), 0);
});
