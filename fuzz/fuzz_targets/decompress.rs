#![no_main]

use libfuzzer_sys::fuzz_target;
use zsd_decoder::{DecoderConfig, Decompressor};
use zsd_module::{ForeignHeap, ModuleConfig};

// Fuzz target: one-shot decompression of arbitrary bytes.
//
// Catches bugs in:
// - Frame size sentinels mapped to the wrong error
// - Oversized content sizes reaching the allocator
// - Buffers leaked on an error path
fuzz_target!(|data: &[u8]| {
    let config = DecoderConfig {
        module: ModuleConfig {
            initial_pages: 1,
            maximum_pages: 256,
        },
        ..DecoderConfig::default()
    };
    let mut decompressor = Decompressor::init(config).unwrap();
    let _ = decompressor.decompress(data);
    assert_eq!(decompressor.module().stats().live_allocations, 0);
});
