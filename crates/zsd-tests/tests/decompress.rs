//! One-shot decompression of the sample fixtures.
//!
//! Both fixture sizes are supported and exercised: 32768 samples
//! (131072 bytes) and 262144 samples (1048576 bytes).

use zsd_decoder::{DecoderConfig, DecompressError, Decompressor};
use zsd_module::ForeignHeap;
use zsd_tests::{LARGE_SAMPLES, SMALL_SAMPLES, all_close, fixture, floats, unsized_fixture};

fn decompressor() -> Decompressor {
    Decompressor::init(DecoderConfig::default()).unwrap()
}

fn check(expected: &[f32], output: &[u8], probe: usize) {
    let actual = floats(output);
    assert_eq!(actual.len(), expected.len());
    assert!(all_close(&actual[..20], &expected[..20], 1e-6));
    assert!(all_close(&actual[probe..probe + 20], &expected[probe..probe + 20], 1e-6));
    assert!(all_close(&actual[actual.len() - 20..], &expected[expected.len() - 20..], 1e-6));
}

#[test]
fn small_fixture_expands_to_131072_bytes() {
    let (samples, frame) = fixture(11, SMALL_SAMPLES);
    let output = decompressor().decompress(&frame).unwrap();
    assert_eq!(output.len(), 131_072);
    check(&samples, &output, 1024);
}

#[test]
fn large_fixture_expands_to_1048576_bytes() {
    let (samples, frame) = fixture(29, LARGE_SAMPLES);
    let output = decompressor().decompress(&frame).unwrap();
    assert_eq!(output.len(), 1_048_576);
    check(&samples, &output, 32_768);
}

#[test]
fn one_module_serves_many_calls() {
    let mut decompressor = decompressor();
    let baseline = decompressor.module().stats();
    for seed in 1..=4 {
        let (samples, frame) = fixture(seed, SMALL_SAMPLES);
        assert_eq!(floats(&decompressor.decompress(&frame).unwrap()), samples);
    }
    let after = decompressor.module().stats();
    assert_eq!(after.live_allocations, baseline.live_allocations);
    assert_eq!(after.live_bytes, baseline.live_bytes);
}

#[test]
fn corrupted_frame_reports_decompression_failure() {
    let (_, mut frame) = fixture(5, SMALL_SAMPLES);
    let middle = frame.len() / 2;
    for byte in &mut frame[middle..middle + 16] {
        *byte = !*byte;
    }

    let mut decompressor = decompressor();
    let error = decompressor.decompress(&frame).unwrap_err();
    assert!(matches!(error, DecompressError::Decompress(_)), "{error}");
    assert!(error.to_string().starts_with("decompression failed: "));
    assert_eq!(decompressor.module().stats().live_allocations, 0);
}

#[test]
fn garbage_reports_frame_size_failure() {
    let error = decompressor().decompress(b"definitely not zstd").unwrap_err();
    assert!(error.to_string().starts_with("frame size query failed: "));
}

#[test]
fn truncated_frame_fails() {
    let (_, frame) = fixture(5, SMALL_SAMPLES);
    let error = decompressor().decompress(&frame[..frame.len() - 100]).unwrap_err();
    assert!(matches!(error, DecompressError::Decompress(_)), "{error}");
}

#[test]
fn frames_without_content_size_need_the_stream_path() {
    let (samples, frame) = unsized_fixture(3, SMALL_SAMPLES);
    let mut decompressor = decompressor();
    assert!(matches!(
        decompressor.decompress(&frame),
        Err(DecompressError::FrameSize { .. })
    ));
    assert_eq!(floats(&decompressor.stream_to_vec(&frame).unwrap()), samples);
}
