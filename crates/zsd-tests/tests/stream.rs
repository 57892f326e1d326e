//! Streaming decompression: chunk/whole equivalence, early termination,
//! and failures on both paths.

use std::io::Read;

use zsd_decoder::{DecoderConfig, DecompressError, Decompressor, StreamState};
use zsd_module::ForeignHeap;
use zsd_tests::{LARGE_SAMPLES, SMALL_SAMPLES, fixture, floats, to_bytes};

fn decompressor(input: Option<u32>, output: Option<u32>) -> Decompressor {
    Decompressor::init(DecoderConfig {
        input_chunk_size: input,
        output_chunk_size: output,
        ..DecoderConfig::default()
    })
    .unwrap()
}

fn collect_chunks(decompressor: &mut Decompressor, frame: &[u8]) -> Vec<Vec<u8>> {
    let mut stream = decompressor.stream(frame).unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next_chunk() {
        chunks.push(chunk.unwrap().to_vec());
    }
    assert_eq!(stream.state(), StreamState::Exhausted);
    chunks
}

// ── Equivalence ───────────────────────────────────────────────────────────────

#[test]
fn small_fixture_streams_to_131072_bytes() {
    let (samples, frame) = fixture(11, SMALL_SAMPLES);
    let mut decompressor = decompressor(None, None);
    let out = collect_chunks(&mut decompressor, &frame).concat();
    assert_eq!(out.len(), 131_072);
    assert_eq!(floats(&out), samples);
}

#[test]
fn large_fixture_streams_to_1048576_bytes() {
    let (samples, frame) = fixture(29, LARGE_SAMPLES);
    let mut decompressor = decompressor(None, None);
    let chunks = collect_chunks(&mut decompressor, &frame);
    let block = decompressor.output_chunk_size() as usize;

    assert!(chunks.len() >= 1_048_576 / block);
    assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= block));
    assert_eq!(floats(&chunks.concat()), samples);
}

#[test]
fn chunk_sizes_never_change_the_output() {
    let (_, frame) = fixture(17, SMALL_SAMPLES);
    let whole = decompressor(None, None).decompress(&frame).unwrap();

    for (input, output) in [(1, 4096), (13, 1), (512, 333), (65_536, 100_000)] {
        let mut decompressor = decompressor(Some(input), Some(output));
        let out = decompressor.stream_to_vec(&frame).unwrap();
        assert_eq!(out, whole, "input {input}, output {output}");
    }
}

#[test]
fn reader_interface_matches_chunks() {
    let (samples, frame) = fixture(2, SMALL_SAMPLES);
    let mut decompressor = decompressor(Some(1000), Some(3000));
    let mut stream = decompressor.stream(&frame).unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(out, to_bytes(&samples));
    assert_eq!(stream.bytes_consumed(), frame.len() as u64);
    assert_eq!(stream.bytes_produced(), out.len() as u64);
}

#[test]
fn concatenated_frames_stream_as_one() {
    let (a, first) = fixture(1, 1000);
    let (b, second) = fixture(2, 3000);
    let frames = [first, second].concat();

    let out = decompressor(Some(777), None).stream_to_vec(&frames).unwrap();
    assert_eq!(floats(&out), [a, b].concat());
}

// ── Early termination ─────────────────────────────────────────────────────────

#[test]
fn abandoning_a_stream_leaks_nothing() {
    let (samples, frame) = fixture(8, LARGE_SAMPLES);
    let mut decompressor = decompressor(None, Some(8192));
    let baseline = decompressor.module().stats();

    {
        let mut stream = decompressor.stream(&frame).unwrap();
        let first = stream.next_chunk().unwrap().unwrap();
        assert_eq!(first.len(), 8192);
        assert_ne!(stream.state(), StreamState::Exhausted);
    }
    assert_eq!(decompressor.module().stats(), baseline);
    assert_eq!(decompressor.module().live_contexts(), 0);

    let out = decompressor.stream_to_vec(&frame).unwrap();
    assert_eq!(floats(&out), samples);
    assert_eq!(decompressor.module().stats(), baseline);
}

#[test]
fn closing_midway_releases_before_drop() {
    let (_, frame) = fixture(8, SMALL_SAMPLES);
    let mut decompressor = decompressor(None, Some(1024));
    let baseline = decompressor.module().stats();

    let mut stream = decompressor.stream(&frame).unwrap();
    for _ in 0..3 {
        stream.next_chunk().unwrap().unwrap();
    }
    stream.close();
    assert_eq!(stream.module().stats(), baseline);
    assert!(stream.next_chunk().is_none());
}

#[test]
fn repeated_sessions_do_not_grow_the_heap() {
    let (_, frame) = fixture(4, SMALL_SAMPLES);
    let mut decompressor = decompressor(None, None);
    decompressor.stream_to_vec(&frame).unwrap();
    let settled = decompressor.module().stats();

    for _ in 0..10 {
        let mut stream = decompressor.stream(&frame).unwrap();
        stream.next_chunk().unwrap().unwrap();
    }
    assert_eq!(decompressor.module().stats(), settled);
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[test]
fn corrupted_stream_surfaces_an_error_and_releases() {
    let (_, mut frame) = fixture(6, SMALL_SAMPLES);
    let middle = frame.len() / 2;
    for byte in &mut frame[middle..middle + 16] {
        *byte = !*byte;
    }

    let mut decompressor = decompressor(None, None);
    let baseline = decompressor.module().stats();
    let error = decompressor.stream_to_vec(&frame).unwrap_err();

    assert!(matches!(error, DecompressError::Stream(_)), "{error}");
    assert!(error.to_string().starts_with("stream decompression failed: "));
    assert_eq!(decompressor.module().stats(), baseline);
}

#[test]
fn truncated_stream_is_not_silently_short() {
    let (_, frame) = fixture(6, SMALL_SAMPLES);
    let cut = &frame[..frame.len() - 100];

    let mut decompressor = decompressor(Some(4096), None);
    let baseline = decompressor.module().stats();
    let mut stream = decompressor.stream(cut).unwrap();

    let mut produced = 0;
    let mut failure = None;
    while let Some(chunk) = stream.next_chunk() {
        match chunk {
            Ok(chunk) => produced += chunk.len(),
            Err(error) => failure = Some(error),
        }
    }

    assert!(produced < 131_072);
    assert!(matches!(failure, Some(DecompressError::Stream(_))));
    assert_eq!(stream.state(), StreamState::Failed);
    assert_eq!(stream.module().stats(), baseline);
}

#[test]
fn empty_input_streams_nothing() {
    let mut decompressor = decompressor(None, None);
    let mut stream = decompressor.stream(&[]).unwrap();
    assert!(stream.next_chunk().is_none());
    assert_eq!(stream.state(), StreamState::Exhausted);
}
