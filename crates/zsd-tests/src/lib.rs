//! Deterministic fixtures shared by the integration tests and benches.
//!
//! A fixture is a block of pseudo-random `f32` samples (roughly standard
//! normal) compressed into a single zstd frame. Samples come from a
//! fixed-seed xorshift generator, so every run and every machine sees the
//! same bytes and the same expected floats.

/// Samples in the small fixture: 131072 bytes decompressed.
pub const SMALL_SAMPLES: usize = 32_768;

/// Samples in the large fixture: 1048576 bytes decompressed.
pub const LARGE_SAMPLES: usize = 262_144;

/// `len` samples from the generator seeded with `seed`.
///
/// Hand-rolled instead of `rand` so the bytes stay fixed across `rand`
/// releases, whose generators and distributions may change output.
pub fn samples(seed: u64, len: usize) -> Vec<f32> {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        // Top 24 bits as a uniform in [0, 1).
        #[allow(clippy::cast_precision_loss)]
        let uniform = (state >> 40) as f32 / (1u64 << 24) as f32;
        uniform
    };
    // Irwin-Hall: the sum of 12 uniforms minus 6 is close to N(0, 1).
    (0..len)
        .map(|_| (0..12).map(|_| next()).sum::<f32>() - 6.0)
        .collect()
}

/// Little-endian bytes of `samples`, the layout a C `float[]` has.
pub fn to_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Reinterpret decompressed bytes as samples.
///
/// # Panics
///
/// If `bytes` is not a whole number of `f32`s.
pub fn floats(bytes: &[u8]) -> Vec<f32> {
    assert_eq!(bytes.len() % 4, 0, "{} bytes is not a whole number of f32s", bytes.len());
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// A single frame with content size and checksum in the header.
///
/// # Panics
///
/// If the zstd compressor fails, which it does not for in-memory input.
pub fn fixture(seed: u64, len: usize) -> (Vec<f32>, Vec<u8>) {
    let samples = samples(seed, len);
    let mut compressor = zstd::bulk::Compressor::new(3).expect("compressor");
    compressor.include_checksum(true).expect("checksum flag");
    let frame = compressor.compress(&to_bytes(&samples)).expect("compress fixture");
    (samples, frame)
}

/// A frame written by the streaming encoder, which leaves the content
/// size out of the header.
///
/// # Panics
///
/// If the zstd encoder fails.
pub fn unsized_fixture(seed: u64, len: usize) -> (Vec<f32>, Vec<u8>) {
    use std::io::Write;

    let samples = samples(seed, len);
    let mut encoder = zstd::stream::Encoder::new(Vec::new(), 3).expect("encoder");
    encoder.include_contentsize(false).expect("content size flag");
    encoder.include_checksum(true).expect("checksum flag");
    encoder.write_all(&to_bytes(&samples)).expect("write fixture");
    (samples, encoder.finish().expect("finish fixture"))
}

/// Compare `actual[range]` with `expected[range]` within `eps`.
pub fn all_close(actual: &[f32], expected: &[f32], eps: f32) -> bool {
    actual.len() == expected.len()
        && actual.iter().zip(expected).all(|(a, b)| (a - b).abs() < eps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_is_deterministic() {
        assert_eq!(samples(7, 100), samples(7, 100));
        assert_ne!(samples(7, 100), samples(8, 100));
    }

    #[test]
    fn generator_output_is_pinned() {
        let bits: Vec<u32> = samples(1, 3).iter().map(|s| s.to_bits()).collect();
        assert_eq!(bits, [0x3f02_fc80, 0xbf42_b7e8, 0x3e4c_7540]);
    }

    #[test]
    fn samples_look_normal() {
        let s = samples(1, 10_000);
        #[allow(clippy::cast_precision_loss)]
        let mean = s.iter().sum::<f32>() / s.len() as f32;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!(s.iter().all(|x| x.abs() <= 6.0));
    }

    #[test]
    fn bytes_and_floats_agree() {
        let s = samples(3, 16);
        assert_eq!(floats(&to_bytes(&s)), s);
    }
}
