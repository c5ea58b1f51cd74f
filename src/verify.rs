//! Determinism and integrity checks over the codec.
//!
//! Problems are collected as readable strings instead of failing on the first
//! one, so a single run reports everything wrong with a track.

use serde::Serialize;
use std::time::Instant;

use crate::audio::buffer::AudioBuffer;
use crate::audio::segment::Segmenter;
use crate::beatmap::FractalBeatmap;
use crate::codec::{Fractal1Codec, FractalMetadata, FractalSegment};
use crate::error::Result;
use crate::lz_abyss;

/// Below this the two decodes are considered to disagree.
pub const MIN_BEATMAP_CONSISTENCY: f64 = 0.99;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub stats: VerificationStats,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStats {
    pub encoding_ms: f64,
    pub decoding_ms: f64,
    pub container_bytes: usize,
    /// Raw f32 size over container size.
    pub compression_ratio: f64,
    pub beatmap_consistency: f64,
    pub lz_abyss: Option<LzAbyssProbe>,
}

/// How LZ-Abyss would fare on channel 0 with the delta prefilter applied.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LzAbyssProbe {
    pub compressed_bytes: usize,
    pub compression_ratio: f64,
    pub max_error: f32,
}

/// Encode `buffer` twice, decode both results and cross-check them.
///
/// Codec failures are returned as errors; everything else ends up in the
/// report.
pub fn verify_deterministic<S: Segmenter>(
    codec: &Fractal1Codec<S>,
    buffer: &AudioBuffer,
    metadata: &FractalMetadata,
) -> Result<VerificationReport> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let start = Instant::now();
    let first = codec.encode(buffer, metadata)?;
    let encoding_ms = start.elapsed().as_secs_f64() * 1000.0;
    let second = codec.encode(buffer, metadata)?;

    if first.len() != second.len() {
        errors.push(format!(
            "Encoding length mismatch: {} vs {}",
            first.len(),
            second.len()
        ));
    }
    let differences = first.iter().zip(&second).filter(|(a, b)| a != b).count();
    if differences > 0 {
        errors.push(format!(
            "Encoding non-deterministic: {} byte differences",
            differences
        ));
    }

    let start = Instant::now();
    let decoded_first = codec.decode(&first)?;
    let decoding_ms = start.elapsed().as_secs_f64() * 1000.0;
    let decoded_second = codec.decode(&second)?;

    let beatmap_consistency = beatmap_consistency(&decoded_first.beatmap, &decoded_second.beatmap);
    if beatmap_consistency < MIN_BEATMAP_CONSISTENCY {
        errors.push(format!(
            "Beatmap consistency too low: {:.2}%",
            beatmap_consistency * 100.0
        ));
    }

    let raw_bytes = buffer.frames() * buffer.channel_count() * 4;
    let compression_ratio = if first.is_empty() {
        0.0
    } else {
        raw_bytes as f64 / first.len() as f64
    };
    if compression_ratio < 1.0 {
        warnings.push(format!(
            "Compression ratio below 1.0: {:.2}",
            compression_ratio
        ));
    }

    errors.extend(segment_integrity(&decoded_first.segments));
    errors.extend(validate_beatmap(&decoded_first.beatmap));

    let lz_abyss = probe_lz_abyss(buffer.first_channel());

    log::info!(
        "Verified {} bytes: {} errors, {} warnings, ratio {:.3}, consistency {:.4}",
        first.len(),
        errors.len(),
        warnings.len(),
        compression_ratio,
        beatmap_consistency
    );

    Ok(VerificationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        stats: VerificationStats {
            encoding_ms,
            decoding_ms,
            container_bytes: first.len(),
            compression_ratio,
            beatmap_consistency,
            lz_abyss,
        },
    })
}

/// 1.0 for identical beatmaps, falling with the mean per-field difference.
/// Beatmaps of different lengths score 0.
pub fn beatmap_consistency(a: &[FractalBeatmap], b: &[FractalBeatmap]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    if a.is_empty() {
        return 1.0;
    }

    let total: u64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            (x.bass.abs_diff(y.bass) as u64)
                + (x.mid.abs_diff(y.mid) as u64)
                + (x.high.abs_diff(y.high) as u64)
                + (x.beat.abs_diff(y.beat) as u64)
        })
        .sum();
    let normalized = total as f64 / (a.len() as f64 * 4.0 * 255.0);
    1.0 - normalized.min(1.0)
}

/// Timestamps must be finite, non-negative and non-decreasing.
pub fn validate_beatmap(beatmap: &[FractalBeatmap]) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, frame) in beatmap.iter().enumerate() {
        if !frame.timestamp.is_finite() || frame.timestamp < 0.0 {
            errors.push(format!("Beatmap[{}]: invalid timestamp {}", i, frame.timestamp));
        }
        if i > 0 && frame.timestamp < beatmap[i - 1].timestamp {
            errors.push(format!(
                "Beatmap[{}]: timestamp regression: {} < {}",
                i,
                frame.timestamp,
                beatmap[i - 1].timestamp
            ));
        }
    }
    errors
}

/// Per-row checks: index equals position, non-empty, non-negative timestamp.
pub fn validate_segments(segments: &[FractalSegment]) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, seg) in segments.iter().enumerate() {
        if seg.index as usize != i {
            errors.push(format!(
                "Segment index mismatch: expected {}, got {}",
                i, seg.index
            ));
        }
        if seg.size == 0 {
            errors.push(format!("Segment[{}]: invalid size: {}", i, seg.size));
        }
        if !seg.timestamp.is_finite() || seg.timestamp < 0.0 {
            errors.push(format!("Segment[{}]: invalid timestamp: {}", i, seg.timestamp));
        }
    }
    errors
}

fn segment_integrity(segments: &[FractalSegment]) -> Vec<String> {
    let mut errors = validate_segments(segments);
    for (i, pair) in segments.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            errors.push(format!("Segments out of order at index {}", i + 1));
        }
    }
    errors
}

fn probe_lz_abyss(samples: &[f32]) -> Option<LzAbyssProbe> {
    if samples.is_empty() {
        return None;
    }

    let compressed = lz_abyss::compress(&lz_abyss::prefilter(samples));
    let restored = match lz_abyss::decompress(&compressed, samples.len()) {
        Ok(filtered) => lz_abyss::unfilter(&filtered),
        Err(err) => {
            log::warn!("LZ-Abyss probe could not read its own stream: {}", err);
            return None;
        }
    };
    let max_error = samples
        .iter()
        .zip(&restored)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);

    Some(LzAbyssProbe {
        compressed_bytes: compressed.len(),
        compression_ratio: (samples.len() * 4) as f64 / compressed.len() as f64,
        max_error,
    })
}
