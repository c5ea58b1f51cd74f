//! LZ-Abyss: a lossy LZ77-style coder for normalized float audio.
//!
//! Literals are samples quantized to one byte. Repeated runs (loops, held
//! notes, silence) become 4-byte back-references found by a greedy search with
//! a float tolerance, so `decompress(compress(x))` only reproduces `x` to
//! within quantization error.
//!
//! Stream grammar, byte by byte:
//!
//! ```text
//! 0xFF off_lo off_hi len   copy `len` samples starting `off` samples back
//! 0x00..=0xFE              literal, dequantized as value / 127.5 - 1
//! ```

use crate::error::{CodecError, Result};

/// Lookback distance in samples.
pub const WINDOW: usize = 4096;
pub const MIN_MATCH: usize = 4;
pub const MAX_MATCH: usize = 255;
/// Two samples match when they differ by less than this.
pub const MATCH_TOLERANCE: f32 = 0.001;
pub const REFERENCE_MARKER: u8 = 0xFF;

const REFERENCE_LEN: usize = 4;
// Keeps literals clear of the reference marker.
const MAX_LITERAL: u8 = REFERENCE_MARKER - 1;

pub fn compress(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len());
    let mut i = 0;

    while i < samples.len() {
        let (offset, length) = longest_match(samples, i);

        if length >= MIN_MATCH {
            out.push(REFERENCE_MARKER);
            out.extend_from_slice(&(offset as u16).to_le_bytes());
            out.push(length as u8);
            i += length;
        } else {
            out.push(quantize(samples[i]));
            i += 1;
        }
    }

    out
}

/// Longest run starting at `i` that repeats one starting in the lookback
/// window, as `(distance back, length)`. The source run must end before `i`.
/// The first of several equally long candidates wins.
fn longest_match(samples: &[f32], i: usize) -> (usize, usize) {
    let mut best = (0, 0);

    for j in i.saturating_sub(WINDOW)..i {
        let mut len = 0;
        while i + len < samples.len()
            && j + len < i
            && len < MAX_MATCH
            && (samples[i + len] - samples[j + len]).abs() < MATCH_TOLERANCE
        {
            len += 1;
        }
        if len >= MIN_MATCH && len > best.1 {
            best = (i - j, len);
        }
    }

    best
}

/// Decode `compressed` into exactly `original_len` samples. Samples the stream
/// does not cover are left at 0.0.
///
/// A back-reference pointing before the start of the output is rejected with
/// [`CodecError::MalformedStream`]. A marker byte without three bytes after it
/// is read as a literal.
pub fn decompress(compressed: &[u8], original_len: usize) -> Result<Vec<f32>> {
    let mut output = vec![0.0f32; original_len];
    let mut i = 0;
    let mut out_index = 0;

    while i < compressed.len() && out_index < original_len {
        if compressed[i] == REFERENCE_MARKER && i + REFERENCE_LEN <= compressed.len() {
            let offset = u16::from_le_bytes([compressed[i + 1], compressed[i + 2]]) as usize;
            let length = compressed[i + 3] as usize;
            if offset == 0 || offset > out_index {
                return Err(CodecError::MalformedStream {
                    position: i,
                    offset,
                    available: out_index,
                });
            }

            // Element by element so overlapping runs repeat.
            for _ in 0..length {
                if out_index >= original_len {
                    break;
                }
                output[out_index] = output[out_index - offset];
                out_index += 1;
            }
            i += REFERENCE_LEN;
        } else {
            output[out_index] = dequantize(compressed[i]);
            out_index += 1;
            i += 1;
        }
    }

    Ok(output)
}

/// First-order delta: `out[0] = x[0]`, `out[i] = x[i] - x[i-1]`.
pub fn prefilter(data: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0.0f32;
    for (i, &x) in data.iter().enumerate() {
        out.push(if i == 0 { x } else { x - prev });
        prev = x;
    }
    out
}

/// Running sum, the inverse of [`prefilter`].
pub fn unfilter(filtered: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(filtered.len());
    let mut acc = 0.0f32;
    for (i, &d) in filtered.iter().enumerate() {
        acc = if i == 0 { d } else { d + acc };
        out.push(acc);
    }
    out
}

/// [-1, 1] onto 0..=254.
pub fn quantize(sample: f32) -> u8 {
    ((sample + 1.0) * 127.5).round().clamp(0.0, MAX_LITERAL as f32) as u8
}

pub fn dequantize(value: u8) -> f32 {
    value as f32 / 127.5 - 1.0
}
