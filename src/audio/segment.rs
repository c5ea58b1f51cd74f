use thiserror::Error;

use super::buffer::AudioBuffer;
use crate::codec::header::FractalSegment;

#[derive(Debug, Error)]
pub enum SegmenterError {
    #[error("cannot segment an empty audio buffer")]
    EmptyBuffer,
    #[error("channel {channel} has {found} frames, expected {expected}")]
    ChannelMismatch {
        channel: usize,
        expected: usize,
        found: usize,
    },
    #[error("segment of {bytes} bytes does not fit a 32-bit size field")]
    SegmentTooLarge { bytes: usize },
    #[error("{samples} reconstructed samples do not divide into {channels} channels")]
    MisalignedSegment { samples: usize, channels: u32 },
}

/// Chunks plus the table that addresses them inside the audio-data region.
#[derive(Clone, Debug, Default)]
pub struct SegmentedAudio {
    pub segments: Vec<Vec<u8>>,
    pub table: Vec<FractalSegment>,
}

/// Slices PCM into chunks for the container and stitches decoded chunks back
/// together.
///
/// Segment bytes must be little-endian f32 samples: the container decoder
/// reinterprets each segment that way before calling `reconstruct_audio`.
pub trait Segmenter {
    fn segment_audio(
        &self,
        buffer: &AudioBuffer,
        compressed: bool,
    ) -> Result<SegmentedAudio, SegmenterError>;

    fn reconstruct_audio(
        &self,
        segments: &[Vec<f32>],
        sample_rate: u32,
        channels: u32,
    ) -> Result<AudioBuffer, SegmenterError>;
}

pub const DEFAULT_SEGMENT_FRAMES: usize = 16384;

/// Fixed-length segments of frame-interleaved samples. The last segment holds
/// whatever frames remain.
#[derive(Clone, Debug)]
pub struct FixedSegmenter {
    frames_per_segment: usize,
}

impl FixedSegmenter {
    pub fn new(frames_per_segment: usize) -> Self {
        Self {
            frames_per_segment: frames_per_segment.max(1),
        }
    }

    pub fn frames_per_segment(&self) -> usize {
        self.frames_per_segment
    }
}

impl Default for FixedSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_FRAMES)
    }
}

impl Segmenter for FixedSegmenter {
    fn segment_audio(
        &self,
        buffer: &AudioBuffer,
        compressed: bool,
    ) -> Result<SegmentedAudio, SegmenterError> {
        let frames = buffer.frames();
        if frames == 0 || buffer.channel_count() == 0 {
            return Err(SegmenterError::EmptyBuffer);
        }
        for (channel, samples) in buffer.channels.iter().enumerate() {
            if samples.len() != frames {
                return Err(SegmenterError::ChannelMismatch {
                    channel,
                    expected: frames,
                    found: samples.len(),
                });
            }
        }

        let channels = buffer.channel_count();
        let interleaved = buffer.interleaved();
        let mut out = SegmentedAudio::default();
        let mut offset = 0u64;

        for (index, chunk) in interleaved
            .chunks(self.frames_per_segment * channels)
            .enumerate()
        {
            let mut bytes = Vec::with_capacity(chunk.len() * 4);
            for &sample in chunk {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
            let size = u32::try_from(bytes.len())
                .map_err(|_| SegmenterError::SegmentTooLarge { bytes: bytes.len() })?;
            let start_frame = index * self.frames_per_segment;

            out.table.push(FractalSegment {
                index: index as u32,
                offset,
                size,
                timestamp: (start_frame as f64 / buffer.sample_rate as f64) as f32,
                compressed,
            });
            offset += size as u64;
            out.segments.push(bytes);
        }

        log::debug!(
            "Segmented {} frames x {} channels into {} segments",
            frames,
            channels,
            out.table.len()
        );

        Ok(out)
    }

    fn reconstruct_audio(
        &self,
        segments: &[Vec<f32>],
        sample_rate: u32,
        channels: u32,
    ) -> Result<AudioBuffer, SegmenterError> {
        let total: usize = segments.iter().map(Vec::len).sum();
        if channels == 0 || total % channels as usize != 0 {
            return Err(SegmenterError::MisalignedSegment {
                samples: total,
                channels,
            });
        }

        let mut interleaved = Vec::with_capacity(total);
        for segment in segments {
            interleaved.extend_from_slice(segment);
        }

        Ok(AudioBuffer::from_interleaved(
            &interleaved,
            channels as usize,
            sample_rate,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(frames: usize) -> AudioBuffer {
        let left = (0..frames).map(|i| i as f32 / frames as f32).collect();
        let right = (0..frames).map(|i| -(i as f32) / frames as f32).collect();
        AudioBuffer::new(vec![left, right], 1000)
    }

    #[test]
    fn splits_into_fixed_segments() {
        let seg = FixedSegmenter::new(100);
        let out = seg.segment_audio(&stereo(250), true).unwrap();

        assert_eq!(out.table.len(), 3);
        assert_eq!(out.segments.len(), 3);
        assert_eq!(out.table[0].size, 100 * 2 * 4);
        assert_eq!(out.table[1].offset, 800);
        assert_eq!(out.table[2].size, 50 * 2 * 4);
        assert_eq!(out.table[2].timestamp, 0.2);
        assert!(out.table.iter().all(|s| s.compressed));
        for (i, s) in out.table.iter().enumerate() {
            assert_eq!(s.index as usize, i);
            assert_eq!(s.size as usize, out.segments[i].len());
        }
    }

    #[test]
    fn reconstruct_matches_input() {
        let seg = FixedSegmenter::new(64);
        let buffer = stereo(200);
        let out = seg.segment_audio(&buffer, false).unwrap();

        let floats: Vec<Vec<f32>> = out
            .segments
            .iter()
            .map(|bytes| {
                bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect();

        let rebuilt = seg.reconstruct_audio(&floats, 1000, 2).unwrap();
        assert_eq!(rebuilt, buffer);
    }

    #[test]
    fn rejects_empty_buffer() {
        let seg = FixedSegmenter::default();
        let err = seg
            .segment_audio(&AudioBuffer::mono(Vec::new(), 44100), false)
            .unwrap_err();
        assert!(matches!(err, SegmenterError::EmptyBuffer));
    }

    #[test]
    fn rejects_ragged_channels() {
        let seg = FixedSegmenter::default();
        let buffer = AudioBuffer::new(vec![vec![0.0; 10], vec![0.0; 9]], 44100);
        assert!(matches!(
            seg.segment_audio(&buffer, false),
            Err(SegmenterError::ChannelMismatch { channel: 1, .. })
        ));
    }

    #[test]
    fn rejects_misaligned_reconstruction() {
        let seg = FixedSegmenter::default();
        let err = seg.reconstruct_audio(&[vec![0.0; 3]], 44100, 2).unwrap_err();
        assert!(matches!(err, SegmenterError::MisalignedSegment { samples: 3, .. }));
    }
}
