/// Planar f32 PCM resident in memory.
///
/// Every channel holds the same number of frames. Samples are nominally in
/// [-1.0, 1.0] but nothing here enforces it.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel (the length of channel 0).
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Channel 0, or an empty slice for a channel-less buffer.
    pub fn first_channel(&self) -> &[f32] {
        self.channels.first().map_or(&[], Vec::as_slice)
    }

    /// Frame-interleaved copy of the samples (`L R L R ...`).
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channel_count());
        for i in 0..frames {
            for ch in &self.channels {
                out.push(ch.get(i).copied().unwrap_or(0.0));
            }
        }
        out
    }

    /// Inverse of [`AudioBuffer::interleaved`]. Trailing samples that do not
    /// form a whole frame are dropped.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels;
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (ch, &s) in planar.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::new(planar, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_frames() {
        let buf = AudioBuffer::new(vec![vec![0.0; 22050], vec![0.0; 22050]], 44100);
        assert_eq!(buf.frames(), 22050);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.duration(), 0.5);
    }

    #[test]
    fn interleave_round_trip() {
        let buf = AudioBuffer::new(vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]], 8000);
        let inter = buf.interleaved();
        assert_eq!(inter, vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
        assert_eq!(AudioBuffer::from_interleaved(&inter, 2, 8000), buf);
    }

    #[test]
    fn empty_buffer() {
        let buf = AudioBuffer::new(Vec::new(), 44100);
        assert_eq!(buf.frames(), 0);
        assert!(buf.first_channel().is_empty());
        assert_eq!(buf.duration(), 0.0);
    }
}
