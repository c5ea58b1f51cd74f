use rayon::prelude::*;

use super::frame::FractalBeatmap;
use super::spectrum::{band_energies, SpectrumAnalyzer};
use crate::audio::buffer::AudioBuffer;
use crate::config::AnalysisConfig;

/// Turns PCM into a constant-rate series of band energies and beat values.
///
/// Only channel 0 is analysed. Windows of `fft_size` samples (or the whole
/// channel when it is shorter) start every `interval_ms`; a window is only
/// analysed when it fits entirely inside the channel.
#[derive(Clone, Debug, Default)]
pub struct BeatmapGenerator {
    config: AnalysisConfig,
}

impl BeatmapGenerator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Stride between windows, in samples.
    pub fn interval_samples(&self, sample_rate: u32) -> usize {
        let interval = (self.config.interval_ms as f64 / 1000.0 * sample_rate as f64).round();
        (interval as usize).max(1)
    }

    pub fn generate(&self, buffer: &AudioBuffer) -> Vec<FractalBeatmap> {
        self.generate_from_samples(buffer.first_channel(), buffer.sample_rate)
    }

    pub fn generate_from_samples(&self, samples: &[f32], sample_rate: u32) -> Vec<FractalBeatmap> {
        let window = self.config.fft_size.min(samples.len());
        if window == 0 || sample_rate == 0 {
            return Vec::new();
        }

        let interval = self.interval_samples(sample_rate);
        let offsets: Vec<usize> = (0..=samples.len() - window).step_by(interval).collect();

        log::info!(
            "Beatmap: {} windows of {} samples every {} samples ({:?})",
            offsets.len(),
            window,
            interval,
            self.config.spectrum
        );

        let analyzer = SpectrumAnalyzer::new(self.config.spectrum, window);
        let analyze = |&offset: &usize| -> FractalBeatmap {
            let magnitudes = analyzer.magnitudes(&samples[offset..offset + window]);
            let energies = band_energies(&magnitudes, sample_rate);
            let timestamp = (offset as f64 / sample_rate as f64) as f32;
            FractalBeatmap::from_energies(timestamp, &energies)
        };

        if self.config.parallel {
            offsets.par_iter().map(analyze).collect()
        } else {
            offsets.iter().map(analyze).collect()
        }
    }
}
