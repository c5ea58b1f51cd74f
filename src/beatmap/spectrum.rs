use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::frame::BandEnergies;
use crate::config::SpectrumMethod;

/// Inclusive frequency ranges in Hz.
pub const BASS_RANGE: (f32, f32) = (20.0, 250.0);
pub const MID_RANGE: (f32, f32) = (250.0, 4000.0);
pub const HIGH_RANGE: (f32, f32) = (4000.0, 20000.0);

/// Magnitude spectrum for windows of one fixed length.
///
/// Both methods return all `N` bins scaled by `1/N`, so the band energies they
/// produce agree up to rounding.
pub struct SpectrumAnalyzer {
    len: usize,
    kind: Kind,
}

enum Kind {
    Dft { cos: Vec<f64>, sin: Vec<f64> },
    Fft(Arc<dyn Fft<f32>>),
}

impl SpectrumAnalyzer {
    pub fn new(method: SpectrumMethod, len: usize) -> Self {
        let kind = match method {
            SpectrumMethod::Dft => {
                let step = 2.0 * std::f64::consts::PI / len.max(1) as f64;
                Kind::Dft {
                    cos: (0..len).map(|m| (step * m as f64).cos()).collect(),
                    sin: (0..len).map(|m| (step * m as f64).sin()).collect(),
                }
            }
            SpectrumMethod::Fft => {
                let mut planner = FftPlanner::<f32>::new();
                Kind::Fft(planner.plan_fft_forward(len))
            }
        };
        Self { len, kind }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `|X_k| / N` for `k in 0..N`. `window` must be exactly `len()` samples.
    pub fn magnitudes(&self, window: &[f32]) -> Vec<f32> {
        debug_assert_eq!(window.len(), self.len);
        let n = self.len;
        if n == 0 {
            return Vec::new();
        }

        match &self.kind {
            Kind::Dft { cos, sin } => (0..n)
                .map(|k| {
                    let mut real = 0.0f64;
                    let mut imag = 0.0f64;
                    for (i, &x) in window.iter().enumerate() {
                        let m = (k * i) % n;
                        real += x as f64 * cos[m];
                        imag -= x as f64 * sin[m];
                    }
                    ((real * real + imag * imag).sqrt() / n as f64) as f32
                })
                .collect(),
            Kind::Fft(fft) => {
                let mut buffer: Vec<Complex<f32>> =
                    window.iter().map(|&s| Complex::new(s, 0.0)).collect();
                fft.process(&mut buffer);
                buffer.iter().map(|c| c.norm() / n as f32).collect()
            }
        }
    }
}

/// Frequency assigned to bin `k` of an `n`-bin spectrum: `k * sr / (2n)`.
pub fn bin_frequency(k: usize, sample_rate: u32, n: usize) -> f32 {
    (k as f64 * sample_rate as f64 / (2.0 * n as f64)) as f32
}

/// Mean magnitude of the bins whose frequency falls in `range`, or 0 when no
/// bin does.
pub fn band_energy(magnitudes: &[f32], sample_rate: u32, range: (f32, f32)) -> f32 {
    let n = magnitudes.len();
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (k, &mag) in magnitudes.iter().enumerate() {
        let freq = bin_frequency(k, sample_rate, n);
        if freq >= range.0 && freq <= range.1 {
            sum += mag as f64;
            count += 1;
        }
    }
    if count > 0 {
        (sum / count as f64) as f32
    } else {
        0.0
    }
}

pub fn band_energies(magnitudes: &[f32], sample_rate: u32) -> BandEnergies {
    BandEnergies {
        bass: band_energy(magnitudes, sample_rate, BASS_RANGE),
        mid: band_energy(magnitudes, sample_rate, MID_RANGE),
        high: band_energy(magnitudes, sample_rate, HIGH_RANGE),
    }
}
