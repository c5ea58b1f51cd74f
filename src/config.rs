use serde::Deserialize;
use std::path::Path;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub encode: EncodeConfig,
}

/// How magnitude spectra are computed for the beatmap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumMethod {
    /// Direct O(n²) transform, the reference definition.
    Dft,
    #[default]
    Fft,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u32,
    #[serde(default)]
    pub spectrum: SpectrumMethod,
    /// Analyse windows on the rayon pool. Output is identical either way.
    #[serde(default)]
    pub parallel: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EncodeConfig {
    #[serde(default = "default_segment_frames")]
    pub segment_frames: usize,
    #[serde(default = "default_compress_segments")]
    pub compress_segments: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            interval_ms: default_interval_ms(),
            spectrum: SpectrumMethod::default(),
            parallel: false,
        }
    }
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            segment_frames: default_segment_frames(),
            compress_segments: default_compress_segments(),
        }
    }
}

fn default_fft_size() -> usize { 2048 }
fn default_interval_ms() -> u32 { 50 }
fn default_segment_frames() -> usize { crate::audio::segment::DEFAULT_SEGMENT_FRAMES }
fn default_compress_segments() -> bool { true }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Ignoring config {}: {}", path.display(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.analysis.fft_size, 2048);
        assert_eq!(cfg.analysis.interval_ms, 50);
        assert_eq!(cfg.analysis.spectrum, SpectrumMethod::Fft);
        assert!(!cfg.analysis.parallel);
        assert_eq!(cfg.encode.segment_frames, 16384);
        assert!(cfg.encode.compress_segments);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [analysis]
            spectrum = "dft"
            parallel = true

            [encode]
            segment_frames = 4096
            "#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.spectrum, SpectrumMethod::Dft);
        assert!(cfg.analysis.parallel);
        assert_eq!(cfg.analysis.fft_size, 2048);
        assert_eq!(cfg.encode.segment_frames, 4096);
        assert!(cfg.encode.compress_segments);
    }

    #[test]
    fn empty_toml_is_default() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.analysis.interval_ms, 50);
        assert_eq!(cfg.encode.segment_frames, 16384);
    }

    #[test]
    fn unreadable_config_is_none() {
        assert!(load_config(Path::new("/nonexistent/fractal1.toml")).is_none());
    }
}
