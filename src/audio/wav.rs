use anyhow::{Context, Result};
use std::path::Path;

use super::buffer::AudioBuffer;

/// Write the buffer as an interleaved 32-bit float WAV file.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channel_count().max(1) as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
    for sample in buffer.interleaved() {
        writer.write_sample(sample).context("Failed to write WAV sample")?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;

    log::info!(
        "Wrote {} frames x {} channels to {}",
        buffer.frames(),
        buffer.channel_count(),
        path.display()
    );
    Ok(())
}
