use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use fractal1::config::SpectrumMethod;

#[derive(Parser, Debug)]
#[command(name = "fractal1", about = "Fractal-1 audio container encoder, decoder and verifier")]
pub struct Cli {
    /// Config file (defaults to ./fractal1.toml or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode audio files (WAV, MP3, FLAC, OGG) into .fract1 containers
    Encode(EncodeArgs),

    /// Decode a container to a 32-bit float WAV
    Decode {
        /// Input .fract1 container
        input: PathBuf,

        /// Output WAV file (defaults to the input name with .wav)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the beatmap as JSON
        #[arg(long)]
        beatmap: Option<PathBuf>,
    },

    /// Print header, segment table and beatmap summary
    Inspect {
        /// Input .fract1 container
        input: PathBuf,
    },

    /// Encode an audio file twice and check the results agree
    Verify {
        /// Input audio file
        input: PathBuf,
    },

    /// Time encode and decode over one or more audio files
    Bench(BenchArgs),
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Input audio files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Earlier report or result JSON to compare against
    #[arg(long)]
    pub baseline: Option<PathBuf>,

    /// Write the report JSON here as well as to stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Exit non-zero when the suite does not pass
    #[arg(long)]
    pub fail_on_regression: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Input audio files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file, or directory when several inputs are given
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Track title (defaults to the file stem)
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub artist: Option<String>,

    #[arg(long)]
    pub album: Option<String>,

    /// NFT owner address
    #[arg(long)]
    pub owner: Option<String>,

    /// Royalty percentage (0-100), requires --owner
    #[arg(long, requires = "owner")]
    pub royalty: Option<u8>,

    /// Frames per audio segment
    #[arg(long)]
    pub segment_frames: Option<usize>,
}

/// Overrides for the `[analysis]` config table.
#[derive(Args, Debug)]
pub struct AnalysisArgs {
    /// Analysis window size in samples
    #[arg(long, global = true)]
    pub fft_size: Option<usize>,

    /// Milliseconds between beatmap records
    #[arg(long, global = true)]
    pub interval_ms: Option<u32>,

    /// Spectrum method: fft or dft
    #[arg(long, global = true, value_parser = parse_spectrum)]
    pub spectrum: Option<SpectrumMethod>,

    /// Analyse windows in parallel
    #[arg(long, global = true)]
    pub parallel: bool,
}

fn parse_spectrum(s: &str) -> Result<SpectrumMethod, String> {
    match s.to_ascii_lowercase().as_str() {
        "fft" => Ok(SpectrumMethod::Fft),
        "dft" => Ok(SpectrumMethod::Dft),
        other => Err(format!("unknown spectrum method '{}', expected fft or dft", other)),
    }
}
