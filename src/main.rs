mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use cli::{BenchArgs, Cli, Command, EncodeArgs};
use fractal1::audio::{decode::decode_audio, wav::write_wav};
use fractal1::benchmark::{parse_baseline, run_benchmark_suite};
use fractal1::codec::{parse_container, Fractal1Codec, FractalMetadata, NftMetadata};
use fractal1::config::{self, Config};
use fractal1::verify::verify_deterministic;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Explicit --config path, or auto-detect fractal1.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("fractal1.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("fractal1").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("fractal1").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });

    let mut cfg = Config::default();
    if let Some(ref path) = config_path {
        if let Some(loaded) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            cfg = loaded;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // Flags win over config values
    if let Some(fft_size) = cli.analysis.fft_size {
        cfg.analysis.fft_size = fft_size;
    }
    if let Some(interval_ms) = cli.analysis.interval_ms {
        cfg.analysis.interval_ms = interval_ms;
    }
    if let Some(spectrum) = cli.analysis.spectrum {
        cfg.analysis.spectrum = spectrum;
    }
    if cli.analysis.parallel {
        cfg.analysis.parallel = true;
    }

    match cli.command {
        Command::Encode(args) => {
            if let Some(frames) = args.segment_frames {
                cfg.encode.segment_frames = frames;
            }
            run_encode(&cfg, &args)
        }
        Command::Decode {
            input,
            output,
            beatmap,
        } => run_decode(&cfg, &input, output, beatmap.as_deref()),
        Command::Inspect { input } => run_inspect(&input),
        Command::Verify { input } => run_verify(&cfg, &input),
        Command::Bench(args) => run_bench(&cfg, &args),
    }
}

fn run_encode(cfg: &Config, args: &EncodeArgs) -> Result<()> {
    let codec = Fractal1Codec::new(cfg);
    let multiple = args.inputs.len() > 1;

    if multiple {
        if let Some(ref dir) = args.output {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        }
    }

    let pb = ProgressBar::new(args.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}")?
            .progress_chars("=>-"),
    );

    for input in &args.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
        pb.set_message(input.display().to_string());

        log::info!("Decoding audio: {}", input.display());
        let buffer = decode_audio(input)?;

        let metadata = FractalMetadata {
            title: args.title.clone().or_else(|| file_stem(input)),
            artist: args.artist.clone(),
            album: args.album.clone(),
            nft_metadata: args.owner.as_ref().map(|owner| NftMetadata {
                owner: owner.clone(),
                royalty_percentage: args.royalty.unwrap_or(0),
                provenance: Vec::new(),
            }),
            ..FractalMetadata::default()
        };

        let bytes = codec
            .encode(&buffer, &metadata)
            .with_context(|| format!("Failed to encode {}", input.display()))?;

        let output = match (&args.output, multiple) {
            (Some(dir), true) => dir.join(input.with_extension("fract1").file_name().unwrap_or_default()),
            (Some(path), false) => path.clone(),
            (None, _) => input.with_extension("fract1"),
        };
        std::fs::write(&output, &bytes)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        log::info!(
            "Wrote {} ({} bytes, {:.1}s, {} ch @ {} Hz)",
            output.display(),
            bytes.len(),
            buffer.duration(),
            buffer.channel_count(),
            buffer.sample_rate
        );
        pb.inc(1);
    }

    pb.finish_with_message("Encoding complete");
    Ok(())
}

fn run_decode(
    cfg: &Config,
    input: &Path,
    output: Option<PathBuf>,
    beatmap_path: Option<&Path>,
) -> Result<()> {
    let data = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let decoded = Fractal1Codec::new(cfg)
        .decode(&data)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    let output = output.unwrap_or_else(|| input.with_extension("wav"));
    write_wav(&output, &decoded.audio)?;
    log::info!(
        "Wrote {} ({} frames, {} ch @ {} Hz)",
        output.display(),
        decoded.audio.frames(),
        decoded.audio.channel_count(),
        decoded.audio.sample_rate
    );

    if let Some(path) = beatmap_path {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &decoded.beatmap)
            .with_context(|| format!("Failed to write beatmap to {}", path.display()))?;
        log::info!("Wrote {} beatmap records to {}", decoded.beatmap.len(), path.display());
    }

    Ok(())
}

fn run_inspect(input: &Path) -> Result<()> {
    let data = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let parsed = parse_container(&data)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    println!("{}", serde_json::to_string_pretty(&parsed.header)?);

    println!();
    println!("Segments: {} ({} audio bytes)", parsed.segments.len(), parsed.audio_data.len());
    for seg in &parsed.segments {
        println!(
            "  [{:4}] offset {:>10}  size {:>9}  t={:>8.3}s{}",
            seg.index,
            seg.offset,
            seg.size,
            seg.timestamp,
            if seg.compressed { "  compressed" } else { "" }
        );
    }

    println!();
    println!("Beatmap: {} records", parsed.beatmap.len());
    if let (Some(first), Some(last)) = (parsed.beatmap.first(), parsed.beatmap.last()) {
        let beats = parsed.beatmap.iter().filter(|b| b.beat == u8::MAX).count();
        let (bass, mid, high) = parsed.beatmap.iter().fold((0, 0, 0), |(b, m, h), f| {
            (b.max(f.bass), m.max(f.mid), h.max(f.high))
        });
        println!("  span:  {:.3}s - {:.3}s", first.timestamp, last.timestamp);
        println!("  beats: {}", beats);
        println!("  peak:  bass {}  mid {}  high {}", bass, mid, high);
    }
    Ok(())
}

fn run_verify(cfg: &Config, input: &Path) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let buffer = decode_audio(input)?;
    let metadata = FractalMetadata {
        title: file_stem(input),
        ..FractalMetadata::default()
    };

    let report = verify_deterministic(&Fractal1Codec::new(cfg), &buffer, &metadata)
        .with_context(|| format!("Codec failed on {}", input.display()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.valid {
        anyhow::bail!("Verification failed with {} errors", report.errors.len());
    }
    Ok(())
}

fn run_bench(cfg: &Config, args: &BenchArgs) -> Result<()> {
    let baseline = match args.baseline {
        Some(ref path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read baseline {}", path.display()))?;
            let base = parse_baseline(&json)
                .with_context(|| format!("Failed to parse baseline {}", path.display()))?;
            log::info!("Comparing against baseline {}", path.display());
            Some(base)
        }
        None => None,
    };

    let mut buffers = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
        buffers.push(decode_audio(input)?);
    }

    let outcome = run_benchmark_suite(
        &Fractal1Codec::new(cfg),
        &buffers,
        &FractalMetadata::default(),
        baseline,
    )
    .context("Codec failed during benchmark")?;

    let json = serde_json::to_string_pretty(&outcome.report)?;
    println!("{}", json);
    if let Some(ref path) = args.output {
        std::fs::write(path, &json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }
    if let Some(ref cmp) = outcome.report.comparison {
        for detail in &cmp.details {
            log::warn!("{}", detail);
        }
    }

    if !outcome.passed {
        if args.fail_on_regression {
            anyhow::bail!("Benchmark suite did not pass");
        }
        log::warn!("Benchmark suite did not pass");
    }
    Ok(())
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}
