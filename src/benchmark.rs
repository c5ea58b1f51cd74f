//! Codec timing and regression tracking.
//!
//! A run times one encode and one decode, then judges the result twice: against
//! fixed absolute floors, and optionally against a stored baseline run with
//! relative tolerances.

use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::audio::buffer::AudioBuffer;
use crate::audio::segment::Segmenter;
use crate::codec::{Fractal1Codec, FractalMetadata};
use crate::error::Result;

pub const BASELINE_ENCODING_MS: f64 = 1000.0;
pub const BASELINE_DECODING_MS: f64 = 500.0;
pub const MIN_COMPRESSION_RATIO: f64 = 1.0;
pub const MIN_THROUGHPUT_MBPS: f64 = 10.0;

/// Allowed overshoot of the absolute time baselines.
const BASELINE_SLACK: f64 = 1.5;
/// Relative tolerances against a stored run.
const TIME_TOLERANCE: f64 = 1.2;
const THROUGHPUT_TOLERANCE: f64 = 0.8;
const RATIO_TOLERANCE: f64 = 0.9;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub encoding_ms: f64,
    pub decoding_ms: f64,
    /// Raw PCM megabytes (2^20) encoded per second.
    pub throughput_mbps: f64,
    pub compression_ratio: f64,
    pub passed: bool,
    pub regression: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub regression: bool,
    pub details: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    /// Unix milliseconds.
    pub timestamp: u64,
    pub version: String,
    pub results: BenchmarkResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BenchmarkResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<BaselineComparison>,
}

#[derive(Clone, Debug)]
pub struct SuiteOutcome {
    pub passed: bool,
    pub results: Vec<BenchmarkResult>,
    pub report: BenchmarkReport,
}

impl BenchmarkResult {
    /// Derive throughput, ratio and the absolute regression verdict from raw
    /// timings and sizes.
    pub fn from_measurements(
        encoding_ms: f64,
        decoding_ms: f64,
        raw_bytes: usize,
        container_bytes: usize,
    ) -> Self {
        let raw_mb = raw_bytes as f64 / (1024.0 * 1024.0);
        // Sub-microsecond encodes would otherwise divide by zero.
        let throughput_mbps = raw_mb / (encoding_ms.max(1e-3) / 1000.0);
        let compression_ratio = if container_bytes == 0 {
            0.0
        } else {
            raw_bytes as f64 / container_bytes as f64
        };

        let regression = encoding_ms > BASELINE_ENCODING_MS * BASELINE_SLACK
            || decoding_ms > BASELINE_DECODING_MS * BASELINE_SLACK
            || compression_ratio < MIN_COMPRESSION_RATIO
            || throughput_mbps < MIN_THROUGHPUT_MBPS;

        Self {
            encoding_ms,
            decoding_ms,
            throughput_mbps,
            compression_ratio,
            passed: !regression,
            regression,
        }
    }
}

/// Time one encode and one decode of `buffer`.
pub fn benchmark<S: Segmenter>(
    codec: &Fractal1Codec<S>,
    buffer: &AudioBuffer,
    metadata: &FractalMetadata,
) -> Result<BenchmarkResult> {
    let start = Instant::now();
    let encoded = codec.encode(buffer, metadata)?;
    let encoding_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    codec.decode(&encoded)?;
    let decoding_ms = start.elapsed().as_secs_f64() * 1000.0;

    let raw_bytes = buffer.frames() * buffer.channel_count() * 4;
    let result =
        BenchmarkResult::from_measurements(encoding_ms, decoding_ms, raw_bytes, encoded.len());

    log::info!(
        "Benchmark: encode {:.2}ms, decode {:.2}ms, {:.2} MB/s, ratio {:.3}",
        result.encoding_ms,
        result.decoding_ms,
        result.throughput_mbps,
        result.compression_ratio
    );
    Ok(result)
}

/// Flag every metric that got worse than `baseline` by more than its
/// tolerance: 20% for times and throughput, 10% for compression ratio.
pub fn compare_with_baseline(
    current: &BenchmarkResult,
    baseline: &BenchmarkResult,
) -> BaselineComparison {
    let mut details = Vec::new();

    if current.encoding_ms > baseline.encoding_ms * TIME_TOLERANCE {
        details.push(format!(
            "Encoding time regression: {:.2}ms > {:.2}ms (20% threshold)",
            current.encoding_ms, baseline.encoding_ms
        ));
    }
    if current.decoding_ms > baseline.decoding_ms * TIME_TOLERANCE {
        details.push(format!(
            "Decoding time regression: {:.2}ms > {:.2}ms (20% threshold)",
            current.decoding_ms, baseline.decoding_ms
        ));
    }
    if current.compression_ratio < baseline.compression_ratio * RATIO_TOLERANCE {
        details.push(format!(
            "Compression ratio regression: {:.2} < {:.2} (10% threshold)",
            current.compression_ratio, baseline.compression_ratio
        ));
    }
    if current.throughput_mbps < baseline.throughput_mbps * THROUGHPUT_TOLERANCE {
        details.push(format!(
            "Throughput regression: {:.2} MB/s < {:.2} MB/s (20% threshold)",
            current.throughput_mbps, baseline.throughput_mbps
        ));
    }

    BaselineComparison {
        regression: !details.is_empty(),
        details,
    }
}

pub fn generate_report(result: BenchmarkResult, baseline: Option<BenchmarkResult>) -> BenchmarkReport {
    let comparison = baseline
        .as_ref()
        .map(|base| compare_with_baseline(&result, base));
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64);

    BenchmarkReport {
        timestamp,
        version: env!("CARGO_PKG_VERSION").to_string(),
        results: result,
        baseline,
        comparison,
    }
}

/// Benchmark every buffer and report the mean. The suite passes only when no
/// run regressed and the mean does not regress against `baseline`. An empty
/// suite never passes.
pub fn run_benchmark_suite<S: Segmenter>(
    codec: &Fractal1Codec<S>,
    buffers: &[AudioBuffer],
    metadata: &FractalMetadata,
    baseline: Option<BenchmarkResult>,
) -> Result<SuiteOutcome> {
    let results = buffers
        .iter()
        .map(|buffer| benchmark(codec, buffer, metadata))
        .collect::<Result<Vec<_>>>()?;

    let mean = average(&results);
    let report = generate_report(mean, baseline);
    let passed = !results.is_empty()
        && report.results.passed
        && !report.results.regression
        && !report.comparison.as_ref().is_some_and(|c| c.regression);

    Ok(SuiteOutcome {
        passed,
        results,
        report,
    })
}

/// Mean of the numeric fields; `passed` only if all passed, `regression` if
/// any regressed.
pub fn average(results: &[BenchmarkResult]) -> BenchmarkResult {
    let n = results.len().max(1) as f64;
    let mean = |f: fn(&BenchmarkResult) -> f64| results.iter().map(f).sum::<f64>() / n;
    BenchmarkResult {
        encoding_ms: mean(|r| r.encoding_ms),
        decoding_ms: mean(|r| r.decoding_ms),
        throughput_mbps: mean(|r| r.throughput_mbps),
        compression_ratio: mean(|r| r.compression_ratio),
        passed: !results.is_empty() && results.iter().all(|r| r.passed),
        regression: results.iter().any(|r| r.regression),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBaseline {
    Report(BenchmarkReport),
    Result(BenchmarkResult),
}

/// Read a baseline from JSON holding either a full report or a bare result.
pub fn parse_baseline(json: &str) -> serde_json::Result<BenchmarkResult> {
    Ok(match serde_json::from_str(json)? {
        StoredBaseline::Report(report) => report.results,
        StoredBaseline::Result(result) => result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EncodeConfig};

    fn result(encoding_ms: f64, decoding_ms: f64, throughput: f64, ratio: f64) -> BenchmarkResult {
        BenchmarkResult {
            encoding_ms,
            decoding_ms,
            throughput_mbps: throughput,
            compression_ratio: ratio,
            passed: true,
            regression: false,
        }
    }

    #[test]
    fn measurements_derive_throughput_and_ratio() {
        // 2 MiB raw in 100ms into a 1 MiB container.
        let r = BenchmarkResult::from_measurements(100.0, 50.0, 2 * 1024 * 1024, 1024 * 1024);
        assert!((r.throughput_mbps - 20.0).abs() < 1e-9);
        assert_eq!(r.compression_ratio, 2.0);
        assert!(r.passed);
        assert!(!r.regression);
    }

    #[test]
    fn absolute_floors_flag_regressions() {
        let mib = 1024 * 1024;
        assert!(BenchmarkResult::from_measurements(1501.0, 10.0, 100 * mib, mib).regression);
        assert!(!BenchmarkResult::from_measurements(1500.0, 10.0, 100 * mib, mib).regression);
        assert!(BenchmarkResult::from_measurements(10.0, 751.0, 100 * mib, mib).regression);
        // Container larger than the raw audio.
        assert!(BenchmarkResult::from_measurements(10.0, 10.0, mib, mib + 1).regression);
        // 1 MiB in 200ms is 5 MB/s.
        assert!(BenchmarkResult::from_measurements(200.0, 10.0, mib, mib / 2).regression);
    }

    #[test]
    fn zero_time_encode_stays_finite() {
        let r = BenchmarkResult::from_measurements(0.0, 0.0, 4096, 1024);
        assert!(r.throughput_mbps.is_finite());
        assert_eq!(BenchmarkResult::from_measurements(1.0, 1.0, 0, 0).compression_ratio, 0.0);
    }

    #[test]
    fn baseline_thresholds() {
        let base = result(100.0, 50.0, 40.0, 2.0);

        let within = result(119.0, 59.0, 33.0, 1.85);
        let cmp = compare_with_baseline(&within, &base);
        assert!(!cmp.regression);
        assert!(cmp.details.is_empty());

        let worse = result(121.0, 61.0, 31.9, 1.79);
        let cmp = compare_with_baseline(&worse, &base);
        assert!(cmp.regression);
        assert_eq!(cmp.details.len(), 4);
        assert!(cmp.details[0].starts_with("Encoding time regression"));
        assert!(cmp.details[1].starts_with("Decoding time regression"));
        assert!(cmp.details[2].starts_with("Compression ratio regression"));
        assert!(cmp.details[3].starts_with("Throughput regression"));
    }

    #[test]
    fn improvements_are_not_regressions() {
        let base = result(100.0, 50.0, 40.0, 2.0);
        let better = result(10.0, 5.0, 400.0, 20.0);
        assert_eq!(compare_with_baseline(&better, &base), BaselineComparison::default());
    }

    #[test]
    fn average_combines_verdicts() {
        let mut slow = result(300.0, 30.0, 10.0, 1.0);
        slow.passed = false;
        slow.regression = true;
        let avg = average(&[result(100.0, 10.0, 30.0, 3.0), slow]);
        assert_eq!(avg.encoding_ms, 200.0);
        assert_eq!(avg.decoding_ms, 20.0);
        assert_eq!(avg.throughput_mbps, 20.0);
        assert_eq!(avg.compression_ratio, 2.0);
        assert!(!avg.passed);
        assert!(avg.regression);

        let empty = average(&[]);
        assert!(!empty.passed);
        assert_eq!(empty.encoding_ms, 0.0);
    }

    #[test]
    fn report_carries_comparison() {
        let report = generate_report(result(200.0, 50.0, 40.0, 2.0), Some(result(100.0, 50.0, 40.0, 2.0)));
        let cmp = report.comparison.unwrap();
        assert!(cmp.regression);
        assert_eq!(cmp.details.len(), 1);
        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));

        assert!(generate_report(result(1.0, 1.0, 1.0, 1.0), None).comparison.is_none());
    }

    #[test]
    fn baseline_parses_from_report_or_result() {
        let base = result(100.0, 50.0, 40.0, 2.0);
        let report_json = serde_json::to_string(&generate_report(base.clone(), None)).unwrap();
        assert_eq!(parse_baseline(&report_json).unwrap(), base);

        let result_json = serde_json::to_string(&base).unwrap();
        assert!(result_json.contains("\"encodingMs\""));
        assert_eq!(parse_baseline(&result_json).unwrap(), base);

        assert!(parse_baseline("{\"nope\": 1}").is_err());
    }

    #[test]
    fn suite_runs_every_buffer() {
        let codec = Fractal1Codec::new(&Config {
            encode: EncodeConfig {
                segment_frames: 2000,
                compress_segments: true,
            },
            ..Config::default()
        });
        let buffers = vec![
            AudioBuffer::mono(vec![0.25; 4000], 8000),
            AudioBuffer::new(vec![vec![0.1; 3000], vec![-0.1; 3000]], 8000),
        ];
        let outcome =
            run_benchmark_suite(&codec, &buffers, &FractalMetadata::default(), None).unwrap();

        assert_eq!(outcome.results.len(), 2);
        for r in &outcome.results {
            // Raw PCM plus header can never be smaller than raw PCM.
            assert!(r.compression_ratio < 1.0);
            assert!(r.regression);
        }
        assert!(!outcome.passed);
        assert!(outcome.report.comparison.is_none());
    }

    #[test]
    fn empty_suite_fails() {
        let outcome = run_benchmark_suite(
            &Fractal1Codec::default(),
            &[],
            &FractalMetadata::default(),
            None,
        )
        .unwrap();
        assert!(!outcome.passed);
        assert!(outcome.results.is_empty());
    }
}
