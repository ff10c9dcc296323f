//! VoxSplit command line
//!
//! Usage:
//!   voxsplit separate duet.mp3 -o voices/        - Split into low/high voice files
//!   voxsplit separate a.wav b.wav --policy frame  - Per-frame threshold, batch
//!   voxsplit analyze duet.mp3                     - Suggest pitch targets
//!   voxsplit config > voxsplit.json               - Print the default configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use vx_offline::{
    BatchProcessor, JobStatus, MaskPolicy, OutputFormat, SeparationConfig, SeparationJob,
    SeparationPipeline,
};
use vx_pitch::freq_to_note_name;

#[derive(Parser)]
#[command(name = "voxsplit", version, about = "Pitch-based voice separation")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Separate recordings into per-voice files
    Separate {
        /// Input audio files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to each input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// JSON configuration file; flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Voice assignment policy
        #[arg(short, long, value_enum)]
        policy: Option<PolicyArg>,

        /// Low/high split frequency (Hz) for the segment and frame policies
        #[arg(long)]
        split_hz: Option<f64>,

        /// Target pitch (Hz) for the target policy
        #[arg(long)]
        target_hz: Option<f64>,

        /// Band half-width (Hz) for the target and peaks policies
        #[arg(long)]
        tolerance_hz: Option<f64>,

        /// Mask smoothing window in frames (odd)
        #[arg(short, long)]
        window: Option<usize>,

        /// Analysis frame length (samples)
        #[arg(long)]
        frame_length: Option<usize>,

        /// Analysis hop length (samples)
        #[arg(long)]
        hop_length: Option<usize>,

        /// Silence threshold below the loudest frame (dB)
        #[arg(long)]
        top_db: Option<f64>,

        /// Resample decoded audio to this rate (Hz)
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// MP3 constant bitrate (kbps)
        #[arg(long, conflicts_with = "vbr")]
        bitrate: Option<u32>,

        /// MP3 VBR quality (0 best, 9 worst)
        #[arg(long)]
        vbr: Option<u8>,

        /// Parent directory for temporary files
        #[arg(long)]
        scratch_dir: Option<PathBuf>,

        /// Files processed in parallel
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Report the dominant pitches of a recording
    Analyze {
        /// Input audio file
        input: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum number of peaks (overrides the configuration)
        #[arg(long)]
        peaks: Option<usize>,

        /// Minimum distance between peaks in histogram bins
        #[arg(long)]
        min_separation: Option<usize>,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the default configuration as JSON
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Whole segments split at a threshold
    Segment,
    /// Individual frames split at a threshold
    Frame,
    /// One voice around a target pitch
    Target,
    /// One voice per detected pitch peak
    Peaks,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Wav,
    Mp3,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Separate {
            inputs,
            output_dir,
            config,
            policy,
            split_hz,
            target_hz,
            tolerance_hz,
            window,
            frame_length,
            hop_length,
            top_db,
            sample_rate,
            format,
            bitrate,
            vbr,
            scratch_dir,
            jobs,
        } => {
            let mut config = load_config(config.as_deref())?;

            if let Some(policy) = policy {
                config.policy = build_policy(policy, split_hz, target_hz, tolerance_hz)?;
            } else {
                override_policy(&mut config.policy, split_hz, target_hz, tolerance_hz);
            }
            if let Some(window) = window {
                config.smoothing.window = window;
            }
            if let Some(frame_length) = frame_length {
                config.analysis.frame_length = frame_length;
            }
            if let Some(hop_length) = hop_length {
                config.analysis.hop_length = hop_length;
            }
            if let Some(top_db) = top_db {
                config.segmentation.top_db = top_db;
            }
            if sample_rate.is_some() {
                config.target_sample_rate = sample_rate;
            }
            if let Some(format) = format {
                config.output = build_format(format, bitrate, vbr);
            } else if bitrate.is_some() || vbr.is_some() {
                config.output = build_format(FormatArg::Mp3, bitrate, vbr);
            }
            if scratch_dir.is_some() {
                config.scratch_dir = scratch_dir;
            }

            separate(config, &inputs, output_dir.as_deref(), jobs)
        }
        Commands::Analyze {
            input,
            config,
            peaks,
            min_separation,
            json,
        } => {
            let config = analysis_config(load_config(config.as_deref())?, peaks, min_separation);
            analyze(config, &input, json)
        }
        Commands::Config => {
            let json = SeparationConfig::default()
                .to_json()
                .context("Failed to serialize configuration")?;
            println!("{}", json);
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SeparationConfig> {
    match path {
        Some(path) => SeparationConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SeparationConfig::default()),
    }
}

/// Apply peak picking flags on top of a loaded configuration
fn analysis_config(
    mut config: SeparationConfig,
    peaks: Option<usize>,
    min_separation: Option<usize>,
) -> SeparationConfig {
    if let Some(peaks) = peaks {
        config = config.with_max_peaks(peaks);
    }
    if let Some(bins) = min_separation {
        config.distribution = config.distribution.with_min_separation(bins);
    }
    config
}

fn build_policy(
    policy: PolicyArg,
    split_hz: Option<f64>,
    target_hz: Option<f64>,
    tolerance_hz: Option<f64>,
) -> Result<MaskPolicy> {
    let tolerance_hz = tolerance_hz.unwrap_or(MaskPolicy::DEFAULT_TOLERANCE_HZ);
    Ok(match policy {
        PolicyArg::Segment => MaskPolicy::SegmentThreshold {
            split_hz: split_hz.unwrap_or(MaskPolicy::DEFAULT_SEGMENT_SPLIT_HZ),
        },
        PolicyArg::Frame => MaskPolicy::FrameThreshold {
            split_hz: split_hz.unwrap_or(MaskPolicy::DEFAULT_FRAME_SPLIT_HZ),
        },
        PolicyArg::Target => {
            let Some(target_hz) = target_hz else {
                bail!("--policy target needs --target-hz");
            };
            MaskPolicy::TargetBand {
                target_hz,
                tolerance_hz,
            }
        }
        PolicyArg::Peaks => MaskPolicy::DetectedPeaks { tolerance_hz },
    })
}

/// Apply frequency flags to a policy loaded from configuration
fn override_policy(
    policy: &mut MaskPolicy,
    split_hz: Option<f64>,
    target_hz: Option<f64>,
    tolerance_hz: Option<f64>,
) {
    match policy {
        MaskPolicy::SegmentThreshold { split_hz: s } | MaskPolicy::FrameThreshold { split_hz: s } => {
            if let Some(v) = split_hz {
                *s = v;
            }
        }
        MaskPolicy::TargetBand {
            target_hz: t,
            tolerance_hz: tol,
        } => {
            if let Some(v) = target_hz {
                *t = v;
            }
            if let Some(v) = tolerance_hz {
                *tol = v;
            }
        }
        MaskPolicy::DetectedPeaks { tolerance_hz: tol } => {
            if let Some(v) = tolerance_hz {
                *tol = v;
            }
        }
    }
}

fn build_format(format: FormatArg, bitrate: Option<u32>, vbr: Option<u8>) -> OutputFormat {
    match format {
        FormatArg::Wav => OutputFormat::Wav,
        FormatArg::Mp3 => match (bitrate, vbr) {
            (_, Some(quality)) => OutputFormat::mp3_vbr(quality),
            (Some(kbps), None) => OutputFormat::mp3_cbr(kbps),
            (None, None) => OutputFormat::mp3_192(),
        },
    }
}

fn separate(
    config: SeparationConfig,
    inputs: &[PathBuf],
    output_dir: Option<&Path>,
    jobs: Option<usize>,
) -> Result<()> {
    let mut batch = Vec::with_capacity(inputs.len());
    for input in inputs {
        if !input.exists() {
            bail!("Input not found: {}", input.display());
        }
        let mut builder = SeparationJob::builder().input(input);
        if let Some(dir) = output_dir {
            builder = builder.output_dir(dir);
        }
        batch.push(builder.build()?);
    }

    println!(
        "Separating {} file(s) with the {} policy...",
        batch.len(),
        config.policy.name()
    );

    let mut processor = BatchProcessor::new(config).context("Invalid configuration")?;
    if let Some(jobs) = jobs {
        processor = processor.with_max_parallel(jobs);
    }
    let results = processor.process_all(&batch);

    let mut failed = 0;
    for (job, result) in batch.iter().zip(&results) {
        match result.status {
            JobStatus::Completed => {
                println!(
                    "  {} ({:.1}s)",
                    job.input_path.display(),
                    result.duration.as_secs_f64()
                );
                for output in &result.outputs {
                    println!("    -> {}", output.display());
                }
            }
            JobStatus::Failed | JobStatus::Cancelled => {
                failed += 1;
                eprintln!(
                    "  {} failed: {}",
                    job.input_path.display(),
                    result.error.as_deref().unwrap_or("cancelled")
                );
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} file(s) failed", failed, batch.len());
    }
    Ok(())
}

fn analyze(config: SeparationConfig, input: &Path, json: bool) -> Result<()> {
    let mut pipeline = SeparationPipeline::new(config).context("Invalid configuration")?;
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let extension = input.extension().and_then(|e| e.to_str());

    let context = pipeline
        .analyze(&bytes, extension)
        .with_context(|| format!("Failed to analyze {}", input.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&context)?);
        return Ok(());
    }

    println!(
        "{}: {} voiced frame(s) of {}",
        input.display(),
        context.analysis.total_count(),
        context.num_frames
    );
    if context.peaks().is_empty() {
        println!("  no dominant pitch found");
    }
    for (i, peak) in context.peaks().iter().enumerate() {
        println!(
            "  {}. {:>6.1} Hz  {:<4} (height {:.2}, prominence {:.2})",
            i + 1,
            peak.frequency,
            freq_to_note_name(peak.frequency),
            peak.height,
            peak.prominence
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_peaks_survive_without_flag() {
        let loaded = SeparationConfig::default().with_max_peaks(4);
        let config = analysis_config(loaded, None, None);
        assert_eq!(config.distribution.max_peaks, 4);
    }

    #[test]
    fn test_peak_flags_override_config() {
        let loaded = SeparationConfig::default().with_max_peaks(4);
        let config = analysis_config(loaded, Some(1), Some(7));
        assert_eq!(config.distribution.max_peaks, 1);
        assert_eq!(config.distribution.min_separation_bins, 7);
    }

    #[test]
    fn test_analyze_peaks_flag_is_optional() {
        let cli = Cli::try_parse_from(["voxsplit", "analyze", "duet.wav"]).unwrap();
        match cli.command {
            Commands::Analyze { peaks, min_separation, .. } => {
                assert_eq!(peaks, None);
                assert_eq!(min_separation, None);
            }
            _ => panic!("expected analyze"),
        }
    }
}
