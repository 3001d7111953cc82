//! SDKWork Read-Along CLI - Narrate text with a sentence timeline
//!
//! Subcommands:
//! - `narrate`: synthesize a text file into audio plus `_timing.json`
//! - `segment`: show how a text file would be split and chunked
//! - `init-config`: write a default configuration file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sdkwork_readalong::audio::AudioFormat;
use sdkwork_readalong::channels::ChannelType;
use sdkwork_readalong::config::AssemblerKind;
use sdkwork_readalong::{
    ChunkingStrategy, PipelineConfig, ProcessOutcome, ReadAlongPipeline, TimingMode,
    TimingStrategy, VERSION,
};

/// Timing mode selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Multi-sentence chunks, native timestamps when available
    Batched,
    /// One request per sentence, timed by measured audio
    Measured,
    /// Measured for short documents, batched otherwise
    Hybrid,
}

impl ModeArg {
    fn resolve(self, configured: TimingMode, hybrid_threshold: Option<usize>) -> TimingMode {
        match self {
            Self::Batched => TimingMode::Batched,
            Self::Measured => TimingMode::Measured,
            Self::Hybrid => {
                let configured_threshold = match configured {
                    TimingMode::Hybrid {
                        measured_max_segments,
                    } => Some(measured_max_segments),
                    _ => None,
                };
                TimingMode::Hybrid {
                    measured_max_segments: hybrid_threshold
                        .or(configured_threshold)
                        .unwrap_or(20),
                }
            }
        }
    }
}

/// SDKWork Read-Along - narrated audio with sentence-level timing
#[derive(Parser, Debug)]
#[command(name = "sdkwork-readalong")]
#[command(author, version, about, long_about = None)]
#[command(about = "Narrate long-form text with a sentence-level timeline")]
#[command(long_about = "
SDKWork Read-Along converts cleaned text into one narrated audio file plus a
sentence timeline for read-along playback.

Examples:
  # Write a starting configuration
  sdkwork-readalong init-config --output readalong.yaml

  # Narrate a document with the configured backend
  sdkwork-readalong narrate --config readalong.yaml --input paper.txt

  # Inspect sentence splitting and chunking without synthesizing
  sdkwork-readalong segment --input paper.txt --mode measured
")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Narrate a text file
    Narrate {
        /// Cleaned text file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (overrides the configuration)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Synthesis backend (gemini, google, openai, piper)
        #[arg(long)]
        engine: Option<String>,

        /// Timing mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Largest sentence count still synthesized per sentence in hybrid mode
        #[arg(long)]
        hybrid_threshold: Option<usize>,

        /// Delivered audio format (wav, mp3, flac, opus)
        #[arg(long)]
        format: Option<String>,

        /// Maximum concurrent backend calls
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Print sentences and chunks as JSON
    Segment {
        /// Cleaned text file
        #[arg(short, long)]
        input: PathBuf,

        /// Timing mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Largest sentence count still synthesized per sentence in hybrid mode
        #[arg(long)]
        hybrid_threshold: Option<usize>,

        /// Chunk max size (characters or words)
        #[arg(long)]
        max_size: Option<usize>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "readalong.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    Ok(config)
}

fn setup_logging(verbose: bool, configured: &str) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        configured.parse().unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")
}

fn create_progress_bar(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

fn read_text(input: &Path) -> Result<String> {
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}

#[allow(clippy::too_many_arguments)]
async fn run_narrate(
    mut config: PipelineConfig,
    input: &Path,
    output_dir: &Option<PathBuf>,
    engine: &Option<String>,
    mode: Option<ModeArg>,
    hybrid_threshold: Option<usize>,
    format: &Option<String>,
    concurrency: Option<usize>,
) -> Result<()> {
    if let Some(dir) = output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(engine) = engine {
        config.channel.channel_type = engine.parse::<ChannelType>().map_err(anyhow::Error::msg)?;
    }
    if let Some(mode) = mode {
        config.timing.mode = mode.resolve(config.timing.mode, hybrid_threshold);
    }
    if let Some(format) = format {
        let format: AudioFormat = format.parse().map_err(anyhow::Error::msg)?;
        config.audio.output_format = format;
        if format != AudioFormat::Wav {
            config.audio.assembler = AssemblerKind::Ffmpeg;
        }
    }
    if let Some(n) = concurrency {
        config.synthesis.max_concurrency = n;
    }

    let text = read_text(input)?;
    let pipeline = ReadAlongPipeline::from_config(&config).context("Invalid configuration")?;

    info!("Backend: {}", pipeline.backend().name());
    if !pipeline.backend().health_check().await {
        warn!("Backend '{}' failed its health check", pipeline.backend().name());
    }
    info!("Input: {} ({} chars)", input.display(), text.chars().count());

    let start = Instant::now();
    let pb = create_progress_bar("Narrating...")?;
    let outcome = pipeline
        .process(&text, &config.chunking, config.timing.mode)
        .await;
    pb.finish_and_clear();
    let outcome = outcome.context("Narration failed")?;

    let elapsed = start.elapsed().as_secs_f64();
    match &outcome {
        ProcessOutcome::Complete(result) => {
            info!(
                "Narrated {} sentences ({:.2}s of audio) in {:.2}s",
                result.segments().len(),
                result.total_duration(),
                elapsed
            );
            info!("Audio: {}", result.audio_reference());
            Ok(())
        }
        ProcessOutcome::Partial(partial) => {
            if let Some(result) = &partial.partial {
                warn!(
                    "Partial narration: {} sentences ({:.2}s of audio) saved to {}",
                    result.segments().len(),
                    result.total_duration(),
                    result.audio_reference()
                );
            }
            for failure in &partial.failed_chunks {
                warn!("Chunk {}: {}", failure.chunk_index, failure.describe());
            }
            bail!(
                "{} chunk(s) failed: {:?}",
                partial.failed_chunks.len(),
                partial.failed_indices()
            )
        }
    }
}

fn run_segment(
    mut config: PipelineConfig,
    input: &Path,
    mode: Option<ModeArg>,
    hybrid_threshold: Option<usize>,
    max_size: Option<usize>,
) -> Result<()> {
    if let Some(max) = max_size {
        config.chunking.max_size = max;
        config.chunking.target_size = config.chunking.target_size.min(max);
    }
    let mode = mode
        .map(|m| m.resolve(config.timing.mode, hybrid_threshold))
        .unwrap_or(config.timing.mode);

    let text = read_text(input)?;
    let segmenter = config.chunking.segmenter();
    let segments = segmenter.segment(&text);
    let strategy = mode.resolve(segments.len());
    let chunks = match strategy {
        TimingStrategy::Measured => sdkwork_readalong::text::chunk_individually(&segments),
        TimingStrategy::Batched => config.chunking.chunk(&segments)?,
    };

    let size_strategy = match strategy {
        TimingStrategy::Measured => ChunkingStrategy::SentenceBased,
        TimingStrategy::Batched => config.chunking.strategy,
    };
    let report = json!({
        "strategy": strategy.to_string(),
        "sentences": segments
            .iter()
            .map(|s| json!({ "text": s.text(), "word_count": s.word_count() }))
            .collect::<Vec<_>>(),
        "chunks": chunks
            .iter()
            .map(|c| json!({
                "index": c.index(),
                "sentences": c.len(),
                "size": c.size(size_strategy),
                "unit": size_strategy.unit(),
            }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    PipelineConfig::default()
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote default configuration to {}", output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    setup_logging(cli.verbose, &config.logging.level)?;

    info!("SDKWork Read-Along v{}", VERSION);

    match &cli.command {
        Commands::Narrate {
            input,
            output_dir,
            engine,
            mode,
            hybrid_threshold,
            format,
            concurrency,
        } => {
            run_narrate(
                config,
                input,
                output_dir,
                engine,
                *mode,
                *hybrid_threshold,
                format,
                *concurrency,
            )
            .await
        }
        Commands::Segment {
            input,
            mode,
            hybrid_threshold,
            max_size,
        } => run_segment(config, input, *mode, *hybrid_threshold, *max_size),
        Commands::InitConfig { output, force } => run_init_config(output, *force),
    }
}
