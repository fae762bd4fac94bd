//! `spike-average`: run spike-triggered averaging over a WAV recording
//!
//! The file is streamed through the engine in fixed-size chunks, the way an
//! audio input would deliver it, and the final averaged waveform is printed as
//! CSV (`offset,average,contributors`).

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use spike_averager::{EngineConfig, ThresholdAverager};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "spike-average", about = "Spike-triggered averaging of a WAV recording")]
struct Args {
    /// Mono 16-bit WAV file
    input: PathBuf,

    /// Trigger level (negative values trigger on falling crossings)
    #[arg(short, long, allow_negative_numbers = true)]
    threshold: Option<i32>,

    /// Maximum number of spikes in the average
    #[arg(short, long)]
    max_size: Option<usize>,

    /// Samples per ingested chunk
    #[arg(short, long, default_value_t = 1024)]
    chunk: usize,

    /// Ignore crossings for this many milliseconds after a trigger
    #[arg(long)]
    dead_period_ms: Option<f32>,

    /// JSON engine configuration (flags override its fields)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging() {
    let env_filter = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn build_config(args: &Args, sample_rate: u32) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::for_sample_rate(sample_rate),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(max_size) = args.max_size {
        config.max_size = max_size;
    }
    if let Some(ms) = args.dead_period_ms {
        config.dead_period = Some((sample_rate as f32 * ms / 1000.0) as usize);
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    if args.chunk == 0 {
        bail!("chunk size must be greater than 0");
    }

    let mut reader = hound::WavReader::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 {
        bail!(
            "expected mono 16-bit audio, got {} channel(s) at {} bits",
            spec.channels,
            spec.bits_per_sample
        );
    }

    let config = build_config(&args, spec.sample_rate)?;
    if config.threshold == spike_averager::config::DISARMED_THRESHOLD {
        warn!("no threshold set, nothing will trigger");
    }
    info!(
        sample_rate = spec.sample_rate,
        window_ms = config.window_ms(spec.sample_rate),
        threshold = config.threshold,
        max_size = config.max_size,
        "averaging {}",
        args.input.display()
    );

    let mut averager = ThresholdAverager::new(config)?;
    let started = Instant::now();
    let mut chunk = Vec::with_capacity(args.chunk);
    for sample in reader.samples::<i16>() {
        chunk.push(sample.context("reading samples")?);
        if chunk.len() == args.chunk {
            averager.ingest(&chunk);
            chunk.clear();
        }
    }
    // The final partial chunk would change the chunk length and reset the average
    if !chunk.is_empty() {
        info!(samples = chunk.len(), "dropping trailing partial chunk");
    }

    let stats = averager.stats();
    info!(
        chunks = stats.chunks_ingested,
        triggers = stats.triggers,
        completed = stats.windows_completed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "done"
    );

    let mut writer = csv::Writer::from_writer(io::stdout().lock());
    writer.write_record(["offset", "average", "contributors"])?;
    for (offset, value) in averager.averaged_waveform().iter().enumerate() {
        writer.write_record([
            offset.to_string(),
            value.to_string(),
            averager.contributors(offset).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
