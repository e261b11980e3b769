//! SyncView command line driver
//!
//! Usage:
//!   svsync run --clip cam-a:12:2:8 --clip cam-b:9 --seconds 5
//!   svsync run --clip a:6 --clip b:6 --drift 1:0.02 --reject 0 --no-loop
//!   svsync presets

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use sv_core::{ClipAsset, MAX_SLOTS, SyncPreferences, format_clock};
use sv_sync::{PlaybackSession, SimulatedStream, SystemClock, TickScheduler, WallClock};

#[derive(Parser)]
#[command(name = "svsync", about = "Synchronized multi-stream playback simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play simulated clips in lock-step and print snapshots as JSON lines
    Run(RunArgs),
    /// Print the effective preferences
    Presets {
        /// Preferences file (defaults to the user config dir)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Clip as NAME:DURATION[:TRIM_START[:TRIM_END]], one per slot
    #[arg(long = "clip", value_parser = parse_clip, required = true)]
    clips: Vec<ClipSpec>,

    /// Wall-clock seconds to run
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,

    /// Playback rate multiplier
    #[arg(long)]
    rate: Option<f64>,

    /// Stop at the end of the loop instead of wrapping
    #[arg(long)]
    no_loop: bool,

    /// Native clock error for a slot as SLOT:FRACTION (0.02 = 2% fast)
    #[arg(long = "drift", value_parser = parse_slot_value)]
    drift: Vec<SlotValue>,

    /// Slot whose play command is rejected
    #[arg(long = "reject")]
    reject: Vec<usize>,

    /// Offset nudge for a slot as SLOT:DELTA seconds
    #[arg(long = "step", value_parser = parse_slot_value)]
    step: Vec<SlotValue>,

    /// Preferences file (defaults to the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
struct ClipSpec {
    name: String,
    duration: f64,
    trim_start: Option<f64>,
    trim_end: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SlotValue {
    slot: usize,
    value: f64,
}

fn parse_seconds(field: &str, raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{} '{}' is not a number", field, raw))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must be a non-negative number", field));
    }
    Ok(value)
}

fn parse_clip(raw: &str) -> Result<ClipSpec, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    if !(2..=4).contains(&parts.len()) {
        return Err("expected NAME:DURATION[:TRIM_START[:TRIM_END]]".into());
    }
    let name = parts[0].trim();
    if name.is_empty() {
        return Err("clip name is empty".into());
    }
    let duration = parse_seconds("duration", parts[1])?;
    if duration <= 0.0 {
        return Err("duration must be positive".into());
    }
    let trim_start = parts
        .get(2)
        .map(|raw| parse_seconds("trim start", raw))
        .transpose()?;
    let trim_end = parts
        .get(3)
        .map(|raw| parse_seconds("trim end", raw))
        .transpose()?;

    Ok(ClipSpec {
        name: name.to_string(),
        duration,
        trim_start,
        trim_end,
    })
}

fn parse_slot_value(raw: &str) -> Result<SlotValue, String> {
    let (slot, value) = raw
        .split_once(':')
        .ok_or_else(|| "expected SLOT:VALUE".to_string())?;
    let slot: usize = slot
        .trim()
        .parse()
        .map_err(|_| format!("slot '{}' is not an index", slot))?;
    if slot >= MAX_SLOTS {
        return Err(format!("slot must be below {}", MAX_SLOTS));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if !value.is_finite() {
        return Err("value must be finite".into());
    }
    Ok(SlotValue { slot, value })
}

fn load_preferences(config: Option<&Path>) -> SyncPreferences {
    match config {
        Some(path) => {
            if !path.exists() {
                log::warn!("Preferences {} not found, using defaults", path.display());
            }
            SyncPreferences::load_from(path)
        }
        None => SyncPreferences::load(),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Presets { config } => {
            let prefs = load_preferences(config.as_deref());
            println!("{}", serde_json::to_string_pretty(&prefs)?);
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    if args.clips.len() > MAX_SLOTS {
        bail!("At most {} clips can play at once", MAX_SLOTS);
    }
    if !args.seconds.is_finite() || args.seconds <= 0.0 {
        bail!("--seconds must be positive");
    }

    let prefs = load_preferences(args.config.as_deref());
    let wall: Arc<dyn WallClock> = Arc::new(SystemClock);
    let mut session = PlaybackSession::new(prefs.clone(), wall.clone());

    let mut streams = Vec::with_capacity(args.clips.len());
    for (index, spec) in args.clips.iter().enumerate() {
        let stream = SimulatedStream::new(wall.clone(), Some(spec.duration));
        let asset = ClipAsset::new(format!("clip-{index}"), spec.name.as_str(), spec.duration)
            .with_trim(spec.trim_start, spec.trim_end);
        session.assign(index, asset, Some(Box::new(stream.clone())))?;
        streams.push(stream);
    }

    for drift in &args.drift {
        streams
            .get(drift.slot)
            .with_context(|| format!("--drift: no clip in slot {}", drift.slot))?
            .set_drift(drift.value);
    }
    for &slot in &args.reject {
        streams
            .get(slot)
            .with_context(|| format!("--reject: no clip in slot {}", slot))?
            .set_reject_play(true);
    }

    session.toggle_sync();
    if args.no_loop && session.is_looping() {
        session.toggle_loop();
    }
    if let Some(rate) = args.rate {
        session.set_rate(rate)?;
    }
    for step in &args.step {
        session
            .adjust_offset(step.slot, step.value)
            .with_context(|| format!("--step: slot {}", step.slot))?;
    }

    let scheduler = TickScheduler::spawn(session, prefs.tick_interval());
    let handle = scheduler.handle();

    if let Some(report) = handle.toggle_play_pause()? {
        for (slot, err) in &report.rejected {
            log::warn!("Slot {} stays paused: {}", slot, err);
        }
    }
    let snapshots = handle.subscribe();

    let deadline = Instant::now() + Duration::from_secs_f64(args.seconds);
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match snapshots.recv_timeout(deadline - now) {
            Ok(snapshot) => {
                println!("{}", serde_json::to_string(&snapshot)?);
                if !snapshot.is_playing {
                    log::info!("Playback ended at {}", format_clock(snapshot.current_position));
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => bail!("Scheduler stopped unexpectedly"),
        }
    }

    let last = handle.snapshot()?;
    let (session, stats) = scheduler
        .shutdown()
        .context("Tick scheduler thread panicked")?;

    if let Some(transport) = session.transport() {
        let drift = transport.drift_stats();
        log::info!(
            "Stopped at {} / {} after {} ticks: {} corrections, worst drift {:.3}s",
            format_clock(last.current_position),
            format_clock(last.duration),
            stats.ticks,
            drift.corrections,
            drift.worst_drift
        );
    }
    Ok(())
}
