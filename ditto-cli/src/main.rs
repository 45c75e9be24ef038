//! ditto CLI
//!
//! Capture the six screen coordinates once, then replay the copy sequence
//! over any number of work dates:
//!
//!   cargo run --bin ditto -- capture                # guided capture, 3s hover per control
//!   cargo run --bin ditto -- run --dates "2025-07-01~2025-07-04" --reference 2025-06-30
//!   cargo run --bin ditto -- run                    # reuse the previous dates and reference
//!   cargo run --bin ditto -- expand "2025-07-01~2025-07-04, 2025-07-10"
//!   cargo run --bin ditto -- check                  # host capability and config report

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::{info, warn};

use ditto::engine::{PlaybackConfig, PlaybackEngine, PlaybackEvent, RunPlan};
use ditto::{
    create_backend, default_config_dir, expand_spec, Capabilities, CancelWatcher, CaptureSession,
    CoordLabel, CoordinateStore, DelayTable, EngineState, WorkDate, WorkList, DEFAULT_CANCEL_KEY,
};

#[derive(Parser)]
#[command(name = "ditto")]
#[command(version)]
#[command(about = "🖱️  Coordinate-driven playback for repetitive data entry")]
struct Cli {
    /// Coordinate file to use instead of the per-user default.
    #[arg(long, global = true)]
    coords: Option<PathBuf>,

    /// Append logs to this file in addition to stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the six screen coordinates by hovering over each control.
    Capture(CaptureArgs),
    /// Replay the copy sequence over a list of work dates.
    Run(RunArgs),
    /// Print the work list a date specification expands to.
    Expand(ExpandArgs),
    /// Report what this host can do and how ditto is configured.
    Check,
}

#[derive(Parser, Debug)]
struct CaptureArgs {
    /// Re-capture a single control instead of the full walk
    /// (key such as `lookup_button`; see `ditto check` for the list).
    #[arg(long)]
    label: Option<String>,

    /// Seconds to hover before each position is sampled.
    #[arg(long, default_value_t = 3)]
    settle_secs: u64,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Date specification: single dates and `start~end` ranges,
    /// separated by commas or newlines.
    #[arg(long)]
    dates: Option<String>,

    /// Additional single date; may repeat. Duplicates are skipped.
    #[arg(long = "date")]
    date: Vec<String>,

    /// Reference date the target application copies records from.
    #[arg(long)]
    reference: Option<String>,

    /// JSON file overriding the built-in settle delays.
    #[arg(long)]
    delays: Option<PathBuf>,

    /// Disable the pointer-corner emergency abort.
    #[arg(long)]
    no_failsafe: bool,

    /// Do not install the global Escape cancel key.
    #[arg(long)]
    no_cancel_key: bool,

    /// Ignore the remembered dates and reference from the previous run.
    #[arg(long)]
    fresh: bool,

    /// Validate and print the plan without driving the target application.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
struct ExpandArgs {
    /// Date specification to expand.
    spec: String,
}

/// Inputs remembered from the previous run so `ditto run` can repeat it.
#[derive(serde::Serialize, serde::Deserialize)]
struct LastRun {
    dates: Vec<String>,
    reference: String,
    saved_at: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_file.as_deref())?;

    match &cli.command {
        Commands::Capture(args) => capture(&cli, args).await,
        Commands::Run(args) => run(&cli, args).await,
        Commands::Expand(args) => expand(args),
        Commands::Check => check(&cli),
    }
}

fn init_logging(
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

fn coordinate_store(cli: &Cli) -> Result<CoordinateStore> {
    match &cli.coords {
        Some(path) => Ok(CoordinateStore::new(path.clone())),
        None => Ok(CoordinateStore::at_default_location()?),
    }
}

async fn capture(cli: &Cli, args: &CaptureArgs) -> Result<()> {
    let caps = Capabilities::detect();
    let backend = create_backend(&caps).context("capture needs a desktop session")?;
    let store = coordinate_store(cli)?;
    let existing = store
        .load()
        .context("reading the existing coordinate file")?
        .unwrap_or_default();

    let mut session = match &args.label {
        Some(key) => {
            let label = CoordLabel::from_key(key).with_context(|| {
                format!(
                    "unknown label `{key}`; expected one of: {}",
                    CoordLabel::ALL.map(|l| l.key()).join(", ")
                )
            })?;
            CaptureSession::for_label(existing, label)
        }
        None => CaptureSession::with_existing(existing),
    };
    session = session.with_settle(Duration::from_secs(args.settle_secs));

    info!("🎯 starting capture, {} labels to record", session.remaining());
    while let Some(label) = session.pending() {
        println!(
            "Hover over the {} (sampling in {}s)...",
            label.describe(),
            args.settle_secs
        );
        let (label, position) = session.capture_next(backend.as_ref()).await?;
        println!("  recorded {label} at {position}");
    }

    let set = session.into_set();
    store.save(&set)?;
    if set.is_complete() {
        println!(
            "✅ all six coordinates saved to {}",
            store.path().display()
        );
    } else {
        let missing: Vec<&str> = set.missing().iter().map(CoordLabel::key).collect();
        println!(
            "⚠️  saved {}, but runs need the missing labels too: {}",
            store.path().display(),
            missing.join(", ")
        );
    }
    Ok(())
}

async fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let remembered = if args.fresh { None } else { load_last_run() };
    let (dates, reference) = resolve_inputs(args, remembered)?;
    info!(
        "📅 {} dates, reference {}",
        dates.len(),
        reference
    );

    let store = coordinate_store(cli)?;
    let coords = store
        .load()?
        .with_context(|| {
            format!(
                "no coordinate file at {}; run `ditto capture` first",
                store.path().display()
            )
        })?;

    let mut config = PlaybackConfig::default();
    if let Some(path) = &args.delays {
        config.delays = DelayTable::load_from(path)?;
        info!("⏱️  delay table loaded from {}", path.display());
    }
    if args.no_failsafe {
        config.corner_failsafe = false;
        warn!("corner failsafe disabled");
    }

    let plan = RunPlan {
        coords,
        dates: dates.clone(),
        reference: reference.clone(),
    };

    if args.dry_run {
        // Resolve eagerly so a dry run still catches missing labels.
        plan.coords.resolve()?;
        println!("dry run: {} dates, reference {}", dates.len(), reference);
        for date in &dates {
            println!("  {date}");
        }
        return Ok(());
    }

    let caps = Capabilities::detect();
    let backend = create_backend(&caps).context("playback needs a desktop session")?;
    let engine = Arc::new(PlaybackEngine::new(backend, config));

    let watcher = if args.no_cancel_key {
        None
    } else {
        match CancelWatcher::spawn(Arc::clone(&engine), DEFAULT_CANCEL_KEY, &caps) {
            Ok(watcher) => {
                info!("⎋  press Escape at any time to stop at the next date");
                Some(watcher)
            }
            Err(err) => {
                warn!("cancel key unavailable, continuing without it: {err}");
                None
            }
        }
    };

    remember_inputs(&dates, &reference);

    let mut events = engine.event_stream();
    engine.start(plan)?;

    // Ctrl-C stops at the next date boundary, same as the cancel key.
    let interrupt_engine = Arc::clone(&engine);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next date boundary");
            interrupt_engine.stop();
        }
    });

    while let Some(event) = events.next().await {
        let done = report_event(&event);
        if done {
            break;
        }
    }
    engine.wait().await;
    drop(watcher);

    let status = engine.status();
    match status.state {
        EngineState::Completed => Ok(()),
        EngineState::Stopped => {
            println!("stopped; rerun with the remaining dates when ready");
            Ok(())
        }
        EngineState::Failed => {
            bail!(
                "run failed: {}",
                status.last_note.unwrap_or_else(|| "unknown failure".to_string())
            )
        }
        other => bail!("run ended in unexpected state {other}"),
    }
}

/// Print one progress line per event. Returns true on a terminal event.
fn report_event(event: &PlaybackEvent) -> bool {
    match event {
        PlaybackEvent::Started { total } => {
            println!("▶️  run started over {total} dates");
        }
        PlaybackEvent::ReferenceEntered { reference } => {
            println!("   reference date {reference} entered");
        }
        PlaybackEvent::DateStarted { index, total, date } => {
            let percent = ((index + 1) as f64 / *total as f64) * 100.0;
            println!("📋 {}/{} ({percent:.0}%) {date}", index + 1, total);
        }
        PlaybackEvent::DateCompleted { .. } => {}
        PlaybackEvent::Paused => println!("⏸️  paused"),
        PlaybackEvent::Resumed => println!("▶️  resumed"),
        PlaybackEvent::Completed { total } => {
            println!("🏁 completed all {total} dates");
            return true;
        }
        PlaybackEvent::Stopped { after_index } => {
            match after_index {
                Some(index) => println!("🛑 stopped after date {}", index + 1),
                None => println!("🛑 stopped before the first date"),
            }
            return true;
        }
        PlaybackEvent::Failed { index, message, .. } => {
            println!("❌ failed on date {}: {message}", index + 1);
            return true;
        }
    }
    false
}

fn expand(args: &ExpandArgs) -> Result<()> {
    let dates = expand_spec(&args.spec)?;
    for date in &dates {
        println!("{date}");
    }
    info!("📅 {} dates", dates.len());
    Ok(())
}

fn check(cli: &Cli) -> Result<()> {
    let caps = Capabilities::detect();
    println!("host capabilities:");
    println!("  input injection:   {}", if caps.input { "yes" } else { "no" });
    println!(
        "  global cancel key: {}",
        if caps.global_cancel { "yes" } else { "no" }
    );

    let store = coordinate_store(cli)?;
    println!("coordinate file: {}", store.path().display());
    match store.load() {
        Ok(Some(set)) if set.is_complete() => {
            println!("  all six labels captured:");
            for (label, position) in set.iter() {
                println!("    {label}: {position}");
            }
        }
        Ok(Some(set)) => {
            let missing: Vec<&str> = set.missing().iter().map(CoordLabel::key).collect();
            println!("  incomplete; missing: {}", missing.join(", "));
        }
        Ok(None) => println!("  not captured yet; run `ditto capture`"),
        Err(err) => println!("  unreadable: {err}"),
    }
    Ok(())
}

/// Figure out dates and reference from the arguments, falling back to the
/// remembered previous run when both are omitted.
fn resolve_inputs(args: &RunArgs, remembered: Option<LastRun>) -> Result<(Vec<WorkDate>, WorkDate)> {
    let mut list = WorkList::new();
    if let Some(spec) = &args.dates {
        list.extend_spec(spec)?;
    }
    for token in &args.date {
        let date = WorkDate::parse(token)?;
        if !list.add(date) {
            info!("skipping duplicate date {token}");
        }
    }

    if list.is_empty() {
        if let Some(last) = &remembered {
            info!("reusing {} dates from the previous run", last.dates.len());
            // Replayed verbatim: a deliberate duplicate in the previous
            // run stays a duplicate here.
            list.extend_spec(&last.dates.join(","))?;
        }
    }
    if list.is_empty() {
        bail!("no dates given; pass --dates or --date");
    }

    let reference = match &args.reference {
        Some(token) => WorkDate::parse(token)?,
        None => match &remembered {
            Some(last) => {
                info!("reusing reference date {} from the previous run", last.reference);
                WorkDate::parse(&last.reference)?
            }
            None => bail!("no reference date given; pass --reference"),
        },
    };

    Ok((list.into_dates(), reference))
}

fn last_run_path() -> Result<PathBuf> {
    Ok(default_config_dir()?.join("last_run.json"))
}

fn load_last_run() -> Option<LastRun> {
    let path = last_run_path().ok()?;
    let json = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&json) {
        Ok(last) => Some(last),
        Err(err) => {
            warn!("ignoring unreadable previous-run file: {err}");
            None
        }
    }
}

/// Best effort; a failed save only costs the convenience next time.
fn remember_inputs(dates: &[WorkDate], reference: &WorkDate) {
    let last = LastRun {
        dates: dates.iter().map(|d| d.as_str().to_string()).collect(),
        reference: reference.as_str().to_string(),
        saved_at: chrono::Local::now().to_rfc3339(),
    };
    let path = match last_run_path() {
        Ok(path) => path,
        Err(err) => {
            warn!("could not locate the config directory: {err}");
            return;
        }
    };
    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            warn!("could not create the config directory: {err}");
            return;
        }
    }
    let json = match serde_json::to_string_pretty(&last) {
        Ok(json) => json,
        Err(err) => {
            warn!("could not encode run inputs: {err}");
            return;
        }
    };
    match std::fs::write(&path, json) {
        Ok(()) => info!("💾 remembered dates and reference for next time"),
        Err(err) => warn!("could not remember run inputs: {err}"),
    }
}
