use std::{path::Path, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use market_data::{
    Bar, BarCache, Timeframe, ascending,
    providers::rest::{RestProvider, response::parse_payload},
    time::{normalize_epoch, parse_iso_to_secs},
};
use tracing::info;
use volume_profile::{
    AnchorEvent, AnchorStateMachine, LogicalRange, ManualViewport, ProfileConfig, ProfileInputs,
    ProfilePipeline, ProfileSet, Scheduler, VariantKind, VisibleWindow, WindowTracker,
    compute_profiles, load_config_path, logging::init_logging, ltf::bars_in_range,
    window::LOAD_RACE_RETRY_MS,
};

#[derive(Parser)]
#[command(version, about = "Volume profile CLI")]
struct Cli {
    /// Profile configuration (TOML); defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Profile bars read from a `{"rows": [...]}` JSON file.
    File(FileCmd),
    /// Fetch bars from the REST source configured by `VP_API_*` variables.
    Fetch(FetchCmd),
}

#[derive(Args)]
struct FileCmd {
    #[arg(long, value_name = "FILE")]
    bars: PathBuf,
    /// Resolution of `--bars`; needed to group `--intrabar` bars.
    #[arg(long)]
    resolution: Option<Timeframe>,
    #[arg(long, value_name = "FILE")]
    intrabar: Option<PathBuf>,
    /// Visible logical range `FROM:TO` in bar indices; all bars by default.
    #[arg(long, value_parser = parse_range)]
    range: Option<LogicalRange>,
    /// Fixed-range point (RFC 3339 or epoch); pass twice.
    #[arg(long = "point")]
    points: Vec<String>,
}

#[derive(Args)]
struct FetchCmd {
    #[arg(long)]
    symbol: String,
    /// Open time of the first visible bar.
    #[arg(long)]
    start: String,
    /// Open time of the last visible bar.
    #[arg(long)]
    end: String,
    #[arg(long = "point")]
    points: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_path(path)?,
        None => ProfileConfig::default(),
    };

    let set = match cli.cmd {
        Cmd::File(cmd) => run_file(&config, cmd)?,
        Cmd::Fetch(cmd) => run_fetch(&config, cmd).await?,
    };
    if let Some(error) = &set.error {
        info!(%error, "profile computation failed");
    }
    println!("{}", serde_json::to_string_pretty(&set)?);
    Ok(())
}

fn run_file(config: &ProfileConfig, cmd: FileCmd) -> Result<ProfileSet<toml::Table>> {
    let bars = read_bars(&cmd.bars)?;
    let intrabar = cmd.intrabar.as_deref().map(read_bars).transpose()?;
    let window = track_window(config, Arc::clone(&bars), cmd.range)?;
    let fixed_range = fixed_range(config.variant, &cmd.points)?;

    let params = config.variant_params()?;
    let inputs = ProfileInputs {
        bars: &bars,
        resolution: cmd.resolution,
        window,
        fixed_range,
        intrabar: intrabar.as_deref(),
    };
    Ok(ProfileSet::ready(
        compute_profiles(&params, &inputs),
        config.style.clone(),
    ))
}

async fn run_fetch(config: &ProfileConfig, cmd: FetchCmd) -> Result<ProfileSet<toml::Table>> {
    let start = parse_time(&cmd.start)?;
    let end = parse_time(&cmd.end)?;
    if end <= start {
        bail!("--end must be after --start");
    }
    let fixed_range = fixed_range(config.variant, &cmd.points)?;

    let params = config.variant_params()?;
    let visible = bars_in_range(start, end, params.display) as usize + 1;
    let window = VisibleWindow {
        from_time: start,
        to_time: end,
        from_index: 0,
        to_index: visible - 1,
        bars_in_window: visible,
        price_min: 0.0,
        price_max: 0.0,
    };

    let provider = Arc::new(RestProvider::from_env().context("configuring REST provider")?);
    let pipeline = ProfilePipeline::new(provider, cmd.symbol, params)
        .with_asset_class(config.asset_class)
        .with_ltf(config.ltf_selection()?)
        .with_intrabar(config.intrabar);
    let cache = BarCache::new(config.variant.cache_ttl());

    pipeline
        .refresh(&cache, &window, fixed_range, config.style.clone())
        .await
        .context("refresh was superseded")
}

fn read_bars(path: &Path) -> Result<Arc<[Bar]>> {
    let body = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let bars = parse_payload(&body).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Arc::from(ascending(&bars).into_owned()))
}

/// Runs a tracker over a static viewport until its first window settles.
///
/// Without `range` every bar is visible; an explicit `range` that resolves to
/// no window is an error rather than a silent whole-series profile.
fn track_window(
    config: &ProfileConfig,
    bars: Arc<[Bar]>,
    range: Option<LogicalRange>,
) -> Result<Option<VisibleWindow>> {
    let explicit = range;
    let range = range.unwrap_or_else(|| LogicalRange::new(0.0, bars.len().saturating_sub(1) as f64));
    let len = bars.len();
    let options = config.tracker_options();
    let scheduler = Scheduler::new();
    let mut tracker = WindowTracker::new(ManualViewport::new(Some(range)), bars, options, scheduler.clone());
    scheduler.advance(LOAD_RACE_RETRY_MS.max(options.debounce_ms));
    let window = tracker.poll();

    match explicit {
        Some(range) if window.is_none() => {
            if !options.enabled {
                bail!("--range needs window tracking enabled");
            }
            bail!("--range {}:{} selects no window over {len} bars", range.from, range.to)
        }
        _ => Ok(window),
    }
}

fn fixed_range(kind: VariantKind, points: &[String]) -> Result<Option<(i64, i64)>> {
    if points.is_empty() {
        return Ok(None);
    }
    if kind != VariantKind::Vpfr || points.len() != 2 {
        bail!("--point is only valid twice, with the fixed-range variant");
    }
    let mut fsm = AnchorStateMachine::new();
    fsm.handle(AnchorEvent::Arm);
    for point in points {
        fsm.handle(AnchorEvent::PointSelected(parse_time(point)?));
    }
    Ok(fsm.range())
}

fn parse_time(s: &str) -> Result<i64> {
    match s.trim().parse::<i64>() {
        Ok(raw) => Ok(normalize_epoch(raw)),
        Err(_) => parse_iso_to_secs(s).with_context(|| format!("bad time: {s}")),
    }
}

fn parse_range(s: &str) -> Result<LogicalRange, String> {
    let (from, to) = s.split_once(':').ok_or("expected FROM:TO")?;
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("{v}: {e}"));
    Ok(LogicalRange::new(parse(from)?, parse(to)?))
}
