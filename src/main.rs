mod bot;
mod config;
mod core;
mod error;
mod vision;

use crate::bot::calibrate::{self, Selection};
use crate::bot::{BotSettings, DebugOverlay, MonotonicClock, PollLoop};
use crate::core::capture;
use crate::core::keys::{self, DryRunKeys, KeySink};
use crate::core::signal::{self, CancelToken};
use crate::error::BotError;
use crate::vision::{LaneGeometry, Region};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "hitlane", version, about = "Presses lane keys when notes reach the hit zone")]
struct Args {
    /// INI file to read; created with defaults when missing.
    #[arg(long, default_value = config::CONFIG_PATH)]
    config: PathBuf,

    /// Log key presses instead of sending them.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Overrides `[Options] LogLevel`: error, warn, info, debug, trace.
    #[arg(long)]
    log_level: Option<String>,

    /// Write the debug overlay PNG.
    #[arg(long, default_value_t = false)]
    overlay: bool,

    /// Start polling immediately.
    #[arg(long, default_value_t = false)]
    no_countdown: bool,

    /// Pick the note color from this absolute screen pixel.
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    sample_at: Option<(i32, i32)>,

    /// Hit zone as two opposite screen corners.
    #[arg(long, value_name = "X1,Y1,X2,Y2", value_parser = parse_corners)]
    region: Option<((i32, i32), (i32, i32))>,
}

fn parse_ints(s: &str, n: usize) -> Result<Vec<i32>, String> {
    let values = s
        .split(',')
        .map(|t| t.trim().parse::<i32>().map_err(|e| format!("'{t}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != n {
        return Err(format!("expected {n} comma-separated integers"));
    }
    Ok(values)
}

fn parse_point(s: &str) -> Result<(i32, i32), String> {
    let v = parse_ints(s, 2)?;
    Ok((v[0], v[1]))
}

fn parse_corners(s: &str) -> Result<((i32, i32), (i32, i32)), String> {
    let v = parse_ints(s, 4)?;
    Ok(((v[0], v[1]), (v[2], v[3])))
}

/// Counts down `seconds`, returning false if cancelled meanwhile.
fn countdown(seconds: u32, cancel: &CancelToken) -> bool {
    const STEP: Duration = Duration::from_millis(50);
    for remaining in (1..=seconds).rev() {
        info!("Starting in {remaining}...");
        for _ in 0..20 {
            if cancel.is_cancelled() {
                return false;
            }
            std::thread::sleep(STEP);
        }
    }
    !cancel.is_cancelled()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    log::set_max_level(log::LevelFilter::Warn);

    let args = Args::parse();
    let mut cfg = config::load(&args.config);
    if let Some(level) = args.log_level.as_deref() {
        match config::LogLevel::from_str(level) {
            Ok(level) => cfg.log_level = level,
            Err(()) => warn!("Unknown log level '{level}', keeping {}", cfg.log_level.as_str()),
        }
    }
    cfg.dry_run |= args.dry_run;
    cfg.overlay |= args.overlay;
    log::set_max_level(cfg.log_level.as_level_filter());
    cfg.validate()?;

    if let Some((a, b)) = args.region {
        cfg.region = Some(calibrate::hit_zone(0, 0, Selection::from_corners(a, b)?)?);
    }
    let region: Region = cfg.region.ok_or_else(|| {
        BotError::Config("no hit zone; set [Region] or pass --region X1,Y1,X2,Y2".into())
    })?;
    let geometry = LaneGeometry::for_region(&region, cfg.lane_count, cfg.trigger_band_height)?;

    let mut capture = capture::open_default()?;
    let range = match args.sample_at {
        Some((x, y)) => {
            let sample = calibrate::sample_screen(&mut capture, x, y)?;
            if let Some(lane) = x
                .checked_sub(region.left)
                .and_then(|col| u32::try_from(col).ok())
                .and_then(|col| geometry.lane_at(col))
            {
                info!("Sampled pixel lies in lane {lane}");
            }
            calibrate::range_from_sample(sample, cfg.color_tolerance)
        }
        None => cfg.color_range().ok_or_else(|| {
            BotError::Config(
                "no note color; set [Color] Sample or Lower/Upper, or pass --sample-at X,Y".into(),
            )
        })?,
    };
    calibrate::check_region(&mut capture, &region)?;

    signal::install_interrupt_handler()?;
    let cancel = CancelToken::interrupt();

    let keys: Box<dyn KeySink> = if cfg.dry_run {
        info!("Dry run: key presses are logged, not sent.");
        Box::new(DryRunKeys)
    } else {
        keys::open_default(&cfg.lane_keys)?
    };
    info!(
        "Lane keys: {}",
        cfg.lane_keys
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    if !args.no_countdown && !countdown(cfg.start_delay_seconds, &cancel) {
        info!("Cancelled before start.");
        return Ok(());
    }

    let settings = BotSettings {
        region,
        range,
        geometry,
        timing: cfg.timing,
        keys: cfg.lane_keys.clone(),
    };
    let mut bot = PollLoop::new(settings, capture, keys, MonotonicClock::new())?;
    if cfg.overlay {
        bot = bot.with_overlay(DebugOverlay::new(&cfg.overlay_path, cfg.overlay_every));
    }

    let stats = bot.run(&cancel);
    info!("Stopped: {stats}");
    Ok(())
}
