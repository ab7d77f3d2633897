use crate::bot::LaneTiming;
use crate::bot::calibrate::{DEFAULT_TOLERANCE, Selection, hit_zone};
use crate::core::keys::{VirtualKey, parse_key_list};
use crate::error::{BotError, Result};
use crate::vision::{ColorRange, Hsv, Region};
use ini::Ini;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_PATH: &str = "hitlane.ini";

const DEFAULT_KEYS: &str = "KeyZ,KeyX,Period,Slash";
const MAX_LANES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    pub start_delay_seconds: u32,
    pub dry_run: bool,
    pub lane_count: usize,
    pub lane_keys: Vec<VirtualKey>,
    pub trigger_band_height: u32,
    pub timing: LaneTiming,
    /// Note color picked during calibration; widened by `color_tolerance`.
    pub color_sample: Option<Hsv>,
    pub color_tolerance: Hsv,
    /// Explicit bounds; take precedence over `color_sample`.
    pub color_bounds: Option<(Hsv, Hsv)>,
    pub region: Option<Region>,
    pub overlay: bool,
    pub overlay_path: PathBuf,
    pub overlay_every: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            start_delay_seconds: 5,
            dry_run: false,
            lane_count: 4,
            lane_keys: parse_key_list(DEFAULT_KEYS).unwrap_or_default(),
            trigger_band_height: 60,
            timing: LaneTiming::default(),
            color_sample: None,
            color_tolerance: DEFAULT_TOLERANCE,
            color_bounds: None,
            region: None,
            overlay: false,
            overlay_path: PathBuf::from("hitlane-overlay.png"),
            overlay_every: 60,
        }
    }
}

impl Config {
    pub fn color_range(&self) -> Option<ColorRange> {
        if let Some((lower, upper)) = self.color_bounds {
            return Some(ColorRange::new(lower, upper));
        }
        self.color_sample
            .map(|sample| ColorRange::around(sample, self.color_tolerance))
    }

    /// Cross-field checks that cannot be repaired by falling back to a default.
    pub fn validate(&self) -> Result<()> {
        if self.lane_keys.len() != self.lane_count {
            return Err(BotError::Config(format!(
                "[Lanes] Count={} but Keys lists {} keys",
                self.lane_count,
                self.lane_keys.len()
            )));
        }
        for (i, key) in self.lane_keys.iter().enumerate() {
            if self.lane_keys[..i].contains(key) {
                return Err(BotError::Config(format!("key {key} is bound to two lanes")));
            }
        }
        Ok(())
    }
}

/* ------------------------------- Parsing ------------------------------- */

fn parse_bool(v: &str) -> Option<bool> {
    let v = v.trim();
    if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("on") {
        Some(true)
    } else if v.eq_ignore_ascii_case("false")
        || v.eq_ignore_ascii_case("no")
        || v.eq_ignore_ascii_case("off")
    {
        Some(false)
    } else {
        v.parse::<u8>().ok().map(|n| n != 0)
    }
}

/// `H,S,V` with each channel a byte.
pub fn parse_hsv(v: &str) -> Option<Hsv> {
    let mut it = v.split(',').map(|t| t.trim().parse::<u8>());
    match (it.next(), it.next(), it.next(), it.next()) {
        (Some(Ok(h)), Some(Ok(s)), Some(Ok(v)), None) => Some(Hsv::new(h, s, v)),
        _ => None,
    }
}

fn parse_ms(conf: &Ini, key: &str, default: f64) -> f64 {
    match conf.get_from(Some("Timing"), key).map(|v| v.trim().parse::<f64>()) {
        Some(Ok(ms)) if ms.is_finite() && ms >= 0.0 => ms,
        Some(_) => {
            warn!("[Timing] {key} must be a non-negative number of milliseconds; using {default}");
            default
        }
        None => default,
    }
}

fn parse_region(conf: &Ini) -> Option<Region> {
    let int = |key: &str| {
        conf.get_from(Some("Region"), key)
            .and_then(|v| v.trim().parse::<i64>().ok())
    };
    let size = |key: &str| int(key).and_then(|v| u32::try_from(v).ok());
    let offset = |key: &str| int(key).and_then(|v| i32::try_from(v).ok());

    if let (Some(left), Some(top), Some(width), Some(height)) =
        (offset("Left"), offset("Top"), size("Width"), size("Height"))
    {
        return Region::new(left, top, width, height)
            .inspect_err(|e| warn!("Ignoring [Region]: {e}"))
            .ok();
    }

    let (Some(x), Some(y), Some(width), Some(height)) =
        (offset("RoiX"), offset("RoiY"), size("RoiWidth"), size("RoiHeight"))
    else {
        return None;
    };
    let selection = Selection {
        x,
        y,
        width,
        height,
    };
    hit_zone(
        offset("WindowLeft").unwrap_or(0),
        offset("WindowTop").unwrap_or(0),
        selection,
    )
    .inspect_err(|e| warn!("Ignoring [Region] selection: {e}"))
    .ok()
}

pub fn from_ini(conf: &Ini) -> Config {
    let default = Config::default();
    let get = |section: &str, key: &str| conf.get_from(Some(section), key).map(str::trim);

    let log_level = get("Options", "LogLevel")
        .and_then(|v| LogLevel::from_str(v).ok())
        .unwrap_or(default.log_level);
    let start_delay_seconds = get("Options", "StartDelaySeconds")
        .and_then(|v| v.parse::<u32>().ok())
        .map_or(default.start_delay_seconds, |v| v.min(60));
    let dry_run = get("Options", "DryRun")
        .and_then(parse_bool)
        .unwrap_or(default.dry_run);

    let lane_count = get("Lanes", "Count")
        .and_then(|v| v.parse::<usize>().ok())
        .map_or(default.lane_count, |v| v.clamp(1, MAX_LANES));
    let lane_keys = match get("Lanes", "Keys").map(parse_key_list) {
        Some(Ok(keys)) if !keys.is_empty() => keys,
        Some(Err(e)) => {
            warn!("[Lanes] Keys: {e}; using {DEFAULT_KEYS}");
            default.lane_keys.clone()
        }
        _ => default.lane_keys.clone(),
    };
    let trigger_band_height = get("Lanes", "TriggerBandHeight")
        .and_then(|v| v.parse::<u32>().ok())
        .map_or(default.trigger_band_height, |v| v.max(1));

    let timing = LaneTiming {
        tap_hold_threshold_ms: parse_ms(conf, "TapHoldThresholdMs", default.timing.tap_hold_threshold_ms),
        hold_release_grace_ms: parse_ms(conf, "HoldReleaseGraceMs", default.timing.hold_release_grace_ms),
        tap_release_delay_ms: parse_ms(conf, "TapReleaseDelayMs", default.timing.tap_release_delay_ms),
    };

    let color_sample = get("Color", "Sample").filter(|v| !v.is_empty()).and_then(|v| {
        let hsv = parse_hsv(v);
        if hsv.is_none() {
            warn!("[Color] Sample '{v}' is not H,S,V");
        }
        hsv
    });
    let color_tolerance = get("Color", "Tolerance")
        .and_then(parse_hsv)
        .unwrap_or(default.color_tolerance);
    let color_bounds = match (
        get("Color", "Lower").and_then(parse_hsv),
        get("Color", "Upper").and_then(parse_hsv),
    ) {
        (Some(lower), Some(upper)) => Some((lower, upper)),
        _ => None,
    };

    Config {
        log_level,
        start_delay_seconds,
        dry_run,
        lane_count,
        lane_keys,
        trigger_band_height,
        timing,
        color_sample,
        color_tolerance,
        color_bounds,
        region: parse_region(conf),
        overlay: get("Debug", "Overlay")
            .and_then(parse_bool)
            .unwrap_or(default.overlay),
        overlay_path: get("Debug", "OverlayPath")
            .filter(|v| !v.is_empty())
            .map_or(default.overlay_path.clone(), PathBuf::from),
        overlay_every: get("Debug", "OverlayEvery")
            .and_then(|v| v.parse::<u32>().ok())
            .map_or(default.overlay_every, |v| v.max(1)),
    }
}

/* ------------------------------- File I/O ------------------------------- */

fn create_default_config_file(path: &Path) -> std::result::Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    let default = Config::default();
    let tol = default.color_tolerance;

    let mut conf = Ini::new();
    conf.with_section(Some("Options"))
        .set("DryRun", if default.dry_run { "1" } else { "0" })
        .set("LogLevel", default.log_level.as_str())
        .set("StartDelaySeconds", default.start_delay_seconds.to_string());
    conf.with_section(Some("Lanes"))
        .set("Count", default.lane_count.to_string())
        .set("Keys", DEFAULT_KEYS)
        .set("TriggerBandHeight", default.trigger_band_height.to_string());
    conf.with_section(Some("Timing"))
        .set("HoldReleaseGraceMs", default.timing.hold_release_grace_ms.to_string())
        .set("TapHoldThresholdMs", default.timing.tap_hold_threshold_ms.to_string())
        .set("TapReleaseDelayMs", default.timing.tap_release_delay_ms.to_string());
    conf.with_section(Some("Color"))
        .set("Lower", "")
        .set("Sample", "")
        .set("Tolerance", format!("{},{},{}", tol.h, tol.s, tol.v))
        .set("Upper", "");
    conf.with_section(Some("Region"))
        .set("Height", "")
        .set("Left", "")
        .set("Top", "")
        .set("Width", "");
    conf.with_section(Some("Debug"))
        .set("Overlay", if default.overlay { "1" } else { "0" })
        .set("OverlayEvery", default.overlay_every.to_string())
        .set("OverlayPath", default.overlay_path.to_string_lossy());
    conf.write_to_file(path)
}

/// Reads `path`, creating it with defaults first when missing. Unreadable
/// files and bad values fall back to defaults with a warning.
pub fn load(path: &Path) -> Config {
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    match Ini::load_from_file(path) {
        Ok(conf) => {
            let cfg = from_ini(&conf);
            info!("Configuration loaded from '{}'.", path.display());
            cfg
        }
        Err(e) => {
            warn!("Failed to load '{}': {e}. Using defaults.", path.display());
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, LogLevel, from_ini, parse_hsv};
    use crate::core::keys::VirtualKey;
    use crate::vision::{Hsv, Region};
    use ini::Ini;

    fn parse(text: &str) -> Config {
        from_ini(&Ini::load_from_str(text).expect("test ini parses"))
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse("");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.lane_keys.len(), 4);
        assert!((cfg.timing.tap_release_delay_ms - 0.2).abs() < 1e-12);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.color_range(), None);
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let cfg = parse(
            "[Options]\nLogLevel=debug\nStartDelaySeconds=600\nDryRun=yes\n\
             [Lanes]\nCount=0\nKeys=d,f,j,k\nTriggerBandHeight=0\n\
             [Timing]\nTapHoldThresholdMs=120\nTapReleaseDelayMs=-4\nHoldReleaseGraceMs=2.5\n\
             [Debug]\nOverlay=1\nOverlayEvery=0\n",
        );
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.start_delay_seconds, 60);
        assert!(cfg.dry_run);
        assert_eq!(cfg.lane_count, 1);
        assert_eq!(cfg.lane_keys[0], VirtualKey::Letter(b'D'));
        assert_eq!(cfg.trigger_band_height, 1);
        assert_eq!(cfg.timing.tap_hold_threshold_ms, 120.0);
        assert_eq!(cfg.timing.tap_release_delay_ms, 0.2, "negative delay falls back");
        assert_eq!(cfg.timing.hold_release_grace_ms, 2.5);
        assert!(cfg.overlay);
        assert_eq!(cfg.overlay_every, 1);
        assert!(cfg.validate().is_err(), "1 lane but 4 keys");
    }

    #[test]
    fn explicit_bounds_win_over_sample() {
        let cfg = parse("[Color]\nSample=0,200,200\nTolerance=2,10,10\nLower=170,100,100\nUpper=180,255,255\n");
        let range = cfg.color_range().unwrap();
        assert_eq!(range.lower(), Hsv::new(170, 100, 100));

        let sampled = parse("[Color]\nSample=90,200,200\nTolerance=2,10,10\n");
        let range = sampled.color_range().unwrap();
        assert_eq!(range.lower(), Hsv::new(88, 190, 190));
        assert_eq!(range.upper(), Hsv::new(92, 210, 210));
    }

    #[test]
    fn region_from_absolute_or_window_selection() {
        let abs = parse("[Region]\nLeft=10\nTop=20\nWidth=400\nHeight=600\n");
        assert_eq!(abs.region, Some(Region::new(10, 20, 400, 600).unwrap()));

        let rel = parse(
            "[Region]\nWindowLeft=100\nWindowTop=50\nRoiX=5\nRoiY=6\nRoiWidth=300\nRoiHeight=200\n",
        );
        assert_eq!(rel.region, Some(Region::new(105, 56, 300, 200).unwrap()));

        assert_eq!(parse("[Region]\nLeft=1\nTop=1\nWidth=0\nHeight=5\n").region, None);
        assert_eq!(parse("[Region]\nLeft=\nTop=\n").region, None);
    }

    #[test]
    fn bad_keys_fall_back_and_duplicates_fail_validation() {
        let cfg = parse("[Lanes]\nKeys=KeyZ,F99\n");
        assert_eq!(cfg.lane_keys.len(), 4, "unparseable list falls back to defaults");

        let dup = parse("[Lanes]\nCount=2\nKeys=z,Z\n");
        assert!(dup.validate().is_err());
    }

    #[test]
    fn hsv_triples_need_exactly_three_bytes() {
        assert_eq!(parse_hsv(" 1, 2 ,3"), Some(Hsv::new(1, 2, 3)));
        assert_eq!(parse_hsv("1,2"), None);
        assert_eq!(parse_hsv("1,2,3,4"), None);
        assert_eq!(parse_hsv("1,2,300"), None);
    }
}
