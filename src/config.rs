use crate::core::input::{DEFAULT_KEYS, NUM_LANES};
use crate::game::gameplay::EngineSettings;
use crate::game::scheduler::{DEFAULT_FLIGHT_TIME_MS, MAX_SPEED, MIN_SPEED, flight_time_for_speed};
use crate::game::timing_windows::JudgmentWindows;
use log::{info, warn};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

const CONFIG_PATH: &str = "voidbeat.ini";
const OPTIONS: &str = "Options";
const OPTION_KEYS: [&str; 5] = ["AutoPlayJitterMs", "InputOffsetMs", "Keys", "LogLevel", "Speed"];

/// `[Section]` headers and `Key=Value` lines; `;` or `#` starts a comment line.
#[derive(Debug, Default)]
struct IniFile {
    values: FxHashMap<(String, String), String>,
}

impl IniFile {
    fn read(path: &Path) -> std::io::Result<Self> {
        std::fs::read_to_string(path).map(|text| Self::parse(&text))
    }

    fn parse(text: &str) -> Self {
        let mut values = FxHashMap::default();
        let mut section = "";
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with([';', '#']) {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim();
            } else if let Some((key, value)) = line.split_once('=')
                && !key.trim().is_empty()
            {
                values.insert(
                    (section.to_string(), key.trim().to_string()),
                    value.trim().to_string(),
                );
            }
        }
        Self { values }
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.values
            .get(&(section.to_string(), key.to_string()))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
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

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Scroll speed in [1, 10]. None keeps the classic 667ms flight.
    pub speed: Option<f64>,
    /// Output latency compensation, subtracted from every press.
    pub input_offset_ms: f64,
    /// Key character per lane, uppercase.
    pub keys: [char; NUM_LANES],
    pub log_level: LogLevel,
    // Headless host only: max random error of autoplay presses.
    pub auto_play_jitter_ms: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed: None,
            input_offset_ms: 0.0,
            keys: DEFAULT_KEYS,
            log_level: LogLevel::Warn,
            auto_play_jitter_ms: 0.0,
        }
    }
}

impl Config {
    pub fn flight_time_ms(&self) -> f64 {
        self.speed.map_or(DEFAULT_FLIGHT_TIME_MS, flight_time_for_speed)
    }

    /// Engine settings for a session whose audio has `lead_silence_ms` of
    /// leading silence.
    pub fn engine_settings(&self, lead_silence_ms: f64) -> EngineSettings {
        EngineSettings {
            flight_time_ms: self.flight_time_ms(),
            input_offset_ms: self.input_offset_ms,
            windows: JudgmentWindows::default(),
            lead_silence_ms,
        }
    }

    fn from_ini(conf: &IniFile) -> Self {
        let default = Self::default();
        let opt = |key: &str| conf.get(OPTIONS, key).filter(|v| !v.is_empty());
        let finite = |key: &str| {
            opt(key)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        Self {
            speed: finite("Speed").map(|s| s.clamp(MIN_SPEED, MAX_SPEED)),
            input_offset_ms: finite("InputOffsetMs").unwrap_or(default.input_offset_ms),
            keys: opt("Keys").map_or(default.keys, parse_keys),
            log_level: opt("LogLevel")
                .and_then(|v| LogLevel::from_str(v).ok())
                .unwrap_or(default.log_level),
            auto_play_jitter_ms: finite("AutoPlayJitterMs")
                .map_or(default.auto_play_jitter_ms, |v| v.max(0.0)),
        }
    }

    fn to_ini_string(&self) -> String {
        let keys: Vec<String> = self.keys.iter().map(char::to_string).collect();
        let speed = self.speed.map(|s| s.to_string()).unwrap_or_default();
        let mut content = String::new();
        content.push_str("[Options]\n");
        content.push_str(&format!("AutoPlayJitterMs={}\n", self.auto_play_jitter_ms));
        content.push_str(&format!("InputOffsetMs={}\n", self.input_offset_ms));
        content.push_str(&format!("Keys={}\n", keys.join(",")));
        content.push_str(&format!("LogLevel={}\n", self.log_level.as_str()));
        content.push_str(&format!("Speed={speed}\n"));
        content
    }
}

/// Comma-separated key characters, one per lane. A blank or missing entry
/// keeps that lane's default.
fn parse_keys(value: &str) -> [char; NUM_LANES] {
    let mut keys = DEFAULT_KEYS;
    for (slot, part) in keys.iter_mut().zip(value.split(',')) {
        if let Some(c) = part.trim().chars().next() {
            *slot = c.to_ascii_uppercase();
        }
    }
    keys
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn load_from(path: &Path) -> Config {
    if !path.exists() {
        info!("'{}' not found, creating with default values.", path.display());
        if let Err(e) = std::fs::write(path, Config::default().to_ini_string()) {
            warn!("Failed to create default config file: {e}");
        }
    }

    match IniFile::read(path) {
        Ok(conf) => {
            let cfg = Config::from_ini(&conf);
            info!("Configuration loaded from '{}'.", path.display());
            if OPTION_KEYS.iter().any(|k| conf.get(OPTIONS, k).is_none()) {
                save_to(path, &cfg);
                info!("'{}' updated with default values for any missing fields.", path.display());
            }
            cfg
        }
        Err(e) => {
            warn!("Failed to load '{}': {e}. Using default values.", path.display());
            Config::default()
        }
    }
}

fn save_to(path: &Path, cfg: &Config) {
    if let Err(e) = std::fs::write(path, cfg.to_ini_string()) {
        warn!("Failed to save config file: {e}");
    }
}

fn save() {
    save_to(Path::new(CONFIG_PATH), &get());
}

pub fn load() {
    let cfg = load_from(Path::new(CONFIG_PATH));
    *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = cfg;
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Applies `f` and writes the file if anything changed.
fn update(f: impl FnOnce(&mut Config)) {
    let dirty = {
        let mut cfg = CONFIG.lock().unwrap_or_else(PoisonError::into_inner);
        let before = *cfg;
        f(&mut cfg);
        *cfg != before
    };
    if dirty {
        save();
    }
}

pub fn update_speed(speed: Option<f64>) {
    let speed = speed
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(MIN_SPEED, MAX_SPEED));
    update(|cfg| cfg.speed = speed);
}

pub fn update_input_offset_ms(offset_ms: f64) {
    if !offset_ms.is_finite() {
        return;
    }
    update(|cfg| cfg.input_offset_ms = offset_ms);
}
