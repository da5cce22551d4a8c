use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use voidbeat::config;
use voidbeat::core::audio;
use voidbeat::core::input::{KeyEvent, KeyMap, NUM_LANES};
use voidbeat::core::playback::{
    PlaybackHandle, PlaybackSource, SharedPlayback, SimulatedPlayback,
};
use voidbeat::game::chart::{self, Chart};
use voidbeat::game::gameplay::{self, EngineEvent, Phase};
use voidbeat::game::note::NoteType;
use voidbeat::game::song::PlaybackKind;

const FRAME_MS: f64 = 1000.0 / 60.0;
const SONGS_DIR: &str = "songs";
// Embedded players only report their position in coarse steps.
const REMOTE_REPORT_QUANTUM_MS: f64 = 100.0;
// Wall time allowed past the chart's last tail before the host gives up.
const SESSION_GRACE_MS: f64 = 10_000.0;
const USAGE: &str =
    "usage: voidbeat <chart.json> [--song NAME] [--audio FILE] [--speed 1-10] [--offset MS]";

#[derive(Debug, Default)]
struct Args {
    chart: PathBuf,
    song: Option<String>,
    audio: Option<PathBuf>,
    speed: Option<f64>,
    offset_ms: Option<f64>,
}

fn parse_args(mut it: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    let mut chart = None;
    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().ok_or(format!("{name} needs a value\n{USAGE}"));
        match arg.as_str() {
            "--song" => args.song = Some(value("--song")?),
            "--audio" => args.audio = Some(PathBuf::from(value("--audio")?)),
            "--speed" => {
                let v = value("--speed")?;
                args.speed = Some(v.parse().map_err(|_| format!("bad --speed '{v}'"))?);
            }
            "--offset" => {
                let v = value("--offset")?;
                args.offset_ms = Some(v.parse().map_err(|_| format!("bad --offset '{v}'"))?);
            }
            _ if chart.is_none() && !arg.starts_with("--") => chart = Some(PathBuf::from(&arg)),
            _ => return Err(format!("unexpected argument '{arg}'\n{USAGE}")),
        }
    }
    args.chart = chart.ok_or(USAGE)?;
    Ok(args)
}

/// Presses every note's key at its target time (plus optional human error)
/// and lets go at the tail.
struct AutoPlay {
    // (game time, key, pressed)
    script: Vec<(f64, char, bool)>,
    next: usize,
}

impl AutoPlay {
    fn new(chart: &Chart, keys: [char; NUM_LANES], jitter_ms: f64, rng: &mut StdRng) -> Self {
        let mut script = Vec::with_capacity(chart.len() * 2);
        for note in chart.notes() {
            let err = if jitter_ms > 0.0 {
                rng.random_range(-jitter_ms..=jitter_ms)
            } else {
                0.0
            };
            let key = keys[note.lane.index()];
            let press_at = note.time_ms + err;
            let release_at = match note.note_type {
                NoteType::Long => note.end_time_ms().max(press_at),
                NoteType::Short => press_at,
            };
            script.push((press_at, key, true));
            script.push((release_at, key, false));
        }
        // Stable: a release never overtakes its own press.
        script.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { script, next: 0 }
    }

    fn due(&mut self, game_time_ms: f64) -> Vec<KeyEvent> {
        let mut out = Vec::new();
        while let Some(&(at, key, pressed)) = self.script.get(self.next) {
            if at > game_time_ms {
                break;
            }
            out.push(KeyEvent {
                key,
                pressed,
                repeat: false,
            });
            self.next += 1;
        }
        out
    }
}

/// Stands in for the audio output thread of a local file: it picks up the
/// engine's commands and publishes the decoded position after every frame.
struct LocalDevice {
    handle: PlaybackHandle,
    clock: SimulatedPlayback,
}

impl LocalDevice {
    fn service(&mut self, wall_ms: f64) {
        self.clock.advance_to(wall_ms);
        // Commands land on the next buffer boundary.
        if self.handle.take_seek_request() {
            self.clock.seek_to_start();
        }
        if self.handle.take_play_request() {
            self.clock.start();
        }
        match self.clock.current_position_ms() {
            Some(ms) => self.handle.publish_position_ms(ms),
            None => self.handle.clear_position(),
        }
    }
}

enum HostPlayback {
    Remote(SimulatedPlayback),
    Local {
        engine: SharedPlayback,
        device: LocalDevice,
    },
}

impl HostPlayback {
    fn local() -> Self {
        let (engine, handle) = SharedPlayback::new();
        Self::Local {
            engine,
            device: LocalDevice {
                handle,
                clock: SimulatedPlayback::new(),
            },
        }
    }

    fn advance_to(&mut self, wall_ms: f64) {
        match self {
            Self::Remote(player) => player.advance_to(wall_ms),
            Self::Local { device, .. } => device.service(wall_ms),
        }
    }

    fn source(&mut self) -> &mut dyn PlaybackSource {
        match self {
            Self::Remote(player) => player,
            Self::Local { engine, .. } => engine,
        }
    }
}

fn log_event(ev: &EngineEvent) {
    match ev {
        EngineEvent::PhaseChanged(phase) => info!("Phase: {phase:?}"),
        EngineEvent::PlaybackStarted => info!("Playback started"),
        EngineEvent::NoteSpawned(handle) => debug!("Note {} spawned", handle.chart_index()),
        EngineEvent::HoldStarted { handle, lane } => {
            debug!("Hold on lane {} (note {})", lane.index(), handle.chart_index());
        }
        EngineEvent::Judged(j) => match j.time_error_ms {
            Some(err) => info!("{} lane {} ({err:+.1}ms)", j.outcome.label(), j.lane.index()),
            None => info!("{} lane {}", j.outcome.label(), j.lane.index()),
        },
        EngineEvent::SessionEnded { reveal_after_ms } => {
            info!("Session ended; results in {reveal_after_ms:.0}ms");
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    config::load();
    log::set_max_level(config::get().log_level.as_level_filter());

    let args = parse_args(std::env::args().skip(1))?;
    if args.speed.is_some() {
        config::update_speed(args.speed);
    }
    if let Some(offset) = args.offset_ms {
        config::update_input_offset_ms(offset);
    }
    let cfg = config::get();

    let loaded = chart::load_chart_file(&args.chart, args.song.as_deref())?;
    let songs_dir = args
        .chart
        .parent()
        .map_or_else(|| PathBuf::from(SONGS_DIR), |p| p.join(SONGS_DIR));
    let kind = match &args.audio {
        Some(path) => Some(PlaybackKind::LocalFile { path: path.clone() }),
        None => loaded.meta.playback_kind(&songs_dir),
    };
    let Some(kind) = kind else {
        let name = loaded.meta.display_name();
        return Err(format!("'{name}' has neither a video link nor an audio file").into());
    };

    let (lead_silence_ms, mut playback) = match &kind {
        PlaybackKind::RemoteVideo { video_id } => {
            info!("Remote video {video_id}; leading silence not measured");
            (
                0.0,
                HostPlayback::Remote(
                    SimulatedPlayback::new().with_report_quantum(REMOTE_REPORT_QUANTUM_MS),
                ),
            )
        }
        PlaybackKind::LocalFile { path } => (
            audio::lead_silence_or_zero(Some(path.as_path())),
            HostPlayback::local(),
        ),
    };

    let title = loaded.meta.title_line();
    let chart = Arc::new(loaded.chart);
    let mut rng = StdRng::from_os_rng();
    let mut autoplay = AutoPlay::new(&chart, cfg.keys, cfg.auto_play_jitter_ms, &mut rng);
    let keymap = KeyMap::new(cfg.keys);
    let settings = cfg.engine_settings(lead_silence_ms);
    let max_wall_ms = chart.last_end_time_ms() - chart.first_note_time_ms()
        + settings.flight_time_ms
        + SESSION_GRACE_MS;

    let mut state = gameplay::init(chart, &title, settings);
    gameplay::mark_ready(&mut state)?;

    let mut now_ms = 0.0;
    gameplay::start(&mut state, now_ms)?;
    loop {
        playback.advance_to(now_ms);
        let phase = gameplay::update(&mut state, now_ms, playback.source());
        for ev in state.drain_events() {
            log_event(&ev);
        }
        if phase == Phase::Ended {
            break;
        }
        for key in autoplay.due(state.game_time_ms()) {
            if let Some(edge) = keymap.edge_for(key) {
                gameplay::handle_input_edge(&mut state, edge);
            }
        }
        now_ms += FRAME_MS;
        if now_ms > max_wall_ms {
            warn!("Session still running after {max_wall_ms:.0}ms; ending it.");
            gameplay::end(&mut state);
        }
    }

    let summary = state.summary().ok_or("session did not end")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("Score {}", summary.score_display());
    if let Some(entry) = summary.ranking_entry("") {
        println!("{}", serde_json::to_string(&entry)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use voidbeat::game::note::ChartNote;
    use voidbeat::core::input::{DEFAULT_KEYS, Lane};

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags_in_any_order() {
        let a = args(&["--song", "Void", "chart.json", "--speed", "7", "--offset", "-15"])
            .expect("valid args");
        assert_eq!(a.chart, PathBuf::from("chart.json"));
        assert_eq!(a.song.as_deref(), Some("Void"));
        assert_eq!(a.speed, Some(7.0));
        assert_eq!(a.offset_ms, Some(-15.0));
        assert!(args(&[]).is_err());
        assert!(args(&["chart.json", "--song"]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
    }

    #[test]
    fn local_device_follows_engine_commands() {
        let mut host = HostPlayback::local();
        host.advance_to(0.0);
        assert_eq!(host.source().current_position_ms(), None, "silent until started");

        host.source().seek_to_start();
        host.source().start();
        host.advance_to(100.0);
        assert_eq!(host.source().current_position_ms(), Some(0.0));
        host.advance_to(350.0);
        assert_eq!(host.source().current_position_ms(), Some(250.0));
    }

    #[test]
    fn autoplay_presses_then_releases_in_time_order() {
        let chart = Chart::from_notes(vec![
            ChartNote {
                time_ms: 1000.0,
                lane: Lane::OuterLeft,
                note_type: NoteType::Long,
                duration_ms: 500.0,
            },
            ChartNote {
                time_ms: 1200.0,
                lane: Lane::OuterRight,
                note_type: NoteType::Short,
                duration_ms: 0.0,
            },
        ])
        .expect("valid chart");
        let mut rng = StdRng::seed_from_u64(1);
        let mut auto = AutoPlay::new(&chart, DEFAULT_KEYS, 0.0, &mut rng);
        assert!(auto.due(999.0).is_empty());
        let first = auto.due(1000.0);
        assert_eq!(first.len(), 1);
        assert_eq!((first[0].key, first[0].pressed), ('D', true));
        let second = auto.due(1200.0);
        assert_eq!(second.len(), 2, "short note press and release share an instant");
        assert!(second[0].pressed && !second[1].pressed);
        let last = auto.due(1500.0);
        assert_eq!((last[0].key, last[0].pressed), ('D', false));
    }
}
