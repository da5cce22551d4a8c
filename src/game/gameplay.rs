use log::{debug, info, warn};
use std::sync::Arc;

use crate::core::input::{InputEdge, Lane};
use crate::core::playback::PlaybackSource;
use crate::game::chart::{Chart, ChartError};
use crate::game::judgment::{self, Judgment, PressResult};
use crate::game::note::{ChartNote, NoteHandle};
use crate::game::scheduler::{DEFAULT_FLIGHT_TIME_MS, NoteScheduler, NoteView};
use crate::game::scores::ScoreState;
use crate::game::stage_stats::StageSummary;
use crate::game::timing::{ClockCorrection, ClockSync};
use crate::game::timing_stats::compute_timing_stats;
use crate::game::timing_windows::JudgmentWindows;

/// Delay between the session ending and the result screen appearing.
pub const RESULT_REVEAL_DELAY_MS: f64 = 2000.0;
const STATUS_LOG_INTERVAL_MS: f64 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Loading,
    Ready,
    LeadIn,
    Playing,
    Ended,
}

impl Phase {
    const fn next(self) -> Option<Phase> {
        match self {
            Self::Loading => Some(Self::Ready),
            Self::Ready => Some(Self::LeadIn),
            Self::LeadIn => Some(Self::Playing),
            Self::Playing => Some(Self::Ended),
            Self::Ended => None,
        }
    }

    /// Phases in which lane input is judged.
    #[inline(always)]
    pub const fn accepts_input(self) -> bool {
        matches!(self, Self::LeadIn | Self::Playing)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("chart rejected: {0}")]
    ChartInvalid(#[from] ChartError),
    #[error("phase {to:?} cannot follow {from:?}")]
    PhaseOrder { from: Phase, to: Phase },
}

/// Everything the engine takes from configuration and session setup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineSettings {
    pub flight_time_ms: f64,
    /// Subtracted from the press instant before judging.
    pub input_offset_ms: f64,
    pub windows: JudgmentWindows,
    /// Leading silence of the audio asset; 0 when unknown.
    pub lead_silence_ms: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            flight_time_ms: DEFAULT_FLIGHT_TIME_MS,
            input_offset_ms: 0.0,
            windows: JudgmentWindows::default(),
            lead_silence_ms: 0.0,
        }
    }
}

/// What the host reacts to: render/FX cues, playback and UI transitions.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    PhaseChanged(Phase),
    PlaybackStarted,
    NoteSpawned(NoteHandle),
    HoldStarted { handle: NoteHandle, lane: Lane },
    Judged(Judgment),
    SessionEnded { reveal_after_ms: f64 },
}

/// One play session. Mutated only by [`update`] and the input handlers,
/// never concurrently.
#[derive(Debug)]
pub struct State {
    phase: Phase,
    settings: EngineSettings,
    song_name: String,
    clock: ClockSync,
    scheduler: NoteScheduler,
    score: ScoreState,
    judgments: Vec<Judgment>,
    events: Vec<EngineEvent>,
    last_correction: Option<ClockCorrection>,
    status_log_timer_ms: f64,
}

pub fn init(chart: Arc<Chart>, song_name: &str, settings: EngineSettings) -> State {
    let clock = ClockSync::new(chart.first_note_time_ms(), settings.lead_silence_ms);
    let scheduler = NoteScheduler::new(
        chart,
        settings.flight_time_ms,
        &settings.windows,
        settings.input_offset_ms,
    );
    info!(
        "Session '{}': {} notes, flight {:.0}ms, offset {:.0}ms, lead silence {:.0}ms",
        song_name,
        scheduler.chart().len(),
        scheduler.flight_time_ms(),
        settings.input_offset_ms,
        settings.lead_silence_ms
    );
    State {
        phase: Phase::Loading,
        settings,
        song_name: song_name.to_string(),
        clock,
        scheduler,
        score: ScoreState::new(),
        judgments: Vec::new(),
        events: Vec::new(),
        last_correction: None,
        status_log_timer_ms: 0.0,
    }
}

/// Validates raw notes and builds a session; no playable state is reached
/// for a rejected chart.
pub fn init_from_notes(
    notes: Vec<ChartNote>,
    song_name: &str,
    settings: EngineSettings,
) -> Result<State, EngineError> {
    let chart = Chart::from_notes(notes).inspect_err(|e| warn!("Chart rejected: {e}"))?;
    Ok(init(Arc::new(chart), song_name, settings))
}

fn transition(state: &mut State, to: Phase) -> Result<(), EngineError> {
    let from = state.phase;
    if from.next() != Some(to) {
        return Err(EngineError::PhaseOrder { from, to });
    }
    info!("Phase {from:?} -> {to:?}");
    state.phase = to;
    state.events.push(EngineEvent::PhaseChanged(to));
    Ok(())
}

/// Assets are loaded; the session waits for the player.
pub fn mark_ready(state: &mut State) -> Result<(), EngineError> {
    transition(state, Phase::Ready)
}

/// Player start action. Game time begins one flight before the first note so
/// it scrolls in from the top.
pub fn start(state: &mut State, now_ms: f64) -> Result<(), EngineError> {
    transition(state, Phase::LeadIn)?;
    state.scheduler.reset();
    state.score.reset();
    state.judgments.clear();
    state.status_log_timer_ms = 0.0;
    let start_ms = state.scheduler.chart().first_note_time_ms() - state.scheduler.flight_time_ms();
    state.clock.reset(start_ms, now_ms);
    debug!(
        "Lead-in from {start_ms:.1}ms, playback at {:.1}ms",
        state.clock.sync_origin_ms()
    );
    Ok(())
}

/// Per-frame entry point: advance the clock, then spawn, progress and sweep
/// notes, then check for the end of the chart. Returns the phase after the
/// frame; nothing happens once [`Phase::Ended`] is reached.
pub fn update(state: &mut State, now_ms: f64, playback: &mut dyn PlaybackSource) -> Phase {
    if !state.phase.accepts_input() {
        return state.phase;
    }
    let dt = state.clock.frame_delta(now_ms);

    match state.phase {
        Phase::LeadIn => {
            if state.clock.advance_lead_in(dt) {
                playback.seek_to_start();
                playback.start();
                state.events.push(EngineEvent::PlaybackStarted);
                info!("Playback started at game time {:.1}ms", state.clock.game_time_ms());
                let entered = transition(state, Phase::Playing);
                debug_assert!(entered.is_ok(), "lead-in is always followed by playing");
            }
        }
        Phase::Playing => {
            let reading = playback.current_position_ms();
            state.last_correction = Some(state.clock.advance_synced(dt, reading));
        }
        _ => {}
    }

    let game_time_ms = state.clock.game_time_ms();
    let report = state.scheduler.tick(game_time_ms);
    state
        .events
        .extend(report.spawned.iter().copied().map(EngineEvent::NoteSpawned));
    for j in report.judged {
        record_judgment(state, j);
    }

    if state.phase == Phase::Playing && state.scheduler.is_exhausted() {
        end(state);
    }

    state.status_log_timer_ms += dt;
    if state.status_log_timer_ms >= STATUS_LOG_INTERVAL_MS {
        info!(
            "Time: {:.1}ms, Score: {}, Combo: {}, Misses: {}, Active Notes: {}",
            game_time_ms,
            state.score.score(),
            state.score.combo(),
            state.score.counts().miss,
            state.scheduler.active().len()
        );
        state.status_log_timer_ms -= STATUS_LOG_INTERVAL_MS;
    }
    state.phase
}

fn record_judgment(state: &mut State, j: Judgment) {
    state.score.apply(j.outcome);
    debug!(
        "{} lane {} note {} (combo {}, score {})",
        j.outcome.label(),
        j.lane.index(),
        j.handle.chart_index(),
        state.score.combo(),
        state.score.score()
    );
    state.judgments.push(j);
    state.events.push(EngineEvent::Judged(j));
}

/// Lane press at the current game time.
pub fn on_press(state: &mut State, lane: Lane) -> PressResult {
    if !state.phase.accepts_input() {
        return PressResult::Ignored;
    }
    let result = judgment::evaluate_press(
        &mut state.scheduler,
        lane,
        state.clock.game_time_ms(),
        state.settings.input_offset_ms,
        &state.settings.windows,
    );
    match result {
        PressResult::Judged(j) => record_judgment(state, j),
        PressResult::HoldStarted { handle, lane } => {
            state.events.push(EngineEvent::HoldStarted { handle, lane });
        }
        PressResult::Ignored => {}
    }
    result
}

/// Lane release at the current game time; only meaningful while a hold is
/// engaged in that lane.
pub fn on_release(state: &mut State, lane: Lane) -> Option<Judgment> {
    if !state.phase.accepts_input() {
        return None;
    }
    let j = judgment::evaluate_release(&mut state.scheduler, lane, state.clock.game_time_ms())?;
    record_judgment(state, j);
    Some(j)
}

pub fn handle_input_edge(state: &mut State, edge: InputEdge) {
    if edge.pressed {
        on_press(state, edge.lane);
    } else {
        on_release(state, edge.lane);
    }
}

/// Ends the session. Idempotent; may also be used to abort early.
pub fn end(state: &mut State) {
    if state.phase == Phase::Ended {
        return;
    }
    info!(
        "Session ended at {:.1}ms: score {}, max combo {}",
        state.clock.game_time_ms(),
        state.score.score(),
        state.score.max_combo()
    );
    state.phase = Phase::Ended;
    state.events.push(EngineEvent::PhaseChanged(Phase::Ended));
    state.events.push(EngineEvent::SessionEnded {
        reveal_after_ms: RESULT_REVEAL_DELAY_MS,
    });
}

impl State {
    #[inline(always)]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[inline(always)]
    pub const fn game_time_ms(&self) -> f64 {
        self.clock.game_time_ms()
    }

    #[inline(always)]
    pub const fn score(&self) -> &ScoreState {
        &self.score
    }

    #[inline(always)]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn chart(&self) -> &Chart {
        self.scheduler.chart()
    }

    pub fn song_name(&self) -> &str {
        &self.song_name
    }

    /// Render list from the last frame.
    pub fn views(&self) -> &[NoteView] {
        self.scheduler.views()
    }

    pub fn spawn_cursor(&self) -> usize {
        self.scheduler.cursor()
    }

    pub fn resolved_notes(&self) -> usize {
        self.scheduler.resolved_count()
    }

    pub const fn last_correction(&self) -> Option<ClockCorrection> {
        self.last_correction
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Final snapshot; only available once the session has ended.
    pub fn summary(&self) -> Option<StageSummary> {
        (self.phase == Phase::Ended).then(|| {
            StageSummary::from_score(
                &self.song_name,
                &self.score,
                self.scheduler.chart().len(),
                compute_timing_stats(&self.judgments),
            )
        })
    }
}
