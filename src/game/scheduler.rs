use log::{debug, trace};
use smallvec::SmallVec;
use std::sync::Arc;

use crate::core::input::Lane;
use crate::game::chart::Chart;
use crate::game::judgment::{Judgment, JudgmentOutcome};
use crate::game::note::{ActiveNote, NoteHandle, NoteType};
use crate::game::timing_windows::JudgmentWindows;

/// Flight time used when no scroll speed has been configured.
pub const DEFAULT_FLIGHT_TIME_MS: f64 = 667.0;
pub const MIN_SPEED: f64 = 1.0;
pub const MAX_SPEED: f64 = 10.0;
// Empirical slack: an unplayed note is swept once it is 10% of a flight
// past its end, but never while it could still be judged.
pub const MISS_SLACK_PROGRESS: f64 = 1.1;

/// Travel time from spawn to the judgment line for a speed setting in
/// `[1, 10]`: 940ms at the slowest, 400ms at the fastest.
#[inline(always)]
pub fn flight_time_for_speed(speed: f64) -> f64 {
    let speed = if speed.is_finite() { speed } else { 5.0 };
    1000.0 - speed.clamp(MIN_SPEED, MAX_SPEED) * 60.0
}

#[inline(always)]
fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// What the render adapter needs to place one note this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteView {
    pub handle: NoteHandle,
    pub lane: Lane,
    pub note_type: NoteType,
    pub progress: f64,
    pub end_progress: f64,
    pub holding: bool,
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub spawned: SmallVec<[NoteHandle; 4]>,
    /// Sweep misses and hold completions, in active-set order.
    pub judged: SmallVec<[Judgment; 4]>,
}

/// Owns the chart timeline and the notes currently in flight.
#[derive(Debug)]
pub struct NoteScheduler {
    chart: Arc<Chart>,
    cursor: usize,
    active: Vec<ActiveNote>,
    views: Vec<NoteView>,
    flight_time_ms: f64,
    miss_progress: f64,
    resolved: usize,
}

impl NoteScheduler {
    /// `input_offset_ms` is the press calibration; a positive offset judges
    /// presses against an earlier instant, so the sweep waits that much longer.
    pub fn new(
        chart: Arc<Chart>,
        flight_time_ms: f64,
        windows: &JudgmentWindows,
        input_offset_ms: f64,
    ) -> Self {
        let flight_time_ms = if flight_time_ms.is_finite() && flight_time_ms > 0.0 {
            flight_time_ms
        } else {
            DEFAULT_FLIGHT_TIME_MS
        };
        // Sweeping must lag the widest window, however short the flight.
        let late_ms = windows.normal_ms() + finite_or_zero(input_offset_ms).max(0.0);
        let miss_progress = MISS_SLACK_PROGRESS.max(1.0 + late_ms / flight_time_ms);
        Self {
            chart,
            cursor: 0,
            active: Vec::new(),
            views: Vec::new(),
            flight_time_ms,
            miss_progress,
            resolved: 0,
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.active.clear();
        self.views.clear();
        self.resolved = 0;
    }

    /// Spawn, then progress, then sweep. Notes spawned by this call are
    /// never swept by it.
    pub fn tick(&mut self, game_time_ms: f64) -> TickReport {
        let mut report = TickReport::default();
        let first_new = self.cursor;
        self.spawn_due(game_time_ms, &mut report);

        self.views.clear();
        let flight = self.flight_time_ms;
        let mut i = 0;
        while i < self.active.len() {
            let note = self.active[i];
            let progress = note.progress(game_time_ms, flight);
            let end_progress = note.end_progress(game_time_ms, flight);
            let fresh = note.handle.chart_index() >= first_new;

            if !fresh && note.is_pending() && end_progress > self.miss_progress {
                let missed = self.resolve_miss(i);
                debug!(
                    "Miss: lane {} note {} swept at {:.1}ms (end {:.1}ms)",
                    missed.lane.index(),
                    missed.handle.chart_index(),
                    game_time_ms,
                    missed.end_ms
                );
                report.judged.push(Judgment {
                    handle: missed.handle,
                    lane: missed.lane,
                    outcome: JudgmentOutcome::Miss,
                    time_error_ms: None,
                });
                continue;
            }

            if note.holding && game_time_ms >= note.end_ms {
                let done = self.resolve_hit(i);
                debug!(
                    "Hold complete: lane {} note {} at {:.1}ms",
                    done.lane.index(),
                    done.handle.chart_index(),
                    game_time_ms
                );
                report.judged.push(Judgment {
                    handle: done.handle,
                    lane: done.lane,
                    outcome: JudgmentOutcome::LongComplete,
                    time_error_ms: None,
                });
                continue;
            }

            self.views.push(NoteView {
                handle: note.handle,
                lane: note.lane,
                note_type: note.note_type,
                progress,
                end_progress,
                holding: note.holding,
            });
            i += 1;
        }
        report
    }

    fn spawn_due(&mut self, game_time_ms: f64, report: &mut TickReport) {
        let notes = self.chart.notes();
        while let Some(next) = notes.get(self.cursor) {
            if next.time_ms - self.flight_time_ms > game_time_ms {
                break;
            }
            let active = ActiveNote::spawn(self.cursor, next);
            trace!(
                "Spawn: lane {} note {} target {:.1}ms at {:.1}ms",
                active.lane.index(),
                self.cursor,
                active.target_ms,
                game_time_ms
            );
            report.spawned.push(active.handle);
            self.active.push(active);
            self.cursor += 1;
        }
    }

    pub(crate) fn begin_hold(&mut self, index: usize) {
        if let Some(note) = self.active.get_mut(index) {
            note.holding = true;
        }
    }

    pub(crate) fn resolve_hit(&mut self, index: usize) -> ActiveNote {
        let mut note = self.active.remove(index);
        note.hit = true;
        note.holding = false;
        self.resolved += 1;
        note
    }

    pub(crate) fn resolve_miss(&mut self, index: usize) -> ActiveNote {
        let mut note = self.active.remove(index);
        note.holding = false;
        self.resolved += 1;
        note
    }

    #[inline(always)]
    pub fn active(&self) -> &[ActiveNote] {
        &self.active
    }

    /// Render list as of the last tick.
    #[inline(always)]
    pub fn views(&self) -> &[NoteView] {
        &self.views
    }

    /// Index of the next chart note to spawn.
    #[inline(always)]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline(always)]
    pub const fn resolved_count(&self) -> usize {
        self.resolved
    }

    #[inline(always)]
    pub const fn flight_time_ms(&self) -> f64 {
        self.flight_time_ms
    }

    /// End-progress past which a pending note is swept as a miss.
    #[inline(always)]
    pub const fn miss_progress(&self) -> f64 {
        self.miss_progress
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    /// Every chart note spawned and none left in flight.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.chart.len() && self.active.is_empty()
    }
}
