use log::debug;

use crate::core::input::Lane;
use crate::game::note::{ActiveNote, NoteHandle, NoteType};
use crate::game::scheduler::NoteScheduler;
use crate::game::timing_windows::JudgmentWindows;

/// Per-category counter a judgment lands in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JudgeGrade {
    Perfect,
    Great,
    Good,
    Normal,
    Miss,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum JudgmentOutcome {
    Perfect,
    Great,
    Good,
    Normal,
    Miss,
    /// A long note held from its press through its end time.
    LongComplete,
}

pub const POINTS_PERFECT: u32 = 1000;
pub const POINTS_GREAT: u32 = 700;
pub const POINTS_GOOD: u32 = 400;
pub const POINTS_NORMAL: u32 = 100;

impl JudgmentOutcome {
    #[inline(always)]
    pub const fn points(self) -> u32 {
        match self {
            Self::Perfect | Self::LongComplete => POINTS_PERFECT,
            Self::Great => POINTS_GREAT,
            Self::Good => POINTS_GOOD,
            Self::Normal => POINTS_NORMAL,
            Self::Miss => 0,
        }
    }

    #[inline(always)]
    pub const fn grade(self) -> JudgeGrade {
        match self {
            Self::Perfect | Self::LongComplete => JudgeGrade::Perfect,
            Self::Great => JudgeGrade::Great,
            Self::Good => JudgeGrade::Good,
            Self::Normal => JudgeGrade::Normal,
            Self::Miss => JudgeGrade::Miss,
        }
    }

    #[inline(always)]
    pub const fn is_miss(self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Tier label shown by the judgment display. Completed holds show as PERFECT.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Perfect | Self::LongComplete => "PERFECT",
            Self::Great => "GREAT",
            Self::Good => "GOOD",
            Self::Normal => "NORMAL",
            Self::Miss => "MISS",
        }
    }
}

/// Smallest window containing `abs_error_ms`, or `None` past NORMAL.
pub fn classify_error_ms(abs_error_ms: f64, windows: &JudgmentWindows) -> Option<JudgmentOutcome> {
    let abs = abs_error_ms.abs();
    if abs <= windows.perfect_ms() {
        Some(JudgmentOutcome::Perfect)
    } else if abs <= windows.great_ms() {
        Some(JudgmentOutcome::Great)
    } else if abs <= windows.good_ms() {
        Some(JudgmentOutcome::Good)
    } else if abs <= windows.normal_ms() {
        Some(JudgmentOutcome::Normal)
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Judgment {
    pub handle: NoteHandle,
    pub lane: Lane,
    pub outcome: JudgmentOutcome,
    /// Signed press error (positive = late) for tap judgments; `None` for
    /// sweeps, hold completions and let-gos.
    pub time_error_ms: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PressResult {
    /// No pending note of that lane within the NORMAL window. Not a miss.
    Ignored,
    HoldStarted { handle: NoteHandle, lane: Lane },
    Judged(Judgment),
}

/// Index and absolute error of the pending note in `lane` closest to
/// `sample_ms`. Ties keep the earliest-spawned note.
pub fn nearest_pending(active: &[ActiveNote], lane: Lane, sample_ms: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, note) in active
        .iter()
        .enumerate()
        .filter(|(_, n)| n.lane == lane && n.is_pending())
    {
        let abs_err = (sample_ms - note.target_ms).abs();
        match best {
            Some((_, best_err)) if abs_err >= best_err => {}
            _ => best = Some((idx, abs_err)),
        }
    }
    best
}

/// Judges a lane press at `game_time_ms`. The calibration offset is taken
/// off the press instant, never added to the note.
pub fn evaluate_press(
    scheduler: &mut NoteScheduler,
    lane: Lane,
    game_time_ms: f64,
    input_offset_ms: f64,
    windows: &JudgmentWindows,
) -> PressResult {
    let sample_ms = game_time_ms - input_offset_ms;
    let Some((idx, abs_err)) = nearest_pending(scheduler.active(), lane, sample_ms) else {
        return PressResult::Ignored;
    };
    let Some(outcome) = classify_error_ms(abs_err, windows) else {
        return PressResult::Ignored;
    };

    let note = scheduler.active()[idx];
    match note.note_type {
        NoteType::Long => {
            scheduler.begin_hold(idx);
            debug!(
                "Hold started: lane {} note {} err {:.1}ms",
                lane.index(),
                note.handle.chart_index(),
                sample_ms - note.target_ms
            );
            PressResult::HoldStarted {
                handle: note.handle,
                lane,
            }
        }
        NoteType::Short => {
            let resolved = scheduler.resolve_hit(idx);
            PressResult::Judged(Judgment {
                handle: resolved.handle,
                lane,
                outcome,
                time_error_ms: Some(sample_ms - resolved.target_ms),
            })
        }
    }
}

/// Ends the hold in `lane`, if any. Letting go before the tail is always a
/// miss; a release at or after the tail that beat the tick to it completes.
pub fn evaluate_release(
    scheduler: &mut NoteScheduler,
    lane: Lane,
    game_time_ms: f64,
) -> Option<Judgment> {
    let idx = scheduler
        .active()
        .iter()
        .position(|n| n.lane == lane && n.holding)?;
    let end_ms = scheduler.active()[idx].end_ms;
    let (note, outcome) = if game_time_ms >= end_ms {
        (scheduler.resolve_hit(idx), JudgmentOutcome::LongComplete)
    } else {
        (scheduler.resolve_miss(idx), JudgmentOutcome::Miss)
    };
    debug!(
        "Hold released: lane {} note {} at {:.1}ms (end {:.1}ms) -> {}",
        lane.index(),
        note.handle.chart_index(),
        game_time_ms,
        note.end_ms,
        outcome.label()
    );
    Some(Judgment {
        handle: note.handle,
        lane,
        outcome,
        time_error_ms: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::chart::Chart;
    use crate::game::note::ChartNote;
    use std::sync::Arc;

    const FLIGHT: f64 = 667.0;

    fn note(time_ms: f64, lane: Lane, note_type: NoteType, duration_ms: f64) -> ChartNote {
        ChartNote {
            time_ms,
            lane,
            note_type,
            duration_ms,
        }
    }

    fn scheduler_at(notes: Vec<ChartNote>, game_time_ms: f64) -> NoteScheduler {
        let chart = Arc::new(Chart::from_notes(notes).expect("valid test chart"));
        let mut s = NoteScheduler::new(chart, FLIGHT, &JudgmentWindows::default(), 0.0);
        s.tick(game_time_ms);
        s
    }

    #[test]
    fn classification_uses_smallest_containing_window() {
        let w = JudgmentWindows::default();
        assert_eq!(classify_error_ms(0.0, &w), Some(JudgmentOutcome::Perfect));
        assert_eq!(classify_error_ms(50.0, &w), Some(JudgmentOutcome::Perfect));
        assert_eq!(classify_error_ms(50.5, &w), Some(JudgmentOutcome::Great));
        assert_eq!(classify_error_ms(105.0, &w), Some(JudgmentOutcome::Great));
        assert_eq!(classify_error_ms(160.0, &w), Some(JudgmentOutcome::Good));
        assert_eq!(classify_error_ms(210.0, &w), Some(JudgmentOutcome::Normal));
        assert_eq!(classify_error_ms(211.0, &w), None);
        assert_eq!(classify_error_ms(-30.0, &w), Some(JudgmentOutcome::Perfect));
    }

    #[test]
    fn points_and_grades() {
        assert_eq!(JudgmentOutcome::Perfect.points(), 1000);
        assert_eq!(JudgmentOutcome::Great.points(), 700);
        assert_eq!(JudgmentOutcome::Good.points(), 400);
        assert_eq!(JudgmentOutcome::Normal.points(), 100);
        assert_eq!(JudgmentOutcome::Miss.points(), 0);
        assert_eq!(JudgmentOutcome::LongComplete.points(), 1000);
        assert_eq!(JudgmentOutcome::LongComplete.grade(), JudgeGrade::Perfect);
        assert_eq!(JudgmentOutcome::LongComplete.label(), "PERFECT");
    }

    #[test]
    fn exact_press_is_perfect_and_consumes_the_note() {
        let mut s = scheduler_at(vec![note(1000.0, Lane::OuterLeft, NoteType::Short, 0.0)], 1000.0);
        let result = evaluate_press(&mut s, Lane::OuterLeft, 1000.0, 0.0, &JudgmentWindows::default());
        match result {
            PressResult::Judged(j) => {
                assert_eq!(j.outcome, JudgmentOutcome::Perfect);
                assert_eq!(j.time_error_ms, Some(0.0));
            }
            other => panic!("expected a judgment, got {other:?}"),
        }
        assert!(s.active().is_empty(), "judged tap must leave the active set");
    }

    #[test]
    fn press_just_past_normal_is_a_no_op() {
        let mut s = scheduler_at(vec![note(1000.0, Lane::OuterLeft, NoteType::Short, 0.0)], 1000.0);
        let result = evaluate_press(&mut s, Lane::OuterLeft, 1211.0, 0.0, &JudgmentWindows::default());
        assert_eq!(result, PressResult::Ignored);
        assert_eq!(s.active().len(), 1, "no note may be consumed by an unmatched press");
        assert_eq!(s.resolved_count(), 0);
    }

    #[test]
    fn wrong_lane_press_is_ignored() {
        let mut s = scheduler_at(vec![note(1000.0, Lane::OuterLeft, NoteType::Short, 0.0)], 1000.0);
        let result = evaluate_press(&mut s, Lane::InnerRight, 1000.0, 0.0, &JudgmentWindows::default());
        assert_eq!(result, PressResult::Ignored);
    }

    #[test]
    fn input_offset_is_subtracted_from_the_press_instant() {
        let mut s = scheduler_at(vec![note(1000.0, Lane::InnerLeft, NoteType::Short, 0.0)], 1000.0);
        // Pressed at 1080 with 80ms of output latency: really on time.
        let result = evaluate_press(&mut s, Lane::InnerLeft, 1080.0, 80.0, &JudgmentWindows::default());
        assert!(
            matches!(result, PressResult::Judged(j) if j.outcome == JudgmentOutcome::Perfect),
            "offset-calibrated press should be PERFECT, got {result:?}"
        );
    }

    #[test]
    fn nearest_note_wins_over_spawn_order() {
        let mut s = scheduler_at(
            vec![
                note(1000.0, Lane::OuterRight, NoteType::Short, 0.0),
                note(1150.0, Lane::OuterRight, NoteType::Short, 0.0),
            ],
            1000.0,
        );
        let result = evaluate_press(&mut s, Lane::OuterRight, 1140.0, 0.0, &JudgmentWindows::default());
        match result {
            PressResult::Judged(j) => {
                assert_eq!(j.handle.chart_index(), 1, "the later but closer note must be judged");
                assert_eq!(j.outcome, JudgmentOutcome::Perfect);
            }
            other => panic!("expected a judgment, got {other:?}"),
        }
        assert_eq!(s.active()[0].handle.chart_index(), 0);
    }

    #[test]
    fn duplicate_times_pick_the_earliest_spawned() {
        let active = [
            ActiveNote::spawn(0, &note(1000.0, Lane::OuterLeft, NoteType::Short, 0.0)),
            ActiveNote::spawn(1, &note(1000.0, Lane::OuterLeft, NoteType::Short, 0.0)),
        ];
        assert_eq!(nearest_pending(&active, Lane::OuterLeft, 1010.0), Some((0, 10.0)));
    }

    #[test]
    fn long_press_starts_a_hold_without_scoring_a_tier() {
        let mut s = scheduler_at(vec![note(1000.0, Lane::InnerRight, NoteType::Long, 500.0)], 990.0);
        let result = evaluate_press(&mut s, Lane::InnerRight, 990.0, 0.0, &JudgmentWindows::default());
        assert!(matches!(result, PressResult::HoldStarted { lane: Lane::InnerRight, .. }));
        assert!(s.active()[0].holding);
        assert!(!s.active()[0].hit);

        let again = evaluate_press(&mut s, Lane::InnerRight, 995.0, 0.0, &JudgmentWindows::default());
        assert_eq!(again, PressResult::Ignored, "a held note is not a press candidate");
    }

    #[test]
    fn early_release_is_a_miss_and_release_at_end_completes() {
        let chart = vec![note(1000.0, Lane::InnerRight, NoteType::Long, 500.0)];
        let windows = JudgmentWindows::default();

        let mut early = scheduler_at(chart.clone(), 1000.0);
        evaluate_press(&mut early, Lane::InnerRight, 1000.0, 0.0, &windows);
        let judged = evaluate_release(&mut early, Lane::InnerRight, 1499.0);
        assert_eq!(judged.map(|j| j.outcome), Some(JudgmentOutcome::Miss));
        assert!(early.active().is_empty());

        let mut on_time = scheduler_at(chart, 1000.0);
        evaluate_press(&mut on_time, Lane::InnerRight, 1000.0, 0.0, &windows);
        let judged = evaluate_release(&mut on_time, Lane::InnerRight, 1500.0);
        assert_eq!(judged.map(|j| j.outcome), Some(JudgmentOutcome::LongComplete));
    }

    #[test]
    fn release_without_hold_is_a_no_op() {
        let mut s = scheduler_at(vec![note(1000.0, Lane::InnerRight, NoteType::Long, 500.0)], 1000.0);
        assert_eq!(evaluate_release(&mut s, Lane::InnerRight, 1000.0), None);
        assert_eq!(evaluate_release(&mut s, Lane::OuterLeft, 1000.0), None);
        assert_eq!(s.active().len(), 1);
    }
}
