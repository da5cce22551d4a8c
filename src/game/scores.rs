use serde::Serialize;

use crate::game::judgment::{JudgeGrade, JudgmentOutcome};

/// Per-category judgment tallies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct JudgmentCounts {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub normal: u32,
    pub miss: u32,
}

impl JudgmentCounts {
    #[inline(always)]
    pub const fn get(&self, grade: JudgeGrade) -> u32 {
        match grade {
            JudgeGrade::Perfect => self.perfect,
            JudgeGrade::Great => self.great,
            JudgeGrade::Good => self.good,
            JudgeGrade::Normal => self.normal,
            JudgeGrade::Miss => self.miss,
        }
    }

    fn bump(&mut self, grade: JudgeGrade) {
        let slot = match grade {
            JudgeGrade::Perfect => &mut self.perfect,
            JudgeGrade::Great => &mut self.great,
            JudgeGrade::Good => &mut self.good,
            JudgeGrade::Normal => &mut self.normal,
            JudgeGrade::Miss => &mut self.miss,
        };
        *slot = slot.saturating_add(1);
    }

    /// Notes resolved so far; every resolution lands in exactly one bucket.
    #[inline(always)]
    pub const fn total(&self) -> u32 {
        self.perfect + self.great + self.good + self.normal + self.miss
    }
}

/// Score, combo and tallies for one play. Only ever moves forward; cleared
/// by [`ScoreState::reset`] at level start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScoreState {
    score: u64,
    combo: u32,
    max_combo: u32,
    counts: JudgmentCounts,
}

impl ScoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn apply(&mut self, outcome: JudgmentOutcome) {
        self.counts.bump(outcome.grade());
        if outcome.is_miss() {
            self.combo = 0;
            return;
        }
        self.combo = self.combo.saturating_add(1);
        self.max_combo = self.max_combo.max(self.combo);
        self.score = self.score.saturating_add(u64::from(outcome.points()));
    }

    #[inline(always)]
    pub const fn score(&self) -> u64 {
        self.score
    }

    #[inline(always)]
    pub const fn combo(&self) -> u32 {
        self.combo
    }

    #[inline(always)]
    pub const fn max_combo(&self) -> u32 {
        self.max_combo
    }

    #[inline(always)]
    pub const fn counts(&self) -> JudgmentCounts {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_build_combo_and_score() {
        let mut s = ScoreState::new();
        s.apply(JudgmentOutcome::Perfect);
        s.apply(JudgmentOutcome::Great);
        s.apply(JudgmentOutcome::Good);
        s.apply(JudgmentOutcome::Normal);
        assert_eq!(s.score(), 1000 + 700 + 400 + 100);
        assert_eq!(s.combo(), 4);
        assert_eq!(s.max_combo(), 4);
        assert_eq!(s.counts().total(), 4);
    }

    #[test]
    fn miss_breaks_combo_but_keeps_max_and_score() {
        let mut s = ScoreState::new();
        for _ in 0..3 {
            s.apply(JudgmentOutcome::Perfect);
        }
        s.apply(JudgmentOutcome::Miss);
        assert_eq!(s.combo(), 0);
        assert_eq!(s.max_combo(), 3, "a miss never lowers max combo");
        assert_eq!(s.score(), 3000);
        assert_eq!(s.counts().miss, 1);

        s.apply(JudgmentOutcome::Great);
        assert_eq!(s.combo(), 1);
        assert_eq!(s.max_combo(), 3);
    }

    #[test]
    fn long_complete_counts_as_perfect() {
        let mut s = ScoreState::new();
        s.apply(JudgmentOutcome::LongComplete);
        assert_eq!(s.score(), 1000);
        assert_eq!(s.counts().perfect, 1);
        assert_eq!(s.counts().get(JudgeGrade::Perfect), 1);
        assert_eq!(s.combo(), 1);
    }

    #[test]
    fn max_combo_tracks_running_maximum() {
        let outcomes = [
            JudgmentOutcome::Perfect,
            JudgmentOutcome::Perfect,
            JudgmentOutcome::Miss,
            JudgmentOutcome::Good,
            JudgmentOutcome::Good,
            JudgmentOutcome::Good,
            JudgmentOutcome::Miss,
            JudgmentOutcome::Normal,
        ];
        let mut s = ScoreState::new();
        let mut observed = 0;
        let mut last_score = 0;
        for o in outcomes {
            s.apply(o);
            observed = observed.max(s.combo());
            assert_eq!(s.max_combo(), observed);
            assert!(s.score() >= last_score, "score is monotonic");
            last_score = s.score();
        }
        assert_eq!(s.max_combo(), 3);

        s.reset();
        assert_eq!(s, ScoreState::default());
    }
}
