use chrono::Local;
use serde::Serialize;

use crate::game::scores::{JudgmentCounts, ScoreState};
use crate::game::timing_stats::TimingStats;

/// Scores at or below this never reach the ranking board.
pub const RANKING_MIN_SCORE: u64 = 1000;
pub const DEFAULT_PLAYER_NAME: &str = "Anonymous";
const SCORE_DIGITS: usize = 7;

/// Read-only snapshot handed out once the session has ended.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageSummary {
    pub song: String,
    pub score: u64,
    pub max_combo: u32,
    pub stats: JudgmentCounts,
    pub total_notes: usize,
    pub timing: TimingStats,
}

impl StageSummary {
    pub fn from_score(
        song: &str,
        score: &ScoreState,
        total_notes: usize,
        timing: TimingStats,
    ) -> Self {
        Self {
            song: song.to_string(),
            score: score.score(),
            max_combo: score.max_combo(),
            stats: score.counts(),
            total_notes,
            timing,
        }
    }

    /// Zero-padded the way the result screen prints it.
    pub fn score_display(&self) -> String {
        format_score(self.score)
    }

    #[inline(always)]
    pub const fn qualifies_for_ranking(&self) -> bool {
        self.score > RANKING_MIN_SCORE
    }

    pub fn ranking_entry(&self, player_name: &str) -> Option<RankingEntry> {
        self.qualifies_for_ranking()
            .then(|| RankingEntry::new(&self.song, player_name, self.score))
    }
}

pub fn format_score(score: u64) -> String {
    format!("{score:0width$}", width = SCORE_DIGITS)
}

/// Payload submitted to the ranking board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RankingEntry {
    pub song: String,
    pub name: String,
    pub score: u64,
    /// Local date, `YYYY-MM-DD`.
    pub date: String,
}

impl RankingEntry {
    pub fn new(song: &str, player_name: &str, score: u64) -> Self {
        let name = player_name.trim();
        Self {
            song: song.to_string(),
            name: if name.is_empty() { DEFAULT_PLAYER_NAME } else { name }.to_string(),
            score,
            date: Local::now().format("%Y-%m-%d").to_string(),
        }
    }
}
