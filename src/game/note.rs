use crate::core::input::Lane;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoteType {
    Short,
    Long,
}

/// One entry of the chart timeline. Immutable once the chart is validated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChartNote {
    pub time_ms: f64,
    pub lane: Lane,
    pub note_type: NoteType,
    /// Hold length; only meaningful for [`NoteType::Long`].
    pub duration_ms: f64,
}

impl ChartNote {
    #[inline(always)]
    pub fn end_time_ms(&self) -> f64 {
        match self.note_type {
            NoteType::Short => self.time_ms,
            NoteType::Long => self.time_ms + self.duration_ms,
        }
    }
}

/// Opaque identity of a spawned note. The render adapter keys its visuals
/// by it; the engine never sees presentation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteHandle(u32);

impl NoteHandle {
    #[inline(always)]
    pub const fn chart_index(self) -> usize {
        self.0 as usize
    }
}

/// Engine-owned state of a note between spawn and resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveNote {
    pub handle: NoteHandle,
    pub lane: Lane,
    pub note_type: NoteType,
    pub target_ms: f64,
    pub end_ms: f64,
    pub hit: bool,
    pub holding: bool,
}

impl ActiveNote {
    pub fn spawn(chart_index: usize, note: &ChartNote) -> Self {
        Self {
            handle: NoteHandle(chart_index as u32),
            lane: note.lane,
            note_type: note.note_type,
            target_ms: note.time_ms,
            end_ms: note.end_time_ms(),
            hit: false,
            holding: false,
        }
    }

    /// 0 at spawn, 1 when the head reaches the judgment line.
    #[inline(always)]
    pub fn progress(&self, game_time_ms: f64, flight_time_ms: f64) -> f64 {
        (game_time_ms - (self.target_ms - flight_time_ms)) / flight_time_ms
    }

    /// Same scale as [`Self::progress`] but measured at the tail for long
    /// notes, which is what decides when an unplayed hold is missed.
    #[inline(always)]
    pub fn end_progress(&self, game_time_ms: f64, flight_time_ms: f64) -> f64 {
        match self.note_type {
            NoteType::Short => self.progress(game_time_ms, flight_time_ms),
            NoteType::Long => (game_time_ms - (self.end_ms - flight_time_ms)) / flight_time_ms,
        }
    }

    /// Still waiting for its press: not hit and not held.
    #[inline(always)]
    pub const fn is_pending(&self) -> bool {
        !self.hit && !self.holding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(time_ms: f64, duration_ms: f64) -> ChartNote {
        ChartNote {
            time_ms,
            lane: Lane::InnerLeft,
            note_type: NoteType::Long,
            duration_ms,
        }
    }

    #[test]
    fn short_notes_ignore_duration() {
        let note = ChartNote {
            time_ms: 1000.0,
            lane: Lane::OuterLeft,
            note_type: NoteType::Short,
            duration_ms: 500.0,
        };
        assert_eq!(note.end_time_ms(), 1000.0);
        let active = ActiveNote::spawn(3, &note);
        assert_eq!(active.end_ms, 1000.0);
        assert_eq!(active.handle.chart_index(), 3);
    }

    #[test]
    fn progress_runs_zero_to_one_over_flight_time() {
        let active = ActiveNote::spawn(0, &long(1000.0, 400.0));
        assert!((active.progress(333.0, 667.0) - 0.0).abs() < 1e-9);
        assert!((active.progress(1000.0, 667.0) - 1.0).abs() < 1e-9);
        // Tail reaches the line 400ms after the head.
        assert!((active.end_progress(1000.0, 667.0) - (267.0 / 667.0)).abs() < 1e-9);
        assert!((active.end_progress(1400.0, 667.0) - 1.0).abs() < 1e-9);
    }
}
