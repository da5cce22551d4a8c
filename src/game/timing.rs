use log::{info, trace};

// Reading-vs-clock disagreement past which the reading is treated as a seek,
// stall or suspended frame loop and adopted outright.
pub const SNAP_THRESHOLD_MS: f64 = 1000.0;
// Disagreement below this is reading noise and is ignored.
pub const DRIFT_TOLERANCE_MS: f64 = 20.0;
// Share of the remaining drift removed per frame.
pub const DRIFT_CORRECTION_FACTOR: f64 = 0.15;

/// How one synced frame moved the clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClockCorrection {
    /// No position reading this frame; advanced by `dt`.
    DeadReckoned,
    /// Reading within tolerance; advanced by `dt`.
    InTolerance,
    /// Advanced by `dt + diff * DRIFT_CORRECTION_FACTOR`.
    Drift { diff_ms: f64 },
    /// Jumped straight to the reading.
    Snapped { diff_ms: f64 },
}

#[inline(always)]
fn sanitize_dt(dt_ms: f64) -> f64 {
    if dt_ms.is_finite() { dt_ms.max(0.0) } else { 0.0 }
}

/// Keeps game time locked to an external playback position.
///
/// Chart time and playback time differ by a constant: the audio's first
/// audible sound (`lead_silence_ms` into the file) lines up with the first
/// note. `sync_origin_ms = first_note_ms - lead_silence_ms` is therefore the
/// game time at which playback must sit at position 0.
#[derive(Clone, Debug)]
pub struct ClockSync {
    game_time_ms: f64,
    last_frame_ms: Option<f64>,
    sync_origin_ms: f64,
}

impl ClockSync {
    pub fn new(first_note_ms: f64, lead_silence_ms: f64) -> Self {
        let lead_silence_ms = if lead_silence_ms.is_finite() {
            lead_silence_ms.max(0.0)
        } else {
            0.0
        };
        Self {
            game_time_ms: 0.0,
            last_frame_ms: None,
            sync_origin_ms: first_note_ms - lead_silence_ms,
        }
    }

    /// Puts the clock at `game_time_ms` with `now_ms` as the last frame stamp.
    pub fn reset(&mut self, game_time_ms: f64, now_ms: f64) {
        self.game_time_ms = game_time_ms;
        self.last_frame_ms = Some(now_ms);
    }

    /// Elapsed wall time since the previous frame. Non-finite or backwards
    /// stamps yield 0.
    pub fn frame_delta(&mut self, now_ms: f64) -> f64 {
        let dt = self.last_frame_ms.map_or(0.0, |last| now_ms - last);
        if now_ms.is_finite() {
            self.last_frame_ms = Some(now_ms);
        }
        sanitize_dt(dt)
    }

    /// Lead-in: pure accumulation. True once game time has reached the
    /// point where playback has to start.
    pub fn advance_lead_in(&mut self, dt_ms: f64) -> bool {
        self.game_time_ms += sanitize_dt(dt_ms);
        self.game_time_ms >= self.sync_origin_ms
    }

    #[inline(always)]
    pub fn target_for_position(&self, position_ms: f64) -> f64 {
        position_ms + self.sync_origin_ms
    }

    pub fn advance_synced(&mut self, dt_ms: f64, position_ms: Option<f64>) -> ClockCorrection {
        let dt = sanitize_dt(dt_ms);
        let Some(pos) = position_ms.filter(|p| p.is_finite()) else {
            self.game_time_ms += dt;
            return ClockCorrection::DeadReckoned;
        };

        let target = self.target_for_position(pos);
        let diff = target - self.game_time_ms;
        let abs = diff.abs();
        if abs > SNAP_THRESHOLD_MS {
            info!(
                "Clock snap: {:.1}ms -> {:.1}ms (diff {:+.1}ms)",
                self.game_time_ms, target, diff
            );
            self.game_time_ms = target;
            ClockCorrection::Snapped { diff_ms: diff }
        } else if abs > DRIFT_TOLERANCE_MS {
            self.game_time_ms += dt + diff * DRIFT_CORRECTION_FACTOR;
            trace!("Drift correction: diff {diff:+.1}ms, now {:.1}ms", self.game_time_ms);
            ClockCorrection::Drift { diff_ms: diff }
        } else {
            self.game_time_ms += dt;
            ClockCorrection::InTolerance
        }
    }

    #[inline(always)]
    pub const fn game_time_ms(&self) -> f64 {
        self.game_time_ms
    }

    #[inline(always)]
    pub const fn sync_origin_ms(&self) -> f64 {
        self.sync_origin_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced_at(game_time_ms: f64) -> ClockSync {
        // First note at 1000ms, 200ms of leading silence: origin 800ms.
        let mut clock = ClockSync::new(1000.0, 200.0);
        clock.reset(game_time_ms, 0.0);
        clock
    }

    #[test]
    fn origin_subtracts_lead_silence() {
        assert_eq!(ClockSync::new(1000.0, 200.0).sync_origin_ms(), 800.0);
        assert_eq!(ClockSync::new(1000.0, f64::NAN).sync_origin_ms(), 1000.0);
        assert_eq!(ClockSync::new(1000.0, -50.0).sync_origin_ms(), 1000.0);
    }

    #[test]
    fn lead_in_accumulates_until_origin() {
        let mut clock = synced_at(333.0);
        assert!(!clock.advance_lead_in(400.0));
        assert_eq!(clock.game_time_ms(), 733.0);
        assert!(clock.advance_lead_in(67.0), "crossing at exactly the origin starts playback");
    }

    #[test]
    fn large_discontinuity_snaps_exactly() {
        let mut clock = synced_at(900.0);
        // target = 1600 + 800 = 2400, diff = 1500
        let c = clock.advance_synced(16.0, Some(1600.0));
        assert_eq!(c, ClockCorrection::Snapped { diff_ms: 1500.0 });
        assert_eq!(clock.game_time_ms(), 2400.0, "snap must not smooth or add dt");

        let c = clock.advance_synced(16.0, Some(0.0));
        assert!(matches!(c, ClockCorrection::Snapped { .. }), "backwards seeks snap too");
        assert_eq!(clock.game_time_ms(), 800.0);
    }

    #[test]
    fn moderate_drift_is_corrected_proportionally() {
        let mut clock = synced_at(900.0);
        // target = 200 + 800 = 1000, diff = 100
        let c = clock.advance_synced(16.0, Some(200.0));
        assert_eq!(c, ClockCorrection::Drift { diff_ms: 100.0 });
        assert!((clock.game_time_ms() - (900.0 + 16.0 + 15.0)).abs() < 1e-9);
    }

    #[test]
    fn small_disagreement_and_missing_reading_advance_by_dt() {
        let mut clock = synced_at(900.0);
        assert_eq!(clock.advance_synced(16.0, Some(110.0)), ClockCorrection::InTolerance);
        assert_eq!(clock.game_time_ms(), 916.0);
        assert_eq!(clock.advance_synced(16.0, None), ClockCorrection::DeadReckoned);
        assert_eq!(clock.game_time_ms(), 932.0);
        assert_eq!(clock.advance_synced(16.0, Some(f64::NAN)), ClockCorrection::DeadReckoned);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let mut clock = synced_at(1000.0);
        // diff exactly 20: no correction.
        assert_eq!(clock.advance_synced(0.0, Some(220.0)), ClockCorrection::InTolerance);
        let mut clock = synced_at(1000.0);
        // diff exactly 1000: drift, not snap.
        assert!(matches!(
            clock.advance_synced(0.0, Some(1200.0)),
            ClockCorrection::Drift { .. }
        ));
    }

    #[test]
    fn frame_delta_never_goes_negative() {
        let mut clock = ClockSync::new(0.0, 0.0);
        assert_eq!(clock.frame_delta(100.0), 0.0, "first frame has no predecessor");
        assert_eq!(clock.frame_delta(116.0), 16.0);
        assert_eq!(clock.frame_delta(110.0), 0.0);
        assert_eq!(clock.frame_delta(f64::INFINITY), 0.0);
        assert_eq!(clock.frame_delta(126.0), 16.0);
    }

    #[test]
    fn repeated_drift_correction_converges() {
        let mut clock = synced_at(900.0);
        let mut pos = 200.0;
        for _ in 0..60 {
            pos += 16.0;
            clock.advance_synced(16.0, Some(pos));
        }
        let diff = clock.target_for_position(pos) - clock.game_time_ms();
        assert!(diff.abs() <= DRIFT_TOLERANCE_MS, "residual drift {diff}");
    }
}
