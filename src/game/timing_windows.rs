// Shared timing window definitions to keep judgment and the miss sweep in sync.

// All windows are absolute timing errors in milliseconds.
pub const BASE_PERFECT_MS: f64 = 50.0;
pub const BASE_GREAT_MS: f64 = 105.0;
pub const BASE_GOOD_MS: f64 = 160.0;
pub const BASE_NORMAL_MS: f64 = 210.0;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("judgment windows must be finite, positive and strictly increasing; got {0:?}")]
pub struct WindowsError(pub [f64; 4]);

/// Tiered windows, PERFECT < GREAT < GOOD < NORMAL. A press matches a note
/// only if its error is within NORMAL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgmentWindows {
    perfect_ms: f64,
    great_ms: f64,
    good_ms: f64,
    normal_ms: f64,
}

impl Default for JudgmentWindows {
    fn default() -> Self {
        Self {
            perfect_ms: BASE_PERFECT_MS,
            great_ms: BASE_GREAT_MS,
            good_ms: BASE_GOOD_MS,
            normal_ms: BASE_NORMAL_MS,
        }
    }
}

impl JudgmentWindows {
    pub fn new(
        perfect_ms: f64,
        great_ms: f64,
        good_ms: f64,
        normal_ms: f64,
    ) -> Result<Self, WindowsError> {
        let all = [perfect_ms, great_ms, good_ms, normal_ms];
        let ordered = all.windows(2).all(|w| w[0] < w[1]);
        if !ordered || all.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(WindowsError(all));
        }
        Ok(Self {
            perfect_ms,
            great_ms,
            good_ms,
            normal_ms,
        })
    }

    #[inline(always)]
    pub const fn perfect_ms(&self) -> f64 {
        self.perfect_ms
    }

    #[inline(always)]
    pub const fn great_ms(&self) -> f64 {
        self.great_ms
    }

    #[inline(always)]
    pub const fn good_ms(&self) -> f64 {
        self.good_ms
    }

    /// The widest window; nothing outside it is ever judged.
    #[inline(always)]
    pub const fn normal_ms(&self) -> f64 {
        self.normal_ms
    }

    #[inline(always)]
    pub const fn as_array(&self) -> [f64; 4] {
        [self.perfect_ms, self.great_ms, self.good_ms, self.normal_ms]
    }
}
