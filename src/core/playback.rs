use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The media clock the engine follows. Readings are synchronous snapshots;
/// `None` means no usable position this frame.
pub trait PlaybackSource {
    fn start(&mut self);
    fn seek_to_start(&mut self);
    fn current_position_ms(&self) -> Option<f64>;
}

#[inline(always)]
fn sanitize_position(ms: f64) -> Option<f64> {
    (ms.is_finite() && ms >= 0.0).then_some(ms)
}

/* ============================ Shared playback ============================ */

const NO_POSITION: u64 = u64::MAX;

#[derive(Debug)]
struct SharedInner {
    position_bits: AtomicU64,
    play_requested: AtomicBool,
    seek_requested: AtomicBool,
}

/// Engine side of a playback clock that lives on another thread (an audio
/// callback decoding a local file). The audio side holds a
/// [`PlaybackHandle`] to publish its position and pick up commands.
#[derive(Clone, Debug)]
pub struct SharedPlayback {
    inner: Arc<SharedInner>,
}

/// Audio-thread side of [`SharedPlayback`].
#[derive(Clone, Debug)]
pub struct PlaybackHandle {
    inner: Arc<SharedInner>,
}

impl SharedPlayback {
    pub fn new() -> (Self, PlaybackHandle) {
        let inner = Arc::new(SharedInner {
            position_bits: AtomicU64::new(NO_POSITION),
            play_requested: AtomicBool::new(false),
            seek_requested: AtomicBool::new(false),
        });
        (
            Self {
                inner: inner.clone(),
            },
            PlaybackHandle { inner },
        )
    }
}

impl PlaybackSource for SharedPlayback {
    fn start(&mut self) {
        self.inner.play_requested.store(true, Ordering::Release);
    }

    fn seek_to_start(&mut self) {
        self.inner.seek_requested.store(true, Ordering::Release);
    }

    fn current_position_ms(&self) -> Option<f64> {
        let bits = self.inner.position_bits.load(Ordering::Acquire);
        if bits == NO_POSITION {
            return None;
        }
        sanitize_position(f64::from_bits(bits))
    }
}

impl PlaybackHandle {
    pub fn publish_position_ms(&self, ms: f64) {
        self.inner.position_bits.store(ms.to_bits(), Ordering::Release);
    }

    pub fn clear_position(&self) {
        self.inner.position_bits.store(NO_POSITION, Ordering::Release);
    }

    /// True once after the engine asked playback to begin.
    pub fn take_play_request(&self) -> bool {
        self.inner.play_requested.swap(false, Ordering::AcqRel)
    }

    /// True once after the engine asked for a rewind to position 0.
    pub fn take_seek_request(&self) -> bool {
        self.inner.seek_requested.swap(false, Ordering::AcqRel)
    }
}

/* ========================== Simulated playback ========================== */

/// Host-driven stand-in for a remote video player: the position advances
/// with whatever wall clock the host feeds it, but is only reported in
/// coarse steps and optionally with random jitter, the way an embedded
/// player's `getCurrentTime` behaves.
#[derive(Debug)]
pub struct SimulatedPlayback {
    playing: bool,
    position_ms: f64,
    last_wall_ms: Option<f64>,
    report_quantum_ms: f64,
    jitter_ms: f64,
    rate: f64,
    stalled: bool,
    noise_ms: f64,
    rng: StdRng,
}

impl SimulatedPlayback {
    pub fn new() -> Self {
        Self {
            playing: false,
            position_ms: 0.0,
            last_wall_ms: None,
            report_quantum_ms: 0.0,
            jitter_ms: 0.0,
            rate: 1.0,
            stalled: false,
            noise_ms: 0.0,
            rng: StdRng::seed_from_u64(0x766f_6964),
        }
    }

    /// Positions are reported rounded down to multiples of `quantum_ms`.
    pub fn with_report_quantum(mut self, quantum_ms: f64) -> Self {
        self.report_quantum_ms = quantum_ms.max(0.0);
        self
    }

    /// Each frame's reading is offset by a uniform error in
    /// `[-jitter_ms, jitter_ms]`, redrawn on every [`Self::advance_to`].
    pub fn with_jitter(mut self, jitter_ms: f64, seed: u64) -> Self {
        self.jitter_ms = jitter_ms.max(0.0);
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Media speed relative to the wall clock; 1.0 is in sync.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        self
    }

    /// Advances the media position to the host's current wall clock.
    pub fn advance_to(&mut self, wall_ms: f64) {
        if let Some(last) = self.last_wall_ms
            && self.playing
            && !self.stalled
        {
            self.position_ms += (wall_ms - last).max(0.0) * self.rate;
        }
        self.last_wall_ms = Some(wall_ms);
        self.noise_ms = if self.jitter_ms > 0.0 {
            self.rng.random_range(-self.jitter_ms..=self.jitter_ms)
        } else {
            0.0
        };
    }

    /// Buffering: the position stops advancing until resumed.
    pub fn set_stalled(&mut self, stalled: bool) {
        if self.stalled != stalled {
            debug!("Simulated playback stalled={stalled} at {:.1}ms", self.position_ms);
        }
        self.stalled = stalled;
    }

    /// Jumps the media position, as a user seek or an ad break would.
    pub fn jump_to(&mut self, position_ms: f64) {
        self.position_ms = position_ms.max(0.0);
    }

    pub fn true_position_ms(&self) -> f64 {
        self.position_ms
    }
}

impl Default for SimulatedPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSource for SimulatedPlayback {
    fn start(&mut self) {
        info!("Simulated playback started at {:.1}ms", self.position_ms);
        self.playing = true;
    }

    fn seek_to_start(&mut self) {
        self.position_ms = 0.0;
    }

    fn current_position_ms(&self) -> Option<f64> {
        if !self.playing {
            return None;
        }
        let pos = if self.report_quantum_ms > 0.0 {
            (self.position_ms / self.report_quantum_ms).floor() * self.report_quantum_ms
        } else {
            self.position_ms
        };
        sanitize_position((pos + self.noise_ms).max(0.0))
    }
}
