use rustc_hash::FxHashMap;

pub const NUM_LANES: usize = 4;
pub const DEFAULT_KEYS: [char; NUM_LANES] = ['D', 'F', 'J', 'K'];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Lane {
    OuterLeft = 0,
    InnerLeft = 1,
    InnerRight = 2,
    OuterRight = 3,
}

impl Lane {
    pub const ALL: [Lane; NUM_LANES] = [
        Lane::OuterLeft,
        Lane::InnerLeft,
        Lane::InnerRight,
        Lane::OuterRight,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn from_index(index: usize) -> Option<Lane> {
        match index {
            0 => Some(Lane::OuterLeft),
            1 => Some(Lane::InnerLeft),
            2 => Some(Lane::InnerRight),
            3 => Some(Lane::OuterRight),
            _ => None,
        }
    }
}

/// A normalized lane press or release, the only thing the engine accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEdge {
    pub lane: Lane,
    pub pressed: bool,
}

impl InputEdge {
    pub const fn press(lane: Lane) -> Self {
        Self { lane, pressed: true }
    }

    pub const fn release(lane: Lane) -> Self {
        Self { lane, pressed: false }
    }
}

/* ------------------------------ Keyboard ------------------------------ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: char,
    pub pressed: bool,
    pub repeat: bool,
}

#[derive(Clone, Debug)]
pub struct KeyMap {
    map: FxHashMap<char, Lane>,
}

impl KeyMap {
    pub fn new(keys: [char; NUM_LANES]) -> Self {
        let mut map = FxHashMap::default();
        for (lane, key) in Lane::ALL.into_iter().zip(keys) {
            map.insert(key.to_ascii_uppercase(), lane);
        }
        Self { map }
    }

    #[inline(always)]
    pub fn lane_for_key(&self, key: char) -> Option<Lane> {
        self.map.get(&key.to_ascii_uppercase()).copied()
    }

    /// Maps a raw key event onto a lane edge. Auto-repeat presses are
    /// dropped so holding a key never re-triggers a judgment.
    pub fn edge_for(&self, event: KeyEvent) -> Option<InputEdge> {
        if event.pressed && event.repeat {
            return None;
        }
        let lane = self.lane_for_key(event.key)?;
        Some(InputEdge {
            lane,
            pressed: event.pressed,
        })
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(DEFAULT_KEYS)
    }
}

/* -------------------------------- Touch -------------------------------- */

/// Lane under a touch point, with `x` relative to the playfield's left edge.
pub fn lane_from_touch_x(x: f32, field_width: f32) -> Lane {
    if !(field_width.is_finite() && field_width > 0.0) || !x.is_finite() {
        return Lane::OuterLeft;
    }
    let lane_width = field_width / NUM_LANES as f32;
    let index = (x / lane_width).floor().clamp(0.0, (NUM_LANES - 1) as f32) as usize;
    Lane::from_index(index).unwrap_or(Lane::OuterLeft)
}

/// Remembers which lane each active touch pressed so that lifting the
/// finger releases that lane even if it slid elsewhere.
#[derive(Debug, Default)]
pub struct TouchTracker {
    touches: FxHashMap<u64, Lane>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch_start(&mut self, id: u64, x: f32, field_width: f32) -> InputEdge {
        let lane = lane_from_touch_x(x, field_width);
        self.touches.insert(id, lane);
        InputEdge::press(lane)
    }

    pub fn touch_end(&mut self, id: u64) -> Option<InputEdge> {
        self.touches.remove(&id).map(InputEdge::release)
    }

    pub fn active_touches(&self) -> usize {
        self.touches.len()
    }
}
