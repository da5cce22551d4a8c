//! Timing and judgment engine for a four-lane rhythm game.
//!
//! The engine keeps a game clock locked to an imprecise external playback
//! position, spawns and retires chart notes against that clock, and judges
//! lane presses/releases into a score. Rendering, audio output and asset
//! loading stay with the host; see [`game::gameplay::State`] for the entry
//! points.

pub mod config;
pub mod core;
pub mod game;
