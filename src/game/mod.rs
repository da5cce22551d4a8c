pub mod chart;
pub mod gameplay;
pub mod judgment;
pub mod note;
pub mod scheduler;
pub mod scores;
pub mod song;
pub mod stage_stats;
pub mod timing;
pub mod timing_stats;
pub mod timing_windows;
