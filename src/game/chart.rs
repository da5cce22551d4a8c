use log::{debug, info, warn};
use rand::Rng;
use serde_json::Value;
use std::path::Path;

use crate::core::input::{Lane, NUM_LANES};
use crate::game::note::{ChartNote, NoteType};
use crate::game::song::SongMeta;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("chart has no notes")]
    Empty,
    #[error("note {index}: lane {lane} is not one of 0..4")]
    LaneOutOfRange { index: usize, lane: f64 },
    #[error("note {index}: time is not a finite number")]
    InvalidTime { index: usize },
    #[error("note {index}: hold duration is negative or not a number")]
    NegativeDuration { index: usize },
    #[error("chart file reported an error: {0}")]
    Source(String),
    #[error("chart file contains no songs")]
    SongNotFound,
    #[error("malformed chart json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read chart file: {0}")]
    Io(#[from] std::io::Error),
}

/// Validated note timeline, sorted by time. Never empty.
#[derive(Clone, Debug)]
pub struct Chart {
    notes: Vec<ChartNote>,
}

impl Chart {
    /// Sorts (stable, so equal times keep file order) and validates.
    pub fn from_notes(mut notes: Vec<ChartNote>) -> Result<Self, ChartError> {
        if notes.is_empty() {
            return Err(ChartError::Empty);
        }
        for (index, note) in notes.iter().enumerate() {
            if !note.time_ms.is_finite() {
                return Err(ChartError::InvalidTime { index });
            }
            if note.note_type == NoteType::Long
                && !(note.duration_ms.is_finite() && note.duration_ms >= 0.0)
            {
                return Err(ChartError::NegativeDuration { index });
            }
        }
        notes.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
        Ok(Self { notes })
    }

    #[inline(always)]
    pub fn notes(&self) -> &[ChartNote] {
        &self.notes
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    #[inline(always)]
    pub fn first_note_time_ms(&self) -> f64 {
        self.notes.first().map_or(0.0, |n| n.time_ms)
    }

    /// Latest instant any note still needs the player, tails included.
    pub fn last_end_time_ms(&self) -> f64 {
        self.notes
            .iter()
            .map(ChartNote::end_time_ms)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn long_note_count(&self) -> usize {
        self.notes
            .iter()
            .filter(|n| n.note_type == NoteType::Long)
            .count()
    }
}

/// A song picked out of a chart file together with its notes.
#[derive(Clone, Debug)]
pub struct LoadedChart {
    pub meta: SongMeta,
    pub chart: Chart,
}

pub fn load_chart_file(path: &Path, song: Option<&str>) -> Result<LoadedChart, ChartError> {
    info!("Loading chart file {}", path.display());
    let text = std::fs::read_to_string(path)?;
    parse_chart_json(&text, song, &mut rand::rng())
}

/// Accepts every layout the chart tooling produces:
///
/// - `[[meta, [notes...]], ...]`
/// - `[{meta..., "chart"|"notes"|"timestamps": [...]}, ...]`
/// - a single meta object carrying its notes
/// - `{"error": "..."}` from a failed export
///
/// The entry whose `name` equals `song` is used, else the first one.
/// Bare numbers in a note list are onset timestamps in seconds and get a
/// lane drawn from `rng`.
pub fn parse_chart_json<R: Rng + ?Sized>(
    text: &str,
    song: Option<&str>,
    rng: &mut R,
) -> Result<LoadedChart, ChartError> {
    let root: Value = serde_json::from_str(text)?;
    if let Some(err) = root.get("error") {
        let msg = err.as_str().map_or_else(|| err.to_string(), str::to_string);
        return Err(ChartError::Source(msg));
    }

    let entries: Vec<&Value> = match &root {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![&root],
        _ => Vec::new(),
    };
    let (meta_value, notes_value) = pick_entry(&entries, song).ok_or(ChartError::SongNotFound)?;

    let meta: SongMeta = serde_json::from_value(meta_value.clone())?;
    let raw = notes_value.and_then(Value::as_array).map_or(&[][..], Vec::as_slice);
    let notes = raw
        .iter()
        .enumerate()
        .map(|(index, v)| note_from_value(index, v, rng))
        .collect::<Result<Vec<_>, _>>()?;
    let chart = Chart::from_notes(notes)?;

    debug!(
        "Chart '{}': {} notes ({} long), first at {:.1}ms",
        meta.display_name(),
        chart.len(),
        chart.long_note_count(),
        chart.first_note_time_ms()
    );
    Ok(LoadedChart { meta, chart })
}

static NULL: Value = Value::Null;

fn split_entry(entry: &Value) -> (&Value, Option<&Value>) {
    if let Some(pair) = entry.as_array() {
        let meta = pair.first().unwrap_or(&NULL);
        let notes = pair
            .get(1)
            .filter(|v| v.is_array())
            .or_else(|| notes_field(meta));
        return (meta, notes);
    }
    (entry, notes_field(entry))
}

fn notes_field(meta: &Value) -> Option<&Value> {
    ["chart", "notes", "timestamps"]
        .iter()
        .find_map(|k| meta.get(*k).filter(|v| v.is_array()))
}

fn pick_entry<'a>(
    entries: &[&'a Value],
    song: Option<&str>,
) -> Option<(&'a Value, Option<&'a Value>)> {
    let first = split_entry(entries.first().copied()?);
    let Some(wanted) = song else {
        return Some(first);
    };
    let found = entries
        .iter()
        .map(|&e| split_entry(e))
        .find(|(meta, _)| meta.get("name").and_then(Value::as_str) == Some(wanted));
    if found.is_none() {
        warn!("Song '{wanted}' not found in chart file; using the first entry");
    }
    Some(found.unwrap_or(first))
}

/// Loose numeric coercion: missing and null are 0, numeric strings parse,
/// anything else is NaN and fails validation.
fn number(v: Option<&Value>) -> f64 {
    match v {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() { 0.0 } else { s.parse().unwrap_or(f64::NAN) }
        }
        Some(_) => f64::NAN,
    }
}

fn note_from_value<R: Rng + ?Sized>(
    index: usize,
    v: &Value,
    rng: &mut R,
) -> Result<ChartNote, ChartError> {
    if let Some(seconds) = v.as_f64() {
        let lane = Lane::ALL[rng.random_range(0..NUM_LANES)];
        return Ok(ChartNote {
            time_ms: seconds * 1000.0,
            lane,
            note_type: NoteType::Short,
            duration_ms: 0.0,
        });
    }

    let time_ms = number(v.get("time"));
    if !time_ms.is_finite() {
        return Err(ChartError::InvalidTime { index });
    }
    let lane_num = number(v.get("lane"));
    let lane = (lane_num.fract() == 0.0 && lane_num >= 0.0)
        .then(|| Lane::from_index(lane_num as usize))
        .flatten()
        .ok_or(ChartError::LaneOutOfRange { index, lane: lane_num })?;
    let note_type = match v.get("type").and_then(Value::as_str) {
        Some("long") => NoteType::Long,
        _ => NoteType::Short,
    };
    let duration_ms = match note_type {
        NoteType::Long => number(v.get("duration")),
        NoteType::Short => 0.0,
    };
    Ok(ChartNote {
        time_ms,
        lane,
        note_type,
        duration_ms,
    })
}
