//! Derived view-state for the trimmer.
//!
//! Nothing here is stored: every value is recomputed from the current
//! selection, playhead and effective duration on each read.

use std::time::Duration;

use serde::Serialize;

use crate::catalog::format_duration;
use crate::selection::{Preset, TrimRange};
use crate::session::PlaybackState;

/// How a waveform bar is painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarClass {
    /// Outside the selection, regardless of playback
    Dimmed,
    /// Inside the selection, not reached by the playhead yet
    Selected,
    /// Inside the selection and already played
    Played,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub height: f32,
    /// Position along the track in percent
    pub position_percent: f64,
    pub class: BarClass,
}

/// Whether the source is usable yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadStatus {
    Loading { elapsed: Duration },
    /// Loading for longer than the stall timeout; show a failure instead of a spinner
    Stalled { elapsed: Duration },
    Ready,
}

/// `m:ss` labels under the waveform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeLabels {
    pub start: String,
    pub selected: String,
    pub total: String,
}

/// Everything the presentation layer needs to draw the trimmer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrimView {
    pub state: PlaybackState,
    pub load: LoadStatus,
    pub effective_duration: f64,
    pub range: TrimRange,
    pub preset: Preset,
    pub selection_start_percent: f64,
    pub selection_width_percent: f64,
    pub played_percent: f64,
    /// The playhead is only drawn while playing
    pub playhead_visible: bool,
    pub bars: Vec<Bar>,
    pub labels: TimeLabels,
}

/// Inputs to [`build_view`]
#[derive(Debug, Clone, Copy)]
pub struct ViewInputs<'a> {
    pub bars: &'a [f32],
    pub range: TrimRange,
    pub current_time: f64,
    pub effective_duration: f64,
    pub state: PlaybackState,
    pub load: LoadStatus,
    pub preset: Preset,
}

/// `seconds` as a percentage of `duration`, 0 for an unusable duration
pub fn percent_of(seconds: f64, duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        seconds * 100.0 / duration
    } else {
        0.0
    }
}

/// Position of bar `index` out of `count`, in percent
pub fn bar_position(index: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    index as f64 * 100.0 / count as f64
}

/// Classify a bar at `position` (percent) against the selection and playhead
pub fn classify_bar(
    position: f64,
    start_percent: f64,
    width_percent: f64,
    played_percent: f64,
) -> BarClass {
    let in_selection = position >= start_percent && position <= start_percent + width_percent;
    if !in_selection {
        BarClass::Dimmed
    } else if position <= played_percent {
        BarClass::Played
    } else {
        BarClass::Selected
    }
}

pub fn time_labels(range: &TrimRange, duration: f64) -> TimeLabels {
    let whole = |seconds: f64| format_duration(seconds.max(0.0).floor() as u64);
    TimeLabels {
        start: whole(range.start),
        selected: whole(range.length()),
        total: whole(duration),
    }
}

pub fn build_view(inputs: ViewInputs<'_>) -> TrimView {
    let duration = inputs.effective_duration;
    let start_percent = percent_of(inputs.range.start, duration);
    let width_percent = percent_of(inputs.range.length(), duration);
    let played_percent = percent_of(inputs.current_time, duration);

    let count = inputs.bars.len();
    let bars = inputs
        .bars
        .iter()
        .enumerate()
        .map(|(index, &height)| {
            let position = bar_position(index, count);
            Bar {
                height,
                position_percent: position,
                class: classify_bar(position, start_percent, width_percent, played_percent),
            }
        })
        .collect();

    TrimView {
        state: inputs.state,
        load: inputs.load,
        effective_duration: duration,
        range: inputs.range,
        preset: inputs.preset,
        selection_start_percent: start_percent,
        selection_width_percent: width_percent,
        played_percent,
        playhead_visible: inputs.state == PlaybackState::ReadyPlaying,
        bars,
        labels: time_labels(&inputs.range, duration),
    }
}
