//! The user's trim selection and the rules that keep it inside the track.
//!
//! The model never owns the track duration. Every operation that needs it
//! takes the current effective duration as an argument, because that value
//! changes as the playback adapter learns more about the source.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WizardError};

/// Smallest gap ever kept between the handles, even with a zero config
const MIN_HANDLE_GAP: f64 = 0.001;

/// A `(start, end)` sub-interval of a track in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    /// Start time in seconds (>= 0)
    pub start: f64,

    /// End time in seconds (> start)
    pub end: f64,
}

impl TrimRange {
    /// Create a range, checking ordering but not track bounds
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !(start.is_finite() && end.is_finite()) || start < 0.0 || end <= start {
            return Err(WizardError::InvalidRange {
                start,
                end,
                duration: f64::NAN,
            });
        }

        Ok(Self { start, end })
    }

    /// Length of the selection in seconds
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// The range a freshly selected track starts with
    pub(crate) fn initial(default_length: f64, duration_hint: f64) -> Self {
        let end = if duration_hint.is_finite() && duration_hint > 0.0 {
            default_length.min(duration_hint)
        } else {
            default_length
        };
        Self { start: 0.0, end }
    }
}

/// Fixed selection lengths a user can apply in one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Preset {
    #[default]
    Short,
    Medium,
    Long,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Short, Preset::Medium, Preset::Long];

    pub fn seconds(self) -> u32 {
        match self {
            Preset::Short => 15,
            Preset::Medium => 30,
            Preset::Long => 60,
        }
    }

    pub fn from_seconds(seconds: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.seconds() == seconds)
    }
}

/// Current trim selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    range: TrimRange,
    default_length: f64,
    min_length: f64,
}

impl Selection {
    /// `default_length` is what `reset` selects, `min_length` is the gap
    /// the drag handles always keep
    pub fn new(default_length: f64, min_length: f64) -> Self {
        Self {
            range: TrimRange::initial(default_length, f64::NAN),
            default_length,
            min_length: min_length.max(MIN_HANDLE_GAP),
        }
    }

    pub fn range(&self) -> TrimRange {
        self.range
    }

    /// Take over a range chosen elsewhere, pulled inside `effective_duration`
    pub fn adopt(&mut self, range: TrimRange, effective_duration: f64) {
        self.range = range;
        self.clamp_to(effective_duration);
    }

    /// Select `[0, min(default_length, duration_hint)]`
    pub fn reset(&mut self, duration_hint: f64) {
        self.range = TrimRange::initial(self.default_length, duration_hint);
    }

    /// Replace the range, rejecting anything outside `[0, effective_duration]`
    /// or with `end <= start`
    pub fn set_range(&mut self, start: f64, end: f64, effective_duration: f64) -> Result<()> {
        let valid = start.is_finite()
            && end.is_finite()
            && start >= 0.0
            && end > start
            && end <= effective_duration;

        if !valid {
            return Err(WizardError::InvalidRange {
                start,
                end,
                duration: effective_duration,
            });
        }

        self.range = TrimRange { start, end };
        Ok(())
    }

    /// Set `end = min(start + preset, effective_duration)`, keeping `start`
    pub fn apply_preset(&mut self, preset: Preset, effective_duration: f64) {
        self.clamp_to(effective_duration);
        let end = (self.range.start + preset.seconds() as f64).min(effective_duration);
        self.range.end = end;
    }

    /// Drag the start handle, clamped to `[0, end - min_length]`
    pub fn move_start(&mut self, to: f64, effective_duration: f64) {
        self.clamp_to(effective_duration);
        let upper = (self.range.end - self.min_length).max(0.0);
        self.range.start = clamp_finite(to, 0.0, upper, self.range.start);
    }

    /// Drag the end handle, clamped to `[start + min_length, effective_duration]`
    pub fn move_end(&mut self, to: f64, effective_duration: f64) {
        self.clamp_to(effective_duration);
        let lower = (self.range.start + self.min_length).min(effective_duration);
        self.range.end = clamp_finite(to, lower, effective_duration, self.range.end);
    }

    /// Pull the range back inside a (possibly shrunk) duration
    ///
    /// Returns true if anything moved. When the end has to move below the
    /// start, the start follows so the original length is kept where the
    /// track allows it.
    pub fn clamp_to(&mut self, effective_duration: f64) -> bool {
        if !(effective_duration.is_finite() && effective_duration > 0.0) {
            return false;
        }
        if self.range.end <= effective_duration {
            return false;
        }

        let length = self.range.length();
        let end = effective_duration;
        let start = if self.range.start >= end {
            (end - length).max(0.0)
        } else {
            self.range.start
        };

        tracing::debug!(
            "Clamped selection {:.2}-{:.2}s to {:.2}-{:.2}s (duration {:.2}s)",
            self.range.start,
            self.range.end,
            start,
            end,
            effective_duration
        );

        self.range = TrimRange { start, end };
        true
    }
}

fn clamp_finite(value: f64, lower: f64, upper: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        return fallback;
    }
    value.max(lower).min(upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> Selection {
        Selection::new(15.0, 0.5)
    }

    #[test]
    fn test_trim_range_validation() {
        assert!(TrimRange::new(0.0, 5.0).is_ok());
        assert!(TrimRange::new(5.0, 5.0).is_err());
        assert!(TrimRange::new(10.0, 5.0).is_err());
        assert!(TrimRange::new(-1.0, 5.0).is_err());
        assert!(TrimRange::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_reset_short_song() {
        let mut sel = selection();
        sel.reset(10.0);
        assert_eq!(sel.range(), TrimRange { start: 0.0, end: 10.0 });
    }

    #[test]
    fn test_reset_long_song() {
        let mut sel = selection();
        sel.reset(200.0);
        assert_eq!(sel.range(), TrimRange { start: 0.0, end: 15.0 });
    }

    #[test]
    fn test_reset_without_duration_uses_default() {
        let mut sel = selection();
        sel.reset(0.0);
        assert_eq!(sel.range().end, 15.0);
        sel.reset(f64::NAN);
        assert_eq!(sel.range().end, 15.0);
    }

    #[test]
    fn test_set_range_round_trips_valid_input() {
        let cases = [(0.0, 1.0, 1.0), (5.0, 50.0, 60.0), (12.5, 13.0, 200.0), (0.0, 60.0, 60.0)];
        for (start, end, duration) in cases {
            let mut sel = selection();
            sel.set_range(start, end, duration).unwrap();
            assert_eq!(sel.range(), TrimRange { start, end });
        }
    }

    #[test]
    fn test_set_range_rejects_and_keeps_previous() {
        let mut sel = selection();
        let before = sel.range();

        for (start, end) in [(10.0, 10.0), (20.0, 10.0), (-1.0, 5.0), (5.0, 61.0), (f64::NAN, 5.0)] {
            let result = sel.set_range(start, end, 60.0);
            assert!(
                matches!(result, Err(WizardError::InvalidRange { .. })),
                "({}, {}) should be rejected",
                start,
                end
            );
            assert_eq!(sel.range(), before);
        }
    }

    #[test]
    fn test_apply_preset() {
        for preset in Preset::ALL {
            for (start, duration) in [(0.0, 200.0), (10.0, 200.0), (170.0, 200.0), (0.0, 20.0), (5.0, 12.0)] {
                let mut sel = selection();
                sel.set_range(start, start + 1.0, duration).unwrap();
                sel.apply_preset(preset, duration);

                let expected_end = (start + preset.seconds() as f64).min(duration);
                assert_eq!(sel.range().start, start);
                assert_eq!(sel.range().end, expected_end);
            }
        }
    }

    #[test]
    fn test_preset_from_seconds() {
        assert_eq!(Preset::from_seconds(30), Some(Preset::Medium));
        assert_eq!(Preset::from_seconds(45), None);
        assert_eq!(Preset::default().seconds(), 15);
    }

    #[test]
    fn test_clamp_after_duration_shrinks() {
        let mut sel = selection();
        sel.set_range(5.0, 50.0, 60.0).unwrap();

        assert!(sel.clamp_to(30.0));
        assert_eq!(sel.range(), TrimRange { start: 5.0, end: 30.0 });
    }

    #[test]
    fn test_clamp_moves_start_when_range_falls_off_the_end() {
        let mut sel = selection();
        sel.set_range(40.0, 50.0, 60.0).unwrap();

        assert!(sel.clamp_to(30.0));
        let range = sel.range();
        assert_eq!(range, TrimRange { start: 20.0, end: 30.0 });
    }

    #[test]
    fn test_clamp_to_tiny_duration() {
        let mut sel = selection();
        sel.set_range(40.0, 50.0, 60.0).unwrap();

        sel.clamp_to(3.0);
        let range = sel.range();
        assert_eq!(range.start, 0.0);
        assert_eq!(range.end, 3.0);
    }

    #[test]
    fn test_clamp_is_noop_when_range_fits() {
        let mut sel = selection();
        sel.set_range(5.0, 20.0, 60.0).unwrap();
        assert!(!sel.clamp_to(30.0));
        assert!(!sel.clamp_to(f64::NAN));
        assert_eq!(sel.range(), TrimRange { start: 5.0, end: 20.0 });
    }

    #[test]
    fn test_move_start_keeps_gap() {
        let mut sel = selection();
        sel.set_range(10.0, 20.0, 60.0).unwrap();

        sel.move_start(25.0, 60.0);
        assert_eq!(sel.range().start, 19.5);

        sel.move_start(-3.0, 60.0);
        assert_eq!(sel.range().start, 0.0);
    }

    #[test]
    fn test_move_end_keeps_gap_and_bounds() {
        let mut sel = selection();
        sel.set_range(10.0, 20.0, 60.0).unwrap();

        sel.move_end(5.0, 60.0);
        assert_eq!(sel.range().end, 10.5);

        sel.move_end(90.0, 60.0);
        assert_eq!(sel.range().end, 60.0);
    }

    #[test]
    fn test_adopt_clamps() {
        let mut sel = selection();
        sel.adopt(TrimRange { start: 50.0, end: 65.0 }, 60.0);
        assert_eq!(sel.range(), TrimRange { start: 50.0, end: 60.0 });
    }

    #[test]
    fn test_handles_never_cross_with_zero_gap() {
        let mut sel = Selection::new(15.0, 0.0);
        sel.set_range(10.0, 20.0, 60.0).unwrap();

        sel.move_end(10.0, 60.0);
        assert!(sel.range().end > sel.range().start);

        sel.move_start(30.0, 60.0);
        assert!(sel.range().start < sel.range().end);
    }
}
