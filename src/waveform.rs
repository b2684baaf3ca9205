//! Deterministic waveform approximation for the trimmer.
//!
//! Bars are not decoded from the audio. They are a stable pseudo-random
//! shape derived from the track id, so the same track always renders the
//! same silhouette and nothing has to be read before the waveform shows.

use std::sync::Arc;

/// Lowest bar height, keeps quiet bars visible
pub const MIN_BAR_HEIGHT: f32 = 0.05;

const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49_297;
const LCG_MODULUS: u64 = 233_280;

/// Synthesize `bar_count` normalized bar heights for a track
///
/// The seed is the sum of the id's UTF-16 code units. Each bar mixes a
/// linear-congruential value with a slow sine so neighbours stay related.
///
/// # Example
/// ```
/// use trim_wizard_lib::waveform::synthesize;
///
/// let bars = synthesize("song-42", 80);
/// assert_eq!(bars.len(), 80);
/// assert_eq!(bars, synthesize("song-42", 80));
/// assert!(bars.iter().all(|&h| h > 0.0 && h <= 1.0));
/// ```
pub fn synthesize(track_id: &str, bar_count: usize) -> Vec<f32> {
    let seed = track_id.encode_utf16().map(u64::from).sum::<u64>() % LCG_MODULUS;

    (0..bar_count)
        .map(|i| {
            let step = (i as u64 + 1) % LCG_MODULUS;
            let x = (seed * step % LCG_MODULUS * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
            let random = x as f64 / LCG_MODULUS as f64;

            let base = 0.3 + random * 0.7;
            let wave = (i as f64 * 0.3).sin() * 0.2 + 0.5;
            let height = (base * wave + 0.2).min(1.0) as f32;

            height.clamp(MIN_BAR_HEIGHT, 1.0)
        })
        .collect()
}

/// Holds the bars for the current track and only regenerates them when
/// the track id or bar count changes
#[derive(Debug)]
pub struct WaveformCache {
    key: Option<(String, usize)>,
    bars: Arc<[f32]>,
}

impl Default for WaveformCache {
    fn default() -> Self {
        Self {
            key: None,
            bars: Arc::from(Vec::new()),
        }
    }
}

impl WaveformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bars for `track_id`, shared with earlier calls for the same track
    pub fn bars(&mut self, track_id: &str, bar_count: usize) -> Arc<[f32]> {
        let stale = match &self.key {
            Some((id, count)) => id != track_id || *count != bar_count,
            None => true,
        };

        if stale {
            tracing::debug!("Synthesizing {} waveform bars for '{}'", bar_count, track_id);
            self.bars = synthesize(track_id, bar_count).into();
            self.key = Some((track_id.to_string(), bar_count));
        }

        Arc::clone(&self.bars)
    }

    /// Bars from the last call, empty before the first one
    pub fn current(&self) -> Arc<[f32]> {
        Arc::clone(&self.bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_and_sized() {
        for id in ["1", "default", "a much longer track identifier", ""] {
            for count in [0, 1, 10, 80, 500] {
                let first = synthesize(id, count);
                let second = synthesize(id, count);
                assert_eq!(first.len(), count);
                assert_eq!(first, second, "id {:?} count {}", id, count);
            }
        }
    }

    #[test]
    fn test_heights_in_range() {
        let bars = synthesize("blinding-lights", 1000);
        for &h in &bars {
            assert!((MIN_BAR_HEIGHT..=1.0).contains(&h), "height out of range: {}", h);
        }
    }

    #[test]
    fn test_known_values() {
        // "1" has char code 49; bar 0: x = (49 * 9301 + 49297) % 233280 = 38486
        let bars = synthesize("1", 2);
        let random = 38486.0 / 233280.0;
        let expected = ((0.3 + random * 0.7) * 0.5 + 0.2) as f32;
        assert!((bars[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_different_tracks_differ() {
        assert_ne!(synthesize("1", 80), synthesize("2", 80));
    }

    #[test]
    fn test_prefix_stable_across_counts() {
        let short = synthesize("song", 20);
        let long = synthesize("song", 80);
        assert_eq!(&long[..20], &short[..]);
    }

    #[test]
    fn test_cache_reuses_bars_for_same_track() {
        let mut cache = WaveformCache::new();
        let first = cache.bars("7", 80);
        let second = cache.bars("7", 80);
        assert!(Arc::ptr_eq(&first, &second));

        let other = cache.bars("8", 80);
        assert!(!Arc::ptr_eq(&first, &other));
        assert!(Arc::ptr_eq(&other, &cache.current()));
    }

    #[test]
    fn test_cache_regenerates_on_bar_count_change() {
        let mut cache = WaveformCache::new();
        let first = cache.bars("7", 80);
        let resized = cache.bars("7", 40);
        assert_eq!(resized.len(), 40);
        assert!(!Arc::ptr_eq(&first, &resized));
    }
}
