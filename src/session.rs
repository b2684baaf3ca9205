//! Trim session controller.
//!
//! Binds the selection model, a playback adapter and the waveform
//! synthesizer together. The controller is the only writer of the playback
//! lifecycle and playhead position, and it only changes them in response to
//! adapter events carrying the token of the active load.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::TrimConfig;
use crate::error::{Result, WizardError};
use crate::playback::{LoadToken, PlaybackAdapter, PlaybackEvent, Subscription, TaggedEvent};
use crate::selection::{Preset, Selection, TrimRange};
use crate::view::{build_view, LoadStatus, TrimView, ViewInputs};
use crate::waveform::WaveformCache;

/// Playback lifecycle as observed from adapter events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Waiting for `ready`; the duration is not trustworthy yet
    Loading,
    ReadyPaused,
    ReadyPlaying,
    /// Paused at the end of the track after `finish`
    Finished,
}

impl PlaybackState {
    pub fn is_ready(self) -> bool {
        self != PlaybackState::Loading
    }

    pub fn is_playing(self) -> bool {
        self == PlaybackState::ReadyPlaying
    }
}

/// What the trimmer needs to know about the active track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSource {
    /// Waveform seed
    pub id: String,
    /// Source handed to the adapter's `load`
    pub url: String,
    /// Duration from the catalog, if any
    pub declared_duration: Option<f64>,
}

/// How the trimmer was left
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrimOutcome {
    Confirmed(TrimRange),
    /// Back to source selection; the wizard's track stays as it was
    Cancelled,
}

struct Attachment<A> {
    events: Receiver<TaggedEvent>,
    _subscription: Subscription,
    adapter: A,
}

/// Controller for one trimmer instance
pub struct TrimSession<A: PlaybackAdapter> {
    config: TrimConfig,
    attachment: Option<Attachment<A>>,
    source: Option<TrackSource>,
    token: LoadToken,
    state: PlaybackState,
    adapter_duration: Option<f64>,
    current_time: f64,
    loading_since: Option<Instant>,
    stall_reported: bool,
    selection: Selection,
    preset: Preset,
    waveform: WaveformCache,
}

impl<A: PlaybackAdapter> TrimSession<A> {
    pub fn new(config: TrimConfig) -> Self {
        let selection = Selection::new(config.default_selection_secs, config.min_selection_secs);
        Self {
            config,
            attachment: None,
            source: None,
            token: LoadToken::new(0),
            state: PlaybackState::Loading,
            adapter_duration: None,
            current_time: 0.0,
            loading_since: None,
            stall_reported: false,
            selection,
            preset: Preset::default(),
            waveform: WaveformCache::new(),
        }
    }

    /// Take ownership of an adapter and subscribe to its events
    ///
    /// A previously attached adapter is detached and dropped first. If a
    /// track is already open it is loaded into the new adapter.
    pub fn attach(&mut self, adapter: A) {
        drop(self.detach());

        let (subscription, events) = adapter.events().subscribe();
        self.attachment = Some(Attachment {
            events,
            _subscription: subscription,
            adapter,
        });
        tracing::debug!("Playback adapter attached");

        if self.source.is_some() {
            self.begin_load();
        }
    }

    /// Stop playback, release the event subscription and hand the adapter back
    pub fn detach(&mut self) -> Option<A> {
        let Attachment {
            events,
            _subscription: subscription,
            mut adapter,
        } = self.attachment.take()?;

        adapter.stop();
        drop(subscription);
        drop(events);

        self.state = PlaybackState::Loading;
        self.adapter_duration = None;
        self.current_time = 0.0;
        self.loading_since = None;
        tracing::debug!("Playback adapter detached");

        Some(adapter)
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn adapter(&self) -> Option<&A> {
        self.attachment.as_ref().map(|a| &a.adapter)
    }

    pub fn adapter_mut(&mut self) -> Option<&mut A> {
        self.attachment.as_mut().map(|a| &mut a.adapter)
    }

    /// Show a track in the trimmer, starting from `initial`
    ///
    /// The waveform is regenerated only if the track id changed. The
    /// initial range is clamped to the best duration known right now.
    pub fn open(&mut self, source: TrackSource, initial: TrimRange) {
        tracing::info!("Opening '{}' ({})", source.id, source.url);

        self.waveform.bars(&source.id, self.config.bar_count);
        self.source = Some(source);
        self.state = PlaybackState::Loading;
        self.adapter_duration = None;
        self.current_time = 0.0;
        self.preset = Preset::default();
        self.selection.adopt(initial, self.effective_duration());

        self.begin_load();
    }

    fn begin_load(&mut self) {
        self.token = self.token.next();
        self.state = PlaybackState::Loading;
        self.adapter_duration = None;
        self.loading_since = Some(Instant::now());
        self.stall_reported = false;

        let token = self.token;
        if let (Some(source), Some(attachment)) = (&self.source, &mut self.attachment) {
            tracing::debug!("Loading '{}' with token {}", source.url, token.value());
            attachment.adapter.load(&source.url, token);
        }
    }

    /// Apply every adapter event received so far; returns how many were applied
    pub fn pump(&mut self) -> usize {
        let pending: Vec<TaggedEvent> = match &self.attachment {
            Some(attachment) => attachment.events.try_iter().collect(),
            None => return 0,
        };

        pending
            .into_iter()
            .filter(|tagged| self.handle_event(*tagged))
            .count()
    }

    /// Apply one adapter event, returning false if it was stale or ignored
    pub fn handle_event(&mut self, tagged: TaggedEvent) -> bool {
        if tagged.token != self.token {
            tracing::debug!(
                "Discarding {:?} from stale load {} (active {})",
                tagged.event,
                tagged.token.value(),
                self.token.value()
            );
            return false;
        }

        match tagged.event {
            PlaybackEvent::Ready { duration } => {
                if duration.is_finite() && duration > 0.0 {
                    self.adapter_duration = Some(duration);
                } else {
                    tracing::warn!("Adapter reported unusable duration {}", duration);
                }
                if self.state == PlaybackState::Loading {
                    self.state = PlaybackState::ReadyPaused;
                }
                self.loading_since = None;
                self.stall_reported = false;

                let effective = self.effective_duration();
                self.selection.clamp_to(effective);
                self.current_time = self.current_time.min(effective);
                tracing::info!("Source ready, duration {:.2}s", effective);
                true
            }
            _ if !self.state.is_ready() => {
                tracing::debug!("Ignoring {:?} while loading", tagged.event);
                false
            }
            PlaybackEvent::Play => {
                self.state = PlaybackState::ReadyPlaying;
                true
            }
            PlaybackEvent::Pause => {
                if self.state == PlaybackState::ReadyPlaying {
                    self.state = PlaybackState::ReadyPaused;
                }
                true
            }
            PlaybackEvent::Finish => {
                self.state = PlaybackState::Finished;
                self.current_time = self.effective_duration();
                true
            }
            PlaybackEvent::TimeUpdate { current_time } => {
                if current_time.is_nan() {
                    return false;
                }
                self.current_time = current_time.max(0.0).min(self.effective_duration());
                true
            }
        }
    }

    /// Toggle playback; does nothing until the source is ready
    ///
    /// Events already queued by the adapter are applied first, so every
    /// command acts on the state the adapter has reported so far.
    pub fn play_pause(&mut self) {
        self.pump();
        if !self.state.is_ready() {
            tracing::debug!("play/pause ignored while loading");
            return;
        }
        if let Some(attachment) = &mut self.attachment {
            attachment.adapter.play_pause();
        }
    }

    /// Halt playback and rewind to 0
    pub fn stop(&mut self) {
        self.pump();
        if let Some(attachment) = &mut self.attachment {
            attachment.adapter.stop();
        }
        self.current_time = 0.0;
        if self.state.is_ready() {
            self.state = PlaybackState::ReadyPaused;
        }
    }

    /// Move the playhead; the new position arrives as a time update
    pub fn seek(&mut self, seconds: f64) {
        self.pump();
        if !self.state.is_ready() || seconds.is_nan() {
            return;
        }
        let target = seconds.max(0.0).min(self.effective_duration());
        if let Some(attachment) = &mut self.attachment {
            attachment.adapter.seek(target);
        }
    }

    pub fn select_preset(&mut self, preset: Preset) {
        self.preset = preset;
        let effective = self.effective_duration();
        self.selection.apply_preset(preset, effective);
    }

    /// Drag the start handle
    pub fn move_start(&mut self, seconds: f64) {
        let effective = self.effective_duration();
        self.selection.move_start(seconds, effective);
    }

    /// Drag the end handle
    pub fn move_end(&mut self, seconds: f64) {
        let effective = self.effective_duration();
        self.selection.move_end(seconds, effective);
    }

    /// Replace the selection, rejecting out-of-bounds or inverted ranges
    pub fn set_range(&mut self, start: f64, end: f64) -> Result<()> {
        let effective = self.effective_duration();
        self.selection.set_range(start, end, effective)
    }

    pub fn range(&self) -> TrimRange {
        self.selection.range()
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn source(&self) -> Option<&TrackSource> {
        self.source.as_ref()
    }

    pub fn token(&self) -> LoadToken {
        self.token
    }

    /// Waveform bars for the open track
    pub fn bars(&self) -> Arc<[f32]> {
        self.waveform.current()
    }

    /// Adapter duration once ready, else the catalog's, else the fallback
    pub fn effective_duration(&self) -> f64 {
        let declared = self
            .source
            .as_ref()
            .and_then(|source| source.declared_duration)
            .filter(|d| d.is_finite() && *d > 0.0);

        self.adapter_duration
            .or(declared)
            .unwrap_or(self.config.fallback_duration_secs)
    }

    pub fn load_status(&self, now: Instant) -> LoadStatus {
        if self.state.is_ready() {
            return LoadStatus::Ready;
        }
        let elapsed = self
            .loading_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or(Duration::ZERO);

        if self.loading_since.is_some() && elapsed >= self.config.stall_timeout() {
            LoadStatus::Stalled { elapsed }
        } else {
            LoadStatus::Loading { elapsed }
        }
    }

    /// Fail with `StalledLoad` once loading has outlasted the stall timeout
    pub fn check_stall(&mut self, now: Instant) -> Result<()> {
        let LoadStatus::Stalled { elapsed } = self.load_status(now) else {
            return Ok(());
        };

        let source_url = self
            .source
            .as_ref()
            .map(|source| source.url.clone())
            .unwrap_or_default();

        if !self.stall_reported {
            tracing::warn!("Load of '{}' stalled after {:?}", source_url, elapsed);
            self.stall_reported = true;
        }

        Err(WizardError::StalledLoad {
            source_url,
            waited: elapsed,
        })
    }

    pub fn view_at(&self, now: Instant) -> TrimView {
        let bars = self.waveform.current();
        build_view(ViewInputs {
            bars: &bars,
            range: self.selection.range(),
            current_time: self.current_time,
            effective_duration: self.effective_duration(),
            state: self.state,
            load: self.load_status(now),
            preset: self.preset,
        })
    }

    pub fn view(&self) -> TrimView {
        self.view_at(Instant::now())
    }

    pub fn confirm(&self) -> TrimOutcome {
        let range = self.selection.range();
        tracing::info!("Confirmed trim {:.2}-{:.2}s", range.start, range.end);
        TrimOutcome::Confirmed(range)
    }

    /// Leave the trimmer without a selection; playback is stopped
    pub fn cancel(&mut self) -> TrimOutcome {
        self.stop();
        TrimOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{ManualPlayer, PlayerCommand};
    use crate::view::BarClass;

    fn song_source(declared: Option<f64>) -> TrackSource {
        TrackSource {
            id: "7".to_string(),
            url: "songs/blinding-lights.mp3".to_string(),
            declared_duration: declared,
        }
    }

    fn session_with(declared: Option<f64>) -> TrimSession<ManualPlayer> {
        let mut session = TrimSession::new(TrimConfig::default());
        session.attach(ManualPlayer::new());
        session.open(song_source(declared), TrimRange { start: 0.0, end: 15.0 });
        session
    }

    fn ready(session: &mut TrimSession<ManualPlayer>, duration: f64) {
        session.adapter_mut().unwrap().finish_loading(duration);
        session.pump();
    }

    #[test]
    fn test_open_loads_into_adapter() {
        let session = session_with(Some(200.0));
        let player = session.adapter().unwrap();
        assert_eq!(player.source(), Some("songs/blinding-lights.mp3"));
        assert_eq!(player.token(), Some(session.token()));
        assert_eq!(session.state(), PlaybackState::Loading);
        assert_eq!(session.bars().len(), 80);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut session = session_with(Some(200.0));
        ready(&mut session, 200.0);
        assert_eq!(session.state(), PlaybackState::ReadyPaused);

        session.play_pause();
        session.pump();
        assert_eq!(session.state(), PlaybackState::ReadyPlaying);

        session.play_pause();
        session.pump();
        assert_eq!(session.state(), PlaybackState::ReadyPaused);
    }

    #[test]
    fn test_finish_parks_at_end() {
        let mut session = session_with(None);
        ready(&mut session, 4.0);
        session.play_pause();
        session.adapter_mut().unwrap().advance(5.0);
        session.pump();

        assert_eq!(session.state(), PlaybackState::Finished);
        assert_eq!(session.current_time(), 4.0);
        assert!(!session.view().playhead_visible);

        // Playing again from the end resumes
        session.play_pause();
        session.pump();
        assert_eq!(session.state(), PlaybackState::ReadyPlaying);
    }

    #[test]
    fn test_play_pause_is_noop_while_loading() {
        let mut session = session_with(Some(200.0));
        session.play_pause();
        assert_eq!(session.state(), PlaybackState::Loading);
        let commands = session.adapter().unwrap().commands();
        assert!(!commands.contains(&PlayerCommand::PlayPause));
    }

    #[test]
    fn test_stop_resets_from_any_ready_state() {
        let mut session = session_with(Some(200.0));
        ready(&mut session, 200.0);

        // From playing
        session.play_pause();
        session.adapter_mut().unwrap().advance(12.0);
        session.pump();
        assert_eq!(session.current_time(), 12.0);
        session.stop();
        assert_eq!(session.current_time(), 0.0);
        assert_eq!(session.state(), PlaybackState::ReadyPaused);

        // From paused
        session.seek(30.0);
        session.pump();
        assert_eq!(session.current_time(), 30.0);
        session.stop();
        assert_eq!(session.current_time(), 0.0);
        assert_eq!(session.state(), PlaybackState::ReadyPaused);
    }

    #[test]
    fn test_stop_wins_over_queued_events() {
        let mut session = session_with(Some(200.0));
        ready(&mut session, 200.0);

        session.play_pause();
        session.adapter_mut().unwrap().advance(5.0);
        session.stop();
        session.pump();

        assert_eq!(session.state(), PlaybackState::ReadyPaused);
        assert_eq!(session.current_time(), 0.0);
        assert!(!session.adapter().unwrap().is_playing());
    }

    #[test]
    fn test_play_pause_after_unpumped_ready() {
        let mut session = session_with(Some(200.0));
        session.adapter_mut().unwrap().finish_loading(200.0);

        session.play_pause();
        session.pump();
        assert_eq!(session.state(), PlaybackState::ReadyPlaying);
    }

    #[test]
    fn test_seek_after_queued_time_update() {
        let mut session = session_with(Some(200.0));
        ready(&mut session, 200.0);

        session.play_pause();
        session.adapter_mut().unwrap().advance(5.0);
        session.seek(42.0);
        session.pump();
        assert_eq!(session.current_time(), 42.0);
    }

    #[test]
    fn test_stop_from_finished() {
        let mut session = session_with(None);
        ready(&mut session, 2.0);
        session.play_pause();
        session.adapter_mut().unwrap().advance(2.0);
        session.pump();
        assert_eq!(session.state(), PlaybackState::Finished);

        session.stop();
        assert_eq!(session.state(), PlaybackState::ReadyPaused);
        assert_eq!(session.current_time(), 0.0);
    }

    #[test]
    fn test_time_update_ignored_while_loading() {
        let mut session = session_with(Some(200.0));
        session
            .adapter_mut()
            .unwrap()
            .emit(PlaybackEvent::TimeUpdate { current_time: 10.0 });
        assert_eq!(session.pump(), 0);
        assert_eq!(session.current_time(), 0.0);
    }

    #[test]
    fn test_time_update_clamped_to_duration() {
        let mut session = session_with(None);
        ready(&mut session, 30.0);
        session
            .adapter_mut()
            .unwrap()
            .emit(PlaybackEvent::TimeUpdate { current_time: 99.0 });
        session.pump();
        assert_eq!(session.current_time(), 30.0);
        assert_eq!(session.state(), PlaybackState::ReadyPaused);
    }

    #[test]
    fn test_effective_duration_resolution_order() {
        let mut session = session_with(None);
        assert_eq!(session.effective_duration(), 60.0);

        session.open(song_source(Some(200.0)), TrimRange { start: 0.0, end: 15.0 });
        assert_eq!(session.effective_duration(), 200.0);

        ready(&mut session, 187.5);
        assert_eq!(session.effective_duration(), 187.5);
    }

    #[test]
    fn test_ready_reclamps_selection() {
        let mut session = session_with(Some(200.0));
        session.set_range(5.0, 50.0).unwrap();

        ready(&mut session, 30.0);
        let range = session.range();
        assert!(range.end <= 30.0);
        assert!(range.start < range.end);
        assert_eq!(range, TrimRange { start: 5.0, end: 30.0 });
    }

    #[test]
    fn test_stale_events_are_discarded() {
        let mut session = session_with(Some(200.0));
        let old_token = session.token();

        // Switching tracks supersedes the first load
        session.open(
            TrackSource {
                id: "8".to_string(),
                url: "songs/levitating.mp3".to_string(),
                declared_duration: Some(203.0),
            },
            TrimRange { start: 0.0, end: 15.0 },
        );
        assert_ne!(session.token(), old_token);

        let player = session.adapter_mut().unwrap();
        player.emit_with(old_token, PlaybackEvent::Ready { duration: 12.0 });
        assert_eq!(session.pump(), 0);
        assert_eq!(session.state(), PlaybackState::Loading);
        assert_eq!(session.effective_duration(), 203.0);
    }

    #[test]
    fn test_presets_follow_start() {
        let mut session = session_with(Some(200.0));
        ready(&mut session, 200.0);
        session.set_range(20.0, 25.0).unwrap();

        session.select_preset(Preset::Long);
        assert_eq!(session.range(), TrimRange { start: 20.0, end: 80.0 });
        assert_eq!(session.preset(), Preset::Long);

        session.set_range(170.0, 180.0).unwrap();
        session.select_preset(Preset::Medium);
        assert_eq!(session.range(), TrimRange { start: 170.0, end: 200.0 });
    }

    #[test]
    fn test_set_range_rejects_out_of_bounds() {
        let mut session = session_with(Some(40.0));
        assert!(matches!(
            session.set_range(10.0, 50.0),
            Err(WizardError::InvalidRange { .. })
        ));
        assert_eq!(session.range(), TrimRange { start: 0.0, end: 15.0 });
    }

    #[test]
    fn test_view_reflects_selection_and_playhead() {
        let mut session: TrimSession<ManualPlayer> = TrimSession::new(TrimConfig {
            bar_count: 10,
            ..TrimConfig::default()
        });
        session.attach(ManualPlayer::new());
        session.open(song_source(None), TrimRange { start: 0.0, end: 15.0 });
        ready(&mut session, 100.0);
        session.set_range(20.0, 60.0).unwrap();
        session.seek(40.0);
        session.pump();

        let view = session.view();
        assert_eq!(view.selection_start_percent, 20.0);
        assert_eq!(view.selection_width_percent, 40.0);
        assert_eq!(view.played_percent, 40.0);
        assert_eq!(view.load, LoadStatus::Ready);
        assert_eq!(view.bars[2].class, BarClass::Played);
        assert_eq!(view.bars[5].class, BarClass::Selected);
        assert_eq!(view.bars[8].class, BarClass::Dimmed);
        assert_eq!(view.labels.total, "1:40");
    }

    #[test]
    fn test_stall_detection() {
        let mut session: TrimSession<ManualPlayer> = TrimSession::new(TrimConfig {
            stall_timeout_ms: 1_000,
            ..TrimConfig::default()
        });
        session.attach(ManualPlayer::new());
        session.open(song_source(Some(200.0)), TrimRange { start: 0.0, end: 15.0 });

        let now = Instant::now();
        assert!(session.check_stall(now).is_ok());

        let later = now + Duration::from_secs(5);
        assert!(matches!(
            session.load_status(later),
            LoadStatus::Stalled { .. }
        ));
        assert!(matches!(
            session.check_stall(later),
            Err(WizardError::StalledLoad { .. })
        ));

        // A late ready for the active load still recovers
        ready(&mut session, 200.0);
        assert!(session.check_stall(later).is_ok());
        assert_eq!(session.load_status(later), LoadStatus::Ready);
    }

    #[test]
    fn test_detach_releases_subscription() {
        let mut session = session_with(Some(200.0));
        let bus = session.adapter().unwrap().events().clone();
        assert_eq!(bus.listener_count(), 1);

        let player = session.detach().unwrap();
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(player.commands().last(), Some(&PlayerCommand::Stop));
        assert!(!session.is_attached());
        assert_eq!(session.pump(), 0);
    }

    #[test]
    fn test_drop_releases_subscription() {
        let session = session_with(Some(200.0));
        let bus = session.adapter().unwrap().events().clone();
        drop(session);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_reattach_reloads_open_track() {
        let mut session = session_with(Some(200.0));
        let first = session.token();
        let player = session.detach().unwrap();

        session.attach(player);
        assert_ne!(session.token(), first);
        assert_eq!(
            session.adapter().unwrap().token(),
            Some(session.token())
        );
    }

    #[test]
    fn test_confirm_and_cancel() {
        let mut session = session_with(Some(200.0));
        ready(&mut session, 200.0);
        session.set_range(12.0, 42.0).unwrap();

        assert_eq!(
            session.confirm(),
            TrimOutcome::Confirmed(TrimRange { start: 12.0, end: 42.0 })
        );

        session.play_pause();
        session.pump();
        assert_eq!(session.cancel(), TrimOutcome::Cancelled);
        assert_eq!(session.state(), PlaybackState::ReadyPaused);
    }
}
