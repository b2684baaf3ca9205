//! In-memory adapter driven by hand.
//!
//! Commands are recorded instead of producing sound, and lifecycle events are
//! emitted only when the owner asks for them. Used by the controller tests
//! and by the CLI's `--headless` mode.

use super::{EventBus, LoadToken, PlaybackAdapter, PlaybackEvent};

/// A command the controller sent to the adapter
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load { source: String, token: LoadToken },
    PlayPause,
    Stop,
    Seek(f64),
}

#[derive(Debug, Default)]
pub struct ManualPlayer {
    bus: EventBus,
    commands: Vec<PlayerCommand>,
    token: Option<LoadToken>,
    source: Option<String>,
    duration: Option<f64>,
    current_time: f64,
    playing: bool,
}

impl ManualPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[PlayerCommand] {
        &self.commands
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn token(&self) -> Option<LoadToken> {
        self.token
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Finish loading the current source
    pub fn finish_loading(&mut self, duration: f64) {
        self.duration = Some(duration);
        self.emit(PlaybackEvent::Ready { duration });
    }

    /// Advance the playhead as if audio had played, emitting a time update
    /// and `Finish` when the end is reached
    pub fn advance(&mut self, seconds: f64) {
        if !self.playing {
            return;
        }
        let duration = self.duration.unwrap_or(f64::INFINITY);
        self.current_time = (self.current_time + seconds).min(duration);
        self.emit(PlaybackEvent::TimeUpdate {
            current_time: self.current_time,
        });

        if self.current_time >= duration {
            self.playing = false;
            self.emit(PlaybackEvent::Finish);
        }
    }

    /// Emit an event tagged with the current load token
    pub fn emit(&self, event: PlaybackEvent) {
        if let Some(token) = self.token {
            self.bus.emit(token, event);
        }
    }

    /// Emit an event with an arbitrary token, e.g. one from an earlier load
    pub fn emit_with(&self, token: LoadToken, event: PlaybackEvent) {
        self.bus.emit(token, event);
    }
}

impl PlaybackAdapter for ManualPlayer {
    fn events(&self) -> &EventBus {
        &self.bus
    }

    fn load(&mut self, source: &str, token: LoadToken) {
        self.commands.push(PlayerCommand::Load {
            source: source.to_string(),
            token,
        });
        self.token = Some(token);
        self.source = Some(source.to_string());
        self.duration = None;
        self.current_time = 0.0;
        self.playing = false;
    }

    fn play_pause(&mut self) {
        self.commands.push(PlayerCommand::PlayPause);
        if self.duration.is_none() {
            return;
        }
        self.playing = !self.playing;
        self.emit(if self.playing {
            PlaybackEvent::Play
        } else {
            PlaybackEvent::Pause
        });
    }

    fn stop(&mut self) {
        self.commands.push(PlayerCommand::Stop);
        self.playing = false;
        self.current_time = 0.0;
    }

    fn seek(&mut self, seconds: f64) {
        self.commands.push(PlayerCommand::Seek(seconds));
        self.current_time = seconds;
        self.emit(PlaybackEvent::TimeUpdate {
            current_time: seconds,
        });
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_pause_ignored_before_ready() {
        let mut player = ManualPlayer::new();
        let (_sub, rx) = player.events().subscribe();

        player.load("song.mp3", LoadToken::new(1));
        player.play_pause();

        assert!(!player.is_playing());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ready_then_toggle_emits_events() {
        let mut player = ManualPlayer::new();
        let (_sub, rx) = player.events().subscribe();

        player.load("song.mp3", LoadToken::new(1));
        player.finish_loading(120.0);
        player.play_pause();
        player.play_pause();

        let events: Vec<_> = rx.try_iter().map(|t| t.event).collect();
        assert_eq!(
            events,
            vec![
                PlaybackEvent::Ready { duration: 120.0 },
                PlaybackEvent::Play,
                PlaybackEvent::Pause,
            ]
        );
    }

    #[test]
    fn test_advance_to_end_finishes() {
        let mut player = ManualPlayer::new();
        let (_sub, rx) = player.events().subscribe();

        player.load("short.wav", LoadToken::new(2));
        player.finish_loading(3.0);
        player.play_pause();
        player.advance(2.0);
        player.advance(2.0);

        let events: Vec<_> = rx.try_iter().map(|t| t.event).collect();
        assert_eq!(events.last(), Some(&PlaybackEvent::Finish));
        assert_eq!(player.current_time(), 3.0);
        assert!(!player.is_playing());
    }

    #[test]
    fn test_records_commands() {
        let mut player = ManualPlayer::new();
        player.load("a", LoadToken::new(1));
        player.seek(4.0);
        player.stop();

        assert_eq!(
            player.commands(),
            &[
                PlayerCommand::Load {
                    source: "a".to_string(),
                    token: LoadToken::new(1)
                },
                PlayerCommand::Seek(4.0),
                PlayerCommand::Stop,
            ]
        );
        assert_eq!(player.current_time(), 0.0);
    }
}
