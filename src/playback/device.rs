// src/playback/device.rs
//! Playback adapter that decodes with symphonia and plays through cpal
//!
//! Everything audible happens on a background thread per load: the file is
//! decoded, an output stream is opened, and the thread then reports
//! position and end-of-track on the event bus. The cpal stream never leaves
//! that thread, so the player itself is `Send`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;

use super::{EventBus, LoadToken, PlaybackAdapter, PlaybackEvent};
use crate::audio::decode_file_until;
use crate::error::{Result, WizardError};

/// Shared state for one load - all atomic for thread safety
struct SharedPlaybackState {
    ready: AtomicBool,
    is_playing: AtomicBool,
    current_frame: AtomicU64,
    total_frames: AtomicU64,
    sample_rate: AtomicU64,
    should_stop: AtomicBool,
    seek_to_frame: AtomicU64,
    seek_pending: AtomicBool,
}

impl SharedPlaybackState {
    fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            is_playing: AtomicBool::new(false),
            current_frame: AtomicU64::new(0),
            total_frames: AtomicU64::new(0),
            sample_rate: AtomicU64::new(44100),
            should_stop: AtomicBool::new(false),
            seek_to_frame: AtomicU64::new(0),
            seek_pending: AtomicBool::new(false),
        }
    }

    fn seconds(&self, frame: u64) -> f64 {
        let rate = self.sample_rate.load(Ordering::SeqCst);
        if rate > 0 {
            frame as f64 / rate as f64
        } else {
            0.0
        }
    }
}

/// Audio player on the default output device
pub struct DevicePlayer {
    bus: EventBus,
    state: Arc<SharedPlaybackState>,
    token: Option<LoadToken>,
    worker: Option<JoinHandle<()>>,
    update_interval: Duration,
}

impl DevicePlayer {
    /// `update_interval` is how often position updates are emitted while playing
    pub fn new(update_interval: Duration) -> Self {
        Self {
            bus: EventBus::new(),
            state: Arc::new(SharedPlaybackState::new()),
            token: None,
            worker: None,
            update_interval,
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(token) = self.token {
            self.bus.emit(token, event);
        }
    }

    /// Stop the current worker thread and wait for it
    fn shutdown(&mut self) {
        self.state.should_stop.store(true, Ordering::SeqCst);
        self.state.is_playing.store(false, Ordering::SeqCst);

        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DevicePlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PlaybackAdapter for DevicePlayer {
    fn events(&self) -> &EventBus {
        &self.bus
    }

    fn load(&mut self, source: &str, token: LoadToken) {
        self.shutdown();

        self.state = Arc::new(SharedPlaybackState::new());
        self.token = Some(token);

        let Some(path) = local_path(source) else {
            // Nothing will ever report ready; the controller sees a stall
            tracing::error!("Cannot play '{}': only local files are supported", source);
            return;
        };

        let state = Arc::clone(&self.state);
        let bus = self.bus.clone();
        let interval = self.update_interval;

        self.worker = Some(thread::spawn(move || {
            if let Err(e) = run_playback(path, state, bus, token, interval) {
                tracing::error!("Playback error: {}", e);
            }
        }));
    }

    fn play_pause(&mut self) {
        if !self.state.ready.load(Ordering::SeqCst) {
            tracing::debug!("play/pause ignored, source not ready");
            return;
        }
        let playing = !self.state.is_playing.load(Ordering::SeqCst);
        self.state.is_playing.store(playing, Ordering::SeqCst);
        self.emit(if playing {
            PlaybackEvent::Play
        } else {
            PlaybackEvent::Pause
        });
    }

    fn stop(&mut self) {
        self.state.is_playing.store(false, Ordering::SeqCst);
        self.state.seek_to_frame.store(0, Ordering::SeqCst);
        self.state.seek_pending.store(true, Ordering::SeqCst);
        self.state.current_frame.store(0, Ordering::SeqCst);
    }

    fn seek(&mut self, seconds: f64) {
        let rate = self.state.sample_rate.load(Ordering::SeqCst);
        let frame = (seconds.max(0.0) * rate as f64) as u64;
        self.state.seek_to_frame.store(frame, Ordering::SeqCst);
        self.state.seek_pending.store(true, Ordering::SeqCst);
    }

    fn duration(&self) -> Option<f64> {
        if self.state.ready.load(Ordering::SeqCst) {
            Some(self.state.seconds(self.state.total_frames.load(Ordering::SeqCst)))
        } else {
            None
        }
    }

    fn current_time(&self) -> f64 {
        self.state.seconds(self.state.current_frame.load(Ordering::SeqCst))
    }
}

/// Map a playable source to a file on disk
fn local_path(source: &str) -> Option<PathBuf> {
    if let Some(path) = source.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if source.contains("://") || source.starts_with("blob:") {
        return None;
    }
    Some(PathBuf::from(source))
}

/// Run the audio playback loop in a dedicated thread
fn run_playback(
    path: PathBuf,
    state: Arc<SharedPlaybackState>,
    bus: EventBus,
    token: LoadToken,
    interval: Duration,
) -> Result<()> {
    let Some(audio) = decode_file_until(&path, &state.should_stop)? else {
        // Superseded by a newer load
        return Ok(());
    };

    if audio.samples.is_empty() {
        return Err(WizardError::DecodeFailed("No audio samples decoded".to_string()));
    }

    let channels = audio.channels.max(1) as usize;
    let total_frames = audio.frame_count() as u64;
    state.sample_rate.store(audio.sample_rate as u64, Ordering::SeqCst);
    state.total_frames.store(total_frames, Ordering::SeqCst);

    // Set up cpal audio output
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| WizardError::Playback("No output device available".to_string()))?;

    let config = StreamConfig {
        channels: audio.channels,
        sample_rate: cpal::SampleRate(audio.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let samples = Arc::new(audio.samples);
    let samples_clone = Arc::clone(&samples);
    let state_clone = Arc::clone(&state);
    let read_pos = Arc::new(AtomicU64::new(0));
    let read_pos_clone = Arc::clone(&read_pos);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !state_clone.is_playing.load(Ordering::SeqCst) {
                    // Output silence when paused
                    data.fill(0.0);
                    return;
                }

                let pos = read_pos_clone.load(Ordering::SeqCst) as usize;
                for (i, sample) in data.iter_mut().enumerate() {
                    *sample = samples_clone.get(pos + i).copied().unwrap_or(0.0);
                }

                let new_pos = (pos + data.len()).min(samples_clone.len());
                read_pos_clone.store(new_pos as u64, Ordering::SeqCst);
                state_clone
                    .current_frame
                    .store((new_pos / channels) as u64, Ordering::SeqCst);
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| WizardError::Playback(format!("Failed to build stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| WizardError::Playback(format!("Failed to start stream: {}", e)))?;

    tracing::info!("Ready: {}", path.display());
    report_events(&state, &read_pos, samples.len(), channels, &bus, token, interval);

    Ok(())
}

/// Announce `ready`, then report seeks, position and end of track until stopped
///
/// Runs alongside the output stream, which advances `read_pos` and
/// `current_frame` as it plays.
fn report_events(
    state: &SharedPlaybackState,
    read_pos: &AtomicU64,
    sample_count: usize,
    channels: usize,
    bus: &EventBus,
    token: LoadToken,
    interval: Duration,
) {
    let total_frames = state.total_frames.load(Ordering::SeqCst);
    state.ready.store(true, Ordering::SeqCst);
    bus.emit(
        token,
        PlaybackEvent::Ready {
            duration: state.seconds(total_frames),
        },
    );

    loop {
        if state.should_stop.load(Ordering::SeqCst) {
            break;
        }

        if state.seek_pending.swap(false, Ordering::SeqCst) {
            let frame = state.seek_to_frame.load(Ordering::SeqCst).min(total_frames);
            let sample = (frame as usize * channels).min(sample_count);
            read_pos.store(sample as u64, Ordering::SeqCst);
            state.current_frame.store(frame, Ordering::SeqCst);
            bus.emit(
                token,
                PlaybackEvent::TimeUpdate {
                    current_time: state.seconds(frame),
                },
            );
        }

        if state.is_playing.load(Ordering::SeqCst) {
            let frame = state.current_frame.load(Ordering::SeqCst);
            bus.emit(
                token,
                PlaybackEvent::TimeUpdate {
                    current_time: state.seconds(frame),
                },
            );

            if read_pos.load(Ordering::SeqCst) as usize >= sample_count {
                state.is_playing.store(false, Ordering::SeqCst);
                read_pos.store(0, Ordering::SeqCst);
                state.current_frame.store(0, Ordering::SeqCst);
                bus.emit(token, PlaybackEvent::Finish);
            }
        }

        thread::sleep(interval);
    }
}
