//! Wizard State Container.
//!
//! Holds everything the creation flow collects across its steps: the chosen
//! track (catalog song or upload), the trim range, the prompt and the
//! generation options. It is also the sole owner of the local object URL
//! created for an uploaded file.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::Song;
use crate::error::Result;
use crate::selection::TrimRange;
use crate::session::{TrackSource, TrimOutcome};

/// Trim length selected for a fresh track and target clip length
pub const DEFAULT_CLIP_SECS: u32 = 15;

/// Waveform seed used for uploads, which have no catalog id
pub const UPLOAD_WAVEFORM_ID: &str = "default";

/// An audio file picked from disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub path: PathBuf,
}

impl UploadedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { name, path }
    }
}

/// Creates and revokes locally scoped URLs for uploaded files
pub trait ObjectUrlStore {
    fn create_url(&mut self, file: &UploadedFile) -> String;

    fn revoke_url(&mut self, url: &str);

    /// File behind a live URL
    fn resolve(&self, url: &str) -> Option<PathBuf>;
}

impl<T: ObjectUrlStore + ?Sized> ObjectUrlStore for &mut T {
    fn create_url(&mut self, file: &UploadedFile) -> String {
        (**self).create_url(file)
    }

    fn revoke_url(&mut self, url: &str) {
        (**self).revoke_url(url)
    }

    fn resolve(&self, url: &str) -> Option<PathBuf> {
        (**self).resolve(url)
    }
}

/// In-process URL store handing out `blob:trim-wizard/<n>` URLs
#[derive(Debug, Default)]
pub struct LocalUrlStore {
    next_id: u64,
    live: HashMap<String, PathBuf>,
    created: usize,
    revoked: usize,
}

impl LocalUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs created so far
    pub fn created(&self) -> usize {
        self.created
    }

    /// URLs revoked so far
    pub fn revoked(&self) -> usize {
        self.revoked
    }

    /// URLs created and not yet revoked
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl ObjectUrlStore for LocalUrlStore {
    fn create_url(&mut self, file: &UploadedFile) -> String {
        self.next_id += 1;
        let url = format!("blob:trim-wizard/{}", self.next_id);
        self.live.insert(url.clone(), file.path.clone());
        self.created += 1;
        tracing::info!("Created {} for '{}'", url, file.name);
        url
    }

    fn revoke_url(&mut self, url: &str) {
        if self.live.remove(url).is_some() {
            self.revoked += 1;
            tracing::info!("Revoked {}", url);
        } else {
            tracing::warn!("Revoke of unknown URL {}", url);
        }
    }

    fn resolve(&self, url: &str) -> Option<PathBuf> {
        self.live.get(url).cloned()
    }
}

/// A live object URL
///
/// Deliberately not `Clone`: `release` consumes it, so a URL can only be
/// revoked once and cannot be read afterwards.
#[derive(Debug, PartialEq, Eq)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    fn create<S: ObjectUrlStore>(store: &mut S, file: &UploadedFile) -> Self {
        Self(store.create_url(file))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn release<S: ObjectUrlStore>(self, store: &mut S) {
        store.revoke_url(&self.0);
    }
}

/// The wizard's audio source; exactly one kind is active at a time
#[derive(Debug, PartialEq)]
pub enum TrackReference {
    Catalog(Song),
    Upload { file: UploadedFile, url: ObjectUrl },
}

impl TrackReference {
    /// What the trimmer needs to load and draw this track
    pub fn playback_source(&self) -> TrackSource {
        match self {
            TrackReference::Catalog(song) => TrackSource {
                id: song.id.clone(),
                url: song.audio_url.clone(),
                declared_duration: Some(song.duration_seconds as f64),
            },
            TrackReference::Upload { url, .. } => TrackSource {
                id: UPLOAD_WAVEFORM_ID.to_string(),
                url: url.as_str().to_string(),
                declared_duration: None,
            },
        }
    }

    pub fn summary(&self) -> TrackSummary {
        match self {
            TrackReference::Catalog(song) => TrackSummary::Song {
                id: song.id.clone(),
                title: song.title.clone(),
                artist: song.artist.clone(),
                duration_seconds: song.duration_seconds,
            },
            TrackReference::Upload { file, url } => TrackSummary::Upload {
                name: file.name.clone(),
                url: url.as_str().to_string(),
            },
        }
    }
}

/// Serializable description of the chosen track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrackSummary {
    Song {
        id: String,
        title: String,
        artist: String,
        duration_seconds: u32,
    },
    Upload {
        name: String,
        url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStyle {
    Singing,
    Storytelling,
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Fast,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Generation options collected by the wizard
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WizardOptions {
    pub character: Option<String>,
    pub lyrics: bool,
    pub style: Option<String>,
    pub remove_watermark: bool,
    pub mode: Mode,
    pub visibility: Visibility,
}

/// Partial update for [`WizardOptions`]; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WizardOptionsPatch {
    pub character: Option<Option<String>>,
    pub lyrics: Option<bool>,
    pub style: Option<Option<String>>,
    pub remove_watermark: Option<bool>,
    pub mode: Option<Mode>,
    pub visibility: Option<Visibility>,
}

impl WizardOptions {
    pub fn merge(&mut self, patch: WizardOptionsPatch) {
        if let Some(character) = patch.character {
            self.character = character;
        }
        if let Some(lyrics) = patch.lyrics {
            self.lyrics = lyrics;
        }
        if let Some(style) = patch.style {
            self.style = style;
        }
        if let Some(remove_watermark) = patch.remove_watermark {
            self.remove_watermark = remove_watermark;
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(visibility) = patch.visibility {
            self.visibility = visibility;
        }
    }
}

/// Emitted upward once a trim is confirmed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrimHandoff {
    pub track: TrackSummary,
    pub trim_start: f64,
    pub trim_end: f64,
}

/// Everything downstream generation needs, as one JSON payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreationRequest {
    pub style: Option<VideoStyle>,
    pub track: TrackSummary,
    pub trim_start: f64,
    pub trim_end: f64,
    pub duration: u32,
    pub prompt: String,
    pub options: WizardOptions,
}

fn default_trim() -> TrimRange {
    TrimRange {
        start: 0.0,
        end: DEFAULT_CLIP_SECS as f64,
    }
}

/// State of one pass through the creation flow
pub struct WizardSession<S: ObjectUrlStore = LocalUrlStore> {
    store: S,
    style: Option<VideoStyle>,
    track: Option<TrackReference>,
    trim: TrimRange,
    duration: u32,
    prompt: String,
    options: WizardOptions,
}

impl<S: ObjectUrlStore> WizardSession<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            style: None,
            track: None,
            trim: default_trim(),
            duration: DEFAULT_CLIP_SECS,
            prompt: String::new(),
            options: WizardOptions::default(),
        }
    }

    /// Drop the current track, revoking its object URL if it was an upload
    fn release_track(&mut self) {
        if let Some(TrackReference::Upload { url, .. }) = self.track.take() {
            url.release(&mut self.store);
        }
    }

    /// Use a catalog song; the trim resets to `[0, min(15, duration)]`
    pub fn select_song(&mut self, song: Song) {
        self.release_track();
        tracing::info!("Selected '{}' by {}", song.title, song.artist);
        self.trim = TrimRange::initial(DEFAULT_CLIP_SECS as f64, song.duration_seconds as f64);
        self.track = Some(TrackReference::Catalog(song));
    }

    /// Use an uploaded file
    ///
    /// The previous upload's URL is revoked before the new one is created,
    /// so the session never holds two live URLs.
    pub fn select_upload(&mut self, file: UploadedFile) {
        self.release_track();
        let url = ObjectUrl::create(&mut self.store, &file);
        tracing::info!("Selected upload '{}'", file.name);
        self.trim = default_trim();
        self.track = Some(TrackReference::Upload { file, url });
    }

    /// Go back to "no track selected"
    pub fn clear_track(&mut self) {
        self.release_track();
        self.trim = default_trim();
    }

    pub fn set_trim_range(&mut self, start: f64, end: f64) -> Result<()> {
        self.trim = TrimRange::new(start, end)?;
        Ok(())
    }

    /// Record what the trimmer was left with; returns true if the range changed
    pub fn apply_outcome(&mut self, outcome: TrimOutcome) -> bool {
        match outcome {
            TrimOutcome::Confirmed(range) => {
                self.trim = range;
                true
            }
            TrimOutcome::Cancelled => false,
        }
    }

    pub fn set_style(&mut self, style: Option<VideoStyle>) {
        self.style = style;
    }

    /// Target clip length in seconds
    pub fn set_duration(&mut self, seconds: u32) {
        self.duration = seconds;
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn set_options(&mut self, patch: WizardOptionsPatch) {
        self.options.merge(patch);
    }

    /// Release the upload URL, if any, and restore every field to its default
    pub fn reset(&mut self) {
        self.release_track();
        self.style = None;
        self.trim = default_trim();
        self.duration = DEFAULT_CLIP_SECS;
        self.prompt.clear();
        self.options = WizardOptions::default();
        tracing::debug!("Wizard reset");
    }

    pub fn track(&self) -> Option<&TrackReference> {
        self.track.as_ref()
    }

    pub fn selected_song(&self) -> Option<&Song> {
        match &self.track {
            Some(TrackReference::Catalog(song)) => Some(song),
            _ => None,
        }
    }

    pub fn audio_url(&self) -> Option<&str> {
        match &self.track {
            Some(TrackReference::Upload { url, .. }) => Some(url.as_str()),
            _ => None,
        }
    }

    pub fn trim(&self) -> TrimRange {
        self.trim
    }

    pub fn style(&self) -> Option<VideoStyle> {
        self.style
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn options(&self) -> &WizardOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Source to hand to the trimmer for the current track
    pub fn playback_source(&self) -> Option<TrackSource> {
        self.track.as_ref().map(TrackReference::playback_source)
    }

    pub fn handoff(&self) -> Option<TrimHandoff> {
        let track = self.track.as_ref()?;
        Some(TrimHandoff {
            track: track.summary(),
            trim_start: self.trim.start,
            trim_end: self.trim.end,
        })
    }

    pub fn creation_request(&self) -> Option<CreationRequest> {
        let track = self.track.as_ref()?;
        Some(CreationRequest {
            style: self.style,
            track: track.summary(),
            trim_start: self.trim.start,
            trim_end: self.trim.end,
            duration: self.duration,
            prompt: self.prompt.clone(),
            options: self.options.clone(),
        })
    }
}

impl<S: ObjectUrlStore> Drop for WizardSession<S> {
    fn drop(&mut self) {
        self.release_track();
    }
}
