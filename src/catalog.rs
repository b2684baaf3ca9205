//! Read-only song catalog.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WizardError};

/// A catalog entry the user can pick as the wizard's audio source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Stable identifier, also the waveform seed
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Declared length in whole seconds
    pub duration_seconds: u32,
    pub artwork_url: String,
    /// Playable source (URL or local path)
    pub audio_url: String,
    /// Popularity count, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remix_count: Option<u32>,
}

/// Ordered list of songs, as delivered by the catalog collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    songs: Vec<Song>,
}

impl Catalog {
    pub fn new(songs: Vec<Song>) -> Self {
        Self { songs }
    }

    /// Parse a catalog from a JSON array of songs
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| WizardError::FileOpen {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_json(&text)
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn find(&self, id: &str) -> Option<&Song> {
        self.songs.iter().find(|song| song.id == id)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

/// Format whole seconds as `m:ss`
///
/// ```
/// use trim_wizard_lib::catalog::format_duration;
///
/// assert_eq!(format_duration(235), "3:55");
/// assert_eq!(format_duration(9), "0:09");
/// ```
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
