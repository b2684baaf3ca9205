pub mod audio;
pub mod catalog;
pub mod config;
pub mod error;
pub mod playback;
pub mod selection;
pub mod session;
pub mod view;
pub mod waveform;
pub mod wizard;

// Re-export for convenience
pub use catalog::{format_duration, Catalog, Song};
pub use config::TrimConfig;
pub use error::{Result, WizardError};
pub use playback::{DevicePlayer, LoadToken, ManualPlayer, PlaybackAdapter, PlaybackEvent};
pub use selection::{Preset, Selection, TrimRange};
pub use session::{PlaybackState, TrackSource, TrimOutcome, TrimSession};
pub use view::{BarClass, LoadStatus, TrimView};
pub use wizard::{
    CreationRequest, LocalUrlStore, ObjectUrlStore, TrackReference, TrimHandoff, UploadedFile,
    WizardOptions, WizardOptionsPatch, WizardSession,
};
