// src/audio/mod.rs

pub mod clip;
pub mod decode;

// Re-export commonly used items
pub use clip::{encode_wav, render_clip, ClipInfo};
pub use decode::{decode_file, decode_file_until, probe, AudioInfo, DecodedAudio};
