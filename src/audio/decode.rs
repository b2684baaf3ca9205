// src/audio/decode.rs

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, WizardError};
use crate::selection::TrimRange;

/// Decoded PCM audio held in memory
///
/// Samples are interleaved 32-bit floats in `[-1.0, 1.0]`:
/// `[L, R, L, R, ...]` for stereo.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Duration = frames / sample_rate
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Number of frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Copy out the frames covered by `range`
    ///
    /// Fails if the range ends past the decoded audio.
    pub fn slice(&self, range: &TrimRange) -> Result<DecodedAudio> {
        let duration = self.duration_seconds();
        if range.end > duration {
            return Err(WizardError::InvalidRange {
                start: range.start,
                end: range.end,
                duration,
            });
        }

        let channels = self.channels.max(1) as usize;
        let start_frame = (range.start * self.sample_rate as f64) as usize;
        let end_frame = (range.end * self.sample_rate as f64) as usize;

        let start = (start_frame * channels).min(self.samples.len());
        let end = (end_frame * channels).min(self.samples.len());

        Ok(DecodedAudio {
            samples: self.samples[start..end].to_vec(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }
}

/// Metadata about an audio file, read without decoding samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Total duration in seconds, 0 if the container does not say
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Codec name as reported by symphonia
    pub format: String,
}

struct OpenedTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
}

fn probe_format(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path).map_err(|e| WizardError::FileOpen {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| WizardError::DecodeFailed(format!("Failed to probe format: {}", e)))?;

    Ok(probed.format)
}

fn open_track(path: &Path) -> Result<OpenedTrack> {
    let format = probe_format(path)?;

    // Skip video/cover-art tracks
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| WizardError::DecodeFailed("No audio track found in file".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| WizardError::DecodeFailed("Sample rate not found".to_string()))?;

    let decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| WizardError::DecodeFailed(format!("Failed to create decoder: {}", e)))?;

    Ok(OpenedTrack {
        format,
        decoder,
        track_id,
        sample_rate,
    })
}

/// Decode a whole audio file to interleaved f32 PCM
///
/// # Example
/// ```no_run
/// use trim_wizard_lib::audio::decode_file;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let audio = decode_file("song.mp3")?;
/// println!("{:.1}s at {} Hz", audio.duration_seconds(), audio.sample_rate);
/// # Ok(())
/// # }
/// ```
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
    let never = AtomicBool::new(false);
    decode_file_until(path, &never)?
        .ok_or_else(|| WizardError::DecodeFailed("Decode was cancelled".to_string()))
}

/// Decode a whole file, giving up early once `cancel` is set
///
/// Returns `Ok(None)` when cancelled. The flag is checked between packets.
pub fn decode_file_until<P: AsRef<Path>>(
    path: P,
    cancel: &AtomicBool,
) -> Result<Option<DecodedAudio>> {
    let OpenedTrack {
        mut format,
        mut decoder,
        track_id,
        sample_rate,
    } = open_track(path.as_ref())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channels: Option<u16> = None;

    loop {
        if cancel.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(_) => break, // End of stream
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(WizardError::DecodeFailed(format!("Decode error: {}", e))),
        };

        let spec = *decoded.spec();
        channels.get_or_insert(spec.channels.count() as u16);

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let channels = channels
        .ok_or_else(|| WizardError::DecodeFailed("No audio samples decoded".to_string()))?;

    Ok(Some(DecodedAudio {
        samples,
        sample_rate,
        channels,
    }))
}

/// Read duration and format details without decoding the file
pub fn probe<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
    let format = probe_format(path.as_ref())?;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| WizardError::DecodeFailed("No audio track".to_string()))?;

    let params = &track.codec_params;
    let duration_seconds = match (params.n_frames, params.sample_rate) {
        (Some(n_frames), Some(rate)) if rate > 0 => n_frames as f64 / rate as f64,
        _ => 0.0,
    };

    Ok(AudioInfo {
        duration_seconds,
        sample_rate: params.sample_rate.unwrap_or(0),
        channels: params.channels.map(|c| c.count() as u16).unwrap_or(0),
        format: format!("{:?}", params.codec),
    })
}
