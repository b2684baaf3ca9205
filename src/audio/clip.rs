// src/audio/clip.rs

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

use crate::audio::decode::{decode_file, DecodedAudio};
use crate::error::{Result, WizardError};
use crate::selection::TrimRange;

/// What was written by [`render_clip`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipInfo {
    pub path: PathBuf,
    pub range: TrimRange,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Check if a file is a WAV file by examining its extension
fn is_wav_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Write the confirmed trim range of `input` to a WAV file at `output`
///
/// WAV inputs are copied frame-for-frame in their original sample format.
/// Everything else is decoded and written as 32-bit float WAV.
///
/// # Example
/// ```no_run
/// use trim_wizard_lib::audio::render_clip;
/// use trim_wizard_lib::selection::TrimRange;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let range = TrimRange::new(30.0, 45.0)?;
/// let clip = render_clip("song.mp3", "clip.wav", &range)?;
/// println!("Wrote {:.1}s to {}", clip.duration_seconds, clip.path.display());
/// # Ok(())
/// # }
/// ```
pub fn render_clip<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    range: &TrimRange,
) -> Result<ClipInfo> {
    let input = input.as_ref();
    let output = output.as_ref();

    tracing::info!(
        "Rendering {:.2}-{:.2}s of {} to {}",
        range.start,
        range.end,
        input.display(),
        output.display()
    );

    if is_wav_file(input) {
        copy_wav_range(input, output, range)
    } else {
        let audio = decode_file(input)?;
        let clip = audio.slice(range)?;
        encode_wav(&clip, output)?;
        Ok(ClipInfo {
            path: output.to_path_buf(),
            range: *range,
            duration_seconds: clip.duration_seconds(),
            sample_rate: clip.sample_rate,
            channels: clip.channels,
        })
    }
}

/// Copy PCM frames straight from one WAV to another without decoding
fn copy_wav_range(input: &Path, output: &Path, range: &TrimRange) -> Result<ClipInfo> {
    let mut reader = WavReader::open(input)
        .map_err(|e| WizardError::DecodeFailed(format!("Failed to open WAV: {}", e)))?;

    let spec = reader.spec();
    let total_frames = reader.duration();
    let duration = total_frames as f64 / spec.sample_rate as f64;

    if range.end > duration {
        return Err(WizardError::InvalidRange {
            start: range.start,
            end: range.end,
            duration,
        });
    }

    let start_frame = ((range.start * spec.sample_rate as f64) as u32).min(total_frames);
    let end_frame = ((range.end * spec.sample_rate as f64) as u32).min(total_frames);
    let skip = start_frame as usize * spec.channels as usize;
    let take = (end_frame - start_frame) as usize * spec.channels as usize;

    let mut writer = WavWriter::create(output, spec)
        .map_err(|e| WizardError::EncodeFailed(format!("Failed to create WAV: {}", e)))?;

    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => copy_samples::<f32>(&mut reader, &mut writer, skip, take)?,
        (SampleFormat::Int, 8) => copy_samples::<i8>(&mut reader, &mut writer, skip, take)?,
        (SampleFormat::Int, 16) => copy_samples::<i16>(&mut reader, &mut writer, skip, take)?,
        (SampleFormat::Int, 24) | (SampleFormat::Int, 32) => {
            copy_samples::<i32>(&mut reader, &mut writer, skip, take)?
        }
        (_, bits) => {
            return Err(WizardError::DecodeFailed(format!(
                "Unsupported bit depth: {}",
                bits
            )));
        }
    }

    writer
        .finalize()
        .map_err(|e| WizardError::EncodeFailed(format!("Failed to finalize WAV: {}", e)))?;

    Ok(ClipInfo {
        path: output.to_path_buf(),
        range: *range,
        duration_seconds: (end_frame - start_frame) as f64 / spec.sample_rate as f64,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn copy_samples<S: hound::Sample>(
    reader: &mut WavReader<std::io::BufReader<std::fs::File>>,
    writer: &mut WavWriter<std::io::BufWriter<std::fs::File>>,
    skip: usize,
    take: usize,
) -> Result<()> {
    for sample in reader.samples::<S>().skip(skip).take(take) {
        let sample =
            sample.map_err(|e| WizardError::DecodeFailed(format!("Failed to read sample: {}", e)))?;
        writer
            .write_sample(sample)
            .map_err(|e| WizardError::EncodeFailed(format!("Failed to write sample: {}", e)))?;
    }
    Ok(())
}

/// Write PCM audio as a 32-bit float WAV file
pub fn encode_wav<P: AsRef<Path>>(audio: &DecodedAudio, output_path: P) -> Result<()> {
    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(output_path, spec)?;
    for &sample in &audio.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}
