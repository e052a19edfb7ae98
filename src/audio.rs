//! Audio I/O: WAV loading, mono conversion and plot-friendly waveforms

use crate::error::{Result as SplitResult, SplitError};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::info;

/// Decoded audio with interleaved samples normalized to [-1, 1]
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Interleaved samples
    pub samples: Vec<f32>,
    /// Number of channels
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Number of frames (samples per channel)
    pub fn n_frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Average all channels into a mono signal
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

/// Waveform prepared for plotting
#[derive(Debug, Clone)]
pub struct WaveformPlot {
    /// Time axis in seconds
    pub times_s: Vec<f32>,
    /// Mono samples, possibly strided
    pub mono: Vec<f32>,
    /// Total duration of the file in seconds
    pub duration_s: f32,
}

/// Load a WAV file
pub fn load_wav<P: AsRef<Path>>(path: P) -> SplitResult<AudioBuffer> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SplitError::AudioFileError(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(SplitError::InvalidAudioFormat(
            "WAV header declares zero channels".to_string(),
        ));
    }
    if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
        return Err(SplitError::InvalidAudioFormat(format!(
            "Unsupported bit depth: {}",
            spec.bits_per_sample
        )));
    }

    let mut samples: Vec<f32> = Vec::with_capacity(reader.len() as usize);
    match spec.sample_format {
        SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            for sample in reader.samples::<i32>() {
                samples.push(sample? as f32 / max_value);
            }
        }
        SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                samples.push(sample?);
            }
        }
    }

    Ok(AudioBuffer {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// Write interleaved samples as a 32-bit float WAV file
pub fn write_wav_f32<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> SplitResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write a mono float32 copy of `input` to `output`
pub fn prepare_mono<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> SplitResult<()> {
    let input = input.as_ref();
    let audio = load_wav(input)?;
    if audio.channels > 1 {
        info!(
            "Converting {} channels to mono for: {}",
            audio.channels,
            input.display()
        );
    }
    let mono = audio.to_mono();
    write_wav_f32(output, &mono, 1, audio.sample_rate)
}

/// Load a WAV file and return a downsampled mono waveform for plotting
///
/// Channels are averaged. When the file holds more than `max_points` frames the
/// samples are strided with `ceil(n / max_points)` so plotting stays cheap.
pub fn load_waveform_for_plot<P: AsRef<Path>>(
    path: P,
    max_points: usize,
) -> SplitResult<WaveformPlot> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SplitError::InputValidationError(format!(
            "File not found: {}",
            path.display()
        )));
    }
    if max_points == 0 {
        return Err(SplitError::InputValidationError(
            "max_points must be a positive integer".to_string(),
        ));
    }

    let audio = load_wav(path)?;
    let mono = audio.to_mono();
    if mono.is_empty() {
        return Err(SplitError::InvalidAudioFormat(format!(
            "Empty audio file: {}",
            path.display()
        )));
    }

    let n_samples = mono.len();
    let sr = audio.sample_rate as f32;
    let duration_s = n_samples as f32 / sr;

    let (mono, stride) = if n_samples > max_points {
        let stride = n_samples.div_ceil(max_points);
        (mono.into_iter().step_by(stride).collect::<Vec<_>>(), stride)
    } else {
        (mono, 1)
    };
    let times_s = (0..mono.len())
        .map(|i| (i * stride) as f32 / sr)
        .collect();

    Ok(WaveformPlot {
        times_s,
        mono,
        duration_s,
    })
}

/// Check an input track before handing it to the separator
pub fn validate_audio_file<P: AsRef<Path>>(path: P, extensions: &[String]) -> SplitResult<()> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(SplitError::InputValidationError(format!(
            "Audio file does not exist: {}",
            path.display()
        )));
    }

    if !crate::separation::validate_extension(path, extensions) {
        return Err(SplitError::InputValidationError(format!(
            "Unsupported extension for {} (expected one of {:?})",
            path.display(),
            extensions
        )));
    }

    Ok(())
}

/// Root-mean-square level of a signal
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}
