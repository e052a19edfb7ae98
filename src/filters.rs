//! Biquad filters used to split a stem into low and high band approximations

use crate::audio::{load_wav, write_wav_f32};
use crate::error::{Result as SplitResult, SplitError};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use tracing::info;

/// Q used for the high-pass half of the split
pub const HIGHPASS_Q: f32 = 0.707;

/// Normalized second-order section (a0 divided out)
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Biquad {
    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Band-pass with constant 0 dB peak gain at `center_hz`
    pub fn bandpass(sample_rate: u32, center_hz: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * center_hz / sample_rate as f32;
        let alpha = w0.sin() / (2.0 * q);
        Self::normalized(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * w0.cos(), 1.0 - alpha)
    }

    /// Second-order high-pass at `cutoff_hz`
    pub fn highpass(sample_rate: u32, cutoff_hz: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate as f32;
        let alpha = w0.sin() / (2.0 * q);
        let cos_w0 = w0.cos();
        let b0 = (1.0 + cos_w0) / 2.0;
        Self::normalized(b0, -(1.0 + cos_w0), b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    /// Filter one channel (direct form I), clamping output to [-1, 1]
    pub fn process(&self, samples: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(samples.len());
        let (mut x1, mut x2, mut y1, mut y2) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        for &x0 in samples {
            let y0 = self.b0 * x0 + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
            x2 = x1;
            x1 = x0;
            y2 = y1;
            y1 = y0;
            out.push(y0.clamp(-1.0, 1.0));
        }
        out
    }

    /// Filter interleaved audio channel by channel
    pub fn process_interleaved(&self, samples: &[f32], channels: u16) -> Vec<f32> {
        let channels = channels.max(1) as usize;
        let mut out = vec![0.0f32; samples.len()];
        for ch in 0..channels {
            let channel: Vec<f32> = samples.iter().skip(ch).step_by(channels).copied().collect();
            for (i, v) in self.process(&channel).into_iter().enumerate() {
                out[i * channels + ch] = v;
            }
        }
        out
    }
}

/// Paths written by [`apply_simple_filters`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredStems {
    pub lowband: PathBuf,
    pub highband: PathBuf,
}

/// Split a stem into `<stem>_lowband.wav` (band-pass) and `<stem>_highband.wav` (high-pass)
pub fn apply_simple_filters(
    stem_path: &Path,
    low_center_hz: f32,
    high_cutoff_hz: f32,
    q: f32,
) -> SplitResult<FilteredStems> {
    if !stem_path.exists() {
        return Err(SplitError::FilterError(format!(
            "stem not found at {}",
            stem_path.display()
        )));
    }

    let audio = load_wav(stem_path)?;
    let nyquist = audio.sample_rate as f32 / 2.0;
    if low_center_hz >= nyquist || high_cutoff_hz >= nyquist {
        return Err(SplitError::FilterError(format!(
            "filter frequencies must be below Nyquist ({} Hz)",
            nyquist
        )));
    }

    let stem = stem_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stem".to_string());

    let lowband = Biquad::bandpass(audio.sample_rate, low_center_hz, q)
        .process_interleaved(&audio.samples, audio.channels);
    let lowband_path = stem_path.with_file_name(format!("{}_lowband.wav", stem));
    write_wav_f32(&lowband_path, &lowband, audio.channels, audio.sample_rate)?;
    info!("Saved lowband stem: {}", lowband_path.display());

    let highband = Biquad::highpass(audio.sample_rate, high_cutoff_hz, HIGHPASS_Q)
        .process_interleaved(&audio.samples, audio.channels);
    let highband_path = stem_path.with_file_name(format!("{}_highband.wav", stem));
    write_wav_f32(&highband_path, &highband, audio.channels, audio.sample_rate)?;
    info!("Saved highband stem: {}", highband_path.display());

    Ok(FilteredStems {
        lowband: lowband_path,
        highband: highband_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::rms;

    fn sine(freq: f32, sr: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin() * 0.5)
            .collect()
    }

    /// RMS after skipping the filter's start-up transient
    fn steady_rms(samples: &[f32]) -> f32 {
        rms(&samples[samples.len() / 4..])
    }

    #[test]
    fn test_highpass_attenuates_low_tone() {
        let sr = 44100;
        let hp = Biquad::highpass(sr, 700.0, HIGHPASS_Q);
        let low = hp.process(&sine(50.0, sr, sr as usize));
        let high = hp.process(&sine(5000.0, sr, sr as usize));
        assert!(steady_rms(&low) < 0.01);
        assert!((steady_rms(&high) - 0.5 / 2f32.sqrt()).abs() < 0.02);
    }

    #[test]
    fn test_bandpass_unity_at_center() {
        let sr = 44100;
        let bp = Biquad::bandpass(sr, 400.0, 0.707);
        let center = bp.process(&sine(400.0, sr, sr as usize));
        let far = bp.process(&sine(8000.0, sr, sr as usize));
        assert!((steady_rms(&center) - 0.5 / 2f32.sqrt()).abs() < 0.02);
        assert!(steady_rms(&far) < 0.05);
    }

    #[test]
    fn test_interleaved_channels_are_independent() {
        let hp = Biquad::highpass(8000, 1000.0, HIGHPASS_Q);
        let left = vec![0.0f32; 64];
        let right: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let interleaved: Vec<f32> = left.iter().zip(&right).flat_map(|(&l, &r)| [l, r]).collect();

        let out = hp.process_interleaved(&interleaved, 2);
        assert!(out.iter().step_by(2).all(|&v| v == 0.0));
        assert_eq!(&out[1..].iter().step_by(2).copied().collect::<Vec<_>>(), &hp.process(&right));
    }
}
