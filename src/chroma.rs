//! Pitch-class (chroma) features from a power spectrogram

use crate::spectral::{power_spectrogram, stft, Window};
use ndarray::Array2;

/// Number of pitch classes
pub const N_CHROMA: usize = 12;

/// Chroma frames plus the per-frame energy they were built from
#[derive(Debug, Clone)]
pub struct Chromagram {
    /// Shape (12, n_frames), each frame scaled to a maximum of 1
    pub chroma: Array2<f32>,
    /// Summed in-band power per frame, before normalization
    pub energy: Vec<f32>,
    /// Frame start times in seconds
    pub times: Vec<f32>,
}

impl Chromagram {
    pub fn n_frames(&self) -> usize {
        self.chroma.shape()[1]
    }
}

/// Pitch class (0 = C) nearest to a frequency, with A4 = 440 Hz
pub fn hz_to_pitch_class(freq: f32) -> Option<usize> {
    if freq <= 0.0 {
        return None;
    }
    let midi = 69.0 + 12.0 * (freq / 440.0).log2();
    Some((midi.round() as i64).rem_euclid(12) as usize)
}

/// Compute a chromagram of a mono signal
///
/// Only bins within `[min_freq, max_freq]` contribute. Power is used rather
/// than magnitude so window leakage into neighbouring semitones stays small.
pub fn chromagram(
    y: &[f32],
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
    min_freq: f32,
    max_freq: f32,
) -> Chromagram {
    let stft_data = stft(y, n_fft, hop_length, Window::Hann, sample_rate);
    let power = power_spectrogram(&stft_data);
    let n_frames = power.shape()[1];

    let bin_classes: Vec<Option<usize>> = stft_data
        .freqs
        .iter()
        .map(|&f| {
            if f >= min_freq && f <= max_freq {
                hz_to_pitch_class(f)
            } else {
                None
            }
        })
        .collect();

    let mut chroma = Array2::<f32>::zeros((N_CHROMA, n_frames));
    for (bin, class) in bin_classes.iter().enumerate() {
        if let Some(pc) = class {
            for t in 0..n_frames {
                chroma[[*pc, t]] += power[[bin, t]];
            }
        }
    }

    // Normalize by the window energy so the silence threshold is independent of n_fft
    let scale = 1.0 / (n_fft as f32 * n_fft as f32);
    let mut energy = vec![0.0; n_frames];
    for t in 0..n_frames {
        let mut column = chroma.column_mut(t);
        energy[t] = column.sum() * scale;
        let peak = column.iter().cloned().fold(0.0f32, f32::max);
        if peak > 0.0 {
            column.mapv_inplace(|v| v / peak);
        }
    }

    Chromagram {
        chroma,
        energy,
        times: stft_data.times,
    }
}
