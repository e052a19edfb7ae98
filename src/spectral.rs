//! Short-time Fourier transform used by the chroma features

use ndarray::Array2;
use rustfft::{num_complex::Complex32, FftPlanner};
use std::f32::consts::PI;

/// Analysis window applied to each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hann,
    Rectangular,
}

impl Window {
    fn coefficients(self, size: usize) -> Vec<f32> {
        match self {
            Window::Hann if size > 1 => (0..size)
                .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
                .collect(),
            _ => vec![1.0; size],
        }
    }
}

/// Positive-frequency spectrum of every frame
#[derive(Debug, Clone)]
pub struct StftData {
    /// Shape (n_fft / 2 + 1, n_frames)
    pub s: Array2<Complex32>,
    /// Bin centre frequencies in Hz
    pub freqs: Vec<f32>,
    /// Frame start times in seconds
    pub times: Vec<f32>,
}

impl StftData {
    pub fn n_frames(&self) -> usize {
        self.s.shape()[1]
    }
}

/// Frames that fit in `len` samples; short signals still get one padded frame
fn frame_count(len: usize, n_fft: usize, hop_length: usize) -> usize {
    if len <= n_fft {
        1
    } else {
        (len - n_fft) / hop_length + 1
    }
}

/// Compute the STFT of a mono signal
///
/// Frames start every `hop_length` samples. Samples past the end of the
/// signal are zero.
pub fn stft(y: &[f32], n_fft: usize, hop_length: usize, window: Window, sample_rate: u32) -> StftData {
    let n_bins = n_fft / 2 + 1;
    let n_frames = frame_count(y.len(), n_fft, hop_length);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
    let coefficients = window.coefficients(n_fft);

    let mut s = Array2::<Complex32>::zeros((n_bins, n_frames));
    let mut buffer = vec![Complex32::new(0.0, 0.0); n_fft];

    for frame_idx in 0..n_frames {
        let start = frame_idx * hop_length;
        let samples = y.get(start..).unwrap_or(&[]);

        buffer.fill(Complex32::new(0.0, 0.0));
        for ((slot, &sample), &w) in buffer.iter_mut().zip(samples).zip(&coefficients) {
            slot.re = sample * w;
        }
        fft.process(&mut buffer);

        s.column_mut(frame_idx)
            .iter_mut()
            .zip(&buffer[..n_bins])
            .for_each(|(dst, &src)| *dst = src);
    }

    let bin_hz = sample_rate as f32 / n_fft as f32;
    let frame_sec = hop_length as f32 / sample_rate as f32;
    StftData {
        s,
        freqs: (0..n_bins).map(|i| i as f32 * bin_hz).collect(),
        times: (0..n_frames).map(|i| i as f32 * frame_sec).collect(),
    }
}

/// Squared magnitude of every bin
pub fn power_spectrogram(stft_data: &StftData) -> Array2<f32> {
    stft_data.s.map(|c| c.norm_sqr())
}
