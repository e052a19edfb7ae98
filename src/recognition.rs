//! Chord recognition on a separated stem
//!
//! Two recognizers sit behind [`ChordRecognizer`]: a pretrained model run as a
//! subprocess, and a built-in chroma template matcher with Viterbi smoothing
//! that needs nothing beyond this crate.

use crate::audio::{load_wav, prepare_mono};
use crate::chord_library::{vocabulary, Chord, NO_CHORD};
use crate::chroma::{chromagram, Chromagram, N_CHROMA};
use crate::config::{ChordsConfig, RecognizerBackend};
use crate::error::{Result as SplitResult, SplitError};
use crate::lab::{read_chords_lab, write_chords_lab, ChordSegment};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Anything that turns a WAV stem into timestamped chord segments
pub trait ChordRecognizer {
    fn recognize(&self, wav: &Path) -> SplitResult<Vec<ChordSegment>>;
}

/// Build the recognizer selected in the configuration
pub fn recognizer_from_config(config: &ChordsConfig) -> Box<dyn ChordRecognizer> {
    match config.backend {
        RecognizerBackend::Builtin => Box::new(TemplateRecognizer::from_config(config)),
        RecognizerBackend::External => Box::new(ExternalRecognizer::new(
            config.external_command.clone(),
        )),
    }
}

/// Predict chords for a stem and write them as a `.lab` file with notes
pub fn predict_chords_for_stem(
    input_wav: &Path,
    output_lab: &Path,
    config: &ChordsConfig,
) -> SplitResult<Vec<ChordSegment>> {
    if !input_wav.exists() {
        return Err(SplitError::InputValidationError(format!(
            "Stem wav not found: {}",
            input_wav.display()
        )));
    }

    info!("Running chord recognition on: {}", input_wav.display());
    let recognizer = recognizer_from_config(config);
    let segments = recognizer.recognize(input_wav)?;

    write_chords_lab(output_lab, &segments, config.base_octave)?;
    info!(
        "Chord predictions saved to: {} ({} segments)",
        output_lab.display(),
        segments.len()
    );
    Ok(segments)
}

/// Pretrained recognizer invoked as a subprocess that writes a `.lab` file
///
/// `{input}` and `{output}` in the argument vector are replaced with the mono
/// input WAV and the `.lab` path the tool must write.
#[derive(Debug, Clone)]
pub struct ExternalRecognizer {
    argv: Vec<String>,
}

impl ExternalRecognizer {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    fn expand_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }

    fn run(&self, mono_wav: &Path, lab_path: &Path) -> SplitResult<Vec<ChordSegment>> {
        let args = self.expand_args(mono_wav, lab_path);
        let (program, rest) = args.split_first().ok_or_else(|| {
            SplitError::RecognitionError("external recognizer command is empty".to_string())
        })?;

        debug!("Spawning recognizer: {:?}", args);
        let status = Command::new(program).args(rest).status().map_err(|e| {
            SplitError::RecognitionError(format!("failed to start '{}': {}", program, e))
        })?;
        if !status.success() {
            return Err(SplitError::RecognitionError(format!(
                "'{}' exited with {}",
                program, status
            )));
        }
        if !lab_path.exists() {
            return Err(SplitError::RecognitionError(format!(
                "'{}' did not write {}",
                program,
                lab_path.display()
            )));
        }

        read_chords_lab(lab_path)
    }
}

impl ChordRecognizer for ExternalRecognizer {
    fn recognize(&self, wav: &Path) -> SplitResult<Vec<ChordSegment>> {
        let stem = wav
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stem".to_string());
        let mono_wav = wav.with_file_name(format!("{}_recognizer_tmp.wav", stem));
        let lab_path = wav.with_file_name(format!("{}_recognizer_tmp.lab", stem));

        // Temporaries go even when the downmix itself fails
        let result = prepare_mono(wav, &mono_wav).and_then(|()| self.run(&mono_wav, &lab_path));

        for tmp in [&mono_wav, &lab_path] {
            if tmp.exists() {
                if let Err(e) = std::fs::remove_file(tmp) {
                    warn!("Could not remove {}: {}", tmp.display(), e);
                }
            }
        }

        result
    }
}

/// Chroma template matcher over the `maj`/`min`/`7`/`maj7`/`min7` vocabulary
#[derive(Debug, Clone)]
pub struct TemplateRecognizer {
    pub n_fft: usize,
    pub hop_length: usize,
    pub min_freq_hz: f32,
    pub max_freq_hz: f32,
    pub silence_threshold: f32,
    pub no_chord_score: f32,
    pub switch_penalty: f32,
    pub min_segment_sec: f32,
    chords: Vec<Chord>,
    templates: Vec<[f32; N_CHROMA]>,
}

impl TemplateRecognizer {
    pub fn from_config(config: &ChordsConfig) -> Self {
        let chords = vocabulary();
        let templates = chords
            .iter()
            .map(|chord| {
                let mut template = [0.0f32; N_CHROMA];
                let pcs = chord.pitch_classes();
                let norm = 1.0 / (pcs.len() as f32).sqrt();
                for pc in pcs {
                    template[pc as usize] = norm;
                }
                template
            })
            .collect();

        Self {
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            min_freq_hz: config.min_freq_hz,
            max_freq_hz: config.max_freq_hz,
            silence_threshold: config.silence_threshold,
            no_chord_score: config.no_chord_score,
            switch_penalty: config.switch_penalty,
            min_segment_sec: config.min_segment_sec,
            chords,
            templates,
        }
    }

    /// Number of decoder states; the last one is "no chord"
    fn n_states(&self) -> usize {
        self.chords.len() + 1
    }

    fn state_label(&self, state: usize) -> String {
        self.chords
            .get(state)
            .map(Chord::to_string)
            .unwrap_or_else(|| NO_CHORD.to_string())
    }

    /// Per-frame scores, `scores[t][state]`
    fn frame_scores(&self, chroma: &Chromagram) -> Vec<Vec<f32>> {
        let no_chord = self.chords.len();
        (0..chroma.n_frames())
            .map(|t| {
                let mut scores = vec![0.0f32; self.n_states()];
                if chroma.energy[t] < self.silence_threshold {
                    scores[no_chord] = 1.0;
                    return scores;
                }

                let frame = chroma.chroma.column(t);
                let norm = frame.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for (state, template) in self.templates.iter().enumerate() {
                        let dot: f32 = frame.iter().zip(template).map(|(a, b)| a * b).sum();
                        scores[state] = dot / norm;
                    }
                }
                scores[no_chord] = self.no_chord_score;
                scores
            })
            .collect()
    }

    /// Best state path maximizing summed scores minus a penalty per change
    fn decode(&self, scores: &[Vec<f32>]) -> Vec<usize> {
        let n_frames = scores.len();
        if n_frames == 0 {
            return Vec::new();
        }
        let n_states = self.n_states();

        let mut delta = scores[0].clone();
        let mut backptr = vec![vec![0usize; n_states]; n_frames];

        for t in 1..n_frames {
            let (best_prev, best_value) = argmax(&delta);
            let switched = best_value - self.switch_penalty;
            let mut next = vec![0.0f32; n_states];
            for s in 0..n_states {
                if delta[s] >= switched {
                    next[s] = delta[s] + scores[t][s];
                    backptr[t][s] = s;
                } else {
                    next[s] = switched + scores[t][s];
                    backptr[t][s] = best_prev;
                }
            }
            delta = next;
        }

        let mut path = vec![0usize; n_frames];
        path[n_frames - 1] = argmax(&delta).0;
        for t in (1..n_frames).rev() {
            path[t - 1] = backptr[t][path[t]];
        }
        path
    }

    /// Recognize chords in a mono signal
    pub fn recognize_samples(&self, y: &[f32], sample_rate: u32) -> Vec<ChordSegment> {
        if y.is_empty() || sample_rate == 0 {
            return Vec::new();
        }

        let chroma = chromagram(
            y,
            sample_rate,
            self.n_fft,
            self.hop_length,
            self.min_freq_hz,
            self.max_freq_hz,
        );
        let scores = self.frame_scores(&chroma);
        let path = self.decode(&scores);
        let duration = y.len() as f32 / sample_rate as f32;

        let mut runs: Vec<(f32, f32, usize)> = Vec::new();
        for (t, &state) in path.iter().enumerate() {
            let start = if t == 0 { 0.0 } else { chroma.times[t] };
            match runs.last_mut() {
                Some(last) if last.2 == state => {}
                Some(last) => {
                    last.1 = start;
                    runs.push((start, duration, state));
                }
                None => runs.push((start, duration, state)),
            }
        }

        let runs = absorb_short_runs(runs, self.min_segment_sec);
        debug!(
            "Decoded {} frames into {} chord segments",
            path.len(),
            runs.len()
        );

        runs.into_iter()
            .map(|(start, end, state)| ChordSegment::new(start, end, self.state_label(state)))
            .collect()
    }
}

impl ChordRecognizer for TemplateRecognizer {
    fn recognize(&self, wav: &Path) -> SplitResult<Vec<ChordSegment>> {
        let audio = load_wav(wav)?;
        let mono = audio.to_mono();
        Ok(self.recognize_samples(&mono, audio.sample_rate))
    }
}

/// Fold runs shorter than `min_len` into their neighbour and re-merge equal neighbours
fn absorb_short_runs(runs: Vec<(f32, f32, usize)>, min_len: f32) -> Vec<(f32, f32, usize)> {
    let mut merged: Vec<(f32, f32, usize)> = Vec::with_capacity(runs.len());
    let mut pending_start: Option<f32> = None;
    let mut tail: Option<(f32, usize)> = None;

    for (start, end, state) in runs {
        tail = Some((end, state));
        let start = pending_start.take().unwrap_or(start);
        let too_short = end - start < min_len;

        if let Some(last) = merged.last_mut() {
            if too_short || last.2 == state {
                last.1 = end;
                continue;
            }
        } else if too_short {
            // First run: hand its span to the successor
            pending_start = Some(start);
            continue;
        }
        merged.push((start, end, state));
    }

    if let (Some(start), Some((end, state))) = (pending_start, tail) {
        // Only reachable when nothing was kept; the whole span becomes one run
        merged.push((start, end, state));
    }
    merged
}

fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
}

/// Path of the `.lab` file for a stem directory
pub fn lab_path_for(stems_dir: &Path, config: &ChordsConfig) -> PathBuf {
    stems_dir.join(&config.lab_filename)
}
