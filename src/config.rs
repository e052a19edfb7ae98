//! Configuration system for the audiosplit pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub paths: PathsConfig,
    pub input: InputConfig,
    pub separation: SeparationConfig,
    pub filters: FilterConfig,
    pub chords: ChordsConfig,
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: PathsConfig::default(),
            input: InputConfig::default(),
            separation: SeparationConfig::default(),
            filters: FilterConfig::default(),
            chords: ChordsConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

/// Default directories used by batch mode and workspace cleanup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub audio_dir: PathBuf,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("audio"),
            output_dir: PathBuf::from("outputs"),
            work_dir: PathBuf::from(".audiosplit_workdir"),
        }
    }
}

/// Accepted input files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub extensions: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extensions: vec![".wav".to_string(), ".mp3".to_string()],
        }
    }
}

/// External source separation (Demucs) invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub command: String,
    pub model: String,
    pub extra_args: Vec<String>,
    pub stems: Vec<String>,
    /// Reuse stems already present under the output root instead of re-running the separator
    pub skip_existing: bool,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            command: "demucs".to_string(),
            model: "htdemucs".to_string(),
            extra_args: Vec::new(),
            stems: vec![
                "drums".to_string(),
                "bass".to_string(),
                "other".to_string(),
                "vocals".to_string(),
            ],
            skip_existing: true,
        }
    }
}

/// Low/high band split of the "other" stem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub enabled: bool,
    pub stem: String,
    pub low_center_hz: f32,
    pub high_cutoff_hz: f32,
    pub q: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            stem: "other".to_string(),
            low_center_hz: 400.0,
            high_cutoff_hz: 700.0,
            q: 0.707,
        }
    }
}

/// Which chord recognizer to run on the harmonic stem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerBackend {
    /// Chroma template matching with Viterbi smoothing
    Builtin,
    /// Pretrained recognizer invoked as a subprocess
    External,
}

/// Chord recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordsConfig {
    pub enabled: bool,
    pub stem: String,
    pub backend: RecognizerBackend,
    /// Argument vector for the external backend; `{input}` and `{output}` are substituted
    pub external_command: Vec<String>,
    pub n_fft: usize,
    pub hop_length: usize,
    pub min_freq_hz: f32,
    pub max_freq_hz: f32,
    pub silence_threshold: f32,
    pub no_chord_score: f32,
    pub switch_penalty: f32,
    pub min_segment_sec: f32,
    pub lab_filename: String,
    pub base_octave: i8,
}

impl Default for ChordsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stem: "other".to_string(),
            backend: RecognizerBackend::Builtin,
            external_command: vec![
                "DCChordRecognition".to_string(),
                "single".to_string(),
                "{input}".to_string(),
                "-o".to_string(),
                "{output}".to_string(),
            ],
            n_fft: 4096,
            hop_length: 2048,
            min_freq_hz: 60.0,
            max_freq_hz: 2100.0,
            silence_threshold: 1e-4,
            no_chord_score: 0.5,
            switch_penalty: 1.5,
            min_segment_sec: 0.25,
            lab_filename: "chords.lab".to_string(),
            base_octave: 3,
        }
    }
}

/// Output artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub write_midi: bool,
    pub midi_filename: String,
    pub ticks_per_beat: u16,
    pub tempo_bpm: f32,
    pub velocity: u8,
    pub channel: u8,
    pub zip_stems: bool,
    pub write_plot: bool,
    pub plot_filename: String,
    pub plot_max_points: usize,
    pub write_report: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            write_midi: true,
            midi_filename: "chords.mid".to_string(),
            ticks_per_beat: 480,
            tempo_bpm: 120.0,
            velocity: 80,
            channel: 0,
            zip_stems: false,
            write_plot: false,
            plot_filename: "chords.png".to_string(),
            plot_max_points: 200_000,
            write_report: true,
        }
    }
}

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let stems = &config.separation.stems;
    if stems.is_empty() {
        anyhow::bail!("separation.stems must not be empty");
    }
    if config.chords.enabled && !stems.contains(&config.chords.stem) {
        anyhow::bail!(
            "chords.stem '{}' is not one of separation.stems {:?}",
            config.chords.stem,
            stems
        );
    }
    if config.filters.enabled && !stems.contains(&config.filters.stem) {
        anyhow::bail!(
            "filters.stem '{}' is not one of separation.stems {:?}",
            config.filters.stem,
            stems
        );
    }
    if config.separation.command.trim().is_empty() {
        anyhow::bail!("separation.command must not be empty");
    }

    if let Some(ext) = config.input.extensions.iter().find(|e| !e.starts_with('.')) {
        anyhow::bail!("input extension '{}' must start with '.'", ext);
    }

    let filters = &config.filters;
    if filters.low_center_hz <= 0.0 || filters.high_cutoff_hz <= 0.0 || filters.q <= 0.0 {
        anyhow::bail!("filter frequencies and q must be positive");
    }

    let chords = &config.chords;
    if chords.hop_length == 0 {
        anyhow::bail!("chords.hop_length must be > 0");
    }
    if chords.n_fft < chords.hop_length {
        anyhow::bail!("chords.n_fft must be >= chords.hop_length");
    }
    if chords.min_freq_hz >= chords.max_freq_hz {
        anyhow::bail!("chords.min_freq_hz must be < chords.max_freq_hz");
    }
    if chords.backend == RecognizerBackend::External && chords.external_command.is_empty() {
        anyhow::bail!("chords.external_command is required for the external backend");
    }
    if !(0..=8).contains(&chords.base_octave) {
        anyhow::bail!("chords.base_octave must be within 0..=8");
    }
    if chords.lab_filename.trim().is_empty() {
        anyhow::bail!("chords.lab_filename must not be empty");
    }

    let export = &config.export;
    if export.ticks_per_beat == 0 || export.ticks_per_beat > 0x7FFF {
        anyhow::bail!("export.ticks_per_beat must be within 1..=32767");
    }
    if !(export.tempo_bpm.is_finite() && export.tempo_bpm >= crate::midi::MIN_TEMPO_BPM) {
        anyhow::bail!(
            "export.tempo_bpm must be >= {:.3} to fit a MIDI tempo event",
            crate::midi::MIN_TEMPO_BPM
        );
    }
    if !(1..=127).contains(&export.velocity) {
        anyhow::bail!("export.velocity must be within 1..=127");
    }
    if export.channel > 15 {
        anyhow::bail!("export.channel must be within 0..=15");
    }
    if export.plot_max_points == 0 {
        anyhow::bail!("export.plot_max_points must be > 0");
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
