//! Stem separation and chord detection pipeline
//!
//! Splits mixed tracks into stems with an external separation model, detects
//! the chord progression of the harmonic stem and maps every chord to piano
//! notes. Results are written next to the stems as `.lab`, MIDI and JSON files.

pub mod audio;
pub mod chord_library;
pub mod chroma;
pub mod config;
pub mod error;
pub mod filters;
pub mod lab;
pub mod midi;
pub mod qa;
pub mod recognition;
pub mod separation;
pub mod spectral;

pub use config::Config;
pub use error::{Result as SplitResult, SplitError};
pub use lab::ChordSegment;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Everything produced for one input track
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackReport {
    pub version: String,
    pub track: String,
    pub input: PathBuf,
    pub stems_dir: PathBuf,
    pub stems: BTreeMap<String, PathBuf>,
    pub reused_existing_stems: bool,
    pub lowband: Option<PathBuf>,
    pub highband: Option<PathBuf>,
    pub chords_lab: Option<PathBuf>,
    pub chords_midi: Option<PathBuf>,
    pub chords_plot: Option<PathBuf>,
    pub stems_zip: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub chord_segments: usize,
    pub distinct_chords: Vec<String>,
}

/// A track that could not be processed during a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub input: PathBuf,
    pub error: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: Vec<TrackReport>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty() && self.failed.is_empty()
    }
}

/// Main processing pipeline
pub struct AudioSplit {
    config: Config,
}

impl AudioSplit {
    /// Create a new processor with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Separate one track, then run the enabled post-processing steps
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_root: Q,
    ) -> SplitResult<TrackReport> {
        let input_path = input_path.as_ref();
        let output_root = output_root.as_ref();
        validate_input(input_path, &self.config)?;

        let track = separation::track_name(input_path);
        let separation_config = &self.config.separation;
        let stems = &separation_config.stems;

        // Only stems this model wrote for this track count as a previous run
        let existing = if separation_config.skip_existing {
            separation::model_stems_dir(output_root, &separation_config.model, &track, stems)
        } else {
            None
        };
        let reused = existing.is_some();
        let stems_dir = match existing {
            Some(dir) => {
                info!("Reusing stems for {} in {}", track, dir.display());
                dir
            }
            None => {
                separation::run_demucs(input_path, output_root, separation_config)?;
                let model = &separation_config.model;
                separation::locate_stems(output_root, model, &track, stems).ok_or_else(|| {
                    SplitError::StemsNotFound(format!(
                        "no directory under {} holds all of {:?} for '{}'",
                        output_root.display(),
                        stems,
                        track
                    ))
                })?
            }
        };

        let mut report = TrackReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            track: track.clone(),
            input: input_path.to_path_buf(),
            stems: separation::list_stems_wav(&stems_dir, stems),
            stems_dir: stems_dir.clone(),
            reused_existing_stems: reused,
            ..TrackReport::default()
        };

        if self.config.filters.enabled {
            self.run_filters(&stems_dir, &mut report);
        }

        if self.config.chords.enabled {
            self.run_chords(&stems_dir, &mut report)?;
        }

        if self.config.export.zip_stems {
            let bytes = separation::zip_stems(&stems_dir, stems)?;
            let zip_name = format!("{}_stems.zip", separation::safe_filename(&track));
            let zip_path = separation::save_bytes_to_file(&bytes, output_root.join(zip_name))?;
            info!("Saved stems archive to {}", zip_path.display());
            report.stems_zip = Some(zip_path);
        }

        if self.config.export.write_report {
            let report_path = stems_dir.join("report.json");
            report.report = Some(report_path.clone());
            qa::write_json_report(&report, &report_path)?;
        }

        Ok(report)
    }

    /// Band split of the configured stem; failures are logged, not fatal
    fn run_filters(&self, stems_dir: &Path, report: &mut TrackReport) {
        let filters = &self.config.filters;
        let stem_path = stems_dir.join(format!("{}.wav", filters.stem));
        match filters::apply_simple_filters(
            &stem_path,
            filters.low_center_hz,
            filters.high_cutoff_hz,
            filters.q,
        ) {
            Ok(out) => {
                report.lowband = Some(out.lowband);
                report.highband = Some(out.highband);
            }
            Err(e) => warn!("Skipping band split of {}: {}", stem_path.display(), e),
        }
    }

    fn run_chords(&self, stems_dir: &Path, report: &mut TrackReport) -> SplitResult<()> {
        let chords = &self.config.chords;
        let export = &self.config.export;
        let stem_path = stems_dir.join(format!("{}.wav", chords.stem));
        let lab_path = recognition::lab_path_for(stems_dir, chords);

        let segments = self.predict_chords(&stem_path, &lab_path)?;
        report.chords_lab = Some(lab_path);
        report.chord_segments = segments.len();
        let mut distinct: Vec<String> = segments.iter().map(|s| s.label.clone()).collect();
        distinct.sort();
        distinct.dedup();
        report.distinct_chords = distinct;

        if export.write_midi {
            let midi_path = stems_dir.join(&export.midi_filename);
            if midi::export_chords_midi(&segments, &midi_path, chords, export)? {
                report.chords_midi = Some(midi_path);
            }
        }

        if export.write_plot {
            let plot_path = stems_dir.join(&export.plot_filename);
            match qa::write_chords_plot(&stem_path, &segments, &plot_path, export.plot_max_points) {
                Ok(()) => report.chords_plot = Some(plot_path),
                Err(e) => warn!("Could not render chord plot: {}", e),
            }
        }

        Ok(())
    }

    /// Detect chords in a stem and write them to `output_lab`
    pub fn predict_chords<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_wav: P,
        output_lab: Q,
    ) -> SplitResult<Vec<ChordSegment>> {
        recognition::predict_chords_for_stem(
            input_wav.as_ref(),
            output_lab.as_ref(),
            &self.config.chords,
        )
    }

    /// Process every supported file in `audio_dir`, continuing past failures
    pub fn process_batch<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        audio_dir: P,
        output_root: Q,
    ) -> SplitResult<BatchReport> {
        let audio_dir = audio_dir.as_ref();
        let output_root = output_root.as_ref();
        std::fs::create_dir_all(audio_dir)?;
        std::fs::create_dir_all(output_root)?;

        let files = separation::find_audio_files(audio_dir, &self.config.input.extensions)?;
        let mut batch = BatchReport::default();

        if files.is_empty() {
            warn!(
                "No {} files found in '{}'",
                self.config.input.extensions.join("/"),
                audio_dir.display()
            );
            return Ok(batch);
        }

        for file in files {
            match self.process(&file, output_root) {
                Ok(report) => batch.processed.push(report),
                Err(e) => {
                    error!("Failed to process {}: {}", file.display(), e);
                    batch.failed.push(BatchFailure {
                        input: file,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "All files processed: {} succeeded, {} failed",
            batch.processed.len(),
            batch.failed.len()
        );
        Ok(batch)
    }
}

/// Validate configuration and input file
pub fn validate_input<P: AsRef<Path>>(input_path: P, config: &Config) -> SplitResult<()> {
    audio::validate_audio_file(input_path, &config.input.extensions)?;
    config::validate_config(config)?;
    Ok(())
}
