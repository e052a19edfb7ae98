//! End-to-end runs of the split pipeline with pre-separated stems

use audiosplit::audio::{load_wav, write_wav_f32};
use audiosplit::lab::read_chords_lab;
use audiosplit::{AudioSplit, Config, SplitError};
use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

const SR: u32 = 22050;

fn chord_tone(freqs: &[f32], seconds: f32) -> Vec<f32> {
    let n = (seconds * SR as f32) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / SR as f32;
            freqs.iter().map(|f| (2.0 * PI * f * t).sin() * 0.2).sum()
        })
        .collect()
}

/// Input track plus `<out>/htdemucs/<track>/<stem>.wav`, as a previous run would leave them
fn seed_track(audio_dir: &Path, out: &Path, track: &str) -> PathBuf {
    let input = audio_dir.join(format!("{}.wav", track));
    let mix = chord_tone(&[261.63, 329.63, 392.00], 2.0);
    write_wav_f32(&input, &mix, 1, SR).unwrap();

    let stems_dir = out.join("htdemucs").join(track);
    for stem in ["drums", "bass", "vocals"] {
        write_wav_f32(stems_dir.join(format!("{}.wav", stem)), &[0.0; 4410], 1, SR).unwrap();
    }
    let other: Vec<f32> = mix.iter().flat_map(|&v| [v, v]).collect();
    write_wav_f32(stems_dir.join("other.wav"), &other, 2, SR).unwrap();
    stems_dir
}

/// Config that fails loudly if the separator is ever started
fn offline_config() -> Config {
    let mut config = Config::default();
    config.separation.command = "no-such-separator-binary".to_string();
    config
}

/// Separator stand-in that copies the input to every stem under `<out>/<model>/<track>`
#[cfg(unix)]
fn fake_separator(dir: &Path) -> String {
    use std::os::unix::fs::PermissionsExt;
    let script = dir.join("separate.sh");
    let body = r#"#!/bin/sh
out="$2"
model="$4"
for input; do :; done
name=$(basename "$input")
name="${name%.*}"
mkdir -p "$out/$model/$name"
for stem in drums bass other vocals; do
    cp "$input" "$out/$model/$name/$stem.wav"
done
"#;
    fs::write(&script, body).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_reuses_stems_and_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let stems_dir = seed_track(dir.path(), &out, "song");

        let processor = AudioSplit::new(offline_config());
        let report = processor.process(dir.path().join("song.wav"), &out).unwrap();

        assert!(report.reused_existing_stems);
        assert_eq!(report.track, "song");
        assert_eq!(report.stems_dir, stems_dir);
        assert_eq!(report.stems.len(), 4);
        assert_eq!(report.distinct_chords, vec!["C:maj".to_string()]);

        let lab = report.chords_lab.clone().unwrap();
        assert_eq!(lab, stems_dir.join("chords.lab"));
        let segments = read_chords_lab(&lab).unwrap();
        assert_eq!(segments.len(), report.chord_segments);
        assert_eq!(segments[0].label, "C:maj");

        let midi = fs::read(report.chords_midi.clone().unwrap()).unwrap();
        assert_eq!(&midi[..4], b"MThd");

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(stems_dir.join("report.json")).unwrap())
                .unwrap();
        assert_eq!(json["track"], "song");
        assert_eq!(json["reused_existing_stems"], true);

        // Optional outputs stay off by default
        assert!(report.stems_zip.is_none());
        assert!(report.lowband.is_none());
        assert!(report.chords_plot.is_none());
    }

    #[test]
    fn test_process_optional_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let stems_dir = seed_track(dir.path(), &out, "My Song");

        let mut config = offline_config();
        config.filters.enabled = true;
        config.export.zip_stems = true;
        config.export.write_plot = true;
        config.export.write_midi = false;

        let report = AudioSplit::new(config)
            .process(dir.path().join("My Song.wav"), &out)
            .unwrap();

        assert_eq!(report.stems_zip, Some(out.join("My Song_stems.zip")));
        assert!(out.join("My Song_stems.zip").exists());
        assert!(report.chords_midi.is_none());
        assert!(!stems_dir.join("chords.mid").exists());

        let lowband = load_wav(report.lowband.unwrap()).unwrap();
        assert_eq!(lowband.channels, 2);
        assert_eq!(lowband.sample_rate, SR);
        assert!(stems_dir.join("other_highband.wav").exists());

        // Rendering text needs system fonts; a failed plot is only a warning
        if let Some(plot) = report.chords_plot {
            assert_eq!(plot, stems_dir.join("chords.png"));
            assert_eq!(&fs::read(plot).unwrap()[1..4], b"PNG");
        }
        assert_eq!(report.chords_lab, Some(stems_dir.join("chords.lab")));
    }

    #[test]
    fn test_process_without_chords() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let stems_dir = seed_track(dir.path(), &out, "song");

        let mut config = offline_config();
        config.chords.enabled = false;
        let report = AudioSplit::new(config)
            .process(dir.path().join("song.wav"), &out)
            .unwrap();

        assert!(report.chords_lab.is_none());
        assert!(!stems_dir.join("chords.lab").exists());
        assert!(stems_dir.join("report.json").exists());
    }

    #[test]
    fn test_stems_of_another_track_are_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        seed_track(dir.path(), &out, "first");
        write_wav_f32(dir.path().join("second.wav"), &[0.0; 100], 1, SR).unwrap();

        let err = AudioSplit::new(offline_config())
            .process(dir.path().join("second.wav"), &out)
            .unwrap_err();
        assert!(matches!(err, SplitError::SeparationFailed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_fresh_run_uses_configured_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        // Stale stems from an earlier htdemucs run
        let stale = seed_track(dir.path(), &out, "song");

        let mut config = Config::default();
        config.separation.command = fake_separator(dir.path());
        config.separation.model = "mdx_extra".to_string();
        config.separation.skip_existing = false;
        let report = AudioSplit::new(config)
            .process(dir.path().join("song.wav"), &out)
            .unwrap();

        assert!(!report.reused_existing_stems);
        assert_eq!(report.stems_dir, out.join("mdx_extra").join("song"));
        assert_eq!(report.chords_lab, Some(report.stems_dir.join("chords.lab")));
        assert!(!stale.join("chords.lab").exists());
    }

    #[test]
    fn test_stems_of_another_model_are_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        seed_track(dir.path(), &out, "song");

        let mut config = offline_config();
        config.separation.model = "mdx_extra".to_string();
        let err = AudioSplit::new(config)
            .process(dir.path().join("song.wav"), &out)
            .unwrap_err();
        assert!(matches!(err, SplitError::SeparationFailed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_separator_that_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.wav");
        write_wav_f32(&input, &[0.0; 100], 1, SR).unwrap();

        let mut config = Config::default();
        config.separation.command = "true".to_string();
        let err = AudioSplit::new(config)
            .process(&input, dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, SplitError::StemsNotFound(_)));
    }

    #[test]
    fn test_invalid_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let processor = AudioSplit::new(offline_config());

        let err = processor
            .process(dir.path().join("missing.wav"), dir.path())
            .unwrap_err();
        assert!(matches!(err, SplitError::InputValidationError(_)));

        let flac = dir.path().join("song.flac");
        fs::write(&flac, b"x").unwrap();
        let err = processor.process(&flac, dir.path()).unwrap_err();
        assert!(matches!(err, SplitError::InputValidationError(_)));

        let mut config = offline_config();
        config.chords.stem = "piano".to_string();
        let wav = dir.path().join("song.wav");
        fs::write(&wav, b"x").unwrap();
        let err = AudioSplit::new(config).process(&wav, dir.path()).unwrap_err();
        assert!(matches!(err, SplitError::InvalidConfigParameter(_)));
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let audio_dir = dir.path().join("audio");
        let out = dir.path().join("out");
        seed_track(&audio_dir, &out, "good");
        write_wav_f32(audio_dir.join("bad.wav"), &[0.0; 100], 1, SR).unwrap();
        fs::write(audio_dir.join("cover.jpg"), b"x").unwrap();

        let report = AudioSplit::new(offline_config())
            .process_batch(&audio_dir, &out)
            .unwrap();

        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.processed[0].track, "good");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].input, audio_dir.join("bad.wav"));
        assert!(report.failed[0].error.starts_with("E004"));
    }

    #[test]
    fn test_batch_on_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let audio_dir = dir.path().join("audio");
        let out = dir.path().join("out");

        let report = AudioSplit::new(offline_config())
            .process_batch(&audio_dir, &out)
            .unwrap();
        assert!(report.is_empty());
        // Both directories are created on first use
        assert!(audio_dir.is_dir());
        assert!(out.is_dir());
    }
}
