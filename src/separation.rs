//! Stem separation through an external model, plus stem and workspace file helpers

use crate::config::SeparationConfig;
use crate::error::{Result as SplitResult, SplitError};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Find audio files directly inside `directory` whose extension is listed
///
/// Extensions are given with a leading dot and compared case-insensitively.
pub fn find_audio_files<P: AsRef<Path>>(
    directory: P,
    extensions: &[String],
) -> SplitResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && validate_extension(path, extensions))
        .collect();
    files.sort();
    Ok(files)
}

/// Check whether a file extension is in `supported` (e.g. `[".wav", ".mp3"]`)
pub fn validate_extension<P: AsRef<Path>>(file_path: P, supported: &[String]) -> bool {
    match file_path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let suffix = format!(".{}", ext.to_lowercase());
            supported.iter().any(|s| s.to_lowercase() == suffix)
        }
        None => false,
    }
}

/// Track name used by the separator for its output folder
pub fn track_name<P: AsRef<Path>>(file_path: P) -> String {
    file_path
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Run the separator on a single audio file
///
/// Invokes `<command> --out <output_dir> -n <model> <extra_args..> <file>`.
pub fn run_demucs(
    file_path: &Path,
    output_dir: &Path,
    config: &SeparationConfig,
) -> SplitResult<()> {
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("Separating: {}", name);

    fs::create_dir_all(output_dir)?;

    let mut command = Command::new(&config.command);
    command
        .arg("--out")
        .arg(output_dir)
        .arg("-n")
        .arg(&config.model)
        .args(&config.extra_args)
        .arg(file_path);
    debug!("Spawning separator: {:?}", command);

    let status = command.status().map_err(|e| {
        SplitError::SeparationFailed(format!(
            "failed to start '{}' for {}: {}",
            config.command, name, e
        ))
    })?;

    if !status.success() {
        return Err(SplitError::SeparationFailed(format!(
            "'{}' exited with {} while processing {}",
            config.command, status, name
        )));
    }

    Ok(())
}

/// `<root>/<model>/<track>` when it holds every stem
pub fn model_stems_dir<P: AsRef<Path>>(
    output_root: P,
    model: &str,
    track_name: &str,
    stems: &[String],
) -> Option<PathBuf> {
    let dir = output_root.as_ref().join(model).join(track_name);
    stems
        .iter()
        .all(|stem| dir.join(format!("{}.wav", stem)).is_file())
        .then_some(dir)
}

/// Stems written by `model` for a track, falling back to [`find_stems_dir`]
pub fn locate_stems<P: AsRef<Path>>(
    output_root: P,
    model: &str,
    track_name: &str,
    stems: &[String],
) -> Option<PathBuf> {
    let output_root = output_root.as_ref();
    model_stems_dir(output_root, model, track_name, stems)
        .or_else(|| find_stems_dir(output_root, track_name, stems))
}

/// Locate the directory that holds `<stem>.wav` for every stem of a track
///
/// Works with nested layouts such as `<root>/<model>/<track>/<stem>.wav`.
/// Every directory under the root is scored by how many stems it holds, with
/// shallower paths winning ties. Directories named after the track get a bonus
/// that outweighs depth but never a missing stem.
pub fn find_stems_dir<P: AsRef<Path>>(
    output_root: P,
    track_name: &str,
    stems: &[String],
) -> Option<PathBuf> {
    let output_root = output_root.as_ref();
    if !output_root.is_dir() {
        return None;
    }

    let mut candidates = Vec::new();
    collect_dirs(output_root, &mut candidates);
    candidates.sort();

    let present = |dir: &Path| {
        stems
            .iter()
            .filter(|stem| dir.join(format!("{}.wav", stem)).exists())
            .count()
    };
    let score = |dir: &Path| {
        let bonus = if dir.file_name().is_some_and(|n| n == track_name) {
            50
        } else {
            0
        };
        present(dir) as i64 * 100 + bonus - dir.components().count() as i64
    };

    let mut best: Option<&PathBuf> = None;
    let mut best_score = i64::MIN;
    for dir in &candidates {
        let s = score(dir.as_path());
        if s > best_score {
            best_score = s;
            best = Some(dir);
        }
    }

    best.filter(|dir| present(dir.as_path()) == stems.len())
        .cloned()
}

fn collect_dirs(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.push(path.clone());
            collect_dirs(&path, out);
        }
    }
}

/// Existing stem files in a directory, keyed by stem name
pub fn list_stems_wav<P: AsRef<Path>>(stems_dir: P, stems: &[String]) -> BTreeMap<String, PathBuf> {
    let stems_dir = stems_dir.as_ref();
    stems
        .iter()
        .filter_map(|stem| {
            let path = stems_dir.join(format!("{}.wav", stem));
            path.exists().then(|| (stem.clone(), path))
        })
        .collect()
}

/// Read every stem into memory
pub fn read_stems<P: AsRef<Path>>(
    stems_dir: P,
    stems: &[String],
) -> SplitResult<BTreeMap<String, Vec<u8>>> {
    let stems_dir = stems_dir.as_ref();
    stems
        .iter()
        .map(|stem| -> SplitResult<(String, Vec<u8>)> {
            let path = stems_dir.join(format!("{}.wav", stem));
            Ok((stem.clone(), fs::read(&path)?))
        })
        .collect()
}

/// Build an in-memory ZIP archive with one `<stem>.wav` entry per stem
pub fn zip_stems<P: AsRef<Path>>(stems_dir: P, stems: &[String]) -> SplitResult<Vec<u8>> {
    let stems_dir = stems_dir.as_ref();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for stem in stems {
        let file_name = format!("{}.wav", stem);
        let data = fs::read(stems_dir.join(&file_name))?;
        zip.start_file(file_name, options)?;
        zip.write_all(&data)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Best-effort removal of everything inside `work_dir`
///
/// The directory itself is kept. Locked files and similar failures are ignored.
pub fn clear_workspace<P: AsRef<Path>>(work_dir: P) {
    let work_dir = work_dir.as_ref();
    if !work_dir.exists() {
        return;
    }

    let mut entries = Vec::new();
    collect_entries(work_dir, &mut entries);
    // Deepest paths first so directories are empty when removed
    entries.sort_by(|a, b| b.cmp(a));
    for path in entries {
        let _ = if path.is_dir() {
            fs::remove_dir(&path)
        } else {
            fs::remove_file(&path)
        };
    }
}

fn collect_entries(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_entries(&path, out);
        }
        out.push(path);
    }
}

/// Keep only alphanumerics, `-`, `_`, `.` and spaces, then trim
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Write bytes to `dest_path`, creating parent directories
pub fn save_bytes_to_file<P: AsRef<Path>>(data: &[u8], dest_path: P) -> SplitResult<PathBuf> {
    let dest_path = dest_path.as_ref();
    if let Some(parent) = dest_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(dest_path, data)?;
    Ok(dest_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stems() -> Vec<String> {
        ["drums", "bass", "other", "vocals"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_validate_extension_is_case_insensitive() {
        let exts = vec![".wav".to_string(), ".mp3".to_string()];
        assert!(validate_extension("song.WAV", &exts));
        assert!(validate_extension("dir/song.mp3", &exts));
        assert!(!validate_extension("song.flac", &exts));
        assert!(!validate_extension("song", &exts));
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("  my/song?.mp3 "), "mysong.mp3");
        assert_eq!(safe_filename("Café - live_01.wav"), "Café - live_01.wav");
        assert_eq!(safe_filename("***"), "");
    }

    #[test]
    fn test_track_name() {
        assert_eq!(track_name("audio/looking_for_love.mp3"), "looking_for_love");
    }

    #[test]
    fn test_find_stems_dir_prefers_complete_track_dir() {
        let root = tempfile::tempdir().unwrap();
        let track_dir = root.path().join("htdemucs").join("song");
        let partial = root.path().join("partial");
        fs::create_dir_all(&track_dir).unwrap();
        fs::create_dir_all(&partial).unwrap();
        for stem in stems() {
            fs::write(track_dir.join(format!("{}.wav", stem)), b"x").unwrap();
        }
        fs::write(partial.join("drums.wav"), b"x").unwrap();

        let found = find_stems_dir(root.path(), "song", &stems()).unwrap();
        assert_eq!(found, track_dir);
    }

    #[test]
    fn test_find_stems_dir_requires_every_stem() {
        let root = tempfile::tempdir().unwrap();
        let track_dir = root.path().join("htdemucs").join("song");
        fs::create_dir_all(&track_dir).unwrap();
        fs::write(track_dir.join("drums.wav"), b"x").unwrap();

        assert!(find_stems_dir(root.path(), "song", &stems()).is_none());
        assert!(find_stems_dir(root.path().join("missing"), "song", &stems()).is_none());
    }

    #[test]
    fn test_locate_stems_prefers_model_dir() {
        let root = tempfile::tempdir().unwrap();
        let stale = root.path().join("htdemucs").join("song");
        let fresh = root.path().join("mdx_extra").join("song");
        for dir in [&stale, &fresh] {
            fs::create_dir_all(dir).unwrap();
            for stem in stems() {
                fs::write(dir.join(format!("{}.wav", stem)), b"x").unwrap();
            }
        }

        assert_eq!(
            model_stems_dir(root.path(), "mdx_extra", "song", &stems()),
            Some(fresh.clone())
        );
        assert_eq!(
            locate_stems(root.path(), "mdx_extra", "song", &stems()),
            Some(fresh)
        );
        assert!(model_stems_dir(root.path(), "mdx_q", "song", &stems()).is_none());
        // Unknown model directories fall back to the scored search
        assert!(locate_stems(root.path(), "mdx_q", "song", &stems()).is_some());
    }

    #[test]
    fn test_clear_workspace_keeps_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("uploads").join("deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("a.wav"), b"x").unwrap();
        fs::write(root.path().join("b.txt"), b"y").unwrap();

        clear_workspace(root.path());
        assert!(root.path().exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);

        // Missing directories are ignored
        clear_workspace(root.path().join("nope"));
    }
}
