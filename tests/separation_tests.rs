//! Separator invocation and stem file handling

use audiosplit::config::SeparationConfig;
use audiosplit::separation::{
    find_audio_files, find_stems_dir, list_stems_wav, read_stems, run_demucs, save_bytes_to_file,
    zip_stems,
};
use audiosplit::SplitError;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

fn stems() -> Vec<String> {
    SeparationConfig::default().stems
}

fn make_stems(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    for stem in stems() {
        fs::write(dir.join(format!("{}.wav", stem)), stem.as_bytes()).unwrap();
    }
}

fn separator(command: &str) -> SeparationConfig {
    SeparationConfig {
        command: command.to_string(),
        ..SeparationConfig::default()
    }
}

/// Executable shell script standing in for the separator
#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_audio_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.WAV", "notes.txt", "c.flac"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let exts = vec![".wav".to_string(), ".mp3".to_string()];
        let files = find_audio_files(dir.path(), &exts).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.WAV", "b.mp3"]);
    }

    #[test]
    fn test_find_audio_files_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_audio_files(dir.path().join("nope"), &[".wav".to_string()]).is_err());
    }

    #[test]
    fn test_nested_model_layout_is_found() {
        let root = tempfile::tempdir().unwrap();
        let deep = root.path().join("htdemucs").join("separated").join("song");
        make_stems(&deep);
        make_stems(&root.path().join("htdemucs").join("other_song"));

        assert_eq!(find_stems_dir(root.path(), "song", &stems()), Some(deep));
    }

    #[test]
    fn test_run_demucs_failures() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.wav");
        fs::write(&input, b"x").unwrap();
        let out = dir.path().join("out");

        let err = run_demucs(&input, &out, &separator("false")).unwrap_err();
        assert!(matches!(err, SplitError::SeparationFailed(_)));

        let err = run_demucs(&input, &out, &separator("no-such-separator-binary")).unwrap_err();
        assert!(matches!(err, SplitError::SeparationFailed(_)));
        assert!(err.to_string().starts_with("E004"));

        // A successful run creates the output root
        run_demucs(&input, &out, &separator("true")).unwrap();
        assert!(out.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_demucs_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.wav");
        fs::write(&input, b"x").unwrap();
        let out = dir.path().join("out");
        let args_file = dir.path().join("args.txt");
        let script = dir.path().join("separate.sh");
        write_script(
            &script,
            &format!("printf '%s\\n' \"$@\" > '{}'", args_file.display()),
        );

        let config = SeparationConfig {
            command: script.to_string_lossy().into_owned(),
            model: "mdx_extra".to_string(),
            extra_args: vec!["--two-stems".to_string(), "vocals".to_string()],
            ..SeparationConfig::default()
        };
        run_demucs(&input, &out, &config).unwrap();

        let recorded = fs::read_to_string(&args_file).unwrap();
        let args: Vec<&str> = recorded.lines().collect();
        let (out, input) = (out.to_string_lossy(), input.to_string_lossy());
        let expected = [
            "--out",
            &*out,
            "-n",
            "mdx_extra",
            "--two-stems",
            "vocals",
            &*input,
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn test_list_and_read_stems() {
        let dir = tempfile::tempdir().unwrap();
        make_stems(dir.path());
        fs::remove_file(dir.path().join("vocals.wav")).unwrap();

        let listed = list_stems_wav(dir.path(), &stems());
        assert_eq!(listed.len(), 3);
        assert!(!listed.contains_key("vocals"));

        // Reading requires every stem
        assert!(read_stems(dir.path(), &stems()).is_err());
        let three: Vec<String> = listed.keys().cloned().collect();
        let bytes = read_stems(dir.path(), &three).unwrap();
        assert_eq!(bytes["bass"], b"bass");
    }

    #[test]
    fn test_zip_holds_one_entry_per_stem() {
        let dir = tempfile::tempdir().unwrap();
        make_stems(dir.path());

        let bytes = zip_stems(dir.path(), &stems()).unwrap();
        let zip_path = save_bytes_to_file(&bytes, dir.path().join("zips").join("song_stems.zip"))
            .unwrap();
        assert!(zip_path.exists());

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 4);
        let mut content = String::new();
        archive
            .by_name("drums.wav")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "drums");
    }
}
