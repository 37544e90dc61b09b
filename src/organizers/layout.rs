use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates `<root>/<slug>/` and checks that it is writable.
pub fn prepare_target_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    verify_writable(dir)
}

fn verify_writable(path: &Path) -> io::Result<()> {
    let probe = tempfile::Builder::new()
        .prefix(".write-test-")
        .tempfile_in(path)?;
    probe.close()
}

/// Scratch space for one pipeline run, unique even when runs share a
/// target directory.
pub fn create_scratch(target_dir: &Path) -> io::Result<TempDir> {
    tempfile::Builder::new()
        .prefix(".scratch-")
        .tempdir_in(target_dir)
}

/// Removes the scratch dir, or keeps it and returns where it is.
pub fn finish_scratch(scratch: TempDir, keep: bool) -> Option<PathBuf> {
    if keep {
        let path = scratch.keep();
        tracing::info!("Keeping scratch files in {:?}", path);
        return Some(path);
    }
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        tracing::warn!("Failed to remove scratch dir {:?}: {}", path, e);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dirs_are_unique_and_removed() {
        let root = tempfile::tempdir().unwrap();
        let target_dir = root.path().join("example");
        prepare_target_dir(&target_dir).unwrap();

        let first = create_scratch(&target_dir).unwrap();
        let second = create_scratch(&target_dir).unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(&target_dir));

        let first_path = first.path().to_path_buf();
        assert!(finish_scratch(first, false).is_none());
        assert!(!first_path.exists());

        let kept = finish_scratch(second, true).unwrap();
        assert!(kept.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_parent_fails() {
        // A regular file where the directory should be.
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocked");
        fs::write(&blocker, b"x").unwrap();
        assert!(prepare_target_dir(&blocker.join("example")).is_err());
    }
}
