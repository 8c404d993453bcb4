//! Filesystem strategies used by the symlink adapter

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem operations the engine needs
pub trait FileSystem: Send + Sync {
    fn symlink(&self, source: &Path, target: &Path) -> io::Result<()>;
    fn remove(&self, path: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Metadata without following symlinks
    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata>;
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;
    fn home_dir(&self) -> Option<PathBuf>;
}

/// The real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn symlink(&self, source: &Path, target: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(source, target)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::{symlink_dir, symlink_file};

            if source.is_dir() {
                // Junctions don't need admin rights; fall back to a real dir symlink
                match junction::create(source, target) {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        log::debug!("Junction creation failed ({}), trying symlink_dir", e);
                        symlink_dir(source, target)
                    }
                }
            } else {
                symlink_file(source, target)
            }
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = (source, target);
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "symlinks not supported on this platform",
            ))
        }
    }

    /// Remove a file, a symlink, or an empty directory
    ///
    /// A non-empty directory is an error; its contents are never deleted.
    fn remove(&self, path: &Path) -> io::Result<()> {
        let meta = std::fs::symlink_metadata(path)?;
        if meta.file_type().is_dir() {
            return std::fs::remove_dir(path);
        }

        #[cfg(windows)]
        {
            // Directory symlinks and junctions need remove_dir on Windows
            std::fs::remove_file(path).or_else(|_| std::fs::remove_dir(path))
        }

        #[cfg(not(windows))]
        {
            std::fs::remove_file(path)
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata> {
        std::fs::symlink_metadata(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

/// Logs intended mutations, delegates reads to the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunFs;

impl FileSystem for DryRunFs {
    fn symlink(&self, source: &Path, target: &Path) -> io::Result<()> {
        log::info!(
            target: crate::runner::DRY_RUN_LOG_TARGET,
            "[FS] Would symlink: {} -> {}",
            source.display(),
            target.display()
        );
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        log::info!(target: crate::runner::DRY_RUN_LOG_TARGET, "[FS] Would remove: {}", path.display());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        log::info!(target: crate::runner::DRY_RUN_LOG_TARGET, "[FS] Would mkdir: {}", path.display());
        Ok(())
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata> {
        RealFs.symlink_metadata(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        RealFs.read_link(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        RealFs.home_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_real_fs_symlink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let target = dir.path().join("nested").join("link");
        std::fs::write(&source, "x").unwrap();

        RealFs.create_dir_all(target.parent().unwrap()).unwrap();
        RealFs.symlink(&source, &target).unwrap();

        assert!(RealFs.symlink_metadata(&target).unwrap().file_type().is_symlink());
        assert_eq!(RealFs.read_link(&target).unwrap(), source);

        RealFs.remove(&target).unwrap();
        assert!(RealFs.symlink_metadata(&target).is_err());
        assert!(source.exists());
    }

    #[test]
    fn test_real_fs_remove_keeps_non_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("full");
        let empty = dir.path().join("empty");
        std::fs::create_dir_all(&full).unwrap();
        std::fs::create_dir_all(&empty).unwrap();
        std::fs::write(full.join("init.lua"), "x").unwrap();

        assert!(RealFs.remove(&full).is_err());
        assert!(full.join("init.lua").exists());

        RealFs.remove(&empty).unwrap();
        assert!(!empty.exists());
    }

    #[test]
    fn test_dry_run_fs_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("keep.txt");
        std::fs::write(&file, "x").unwrap();

        DryRunFs.remove(&file).unwrap();
        DryRunFs.create_dir_all(&dir.path().join("new")).unwrap();
        DryRunFs.symlink(&file, &dir.path().join("link")).unwrap();

        assert!(file.exists());
        assert!(!dir.path().join("new").exists());
        assert!(DryRunFs.symlink_metadata(&dir.path().join("link")).is_err());
    }
}
