//! Per-request scratch storage
//!
//! Each request gets its own temporary directory. Dropping the guard removes
//! the directory and everything in it, whichever way the request ends.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::SeparationResult;

const SCRATCH_PREFIX: &str = "voxsplit-";

/// Temporary directory owned by one request
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create under `root`, or the system temp directory when `None`
    pub fn new(root: Option<&Path>) -> SeparationResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        log::debug!("Scratch space at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file named `name` inside the scratch directory
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `bytes` to `name` and return its path
    pub fn spool(&self, name: &str, bytes: &[u8]) -> SeparationResult<PathBuf> {
        let path = self.file_path(name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchSpace::new(Some(root.path())).unwrap();
            let file = scratch.spool("input.bin", b"abc").unwrap();
            assert!(file.exists());
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_removed_on_unwind() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let scratch = ScratchSpace::new(Some(&root_path)).unwrap();
            scratch.spool("input.bin", b"abc").unwrap();
            panic!("stage failed");
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_creates_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let scratch = ScratchSpace::new(Some(&nested)).unwrap();
        assert!(scratch.path().starts_with(&nested));
    }
}
