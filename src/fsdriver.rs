//! Minimal file-driver surface used when directories have to be created on demand.

use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub size: u64,
}

pub trait FileDriver {
    fn stat(&self, path: &str) -> io::Result<FileStat>;
    fn mkdir(&self, path: &str, mode: u32) -> io::Result<()>;
}

/// Driver for the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileDriver;

impl FileDriver for LocalFileDriver {
    fn stat(&self, path: &str) -> io::Result<FileStat> {
        let m = std::fs::metadata(Path::new(path))?;
        Ok(FileStat { is_dir: m.is_dir(), size: m.len() })
    }

    fn mkdir(&self, path: &str, mode: u32) -> io::Result<()> {
        let mut b = std::fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            b.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        b.create(Path::new(path))
    }
}
