//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait lets samplers read the real `/proc` filesystem on
//! Linux or a [`MockFs`](crate::collector::MockFs) in tests and CI.

use std::io;
use std::path::Path;

/// Block counts of a mounted filesystem, as reported by `statvfs(3)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsStat {
    /// Size of one block in bytes (`f_frsize`).
    pub block_size: u64,
    /// Total blocks (`f_blocks`).
    pub blocks: u64,
    /// Free blocks, including those reserved for root (`f_bfree`).
    pub blocks_free: u64,
}

impl FsStat {
    pub fn free_bytes(&self) -> u64 {
        self.blocks_free.saturating_mul(self.block_size)
    }

    pub fn total_bytes(&self) -> u64 {
        self.blocks.saturating_mul(self.block_size)
    }
}

/// Abstraction for the read-only OS queries samplers perform.
///
/// Implementations must be shareable across the blocking threads that run
/// samplers concurrently.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Returns block statistics for the filesystem mounted at `path`.
    fn statvfs(&self, path: &Path) -> io::Result<FsStat>;
}

/// Real filesystem implementation backed by `std::fs` and `statvfs(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    #[cfg(unix)]
    fn statvfs(&self, path: &Path) -> io::Result<FsStat> {
        use std::ffi::CString;
        use std::mem::MaybeUninit;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))?;
        let mut stat = MaybeUninit::<libc::statvfs>::zeroed();

        // SAFETY: `c_path` is a valid NUL-terminated string and `stat` points to
        // writable memory large enough for a `statvfs` struct.
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: statvfs returned 0, so the struct has been filled in.
        let stat = unsafe { stat.assume_init() };

        Ok(FsStat {
            block_size: stat.f_frsize as u64,
            blocks: stat.f_blocks as u64,
            blocks_free: stat.f_bfree as u64,
        })
    }

    #[cfg(not(unix))]
    fn statvfs(&self, _path: &Path) -> io::Result<FsStat> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "statvfs is only available on unix",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_real_fs_read_to_string() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "MemTotal: 16384 kB").unwrap();

        let fs = RealFs::new();
        let content = fs.read_to_string(file.path()).unwrap();
        assert_eq!(content, "MemTotal: 16384 kB\n");
    }

    #[test]
    fn test_real_fs_missing_file() {
        let fs = RealFs::new();
        let err = fs
            .read_to_string(Path::new("/nonexistent/path/12345"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_real_fs_statvfs() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs::new();
        let stat = fs.statvfs(dir.path()).unwrap();

        assert!(stat.block_size > 0);
        assert!(stat.total_bytes() >= stat.free_bytes());
    }

    #[test]
    fn test_fs_stat_bytes() {
        let stat = FsStat {
            block_size: 4096,
            blocks: 1000,
            blocks_free: 250,
        };
        assert_eq!(stat.total_bytes(), 4_096_000);
        assert_eq!(stat.free_bytes(), 1_024_000);
    }
}
