//! Part files and atomic install.
//!
//! Each job streams into its own part file next to the destination; the
//! destination only changes through a single rename once the part file holds
//! the complete body. A crash mid-transfer therefore leaves either the prior
//! file or no file at the final name, plus at worst a stray part file that the
//! next run for the same destination sweeps away.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::job::JobId;

/// Suffix of in-progress files.
pub const PART_SUFFIX: &str = ".part";

/// Part file path for a job: `<destination>.<job id>.part`, in the same
/// directory so the final rename never crosses filesystems.
pub fn part_path(final_path: &Path, job: JobId) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(format!(".{}{}", job.0, PART_SUFFIX));
    PathBuf::from(o)
}

/// Sequential writer for a part file.
pub struct PartFile {
    writer: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create (truncating) the part file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(PartFile {
            writer: BufWriter::with_capacity(64 * 1024, file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffers and fsync. Returns the number of bytes written.
    pub fn finish(self) -> io::Result<u64> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(self.written)
    }

    /// Close and delete the part file. Errors are logged, not returned: the
    /// caller is already on a failure path.
    pub fn discard(self) {
        let path = self.path.clone();
        drop(self.writer);
        discard_path(&path);
    }
}

/// Remove a leftover part file, ignoring "not found".
pub fn discard_path(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed part file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "could not remove part file: {}", e),
    }
}

/// Delete part files a previous run left next to `final_path`
/// (`<name>.<digits>.part`). Returns how many were removed.
pub fn sweep_stale_parts(final_path: &Path) -> usize {
    let (Some(dir), Some(name)) = (final_path.parent(), final_path.file_name()) else {
        return 0;
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let prefix = format!("{}.", name.to_string_lossy());
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let is_stale = file_name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(PART_SUFFIX))
            .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()));
        if is_stale {
            let path = entry.path();
            tracing::info!(path = %path.display(), "removing stale part file");
            discard_path(&path);
            removed += 1;
        }
    }
    removed
}

/// Atomically move a complete part file to its final name, replacing any
/// previous file there.
pub fn install(part: &Path, final_path: &Path) -> io::Result<()> {
    std::fs::rename(part, final_path)
}
