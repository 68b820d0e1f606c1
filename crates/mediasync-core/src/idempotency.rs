//! Size-based skip check for files that already exist locally.
//!
//! Only the file length is compared. A corrupted file of the right length is
//! not detected; in exchange nothing is read back, which matters for
//! multi-gigabyte lossless archives.

use std::io;
use std::path::Path;

/// What the filesystem says about a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    /// No file at the path.
    Missing,
    /// A file exists and its length equals the expected size.
    SizeMatches,
    /// A file exists but its length differs from the expected size.
    SizeMismatch { actual: u64 },
    /// A file exists but no expected size was available.
    Unknown { actual: u64 },
}

/// What the pipeline should do with a job after the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    /// Download. `existing_len` is set when a local file will be replaced
    /// and its length may still be confirmed against the response headers.
    Download { existing_len: Option<u64> },
}

/// Stat `path` and compare its length with `expected_size`.
///
/// A directory at the path is reported as an error: it can never be
/// replaced by a rename of a regular file.
pub fn check_existing(path: &Path, expected_size: Option<u64>) -> io::Result<SizeCheck> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SizeCheck::Missing),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("destination is a directory: {}", path.display()),
        ));
    }
    let actual = meta.len();
    Ok(match expected_size {
        Some(expected) if expected == actual => SizeCheck::SizeMatches,
        Some(_) => SizeCheck::SizeMismatch { actual },
        None => SizeCheck::Unknown { actual },
    })
}

impl SizeCheck {
    /// Apply the overwrite policy.
    ///
    /// `force_overwrite` re-downloads everything. `skip_unverified` keeps
    /// existing files whose size cannot be checked instead of replacing them.
    pub fn decide(self, force_overwrite: bool, skip_unverified: bool) -> Decision {
        if force_overwrite {
            return Decision::Download { existing_len: None };
        }
        match self {
            SizeCheck::Missing => Decision::Download { existing_len: None },
            SizeCheck::SizeMatches => Decision::Skip,
            SizeCheck::Unknown { .. } if skip_unverified => Decision::Skip,
            SizeCheck::Unknown { actual } | SizeCheck::SizeMismatch { actual } => {
                Decision::Download {
                    existing_len: Some(actual),
                }
            }
        }
    }
}
