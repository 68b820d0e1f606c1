//! Post-processing: unpack a downloaded zip next to itself, then remove it.
//!
//! Entries are written into a hidden staging directory first. Only when every
//! entry decoded cleanly (CRC checked by the zip reader, byte count equal to
//! the entry's declared size) are the staged files moved into place and the
//! archive deleted. An existing album directory is merged into: files of the
//! same name are replaced, anything else in it stays. Any failure removes the
//! staging directory and leaves the archive exactly as it was.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::job::DownloadItem;
use crate::layout::sanitize_component;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot read archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("entry {name} has an unsafe path")]
    UnsafePath { name: String },
    #[error("entry {name} failed to decode: {source}")]
    Entry {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("entry {name} is truncated: expected {expected} bytes, got {copied}")]
    Truncated {
        name: String,
        expected: u64,
        copied: u64,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ExtractError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        ExtractError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Directory name the archive unpacks into.
///
/// Inside an artist directory (`Artist/Artist - Album.zip`) that is the album
/// part of the stem, giving `Artist/Album/`. Otherwise the archive's file
/// stem, else the sanitized title, else the item id.
pub fn extraction_dir_name(archive: &Path, item: &DownloadItem) -> String {
    let stem = archive
        .file_stem()
        .map(|s| sanitize_component(&s.to_string_lossy()))
        .unwrap_or_default();
    if !stem.is_empty() {
        return album_part(archive, &stem, item).unwrap_or(stem);
    }
    let title = sanitize_component(&item.title);
    if !title.is_empty() {
        return title;
    }
    sanitize_component(&item.item_id)
}

fn album_part(archive: &Path, stem: &str, item: &DownloadItem) -> Option<String> {
    let artist = sanitize_component(&item.artist);
    if artist.is_empty() {
        return None;
    }
    let parent = archive.parent()?.file_name()?;
    if parent.to_string_lossy() != artist.as_str() {
        return None;
    }
    let album = sanitize_component(stem.strip_prefix(&format!("{} - ", artist))?);
    (!album.is_empty()).then_some(album)
}

/// Extract `archive` when extraction is enabled and the item is an archive.
///
/// Returns the directory the entries now live in, or `None` when nothing was
/// done.
pub fn extract_archive(
    archive: &Path,
    item: &DownloadItem,
    extract_enabled: bool,
) -> Result<Option<PathBuf>, ExtractError> {
    if !(extract_enabled && item.is_archive) {
        return Ok(None);
    }
    let parent = match archive.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = extraction_dir_name(archive, item);
    let target = parent.join(&name);
    let staging = parent.join(format!(".{}.extracting", name));

    remove_dir_if_present(&staging)
        .map_err(|e| ExtractError::io(format!("clear {}", staging.display()), e))?;

    let entries = match unpack(archive, &staging) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(archive = %archive.display(), error = %e, "extraction failed, archive kept");
            let _ = remove_dir_if_present(&staging);
            return Err(e);
        }
    };

    if let Err(e) = merge_dir(&staging, &target) {
        let _ = remove_dir_if_present(&staging);
        return Err(ExtractError::io(format!("install {}", target.display()), e));
    }

    if let Err(e) = fs::remove_file(archive) {
        // Extracted content is already in place; report and move on.
        tracing::warn!(archive = %archive.display(), error = %e, "could not remove extracted archive");
    }
    tracing::info!(
        archive = %archive.display(),
        dir = %target.display(),
        entries,
        "archive extracted"
    );
    Ok(Some(target))
}

/// Unpack every entry under `staging`; returns the number of files written.
fn unpack(archive: &Path, staging: &Path) -> Result<usize, ExtractError> {
    let file = File::open(archive)
        .map_err(|e| ExtractError::io(format!("open {}", archive.display()), e))?;
    let mut zip = zip::ZipArchive::new(file)?;
    fs::create_dir_all(staging)
        .map_err(|e| ExtractError::io(format!("create {}", staging.display()), e))?;

    let mut files = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let name = entry.name().to_string();
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(ExtractError::UnsafePath { name });
        };
        let out_path = staging.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| ExtractError::io(format!("create {}", out_path.display()), e))?;
            continue;
        }
        if let Some(dir) = out_path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| ExtractError::io(format!("create {}", dir.display()), e))?;
        }
        let mut out = File::create(&out_path)
            .map_err(|e| ExtractError::io(format!("create {}", out_path.display()), e))?;
        let expected = entry.size();
        let copied = io::copy(&mut entry, &mut out).map_err(|source| ExtractError::Entry {
            name: name.clone(),
            source,
        })?;
        if copied != expected {
            return Err(ExtractError::Truncated {
                name,
                expected,
                copied,
            });
        }
        out.sync_all()
            .map_err(|e| ExtractError::io(format!("sync {}", out_path.display()), e))?;
        files += 1;
    }
    Ok(files)
}

/// Move everything under `from` into `to`, replacing entries of the same
/// name. Other entries already in `to` are kept. `from` is consumed.
fn merge_dir(from: &Path, to: &Path) -> io::Result<()> {
    match fs::symlink_metadata(to) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return fs::rename(from, to),
        Err(e) => return Err(e),
        Ok(meta) if !meta.is_dir() => {
            fs::remove_file(to)?;
            return fs::rename(from, to);
        }
        Ok(_) => {}
    }
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            merge_dir(&src, &dst)?;
        } else {
            if fs::symlink_metadata(&dst).is_ok_and(|m| m.is_dir()) {
                fs::remove_dir_all(&dst)?;
            }
            fs::rename(&src, &dst)?;
        }
    }
    fs::remove_dir(from)
}

fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn item(archive: bool) -> DownloadItem {
        DownloadItem {
            artist: "Artist".to_string(),
            title: "Album".to_string(),
            item_id: "7".to_string(),
            url: "https://dl.example.com/7".to_string(),
            expected_size: None,
            is_archive: archive,
        }
    }

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        zip.add_directory("disc1/", zip::write::FileOptions::default())
            .unwrap();
        for (name, data) in files {
            zip.start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn noop_unless_enabled_and_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        std::fs::write(&archive, b"not even a zip").unwrap();
        assert!(extract_archive(&archive, &item(true), false).unwrap().is_none());
        assert!(extract_archive(&archive, &item(false), true).unwrap().is_none());
        assert!(archive.exists());
    }

    #[test]
    fn extracts_into_sibling_dir_and_removes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("Artist - Album.zip");
        write_zip(
            &archive,
            &[("01 Intro.flac", b"intro"), ("disc1/02 Song.flac", b"song")],
        );

        let out = extract_archive(&archive, &item(true), true)
            .unwrap()
            .unwrap();
        assert_eq!(out, dir.path().join("Artist - Album"));
        assert_eq!(std::fs::read(out.join("01 Intro.flac")).unwrap(), b"intro");
        assert_eq!(
            std::fs::read(out.join("disc1").join("02 Song.flac")).unwrap(),
            b"song"
        );
        assert!(!archive.exists());
        assert!(!dir.path().join(".Artist - Album.extracting").exists());
    }

    #[test]
    fn merges_into_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("Album.zip");
        write_zip(
            &archive,
            &[("01.flac", b"fresh"), ("disc1/02.flac", b"fresh two")],
        );
        let existing = dir.path().join("Album");
        std::fs::create_dir_all(existing.join("disc1")).unwrap();
        std::fs::write(existing.join("cover.jpg"), b"user art").unwrap();
        std::fs::write(existing.join("01.flac"), b"stale").unwrap();
        std::fs::write(existing.join("disc1").join("notes.txt"), b"mine").unwrap();

        let out = extract_archive(&archive, &item(true), true)
            .unwrap()
            .unwrap();
        assert_eq!(out, existing);
        assert_eq!(std::fs::read(existing.join("cover.jpg")).unwrap(), b"user art");
        assert_eq!(std::fs::read(existing.join("01.flac")).unwrap(), b"fresh");
        assert_eq!(
            std::fs::read(existing.join("disc1").join("02.flac")).unwrap(),
            b"fresh two"
        );
        assert_eq!(
            std::fs::read(existing.join("disc1").join("notes.txt")).unwrap(),
            b"mine"
        );
        assert!(!dir.path().join(".Album.extracting").exists());
        assert!(!archive.exists());
    }

    #[test]
    fn corrupt_archive_is_kept_intact() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("Album.zip");
        write_zip(&archive, &[("a.flac", &[1u8; 4096])]);
        let full = std::fs::read(&archive).unwrap();
        // Drop the central directory.
        std::fs::write(&archive, &full[..full.len() / 2]).unwrap();
        let before = std::fs::read(&archive).unwrap();

        let err = extract_archive(&archive, &item(true), true).unwrap_err();
        assert!(matches!(err, ExtractError::Archive(_)));
        assert_eq!(std::fs::read(&archive).unwrap(), before);
        assert!(!dir.path().join("Album").exists());
        assert!(!dir.path().join(".Album.extracting").exists());
    }

    #[test]
    fn artist_directory_layout_unpacks_into_album_name() {
        let i = item(true);
        assert_eq!(
            extraction_dir_name(Path::new("/m/Artist/Artist - Album.zip"), &i),
            "Album"
        );
        assert_eq!(
            extraction_dir_name(Path::new("/m/Artist/Artist - Album-7.zip"), &i),
            "Album-7"
        );
        // Flat layout: the full stem.
        assert_eq!(
            extraction_dir_name(Path::new("/m/Artist - Album.zip"), &i),
            "Artist - Album"
        );
    }

    #[test]
    fn dir_name_falls_back_to_title_then_id() {
        let mut i = item(true);
        assert_eq!(extraction_dir_name(Path::new("/m/X - Y.zip"), &i), "X - Y");
        assert_eq!(extraction_dir_name(Path::new("/"), &i), "Album");
        i.title = "...".to_string();
        assert_eq!(extraction_dir_name(Path::new("/"), &i), "7");
    }
}
