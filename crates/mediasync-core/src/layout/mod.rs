//! Destination paths for catalog items.
//!
//! The engine takes destinations as given; this module is the formatter the
//! CLI injects. `TemplateLayout` renders a `{artist}/{artist} - {title}` style
//! template under a root directory, and `assign_destinations` appends the
//! item id to names that collide so two items never share a destination.

mod format;
mod sanitize;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::job::DownloadItem;

pub use format::{extension_from_url, AudioFormat};
pub use sanitize::{sanitize_component, COMPONENT_MAX, NAME_MAX};

use sanitize::truncate_bytes;

/// Default filename template.
pub const DEFAULT_FILENAME_FORMAT: &str = "{artist}/{artist} - {title}";

/// Room kept free in every file name for the `.{job id}.part` suffix.
const PART_RESERVE: usize = 32;

/// Longest destination file name, collision suffix and extension included.
pub const FILE_NAME_MAX: usize = NAME_MAX - PART_RESERVE;

/// Room kept for the extension when rendering a base name.
const EXTENSION_RESERVE: usize = 16;

/// Maps an item to where it should live on disk.
pub trait PathFormatter {
    /// Absolute path without extension.
    fn base_path(&self, item: &DownloadItem) -> PathBuf;
    /// Extension including the leading dot, or empty.
    fn extension(&self, item: &DownloadItem) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Artist,
    Title,
    ItemId,
}

/// Template-driven layout rooted at a download directory.
#[derive(Debug, Clone)]
pub struct TemplateLayout {
    root: PathBuf,
    pieces: Vec<Piece>,
    format: AudioFormat,
}

impl TemplateLayout {
    pub fn new(root: &Path, template: &str, format: AudioFormat) -> Result<Self, ConfigError> {
        Ok(Self {
            root: root.to_path_buf(),
            pieces: parse_template(template)?,
            format,
        })
    }

    fn render(&self, item: &DownloadItem) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Artist => out.push_str(&sanitize_component(&item.artist)),
                Piece::Title => out.push_str(&sanitize_component(&item.title)),
                Piece::ItemId => out.push_str(&sanitize_component(&item.item_id)),
            }
        }
        out
    }
}

impl PathFormatter for TemplateLayout {
    fn base_path(&self, item: &DownloadItem) -> PathBuf {
        let rendered = self.render(item);
        let components: Vec<&str> = rendered
            .split(|c| c == '/' || c == std::path::MAIN_SEPARATOR)
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "." && *c != "..")
            .collect();
        let last = components.len().saturating_sub(1);
        let mut path = self.root.clone();
        for (i, component) in components.into_iter().enumerate() {
            let max = if i == last {
                FILE_NAME_MAX - EXTENSION_RESERVE
            } else {
                NAME_MAX
            };
            path.push(truncate_bytes(component, max).trim_end());
        }
        path
    }

    fn extension(&self, item: &DownloadItem) -> String {
        if item.is_archive {
            return ".zip".to_string();
        }
        extension_from_url(&item.url).unwrap_or_else(|| self.format.extension().to_string())
    }
}

fn parse_template(template: &str) -> Result<Vec<Piece>, ConfigError> {
    if template.trim().is_empty() {
        return Err(ConfigError::EmptyFormat);
    }
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        literal.push_str(&rest[..open]);
        let piece = match &rest[open + 1..close] {
            "artist" => Piece::Artist,
            "title" => Piece::Title,
            "item_id" => Piece::ItemId,
            other => return Err(ConfigError::UnknownPlaceholder(other.to_string())),
        };
        if !literal.is_empty() {
            pieces.push(Piece::Literal(std::mem::take(&mut literal)));
        }
        pieces.push(piece);
        rest = &rest[close + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

/// Resolve one destination per item. Items whose rendered base path collides
/// with another item's get `-{item_id}` appended before the extension. File
/// names are cut to `FILE_NAME_MAX` bytes, shortening the stem and keeping the
/// suffix.
pub fn assign_destinations(formatter: &dyn PathFormatter, items: &[DownloadItem]) -> Vec<PathBuf> {
    let bases: Vec<PathBuf> = items.iter().map(|i| formatter.base_path(i)).collect();
    let mut counts: HashMap<&Path, usize> = HashMap::new();
    for base in &bases {
        *counts.entry(base.as_path()).or_default() += 1;
    }
    items
        .iter()
        .zip(&bases)
        .map(|(item, base)| {
            let mut suffix = String::new();
            if counts.get(base.as_path()).copied().unwrap_or(0) > 1 {
                tracing::debug!(
                    item_id = %item.item_id,
                    path = %base.display(),
                    "destination collides, appending item id"
                );
                suffix.push('-');
                suffix.push_str(&sanitize_component(&item.item_id));
            }
            suffix.push_str(&formatter.extension(item));
            let stem = base
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = truncate_bytes(&stem, FILE_NAME_MAX.saturating_sub(suffix.len()));
            base.with_file_name(format!("{}{}", stem, suffix))
        })
        .collect()
}
