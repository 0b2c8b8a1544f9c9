//! File discovery and suffix conventions
//!
//! Stages hand work to each other only through the working directory: each
//! stage rescans it for the suffix it consumes.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Suffix families recognised in the working directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Suffix {
    /// Raw PDS image, `.IMG`
    Raw,
    /// Level 0 cube, `.cub` (excluding the other cube families)
    Cube,
    /// Calibrated cube, `.lev1.cub`
    Level1,
    /// Single-band cube, `.band<N>.cub`
    Band,
    /// Map-projected cube, `.lev2.cub`
    Level2,
    /// Exported image, `.png`
    Png,
}

impl Suffix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => ".IMG",
            Self::Cube => ".cub",
            Self::Level1 => ".lev1.cub",
            Self::Band => ".band#.cub",
            Self::Level2 => ".lev2.cub",
            Self::Png => ".png",
        }
    }

    /// Base name of `file_name` when it carries this suffix
    ///
    /// Band files keep their band tag in the base (`A.band0001`), so every
    /// band gets its own downstream names.
    pub fn strip<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let base = match self {
            Self::Raw => file_name.strip_suffix(".IMG")?,
            Self::Level1 => file_name.strip_suffix(".lev1.cub")?,
            Self::Level2 => file_name.strip_suffix(".lev2.cub")?,
            Self::Png => file_name.strip_suffix(".png")?,
            Self::Cube => {
                let base = file_name.strip_suffix(".cub")?;
                if base.ends_with(".lev1") || base.ends_with(".lev2") || band_tag(base).is_some()
                {
                    return None;
                }
                base
            }
            Self::Band => {
                let base = file_name.strip_suffix(".cub")?;
                band_tag(base)?;
                base
            }
        };
        (!base.is_empty()).then_some(base)
    }
}

/// Split `A.band0001` into (`A`, `0001`)
pub fn band_tag(stem: &str) -> Option<(&str, &str)> {
    let (image, digits) = stem.rsplit_once(".band")?;
    if image.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((image, digits))
}

/// A file waiting to be consumed by a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub path: PathBuf,
    /// File name with the stage's input suffix removed
    pub base: String,
}

impl WorkItem {
    /// Name of the source image this file descends from
    pub fn image(&self) -> &str {
        band_tag(&self.base)
            .map(|(image, _)| image)
            .unwrap_or(&self.base)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// All regular files in `dir` carrying `suffix`, ordered by file name
pub fn scan(dir: &Path, suffix: Suffix) -> std::io::Result<Vec<WorkItem>> {
    let mut items = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::debug!("Ignoring non UTF-8 file name: {}", path.display());
            continue;
        };
        if let Some(base) = suffix.strip(&name) {
            items.push(WorkItem {
                base: base.to_string(),
                path,
            });
        }
    }

    items.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(items)
}

/// Band cubes written by explode for `base`
pub fn bands_for(dir: &Path, base: &str) -> std::io::Result<Vec<PathBuf>> {
    Ok(scan(dir, Suffix::Band)?
        .into_iter()
        .filter(|item| item.image() == base)
        .map(|item| item.path)
        .collect())
}
