use super::naming::{self, Suffix, WorkItem};
use crate::config::SpiceMode;
use crate::runner::Invocation;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Modification times of a target's files at one point in time
pub type Snapshot = BTreeMap<PathBuf, SystemTime>;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// `.IMG` -> `.cub` (marci2isis)
    Ingest,
    /// Attach SPICE geometry to `.cub` in place (spiceinit)
    GeometryInit,
    /// `.cub` -> `.lev1.cub` (marcical)
    Calibrate,
    /// `.lev1.cub` -> `.band<N>.cub` (explode)
    BandSplit,
    /// `.lev1.cub` or `.band<N>.cub` -> `.lev2.cub` (cam2map)
    MapProject,
    /// `.lev2.cub` -> `.png` (isis2std)
    Export,
}

/// What a stage is expected to leave behind for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    File(PathBuf),
    /// One cube per band, `<prefix>.band<N>.cub`
    Bands { dir: PathBuf, base: String },
    /// Input is modified, nothing new is written
    InPlace,
}

impl Target {
    /// Files already present for this target
    pub fn existing(&self) -> std::io::Result<Vec<PathBuf>> {
        match self {
            Self::File(path) if path.is_file() => Ok(vec![path.clone()]),
            Self::File(_) | Self::InPlace => Ok(Vec::new()),
            Self::Bands { dir, base } => naming::bands_for(dir, base),
        }
    }

    pub fn snapshot(&self) -> std::io::Result<Snapshot> {
        self.existing()?
            .into_iter()
            .map(|path| {
                let modified = std::fs::metadata(&path)?.modified()?;
                Ok::<_, std::io::Error>((path, modified))
            })
            .collect()
    }

    /// Files that appeared or changed since `before` was taken
    ///
    /// Leftovers from an earlier run that the tool did not touch are not
    /// counted as its output.
    pub fn written_since(&self, before: &Snapshot) -> std::io::Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (path, modified) in self.snapshot()? {
            if before.get(&path) != Some(&modified) {
                written.push(path);
            }
        }
        Ok(written)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Bands { dir, base } => {
                dir.join(format!("{}.band*.cub", base)).display().to_string()
            }
            Self::InPlace => "in place".to_string(),
        }
    }
}

impl Stage {
    /// Stages to run, with or without the band split
    pub fn plan(band_split: bool) -> Vec<Stage> {
        let mut stages = vec![Self::Ingest, Self::GeometryInit, Self::Calibrate];
        if band_split {
            stages.push(Self::BandSplit);
        }
        stages.extend([Self::MapProject, Self::Export]);
        stages
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::GeometryInit => "geometry_init",
            Self::Calibrate => "calibrate",
            Self::BandSplit => "band_split",
            Self::MapProject => "map_project",
            Self::Export => "export",
        }
    }

    /// Toolkit command the stage runs
    pub fn tool(&self) -> &'static str {
        match self {
            Self::Ingest => "marci2isis",
            Self::GeometryInit => "spiceinit",
            Self::Calibrate => "marcical",
            Self::BandSplit => "explode",
            Self::MapProject => "cam2map",
            Self::Export => "isis2std",
        }
    }

    /// Suffix of the files the stage consumes
    pub fn input(&self, band_split: bool) -> Suffix {
        match self {
            Self::Ingest => Suffix::Raw,
            Self::GeometryInit | Self::Calibrate => Suffix::Cube,
            Self::BandSplit => Suffix::Level1,
            Self::MapProject if band_split => Suffix::Band,
            Self::MapProject => Suffix::Level1,
            Self::Export => Suffix::Level2,
        }
    }

    /// Whether the stage's inputs are intermediates that may be removed once
    /// its output is verified. Raw images and level 2 cubes are always kept.
    pub fn deletes_input(&self) -> bool {
        matches!(self, Self::Calibrate | Self::BandSplit | Self::MapProject)
    }

    /// Expected output for `item`
    pub fn target(&self, item: &WorkItem, dir: &Path) -> Target {
        match self {
            Self::Ingest => Target::File(dir.join(format!("{}.cub", item.base))),
            Self::GeometryInit => Target::InPlace,
            Self::Calibrate => Target::File(dir.join(format!("{}.lev1.cub", item.base))),
            Self::BandSplit => Target::Bands {
                dir: dir.to_path_buf(),
                base: item.base.clone(),
            },
            Self::MapProject => Target::File(dir.join(format!("{}.lev2.cub", item.base))),
            Self::Export => Target::File(dir.join(format!("{}.png", item.base))),
        }
    }

    /// Command for `item`, with geometry init in `spice_mode`
    pub fn invocation(
        &self,
        item: &WorkItem,
        dir: &Path,
        map_template: &Path,
        spice_mode: SpiceMode,
    ) -> Invocation {
        let from = || Invocation::new(self.tool()).path_param("from", &item.path);
        match self {
            Self::Ingest => from().path_param("to", &dir.join(format!("{}.cub", item.base))),
            Self::GeometryInit => spiceinit(item, spice_mode),
            Self::Calibrate => {
                from().path_param("to", &dir.join(format!("{}.lev1.cub", item.base)))
            }
            // explode and isis2std append their own suffixes to `to`
            Self::BandSplit | Self::Export => from().path_param("to", &dir.join(&item.base)),
            Self::MapProject => from()
                .path_param("map", map_template)
                .path_param("to", &dir.join(format!("{}.lev2.cub", item.base))),
        }
    }
}

/// spiceinit in the requested lookup mode
pub fn spiceinit(item: &WorkItem, mode: SpiceMode) -> Invocation {
    let invocation = Invocation::new(Stage::GeometryInit.tool()).path_param("from", &item.path);
    match mode {
        SpiceMode::Local => invocation,
        SpiceMode::Web => invocation.param("web", "true"),
    }
}
