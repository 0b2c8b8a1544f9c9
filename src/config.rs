use crate::error::PipelineError;
use crate::projection::Projection;
use crate::Args;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the projection stage gets its map template from
#[derive(Debug, Clone, PartialEq)]
pub enum MapSource {
    /// User-supplied `.map` file
    Template(PathBuf),
    /// Generated from a preset into the working directory
    Preset {
        projection: Projection,
        center_longitude: Option<f64>,
        center_latitude: Option<f64>,
    },
}

impl MapSource {
    #[cfg(test)]
    pub fn preset(projection: Projection) -> Self {
        Self::Preset {
            projection,
            center_longitude: None,
            center_latitude: None,
        }
    }
}

/// spiceinit lookup mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SpiceMode {
    /// Kernels from the local ISIS data area
    Local,
    /// SPICE web service (`web=true`)
    Web,
}

impl SpiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Web => "web",
        }
    }
}

/// Command-line form of the geometry-init fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SpiceFallback {
    Local,
    Web,
    None,
}

impl From<SpiceFallback> for Option<SpiceMode> {
    fn from(fallback: SpiceFallback) -> Self {
        match fallback {
            SpiceFallback::Local => Some(SpiceMode::Local),
            SpiceFallback::Web => Some(SpiceMode::Web),
            SpiceFallback::None => None,
        }
    }
}

/// Which files a stage may consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DiscoveryScope {
    /// Anything in the working directory with a matching suffix, including
    /// leftovers from earlier runs
    #[default]
    Directory,
    /// Only files produced by earlier stages of this run (ingest still scans)
    Run,
}

/// What to do when a stage's expected output already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingOutputs {
    /// Re-run the tool and let it replace the file
    #[default]
    Overwrite,
    /// Leave the item alone and treat the existing file as this run's output
    Skip,
}

/// Where toolkit executables are looked up
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolSearch {
    /// `PATH` only
    #[default]
    Path,
    /// Only this directory (`--tool-dir`)
    Only(PathBuf),
    /// This directory first, then `PATH` (`$ISISROOT/bin`)
    Preferred(PathBuf),
}

impl ToolSearch {
    /// An explicit directory is strict; `$ISISROOT/bin` is a preference
    pub fn resolve(explicit: Option<PathBuf>, isis_root: Option<OsString>) -> Self {
        match (explicit, isis_root) {
            (Some(dir), _) => Self::Only(dir),
            (None, Some(root)) => Self::Preferred(PathBuf::from(root).join("bin")),
            (None, None) => Self::Path,
        }
    }
}

/// Pipeline configuration, fixed for the duration of a run
#[derive(Debug, Clone)]
pub struct Config {
    pub working_dir: PathBuf,
    pub map_source: MapSource,
    pub delete_intermediates: bool,
    pub band_split: bool,
    pub spice_mode: SpiceMode,
    pub spice_fallback: Option<SpiceMode>,
    pub discovery: DiscoveryScope,
    pub existing_outputs: ExistingOutputs,
    pub command_timeout: Duration,
    pub tool_search: ToolSearch,
}

/// Default per-command timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;

impl Config {
    /// Configuration with the default policies for `working_dir`
    #[cfg(test)]
    pub fn new(working_dir: impl Into<PathBuf>, map_source: MapSource) -> Self {
        Self {
            working_dir: working_dir.into(),
            map_source,
            delete_intermediates: false,
            band_split: true,
            spice_mode: SpiceMode::Local,
            spice_fallback: Some(SpiceMode::Web),
            discovery: DiscoveryScope::Directory,
            existing_outputs: ExistingOutputs::Overwrite,
            command_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            tool_search: ToolSearch::Path,
        }
    }

    /// Check the parts of the configuration that depend on the filesystem
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.working_dir.is_dir() {
            return Err(PipelineError::Configuration(format!(
                "working directory not found: {}",
                self.working_dir.display()
            )));
        }

        if let MapSource::Template(path) = &self.map_source {
            if !path.is_file() {
                return Err(PipelineError::Configuration(format!(
                    "map template not found: {}",
                    path.display()
                )));
            }
        }

        if self.command_timeout.is_zero() {
            return Err(PipelineError::Configuration(
                "command timeout must be greater than zero".to_string(),
            ));
        }

        if self.spice_fallback == Some(self.spice_mode) {
            tracing::warn!(
                "Geometry init fallback uses the same mode as the first attempt ({})",
                self.spice_mode.as_str()
            );
        }

        Ok(())
    }
}

impl TryFrom<Args> for Config {
    type Error = PipelineError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let working_dir = args.dir.canonicalize().map_err(|e| {
            PipelineError::Configuration(format!(
                "cannot resolve working directory {}: {}",
                args.dir.display(),
                e
            ))
        })?;

        let map_source = match (args.map, args.projection, args.template) {
            (Some(map), None, None) => MapSource::Template(resolve_template(&map)?),
            (None, Some(projection), None) => MapSource::Preset {
                projection,
                center_longitude: args.center_longitude,
                center_latitude: args.center_latitude,
            },
            (None, None, Some(template)) => {
                let path = PathBuf::from(&template);
                match Projection::from_str(&template) {
                    Some(projection) if !path.exists() => MapSource::Preset {
                        projection,
                        center_longitude: args.center_longitude,
                        center_latitude: args.center_latitude,
                    },
                    _ => MapSource::Template(resolve_template(&path)?),
                }
            }
            _ => {
                return Err(PipelineError::Configuration(
                    "exactly one of --map, --projection or TEMPLATE is required".to_string(),
                ))
            }
        };

        let delete = args.delete.or(args.legacy_delete).unwrap_or(0);

        let tool_search = ToolSearch::resolve(args.tool_dir, std::env::var_os("ISISROOT"));

        let config = Self {
            working_dir,
            map_source,
            delete_intermediates: delete == 1,
            band_split: !args.no_band_split,
            spice_mode: args.spice_mode,
            spice_fallback: args.spice_fallback.into(),
            discovery: args.discovery,
            existing_outputs: if args.skip_existing {
                ExistingOutputs::Skip
            } else {
                ExistingOutputs::Overwrite
            },
            command_timeout: Duration::from_secs(args.timeout),
            tool_search,
        };

        config.validate()?;
        Ok(config)
    }
}

fn resolve_template(path: &Path) -> Result<PathBuf, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::Configuration(format!(
            "map template not found: {}",
            path.display()
        )));
    }
    path.canonicalize().map_err(|e| {
        PipelineError::Configuration(format!(
            "cannot resolve map template {}: {}",
            path.display(),
            e
        ))
    })
}
