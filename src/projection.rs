//! Map template presets for the projection stage
//!
//! A preset expands into a minimal PVL `Mapping` group that cam2map accepts
//! in place of a hand-written `.map` file.

use crate::error::PipelineError;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Target body for every preset
const TARGET_NAME: &str = "Mars";
/// Positive-east 0..360 longitudes
const LONGITUDE_DOMAIN: u32 = 360;

/// Named projection presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Projection {
    /// Simple cylindrical, centered on (0, 0)
    #[default]
    #[value(name = "simplecyl")]
    SimpleCylindrical,
    /// North polar stereographic, 60N to the pole
    #[value(name = "polar")]
    Polar,
    /// Equirectangular, centered on (0, 0)
    #[value(name = "eqc")]
    Equirectangular,
}

impl Projection {
    /// Parse a preset name
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "simplecyl" => Some(Self::SimpleCylindrical),
            "polar" => Some(Self::Polar),
            "eqc" => Some(Self::Equirectangular),
            _ => None,
        }
    }

    /// Preset name as used on the command line and in the template file name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleCylindrical => "simplecyl",
            Self::Polar => "polar",
            Self::Equirectangular => "eqc",
        }
    }

    /// ISIS projection name written into the template
    pub fn isis_name(&self) -> &'static str {
        match self {
            Self::SimpleCylindrical => "SimpleCylindrical",
            Self::Polar => "PolarStereographic",
            Self::Equirectangular => "Equirectangular",
        }
    }

    /// Build the template for this preset
    pub fn template(&self) -> MapTemplate {
        let mut template = MapTemplate {
            target_name: TARGET_NAME.to_string(),
            longitude_domain: LONGITUDE_DOMAIN,
            projection_name: self.isis_name().to_string(),
            center_longitude: 0.0,
            center_latitude: 0.0,
            extra: Vec::new(),
        };

        if *self == Self::Polar {
            template.center_latitude = 90.0;
            template.extra = vec![
                ("TrueScaleLatitude".to_string(), 90.0),
                ("MinimumLatitude".to_string(), 60.0),
                ("MaximumLatitude".to_string(), 90.0),
            ];
        }

        template
    }
}

/// Minimal map template for cam2map
#[derive(Debug, Clone, PartialEq)]
pub struct MapTemplate {
    pub target_name: String,
    pub longitude_domain: u32,
    pub projection_name: String,
    pub center_longitude: f64,
    pub center_latitude: f64,
    /// Projection-specific keywords, written after the common ones
    pub extra: Vec<(String, f64)>,
}

impl MapTemplate {
    /// Override the preset center
    pub fn with_center(mut self, longitude: Option<f64>, latitude: Option<f64>) -> Self {
        if let Some(lon) = longitude {
            self.center_longitude = lon;
        }
        if let Some(lat) = latitude {
            self.center_latitude = lat;
        }
        self
    }

    /// Render as PVL
    pub fn render(&self) -> String {
        let mut out = String::from("Group=Mapping\n");
        let _ = writeln!(out, "  TargetName={}", self.target_name);
        let _ = writeln!(out, "  LongitudeDomain={}", self.longitude_domain);
        let _ = writeln!(out, "  ProjectionName={}", self.projection_name);
        let _ = writeln!(out, "  CenterLongitude={:.1}", self.center_longitude);
        let _ = writeln!(out, "  CenterLatitude={:.1}", self.center_latitude);
        for (key, value) in &self.extra {
            let _ = writeln!(out, "  {}={:.1}", key, value);
        }
        out.push_str("End_Group\nEnd\n");
        out
    }

    /// Write the template into `dir` as `<name>.map`, replacing any previous file
    pub fn write_to(&self, dir: &Path, name: &str) -> Result<PathBuf, PipelineError> {
        let path = dir.join(format!("{}.map", name));

        let mut temp_file = tempfile::Builder::new()
            .prefix(".map-template")
            .tempfile_in(dir)
            .map_err(|e| PipelineError::io(dir, e))?;
        temp_file
            .write_all(self.render().as_bytes())
            .map_err(|e| PipelineError::io(temp_file.path(), e))?;
        temp_file
            .persist(&path)
            .map_err(|e| PipelineError::io(&path, e.error))?;

        tracing::info!("Projection map template written: {}", path.display());
        Ok(path)
    }
}
