use super::stage::Stage;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;

/// An item a stage gave up on
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub file: String,
    pub code: &'static str,
    pub reason: String,
}

/// Counters for one stage
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub tool: &'static str,
    /// Items the tool was invoked for
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items left alone: existing output, or an image excluded earlier
    pub skipped: usize,
    /// Inputs removed after a verified output
    pub deleted: usize,
    pub time_ms: u64,
    pub failures: Vec<ItemFailure>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            tool: stage.tool(),
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            deleted: 0,
            time_ms: 0,
            failures: Vec::new(),
        }
    }
}

/// Result of a complete run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub stages: Vec<StageReport>,
    /// Final `.png` files in the working directory
    pub outputs: Vec<String>,
    /// Images dropped after geometry init failed
    pub excluded: Vec<String>,
    pub total_time_ms: u64,
}

impl RunSummary {
    #[cfg(test)]
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Number of exported images
    pub fn processed(&self) -> usize {
        self.outputs.len()
    }

    /// Item failures across all stages
    pub fn failed(&self) -> usize {
        self.stages.iter().map(|r| r.failed).sum()
    }

    pub fn log(&self) {
        for report in &self.stages {
            tracing::info!(
                "{:<14} attempted={} succeeded={} failed={} skipped={} deleted={} ({}ms)",
                report.stage.as_str(),
                report.attempted,
                report.succeeded,
                report.failed,
                report.skipped,
                report.deleted,
                report.time_ms
            );
        }

        if !self.excluded.is_empty() {
            tracing::warn!(
                "Excluded after geometry init failure: {}",
                self.excluded.join(", ")
            );
        }

        if self.failed() > 0 {
            tracing::warn!(
                "MARCI processing complete: {} images exported, {} failures in {}ms",
                self.processed(),
                self.failed(),
                self.total_time_ms
            );
        } else {
            tracing::info!(
                "MARCI processing complete: {} images exported in {}ms",
                self.processed(),
                self.total_time_ms
            );
        }
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let mut calibrate = StageReport::new(Stage::Calibrate);
        calibrate.failed = 2;
        let mut export = StageReport::new(Stage::Export);
        export.failed = 1;

        let summary = RunSummary {
            stages: vec![calibrate, export],
            outputs: vec!["A.png".to_string()],
            ..Default::default()
        };

        assert_eq!(summary.failed(), 3);
        assert_eq!(summary.processed(), 1);
        assert_eq!(summary.stage(Stage::Export).map(|r| r.tool), Some("isis2std"));
        assert!(summary.stage(Stage::BandSplit).is_none());
    }

    #[test]
    fn test_json_uses_stage_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = RunSummary {
            stages: vec![StageReport::new(Stage::GeometryInit)],
            ..Default::default()
        };

        summary.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["stages"][0]["stage"], "geometry_init");
        assert_eq!(value["stages"][0]["tool"], "spiceinit");
    }
}
