use super::naming::{self, Suffix, WorkItem};
use super::stage::{self, Stage, Target};
use super::summary::{ItemFailure, RunSummary, StageReport};
use crate::config::{Config, DiscoveryScope, ExistingOutputs, MapSource, SpiceMode};
use crate::error::PipelineError;
use crate::runner::{CommandOutput, Invocation, RunError, ToolRunner};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Runs the stage sequence over one working directory
pub struct Driver<'a, R: ToolRunner> {
    config: &'a Config,
    runner: &'a R,
    /// Files written during this run
    produced: BTreeSet<PathBuf>,
    /// Images whose geometry init failed on every attempt
    excluded: BTreeSet<String>,
}

impl<'a, R: ToolRunner> Driver<'a, R> {
    pub fn new(config: &'a Config, runner: &'a R) -> Self {
        Self {
            config,
            runner,
            produced: BTreeSet::new(),
            excluded: BTreeSet::new(),
        }
    }

    /// Run every planned stage in order
    ///
    /// Only fatal errors are returned; item failures end up in the summary.
    pub async fn run(mut self) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        let stages = Stage::plan(self.config.band_split);

        self.preflight(&stages)?;
        let map_template = self.prepare_map_template()?;

        tracing::info!("Using map: {}", map_template.display());
        tracing::info!("Processing directory: {}", self.dir().display());
        tracing::info!(
            "Delete intermediate files: {}",
            if self.config.delete_intermediates { "Yes" } else { "No" }
        );

        let mut summary = RunSummary::default();
        for (index, stage) in stages.iter().enumerate() {
            tracing::info!(
                "Stage {}/{}: {} ({})",
                index + 1,
                stages.len(),
                stage.as_str(),
                stage.tool()
            );
            let report = self.run_stage(*stage, &map_template).await?;
            summary.stages.push(report);
        }

        summary.outputs = naming::scan(self.dir(), Suffix::Png)
            .map_err(|e| PipelineError::io(self.dir(), e))?
            .into_iter()
            .filter(|item| self.in_scope(item))
            .map(|item| item.file_name())
            .collect();
        summary.excluded = self.excluded.iter().cloned().collect();
        summary.total_time_ms = start.elapsed().as_millis() as u64;

        Ok(summary)
    }

    fn dir(&self) -> &Path {
        &self.config.working_dir
    }

    /// Every tool of the plan must resolve before anything is touched
    fn preflight(&self, stages: &[Stage]) -> Result<(), PipelineError> {
        let missing: Vec<&str> = stages
            .iter()
            .map(|s| s.tool())
            .filter(|tool| !self.runner.is_available(tool))
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(PipelineError::ToolUnavailable {
            tool: missing.join(", "),
            reason: "not found in the tool directory or PATH".to_string(),
        })
    }

    fn prepare_map_template(&self) -> Result<PathBuf, PipelineError> {
        match &self.config.map_source {
            MapSource::Template(path) => Ok(path.clone()),
            MapSource::Preset {
                projection,
                center_longitude,
                center_latitude,
            } => projection
                .template()
                .with_center(*center_longitude, *center_latitude)
                .write_to(self.dir(), projection.as_str()),
        }
    }

    async fn run_stage(
        &mut self,
        stage: Stage,
        map_template: &Path,
    ) -> Result<StageReport, PipelineError> {
        let start = Instant::now();
        let mut report = StageReport::new(stage);
        let items = self.discover(stage)?;

        if items.is_empty() {
            tracing::info!(
                "No {} files to process",
                stage.input(self.config.band_split).as_str()
            );
        }

        for item in items {
            if self.excluded.contains(item.image()) {
                tracing::warn!(
                    "Skipping {}: geometry init failed for {}",
                    item.path.display(),
                    item.image()
                );
                report.skipped += 1;
                continue;
            }

            let target = stage.target(&item, self.dir());

            if self.config.existing_outputs == ExistingOutputs::Skip {
                let existing = target
                    .existing()
                    .map_err(|e| PipelineError::io(self.dir(), e))?;
                if !existing.is_empty() {
                    tracing::info!(
                        "Output exists, skipping {}: {}",
                        item.path.display(),
                        target.describe()
                    );
                    self.produced.extend(existing);
                    report.skipped += 1;
                    continue;
                }
            }

            report.attempted += 1;
            let result = match stage {
                Stage::GeometryInit => self.init_geometry(&item).await,
                _ => self.process_item(stage, &item, &target, map_template).await,
            };

            match result {
                Ok(outputs) => {
                    report.succeeded += 1;
                    self.produced.extend(outputs);
                    if self.config.delete_intermediates && stage.deletes_input() {
                        self.delete_input(&item, &mut report);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    if stage == Stage::GeometryInit {
                        self.excluded.insert(item.image().to_string());
                    }
                    tracing::error!("{}", e);
                    report.failed += 1;
                    report.failures.push(ItemFailure {
                        file: item.file_name(),
                        code: e.code(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "{} finished: {} succeeded, {} failed, {} skipped",
            stage.as_str(),
            report.succeeded,
            report.failed,
            report.skipped
        );
        Ok(report)
    }

    /// Inputs for `stage`, fresh from the directory
    fn discover(&self, stage: Stage) -> Result<Vec<WorkItem>, PipelineError> {
        let suffix = stage.input(self.config.band_split);
        let items =
            naming::scan(self.dir(), suffix).map_err(|e| PipelineError::io(self.dir(), e))?;

        if stage == Stage::Ingest {
            return Ok(items);
        }

        let (kept, stale): (Vec<_>, Vec<_>) =
            items.into_iter().partition(|item| self.in_scope(item));
        for item in &stale {
            tracing::warn!(
                "Ignoring {}: not produced by this run",
                item.path.display()
            );
        }
        Ok(kept)
    }

    fn in_scope(&self, item: &WorkItem) -> bool {
        match self.config.discovery {
            DiscoveryScope::Directory => true,
            DiscoveryScope::Run => self.produced.contains(&item.path),
        }
    }

    async fn process_item(
        &self,
        stage: Stage,
        item: &WorkItem,
        target: &Target,
        map_template: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let invocation = stage.invocation(item, self.dir(), map_template, self.config.spice_mode);
        let before = target
            .snapshot()
            .map_err(|e| PipelineError::io(self.dir(), e))?;
        let output = self.execute(&invocation, &item.path).await?;

        if !output.success() {
            return Err(PipelineError::item(
                &item.path,
                format!("{} failed with {}", invocation.tool, output.failure_reason()),
            ));
        }

        let outputs = target
            .written_since(&before)
            .map_err(|e| PipelineError::io(self.dir(), e))?;
        if outputs.is_empty() {
            if before.is_empty() {
                tracing::warn!(
                    "{} reported success but {} is missing",
                    invocation.tool,
                    target.describe()
                );
            } else {
                tracing::warn!(
                    "{} reported success but left {} untouched",
                    invocation.tool,
                    target.describe()
                );
            }
            return Err(PipelineError::item(
                &item.path,
                format!("expected output missing: {}", target.describe()),
            ));
        }

        for path in &outputs {
            tracing::info!("Created: {}", path.display());
        }
        Ok(outputs)
    }

    /// spiceinit with a single retry in the fallback mode
    async fn init_geometry(&self, item: &WorkItem) -> Result<Vec<PathBuf>, PipelineError> {
        let first = match self.spiceinit(item, self.config.spice_mode).await {
            Ok(()) => return Ok(Vec::new()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => e,
        };

        let Some(fallback) = self.config.spice_fallback else {
            return Err(PipelineError::item(&item.path, first.to_string()));
        };

        tracing::warn!(
            "{}; retrying with {} lookup",
            first,
            fallback.as_str()
        );

        match self.spiceinit(item, fallback).await {
            Ok(()) => Ok(Vec::new()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Err(PipelineError::item(
                &item.path,
                format!("geometry init failed after {} fallback ({})", fallback.as_str(), e),
            )),
        }
    }

    async fn spiceinit(&self, item: &WorkItem, mode: SpiceMode) -> Result<(), PipelineError> {
        let invocation = stage::spiceinit(item, mode);
        let output = self.execute(&invocation, &item.path).await?;

        if output.success() {
            tracing::info!(
                "Geometry attached to {} ({} lookup)",
                item.path.display(),
                mode.as_str()
            );
            Ok(())
        } else {
            Err(PipelineError::RetryableInit {
                path: item.path.clone(),
                reason: format!("{} lookup: {}", mode.as_str(), output.failure_reason()),
            })
        }
    }

    /// Run one command; an unavailable tool is fatal, anything else is an
    /// item failure
    async fn execute(
        &self,
        invocation: &Invocation,
        item: &Path,
    ) -> Result<CommandOutput, PipelineError> {
        tracing::info!("Running: {}", invocation.command_line());

        let output = self.runner.run(invocation).await.map_err(|e| match e {
            RunError::Unavailable { tool, reason } => {
                PipelineError::ToolUnavailable { tool, reason }
            }
            RunError::TimedOut { .. } | RunError::Io { .. } => {
                PipelineError::item(item, e.to_string())
            }
        })?;

        if !output.stdout.trim().is_empty() {
            tracing::debug!("{} stdout:\n{}", invocation.tool, output.stdout.trim_end());
        }
        if !output.stderr.trim().is_empty() {
            tracing::debug!("{} stderr:\n{}", invocation.tool, output.stderr.trim_end());
        }
        tracing::debug!(
            "{} exited with {:?} after {}ms",
            invocation.tool,
            output.exit_code,
            output.elapsed.as_millis()
        );

        Ok(output)
    }

    fn delete_input(&mut self, item: &WorkItem, report: &mut StageReport) {
        match std::fs::remove_file(&item.path) {
            Ok(()) => {
                tracing::info!("Deleted: {}", item.path.display());
                self.produced.remove(&item.path);
                report.deleted += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to delete {}: {}", item.path.display(), e);
            }
        }
    }
}
