// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch orchestrator — runs every job of a batch through one engine, isolates
// failures per job and collects the report.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{error, info, instrument, warn};
use unmark_core::error::{Result, UnmarkError};
use unmark_core::{
    BatchReport, EngineStats, Job, JobOutcome, JobStatus, OverwritePolicy, RunId, UnmarkConfig,
};

use crate::discovery::Batch;
use crate::engine::JobEngine;
use crate::workspace::WorkspaceManager;

/// Drives a batch through an engine.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    run_id: RunId,
    workspaces: WorkspaceManager,
    overwrite: OverwritePolicy,
}

enum Completion {
    Done(EngineStats),
    Skipped(String),
}

impl Orchestrator {
    pub fn new(config: &UnmarkConfig) -> Self {
        let run_id = RunId::new();
        Self {
            run_id,
            workspaces: WorkspaceManager::new(&config.scratch_root(), run_id),
            overwrite: config.overwrite,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run every job in discovery order, one at a time.
    #[instrument(skip_all, fields(run = %self.run_id, jobs = batch.len(), mode = %engine.mode()))]
    pub fn run(&self, batch: &Batch, engine: &dyn JobEngine) -> BatchReport {
        let started_at = Utc::now();
        let outcomes = batch
            .jobs
            .iter()
            .map(|job| self.run_job(job, engine))
            .collect();
        self.report(batch, engine, started_at, outcomes)
    }

    /// Run jobs on a pool of `workers` threads.
    ///
    /// Outcomes keep discovery order. Falls back to [`Orchestrator::run`] when
    /// one worker is requested or the pool cannot be built.
    #[instrument(skip_all, fields(run = %self.run_id, jobs = batch.len(), workers))]
    pub fn run_parallel(
        &self,
        batch: &Batch,
        engine: &(dyn JobEngine + Sync),
        workers: usize,
    ) -> BatchReport {
        if workers <= 1 {
            return self.run(batch, engine);
        }
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool,
            Err(err) => {
                warn!("Cannot build worker pool, running sequentially: {}", err);
                return self.run(batch, engine);
            }
        };

        let started_at = Utc::now();
        let outcomes = pool.install(|| {
            batch
                .jobs
                .par_iter()
                .map(|job| self.run_job(job, engine))
                .collect()
        });
        self.report(batch, engine, started_at, outcomes)
    }

    fn report(
        &self,
        batch: &Batch,
        engine: &dyn JobEngine,
        started_at: chrono::DateTime<Utc>,
        outcomes: Vec<JobOutcome>,
    ) -> BatchReport {
        if engine.needs_workspace() {
            if let Some(warning) = self.workspaces.finish() {
                warn!("Scratch root left behind: {}", warning);
            }
        }

        let report = BatchReport {
            run_id: self.run_id,
            mode: engine.mode(),
            output_root: batch.output_root.clone(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Batch complete"
        );
        report
    }

    /// Run one job; never fails, the outcome carries what went wrong.
    fn run_job(&self, job: &Job, engine: &dyn JobEngine) -> JobOutcome {
        let started = Instant::now();
        let mut warnings = Vec::new();
        let result = self.execute(job, engine, &mut warnings);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (status, stats) = match result {
            Ok(Completion::Done(stats)) => {
                info!(
                    job = %job.relative.display(),
                    pages = stats.pages,
                    elapsed_ms,
                    "Job succeeded"
                );
                (JobStatus::Succeeded, Some(stats))
            }
            Ok(Completion::Skipped(reason)) => {
                info!(job = %job.relative.display(), "Job skipped: {}", reason);
                (JobStatus::Skipped { reason }, None)
            }
            Err(err) => {
                error!(job = %job.relative.display(), stage = %err.stage(), "Job failed: {}", err);
                (
                    JobStatus::Failed {
                        stage: err.stage(),
                        reason: err.to_string(),
                    },
                    None,
                )
            }
        };

        JobOutcome {
            relative: job.relative.clone(),
            output: job.output.clone(),
            status,
            stats,
            warnings,
            elapsed_ms,
        }
    }

    fn execute(
        &self,
        job: &Job,
        engine: &dyn JobEngine,
        warnings: &mut Vec<String>,
    ) -> Result<Completion> {
        if self.overwrite == OverwritePolicy::Skip && job.output.exists() {
            return Ok(Completion::Skipped(format!(
                "{} already exists",
                job.output.display()
            )));
        }
        if let Some(parent) = job.output.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                UnmarkError::Write(format!("cannot create {}: {}", parent.display(), err))
            })?;
        }

        let workspace = if engine.needs_workspace() {
            Some(self.workspaces.acquire(&job.relative)?)
        } else {
            None
        };

        let result =
            panic::catch_unwind(AssertUnwindSafe(|| engine.process(job, workspace.as_ref())));

        if let Some(warning) = workspace.and_then(|workspace| workspace.release()) {
            warnings.push(warning);
        }

        match result {
            Ok(stats) => stats.map(Completion::Done),
            Err(payload) => Err(UnmarkError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "engine panicked".to_string()
    }
}
