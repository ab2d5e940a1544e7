// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// unmark-batch — Turns an input path into a batch of jobs and drives each job
// through an engine inside its own transient workspace.

pub mod discovery;
pub mod engine;
pub mod orchestrator;
pub mod workspace;

pub use discovery::{Batch, Discovery, DiscoveryMode};
pub use engine::{JobEngine, RasterEngine, RewriteEngine};
pub use orchestrator::Orchestrator;
pub use workspace::{Workspace, WorkspaceManager};
