// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Unmark.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Unmark operations.
#[derive(Debug, Error)]
pub enum UnmarkError {
    // -- Input errors (batch does not start) --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid mode {0:?} (expected \"fast\" or \"slow\")")]
    InvalidMode(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no matching documents found under {}", .0.display())]
    NoDocuments(PathBuf),

    // -- Discovery errors (batch does not start) --
    #[error("cannot read directory {}: {reason}", path.display())]
    Discovery { path: PathBuf, reason: String },

    // -- Per-job errors --
    #[error("page {page} could not be rasterized: {reason}")]
    Rendering { page: usize, reason: String },

    #[error("document could not be parsed: {0}")]
    Format(String),

    #[error("cannot write output: {0}")]
    Write(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("engine panicked: {0}")]
    Panicked(String),

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which stage of the pipeline an error belongs to.
///
/// Carried into every failed job outcome so the batch summary can say where a
/// job broke, not only that it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Input,
    Discovery,
    Workspace,
    Rendering,
    Format,
    Write,
    Internal,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Input => "input",
            Self::Discovery => "discovery",
            Self::Workspace => "workspace",
            Self::Rendering => "rendering",
            Self::Format => "format",
            Self::Write => "write",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl UnmarkError {
    /// Classify this error into its pipeline stage.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidMode(_)
            | Self::Config(_)
            | Self::NoDocuments(_)
            | Self::Serialization(_) => Stage::Input,
            Self::Discovery { .. } => Stage::Discovery,
            Self::Rendering { .. } => Stage::Rendering,
            Self::Format(_) => Stage::Format,
            Self::Write(_) | Self::Io(_) => Stage::Write,
            Self::Workspace(_) => Stage::Workspace,
            Self::Panicked(_) => Stage::Internal,
        }
    }

    /// Errors that end the run before any job is dispatched.
    pub fn is_pre_batch(&self) -> bool {
        matches!(self.stage(), Stage::Input | Stage::Discovery)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, UnmarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_job_errors_map_to_their_stage() {
        let rendering = UnmarkError::Rendering {
            page: 3,
            reason: "bad".into(),
        };
        assert_eq!(rendering.stage(), Stage::Rendering);
        assert_eq!(UnmarkError::Format("x".into()).stage(), Stage::Format);
        assert_eq!(UnmarkError::Write("x".into()).stage(), Stage::Write);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(UnmarkError::from(io).stage(), Stage::Write);
    }

    #[test]
    fn input_and_discovery_errors_stop_the_batch() {
        assert!(UnmarkError::NoDocuments(PathBuf::from("/x")).is_pre_batch());
        assert!(UnmarkError::InvalidMode("medium".into()).is_pre_batch());
        let discovery = UnmarkError::Discovery {
            path: PathBuf::from("/x"),
            reason: "denied".into(),
        };
        assert!(discovery.is_pre_batch());
        assert!(!UnmarkError::Format("x".into()).is_pre_batch());
    }

    #[test]
    fn stage_serializes_lowercase() {
        let json = serde_json::to_string(&Stage::Format).unwrap();
        assert_eq!(json, "\"format\"");
    }
}
