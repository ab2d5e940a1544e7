// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UnmarkError};
use crate::types::{Mode, OverwritePolicy, Rgb};

/// Highest rasterization resolution accepted.
pub const MAX_DPI: u32 = 1200;

/// Settings for one batch run.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnmarkConfig {
    /// Which engine runs the batch.
    pub mode: Mode,
    /// Rasterization resolution for the slow engine (dots per inch).
    pub dpi: u32,
    /// Euclidean distance from black within which a pixel counts as ink.
    pub black_threshold: f64,
    /// Color the fast engine looks for.
    pub target_color: Rgb,
    /// Color the fast engine substitutes.
    pub replacement_color: Rgb,
    /// Document extension matched during discovery (case-insensitive).
    pub extension: String,
    /// Prefix prepended to every output file name.
    pub output_prefix: String,
    /// Name of the output directory created next to the input when no
    /// explicit output root is given.
    pub output_dir_name: String,
    /// Jobs run concurrently (1 = strictly sequential).
    pub workers: usize,
    /// Behaviour when an output file is already present.
    pub overwrite: OverwritePolicy,
    /// Also rewrite Form XObject streams, not only page content streams.
    pub rewrite_form_xobjects: bool,
    /// Parent directory for per-job workspaces (system temp dir if unset).
    pub scratch_dir: Option<PathBuf>,
    /// Directory holding the PDFium shared library, tried before `./` and
    /// the system search path.
    pub pdfium_library_dir: Option<PathBuf>,
}

impl Default for UnmarkConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Fast,
            dpi: 300,
            black_threshold: 100.0,
            target_color: Rgb::YELLOW,
            replacement_color: Rgb::WHITE,
            extension: "pdf".into(),
            output_prefix: "processed_".into(),
            output_dir_name: "processed_PDFs".into(),
            workers: 1,
            overwrite: OverwritePolicy::Replace,
            rewrite_form_xobjects: true,
            scratch_dir: None,
            pdfium_library_dir: None,
        }
    }
}

impl UnmarkConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            UnmarkError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no engine can honour.
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 || self.dpi > MAX_DPI {
            return Err(UnmarkError::Config(format!(
                "dpi must be between 1 and {MAX_DPI}, got {}",
                self.dpi
            )));
        }
        if !self.black_threshold.is_finite() || self.black_threshold < 0.0 {
            return Err(UnmarkError::Config(format!(
                "black_threshold must be a non-negative number, got {}",
                self.black_threshold
            )));
        }
        if self.workers == 0 {
            return Err(UnmarkError::Config("workers must be at least 1".into()));
        }
        if self.target_color == self.replacement_color {
            return Err(UnmarkError::Config(format!(
                "target and replacement colors are both {}",
                self.target_color
            )));
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(UnmarkError::Config("extension must not be empty".into()));
        }
        Ok(())
    }

    /// The extension without a leading dot.
    pub fn bare_extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }

    /// Where workspaces are created.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
