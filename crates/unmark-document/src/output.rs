// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output files — finished documents appear at their destination in one step
// or not at all.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use unmark_core::error::{Result, UnmarkError};

/// Write `bytes` to a temporary file next to `path`, then rename it into
/// place. A failure part-way leaves no file at `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let fail = |err| write_error(path, err);
    let mut staged = NamedTempFile::new_in(dir).map_err(fail)?;
    staged.write_all(bytes).map_err(fail)?;
    staged.as_file().sync_all().map_err(fail)?;
    staged.persist(path).map_err(|err| fail(err.error))?;
    Ok(())
}

fn write_error(path: &Path, err: std::io::Error) -> UnmarkError {
    UnmarkError::Write(format!("cannot write {}: {}", path.display(), err))
}
