// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job discovery — enumerate input documents and derive each job's relative
// identity and mirrored output path.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use unmark_core::error::{Result, UnmarkError};
use unmark_core::{Job, UnmarkConfig};
use walkdir::WalkDir;

/// How the input was enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMode {
    SingleFile,
    /// Files directly inside a directory.
    Flat,
    Recursive,
}

/// The jobs found for one run.
#[derive(Debug, Clone)]
pub struct Batch {
    /// The file or directory the user pointed at.
    pub input: PathBuf,
    pub mode: DiscoveryMode,
    /// Root directory every output path lives under.
    pub output_root: PathBuf,
    pub jobs: Vec<Job>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Finds documents by extension and maps them to output paths.
#[derive(Debug, Clone)]
pub struct Discovery {
    extension: String,
    prefix: String,
    output_dir_name: String,
}

impl Discovery {
    pub fn new(
        extension: impl Into<String>,
        prefix: impl Into<String>,
        output_dir_name: impl Into<String>,
    ) -> Self {
        let extension: String = extension.into();
        Self {
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
            prefix: prefix.into(),
            output_dir_name: output_dir_name.into(),
        }
    }

    pub fn from_config(config: &UnmarkConfig) -> Self {
        Self::new(
            config.bare_extension(),
            config.output_prefix.as_str(),
            config.output_dir_name.as_str(),
        )
    }

    /// Build the batch for `input`.
    ///
    /// A file yields one job. A directory yields every matching file directly
    /// inside it, or anywhere below it when `recursive` is set. Without an
    /// explicit `output_root` the output goes to `<dir>/<output_dir_name>`,
    /// where `<dir>` is the input directory or the file's parent.
    #[instrument(skip(self), fields(input = %input.display(), recursive))]
    pub fn discover(
        &self,
        input: &Path,
        output_root: Option<&Path>,
        recursive: bool,
    ) -> Result<Batch> {
        if !input.exists() {
            return Err(UnmarkError::InvalidInput(format!(
                "{} does not exist",
                input.display()
            )));
        }

        let base = if input.is_dir() {
            input.to_path_buf()
        } else {
            input.parent().map(Path::to_path_buf).unwrap_or_default()
        };
        let output_root = output_root
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base.join(&self.output_dir_name));

        let mode = match (input.is_dir(), recursive) {
            (false, _) => DiscoveryMode::SingleFile,
            (true, false) => DiscoveryMode::Flat,
            (true, true) => DiscoveryMode::Recursive,
        };
        let jobs = match mode {
            DiscoveryMode::SingleFile => vec![self.single_file(input, &output_root)?],
            DiscoveryMode::Flat => self.walk(input, &output_root, 1)?,
            DiscoveryMode::Recursive => self.walk(input, &output_root, usize::MAX)?,
        };

        if jobs.is_empty() {
            return Err(UnmarkError::NoDocuments(input.to_path_buf()));
        }

        info!(
            jobs = jobs.len(),
            ?mode,
            output_root = %output_root.display(),
            "Discovery complete"
        );
        Ok(Batch {
            input: input.to_path_buf(),
            mode,
            output_root,
            jobs,
        })
    }

    /// Whether `path` carries the document extension (case-insensitive).
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    /// `output_root / parent(relative) / (prefix + file name)`.
    pub fn output_path_for(&self, output_root: &Path, relative: &Path) -> PathBuf {
        let file_name = relative
            .file_name()
            .map(|name| format!("{}{}", self.prefix, name.to_string_lossy()))
            .unwrap_or_else(|| self.prefix.clone());
        match relative.parent() {
            Some(parent) => output_root.join(parent).join(file_name),
            None => output_root.join(file_name),
        }
    }

    fn single_file(&self, input: &Path, output_root: &Path) -> Result<Job> {
        if !self.matches(input) {
            return Err(UnmarkError::InvalidInput(format!(
                "{} is not a .{} document",
                input.display(),
                self.extension
            )));
        }
        let relative = PathBuf::from(input.file_name().ok_or_else(|| {
            UnmarkError::InvalidInput(format!("{} has no file name", input.display()))
        })?);
        let output = self.output_path_for(output_root, &relative);
        Ok(Job::new(input.to_path_buf(), output, relative))
    }

    fn walk(&self, root: &Path, output_root: &Path, max_depth: usize) -> Result<Vec<Job>> {
        // Keep re-runs from picking up their own output.
        let skip = output_root.canonicalize().ok();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && skip.is_some()
                    && entry.path().canonicalize().ok() == skip)
            });

        let mut jobs = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| UnmarkError::Discovery {
                path: err.path().unwrap_or(root).to_path_buf(),
                reason: err.to_string(),
            })?;
            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|err| UnmarkError::Discovery {
                    path: entry.path().to_path_buf(),
                    reason: err.to_string(),
                })?
                .to_path_buf();
            let output = self.output_path_for(output_root, &relative);
            debug!(relative = %relative.display(), "Job discovered");
            jobs.push(Job::new(entry.into_path(), output, relative));
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> Discovery {
        Discovery::new("pdf", "processed_", "processed_PDFs")
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"%PDF-1.5").unwrap();
    }

    #[test]
    fn recursive_walk_mirrors_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        touch(&root.join("a.pdf"));
        touch(&root.join("sub/b.pdf"));
        touch(&root.join("sub/notes.txt"));
        let out = dir.path().join("out");

        let batch = discovery().discover(&root, Some(&out), true).unwrap();
        assert_eq!(batch.mode, DiscoveryMode::Recursive);
        let relatives: Vec<_> = batch.jobs.iter().map(|j| j.relative.clone()).collect();
        assert_eq!(
            relatives,
            [PathBuf::from("a.pdf"), PathBuf::from("sub/b.pdf")]
        );
        assert_eq!(batch.jobs[0].output, out.join("processed_a.pdf"));
        assert_eq!(batch.jobs[1].output, out.join("sub/processed_b.pdf"));
    }

    #[test]
    fn flat_folder_ignores_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.PDF"));
        touch(&dir.path().join("sub/b.pdf"));

        let batch = discovery().discover(dir.path(), None, false).unwrap();
        assert_eq!(batch.mode, DiscoveryMode::Flat);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.jobs[0].relative, PathBuf::from("a.PDF"));
        assert_eq!(batch.output_root, dir.path().join("processed_PDFs"));
        assert_eq!(
            batch.jobs[0].output,
            dir.path().join("processed_PDFs/processed_a.PDF")
        );
    }

    #[test]
    fn default_output_root_is_not_rediscovered() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.pdf"));
        touch(&dir.path().join("processed_PDFs/processed_a.pdf"));

        let batch = discovery().discover(dir.path(), None, true).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.jobs[0].relative, PathBuf::from("a.pdf"));
    }

    #[test]
    fn single_file_identity_is_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("deep/report.pdf");
        touch(&file);

        let batch = discovery().discover(&file, None, true).unwrap();
        assert_eq!(batch.mode, DiscoveryMode::SingleFile);
        assert_eq!(batch.jobs.len(), 1);
        assert_eq!(batch.jobs[0].relative, PathBuf::from("report.pdf"));
        assert_eq!(
            batch.jobs[0].output,
            dir.path().join("deep/processed_PDFs/processed_report.pdf")
        );
    }

    #[test]
    fn wrong_extension_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"hi").unwrap();
        let err = discovery().discover(&file, None, false).unwrap_err();
        assert!(matches!(err, UnmarkError::InvalidInput(_)), "{err}");
    }

    #[test]
    fn missing_root_and_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = discovery().discover(&missing, None, true).unwrap_err();
        assert!(matches!(err, UnmarkError::InvalidInput(_)));

        touch(&dir.path().join("readme.md"));
        let err = discovery().discover(dir.path(), None, true).unwrap_err();
        assert!(matches!(err, UnmarkError::NoDocuments(_)));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_stops_discovery() {
        use std::fs::{self, Permissions};
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.pdf"));
        let locked = dir.path().join("locked");
        touch(&locked.join("b.pdf"));
        fs::set_permissions(&locked, Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through permission bits; nothing to observe.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = discovery().discover(dir.path(), None, true);
        fs::set_permissions(&locked, Permissions::from_mode(0o755)).unwrap();

        let err = result.unwrap_err();
        assert!(matches!(err, UnmarkError::Discovery { .. }), "{err}");
        assert!(err.is_pre_batch());
    }

    #[test]
    fn extension_config_is_normalised() {
        let d = Discovery::new(".PDF", "x_", "out");
        assert!(d.matches(Path::new("a.pdf")));
        assert!(d.matches(Path::new("a.Pdf")));
        assert!(!d.matches(Path::new("a.pdfx")));
        assert!(!d.matches(Path::new("pdf")));
    }
}
