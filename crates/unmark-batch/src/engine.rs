// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engines — the two ways a job turns an input document into a sanitized one.

use std::fs::File;

use tracing::{debug, info, instrument};
use unmark_core::error::{Result, UnmarkError};
use unmark_core::{EngineStats, Job, Mode, UnmarkConfig};
use unmark_document::raster::rasterizer::{load_page, rasterize_to_dir};
use unmark_document::{ColorPolicy, FrameFilter, PageRasterizer, Reassembler, StreamRewriter};

use crate::workspace::Workspace;

/// A per-job processing strategy the orchestrator can drive.
pub trait JobEngine {
    fn mode(&self) -> Mode;

    /// Whether jobs need a scratch workspace.
    fn needs_workspace(&self) -> bool;

    /// Read `job.input` and write the sanitized document to `job.output`.
    fn process(&self, job: &Job, workspace: Option<&Workspace>) -> Result<EngineStats>;
}

// ---------------------------------------------------------------------------
// Fast mode
// ---------------------------------------------------------------------------

/// Content-stream color rewriting.
#[derive(Debug, Clone)]
pub struct RewriteEngine {
    rewriter: StreamRewriter,
}

impl RewriteEngine {
    pub fn new(rewriter: StreamRewriter) -> Self {
        Self { rewriter }
    }

    pub fn from_config(config: &UnmarkConfig) -> Self {
        Self::new(StreamRewriter::from_config(config))
    }
}

impl JobEngine for RewriteEngine {
    fn mode(&self) -> Mode {
        Mode::Fast
    }

    fn needs_workspace(&self) -> bool {
        false
    }

    fn process(&self, job: &Job, _workspace: Option<&Workspace>) -> Result<EngineStats> {
        let stats = self.rewriter.rewrite_file(&job.input, &job.output)?;
        Ok(EngineStats {
            pages: stats.pages,
            replacements: stats.substitutions as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// Slow mode
// ---------------------------------------------------------------------------

/// Rasterize, filter every pixel, reassemble.
pub struct RasterEngine<R> {
    rasterizer: R,
    filter: FrameFilter,
    dpi: u32,
}

impl<R: PageRasterizer> RasterEngine<R> {
    pub fn new(rasterizer: R, policy: ColorPolicy, dpi: u32) -> Self {
        Self {
            rasterizer,
            filter: FrameFilter::new(policy),
            dpi,
        }
    }

    pub fn from_config(rasterizer: R, config: &UnmarkConfig) -> Self {
        let policy = ColorPolicy::raster_from_config(config);
        Self::new(rasterizer, policy, config.dpi)
    }
}

impl<R: PageRasterizer> JobEngine for RasterEngine<R> {
    fn mode(&self) -> Mode {
        Mode::Slow
    }

    fn needs_workspace(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(job = %job.relative.display(), dpi = self.dpi))]
    fn process(&self, job: &Job, workspace: Option<&Workspace>) -> Result<EngineStats> {
        let workspace = workspace.ok_or_else(|| {
            UnmarkError::Workspace("raster engine invoked without a workspace".into())
        })?;
        File::open(&job.input).map_err(|err| {
            UnmarkError::Format(format!("cannot read {}: {}", job.input.display(), err))
        })?;

        let pages = rasterize_to_dir(&self.rasterizer, &job.input, self.dpi, workspace.path())?;
        if pages.is_empty() {
            return Err(UnmarkError::Format(format!(
                "{} has no pages",
                job.input.display()
            )));
        }

        let mut reassembler = Reassembler::new(self.dpi);
        let mut replaced = 0u64;
        for (index, path) in pages.iter().enumerate() {
            let mut grid = load_page(path)?;
            let count = self.filter.apply(&mut grid);
            debug!(page = index + 1, replaced = count, "Page filtered");
            replaced += count;
            reassembler.push_page(&grid)?;
        }

        reassembler.write_to(&job.output)?;
        info!(pages = pages.len(), pixels_replaced = replaced, "Document reassembled");
        Ok(EngineStats {
            pages: pages.len(),
            replacements: replaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use image::{Rgb, RgbImage};
    use unmark_core::RunId;
    use unmark_document::PdfReader;
    use unmark_document::test_support::pdf_with_pages;

    use super::*;
    use crate::workspace::WorkspaceManager;

    /// Two 4x2 pages: a yellow highlight pixel and a near-black text pixel on
    /// white.
    struct Highlighted;

    impl PageRasterizer for Highlighted {
        fn rasterize(
            &self,
            _source: &Path,
            _dpi: u32,
            on_page: &mut dyn FnMut(usize, RgbImage) -> Result<()>,
        ) -> Result<usize> {
            for index in 0..2 {
                let mut grid = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
                grid.put_pixel(0, 0, Rgb([255, 255, 0]));
                grid.put_pixel(1, 0, Rgb([10, 10, 10]));
                on_page(index, grid)?;
            }
            Ok(2)
        }
    }

    struct Empty;

    impl PageRasterizer for Empty {
        fn rasterize(
            &self,
            _source: &Path,
            _dpi: u32,
            _on_page: &mut dyn FnMut(usize, RgbImage) -> Result<()>,
        ) -> Result<usize> {
            Ok(0)
        }
    }

    fn job(dir: &Path) -> Job {
        Job::new(
            dir.join("in.pdf"),
            dir.join("out.pdf"),
            PathBuf::from("in.pdf"),
        )
    }

    #[test]
    fn rewrite_engine_reports_substitutions() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        let pdf = pdf_with_pages(&[b"1 1 0 rg 0 0 5 5 re f 1 1 0 RG" as &[u8]]);
        std::fs::write(&job.input, pdf).unwrap();

        let engine = RewriteEngine::from_config(&UnmarkConfig::default());
        assert!(!engine.needs_workspace());
        let stats = engine.process(&job, None).unwrap();
        assert_eq!(
            stats,
            EngineStats {
                pages: 1,
                replacements: 2
            }
        );

        let out = PdfReader::open(&job.output).unwrap();
        let content = out.page_content(1).unwrap();
        assert_eq!(
            String::from_utf8_lossy(&content).trim(),
            "1 1 1 rg 0 0 5 5 re f 1 1 1 RG"
        );
    }

    #[test]
    fn raster_engine_filters_and_reassembles() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        std::fs::write(&job.input, b"stand-in").unwrap();
        let manager = WorkspaceManager::new(dir.path(), RunId::new());
        let ws = manager.acquire(&job.relative).unwrap();

        let engine = RasterEngine::new(Highlighted, ColorPolicy::distance(100.0), 72);
        let stats = engine.process(&job, Some(&ws)).unwrap();
        assert_eq!(
            stats,
            EngineStats {
                pages: 2,
                replacements: 2
            }
        );

        let out = PdfReader::open(&job.output).unwrap();
        assert_eq!(out.page_count(), 2);
        let image = &out.page_images(1).unwrap()[0];
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([10, 10, 10]));
    }

    #[test]
    fn raster_engine_requires_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let engine = RasterEngine::new(Highlighted, ColorPolicy::distance(100.0), 72);
        let err = engine.process(&job(dir.path()), None).unwrap_err();
        assert!(matches!(err, UnmarkError::Workspace(_)));
    }

    #[test]
    fn zero_page_document_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path(), RunId::new());
        let job = job(dir.path());
        std::fs::write(&job.input, b"stand-in").unwrap();
        let ws = manager.acquire(&job.relative).unwrap();

        let engine = RasterEngine::new(Empty, ColorPolicy::distance(100.0), 72);
        let err = engine.process(&job, Some(&ws)).unwrap_err();
        assert!(matches!(err, UnmarkError::Format(_)));
        assert!(!job.output.exists());
    }

    #[test]
    fn missing_input_is_format_error_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path(), RunId::new());
        let job = job(dir.path());
        let ws = manager.acquire(&job.relative).unwrap();

        let engine = RasterEngine::new(Highlighted, ColorPolicy::distance(100.0), 72);
        let err = engine.process(&job, Some(&ws)).unwrap_err();
        assert!(matches!(err, UnmarkError::Format(_)), "{err}");
        assert_eq!(std::fs::read_dir(ws.path()).unwrap().count(), 0);
        assert!(!job.output.exists());
    }
}
