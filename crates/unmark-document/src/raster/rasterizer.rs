// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterizer — renders each page of a document to an RGB pixel grid.
//
// The production backend is PDFium (via `pdfium-render`). The pipeline only
// depends on the `PageRasterizer` trait so it can run headless in tests.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage, RgbaImage};
use pdfium_render::prelude::*;
use tracing::{debug, info, instrument, warn};
use unmark_core::error::{Result, UnmarkError};

/// Points per inch in PDF user space.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Renders document pages to pixel grids.
pub trait PageRasterizer {
    /// Render every page of `source` at `dpi`, in page order.
    ///
    /// `on_page` receives the zero-based page index and its grid; an error
    /// from it stops rendering. Returns the number of pages rendered.
    fn rasterize(
        &self,
        source: &Path,
        dpi: u32,
        on_page: &mut dyn FnMut(usize, RgbImage) -> Result<()>,
    ) -> Result<usize>;
}

/// File name of the intermediate PNG for a zero-based page index.
pub fn page_file_name(index: usize) -> String {
    format!("page_{:04}.png", index + 1)
}

/// Render `source` into `dir` as one PNG per page.
///
/// Grids are flushed to disk as soon as they are rendered, so only one page is
/// resident at a time. Returns the PNG paths in page order.
#[instrument(skip(rasterizer), fields(source = %source.display(), dir = %dir.display()))]
pub fn rasterize_to_dir(
    rasterizer: &dyn PageRasterizer,
    source: &Path,
    dpi: u32,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let pages = rasterizer.rasterize(source, dpi, &mut |index, grid| {
        let path = dir.join(page_file_name(index));
        grid.save(&path).map_err(|err| {
            UnmarkError::Workspace(format!(
                "cannot store page {} at {}: {}",
                index + 1,
                path.display(),
                err
            ))
        })?;
        debug!(page = index + 1, width = grid.width(), height = grid.height(), "Page stored");
        written.push(path);
        Ok(())
    })?;

    info!(pages, "Document rasterized");
    Ok(written)
}

/// Read a source document; failing to open it is a `Format` error.
pub fn read_document(source: &Path) -> Result<Vec<u8>> {
    std::fs::read(source).map_err(|err| {
        UnmarkError::Format(format!("cannot read {}: {}", source.display(), err))
    })
}

/// Load an intermediate page PNG back into a grid.
pub fn load_page(path: &Path) -> Result<RgbImage> {
    let image = image::open(path).map_err(|err| {
        UnmarkError::Workspace(format!("cannot reload {}: {}", path.display(), err))
    })?;
    Ok(image.to_rgb8())
}

/// PDFium-backed rasterizer.
///
/// PDFium keeps process-wide state, so one instance is bound per run and used
/// from a single thread.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind to the PDFium library.
    ///
    /// Searches `library_dir` (if given), then the current directory, then the
    /// system library path.
    pub fn bind(library_dir: Option<&Path>) -> Result<Self> {
        let mut candidates: Vec<String> = Vec::new();
        if let Some(dir) = library_dir {
            candidates.push(dir.to_string_lossy().into_owned());
        }
        candidates.push("./".to_string());

        let mut found = None;
        for dir in &candidates {
            let library = Pdfium::pdfium_platform_library_name_at_path(dir.as_str());
            match Pdfium::bind_to_library(library) {
                Ok(bindings) => {
                    found = Some(bindings);
                    break;
                }
                Err(err) => debug!(dir = dir.as_str(), ?err, "PDFium not found"),
            }
        }

        let bindings = match found {
            Some(bindings) => bindings,
            None => Pdfium::bind_to_system_library().map_err(|err| UnmarkError::Rendering {
                page: 0,
                reason: format!("failed to load the PDFium library: {:?}", err),
            })?,
        };

        info!("PDFium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    #[instrument(skip(self, on_page), fields(source = %source.display(), dpi))]
    fn rasterize(
        &self,
        source: &Path,
        dpi: u32,
        on_page: &mut dyn FnMut(usize, RgbImage) -> Result<()>,
    ) -> Result<usize> {
        let bytes = read_document(source)?;
        let document = self.pdfium.load_pdf_from_byte_vec(bytes, None).map_err(|err| {
            UnmarkError::Format(format!("PDFium cannot open {}: {:?}", source.display(), err))
        })?;

        let config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);

        let mut rendered = 0;
        for (index, page) in document.pages().iter().enumerate() {
            let bitmap = page.render_with_config(&config).map_err(|err| UnmarkError::Rendering {
                page: index + 1,
                reason: format!("{:?}", err),
            })?;

            let width = bitmap.width() as u32;
            let height = bitmap.height() as u32;
            let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(
                || {
                    warn!(page = index + 1, width, height, "Bitmap size mismatch");
                    UnmarkError::Rendering {
                        page: index + 1,
                        reason: format!("bitmap does not hold {width}x{height} RGBA pixels"),
                    }
                },
            )?;

            on_page(index, DynamicImage::ImageRgba8(rgba).to_rgb8())?;
            rendered += 1;
        }

        Ok(rendered)
    }
}
