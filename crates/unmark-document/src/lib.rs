// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// unmark-document — Document processing for Unmark.
//
// Provides the color classifier shared by both engines, the raster pipeline
// (rasterize, filter, reassemble) and the structural content-stream rewriter.

pub mod classify;
pub mod output;
pub mod pdf;
pub mod raster;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-export the primary structs so callers can use `unmark_document::StreamRewriter` etc.
pub use classify::ColorPolicy;
pub use pdf::reader::PdfReader;
pub use pdf::rewriter::{RewriteStats, StreamRewriter};
pub use raster::filter::FrameFilter;
pub use raster::rasterizer::{PageRasterizer, PdfiumRasterizer};
pub use raster::reassemble::Reassembler;
