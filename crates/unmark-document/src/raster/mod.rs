// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster pipeline — render pages to pixel grids, whiten highlight pixels, and
// reassemble the grids into an image-only PDF.

pub mod filter;
pub mod rasterizer;
pub mod reassemble;

pub use filter::FrameFilter;
pub use rasterizer::{PageRasterizer, PdfiumRasterizer};
pub use reassemble::Reassembler;
