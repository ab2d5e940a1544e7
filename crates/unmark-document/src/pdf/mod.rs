// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — inspecting documents and rewriting their content streams.

pub mod reader;
pub mod rewriter;

pub use reader::PdfReader;
pub use rewriter::StreamRewriter;
