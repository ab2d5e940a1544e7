// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stream rewriter — substitutes exact color-setting tokens inside page content
// streams without rasterizing. Everything that is not a matching token is
// left as it was.

use std::collections::BTreeSet;
use std::path::Path;

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info, instrument};
use unmark_core::error::{Result, UnmarkError};
use unmark_core::{Rgb, UnmarkConfig};

use crate::classify::ColorPolicy;
use crate::output::write_atomic;
use crate::raster::reassemble::deflate;

/// Render a channel as a PDF number in 0..=1: `0`, `1`, or up to three
/// decimals with trailing zeros trimmed.
pub fn pdf_number(channel: u8) -> String {
    match channel {
        0 => "0".to_string(),
        255 => "1".to_string(),
        value => {
            let text = format!("{:.3}", value as f64 / 255.0);
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        }
    }
}

/// The byte form of `r g b <operator>`, e.g. `1 1 0 rg`.
pub fn color_token(color: Rgb, operator: &str) -> Vec<u8> {
    let [r, g, b] = color.0.map(pdf_number);
    format!("{r} {g} {b} {operator}").into_bytes()
}

/// One find/replace pair of encoded tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub find: Vec<u8>,
    pub replace: Vec<u8>,
}

impl Substitution {
    pub fn new(find: impl Into<Vec<u8>>, replace: impl Into<Vec<u8>>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }

    /// Fill (`rg`) and stroke (`RG`) substitutions for a color pair.
    pub fn for_colors(target: Rgb, replacement: Rgb) -> Vec<Self> {
        ["rg", "RG"]
            .into_iter()
            .map(|op| Self::new(color_token(target, op), color_token(replacement, op)))
            .collect()
    }
}

/// PDF whitespace or delimiter: a token may only start or end next to one.
fn is_token_boundary(byte: u8) -> bool {
    matches!(
        byte,
        b'\0'
            | b'\t'
            | b'\n'
            | b'\x0C'
            | b'\r'
            | b' '
            | b'('
            | b')'
            | b'<'
            | b'>'
            | b'['
            | b']'
            | b'{'
            | b'}'
            | b'/'
            | b'%'
    )
}

/// Index just past the `)` that closes the literal string opening at `start`.
///
/// Backslash escapes are skipped and unescaped parentheses nest. An
/// unterminated string runs to the end of the content.
fn literal_string_end(content: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < content.len() {
        match content[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    content.len()
}

/// Index of the end-of-line that terminates the comment starting at `start`.
fn comment_end(content: &[u8], start: usize) -> usize {
    content[start..]
        .iter()
        .position(|byte| matches!(byte, b'\n' | b'\r'))
        .map_or(content.len(), |offset| start + offset)
}

/// Replace every boundary-aligned occurrence of each `find` in `content`.
///
/// Literal strings and comments are copied through unchanged. Returns `None`
/// when nothing matched so the caller can leave the stream untouched.
pub fn substitute_tokens(
    content: &[u8],
    substitutions: &[Substitution],
) -> Option<(Vec<u8>, usize)> {
    let mut output = Vec::with_capacity(content.len());
    let mut count = 0;
    let mut i = 0;

    'scan: while i < content.len() {
        let skip_to = match content[i] {
            b'(' => Some(literal_string_end(content, i)),
            b'%' => Some(comment_end(content, i)),
            _ => None,
        };
        if let Some(end) = skip_to {
            output.extend_from_slice(&content[i..end]);
            i = end;
            continue;
        }

        if i == 0 || is_token_boundary(content[i - 1]) {
            for sub in substitutions {
                let end = i + sub.find.len();
                if !sub.find.is_empty()
                    && content[i..].starts_with(&sub.find)
                    && (end == content.len() || is_token_boundary(content[end]))
                {
                    output.extend_from_slice(&sub.replace);
                    count += 1;
                    i = end;
                    continue 'scan;
                }
            }
        }
        output.push(content[i]);
        i += 1;
    }

    (count > 0).then_some((output, count))
}

/// Counters for one rewritten document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub pages: usize,
    pub streams_scanned: usize,
    pub streams_changed: usize,
    pub substitutions: usize,
}

/// Exact-match color rewriter over content streams.
#[derive(Debug, Clone)]
pub struct StreamRewriter {
    substitutions: Vec<Substitution>,
    rewrite_form_xobjects: bool,
}

impl StreamRewriter {
    /// Rewriter replacing `target` fill and stroke colors with `replacement`.
    pub fn new(target: Rgb, replacement: Rgb) -> Self {
        Self {
            substitutions: Substitution::for_colors(target, replacement),
            rewrite_form_xobjects: true,
        }
    }

    /// Build from an exact-match policy; a distance policy has no token form.
    pub fn from_policy(policy: ColorPolicy) -> Result<Self> {
        match policy {
            ColorPolicy::ExactMatch { target, replacement } => Ok(Self::new(target, replacement)),
            ColorPolicy::DistanceFromBlack { .. } => Err(UnmarkError::Config(
                "the stream rewriter needs an exact-match color policy".into(),
            )),
        }
    }

    pub fn from_config(config: &UnmarkConfig) -> Self {
        Self::new(config.target_color, config.replacement_color)
            .with_form_xobjects(config.rewrite_form_xobjects)
    }

    pub fn with_form_xobjects(mut self, enabled: bool) -> Self {
        self.rewrite_form_xobjects = enabled;
        self
    }

    /// Add another encoding to look for, e.g. `1.0 1.0 0.0 rg`.
    pub fn with_substitution(mut self, substitution: Substitution) -> Self {
        self.substitutions.push(substitution);
        self
    }

    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    /// Rewrite an in-memory PDF.
    ///
    /// When nothing matches the input bytes are returned as-is, which makes a
    /// second pass over the output byte-identical.
    #[instrument(skip_all, fields(bytes_len = input.len()))]
    pub fn rewrite_bytes(&self, input: &[u8]) -> Result<(Vec<u8>, RewriteStats)> {
        let mut document = Document::load_mem(input)
            .map_err(|err| UnmarkError::Format(format!("failed to parse PDF: {}", err)))?;

        let stream_ids = self.target_streams(&document);
        let mut stats = RewriteStats {
            pages: document.get_pages().len(),
            ..Default::default()
        };

        for id in stream_ids {
            stats.streams_scanned += 1;
            if let Some(replaced) = self.rewrite_stream(&mut document, id)? {
                stats.streams_changed += 1;
                stats.substitutions += replaced;
            }
        }

        if stats.substitutions == 0 {
            debug!(streams = stats.streams_scanned, "No target tokens found");
            return Ok((input.to_vec(), stats));
        }

        let mut output = Vec::new();
        document.save_to(&mut output).map_err(|err| {
            UnmarkError::Write(format!("failed to serialise rewritten PDF: {}", err))
        })?;
        Ok((output, stats))
    }

    /// Rewrite `input` into `output`.
    #[instrument(skip(self), fields(input = %input.display(), output = %output.display()))]
    pub fn rewrite_file(&self, input: &Path, output: &Path) -> Result<RewriteStats> {
        let bytes = std::fs::read(input).map_err(|err| {
            UnmarkError::Format(format!("cannot read {}: {}", input.display(), err))
        })?;
        let (rewritten, stats) = self.rewrite_bytes(&bytes)?;
        write_atomic(output, &rewritten)?;

        info!(
            pages = stats.pages,
            substitutions = stats.substitutions,
            streams_changed = stats.streams_changed,
            "Content streams rewritten"
        );
        Ok(stats)
    }

    /// Page content streams plus, optionally, every Form XObject stream.
    fn target_streams(&self, document: &Document) -> BTreeSet<ObjectId> {
        let mut ids: BTreeSet<ObjectId> = document
            .get_pages()
            .values()
            .flat_map(|page_id| document.get_page_contents(*page_id))
            .collect();

        if self.rewrite_form_xobjects {
            ids.extend(
                document
                    .objects
                    .iter()
                    .filter(|(_, object)| is_form_xobject(object))
                    .map(|(id, _)| *id),
            );
        }
        ids
    }

    /// Substitute inside one stream. `Some(count)` only when it changed.
    fn rewrite_stream(&self, document: &mut Document, id: ObjectId) -> Result<Option<usize>> {
        let stream = match document.get_object_mut(id) {
            Ok(Object::Stream(stream)) => stream,
            Ok(_) => {
                debug!(?id, "Content entry is not a stream, skipped");
                return Ok(None);
            }
            Err(err) => {
                return Err(UnmarkError::Format(format!(
                    "content stream {:?}: {}",
                    id, err
                )));
            }
        };

        let encoded = stream.dict.has(b"Filter");
        let plain = if encoded {
            stream.decompressed_content().map_err(|err| {
                UnmarkError::Format(format!("cannot decode content stream {:?}: {}", id, err))
            })?
        } else {
            stream.content.clone()
        };

        let Some((rewritten, count)) = substitute_tokens(&plain, &self.substitutions) else {
            return Ok(None);
        };

        if is_flate_only(stream.dict.get(b"Filter").ok()) {
            let packed = deflate(&rewritten)?;
            stream.dict.remove(b"DecodeParms");
            stream.dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
            stream.set_content(packed);
        } else {
            stream.set_plain_content(rewritten);
        }

        debug!(?id, count, "Stream rewritten");
        Ok(Some(count))
    }
}

fn is_form_xobject(object: &Object) -> bool {
    match object {
        Object::Stream(stream) => {
            matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Form")
        }
        _ => false,
    }
}

fn is_flate_only(filter: Option<&Object>) -> bool {
    match filter {
        Some(Object::Name(name)) => name == b"FlateDecode",
        Some(Object::Array(items)) => {
            matches!(items.as_slice(), [Object::Name(name)] if name == b"FlateDecode")
        }
        _ => false,
    }
}
