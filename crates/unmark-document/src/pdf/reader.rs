// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspection — page counts, MediaBoxes, decoded content and the image
// XObjects a page draws.

use std::fs;
use std::path::Path;

use image::RgbImage;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, instrument};
use unmark_core::error::{Result, UnmarkError};

/// Read-only view over a parsed PDF, used to count pages before and after
/// processing and to look inside reassembled output.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Parse the document at `path`. Unreadable and unparseable files are
    /// both `Format` errors.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| {
            UnmarkError::Format(format!("cannot read {}: {}", path.display(), err))
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| UnmarkError::Format(format!("not a readable PDF: {}", err)))?;
        debug!(pages = document.get_pages().len(), bytes = data.len(), "PDF parsed");
        Ok(Self { document })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Decoded, concatenated content streams of a page (1-indexed).
    pub fn page_content(&self, page_number: u32) -> Result<Vec<u8>> {
        let page_id = self.page_id(page_number)?;
        self.document.get_page_content(page_id).map_err(|err| {
            UnmarkError::Format(format!("cannot decode content of page {}: {}", page_number, err))
        })
    }

    /// Page MediaBox as `[llx, lly, urx, ury]`, following inherited values.
    pub fn media_box(&self, page_number: u32) -> Result<[f32; 4]> {
        let page_id = self.page_id(page_number)?;
        let mut node = self.document.get_dictionary(page_id).map_err(|err| {
            UnmarkError::Format(format!("page {} is not a dictionary: {}", page_number, err))
        })?;

        loop {
            if let Ok(value) = node.get(b"MediaBox") {
                let values = match self.resolve(value)? {
                    Object::Array(items) => items
                        .iter()
                        .map(number)
                        .collect::<Option<Vec<f32>>>()
                        .unwrap_or_default(),
                    _ => Vec::new(),
                };
                return match values.as_slice() {
                    [a, b, c, d] => Ok([*a, *b, *c, *d]),
                    _ => Err(UnmarkError::Format(format!(
                        "page {} has a malformed MediaBox",
                        page_number
                    ))),
                };
            }
            node = match node.get(b"Parent") {
                Ok(Object::Reference(parent)) => self.document.get_dictionary(*parent).map_err(
                    |err| UnmarkError::Format(format!("broken page tree: {}", err)),
                )?,
                _ => {
                    return Err(UnmarkError::Format(format!(
                        "page {} has no MediaBox",
                        page_number
                    )));
                }
            };
        }
    }

    /// `(width, height)` of every image XObject a page references.
    pub fn page_image_dimensions(&self, page_number: u32) -> Result<Vec<(u32, u32)>> {
        Ok(self
            .page_image_streams(page_number)?
            .into_iter()
            .map(|(_, dict)| image_size(dict))
            .collect())
    }

    /// Decode every 8-bit DeviceRGB image XObject a page references.
    pub fn page_images(&self, page_number: u32) -> Result<Vec<RgbImage>> {
        let mut images = Vec::new();
        for (id, dict) in self.page_image_streams(page_number)? {
            let (width, height) = image_size(dict);
            let stream = self
                .document
                .get_object(id)
                .and_then(Object::as_stream)
                .map_err(|err| UnmarkError::Format(format!("image {:?}: {}", id, err)))?;
            let data = if stream.dict.has(b"Filter") {
                stream.decompressed_content().map_err(|err| {
                    UnmarkError::Format(format!("cannot decode image {:?}: {}", id, err))
                })?
            } else {
                stream.content.clone()
            };
            let image = RgbImage::from_raw(width, height, data).ok_or_else(|| {
                UnmarkError::Format(format!("image {:?} is not {}x{} RGB", id, width, height))
            })?;
            images.push(image);
        }
        Ok(images)
    }

    // -- Helpers --------------------------------------------------------------

    fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        pages.get(&page_number).copied().ok_or_else(|| {
            UnmarkError::Format(format!(
                "page {} out of range (document has {} pages)",
                page_number,
                pages.len()
            ))
        })
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Result<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).map_err(|err| {
                UnmarkError::Format(format!("dangling reference {:?}: {}", id, err))
            }),
            other => Ok(other),
        }
    }

    fn resolve_dict<'a>(&'a self, object: &'a Object) -> Option<&'a Dictionary> {
        self.resolve(object).ok().and_then(|o| o.as_dict().ok())
    }

    fn page_image_streams(&self, page_number: u32) -> Result<Vec<(ObjectId, &Dictionary)>> {
        let page_id = self.page_id(page_number)?;
        let page = self.document.get_dictionary(page_id).map_err(|err| {
            UnmarkError::Format(format!("page {} is not a dictionary: {}", page_number, err))
        })?;

        let xobjects = page
            .get(b"Resources")
            .ok()
            .and_then(|r| self.resolve_dict(r))
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| self.resolve_dict(x));

        let mut found = Vec::new();
        if let Some(xobjects) = xobjects {
            for (_, value) in xobjects.iter() {
                let Object::Reference(id) = value else { continue };
                let Ok(Object::Stream(stream)) = self.document.get_object(*id) else { continue };
                if matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
                {
                    found.push((*id, &stream.dict));
                }
            }
        }
        Ok(found)
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn image_size(dict: &Dictionary) -> (u32, u32) {
    let read = |key: &[u8]| dict.get(key).and_then(Object::as_i64).unwrap_or(0).max(0) as u32;
    (read(b"Width"), read(b"Height"))
}
