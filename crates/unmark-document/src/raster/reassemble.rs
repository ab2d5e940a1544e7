// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reassembler — builds an image-only PDF from an ordered sequence of pixel
// grids, one page per grid, using `lopdf`.

use std::io::Write as _;
use std::path::Path;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument};
use unmark_core::error::{Result, UnmarkError};

use super::rasterizer::POINTS_PER_INCH;
use crate::output::write_atomic;

/// Accumulates filtered pages and writes them out as one PDF.
///
/// Each grid is compressed into its image stream as soon as it is pushed, so
/// the caller can drop the grid immediately.
pub struct Reassembler {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    dpi: u32,
}

impl Reassembler {
    /// Start an empty document whose pages are sized for `dpi`.
    pub fn new(dpi: u32) -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
            dpi: dpi.max(1),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append `grid` as the next page.
    ///
    /// The image is placed at its native resolution: the page measures
    /// `width * 72 / dpi` by `height * 72 / dpi` points.
    #[instrument(
        skip_all,
        fields(page = self.kids.len() + 1, width = grid.width(), height = grid.height())
    )]
    pub fn push_page(&mut self, grid: &RgbImage) -> Result<()> {
        let (width, height) = grid.dimensions();
        if width == 0 || height == 0 {
            return Err(UnmarkError::Format(format!(
                "page {} has an empty {}x{} grid",
                self.kids.len() + 1,
                width,
                height
            )));
        }

        let compressed = deflate(grid.as_raw())?;
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            compressed,
        );
        let image_id = self.document.add_object(image);

        let scale = POINTS_PER_INCH / self.dpi as f32;
        let page_w = width as f32 * scale;
        let page_h = height as f32 * scale;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![page_w.into(), 0.into(), 0.into(), page_h.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|err| UnmarkError::Format(format!("cannot encode page content: {}", err)))?;
        let content_id = self.document.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());

        debug!(page_w, page_h, "Page appended");
        Ok(())
    }

    /// Finish the page tree and serialise the document.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if self.kids.is_empty() {
            return Err(UnmarkError::Format("no pages to reassemble".into()));
        }

        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.document.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);

        let mut output = Vec::new();
        self.document.save_to(&mut output).map_err(|err| {
            UnmarkError::Write(format!("failed to serialise reassembled PDF: {}", err))
        })?;
        Ok(output)
    }

    /// Finish the document and write it to `path`. Returns the page count.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn write_to(self, path: &Path) -> Result<usize> {
        let pages = self.page_count();
        let bytes = self.finish()?;
        write_atomic(path, &bytes)?;
        info!(pages, bytes = bytes.len(), "Reassembled PDF written");
        Ok(pages)
    }
}

/// Zlib-compress `data` for a `/FlateDecode` stream.
pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::reader::PdfReader;
    use image::Rgb as Px;

    #[test]
    fn page_order_and_dimensions_are_preserved() {
        let mut reassembler = Reassembler::new(100);
        let pages = [
            RgbImage::from_pixel(30, 40, Px([255, 255, 255])),
            RgbImage::from_pixel(50, 20, Px([0, 0, 0])),
            RgbImage::from_pixel(10, 10, Px([255, 0, 0])),
        ];
        for page in &pages {
            reassembler.push_page(page).unwrap();
        }
        let bytes = reassembler.finish().unwrap();

        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.page_count(), 3);
        assert_eq!(reader.page_image_dimensions(1).unwrap(), vec![(30, 40)]);
        assert_eq!(reader.page_image_dimensions(2).unwrap(), vec![(50, 20)]);
        assert_eq!(reader.page_image_dimensions(3).unwrap(), vec![(10, 10)]);
    }

    #[test]
    fn embedded_pixels_round_trip() {
        let grid = RgbImage::from_fn(8, 6, |x, y| Px([x as u8 * 10, y as u8 * 20, 7]));
        let mut reassembler = Reassembler::new(300);
        reassembler.push_page(&grid).unwrap();
        let bytes = reassembler.finish().unwrap();
        let reader = PdfReader::from_bytes(&bytes).unwrap();

        let images = reader.page_images(1).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0], grid);
    }

    #[test]
    fn media_box_follows_dpi() {
        let mut reassembler = Reassembler::new(144);
        reassembler.push_page(&RgbImage::new(288, 144)).unwrap();
        let bytes = reassembler.finish().unwrap();
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.media_box(1).unwrap(), [0.0, 0.0, 144.0, 72.0]);
    }

    #[test]
    fn empty_document_is_rejected() {
        let err = Reassembler::new(300).finish().unwrap_err();
        assert!(matches!(err, UnmarkError::Format(_)));
    }

    #[test]
    fn unwritable_destination_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut reassembler = Reassembler::new(72);
        reassembler.push_page(&RgbImage::new(4, 4)).unwrap();
        let target = dir.path().join("missing/out.pdf");
        let err = reassembler.write_to(&target).unwrap_err();
        assert!(matches!(err, UnmarkError::Write(_)), "{err}");
    }
}
