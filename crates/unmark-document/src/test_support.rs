// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixture builders — small in-memory PDFs with known content streams.

use lopdf::{Dictionary, Document, Object, Stream, dictionary};

use crate::raster::reassemble::deflate;

/// Letter-sized PDF with one uncompressed content stream per page.
pub fn pdf_with_pages(pages: &[&[u8]]) -> Vec<u8> {
    build(pages, false, None)
}

/// Like [`pdf_with_pages`] but every content stream is `/FlateDecode`d.
pub fn pdf_with_compressed_pages(pages: &[&[u8]]) -> Vec<u8> {
    build(pages, true, None)
}

/// One page whose content draws a Form XObject `/Fm0` holding `form`.
pub fn pdf_with_form(page: &[u8], form: &[u8]) -> Vec<u8> {
    build(&[page], false, Some(form))
}

fn build(pages: &[&[u8]], compress: bool, form: Option<&[u8]>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut resources = Dictionary::new();
    if let Some(form) = form {
        let form_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            },
            form.to_vec(),
        ));
        resources.set("XObject", dictionary! { "Fm0" => form_id });
    }
    let resources_id = doc.add_object(resources);

    let mut kids = Vec::new();
    for content in pages {
        let stream = if compress {
            let packed = deflate(content).expect("in-memory deflate");
            Stream::new(dictionary! { "Filter" => "FlateDecode" }, packed)
        } else {
            Stream::new(dictionary! {}, content.to_vec())
        };
        let content_id = doc.add_object(stream);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("in-memory save");
    bytes
}
