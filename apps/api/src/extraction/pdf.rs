use std::collections::HashSet;
use std::io::Cursor;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::warn;

use crate::extraction::{DocumentMetadata, ExtractionError};

/// Raw output of the PDF pass. `images` is only populated when no text
/// layer was found, since it is only needed for OCR.
pub struct PdfContent {
    pub text: String,
    pub metadata: DocumentMetadata,
    pub images: Vec<Vec<u8>>,
}

pub fn extract(bytes: &[u8]) -> Result<PdfContent, ExtractionError> {
    let document = Document::load_mem(bytes);

    let mut text = match primary_text(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "pdf-extract failed, trying per-page extraction");
            String::new()
        }
    };

    let document = match document {
        Ok(doc) => doc,
        Err(e) if text.trim().is_empty() => {
            return Err(ExtractionError::Pdf(format!("Failed to load PDF: {e}")));
        }
        Err(e) => {
            warn!(error = %e, "lopdf could not parse PDF, metadata unavailable");
            return Ok(PdfContent {
                text,
                metadata: DocumentMetadata::default(),
                images: Vec::new(),
            });
        }
    };

    if text.trim().is_empty() {
        text = page_text(&document);
    }

    let metadata = read_metadata(&document);
    let images = if text.trim().is_empty() {
        embedded_images(&document)
    } else {
        Vec::new()
    };

    Ok(PdfContent {
        text,
        metadata,
        images,
    })
}

fn primary_text(bytes: &[u8]) -> Result<String, String> {
    // pdf-extract panics on some malformed font programs
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("pdf-extract panicked".to_string()),
    }
}

fn page_text(doc: &Document) -> String {
    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }
    text
}

fn read_metadata(doc: &Document) -> DocumentMetadata {
    let page_count = Some(doc.get_pages().len());
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(as_dict);

    let field = |key: &[u8]| -> Option<String> {
        match info?.get(key).ok().and_then(|obj| resolve(doc, obj))? {
            Object::String(raw, _) => {
                let value = decode_pdf_string(raw);
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            _ => None,
        }
    };

    DocumentMetadata {
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        page_count,
    }
}

/// Decodes a PDF text string: UTF-16BE when it carries a BOM, otherwise
/// treated as a single-byte encoding.
fn decode_pdf_string(raw: &[u8]) -> String {
    if let Some(body) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn as_dict(object: &Object) -> Option<&Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Finds the Resources dictionary of a page, walking up the page tree for
/// inherited resources.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok().and_then(as_dict)?;
    for _ in 0..32 {
        if let Some(resources) = node
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(as_dict)
        {
            return Some(resources);
        }
        node = node
            .get(b"Parent")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(as_dict)?;
    }
    None
}

/// Collects every distinct raster image XObject as encoded bytes (JPEG
/// passthrough or PNG re-encoded from raw samples).
fn embedded_images(doc: &Document) -> Vec<Vec<u8>> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for (_, page_id) in doc.get_pages() {
        let Some(xobjects) = page_resources(doc, page_id)
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|obj| resolve(doc, obj))
            .and_then(as_dict)
        else {
            continue;
        };

        for (_, entry) in xobjects.iter() {
            if let Object::Reference(id) = entry {
                if !seen.insert(*id) {
                    continue;
                }
            }
            let Some(Object::Stream(stream)) = resolve(doc, entry) else {
                continue;
            };
            if name_of(stream.dict.get(b"Subtype").ok()) != Some(b"Image".as_slice()) {
                continue;
            }
            match encode_image(doc, stream) {
                Some(bytes) => images.push(bytes),
                None => warn!("Skipping embedded image with unsupported encoding"),
            }
        }
    }

    images
}

fn name_of(object: Option<&Object>) -> Option<&[u8]> {
    match object? {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(items) => match items.first()? {
            Object::Name(name) => Some(name.as_slice()),
            _ => None,
        },
        _ => None,
    }
}

fn integer_of(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match resolve(doc, dict.get(key).ok()?)? {
        Object::Integer(value) => u32::try_from(*value).ok(),
        _ => None,
    }
}

fn encode_image(doc: &Document, stream: &lopdf::Stream) -> Option<Vec<u8>> {
    let filter = name_of(stream.dict.get(b"Filter").ok());
    let samples = match filter {
        Some(b"DCTDecode") => return Some(stream.content.clone()),
        Some(b"FlateDecode") => stream.decompressed_content().ok()?,
        None => stream.content.clone(),
        Some(_) => return None,
    };

    let width = integer_of(doc, &stream.dict, b"Width")?;
    let height = integer_of(doc, &stream.dict, b"Height")?;
    let bits = integer_of(doc, &stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|obj| resolve(doc, obj));
    let image = match name_of(color_space) {
        Some(b"DeviceGray") | Some(b"CalGray") => {
            image::GrayImage::from_raw(width, height, samples).map(image::DynamicImage::ImageLuma8)
        }
        Some(b"DeviceRGB") | Some(b"CalRGB") => {
            image::RgbImage::from_raw(width, height, samples).map(image::DynamicImage::ImageRgb8)
        }
        _ => None,
    }?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .ok()?;
    Some(png)
}
