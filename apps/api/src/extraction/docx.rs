use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::extraction::{ExtractionError, ExtractionMethod};

/// Shortest run of printable characters kept by the legacy `.doc` scan.
const MIN_RUN_LEN: usize = 4;

pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Docx(format!("Failed to open DOCX: {e}")))?;
    document_text(&mut archive)
}

/// Word 97-2003 files are OLE containers we do not parse. Many `.doc`
/// uploads are really DOCX, so the zip path is tried first; otherwise the
/// longest printable runs (ASCII or UTF-16LE) are recovered.
pub fn extract_doc(bytes: &[u8]) -> (String, ExtractionMethod) {
    if bytes.starts_with(b"PK") {
        match extract_docx(bytes) {
            Ok(text) => return (text, ExtractionMethod::Docx),
            Err(e) => debug!(error = %e, "zip-signed .doc is not a DOCX, scanning bytes"),
        }
    }

    let ascii = ascii_runs(bytes);
    let wide = utf16_runs(bytes);
    let text = if wide.chars().count() > ascii.chars().count() {
        wide
    } else {
        ascii
    };
    (text, ExtractionMethod::DocBinary)
}

fn document_text<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Result<String, ExtractionError> {
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractionError::Docx(format!("Failed to find document.xml: {e}")))?;

    let mut xml = String::new();
    document_xml
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::Docx(format!("Failed to read document.xml: {e}")))?;

    parse_document_xml(&xml)
}

/// Concatenates `w:t` runs, one line per `w:p` paragraph.
fn parse_document_xml(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"tab" => text.push('\t'),
            Ok(Event::Text(e)) if in_text => {
                text.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::Docx(format!("XML parsing error: {e}")));
            }
            _ => {}
        }
    }

    Ok(text)
}

fn is_printable(c: char) -> bool {
    c.is_ascii_graphic() || c == ' ' || c == '\t'
}

/// Accented Latin letters only; wider ranges turn ASCII byte pairs into
/// CJK noise.
fn is_latin_letter(c: char) -> bool {
    c.is_alphabetic() && ('\u{00C0}'..'\u{0250}').contains(&c)
}

fn push_run(out: &mut String, run: &mut String) {
    if run.trim().chars().count() >= MIN_RUN_LEN {
        out.push_str(run.trim());
        out.push('\n');
    }
    run.clear();
}

fn ascii_runs(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut run = String::new();
    for &b in bytes {
        let c = b as char;
        if is_printable(c) {
            run.push(c);
        } else {
            push_run(&mut out, &mut run);
        }
    }
    push_run(&mut out, &mut run);
    out
}

fn utf16_runs(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut run = String::new();
    for pair in bytes.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(u32::from(unit)) {
            Some(c) if is_printable(c) || is_latin_letter(c) => run.push(c),
            _ => push_run(&mut out, &mut run),
        }
    }
    push_run(&mut out, &mut run);
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Builds a minimal DOCX whose body holds one paragraph per entry.
    pub(crate) fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse_paragraphs_one_per_line() {
        let text = extract_docx(&docx_bytes(&["Jane Doe", "Skills", "Rust, Go"])).unwrap();
        assert_eq!(text, "Jane Doe\nSkills\nRust, Go\n");
    }

    #[test]
    fn test_missing_document_xml() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        match extract_docx(&bytes) {
            Err(ExtractionError::Docx(msg)) => assert!(msg.contains("document.xml")),
            other => panic!("Expected Docx error, got {other:?}"),
        }
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            extract_docx(b"plain bytes"),
            Err(ExtractionError::Docx(_))
        ));
    }

    #[test]
    fn test_doc_that_is_really_docx() {
        let (text, method) = extract_doc(&docx_bytes(&["Python developer"]));
        assert_eq!(method, ExtractionMethod::Docx);
        assert_eq!(text.trim(), "Python developer");
    }

    #[test]
    fn test_legacy_doc_ascii_runs() {
        let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0x00, 0x01];
        bytes.extend_from_slice(b"Experienced Rust engineer");
        bytes.extend_from_slice(&[0x00, 0x02, b'a', b'b', 0x00]);
        let (text, method) = extract_doc(&bytes);
        assert_eq!(method, ExtractionMethod::DocBinary);
        assert_eq!(text, "Experienced Rust engineer\n");
    }

    #[test]
    fn test_legacy_doc_utf16_runs() {
        let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0];
        for unit in "Senior Data Scientist".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, method) = extract_doc(&bytes);
        assert_eq!(method, ExtractionMethod::DocBinary);
        assert_eq!(text.trim(), "Senior Data Scientist");
    }
}
