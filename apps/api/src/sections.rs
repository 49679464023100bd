//! Section Segmenter: splits CV text into named sections using header-line
//! heuristics.

use std::collections::BTreeMap;

/// Key for lines that appear before the first recognised header.
pub const HEADER_SECTION: &str = "header";

/// Header vocabulary in match priority order.
pub const SECTION_LABELS: [&str; 14] = [
    "education",
    "experience",
    "skills",
    "projects",
    "certifications",
    "publications",
    "summary",
    "objective",
    "work experience",
    "professional experience",
    "employment",
    "academic background",
    "technical skills",
    "achievements",
];

/// Returns the section key a line switches to, if it is a header line.
///
/// A line is a header when its trimmed, lower-cased form starts or ends with
/// a label, or equals it once colons are removed. Broad on purpose: a body
/// line ending in "skills" also counts.
pub fn header_key(line: &str) -> Option<String> {
    let lower = line.trim().to_lowercase();
    let bare = lower.replace(':', "");
    let bare = bare.trim();

    SECTION_LABELS
        .iter()
        .find(|label| lower.starts_with(*label) || lower.ends_with(*label) || bare == **label)
        .map(|label| label.replace(' ', "_"))
}

/// Text after the colon on a header line such as "Skills: Rust, Go".
/// `None` when the line is not a header or nothing follows the colon.
pub fn inline_body(line: &str) -> Option<(String, &str)> {
    let key = header_key(line)?;
    let (_, rest) = line.split_once(':')?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some((key, rest))
}

/// Maps section key to its body lines joined with `\n`. Blank lines are
/// dropped; a key that occurs twice keeps the later body.
pub fn segment_sections(text: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    let mut current = HEADER_SECTION.to_string();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        if let Some(key) = header_key(line) {
            if !buffer.is_empty() {
                sections.insert(current, buffer.join("\n"));
            }
            current = key;
            buffer.clear();
        } else if !line.trim().is_empty() {
            buffer.push(line);
        }
    }

    if !buffer.is_empty() {
        sections.insert(current, buffer.join("\n"));
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    const CV: &str = "Jane Doe\njane@example.com\n\nEDUCATION\nBSc Physics, 2015\n\nWork Experience:\nAcme Corp, 2016 - 2020\n\nTechnical Skills\nRust, Python\n";

    #[test]
    fn test_segments_basic_cv() {
        let sections = segment_sections(CV);
        assert_eq!(sections["header"], "Jane Doe\njane@example.com");
        assert_eq!(sections["education"], "BSc Physics, 2015");
        assert_eq!(sections["work_experience"], "Acme Corp, 2016 - 2020");
        // "technical skills" ends with "skills", which is earlier in the vocabulary
        assert_eq!(sections["skills"], "Rust, Python");
        assert!(!sections.contains_key("technical_skills"));
    }

    #[test]
    fn test_header_key_rules() {
        assert_eq!(header_key("  Skills:  ").as_deref(), Some("skills"));
        assert_eq!(header_key("Projects I led").as_deref(), Some("projects"));
        assert_eq!(header_key("Soft skills").as_deref(), Some("skills"));
        assert_eq!(header_key("Academic Background").as_deref(), Some("academic_background"));
        assert_eq!(header_key("Rust, Python"), None);
        assert_eq!(header_key(""), None);
    }

    #[test]
    fn test_inline_body() {
        assert_eq!(
            inline_body("SKILLS: Python, Docker; Leadership"),
            Some(("skills".to_string(), "Python, Docker; Leadership"))
        );
        assert_eq!(inline_body("Skills:"), None);
        assert_eq!(inline_body("Skills"), None);
        assert_eq!(inline_body("Contact: a@b.io"), None);
        // segmentation itself still treats the whole line as a header
        assert!(segment_sections("SKILLS: Python, Docker").is_empty());
    }

    #[test]
    fn test_repeated_key_last_wins() {
        let sections = segment_sections("Skills\nPython\nEducation\nMSc\nSkills\nGo\n");
        assert_eq!(sections["skills"], "Go");
        assert_eq!(sections["education"], "MSc");
    }

    #[test]
    fn test_empty_section_is_omitted() {
        let sections = segment_sections("Summary\nEducation\nPhD\n");
        assert!(!sections.contains_key("summary"));
        assert!(!sections.contains_key("header"));
        assert_eq!(sections.len(), 1);
    }

    #[test]
    fn test_crlf_lines() {
        let sections = segment_sections("Skills\r\nRust\r\n");
        assert_eq!(sections["skills"], "Rust");
    }
}
