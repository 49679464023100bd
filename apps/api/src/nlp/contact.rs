use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});
// separators are limited to "-", "." and space so numbers on adjacent lines
// never join
static RE_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?\(?[0-9]{1,3}\)?[-. ]?\(?[0-9]{1,4}\)?[-. ]?[0-9]{1,4}[-. ]?[0-9]{1,9}").unwrap()
});
static RE_YEAR_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:19|20)\d{2}\s*[-.]\s*(?:19|20)\d{2}$").unwrap()
});
static RE_LINKEDIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"linkedin\.com/in/[\w-]+").unwrap());
static RE_GITHUB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"github\.com/[\w-]+").unwrap());

/// Years and short numbers also match the phone shape; require this many digits.
const MIN_PHONE_DIGITS: usize = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
}

/// First match per field. Profile paths are returned as `https://` URLs.
pub fn extract_contact_info(text: &str) -> ContactInfo {
    ContactInfo {
        email: RE_EMAIL.find(text).map(|m| m.as_str().to_string()),
        phone: RE_PHONE
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .find(|candidate| is_phone(candidate))
            .map(str::to_string),
        linkedin: RE_LINKEDIN
            .find(text)
            .map(|m| format!("https://{}", m.as_str())),
        github: RE_GITHUB
            .find(text)
            .map(|m| format!("https://{}", m.as_str())),
    }
}

fn is_phone(candidate: &str) -> bool {
    candidate.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS
        && !RE_YEAR_RANGE.is_match(candidate)
}
