/// Lossy UTF-8 decode. Invalid sequences and a leading BOM are dropped
/// rather than surfacing as replacement characters.
pub fn decode_permissive(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != '\u{FFFD}' && c != '\u{FEFF}')
        .collect()
}
