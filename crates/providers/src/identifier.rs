/// Names must end with one of these to carry an identifier.
const ALLOWED_SUFFIXES: [&str; 12] = [
    "jpg", "png", "gif", "webp", "webm", "zip", "jpg.lnk", "png.lnk", "gif.lnk", "webp.lnk",
    "webm.lnk", "zip.lnk",
];

/// Extracts the leading digit run of a display name.
///
/// The identifier is whatever precedes the first `-`, or failing that the
/// first `_`, or failing that the first `.`. It must be non-empty and made
/// only of ASCII digits.
pub fn extract_identifier(display_name: &str) -> Option<String> {
    let eligible = ALLOWED_SUFFIXES
        .iter()
        .any(|s| display_name.len() > s.len() && display_name.ends_with(s));
    if !eligible {
        return None;
    }

    let cut = ['-', '_', '.']
        .iter()
        .find_map(|sep| display_name.find(*sep))?;
    let candidate = &display_name[..cut];
    if candidate.is_empty() || !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(candidate.to_string())
}
