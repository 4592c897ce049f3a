//! Target languages offered by the translation UI.

/// Known language codes and their display names.
pub const KNOWN_LANGUAGES: &[(&str, &str)] = &[
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("hi", "Hindi"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh-CN", "Chinese (Simplified)"),
];

/// Display name for `code`; unknown codes pass through unchanged.
pub fn display_name(code: &str) -> &str {
    KNOWN_LANGUAGES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}
