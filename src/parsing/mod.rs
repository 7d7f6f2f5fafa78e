//! Locale-aware parsing of statement cells

pub mod date;
pub mod numeric;

pub use date::*;
pub use numeric::*;

/// Collapse whitespace and lowercase a header label
pub fn normalize_header(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercase ASCII alphanumerics only (`"Amount (DR)"` -> `"amountdr"`)
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Uppercase ASCII alphanumerics only (`"inv-00 12"` -> `"INV0012"`)
pub fn compact_upper(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
