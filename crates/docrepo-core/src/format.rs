//! Display helpers for document rows and the edit dialog.

use crate::models::Document;

/// Placeholder shown when an attribute has no value.
pub const NOT_AVAILABLE: &str = "Not available";

/// Placeholder for an empty read-only table cell.
pub const EMPTY_CELL: &str = "—";

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size using 1024-based units, at most two decimals.
///
/// `0` renders as `0 Bytes`; sizes past the GB range stay in GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

/// File name for display: the stored file name, else the title, with a
/// trailing `.pdf` removed.
pub fn display_filename(document: &Document) -> String {
    let raw = document
        .file()
        .filename
        .unwrap_or_else(|| document.title.clone());
    let name = strip_pdf_suffix(&raw);
    if name.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        name.to_string()
    }
}

/// MIME type of the attached file, `PDF` when unknown.
pub fn display_file_type(document: &Document) -> String {
    document.file().mime_type.unwrap_or_else(|| "PDF".to_string())
}

/// Formatted size of the attached file.
pub fn display_file_size(document: &Document) -> String {
    document
        .file()
        .size_bytes
        .map(format_file_size)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn strip_pdf_suffix(name: &str) -> &str {
    let len = name.len();
    if len >= 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".pdf") {
        &name[..len - 4]
    } else {
        name
    }
}
