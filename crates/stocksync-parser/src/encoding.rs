use encoding_rs::Encoding;

use crate::errors::ParserError;

/// Maps legacy labels written by the exporting system onto WHATWG labels.
pub fn normalize_charset(label: &str) -> String {
    let label = label.trim().to_ascii_lowercase();
    match label.as_str() {
        "latin ii" | "latin-2" | "latin2" | "iso8859-2" | "iso_8859-2" => "iso-8859-2".to_string(),
        "cp1250" | "windows1250" | "win-1250" => "windows-1250".to_string(),
        _ => label,
    }
}

/// Resolves a declared encoding label. Only ASCII-compatible encodings are
/// accepted because markup is tokenized before text is decoded.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, ParserError> {
    let normalized = normalize_charset(label);
    match Encoding::for_label(normalized.as_bytes()) {
        Some(encoding) if encoding.is_ascii_compatible() => Ok(encoding),
        _ => Err(ParserError::UnsupportedEncoding(label.trim().to_string())),
    }
}
