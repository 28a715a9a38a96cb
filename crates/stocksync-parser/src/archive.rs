use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use zip::ZipArchive;

use crate::errors::ParserError;

const READ_BUFFER_BYTES: usize = 64 * 1024;

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Opens an export for streaming and hands the byte stream to `f`.
///
/// Plain files are read directly. For `.zip` archives the first entry whose
/// name ends in `.xml` is streamed without extracting it to disk.
pub fn with_export_stream<T, F>(path: &Path, f: F) -> Result<T, ParserError>
where
    F: FnOnce(&mut dyn BufRead) -> Result<T, ParserError>,
{
    let file = File::open(path)?;

    if !is_archive(path) {
        let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
        return f(&mut reader);
    }

    let mut archive = ZipArchive::new(file)?;
    let mut xml_index = None;
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_file() && entry.name().to_ascii_lowercase().ends_with(".xml") {
            xml_index = Some(index);
            break;
        }
    }

    let index = xml_index.ok_or(ParserError::MissingXmlEntry)?;
    let entry = archive.by_index(index)?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, entry);
    f(&mut reader)
}
