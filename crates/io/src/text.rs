// Delimited text decoding

use std::path::Path;

use encoding_rs::{Encoding, ISO_8859_15, UTF_8, WINDOWS_1252};
use tracing::debug;

use crate::error::SourceError;

/// UTF-8 first, then the two 8-bit encodings spreadsheet tools on Windows
/// export with.
///
/// encoding_rs maps every byte in Windows-1252, so this chain never fails:
/// anything that is not UTF-8 decodes as Windows-1252 and ISO-8859-15 is
/// never reached. [`SourceError::Encoding`] only comes from narrower chains.
pub fn default_chain() -> [&'static Encoding; 3] {
    [UTF_8, WINDOWS_1252, ISO_8859_15]
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read a file and decode it with [`default_chain`].
pub fn read_text(path: &Path) -> Result<String, SourceError> {
    read_text_with(path, &default_chain())
}

fn read_text_with(path: &Path, chain: &[&'static Encoding]) -> Result<String, SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_with_chain(&bytes, chain).ok_or_else(|| SourceError::Encoding {
        path: path.to_path_buf(),
        tried: chain.iter().map(|e| e.name()).collect(),
    })
}

/// Try each encoding in order and return the first clean decode.
///
/// A UTF-8 byte order mark is stripped before anything is tried. An encoding
/// that would need replacement characters counts as a failure.
pub fn decode_with_chain(bytes: &[u8], chain: &[&'static Encoding]) -> Option<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    for encoding in chain {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            debug!(encoding = encoding.name(), "decoded source");
            return Some(text.into_owned());
        }
    }
    None
}
