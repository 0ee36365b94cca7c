//! URL segment encoding and local file naming

use crate::error::{BaasError, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in a single path segment (RFC 3986 unreserved are kept)
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode one path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Decode a segment the way form decoding does: `+` is a space.
pub fn decode_segment(segment: &str) -> Result<String> {
    let spaced = segment.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| BaasError::InvalidInput(format!("segment is not valid UTF-8: {e}")))
}

/// Encode every segment of a `/`-separated path, dropping empty segments.
///
/// Segments are decoded first so an already-encoded path is not escaped twice.
pub fn encode_path(path: &str) -> Result<String> {
    let segments = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| decode_segment(s).map(|decoded| encode_segment(&decoded)))
        .collect::<Result<Vec<_>>>()?;
    Ok(segments.join("/"))
}

/// Local file name for a remote path: its last segment, decoded.
pub fn file_name_from_remote_path(remote_path: &str) -> Result<String> {
    let last = remote_path
        .rsplit('/')
        .find(|s| !s.is_empty())
        .ok_or_else(|| BaasError::InvalidInput(format!("no file name in '{remote_path}'")))?;
    let name = decode_segment(last)?;
    validate_file_name(&name)?;
    Ok(name)
}

/// Reject names that would escape the destination directory.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name == "." || name == ".." {
        return Err(BaasError::InvalidInput(format!(
            "invalid file name '{name}'"
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(BaasError::InvalidInput(format!(
            "file name must not contain path separators: '{name}'"
        )));
    }
    Ok(())
}
