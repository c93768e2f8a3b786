//! Buffer URI classification and inline payload decoding.
//!
//! glTF buffers are referenced either by an embedded data URI
//! (`data:<mediatype>;base64,<payload>`) or by a path relative to the asset.
//! The checks below are plain substring tests and must stay that way: a data
//! URI is only treated as base64 when `;base64` sits immediately before the
//! first comma, and any string containing `://` is a remote reference.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::errors::{Error, Result};

const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";
const SCHEME_SEPARATOR: &str = "://";

// Exporters disagree on trailing '=' padding, accept both.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// How a buffer URI is resolved to bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriKind {
    /// Inline `data:...;base64,` payload.
    Base64,
    /// Path relative to the configured base directory.
    File,
    /// Anything else (e.g. `https://`, or a `data:` URI without `;base64`).
    Unsupported,
}

/// Returns `true` for `data:` URIs whose media type ends in `;base64`.
#[must_use]
pub fn is_base64(uri: &str) -> bool {
    base64_payload(uri).is_some()
}

/// Returns `true` for relative paths: no `scheme://` separator and not a `data:` URI.
#[must_use]
pub fn is_file(uri: &str) -> bool {
    !uri.starts_with(DATA_SCHEME) && !uri.contains(SCHEME_SEPARATOR)
}

/// Classifies a URI. Data URIs without a `;base64` marker are unsupported.
#[must_use]
pub fn classify(uri: &str) -> UriKind {
    if is_base64(uri) {
        UriKind::Base64
    } else if is_file(uri) {
        UriKind::File
    } else {
        UriKind::Unsupported
    }
}

/// Returns the text after the first comma of a base64 data URI.
fn base64_payload(uri: &str) -> Option<&str> {
    if !uri.starts_with(DATA_SCHEME) {
        return None;
    }
    let comma = uri.find(',')?;
    if uri[..comma].ends_with(BASE64_MARKER) {
        Some(&uri[comma + 1..])
    } else {
        None
    }
}

/// Decodes the payload of a base64 data URI.
///
/// `total_size` is the byte length declared by the asset. A non-zero hint
/// requires at least that many decoded bytes and truncates anything beyond it.
pub fn decode_base64(uri: &str, total_size: usize) -> Result<Vec<u8>> {
    let payload = base64_payload(uri).ok_or_else(|| Error::Base64Decode {
        uri: uri.to_string(),
        reason: "not a base64 data URI".to_string(),
    })?;

    let data = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|err| Error::Base64Decode {
            uri: uri.to_string(),
            reason: err.to_string(),
        })?;

    fit_to_size_hint(data, total_size).map_err(|len| Error::Base64Decode {
        uri: uri.to_string(),
        reason: format!("payload holds {len} bytes, {total_size} declared"),
    })
}

/// Applies a declared byte size to loaded data.
///
/// On failure returns the actual length.
pub(crate) fn fit_to_size_hint(
    mut data: Vec<u8>,
    total_size: usize,
) -> std::result::Result<Vec<u8>, usize> {
    if total_size == 0 {
        return Ok(data);
    }
    if data.len() < total_size {
        return Err(data.len());
    }
    data.truncate(total_size);
    Ok(data)
}
