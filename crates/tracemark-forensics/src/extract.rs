// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction engine — locate and decode an embedded payload token from
// previously watermarked bytes.
//
// Contract: never panics and never errors on adversarial input. Any parse or
// format anomaly degrades to the raw marker scan, and a missing marker is
// simply `None`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, instrument};

use crate::embed::{WrapperEnvelope, MARKER_PREFIX, WRAPPER_TAG};

/// A located payload, plus whatever pre-watermark content could be recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub encoded_payload: String,
    /// True when the payload came from a wrapper envelope.
    pub wrapper: bool,
    /// Pre-watermark bytes. Exact for wrapper envelopes; best-effort
    /// (marker-truncation heuristic) for appended markers.
    pub original_bytes: Option<Vec<u8>>,
}

/// Locate the embedded payload in `bytes`, if any.
///
/// Wrapper envelopes are recognized first; otherwise the buffer is scanned
/// backward for the rightmost marker so earlier incidental matches are
/// tolerated.
#[instrument(skip_all, fields(len = bytes.len()))]
pub fn extract(bytes: &[u8]) -> Option<Extraction> {
    if let Some(found) = extract_from_wrapper(bytes) {
        debug!("payload recovered from wrapper envelope");
        return Some(found);
    }
    extract_from_marker(bytes)
}

/// Try to parse `bytes` as a wrapper envelope.
fn extract_from_wrapper(bytes: &[u8]) -> Option<Extraction> {
    let text = std::str::from_utf8(bytes).ok()?;
    if !text.trim_start().starts_with('{') {
        return None;
    }
    let envelope: WrapperEnvelope = serde_json::from_str(text).ok()?;
    if envelope.format != WRAPPER_TAG {
        return None;
    }
    let marker_at = envelope.watermark.find(MARKER_PREFIX)?;
    let encoded = envelope.watermark[marker_at + MARKER_PREFIX.len()..]
        .split_whitespace()
        .next()?
        .to_owned();
    let original = BASE64.decode(envelope.original.content.as_bytes()).ok()?;
    Some(Extraction {
        encoded_payload: encoded,
        wrapper: true,
        original_bytes: Some(original),
    })
}

/// Scan raw bytes for the rightmost marker and read the token after it.
fn extract_from_marker(bytes: &[u8]) -> Option<Extraction> {
    let marker = MARKER_PREFIX.as_bytes();
    let start = rfind(bytes, marker)?;
    let token_start = start + marker.len();

    let token_end = bytes[token_start..]
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .map(|i| token_start + i)
        .unwrap_or(bytes.len());
    let token = &bytes[token_start..token_end];
    if token.is_empty() {
        return None;
    }
    // The token is base64url ASCII by construction; anything else means this
    // was an incidental marker hit.
    let encoded = std::str::from_utf8(token).ok()?.to_owned();

    // Best-effort recovery: strip up to 3 bytes of isolating whitespace or
    // PDF comment character preceding the marker and truncate there. Exact
    // for content this engine watermarked itself; approximate otherwise.
    let mut cut = start;
    for _ in 0..3 {
        if cut > 0 && matches!(bytes[cut - 1], b'\n' | b'\r' | b'%') {
            cut -= 1;
        } else {
            break;
        }
    }
    debug!(marker_at = start, stripped = start - cut, "payload recovered from marker scan");

    Some(Extraction {
        encoded_payload: encoded,
        wrapper: false,
        original_bytes: Some(bytes[..cut].to_vec()),
    })
}

/// Byte-slice `rfind` — offset of the last occurrence of `needle`.
fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).rev().find(|&i| &haystack[i..i + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::embed;

    #[test]
    fn no_marker_yields_none() {
        assert!(extract(b"just some ordinary bytes").is_none());
        assert!(extract(b"").is_none());
    }

    #[test]
    fn text_round_trip_recovers_payload_and_original() {
        let original = b"line one\nline two";
        let out = embed(original, "a.txt", "text/plain", "PAYLOAD123");

        let found = extract(&out.bytes).expect("marker should be found");
        assert_eq!(found.encoded_payload, "PAYLOAD123");
        assert!(!found.wrapper);
        assert_eq!(found.original_bytes.as_deref(), Some(&original[..]));
    }

    #[test]
    fn pdf_round_trip_strips_comment_and_newline() {
        let original = b"%PDF-1.4 content %%EOF";
        let out = embed(original, "a.pdf", "application/pdf", "PAYLOAD123");

        let found = extract(&out.bytes).expect("marker should be found");
        assert_eq!(found.encoded_payload, "PAYLOAD123");
        assert_eq!(found.original_bytes.as_deref(), Some(&original[..]));
    }

    #[test]
    fn wrapper_round_trip_is_byte_exact() {
        let original: Vec<u8> = (0u8..=255).cycle().take(10 * 1024).collect();
        let out = embed(&original, "blob.bin", "application/octet-stream", "PAYLOAD123");

        let found = extract(&out.bytes).expect("wrapper should be recognized");
        assert!(found.wrapper);
        assert_eq!(found.encoded_payload, "PAYLOAD123");
        assert_eq!(found.original_bytes.as_deref(), Some(&original[..]));
    }

    #[test]
    fn rightmost_marker_wins() {
        let bytes = format!("{MARKER_PREFIX}FIRST and later {MARKER_PREFIX}SECOND\n");
        let found = extract(bytes.as_bytes()).unwrap();
        assert_eq!(found.encoded_payload, "SECOND");
    }

    #[test]
    fn malformed_json_degrades_to_marker_scan() {
        let bytes = format!("{{ not json at all {MARKER_PREFIX}TOKEN\n");
        let found = extract(bytes.as_bytes()).unwrap();
        assert_eq!(found.encoded_payload, "TOKEN");
        assert!(!found.wrapper);
    }

    #[test]
    fn wrapper_with_foreign_tag_falls_through() {
        let bytes = br#"{"format":"something-else","original":{},"watermark":"x"}"#;
        assert!(extract(bytes).is_none());
    }

    #[test]
    fn marker_at_end_of_buffer_without_token_is_none() {
        let bytes = MARKER_PREFIX.as_bytes();
        assert!(extract(bytes).is_none());
    }

    #[test]
    fn binary_input_with_marker_is_handled() {
        let mut bytes = vec![0xFFu8, 0x00, 0x1B];
        bytes.extend_from_slice(format!("\n{MARKER_PREFIX}TOK42\n").as_bytes());
        let found = extract(&bytes).unwrap();
        assert_eq!(found.encoded_payload, "TOK42");
        assert_eq!(found.original_bytes.as_deref(), Some(&[0xFFu8, 0x00, 0x1B][..]));
    }
}
