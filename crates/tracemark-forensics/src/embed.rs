// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedding engine — classify document bytes and inject an encoded payload
// with a format-appropriate strategy.
//
// Strategy chain: PDF-tolerant append → plain-text append → lossless JSON
// wrapper. Format transparency is preferred when the host format tolerates
// trailing bytes; anything else gets wrapped rather than risking corruption.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Fixed ASCII prefix that introduces an embedded payload token.
pub const MARKER_PREFIX: &str = "TRACEMARK:";

/// Format tag of the lossless wrapper envelope.
pub const WRAPPER_TAG: &str = "tracemark-wrap-v1";

/// Suffix added to the output filename when content is wrapped.
pub const WRAPPED_SUFFIX: &str = ".tmk";

/// PDF comment character — readers ignore comment lines after %%EOF.
const PDF_COMMENT: char = '%';

/// Extensions treated as plain text when the MIME type is not conclusive.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "log", "json", "xml", "html", "htm", "yaml", "yml",
];

/// How a document will be watermarked. Closed set — adding a format means
/// adding a variant and satisfying the exhaustive matches below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentClass {
    /// PDF and PDF-like: readers tolerate trailing bytes after %%EOF, so a
    /// comment-prefixed marker line is appended.
    PdfTolerant,
    /// Plain text: a newline-delimited marker line is appended.
    TextEmbeddable,
    /// Anything else: appending could corrupt structure, so the whole
    /// content is wrapped in a lossless envelope.
    OpaqueBinary,
}

/// Classify a document by MIME type and filename extension.
pub fn classify(filename: &str, mime_type: &str) -> DocumentClass {
    let mime = mime_type.to_ascii_lowercase();
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();

    if mime.contains("pdf") || ext == "pdf" {
        DocumentClass::PdfTolerant
    } else if mime.starts_with("text/") || TEXT_EXTENSIONS.contains(&ext.as_str()) {
        DocumentClass::TextEmbeddable
    } else {
        DocumentClass::OpaqueBinary
    }
}

/// Output of an embed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
    /// True when the original content was placed inside a wrapper envelope.
    pub wrapped: bool,
}

/// Lossless envelope used for opaque binary content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrapperEnvelope {
    pub format: String,
    pub original: WrappedOriginal,
    /// Full marker string: `MARKER_PREFIX` + encoded payload.
    pub watermark: String,
}

/// The original content carried inside a wrapper envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedOriginal {
    pub filename: String,
    pub mime_type: String,
    /// Original bytes, base64-encoded.
    pub content: String,
}

/// Inject `encoded_payload` into `bytes` using the strategy chosen by
/// [`classify`]. Never fails — the opaque-binary wrapper handles any input.
#[instrument(skip(bytes, encoded_payload), fields(%filename, %mime_type, len = bytes.len()))]
pub fn embed(
    bytes: &[u8],
    filename: &str,
    mime_type: &str,
    encoded_payload: &str,
) -> WatermarkedDocument {
    let class = classify(filename, mime_type);
    debug!(?class, "document classified");

    match class {
        DocumentClass::PdfTolerant => {
            let mut out = bytes.to_vec();
            out.extend_from_slice(
                format!("\n{PDF_COMMENT}{MARKER_PREFIX}{encoded_payload}\n").as_bytes(),
            );
            WatermarkedDocument {
                bytes: out,
                filename: filename.to_owned(),
                mime_type: mime_type.to_owned(),
                wrapped: false,
            }
        }
        DocumentClass::TextEmbeddable => {
            let mut out = bytes.to_vec();
            out.extend_from_slice(format!("\n{MARKER_PREFIX}{encoded_payload}\n").as_bytes());
            WatermarkedDocument {
                bytes: out,
                filename: filename.to_owned(),
                mime_type: mime_type.to_owned(),
                wrapped: false,
            }
        }
        DocumentClass::OpaqueBinary => {
            let envelope = WrapperEnvelope {
                format: WRAPPER_TAG.to_owned(),
                original: WrappedOriginal {
                    filename: filename.to_owned(),
                    mime_type: mime_type.to_owned(),
                    content: BASE64.encode(bytes),
                },
                watermark: format!("{MARKER_PREFIX}{encoded_payload}"),
            };
            let out = serde_json::to_vec(&envelope)
                .expect("wrapper envelope serialization is infallible");
            WatermarkedDocument {
                bytes: out,
                filename: format!("{filename}{WRAPPED_SUFFIX}"),
                mime_type: "application/json".to_owned(),
                wrapped: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_pdf_by_mime_and_extension() {
        assert_eq!(classify("report.pdf", "application/pdf"), DocumentClass::PdfTolerant);
        assert_eq!(classify("report.pdf", "application/octet-stream"), DocumentClass::PdfTolerant);
        assert_eq!(classify("blob", "application/x-pdf"), DocumentClass::PdfTolerant);
    }

    #[test]
    fn classify_text_by_mime_and_extension() {
        assert_eq!(classify("notes.txt", "text/plain"), DocumentClass::TextEmbeddable);
        assert_eq!(classify("data.csv", "application/octet-stream"), DocumentClass::TextEmbeddable);
        assert_eq!(classify("README", "text/markdown"), DocumentClass::TextEmbeddable);
    }

    #[test]
    fn classify_everything_else_as_opaque() {
        assert_eq!(classify("photo.png", "image/png"), DocumentClass::OpaqueBinary);
        assert_eq!(classify("archive.zip", "application/zip"), DocumentClass::OpaqueBinary);
        assert_eq!(classify("noext", "application/octet-stream"), DocumentClass::OpaqueBinary);
    }

    #[test]
    fn text_embed_appends_exact_marker_line() {
        let original = b"hello world";
        let out = embed(original, "doc.txt", "text/plain", "ENCODED");
        let expected = format!("hello world\n{MARKER_PREFIX}ENCODED\n");
        assert_eq!(out.bytes, expected.as_bytes());
        assert!(!out.wrapped);
        assert_eq!(out.filename, "doc.txt");
    }

    #[test]
    fn pdf_embed_appends_comment_prefixed_marker() {
        let original = b"%PDF-1.7 ... %%EOF";
        let out = embed(original, "doc.pdf", "application/pdf", "ENCODED");
        let expected = format!("%PDF-1.7 ... %%EOF\n%{MARKER_PREFIX}ENCODED\n");
        assert_eq!(out.bytes, expected.as_bytes());
        assert!(!out.wrapped);
    }

    #[test]
    fn binary_embed_wraps_losslessly() {
        let original: Vec<u8> = (0u8..=255).collect();
        let out = embed(&original, "blob.bin", "application/octet-stream", "ENCODED");
        assert!(out.wrapped);
        assert_eq!(out.filename, "blob.bin.tmk");
        assert_eq!(out.mime_type, "application/json");

        let envelope: WrapperEnvelope = serde_json::from_slice(&out.bytes).unwrap();
        assert_eq!(envelope.format, WRAPPER_TAG);
        assert_eq!(envelope.watermark, format!("{MARKER_PREFIX}ENCODED"));
        assert_eq!(BASE64.decode(&envelope.original.content).unwrap(), original);
        assert_eq!(envelope.original.filename, "blob.bin");
    }
}
