// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tracemark-forensics — Watermark payload signing, embedding, and extraction.
//
// Provides the signed payload codec (HMAC-SHA256, base64url JSON), the
// format-aware embedding engine (PDF-tolerant append, text append, or a
// lossless wrapper for opaque binaries), the extraction engine that locates
// and decodes a payload from previously watermarked bytes, and SHA-256
// integrity hashing used throughout the workspace.

pub mod embed;
pub mod extract;
pub mod integrity;
pub mod payload;

// Re-export the primary entry points so callers can use
// `tracemark_forensics::embed(..)` etc.
pub use embed::{classify, embed, DocumentClass, WatermarkedDocument, MARKER_PREFIX, WRAPPER_TAG};
pub use extract::{extract, Extraction};
pub use integrity::hash_bytes;
pub use payload::WatermarkPayload;
