// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark payload codec & signer.
//
// A payload binds a watermark id, the pre-watermark document hash, and an
// issuance timestamp under an HMAC-SHA256 signature keyed by the org secret.
// The wire form is base64url(JSON) so it can be inlined into document bytes
// without corrupting binary structure.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tracemark_core::error::{Result, TracemarkError};

/// Current (and only) payload wire version.
pub const PAYLOAD_VERSION: u8 = 1;

/// Signed metadata identifying who downloaded a specific document and when.
///
/// Invariant: `signature = hex(HMAC-SHA256(secret,
/// "{watermark_id}:{document_hash}:{issued_at}"))`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkPayload {
    pub version: u8,
    pub watermark_id: String,
    pub document_hash: String,
    /// ISO 8601 with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
    pub issued_at: String,
    pub signature: String,
}

impl WatermarkPayload {
    /// Build and sign a payload. `issued_at` defaults to the current time.
    #[instrument(skip(secret), fields(%watermark_id))]
    pub fn new(
        secret: &str,
        watermark_id: &str,
        document_hash: &str,
        issued_at: Option<String>,
    ) -> Self {
        let issued_at = issued_at
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        let signature = sign(secret, watermark_id, document_hash, &issued_at);
        Self {
            version: PAYLOAD_VERSION,
            watermark_id: watermark_id.to_owned(),
            document_hash: document_hash.to_owned(),
            issued_at,
            signature,
        }
    }

    /// Deterministic, URL-safe, reversible textual encoding.
    pub fn encode(&self) -> String {
        // Serialization of a plain struct cannot fail.
        let json = serde_json::to_vec(self).expect("payload serialization is infallible");
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Exact inverse of [`encode`](Self::encode). Malformed input yields a
    /// `Validation` error, never a panic.
    pub fn decode(encoded: &str) -> Result<Self> {
        let json = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|e| TracemarkError::Validation(format!("payload is not base64url: {e}")))?;
        let payload: Self = serde_json::from_slice(&json)
            .map_err(|e| TracemarkError::Validation(format!("payload is not valid JSON: {e}")))?;
        debug!(watermark_id = %payload.watermark_id, "payload decoded");
        Ok(payload)
    }

    /// Recompute the signature over the payload fields with `secret` and
    /// compare in constant time.
    ///
    /// Returns `false` (never an error) when the version is unknown, any
    /// required field is empty, or the signature does not check out.
    pub fn verify(&self, secret: &str) -> bool {
        if self.version != PAYLOAD_VERSION {
            return false;
        }
        if self.watermark_id.is_empty()
            || self.document_hash.is_empty()
            || self.issued_at.is_empty()
            || self.signature.is_empty()
        {
            return false;
        }
        let Ok(tag) = hex::decode(&self.signature) else {
            return false;
        };
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let message = signing_input(&self.watermark_id, &self.document_hash, &self.issued_at);
        // ring's verify is constant-time over the tag comparison.
        hmac::verify(&key, message.as_bytes(), &tag).is_ok()
    }
}

fn signing_input(watermark_id: &str, document_hash: &str, issued_at: &str) -> String {
    format!("{watermark_id}:{document_hash}:{issued_at}")
}

/// HMAC-SHA256 over the canonical signing input, hex-encoded.
pub fn sign(secret: &str, watermark_id: &str, document_hash: &str, issued_at: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let message = signing_input(watermark_id, document_hash, issued_at);
    hex::encode(hmac::sign(&key, message.as_bytes()).as_ref())
}
