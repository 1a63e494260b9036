// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification resolution — "who produced this artifact".
//
// Priority order: embedded payload, then watermarked-file hash, then known
// pre-watermark original. A payload with a broken signature is still
// reported (signature_valid = false, metadata intact) — a forged mark is
// forensic signal, distinct from no mark at all.

use tracing::{debug, instrument};

use tracemark_core::{MatchMethod, VerificationResult, WatermarkId};
use tracemark_forensics::{extract, hash_bytes, WatermarkPayload};
use tracemark_ledger::{events, OrgState};

/// Resolve an artifact against one org's state. `None` means no forensic
/// watermark was found by any method. Never panics on adversarial input.
#[instrument(skip_all, fields(len = bytes.len()))]
pub fn resolve(state: &OrgState, bytes: &[u8]) -> Option<VerificationResult> {
    if let Some(found) = extract(bytes) {
        // An undecodable token falls through to the hash paths.
        if let Ok(payload) = WatermarkPayload::decode(&found.encoded_payload) {
            let secret = state
                .config
                .as_ref()
                .and_then(|c| c.watermark_secret.as_deref());
            let signature_valid = secret.map(|s| payload.verify(s)).unwrap_or(false);

            let watermark_id = WatermarkId::new(payload.watermark_id.clone());
            let event = events::find_by_watermark_id(state, &watermark_id);
            let matched_identity = event
                .map(|e| e.user_email.clone())
                .unwrap_or_else(|| "Unknown".to_owned());
            let forensic_id = event
                .map(|e| e.forensic_id.clone())
                .unwrap_or_else(|| events::forensic_id(&watermark_id));

            debug!(%watermark_id, signature_valid, "resolved via embedded payload");
            return Some(VerificationResult {
                match_method: MatchMethod::Embedded,
                signature_valid,
                watermark_id: Some(watermark_id),
                forensic_id: Some(forensic_id),
                document_hash: Some(payload.document_hash),
                issued_at: Some(payload.issued_at),
                matched_identity: Some(matched_identity),
                recovered_original_hash: found.original_bytes.as_deref().map(hash_bytes),
            });
        }
    }

    let input_hash = hash_bytes(bytes);

    if let Some(event) = events::find_by_watermarked_hash(state, &input_hash) {
        debug!(watermark_id = %event.watermark_id, "resolved via watermarked-file hash");
        return Some(VerificationResult {
            match_method: MatchMethod::Hash,
            signature_valid: false,
            watermark_id: Some(event.watermark_id.clone()),
            forensic_id: Some(event.forensic_id.clone()),
            document_hash: Some(event.document_hash.clone()),
            issued_at: None,
            matched_identity: Some(event.user_email.clone()),
            recovered_original_hash: None,
        });
    }

    if state.vault_documents.iter().any(|d| d.doc_hash == input_hash) {
        debug!("input matches a pre-watermark original — no per-user mark");
        return Some(VerificationResult {
            match_method: MatchMethod::Original,
            signature_valid: false,
            watermark_id: None,
            forensic_id: None,
            document_hash: Some(input_hash),
            issued_at: None,
            matched_identity: None,
            recovered_original_hash: None,
        });
    }

    None
}
