// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark event ledger — immutable per-org record of every embed.
//
// Events are prepended (most-recent-first) and there is deliberately no
// update or delete operation on this ledger.

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use tracemark_core::{EventId, OrgId, UserIdentity, WatermarkEvent, WatermarkId};

use crate::store::OrgState;

/// Prefix of every forensic display id.
pub const FORENSIC_ID_PREFIX: &str = "FX-";

/// Hex characters taken from the watermark id digest.
const FORENSIC_ID_LEN: usize = 8;

/// Deterministic short display id for a watermark id: fixed prefix plus a
/// fixed-length uppercase hex slice of its SHA-256.
pub fn forensic_id(watermark_id: &WatermarkId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(watermark_id.as_str().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!(
        "{FORENSIC_ID_PREFIX}{}",
        digest[..FORENSIC_ID_LEN].to_ascii_uppercase()
    )
}

/// One-way hash over identity + timestamp.
///
/// Retained on the event so identity can still be resolved by hash
/// comparison when the raw email is withheld from a given view.
pub fn user_hash(full_name: &str, email: &str, issued_at: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{full_name}:{email}:{issued_at}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Inputs for recording one embed operation.
#[derive(Debug, Clone)]
pub struct EmbedRecord<'a> {
    pub watermark_id: &'a WatermarkId,
    pub document_id: &'a str,
    /// SHA-256 of the pre-watermark content.
    pub document_hash: &'a str,
    /// SHA-256 of the watermarked output.
    pub watermarked_hash: &'a str,
    pub user: &'a UserIdentity,
    pub wrapped: bool,
    pub output_filename: &'a str,
}

/// Record an embed, prepending the event to the org ledger.
#[instrument(skip(state, record), fields(org = %org, watermark_id = %record.watermark_id))]
pub fn record_embed(state: &mut OrgState, org: &OrgId, record: EmbedRecord<'_>) -> WatermarkEvent {
    let downloaded_at = Utc::now();
    let issued_at = downloaded_at.to_rfc3339_opts(SecondsFormat::Millis, true);

    let event = WatermarkEvent {
        id: EventId::new(),
        watermark_id: record.watermark_id.clone(),
        forensic_id: forensic_id(record.watermark_id),
        document_id: record.document_id.to_owned(),
        document_hash: record.document_hash.to_owned(),
        watermarked_hash: record.watermarked_hash.to_owned(),
        downloaded_at,
        user_id: record.user.id.clone(),
        user_email: record.user.email.clone(),
        user_hash: user_hash(&record.user.full_name, &record.user.email, &issued_at),
        wrapped: record.wrapped,
        output_filename: record.output_filename.to_owned(),
        org_id: org.clone(),
    };

    state.watermark_events.insert(0, event.clone());
    debug!(forensic_id = %event.forensic_id, "watermark event recorded");
    event
}

/// Events for the org, most recent first, optionally limited.
pub fn list(state: &OrgState, limit: Option<usize>) -> Vec<WatermarkEvent> {
    let take = limit.unwrap_or(state.watermark_events.len());
    state.watermark_events.iter().take(take).cloned().collect()
}

/// Look up the event recorded for a given watermark id.
pub fn find_by_watermark_id<'a>(
    state: &'a OrgState,
    watermark_id: &WatermarkId,
) -> Option<&'a WatermarkEvent> {
    state
        .watermark_events
        .iter()
        .find(|e| &e.watermark_id == watermark_id)
}

/// Look up an event by the hash of its watermarked output.
pub fn find_by_watermarked_hash<'a>(state: &'a OrgState, hash: &str) -> Option<&'a WatermarkEvent> {
    state
        .watermark_events
        .iter()
        .find(|e| e.watermarked_hash == hash)
}
