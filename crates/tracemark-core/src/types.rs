// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Tracemark forensic watermarking engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant boundary. Secrets, configuration, and audit/event logs are all
/// scoped per organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier bound into every embedded watermark payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatermarkId(pub String);

impl WatermarkId {
    /// Mint a fresh watermark id for a new embed operation.
    pub fn generate() -> Self {
        Self(format!("wm_{}", Uuid::new_v4().simple()))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WatermarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a recorded watermark event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the user a watermark is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

/// One embed operation: who downloaded which document, and when.
///
/// Immutable once recorded — there is deliberately no update or delete
/// operation on this entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkEvent {
    pub id: EventId,
    pub watermark_id: WatermarkId,
    /// Short display-safe id derived from `watermark_id`.
    pub forensic_id: String,
    pub document_id: String,
    /// SHA-256 of the pre-watermark document bytes (also bound into the
    /// signed payload).
    pub document_hash: String,
    /// SHA-256 of the watermarked output bytes, kept for hash-based
    /// resolution when no payload can be extracted.
    pub watermarked_hash: String,
    pub downloaded_at: DateTime<Utc>,
    pub user_id: String,
    pub user_email: String,
    /// One-way hash over identity + timestamp, so the identity can still be
    /// matched when the raw email is withheld from a given view.
    pub user_hash: String,
    pub wrapped: bool,
    pub output_filename: String,
    pub org_id: OrgId,
}

/// Lifecycle states of a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Denied,
}

impl VerificationStatus {
    /// Approved and denied are terminal — no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Denied)
    }
}

/// A non-owner's request to have an artifact verified.
///
/// Carries only the filename and content hash — never the raw content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: RequestId,
    pub org_id: OrgId,
    pub requester_email: String,
    pub filename: String,
    pub file_hash: String,
    pub status: VerificationStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

/// One link in the per-org tamper-evident audit chain.
///
/// `hash` covers the canonical core fields plus `prev_hash`, so editing or
/// deleting any event breaks the chain from that point forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub org_id: OrgId,
    pub actor_email: String,
    pub action: String,
    pub metadata: serde_json::Value,
    pub severity: AuditSeverity,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    /// Chain head at append time. `None` for the first event of an org.
    pub prev_hash: Option<String>,
    pub hash: String,
}

/// Sandbox / reputation status of a vault document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    Pending,
    Clean,
    Flagged,
}

/// Reference to a document held in the external vault.
///
/// Tracemark never owns document storage — this record exists so the
/// verification path can recognize an unmarked original by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub org_id: OrgId,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    /// SHA-256 of the stored (pre-watermark) content.
    pub doc_hash: String,
    pub quarantined: bool,
    pub sandbox_status: SandboxStatus,
}

/// How an artifact was matched during verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// A signed payload was extracted from the artifact itself.
    Embedded,
    /// No payload, but the artifact hash matched a recorded watermarked file.
    Hash,
    /// The artifact is a known pre-watermark original — no per-user mark.
    Original,
}

/// Outcome of resolving "who produced this artifact".
///
/// A forged or corrupted signature is reported as `signature_valid == false`
/// with the extracted metadata intact — a broken mark is itself forensic
/// signal, distinct from "no mark at all".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub match_method: MatchMethod,
    pub signature_valid: bool,
    pub watermark_id: Option<WatermarkId>,
    pub forensic_id: Option<String>,
    pub document_hash: Option<String>,
    pub issued_at: Option<String>,
    /// Email of the matched downloader, or `"Unknown"` when the payload did
    /// not correspond to any recorded event. `None` for original-file matches.
    pub matched_identity: Option<String>,
    /// SHA-256 of the heuristically recovered pre-watermark bytes, when the
    /// extraction produced one.
    pub recovered_original_hash: Option<String>,
}
