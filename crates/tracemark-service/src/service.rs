// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service facade — initialises the forensics subsystems over a
// shared state store and exposes the transport-agnostic operations.
//
// All core operations are synchronous and CPU-bound. Writes for one org are
// serialized by the store; notification and reputation hooks are fired
// after commit and never gate the embed/download path.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use tracemark_core::error::{Result, TracemarkError};
use tracemark_core::{
    AuditEvent, AuditSeverity, DocumentRecord, OrgConfig, OrgConfigView, OrgId, RequestId,
    UserIdentity, VerificationRequest, VerificationResult, VerificationStatus, WatermarkEvent,
    WatermarkId,
};
use tracemark_forensics::{embed, hash_bytes, WatermarkPayload, WatermarkedDocument};
use tracemark_ledger::{chain, events, orgs, with_state, OrgStateStore};

use crate::hooks::{NoopNotifier, NoopScanner, Notifier, ReputationScanner};
use crate::verify;

/// Audit `source` tag for operations of this facade.
const AUDIT_SOURCE: &str = "forensics";

/// Document handed in for embedding: content plus vault metadata.
#[derive(Debug, Clone)]
pub struct EmbedDocument {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

/// What an embed operation returns: the watermarked artifact and the
/// ledger event recorded for it.
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    pub document: WatermarkedDocument,
    pub event: WatermarkEvent,
}

/// Outcome of a verification attempt.
///
/// Non-owners never reach `Resolved` — their attempt is queued as a pending
/// request and returns no identity data.
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Resolved(VerificationResult),
    Queued(VerificationRequest),
}

/// Shared forensics service. Cheaply cloneable (Arc-wrapped collaborators)
/// so it can be handed to request handlers and spawned tasks.
#[derive(Clone)]
pub struct ForensicsService {
    store: Arc<dyn OrgStateStore>,
    notifier: Arc<dyn Notifier>,
    scanner: Arc<dyn ReputationScanner>,
}

impl ForensicsService {
    pub fn new(store: Arc<dyn OrgStateStore>) -> Self {
        Self {
            store,
            notifier: Arc::new(NoopNotifier),
            scanner: Arc::new(NoopScanner),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn ReputationScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    // -- Org configuration ---------------------------------------------------

    /// Current forensics config for the org, created lazily on first touch.
    pub fn get_org_config(&self, org: &OrgId, owner_email: &str) -> Result<OrgConfigView> {
        with_state(self.store.as_ref(), org, |state| {
            Ok(orgs::ensure_config(state, org, owner_email).view())
        })
    }

    /// Enable or disable watermarking. The signing secret is generated on
    /// first enable and never regenerated afterwards.
    #[instrument(skip(self), fields(org = %org, enable))]
    pub fn set_org_config(&self, org: &OrgId, owner_email: &str, enable: bool) -> Result<OrgConfigView> {
        with_state(self.store.as_ref(), org, |state| {
            let config = orgs::ensure_config(state, org, owner_email);
            config.watermarking_enabled = enable;
            if enable {
                orgs::ensure_secret(config)?;
            }
            let view = config.view();
            chain::append(
                state,
                org,
                owner_email,
                if enable { "forensics.watermarking.enabled" } else { "forensics.watermarking.disabled" },
                serde_json::json!({}),
                AuditSeverity::Info,
                AUDIT_SOURCE,
            );
            Ok(view)
        })
    }

    // -- Embedding -----------------------------------------------------------

    /// Sign and embed a per-download watermark into `document`, record the
    /// ledger event, and append to the audit chain — all in one atomic
    /// snapshot update. The reputation hook fires after commit.
    #[instrument(skip(self, document, user), fields(org = %org, filename = %document.filename))]
    pub fn embed_watermark(
        &self,
        org: &OrgId,
        owner_email: &str,
        feature_enabled: bool,
        document: &EmbedDocument,
        user: &UserIdentity,
    ) -> Result<EmbedOutcome> {
        if document.filename.is_empty() {
            return Err(TracemarkError::Validation("document filename is required".into()));
        }
        if document.content.is_empty() {
            return Err(TracemarkError::Validation("document content is empty".into()));
        }
        if user.email.is_empty() {
            return Err(TracemarkError::Validation("user email is required".into()));
        }
        if !feature_enabled {
            return Err(TracemarkError::Configuration(
                "watermarking feature is not enabled for this plan".into(),
            ));
        }

        let outcome = with_state(self.store.as_ref(), org, |state| {
            let config = orgs::ensure_config(state, org, owner_email);
            if !config.watermarking_enabled {
                return Err(TracemarkError::Configuration(
                    "watermarking is disabled for this organization".into(),
                ));
            }
            let secret = orgs::ensure_secret(config)?;

            let document_hash = hash_bytes(&document.content);
            let watermark_id = WatermarkId::generate();
            let payload =
                WatermarkPayload::new(&secret, watermark_id.as_str(), &document_hash, None);
            let marked = embed(
                &document.content,
                &document.filename,
                &document.mime_type,
                &payload.encode(),
            );
            let watermarked_hash = hash_bytes(&marked.bytes);

            let event = events::record_embed(
                state,
                org,
                events::EmbedRecord {
                    watermark_id: &watermark_id,
                    document_id: &document.id,
                    document_hash: &document_hash,
                    watermarked_hash: &watermarked_hash,
                    user,
                    wrapped: marked.wrapped,
                    output_filename: &marked.filename,
                },
            );
            chain::append(
                state,
                org,
                &user.email,
                "watermark.embed",
                serde_json::json!({
                    "watermark_id": watermark_id.as_str(),
                    "forensic_id": event.forensic_id,
                    "document_id": document.id,
                    "output_filename": marked.filename,
                    "wrapped": marked.wrapped,
                }),
                AuditSeverity::Info,
                AUDIT_SOURCE,
            );
            Ok(EmbedOutcome { document: marked, event })
        })?;

        info!(forensic_id = %outcome.event.forensic_id, "watermark embedded");

        let scanner = Arc::clone(&self.scanner);
        let scan_org = org.clone();
        let scan_hash = outcome.event.document_hash.clone();
        let scan_name = document.filename.clone();
        spawn_detached(move || scanner.scan(&scan_org, &scan_hash, &scan_name));

        Ok(outcome)
    }

    /// Watermark events for the org, most recent first.
    pub fn list_watermark_events(
        &self,
        org: &OrgId,
        limit: Option<usize>,
    ) -> Result<Vec<WatermarkEvent>> {
        let state = self.store.load(org)?;
        Ok(events::list(&state, limit))
    }

    // -- Verification --------------------------------------------------------

    /// Resolve "who produced this artifact".
    ///
    /// Owners resolve directly; any other caller gets a pending
    /// [`VerificationRequest`] and no identity data. A complete miss is a
    /// `NotFound` error (still audited).
    #[instrument(skip(self, bytes), fields(org = %org, caller = %caller_email, len = bytes.len()))]
    pub fn verify_watermark(
        &self,
        org: &OrgId,
        caller_email: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<VerifyOutcome> {
        let outcome = with_state(self.store.as_ref(), org, |state| {
            let Some(config) = state.config.clone() else {
                return Err(TracemarkError::Configuration(
                    "forensics is not configured for this organization".into(),
                ));
            };

            if !config.owner_email.eq_ignore_ascii_case(caller_email) {
                let request =
                    queue_request(state, org, caller_email, filename, &hash_bytes(bytes));
                return Ok(Some(VerifyOutcome::Queued(request)));
            }

            match verify::resolve(state, bytes) {
                Some(result) => {
                    chain::append(
                        state,
                        org,
                        caller_email,
                        "watermark.verified",
                        serde_json::json!({
                            "match_method": result.match_method,
                            "signature_valid": result.signature_valid,
                            "forensic_id": result.forensic_id,
                        }),
                        AuditSeverity::Info,
                        AUDIT_SOURCE,
                    );
                    Ok(Some(VerifyOutcome::Resolved(result)))
                }
                None => {
                    chain::append(
                        state,
                        org,
                        caller_email,
                        "watermark.verify.not_found",
                        serde_json::json!({ "filename": filename }),
                        AuditSeverity::Warning,
                        AUDIT_SOURCE,
                    );
                    Ok(None)
                }
            }
        })?;

        match outcome {
            Some(VerifyOutcome::Queued(request)) => {
                warn!(request = %request.id, "non-owner verification attempt queued");
                let notifier = Arc::clone(&self.notifier);
                let notify = request.clone();
                spawn_detached(move || notifier.request_created(&notify));
                Ok(VerifyOutcome::Queued(request))
            }
            Some(resolved) => Ok(resolved),
            None => Err(TracemarkError::NotFound("no forensic watermark found".into())),
        }
    }

    /// File a verification request directly (the explicit, non-owner path).
    pub fn create_verification_request(
        &self,
        org: &OrgId,
        requester_email: &str,
        filename: &str,
        file_hash: &str,
    ) -> Result<VerificationRequest> {
        if requester_email.is_empty() || filename.is_empty() || file_hash.is_empty() {
            return Err(TracemarkError::Validation(
                "requester email, filename, and file hash are required".into(),
            ));
        }
        let request = with_state(self.store.as_ref(), org, |state| {
            Ok(queue_request(state, org, requester_email, filename, file_hash))
        })?;

        let notifier = Arc::clone(&self.notifier);
        let notify = request.clone();
        spawn_detached(move || notifier.request_created(&notify));
        Ok(request)
    }

    /// Verification requests for the org, most recent first.
    pub fn list_verification_requests(&self, org: &OrgId) -> Result<Vec<VerificationRequest>> {
        let state = self.store.load(org)?;
        Ok(state.verification_requests.clone())
    }

    /// Owner approves or denies a pending request. Terminal either way;
    /// the requester is notified after commit.
    ///
    /// Approval is a governance gate only — the owner must still re-run
    /// verification with the real artifact.
    #[instrument(skip(self), fields(org = %org, request = %request_id, approve))]
    pub fn update_verification_request_status(
        &self,
        org: &OrgId,
        caller_email: &str,
        request_id: RequestId,
        approve: bool,
    ) -> Result<VerificationRequest> {
        let request = with_state(self.store.as_ref(), org, |state| {
            let Some(config) = state.config.clone() else {
                return Err(TracemarkError::Configuration(
                    "forensics is not configured for this organization".into(),
                ));
            };
            if !config.owner_email.eq_ignore_ascii_case(caller_email) {
                return Err(TracemarkError::Authorization(
                    "only the organization owner may resolve verification requests".into(),
                ));
            }

            let request = state
                .verification_requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| {
                    TracemarkError::NotFound(format!("verification request {request_id} not found"))
                })?;
            if request.status.is_terminal() {
                return Err(TracemarkError::Validation(
                    "verification request is already resolved".into(),
                ));
            }

            request.status = if approve {
                VerificationStatus::Approved
            } else {
                VerificationStatus::Denied
            };
            request.approved_by = Some(caller_email.to_owned());
            request.approved_at = Some(chrono::Utc::now());
            let resolved = request.clone();

            chain::append(
                state,
                org,
                caller_email,
                if approve { "verification.request.approved" } else { "verification.request.denied" },
                serde_json::json!({ "request_id": resolved.id, "requester": resolved.requester_email }),
                AuditSeverity::Info,
                AUDIT_SOURCE,
            );
            Ok(resolved)
        })?;

        let notifier = Arc::clone(&self.notifier);
        let notify = request.clone();
        spawn_detached(move || notifier.request_resolved(&notify));
        Ok(request)
    }

    // -- Audit trail ---------------------------------------------------------

    /// Append an administrative event to the org's hash chain.
    pub fn append_audit_event(
        &self,
        org: &OrgId,
        actor_email: &str,
        action: &str,
        metadata: serde_json::Value,
        severity: AuditSeverity,
        source: &str,
    ) -> Result<AuditEvent> {
        if actor_email.is_empty() || action.is_empty() {
            return Err(TracemarkError::Validation("actor email and action are required".into()));
        }
        with_state(self.store.as_ref(), org, |state| {
            Ok(chain::append(state, org, actor_email, action, metadata, severity, source))
        })
    }

    /// Audit events for the org, most recent first.
    pub fn list_audit_events(&self, org: &OrgId, limit: Option<usize>) -> Result<Vec<AuditEvent>> {
        let state = self.store.load(org)?;
        Ok(chain::list(&state, limit))
    }

    /// Recompute every event hash in the org's chain against its stored
    /// prev_hash. `false` means the log was edited or truncated.
    pub fn verify_audit_chain(&self, org: &OrgId) -> Result<bool> {
        let state = self.store.load(org)?;
        Ok(chain::verify_chain(&state.audit_events))
    }

    // -- Vault glue ----------------------------------------------------------

    /// Register (or refresh) a vault document reference so verification can
    /// recognize an unmarked original by hash.
    pub fn register_document(&self, org: &OrgId, record: DocumentRecord) -> Result<()> {
        if record.doc_hash.is_empty() {
            return Err(TracemarkError::Validation("document hash is required".into()));
        }
        with_state(self.store.as_ref(), org, |state| {
            state.vault_documents.retain(|d| d.id != record.id);
            state.vault_documents.insert(0, record.clone());
            Ok(())
        })
    }

    /// The org config record itself, for collaborators that need the owner
    /// (never exposes the secret).
    pub fn owner_of(&self, org: &OrgId) -> Result<Option<String>> {
        let state = self.store.load(org)?;
        Ok(state.config.map(|c: OrgConfig| c.owner_email))
    }
}

/// Queue a pending verification request, audited. Carries only the filename
/// and content hash — never the raw content.
fn queue_request(
    state: &mut tracemark_ledger::OrgState,
    org: &OrgId,
    requester_email: &str,
    filename: &str,
    file_hash: &str,
) -> VerificationRequest {
    let request = VerificationRequest {
        id: RequestId::new(),
        org_id: org.clone(),
        requester_email: requester_email.to_owned(),
        filename: filename.to_owned(),
        file_hash: file_hash.to_owned(),
        status: VerificationStatus::Pending,
        approved_by: None,
        approved_at: None,
        created_at: chrono::Utc::now(),
    };
    state.verification_requests.insert(0, request.clone());
    chain::append(
        state,
        org,
        requester_email,
        "verification.requested",
        serde_json::json!({ "request_id": request.id, "filename": filename }),
        AuditSeverity::Info,
        AUDIT_SOURCE,
    );
    request
}

/// Run a side-effect hook without gating the caller: on the tokio task pool
/// when a runtime is present, on a detached thread otherwise. Either way a
/// slow hook never blocks the embed/download return path.
fn spawn_detached(task: impl FnOnce() + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { task() });
        }
        Err(_) => {
            std::thread::spawn(task);
        }
    }
}
