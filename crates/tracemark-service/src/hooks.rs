// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Delegated side effects — notification delivery and reputation lookups
// live outside this core. The service fires these hooks after its own
// state has committed; implementations must be cheap and must not fail the
// calling operation.

use tracing::debug;

use tracemark_core::{OrgId, VerificationRequest};

/// Notification delivery for the verification request workflow.
pub trait Notifier: Send + Sync {
    /// A non-owner filed a new request (owner should review it).
    fn request_created(&self, request: &VerificationRequest);

    /// The owner approved or denied a request (requester should hear back).
    fn request_resolved(&self, request: &VerificationRequest);
}

/// Hash-based reputation lookup fired after each embed. Fire-and-forget:
/// the embed/download path never waits on it.
pub trait ReputationScanner: Send + Sync {
    fn scan(&self, org: &OrgId, document_hash: &str, filename: &str);
}

/// Default notifier that only logs.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn request_created(&self, request: &VerificationRequest) {
        debug!(request = %request.id, "verification request created (no notifier configured)");
    }

    fn request_resolved(&self, request: &VerificationRequest) {
        debug!(request = %request.id, status = ?request.status, "verification request resolved (no notifier configured)");
    }
}

/// Default scanner that only logs.
pub struct NoopScanner;

impl ReputationScanner for NoopScanner {
    fn scan(&self, org: &OrgId, document_hash: &str, _filename: &str) {
        debug!(%org, document_hash, "reputation scan skipped (no scanner configured)");
    }
}
