// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit hash chain — append-only, per-org tamper-evident event log.
//
// hash = SHA-256(canonical_json(core fields) ++ prev_hash-or-empty)
//
// The canonical form is the serde_json serialization of `CoreFields`, whose
// field order is fixed by declaration. Recomputing each event's hash from
// its stored prev_hash must reproduce the stored hash; any edit or deletion
// breaks the chain from that point forward.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use uuid::Uuid;

use tracemark_core::{AuditEvent, AuditSeverity, OrgId};

use crate::store::OrgState;

/// The fields covered by the event hash, in canonical order.
#[derive(Serialize)]
struct CoreFields<'a> {
    id: &'a Uuid,
    org_id: &'a str,
    actor_email: &'a str,
    action: &'a str,
    metadata: &'a serde_json::Value,
    severity: &'a AuditSeverity,
    source: &'a str,
    timestamp: &'a DateTime<Utc>,
}

fn canonical_core(event: &AuditEvent) -> String {
    let core = CoreFields {
        id: &event.id,
        org_id: event.org_id.as_str(),
        actor_email: &event.actor_email,
        action: &event.action,
        metadata: &event.metadata,
        severity: &event.severity,
        source: &event.source,
        timestamp: &event.timestamp,
    };
    serde_json::to_string(&core).expect("core field serialization is infallible")
}

/// Recompute an event's hash from its core fields and stored `prev_hash`.
pub fn event_hash(event: &AuditEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_core(event).as_bytes());
    if let Some(prev) = &event.prev_hash {
        hasher.update(prev.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Append an event to the org chain and advance the head.
#[instrument(skip(state, metadata), fields(org = %org, %action))]
pub fn append(
    state: &mut OrgState,
    org: &OrgId,
    actor_email: &str,
    action: &str,
    metadata: serde_json::Value,
    severity: AuditSeverity,
    source: &str,
) -> AuditEvent {
    let mut event = AuditEvent {
        id: Uuid::new_v4(),
        org_id: org.clone(),
        actor_email: actor_email.to_owned(),
        action: action.to_owned(),
        metadata,
        severity,
        source: source.to_owned(),
        timestamp: Utc::now(),
        prev_hash: state.audit_head.clone(),
        hash: String::new(),
    };
    event.hash = event_hash(&event);

    state.audit_head = Some(event.hash.clone());
    state.audit_events.insert(0, event.clone());
    debug!(hash = %event.hash, "audit event appended");
    event
}

/// Audit events for the org, most recent first, optionally limited.
pub fn list(state: &OrgState, limit: Option<usize>) -> Vec<AuditEvent> {
    let take = limit.unwrap_or(state.audit_events.len());
    state.audit_events.iter().take(take).cloned().collect()
}

/// Verify the whole chain (stored most-recent-first).
///
/// Walks oldest to newest, checking both the per-event hash recomputation
/// and the prev-hash linkage.
pub fn verify_chain(events_newest_first: &[AuditEvent]) -> bool {
    let mut prev: Option<&str> = None;
    for event in events_newest_first.iter().rev() {
        if event.prev_hash.as_deref() != prev {
            return false;
        }
        if event_hash(event) != event.hash {
            return false;
        }
        prev = Some(&event.hash);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append_one(state: &mut OrgState, action: &str) -> AuditEvent {
        append(
            state,
            &OrgId::new("org_1"),
            "owner@example.com",
            action,
            serde_json::json!({ "n": action }),
            AuditSeverity::Info,
            "test",
        )
    }

    #[test]
    fn first_event_has_no_prev_hash() {
        let mut state = OrgState::default();
        let a = append_one(&mut state, "a");
        assert!(a.prev_hash.is_none());
        assert_eq!(state.audit_head.as_deref(), Some(a.hash.as_str()));
    }

    #[test]
    fn three_event_chain_links_correctly() {
        let mut state = OrgState::default();
        let a = append_one(&mut state, "a");
        let b = append_one(&mut state, "b");
        let c = append_one(&mut state, "c");

        assert_eq!(b.prev_hash.as_deref(), Some(a.hash.as_str()));
        assert_eq!(c.prev_hash.as_deref(), Some(b.hash.as_str()));
        assert_eq!(event_hash(&b), b.hash);
        assert_eq!(state.audit_head.as_deref(), Some(c.hash.as_str()));

        // Stored newest-first.
        assert_eq!(state.audit_events[0].action, "c");
        assert_eq!(state.audit_events[2].action, "a");
        assert!(verify_chain(&state.audit_events));
    }

    #[test]
    fn mutating_one_event_invalidates_it_and_later_events() {
        let mut state = OrgState::default();
        append_one(&mut state, "a");
        append_one(&mut state, "b");
        append_one(&mut state, "c");

        // Tamper with the middle event (index 1 = "b" in newest-first order).
        state.audit_events[1].action = "b-forged".into();
        assert!(!verify_chain(&state.audit_events));

        // The tampered event itself no longer matches its stored hash.
        assert_ne!(event_hash(&state.audit_events[1]), state.audit_events[1].hash);
        // And its successor's prev_hash still points at the original hash,
        // so re-hashing the forged event cannot repair the chain.
        let forged_rehash = event_hash(&state.audit_events[1]);
        assert_ne!(
            state.audit_events[0].prev_hash.as_deref(),
            Some(forged_rehash.as_str())
        );
    }

    #[test]
    fn deleting_an_event_breaks_the_chain() {
        let mut state = OrgState::default();
        append_one(&mut state, "a");
        append_one(&mut state, "b");
        append_one(&mut state, "c");

        state.audit_events.remove(1);
        assert!(!verify_chain(&state.audit_events));
    }

    #[test]
    fn empty_chain_verifies() {
        assert!(verify_chain(&[]));
    }

    #[test]
    fn chains_are_per_org() {
        let mut state_a = OrgState::default();
        let mut state_b = OrgState::default();
        let a = append_one(&mut state_a, "x");
        let b = append(
            &mut state_b,
            &OrgId::new("org_2"),
            "owner@example.com",
            "x",
            serde_json::json!({}),
            AuditSeverity::Info,
            "test",
        );
        assert!(a.prev_hash.is_none());
        assert!(b.prev_hash.is_none());
        assert_ne!(a.hash, b.hash);
    }
}
