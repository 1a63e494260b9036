// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end walkthrough: enable forensics for an org, embed an
// identity-bound watermark into a downloaded document, then resolve a
// "leaked" copy back to the downloader and check the audit chain.
//
//   cargo run --example leak_trace

use std::sync::Arc;

use tracemark_core::{OrgId, UserIdentity};
use tracemark_ledger::SqliteStateStore;
use tracemark_service::{EmbedDocument, ForensicsService, VerifyOutcome};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let org = OrgId::new("org_demo");
    let owner = "owner@example.com";

    let store = Arc::new(SqliteStateStore::open_in_memory()?);
    let service = ForensicsService::new(store);

    service.set_org_config(&org, owner, true)?;
    tracing::info!("watermarking enabled for {org}");

    let document = EmbedDocument {
        id: "doc_1".into(),
        filename: "board-minutes.txt".into(),
        mime_type: "text/plain".into(),
        content: b"Minutes of the board meeting, strictly confidential.".to_vec(),
    };
    let downloader = UserIdentity {
        id: "u_42".into(),
        email: "mallory@example.com".into(),
        full_name: "Mallory Mole".into(),
        role: "analyst".into(),
    };

    let outcome = service.embed_watermark(&org, owner, true, &document, &downloader)?;
    tracing::info!(
        forensic_id = %outcome.event.forensic_id,
        wrapped = outcome.document.wrapped,
        "download watermarked"
    );

    // Later, a copy surfaces. The owner resolves it.
    match service.verify_watermark(&org, owner, "surfaced.txt", &outcome.document.bytes)? {
        VerifyOutcome::Resolved(result) => {
            println!(
                "leak traced: identity={:?} signature_valid={} method={:?}",
                result.matched_identity, result.signature_valid, result.match_method
            );
        }
        VerifyOutcome::Queued(request) => {
            println!("queued for approval: {}", request.id);
        }
    }

    println!("audit chain intact: {}", service.verify_audit_chain(&org)?);
    for event in service.list_audit_events(&org, Some(10))? {
        println!("  [{}] {} by {}", event.timestamp, event.action, event.actor_email);
    }
    Ok(())
}
