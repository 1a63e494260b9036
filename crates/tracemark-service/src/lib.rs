// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tracemark-service — External service facade for the Tracemark core.
//
// Exposes the transport-agnostic operations (org config, embed, event
// listing, owner-gated verification, verification requests, audit append
// and listing) on top of the forensics and ledger crates, with delegated
// notification and reputation side effects that never gate the embed path.

pub mod hooks;
pub mod service;
pub mod verify;

pub use hooks::{NoopNotifier, NoopScanner, Notifier, ReputationScanner};
pub use service::{EmbedDocument, EmbedOutcome, ForensicsService, VerifyOutcome};
pub use verify::resolve;
