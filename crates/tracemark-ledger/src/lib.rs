// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tracemark-ledger — Persisted per-organization state for Tracemark.
//
// Provides the snapshot store (SQLite-backed with an in-memory variant for
// tests), lazy org configuration with generate-once signing secrets, the
// immutable watermark event ledger, and the hash-chained audit log.

pub mod chain;
pub mod events;
pub mod orgs;
pub mod store;

pub use store::{with_state, MemoryStateStore, OrgState, OrgStateStore, SqliteStateStore};
