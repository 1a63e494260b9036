// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-organization snapshot store.
//
// The persisted engine performs whole-snapshot read-modify-write: one JSON
// snapshot row per org, updated inside a transaction. All writes go through
// a single mutex-guarded connection, which serializes concurrent mutations
// to the same org and so protects the audit hash-chain invariant.
//
// Schema:
//   org_state(
//     org_id      TEXT PRIMARY KEY,
//     snapshot    TEXT NOT NULL,   -- JSON-serialized OrgState
//     updated_at  TEXT NOT NULL    -- RFC 3339
//   )

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tracemark_core::error::{Result, TracemarkError};
use tracemark_core::{
    AuditEvent, DocumentRecord, OrgConfig, OrgId, VerificationRequest, WatermarkEvent,
};

/// Convert a `rusqlite::Error` into a `TracemarkError::Database`.
fn db_err(e: rusqlite::Error) -> TracemarkError {
    TracemarkError::Database(e.to_string())
}

/// Everything Tracemark persists for one organization.
///
/// Event lists are kept most-recent-first; the audit head is the hash of
/// the newest audit event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgState {
    pub config: Option<OrgConfig>,
    pub watermark_events: Vec<WatermarkEvent>,
    pub audit_events: Vec<AuditEvent>,
    pub audit_head: Option<String>,
    pub verification_requests: Vec<VerificationRequest>,
    pub vault_documents: Vec<DocumentRecord>,
}

/// Repository boundary over the persisted store.
///
/// `update` is the only mutation path: it loads the org snapshot, applies
/// the closure, and saves atomically. Implementations must serialize
/// updates to the same org.
pub trait OrgStateStore: Send + Sync {
    /// Read-only snapshot of an org's state (default state if absent).
    fn load(&self, org: &OrgId) -> Result<OrgState>;

    /// Atomic read-modify-write of an org's snapshot. The closure's error
    /// aborts the update and nothing is persisted.
    fn update(
        &self,
        org: &OrgId,
        apply: &mut dyn FnMut(&mut OrgState) -> Result<()>,
    ) -> Result<()>;
}

/// Run a typed closure against an org's state via the object-safe trait.
///
/// Exists because `update` takes `&mut dyn FnMut(..)` for object safety;
/// this wrapper smuggles the closure's return value back out.
pub fn with_state<T>(
    store: &dyn OrgStateStore,
    org: &OrgId,
    apply: impl FnOnce(&mut OrgState) -> Result<T>,
) -> Result<T> {
    let mut apply = Some(apply);
    let mut out = None;
    store.update(org, &mut |state| {
        let f = apply.take().ok_or_else(|| {
            TracemarkError::Database("state update closure called more than once".into())
        })?;
        out = Some(f(state)?);
        Ok(())
    })?;
    out.ok_or_else(|| TracemarkError::Database("state update produced no result".into()))
}

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

/// Snapshot store backed by a SQLite database.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open (or create) the state database at `path`.
    ///
    /// The `org_state` table is created automatically if it does not already
    /// exist. WAL mode is enabled for better concurrent-read performance.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(db_err)?;
        Self::init_schema(&conn)?;
        debug!("state store opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory state database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init_schema(&conn)?;
        debug!("in-memory state store opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS org_state (
                org_id      TEXT PRIMARY KEY,
                snapshot    TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );",
        )
        .map_err(db_err)
    }

    fn read_snapshot(conn: &Connection, org: &OrgId) -> Result<OrgState> {
        let row: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM org_state WHERE org_id = ?1",
                params![org.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        match row {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(OrgState::default()),
        }
    }
}

impl OrgStateStore for SqliteStateStore {
    fn load(&self, org: &OrgId) -> Result<OrgState> {
        let conn = self.conn.lock().expect("state store lock poisoned");
        Self::read_snapshot(&conn, org)
    }

    #[instrument(skip(self, apply), fields(org = %org))]
    fn update(
        &self,
        org: &OrgId,
        apply: &mut dyn FnMut(&mut OrgState) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self.conn.lock().expect("state store lock poisoned");
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let mut state = Self::read_snapshot(&tx, org)?;
        apply(&mut state)?;

        let snapshot = serde_json::to_string(&state)?;
        tx.execute(
            "INSERT INTO org_state (org_id, snapshot, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(org_id) DO UPDATE SET snapshot = ?2, updated_at = ?3",
            params![org.as_str(), snapshot, Utc::now().to_rfc3339()],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        debug!("org snapshot updated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store for tests and embedding into other test harnesses.
#[derive(Default)]
pub struct MemoryStateStore {
    orgs: Mutex<HashMap<String, OrgState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrgStateStore for MemoryStateStore {
    fn load(&self, org: &OrgId) -> Result<OrgState> {
        let orgs = self.orgs.lock().expect("memory store lock poisoned");
        Ok(orgs.get(org.as_str()).cloned().unwrap_or_default())
    }

    fn update(
        &self,
        org: &OrgId,
        apply: &mut dyn FnMut(&mut OrgState) -> Result<()>,
    ) -> Result<()> {
        let mut orgs = self.orgs.lock().expect("memory store lock poisoned");
        // Apply against a copy so a failing closure leaves state untouched,
        // matching the SQLite transaction semantics.
        let mut state = orgs.get(org.as_str()).cloned().unwrap_or_default();
        apply(&mut state)?;
        orgs.insert(org.as_str().to_owned(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracemark_core::OrgConfig;

    fn org() -> OrgId {
        OrgId::new("org_1")
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStateStore::new();
        with_state(&store, &org(), |state| {
            state.config = Some(OrgConfig::new(org(), "owner@example.com"));
            Ok(())
        })
        .unwrap();

        let state = store.load(&org()).unwrap();
        assert_eq!(state.config.unwrap().owner_email, "owner@example.com");
    }

    #[test]
    fn memory_store_failed_update_leaves_state_untouched() {
        let store = MemoryStateStore::new();
        with_state(&store, &org(), |state| {
            state.config = Some(OrgConfig::new(org(), "owner@example.com"));
            Ok(())
        })
        .unwrap();

        let result: Result<()> = with_state(&store, &org(), |state| {
            state.config = None;
            Err(TracemarkError::Validation("boom".into()))
        });
        assert!(result.is_err());

        let state = store.load(&org()).unwrap();
        assert!(state.config.is_some(), "aborted update must not persist");
    }

    #[test]
    fn sqlite_store_round_trip_in_memory() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        with_state(&store, &org(), |state| {
            state.audit_head = Some("abc".into());
            Ok(())
        })
        .unwrap();

        let state = store.load(&org()).unwrap();
        assert_eq!(state.audit_head.as_deref(), Some("abc"));
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        {
            let store = SqliteStateStore::open(&path).unwrap();
            with_state(&store, &org(), |state| {
                state.audit_head = Some("persisted".into());
                Ok(())
            })
            .unwrap();
        }

        let store = SqliteStateStore::open(&path).unwrap();
        let state = store.load(&org()).unwrap();
        assert_eq!(state.audit_head.as_deref(), Some("persisted"));
    }

    #[test]
    fn sqlite_store_failed_update_rolls_back() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        let result: Result<()> = with_state(&store, &org(), |state| {
            state.audit_head = Some("should not persist".into());
            Err(TracemarkError::Validation("boom".into()))
        });
        assert!(result.is_err());

        let state = store.load(&org()).unwrap();
        assert!(state.audit_head.is_none());
    }

    /// Hammer one org from several threads and check that serialized
    /// snapshot writes kept the audit chain intact with nothing lost.
    fn concurrent_appends_keep_the_chain(store: std::sync::Arc<dyn OrgStateStore>) {
        use crate::chain;
        use tracemark_core::AuditSeverity;

        const THREADS: usize = 4;
        const APPENDS: usize = 25;

        let mut handles = Vec::new();
        for t in 0..THREADS {
            let store = std::sync::Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for n in 0..APPENDS {
                    with_state(store.as_ref(), &org(), |state| {
                        chain::append(
                            state,
                            &org(),
                            "owner@example.com",
                            &format!("op.{t}.{n}"),
                            serde_json::json!({}),
                            AuditSeverity::Info,
                            "test",
                        );
                        Ok(())
                    })
                    .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let state = store.load(&org()).unwrap();
        assert_eq!(state.audit_events.len(), THREADS * APPENDS, "no append may be lost");
        assert!(crate::chain::verify_chain(&state.audit_events));
        assert_eq!(
            state.audit_head.as_deref(),
            Some(state.audit_events[0].hash.as_str())
        );
    }

    #[test]
    fn sqlite_store_serializes_concurrent_appends() {
        concurrent_appends_keep_the_chain(std::sync::Arc::new(
            SqliteStateStore::open_in_memory().unwrap(),
        ));
    }

    #[test]
    fn memory_store_serializes_concurrent_appends() {
        concurrent_appends_keep_the_chain(std::sync::Arc::new(MemoryStateStore::new()));
    }

    #[test]
    fn orgs_are_isolated() {
        let store = MemoryStateStore::new();
        with_state(&store, &OrgId::new("org_a"), |state| {
            state.audit_head = Some("a".into());
            Ok(())
        })
        .unwrap();

        let other = store.load(&OrgId::new("org_b")).unwrap();
        assert!(other.audit_head.is_none());
    }
}
