//! # Durable Triple Store
//!
//! SQLite-backed storage for statements, with explicit transaction scopes.
//!
//! ## Table Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                          Schema Overview                           │
//! ├────────────────────────────────────────────────────────────────────┤
//! │                                                                    │
//! │  triples (WITHOUT ROWID)                 namespaces                │
//! │  ┌──────────────────────────────┐        ┌──────────────────┐      │
//! │  │ s_kind, s_value              │        │ prefix (PK)      │      │
//! │  │ p                            │  PK =  │ namespace        │      │
//! │  │ o_kind, o_value,             │  all   └──────────────────┘      │
//! │  │ o_datatype, o_lang           │  cols                            │
//! │  └──────────────────────────────┘        tripleflow_metadata       │
//! │   + index (p, o_kind, o_value)           ┌──────────────────┐      │
//! │   + index (o_kind, o_value, s_kind, ..)  │ key (PK) │ value │      │
//! │                                          └──────────────────┘      │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Discipline
//!
//! - **One writer**: all write transactions go through a single connection
//!   behind a mutex, opened with `BEGIN IMMEDIATE`.
//! - **Many readers**: file-backed stores hand out read-only connections from
//!   a small idle pool. WAL mode lets readers see a consistent snapshot while
//!   a write is in progress.
//! - **In-memory stores** have only one connection, so reads and writes take
//!   turns on it.
//!
//! ## Lifecycle
//!
//! ```text
//!   new() ──open(path) / open_in_memory()──► open ──close()──► closed
//!     │                                                          │
//!     └──────────── any operation: Error::NotOpen ◄──────────────┘
//! ```
//!
//! Operations already running when `close` is called finish normally; the
//! connections are released when the last of them returns.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use oxrdf::{NamedNode, Subject, Term, Triple};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OpenFlags, OptionalExtension, Transaction,
    TransactionBehavior,
};
use tracing::{debug, info};

use crate::batch::Batch;
use crate::codec::{decode_object, decode_subject, encode_object, encode_subject};
use crate::eval::TripleSource;
use crate::{Error, Result};

// =============================================================================
// Schema
// =============================================================================

/// Current schema version. There are no migrations: a mismatch is an error.
const SCHEMA_VERSION: i32 = 1;

/// How long a connection waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle read-only connections kept for reuse.
const MAX_IDLE_READERS: usize = 8;

/// Statements, one row per distinct triple.
///
/// Every column is part of the primary key, so `INSERT OR IGNORE` turns a
/// duplicate insert into a no-op. `WITHOUT ROWID` stores the rows in the
/// primary-key B-tree itself, which gives subject-first lookups for free.
const CREATE_TRIPLES: &str = r#"
CREATE TABLE IF NOT EXISTS triples (
    s_kind     INTEGER NOT NULL,
    s_value    TEXT NOT NULL,
    p          TEXT NOT NULL,
    o_kind     INTEGER NOT NULL,
    o_value    TEXT NOT NULL,
    o_datatype TEXT NOT NULL DEFAULT '',
    o_lang     TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (s_kind, s_value, p, o_kind, o_value, o_datatype, o_lang)
) WITHOUT ROWID
"#;

/// Predicate-first lookups (`?s ex:p ?o`, `?s ex:p "v"`).
const CREATE_TRIPLES_POS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS triples_pos
ON triples(p, o_kind, o_value)
"#;

/// Object-first lookups (`?s ?p ex:o`).
const CREATE_TRIPLES_OSP_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS triples_osp
ON triples(o_kind, o_value, s_kind, s_value)
"#;

/// Prefixes seen in loaded batches.
const CREATE_NAMESPACES: &str = r#"
CREATE TABLE IF NOT EXISTS namespaces (
    prefix    TEXT PRIMARY KEY,
    namespace TEXT NOT NULL
)
"#;

const CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS tripleflow_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

const INSERT_TRIPLE: &str = "INSERT OR IGNORE INTO triples \
    (s_kind, s_value, p, o_kind, o_value, o_datatype, o_lang) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const UPSERT_NAMESPACE: &str =
    "INSERT OR REPLACE INTO namespaces (prefix, namespace) VALUES (?1, ?2)";

/// Creates tables and checks the schema version on the write connection.
fn initialize(conn: &Connection) -> Result<()> {
    // WAL: readers keep a snapshot while the writer appends to the log.
    // In-memory databases answer "memory", which is fine.
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(journal_mode = %mode, "sqlite journal mode");
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    conn.execute_batch(CREATE_METADATA)?;
    conn.execute_batch(CREATE_TRIPLES)?;
    conn.execute_batch(CREATE_TRIPLES_POS_INDEX)?;
    conn.execute_batch(CREATE_TRIPLES_OSP_INDEX)?;
    conn.execute_batch(CREATE_NAMESPACES)?;

    verify_or_set_version(conn)
}

fn verify_or_set_version(conn: &Connection) -> Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT value FROM tripleflow_metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        None => {
            conn.execute(
                "INSERT INTO tripleflow_metadata (key, value) VALUES ('schema_version', ?1)",
                [SCHEMA_VERSION.to_string()],
            )?;
        }
        Some(v) if v == SCHEMA_VERSION.to_string() => {}
        Some(v) => {
            return Err(Error::Schema(format!(
                "schema version mismatch: database has version {v}, but this build requires {SCHEMA_VERSION}"
            )));
        }
    }
    Ok(())
}

fn txn_error(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Error {
    move |source| Error::Transaction { operation, source }
}

// =============================================================================
// Store Handle
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Memory,
    File(PathBuf),
}

/// Connections of an open store.
struct OpenStore {
    location: Location,
    writer: Mutex<Connection>,
    idle_readers: Mutex<Vec<Connection>>,
}

impl OpenStore {
    fn writer(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-transaction drops the Transaction, which rolls back, so
        // the connection is clean even if the lock is poisoned.
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn checkout_reader(&self, path: &Path) -> Result<Connection> {
        let idle = self
            .idle_readers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
        if let Some(conn) = idle {
            return Ok(conn);
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn checkin_reader(&self, conn: Connection) {
        let mut idle = self
            .idle_readers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.len() < MAX_IDLE_READERS {
            idle.push(conn);
        }
    }
}

/// A SQLite triple store with a single writer and concurrent readers.
///
/// # Rust Pattern: Interior Mutability for Lifecycle
///
/// `open` and `close` take `&self`, so a store can be shared in an `Arc`
/// (by the loader's workers and by query helpers) before it is opened and
/// after it is closed. The open state lives behind an `RwLock<Option<..>>`.
pub struct TripleStore {
    state: RwLock<Option<Arc<OpenStore>>>,
}

impl TripleStore {
    /// A handle that is not open yet. Every operation fails with
    /// [`Error::NotOpen`] until [`open`](Self::open) is called.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }

    /// Opens (creating if necessary) the database file at `path`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tripleflow::TripleStore;
    ///
    /// let store = TripleStore::open_path("triples.db")?;
    /// println!("{} triples", store.len()?);
    /// # Ok::<(), tripleflow::Error>(())
    /// ```
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new();
        store.open(path)?;
        Ok(store)
    }

    /// An open in-memory store, mainly for tests.
    pub fn in_memory() -> Result<Self> {
        let store = Self::new();
        store.open_in_memory()?;
        Ok(store)
    }

    /// Opens the database at `path`, replacing any previously open one.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        initialize(&conn)?;
        info!(path = %path.display(), "triple store opened");
        self.install(Location::File(path), conn);
        Ok(())
    }

    /// Opens a fresh in-memory database, replacing any previously open one.
    pub fn open_in_memory(&self) -> Result<()> {
        let conn = Connection::open_in_memory()?;
        initialize(&conn)?;
        debug!("in-memory triple store opened");
        self.install(Location::Memory, conn);
        Ok(())
    }

    fn install(&self, location: Location, writer: Connection) {
        let open = OpenStore {
            location,
            writer: Mutex::new(writer),
            idle_readers: Mutex::new(Vec::new()),
        };
        *self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(open));
    }

    /// Closes the store. Later operations fail with [`Error::NotOpen`].
    ///
    /// Returns false if it was not open.
    pub fn close(&self) -> bool {
        let closed = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .is_some();
        if closed {
            debug!("triple store closed");
        }
        closed
    }

    pub fn is_open(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Database file path, `None` for in-memory or closed stores.
    pub fn path(&self) -> Option<PathBuf> {
        let state = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        match state.as_ref().map(|s| &s.location) {
            Some(Location::File(path)) => Some(path.clone()),
            _ => None,
        }
    }

    fn handle(&self) -> Result<Arc<OpenStore>> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| Error::NotOpen("triple store".to_string()))
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Runs `f` inside one read transaction.
    ///
    /// Everything `f` reads comes from the same snapshot. Values returned by
    /// [`StoreReader`] are owned copies and stay valid after this returns.
    ///
    /// On in-memory stores the single connection is held for the duration,
    /// so `f` must not call [`write`](Self::write) on the same store.
    pub fn read<T>(&self, f: impl FnOnce(&StoreReader<'_>) -> Result<T>) -> Result<T> {
        let store = self.handle()?;
        match &store.location {
            Location::Memory => {
                let conn = store.writer();
                run_read(&conn, f)
            }
            Location::File(path) => {
                let conn = store.checkout_reader(path)?;
                let result = run_read(&conn, f);
                store.checkin_reader(conn);
                result
            }
        }
    }

    /// Runs `f` inside one write transaction (`BEGIN IMMEDIATE`).
    ///
    /// Commits if `f` returns `Ok`. If `f` fails, the transaction is dropped
    /// without commit, which rolls everything back. SQLite failures inside
    /// `f` come back as [`Error::Transaction`] with operation `"write"`.
    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let store = self.handle()?;
        let mut conn = store.writer();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(txn_error("begin write"))?;
        let value = f(&tx).map_err(|err| match err {
            Error::Sqlite(source) => Error::Transaction {
                operation: "write",
                source,
            },
            other => other,
        })?;
        tx.commit().map_err(txn_error("commit write"))?;
        Ok(value)
    }

    // =========================================================================
    // Convenience Operations
    // =========================================================================

    /// Merges a batch in one write transaction. Returns how many triples were
    /// new; duplicates of stored triples are ignored.
    pub fn insert_batch(&self, batch: &Batch) -> Result<usize> {
        self.write(|tx| {
            let inserted = insert_statements(tx, batch.statements())?;
            for (prefix, namespace) in batch.prefixes() {
                tx.prepare_cached(UPSERT_NAMESPACE)?
                    .execute(params![prefix, namespace])?;
            }
            Ok(inserted)
        })
    }

    /// Number of stored triples.
    pub fn len(&self) -> Result<u64> {
        self.read(|reader| reader.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Triples matching a pattern, `None` meaning "any".
    pub fn triples_matching(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> Result<Vec<Triple>> {
        self.read(|reader| reader.triples_matching(subject, predicate, object))
    }

    pub fn contains(&self, triple: &Triple) -> Result<bool> {
        let found = self.triples_matching(
            Some(&triple.subject),
            Some(&triple.predicate),
            Some(&triple.object),
        )?;
        Ok(!found.is_empty())
    }

    /// Prefixes stored from loaded batches.
    pub fn namespaces(&self) -> Result<BTreeMap<String, String>> {
        self.read(|reader| reader.namespaces())
    }
}

impl Default for TripleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TripleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("TripleStore")
            .field("location", &state.as_ref().map(|s| s.location.clone()))
            .finish()
    }
}

fn run_read<T>(conn: &Connection, f: impl FnOnce(&StoreReader<'_>) -> Result<T>) -> Result<T> {
    let tx = conn
        .unchecked_transaction()
        .map_err(txn_error("begin read"))?;
    let value = f(&StoreReader { conn: &tx })?;
    tx.commit().map_err(txn_error("end read"))?;
    Ok(value)
}

/// Inserts statements on an open write transaction. Returns the number of
/// rows actually added.
pub fn insert_statements(tx: &Transaction<'_>, statements: &[Triple]) -> Result<usize> {
    let mut stmt = tx.prepare_cached(INSERT_TRIPLE)?;
    let mut inserted = 0;
    for triple in statements {
        let (s_kind, s_value) = encode_subject(&triple.subject)?;
        let o = encode_object(&triple.object)?;
        inserted += stmt.execute(params![
            s_kind,
            s_value,
            triple.predicate.as_str(),
            o.kind,
            o.value,
            o.datatype,
            o.lang
        ])?;
    }
    Ok(inserted)
}

// =============================================================================
// Reader
// =============================================================================

/// Read access inside a read transaction. See [`TripleStore::read`].
pub struct StoreReader<'a> {
    conn: &'a Connection,
}

impl StoreReader<'_> {
    pub fn len(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM triples", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn namespaces(&self) -> Result<BTreeMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT prefix, namespace FROM namespaces")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut map = BTreeMap::new();
        for row in rows {
            let (prefix, namespace) = row?;
            map.insert(prefix, namespace);
        }
        Ok(map)
    }
}

impl TripleSource for StoreReader<'_> {
    fn triples_matching(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> Result<Vec<Triple>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(subject) = subject {
            let (kind, value) = encode_subject(subject)?;
            clauses.push("s_kind = ? AND s_value = ?");
            values.push(Value::Integer(kind));
            values.push(Value::Text(value.to_string()));
        }
        if let Some(predicate) = predicate {
            clauses.push("p = ?");
            values.push(Value::Text(predicate.as_str().to_string()));
        }
        if let Some(object) = object {
            let o = encode_object(object)?;
            clauses.push("o_kind = ? AND o_value = ? AND o_datatype = ? AND o_lang = ?");
            values.push(Value::Integer(o.kind));
            values.push(Value::Text(o.value.to_string()));
            values.push(Value::Text(o.datatype.to_string()));
            values.push(Value::Text(o.lang.to_string()));
        }

        let mut sql = String::from(
            "SELECT s_kind, s_value, p, o_kind, o_value, o_datatype, o_lang FROM triples",
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut triples = Vec::new();
        for row in rows {
            let (s_kind, s_value, p, o_kind, o_value, o_datatype, o_lang) = row?;
            triples.push(Triple::new(
                decode_subject(s_kind, s_value)?,
                NamedNode::new_unchecked(p),
                decode_object(o_kind, o_value, o_datatype, o_lang)?,
            ));
        }
        Ok(triples)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::Literal;

    fn iri(s: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{s}"))
    }

    fn stmt(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(iri(s), iri(p), iri(o))
    }

    #[test]
    fn test_unopened_store_is_not_open() {
        let store = TripleStore::new();
        assert!(!store.is_open());
        assert!(matches!(store.len(), Err(Error::NotOpen(_))));
        assert!(matches!(
            store.insert_batch(&Batch::new()),
            Err(Error::NotOpen(_))
        ));
    }

    #[test]
    fn test_insert_and_match() {
        let store = TripleStore::in_memory().expect("open in-memory store");
        let mut batch: Batch = vec![
            stmt("alice", "knows", "bob"),
            stmt("bob", "knows", "carol"),
            stmt("alice", "knows", "bob"),
        ]
        .into_iter()
        .collect();
        batch.set_prefix("ex", "http://example.org/");

        assert_eq!(store.insert_batch(&batch).expect("insert"), 2);
        assert_eq!(store.len().expect("count"), 2);

        let from_alice = store
            .triples_matching(Some(&Subject::from(iri("alice"))), None, None)
            .expect("match");
        assert_eq!(from_alice, vec![stmt("alice", "knows", "bob")]);

        let to_carol = store
            .triples_matching(None, Some(&iri("knows")), Some(&Term::from(iri("carol"))))
            .expect("match");
        assert_eq!(to_carol, vec![stmt("bob", "knows", "carol")]);

        assert_eq!(
            store.namespaces().expect("namespaces")["ex"],
            "http://example.org/"
        );
    }

    #[test]
    fn test_literal_match_is_exact() {
        let store = TripleStore::in_memory().expect("open in-memory store");
        let name = Triple::new(iri("alice"), iri("name"), Literal::new_simple_literal("Alice"));
        let tagged = Triple::new(
            iri("alice"),
            iri("name"),
            Literal::new_language_tagged_literal_unchecked("Alice", "en"),
        );
        store
            .insert_batch(&vec![name.clone(), tagged.clone()].into_iter().collect())
            .expect("insert");

        assert!(store.contains(&name).expect("lookup"));
        assert!(store.contains(&tagged).expect("lookup"));
        assert_eq!(store.len().expect("count"), 2);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let store = TripleStore::in_memory().expect("open in-memory store");

        let result: Result<()> = store.write(|tx| {
            insert_statements(tx, &[stmt("a", "p", "b")])?;
            Err(Error::Job("simulated failure".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.len().expect("count"), 0);
    }

    #[test]
    fn test_sqlite_failure_inside_write_is_a_transaction_error() {
        let store = TripleStore::in_memory().expect("open in-memory store");

        let err = store
            .write(|tx| {
                insert_statements(tx, &[stmt("a", "p", "b")])?;
                tx.execute("INSERT INTO no_such_table VALUES (1)", [])?;
                Ok(())
            })
            .expect_err("table does not exist");
        assert!(matches!(
            err,
            Error::Transaction {
                operation: "write",
                ..
            }
        ));
        assert_eq!(store.len().expect("count"), 0);
    }

    #[test]
    fn test_close_then_reopen_file() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = dir.path().join("store.db");

        let store = TripleStore::open_path(&path).expect("open file store");
        assert_eq!(store.path().as_deref(), Some(path.as_path()));
        store
            .insert_batch(&vec![stmt("a", "p", "b")].into_iter().collect())
            .expect("insert");
        assert!(store.close());
        assert!(!store.close());
        assert!(matches!(store.len(), Err(Error::NotOpen(_))));

        store.open(&path).expect("reopen");
        assert_eq!(store.len().expect("count"), 1);
    }

    #[test]
    fn test_schema_version_mismatch() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).expect("open raw connection");
            conn.execute_batch(CREATE_METADATA).expect("create metadata");
            conn.execute(
                "INSERT INTO tripleflow_metadata (key, value) VALUES ('schema_version', '99')",
                [],
            )
            .expect("write version");
        }

        let err = TripleStore::open_path(&path).expect_err("version 99 is unknown");
        assert!(matches!(err, Error::Schema(_)));
    }

    /// A version row that cannot be read is an error, not a missing version.
    #[test]
    fn test_unreadable_schema_version_is_reported() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = dir.path().join("blob.db");
        {
            let conn = Connection::open(&path).expect("open raw connection");
            conn.execute_batch(CREATE_METADATA).expect("create metadata");
            conn.execute(
                "INSERT INTO tripleflow_metadata (key, value) VALUES ('schema_version', X'01')",
                [],
            )
            .expect("write version");
        }

        let err = TripleStore::open_path(&path).expect_err("blob is not a version");
        assert!(matches!(
            err,
            Error::Sqlite(rusqlite::Error::InvalidColumnType(..))
        ));
    }
}
