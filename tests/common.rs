#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use oxrdf::{Literal, NamedNode, Triple};
use tripleflow::{Batch, Bindings, QueryHelper, StoreEndpoint, TripleStore};

pub const EX: &str = "http://example.org/";
pub const PROLOG: &str = "PREFIX ex: <http://example.org/>\nPREFIX foaf: <http://xmlns.com/foaf/0.1/>\n";

/// Triples in `tests/data/people.ttl`.
pub const PEOPLE_TRIPLES: u64 = 14;

pub fn data_file(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

pub fn create_temp_store(name: &str) -> (tempfile::TempDir, PathBuf, Arc<TripleStore>) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = dir.path().join(name);
    let store = TripleStore::open_path(&path).expect("open store");
    (dir, path, Arc::new(store))
}

pub fn ex(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{EX}{local}"))
}

/// `ex:s{i} ex:p i`.
pub fn numbered(i: usize) -> Triple {
    Triple::new(ex(&format!("s{i}")), ex("p"), Literal::from(i as i64))
}

pub fn numbered_batch(range: std::ops::Range<usize>) -> Batch {
    range.map(numbered).collect()
}

pub fn helper(store: &Arc<TripleStore>) -> QueryHelper<StoreEndpoint> {
    QueryHelper::new(StoreEndpoint::new(Arc::clone(store)))
}

/// Asserts that an ASK pattern (with the ex:/foaf: prolog) holds or not.
pub fn assert_ask(store: &Arc<TripleStore>, pattern: &str, expected: bool) {
    let query = format!("{PROLOG}ASK {{ {pattern} }}");
    let actual = helper(store)
        .ask(&query, &Bindings::new())
        .expect("ask query runs");
    assert_eq!(actual, expected, "ASK {{ {pattern} }}");
}
