//! # Namespace Registry
//!
//! Process-wide prefix -> namespace IRI map. It is initialised on first use
//! with the common vocabularies, and callers add their own with [`register`].
//! New batches copy a [`snapshot`] of it at creation time.
//!
//! Lookups are reads on an `RwLock`, so concurrent workers and query threads
//! rarely contend. Registration should normally happen before a pipeline
//! starts.

use std::collections::BTreeMap;
use std::sync::{LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{Error, Result};

/// Prefixes known before anyone registers anything.
pub const COMMON_NAMESPACES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

static REGISTRY: LazyLock<RwLock<BTreeMap<String, String>>> = LazyLock::new(|| {
    RwLock::new(
        COMMON_NAMESPACES
            .iter()
            .map(|(prefix, ns)| (prefix.to_string(), ns.to_string()))
            .collect(),
    )
});

// The map is always left consistent, so a poisoned lock is still usable.
fn read() -> RwLockReadGuard<'static, BTreeMap<String, String>> {
    REGISTRY.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write() -> RwLockWriteGuard<'static, BTreeMap<String, String>> {
    REGISTRY.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Binds `prefix` to `namespace`, returning the previous binding if any.
pub fn register(prefix: impl Into<String>, namespace: impl Into<String>) -> Option<String> {
    write().insert(prefix.into(), namespace.into())
}

/// Removes a binding. Returns the namespace it pointed to.
pub fn unregister(prefix: &str) -> Option<String> {
    write().remove(prefix)
}

/// Namespace bound to `prefix`.
pub fn lookup(prefix: &str) -> Option<String> {
    read().get(prefix).cloned()
}

/// Concatenates the namespace of `prefix` and `local`.
pub fn iri(prefix: &str, local: &str) -> Result<String> {
    lookup(prefix)
        .map(|ns| format!("{ns}{local}"))
        .ok_or_else(|| Error::UnknownPrefix(prefix.to_string()))
}

/// Expands a prefixed name such as `foaf:name`.
///
/// Strings without a colon are rejected; full IRIs are not prefixed names
/// and must not be passed here.
pub fn expand(prefixed: &str) -> Result<String> {
    let (prefix, local) = prefixed
        .split_once(':')
        .ok_or_else(|| Error::InvalidIri(prefixed.to_string()))?;
    iri(prefix, local)
}

/// Copy of the whole registry.
pub fn snapshot() -> BTreeMap<String, String> {
    read().clone()
}

/// `PREFIX p: <ns>` lines for every registered prefix, ready to prepend to a query.
pub fn sparql_prolog() -> String {
    read()
        .iter()
        .map(|(prefix, ns)| format!("PREFIX {prefix}: <{ns}>\n"))
        .collect()
}

/// `@prefix p: <ns> .` lines, for Turtle documents.
pub fn turtle_prolog() -> String {
    read()
        .iter()
        .map(|(prefix, ns)| format!("@prefix {prefix}: <{ns}> .\n"))
        .collect()
}
