//! # Batches of Statements
//!
//! A batch is the unit of work handed from the producer to a worker job.
//! The dispatcher and the context layer only need two things from it: how big
//! it is, and how to merge another batch into it. That contract is
//! [`BatchContainer`]. [`Batch`] is the concrete container used for RDF
//! statements.
//!
//! ## Ownership
//!
//! ```text
//!   producer thread                 worker thread
//!   ┌──────────────┐   flush      ┌──────────────┐
//!   │ open Batch   │ ───────────► │ job(batch)   │
//!   │ (push, push) │  (moved)     │ (owns batch) │
//!   └──────────────┘              └──────────────┘
//! ```
//!
//! A batch is mutated by the producer while open. Flushing *moves* it into the
//! channel feeding the workers, so after the handoff the producer cannot touch
//! it. The compiler enforces the single-owner rule.

use std::collections::BTreeMap;

use oxrdf::Triple;

/// A graph statement. Immutable, compared by value.
pub type Statement = Triple;

// =============================================================================
// Container Contract
// =============================================================================

/// An opaque, sizeable, mergeable accumulator.
///
/// # Rust Pattern: Send + 'static
///
/// Containers cross thread boundaries when they are handed to a worker, so
/// they must be `Send` and must not borrow anything from the producer.
pub trait BatchContainer: Send + 'static {
    /// Measure used to decide when to flush (statement count for [`Batch`]).
    fn size(&self) -> usize;

    /// Appends a copy of `other`'s content to this container.
    fn merge(&mut self, other: &Self);

    /// True if there is nothing to deliver.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Plain vectors batch arbitrary items, e.g. query rows.
impl<T: Clone + Send + 'static> BatchContainer for Vec<T> {
    fn size(&self) -> usize {
        self.len()
    }

    fn merge(&mut self, other: &Self) {
        self.extend_from_slice(other);
    }
}

// =============================================================================
// Statement Batch
// =============================================================================

/// An ordered collection of statements plus namespace-prefix metadata.
///
/// Statements keep their arrival order. Duplicates are kept too: a batch is
/// a buffer, not a set, and the store ignores duplicate inserts anyway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    statements: Vec<Statement>,
    prefixes: BTreeMap<String, String>,
}

impl Batch {
    /// Creates an empty batch with no prefixes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty batch carrying a copy of the given prefixes.
    pub fn with_prefixes(prefixes: BTreeMap<String, String>) -> Self {
        Self {
            statements: Vec::new(),
            prefixes,
        }
    }

    /// Appends a statement at the end of the batch.
    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Records a namespace prefix, replacing an earlier binding of the same prefix.
    pub fn set_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn prefixes(&self) -> &BTreeMap<String, String> {
        &self.prefixes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.statements.iter()
    }

    /// Linear scan; intended for tests and small batches.
    pub fn contains(&self, statement: &Statement) -> bool {
        self.statements.contains(statement)
    }

    /// Splits the batch into its statements and prefixes.
    pub fn into_parts(self) -> (Vec<Statement>, BTreeMap<String, String>) {
        (self.statements, self.prefixes)
    }
}

impl BatchContainer for Batch {
    fn size(&self) -> usize {
        self.statements.len()
    }

    /// Appends the other batch's statements in order. Prefixes already bound
    /// here win over the other batch's bindings.
    fn merge(&mut self, other: &Self) {
        self.statements.extend(other.statements.iter().cloned());
        for (prefix, namespace) in &other.prefixes {
            self.prefixes
                .entry(prefix.clone())
                .or_insert_with(|| namespace.clone());
        }
    }
}

impl Extend<Statement> for Batch {
    fn extend<I: IntoIterator<Item = Statement>>(&mut self, iter: I) {
        self.statements.extend(iter);
    }
}

impl FromIterator<Statement> for Batch {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        Self {
            statements: iter.into_iter().collect(),
            prefixes: BTreeMap::new(),
        }
    }
}

impl IntoIterator for Batch {
    type Item = Statement;
    type IntoIter = std::vec::IntoIter<Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Statement;
    type IntoIter = std::slice::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
