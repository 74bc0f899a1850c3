//! # Query Helper
//!
//! The query surface callers use: query text in, results out. Text goes
//! through the [`QueryPlanCache`], the plan runs on an [`Endpoint`].
//!
//! ```text
//! query(text, bindings)
//!     │
//!     ├─► cache.get(text) ──► Arc<QueryPlan>   (MalformedQuery on bad text)
//!     │
//!     └─► match plan.form()
//!           SELECT    ─► endpoint.select     ─► QueryResults::Solutions
//!           CONSTRUCT ─► endpoint.construct  ─► QueryResults::Graph
//!           ASK       ─► endpoint.ask        ─► QueryResults::Boolean
//! ```

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::batch::Batch;
use crate::cache::QueryPlanCache;
use crate::endpoint::Endpoint;
use crate::eval::{Bindings, Solution};
use crate::plan::{QueryForm, QueryPlan};
use crate::Result;

/// Result of [`QueryHelper::query`], shaped by the query form.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResults {
    Solutions {
        variables: Vec<String>,
        rows: Vec<Solution>,
    },
    Graph(Batch),
    Boolean(bool),
}

impl QueryResults {
    /// SPARQL-results-like JSON. Terms are written in N-Triples form.
    pub fn to_json(&self) -> Value {
        match self {
            QueryResults::Solutions { variables, rows } => {
                let bindings: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        let object: Map<String, Value> = row
                            .iter()
                            .map(|(name, term)| (name.to_string(), Value::String(term.to_string())))
                            .collect();
                        Value::Object(object)
                    })
                    .collect();
                json!({ "head": { "vars": variables }, "results": { "bindings": bindings } })
            }
            QueryResults::Graph(batch) => {
                let triples: Vec<String> = batch.iter().map(|t| format!("{t} .")).collect();
                json!({ "triples": triples })
            }
            QueryResults::Boolean(value) => json!({ "boolean": value }),
        }
    }
}

/// Cached query execution against one endpoint.
pub struct QueryHelper<E: Endpoint> {
    endpoint: E,
    cache: Arc<QueryPlanCache>,
}

impl<E: Endpoint> QueryHelper<E> {
    /// Helper with its own cache of the default capacity.
    pub fn new(endpoint: E) -> Self {
        Self::with_cache(endpoint, Arc::new(QueryPlanCache::default()))
    }

    /// Helper sharing `cache` with other helpers.
    pub fn with_cache(endpoint: E, cache: Arc<QueryPlanCache>) -> Self {
        Self { endpoint, cache }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn cache(&self) -> &Arc<QueryPlanCache> {
        &self.cache
    }

    /// Parsed plan for `text`, from the cache when possible.
    pub fn plan(&self, text: &str) -> Result<Arc<QueryPlan>> {
        self.cache.get(text)
    }

    /// All rows of a SELECT query.
    pub fn select(&self, text: &str, bindings: &Bindings) -> Result<Vec<Solution>> {
        let plan = self.plan(text)?;
        self.endpoint.select(&plan, bindings)
    }

    /// Streams SELECT rows into `on_row`, logging progress under `label`.
    /// Returns the number of rows.
    pub fn process_select<F>(&self, label: &str, text: &str, bindings: &Bindings, mut on_row: F) -> Result<u64>
    where
        F: FnMut(Solution) -> Result<()>,
    {
        let plan = self.plan(text)?;
        self.endpoint.process_select(label, &plan, bindings, &mut on_row)
    }

    /// Result graph of a CONSTRUCT query.
    pub fn construct(&self, text: &str, bindings: &Bindings) -> Result<Batch> {
        let plan = self.plan(text)?;
        self.endpoint.construct(&plan, bindings, None)
    }

    /// Merges a CONSTRUCT result into `seed` and returns it.
    pub fn construct_into(&self, text: &str, bindings: &Bindings, seed: Batch) -> Result<Batch> {
        let plan = self.plan(text)?;
        self.endpoint.construct(&plan, bindings, Some(seed))
    }

    /// Runs a CONSTRUCT query and hands the result graph to `on_graph`.
    pub fn process_construct<T, F>(&self, text: &str, bindings: &Bindings, on_graph: F) -> Result<T>
    where
        F: FnOnce(Batch) -> Result<T>,
    {
        on_graph(self.construct(text, bindings)?)
    }

    pub fn ask(&self, text: &str, bindings: &Bindings) -> Result<bool> {
        let plan = self.plan(text)?;
        self.endpoint.ask(&plan, bindings)
    }

    /// Runs any supported query form.
    pub fn query(&self, text: &str, bindings: &Bindings) -> Result<QueryResults> {
        let plan = self.plan(text)?;
        match plan.form() {
            QueryForm::Select { variables } => Ok(QueryResults::Solutions {
                variables: variables.clone(),
                rows: self.endpoint.select(&plan, bindings)?,
            }),
            QueryForm::Construct { .. } => Ok(QueryResults::Graph(
                self.endpoint.construct(&plan, bindings, None)?,
            )),
            QueryForm::Ask => Ok(QueryResults::Boolean(self.endpoint.ask(&plan, bindings)?)),
        }
    }
}
