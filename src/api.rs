//! # Async API for tripleflow
//!
//! The loader and the query helper are synchronous: the dispatcher owns OS
//! threads and SQLite calls block. This module wraps them for async callers.
//! Every call is moved onto Tokio's blocking pool, so the async runtime
//! never stalls on a transaction or a parse.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Async Tasks (clients)           │
//! │   load_file ─┐                ┌─ select      │
//! │              │                │              │
//! └──────────────┼────────────────┼──────────────┘
//!                ▼                ▼
//!        spawn_blocking     spawn_blocking
//!                │                │
//!                ▼                ▼
//!        ┌──────────────┐  ┌───────────────┐
//!        │ StreamLoader │  │  QueryHelper  │
//!        │ + dispatcher │  │ + plan cache  │
//!        └──────┬───────┘  └───────┬───────┘
//!               │  write txn       │  read txn
//!               ▼                  ▼
//!        ┌─────────────────────────────────┐
//!        │           TripleStore           │
//!        └─────────────────────────────────┘
//! ```
//!
//! ## Rust Concepts
//!
//! - **spawn_blocking**: runs a closure on a thread that is allowed to block
//! - **`'static` closures**: everything moved into the blocking pool is
//!   owned, which is why the handle is a bundle of `Arc`s

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task;
use tracing::info;

use crate::batch::Batch;
use crate::config::PipelineConfig;
use crate::dispatcher::DispatchReport;
use crate::endpoint::StoreEndpoint;
use crate::error::{Error, Result};
use crate::eval::{Bindings, Solution};
use crate::helper::{QueryHelper, QueryResults};
use crate::parse::RdfSyntax;
use crate::sink::StoreLoader;
use crate::store::TripleStore;
use crate::stream::StreamLoader;

/// Runs `f` on the blocking pool and flattens the join error.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Job(format!("blocking task failed: {e}")))?
}

// =============================================================================
// TripleDb - The Main Async Handle
// =============================================================================

/// The async handle: one store, one cached query helper, one configuration.
///
/// `TripleDb` is `Clone`; clones share the store and the plan cache.
#[derive(Clone)]
pub struct TripleDb {
    store: Arc<TripleStore>,
    helper: Arc<QueryHelper<StoreEndpoint>>,
    config: Arc<PipelineConfig>,
}

impl TripleDb {
    /// Opens (or creates) a store file with the default configuration.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, PipelineConfig::default()).await
    }

    pub async fn open_with_config(path: impl AsRef<Path>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let store = blocking(move || TripleStore::open_path(path)).await?;
        Ok(Self::from_store(store, config))
    }

    /// A private in-memory store, gone when the last clone is dropped.
    pub async fn open_in_memory() -> Result<Self> {
        let store = blocking(TripleStore::in_memory).await?;
        Ok(Self::from_store(store, PipelineConfig::default()))
    }

    fn from_store(store: TripleStore, config: PipelineConfig) -> Self {
        let store = Arc::new(store);
        let endpoint = StoreEndpoint::new(Arc::clone(&store))
            .with_progress_interval(config.progress_interval);
        let helper = QueryHelper::with_cache(endpoint, Arc::new(config.query_cache()));
        Self {
            store,
            helper: Arc::new(helper),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<TripleStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Loads an RDF file, choosing the syntax from its extension.
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<DispatchReport<Batch>> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let syntax = RdfSyntax::from_path(&path).ok_or_else(|| {
            Error::Syntax(format!("cannot tell the RDF syntax of {}", path.display()))
        })?;
        let file = tokio::fs::File::open(&path).await?.into_std().await;
        // Relative IRIs in the file resolve against its directory.
        let base = path
            .parent()
            .filter(|dir| dir.is_absolute())
            .map(|dir| format!("file://{}/", dir.display()));
        let report = self.load_reader(file, syntax, base).await?;
        info!(
            path = %path.display(),
            batches = report.dispatched,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "file loaded"
        );
        Ok(report)
    }

    /// Loads RDF text from any reader through the batch pipeline.
    pub async fn load_reader<R>(
        &self,
        reader: R,
        syntax: RdfSyntax,
        base_iri: Option<String>,
    ) -> Result<DispatchReport<Batch>>
    where
        R: Read + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        blocking(move || {
            let loader = StreamLoader::new(
                config.collector(),
                StoreLoader::new(store),
                config.dispatcher_config(),
            )?;
            loader.load(reader, syntax, base_iri.as_deref())
        })
        .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn select(&self, query: impl Into<String>, bindings: Bindings) -> Result<Vec<Solution>> {
        let helper = Arc::clone(&self.helper);
        let query = query.into();
        blocking(move || helper.select(&query, &bindings)).await
    }

    pub async fn ask(&self, query: impl Into<String>, bindings: Bindings) -> Result<bool> {
        let helper = Arc::clone(&self.helper);
        let query = query.into();
        blocking(move || helper.ask(&query, &bindings)).await
    }

    pub async fn construct(&self, query: impl Into<String>, bindings: Bindings) -> Result<Batch> {
        let helper = Arc::clone(&self.helper);
        let query = query.into();
        blocking(move || helper.construct(&query, &bindings)).await
    }

    /// Any supported query form.
    pub async fn query(&self, query: impl Into<String>, bindings: Bindings) -> Result<QueryResults> {
        let helper = Arc::clone(&self.helper);
        let query = query.into();
        blocking(move || helper.query(&query, &bindings)).await
    }

    /// Number of stored triples.
    pub async fn len(&self) -> Result<u64> {
        let store = Arc::clone(&self.store);
        blocking(move || store.len()).await
    }

    /// Closes the store for every clone. Later calls fail with `NotOpen`.
    pub async fn close(&self) -> bool {
        let store = Arc::clone(&self.store);
        blocking(move || Ok(store.close())).await.unwrap_or(false)
    }
}

impl std::fmt::Debug for TripleDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleDb")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}
