//! # ASK-Based Checks
//!
//! A small harness for verifying what an endpoint holds. Each check is a
//! SPARQL ASK query that must answer true. Checks come from a string, from a
//! `.sparql` file, or from every `.sparql` file under a directory:
//!
//! ```text
//! checks/
//!   01-knows.sparql          ASK { ex:alice foaf:knows ex:bob }
//!   people/
//!     02-ages.sparql         ASK { ?p foaf:age ?a FILTER(?a > 40) }
//! ```
//!
//! A shared prolog, usually the `PREFIX` lines, is prepended to every query,
//! so check files can stay one line long.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::endpoint::Endpoint;
use crate::eval::Bindings;
use crate::helper::QueryHelper;
use crate::{Error, Result};

/// Extension of check files picked up by [`SparqlTester::ask_from_dir`].
pub const CHECK_EXTENSION: &str = "sparql";

/// Runs ASK checks against one endpoint.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tripleflow::{namespaces, SparqlTester, StoreEndpoint, TripleStore};
///
/// let store = Arc::new(TripleStore::open_path("triples.db")?);
/// let tester = SparqlTester::new(StoreEndpoint::new(store))
///     .with_prolog(namespaces::sparql_prolog());
/// let ran = tester.ask_from_dir("checks", true)?;
/// println!("{ran} checks passed");
/// # Ok::<(), tripleflow::Error>(())
/// ```
pub struct SparqlTester<E: Endpoint> {
    helper: QueryHelper<E>,
    prolog: String,
}

impl<E: Endpoint> SparqlTester<E> {
    /// A tester with no prolog and its own plan cache.
    pub fn new(endpoint: E) -> Self {
        Self::from_helper(QueryHelper::new(endpoint))
    }

    /// Runs checks through an existing helper, sharing its cache.
    pub fn from_helper(helper: QueryHelper<E>) -> Self {
        Self {
            helper,
            prolog: String::new(),
        }
    }

    /// Text prepended to every check.
    pub fn with_prolog(mut self, prolog: impl Into<String>) -> Self {
        self.prolog = prolog.into();
        self
    }

    pub fn helper(&self) -> &QueryHelper<E> {
        &self.helper
    }

    /// Runs one check.
    ///
    /// # Errors
    ///
    /// [`Error::CheckFailed`] carrying `message` if the answer is false.
    /// Query errors are logged with the full query text and returned as is.
    pub fn ask(&self, message: &str, sparql: &str) -> Result<()> {
        let query = format!("{}{}", self.prolog, sparql);
        match self.helper.ask(&query, &Bindings::new()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::CheckFailed {
                message: message.to_string(),
                query,
            }),
            Err(err) => {
                error!(%err, %query, "check query failed to run");
                Err(err)
            }
        }
    }

    /// Runs the check stored in `path`.
    pub fn ask_from_file(&self, message: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let sparql = fs::read_to_string(path).map_err(|err| with_path(err, path))?;
        self.ask(message, &sparql)
    }

    /// Runs every `*.sparql` file in `dir`, in path order, and returns how
    /// many ran. Subdirectories are searched when `recursive` is set.
    ///
    /// Stops at the first failing check.
    pub fn ask_from_dir(&self, dir: impl AsRef<Path>, recursive: bool) -> Result<u64> {
        let files = check_files(dir.as_ref(), recursive)?;
        for file in &files {
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(check = %name, "running check");
            self.ask_from_file(&format!("check '{name}' failed"), file)?;
        }
        Ok(files.len() as u64)
    }
}

/// Check files under `dir`, sorted.
fn check_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(with_path(io::ErrorKind::NotFound.into(), dir));
    }
    let root = dir
        .to_str()
        .ok_or_else(|| with_path(io::ErrorKind::InvalidInput.into(), dir))?;

    let mut pattern = PathBuf::from(glob::Pattern::escape(root));
    if recursive {
        pattern.push("**");
    }
    pattern.push(format!("*.{CHECK_EXTENSION}"));

    let mut files = glob::glob(&pattern.to_string_lossy())
        .map_err(|err| Error::Io(io::Error::new(io::ErrorKind::InvalidInput, err.to_string())))?
        .map(|entry| entry.map_err(|err| Error::Io(err.into_error())))
        .collect::<Result<Vec<_>>>()?;
    files.retain(|path| path.is_file());
    files.sort();
    Ok(files)
}

fn with_path(err: io::Error, path: &Path) -> Error {
    Error::Io(io::Error::new(err.kind(), format!("{}: {err}", path.display())))
}
