//! tripleload - load RDF files into a tripleflow store and query it.
//!
//! # Examples
//!
//! ```bash
//! # Load a Turtle file with 4 workers and 50k-statement batches
//! tripleload load data.ttl --db graph.db --workers 4 --batch-size 50000
//!
//! # Share an ontology with every batch job
//! tripleload load data.nt --db graph.db --context schema.ttl
//!
//! # Run a query, results as JSON on stdout
//! tripleload query --db graph.db 'SELECT ?s WHERE { ?s ?p ?o } LIMIT 10'
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `info`).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tripleflow::stream::StatementSink;
use tripleflow::{
    parse, Batch, Bindings, BatchDispatcher, ContextMode, PipelineConfig, QueryHelper, RdfSyntax,
    StoreEndpoint, StoreLoader, StreamLoader, TripleStore,
};

#[derive(Debug, Parser)]
#[command(name = "tripleload", version, about = "Batch-load RDF into a triple store and query it")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse an RDF file and load it batch by batch.
    Load {
        /// Turtle (.ttl) or N-Triples (.nt) file.
        file: PathBuf,
        /// Store file, created if missing.
        #[arg(long)]
        db: PathBuf,
        /// Pipeline configuration (TOML). Flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        workers: Option<usize>,
        /// Syntax name; guessed from the extension when omitted.
        #[arg(long)]
        syntax: Option<RdfSyntax>,
        /// Base IRI for relative references.
        #[arg(long)]
        base: Option<String>,
        /// File whose statements are merged into every batch.
        #[arg(long)]
        context: Option<PathBuf>,
        /// Accumulate every flushed batch into the context instead.
        #[arg(long, conflicts_with = "context")]
        accumulate: bool,
    },
    /// Run a SELECT, CONSTRUCT or ASK query and print JSON.
    Query {
        #[arg(long)]
        db: PathBuf,
        query: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> tripleflow::Result<()> {
    match command {
        Command::Load {
            file,
            db,
            config,
            batch_size,
            workers,
            syntax,
            base,
            context,
            accumulate,
        } => {
            let mut pipeline = match config {
                Some(path) => PipelineConfig::load(path)?,
                None => PipelineConfig::default(),
            };
            if let Some(size) = batch_size {
                pipeline.max_batch_size = size;
            }
            if let Some(workers) = workers {
                pipeline.pool_size = workers;
            }
            if accumulate {
                pipeline.context_mode = ContextMode::Accumulate;
            }
            pipeline.validate()?;

            let syntax = resolve_syntax(syntax, &file)?;
            let store = Arc::new(TripleStore::open_path(&db)?);
            let dispatcher = BatchDispatcher::new(
                pipeline.collector(),
                StoreLoader::new(Arc::clone(&store)),
                pipeline.dispatcher_config(),
            )?;
            if let Some(context) = context {
                let syntax = resolve_syntax(None, &context)?;
                dispatcher.set_context(read_batch(&context, syntax, base.as_deref())?);
            }

            let report = StreamLoader::from_dispatcher(dispatcher).load(
                File::open(&file)?,
                syntax,
                base.as_deref(),
            )?;
            info!(
                batches = report.dispatched,
                triples = store.len()?,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "load complete"
            );
            Ok(())
        }
        Command::Query { db, query } => {
            let store = Arc::new(TripleStore::open_path(&db)?);
            let helper = QueryHelper::new(StoreEndpoint::new(store));
            let results = helper.query(&query, &Bindings::new())?;
            let text = serde_json::to_string_pretty(&results.to_json())
                .map_err(std::io::Error::from)?;
            println!("{text}");
            Ok(())
        }
    }
}

fn resolve_syntax(explicit: Option<RdfSyntax>, file: &Path) -> tripleflow::Result<RdfSyntax> {
    explicit
        .or_else(|| RdfSyntax::from_path(file))
        .ok_or_else(|| {
            tripleflow::Error::Syntax(format!(
                "cannot tell the RDF syntax of {}, pass --syntax",
                file.display()
            ))
        })
}

/// Reads a whole (small) file into one batch.
fn read_batch(path: &Path, syntax: RdfSyntax, base: Option<&str>) -> tripleflow::Result<Batch> {
    struct Collect(Batch);

    impl StatementSink for Collect {
        fn start(&mut self) -> tripleflow::Result<()> {
            Ok(())
        }

        fn statement(&mut self, statement: tripleflow::Statement) -> tripleflow::Result<()> {
            self.0.push(statement);
            Ok(())
        }

        fn namespace(&mut self, prefix: &str, namespace: &str) -> tripleflow::Result<()> {
            self.0.set_prefix(prefix, namespace);
            Ok(())
        }

        fn end(&mut self) -> tripleflow::Result<()> {
            Ok(())
        }
    }

    let mut sink = Collect(Batch::new());
    parse::parse_into(File::open(path)?, syntax, base, &mut sink)?;
    info!(path = %path.display(), statements = sink.0.len(), "context loaded");
    Ok(sink.0)
}
