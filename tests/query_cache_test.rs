//! Query Plan Cache Tests
//!
//! Tests the cache as callers see it through the query helper:
//! - The same text is parsed once and the plan is shared
//! - Malformed text is reported with the text and never cached
//! - Queries run concurrently with ingestion against one shared cache

mod common;

use std::sync::Arc;
use std::thread;

use tripleflow::{
    Bindings, DispatcherConfig, Error, GraphEndpoint, QueryHelper, QueryPlanCache,
    StatementCollector, StatementSink, StoreEndpoint, StoreLoader, StreamLoader,
};

#[test]
fn same_text_is_parsed_once() {
    let (_dir, _path, store) = common::create_temp_store("cache.db");
    let helper = common::helper(&store);
    let query = format!("{}SELECT ?s WHERE {{ ?s ex:p ?o }}", common::PROLOG);

    let first = helper.plan(&query).expect("valid query");
    helper.select(&query, &Bindings::new()).expect("select");
    let second = helper.plan(&query).expect("valid query");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(helper.cache().stats().parses, 1);
    assert_eq!(helper.cache().len(), 1);
}

#[test]
fn malformed_query_is_never_cached() {
    let (_dir, _path, store) = common::create_temp_store("malformed.db");
    let helper = common::helper(&store);
    let text = "SELECT ?s WHERE { ?s ?p }";

    for _ in 0..2 {
        match helper.select(text, &Bindings::new()).expect_err("malformed") {
            Error::MalformedQuery { query, message } => {
                assert_eq!(query, text);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    assert!(helper.cache().is_empty());
    assert_eq!(helper.cache().stats().parses, 2);
}

#[test]
fn unsupported_query_is_never_cached() {
    let helper = QueryHelper::new(GraphEndpoint::new());
    let err = helper
        .select("SELECT (COUNT(*) AS ?n) WHERE { ?s ?p ?o }", &Bindings::new())
        .expect_err("aggregates are not supported");

    assert!(matches!(err, Error::UnsupportedQuery { .. }));
    assert!(helper.cache().is_empty());
}

#[test]
fn helpers_share_one_cache() {
    let (_dir, _path, store) = common::create_temp_store("shared.db");
    let cache = Arc::new(QueryPlanCache::new(16));
    let on_store = QueryHelper::with_cache(StoreEndpoint::new(Arc::clone(&store)), Arc::clone(&cache));
    let on_graph = QueryHelper::with_cache(GraphEndpoint::new(), Arc::clone(&cache));

    assert!(!on_store.ask("ASK { ?s ?p ?o }", &Bindings::new()).expect("ask"));
    assert!(!on_graph.ask("ASK { ?s ?p ?o }", &Bindings::new()).expect("ask"));

    assert_eq!(cache.stats().parses, 1);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn queries_run_during_ingestion() {
    let (_dir, _path, store) = common::create_temp_store("concurrent.db");
    let cache = Arc::new(QueryPlanCache::default());

    let mut loader = StreamLoader::new(
        StatementCollector::new(50),
        StoreLoader::new(Arc::clone(&store)),
        DispatcherConfig::new(2),
    )
    .expect("spawn loader");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let helper = QueryHelper::with_cache(StoreEndpoint::new(Arc::clone(&store)), Arc::clone(&cache));
            thread::spawn(move || {
                let query = format!("{}SELECT ?s WHERE {{ ?s ex:p ?o }}", common::PROLOG);
                let mut last = 0;
                for _ in 0..20 {
                    let rows = helper.select(&query, &Bindings::new()).expect("select");
                    // Batches commit atomically, so counts only move in whole batches.
                    assert_eq!(rows.len() % 50, 0);
                    assert!(rows.len() >= last);
                    last = rows.len();
                }
            })
        })
        .collect();

    loader.start().expect("start");
    for i in 0..1000 {
        loader.statement(common::numbered(i)).expect("statement");
    }
    loader.end().expect("end");
    loader.finish().expect("no job fails");

    for reader in readers {
        reader.join().expect("reader thread");
    }
    assert_eq!(store.len().expect("len"), 1000);
    assert_eq!(cache.len(), 1);
}
