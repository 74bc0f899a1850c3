//! ASK Check Tests
//!
//! Runs the `.sparql` checks under `tests/data/` against a store loaded
//! from `people.ttl`:
//! - Every check in a directory runs, subdirectories included on request
//! - A false check reports its file and stops the run

mod common;

use std::fs::File;
use std::sync::Arc;

use tripleflow::{
    DispatcherConfig, Error, RdfSyntax, SparqlTester, StatementCollector, StoreEndpoint,
    StoreLoader, StreamLoader, TripleStore,
};

fn people_tester() -> (tempfile::TempDir, SparqlTester<StoreEndpoint>) {
    let (dir, _path, store) = common::create_temp_store("checks.db");
    StreamLoader::new(
        StatementCollector::new(5),
        StoreLoader::new(Arc::clone(&store)),
        DispatcherConfig::new(2),
    )
    .expect("spawn loader")
    .load(
        File::open(common::data_file("people.ttl")).expect("open data file"),
        RdfSyntax::Turtle,
        None,
    )
    .expect("load succeeds");

    let tester = SparqlTester::new(StoreEndpoint::new(store)).with_prolog(common::PROLOG);
    (dir, tester)
}

#[test]
fn directory_checks_pass_and_are_counted() {
    let (_dir, tester) = people_tester();
    let checks = common::data_file("checks");

    assert_eq!(tester.ask_from_dir(&checks, false).expect("checks pass"), 2);
    assert_eq!(tester.ask_from_dir(&checks, true).expect("checks pass"), 3);
}

#[test]
fn single_file_and_inline_checks() {
    let (_dir, tester) = people_tester();

    tester
        .ask_from_file("Alice knows Bob and Carol", common::data_file("checks/01-knows.sparql"))
        .expect("check passes");
    tester
        .ask("Carol's name is tagged", "ASK { ex:carol foaf:name \"Carol\"@en }")
        .expect("check passes");
}

#[test]
fn false_check_names_the_file() {
    let (_dir, tester) = people_tester();

    let err = tester
        .ask_from_dir(common::data_file("failing_checks"), true)
        .expect_err("Carol knows nobody");
    match err {
        Error::CheckFailed { message, query } => {
            assert!(message.contains("carol-knows.sparql"), "{message}");
            assert!(query.contains("ex:carol foaf:knows ?someone"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn checks_run_against_a_closed_store_fail() {
    let (_dir, tester) = people_tester();
    let store: &Arc<TripleStore> = tester.helper().endpoint().store();
    assert!(store.close());

    let err = tester
        .ask("anything", "ASK { ?s ?p ?o }")
        .expect_err("store is closed");
    assert!(matches!(err, Error::NotOpen(_)));
}
