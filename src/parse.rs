//! # Parser Driver
//!
//! Turns RDF text into [`StatementSink`] events using the `oxttl` streaming
//! parsers. Triples are pulled one at a time, so a whole document is never
//! held in memory.
//!
//! Prefix declarations are not reported by the parser as events; they are
//! visible as parser state. After each triple we compare that state with what
//! we have already reported and emit a `namespace` event for every new or
//! rebound prefix, ahead of the triple that followed the declaration.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use oxttl::{NTriplesParser, TurtleParser};

use crate::stream::StatementSink;
use crate::{Error, Result};

/// Supported concrete syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdfSyntax {
    Turtle,
    NTriples,
}

impl RdfSyntax {
    /// Guesses the syntax from a file extension (`.ttl`, `.nt`).
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ttl" | "turtle" => Some(RdfSyntax::Turtle),
            "nt" | "ntriples" => Some(RdfSyntax::NTriples),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RdfSyntax::Turtle => "turtle",
            RdfSyntax::NTriples => "ntriples",
        }
    }
}

impl fmt::Display for RdfSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RdfSyntax {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "turtle" | "ttl" | "text/turtle" => Ok(RdfSyntax::Turtle),
            "ntriples" | "n-triples" | "nt" | "application/n-triples" => Ok(RdfSyntax::NTriples),
            other => Err(Error::Syntax(format!("unknown RDF syntax '{other}'"))),
        }
    }
}

/// Parses `reader` and pushes `start`, every statement and prefix, then `end`
/// into `sink`.
///
/// Parsing stops at the first syntax error. `end` is not called in that case,
/// so the sink can tell a truncated load from a complete one.
pub fn parse_into<R, S>(reader: R, syntax: RdfSyntax, base_iri: Option<&str>, sink: &mut S) -> Result<()>
where
    R: Read,
    S: StatementSink + ?Sized,
{
    sink.start()?;
    match syntax {
        RdfSyntax::Turtle => {
            let mut parser = TurtleParser::new();
            if let Some(base) = base_iri {
                parser = parser
                    .with_base_iri(base)
                    .map_err(|e| Error::InvalidIri(format!("{base}: {e}")))?;
            }
            let mut triples = parser.for_reader(reader);
            let mut reported = BTreeMap::new();

            while let Some(next) = triples.next() {
                let triple = next.map_err(|e| Error::Syntax(e.to_string()))?;
                let declared: Vec<(String, String)> = triples
                    .prefixes()
                    .map(|(prefix, ns)| (prefix.to_string(), ns.to_string()))
                    .collect();
                report_new_prefixes(declared, &mut reported, sink)?;
                sink.statement(triple)?;
            }

            // Prefixes declared after the last triple.
            let declared: Vec<(String, String)> = triples
                .prefixes()
                .map(|(prefix, ns)| (prefix.to_string(), ns.to_string()))
                .collect();
            report_new_prefixes(declared, &mut reported, sink)?;
        }
        RdfSyntax::NTriples => {
            for next in NTriplesParser::new().for_reader(reader) {
                let triple = next.map_err(|e| Error::Syntax(e.to_string()))?;
                sink.statement(triple)?;
            }
        }
    }
    sink.end()
}

fn report_new_prefixes<S: StatementSink + ?Sized>(
    declared: Vec<(String, String)>,
    reported: &mut BTreeMap<String, String>,
    sink: &mut S,
) -> Result<()> {
    for (prefix, ns) in declared {
        if reported.get(&prefix) != Some(&ns) {
            sink.namespace(&prefix, &ns)?;
            reported.insert(prefix, ns);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::Triple;

    /// Records every event as a string.
    #[derive(Default)]
    struct EventLog(Vec<String>);

    impl StatementSink for EventLog {
        fn start(&mut self) -> Result<()> {
            self.0.push("start".to_string());
            Ok(())
        }

        fn statement(&mut self, statement: Triple) -> Result<()> {
            self.0.push(format!("statement {statement}"));
            Ok(())
        }

        fn namespace(&mut self, prefix: &str, namespace: &str) -> Result<()> {
            self.0.push(format!("namespace {prefix} {namespace}"));
            Ok(())
        }

        fn end(&mut self) -> Result<()> {
            self.0.push("end".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_turtle_events_in_order() {
        let data = r#"
@prefix ex: <http://example.org/> .
ex:a ex:knows ex:b .
ex:b ex:knows ex:c .
"#;
        let mut log = EventLog::default();
        parse_into(data.as_bytes(), RdfSyntax::Turtle, None, &mut log).expect("valid turtle");

        assert_eq!(
            log.0,
            vec![
                "start".to_string(),
                "namespace ex http://example.org/".to_string(),
                "statement <http://example.org/a> <http://example.org/knows> <http://example.org/b>"
                    .to_string(),
                "statement <http://example.org/b> <http://example.org/knows> <http://example.org/c>"
                    .to_string(),
                "end".to_string(),
            ]
        );
    }

    #[test]
    fn test_relative_iris_resolve_against_base() {
        let data = "<a> <p> <b> .";
        let mut log = EventLog::default();
        parse_into(
            data.as_bytes(),
            RdfSyntax::Turtle,
            Some("http://example.org/base/"),
            &mut log,
        )
        .expect("valid turtle");

        assert!(log.0[1].contains("<http://example.org/base/a>"));
    }

    #[test]
    fn test_syntax_error_skips_end() {
        let data = "<http://example.org/a> <http://example.org/p> .";
        let mut log = EventLog::default();
        let err = parse_into(data.as_bytes(), RdfSyntax::NTriples, None, &mut log)
            .expect_err("object is missing");

        assert!(matches!(err, Error::Syntax(_)));
        assert_eq!(log.0, vec!["start".to_string()]);
    }

    #[test]
    fn test_syntax_names() {
        assert_eq!("TTL".parse::<RdfSyntax>().expect("known"), RdfSyntax::Turtle);
        assert_eq!(
            "n-triples".parse::<RdfSyntax>().expect("known"),
            RdfSyntax::NTriples
        );
        assert!("rdfxml".parse::<RdfSyntax>().is_err());
        assert_eq!(RdfSyntax::from_path("dump.nt"), Some(RdfSyntax::NTriples));
        assert_eq!(RdfSyntax::from_path("README"), None);
    }
}
