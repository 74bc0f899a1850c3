//! # Term Encoding for SQLite
//!
//! This module maps RDF terms onto plain SQLite columns and back.
//!
//! ## Column Format
//!
//! ```text
//! subject:   s_kind INTEGER, s_value TEXT
//! predicate: p TEXT                              (always an IRI)
//! object:    o_kind INTEGER, o_value TEXT, o_datatype TEXT, o_lang TEXT
//! ```
//!
//! | kind | meaning | value | datatype | lang |
//! |------|---------|-------|----------|------|
//! | 0 | IRI | the IRI | "" | "" |
//! | 1 | blank node | its label | "" | "" |
//! | 2 | literal | lexical form | datatype IRI | language tag or "" |
//!
//! Empty strings instead of NULLs keep every column usable in the primary
//! key, so inserting the same triple twice is a no-op.
//!
//! Decoding always produces owned values, so a decoded term stays valid after
//! the transaction that read it has ended.

use oxrdf::{BlankNode, Literal, NamedNode, Subject, Term};

use crate::{Error, Result};

// =============================================================================
// Kinds
// =============================================================================

pub const KIND_IRI: i64 = 0;
pub const KIND_BLANK: i64 = 1;
pub const KIND_LITERAL: i64 = 2;

/// Column values for an object term, borrowed from the term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectColumns<'a> {
    pub kind: i64,
    pub value: &'a str,
    pub datatype: &'a str,
    pub lang: &'a str,
}

// =============================================================================
// Encoding
// =============================================================================

/// `(s_kind, s_value)` for a subject.
pub fn encode_subject(subject: &Subject) -> Result<(i64, &str)> {
    match subject {
        Subject::NamedNode(node) => Ok((KIND_IRI, node.as_str())),
        Subject::BlankNode(node) => Ok((KIND_BLANK, node.as_str())),
        #[allow(unreachable_patterns)]
        _ => Err(Error::Schema(format!(
            "quoted triples cannot be stored: {subject}"
        ))),
    }
}

/// Object columns for a term.
pub fn encode_object(term: &Term) -> Result<ObjectColumns<'_>> {
    match term {
        Term::NamedNode(node) => Ok(ObjectColumns {
            kind: KIND_IRI,
            value: node.as_str(),
            datatype: "",
            lang: "",
        }),
        Term::BlankNode(node) => Ok(ObjectColumns {
            kind: KIND_BLANK,
            value: node.as_str(),
            datatype: "",
            lang: "",
        }),
        Term::Literal(literal) => Ok(ObjectColumns {
            kind: KIND_LITERAL,
            value: literal.value(),
            datatype: literal.datatype().as_str(),
            lang: literal.language().unwrap_or(""),
        }),
        #[allow(unreachable_patterns)]
        _ => Err(Error::Schema(format!("quoted triples cannot be stored: {term}"))),
    }
}

// =============================================================================
// Decoding
// =============================================================================

pub fn decode_subject(kind: i64, value: String) -> Result<Subject> {
    match kind {
        KIND_IRI => Ok(NamedNode::new_unchecked(value).into()),
        KIND_BLANK => Ok(BlankNode::new_unchecked(value).into()),
        other => Err(Error::Schema(format!("invalid subject kind {other}"))),
    }
}

pub fn decode_object(kind: i64, value: String, datatype: String, lang: String) -> Result<Term> {
    match kind {
        KIND_IRI => Ok(NamedNode::new_unchecked(value).into()),
        KIND_BLANK => Ok(BlankNode::new_unchecked(value).into()),
        KIND_LITERAL if !lang.is_empty() => {
            Ok(Literal::new_language_tagged_literal_unchecked(value, lang).into())
        }
        KIND_LITERAL => Ok(Literal::new_typed_literal(value, NamedNode::new_unchecked(datatype)).into()),
        other => Err(Error::Schema(format!("invalid object kind {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::vocab::xsd;

    fn roundtrip_object(term: Term) -> Term {
        let cols = encode_object(&term).expect("encodable");
        decode_object(
            cols.kind,
            cols.value.to_string(),
            cols.datatype.to_string(),
            cols.lang.to_string(),
        )
        .expect("decodable")
    }

    #[test]
    fn test_literal_variants_survive() {
        let simple: Term = Literal::new_simple_literal("Alice").into();
        let typed: Term = Literal::new_typed_literal("42", xsd::INTEGER).into();
        let tagged: Term = Literal::new_language_tagged_literal_unchecked("chat", "fr").into();

        for term in [simple, typed, tagged] {
            assert_eq!(roundtrip_object(term.clone()), term);
        }
    }

    #[test]
    fn test_simple_literal_stores_xsd_string() {
        let term: Term = Literal::new_simple_literal("x").into();
        let cols = encode_object(&term).expect("encodable");
        assert_eq!(cols.kind, KIND_LITERAL);
        assert_eq!(cols.datatype, xsd::STRING.as_str());
        assert_eq!(cols.lang, "");
    }

    #[test]
    fn test_subject_kinds() {
        let iri: Subject = NamedNode::new_unchecked("http://example.org/a").into();
        assert_eq!(
            encode_subject(&iri).expect("encodable"),
            (KIND_IRI, "http://example.org/a")
        );

        let blank: Subject = BlankNode::new_unchecked("b0").into();
        let (kind, value) = encode_subject(&blank).expect("encodable");
        assert_eq!(
            decode_subject(kind, value.to_string()).expect("decodable"),
            blank
        );
    }

    #[test]
    fn test_unknown_kind_is_schema_error() {
        assert!(matches!(
            decode_subject(KIND_LITERAL, "x".to_string()),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            decode_object(9, String::new(), String::new(), String::new()),
            Err(Error::Schema(_))
        ));
    }
}
