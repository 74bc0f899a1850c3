//! # Plan Evaluation
//!
//! Runs a [`QueryPlan`] against any [`TripleSource`]. Endpoints supply the
//! source (a locked in-memory graph, or a reader inside a store transaction)
//! and this module does the rest.
//!
//! Evaluation is a straightforward nested-loop join: each triple pattern is
//! looked up once per partial solution, with the variables bound so far
//! substituted in. Query planning and optimisation are out of scope.
//!
//! Every [`Solution`] is an owned map of owned terms. Rows handed to callers
//! never borrow from the source, so they outlive whatever transaction
//! produced them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use oxrdf::vocab::xsd;
use oxrdf::{BlankNode, Literal, NamedNode, Subject, Term, Triple};

use crate::batch::Batch;
use crate::plan::{Expr, PatternTriple, PlanNode, QueryForm, QueryPlan, Slot};
use crate::{Error, Result};

// =============================================================================
// Sources and Solutions
// =============================================================================

/// Anything that can answer "which triples match this pattern?".
pub trait TripleSource {
    /// Triples matching the pattern, `None` meaning "any".
    fn triples_matching(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> Result<Vec<Triple>>;
}

/// One result row: variable name (without `?`) to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Solution(BTreeMap<String, Term>);

/// Initial variable bindings for a query. Same shape as a result row.
pub type Bindings = Solution;

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, variable: impl Into<String>, value: impl Into<Term>) -> Self {
        self.insert(variable, value);
        self
    }

    pub fn insert(&mut self, variable: impl Into<String>, value: impl Into<Term>) -> Option<Term> {
        self.0.insert(variable.into(), value.into())
    }

    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.0.get(variable)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.0.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Lexical value of a bound IRI or literal; the label for blank nodes.
    pub fn value(&self, variable: &str) -> Option<&str> {
        self.get(variable).map(|term| match term {
            Term::NamedNode(node) => node.as_str(),
            Term::BlankNode(node) => node.as_str(),
            Term::Literal(literal) => literal.value(),
            #[allow(unreachable_patterns)]
            _ => "",
        })
    }

    pub fn into_map(self) -> BTreeMap<String, Term> {
        self.0
    }

    fn project(&self, variables: &[String]) -> Solution {
        Solution(
            variables
                .iter()
                .filter_map(|v| self.0.get(v).map(|t| (v.clone(), t.clone())))
                .collect(),
        )
    }

    fn without_internal(mut self) -> Solution {
        self.0.retain(|name, _| !name.starts_with("_:"));
        self
    }
}

impl FromIterator<(String, Term)> for Solution {
    fn from_iter<I: IntoIterator<Item = (String, Term)>>(iter: I) -> Self {
        Solution(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Term>> for Solution {
    fn from(map: BTreeMap<String, Term>) -> Self {
        Solution(map)
    }
}

// =============================================================================
// Query Forms
// =============================================================================

fn wrong_form(expected: &'static str, plan: &QueryPlan) -> Error {
    Error::WrongQueryForm {
        expected,
        actual: plan.form().name(),
    }
}

/// Rows of a SELECT plan.
pub fn select(source: &dyn TripleSource, plan: &QueryPlan, bindings: &Bindings) -> Result<Vec<Solution>> {
    if !matches!(plan.form(), QueryForm::Select { .. }) {
        return Err(wrong_form("SELECT", plan));
    }
    let rows = evaluate(source, plan.root(), vec![bindings.clone()])?;
    Ok(rows.into_iter().map(Solution::without_internal).collect())
}

/// Instantiates a CONSTRUCT plan's template into `into`.
///
/// Blank nodes in the template are fresh for every row. Triples already in
/// `into` (or produced by an earlier row) are not added again. Template
/// triples with an unbound variable, or with a literal in subject or
/// predicate position, are skipped for that row.
pub fn construct(
    source: &dyn TripleSource,
    plan: &QueryPlan,
    bindings: &Bindings,
    mut into: Batch,
) -> Result<Batch> {
    let QueryForm::Construct { template } = plan.form() else {
        return Err(wrong_form("CONSTRUCT", plan));
    };

    let rows = evaluate(source, plan.root(), vec![bindings.clone()])?;
    let mut seen: HashSet<Triple> = into.iter().cloned().collect();

    for row in &rows {
        let mut blanks: HashMap<&str, BlankNode> = HashMap::new();
        for pattern in template {
            if let Some(triple) = instantiate(pattern, row, &mut blanks) {
                if seen.insert(triple.clone()) {
                    into.push(triple);
                }
            }
        }
    }
    Ok(into)
}

/// True if an ASK plan's pattern has at least one solution.
pub fn ask(source: &dyn TripleSource, plan: &QueryPlan, bindings: &Bindings) -> Result<bool> {
    if !matches!(plan.form(), QueryForm::Ask) {
        return Err(wrong_form("ASK", plan));
    }
    Ok(!evaluate(source, plan.root(), vec![bindings.clone()])?.is_empty())
}

fn instantiate<'t>(
    pattern: &'t PatternTriple,
    row: &Solution,
    blanks: &mut HashMap<&'t str, BlankNode>,
) -> Option<Triple> {
    let mut term = |slot: &'t Slot| -> Option<Term> {
        match slot {
            Slot::Constant(t) => Some(t.clone()),
            Slot::Variable(name) => row.get(name).cloned(),
            Slot::BlankNode(label) => Some(
                blanks
                    .entry(label.as_str())
                    .or_insert_with(BlankNode::default)
                    .clone()
                    .into(),
            ),
        }
    };

    let subject = as_subject(&term(&pattern.subject)?)?;
    let Term::NamedNode(predicate) = term(&pattern.predicate)? else {
        return None;
    };
    let object = term(&pattern.object)?;
    Some(Triple::new(subject, predicate, object))
}

// =============================================================================
// Graph Patterns
// =============================================================================

/// Evaluates `node` once for each input solution.
pub fn evaluate(source: &dyn TripleSource, node: &PlanNode, input: Vec<Solution>) -> Result<Vec<Solution>> {
    match node {
        PlanNode::Bgp(patterns) => match_bgp(source, patterns, input),
        PlanNode::Join(left, right) => {
            let left = evaluate(source, left, input)?;
            evaluate(source, right, left)
        }
        PlanNode::Optional {
            left,
            right,
            filter,
        } => {
            let mut out = Vec::new();
            for solution in evaluate(source, left, input)? {
                let mut extended = evaluate(source, right, vec![solution.clone()])?;
                if let Some(filter) = filter {
                    extended.retain(|s| effective_boolean(&eval_expr(filter, s)) == Some(true));
                }
                if extended.is_empty() {
                    out.push(solution);
                } else {
                    out.extend(extended);
                }
            }
            Ok(out)
        }
        PlanNode::Union(left, right) => {
            let mut out = evaluate(source, left, input.clone())?;
            out.extend(evaluate(source, right, input)?);
            Ok(out)
        }
        PlanNode::Filter { expr, inner } => {
            let mut out = evaluate(source, inner, input)?;
            out.retain(|s| effective_boolean(&eval_expr(expr, s)) == Some(true));
            Ok(out)
        }
        PlanNode::Project { variables, inner } => Ok(evaluate(source, inner, input)?
            .iter()
            .map(|s| s.project(variables))
            .collect()),
        PlanNode::Distinct(inner) | PlanNode::Reduced(inner) => {
            let mut seen = HashSet::new();
            let mut out = evaluate(source, inner, input)?;
            out.retain(|s| seen.insert(s.clone()));
            Ok(out)
        }
        PlanNode::OrderBy { keys, inner } => {
            let mut out = evaluate(source, inner, input)?;
            out.sort_by(|a, b| {
                for key in keys {
                    let ord = order_terms(&eval_expr(&key.expr, a), &eval_expr(&key.expr, b));
                    let ord = if key.descending { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            Ok(out)
        }
        PlanNode::Slice {
            start,
            length,
            inner,
        } => {
            let out = evaluate(source, inner, input)?.into_iter().skip(*start);
            Ok(match length {
                Some(length) => out.take(*length).collect(),
                None => out.collect(),
            })
        }
    }
}

/// A pattern position after substituting the current solution.
enum Resolved<'a> {
    Bound(Term),
    Free(&'a str),
}

fn resolve<'a>(slot: &'a Slot, solution: &Solution) -> Resolved<'a> {
    match slot {
        Slot::Constant(term) => Resolved::Bound(term.clone()),
        Slot::Variable(name) | Slot::BlankNode(name) => match solution.get(name) {
            Some(term) => Resolved::Bound(term.clone()),
            None => Resolved::Free(name),
        },
    }
}

fn as_subject(term: &Term) -> Option<Subject> {
    match term {
        Term::NamedNode(node) => Some(node.clone().into()),
        Term::BlankNode(node) => Some(node.clone().into()),
        _ => None,
    }
}

/// Binds a free position; a bound one must already agree.
fn bind(solution: &mut Solution, slot: &Resolved<'_>, value: Term) -> bool {
    match slot {
        Resolved::Bound(_) => true,
        Resolved::Free(name) => match solution.get(name) {
            // Same variable twice in one pattern, e.g. `?x ?p ?x`.
            Some(existing) => *existing == value,
            None => {
                solution.insert(*name, value);
                true
            }
        },
    }
}

fn match_bgp(source: &dyn TripleSource, patterns: &[PatternTriple], input: Vec<Solution>) -> Result<Vec<Solution>> {
    let mut current = input;
    for pattern in patterns {
        if current.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for solution in &current {
            let s = resolve(&pattern.subject, solution);
            let p = resolve(&pattern.predicate, solution);
            let o = resolve(&pattern.object, solution);

            let subject = match &s {
                Resolved::Bound(term) => match as_subject(term) {
                    Some(subject) => Some(subject),
                    None => continue,
                },
                Resolved::Free(_) => None,
            };
            let predicate = match &p {
                Resolved::Bound(Term::NamedNode(node)) => Some(node.clone()),
                Resolved::Bound(_) => continue,
                Resolved::Free(_) => None,
            };
            let object = match &o {
                Resolved::Bound(term) => Some(term),
                Resolved::Free(_) => None,
            };

            for triple in source.triples_matching(subject.as_ref(), predicate.as_ref(), object)? {
                let mut extended = solution.clone();
                if bind(&mut extended, &s, triple.subject.into())
                    && bind(&mut extended, &p, triple.predicate.into())
                    && bind(&mut extended, &o, triple.object)
                {
                    next.push(extended);
                }
            }
        }
        current = next;
    }
    Ok(current)
}

// =============================================================================
// Expressions
// =============================================================================

const XSD_NUMERIC: &[&str] = &[
    "integer",
    "decimal",
    "float",
    "double",
    "int",
    "long",
    "short",
    "byte",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "positiveInteger",
    "negativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];

fn numeric_value(term: &Term) -> Option<f64> {
    match term {
        Term::Literal(literal) => numeric_literal(literal),
        _ => None,
    }
}

fn numeric_literal(literal: &Literal) -> Option<f64> {
    let local = literal
        .datatype()
        .as_str()
        .strip_prefix("http://www.w3.org/2001/XMLSchema#")?;
    if XSD_NUMERIC.contains(&local) {
        literal.value().trim().parse().ok()
    } else {
        None
    }
}

fn boolean(value: bool) -> Option<Term> {
    Some(Literal::from(value).into())
}

/// SPARQL effective boolean value; `None` is a type error.
fn effective_boolean(value: &Option<Term>) -> Option<bool> {
    let Some(Term::Literal(literal)) = value else {
        return None;
    };
    if literal.datatype() == xsd::BOOLEAN {
        return Some(matches!(literal.value(), "true" | "1"));
    }
    if let Some(n) = numeric_literal(literal) {
        return Some(n != 0.0 && !n.is_nan());
    }
    if literal.datatype() == xsd::STRING || literal.language().is_some() {
        return Some(!literal.value().is_empty());
    }
    None
}

fn terms_equal(a: &Term, b: &Term) -> bool {
    match (numeric_value(a), numeric_value(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Comparison for `<`, `>` and friends: numbers by value, literals of the
/// same datatype and language by lexical form. Anything else is an error.
fn compare_values(a: &Term, b: &Term) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (numeric_value(a), numeric_value(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Term::Literal(x), Term::Literal(y))
            if x.datatype() == y.datatype() && x.language() == y.language() =>
        {
            Some(x.value().cmp(y.value()))
        }
        _ => None,
    }
}

fn eval_expr(expr: &Expr, solution: &Solution) -> Option<Term> {
    let compare = |a: &Expr, b: &Expr, accept: fn(Ordering) -> bool| -> Option<Term> {
        let a = eval_expr(a, solution)?;
        let b = eval_expr(b, solution)?;
        boolean(accept(compare_values(&a, &b)?))
    };

    match expr {
        Expr::Variable(name) => solution.get(name).cloned(),
        Expr::Constant(term) => Some(term.clone()),
        Expr::Bound(name) => boolean(solution.contains(name)),
        Expr::Not(inner) => boolean(!effective_boolean(&eval_expr(inner, solution))?),
        Expr::And(a, b) => {
            let a = effective_boolean(&eval_expr(a, solution));
            let b = effective_boolean(&eval_expr(b, solution));
            match (a, b) {
                (Some(false), _) | (_, Some(false)) => boolean(false),
                (Some(true), Some(true)) => boolean(true),
                _ => None,
            }
        }
        Expr::Or(a, b) => {
            let a = effective_boolean(&eval_expr(a, solution));
            let b = effective_boolean(&eval_expr(b, solution));
            match (a, b) {
                (Some(true), _) | (_, Some(true)) => boolean(true),
                (Some(false), Some(false)) => boolean(false),
                _ => None,
            }
        }
        Expr::Equal(a, b) => {
            let a = eval_expr(a, solution)?;
            let b = eval_expr(b, solution)?;
            boolean(terms_equal(&a, &b))
        }
        Expr::SameTerm(a, b) => {
            let a = eval_expr(a, solution)?;
            let b = eval_expr(b, solution)?;
            boolean(a == b)
        }
        Expr::Less(a, b) => compare(a, b, Ordering::is_lt),
        Expr::LessOrEqual(a, b) => compare(a, b, Ordering::is_le),
        Expr::Greater(a, b) => compare(a, b, Ordering::is_gt),
        Expr::GreaterOrEqual(a, b) => compare(a, b, Ordering::is_ge),
    }
}

/// ORDER BY ordering: unbound < blank nodes < IRIs < literals.
fn order_terms(a: &Option<Term>, b: &Option<Term>) -> Ordering {
    fn rank(term: &Option<Term>) -> u8 {
        match term {
            None => 0,
            Some(Term::BlankNode(_)) => 1,
            Some(Term::NamedNode(_)) => 2,
            Some(_) => 3,
        }
    }

    match (a, b) {
        (Some(Term::BlankNode(x)), Some(Term::BlankNode(y))) => x.as_str().cmp(y.as_str()),
        (Some(Term::NamedNode(x)), Some(Term::NamedNode(y))) => x.as_str().cmp(y.as_str()),
        (Some(Term::Literal(x)), Some(Term::Literal(y))) => {
            match (numeric_literal(x), numeric_literal(y)) {
                (Some(nx), Some(ny)) => nx.partial_cmp(&ny).unwrap_or(Ordering::Equal),
                _ => x.value().cmp(y.value()),
            }
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Vec-backed source for evaluator tests.
    struct VecSource(Vec<Triple>);

    impl TripleSource for VecSource {
        fn triples_matching(
            &self,
            subject: Option<&Subject>,
            predicate: Option<&NamedNode>,
            object: Option<&Term>,
        ) -> Result<Vec<Triple>> {
            Ok(self
                .0
                .iter()
                .filter(|t| subject.map_or(true, |s| &t.subject == s))
                .filter(|t| predicate.map_or(true, |p| &t.predicate == p))
                .filter(|t| object.map_or(true, |o| &t.object == o))
                .cloned()
                .collect())
        }
    }

    fn ex(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{local}"))
    }

    fn people() -> VecSource {
        let mut triples = Vec::new();
        for (name, age) in [("alice", 34), ("bob", 27), ("carol", 41)] {
            triples.push(Triple::new(ex(name), ex("name"), Literal::new_simple_literal(name)));
            triples.push(Triple::new(ex(name), ex("age"), Literal::from(age as i64)));
        }
        triples.push(Triple::new(ex("alice"), ex("knows"), ex("bob")));
        triples.push(Triple::new(ex("bob"), ex("knows"), ex("carol")));
        VecSource(triples)
    }

    fn plan(text: &str) -> QueryPlan {
        QueryPlan::parse(&format!("PREFIX ex: <http://example.org/>\n{text}")).expect("valid query")
    }

    #[test]
    fn test_select_with_join_and_filter() {
        let rows = select(
            &people(),
            &plan("SELECT ?n WHERE { ?a ex:knows ?b . ?b ex:name ?n . ?b ex:age ?age FILTER(?age > 30) }"),
            &Bindings::new(),
        )
        .expect("evaluates");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("n"), Some("carol"));
        assert!(!rows[0].contains("age"), "projection drops ?age");
    }

    #[test]
    fn test_initial_bindings_restrict_results() {
        let bindings = Bindings::new().with("a", ex("alice"));
        let rows = select(
            &people(),
            &plan("SELECT ?b WHERE { ?a ex:knows ?b }"),
            &bindings,
        )
        .expect("evaluates");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("b"), Some(&Term::from(ex("bob"))));
    }

    #[test]
    fn test_optional_keeps_unmatched() {
        let rows = select(
            &people(),
            &plan("SELECT ?p ?k WHERE { ?p ex:name ?n OPTIONAL { ?p ex:knows ?k } } ORDER BY ?n"),
            &Bindings::new(),
        )
        .expect("evaluates");

        assert_eq!(rows.len(), 3);
        assert!(rows[0].contains("k"), "alice knows bob");
        assert!(!rows[2].contains("k"), "carol knows nobody");
    }

    #[test]
    fn test_order_limit_and_union() {
        let rows = select(
            &people(),
            &plan("SELECT ?x WHERE { { ?x ex:knows ex:bob } UNION { ?x ex:knows ex:carol } } ORDER BY DESC(?x) LIMIT 1"),
            &Bindings::new(),
        )
        .expect("evaluates");

        assert_eq!(rows, vec![Solution::new().with("x", ex("bob"))]);
    }

    #[test]
    fn test_construct_skips_duplicates_and_unbound() {
        let seed: Batch = vec![Triple::new(ex("alice"), ex("friendOf"), ex("bob"))]
            .into_iter()
            .collect();
        let graph = construct(
            &people(),
            &plan("CONSTRUCT { ?a ex:friendOf ?b . ?a ex:missing ?nope } WHERE { ?a ex:knows ?b }"),
            &Bindings::new(),
            seed,
        )
        .expect("evaluates");

        assert_eq!(graph.len(), 2);
        assert!(graph.contains(&Triple::new(ex("bob"), ex("friendOf"), ex("carol"))));
    }

    #[test]
    fn test_ask_and_wrong_form() {
        let yes = plan("ASK { ex:alice ex:knows ?x }");
        let no = plan("ASK { ex:carol ex:knows ?x }");
        assert!(ask(&people(), &yes, &Bindings::new()).expect("evaluates"));
        assert!(!ask(&people(), &no, &Bindings::new()).expect("evaluates"));

        assert!(matches!(
            select(&people(), &yes, &Bindings::new()),
            Err(Error::WrongQueryForm { expected: "SELECT", actual: "ASK" })
        ));
    }

    #[test]
    fn test_numeric_equality_across_types() {
        let a: Term = Literal::new_typed_literal("1.0", xsd::DECIMAL).into();
        let b: Term = Literal::from(1_i64).into();
        assert!(terms_equal(&a, &b));
        assert_eq!(compare_values(&a, &Literal::from(2_i64).into()), Some(Ordering::Less));
    }
}
