//! # Query Plans
//!
//! A [`QueryPlan`] is the immutable, parsed form of a SPARQL query. The text
//! is parsed with `spargebra` and lowered into a small algebra that
//! [`eval`](crate::eval) knows how to run:
//!
//! ```text
//!   "SELECT ?n WHERE { ?p foaf:name ?n }"
//!        │ spargebra::Query::parse
//!        ▼
//!   Query::Select { pattern: Project(Bgp[...]) }
//!        │ lower
//!        ▼
//!   QueryPlan { form: Select [n], root: Project [n] (Bgp [?p foaf:name ?n]) }
//! ```
//!
//! Plans are shared between threads through the plan cache, so they hold no
//! interior mutability.
//!
//! ## Supported Subset
//!
//! Basic graph patterns, group joins, OPTIONAL, UNION, FILTER, projection,
//! DISTINCT, REDUCED, ORDER BY, LIMIT/OFFSET. SELECT, CONSTRUCT and ASK.
//! Anything else is rejected with [`Error::UnsupportedQuery`] at parse time,
//! so an unsupported query never reaches the cache.

use oxrdf::Term;
use spargebra::algebra::{Expression, GraphPattern, OrderExpression};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};
use spargebra::Query;

use crate::{Error, Result};

// =============================================================================
// Plan Types
// =============================================================================

/// One position of a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Constant(Term),
    Variable(String),
    /// Blank node label. Only appears in CONSTRUCT templates; blank nodes in
    /// WHERE clauses become variables.
    BlankNode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTriple {
    pub subject: Slot,
    pub predicate: Slot,
    pub object: Slot,
}

/// Filter and ordering expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Variable(String),
    Constant(Term),
    Bound(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Equal(Box<Expr>, Box<Expr>),
    SameTerm(Box<Expr>, Box<Expr>),
    Less(Box<Expr>, Box<Expr>),
    LessOrEqual(Box<Expr>, Box<Expr>),
    Greater(Box<Expr>, Box<Expr>),
    GreaterOrEqual(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub expr: Expr,
    pub descending: bool,
}

/// Graph pattern algebra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanNode {
    Bgp(Vec<PatternTriple>),
    Join(Box<PlanNode>, Box<PlanNode>),
    Optional {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        filter: Option<Expr>,
    },
    Union(Box<PlanNode>, Box<PlanNode>),
    Filter {
        expr: Expr,
        inner: Box<PlanNode>,
    },
    Project {
        variables: Vec<String>,
        inner: Box<PlanNode>,
    },
    Distinct(Box<PlanNode>),
    Reduced(Box<PlanNode>),
    OrderBy {
        keys: Vec<OrderKey>,
        inner: Box<PlanNode>,
    },
    Slice {
        start: usize,
        length: Option<usize>,
        inner: Box<PlanNode>,
    },
}

/// What the query produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryForm {
    Select { variables: Vec<String> },
    Construct { template: Vec<PatternTriple> },
    Ask,
}

impl QueryForm {
    pub fn name(&self) -> &'static str {
        match self {
            QueryForm::Select { .. } => "SELECT",
            QueryForm::Construct { .. } => "CONSTRUCT",
            QueryForm::Ask => "ASK",
        }
    }
}

/// Parsed, immutable query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    text: String,
    form: QueryForm,
    root: PlanNode,
}

impl QueryPlan {
    /// Parses and lowers `text`.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedQuery`] carrying `text` if it is not valid SPARQL
    /// - [`Error::UnsupportedQuery`] if it uses constructs outside the subset
    pub fn parse(text: &str) -> Result<Self> {
        let query = Query::parse(text, None).map_err(|e| Error::MalformedQuery {
            query: text.to_string(),
            message: e.to_string(),
        })?;

        let (form, root) = match query {
            Query::Select {
                dataset, pattern, ..
            } => {
                reject_dataset(dataset.is_some())?;
                let root = lower_pattern(&pattern)?;
                let variables = select_variables(&root);
                (QueryForm::Select { variables }, root)
            }
            Query::Construct {
                template,
                dataset,
                pattern,
                ..
            } => {
                reject_dataset(dataset.is_some())?;
                let template = template
                    .iter()
                    .map(lower_template_triple)
                    .collect::<Result<Vec<_>>>()?;
                (QueryForm::Construct { template }, lower_pattern(&pattern)?)
            }
            Query::Ask {
                dataset, pattern, ..
            } => {
                reject_dataset(dataset.is_some())?;
                (QueryForm::Ask, lower_pattern(&pattern)?)
            }
            Query::Describe { .. } => return Err(unsupported("DESCRIBE")),
        };

        Ok(Self {
            text: text.to_string(),
            form,
            root,
        })
    }

    /// Source text the plan was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn form(&self) -> &QueryForm {
        &self.form
    }

    pub fn root(&self) -> &PlanNode {
        &self.root
    }

    /// Result columns of a SELECT, empty for other forms.
    pub fn variables(&self) -> &[String] {
        match &self.form {
            QueryForm::Select { variables } => variables,
            _ => &[],
        }
    }
}

// =============================================================================
// Lowering
// =============================================================================

fn unsupported(feature: &str) -> Error {
    Error::UnsupportedQuery {
        feature: feature.to_string(),
    }
}

fn reject_dataset(has_dataset: bool) -> Result<()> {
    if has_dataset {
        Err(unsupported("FROM / FROM NAMED"))
    } else {
        Ok(())
    }
}

/// Name of the internal variable standing for a WHERE-clause blank node.
/// SPARQL variable names cannot contain ':', so these never clash.
fn blank_variable(label: &str) -> String {
    format!("_:{label}")
}

fn lower_pattern(pattern: &GraphPattern) -> Result<PlanNode> {
    let node = match pattern {
        GraphPattern::Bgp { patterns } => PlanNode::Bgp(
            patterns
                .iter()
                .map(lower_where_triple)
                .collect::<Result<Vec<_>>>()?,
        ),
        GraphPattern::Join { left, right } => PlanNode::Join(
            Box::new(lower_pattern(left)?),
            Box::new(lower_pattern(right)?),
        ),
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => PlanNode::Optional {
            left: Box::new(lower_pattern(left)?),
            right: Box::new(lower_pattern(right)?),
            filter: expression.as_ref().map(lower_expression).transpose()?,
        },
        GraphPattern::Union { left, right } => PlanNode::Union(
            Box::new(lower_pattern(left)?),
            Box::new(lower_pattern(right)?),
        ),
        GraphPattern::Filter { expr, inner } => PlanNode::Filter {
            expr: lower_expression(expr)?,
            inner: Box::new(lower_pattern(inner)?),
        },
        GraphPattern::Project { inner, variables } => PlanNode::Project {
            variables: variables.iter().map(|v| v.as_str().to_string()).collect(),
            inner: Box::new(lower_pattern(inner)?),
        },
        GraphPattern::Distinct { inner } => PlanNode::Distinct(Box::new(lower_pattern(inner)?)),
        GraphPattern::Reduced { inner } => PlanNode::Reduced(Box::new(lower_pattern(inner)?)),
        GraphPattern::OrderBy { inner, expression } => PlanNode::OrderBy {
            keys: expression
                .iter()
                .map(|order| match order {
                    OrderExpression::Asc(e) => Ok(OrderKey {
                        expr: lower_expression(e)?,
                        descending: false,
                    }),
                    OrderExpression::Desc(e) => Ok(OrderKey {
                        expr: lower_expression(e)?,
                        descending: true,
                    }),
                })
                .collect::<Result<Vec<_>>>()?,
            inner: Box::new(lower_pattern(inner)?),
        },
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => PlanNode::Slice {
            start: *start,
            length: *length,
            inner: Box::new(lower_pattern(inner)?),
        },
        GraphPattern::Path { .. } => return Err(unsupported("property paths")),
        GraphPattern::Graph { .. } => return Err(unsupported("GRAPH")),
        GraphPattern::Extend { .. } => return Err(unsupported("BIND / SELECT expressions")),
        GraphPattern::Minus { .. } => return Err(unsupported("MINUS")),
        GraphPattern::Values { .. } => return Err(unsupported("VALUES")),
        GraphPattern::Group { .. } => return Err(unsupported("GROUP BY / aggregates")),
        GraphPattern::Service { .. } => return Err(unsupported("SERVICE")),
        #[allow(unreachable_patterns)]
        _ => return Err(unsupported("graph pattern")),
    };
    Ok(node)
}

fn lower_where_triple(pattern: &TriplePattern) -> Result<PatternTriple> {
    Ok(PatternTriple {
        subject: lower_term_pattern(&pattern.subject, true)?,
        predicate: lower_predicate(&pattern.predicate),
        object: lower_term_pattern(&pattern.object, true)?,
    })
}

fn lower_template_triple(pattern: &TriplePattern) -> Result<PatternTriple> {
    Ok(PatternTriple {
        subject: lower_term_pattern(&pattern.subject, false)?,
        predicate: lower_predicate(&pattern.predicate),
        object: lower_term_pattern(&pattern.object, false)?,
    })
}

fn lower_predicate(pattern: &NamedNodePattern) -> Slot {
    match pattern {
        NamedNodePattern::NamedNode(node) => Slot::Constant(node.clone().into()),
        NamedNodePattern::Variable(var) => Slot::Variable(var.as_str().to_string()),
    }
}

fn lower_term_pattern(pattern: &TermPattern, in_where: bool) -> Result<Slot> {
    match pattern {
        TermPattern::NamedNode(node) => Ok(Slot::Constant(node.clone().into())),
        TermPattern::Literal(literal) => Ok(Slot::Constant(literal.clone().into())),
        TermPattern::Variable(var) => Ok(Slot::Variable(var.as_str().to_string())),
        TermPattern::BlankNode(node) if in_where => Ok(Slot::Variable(blank_variable(node.as_str()))),
        TermPattern::BlankNode(node) => Ok(Slot::BlankNode(node.as_str().to_string())),
        #[allow(unreachable_patterns)]
        _ => Err(unsupported("quoted triple patterns")),
    }
}

fn lower_expression(expression: &Expression) -> Result<Expr> {
    let binary = |a: &Expression, b: &Expression| -> Result<(Box<Expr>, Box<Expr>)> {
        Ok((Box::new(lower_expression(a)?), Box::new(lower_expression(b)?)))
    };

    let expr = match expression {
        Expression::NamedNode(node) => Expr::Constant(node.clone().into()),
        Expression::Literal(literal) => Expr::Constant(literal.clone().into()),
        Expression::Variable(var) => Expr::Variable(var.as_str().to_string()),
        Expression::Bound(var) => Expr::Bound(var.as_str().to_string()),
        Expression::Not(inner) => Expr::Not(Box::new(lower_expression(inner)?)),
        Expression::And(a, b) => {
            let (a, b) = binary(a, b)?;
            Expr::And(a, b)
        }
        Expression::Or(a, b) => {
            let (a, b) = binary(a, b)?;
            Expr::Or(a, b)
        }
        Expression::Equal(a, b) => {
            let (a, b) = binary(a, b)?;
            Expr::Equal(a, b)
        }
        Expression::SameTerm(a, b) => {
            let (a, b) = binary(a, b)?;
            Expr::SameTerm(a, b)
        }
        Expression::Less(a, b) => {
            let (a, b) = binary(a, b)?;
            Expr::Less(a, b)
        }
        Expression::LessOrEqual(a, b) => {
            let (a, b) = binary(a, b)?;
            Expr::LessOrEqual(a, b)
        }
        Expression::Greater(a, b) => {
            let (a, b) = binary(a, b)?;
            Expr::Greater(a, b)
        }
        Expression::GreaterOrEqual(a, b) => {
            let (a, b) = binary(a, b)?;
            Expr::GreaterOrEqual(a, b)
        }
        Expression::Exists(_) => return Err(unsupported("EXISTS")),
        Expression::FunctionCall(..) => return Err(unsupported("function calls")),
        _ => return Err(unsupported("filter operator")),
    };
    Ok(expr)
}

/// Columns of a SELECT: the outermost projection, or every visible variable
/// in order of first appearance.
fn select_variables(root: &PlanNode) -> Vec<String> {
    match root {
        PlanNode::Project { variables, .. } => variables.clone(),
        PlanNode::Distinct(inner) | PlanNode::Reduced(inner) => select_variables(inner),
        PlanNode::OrderBy { inner, .. } | PlanNode::Slice { inner, .. } => select_variables(inner),
        other => {
            let mut vars = Vec::new();
            collect_variables(other, &mut vars);
            vars
        }
    }
}

fn push_variable(slot: &Slot, vars: &mut Vec<String>) {
    if let Slot::Variable(name) = slot {
        if !name.starts_with("_:") && !vars.contains(name) {
            vars.push(name.clone());
        }
    }
}

fn collect_variables(node: &PlanNode, vars: &mut Vec<String>) {
    match node {
        PlanNode::Bgp(patterns) => {
            for p in patterns {
                push_variable(&p.subject, vars);
                push_variable(&p.predicate, vars);
                push_variable(&p.object, vars);
            }
        }
        PlanNode::Join(a, b) | PlanNode::Union(a, b) => {
            collect_variables(a, vars);
            collect_variables(b, vars);
        }
        PlanNode::Optional { left, right, .. } => {
            collect_variables(left, vars);
            collect_variables(right, vars);
        }
        PlanNode::Project { variables, .. } => {
            for v in variables {
                if !vars.contains(v) {
                    vars.push(v.clone());
                }
            }
        }
        PlanNode::Filter { inner, .. }
        | PlanNode::OrderBy { inner, .. }
        | PlanNode::Slice { inner, .. } => collect_variables(inner, vars),
        PlanNode::Distinct(inner) | PlanNode::Reduced(inner) => collect_variables(inner, vars),
    }
}
