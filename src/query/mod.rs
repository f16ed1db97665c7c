//! Field-aware boolean queries
//!
//! User input such as `author:Smith AND year:2018` is parsed into a
//! [`QueryNode`] tree by [`parse_query`], then rendered into a provider's
//! textual search syntax by a [`QueryTransformer`].
//!
//! - `parser` - tokenizer and recursive-descent parser for the query language
//! - `transformer` - declarative field tables and the rendering walk

mod parser;
mod transformer;

pub use parser::parse_query;
pub use transformer::{FieldTag, OtherFields, QuerySyntax, QueryTransformer, YearSyntax};

/// Field name used for publication year terms (`year:2018`)
pub const YEAR_FIELD: &str = "year";

/// Field name used for publication year ranges (`year-range:2018-2021`)
pub const YEAR_RANGE_FIELD: &str = "year-range";

/// Node of a parsed query tree
///
/// Trees are built once by the parser (or by hand) and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    /// All children must match
    And(Vec<QueryNode>),
    /// Any child may match
    Or(Vec<QueryNode>),
    /// Child must not match
    Not(Box<QueryNode>),
    /// `field:value`
    Field { field: String, value: String },
    /// A bare term searched in all fields
    Unfielded(String),
    /// `field:[lower TO upper]`; a missing bound is open
    Range {
        field: String,
        lower: Option<String>,
        upper: Option<String>,
    },
}

impl QueryNode {
    pub fn field<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        QueryNode::Field {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn unfielded<S: Into<String>>(term: S) -> Self {
        QueryNode::Unfielded(term.into())
    }

    pub fn range<F: Into<String>>(field: F, lower: Option<&str>, upper: Option<&str>) -> Self {
        QueryNode::Range {
            field: field.into(),
            lower: lower.map(str::to_string),
            upper: upper.map(str::to_string),
        }
    }

    pub fn and(children: Vec<QueryNode>) -> Self {
        QueryNode::And(children)
    }

    pub fn or(children: Vec<QueryNode>) -> Self {
        QueryNode::Or(children)
    }

    pub fn negate(child: QueryNode) -> Self {
        QueryNode::Not(Box::new(child))
    }

    /// An empty conjunction, the tree produced for blank input
    pub fn empty() -> Self {
        QueryNode::And(Vec::new())
    }

    /// True when the tree holds no terms at all
    pub fn is_empty(&self) -> bool {
        match self {
            QueryNode::And(children) | QueryNode::Or(children) => {
                children.iter().all(QueryNode::is_empty)
            }
            QueryNode::Not(child) => child.is_empty(),
            QueryNode::Field { .. } | QueryNode::Unfielded(_) | QueryNode::Range { .. } => false,
        }
    }
}
