//! Query AST (C7, §3 Query / §4.7 grammar). Tagged-variant sum types per §9
//! ("avoid open inheritance"); every variant here corresponds to one grammar
//! production.

use crate::core::match_set::Granularity;
use crate::temporal::TempPred;
use chrono::NaiveDate;

/// Either a bound variable reference (`?v`) or a string literal, used
/// wherever the grammar allows `("?" Ident | String)`.
#[derive(Debug, Clone, PartialEq)]
pub enum VarOrLiteral {
    Var(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `CONTAINS("s" {"," "s"})` or `CONTAINS(?v, "s")`. `terms.len()`
    /// selects unigram/bigram/trigram lookup; `bind` is the optional `?v`.
    Contains { terms: Vec<String>, bind: Option<String> },
    Ner { entity_type: String, target: VarOrLiteral },
    Pos { tag: String, target: VarOrLiteral },
    /// `"*"` in any position means "wildcard this field" (prefix scan).
    Dep { head: String, relation: String, dependent: String },
    Hypernym { category: String, instance: String },
    Date { pred: TempPred, range: (NaiveDate, NaiveDate), bind: Option<String> },
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CountKind {
    Star,
    UniqueVar(String),
    Documents,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Var(String),
    AliasVar { alias: String, var: String },
    Count(CountKind),
    Snippet { var: String, window: Option<u32> },
    Title,
    Timestamp,
    Metadata(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderColumn {
    pub name: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

/// `Ref TempPred Ref ["WINDOW" Int]` (§4.7 `JoinCond`). `Ref` is
/// `Ident "." "?" Ident`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub left_alias: String,
    pub left_var: String,
    pub pred: TempPred,
    pub right_alias: String,
    pub right_var: String,
    pub window: Option<i64>,
    pub kind: JoinKind,
}

/// A named subquery: `JOIN "(" Query ")" "AS" Ident ["(" ColList ")"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub alias: String,
    pub query: Box<Query>,
    /// Optional explicit export list restricting which of the subquery's
    /// select columns/variables are visible to the outer scope.
    pub exported_columns: Option<Vec<String>>,
}

/// Immutable parsed query record (§3 Query).
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub source: String,
    pub main_alias: Option<String>,
    pub select_columns: Vec<SelectColumn>,
    pub conditions: Option<Condition>,
    pub subqueries: Vec<Subquery>,
    pub join_condition: Option<JoinCondition>,
    pub order_by: Vec<OrderColumn>,
    pub limit: Option<u64>,
    pub granularity: Granularity,
    pub granularity_size: Option<u32>,
}

impl Query {
    pub fn new(source: impl Into<String>) -> Self {
        Query {
            source: source.into(),
            main_alias: None,
            select_columns: Vec::new(),
            conditions: None,
            subqueries: Vec::new(),
            join_condition: None,
            order_by: Vec::new(),
            limit: None,
            granularity: Granularity::Document,
            granularity_size: None,
        }
    }
}
