// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The query-tree shapes this engine accepts as input.
//!
//! Producing this tree from SQL text is the job of an external parser
//! (out of scope here); the dispatcher only inspects the public shape
//! of these nodes, never parser internals. Node variants are plain
//! tagged data, matched with a simple `match` at each dispatch site
//! rather than a visitor hierarchy.

/// The top-level thing `execute` accepts.
#[derive(Debug, Clone)]
pub enum QueryBody {
    Query(QuerySpec),
    Diff(DiffQuerySpec),
}

/// A standard `SELECT ... FROM ... WHERE ... ORDER BY ... LIMIT ...`.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub from: Relation,
    pub select: Vec<SelectItem>,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<usize>,
}

/// `DIFF (subquery1) (subquery2)` or `SPLIT relation WHERE predicate`,
/// both followed by the `ON ... MIN RATIO ... MIN SUPPORT ...` clause.
#[derive(Debug, Clone)]
pub struct DiffQuerySpec {
    pub shape: DiffShape,
    pub attributes: AttributeList,
    pub ratio_metric: String,
    pub max_order: u32,
    pub min_support: f64,
    pub min_ratio: f64,
    pub select: Vec<SelectItem>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum DiffShape {
    /// `DIFF (outlier subquery) (inlier subquery)`.
    TwoSubqueries {
        outliers: Box<QuerySpec>,
        inliers: Box<QuerySpec>,
    },
    /// `SPLIT relation WHERE predicate` — rows matching `predicate`
    /// are the outlier population, the rest are the inlier population.
    Split { relation: Relation, predicate: Expr },
}

/// `ON *` or an explicit attribute list.
#[derive(Debug, Clone)]
pub enum AttributeList {
    Wildcard,
    Columns(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct OrderByItem {
    pub expr: Expr,
    pub ascending: bool,
}

/// A relation reference: a bare table, an aliased relation, or a join
/// of two relations.
#[derive(Debug, Clone)]
pub enum Relation {
    Table(String),
    Aliased { relation: Box<Relation>, alias: String },
    Join {
        left: Box<Relation>,
        right: Box<Relation>,
        kind: JoinKind,
        criteria: JoinCriteria,
    },
}

impl Relation {
    /// The name used to qualify this relation's otherwise-ambiguous
    /// columns: the alias if aliased, else the bare table name. Joins
    /// have no single name.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Relation::Table(name) => Some(name.as_str()),
            Relation::Aliased { alias, .. } => Some(alias.as_str()),
            Relation::Join { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone)]
pub enum JoinCriteria {
    On(Expr),
    Using(Vec<String>),
    Natural,
}

#[derive(Debug, Clone)]
pub enum SelectItem {
    AllColumns,
    SingleColumn { expr: Expr, output_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Double(f64),
    String(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsDistinctFrom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A scalar expression tree. Only a narrow grammar is ever evaluated by
/// the predicate mask evaluator — NOT/AND/OR and column-vs-literal or
/// literal-vs-literal comparisons; anything else (nested comparisons,
/// arithmetic, etc.) fails at evaluation time with
/// `QueryError::ParseOrShapeError`, not here — the tree itself can
/// represent more than the evaluator accepts.
#[derive(Debug, Clone)]
pub enum Expr {
    Identifier(String),
    /// `table.column` — column resolution qualifies by this prefix
    /// when present (e.g. after a join that produced `B.name`).
    Dereference { qualifier: String, column: String },
    Literal(Literal),
    FunctionCall { name: String, arg: Box<Expr> },
    Comparison {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
}

impl Expr {
    /// The textual form used as a UDF-materialized column's output
    /// name, so a later SELECT/ORDER BY can refer back to it.
    pub fn text_form(&self) -> String {
        match self {
            Expr::Identifier(name) => name.clone(),
            Expr::Dereference { qualifier, column } => format!("{qualifier}.{column}"),
            Expr::Literal(Literal::Double(d)) => d.to_string(),
            Expr::Literal(Literal::String(s)) => format!("'{s}'"),
            Expr::Literal(Literal::Null) => "NULL".to_string(),
            Expr::FunctionCall { name, arg } => format!("{name}({})", arg.text_form()),
            Expr::Comparison { left, right, .. } => {
                format!("({} ? {})", left.text_form(), right.text_form())
            }
            Expr::Logical { left, right, .. } => {
                format!("({} ? {})", left.text_form(), right.text_form())
            }
            Expr::Not(e) => format!("NOT {}", e.text_form()),
        }
    }
}
