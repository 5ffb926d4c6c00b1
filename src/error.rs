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

//! The error type returned by every fallible operation in this crate.

use std::fmt;

/// Errors produced while planning or executing a query.
///
/// Every leaf operator returns one of these kinds rather than panicking;
/// the dispatcher does not recover from any of them except
/// [`QueryError::ExplanationEngine`], which is itself never swallowed —
/// see the note on that variant.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The query uses a node shape this engine does not support: a FROM
    /// that isn't a bare table or a single join, a SELECT item that
    /// isn't `*` or a single column, a multi-column ORDER BY, and so on.
    ParseOrShapeError(String),
    /// `FROM` (or a join side) names a table not present in the table
    /// store.
    TableNotFound(String),
    /// An identifier names a column absent from the relevant schema.
    ColumnNotFound(String),
    /// A literal's type does not match the column it is compared
    /// against, or two join columns disagree in type.
    TypeMismatch(String),
    /// `NATURAL`/`ON`/`USING` resolved to zero or more than one join
    /// column, or no join criteria were given at all.
    InvalidJoin(String),
    /// A comparison operator or join kind outside the supported set.
    UnsupportedOperator(String),
    /// The table-import collaborator failed to load data.
    ImportError(String),
    /// The explanation-engine collaborator returned an error. Always
    /// propagates to the caller — never caught, logged, and discarded.
    ExplanationEngine(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::ParseOrShapeError(msg) => {
                write!(f, "unsupported query shape: {msg}")
            }
            QueryError::TableNotFound(name) => write!(f, "table not found: {name}"),
            QueryError::ColumnNotFound(name) => write!(f, "column not found: {name}"),
            QueryError::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            QueryError::InvalidJoin(msg) => write!(f, "invalid join: {msg}"),
            QueryError::UnsupportedOperator(msg) => {
                write!(f, "unsupported operator: {msg}")
            }
            QueryError::ImportError(msg) => write!(f, "import error: {msg}"),
            QueryError::ExplanationEngine(msg) => {
                write!(f, "explanation engine failed: {msg}")
            }
        }
    }
}

impl std::error::Error for QueryError {}

/// Convenience alias used throughout the crate, mirroring the
/// `type Result<T> = std::result::Result<T, DataFusionError>` pattern.
pub type Result<T> = std::result::Result<T, QueryError>;
