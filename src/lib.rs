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

//! `diffql` is an in-memory analytical query engine that executes an
//! extended SQL dialect carrying two custom operators, `DIFF` and
//! `SPLIT`, for finding attribute combinations that discriminate an
//! "outlier" row population from an "inlier" one.
//!
//! The crate is a single-threaded library with one façade:
//! [`Engine::execute_query`]. It does not parse SQL text, load CSV
//! files, or format output — those are host concerns.

pub mod ast;
pub mod diff;
pub mod diff_join;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod join;
pub mod predicate;
pub mod table;
pub mod udf;

pub use ast::QueryBody;
pub use diff::{DefaultExplanationEngine, ExplanationEngine};
pub use error::{QueryError, Result};
pub use table::{Column, ColumnTable, TableStore};
pub use udf::UdfRegistry;

/// A query engine instance: a table store plus the collaborators
/// (explanation engine, UDF registry) `execute_query` dispatches
/// through. Analogous to `datafusion::execution::context::SessionContext`
/// but scoped to this crate's much smaller surface.
pub struct Engine {
    store: TableStore,
    udfs: UdfRegistry,
    explanation_engine: Box<dyn ExplanationEngine + Send + Sync>,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            store: TableStore::new(),
            udfs: UdfRegistry::new(),
            explanation_engine: Box::new(DefaultExplanationEngine),
        }
    }

    /// Swaps in a different explanation-engine collaborator — the only
    /// extension point this engine exposes, since the attribute-combination
    /// search is treated as an external, pluggable component.
    pub fn with_explanation_engine(mut self, engine: impl ExplanationEngine + Send + Sync + 'static) -> Self {
        self.explanation_engine = Box::new(engine);
        self
    }

    /// Registers `table` under `name` in this engine's table store.
    /// This is the minimal, already-typed form of an `importTable(path,
    /// schema)` call — parsing a CSV file into typed columns is an
    /// excluded external loader's job; this method is the point where
    /// the loaded table is installed.
    pub fn import_table(&self, name: &str, table: ColumnTable) {
        self.store.import_table(name, table);
    }

    pub fn table_names(&self) -> Vec<String> {
        self.store.table_names()
    }

    /// Executes `query`, dispatching to the standard, DIFF, or fused
    /// DIFF-JOIN path as appropriate.
    pub fn execute_query(&self, query: &QueryBody) -> Result<ColumnTable> {
        dispatcher::execute(&self.store, query, self.explanation_engine.as_ref(), &self.udfs)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
