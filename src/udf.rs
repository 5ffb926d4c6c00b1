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

//! The catalog of scalar user-defined functions a `FunctionCall` in a
//! SELECT or WHERE clause may reference, conceptually an external
//! collaborator (`getFunction(name, argText) -> UDF`); this module
//! supplies one conforming registry so DIFF/SPLIT queries that
//! reference a UDF can actually run end to end.

use std::collections::HashMap;

use crate::ast::Expr;
use crate::error::{QueryError, Result};
use crate::table::ColumnTable;

type Udf = fn(&ColumnTable, &str) -> Result<Vec<f64>>;

/// Each UDF takes exactly one argument, which is interpreted as a
/// column reference, and produces a `Double` column of the same length
/// as its input table.
pub struct UdfRegistry {
    functions: HashMap<&'static str, Udf>,
}

impl UdfRegistry {
    pub fn new() -> Self {
        let mut functions: HashMap<&'static str, Udf> = HashMap::new();
        functions.insert("length", length_udf);
        functions.insert("abs", abs_udf);
        functions.insert("log10", log10_udf);
        UdfRegistry { functions }
    }

    /// Resolves `name`'s trailing segment (after any `schema.`-style
    /// qualifier) against the registry, evaluates it against `arg`
    /// (a column reference), and returns the resulting double column.
    pub fn evaluate(&self, table: &ColumnTable, name: &str, arg: &Expr) -> Result<Vec<f64>> {
        let trailing = name.rsplit('.').next().unwrap_or(name);
        let arg_col = match arg {
            Expr::Identifier(col) => col.as_str(),
            Expr::Dereference { column, .. } => column.as_str(),
            other => {
                return Err(QueryError::ParseOrShapeError(format!(
                    "UDF argument must be a column reference, got {}",
                    other.text_form()
                )))
            }
        };
        let f = self
            .functions
            .get(trailing)
            .ok_or_else(|| QueryError::ParseOrShapeError(format!("unknown function: {name}")))?;
        f(table, arg_col)
    }
}

impl Default for UdfRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn length_udf(table: &ColumnTable, col: &str) -> Result<Vec<f64>> {
    let values = table.string_column(col)?;
    Ok(values.iter().map(|s| s.chars().count() as f64).collect())
}

fn abs_udf(table: &ColumnTable, col: &str) -> Result<Vec<f64>> {
    let values = table.double_column(col)?;
    Ok(values.iter().map(|v| v.abs()).collect())
}

fn log10_udf(table: &ColumnTable, col: &str) -> Result<Vec<f64>> {
    let values = table.double_column(col)?;
    Ok(values.iter().map(|v| v.log10()).collect())
}

/// Materializes every UDF `FunctionCall` appearing in `select`/`filter`
/// as a named column on `table`, using `Expr::text_form` as the output
/// column name so a later SELECT/ORDER BY can refer back to it. Must
/// run before WHERE/SELECT are evaluated.
pub fn materialize_udfs(
    table: &ColumnTable,
    exprs: &[&Expr],
    udfs: &UdfRegistry,
) -> Result<ColumnTable> {
    let mut out = table.copy();
    for expr in exprs {
        materialize_one(&mut out, expr, udfs)?;
    }
    Ok(out)
}

fn materialize_one(table: &mut ColumnTable, expr: &Expr, udfs: &UdfRegistry) -> Result<()> {
    match expr {
        Expr::FunctionCall { name, arg } => {
            let output_name = expr.text_form();
            if table.column_by_name(&output_name).is_none() {
                let values = udfs.evaluate(table, name, arg)?;
                *table = table.with_column(crate::table::Column::new_double(output_name, values))?;
            }
            Ok(())
        }
        Expr::Not(inner) => materialize_one(table, inner, udfs),
        Expr::Comparison { left, right, .. } | Expr::Logical { left, right, .. } => {
            materialize_one(table, left, udfs)?;
            materialize_one(table, right, udfs)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn length_udf_counts_chars() {
        let t = ColumnTable::new(vec![Column::new_string(
            "s",
            vec!["a".into(), "bb".into(), "ccc".into()],
        )])
        .unwrap();
        let udfs = UdfRegistry::new();
        let out = udfs.evaluate(&t, "length", &Expr::Identifier("s".to_string())).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn materialize_udfs_adds_named_column() {
        let t = ColumnTable::new(vec![Column::new_double("x", vec![-1.0, 2.0])]).unwrap();
        let udfs = UdfRegistry::new();
        let call = Expr::FunctionCall {
            name: "abs".to_string(),
            arg: Box::new(Expr::Identifier("x".to_string())),
        };
        let out = materialize_udfs(&t, &[&call], &udfs).unwrap();
        let name = call.text_form();
        assert_eq!(out.double_column(&name).unwrap(), &[1.0, 2.0]);
    }
}
