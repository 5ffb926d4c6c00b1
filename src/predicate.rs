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

//! Compiles a boolean WHERE-expression tree into a row bitmask.

use crate::ast::{CmpOp, Expr, Literal, LogicalOp};
use crate::error::{QueryError, Result};
use crate::table::{ColumnTable, ScalarType};
use crate::udf::UdfRegistry;

/// Evaluates `expr` against every row of `table`, returning a mask of
/// `table.num_rows()` booleans. Grammar accepted: NOT, AND, OR, and
/// comparisons where at least one side is a column (or a UDF call) and
/// the other a literal, or comparisons of two literals. Anything else
/// fails with `QueryError::ParseOrShapeError`.
pub fn evaluate_mask(table: &ColumnTable, expr: &Expr, udfs: &UdfRegistry) -> Result<Vec<bool>> {
    match expr {
        Expr::Not(inner) => {
            let mut mask = evaluate_mask(table, inner, udfs)?;
            mask.iter_mut().for_each(|b| *b = !*b);
            Ok(mask)
        }
        Expr::Logical { op, left, right } => {
            let lhs = evaluate_mask(table, left, udfs)?;
            let rhs = evaluate_mask(table, right, udfs)?;
            Ok(match op {
                LogicalOp::And => lhs.iter().zip(&rhs).map(|(a, b)| *a && *b).collect(),
                LogicalOp::Or => lhs.iter().zip(&rhs).map(|(a, b)| *a || *b).collect(),
            })
        }
        Expr::Comparison { op, left, right } => evaluate_comparison(table, *op, left, right, udfs),
        other => Err(QueryError::ParseOrShapeError(format!(
            "expression is not a boolean predicate: {}",
            other.text_form()
        ))),
    }
}

fn evaluate_comparison(
    table: &ColumnTable,
    op: CmpOp,
    left: &Expr,
    right: &Expr,
    udfs: &UdfRegistry,
) -> Result<Vec<bool>> {
    use Expr::*;
    match (left, right) {
        (Literal(l), Literal(r)) => {
            let value = compare_literals(op, l, r)?;
            Ok(vec![value; table.num_rows()])
        }
        (Identifier(col), Literal(lit)) | (Dereference { column: col, .. }, Literal(lit)) => {
            compare_column_to_literal(table, op, col, lit)
        }
        (Literal(lit), Identifier(col)) | (Literal(lit), Dereference { column: col, .. }) => {
            compare_column_to_literal(table, flip(op), col, lit)
        }
        (FunctionCall { name, arg }, Literal(crate::ast::Literal::Double(d))) => {
            let values = udfs.evaluate(table, name, arg)?;
            Ok(values.iter().map(|v| compare_doubles(op, *v, *d)).collect())
        }
        (Literal(crate::ast::Literal::Double(d)), FunctionCall { name, arg }) => {
            let values = udfs.evaluate(table, name, arg)?;
            Ok(values
                .iter()
                .map(|v| compare_doubles(flip(op), *v, *d))
                .collect())
        }
        _ => Err(QueryError::ParseOrShapeError(
            "comparison must have a column or UDF call on one side and a literal on the other"
                .to_string(),
        )),
    }
}

fn flip(op: CmpOp) -> CmpOp {
    match op {
        CmpOp::Eq => CmpOp::Eq,
        CmpOp::Ne => CmpOp::Ne,
        CmpOp::IsDistinctFrom => CmpOp::IsDistinctFrom,
        CmpOp::Lt => CmpOp::Gt,
        CmpOp::Le => CmpOp::Ge,
        CmpOp::Gt => CmpOp::Lt,
        CmpOp::Ge => CmpOp::Le,
    }
}

fn compare_column_to_literal(
    table: &ColumnTable,
    op: CmpOp,
    col: &str,
    lit: &Literal,
) -> Result<Vec<bool>> {
    let column = table
        .column_by_name(col)
        .ok_or_else(|| QueryError::ColumnNotFound(col.to_string()))?;
    match (column.scalar_type(), lit) {
        (ScalarType::Double, Literal::Double(d)) => {
            let values = table.double_column(col)?;
            Ok(values.iter().map(|v| compare_doubles(op, *v, *d)).collect())
        }
        (ScalarType::String, Literal::String(s)) => {
            let values = table.string_column(col)?;
            Ok(values
                .iter()
                .map(|v| compare_strings(op, v.as_str(), s.as_str()))
                .collect())
        }
        (ScalarType::String, Literal::Null) => {
            // No column in this engine's data model carries a null bit,
            // so a String column compared to NULL is never true/false
            // per-row; only (In)equality against NULL is well-defined.
            let n = table.num_rows();
            Ok(vec![matches!(op, CmpOp::Ne | CmpOp::IsDistinctFrom); n])
        }
        (col_ty, _) => Err(QueryError::TypeMismatch(format!(
            "column {col} has type {col_ty} but literal has an incompatible type"
        ))),
    }
}

fn compare_doubles(op: CmpOp, a: f64, b: f64) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne | CmpOp::IsDistinctFrom => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

fn compare_strings(op: CmpOp, a: &str, b: &str) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne | CmpOp::IsDistinctFrom => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

fn compare_literals(op: CmpOp, a: &Literal, b: &Literal) -> Result<bool> {
    match (a, b) {
        (Literal::Double(x), Literal::Double(y)) => Ok(compare_doubles(op, *x, *y)),
        (Literal::String(x), Literal::String(y)) => Ok(compare_strings(op, x, y)),
        (Literal::Null, Literal::Null) => Ok(matches!(op, CmpOp::Eq)),
        _ => Err(QueryError::TypeMismatch(
            "literal-to-literal comparison requires matching types".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::table::Column;

    fn table() -> ColumnTable {
        ColumnTable::new(vec![Column::new_double("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])]).unwrap()
    }

    fn gt(col: &str, v: f64) -> Expr {
        Expr::Comparison {
            op: CmpOp::Gt,
            left: Box::new(Expr::Identifier(col.to_string())),
            right: Box::new(Expr::Literal(Literal::Double(v))),
        }
    }

    fn le(col: &str, v: f64) -> Expr {
        Expr::Comparison {
            op: CmpOp::Le,
            left: Box::new(Expr::Identifier(col.to_string())),
            right: Box::new(Expr::Literal(Literal::Double(v))),
        }
    }

    #[test]
    fn s1_predicate_mask_scenario() {
        let t = table();
        let udfs = UdfRegistry::new();
        let expr = Expr::Logical {
            op: LogicalOp::And,
            left: Box::new(gt("x", 2.0)),
            right: Box::new(le("x", 4.0)),
        };
        let mask = evaluate_mask(&t, &expr, &udfs).unwrap();
        let filtered = t.filter(&mask).unwrap();
        assert_eq!(filtered.double_column("x").unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn not_is_complement() {
        let t = table();
        let udfs = UdfRegistry::new();
        let e = gt("x", 2.0);
        let mask = evaluate_mask(&t, &e, &udfs).unwrap();
        let not_mask = evaluate_mask(&t, &Expr::Not(Box::new(e)), &udfs).unwrap();
        for (a, b) in mask.iter().zip(&not_mask) {
            assert_ne!(a, b);
        }
    }

    #[test]
    fn s6_literal_vs_literal() {
        let t = table();
        let udfs = UdfRegistry::new();
        let all_true = Expr::Comparison {
            op: CmpOp::Eq,
            left: Box::new(Expr::Literal(Literal::Double(1.0))),
            right: Box::new(Expr::Literal(Literal::Double(1.0))),
        };
        let all_false = Expr::Comparison {
            op: CmpOp::Eq,
            left: Box::new(Expr::Literal(Literal::Double(1.0))),
            right: Box::new(Expr::Literal(Literal::Double(2.0))),
        };
        assert!(evaluate_mask(&t, &all_true, &udfs).unwrap().iter().all(|b| *b));
        assert!(evaluate_mask(&t, &all_false, &udfs).unwrap().iter().all(|b| !*b));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let t = table();
        let udfs = UdfRegistry::new();
        let expr = Expr::Comparison {
            op: CmpOp::Eq,
            left: Box::new(Expr::Identifier("x".to_string())),
            right: Box::new(Expr::Literal(Literal::String("nope".to_string()))),
        };
        assert!(matches!(
            evaluate_mask(&t, &expr, &udfs),
            Err(QueryError::TypeMismatch(_))
        ));
    }
}
