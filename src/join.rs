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

//! The non-fused inner-equijoin evaluator: a single join column,
//! nested-loop over the smaller relation, output columns qualified by
//! table name on conflict.

use std::collections::HashMap;

use crate::ast::{Expr, JoinCriteria, JoinKind};
use crate::error::{QueryError, Result};
use crate::table::{Column, ColumnData, ColumnTable};

/// Resolves the single join column name from `criteria`, given the two
/// sides' schemas. `ON` requires a bare identifier; `USING` requires
/// exactly one column; `NATURAL` requires exactly one name in the
/// intersection of both schemas.
pub fn resolve_join_column(
    criteria: &JoinCriteria,
    left: &ColumnTable,
    right: &ColumnTable,
) -> Result<String> {
    match criteria {
        JoinCriteria::On(Expr::Identifier(name)) => Ok(name.clone()),
        JoinCriteria::On(_) => Err(QueryError::InvalidJoin(
            "ON requires a bare column identifier".to_string(),
        )),
        JoinCriteria::Using(cols) => {
            if cols.len() == 1 {
                Ok(cols[0].clone())
            } else {
                Err(QueryError::InvalidJoin(format!(
                    "USING requires exactly one column, got {}",
                    cols.len()
                )))
            }
        }
        JoinCriteria::Natural => {
            let left_schema = left.schema();
            let shared: Vec<&str> = left_schema
                .names()
                .filter(|n| right.schema().contains(n))
                .collect();
            match shared.as_slice() {
                [only] => Ok(only.to_string()),
                [] => Err(QueryError::InvalidJoin(
                    "NATURAL join found no shared column names".to_string(),
                )),
                _ => Err(QueryError::InvalidJoin(format!(
                    "NATURAL join found {} shared column names, expected exactly one",
                    shared.len()
                ))),
            }
        }
    }
}

/// Executes an inner equijoin of `left` and `right` on `join_col`.
/// Only `JoinKind::Inner` is supported; anything else is
/// `QueryError::UnsupportedOperator`. The smaller table drives the
/// inner loop; output column qualification uses `left_name`/`right_name`
/// only for columns that collide.
pub fn inner_join(
    left: &ColumnTable,
    left_name: &str,
    right: &ColumnTable,
    right_name: &str,
    join_col: &str,
    kind: JoinKind,
) -> Result<ColumnTable> {
    if kind != JoinKind::Inner {
        return Err(QueryError::UnsupportedOperator(format!(
            "join kind {kind:?} is not supported, only INNER"
        )));
    }

    let left_ty = left
        .schema()
        .column_type(join_col)
        .ok_or_else(|| QueryError::ColumnNotFound(join_col.to_string()))?;
    let right_ty = right
        .schema()
        .column_type(join_col)
        .ok_or_else(|| QueryError::ColumnNotFound(join_col.to_string()))?;
    if left_ty != right_ty {
        return Err(QueryError::TypeMismatch(format!(
            "column {join_col} has type {left_ty} in one table but type {right_ty} in the other"
        )));
    }

    // Smaller (S) drives the hash build side, bigger (B) the probe
    // side: iterate B in the outer loop, S in the inner.
    let (small, small_name, big, big_name, small_is_left) = if left.num_rows() <= right.num_rows()
    {
        (left, left_name, right, right_name, true)
    } else {
        (right, right_name, left, left_name, false)
    };

    let small_rows_by_key = build_key_index(small, join_col)?;

    let mut big_rows = Vec::new();
    let mut small_rows = Vec::new();
    let big_keys = key_strings(big, join_col)?;
    for (big_row, key) in big_keys.iter().enumerate() {
        if let Some(matches) = small_rows_by_key.get(key) {
            for &small_row in matches {
                big_rows.push(big_row);
                small_rows.push(small_row);
            }
        }
    }

    // Output schema: non-join columns appearing in both are qualified
    // with `<table>.`; non-conflicting columns keep bare names; the
    // join column appears exactly once.
    let left_schema = left.schema();
    let right_schema = right.schema();
    let mut columns = Vec::new();
    columns.push(take_column(left, join_col, &left_rows_for(small_is_left, &big_rows, &small_rows))?);

    for name in left_schema.names() {
        if name == join_col {
            continue;
        }
        let out_name = if right_schema.contains(name) {
            format!("{left_name}.{name}")
        } else {
            name.to_string()
        };
        let rows = if small_is_left { &small_rows } else { &big_rows };
        columns.push(take_column_as(left, name, &out_name, rows)?);
    }
    for name in right_schema.names() {
        if name == join_col {
            continue;
        }
        let out_name = if left_schema.contains(name) {
            format!("{right_name}.{name}")
        } else {
            name.to_string()
        };
        let rows = if small_is_left { &big_rows } else { &small_rows };
        columns.push(take_column_as(right, name, &out_name, rows)?);
    }

    ColumnTable::new(columns)
}

fn left_rows_for(small_is_left: bool, big_rows: &[usize], small_rows: &[usize]) -> Vec<usize> {
    if small_is_left {
        small_rows.to_vec()
    } else {
        big_rows.to_vec()
    }
}

fn key_strings(table: &ColumnTable, col: &str) -> Result<Vec<String>> {
    let column = table
        .column_by_name(col)
        .ok_or_else(|| QueryError::ColumnNotFound(col.to_string()))?;
    Ok(match column.data.as_ref() {
        ColumnData::Double(v) => v.iter().map(|d| d.to_bits().to_string()).collect(),
        ColumnData::String(v) => v.clone(),
    })
}

fn build_key_index(table: &ColumnTable, col: &str) -> Result<HashMap<String, Vec<usize>>> {
    let keys = key_strings(table, col)?;
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (row, key) in keys.into_iter().enumerate() {
        index.entry(key).or_default().push(row);
    }
    Ok(index)
}

fn take_column(table: &ColumnTable, name: &str, rows: &[usize]) -> Result<Column> {
    take_column_as(table, name, name, rows)
}

fn take_column_as(table: &ColumnTable, name: &str, out_name: &str, rows: &[usize]) -> Result<Column> {
    let column = table
        .column_by_name(name)
        .ok_or_else(|| QueryError::ColumnNotFound(name.to_string()))?;
    Ok(match column.data.as_ref() {
        ColumnData::Double(v) => Column::new_double(out_name, rows.iter().map(|&i| v[i]).collect()),
        ColumnData::String(v) => {
            Column::new_string(out_name, rows.iter().map(|&i| v[i].clone()).collect())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn s4_inner_join_output_qualification() {
        let b = ColumnTable::new(vec![
            Column::new_double("id", vec![1.0, 2.0]),
            Column::new_string("name", vec!["b1".into(), "b2".into()]),
        ])
        .unwrap();
        let s = ColumnTable::new(vec![
            Column::new_double("id", vec![1.0, 2.0]),
            Column::new_string("name", vec!["s1".into(), "s2".into()]),
        ])
        .unwrap();
        let joined = inner_join(&b, "B", &s, "S", "id", JoinKind::Inner).unwrap();
        let schema = joined.schema();
        let names: Vec<&str> = schema.names().collect();
        assert!(names.contains(&"id"));
        assert!(names.contains(&"B.name"));
        assert!(names.contains(&"S.name"));
        assert_eq!(joined.num_rows(), 2);
    }

    #[test]
    fn join_is_commutative_in_multiset_sense() {
        let b = ColumnTable::new(vec![
            Column::new_double("id", vec![1.0, 2.0, 2.0]),
            Column::new_string("name", vec!["b1".into(), "b2".into(), "b3".into()]),
        ])
        .unwrap();
        let s = ColumnTable::new(vec![
            Column::new_double("id", vec![2.0, 1.0]),
            Column::new_string("name", vec!["s2".into(), "s1".into()]),
        ])
        .unwrap();
        let bs = inner_join(&b, "B", &s, "S", "id", JoinKind::Inner).unwrap();
        let sb = inner_join(&s, "S", &b, "B", "id", JoinKind::Inner).unwrap();
        assert_eq!(bs.num_rows(), sb.num_rows());
        assert_eq!(bs.num_rows(), 3);
    }

    #[test]
    fn type_mismatch_message_names_both_types() {
        let left = ColumnTable::new(vec![Column::new_double("k", vec![1.0])]).unwrap();
        let right = ColumnTable::new(vec![Column::new_string("k", vec!["x".into()])]).unwrap();
        let err = inner_join(&left, "L", &right, "R", "k", JoinKind::Inner).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Double"), "message was: {msg}");
        assert!(msg.contains("String"), "message was: {msg}");
    }

    #[test]
    fn non_inner_join_is_rejected() {
        let left = ColumnTable::new(vec![Column::new_double("k", vec![1.0])]).unwrap();
        let right = ColumnTable::new(vec![Column::new_double("k", vec![1.0])]).unwrap();
        assert!(inner_join(&left, "L", &right, "R", "k", JoinKind::Left).is_err());
    }
}
