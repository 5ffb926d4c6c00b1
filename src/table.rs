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

//! The row-set data structure: named typed columns, schema lookup,
//! masked filter, projection, ordering, limit, and vertical union.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QueryError, Result};

/// The scalar type of a column. Only two live in this engine — no
/// ints, no timestamps, no nested types — because the values this
/// engine consumes are either measures (`Double`) or categorical
/// attributes (`String`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Double,
    String,
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarType::Double => write!(f, "Double"),
            ScalarType::String => write!(f, "String"),
        }
    }
}

/// The backing storage for one column. Wrapped in an `Arc` so that
/// `ColumnTable::copy` can hand out a new header that shares the
/// underlying arrays without aliasing writes — no column is ever
/// mutated in place.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Double(Vec<f64>),
    String(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Double(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ColumnData::Double(_) => ScalarType::Double,
            ColumnData::String(_) => ScalarType::String,
        }
    }

    pub fn as_double(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[String]> {
        match self {
            ColumnData::String(v) => Some(v),
            _ => None,
        }
    }
}

/// One named column: a type tag plus the shared array.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: Arc<ColumnData>,
}

impl Column {
    pub fn new_double(name: impl Into<String>, values: Vec<f64>) -> Self {
        Column {
            name: name.into(),
            data: Arc::new(ColumnData::Double(values)),
        }
    }

    pub fn new_string(name: impl Into<String>, values: Vec<String>) -> Self {
        Column {
            name: name.into(),
            data: Arc::new(ColumnData::String(values)),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.data.scalar_type()
    }
}

/// An ordered list of `(name, type)` pairs with an index for lookup by
/// name, derived from a `ColumnTable` and otherwise immutable.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<(String, ScalarType)>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<(String, ScalarType)>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        Schema { columns, index }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn column_type(&self, name: &str) -> Option<ScalarType> {
        self.column_index(name).map(|i| self.columns[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names of all `String`-typed columns, in schema order.
    pub fn string_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, ty)| *ty == ScalarType::String)
            .map(|(n, _)| n.as_str())
    }
}

/// An in-memory columnar relation: an ordered list of equal-length
/// columns plus the derived row count. Conceptually immutable once
/// built; `copy` clones only the column-list header, so the returned
/// table can grow new columns (`with_column`) without the clone
/// observing those writes, and without a deep copy of any array.
#[derive(Debug, Clone, Default)]
pub struct ColumnTable {
    columns: Vec<Column>,
}

impl ColumnTable {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let n = first.data.len();
            for c in &columns {
                if c.data.len() != n {
                    return Err(QueryError::TypeMismatch(format!(
                        "column {} has length {} but table has length {}",
                        c.name,
                        c.data.len(),
                        n
                    )));
                }
            }
        }
        Ok(ColumnTable { columns })
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.scalar_type()))
                .collect(),
        )
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn double_column(&self, name: &str) -> Result<&[f64]> {
        let col = self
            .column_by_name(name)
            .ok_or_else(|| QueryError::ColumnNotFound(name.to_string()))?;
        col.data
            .as_double()
            .ok_or_else(|| QueryError::TypeMismatch(format!("column {name} is not Double")))
    }

    pub fn string_column(&self, name: &str) -> Result<&[String]> {
        let col = self
            .column_by_name(name)
            .ok_or_else(|| QueryError::ColumnNotFound(name.to_string()))?;
        col.data
            .as_string()
            .ok_or_else(|| QueryError::TypeMismatch(format!("column {name} is not String")))
    }

    /// A shallow copy: a new header over the same `Arc`-shared column
    /// data. Mutating the copy's column list (e.g. via `with_column`)
    /// never affects `self` or any other copy taken earlier.
    pub fn copy(&self) -> ColumnTable {
        ColumnTable {
            columns: self.columns.clone(),
        }
    }

    /// Returns a new table with `column` appended. Fails if `column`'s
    /// length disagrees with the table's row count (unless the table
    /// is currently empty).
    pub fn with_column(&self, column: Column) -> Result<ColumnTable> {
        if self.num_columns() > 0 && column.data.len() != self.num_rows() {
            return Err(QueryError::TypeMismatch(format!(
                "column {} has length {} but table has {} rows",
                column.name,
                column.data.len(),
                self.num_rows()
            )));
        }
        let mut columns = self.columns.clone();
        columns.push(column);
        Ok(ColumnTable { columns })
    }

    /// Returns a new table with `from` renamed to `to`. Fails if `from`
    /// is absent.
    pub fn rename_column(&self, from: &str, to: &str) -> Result<ColumnTable> {
        let mut columns = self.columns.clone();
        let col = columns
            .iter_mut()
            .find(|c| c.name == from)
            .ok_or_else(|| QueryError::ColumnNotFound(from.to_string()))?;
        col.name = to.to_string();
        Ok(ColumnTable { columns })
    }

    /// Keeps only rows `i` where `mask[i]` is `true`.
    pub fn filter(&self, mask: &[bool]) -> Result<ColumnTable> {
        if mask.len() != self.num_rows() {
            return Err(QueryError::TypeMismatch(format!(
                "mask length {} does not match table length {}",
                mask.len(),
                self.num_rows()
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|c| match c.data.as_ref() {
                ColumnData::Double(v) => Column::new_double(
                    c.name.clone(),
                    v.iter()
                        .zip(mask)
                        .filter_map(|(x, &keep)| keep.then_some(*x))
                        .collect(),
                ),
                ColumnData::String(v) => Column::new_string(
                    c.name.clone(),
                    v.iter()
                        .zip(mask)
                        .filter_map(|(x, &keep)| keep.then_some(x.clone()))
                        .collect(),
                ),
            })
            .collect();
        Ok(ColumnTable { columns })
    }

    /// Projects down to the named columns, in the order requested.
    pub fn project(&self, names: &[String]) -> Result<ColumnTable> {
        let columns = names
            .iter()
            .map(|name| {
                self.column_by_name(name)
                    .cloned()
                    .ok_or_else(|| QueryError::ColumnNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ColumnTable { columns })
    }

    /// Orders rows by a single column, ascending or descending.
    /// Multi-column sort is not supported.
    pub fn order_by(&self, col: &str, ascending: bool) -> Result<ColumnTable> {
        let idx = self
            .column_by_name(col)
            .ok_or_else(|| QueryError::ColumnNotFound(col.to_string()))?;
        let n = self.num_rows();
        let mut order: Vec<usize> = (0..n).collect();
        match idx.data.as_ref() {
            ColumnData::Double(v) => {
                order.sort_by(|&a, &b| v[a].partial_cmp(&v[b]).unwrap_or(std::cmp::Ordering::Equal));
            }
            ColumnData::String(v) => {
                order.sort_by(|&a, &b| v[a].cmp(&v[b]));
            }
        }
        if !ascending {
            order.reverse();
        }
        self.take(&order)
    }

    /// Keeps only the first `n` rows.
    pub fn limit(&self, n: usize) -> ColumnTable {
        let n = n.min(self.num_rows());
        let order: Vec<usize> = (0..n).collect();
        self.take(&order).expect("indices within bounds")
    }

    fn take(&self, indices: &[usize]) -> Result<ColumnTable> {
        let columns = self
            .columns
            .iter()
            .map(|c| match c.data.as_ref() {
                ColumnData::Double(v) => {
                    Column::new_double(c.name.clone(), indices.iter().map(|&i| v[i]).collect())
                }
                ColumnData::String(v) => Column::new_string(
                    c.name.clone(),
                    indices.iter().map(|&i| v[i].clone()).collect(),
                ),
            })
            .collect();
        Ok(ColumnTable { columns })
    }

    /// Row-wise iteration is not materialized as a separate type here;
    /// callers that need per-row scalar access go through
    /// `double_column`/`string_column` directly, which is how every
    /// operator in this crate consumes rows (no row object is ever
    /// built for a whole table at once).
    pub fn row_count_iter(&self) -> std::ops::Range<usize> {
        0..self.num_rows()
    }

    /// Vertically concatenates `tables`, which must all share an
    /// identical schema (name and type, in order). Used to build the
    /// tagged union for DIFF's two-subquery shape.
    pub fn union_all(tables: &[ColumnTable]) -> Result<ColumnTable> {
        let first = match tables.first() {
            Some(t) => t,
            None => return ColumnTable::new(vec![]),
        };
        for t in &tables[1..] {
            if t.columns.len() != first.columns.len()
                || first
                    .columns
                    .iter()
                    .zip(&t.columns)
                    .any(|(a, b)| a.name != b.name || a.scalar_type() != b.scalar_type())
            {
                return Err(QueryError::TypeMismatch(
                    "unionAll requires identical schemas".to_string(),
                ));
            }
        }
        let mut columns = Vec::with_capacity(first.num_columns());
        for (i, col) in first.columns.iter().enumerate() {
            match col.data.as_ref() {
                ColumnData::Double(_) => {
                    let mut values = Vec::new();
                    for t in tables {
                        values.extend_from_slice(t.columns[i].data.as_double().unwrap());
                    }
                    columns.push(Column::new_double(col.name.clone(), values));
                }
                ColumnData::String(_) => {
                    let mut values = Vec::new();
                    for t in tables {
                        values.extend_from_slice(t.columns[i].data.as_string().unwrap());
                    }
                    columns.push(Column::new_string(col.name.clone(), values));
                }
            }
        }
        Ok(ColumnTable { columns })
    }
}

/// A process-local mapping from table name to an immutable columnar
/// table, grounded on `datafusion/core/src/catalog/catalog.rs`'s
/// `MemoryCatalogProvider`: an `RwLock<HashMap<..>>` guarding reads
/// (shallow-copy out) and writes (import only).
#[derive(Default)]
pub struct TableStore {
    tables: parking_lot::RwLock<HashMap<String, ColumnTable>>,
}

impl TableStore {
    pub fn new() -> Self {
        TableStore {
            tables: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    /// Registers `table` under `name`, replacing any previous table of
    /// that name. This is the only mutating operation on the store.
    pub fn import_table(&self, name: &str, table: ColumnTable) {
        self.tables.write().insert(name.to_string(), table);
    }

    /// Returns an independent shallow copy of the named table.
    /// Mutating the returned table (e.g. `with_column`) never affects
    /// what a later `table()` call returns.
    pub fn table(&self, name: &str) -> Result<ColumnTable> {
        self.tables
            .read()
            .get(name)
            .map(|t| t.copy())
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ColumnTable {
        ColumnTable::new(vec![
            Column::new_double("x", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            Column::new_string(
                "s",
                vec!["a", "b", "c", "d", "e"].into_iter().map(String::from).collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn filter_keeps_selected_rows() {
        let t = sample();
        let mask = vec![true, false, true, false, true];
        let filtered = t.filter(&mask).unwrap();
        assert_eq!(filtered.double_column("x").unwrap(), &[1.0, 3.0, 5.0]);
    }

    #[test]
    fn copy_does_not_alias_new_columns() {
        let t = sample();
        let copy = t.copy();
        let extended = copy.with_column(Column::new_double("y", vec![0.0; 5])).unwrap();
        assert_eq!(t.num_columns(), 2);
        assert_eq!(extended.num_columns(), 3);
        // the store-level guarantee: fetching again after a caller mutates
        // its own copy must not see that caller's added column.
        assert!(t.column_by_name("y").is_none());
    }

    #[test]
    fn table_store_round_trip_is_independent() {
        let store = TableStore::new();
        store.import_table("t", sample());
        let fetched = store.table("t").unwrap();
        let _ = fetched.with_column(Column::new_double("y", vec![0.0; 5])).unwrap();
        let fetched_again = store.table("t").unwrap();
        assert!(fetched_again.column_by_name("y").is_none());
    }

    #[test]
    fn order_by_sorts_ascending_and_descending() {
        let t = ColumnTable::new(vec![Column::new_double("x", vec![3.0, 1.0, 2.0])]).unwrap();
        let asc = t.order_by("x", true).unwrap();
        assert_eq!(asc.double_column("x").unwrap(), &[1.0, 2.0, 3.0]);
        let desc = t.order_by("x", false).unwrap();
        assert_eq!(desc.double_column("x").unwrap(), &[3.0, 2.0, 1.0]);
    }

    #[test]
    fn union_all_requires_matching_schema() {
        let a = ColumnTable::new(vec![Column::new_double("x", vec![1.0])]).unwrap();
        let b = ColumnTable::new(vec![Column::new_string("x", vec!["a".into()])]).unwrap();
        assert!(ColumnTable::union_all(&[a, b]).is_err());
    }
}
