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

//! Orchestrates population tagging, invokes the explanation engine,
//! and post-processes its output into the `outlier_count`/`total_count`
//! result shape.

use ahash::AHashMap;

use crate::ast::AttributeList;
use crate::error::{QueryError, Result};
use crate::table::{Column, ColumnTable};

pub const OUTLIER_COL: &str = "outlier_col";

/// How many attribute columns an auto-`ON *` selection samples.
const AUTO_SELECT_SAMPLE_ROWS: usize = 1000;

/// Configuration handed to the explanation engine: the ratio/support
/// thresholds, the attribute list, and the thread count it is free to
/// use (or ignore) while searching for explanatory combinations.
#[derive(Debug, Clone)]
pub struct DiffConfig {
    pub ratio_metric: String,
    pub max_order: u32,
    pub min_support: f64,
    pub min_ratio: f64,
    pub outlier_column: String,
    pub attributes: Vec<String>,
    pub thread_count: usize,
}

impl DiffConfig {
    pub fn new(
        ratio_metric: String,
        max_order: u32,
        min_support: f64,
        min_ratio: f64,
        attributes: Vec<String>,
    ) -> Self {
        DiffConfig {
            ratio_metric,
            max_order,
            min_support,
            min_ratio,
            outlier_column: OUTLIER_COL.to_string(),
            attributes,
            thread_count: num_cpus::get(),
        }
    }
}

/// One explanatory subgroup: a set of (attribute, value) pairs plus
/// its outlier/total counts.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub values: Vec<(String, String)>,
    pub outliers: u64,
    pub count: u64,
}

/// The external collaborator that enumerates attribute combinations up
/// to `max_order` and scores them by ratio/support, treated as a
/// swappable black box; this crate supplies one conforming sequential
/// implementation (`DefaultExplanationEngine`) so DIFF/SPLIT queries
/// run end to end without a second crate.
pub trait ExplanationEngine {
    fn process(&self, tagged: &ColumnTable, config: &DiffConfig) -> Result<Vec<Explanation>>;
}

/// A single-threaded grouping engine: for `max_order == 1` it groups by
/// each attribute column independently; for `max_order > 1` it also
/// considers every combination of up to `max_order` attribute columns.
/// `thread_count` is accepted (per the trait/config contract) but never
/// used — correctness here never depends on parallelism.
#[derive(Debug, Default)]
pub struct DefaultExplanationEngine;

impl ExplanationEngine for DefaultExplanationEngine {
    fn process(&self, tagged: &ColumnTable, config: &DiffConfig) -> Result<Vec<Explanation>> {
        let outlier_col = tagged.double_column(&config.outlier_column)?;
        let total_outliers: u64 = outlier_col.iter().filter(|&&v| v == 1.0).count() as u64;
        let total_rows = tagged.num_rows() as u64;
        if total_outliers == 0 || total_rows == 0 {
            return Ok(Vec::new());
        }
        let global_outlier_fraction = total_outliers as f64 / total_rows as f64;

        let combos = attribute_combinations(&config.attributes, config.max_order);
        let mut results = Vec::new();
        for combo in combos {
            let counts = group_counts(tagged, outlier_col, &combo)?;
            for (values, (outliers, count)) in counts {
                let support = outliers as f64 / total_outliers as f64;
                let ratio = (outliers as f64 / count as f64) / global_outlier_fraction;
                if support >= config.min_support && ratio >= config.min_ratio {
                    results.push(Explanation {
                        values: combo.iter().cloned().zip(values).collect(),
                        outliers,
                        count,
                    });
                }
            }
        }
        Ok(results)
    }
}

fn attribute_combinations(attributes: &[String], max_order: u32) -> Vec<Vec<String>> {
    let max_order = max_order.max(1) as usize;
    let mut combos: Vec<Vec<String>> = attributes.iter().map(|a| vec![a.clone()]).collect();
    let mut frontier = combos.clone();
    for _ in 2..=max_order {
        let mut next = Vec::new();
        for combo in &frontier {
            let last_idx = attributes.iter().position(|a| a == combo.last().unwrap()).unwrap();
            for (i, attr) in attributes.iter().enumerate().skip(last_idx + 1) {
                let mut extended = combo.clone();
                extended.push(attr.clone());
                next.push(extended);
            }
        }
        if next.is_empty() {
            break;
        }
        combos.extend(next.clone());
        frontier = next;
    }
    combos
}

type GroupKey = Vec<String>;

fn group_counts(
    tagged: &ColumnTable,
    outlier_col: &[f64],
    combo: &[String],
) -> Result<AHashMap<GroupKey, (u64, u64)>> {
    let columns: Vec<&[String]> = combo
        .iter()
        .map(|name| tagged.string_column(name))
        .collect::<Result<Vec<_>>>()?;
    let mut counts: AHashMap<GroupKey, (u64, u64)> = AHashMap::new();
    for row in 0..tagged.num_rows() {
        let key: GroupKey = columns.iter().map(|c| c[row].clone()).collect();
        let entry = counts.entry(key).or_insert((0, 0));
        entry.1 += 1;
        if outlier_col[row] == 1.0 {
            entry.0 += 1;
        }
    }
    Ok(counts)
}

/// Auto-selects categorical attribute columns for `ON *`: sample up to
/// the first 1000 rows, include a `String` column iff its
/// distinct-value count in the sample is strictly less than
/// `sample_size / 4`.
pub fn auto_select_attributes(table: &ColumnTable) -> Vec<String> {
    let sample_size = table.num_rows().min(AUTO_SELECT_SAMPLE_ROWS);
    let threshold = sample_size as f64 / 4.0;
    let mut chosen = Vec::new();
    for name in table.schema().string_columns() {
        let values = match table.string_column(name) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let mut distinct = std::collections::HashSet::new();
        for v in values.iter().take(sample_size) {
            distinct.insert(v.as_str());
        }
        if (distinct.len() as f64) < threshold {
            chosen.push(name.to_string());
        }
    }
    log::info!("ON * auto-selected attribute columns: {chosen:?}");
    chosen
}

/// Resolves the `ON` clause into a concrete attribute list, validating
/// that every selected column exists in `tagged`'s schema.
pub fn resolve_attributes(tagged: &ColumnTable, attrs: &AttributeList) -> Result<Vec<String>> {
    let names = match attrs {
        AttributeList::Wildcard => auto_select_attributes(tagged),
        AttributeList::Columns(cols) => cols.clone(),
    };
    let schema = tagged.schema();
    for name in &names {
        if !schema.contains(name) {
            return Err(QueryError::ColumnNotFound(name.clone()));
        }
    }
    Ok(names)
}

/// Runs `engine` over `tagged` and reshapes its output into the
/// standard DIFF result table: one row per explanation, columns named
/// after each selected attribute plus `outlier_count`/`total_count`
/// (renamed from the engine's `outliers`/`count`).
pub fn run_explanation_engine(
    tagged: &ColumnTable,
    config: &DiffConfig,
    engine: &dyn ExplanationEngine,
) -> Result<ColumnTable> {
    let explanations = engine
        .process(tagged, config)
        .map_err(|e| QueryError::ExplanationEngine(e.to_string()))?;

    let mut attr_columns: Vec<Vec<String>> = vec![Vec::new(); config.attributes.len()];
    let mut outlier_counts = Vec::new();
    let mut total_counts = Vec::new();
    for explanation in &explanations {
        for (i, (_, value)) in explanation.values.iter().enumerate() {
            attr_columns[i].push(value.clone());
        }
        outlier_counts.push(explanation.outliers as f64);
        total_counts.push(explanation.count as f64);
    }

    let mut columns = Vec::new();
    for (name, values) in config.attributes.iter().zip(attr_columns) {
        // Explanations of order < attributes.len() (not produced by
        // DefaultExplanationEngine, but a conforming engine could) are
        // out of scope for this column layout; every combo here has
        // exactly `config.attributes.len()` slots filled.
        if values.len() == explanations.len() {
            columns.push(Column::new_string(name.clone(), values));
        }
    }
    columns.push(Column::new_double("outlier_count", outlier_counts));
    columns.push(Column::new_double("total_count", total_counts));
    ColumnTable::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn tagged_table() -> ColumnTable {
        // state/metric/city, 6 rows, metric > 5 tags CA as the outlier group.
        let state = vec!["CA", "CA", "CA", "TX", "TX", "FL"]
            .into_iter()
            .map(String::from)
            .collect();
        let metric = vec![10.0, 12.0, 11.0, 1.0, 2.0, 1.0];
        let outlier = metric.iter().map(|&m| if m > 5.0 { 1.0 } else { 0.0 }).collect();
        ColumnTable::new(vec![
            Column::new_string("state", state),
            Column::new_double("metric", metric),
            Column::new_double(OUTLIER_COL, outlier),
        ])
        .unwrap()
    }

    #[test]
    fn s2_split_diff_scenario() {
        let tagged = tagged_table();
        let config = DiffConfig::new(
            "global_ratio".to_string(),
            1,
            0.4,
            2.0,
            vec!["state".to_string()],
        );
        let engine = DefaultExplanationEngine;
        let explanations = engine.process(&tagged, &config).unwrap();
        let ca = explanations
            .iter()
            .find(|e| e.values == vec![("state".to_string(), "CA".to_string())])
            .expect("CA should be reported as an outlier explanation");
        assert_eq!(ca.outliers, 3);
        assert_eq!(ca.count, 3);
    }

    #[test]
    fn s5_auto_attribute_selection() {
        let mut cat1 = Vec::new();
        let mut cat2 = Vec::new();
        let mut cat3 = Vec::new();
        for i in 0..1000 {
            cat1.push(format!("c1-{}", i % 5));
            cat2.push(format!("c2-{}", i % 900));
            cat3.push(format!("c3-{}", i % 50));
        }
        let table = ColumnTable::new(vec![
            Column::new_string("cat1", cat1),
            Column::new_string("cat2", cat2),
            Column::new_string("cat3", cat3),
        ])
        .unwrap();
        let chosen = auto_select_attributes(&table);
        assert!(chosen.contains(&"cat1".to_string()));
        assert!(chosen.contains(&"cat3".to_string()));
        assert!(!chosen.contains(&"cat2".to_string()));
    }

    #[test]
    fn resolve_attributes_rejects_missing_column() {
        let tagged = tagged_table();
        let err = resolve_attributes(&tagged, &AttributeList::Columns(vec!["nope".to_string()]))
            .unwrap_err();
        assert!(matches!(err, QueryError::ColumnNotFound(_)));
    }

    #[test]
    fn run_explanation_engine_renames_result_columns() {
        let tagged = tagged_table();
        let config = DiffConfig::new(
            "global_ratio".to_string(),
            1,
            0.4,
            2.0,
            vec!["state".to_string()],
        );
        let result = run_explanation_engine(&tagged, &config, &DefaultExplanationEngine).unwrap();
        assert!(result.schema().contains("outlier_count"));
        assert!(result.schema().contains("total_count"));
        assert!(!result.schema().contains("outliers"));
        assert!(!result.schema().contains("count"));
    }
}
