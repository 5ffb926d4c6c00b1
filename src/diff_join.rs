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

//! The co-optimized DIFF-over-two-PK/FK-joins algorithm: pushes the
//! differential computation through the join on the shared dimension
//! table `T` without ever materializing the joined rows.
//!
//! Triggered when DIFF's two subqueries are `SELECT ... FROM R JOIN T`
//! and `SELECT ... FROM S JOIN T` (natural join, shared `T`, distinct
//! `R`/`S`); any shape outside those assumptions falls back to the
//! general two-subquery DIFF path in `diff.rs`.

use ahash::AHashMap;

use crate::encoder::AttributeEncoder;
use crate::error::{QueryError, Result};
use crate::table::{Column, ColumnTable};

/// Counts accumulated for one encoded key or value: `a` is the
/// outlier-side count, `b` the inlier-side count.
#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    a: i64,
    b: i64,
}

/// Inputs to the fused evaluator, already resolved by the caller: the
/// shared join key column from each side, and the explain column from
/// `dimension`.
pub struct DiffJoinInput<'a> {
    pub outlier_keys: &'a [String],
    pub inlier_keys: &'a [String],
    pub dimension_keys: &'a [String],
    pub explain_column: &'a [String],
    pub explain_column_name: &'a str,
    pub min_ratio: f64,
    pub min_support: f64,
}

/// Runs the fused DIFF-JOIN algorithm and returns the result table:
/// one row per surviving explain-column value, with columns
/// `{explain_column_name, support, global_ratio, outlier_count,
/// total_count}`. Row order is the iteration order of the internal
/// value map; callers needing a stable order must add `ORDER BY`.
pub fn evaluate(input: &DiffJoinInput) -> Result<ColumnTable> {
    let n_r = input.outlier_keys.len() as i64;
    let n_s = input.inlier_keys.len() as i64;
    if n_r + n_s == 0 {
        return Err(QueryError::TypeMismatch(
            "DIFF-JOIN requires at least one row across both sides".to_string(),
        ));
    }

    let global_ratio_denom = n_r as f64 / (n_r + n_s) as f64;
    let min_ratio_threshold = input.min_ratio * global_ratio_denom;
    // Floor rather than integer-truncate the product: truncating
    // `min_support` as an int before multiplying would silently zero
    // out fractional support thresholds below 1.0.
    let min_support_threshold = (input.min_support * n_r as f64).floor() as i64;

    // Phase 1: encode the join key from both populations and from the
    // dimension table, plus the explain column, with one shared
    // dictionary.
    let mut encoder = AttributeEncoder::new();
    let encoded = encoder.encode_key_value_attributes(
        &[input.outlier_keys, input.inlier_keys, input.dimension_keys],
        &[input.explain_column],
    );
    let k_r = &encoded[0];
    let k_s = &encoded[1];
    let k_t = &encoded[2];
    let v_t = &encoded[3];

    let mut m: AHashMap<i32, Counts> = AHashMap::default();
    for &k in k_r {
        m.entry(k).or_default().a += 1;
    }
    for &k in k_s {
        m.entry(k).or_default().b += 1;
    }
    m.retain(|_, c| c.a != 0 || c.b != 0);

    // Candidate keys: strict `>` against the ratio threshold,
    // intentionally asymmetric with the `<` prune below.
    let candidate_keys: AHashMap<i32, Counts> = m
        .iter()
        .filter(|(_, c)| {
            let denom = c.a + c.b;
            denom > 0 && (c.a as f64 / denom as f64) > min_ratio_threshold
        })
        .map(|(&k, &c)| (k, c))
        .collect();
    log::debug!(
        "diff-join: {} candidate keys out of {} total",
        candidate_keys.len(),
        m.len()
    );

    // Phase 2a: forward pass establishes each value's entry only from
    // keys that passed the pre-filter.
    let mut v: AHashMap<i32, Counts> = AHashMap::default();
    for (&key, &value) in k_t.iter().zip(v_t.iter()) {
        if let Some(&counts) = candidate_keys.get(&key) {
            let entry = v.entry(value).or_insert(Counts::default());
            entry.a += counts.a;
            entry.b += counts.b;
        }
    }

    // Phase 2b: backfill rows whose value is already interesting but
    // whose key did not individually pass the pre-filter.
    for (&key, &value) in k_t.iter().zip(v_t.iter()) {
        if v.contains_key(&value) && !candidate_keys.contains_key(&key) {
            let counts = m.get(&key).copied().unwrap_or_default();
            let entry = v.get_mut(&value).unwrap();
            entry.a += counts.a;
            entry.b += counts.b;
        }
    }

    // Phase 2c: prune. Non-strict `>=` against both thresholds, the
    // opposite direction from the pre-filter above.
    v.retain(|_, c| {
        let denom = c.a + c.b;
        denom > 0 && c.a >= min_support_threshold && (c.a as f64 / denom as f64) >= min_ratio_threshold
    });
    log::debug!("diff-join: {} surviving explain values", v.len());

    // Phase 3: materialize results.
    let mut explain_values = Vec::with_capacity(v.len());
    let mut support = Vec::with_capacity(v.len());
    let mut global_ratio = Vec::with_capacity(v.len());
    let mut outlier_count = Vec::with_capacity(v.len());
    let mut total_count = Vec::with_capacity(v.len());
    for (&code, &counts) in v.iter() {
        let decoded = encoder.decode(code)?;
        explain_values.push(decoded.to_string());
        support.push(counts.a as f64 / n_r as f64);
        global_ratio.push((counts.a as f64 / (counts.a + counts.b) as f64) / global_ratio_denom);
        outlier_count.push(counts.a as f64);
        total_count.push((counts.a + counts.b) as f64);
    }

    ColumnTable::new(vec![
        Column::new_string(input.explain_column_name.to_string(), explain_values),
        Column::new_double("support", support),
        Column::new_double("global_ratio", global_ratio),
        Column::new_double("outlier_count", outlier_count),
        Column::new_double("total_count", total_count),
    ])
}
