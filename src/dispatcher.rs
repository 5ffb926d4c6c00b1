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

//! Dispatches an incoming query node to the standard, DIFF, or
//! DIFF-JOIN paths and applies the trailing SQL clauses.

use crate::ast::{
    DiffQuerySpec, DiffShape, Expr, JoinCriteria, JoinKind, OrderByItem, QueryBody, QuerySpec,
    Relation, SelectItem,
};
use crate::diff::{self, DiffConfig, DefaultExplanationEngine, ExplanationEngine, OUTLIER_COL};
use crate::diff_join::{self, DiffJoinInput};
use crate::error::{QueryError, Result};
use crate::join;
use crate::predicate;
use crate::table::{Column, ColumnTable, TableStore};
use crate::udf::UdfRegistry;

/// Executes a query body against `store`, using `engine` for DIFF's
/// black-box attribute-combination search and `udfs` for scalar
/// function resolution.
pub fn execute(
    store: &TableStore,
    body: &QueryBody,
    engine: &dyn ExplanationEngine,
    udfs: &UdfRegistry,
) -> Result<ColumnTable> {
    log::debug!("executing query: {body:?}");
    match body {
        QueryBody::Query(spec) => execute_query_spec(store, spec, udfs),
        QueryBody::Diff(spec) => execute_diff(store, spec, engine, udfs),
    }
}

fn execute_query_spec(store: &TableStore, spec: &QuerySpec, udfs: &UdfRegistry) -> Result<ColumnTable> {
    let from = evaluate_relation(store, &spec.from)?;
    apply_standard_pipeline(
        from,
        &spec.select,
        spec.filter.as_ref(),
        &spec.order_by,
        spec.limit,
        udfs,
    )
}

/// Evaluates a `Relation` to a concrete table: a bare/aliased table
/// read from the store, or a non-fused inner join of two relations.
fn evaluate_relation(store: &TableStore, relation: &Relation) -> Result<ColumnTable> {
    match relation {
        Relation::Table(name) => store.table(name),
        Relation::Aliased { relation, .. } => evaluate_relation(store, relation),
        Relation::Join {
            left,
            right,
            kind,
            criteria,
        } => {
            let left_table = evaluate_relation(store, left)?;
            let right_table = evaluate_relation(store, right)?;
            let left_name = left.base_name().ok_or_else(|| {
                QueryError::ParseOrShapeError("join side must be a named relation".to_string())
            })?;
            let right_name = right.base_name().ok_or_else(|| {
                QueryError::ParseOrShapeError("join side must be a named relation".to_string())
            })?;
            let join_col = join::resolve_join_column(criteria, &left_table, &right_table)?;
            join::inner_join(&left_table, left_name, &right_table, right_name, &join_col, *kind)
        }
    }
}

/// UDFs -> WHERE -> SELECT -> ORDER BY -> LIMIT. UDF columns must be
/// materialized before WHERE so filters can reference them; WHERE runs
/// before SELECT so a projected-away column can still filter; ORDER BY
/// follows SELECT; LIMIT is always last.
fn apply_standard_pipeline(
    table: ColumnTable,
    select: &[SelectItem],
    filter: Option<&Expr>,
    order_by: &[OrderByItem],
    limit: Option<usize>,
    udfs: &UdfRegistry,
) -> Result<ColumnTable> {
    let mut exprs: Vec<&Expr> = select
        .iter()
        .filter_map(|item| match item {
            SelectItem::SingleColumn { expr, .. } => Some(expr),
            SelectItem::AllColumns => None,
        })
        .collect();
    if let Some(f) = filter {
        exprs.push(f);
    }
    for item in order_by {
        exprs.push(&item.expr);
    }
    let materialized = crate::udf::materialize_udfs(&table, &exprs, udfs)?;

    let filtered = match filter {
        Some(expr) => {
            let mask = predicate::evaluate_mask(&materialized, expr, udfs)?;
            materialized.filter(&mask)?
        }
        None => materialized,
    };

    let projected = apply_select(&filtered, select)?;

    let ordered = apply_order_by(&projected, order_by)?;

    Ok(match limit {
        Some(n) => ordered.limit(n),
        None => ordered,
    })
}

fn apply_select(table: &ColumnTable, select: &[SelectItem]) -> Result<ColumnTable> {
    if select.iter().any(|item| matches!(item, SelectItem::AllColumns)) {
        if select.len() != 1 {
            return Err(QueryError::ParseOrShapeError(
                "SELECT * cannot be combined with other select items".to_string(),
            ));
        }
        return Ok(table.clone());
    }
    let mut names = Vec::with_capacity(select.len());
    for item in select {
        match item {
            SelectItem::SingleColumn { expr, output_name } => {
                let source_name = match expr {
                    Expr::Identifier(name) => name.clone(),
                    Expr::Dereference { column, .. } => column.clone(),
                    Expr::FunctionCall { .. } => expr.text_form(),
                    other => {
                        return Err(QueryError::ParseOrShapeError(format!(
                            "unsupported SELECT item: {}",
                            other.text_form()
                        )))
                    }
                };
                if table.column_by_name(&source_name).is_none() {
                    return Err(QueryError::ColumnNotFound(source_name));
                }
                names.push(source_name.clone());
                if *output_name != source_name {
                    return Err(QueryError::ParseOrShapeError(
                        "column aliasing in SELECT is not supported".to_string(),
                    ));
                }
            }
            SelectItem::AllColumns => unreachable!("handled above"),
        }
    }
    table.project(&names)
}

fn apply_order_by(table: &ColumnTable, order_by: &[OrderByItem]) -> Result<ColumnTable> {
    match order_by {
        [] => Ok(table.clone()),
        [item] => {
            let col = match &item.expr {
                Expr::Identifier(name) => name.clone(),
                Expr::Dereference { column, .. } => column.clone(),
                Expr::FunctionCall { .. } => item.expr.text_form(),
                other => {
                    return Err(QueryError::ParseOrShapeError(format!(
                        "unsupported ORDER BY expression: {}",
                        other.text_form()
                    )))
                }
            };
            table.order_by(&col, item.ascending)
        }
        // Multi-column sort is intentionally not implemented: a single
        // sort key keeps row order fully determined by one comparator
        // rather than a tie-break chain.
        _ => Err(QueryError::ParseOrShapeError(
            "multi-column ORDER BY is not supported".to_string(),
        )),
    }
}

fn execute_diff(
    store: &TableStore,
    spec: &DiffQuerySpec,
    engine: &dyn ExplanationEngine,
    udfs: &UdfRegistry,
) -> Result<ColumnTable> {
    let result = match &spec.shape {
        DiffShape::Split { relation, predicate: pred } => {
            execute_split(store, relation, pred, spec, engine, udfs)?
        }
        DiffShape::TwoSubqueries { outliers, inliers } => {
            match try_fused_diff_join(store, outliers, inliers, spec)? {
                Some(fused) => fused,
                None => execute_two_subquery_diff(store, outliers, inliers, spec, engine, udfs)?,
            }
        }
    };
    apply_standard_pipeline(result, &spec.select, None, &spec.order_by, spec.limit, udfs)
}

fn execute_split(
    store: &TableStore,
    relation: &Relation,
    predicate_expr: &Expr,
    spec: &DiffQuerySpec,
    engine: &dyn ExplanationEngine,
    udfs: &UdfRegistry,
) -> Result<ColumnTable> {
    let table = evaluate_relation(store, relation)?;
    let mask = predicate::evaluate_mask(&table, predicate_expr, udfs)?;
    let outlier_col = mask.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
    let tagged = table.with_column(Column::new_double(OUTLIER_COL, outlier_col))?;
    run_diff(&tagged, spec, engine)
}

fn execute_two_subquery_diff(
    store: &TableStore,
    outliers: &QuerySpec,
    inliers: &QuerySpec,
    spec: &DiffQuerySpec,
    engine: &dyn ExplanationEngine,
    udfs: &UdfRegistry,
) -> Result<ColumnTable> {
    let outlier_table = execute_query_spec(store, outliers, udfs)?;
    let inlier_table = execute_query_spec(store, inliers, udfs)?;
    let outlier_tagged =
        outlier_table.with_column(Column::new_double(OUTLIER_COL, vec![1.0; outlier_table.num_rows()]))?;
    let inlier_tagged =
        inlier_table.with_column(Column::new_double(OUTLIER_COL, vec![0.0; inlier_table.num_rows()]))?;
    let tagged = ColumnTable::union_all(&[outlier_tagged, inlier_tagged])?;
    run_diff(&tagged, spec, engine)
}

fn run_diff(tagged: &ColumnTable, spec: &DiffQuerySpec, engine: &dyn ExplanationEngine) -> Result<ColumnTable> {
    let attributes = diff::resolve_attributes(tagged, &spec.attributes)?;
    let config = DiffConfig::new(
        spec.ratio_metric.clone(),
        spec.max_order,
        spec.min_support,
        spec.min_ratio,
        attributes,
    );
    diff::run_explanation_engine(tagged, &config, engine)
}

/// Detects the DIFF-JOIN fused shape: both subqueries
/// are `QuerySpec`s whose FROM is an inner natural join, both joins
/// share the same right-hand relation, and the left-hand relations
/// differ. Returns `Ok(None)` for any shape outside those assumptions
/// so the caller falls back to the general path — this function never
/// fails the whole query just because the fast path doesn't apply.
fn try_fused_diff_join(
    store: &TableStore,
    outliers: &QuerySpec,
    inliers: &QuerySpec,
    spec: &DiffQuerySpec,
) -> Result<Option<ColumnTable>> {
    let (r_rel, t_rel_1, join_crit_1) = match natural_inner_join_shape(&outliers.from) {
        Some(x) => x,
        None => return Ok(None),
    };
    let (s_rel, t_rel_2, join_crit_2) = match natural_inner_join_shape(&inliers.from) {
        Some(x) => x,
        None => return Ok(None),
    };
    let t_name_1 = match t_rel_1.base_name() {
        Some(n) => n,
        None => return Ok(None),
    };
    let t_name_2 = match t_rel_2.base_name() {
        Some(n) => n,
        None => return Ok(None),
    };
    if t_name_1 != t_name_2 {
        return Ok(None);
    }
    let r_name = match r_rel.base_name() {
        Some(n) => n,
        None => return Ok(None),
    };
    let s_name = match s_rel.base_name() {
        Some(n) => n,
        None => return Ok(None),
    };
    if r_name == s_name {
        return Ok(None);
    }
    if spec.ratio_metric != "global_ratio" {
        return Ok(None);
    }
    let explain_column = match &spec.attributes {
        crate::ast::AttributeList::Columns(cols) if cols.len() == 1 => &cols[0],
        _ => return Ok(None),
    };

    let r_table = evaluate_relation(store, r_rel)?;
    let s_table = evaluate_relation(store, s_rel)?;
    let t_table = evaluate_relation(store, t_rel_1)?;

    let join_col_1 = join::resolve_join_column(join_crit_1, &r_table, &t_table)?;
    let join_col_2 = join::resolve_join_column(join_crit_2, &s_table, &t_table)?;
    if join_col_1 != join_col_2 {
        return Ok(None);
    }
    if t_table.schema().column_type(&join_col_1) != Some(crate::table::ScalarType::String) {
        return Ok(None);
    }

    let outlier_keys = r_table.string_column(&join_col_1)?;
    let inlier_keys = s_table.string_column(&join_col_1)?;
    let dimension_keys = t_table.string_column(&join_col_1)?;
    let explain_values = match t_table.string_column(explain_column) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let input = DiffJoinInput {
        outlier_keys,
        inlier_keys,
        dimension_keys,
        explain_column: explain_values,
        explain_column_name: explain_column,
        min_ratio: spec.min_ratio,
        min_support: spec.min_support,
    };
    Ok(Some(diff_join::evaluate(&input)?))
}

/// If `from` is `relation NATURAL JOIN relation2` (inner), returns
/// `(left, right, criteria)`; otherwise `None`. An explicit `ON`/`USING`
/// join never matches here even if it happens to resolve to the same
/// column — only a `NATURAL` join qualifies for the fused path.
fn natural_inner_join_shape(from: &Relation) -> Option<(&Relation, &Relation, &JoinCriteria)> {
    match from {
        Relation::Join {
            left,
            right,
            kind: JoinKind::Inner,
            criteria: criteria @ JoinCriteria::Natural,
        } => Some((left.as_ref(), right.as_ref(), criteria)),
        _ => None,
    }
}

/// Convenience entry point using the bundled sequential explanation
/// engine and the built-in UDF registry — the façade most callers use.
pub fn execute_with_defaults(store: &TableStore, body: &QueryBody) -> Result<ColumnTable> {
    let engine = DefaultExplanationEngine;
    let udfs = UdfRegistry::new();
    execute(store, body, &engine, &udfs)
}
