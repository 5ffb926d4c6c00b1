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

//! End-to-end scenarios driven entirely through the public `Engine`
//! façade rather than internal module functions.

use diffql::ast::{
    AttributeList, CmpOp, DiffQuerySpec, DiffShape, Expr, JoinCriteria, JoinKind, Literal,
    LogicalOp, QueryBody, QuerySpec, Relation, SelectItem,
};
use diffql::{Column, ColumnTable, Engine};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn s1_predicate_mask_scenario() {
    init();
    let engine = Engine::new();
    engine.import_table(
        "d",
        ColumnTable::new(vec![Column::new_double("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])]).unwrap(),
    );
    let body = QueryBody::Query(QuerySpec {
        from: Relation::Table("d".to_string()),
        select: vec![SelectItem::SingleColumn {
            expr: Expr::Identifier("x".to_string()),
            output_name: "x".to_string(),
        }],
        filter: Some(Expr::Logical {
            op: LogicalOp::And,
            left: Box::new(Expr::Comparison {
                op: CmpOp::Gt,
                left: Box::new(Expr::Identifier("x".to_string())),
                right: Box::new(Expr::Literal(Literal::Double(2.0))),
            }),
            right: Box::new(Expr::Comparison {
                op: CmpOp::Le,
                left: Box::new(Expr::Identifier("x".to_string())),
                right: Box::new(Expr::Literal(Literal::Double(4.0))),
            }),
        }),
        order_by: vec![],
        limit: None,
    });
    let result = engine.execute_query(&body).unwrap();
    assert_eq!(result.double_column("x").unwrap(), &[3.0, 4.0]);
}

#[test]
fn s2_split_diff_scenario() {
    init();
    let engine = Engine::new();
    engine.import_table(
        "t",
        ColumnTable::new(vec![
            Column::new_string(
                "state",
                vec!["CA", "CA", "CA", "TX", "TX", "FL"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
            Column::new_double("metric", vec![10.0, 12.0, 11.0, 1.0, 2.0, 1.0]),
            Column::new_string(
                "city",
                vec!["SF", "SF", "LA", "AUS", "AUS", "MIA"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
        ])
        .unwrap(),
    );
    let body = QueryBody::Diff(DiffQuerySpec {
        shape: DiffShape::Split {
            relation: Relation::Table("t".to_string()),
            predicate: Expr::Comparison {
                op: CmpOp::Gt,
                left: Box::new(Expr::Identifier("metric".to_string())),
                right: Box::new(Expr::Literal(Literal::Double(5.0))),
            },
        },
        attributes: AttributeList::Columns(vec!["state".to_string()]),
        ratio_metric: "global_ratio".to_string(),
        max_order: 1,
        min_support: 0.4,
        min_ratio: 2.0,
        select: vec![SelectItem::AllColumns],
        order_by: vec![],
        limit: None,
    });
    let result = engine.execute_query(&body).unwrap();
    assert_eq!(result.num_rows(), 1);
    assert_eq!(result.string_column("state").unwrap(), &["CA".to_string()]);
    assert_eq!(result.double_column("outlier_count").unwrap()[0], 3.0);
    assert_eq!(result.double_column("total_count").unwrap()[0], 3.0);
}

#[test]
fn s3_diff_join_fused_scenario() {
    init();
    let engine = Engine::new();
    engine.import_table(
        "r",
        ColumnTable::new(vec![Column::new_string(
            "a",
            vec!["a", "a", "b", "b"].into_iter().map(String::from).collect(),
        )])
        .unwrap(),
    );
    engine.import_table(
        "s",
        ColumnTable::new(vec![Column::new_string(
            "a",
            vec!["c", "d", "e"].into_iter().map(String::from).collect(),
        )])
        .unwrap(),
    );
    engine.import_table(
        "t",
        ColumnTable::new(vec![
            Column::new_string(
                "a",
                vec!["a", "b", "c", "d", "e"].into_iter().map(String::from).collect(),
            ),
            Column::new_string(
                "state",
                vec!["CA", "CA", "TX", "TX", "FL"].into_iter().map(String::from).collect(),
            ),
        ])
        .unwrap(),
    );

    let natural_join = |left: &str, right: &str| Relation::Join {
        left: Box::new(Relation::Table(left.to_string())),
        right: Box::new(Relation::Table(right.to_string())),
        kind: JoinKind::Inner,
        criteria: JoinCriteria::Natural,
    };

    let body = QueryBody::Diff(DiffQuerySpec {
        shape: DiffShape::TwoSubqueries {
            outliers: Box::new(QuerySpec {
                from: natural_join("r", "t"),
                select: vec![SelectItem::AllColumns],
                filter: None,
                order_by: vec![],
                limit: None,
            }),
            inliers: Box::new(QuerySpec {
                from: natural_join("s", "t"),
                select: vec![SelectItem::AllColumns],
                filter: None,
                order_by: vec![],
                limit: None,
            }),
        },
        attributes: AttributeList::Columns(vec!["state".to_string()]),
        ratio_metric: "global_ratio".to_string(),
        max_order: 1,
        min_support: 0.5,
        min_ratio: 1.5,
        select: vec![SelectItem::AllColumns],
        order_by: vec![],
        limit: None,
    });
    let result = engine.execute_query(&body).unwrap();
    assert_eq!(result.num_rows(), 1);
    assert_eq!(result.string_column("state").unwrap(), &["CA".to_string()]);
    assert_eq!(result.double_column("outlier_count").unwrap()[0], 4.0);
    assert_eq!(result.double_column("total_count").unwrap()[0], 4.0);
}

#[test]
fn s4_inner_join_output_qualification() {
    init();
    let engine = Engine::new();
    engine.import_table(
        "b",
        ColumnTable::new(vec![
            Column::new_double("id", vec![1.0, 2.0]),
            Column::new_string("name", vec!["b1".into(), "b2".into()]),
        ])
        .unwrap(),
    );
    engine.import_table(
        "s",
        ColumnTable::new(vec![
            Column::new_double("id", vec![1.0, 2.0]),
            Column::new_string("name", vec!["s1".into(), "s2".into()]),
        ])
        .unwrap(),
    );
    let body = QueryBody::Query(QuerySpec {
        from: Relation::Join {
            left: Box::new(Relation::Table("b".to_string())),
            right: Box::new(Relation::Table("s".to_string())),
            kind: JoinKind::Inner,
            criteria: JoinCriteria::On(Expr::Identifier("id".to_string())),
        },
        select: vec![SelectItem::AllColumns],
        filter: None,
        order_by: vec![],
        limit: None,
    });
    let result = engine.execute_query(&body).unwrap();
    let schema = result.schema();
    let names: Vec<&str> = schema.names().collect();
    assert!(names.contains(&"id"));
    assert!(names.contains(&"b.name"));
    assert!(names.contains(&"s.name"));
}

#[test]
fn s5_auto_attribute_selection_via_on_star() {
    init();
    let engine = Engine::new();
    let mut cat1 = Vec::new();
    let mut cat2 = Vec::new();
    let mut cat3 = Vec::new();
    let mut metric = Vec::new();
    for i in 0..1000 {
        cat1.push(format!("c1-{}", i % 5));
        cat2.push(format!("c2-{}", i % 900));
        cat3.push(format!("c3-{}", i % 50));
        metric.push(if i % 5 == 0 { 100.0 } else { 1.0 });
    }
    engine.import_table(
        "t",
        ColumnTable::new(vec![
            Column::new_string("cat1", cat1),
            Column::new_string("cat2", cat2),
            Column::new_string("cat3", cat3),
            Column::new_double("metric", metric),
        ])
        .unwrap(),
    );
    let body = QueryBody::Diff(DiffQuerySpec {
        shape: DiffShape::Split {
            relation: Relation::Table("t".to_string()),
            predicate: Expr::Comparison {
                op: CmpOp::Gt,
                left: Box::new(Expr::Identifier("metric".to_string())),
                right: Box::new(Expr::Literal(Literal::Double(50.0))),
            },
        },
        attributes: AttributeList::Wildcard,
        ratio_metric: "global_ratio".to_string(),
        max_order: 1,
        min_support: 0.0,
        min_ratio: 0.0,
        select: vec![SelectItem::AllColumns],
        order_by: vec![],
        limit: None,
    });
    let result = engine.execute_query(&body).unwrap();
    let schema = result.schema();
    let names: Vec<&str> = schema.names().collect();
    assert!(names.contains(&"cat1"));
    assert!(names.contains(&"cat3"));
    assert!(!names.contains(&"cat2"));
}

#[test]
fn s6_literal_vs_literal_predicate() {
    init();
    let engine = Engine::new();
    engine.import_table(
        "d",
        ColumnTable::new(vec![Column::new_double("x", vec![1.0, 2.0, 3.0])]).unwrap(),
    );
    let query = |lit: f64| {
        QueryBody::Query(QuerySpec {
            from: Relation::Table("d".to_string()),
            select: vec![SelectItem::AllColumns],
            filter: Some(Expr::Comparison {
                op: CmpOp::Eq,
                left: Box::new(Expr::Literal(Literal::Double(1.0))),
                right: Box::new(Expr::Literal(Literal::Double(lit))),
            }),
            order_by: vec![],
            limit: None,
        })
    };
    let all_rows = engine.execute_query(&query(1.0)).unwrap();
    assert_eq!(all_rows.num_rows(), 3);
    let no_rows = engine.execute_query(&query(2.0)).unwrap();
    assert_eq!(no_rows.num_rows(), 0);
}
