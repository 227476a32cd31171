//! Traversal builder tests

use std::sync::Arc;

use graphstep_model::{GraphModel, Identifier, TypeDecl, TypeGraph, EDGE, VERTEX};
use graphstep_query::*;
use proptest::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};

fn social_model() -> GraphModel {
    let types = TypeGraph::element_builder()
        .declare(TypeDecl::interface("Entity"))
        .declare(TypeDecl::class("Person").extends(VERTEX).implements("Entity"))
        .declare(TypeDecl::class("Company").extends(VERTEX).implements("Entity"))
        .declare(TypeDecl::class("Knows").extends(EDGE))
        .declare(TypeDecl::class("WorksFor").extends(EDGE))
        .build()
        .unwrap();

    GraphModel::builder(types)
        .vertex("Person", "person", [("age", Identifier::key("years"))])
        .vertex("Company", "company", [("name", Identifier::key("name"))])
        .edge("Knows", "knows", [("since", Identifier::key("since"))])
        .edge("WorksFor", "worksFor", [("role", Identifier::key("role"))])
        .build()
        .unwrap()
}

fn env_with(options: QueryOptions) -> Arc<QueryEnvironment> {
    QueryEnvironment::builder()
        .model(social_model())
        .options(options)
        .build()
}

fn env() -> Arc<QueryEnvironment> {
    env_with(QueryOptions::default())
}

fn script(traversal: &Traversal) -> String {
    traversal.to_groovy().script
}

// ============================================================================
// Label bindings
// ============================================================================

#[test]
fn test_binding_same_name_twice_is_noop() {
    let g = env().source();
    let label = StepLabel::new(Shape::vertex("Person"));
    let once = g.v().bind_label(&label, "x").unwrap();
    let twice = once.bind_label(&label, "x").unwrap();
    assert_eq!(twice.bindings(), once.bindings());
    assert_eq!(twice.bindings().get(&label), Some("x"));
}

#[test]
fn test_rebinding_to_another_name_conflicts() {
    let g = env().source();
    let label = StepLabel::new(Shape::vertex("Person"));
    let bound = g.v().bind_label(&label, "x").unwrap();
    let err = bound.bind_label(&label, "y").unwrap_err();
    match err {
        QueryError::LabelRebindingConflict {
            existing, requested, ..
        } => {
            assert_eq!(existing, "x");
            assert_eq!(requested, "y");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bound.bindings().get(&label), Some("x"));
}

#[test]
fn test_union_merges_branch_bindings() {
    let g = env().source();
    let a = StepLabel::new(Shape::vertex(VERTEX));
    let b = StepLabel::new(Shape::vertex(VERTEX));
    let (a2, b2) = (a.clone(), b.clone());

    let branches: Vec<Branch> = vec![
        Box::new(move |t: Traversal| t.as_label(&a2).bind_label(&a2, "a")),
        Box::new(move |t: Traversal| t.as_label(&b2).bind_label(&b2, "b")),
    ];
    let merged = g.v().union(branches).unwrap();

    assert_eq!(merged.bindings().len(), 2);
    assert_eq!(merged.bindings().get(&a), Some("a"));
    assert_eq!(merged.bindings().get(&b), Some("b"));
    assert_eq!(script(&merged), "g.V().union(__.as('l1'), __.as('l2'))");
}

#[test]
fn test_union_with_conflicting_branches_fails_atomically() {
    let g = env().source();
    let base = g.v();
    let label = StepLabel::new(Shape::vertex(VERTEX));
    let (l1, l2) = (label.clone(), label.clone());

    let branches: Vec<Branch> = vec![
        Box::new(move |t: Traversal| t.bind_label(&l1, "x")),
        Box::new(move |t: Traversal| t.bind_label(&l2, "y")),
    ];
    let err = base.union(branches).unwrap_err();
    assert!(matches!(err, QueryError::LabelRebindingConflict { .. }));
    assert!(base.bindings().is_empty());
    assert_eq!(base.len(), 2);
}

#[test]
fn test_nested_filters_carry_bindings_out() {
    let g = env().source();
    let label = StepLabel::new(Shape::value());
    let inner = label.clone();
    let filtered = g
        .v()
        .where_traversal(move |t| t.bind_label(&inner, "seen"))
        .unwrap();
    assert_eq!(filtered.bindings().get(&label), Some("seen"));
}

#[test]
fn test_select_yields_labelled_shape() {
    let g = env().source();
    let people = g.v().of_type("Person").unwrap();
    let selected = people
        .as_(|t, label| Ok(t.out("Knows")?.select(&label)))
        .unwrap();
    assert_eq!(selected.shape(), &Shape::vertex("Person"));
    assert_eq!(
        script(&selected),
        "g.V().hasLabel(_a).as('l1').out(_b).select('l1')"
    );
}

#[test]
fn test_comparison_against_label_renders_label_name() {
    let g = env().source();
    let traversal = g
        .v()
        .as_(|t, label| t.out("Knows")?.where_(&Expr::value().neq(&label)))
        .unwrap();
    let encoded = traversal.to_groovy();
    assert_eq!(encoded.script, "g.V().as('l1').out(_a).where(neq('l1'))");
    assert_eq!(encoded.bindings.get("_a"), Some(&json!("knows")));
}

// ============================================================================
// Types and shapes
// ============================================================================

#[test]
fn test_filter_golden_output() {
    let g = env().source();
    let traversal = g
        .v()
        .of_type("Person")
        .unwrap()
        .where_(&Expr::field("age").gt(30))
        .unwrap();

    let encoded = traversal.to_groovy();
    assert_eq!(encoded.script, "g.V().hasLabel(_a).has(_b, gt(_c))");
    assert_eq!(encoded.bindings.get("_a"), Some(&json!("person")));
    assert_eq!(encoded.bindings.get("_b"), Some(&json!("years")));
    assert_eq!(encoded.bindings.get("_c"), Some(&json!(30)));
}

#[test]
fn test_of_type_skips_filter_when_already_typed() {
    let g = env().source();
    let people = g.v().of_type("Person").unwrap();
    let again = people.of_type("Person").unwrap();
    assert_eq!(again.len(), people.len());
    assert_eq!(again.shape(), &Shape::vertex("Person"));

    let entities = people.of_type("Entity").unwrap();
    assert_eq!(entities.len(), people.len());
}

#[test]
fn test_of_type_optimization_can_be_disabled() {
    let env = env_with(QueryOptions {
        disable_type_optimization: true,
        ..QueryOptions::default()
    });
    let people = env.source().v().of_type("Person").unwrap();
    let again = people.of_type("Person").unwrap();
    assert_eq!(again.len(), people.len() + 1);
    assert_eq!(
        again.steps().last().map(|s| (**s).clone()),
        Some(Step::HasLabel(vec!["person".to_string()]))
    );
}

#[test]
fn test_of_type_covering_every_vertex_adds_no_step() {
    let g = env().source();
    let entities = g.v().of_type("Entity").unwrap();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities.shape(), &Shape::vertex("Entity"));
}

#[test]
fn test_edge_navigation_tracks_endpoints() {
    let g = env().source();
    let knows = g.v().of_type("Person").unwrap().out_e("Knows").unwrap();
    assert_eq!(knows.shape().out_vertex().map(|t| t.as_str()), Some("Person"));
    assert_eq!(knows.out_v().unwrap().shape(), &Shape::vertex("Person"));
    assert_eq!(knows.in_v().unwrap().shape(), &Shape::vertex(VERTEX));
    assert_eq!(
        script(&knows.in_v().unwrap()),
        "g.V().hasLabel(_a).outE(_b).inV()"
    );
}

#[test]
fn test_shape_transition_errors() {
    let g = env().source();
    let err = g.e().out("Knows").unwrap_err();
    assert!(matches!(
        err,
        QueryError::UnsupportedShapeTransition { operation: "out", .. }
    ));
    assert!(g.v().out_v().is_err());
    assert!(g.v().count().properties(&["name"]).is_err());
    assert!(g.inject([1]).has_value(P::eq(1)).is_err());
    assert!(g.v().of_type("Person").unwrap().fold().of_type("Person").is_err());
}

#[test]
fn test_fold_and_unfold_round_trip_shape() {
    let g = env().source();
    let people = g.v().of_type("Person").unwrap();
    let folded = people.fold();
    assert_eq!(folded.shape(), &Shape::array(Shape::vertex("Person")));
    assert_eq!(folded.unfold().shape(), people.shape());
}

// ============================================================================
// Steps
// ============================================================================

#[test]
fn test_limit_one_shares_its_step() {
    let g = env().source();
    let first = g.v().limit(1);
    let second = g.e().limit(1);
    assert!(Arc::ptr_eq(
        first.steps().last().unwrap(),
        second.steps().last().unwrap()
    ));
    assert!(!Arc::ptr_eq(
        g.v().limit(2).steps().last().unwrap(),
        g.v().limit(2).steps().last().unwrap()
    ));
    assert_eq!(script(&first), "g.V().limit(_a)");
}

#[derive(Serialize)]
struct NewPerson {
    name: String,
    age: u32,
    tags: Vec<String>,
    nickname: Option<String>,
}

#[test]
fn test_add_vertex_emits_property_steps() {
    let g = env().source();
    let person = NewPerson {
        name: "Bob".to_string(),
        age: 30,
        tags: vec!["a".to_string(), "b".to_string()],
        nickname: None,
    };
    let added = g.add_v("Person", &person).unwrap();
    assert_eq!(added.shape(), &Shape::vertex("Person"));

    let encoded = added.to_groovy();
    assert_eq!(
        encoded.script,
        "g.addV(_a).property(_b, _c).property(_d, _e).property(list, _f, _g).property(list, _f, _h)"
    );
    assert_eq!(encoded.bindings.get("_b"), Some(&json!("years")));
    assert_eq!(encoded.bindings.get("_e"), Some(&json!("Bob")));
}

#[test]
fn test_add_vertex_rejects_non_map_elements() {
    let g = env().source();
    let err = g.add_v("Person", &42).unwrap_err();
    assert!(matches!(err, QueryError::Serialize { .. }));
}

#[test]
fn test_add_edge_from_labelled_vertex() {
    let g = env().source();
    let edge = g
        .v_ids([1])
        .as_(|t, from| {
            t.out("Knows")?
                .add_e("Knows", &json!({"since": 2001}))?
                .from_label(&from)
        })
        .unwrap();
    assert_eq!(edge.shape().kind(), ShapeKind::Edge);
    assert_eq!(
        script(&edge),
        "g.V(_a).as('l1').out(_b).addE(_b).property(_c, _d).from('l1')"
    );
}

#[test]
fn test_property_removal_uses_side_effect() {
    let g = env().source();
    let traversal = g.v().of_type("Person").unwrap().property("age", None).unwrap();
    assert_eq!(
        script(&traversal),
        "g.V().hasLabel(_a).sideEffect(__.properties(_b).drop())"
    );
    assert_eq!(traversal.to_groovy().bindings.get("_b"), Some(&json!("years")));
}

#[test]
fn test_projection_and_grouping() {
    let g = env().source();
    let projections: Vec<(&str, Branch)> = vec![
        ("name", Box::new(|t: Traversal| Ok(t.values(&["name"])))),
        ("degree", Box::new(|t: Traversal| Ok(t.out_e("Knows")?.count()))),
    ];
    let projected = g.v().project(projections).unwrap();
    assert_eq!(
        script(&projected),
        "g.V().project(_a, _b).by(__.values(_a)).by(__.outE(_c).count())"
    );

    let grouped = g.v().group(|t| Ok(t.label()), |t| Ok(t.count())).unwrap();
    assert_eq!(script(&grouped), "g.V().group().by(__.label()).by(__.count())");
}

#[test]
fn test_branching_steps() {
    let g = env().source();
    let chosen = g
        .inject([1, 2, 3])
        .choose_where_else(&Expr::value().gt(1), |t| Ok(t.identity()), |t| Ok(t.count()))
        .unwrap();
    assert_eq!(
        script(&chosen),
        "g.inject(_a, _b, _c).choose(gt(_a), __.identity(), __.count())"
    );

    let repeated = g
        .v()
        .repeat_until(|t| t.out("Knows"), |t| Ok(t.has_label(["company"])))
        .unwrap();
    assert_eq!(
        script(&repeated),
        "g.V().repeat(__.out(_a)).until(__.hasLabel(_b))"
    );

    let optional = g.v().optional(|t| t.out("WorksFor")).unwrap();
    assert_eq!(optional.shape(), &Shape::vertex(VERTEX));
    assert_eq!(script(&optional), "g.V().optional(__.out(_a))");

    let negated = g.v().not(|t| Ok(t)).unwrap();
    assert_eq!(script(&negated), "g.V().not(__.identity())");
}

#[test]
fn test_choose_where_requires_value_predicate() {
    let g = env().source();
    let err = g
        .v()
        .choose_where(&Expr::field("age").gt(1), |t| Ok(t.identity()))
        .unwrap_err();
    assert!(matches!(err, QueryError::ExpressionNotSupported { .. }));
}

#[test]
fn test_ordering_and_paging() {
    let g = env().source();
    let ordered = g
        .v()
        .of_type("Person")
        .unwrap()
        .order_by("age", Order::Decreasing)
        .range(10, 20)
        .values(&["name"])
        .dedup();
    assert_eq!(
        script(&ordered),
        "g.V().hasLabel(_a).order().by(_b, Order.desc).range(_c, _d).values(_e).dedup()"
    );
}

// ============================================================================
// Execution
// ============================================================================

#[test]
fn test_anonymous_traversals_cannot_execute() {
    let env = env();
    let anonymous = Traversal::anonymous(env.clone()).identity();
    assert!(matches!(
        anonymous.execute::<Value>(),
        Err(QueryError::AnonymousExecution)
    ));

    let detached = env.source().v().anonymize();
    assert!(detached.is_empty());
    assert!(matches!(
        detached.execute::<Value>(),
        Err(QueryError::AnonymousExecution)
    ));
    assert_eq!(script(&detached), "__.identity()");
}

#[test]
fn test_missing_executor_reports_execution_error() {
    let g = env().source();
    assert!(matches!(
        g.v().execute::<Value>(),
        Err(QueryError::Execution(_))
    ));
}

#[test]
fn test_empty_executor_yields_nothing() {
    let env = QueryEnvironment::builder()
        .model(social_model())
        .executor(EmptyExecutor)
        .build();
    let results: Vec<Value> = env.source().v().execute().unwrap();
    assert!(results.is_empty());
}

// ============================================================================
// Persistence
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Out,
    OutE,
    InV,
    Limit(u64),
    Dedup,
    Fold,
    Unfold,
    Count,
    Where(i64),
    As,
    Union,
    Optional,
    Not,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Out),
        Just(Op::OutE),
        Just(Op::InV),
        (0u64..4).prop_map(Op::Limit),
        Just(Op::Dedup),
        Just(Op::Fold),
        Just(Op::Unfold),
        Just(Op::Count),
        (0i64..100).prop_map(Op::Where),
        Just(Op::As),
        Just(Op::Union),
        Just(Op::Optional),
        Just(Op::Not),
    ]
}

fn apply(traversal: &Traversal, op: &Op) -> QueryResult<Traversal> {
    match op {
        Op::Out => traversal.out("Knows"),
        Op::OutE => traversal.out_e("WorksFor"),
        Op::InV => traversal.in_v(),
        Op::Limit(n) => Ok(traversal.limit(*n)),
        Op::Dedup => Ok(traversal.dedup()),
        Op::Fold => Ok(traversal.fold()),
        Op::Unfold => Ok(traversal.unfold()),
        Op::Count => Ok(traversal.count()),
        Op::Where(n) => traversal.where_(&Expr::field("age").gt(*n)),
        Op::As => traversal.as_(|t, label| {
            let name = format!("x{}", label.id());
            t.bind_label(&label, name)
        }),
        Op::Union => {
            let branches: Vec<Branch> = vec![
                Box::new(|t: Traversal| Ok(t.identity())),
                Box::new(|t: Traversal| Ok(t.dedup())),
            ];
            traversal.union(branches)
        }
        Op::Optional => traversal.optional(|t| Ok(t.limit(1))),
        Op::Not => traversal.not(|t| Ok(t.count())),
    }
}

proptest! {
    #[test]
    fn prop_combinators_never_mutate_their_receiver(ops in prop::collection::vec(arb_op(), 1..12)) {
        let g = env().source();
        let mut current = g.v();
        let mut snapshots = Vec::new();

        for op in &ops {
            snapshots.push((
                current.clone(),
                current.len(),
                current.bindings().clone(),
                script(&current),
            ));
            if let Ok(next) = apply(&current, op) {
                current = next;
            }
        }

        for (traversal, len, bindings, encoded) in snapshots {
            prop_assert_eq!(traversal.len(), len);
            prop_assert_eq!(traversal.bindings(), &bindings);
            prop_assert_eq!(script(&traversal), encoded);
        }
    }
}
