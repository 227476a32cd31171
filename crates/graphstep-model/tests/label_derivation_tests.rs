//! Label derivation tests

use std::sync::Arc;

use graphstep_model::*;
use proptest::prelude::*;

fn entity_model() -> GraphModel {
    let types = TypeGraph::element_builder()
        .declare(TypeDecl::interface("Entity"))
        .declare(TypeDecl::class("Person").extends(VERTEX).implements("Entity"))
        .declare(TypeDecl::class("Company").extends(VERTEX).implements("Entity"))
        .declare(TypeDecl::class("WorksFor").extends(EDGE))
        .build()
        .unwrap();

    GraphModel::builder(types)
        .vertex("Person", "person", [("name", Identifier::key("name"))])
        .vertex("Company", "company", [("name", Identifier::key("name"))])
        .edge_type("WorksFor")
        .build()
        .unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_interface_covering_every_vertex_needs_no_filter() {
    let model = entity_model();
    assert_eq!(
        model.vertices().derive_labels(&TypeKey::new("Entity")),
        LabelFilter::Unrestricted
    );
    assert!(model
        .filter_labels(ElementKind::Vertex, &TypeKey::new("Entity"))
        .is_empty());
}

#[test]
fn test_concrete_type_filters_to_its_own_label() {
    let model = entity_model();
    let filter = model.vertices().derive_labels(&TypeKey::new("Person"));
    assert_eq!(filter.labels(), Some(&["person".to_string()][..]));
}

#[test]
fn test_root_is_unrestricted_even_for_empty_model() {
    let model = GraphModel::empty();
    assert_eq!(
        model.vertices().derive_labels(&TypeKey::new(VERTEX)),
        LabelFilter::Unrestricted
    );
    assert_eq!(
        model.edges().derive_labels(&TypeKey::new(EDGE)),
        LabelFilter::Unrestricted
    );
}

#[test]
fn test_unmatched_type_falls_back_to_type_name() {
    let model = entity_model();
    let ty = TypeKey::new("Robot");
    assert_eq!(model.vertices().derive_labels(&ty), LabelFilter::Unmatched);
    assert_eq!(
        model.filter_labels(ElementKind::Vertex, &ty),
        vec!["Robot".to_string()]
    );
}

#[test]
fn test_labels_are_sorted_and_deduplicated() {
    let types = TypeGraph::element_builder()
        .declare(TypeDecl::abstract_class("Animal").extends(VERTEX))
        .declare(TypeDecl::class("Zebra").extends("Animal"))
        .declare(TypeDecl::class("Aardvark").extends("Animal"))
        .declare(TypeDecl::class("Horse").extends("Animal"))
        .declare(TypeDecl::class("Pony").extends("Animal"))
        .declare(TypeDecl::class("Rock").extends(VERTEX))
        .build()
        .unwrap();
    let model = GraphModel::builder(types)
        .vertex_type("Zebra")
        .vertex_type("Aardvark")
        .vertex("Horse", "equine", std::iter::empty::<(String, Identifier)>())
        .vertex("Pony", "equine", std::iter::empty::<(String, Identifier)>())
        .vertex_type("Rock")
        .build()
        .unwrap();

    let filter = model.vertices().derive_labels(&TypeKey::new("Animal"));
    assert_eq!(
        filter.labels().unwrap(),
        &["Aardvark".to_string(), "Zebra".to_string(), "equine".to_string()][..]
    );
}

#[test]
fn test_abstract_registrations_do_not_count_towards_full_set() {
    let types = TypeGraph::element_builder()
        .declare(TypeDecl::abstract_class("Base").extends(VERTEX))
        .declare(TypeDecl::class("Leaf").extends("Base"))
        .build()
        .unwrap();
    let model = GraphModel::builder(types)
        .vertex_type("Base")
        .vertex_type("Leaf")
        .build()
        .unwrap();

    // Only one concrete type exists, so `Leaf` covers everything.
    assert_eq!(
        model.vertices().derive_labels(&TypeKey::new("Leaf")),
        LabelFilter::Unrestricted
    );
}

#[test]
fn test_configured_properties_apply_to_vertices_and_edges() {
    let types = TypeGraph::element_builder()
        .declare(TypeDecl::class("Person").extends(VERTEX))
        .declare(TypeDecl::class("WorksFor").extends(EDGE))
        .build()
        .unwrap();
    let model = GraphModel::builder(types)
        .vertex("Person", "person", [("name", Identifier::key("name"))])
        .edge("WorksFor", "worksFor", [("since", Identifier::key("since"))])
        .build()
        .unwrap();

    let prefixed = model.configure_properties(|ty, _name, id| match id.as_key() {
        Some(key) => Identifier::key(format!("{}_{key}", ty.as_str().to_lowercase())),
        None => id.clone(),
    });

    assert_eq!(
        prefixed.identifier(ElementKind::Vertex, "Person", "name"),
        Identifier::key("person_name")
    );
    assert_eq!(
        prefixed.identifier(ElementKind::Edge, "WorksFor", "since"),
        Identifier::key("worksfor_since")
    );
    assert_eq!(
        model.identifier(ElementKind::Vertex, "Person", "name"),
        Identifier::key("name")
    );
    assert_eq!(prefixed.vertices().label_of("Person"), "person");
}

#[test]
fn test_concurrent_derivation_publishes_one_value() {
    let model = Arc::new(entity_model());
    let ty = TypeKey::new("Person");

    let results: Vec<LabelFilter> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let model = model.clone();
                let ty = ty.clone();
                scope.spawn(move || model.vertices().derive_labels(&ty))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(model.vertices().cached_label_filters(), 1);
}

// ============================================================================
// Properties
// ============================================================================

fn type_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[A-Z][a-z]{1,8}", 0..12).prop_map(|names| {
        names
            .into_iter()
            .filter(|n| !matches!(n.as_str(), "Vertex" | "Edge" | "Tagged"))
            .collect()
    })
}

fn model_with(names: &[String], labels: &[String]) -> GraphModel {
    let mut types = TypeGraph::element_builder().declare(TypeDecl::interface("Tagged"));
    for (i, name) in names.iter().enumerate() {
        let decl = TypeDecl::class(name.as_str()).extends(VERTEX);
        let decl = if i % 2 == 0 { decl.implements("Tagged") } else { decl };
        types = types.declare(decl);
    }
    let mut builder = GraphModel::builder(types.build().unwrap());
    for (name, label) in names.iter().zip(labels.iter().cycle()) {
        builder = builder.vertex(
            name.as_str(),
            label.as_str(),
            std::iter::empty::<(String, Identifier)>(),
        );
    }
    builder.build().unwrap()
}

proptest! {
    #[test]
    fn prop_root_is_always_unrestricted(names in type_names()) {
        let model = model_with(&names, &["x".to_string()]);
        prop_assert_eq!(
            model.vertices().derive_labels(&TypeKey::new(VERTEX)),
            LabelFilter::Unrestricted
        );
    }

    #[test]
    fn prop_derivation_is_deterministic_and_sorted(
        names in type_names(),
        labels in prop::collection::vec("[a-z]{1,6}", 1..6),
    ) {
        let model = model_with(&names, &labels);
        let ty = TypeKey::new("Tagged");
        let first = model.vertices().derive_labels(&ty);
        let second = model.vertices().derive_labels(&ty);
        prop_assert_eq!(&first, &second);

        // A fresh model instance computes the same answer from scratch.
        let rebuilt = model_with(&names, &labels);
        prop_assert_eq!(&first, &rebuilt.vertices().derive_labels(&ty));

        if let Some(found) = first.labels() {
            let mut sorted = found.to_vec();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(found, sorted.as_slice());
        }
    }
}
