//! Index-backed search must agree with per-description matching.

use std::collections::BTreeSet;

use ctx_query::{Comparison, IndexLookup, QueryItem, Selector};
use ctx_registry::IndexedStore;
use ctx_types::{
    Attribute, AttributeType, AttributeValue, Attributes, ComponentDescription, ComponentId,
    ComponentType, UpdateMode,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Shape {
    component_type: ComponentType,
    port: u16,
    room: Option<&'static str>,
    temperature: Option<Option<AttributeValue>>,
    has_update: bool,
}

fn value_strategy() -> impl Strategy<Value = AttributeValue> {
    prop_oneof![
        (0i64..40).prop_map(AttributeValue::Integer),
        (0i64..40).prop_map(|v| AttributeValue::Float(v as f64 + 0.5)),
        prop::sample::select(vec!["kitchen", "hall", "20"]).prop_map(AttributeValue::from),
        any::<bool>().prop_map(AttributeValue::Boolean),
    ]
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    (
        prop::sample::select(vec![
            ComponentType::Widget,
            ComponentType::Server,
            ComponentType::Interpreter,
        ]),
        5000u16..5004,
        prop::option::of(prop::sample::select(vec!["kitchen", "hall"])),
        prop::option::of(prop::option::of(value_strategy())),
        any::<bool>(),
    )
        .prop_map(|(component_type, port, room, temperature, has_update)| Shape {
            component_type,
            port,
            room,
            temperature,
            has_update,
        })
}

fn build(shapes: &[Shape]) -> IndexedStore {
    let mut store = IndexedStore::new();
    for (i, shape) in shapes.iter().enumerate() {
        let mut description = ComponentDescription::new(format!("c{}", i), shape.component_type)
            .with_endpoint("host", "10.0.0.1", shape.port);
        if let Some(room) = shape.room {
            description = description.with_constant(Attribute::new("room", room));
        }
        match &shape.temperature {
            Some(Some(value)) => {
                description = description.with_attribute(Attribute::new("temperature", value.clone()))
            }
            Some(None) => {
                description = description
                    .with_attribute(Attribute::declared("temperature", AttributeType::Integer))
            }
            None => {}
        }
        if shape.has_update {
            description = description.with_callback("update");
        }
        store.insert(description).unwrap();
    }
    store
}

fn rule_strategy() -> impl Strategy<Value = QueryItem> {
    let selector = prop_oneof![
        Just(Selector::Id),
        Just(Selector::ComponentType),
        Just(Selector::Port),
        Just(Selector::Attribute("room".to_string())),
        Just(Selector::Attribute("temperature".to_string())),
        Just(Selector::Callback),
    ];
    let comparison = prop::sample::select(vec![
        Comparison::Equal,
        Comparison::Different,
        Comparison::Greater,
        Comparison::GreaterOrEqual,
        Comparison::Less,
        Comparison::LessOrEqual,
    ]);
    let operand = prop_oneof![
        value_strategy(),
        prop::sample::select(vec!["c0", "c1", "widget", "server", "update"])
            .prop_map(AttributeValue::from),
        (5000i64..5004).prop_map(AttributeValue::Integer),
    ];
    (selector, comparison, operand)
        .prop_map(|(selector, comparison, operand)| QueryItem::rule(selector, comparison, operand))
}

fn query_strategy() -> impl Strategy<Value = QueryItem> {
    rule_strategy().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3).prop_map(QueryItem::and),
            prop::collection::vec(inner.clone(), 1..3).prop_map(QueryItem::or),
            inner.clone().prop_map(QueryItem::not),
            prop::collection::vec(inner, 1..3).prop_map(QueryItem::none_of),
        ]
    })
}

fn matching_ids(store: &IndexedStore, query: &QueryItem) -> BTreeSet<ComponentId> {
    store
        .descriptions()
        .filter(|description| query.matches(description).is_true())
        .map(|description| description.id.clone())
        .collect()
}

proptest! {
    #[test]
    fn search_agrees_with_match(
        shapes in prop::collection::vec(shape_strategy(), 0..8),
        query in query_strategy(),
    ) {
        let store = build(&shapes);
        prop_assert_eq!(query.search(&store), matching_ids(&store, &query));
    }

    #[test]
    fn not_search_is_complement(
        shapes in prop::collection::vec(shape_strategy(), 0..8),
        query in query_strategy(),
    ) {
        let store = build(&shapes);
        let inner = query.search(&store);
        let negated = QueryItem::not(query).search(&store);
        let expected: BTreeSet<_> = store.all_ids().difference(&inner).cloned().collect();
        prop_assert_eq!(negated, expected);
    }

    #[test]
    fn and_or_are_intersection_and_union(
        shapes in prop::collection::vec(shape_strategy(), 0..8),
        a in query_strategy(),
        b in query_strategy(),
    ) {
        let store = build(&shapes);
        let left = a.search(&store);
        let right = b.search(&store);

        let both = QueryItem::and(vec![a.clone(), b.clone()]).search(&store);
        let either = QueryItem::or(vec![a.clone(), b.clone()]).search(&store);
        let neither = QueryItem::none_of(vec![a, b]).search(&store);

        let intersection: BTreeSet<_> = left.intersection(&right).cloned().collect();
        let union: BTreeSet<_> = left.union(&right).cloned().collect();
        let rest: BTreeSet<_> = store.all_ids().difference(&union).cloned().collect();

        prop_assert_eq!(both, intersection);
        prop_assert_eq!(either, union);
        prop_assert_eq!(neither, rest);
    }

    #[test]
    fn updates_keep_indices_consistent(
        shapes in prop::collection::vec(shape_strategy(), 1..8),
        updates in prop::collection::vec((0usize..8, value_strategy(), any::<bool>()), 0..12),
        query in query_strategy(),
    ) {
        let mut store = build(&shapes);
        for (target, value, replace) in updates {
            let id = ComponentId::new(format!("c{}", target % shapes.len()));
            let delta = Attributes::new().with(Attribute::new("temperature", value));
            let mode = if replace { UpdateMode::Replace } else { UpdateMode::Add };
            store.update(&id, &delta, mode).unwrap();
        }
        prop_assert_eq!(query.search(&store), matching_ids(&store, &query));
    }
}

fn ids(names: &[&str]) -> BTreeSet<ComponentId> {
    names.iter().map(|n| ComponentId::new(*n)).collect()
}

#[test]
fn test_kitchen_scenario() {
    let mut store = IndexedStore::new();
    store
        .insert(
            ComponentDescription::new("A", ComponentType::Widget)
                .with_constant(Attribute::new("room", "kitchen")),
        )
        .unwrap();
    store
        .insert(
            ComponentDescription::new("B", ComponentType::Server)
                .with_constant(Attribute::new("room", "kitchen")),
        )
        .unwrap();

    let kitchen_widgets = QueryItem::and(vec![
        QueryItem::type_is(ComponentType::Widget),
        QueryItem::attribute_equals("room", "kitchen"),
    ]);
    assert_eq!(kitchen_widgets.search(&store), ids(&["A"]));

    let not_widget = QueryItem::not(QueryItem::type_is(ComponentType::Widget));
    assert_eq!(not_widget.search(&store), ids(&["B"]));
}

#[test]
fn test_missing_attribute_under_not() {
    let mut store = IndexedStore::new();
    store
        .insert(
            ComponentDescription::new("A", ComponentType::Widget)
                .with_attribute(Attribute::new("temperature", 25)),
        )
        .unwrap();
    store
        .insert(ComponentDescription::new("B", ComponentType::Widget))
        .unwrap();

    let warm = QueryItem::attribute("temperature", Comparison::Greater, 20);
    assert_eq!(warm.search(&store), ids(&["A"]));
    assert_eq!(QueryItem::not(warm).search(&store), ids(&["B"]));
}
