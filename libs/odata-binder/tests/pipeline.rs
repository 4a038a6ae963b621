#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use odata_binder::{
    BinaryOp, EdmModel, Error, Expr, ODataLimits, ODataRecord, QueryBuilder, QueryEngine,
    QueryOptions, SortDir, TypedSource, Value,
};
use tracing_test::traced_test;

use common::{model, names, path, products};

fn run(model: &Arc<EdmModel>, options: &QueryOptions) -> Vec<ODataRecord> {
    let data = products(model);
    QueryEngine::new(Arc::clone(model))
        .apply(TypedSource::new("Product", &data), options)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn orders_by_price_then_rating_descending() {
    let m = model();
    let options = QueryBuilder::new("Products")
        .order_by("Price", SortDir::Asc)
        .order_by("Rating", SortDir::Desc)
        .build(&m)
        .unwrap();
    let records = run(&m, &options);
    assert_eq!(
        names(&records),
        [
            "Tape", "Chisel", "Pliers", "Clamp", "Wrench", "Hammer", "Level", "Saw", "Grinder",
            "Drill", "Jigsaw", "Sander",
        ]
    );
}

#[test]
fn skip_then_top_follow_source_order() {
    let m = model();
    let skipped = run(&m, &QueryBuilder::new("Products").skip(4).build(&m).unwrap());
    assert_eq!(skipped.len(), 8);
    assert_eq!(skipped[0].scalar("Id"), Some(&Value::I64(5)));

    let page = run(&m, &QueryBuilder::new("Products").skip(4).top(4).build(&m).unwrap());
    assert_eq!(names(&page), ["Pliers", "Sander", "Level", "Tape"]);

    let past_end = run(&m, &QueryBuilder::new("Products").skip(40).build(&m).unwrap());
    assert!(past_end.is_empty());
}

#[test]
fn paging_applies_after_ordering() {
    let m = model();
    let options = QueryBuilder::new("Products")
        .order_by("Price", SortDir::Desc)
        .order_by("Id", SortDir::Asc)
        .skip(1)
        .top(2)
        .build(&m)
        .unwrap();
    assert_eq!(names(&run(&m, &options)), ["Sander", "Jigsaw"]);
}

#[test]
fn default_projection_is_structural_and_matches_wildcard() {
    let m = model();
    let default = run(&m, &QueryBuilder::new("Products").top(1).build(&m).unwrap());
    let wildcard = run(&m, &QueryBuilder::new("Products").select(["*"]).top(1).build(&m).unwrap());
    assert_eq!(
        default[0].keys().collect::<Vec<_>>(),
        ["Id", "Name", "Price", "Rating", "Tags"]
    );
    assert_eq!(default, wildcard);
}

#[test]
fn select_with_navigation_nests_one_key() {
    let m = model();
    let options = QueryBuilder::new("Products")
        .select(["Name", "Price", "Rating", "Category/Name"])
        .build(&m)
        .unwrap();
    let records = run(&m, &options);
    let hammer = &records[0];
    assert_eq!(hammer.len(), 4);
    let category = hammer.record("Category").unwrap();
    assert_eq!(category.len(), 1);
    assert_eq!(category.scalar("Name").and_then(Value::as_str), Some("Tools"));

    let chisel = &records[11];
    assert_eq!(chisel.scalar("Category"), Some(&Value::Null));
}

#[test]
fn expand_serializes_nested_objects() {
    let m = model();
    let options = QueryBuilder::new("Products")
        .select(["Name"])
        .expand(["Category"])
        .top(1)
        .build(&m)
        .unwrap();
    let json = run(&m, &options)[0].to_json().unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "Name": "Hammer",
            "Category": {"Id": 100, "Name": "Tools", "Description": "Hand tools"}
        })
    );
}

#[test]
fn filters_through_navigation_and_flags() {
    let m = model();
    let power = QueryBuilder::new("Products")
        .filter(path(&m, "Category/Name").eq("Power"))
        .build(&m)
        .unwrap();
    assert_eq!(
        names(&run(&m, &power)),
        ["Drill", "Sander", "Grinder", "Jigsaw"]
    );

    let eco_on_sale = QueryBuilder::new("Products")
        .filter(path(&m, "Tags").has("Eco").and(path(&m, "Tags").has(common::SALE)))
        .build(&m)
        .unwrap();
    assert_eq!(names(&run(&m, &eco_on_sale)), ["Saw"]);
}

#[test]
fn filters_with_string_functions_and_arithmetic() {
    let m = model();
    let starts = QueryBuilder::new("Products")
        .filter(path(&m, "Name").startswith("S").or(path(&m, "Name").contains("ill")))
        .build(&m)
        .unwrap();
    assert_eq!(names(&run(&m, &starts)), ["Drill", "Saw", "Sander"]);

    let in_list = QueryBuilder::new("Products")
        .filter(path(&m, "Id").is_in([2, 4, 99]))
        .build(&m)
        .unwrap();
    assert_eq!(names(&run(&m, &in_list)), ["Wrench", "Saw"]);

    let doubled = Expr::binary(
        BinaryOp::Mul,
        Expr::property(path(&m, "Price")),
        Expr::constant(2),
    );
    let pricey = QueryBuilder::new("Products")
        .filter(Expr::binary(BinaryOp::Gt, doubled, Expr::constant(150)))
        .build(&m)
        .unwrap();
    assert_eq!(names(&run(&m, &pricey)), ["Drill", "Sander", "Jigsaw"]);
}

#[test]
fn precondition_errors_are_raised_before_iteration() {
    let m = model();
    let data = products(&m);
    let engine = QueryEngine::new(Arc::clone(&m));

    let err = engine
        .apply(TypedSource::new("Category", &data), &QueryOptions::new("Products"))
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));

    let bad_bind = QueryOptions::new("Products").with_filter(path(&m, "Rating").eq("high"));
    let err = engine
        .apply(TypedSource::new("Product", &data), &bad_bind)
        .unwrap_err();
    assert!(matches!(err, Error::Bind { .. }));
    assert_eq!(err.to_problem().status.as_u16(), 400);
}

#[test]
fn filter_paths_from_another_type_are_rejected_at_apply() {
    let m = model();
    let data = products(&m);
    let description = m.resolve_path("Category", "Description").unwrap();
    let options = QueryOptions::new("Products").with_filter(description.eq("x"));
    let err = QueryEngine::new(Arc::clone(&m))
        .apply(TypedSource::new("Product", &data), &options)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
}

#[test]
fn limits_are_enforced_at_apply() {
    let m = model();
    let data = products(&m);
    let engine = QueryEngine::new(Arc::clone(&m)).with_limits(ODataLimits::new().with_max_top(5));
    let err = engine
        .apply(
            TypedSource::new("Product", &data),
            &QueryOptions::new("Products").with_top(6),
        )
        .unwrap_err();
    assert!(matches!(err, Error::LimitExceeded(_)));
}

#[test]
fn restartable_source_gives_restartable_results() {
    let m = model();
    let data = products(&m);
    let options = QueryBuilder::new("Products")
        .order_by("Name", SortDir::Asc)
        .top(3)
        .build(&m)
        .unwrap();
    let results = QueryEngine::new(Arc::clone(&m))
        .apply(TypedSource::new("Product", &data), &options)
        .unwrap();
    let replay = results.clone();
    let first: Vec<_> = results.map(Result::unwrap).collect();
    let second: Vec<_> = replay.map(Result::unwrap).collect();
    assert_eq!(first, second);
    assert_eq!(names(&first), ["Chisel", "Clamp", "Drill"]);
}

#[test]
#[traced_test]
fn binding_is_logged() {
    let m = model();
    let options = QueryBuilder::new("Products")
        .order_by("Price", SortDir::Desc)
        .top(2)
        .build(&m)
        .unwrap();
    let records = run(&m, &options);
    assert_eq!(records.len(), 2);
    assert!(logs_contain("odata query bound"));
    assert!(logs_contain("entity_set=Products"));
    assert!(logs_contain("ordering stage materialized"));
}
