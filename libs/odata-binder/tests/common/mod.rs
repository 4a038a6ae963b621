#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Shared catalog fixture: 12 products across two categories.

use std::sync::Arc;

use odata_binder::{
    EdmModel, EdmModelBuilder, Entity, EnumType, FieldKind, PropertyPath, TypeDef, Value,
};

pub const SALE: i64 = 1;
pub const NEW: i64 = 2;
pub const ECO: i64 = 4;

pub fn model() -> Arc<EdmModel> {
    let model = EdmModelBuilder::new("Catalog")
        .container("CatalogService")
        .enum_type(
            EnumType::new("Tags")
                .flags()
                .member("Sale", SALE)
                .member("New", NEW)
                .member("Eco", ECO),
        )
        .entity_type(
            TypeDef::entity("Named")
                .abstract_type()
                .key("Id")
                .required("Id", FieldKind::I64)
                .required("Name", FieldKind::String),
        )
        .entity_type(
            TypeDef::entity("Category")
                .base("Named")
                .property("Description", FieldKind::String),
        )
        .entity_type(
            TypeDef::entity("Product")
                .base("Named")
                .required("Price", FieldKind::F64)
                .property("Rating", FieldKind::I64)
                .property("Tags", "Tags")
                .property("Category", "Category"),
        )
        .entity_set("Products", "Product")
        .entity_set("Categories", "Category")
        .build()
        .expect("catalog model is valid");
    Arc::new(model)
}

pub fn categories(model: &EdmModel) -> Vec<Arc<Entity>> {
    [(100, "Tools", "Hand tools"), (200, "Power", "Corded and cordless")]
        .into_iter()
        .map(|(id, name, description)| {
            Arc::new(
                model
                    .new_entity("Category")
                    .unwrap()
                    .with("Id", id)
                    .with("Name", name)
                    .with("Description", description)
                    .build()
                    .unwrap(),
            )
        })
        .collect()
}

/// `(id, name, price, rating, category index, tags)`; index 2 means no category.
const PRODUCTS: [(i64, &str, f64, i64, usize, i64); 12] = [
    (1, "Hammer", 12.5, 4, 0, SALE),
    (2, "Wrench", 8.0, 3, 0, 0),
    (3, "Drill", 89.99, 5, 1, NEW),
    (4, "Saw", 25.0, 4, 0, SALE | ECO),
    (5, "Pliers", 8.0, 5, 0, 0),
    (6, "Sander", 89.99, 3, 1, ECO),
    (7, "Level", 15.0, 2, 0, NEW),
    (8, "Tape", 3.5, 4, 0, SALE),
    (9, "Grinder", 65.0, 4, 1, NEW | ECO),
    (10, "Clamp", 8.0, 4, 0, 0),
    (11, "Jigsaw", 89.99, 4, 1, NEW),
    (12, "Chisel", 3.5, 2, 2, ECO),
];

pub fn products(model: &EdmModel) -> Vec<Entity> {
    let categories = categories(model);
    PRODUCTS
        .iter()
        .map(|&(id, name, price, rating, category, tags)| {
            model
                .new_entity("Product")
                .unwrap()
                .with("Id", id)
                .with("Name", name)
                .with("Price", price)
                .with("Rating", rating)
                .with("Tags", Value::Enum(tags))
                .with("Category", categories.get(category).cloned())
                .build()
                .unwrap()
        })
        .collect()
}

pub fn path(model: &EdmModel, path: &str) -> PropertyPath {
    model.resolve_path("Product", path).unwrap()
}

pub fn names<'a>(records: impl IntoIterator<Item = &'a odata_binder::ODataRecord>) -> Vec<String> {
    records
        .into_iter()
        .map(|r| r.scalar("Name").and_then(Value::as_str).unwrap().to_owned())
        .collect()
}
