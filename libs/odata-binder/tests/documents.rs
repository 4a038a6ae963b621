#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use odata_binder::metadata::metadata_document;
use odata_binder::service_document::{MetadataLevel, ServiceDocumentOptions, service_document};

use common::model;

#[test]
fn metadata_describes_the_catalog() {
    let xml = metadata_document(&model()).unwrap();
    assert!(xml.contains("<EnumType Name=\"Tags\" IsFlags=\"true\">"));
    assert!(xml.contains("<EntityType Name=\"Named\" Abstract=\"true\">"));
    assert!(xml.contains("<EntityType Name=\"Product\" BaseType=\"Catalog.Named\">"));
    assert!(xml.contains("<NavigationProperty Name=\"Category\" Type=\"Catalog.Category\"/>"));
    assert!(xml.contains("<Property Name=\"Price\" Type=\"Edm.Double\" Nullable=\"false\"/>"));
    assert!(xml.contains("<EntityContainer Name=\"CatalogService\">"));
    assert!(xml.contains("<EntitySet Name=\"Products\" EntityType=\"Catalog.Product\">"));
    assert!(xml.contains("Org.OData.Capabilities.V1.TopSupported"));
}

#[test]
fn service_document_lists_entity_sets() {
    let m = model();
    let full = service_document(
        &m,
        &ServiceDocumentOptions::new("https://shop.example/odata")
            .with_metadata_level(MetadataLevel::Full),
    );
    assert_eq!(
        full.context.as_deref(),
        Some("https://shop.example/odata/$metadata")
    );
    let urls: Vec<_> = full.value.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(
        urls,
        [
            "https://shop.example/odata/Products",
            "https://shop.example/odata/Categories"
        ]
    );
    assert!(full.value.iter().all(|e| e.kind == "EntitySet"));
}
