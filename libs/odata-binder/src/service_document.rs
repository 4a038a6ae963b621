//! Service document: the list of entity sets published at the service root.

use serde::{Deserialize, Serialize};

use crate::edm::EdmModel;

/// `odata.metadata` level requested by the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataLevel {
    None,
    #[default]
    Minimal,
    Full,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct ServiceDocumentOptions {
    /// Absolute service root, e.g. `https://host/odata`. A trailing `/` is ignored.
    pub service_root: String,
    pub metadata_level: MetadataLevel,
}

impl ServiceDocumentOptions {
    pub fn new(service_root: impl Into<String>) -> Self {
        Self {
            service_root: service_root.into(),
            metadata_level: MetadataLevel::default(),
        }
    }

    pub fn with_metadata_level(mut self, level: MetadataLevel) -> Self {
        self.metadata_level = level;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDocumentEntry {
    pub name: String,
    pub kind: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDocument {
    #[serde(rename = "@odata.context", skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub value: Vec<ServiceDocumentEntry>,
}

/// One `EntitySet` entry per set, in declaration order.
///
/// Urls are absolute (`<root>/<set>`) for [`MetadataLevel::Full`] and relative
/// otherwise; [`MetadataLevel::None`] also drops `@odata.context`.
#[must_use]
pub fn service_document(model: &EdmModel, options: &ServiceDocumentOptions) -> ServiceDocument {
    let root = options.service_root.trim_end_matches('/');
    let value = model
        .entity_sets()
        .map(|set| ServiceDocumentEntry {
            name: set.name().to_owned(),
            kind: "EntitySet".to_owned(),
            url: match options.metadata_level {
                MetadataLevel::Full => format!("{root}/{}", set.name()),
                MetadataLevel::Minimal | MetadataLevel::None => set.name().to_owned(),
            },
        })
        .collect();
    let context = match options.metadata_level {
        MetadataLevel::None => None,
        MetadataLevel::Minimal | MetadataLevel::Full => Some(format!("{root}/$metadata")),
    };
    ServiceDocument { context, value }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::edm::{EdmModelBuilder, FieldKind, TypeDef};
    use serde_json::json;

    fn model() -> EdmModel {
        EdmModelBuilder::new("Shop")
            .entity_type(TypeDef::entity("Item").property("Name", FieldKind::String))
            .entity_set("Items", "Item")
            .entity_set("Archive", "Item")
            .build()
            .unwrap()
    }

    #[test]
    fn minimal_metadata_uses_relative_urls() {
        let doc = service_document(&model(), &ServiceDocumentOptions::new("https://host/odata/"));
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "@odata.context": "https://host/odata/$metadata",
                "value": [
                    {"name": "Items", "kind": "EntitySet", "url": "Items"},
                    {"name": "Archive", "kind": "EntitySet", "url": "Archive"},
                ]
            })
        );
    }

    #[test]
    fn full_metadata_uses_absolute_urls() {
        let options = ServiceDocumentOptions::new("https://host/odata")
            .with_metadata_level(MetadataLevel::Full);
        let doc = service_document(&model(), &options);
        assert_eq!(doc.value[0].url, "https://host/odata/Items");
    }

    #[test]
    fn no_metadata_drops_context() {
        let options = ServiceDocumentOptions::new("https://host/odata")
            .with_metadata_level(MetadataLevel::None);
        let json = serde_json::to_string(&service_document(&model(), &options)).unwrap();
        assert!(!json.contains("@odata.context"));
        assert!(json.contains("\"url\":\"Items\""));
    }
}
