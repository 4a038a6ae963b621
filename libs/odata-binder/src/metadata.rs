//! `$metadata`: CSDL 4.0 XML for an [`EdmModel`].

use std::fmt::{self, Write};

use crate::Error;
use crate::edm::{Capabilities, EdmModel, EdmType, EntitySet, EnumType, Property, StructuredType};

const CAPABILITIES: &str = "Org.OData.Capabilities.V1";

/// Serialize the model's types and entity container as a CSDL document.
///
/// Only declared properties are written per type; inherited ones come from `BaseType`.
///
/// # Errors
/// Returns `Error::Evaluation` if writing into the output buffer fails.
pub fn metadata_document(model: &EdmModel) -> Result<String, Error> {
    let mut xml = String::new();
    write_document(model, &mut xml)
        .map_err(|e| Error::Evaluation(format!("failed to write metadata document: {e}")))?;
    Ok(xml)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn write_document(model: &EdmModel, xml: &mut String) -> fmt::Result {
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(
        "<edmx:Edmx Version=\"4.0\" xmlns:edmx=\"http://docs.oasis-open.org/odata/ns/edmx\">\n",
    );
    xml.push_str("  <edmx:DataServices>\n");
    writeln!(
        xml,
        "    <Schema Namespace=\"{}\" xmlns=\"http://docs.oasis-open.org/odata/ns/edm\">",
        escape_xml(model.namespace())
    )?;
    for enum_type in model.enum_types() {
        write_enum(xml, enum_type)?;
    }
    for complex in model.complex_types() {
        write_structured(xml, model, "ComplexType", complex)?;
    }
    for entity in model.entity_types() {
        write_structured(xml, model, "EntityType", entity)?;
    }
    writeln!(
        xml,
        "      <EntityContainer Name=\"{}\">",
        escape_xml(model.container_name())
    )?;
    for set in model.entity_sets() {
        write_entity_set(xml, model, set)?;
    }
    xml.push_str("      </EntityContainer>\n");
    xml.push_str("    </Schema>\n");
    xml.push_str("  </edmx:DataServices>\n");
    xml.push_str("</edmx:Edmx>\n");
    Ok(())
}

fn qualified(model: &EdmModel, name: &str) -> String {
    escape_xml(&format!("{}.{name}", model.namespace()))
}

fn type_name(model: &EdmModel, ty: &EdmType) -> String {
    match ty {
        EdmType::Primitive(kind) => kind.edm_name().to_owned(),
        EdmType::Enum(name) | EdmType::Complex(name) | EdmType::Entity(name) => {
            qualified(model, name)
        }
    }
}

fn write_enum(xml: &mut String, enum_type: &EnumType) -> fmt::Result {
    write!(xml, "      <EnumType Name=\"{}\"", escape_xml(enum_type.name()))?;
    if enum_type.is_flags() {
        xml.push_str(" IsFlags=\"true\"");
    }
    xml.push_str(">\n");
    for (member, value) in enum_type.members() {
        writeln!(
            xml,
            "        <Member Name=\"{}\" Value=\"{value}\"/>",
            escape_xml(member)
        )?;
    }
    xml.push_str("      </EnumType>\n");
    Ok(())
}

fn write_structured(
    xml: &mut String,
    model: &EdmModel,
    element: &str,
    ty: &StructuredType,
) -> fmt::Result {
    write!(xml, "      <{element} Name=\"{}\"", escape_xml(ty.name()))?;
    if let Some(base) = ty.base_type() {
        write!(xml, " BaseType=\"{}\"", qualified(model, base))?;
    }
    if ty.is_abstract() {
        xml.push_str(" Abstract=\"true\"");
    }
    xml.push_str(">\n");
    // Derived types inherit the key from their base.
    if ty.base_type().is_none() && !ty.key().is_empty() {
        xml.push_str("        <Key>\n");
        for name in ty.key() {
            writeln!(xml, "          <PropertyRef Name=\"{}\"/>", escape_xml(name))?;
        }
        xml.push_str("        </Key>\n");
    }
    for prop in ty.declared_properties() {
        write_property(xml, model, prop)?;
    }
    writeln!(xml, "      </{element}>")
}

fn write_property(xml: &mut String, model: &EdmModel, prop: &Property) -> fmt::Result {
    let element = match prop.edm_type() {
        EdmType::Entity(_) => "NavigationProperty",
        _ => "Property",
    };
    write!(
        xml,
        "        <{element} Name=\"{}\" Type=\"{}\"",
        escape_xml(prop.name()),
        type_name(model, prop.edm_type())
    )?;
    if !prop.is_nullable() {
        xml.push_str(" Nullable=\"false\"");
    }
    if prop.slot().is_none() {
        xml.push_str(">\n");
        xml.push_str(
            "          <Annotation Term=\"Org.OData.Core.V1.Computed\" Bool=\"true\"/>\n",
        );
        return writeln!(xml, "        </{element}>");
    }
    xml.push_str("/>\n");
    Ok(())
}

fn write_entity_set(xml: &mut String, model: &EdmModel, set: &EntitySet) -> fmt::Result {
    writeln!(
        xml,
        "        <EntitySet Name=\"{}\" EntityType=\"{}\">",
        escape_xml(set.name()),
        qualified(model, set.entity_type())
    )?;
    let Capabilities {
        filterable,
        sortable,
        top_supported,
        skip_supported,
        countable,
    } = set.capabilities();
    writeln!(
        xml,
        "          <Annotation Term=\"{CAPABILITIES}.TopSupported\" Bool=\"{top_supported}\"/>"
    )?;
    writeln!(
        xml,
        "          <Annotation Term=\"{CAPABILITIES}.SkipSupported\" Bool=\"{skip_supported}\"/>"
    )?;
    write_restriction(xml, "FilterRestrictions", "Filterable", filterable)?;
    write_restriction(xml, "SortRestrictions", "Sortable", sortable)?;
    write_restriction(xml, "CountRestrictions", "Countable", countable)?;
    xml.push_str("        </EntitySet>\n");
    Ok(())
}

fn write_restriction(xml: &mut String, term: &str, property: &str, value: bool) -> fmt::Result {
    writeln!(xml, "          <Annotation Term=\"{CAPABILITIES}.{term}\">")?;
    writeln!(
        xml,
        "            <Record><PropertyValue Property=\"{property}\" Bool=\"{value}\"/></Record>"
    )?;
    xml.push_str("          </Annotation>\n");
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::edm::{EdmModelBuilder, FieldKind, TypeDef};
    use crate::value::{Entity, Value};

    fn model() -> EdmModel {
        EdmModelBuilder::new("Shop")
            .enum_type(
                EnumType::new("Color")
                    .flags()
                    .member("Red", 1)
                    .member("Blue", 2),
            )
            .complex_type(TypeDef::complex("Dims").property("Width", FieldKind::F64))
            .entity_type(
                TypeDef::entity("Base")
                    .abstract_type()
                    .key("Id")
                    .required("Id", FieldKind::I64),
            )
            .entity_type(
                TypeDef::entity("Item")
                    .base("Base")
                    .property("Name", FieldKind::String)
                    .property("Color", "Color")
                    .property("Dims", "Dims")
                    .property("Related", "Item")
                    .computed("Label", FieldKind::String, |e: &Entity| {
                        Ok(Value::from(format!("#{}", e.get("Id")?.as_i64().unwrap_or(0))))
                    }),
            )
            .entity_set_with(
                "Items",
                "Item",
                Capabilities {
                    countable: false,
                    ..Capabilities::default()
                },
            )
            .build()
            .unwrap()
    }

    #[test]
    fn writes_types_and_container() {
        let xml = metadata_document(&model()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Schema Namespace=\"Shop\""));
        assert!(xml.contains("<EnumType Name=\"Color\" IsFlags=\"true\">"));
        assert!(xml.contains("<Member Name=\"Blue\" Value=\"2\"/>"));
        assert!(xml.contains("<ComplexType Name=\"Dims\">"));
        assert!(xml.contains("<EntityType Name=\"Base\" Abstract=\"true\">"));
        assert!(xml.contains("<PropertyRef Name=\"Id\"/>"));
        assert!(xml.contains("<Property Name=\"Id\" Type=\"Edm.Int64\" Nullable=\"false\"/>"));
        assert!(xml.contains("<EntityType Name=\"Item\" BaseType=\"Shop.Base\">"));
        assert!(xml.contains("<Property Name=\"Color\" Type=\"Shop.Color\"/>"));
        assert!(xml.contains("<Property Name=\"Dims\" Type=\"Shop.Dims\"/>"));
        assert!(xml.contains("<NavigationProperty Name=\"Related\" Type=\"Shop.Item\"/>"));
        assert!(xml.contains("Org.OData.Core.V1.Computed"));
        assert!(xml.contains("<EntitySet Name=\"Items\" EntityType=\"Shop.Item\">"));
        assert!(xml.contains("<PropertyValue Property=\"Countable\" Bool=\"false\"/>"));
        assert!(xml.contains("<PropertyValue Property=\"Filterable\" Bool=\"true\"/>"));
    }

    #[test]
    fn inherited_properties_are_not_repeated() {
        let xml = metadata_document(&model()).unwrap();
        assert_eq!(xml.matches("<Property Name=\"Id\"").count(), 1);
        assert_eq!(xml.matches("<Key>").count(), 1);
    }

    #[test]
    fn escapes_names() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }
}
