//! Fluent construction and validation of an [`EdmModel`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;

use super::{
    Accessor, Capabilities, EdmModel, EdmType, EntitySet, EnumType, FieldKind, Property,
    StructuredKind, StructuredType,
};
use crate::Error;
use crate::value::{Entity, Value};

/// Property type as written in a [`TypeDef`]: a primitive kind or a type name
/// resolved when the model is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRef {
    Primitive(FieldKind),
    Named(String),
}

impl From<FieldKind> for TypeRef {
    fn from(kind: FieldKind) -> Self {
        TypeRef::Primitive(kind)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Named(name.to_owned())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Named(name)
    }
}

struct PropertyDef {
    name: String,
    ty: TypeRef,
    nullable: bool,
    computed: Option<Accessor>,
}

/// Definition of an entity or complex type.
#[must_use]
pub struct TypeDef {
    name: String,
    kind: StructuredKind,
    base: Option<String>,
    is_abstract: bool,
    key: Vec<String>,
    properties: Vec<PropertyDef>,
}

impl TypeDef {
    pub fn entity(name: impl Into<String>) -> Self {
        Self::new(name.into(), StructuredKind::Entity)
    }

    pub fn complex(name: impl Into<String>) -> Self {
        Self::new(name.into(), StructuredKind::Complex)
    }

    fn new(name: String, kind: StructuredKind) -> Self {
        Self {
            name,
            kind,
            base: None,
            is_abstract: false,
            key: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Add a key property name. The property itself is declared separately.
    pub fn key(mut self, name: impl Into<String>) -> Self {
        self.key.push(name.into());
        self
    }

    /// Nullable stored property.
    pub fn property(self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.push(name.into(), ty.into(), true, None)
    }

    /// Non-nullable stored property.
    pub fn required(self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.push(name.into(), ty.into(), false, None)
    }

    /// Property computed from the entity instead of read from a slot.
    pub fn computed<F>(self, name: impl Into<String>, ty: impl Into<TypeRef>, f: F) -> Self
    where
        F: Fn(&Entity) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.push(name.into(), ty.into(), true, Some(Arc::new(f)))
    }

    fn push(
        mut self,
        name: String,
        ty: TypeRef,
        nullable: bool,
        computed: Option<Accessor>,
    ) -> Self {
        self.properties.push(PropertyDef {
            name,
            ty,
            nullable,
            computed,
        });
        self
    }
}

/// Collects types, enums and entity sets, then validates them in [`build`](Self::build).
#[must_use]
pub struct EdmModelBuilder {
    namespace: String,
    container: String,
    enums: Vec<EnumType>,
    types: Vec<TypeDef>,
    sets: Vec<(String, String, Capabilities)>,
}

impl EdmModelBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            container: "Container".to_owned(),
            enums: Vec::new(),
            types: Vec::new(),
            sets: Vec::new(),
        }
    }

    pub fn container(mut self, name: impl Into<String>) -> Self {
        self.container = name.into();
        self
    }

    pub fn enum_type(mut self, def: EnumType) -> Self {
        self.enums.push(def);
        self
    }

    pub fn complex_type(self, def: TypeDef) -> Self {
        self.structured_type(TypeDef {
            kind: StructuredKind::Complex,
            ..def
        })
    }

    pub fn entity_type(self, def: TypeDef) -> Self {
        self.structured_type(TypeDef {
            kind: StructuredKind::Entity,
            ..def
        })
    }

    fn structured_type(mut self, def: TypeDef) -> Self {
        self.types.push(def);
        self
    }

    pub fn entity_set(self, name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        self.entity_set_with(name, entity_type, Capabilities::default())
    }

    pub fn entity_set_with(
        mut self,
        name: impl Into<String>,
        entity_type: impl Into<String>,
        capabilities: Capabilities,
    ) -> Self {
        self.sets
            .push((name.into(), entity_type.into(), capabilities));
        self
    }

    /// Validate all definitions and precompute per-type property tables.
    ///
    /// # Errors
    /// Returns `Error::InvalidModel` on duplicate names, unknown or mismatched
    /// base types, inheritance cycles, unknown property types, key properties
    /// that are missing or navigable, and entity sets over non-entity types.
    pub fn build(self) -> Result<EdmModel, Error> {
        let mut names = HashSet::new();
        for name in self
            .enums
            .iter()
            .map(EnumType::name)
            .chain(self.types.iter().map(|t| t.name.as_str()))
        {
            if !names.insert(name) {
                return Err(Error::InvalidModel(format!("duplicate type name '{name}'")));
            }
        }

        let enums: HashMap<&str, &EnumType> =
            self.enums.iter().map(|e| (e.name(), e)).collect();
        let defs: HashMap<&str, &TypeDef> =
            self.types.iter().map(|t| (t.name.as_str(), t)).collect();

        let mut resolver = Resolver {
            enums: &enums,
            defs: &defs,
            done: HashMap::new(),
            visiting: Vec::new(),
        };
        for def in &self.types {
            resolver.resolve(&def.name)?;
        }

        let mut entity_types = IndexMap::new();
        let mut complex_types = IndexMap::new();
        for def in &self.types {
            let Some(resolved) = resolver.done.remove(def.name.as_str()) else {
                continue;
            };
            match def.kind {
                StructuredKind::Entity => entity_types.insert(def.name.clone(), resolved),
                StructuredKind::Complex => complex_types.insert(def.name.clone(), resolved),
            };
        }

        let mut entity_sets = IndexMap::new();
        for (name, entity_type, capabilities) in self.sets {
            if !entity_types.contains_key(&entity_type) {
                return Err(Error::InvalidModel(format!(
                    "entity set '{name}' refers to unknown entity type '{entity_type}'"
                )));
            }
            if entity_sets.contains_key(&name) {
                return Err(Error::InvalidModel(format!("duplicate entity set '{name}'")));
            }
            entity_sets.insert(
                name.clone(),
                EntitySet {
                    name,
                    entity_type,
                    capabilities,
                },
            );
        }

        Ok(EdmModel {
            namespace: self.namespace,
            container: self.container,
            entity_types,
            complex_types,
            enum_types: self
                .enums
                .into_iter()
                .map(|e| (e.name().to_owned(), Arc::new(e)))
                .collect(),
            entity_sets,
        })
    }
}

struct Resolver<'a> {
    enums: &'a HashMap<&'a str, &'a EnumType>,
    defs: &'a HashMap<&'a str, &'a TypeDef>,
    done: HashMap<String, Arc<StructuredType>>,
    visiting: Vec<String>,
}

impl Resolver<'_> {
    fn resolve(&mut self, name: &str) -> Result<Arc<StructuredType>, Error> {
        if let Some(resolved) = self.done.get(name) {
            return Ok(Arc::clone(resolved));
        }
        if self.visiting.iter().any(|v| v == name) {
            return Err(Error::InvalidModel(format!(
                "inheritance cycle through '{name}'"
            )));
        }
        let def = *self
            .defs
            .get(name)
            .ok_or_else(|| Error::InvalidModel(format!("unknown structured type '{name}'")))?;

        self.visiting.push(name.to_owned());
        let base = match &def.base {
            Some(base_name) => {
                let base = self.resolve(base_name)?;
                if base.kind() != def.kind {
                    return Err(Error::InvalidModel(format!(
                        "type '{name}' and its base '{base_name}' are of different kinds"
                    )));
                }
                Some(base)
            }
            None => None,
        };
        self.visiting.pop();

        let resolved = Arc::new(self.build_type(def, base.as_deref())?);
        self.done.insert(name.to_owned(), Arc::clone(&resolved));
        Ok(resolved)
    }

    fn build_type(
        &self,
        def: &TypeDef,
        base: Option<&StructuredType>,
    ) -> Result<StructuredType, Error> {
        let mut properties: Vec<Arc<Property>> =
            base.map(|b| b.properties.clone()).unwrap_or_default();
        let mut by_name: HashMap<String, usize> =
            base.map(|b| b.by_name.clone()).unwrap_or_default();
        let mut slot_count = base.map_or(0, StructuredType::slot_count);
        let declared_from = properties.len();

        for prop in &def.properties {
            if by_name.contains_key(&prop.name) {
                return Err(Error::InvalidModel(format!(
                    "property '{}' is declared more than once on '{}'",
                    prop.name, def.name
                )));
            }
            let edm_type = self.resolve_ref(&prop.ty)?;
            let (slot, accessor) = match &prop.computed {
                Some(accessor) => (None, Arc::clone(accessor)),
                None => {
                    let slot = slot_count;
                    slot_count += 1;
                    (Some(slot), slot_accessor(slot, def.name.clone()))
                }
            };
            by_name.insert(prop.name.clone(), properties.len());
            properties.push(Arc::new(Property {
                name: prop.name.clone(),
                edm_type,
                nullable: prop.nullable,
                declaring_type: def.name.clone(),
                slot,
                accessor,
            }));
        }

        let key = if def.key.is_empty() {
            base.map(|b| b.key.clone()).unwrap_or_default()
        } else {
            def.key.clone()
        };
        for key_name in &key {
            let idx = by_name.get(key_name).ok_or_else(|| {
                Error::InvalidModel(format!(
                    "key property '{key_name}' is not declared on '{}'",
                    def.name
                ))
            })?;
            if properties[*idx].is_navigable() {
                return Err(Error::InvalidModel(format!(
                    "key property '{key_name}' of '{}' must be primitive",
                    def.name
                )));
            }
        }

        let ancestors = base
            .map(|b| {
                std::iter::once(b.name.clone())
                    .chain(b.ancestors.iter().cloned())
                    .collect()
            })
            .unwrap_or_default();

        Ok(StructuredType {
            name: def.name.clone(),
            kind: def.kind,
            base_type: def.base.clone(),
            is_abstract: def.is_abstract,
            key,
            ancestors,
            properties,
            declared_from,
            by_name,
            slot_count,
        })
    }

    fn resolve_ref(&self, ty: &TypeRef) -> Result<EdmType, Error> {
        match ty {
            TypeRef::Primitive(kind) => Ok(EdmType::Primitive(*kind)),
            TypeRef::Named(name) => {
                if self.enums.contains_key(name.as_str()) {
                    return Ok(EdmType::Enum(name.clone()));
                }
                match self.defs.get(name.as_str()).map(|d| d.kind) {
                    Some(StructuredKind::Entity) => Ok(EdmType::Entity(name.clone())),
                    Some(StructuredKind::Complex) => Ok(EdmType::Complex(name.clone())),
                    None => Err(Error::InvalidModel(format!("unknown type '{name}'"))),
                }
            }
        }
    }
}

fn slot_accessor(slot: usize, declaring_type: String) -> Accessor {
    Arc::new(move |entity: &Entity| {
        let ty = entity.entity_type();
        if ty.name() != declaring_type && !ty.is_assignable_to(&declaring_type) {
            return Err(Error::Evaluation(format!(
                "entity of type '{}' has no properties of '{declaring_type}'",
                ty.name()
            )));
        }
        entity.slot(slot).cloned().ok_or_else(|| {
            Error::Evaluation(format!("entity of type '{}' is missing slot {slot}", ty.name()))
        })
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn base_builder() -> EdmModelBuilder {
        EdmModelBuilder::new("Shop")
            .entity_type(
                TypeDef::entity("Item")
                    .abstract_type()
                    .key("Id")
                    .required("Id", FieldKind::I64)
                    .property("Title", FieldKind::String),
            )
            .entity_type(
                TypeDef::entity("Book")
                    .base("Item")
                    .property("Pages", FieldKind::I64),
            )
    }

    #[test]
    fn derived_types_inherit_properties_and_key() {
        let model = base_builder().entity_set("Books", "Book").build().unwrap();
        let book = model.entity_type("Book").unwrap();

        let names: Vec<_> = book.properties().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["Id", "Title", "Pages"]);
        assert_eq!(book.declared_properties().len(), 1);
        assert_eq!(book.key(), ["Id".to_owned()]);
        assert_eq!(book.ancestors(), ["Item".to_owned()]);
        assert!(book.is_assignable_to("Item"));
        assert_eq!(book.property("Pages").and_then(|p| p.slot()), Some(2));
        assert_eq!(book.property("Id").unwrap().declaring_type(), "Item");
    }

    #[test]
    fn inheritance_cycle_is_rejected() {
        let err = EdmModelBuilder::new("X")
            .entity_type(TypeDef::entity("A").base("B"))
            .entity_type(TypeDef::entity("B").base("A"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidModel(ref m) if m.contains("cycle")));
    }

    #[test]
    fn unknown_property_type_is_rejected() {
        let err = EdmModelBuilder::new("X")
            .entity_type(TypeDef::entity("A").property("B", "Missing"))
            .build()
            .unwrap_err();
        assert_eq!(err, Error::InvalidModel("unknown type 'Missing'".to_owned()));
    }

    #[test]
    fn redeclaring_inherited_property_is_rejected() {
        let err = base_builder()
            .entity_type(
                TypeDef::entity("Magazine")
                    .base("Item")
                    .property("Title", FieldKind::String),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidModel(_)));
    }

    #[test]
    fn entity_set_requires_entity_type() {
        let err = EdmModelBuilder::new("X")
            .complex_type(TypeDef::complex("Address").property("City", FieldKind::String))
            .entity_set("Addresses", "Address")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidModel(_)));
    }

    #[test]
    fn named_references_resolve_to_their_kind() {
        let model = EdmModelBuilder::new("X")
            .enum_type(EnumType::new("Tone").member("Warm", 1))
            .complex_type(TypeDef::complex("Address").property("City", FieldKind::String))
            .entity_type(
                TypeDef::entity("Shop")
                    .key("Id")
                    .required("Id", FieldKind::I64)
                    .property("Tone", "Tone")
                    .property("Address", "Address"),
            )
            .build()
            .unwrap();
        let shop = model.entity_type("Shop").unwrap();
        assert_eq!(
            shop.property("Tone").unwrap().edm_type(),
            &EdmType::Enum("Tone".to_owned())
        );
        assert!(shop.property("Address").unwrap().is_navigable());
        let structural: Vec<_> = shop.structural_properties().map(|p| p.name()).collect();
        assert_eq!(structural, ["Id", "Tone"]);
    }
}
