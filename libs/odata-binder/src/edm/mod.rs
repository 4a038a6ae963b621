//! Entity Data Model consumed by the binder.
//!
//! The model is built once through [`EdmModelBuilder`] and is immutable afterwards.
//! Every structured type carries a precomputed name → [`Property`] table, and every
//! property carries its accessor, so binding never performs per-entity name lookups.
//!
//! Stored properties are laid out as slots, base-most type first. An accessor built for
//! a base type therefore reads the same slot on instances of any derived type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::Error;
use crate::value::{Entity, EntityBuilder, Value};

mod builder;

pub use builder::{EdmModelBuilder, TypeDef, TypeRef};

/// Reads one property value from an entity.
pub type Accessor = Arc<dyn Fn(&Entity) -> Result<Value, Error> + Send + Sync>;

/// Logical primitive types supported by the binder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    Uuid,
    DateTimeUtc,
    Date,
    Time,
    Decimal,
}

impl FieldKind {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::I64 | FieldKind::F64 | FieldKind::Decimal)
    }

    /// CSDL primitive type name, e.g. `Edm.Int64`.
    #[must_use]
    pub fn edm_name(self) -> &'static str {
        match self {
            FieldKind::String => "Edm.String",
            FieldKind::I64 => "Edm.Int64",
            FieldKind::F64 => "Edm.Double",
            FieldKind::Bool => "Edm.Boolean",
            FieldKind::Uuid => "Edm.Guid",
            FieldKind::DateTimeUtc => "Edm.DateTimeOffset",
            FieldKind::Date => "Edm.Date",
            FieldKind::Time => "Edm.TimeOfDay",
            FieldKind::Decimal => "Edm.Decimal",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => write!(f, "String"),
            FieldKind::I64 => write!(f, "I64"),
            FieldKind::F64 => write!(f, "F64"),
            FieldKind::Bool => write!(f, "Bool"),
            FieldKind::Uuid => write!(f, "Uuid"),
            FieldKind::DateTimeUtc => write!(f, "DateTimeUtc"),
            FieldKind::Date => write!(f, "Date"),
            FieldKind::Time => write!(f, "Time"),
            FieldKind::Decimal => write!(f, "Decimal"),
        }
    }
}

/// Declared type of a property or expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EdmType {
    Primitive(FieldKind),
    Enum(String),
    Complex(String),
    Entity(String),
}

impl EdmType {
    pub const BOOL: EdmType = EdmType::Primitive(FieldKind::Bool);
    pub const STRING: EdmType = EdmType::Primitive(FieldKind::String);
    pub const I64: EdmType = EdmType::Primitive(FieldKind::I64);

    /// Complex and entity typed properties are navigable.
    #[must_use]
    pub fn is_navigable(&self) -> bool {
        matches!(self, EdmType::Complex(_) | EdmType::Entity(_))
    }

    #[must_use]
    pub fn primitive(&self) -> Option<FieldKind> {
        match self {
            EdmType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.primitive().is_some_and(FieldKind::is_numeric)
    }

    /// Name of the complex or entity type this type refers to.
    #[must_use]
    pub fn structured_name(&self) -> Option<&str> {
        match self {
            EdmType::Complex(name) | EdmType::Entity(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdmType::Primitive(kind) => f.write_str(kind.edm_name()),
            EdmType::Enum(name) | EdmType::Complex(name) | EdmType::Entity(name) => {
                f.write_str(name)
            }
        }
    }
}

impl From<FieldKind> for EdmType {
    fn from(kind: FieldKind) -> Self {
        EdmType::Primitive(kind)
    }
}

/// Property descriptor: one segment of a property path.
pub struct Property {
    name: String,
    edm_type: EdmType,
    nullable: bool,
    declaring_type: String,
    slot: Option<usize>,
    accessor: Accessor,
}

impl Property {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn edm_type(&self) -> &EdmType {
        &self.edm_type
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn is_navigable(&self) -> bool {
        self.edm_type.is_navigable()
    }

    /// Name of the structured type that declares this property.
    #[must_use]
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Storage slot, `None` for computed properties.
    #[must_use]
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Read this property from `entity` through the precomputed accessor.
    ///
    /// # Errors
    /// Returns `Error::Evaluation` if the accessor cannot produce a value for `entity`.
    pub fn read(&self, entity: &Entity) -> Result<Value, Error> {
        (self.accessor)(entity)
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("edm_type", &self.edm_type)
            .field("nullable", &self.nullable)
            .field("declaring_type", &self.declaring_type)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructuredKind {
    Entity,
    Complex,
}

/// Entity or complex type with its full (inherited + declared) property table.
pub struct StructuredType {
    name: String,
    kind: StructuredKind,
    base_type: Option<String>,
    is_abstract: bool,
    key: Vec<String>,
    ancestors: Vec<String>,
    properties: Vec<Arc<Property>>,
    declared_from: usize,
    by_name: HashMap<String, usize>,
    slot_count: usize,
}

impl StructuredType {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> StructuredKind {
        self.kind
    }

    #[must_use]
    pub fn base_type(&self) -> Option<&str> {
        self.base_type.as_deref()
    }

    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Key property names (inherited from the base type when not declared).
    #[must_use]
    pub fn key(&self) -> &[String] {
        &self.key
    }

    /// Base type chain, nearest base first.
    #[must_use]
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// All properties, inherited ones first, in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[Arc<Property>] {
        &self.properties
    }

    /// Properties declared on this type itself.
    #[must_use]
    pub fn declared_properties(&self) -> &[Arc<Property>] {
        &self.properties[self.declared_from..]
    }

    /// Non-navigable properties, inherited ones first.
    pub fn structural_properties(&self) -> impl Iterator<Item = &Arc<Property>> + '_ {
        self.properties.iter().filter(|p| !p.is_navigable())
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Arc<Property>> {
        self.by_name.get(name).map(|&idx| &self.properties[idx])
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// True if this type is `type_name` or derives from it.
    #[must_use]
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.name == type_name || self.ancestors.iter().any(|a| a == type_name)
    }

    /// Start building an instance of this type.
    #[must_use]
    pub fn new_entity(self: &Arc<Self>) -> EntityBuilder {
        EntityBuilder::new(Arc::clone(self))
    }
}

impl fmt::Debug for StructuredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base_type", &self.base_type)
            .field(
                "properties",
                &self.properties.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Enumeration type; flags enums combine member values bitwise.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct EnumType {
    name: String,
    is_flags: bool,
    members: Vec<(String, i64)>,
}

impl EnumType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_flags: false,
            members: Vec::new(),
        }
    }

    pub fn flags(mut self) -> Self {
        self.is_flags = true;
        self
    }

    pub fn member(mut self, name: impl Into<String>, value: i64) -> Self {
        self.members.push((name.into(), value));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_flags(&self) -> bool {
        self.is_flags
    }

    #[must_use]
    pub fn members(&self) -> &[(String, i64)] {
        &self.members
    }

    #[must_use]
    pub fn value_of(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, value)| *value)
    }

    /// Parse `Red` or, for flags types, `Red,Blue` into the underlying value.
    #[must_use]
    pub fn parse(&self, text: &str) -> Option<i64> {
        if !self.is_flags {
            return self.value_of(text.trim());
        }
        text.split(',')
            .map(str::trim)
            .try_fold(0_i64, |acc, name| self.value_of(name).map(|v| acc | v))
    }

    /// Whether `bits` is a valid value of this type.
    #[must_use]
    pub fn accepts(&self, bits: i64) -> bool {
        if self.is_flags {
            let all = self.members.iter().fold(0_i64, |acc, (_, v)| acc | v);
            bits & !all == 0
        } else {
            self.members.iter().any(|(_, v)| *v == bits)
        }
    }
}

/// `Org.OData.Capabilities.V1` annotations published for an entity set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    pub filterable: bool,
    pub sortable: bool,
    pub top_supported: bool,
    pub skip_supported: bool,
    pub countable: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            filterable: true,
            sortable: true,
            top_supported: true,
            skip_supported: true,
            countable: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySet {
    name: String,
    entity_type: String,
    capabilities: Capabilities,
}

impl EntitySet {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

/// Immutable EDM: types, enums and the entity container.
pub struct EdmModel {
    namespace: String,
    container: String,
    entity_types: IndexMap<String, Arc<StructuredType>>,
    complex_types: IndexMap<String, Arc<StructuredType>>,
    enum_types: IndexMap<String, Arc<EnumType>>,
    entity_sets: IndexMap<String, EntitySet>,
}

impl EdmModel {
    pub fn builder(namespace: impl Into<String>) -> EdmModelBuilder {
        EdmModelBuilder::new(namespace)
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn container_name(&self) -> &str {
        &self.container
    }

    #[must_use]
    pub fn entity_type(&self, name: &str) -> Option<&Arc<StructuredType>> {
        self.entity_types.get(name)
    }

    #[must_use]
    pub fn complex_type(&self, name: &str) -> Option<&Arc<StructuredType>> {
        self.complex_types.get(name)
    }

    /// Entity or complex type by name.
    #[must_use]
    pub fn structured_type(&self, name: &str) -> Option<&Arc<StructuredType>> {
        self.entity_type(name).or_else(|| self.complex_type(name))
    }

    #[must_use]
    pub fn enum_type(&self, name: &str) -> Option<&Arc<EnumType>> {
        self.enum_types.get(name)
    }

    #[must_use]
    pub fn entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.get(name)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &Arc<StructuredType>> + '_ {
        self.entity_types.values()
    }

    pub fn complex_types(&self) -> impl Iterator<Item = &Arc<StructuredType>> + '_ {
        self.complex_types.values()
    }

    pub fn enum_types(&self) -> impl Iterator<Item = &Arc<EnumType>> + '_ {
        self.enum_types.values()
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &EntitySet> + '_ {
        self.entity_sets.values()
    }

    /// Start building an instance of the named entity or complex type.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the type is unknown.
    pub fn new_entity(&self, type_name: &str) -> Result<EntityBuilder, Error> {
        self.structured_type(type_name)
            .map(StructuredType::new_entity)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown type '{type_name}'")))
    }
}

impl fmt::Debug for EdmModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdmModel")
            .field("namespace", &self.namespace)
            .field("container", &self.container)
            .field("entity_types", &self.entity_types.keys().collect::<Vec<_>>())
            .field("complex_types", &self.complex_types.keys().collect::<Vec<_>>())
            .field("enum_types", &self.enum_types.keys().collect::<Vec<_>>())
            .field("entity_sets", &self.entity_sets.keys().collect::<Vec<_>>())
            .finish()
    }
}
