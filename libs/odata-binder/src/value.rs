//! Runtime values and entity instances.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use uuid::Uuid;

use crate::Error;
use crate::edm::{EdmType, FieldKind, StructuredType};

/// A property or expression value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Decimal(BigDecimal),
    String(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Underlying value of an enum member (or a combination of flags).
    Enum(i64),
    /// Related entity or complex value reached through a navigable property.
    Structured(Arc<Entity>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Uuid(_) => "uuid",
            Value::DateTime(_) => "datetime",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Enum(_) => "enum",
            Value::Structured(_) => "structured",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&Arc<Entity>> {
        match self {
            Value::Structured(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::I64(_) | Value::F64(_) | Value::Decimal(_))
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn to_f64(&self) -> Option<f64> {
        match self {
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Whether this value may be stored in a property of type `ty`.
    #[must_use]
    pub fn conforms_to(&self, ty: &EdmType) -> bool {
        match (ty, self) {
            (_, Value::Null) => true,
            (EdmType::Primitive(kind), value) => matches!(
                (kind, value),
                (FieldKind::String, Value::String(_))
                    | (FieldKind::I64, Value::I64(_))
                    | (FieldKind::F64, Value::F64(_))
                    | (FieldKind::Bool, Value::Bool(_))
                    | (FieldKind::Uuid, Value::Uuid(_))
                    | (FieldKind::DateTimeUtc, Value::DateTime(_))
                    | (FieldKind::Date, Value::Date(_))
                    | (FieldKind::Time, Value::Time(_))
                    | (FieldKind::Decimal, Value::Decimal(_))
            ),
            (EdmType::Enum(_), Value::Enum(_)) => true,
            (EdmType::Complex(name) | EdmType::Entity(name), Value::Structured(e)) => {
                e.entity_type().is_assignable_to(name)
            }
            _ => false,
        }
    }

    /// Ordering used by comparison operators.
    ///
    /// `None` when either side is null or the two values are not comparable.
    /// Numeric values compare across `I64`, `F64` and `Decimal`.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Enum(a), Value::Enum(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => numeric_cmp(a, b),
            _ => None,
        }
    }

    /// Equality used by `eq`, `ne` and `in`: null equals null, numerics compare
    /// by value, structured values by identity or content.
    #[must_use]
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Structured(a), Value::Structured(b)) => Arc::ptr_eq(a, b) || a == b,
            (a, b) => a.compare(b) == Some(Ordering::Equal),
        }
    }

    /// Total order used for sorting: null first, then by natural order.
    /// Incomparable kinds fall back to a fixed per-kind rank.
    #[must_use]
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::F64(a), Value::F64(b)) => a.total_cmp(b),
            (a, b) => a
                .compare(b)
                .unwrap_or_else(|| a.rank().cmp(&b.rank())),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::I64(_) | Value::F64(_) | Value::Decimal(_) => 2,
            Value::Enum(_) => 3,
            Value::String(_) => 4,
            Value::Uuid(_) => 5,
            Value::Date(_) => 6,
            Value::Time(_) => 7,
            Value::DateTime(_) => 8,
            Value::Structured(_) => 9,
        }
    }
}

fn numeric_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::I64(x), Value::I64(y)) => Some(x.cmp(y)),
        (Value::Decimal(x), Value::Decimal(y)) => Some(x.cmp(y)),
        (Value::I64(x), Value::Decimal(y)) => Some(BigDecimal::from(*x).cmp(y)),
        (Value::Decimal(x), Value::I64(y)) => Some(x.cmp(&BigDecimal::from(*y))),
        _ => a.to_f64()?.partial_cmp(&b.to_f64()?),
    }
}

impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I64(a), Value::I64(b)) | (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Structured(a), Value::Structured(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::I64(v) => write!(f, "I64({v})"),
            Value::F64(v) => write!(f, "F64({v})"),
            Value::Decimal(v) => write!(f, "Decimal({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Uuid(v) => write!(f, "Uuid({v})"),
            Value::DateTime(v) => write!(f, "DateTime({})", v.to_rfc3339()),
            Value::Date(v) => write!(f, "Date({v})"),
            Value::Time(v) => write!(f, "Time({v})"),
            Value::Enum(v) => write!(f, "Enum({v})"),
            Value::Structured(e) => fmt::Debug::fmt(e, f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::I64(v) | Value::Enum(v) => serializer.serialize_i64(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::Decimal(v) => serializer.collect_str(v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Uuid(v) => serializer.collect_str(v),
            Value::DateTime(v) => serializer.serialize_str(&v.to_rfc3339()),
            Value::Date(v) => serializer.collect_str(v),
            Value::Time(v) => serializer.collect_str(v),
            Value::Structured(e) => e.serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<BigDecimal> for Value {
    fn from(v: BigDecimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<Entity> for Value {
    fn from(v: Entity) -> Self {
        Value::Structured(Arc::new(v))
    }
}

impl From<Arc<Entity>> for Value {
    fn from(v: Arc<Entity>) -> Self {
        Value::Structured(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Instance of an entity or complex type.
///
/// Stored properties live in slots, base-most type first; see [`crate::edm`].
#[derive(Clone)]
pub struct Entity {
    ty: Arc<StructuredType>,
    slots: Vec<Value>,
}

impl Entity {
    #[must_use]
    pub fn entity_type(&self) -> &Arc<StructuredType> {
        &self.ty
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&Value> {
        self.slots.get(index)
    }

    /// Read a property by name.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the type has no such property, or the
    /// accessor's error.
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        self.ty
            .property(name)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "property '{name}' not found on type '{}'",
                    self.ty.name()
                ))
            })?
            .read(self)
    }

    fn stored(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.ty
            .properties()
            .iter()
            .filter_map(|p| Some((p.name(), self.slots.get(p.slot()?)?)))
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.ty.name() == other.ty.name() && self.slots == other.slots
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.ty.name());
        for prop in self.ty.properties() {
            if let Some(value) = prop.slot().and_then(|slot| self.slots.get(slot)) {
                s.field(prop.name(), value);
            }
        }
        s.finish()
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, value) in self.stored() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Builds an [`Entity`] by property name.
#[must_use]
pub struct EntityBuilder {
    ty: Arc<StructuredType>,
    values: Vec<(String, Value)>,
}

impl EntityBuilder {
    pub(crate) fn new(ty: Arc<StructuredType>) -> Self {
        Self {
            ty,
            values: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    /// # Errors
    /// - `Error::InvalidArgument` for abstract types, unknown or computed
    ///   properties, and required properties left unset.
    /// - `Error::TypeMismatch` when a value does not conform to its property type.
    pub fn build(self) -> Result<Entity, Error> {
        if self.ty.is_abstract() {
            return Err(Error::InvalidArgument(format!(
                "cannot instantiate abstract type '{}'",
                self.ty.name()
            )));
        }
        let mut slots = vec![Value::Null; self.ty.slot_count()];
        for (name, value) in self.values {
            let prop = self.ty.property(&name).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "property '{name}' not found on type '{}'",
                    self.ty.name()
                ))
            })?;
            let slot = prop.slot().ok_or_else(|| {
                Error::InvalidArgument(format!("computed property '{name}' cannot be assigned"))
            })?;
            if !value.conforms_to(prop.edm_type()) {
                return Err(Error::TypeMismatch {
                    expected: prop.edm_type().to_string(),
                    actual: value.kind_name().to_owned(),
                });
            }
            if let Some(target) = slots.get_mut(slot) {
                *target = value;
            }
        }
        for prop in self.ty.properties() {
            let unset = prop
                .slot()
                .and_then(|slot| slots.get(slot))
                .is_some_and(Value::is_null);
            if !prop.is_nullable() && unset {
                return Err(Error::InvalidArgument(format!(
                    "required property '{}' of '{}' is not set",
                    prop.name(),
                    self.ty.name()
                )));
            }
        }
        Ok(Entity {
            ty: self.ty,
            slots,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::edm::{EdmModelBuilder, TypeDef};
    use std::str::FromStr;

    #[test]
    fn numeric_values_compare_across_kinds() {
        let dec = Value::Decimal(BigDecimal::from_str("2.5").unwrap());
        assert_eq!(Value::I64(2).compare(&dec), Some(Ordering::Less));
        assert_eq!(Value::F64(2.5).compare(&dec), Some(Ordering::Equal));
        assert!(Value::I64(3).equals(&Value::F64(3.0)));
        assert_eq!(Value::I64(1).compare(&Value::from("1")), None);
    }

    #[test]
    fn null_compares_to_nothing_but_equals_null() {
        assert_eq!(Value::Null.compare(&Value::I64(1)), None);
        assert!(Value::Null.equals(&Value::Null));
        assert!(!Value::Null.equals(&Value::I64(0)));
    }

    #[test]
    fn sort_order_puts_null_first() {
        let mut values = vec![Value::I64(3), Value::Null, Value::F64(1.5), Value::I64(2)];
        values.sort_by(Value::sort_cmp);
        assert_eq!(
            values,
            vec![Value::Null, Value::F64(1.5), Value::I64(2), Value::I64(3)]
        );
    }

    #[test]
    fn builder_validates_names_types_and_required_slots() {
        let model = EdmModelBuilder::new("T")
            .entity_type(
                TypeDef::entity("Thing")
                    .key("Id")
                    .required("Id", FieldKind::I64)
                    .property("Label", FieldKind::String),
            )
            .build()
            .unwrap();
        let thing = model.entity_type("Thing").unwrap();

        let ok = thing.new_entity().with("Id", 1).with("Label", "a").build().unwrap();
        assert_eq!(ok.get("Label").unwrap(), Value::from("a"));

        let missing = thing.new_entity().with("Label", "a").build().unwrap_err();
        assert!(matches!(missing, Error::InvalidArgument(_)));

        let unknown = thing.new_entity().with("Id", 1).with("Nope", 1).build().unwrap_err();
        assert!(matches!(unknown, Error::InvalidArgument(_)));

        let wrong = thing.new_entity().with("Id", "one").build().unwrap_err();
        assert_eq!(
            wrong,
            Error::TypeMismatch {
                expected: "Edm.Int64".to_owned(),
                actual: "string".to_owned()
            }
        );
    }

    #[test]
    fn entity_serializes_stored_properties_in_order() {
        let model = EdmModelBuilder::new("T")
            .entity_type(
                TypeDef::entity("Thing")
                    .property("B", FieldKind::Bool)
                    .property("A", FieldKind::Decimal),
            )
            .build()
            .unwrap();
        let thing = model
            .new_entity("Thing")
            .unwrap()
            .with("B", true)
            .with("A", BigDecimal::from_str("1.50").unwrap())
            .build()
            .unwrap();
        let json = serde_json::to_string(&Value::from(thing)).unwrap();
        assert_eq!(json, r#"{"B":true,"A":"1.50"}"#);
    }
}
