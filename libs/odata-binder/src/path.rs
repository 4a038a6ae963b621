//! Property paths: non-empty chains of property segments.

use std::fmt;
use std::sync::Arc;

use crate::Error;
use crate::edm::{EdmModel, EdmType, Property};
use crate::value::{Entity, Value};

/// Ordered, non-empty chain of [`Property`] segments.
///
/// Every segment except the last is navigable. Paths sharing a prefix share the
/// segment descriptors but are independent values.
#[derive(Clone)]
pub struct PropertyPath {
    segments: Vec<Arc<Property>>,
}

impl PropertyPath {
    /// # Errors
    /// Returns `Error::InvalidArgument` if `segments` is empty or an inner
    /// segment is not navigable.
    pub fn new(segments: Vec<Arc<Property>>) -> Result<Self, Error> {
        if segments.is_empty() {
            return Err(Error::InvalidArgument(
                "property path must have at least one segment".to_owned(),
            ));
        }
        if let Some(inner) = segments[..segments.len() - 1]
            .iter()
            .find(|s| !s.is_navigable())
        {
            return Err(Error::InvalidArgument(format!(
                "segment '{}' is not navigable",
                inner.name()
            )));
        }
        Ok(Self { segments })
    }

    /// Single-segment path.
    #[must_use]
    pub fn single(property: Arc<Property>) -> Self {
        Self {
            segments: vec![property],
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[Arc<Property>] {
        &self.segments
    }

    #[must_use]
    pub fn first(&self) -> &Arc<Property> {
        &self.segments[0]
    }

    #[must_use]
    pub fn leaf(&self) -> &Arc<Property> {
        &self.segments[self.segments.len() - 1]
    }

    /// Number of segments, always at least one.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Declared type of the leaf segment.
    #[must_use]
    pub fn edm_type(&self) -> &EdmType {
        self.leaf().edm_type()
    }

    /// Walk the accessor chain from `entity`.
    ///
    /// A null value at an intermediate navigation segment makes the whole path null.
    ///
    /// # Errors
    /// Returns `Error::Evaluation` if an accessor fails or an intermediate segment
    /// yields a non-structured value.
    pub fn evaluate(&self, entity: &Entity) -> Result<Value, Error> {
        let (leaf, inner) = self
            .segments
            .split_last()
            .ok_or_else(|| Error::Evaluation("empty property path".to_owned()))?;
        let mut current: Option<Arc<Entity>> = None;
        for segment in inner {
            let owner = current.as_deref().unwrap_or(entity);
            match segment.read(owner)? {
                Value::Null => return Ok(Value::Null),
                Value::Structured(next) => current = Some(next),
                other => {
                    return Err(Error::Evaluation(format!(
                        "navigation segment '{}' yielded a {} value",
                        segment.name(),
                        other.kind_name()
                    )));
                }
            }
        }
        leaf.read(current.as_deref().unwrap_or(entity))
    }
}

impl PartialEq for PropertyPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| {
                    Arc::ptr_eq(a, b)
                        || (a.name() == b.name() && a.declaring_type() == b.declaring_type())
                })
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(segment.name())?;
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyPath({self})")
    }
}

impl EdmModel {
    /// Resolve a `/`-separated path such as `Category/Name` starting at `root_type`.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for empty paths or segments, unknown root
    /// types, unknown properties, and non-navigable inner segments.
    pub fn resolve_path(&self, root_type: &str, path: &str) -> Result<PropertyPath, Error> {
        let mut ty = self
            .structured_type(root_type)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown type '{root_type}'")))?;
        let names: Vec<&str> = path.split('/').collect();
        let mut segments = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "property path '{path}' has an empty segment"
                )));
            }
            let prop = ty.property(name).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "property '{name}' not found on type '{}'",
                    ty.name()
                ))
            })?;
            segments.push(Arc::clone(prop));
            if i + 1 < names.len() {
                let target = prop.edm_type().structured_name().ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "property '{name}' of '{}' is not navigable",
                        ty.name()
                    ))
                })?;
                ty = self.structured_type(target).ok_or_else(|| {
                    Error::InvalidModel(format!("unknown structured type '{target}'"))
                })?;
            }
        }
        PropertyPath::new(segments)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::edm::{EdmModelBuilder, FieldKind, TypeDef};

    fn model() -> EdmModel {
        EdmModelBuilder::new("T")
            .complex_type(TypeDef::complex("Address").property("City", FieldKind::String))
            .entity_type(
                TypeDef::entity("Person")
                    .key("Id")
                    .required("Id", FieldKind::I64)
                    .property("Home", "Address"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn resolves_multi_segment_paths() {
        let model = model();
        let path = model.resolve_path("Person", "Home/City").unwrap();
        assert_eq!(path.depth(), 2);
        assert_eq!(path.to_string(), "Home/City");
        assert_eq!(path.edm_type(), &EdmType::Primitive(FieldKind::String));
    }

    #[test]
    fn rejects_bad_paths() {
        let model = model();
        for bad in ["", "Home/", "Id/City", "Nope", "Home/Street"] {
            let err = model.resolve_path("Person", bad).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{bad}: {err}");
        }
        assert!(matches!(
            PropertyPath::new(Vec::new()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn null_intermediate_segment_propagates_null() {
        let model = model();
        let path = model.resolve_path("Person", "Home/City").unwrap();

        let homeless = model.new_entity("Person").unwrap().with("Id", 1).build().unwrap();
        assert_eq!(path.evaluate(&homeless).unwrap(), Value::Null);

        let home = model
            .new_entity("Address")
            .unwrap()
            .with("City", "Oslo")
            .build()
            .unwrap();
        let person = model
            .new_entity("Person")
            .unwrap()
            .with("Id", 2)
            .with("Home", home)
            .build()
            .unwrap();
        assert_eq!(path.evaluate(&person).unwrap(), Value::from("Oslo"));
    }
}
