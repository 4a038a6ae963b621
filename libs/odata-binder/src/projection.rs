//! `$select` / `$expand` binding.
//!
//! Requested paths are merged into a tree keyed by segment name at compile time, so
//! overlapping requests produce the same record shape whatever order they come in.
//! Projection then walks the tree once per entity.

use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::Error;
use crate::edm::{EdmModel, Property, StructuredType};
use crate::path::PropertyPath;
use crate::record::{ODataRecord, RecordValue};
use crate::value::{Entity, Value};

/// `$select` content. The wildcard stands for the default property set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub wildcard: bool,
    pub paths: Vec<PropertyPath>,
}

impl Selection {
    /// `$select=*`
    #[must_use]
    pub fn all() -> Self {
        Self {
            wildcard: true,
            paths: Vec::new(),
        }
    }

    #[must_use]
    pub fn paths(paths: Vec<PropertyPath>) -> Self {
        Self {
            wildcard: false,
            paths,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len() + usize::from(self.wildcard)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct Node {
    children: IndexMap<String, Child>,
}

#[derive(Debug)]
struct Child {
    property: Arc<Property>,
    shape: Shape,
}

#[derive(Debug)]
enum Shape {
    Value,
    /// Navigation with sub-paths selected under it.
    Nested(Node),
    /// Navigation selected as a whole: all structural properties of the target type.
    Expanded(Vec<Arc<Property>>),
}

/// Compiled projection.
#[derive(Clone, Debug)]
pub struct Projector {
    root: Arc<Node>,
}

pub struct ProjectionCompiler<'m> {
    model: &'m EdmModel,
}

impl<'m> ProjectionCompiler<'m> {
    #[must_use]
    pub fn new(model: &'m EdmModel) -> Self {
        Self { model }
    }

    /// Merge the default set (when `select` is absent or has the wildcard), the
    /// selected paths and the expanded paths into one projection.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if a path does not start at `element_type`.
    pub fn compile(
        &self,
        element_type: &StructuredType,
        select: Option<&Selection>,
        expand: &[PropertyPath],
    ) -> Result<Projector, Error> {
        let mut root = Node::default();
        if select.is_none_or(|s| s.wildcard) {
            for prop in element_type.structural_properties() {
                root.children.insert(
                    prop.name().to_owned(),
                    Child {
                        property: Arc::clone(prop),
                        shape: Shape::Value,
                    },
                );
            }
        }
        let selected = select.map_or(&[][..], |s| s.paths.as_slice());
        for path in selected.iter().chain(expand) {
            if !element_type.is_assignable_to(path.first().declaring_type()) {
                return Err(Error::InvalidArgument(format!(
                    "path '{path}' does not start at type '{}'",
                    element_type.name()
                )));
            }
            self.insert(&mut root, path.segments())?;
        }
        Ok(Projector {
            root: Arc::new(root),
        })
    }

    fn insert(&self, node: &mut Node, segments: &[Arc<Property>]) -> Result<(), Error> {
        let Some((head, rest)) = segments.split_first() else {
            return Ok(());
        };
        let child = match node.children.entry(head.name().to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Child {
                property: Arc::clone(head),
                shape: self.leaf_shape(head)?,
            }),
        };
        if rest.is_empty() {
            return Ok(());
        }
        if !matches!(child.shape, Shape::Nested(_)) {
            child.shape = Shape::Nested(Node::default());
        }
        match &mut child.shape {
            Shape::Nested(inner) => self.insert(inner, rest),
            Shape::Value | Shape::Expanded(_) => Ok(()),
        }
    }

    fn leaf_shape(&self, property: &Property) -> Result<Shape, Error> {
        let Some(target) = property.edm_type().structured_name() else {
            return Ok(Shape::Value);
        };
        let target = self
            .model
            .structured_type(target)
            .ok_or_else(|| Error::InvalidModel(format!("unknown structured type '{target}'")))?;
        Ok(Shape::Expanded(
            target.structural_properties().cloned().collect(),
        ))
    }
}

impl Projector {
    /// Build a fresh record for `entity`.
    ///
    /// # Errors
    /// Propagates accessor failures; `Error::Evaluation` if a navigation property
    /// yields a non-structured value.
    pub fn project(&self, entity: &Entity) -> Result<ODataRecord, Error> {
        project_node(&self.root, entity)
    }
}

fn project_node(node: &Node, entity: &Entity) -> Result<ODataRecord, Error> {
    let mut record = ODataRecord::new();
    for (key, child) in &node.children {
        let value = child.property.read(entity)?;
        let out = match (&child.shape, value) {
            (Shape::Value, value) => RecordValue::Scalar(value),
            (_, Value::Null) => RecordValue::Scalar(Value::Null),
            (Shape::Nested(inner), Value::Structured(related)) => {
                RecordValue::Record(project_node(inner, &related)?)
            }
            (Shape::Expanded(props), Value::Structured(related)) => {
                let mut nested = ODataRecord::new();
                for prop in props {
                    nested.insert(prop.name(), prop.read(&related)?);
                }
                RecordValue::Record(nested)
            }
            (_, other) => {
                return Err(Error::Evaluation(format!(
                    "navigation property '{key}' yielded a {} value",
                    other.kind_name()
                )));
            }
        };
        record.insert(key.as_str(), out);
    }
    Ok(record)
}
