//! `$orderby` binding: stable multi-key comparison over property paths.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::path::PropertyPath;
use crate::value::{Entity, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    /// Reverse the sort direction (Asc <-> Desc)
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }

    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderKey {
    pub path: PropertyPath,
    pub dir: SortDir,
}

impl OrderKey {
    #[must_use]
    pub fn asc(path: PropertyPath) -> Self {
        Self {
            path,
            dir: SortDir::Asc,
        }
    }

    #[must_use]
    pub fn desc(path: PropertyPath) -> Self {
        Self {
            path,
            dir: SortDir::Desc,
        }
    }
}

/// Sort keys in declaration order; position 0 is the primary key.
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct ODataOrderBy(pub Vec<OrderKey>);

impl ODataOrderBy {
    pub fn empty() -> Self {
        Self(vec![])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append a tie-breaker.
    pub fn then(mut self, key: OrderKey) -> Self {
        self.0.push(key);
        self
    }

    /// Compact rendering for logs, e.g. `+Price,-Rating`.
    #[must_use]
    pub fn to_signed_tokens(&self) -> String {
        self.0
            .iter()
            .map(|k| match k.dir {
                SortDir::Asc => format!("+{}", k.path),
                SortDir::Desc => format!("-{}", k.path),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<OrderKey> for ODataOrderBy {
    fn from_iter<T: IntoIterator<Item = OrderKey>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ODataOrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(none)");
        }
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let dir = match key.dir {
                SortDir::Asc => "asc",
                SortDir::Desc => "desc",
            };
            write!(f, "{} {dir}", key.path)?;
        }
        Ok(())
    }
}

/// Compiled `$orderby`. An empty comparator keeps source order.
#[derive(Clone, Debug)]
pub struct OrderComparator {
    keys: Arc<[OrderKey]>,
}

impl OrderComparator {
    #[must_use]
    pub fn identity() -> Self {
        Self {
            keys: Arc::from(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> &[OrderKey] {
        &self.keys
    }

    /// Extract all key values of `entity`, primary key first.
    ///
    /// # Errors
    /// Propagates accessor failures.
    pub fn sort_key(&self, entity: &Entity) -> Result<Vec<Value>, Error> {
        self.keys.iter().map(|k| k.path.evaluate(entity)).collect()
    }

    /// Compare two extracted keys, applying each direction independently.
    #[must_use]
    pub fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        self.keys
            .iter()
            .zip(a.iter().zip(b))
            .map(|(key, (x, y))| key.dir.apply(x.sort_cmp(y)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// # Errors
    /// Propagates accessor failures.
    pub fn compare(&self, a: &Entity, b: &Entity) -> Result<Ordering, Error> {
        Ok(self.compare_keys(&self.sort_key(a)?, &self.sort_key(b)?))
    }

    /// Stable sort; each key chain is evaluated once per item.
    ///
    /// # Errors
    /// Propagates the first accessor failure.
    pub fn sort<T: Borrow<Entity>>(&self, items: Vec<T>) -> Result<Vec<T>, Error> {
        if self.is_identity() {
            return Ok(items);
        }
        let mut decorated = items
            .into_iter()
            .map(|item| Ok((self.sort_key(item.borrow())?, item)))
            .collect::<Result<Vec<_>, Error>>()?;
        decorated.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        Ok(decorated.into_iter().map(|(_, item)| item).collect())
    }
}

pub struct OrderKeyCompiler;

impl OrderKeyCompiler {
    /// # Errors
    /// Returns `Error::UnsupportedOperation` if a key ends at a navigable property.
    pub fn compile(order: &ODataOrderBy) -> Result<OrderComparator, Error> {
        if let Some(key) = order.0.iter().find(|k| k.path.leaf().is_navigable()) {
            return Err(Error::UnsupportedOperation(format!(
                "cannot order by navigation property '{}'",
                key.path
            )));
        }
        Ok(OrderComparator {
            keys: order.0.iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::edm::{EdmModel, EdmModelBuilder, FieldKind, TypeDef};

    fn model() -> EdmModel {
        EdmModelBuilder::new("T")
            .complex_type(TypeDef::complex("Tag").property("Label", FieldKind::String))
            .entity_type(
                TypeDef::entity("Row")
                    .property("A", FieldKind::I64)
                    .property("B", FieldKind::String)
                    .property("Tag", "Tag"),
            )
            .build()
            .unwrap()
    }

    fn row(model: &EdmModel, a: Option<i64>, b: &str) -> Entity {
        model
            .new_entity("Row")
            .unwrap()
            .with("A", a)
            .with("B", b)
            .build()
            .unwrap()
    }

    fn order(model: &EdmModel, keys: &[(&str, SortDir)]) -> ODataOrderBy {
        keys.iter()
            .map(|(p, dir)| OrderKey {
                path: model.resolve_path("Row", p).unwrap(),
                dir: *dir,
            })
            .collect()
    }

    fn labels(rows: &[Entity]) -> Vec<String> {
        rows.iter()
            .map(|r| r.get("B").unwrap().as_str().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn keys_break_ties_in_declared_order() {
        let m = model();
        let rows = vec![
            row(&m, Some(2), "x"),
            row(&m, Some(1), "b"),
            row(&m, Some(2), "a"),
            row(&m, Some(1), "c"),
        ];
        let cmp = OrderKeyCompiler::compile(&order(
            &m,
            &[("A", SortDir::Asc), ("B", SortDir::Desc)],
        ))
        .unwrap();
        let sorted = cmp.sort(rows).unwrap();
        assert_eq!(labels(&sorted), ["c", "b", "x", "a"]);
    }

    #[test]
    fn sort_is_stable_and_nulls_come_first() {
        let m = model();
        let rows = vec![
            row(&m, Some(1), "first"),
            row(&m, None, "null"),
            row(&m, Some(1), "second"),
        ];
        let cmp = OrderKeyCompiler::compile(&order(&m, &[("A", SortDir::Asc)])).unwrap();
        let sorted = cmp.sort(rows).unwrap();
        assert_eq!(labels(&sorted), ["null", "first", "second"]);
    }

    #[test]
    fn empty_order_is_identity() {
        let m = model();
        let rows = vec![row(&m, Some(3), "c"), row(&m, Some(1), "a")];
        let cmp = OrderKeyCompiler::compile(&ODataOrderBy::empty()).unwrap();
        assert!(cmp.is_identity());
        assert_eq!(labels(&cmp.sort(rows).unwrap()), ["c", "a"]);
    }

    #[test]
    fn navigable_leaf_is_rejected() {
        let m = model();
        let err = OrderKeyCompiler::compile(&order(&m, &[("Tag", SortDir::Asc)])).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn renders_for_logs() {
        let m = model();
        let o = order(&m, &[("A", SortDir::Asc), ("Tag/Label", SortDir::Desc)]);
        assert_eq!(o.to_string(), "A asc, Tag/Label desc");
        assert_eq!(o.to_signed_tokens(), "+A,-Tag/Label");
    }
}
