//! Name-based construction of [`QueryOptions`].

use crate::Error;
use crate::ast::Expr;
use crate::edm::EdmModel;
use crate::order::{ODataOrderBy, OrderKey, SortDir};
use crate::pipeline::QueryOptions;
use crate::projection::Selection;

/// Collects `$orderby` / `$select` / `$expand` as `/`-separated names and resolves
/// them against the entity set's type on [`build`](Self::build).
///
/// ```ignore
/// let options = QueryBuilder::new("Products")
///     .filter(price.gt(10))
///     .order_by("Price", SortDir::Asc)
///     .select(["Name", "Category/Name"])
///     .skip(4)
///     .top(4)
///     .build(&model)?;
/// ```
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct QueryBuilder {
    entity_set: String,
    filter: Option<Expr>,
    order_by: Vec<(String, SortDir)>,
    select: Option<Vec<String>>,
    expand: Vec<String>,
    skip: Option<u64>,
    top: Option<u64>,
}

impl QueryBuilder {
    pub fn new(entity_set: impl Into<String>) -> Self {
        Self {
            entity_set: entity_set.into(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    /// Append a sort key; earlier keys take precedence.
    pub fn order_by(mut self, path: impl Into<String>, dir: SortDir) -> Self {
        self.order_by.push((path.into(), dir));
        self
    }

    /// `"*"` selects the default property set.
    pub fn select<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select
            .get_or_insert_with(Vec::new)
            .extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn expand<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn top(mut self, n: u64) -> Self {
        self.top = Some(n);
        self
    }

    /// Resolve every name against `model`.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for an empty or unknown entity set, or a path
    /// that does not resolve on the set's entity type.
    pub fn build(self, model: &EdmModel) -> Result<QueryOptions, Error> {
        if self.entity_set.is_empty() {
            return Err(Error::InvalidArgument(
                "entity set name is required".to_owned(),
            ));
        }
        let set = model.entity_set(&self.entity_set).ok_or_else(|| {
            Error::InvalidArgument(format!("unknown entity set '{}'", self.entity_set))
        })?;
        let root = set.entity_type();

        let order_by = self
            .order_by
            .iter()
            .map(|(path, dir)| {
                Ok(OrderKey {
                    path: model.resolve_path(root, path)?,
                    dir: *dir,
                })
            })
            .collect::<Result<ODataOrderBy, Error>>()?;

        let select = match &self.select {
            None => None,
            Some(names) => {
                let mut selection = Selection::default();
                for name in names {
                    if name.trim() == "*" {
                        selection.wildcard = true;
                    } else {
                        selection.paths.push(model.resolve_path(root, name)?);
                    }
                }
                Some(selection)
            }
        };

        let expand = self
            .expand
            .iter()
            .map(|p| model.resolve_path(root, p))
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(QueryOptions {
            entity_set: self.entity_set,
            filter: self.filter,
            order_by,
            select,
            expand,
            skip: self.skip,
            top: self.top,
        })
    }
}
