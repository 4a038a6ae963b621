//! Query pipeline: filter → order → skip → top → project.
//!
//! [`QueryEngine::apply`] binds every option up front and returns a lazy
//! [`QueryResults`] iterator. Only accessor failures, arithmetic faults and elements
//! of the wrong runtime type surface while iterating; the first such error ends
//! the sequence.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::Error;
use crate::ast::Expr;
use crate::edm::{EdmModel, StructuredType};
use crate::filter::{Predicate, PredicateCompiler};
use crate::limits::ODataLimits;
use crate::order::{ODataOrderBy, OrderComparator, OrderKeyCompiler};
use crate::pagination::{Paginate, Pagination};
use crate::path::PropertyPath;
use crate::projection::{ProjectionCompiler, Projector, Selection};
use crate::record::ODataRecord;
use crate::value::Entity;

/// Parsed and resolved query options for one entity set.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct QueryOptions {
    pub entity_set: String,
    pub filter: Option<Expr>,
    pub order_by: ODataOrderBy,
    pub select: Option<Selection>,
    pub expand: Vec<PropertyPath>,
    pub skip: Option<u64>,
    pub top: Option<u64>,
}

impl QueryOptions {
    pub fn new(entity_set: impl Into<String>) -> Self {
        Self {
            entity_set: entity_set.into(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    pub fn with_order(mut self, order: ODataOrderBy) -> Self {
        self.order_by = order;
        self
    }

    pub fn with_select(mut self, select: Selection) -> Self {
        self.select = Some(select);
        self
    }

    pub fn with_expand(mut self, expand: Vec<PropertyPath>) -> Self {
        self.expand = expand;
        self
    }

    pub fn with_skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn with_top(mut self, n: u64) -> Self {
        self.top = Some(n);
        self
    }

    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.skip, self.top)
    }
}

/// A sequence of entities of one statically known type.
pub trait EntitySource {
    type Item: Borrow<Entity>;
    type IntoIter: Iterator<Item = Self::Item>;

    /// Name of the entity type every element is (or derives from).
    fn element_type(&self) -> &str;

    fn into_entities(self) -> Self::IntoIter;
}

/// Any iterable of entities tagged with its element type.
///
/// `TypedSource<&[Entity]>` and other borrowed sources are restartable: clone and
/// apply again, or clone the resulting [`QueryResults`].
#[derive(Clone, Debug)]
pub struct TypedSource<I> {
    element_type: String,
    items: I,
}

impl<I> TypedSource<I> {
    pub fn new(element_type: impl Into<String>, items: I) -> Self {
        Self {
            element_type: element_type.into(),
            items,
        }
    }

    pub fn of(ty: &StructuredType, items: I) -> Self {
        Self::new(ty.name(), items)
    }
}

impl<I> EntitySource for TypedSource<I>
where
    I: IntoIterator,
    I::Item: Borrow<Entity>,
{
    type Item = I::Item;
    type IntoIter = I::IntoIter;

    fn element_type(&self) -> &str {
        &self.element_type
    }

    fn into_entities(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Binds query options against a model and runs them over entity sources.
#[derive(Clone, Debug)]
pub struct QueryEngine {
    model: Arc<EdmModel>,
    limits: Option<ODataLimits>,
}

impl QueryEngine {
    #[must_use]
    pub fn new(model: Arc<EdmModel>) -> Self {
        Self {
            model,
            limits: None,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ODataLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    #[must_use]
    pub fn model(&self) -> &Arc<EdmModel> {
        &self.model
    }

    /// Bind `options` and return the lazy result sequence over `source`.
    ///
    /// # Errors
    /// - `Error::InvalidArgument` if the entity set name is empty or unknown
    /// - `Error::TypeMismatch` if the source's element type is not the set's type
    /// - `Error::LimitExceeded` if configured limits are exceeded
    /// - `Error::InvalidArgument` if a filter or order path starts at another type
    /// - any binding error from the filter, order or projection compilers
    pub fn apply<S: EntitySource>(
        &self,
        source: S,
        options: &QueryOptions,
    ) -> Result<QueryResults<S::IntoIter>, Error> {
        if options.entity_set.is_empty() {
            return Err(Error::InvalidArgument(
                "entity set name is required".to_owned(),
            ));
        }
        let set = self.model.entity_set(&options.entity_set).ok_or_else(|| {
            Error::InvalidArgument(format!("unknown entity set '{}'", options.entity_set))
        })?;
        let element_type = self
            .model
            .entity_type(set.entity_type())
            .cloned()
            .ok_or_else(|| {
                Error::InvalidModel(format!("unknown entity type '{}'", set.entity_type()))
            })?;
        if source.element_type() != element_type.name() {
            return Err(Error::TypeMismatch {
                expected: element_type.name().to_owned(),
                actual: source.element_type().to_owned(),
            });
        }
        if let Some(limits) = &self.limits {
            limits.validate(options)?;
        }
        let filter_paths = options.filter.iter().flat_map(Expr::property_paths);
        let order_paths = options.order_by.0.iter().map(|key| &key.path);
        for path in filter_paths.chain(order_paths) {
            if !element_type.is_assignable_to(path.first().declaring_type()) {
                return Err(Error::InvalidArgument(format!(
                    "path '{path}' does not start at type '{}'",
                    element_type.name()
                )));
            }
        }

        let predicate = options
            .filter
            .as_ref()
            .map(|f| PredicateCompiler::new(&self.model).compile(f))
            .transpose()?;
        let order = OrderKeyCompiler::compile(&options.order_by)?;
        let projector = ProjectionCompiler::new(&self.model).compile(
            &element_type,
            options.select.as_ref(),
            &options.expand,
        )?;

        debug!(
            entity_set = %options.entity_set,
            order = %options.order_by,
            skip = ?options.skip,
            top = ?options.top,
            filter = options.filter.is_some(),
            select = options.select.is_some(),
            expand = options.expand.len(),
            "odata query bound"
        );

        let filtered = Filtered {
            inner: source.into_entities(),
            element_type,
            predicate,
        };
        let ordered = Ordered {
            inner: filtered,
            order,
            buffer: None,
        };
        Ok(QueryResults {
            inner: options.pagination().apply_fallible(ordered),
            projector,
            done: false,
        })
    }
}

/// Type check and predicate.
#[derive(Clone)]
struct Filtered<I> {
    inner: I,
    element_type: Arc<StructuredType>,
    predicate: Option<Predicate>,
}

impl<I> Iterator for Filtered<I>
where
    I: Iterator,
    I::Item: Borrow<Entity>,
{
    type Item = Result<I::Item, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.inner.next()?;
            let entity: &Entity = item.borrow();
            if !entity
                .entity_type()
                .is_assignable_to(self.element_type.name())
            {
                return Some(Err(Error::TypeMismatch {
                    expected: self.element_type.name().to_owned(),
                    actual: entity.type_name().to_owned(),
                }));
            }
            let Some(predicate) = &self.predicate else {
                return Some(Ok(item));
            };
            match predicate(entity) {
                Ok(true) => return Some(Ok(item)),
                Ok(false) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Materializes its input on the first pull unless the order is the identity.
#[derive(Clone)]
struct Ordered<J, T> {
    inner: J,
    order: OrderComparator,
    buffer: Option<std::vec::IntoIter<Result<T, Error>>>,
}

impl<J, T> Ordered<J, T>
where
    J: Iterator<Item = Result<T, Error>>,
    T: Borrow<Entity>,
{
    fn materialize(&mut self) -> Vec<Result<T, Error>> {
        let mut items = Vec::new();
        for item in self.inner.by_ref() {
            match item {
                Ok(item) => items.push(item),
                Err(e) => return vec![Err(e)],
            }
        }
        trace!(
            count = items.len(),
            keys = self.order.keys().len(),
            "ordering stage materialized"
        );
        match self.order.sort(items) {
            Ok(sorted) => sorted.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        }
    }
}

impl<J, T> Iterator for Ordered<J, T>
where
    J: Iterator<Item = Result<T, Error>>,
    T: Borrow<Entity>,
{
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.order.is_identity() {
            return self.inner.next();
        }
        if self.buffer.is_none() {
            let sorted = self.materialize();
            self.buffer = Some(sorted.into_iter());
        }
        self.buffer.as_mut()?.next()
    }
}

/// Lazy sequence of projected records.
///
/// Fused after the first error. Cloneable when the source iterator and its items
/// are, which makes restartable sources yield restartable results.
pub struct QueryResults<I: Iterator> {
    inner: Paginate<Ordered<Filtered<I>, I::Item>>,
    projector: Projector,
    done: bool,
}

impl<I> Clone for QueryResults<I>
where
    I: Iterator + Clone,
    I::Item: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            projector: self.projector.clone(),
            done: self.done,
        }
    }
}

impl<I: Iterator> fmt::Debug for QueryResults<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResults")
            .field("projector", &self.projector)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<I> Iterator for QueryResults<I>
where
    I: Iterator,
    I::Item: Borrow<Entity>,
{
    type Item = Result<ODataRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.inner.next()? {
            Ok(item) => self.projector.project(item.borrow()),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}
