//! Query building blocks shared by every repository backend.
//!
//! # Responsibility
//! - Carry the `(predicate, includes, orderings, skip, take)` tuple.
//! - Run the in-process part of the query pipeline identically for all
//!   backends.
//!
//! # Invariants
//! - Pipeline order is fixed: includes are attached by the backend first, then
//!   predicate, ordering, skip, take.
//! - `QueryParams` is built once and only read afterwards.

pub mod include;
pub mod order_by;
pub mod predicate;

use include::Include;
use order_by::{apply_order_bys, OrderStrategy};
use predicate::Predicate;

/// Optional query parameters for one repository call.
pub struct QueryParams<T> {
    predicate: Option<Predicate<T>>,
    includes: Vec<Include<T>>,
    order_bys: Vec<Box<dyn OrderStrategy<T>>>,
    skip: Option<usize>,
    take: Option<usize>,
}

impl<T> Default for QueryParams<T> {
    fn default() -> Self {
        Self {
            predicate: None,
            includes: Vec::new(),
            order_bys: Vec::new(),
            skip: None,
            take: None,
        }
    }
}

impl<T: 'static> QueryParams<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `QueryParams::new().filter(predicate)`.
    pub fn filtered(predicate: Predicate<T>) -> Self {
        Self::new().filter(predicate)
    }

    /// Sets the predicate, AND-ing it with one already present.
    pub fn filter(mut self, predicate: Predicate<T>) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn include(mut self, include: Include<T>) -> Self {
        self.includes.push(include);
        self
    }

    pub fn includes(mut self, includes: impl IntoIterator<Item = Include<T>>) -> Self {
        self.includes.extend(includes);
        self
    }

    pub fn order_by(mut self, strategy: impl OrderStrategy<T> + 'static) -> Self {
        self.order_bys.push(Box::new(strategy));
        self
    }

    pub fn order_bys(mut self, strategies: Vec<Box<dyn OrderStrategy<T>>>) -> Self {
        self.order_bys.extend(strategies);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    /// Page window helper: `skip(page * size).take(size)`.
    pub fn page(self, page: usize, size: usize) -> Self {
        self.skip(page * size).take(size)
    }

    pub fn predicate(&self) -> Option<&Predicate<T>> {
        self.predicate.as_ref()
    }

    pub fn include_list(&self) -> &[Include<T>] {
        &self.includes
    }

    pub fn order_by_list(&self) -> &[Box<dyn OrderStrategy<T>>] {
        &self.order_bys
    }

    pub fn skip_count(&self) -> Option<usize> {
        self.skip
    }

    pub fn take_count(&self) -> Option<usize> {
        self.take
    }

    /// Filters, orders and pages already-loaded items.
    pub fn apply(&self, items: Vec<T>) -> Vec<T> {
        let filtered: Vec<T> = match &self.predicate {
            Some(predicate) => items
                .into_iter()
                .filter(|item| predicate.matches(item))
                .collect(),
            None => items,
        };

        let ordered = apply_order_bys(filtered, &self.order_bys);

        let skipped = ordered.into_iter().skip(self.skip.unwrap_or(0));
        match self.take {
            Some(take) => skipped.take(take).collect(),
            None => skipped.collect(),
        }
    }
}

impl<T> std::fmt::Debug for QueryParams<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParams")
            .field("has_predicate", &self.predicate.is_some())
            .field("includes", &self.includes)
            .field("order_bys", &self.order_bys.len())
            .field("skip", &self.skip)
            .field("take", &self.take)
            .finish()
    }
}
