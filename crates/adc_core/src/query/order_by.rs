//! Ordering strategies for multi-key sorting.
//!
//! # Invariants
//! - `apply_first` establishes the primary order.
//! - `apply_subsequent` only breaks ties left by the order already applied.
//! - Sorting is stable: ties not covered by any key keep their input order.

use std::cmp::Ordering;
use std::rc::Rc;

type Comparator<T> = Rc<dyn Fn(&T, &T) -> Ordering>;

/// Items sorted by one or more ordering keys.
pub struct OrderedQuery<T> {
    items: Vec<T>,
    comparators: Vec<Comparator<T>>,
}

impl<T> OrderedQuery<T> {
    fn sorted(mut items: Vec<T>, comparators: Vec<Comparator<T>>) -> Self {
        items.sort_by(|left, right| {
            comparators
                .iter()
                .map(|compare| compare(left, right))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Self { items, comparators }
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// One sort key plus direction.
pub trait OrderStrategy<T> {
    /// Applies this key as the primary sort.
    fn apply_first(&self, items: Vec<T>) -> OrderedQuery<T>;

    /// Applies this key as a tie-break within an existing order.
    fn apply_subsequent(&self, ordered: OrderedQuery<T>) -> OrderedQuery<T>;
}

/// Applies an ordering list in caller order: first key primary, the rest as
/// successive tie-breaks. An empty list leaves `items` untouched.
pub fn apply_order_bys<T>(items: Vec<T>, order_bys: &[Box<dyn OrderStrategy<T>>]) -> Vec<T> {
    let mut strategies = order_bys.iter();
    let Some(first) = strategies.next() else {
        return items;
    };
    strategies
        .fold(first.apply_first(items), |ordered, strategy| {
            strategy.apply_subsequent(ordered)
        })
        .into_items()
}

/// Ascending sort by key.
pub struct OrderBy<T, K> {
    key: Rc<dyn Fn(&T) -> K>,
}

impl<T: 'static, K: Ord + 'static> OrderBy<T, K> {
    pub fn new(key: impl Fn(&T) -> K + 'static) -> Self {
        Self { key: Rc::new(key) }
    }

    fn comparator(&self) -> Comparator<T> {
        let key = Rc::clone(&self.key);
        Rc::new(move |left: &T, right: &T| key(left).cmp(&key(right)))
    }
}

impl<T: 'static, K: Ord + 'static> OrderStrategy<T> for OrderBy<T, K> {
    fn apply_first(&self, items: Vec<T>) -> OrderedQuery<T> {
        OrderedQuery::sorted(items, vec![self.comparator()])
    }

    fn apply_subsequent(&self, ordered: OrderedQuery<T>) -> OrderedQuery<T> {
        let mut comparators = ordered.comparators;
        comparators.push(self.comparator());
        OrderedQuery::sorted(ordered.items, comparators)
    }
}

/// Descending sort by key.
pub struct OrderByDescending<T, K> {
    key: Rc<dyn Fn(&T) -> K>,
}

impl<T: 'static, K: Ord + 'static> OrderByDescending<T, K> {
    pub fn new(key: impl Fn(&T) -> K + 'static) -> Self {
        Self { key: Rc::new(key) }
    }

    fn comparator(&self) -> Comparator<T> {
        let key = Rc::clone(&self.key);
        Rc::new(move |left: &T, right: &T| key(right).cmp(&key(left)))
    }
}

impl<T: 'static, K: Ord + 'static> OrderStrategy<T> for OrderByDescending<T, K> {
    fn apply_first(&self, items: Vec<T>) -> OrderedQuery<T> {
        OrderedQuery::sorted(items, vec![self.comparator()])
    }

    fn apply_subsequent(&self, ordered: OrderedQuery<T>) -> OrderedQuery<T> {
        let mut comparators = ordered.comparators;
        comparators.push(self.comparator());
        OrderedQuery::sorted(ordered.items, comparators)
    }
}
