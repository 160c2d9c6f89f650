//! Composable entity predicates.
//!
//! A predicate is a boolean closure over one entity. Combinators evaluate both
//! operands against the same entity reference, so `a.and(b)` is one test over
//! a single parameter rather than two separate filters.

use std::fmt::{Debug, Formatter};
use std::ops::Not;
use std::rc::Rc;

pub struct Predicate<T> {
    test: Rc<dyn Fn(&T) -> bool>,
}

impl<T: 'static> Predicate<T> {
    pub fn new(test: impl Fn(&T) -> bool + 'static) -> Self {
        Self {
            test: Rc::new(test),
        }
    }

    /// Predicate matching every entity.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    pub fn matches(&self, entity: &T) -> bool {
        (self.test)(entity)
    }

    /// Logical AND; the right operand is evaluated only when the left matches.
    pub fn and(self, other: Predicate<T>) -> Self {
        Self::new(move |entity| self.matches(entity) && other.matches(entity))
    }

    pub fn or(self, other: Predicate<T>) -> Self {
        Self::new(move |entity| self.matches(entity) || other.matches(entity))
    }
}

impl<T: 'static> Not for Predicate<T> {
    type Output = Self;

    fn not(self) -> Self {
        Self::new(move |entity| !self.matches(entity))
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            test: Rc::clone(&self.test),
        }
    }
}

impl<T> Debug for Predicate<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Predicate(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::Predicate;

    #[test]
    fn combinators_share_one_parameter() {
        let even = Predicate::new(|value: &i32| value % 2 == 0);
        let positive = Predicate::new(|value: &i32| *value > 0);

        let both = even.clone().and(positive.clone());
        assert!(both.matches(&4));
        assert!(!both.matches(&-4));
        assert!(!both.matches(&3));

        let either = even.or(positive);
        assert!(either.matches(&-4));
        assert!(either.matches(&3));
        assert!(!either.matches(&-3));
    }

    #[test]
    fn negation_and_always() {
        let always = Predicate::<u8>::always();
        assert!(always.matches(&0));
        assert!(!(!always).matches(&0));

        let small = Predicate::new(|value: &u8| *value < 10);
        let large = !small.clone();
        assert!(large.matches(&10));
        assert!(!large.matches(&3));
        assert!(small.matches(&3));
    }
}
