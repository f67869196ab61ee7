//! Ordered strategy cascades.
//!
//! Name, phone, email, link, and next-page discovery all follow the same
//! shape: try a list of strategies in priority order and keep the first one
//! that produces something. [`Cascade`] makes that list explicit so each
//! strategy can be tested on its own and new ones slotted in by position.

use std::fmt;

use crate::dom::PageSnapshot;

/// A strategy found nothing on this page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Miss;

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no match")
    }
}

pub type Attempt<T> = Result<T, Miss>;

/// One way of pulling a `T` out of a rendered page.
pub trait Strategy<T>: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    fn attempt(&self, page: &PageSnapshot) -> Attempt<T>;
}

/// Closure-backed strategy, for cascades built from small functions.
pub struct FnStrategy<F> {
    name: &'static str,
    f: F,
}

impl<F> FnStrategy<F> {
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<T, F> Strategy<T> for FnStrategy<F>
where
    F: Fn(&PageSnapshot) -> Attempt<T> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn attempt(&self, page: &PageSnapshot) -> Attempt<T> {
        (self.f)(page)
    }
}

/// A strategy's output together with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit<T> {
    pub strategy: &'static str,
    pub value: T,
}

/// Strategies tried in insertion order.
pub struct Cascade<T> {
    strategies: Vec<Box<dyn Strategy<T>>>,
}

impl<T> Default for Cascade<T> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }
}

impl<T> Cascade<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, strategy: impl Strategy<T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn then_fn<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&PageSnapshot) -> Attempt<T> + Send + Sync + 'static,
        T: 'static,
    {
        self.then(FnStrategy::new(name, f))
    }

    /// Returns the first hit, or `Miss` if every strategy came up empty.
    pub fn first(&self, page: &PageSnapshot) -> Attempt<Hit<T>> {
        for strategy in &self.strategies {
            if let Ok(value) = strategy.attempt(page) {
                tracing::trace!(strategy = strategy.name(), "Strategy hit");
                return Ok(Hit {
                    strategy: strategy.name(),
                    value,
                });
            }
        }
        Err(Miss)
    }

    /// Runs every strategy and returns all hits in order.
    pub fn all(&self, page: &PageSnapshot) -> Vec<Hit<T>> {
        self.strategies
            .iter()
            .filter_map(|s| {
                s.attempt(page).ok().map(|value| Hit {
                    strategy: s.name(),
                    value,
                })
            })
            .collect()
    }
}

impl Cascade<String> {
    /// First hit's value, or an empty string. Extraction never fails.
    pub fn first_or_empty(&self, page: &PageSnapshot) -> String {
        self.first(page).map(|hit| hit.value).unwrap_or_default()
    }
}

/// Treats an empty string as a miss.
pub fn non_empty(value: String) -> Attempt<String> {
    if value.is_empty() { Err(Miss) } else { Ok(value) }
}
