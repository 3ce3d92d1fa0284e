//! Ordered fallback of labelled lookups

/// Value found by a [`Cascade`] together with the label of the step that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T, L> {
    pub value: T,
    pub source: L,
}

type Step<'a, T> = Box<dyn Fn() -> Option<T> + 'a>;

/// Steps are tried in insertion order; the first `Some` wins.
pub struct Cascade<'a, L, T> {
    steps: Vec<(L, Step<'a, T>)>,
}

impl<L, T> Default for Cascade<'_, L, T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<'a, L, T> Cascade<'a, L, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<F>(mut self, label: L, lookup: F) -> Self
    where
        F: Fn() -> Option<T> + 'a,
    {
        self.steps.push((label, Box::new(lookup)));
        self
    }

    pub fn resolve(self) -> Option<Resolved<T, L>> {
        self.steps
            .into_iter()
            .find_map(|(source, lookup)| lookup().map(|value| Resolved { value, source }))
    }
}
