//! Results of the transition functions.
//!
//! [`Next`] is what an [`Update`](crate::Update) returns for one event: an
//! optional replacement model and the effects to dispatch. [`First`] is what
//! an [`Init`](crate::Init) returns when a loop starts: a mandatory model and
//! the initial effects.
//!
//! Effects are carried as a `Vec`. The runtime treats them as an unordered
//! multiset: dispatch order between effects of one transition is not
//! guaranteed, and duplicates are neither collapsed nor preserved on purpose.

/// Outcome of applying one event to a model.
///
/// An absent model means "keep the current model". A `Next` with neither a
/// model nor effects is a no-op transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Next<M, F> {
    model: Option<M>,
    effects: Vec<F>,
}

impl<M, F> Next<M, F> {
    /// Replace the model, dispatch nothing.
    pub fn next(model: M) -> Self {
        Self { model: Some(model), effects: Vec::new() }
    }

    /// Replace the model and dispatch `effects`.
    pub fn next_with(model: M, effects: impl IntoIterator<Item = F>) -> Self {
        Self { model: Some(model), effects: effects.into_iter().collect() }
    }

    /// Keep the current model, dispatch `effects`.
    pub fn dispatch(effects: impl IntoIterator<Item = F>) -> Self {
        Self { model: None, effects: effects.into_iter().collect() }
    }

    /// Keep the current model, dispatch nothing.
    pub fn no_change() -> Self {
        Self { model: None, effects: Vec::new() }
    }

    /// Whether this transition replaces the model.
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Whether this transition dispatches any effect.
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    /// Replacement model. `None` if the current model is kept.
    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    /// Effects to dispatch.
    pub fn effects(&self) -> &[F] {
        &self.effects
    }

    /// Replacement model, or `fallback` if the current model is kept.
    pub fn model_or<'a>(&'a self, fallback: &'a M) -> &'a M {
        self.model.as_ref().unwrap_or(fallback)
    }

    /// Split into replacement model and effects.
    pub fn into_parts(self) -> (Option<M>, Vec<F>) {
        (self.model, self.effects)
    }
}

/// Starting point of a loop produced by an [`Init`](crate::Init).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct First<M, F> {
    model: M,
    effects: Vec<F>,
}

impl<M, F> First<M, F> {
    /// Start from `model` with no effects.
    pub fn first(model: M) -> Self {
        Self { model, effects: Vec::new() }
    }

    /// Start from `model` and dispatch `effects` before any event.
    pub fn first_with(model: M, effects: impl IntoIterator<Item = F>) -> Self {
        Self { model, effects: effects.into_iter().collect() }
    }

    /// Starting model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Starting effects.
    pub fn effects(&self) -> &[F] {
        &self.effects
    }

    /// Whether any starting effect is present.
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    /// Split into starting model and effects.
    pub fn into_parts(self) -> (M, Vec<F>) {
        (self.model, self.effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_change_is_empty() {
        let next: Next<u32, &str> = Next::no_change();
        assert!(!next.has_model());
        assert!(!next.has_effects());
        assert_eq!(next.model_or(&7), &7);
    }

    #[test]
    fn dispatch_keeps_model() {
        let next: Next<u32, &str> = Next::dispatch(["save", "render"]);
        assert!(!next.has_model());
        assert_eq!(next.effects(), &["save", "render"]);
    }

    #[test]
    fn next_with_replaces_model() {
        let next = Next::next_with(3u32, ["save"]);
        assert_eq!(next.model(), Some(&3));
        assert_eq!(next.model_or(&7), &3);

        let (model, effects) = next.into_parts();
        assert_eq!(model, Some(3));
        assert_eq!(effects, vec!["save"]);
    }

    #[test]
    fn first_carries_effects() {
        let first = First::first_with("idle", [1, 2]);
        assert!(first.has_effects());
        assert_eq!(first.model(), &"idle");
        assert_eq!(first.into_parts(), ("idle", vec![1, 2]));

        let bare: First<&str, u8> = First::first("idle");
        assert!(!bare.has_effects());
    }
}
