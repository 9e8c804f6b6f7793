//! Ordered hook dispatch.

use super::context::PassContext;
use super::error::CompatError;
use std::fmt;

/// Decides whether a hook applies to an event.
pub type Predicate<S, A> = fn(&S, &A) -> bool;

/// Handles an event. `Ok(None)` hands the event to the next matching hook.
pub type Handler<S, A, R> = fn(&S, &A, &PassContext) -> Result<Option<R>, CompatError>;

struct Hook<S, A, R> {
    name: &'static str,
    predicate: Predicate<S, A>,
    handler: Handler<S, A, R>,
}

/// An explicit list of (predicate, handler) pairs, evaluated in order.
///
/// The first handler that produces a result wins.
pub struct HookChain<S, A, R> {
    hooks: Vec<Hook<S, A, R>>,
}

impl<S, A, R> HookChain<S, A, R> {
    #[must_use]
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Append a hook.
    #[must_use]
    pub fn with(
        mut self,
        name: &'static str,
        predicate: Predicate<S, A>,
        handler: Handler<S, A, R>,
    ) -> Self {
        self.hooks.push(Hook {
            name,
            predicate,
            handler,
        });
        self
    }

    /// Hook names in dispatch order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name).collect()
    }

    pub fn dispatch(&self, state: &S, args: &A, pass: &PassContext) -> Result<Option<R>, CompatError> {
        for hook in &self.hooks {
            if !(hook.predicate)(state, args) {
                continue;
            }
            if let Some(result) = (hook.handler)(state, args, pass)? {
                tracing::trace!(hook = hook.name, "hook handled event");
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}

impl<S, A, R> Default for HookChain<S, A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A, R> fmt::Debug for HookChain<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn even(_: &(), n: &u32) -> bool {
        n % 2 == 0
    }

    fn any(_: &(), _: &u32) -> bool {
        true
    }

    fn decline(_: &(), _: &u32, _: &PassContext) -> Result<Option<&'static str>, CompatError> {
        Ok(None)
    }

    fn even_handler(_: &(), _: &u32, _: &PassContext) -> Result<Option<&'static str>, CompatError> {
        Ok(Some("even"))
    }

    fn fallback(_: &(), _: &u32, _: &PassContext) -> Result<Option<&'static str>, CompatError> {
        Ok(Some("fallback"))
    }

    #[test]
    fn test_first_match_wins_and_declines_fall_through() {
        let chain = HookChain::new()
            .with("decline", any, decline)
            .with("even", even, even_handler)
            .with("fallback", any, fallback);
        let pass = PassContext::new();

        assert_eq!(chain.names(), vec!["decline", "even", "fallback"]);
        assert_eq!(chain.dispatch(&(), &2, &pass).unwrap(), Some("even"));
        assert_eq!(chain.dispatch(&(), &3, &pass).unwrap(), Some("fallback"));
        assert_eq!(HookChain::<(), u32, &str>::new().dispatch(&(), &3, &pass).unwrap(), None);
    }
}
