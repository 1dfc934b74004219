//! Apply a local change before the server confirms it, undo it if the
//! server refuses.

use std::future::Future;

/// Optimistic mutation of a piece of view state.
pub struct Optimistic<'a, S> {
    state: &'a mut S,
}

impl<'a, S> Optimistic<'a, S> {
    pub fn new(state: &'a mut S) -> Self {
        Self { state }
    }

    /// Run `apply`, then `request`. On failure `inverse` receives whatever
    /// `apply` returned and restores the state.
    pub async fn apply<U, T, E, Fut>(
        self,
        apply: impl FnOnce(&mut S) -> U,
        inverse: impl FnOnce(&mut S, U),
        request: Fut,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let undo = apply(self.state);
        match request.await {
            Ok(value) => Ok(value),
            Err(e) => {
                inverse(self.state, undo);
                Err(e)
            }
        }
    }

    /// Like [`apply`](Self::apply), restoring a full snapshot on failure.
    pub async fn apply_with_snapshot<T, E, Fut>(
        self,
        apply: impl FnOnce(&mut S),
        request: Fut,
    ) -> Result<T, E>
    where
        S: Clone,
        Fut: Future<Output = Result<T, E>>,
    {
        self.apply(
            |state| {
                let snapshot = state.clone();
                apply(state);
                snapshot
            },
            |state, snapshot| *state = snapshot,
            request,
        )
        .await
    }
}
