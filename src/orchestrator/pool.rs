//! Scratch state pooled across a single [`generate`](super::generate) run
//! and cleared (never deallocated) when released, so repeated analysis
//! runs against the same process don't keep re-growing allocations.

use std::cell::RefCell;

use rustc_hash::FxHashSet;

/// The de-duplication key: first-observed-wins by `(rule_id, file, line,
/// column)`.
pub type FindingKey = (String, String, u32, u32);

#[derive(Debug, Default)]
pub struct BaseState {
    pub seen: FxHashSet<FindingKey>,
}

impl BaseState {
    fn clear(&mut self) {
        self.seen.clear();
    }
}

#[derive(Default)]
pub struct StatePool {
    free: RefCell<Vec<BaseState>>,
}

impl StatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> PooledState<'_> {
        let state = self.free.borrow_mut().pop().unwrap_or_default();
        PooledState { state: Some(state), pool: self }
    }
}

pub struct PooledState<'a> {
    state: Option<BaseState>,
    pool: &'a StatePool,
}

impl std::ops::Deref for PooledState<'_> {
    type Target = BaseState;

    fn deref(&self) -> &BaseState {
        self.state.as_ref().expect("state taken before drop")
    }
}

impl std::ops::DerefMut for PooledState<'_> {
    fn deref_mut(&mut self) -> &mut BaseState {
        self.state.as_mut().expect("state taken before drop")
    }
}

impl Drop for PooledState<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.state.take() {
            state.clear();
            self.pool.free.borrow_mut().push(state);
        }
    }
}
