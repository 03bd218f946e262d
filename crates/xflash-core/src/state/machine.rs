//! Named-state synchronization primitive.
//!
//! A [`StateMachine`] holds one active state out of a declared set and lets any
//! number of tasks wait for a particular state to become active.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Unknown state {state}: expected one of {expected}")]
    InvalidState { state: String, expected: String },
}

struct Inner<S> {
    states: HashSet<S>,
    state: S,
    /// Pending waiters per state, keyed by registration id.
    waiters: HashMap<S, HashMap<u64, oneshot::Sender<()>>>,
    next_id: u64,
}

impl<S: fmt::Debug> Inner<S> {
    fn invalid(&self, state: &S) -> StateError {
        let mut expected: Vec<String> = self.states.iter().map(|s| format!("{:?}", s)).collect();
        expected.sort();
        StateError::InvalidState {
            state: format!("{:?}", state),
            expected: format!("{{{}}}", expected.join(", ")),
        }
    }
}

/// Async-friendly state machine.
///
/// `transition` is expected to be driven by a single owner; `state` and
/// `wait_for` may be used from any number of tasks.
pub struct StateMachine<S> {
    inner: Mutex<Inner<S>>,
}

impl<S> StateMachine<S>
where
    S: Clone + Eq + Hash + fmt::Debug,
{
    pub fn new(states: impl IntoIterator<Item = S>, initial: S) -> Result<Self, StateError> {
        let inner = Inner {
            states: states.into_iter().collect(),
            state: initial,
            waiters: HashMap::new(),
            next_id: 0,
        };

        if !inner.states.contains(&inner.state) {
            return Err(inner.invalid(&inner.state));
        }

        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently active state.
    pub fn state(&self) -> S {
        self.lock().state.clone()
    }

    /// Activate `to` and wake everything waiting for it.
    pub fn transition(&self, to: S) -> Result<(), StateError> {
        let mut inner = self.lock();
        if !inner.states.contains(&to) {
            return Err(inner.invalid(&to));
        }

        debug!(from = ?inner.state, to = ?to, "State transition");
        inner.state = to.clone();

        if let Some(waiters) = inner.waiters.remove(&to) {
            for (_, waiter) in waiters {
                // Receiver gone means the waiter is mid-drop; its guard finds nothing to remove.
                let _ = waiter.send(());
            }
        }

        Ok(())
    }

    /// Wait until `state` is active. Returns immediately if it already is.
    ///
    /// # Panics
    ///
    /// Panics if `state` is not one of the declared states.
    pub async fn wait_for(&self, state: S) {
        let (id, rx) = {
            let mut inner = self.lock();
            assert!(
                inner.states.contains(&state),
                "waiting for undeclared state {:?}",
                state
            );

            if inner.state == state {
                return;
            }

            let id = inner.next_id;
            inner.next_id += 1;

            let (tx, rx) = oneshot::channel();
            inner.waiters.entry(state.clone()).or_default().insert(id, tx);
            (id, rx)
        };

        let _registration = Registration {
            machine: self,
            state,
            id,
        };

        // Err only if the sender was dropped without firing, which cannot
        // happen while this borrow keeps the machine alive.
        let _ = rx.await;
    }

    /// Number of tasks currently waiting for `state`.
    pub fn pending_waiters(&self, state: &S) -> usize {
        self.lock().waiters.get(state).map_or(0, HashMap::len)
    }
}

impl<S: fmt::Debug> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("StateMachine")
            .field("state", &inner.state)
            .field("states", &inner.states)
            .finish()
    }
}

/// Removes a waiter from the arena when its future completes or is dropped.
struct Registration<'a, S>
where
    S: Clone + Eq + Hash + fmt::Debug,
{
    machine: &'a StateMachine<S>,
    state: S,
    id: u64,
}

impl<S> Drop for Registration<'_, S>
where
    S: Clone + Eq + Hash + fmt::Debug,
{
    fn drop(&mut self) {
        let mut inner = self.machine.lock();
        if let Some(waiters) = inner.waiters.get_mut(&self.state) {
            waiters.remove(&self.id);
            if waiters.is_empty() {
                inner.waiters.remove(&self.state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const STATES: [&str; 3] = ["disconnected", "connected", "ready"];

    fn machine() -> Arc<StateMachine<&'static str>> {
        Arc::new(StateMachine::new(STATES, "disconnected").unwrap())
    }

    #[test]
    fn test_invalid_initial_state() {
        let err = StateMachine::new(STATES, "bogus").unwrap_err();
        assert!(matches!(err, StateError::InvalidState { ref state, .. } if state.as_str() == "\"bogus\""));
    }

    #[test]
    fn test_invalid_transition_keeps_state() {
        let sm = machine();
        sm.transition("connected").unwrap();
        assert!(sm.transition("bogus").is_err());
        assert_eq!(sm.state(), "connected");
    }

    #[tokio::test]
    async fn test_wait_for_active_state_is_immediate() {
        let sm = machine();
        timeout(Duration::ZERO, sm.wait_for("disconnected"))
            .await
            .expect("active state should resolve without suspending");
        assert_eq!(sm.pending_waiters(&"disconnected"), 0);
    }

    #[tokio::test]
    async fn test_wait_for_resolves_on_transition() {
        let sm = machine();
        let waiter = tokio::spawn({
            let sm = sm.clone();
            async move { sm.wait_for("connected").await }
        });

        while sm.pending_waiters(&"connected") == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!waiter.is_finished());

        sm.transition("connected").unwrap();
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(sm.pending_waiters(&"connected"), 0);
    }

    #[tokio::test]
    async fn test_all_waiters_woken_by_one_transition() {
        let sm = machine();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let sm = sm.clone();
            handles.push(tokio::spawn(async move { sm.wait_for("ready").await }));
        }

        while sm.pending_waiters(&"ready") < 5 {
            tokio::task::yield_now().await;
        }

        sm.transition("ready").unwrap();
        for handle in handles {
            timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_other_waiters_untouched() {
        let sm = machine();
        let ready = tokio::spawn({
            let sm = sm.clone();
            async move { sm.wait_for("ready").await }
        });

        while sm.pending_waiters(&"ready") == 0 {
            tokio::task::yield_now().await;
        }

        sm.transition("connected").unwrap();
        tokio::task::yield_now().await;
        assert!(!ready.is_finished());
        assert_eq!(sm.pending_waiters(&"ready"), 1);

        sm.transition("ready").unwrap();
        timeout(Duration::from_secs(1), ready).await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_is_removed() {
        let sm = machine();
        let result = timeout(Duration::from_millis(100), sm.wait_for("ready")).await;
        assert!(result.is_err());
        assert_eq!(sm.pending_waiters(&"ready"), 0);

        // A later transition has nobody left to wake.
        sm.transition("ready").unwrap();
        assert_eq!(sm.state(), "ready");
    }

    #[tokio::test]
    #[should_panic(expected = "undeclared state")]
    async fn test_wait_for_undeclared_state_panics() {
        let sm = machine();
        sm.wait_for("bogus").await;
    }
}
