// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight coordination of credential refreshes.
//!
//! The coordinator is either `Idle` or `Refreshing`. The first caller to ask
//! for a refresh while `Idle` becomes the leader and runs the refresh future;
//! everyone arriving while `Refreshing` parks a one-shot continuation in the
//! pending queue. When the leader's refresh settles, the outcome is broadcast
//! to every queued continuation, the queue is dropped, and the state returns
//! to `Idle`. No state carries over between episodes.

use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::RefreshRejected;

/// Outcome delivered to every participant of one refresh episode: the new
/// access credential, or the shared failure.
pub type RefreshResult = Result<String, RefreshRejected>;

enum State {
    Idle,
    Refreshing { waiters: Vec<oneshot::Sender<RefreshResult>> },
}

/// How a caller took part in a refresh episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Started the refresh; responsible for ending the session on failure.
    Leader,
    /// Joined a refresh already in flight.
    Follower,
}

/// Result of [`RefreshCoordinator::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub role: Role,
    pub result: RefreshResult,
}

/// Keeps at most one refresh in flight and fans its outcome out.
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self { state: Mutex::new(State::Idle) }
    }

    /// Whether a refresh episode is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), State::Refreshing { .. })
    }

    /// Number of callers parked on the in-flight refresh.
    pub fn pending(&self) -> usize {
        match &*self.state.lock() {
            State::Idle => 0,
            State::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Run `start` if no refresh is in flight, otherwise wait for the one
    /// that is. `start` is only invoked by the leader.
    pub async fn refresh<F, Fut>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshResult>,
    {
        match self.join() {
            Some(rx) => {
                // A dropped sender means the episode was torn down without a
                // broadcast; the settle guard makes that unreachable.
                let result = rx.await.unwrap_or(Err(RefreshRejected::Abandoned));
                RefreshOutcome { role: Role::Follower, result }
            }
            None => {
                let guard = SettleGuard { coordinator: self, armed: true };
                let result = start().await;
                guard.settle(result.clone());
                RefreshOutcome { role: Role::Leader, result }
            }
        }
    }

    /// Enter the episode: `None` makes the caller the leader, `Some` is the
    /// follower's continuation.
    fn join(&self) -> Option<oneshot::Receiver<RefreshResult>> {
        let mut state = self.state.lock();
        if let State::Refreshing { waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            trace!(pending = waiters.len(), "joined in-flight refresh");
            return Some(rx);
        }
        *state = State::Refreshing { waiters: Vec::new() };
        debug!("refresh started");
        None
    }

    /// Broadcast `result` to the queue, drop it, and return to `Idle`.
    fn settle(&self, result: RefreshResult) {
        let waiters = match std::mem::replace(&mut *self.state.lock(), State::Idle) {
            State::Refreshing { waiters } => waiters,
            State::Idle => Vec::new(),
        };
        debug!(waiters = waiters.len(), ok = result.is_ok(), "refresh settled");
        for waiter in waiters {
            // A follower that stopped waiting has dropped its receiver.
            let _ = waiter.send(result.clone());
        }
    }
}

/// Settles the episode as abandoned if the leader's future is dropped
/// before the refresh completes.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl SettleGuard<'_> {
    fn settle(mut self, result: RefreshResult) {
        self.armed = false;
        self.coordinator.settle(result);
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.settle(Err(RefreshRejected::Abandoned));
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
