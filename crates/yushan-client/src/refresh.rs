//! Renewal coordination
//!
//! Serializes concurrent credential renewals into a single in-flight call.
//! One mutex guards both the in-flight flag and the queue of pending
//! requests, so checking the state and entering it is one atomic step:
//! at most one renewal network call exists at any instant, and every
//! authorization failure observed while it is outstanding joins the queue
//! instead of starting a second call.
//!
//! The pipeline's flow per renewal cycle:
//! 1. A request fails authorization while the coordinator is idle. Its
//!    `begin()` returns [`Role::Leader`]; it performs the renewal call.
//! 2. Requests failing while the call is outstanding get
//!    [`Role::Follower`] with a receiver tied to this cycle.
//! 3. The leader calls `settle()` with the shared outcome, which returns
//!    the coordinator to idle and releases the queue in arrival order.

use tokio::sync::{Mutex, oneshot};
use tracing::debug;

use crate::error::Error;

/// Outcome shared by every request waiting on one renewal: the new access
/// token, or the renewal failure.
pub(crate) type RenewalOutcome = std::result::Result<String, Error>;

/// Role handed to a request that hit a recoverable authorization failure.
pub(crate) enum Role {
    /// First failure while idle: this request performs the renewal call
    /// and must settle the queue afterwards.
    Leader,
    /// A renewal is already outstanding: await its settlement.
    Follower(oneshot::Receiver<RenewalOutcome>),
}

/// Coordinator state. The flag and the queue are one unit: `Refreshing`
/// exists exactly while a renewal call is outstanding, and only then may
/// the queue be non-empty.
enum State {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RenewalOutcome>>,
    },
}

pub(crate) struct RefreshCoordinator {
    state: Mutex<State>,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::Idle),
        }
    }

    /// Enter the renewal path. Exactly one caller per cycle is elected
    /// leader; everyone else is queued in arrival order.
    pub(crate) async fn begin(&self) -> Role {
        let mut state = self.state.lock().await;
        match &mut *state {
            State::Idle => {
                *state = State::Refreshing {
                    waiters: Vec::new(),
                };
                Role::Leader
            }
            State::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                debug!(queued = waiters.len(), "renewal in flight, queued request");
                Role::Follower(rx)
            }
        }
    }

    /// Settle the outstanding renewal: return to idle and release every
    /// queued request in FIFO order with the shared outcome.
    pub(crate) async fn settle(&self, outcome: &RenewalOutcome) {
        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, State::Idle) {
                State::Refreshing { waiters } => waiters,
                State::Idle => Vec::new(),
            }
        };

        if !waiters.is_empty() {
            debug!(
                released = waiters.len(),
                renewed = outcome.is_ok(),
                "releasing queued requests"
            );
        }
        for waiter in waiters {
            // A closed receiver means the waiting task is gone; skip it.
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn first_entrant_leads() {
        let coordinator = RefreshCoordinator::new();
        assert!(matches!(coordinator.begin().await, Role::Leader));
    }

    #[tokio::test]
    async fn entrants_during_renewal_are_queued_not_elected() {
        let coordinator = RefreshCoordinator::new();
        assert!(matches!(coordinator.begin().await, Role::Leader));

        for _ in 0..3 {
            assert!(matches!(coordinator.begin().await, Role::Follower(_)));
        }
    }

    #[tokio::test]
    async fn settle_releases_every_waiter_with_shared_outcome() {
        let coordinator = RefreshCoordinator::new();
        assert!(matches!(coordinator.begin().await, Role::Leader));

        let mut receivers = Vec::new();
        for _ in 0..5 {
            match coordinator.begin().await {
                Role::Follower(rx) => receivers.push(rx),
                Role::Leader => panic!("second leader during one renewal cycle"),
            }
        }

        coordinator.settle(&Ok("at_new".into())).await;

        for rx in receivers {
            let outcome = rx.await.expect("waiter must be released on settle");
            assert_eq!(outcome.unwrap(), "at_new");
        }
    }

    #[tokio::test]
    async fn settle_with_failure_rejects_every_waiter() {
        let coordinator = RefreshCoordinator::new();
        assert!(matches!(coordinator.begin().await, Role::Leader));

        let receivers: Vec<_> = {
            let mut v = Vec::new();
            for _ in 0..3 {
                match coordinator.begin().await {
                    Role::Follower(rx) => v.push(rx),
                    Role::Leader => panic!("second leader during one renewal cycle"),
                }
            }
            v
        };

        coordinator
            .settle(&Err(Error::SessionExpired("refresh token rejected".into())))
            .await;

        for rx in receivers {
            let outcome = rx.await.unwrap();
            assert!(matches!(outcome, Err(Error::SessionExpired(_))));
        }
    }

    #[tokio::test]
    async fn settle_returns_coordinator_to_idle() {
        let coordinator = RefreshCoordinator::new();
        assert!(matches!(coordinator.begin().await, Role::Leader));
        coordinator.settle(&Ok("at_1".into())).await;

        // A fresh cycle elects a fresh leader
        assert!(matches!(coordinator.begin().await, Role::Leader));
    }

    #[tokio::test]
    async fn concurrent_begins_elect_exactly_one_leader() {
        let coordinator = Arc::new(RefreshCoordinator::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                matches!(coordinator.begin().await, Role::Leader)
            }));
        }

        let mut leaders = 0;
        for h in handles {
            if h.await.unwrap() {
                leaders += 1;
            }
        }
        assert_eq!(leaders, 1, "exactly one task may lead a renewal cycle");
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_block_settlement() {
        let coordinator = RefreshCoordinator::new();
        assert!(matches!(coordinator.begin().await, Role::Leader));

        let abandoned = match coordinator.begin().await {
            Role::Follower(rx) => rx,
            Role::Leader => panic!("second leader during one renewal cycle"),
        };
        let kept = match coordinator.begin().await {
            Role::Follower(rx) => rx,
            Role::Leader => panic!("second leader during one renewal cycle"),
        };
        drop(abandoned);

        coordinator.settle(&Ok("at_new".into())).await;
        assert_eq!(kept.await.unwrap().unwrap(), "at_new");
    }
}
