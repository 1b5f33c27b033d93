//! Lifecycle state machine.
//!
//! `Init → ResourcesStarting → Running → Draining → Stopped`, forward only.
//! Any state may jump ahead (a failed startup goes straight to `Stopped`),
//! none may go back.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Init,
    ResourcesStarting,
    Running,
    Draining,
    Stopped,
}

impl LifecycleState {
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Init => "init",
            LifecycleState::ResourcesStarting => "resources_starting",
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, observable lifecycle state.
#[derive(Debug, Clone)]
pub struct StateCell {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Init);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Move to `next` if it lies ahead of the current state.
    ///
    /// Returns `false`, leaving the state unchanged, for backward or
    /// repeated transitions.
    pub fn advance(&self, next: LifecycleState) -> bool {
        let mut from = LifecycleState::Init;
        let moved = self.tx.send_if_modified(|current| {
            if next > *current {
                from = *current;
                *current = next;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::info!(from = %from, to = %next, "Lifecycle transition");
        }
        moved
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Wait until the state reaches `target` or any later state.
    pub async fn reached(&self, target: LifecycleState) -> LifecycleState {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(|s| *s >= target).await {
            Ok(state) => *state,
            // The sender lives as long as `self`.
            Err(_) => self.get(),
        };
        state
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), LifecycleState::Init);

        assert!(cell.advance(LifecycleState::ResourcesStarting));
        assert!(cell.advance(LifecycleState::Running));
        assert!(!cell.advance(LifecycleState::Running));
        assert!(!cell.advance(LifecycleState::ResourcesStarting));
        assert_eq!(cell.get(), LifecycleState::Running);

        assert!(cell.advance(LifecycleState::Draining));
        assert!(!cell.advance(LifecycleState::Running));
        assert!(cell.advance(LifecycleState::Stopped));
        assert_eq!(cell.get(), LifecycleState::Stopped);
    }

    #[test]
    fn test_ordering() {
        assert!(LifecycleState::Init < LifecycleState::ResourcesStarting);
        assert!(LifecycleState::ResourcesStarting < LifecycleState::Running);
        assert!(LifecycleState::Running < LifecycleState::Draining);
        assert!(LifecycleState::Draining < LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_reached_wakes_on_later_state() {
        let cell = StateCell::new();
        let waiter = {
            let cell = cell.clone();
            tokio::spawn(async move { cell.reached(LifecycleState::Running).await })
        };
        cell.advance(LifecycleState::Stopped);
        assert_eq!(waiter.await.unwrap(), LifecycleState::Stopped);
    }
}
