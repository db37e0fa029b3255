// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-session guard for irreversible actions (drain, delete).
//!
//! An action on an id is dispatched at most once per session unless the
//! previous attempt failed. Repeats are reported as skipped instead of
//! being sent again.

use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrreversibleAction {
    DrainVariant,
    DeleteDomain,
    DeleteTest,
    DeleteVariant,
    DeleteEndpoint,
}

impl fmt::Display for IrreversibleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IrreversibleAction::DrainVariant => "drain variant",
            IrreversibleAction::DeleteDomain => "delete domain",
            IrreversibleAction::DeleteTest => "delete test",
            IrreversibleAction::DeleteVariant => "delete variant",
            IrreversibleAction::DeleteEndpoint => "delete endpoint",
        };
        f.write_str(name)
    }
}

/// Whether a guarded action was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Dispatched,
    /// Already dispatched earlier in this session.
    Skipped,
}

#[derive(Debug, Default)]
pub struct ActionGuard {
    claimed: HashSet<(IrreversibleAction, String)>,
}

impl ActionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `action` on `id`. Returns `false` if it was already claimed.
    pub fn claim(&mut self, action: IrreversibleAction, id: &str) -> bool {
        self.claimed.insert((action, id.to_string()))
    }

    /// Give a claim back (the action failed, or was undone).
    pub fn release(&mut self, action: IrreversibleAction, id: &str) {
        self.claimed.remove(&(action, id.to_string()));
    }

    pub fn is_claimed(&self, action: IrreversibleAction, id: &str) -> bool {
        self.claimed.contains(&(action, id.to_string()))
    }

    /// Run `f` once per `(action, id)`; the claim is released if `f` fails.
    pub fn run<E, F>(&mut self, action: IrreversibleAction, id: &str, f: F) -> Result<ActionOutcome, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        if !self.claim(action, id) {
            tracing::warn!("Not repeating {} {}: already sent in this session", action, id);
            return Ok(ActionOutcome::Skipped);
        }
        match f() {
            Ok(()) => Ok(ActionOutcome::Dispatched),
            Err(e) => {
                self.release(action, id);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_is_skipped() {
        let mut guard = ActionGuard::new();
        let mut sent = 0;
        for _ in 0..3 {
            guard
                .run::<(), _>(IrreversibleAction::DrainVariant, "v1", || {
                    sent += 1;
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(sent, 1);
        assert!(guard.is_claimed(IrreversibleAction::DrainVariant, "v1"));
        assert!(!guard.is_claimed(IrreversibleAction::DeleteVariant, "v1"));
    }

    #[test]
    fn test_failure_releases_claim() {
        let mut guard = ActionGuard::new();
        let first = guard.run(IrreversibleAction::DeleteTest, "t1", || Err("boom"));
        assert_eq!(first, Err("boom"));

        let second = guard.run::<&str, _>(IrreversibleAction::DeleteTest, "t1", || Ok(()));
        assert_eq!(second, Ok(ActionOutcome::Dispatched));
    }
}
