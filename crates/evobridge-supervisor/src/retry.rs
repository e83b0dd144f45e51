// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory reconnection attempt counter.
//!
//! Independent of the persisted `reconnect_attempts` column: this budget is
//! what gates remediation, and it is cleared wholesale by the periodic reset
//! job.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use evobridge_core::InstanceKey;

/// Outcome of asking the budget for another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Go ahead; this is attempt number `n` (1-based).
    Proceed(u32),
    /// The budget is spent, no gateway call may be made.
    Exhausted,
}

#[derive(Debug)]
pub struct RetryBudget {
    max: u32,
    counts: Mutex<HashMap<InstanceKey, u32>>,
}

impl RetryBudget {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    fn counts(&self) -> MutexGuard<'_, HashMap<InstanceKey, u32>> {
        self.counts.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Consumes one attempt for `key`, unless the budget is already spent.
    pub fn begin(&self, key: &InstanceKey) -> Attempt {
        let mut counts = self.counts();
        let count = counts.entry(key.clone()).or_insert(0);
        if *count >= self.max {
            return Attempt::Exhausted;
        }
        *count += 1;
        Attempt::Proceed(*count)
    }

    /// Forgets `key` after a successful remediation.
    pub fn reset(&self, key: &InstanceKey) {
        self.counts().remove(key);
    }

    /// Clears every counter. Returns how many instances had one.
    pub fn clear(&self) -> usize {
        let mut counts = self.counts();
        let active = counts.values().filter(|c| **c > 0).count();
        counts.clear();
        active
    }

    pub fn attempts(&self, key: &InstanceKey) -> u32 {
        self.counts().get(key).copied().unwrap_or(0)
    }

    /// Number of instances with a non-zero counter.
    pub fn active(&self) -> usize {
        self.counts().values().filter(|c| **c > 0).count()
    }

    /// Non-zero counters ordered by key.
    pub fn snapshot(&self) -> Vec<(InstanceKey, u32)> {
        let mut entries: Vec<_> = self
            .counts()
            .iter()
            .filter(|(_, c)| **c > 0)
            .map(|(k, c)| (k.clone(), *c))
            .collect();
        entries.sort();
        entries
    }
}
