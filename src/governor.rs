//! Budget governor collaborator
//!
//! A cooperative resource limiter passed explicitly into orchestration
//! calls, never held as ambient global state, so concurrent task runs in
//! a long-lived service cannot cross-contaminate budgets. Budget checks
//! are synchronous pre-flight gates: they cancel *remaining* work, not
//! work already in flight.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CG_GOV_001_BUDGET_EXHAUSTED;

/// Budget collaborator consumed by the task orchestrator.
pub trait Governor: Send + Sync {
    /// Pre-flight gate. Returns an error carrying the
    /// [`CG_GOV_001_BUDGET_EXHAUSTED`] sentinel when the budget is spent.
    fn check_budget(&self) -> Result<()>;

    /// Record token usage attributed to extraction/embedding work.
    fn record_usage(&self, tokens: u64);
}

/// Governor that never halts work.
pub struct UnlimitedGovernor;

impl Governor for UnlimitedGovernor {
    fn check_budget(&self) -> Result<()> {
        Ok(())
    }

    fn record_usage(&self, _tokens: u64) {}
}

/// Token budget backed by an atomic counter.
pub struct TokenBudget {
    limit: u64,
    used: AtomicU64,
}

impl TokenBudget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
        }
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used())
    }
}

impl Governor for TokenBudget {
    fn check_budget(&self) -> Result<()> {
        let used = self.used();
        if used >= self.limit {
            return Err(anyhow!(
                "{}: token budget exhausted ({} of {} tokens used)",
                CG_GOV_001_BUDGET_EXHAUSTED,
                used,
                self.limit
            ));
        }
        Ok(())
    }

    fn record_usage(&self, tokens: u64) {
        self.used.fetch_add(tokens, Ordering::Relaxed);
    }
}
