//! Usage Ledger (spec §4.3): atomic increment/decrement of per-project
//! `balance`/`used`/`encumbered` counters on an external KV store.
//!
//! The production backing store is out of scope (spec §1); this module
//! defines the contract and ships an in-memory reference implementation.
//! Connection failures are modeled as `LedgerError`, which the caller
//! (the host reservation plugin) decides whether to propagate or swallow
//! based on `Config.usage_strict` — see spec §9's open question on
//! redis connection-loss policy.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("usage ledger unreachable: {0}")]
    Unreachable(String),
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub balance: f64,
    pub used: f64,
    pub encumbered: f64,
}

#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Ensures `balance`/`used`/`encumbered` counters exist for `project`,
    /// seeding `balance` from `default_allocated` when absent.
    async fn init(&self, project: &str, default_allocated: f64) -> LedgerResult<()>;

    /// Admits a request for `requested_su` service units iff
    /// `balance - encumbered - requested_su >= 0`; on success, atomically
    /// increments `encumbered` by `requested_su`.
    async fn admit(&self, project: &str, requested_su: f64) -> LedgerResult<bool>;

    /// Adjusts `encumbered` by a signed delta (lease updates, terminations).
    async fn adjust(&self, project: &str, delta_su: f64) -> LedgerResult<()>;

    /// Removes a per-user override flag.
    async fn clear_exception(&self, user: &str) -> LedgerResult<()>;

    async fn snapshot(&self, project: &str) -> LedgerResult<Usage>;
}

#[derive(Default)]
struct Counters {
    balance: HashMap<String, f64>,
    used: HashMap<String, f64>,
    encumbered: HashMap<String, f64>,
    user_exceptions: HashMap<String, bool>,
}

/// In-memory reference ledger. Never actually fails to connect — provided
/// so tests can exercise admission/adjustment logic deterministically; a
/// production deployment would back `UsageLedger` with a real KV client.
#[derive(Default)]
pub struct MapLedger {
    counters: RwLock<Counters>,
}

impl MapLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageLedger for MapLedger {
    async fn init(&self, project: &str, default_allocated: f64) -> LedgerResult<()> {
        let mut c = self.counters.write().unwrap();
        c.balance.entry(project.to_string()).or_insert(default_allocated);
        c.used.entry(project.to_string()).or_insert(0.0);
        c.encumbered.entry(project.to_string()).or_insert(0.0);
        Ok(())
    }

    async fn admit(&self, project: &str, requested_su: f64) -> LedgerResult<bool> {
        let mut c = self.counters.write().unwrap();
        let balance = *c.balance.get(project).unwrap_or(&0.0);
        let encumbered = *c.encumbered.get(project).unwrap_or(&0.0);
        let left = balance - encumbered;
        if left - requested_su < 0.0 {
            return Ok(false);
        }
        *c.encumbered.entry(project.to_string()).or_insert(0.0) += requested_su;
        Ok(true)
    }

    async fn adjust(&self, project: &str, delta_su: f64) -> LedgerResult<()> {
        let mut c = self.counters.write().unwrap();
        *c.encumbered.entry(project.to_string()).or_insert(0.0) += delta_su;
        Ok(())
    }

    async fn clear_exception(&self, user: &str) -> LedgerResult<()> {
        self.counters.write().unwrap().user_exceptions.remove(user);
        Ok(())
    }

    async fn snapshot(&self, project: &str) -> LedgerResult<Usage> {
        let c = self.counters.read().unwrap();
        Ok(Usage {
            balance: *c.balance.get(project).unwrap_or(&0.0),
            used: *c.used.get(project).unwrap_or(&0.0),
            encumbered: *c.encumbered.get(project).unwrap_or(&0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admit_succeeds_within_balance() {
        let ledger = MapLedger::new();
        ledger.init("proj-a", 100.0).await.unwrap();
        assert!(ledger.admit("proj-a", 40.0).await.unwrap());
        let usage = ledger.snapshot("proj-a").await.unwrap();
        assert_eq!(usage.encumbered, 40.0);
    }

    #[tokio::test]
    async fn admit_denies_over_budget() {
        let ledger = MapLedger::new();
        ledger.init("proj-a", 10.0).await.unwrap();
        assert!(!ledger.admit("proj-a", 12.0).await.unwrap());
        let usage = ledger.snapshot("proj-a").await.unwrap();
        assert_eq!(usage.encumbered, 0.0);
    }

    #[tokio::test]
    async fn adjust_allows_negative_delta() {
        let ledger = MapLedger::new();
        ledger.init("proj-a", 100.0).await.unwrap();
        ledger.admit("proj-a", 40.0).await.unwrap();
        ledger.adjust("proj-a", -40.0).await.unwrap();
        let usage = ledger.snapshot("proj-a").await.unwrap();
        assert_eq!(usage.encumbered, 0.0);
    }
}
