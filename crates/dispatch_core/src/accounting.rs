//! Accounting ledger: running platform commission and per-driver payouts.
//!
//! Totals only grow, and only at trip finalization. The snapshot timestamp is the
//! time of the last recorded fare, so closing the books twice without a
//! finalization in between yields identical snapshots.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::DriverId;
use crate::pricing::FareSplit;

/// Persisted form of the accounting ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountingSnapshot {
    #[serde(default)]
    pub per_driver_total: BTreeMap<DriverId, f64>,
    #[serde(default)]
    pub company_total: f64,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Default)]
struct AccountingInner {
    books: AccountingSnapshot,
    revision: u64,
    settled_trips: u64,
}

#[derive(Debug)]
pub struct AccountingLedger {
    commission_rate: f64,
    inner: Mutex<AccountingInner>,
}

impl AccountingLedger {
    pub fn new(commission_rate: f64) -> Self {
        Self {
            commission_rate,
            inner: Mutex::new(AccountingInner::default()),
        }
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    /// Split `fare` and credit both sides.
    pub fn record(&self, driver_id: DriverId, fare: f64, now_ms: u64) -> FareSplit {
        let split = FareSplit::new(fare, self.commission_rate);
        let mut inner = self.inner.lock();
        inner.books.company_total += split.commission;
        *inner.books.per_driver_total.entry(driver_id).or_insert(0.0) += split.payout;
        inner.books.timestamp = inner.books.timestamp.max(now_ms);
        inner.revision += 1;
        inner.settled_trips += 1;
        split
    }

    /// Current books plus the revision they correspond to.
    pub fn snapshot(&self) -> (u64, AccountingSnapshot) {
        let inner = self.inner.lock();
        (inner.revision, inner.books.clone())
    }

    pub fn company_total(&self) -> f64 {
        self.inner.lock().books.company_total
    }

    pub fn driver_total(&self, driver_id: DriverId) -> f64 {
        self.inner
            .lock()
            .books
            .per_driver_total
            .get(&driver_id)
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of fares recorded so far.
    pub fn settled_trips(&self) -> u64 {
        self.inner.lock().settled_trips
    }
}

impl Default for AccountingLedger {
    fn default() -> Self {
        Self::new(crate::pricing::DEFAULT_COMMISSION_RATE)
    }
}
