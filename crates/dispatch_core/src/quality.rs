//! Rating aggregation and audit sampling.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::{ClientId, DriverId, TripId};

/// Running mean of ratings and how many went into it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub average: f64,
    pub count: u32,
}

impl QualityRecord {
    /// Fold one more rating in: `avg' = (avg * n + value) / (n + 1)`.
    pub fn record(&mut self, value: f64) {
        let n = f64::from(self.count);
        self.average = (self.average * n + value) / (n + 1.0);
        self.count += 1;
    }
}

/// Fold `(key, rating)` pairs into per-key running means. Unrated entries are skipped.
pub fn fold_ratings<K, I>(ratings: I) -> BTreeMap<K, QualityRecord>
where
    K: Ord,
    I: IntoIterator<Item = (K, Option<f64>)>,
{
    let mut records: BTreeMap<K, QualityRecord> = BTreeMap::new();
    for (key, rating) in ratings {
        if let Some(value) = rating {
            records.entry(key).or_default().record(value);
        }
    }
    records
}

#[derive(Debug, Default)]
struct RunningTallies {
    drivers: BTreeMap<DriverId, QualityRecord>,
    clients: BTreeMap<ClientId, QualityRecord>,
}

/// Incrementally maintained rating means, updated at every rated finalization.
#[derive(Debug, Default)]
pub struct QualityTracker {
    tallies: Mutex<RunningTallies>,
}

impl QualityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, driver_id: DriverId, client_id: ClientId, rating: f64) {
        let mut tallies = self.tallies.lock();
        tallies.drivers.entry(driver_id).or_default().record(rating);
        tallies.clients.entry(client_id).or_default().record(rating);
    }

    pub fn driver(&self, driver_id: DriverId) -> Option<QualityRecord> {
        self.tallies.lock().drivers.get(&driver_id).copied()
    }

    pub fn client(&self, client_id: ClientId) -> Option<QualityRecord> {
        self.tallies.lock().clients.get(&client_id).copied()
    }

    pub fn drivers(&self) -> BTreeMap<DriverId, QualityRecord> {
        self.tallies.lock().drivers.clone()
    }

    pub fn clients(&self) -> BTreeMap<ClientId, QualityRecord> {
        self.tallies.lock().clients.clone()
    }
}

/// Choose up to `max_count` distinct trips uniformly at random from `finished`.
pub fn sample_for_audit<R: Rng + ?Sized>(
    finished: &[TripId],
    max_count: usize,
    rng: &mut R,
) -> Vec<TripId> {
    let amount = max_count.min(finished.len());
    if amount == 0 {
        return Vec::new();
    }
    rand::seq::index::sample(rng, finished.len(), amount)
        .into_iter()
        .map(|index| finished[index])
        .collect()
}
