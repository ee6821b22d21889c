use crate::fleet::Candidate;
use crate::model::{DriverId, RideRequest};

/// Trait for matching algorithms that pick a driver for a ride request.
///
/// Implementations must be deterministic for a fixed candidate ordering so that
/// dispatch outcomes are reproducible in tests.
pub trait MatchingAlgorithm: Send + Sync + std::fmt::Debug {
    /// Find a driver for a single request.
    ///
    /// # Arguments
    ///
    /// * `request` - The pending request; its origin is the pickup point
    /// * `candidates` - Snapshot of available drivers, in registry order
    /// * `search_radius` - Maximum Euclidean distance between driver and origin
    ///
    /// # Returns
    ///
    /// Returns `Some(driver_id)` for the chosen driver, or `None` if no candidate is within radius.
    fn find_match(
        &self,
        request: &RideRequest,
        candidates: &[Candidate],
        search_radius: f64,
    ) -> Option<DriverId>;
}
