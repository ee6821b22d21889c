use std::cmp::Ordering;

use crate::fleet::Candidate;
use crate::geometry::distance;
use crate::model::{DriverId, RideRequest};

use super::algorithm::MatchingAlgorithm;

/// Closest driver within radius wins; equal distances go to the higher rating.
///
/// # Algorithm Behavior
///
/// 1. Drops candidates farther than `search_radius` from the request origin
/// 2. Orders the rest by distance ascending, then rating descending, then driver id ascending
/// 3. Returns the first, or `None` if nothing is within radius
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestRatedMatching;

impl NearestRatedMatching {
    fn rank(a: &(f64, &Candidate), b: &(f64, &Candidate)) -> Ordering {
        a.0.total_cmp(&b.0)
            .then_with(|| b.1.rating.total_cmp(&a.1.rating))
            .then_with(|| a.1.driver_id.cmp(&b.1.driver_id))
    }
}

impl MatchingAlgorithm for NearestRatedMatching {
    fn find_match(
        &self,
        request: &RideRequest,
        candidates: &[Candidate],
        search_radius: f64,
    ) -> Option<DriverId> {
        candidates
            .iter()
            .map(|candidate| (distance(candidate.location, request.origin), candidate))
            .filter(|(dist, _)| *dist <= search_radius)
            .min_by(Self::rank)
            .map(|(_, candidate)| candidate.driver_id)
    }
}
