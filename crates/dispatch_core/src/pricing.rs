//! Fare calculation and the platform/driver commission split.

use crate::geometry::{distance, Point};

/// Flag-fall in currency units.
pub const BASE_FARE: f64 = 3.0;

/// Rate per unit of map distance.
pub const PER_UNIT_RATE: f64 = 10.0;

/// Share of every fare kept by the platform.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.20;

/// Fare for a trip, rounded to cents.
///
/// Formula: `fare = BASE_FARE + distance * PER_UNIT_RATE`
pub fn fare(origin: Point, destination: Point) -> f64 {
    round_cents(BASE_FARE + distance(origin, destination) * PER_UNIT_RATE)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// How one fare is divided between the platform and the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareSplit {
    pub fare: f64,
    pub commission: f64,
    pub payout: f64,
}

impl FareSplit {
    /// Split `fare` with `commission_rate` going to the platform; the driver gets the rest.
    pub fn new(fare: f64, commission_rate: f64) -> Self {
        let commission = fare * commission_rate;
        Self {
            fare,
            commission,
            payout: fare - commission,
        }
    }
}
