pub mod algorithm;
pub mod nearest;

pub use algorithm::MatchingAlgorithm;
pub use nearest::NearestRatedMatching;
