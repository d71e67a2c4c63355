//! Base utilities shared by the mating schemes.
//!
//! This module provides the random-number plumbing (seeded generator
//! construction and the bulk Bernoulli trial table) and the weighted index
//! sampler used by every parent chooser.

mod rng;
mod sampler;

pub use rng::{seeded_rng, BernoulliTrials};
pub use sampler::WeightedSampler;
