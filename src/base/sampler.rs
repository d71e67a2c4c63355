//! Weighted random index sampling.
//!
//! Every parent chooser reduces to the same primitive: draw an index with
//! probability proportional to a weight vector, with replacement. The
//! sampler wraps `rand`'s alias-method `WeightedIndex` and falls back to a
//! plain uniform draw when the weights carry no information (absent, or all
//! equal, including the all-zero case produced by a generation in which
//! every individual was scored lethal).

use rand::distr::weighted::WeightedIndex;
use rand::distr::{Distribution, Uniform};
use rand::RngCore;

use crate::errors::MatingError;

/// Draws indices in `0..len` with probability proportional to a weight
/// vector. Cheap to rebuild; choosers construct one per subpopulation per
/// mating cycle.
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    kind: SamplerKind,
    len: usize,
}

#[derive(Debug, Clone)]
enum SamplerKind {
    Weighted(WeightedIndex<f64>),
    Uniform(Uniform<usize>),
}

impl WeightedSampler {
    /// Uniform sampler over `0..len`.
    pub fn uniform(len: usize) -> Result<Self, MatingError> {
        if len == 0 {
            return Err(MatingError::Config(
                "cannot sample from an empty index range".into(),
            ));
        }
        let dist = Uniform::new(0, len)
            .map_err(|e| MatingError::Config(format!("uniform sampler: {e}")))?;
        Ok(Self {
            kind: SamplerKind::Uniform(dist),
            len,
        })
    }

    /// Weighted sampler over `0..weights.len()`.
    ///
    /// Weights must be finite and non-negative. Degenerate vectors (all
    /// weights equal) use the uniform fallback.
    pub fn with_weights(weights: &[f64]) -> Result<Self, MatingError> {
        if weights.is_empty() {
            return Err(MatingError::Config(
                "cannot sample from an empty weight vector".into(),
            ));
        }
        for &w in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(MatingError::Config(format!(
                    "invalid sampling weight: {w}"
                )));
            }
        }

        let first = weights[0];
        if weights.iter().all(|&w| w == first) {
            return Self::uniform(weights.len());
        }

        let dist = WeightedIndex::new(weights)
            .map_err(|e| MatingError::Config(format!("weighted sampler: {e}")))?;
        Ok(Self {
            kind: SamplerKind::Weighted(dist),
            len: weights.len(),
        })
    }

    /// Number of indices the sampler draws from.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the sampler has no indices (never constructed; kept for API symmetry).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Draw one index.
    pub fn draw(&self, rng: &mut dyn RngCore) -> usize {
        match &self.kind {
            SamplerKind::Weighted(dist) => dist.sample(rng),
            SamplerKind::Uniform(dist) => dist.sample(rng),
        }
    }
}
