//! Scheme configuration: family-size distributions and sizing policy.

use std::fmt;
use std::sync::Arc;

use rand::{Rng, RngCore};
use rand_distr::{Binomial, Distribution, Geometric, Poisson};
use serde::{Deserialize, Serialize};

use crate::errors::MatingError;
use crate::mating::{Generation, MatingObserver, NumOffspringFn, SubPopSizeFn};
use crate::population::Population;

/// Family-size distribution selector.
///
/// Exactly one mode is active per scheme; the numeric parameters of
/// [`FamilySizeModel`] are interpreted according to the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FamilySizeMode {
    /// Constant count. With a callback the count is resolved once per
    /// generation and cached.
    Fixed,
    /// The callback is consulted anew for every family.
    PerFamily,
    /// Geometric with success probability `p`, support {1, 2, ...}.
    Geometric,
    /// Poisson with mean `lambda`.
    Poisson,
    /// Binomial over `max_num_offspring` trials with probability `p`.
    Binomial,
    /// Uniform integer in `[floor(num_offspring), max_num_offspring]`.
    UniformRange,
}

/// Offspring-count policy shared by every scheme.
///
/// `num_offspring` is the count for [`FamilySizeMode::Fixed`] and the
/// distribution parameter otherwise (`p` for geometric and binomial,
/// `lambda` for Poisson, the lower bound for the uniform range). When a
/// callback is present it supplies that value instead; except in
/// [`FamilySizeMode::PerFamily`], the callback result is cached for the
/// whole generation and re-queried after [`reset`](Self::reset).
#[derive(Clone)]
pub struct FamilySizeModel {
    num_offspring: f64,
    num_offspring_fn: Option<NumOffspringFn>,
    max_num_offspring: u64,
    mode: FamilySizeMode,
    cached_param: Option<f64>,
}

impl fmt::Debug for FamilySizeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilySizeModel")
            .field("num_offspring", &self.num_offspring)
            .field("num_offspring_fn", &self.num_offspring_fn.is_some())
            .field("max_num_offspring", &self.max_num_offspring)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Default for FamilySizeModel {
    fn default() -> Self {
        Self::fixed(1)
    }
}

impl FamilySizeModel {
    /// Constant family size without a callback.
    pub fn fixed(count: u64) -> Self {
        Self {
            num_offspring: count as f64,
            num_offspring_fn: None,
            max_num_offspring: 0,
            mode: FamilySizeMode::Fixed,
            cached_param: None,
        }
    }

    /// Create a family-size model.
    ///
    /// # Errors
    /// Returns a configuration error when the parameters are invalid for
    /// the chosen mode, or when [`FamilySizeMode::PerFamily`] is selected
    /// without a callback.
    pub fn new(
        num_offspring: f64,
        num_offspring_fn: Option<NumOffspringFn>,
        max_num_offspring: u64,
        mode: FamilySizeMode,
    ) -> Result<Self, MatingError> {
        let has_fn = num_offspring_fn.is_some();
        match mode {
            FamilySizeMode::Fixed => {
                if !has_fn {
                    check_param(mode, num_offspring)?;
                }
            }
            FamilySizeMode::PerFamily => {
                if !has_fn {
                    return Err(MatingError::Config(
                        "per-family mode requires an offspring-count callback".into(),
                    ));
                }
            }
            FamilySizeMode::Geometric | FamilySizeMode::Poisson => {
                if !has_fn {
                    check_param(mode, num_offspring)?;
                }
            }
            FamilySizeMode::Binomial => {
                if max_num_offspring < 1 {
                    return Err(MatingError::Config(
                        "binomial mode needs max_num_offspring >= 1".into(),
                    ));
                }
                if !has_fn {
                    check_param(mode, num_offspring)?;
                }
            }
            FamilySizeMode::UniformRange => {
                if !has_fn && max_num_offspring < num_offspring.floor().max(0.0) as u64 {
                    return Err(MatingError::Config(format!(
                        "uniform range [{}, {}] is empty",
                        num_offspring.floor(),
                        max_num_offspring
                    )));
                }
            }
        }

        Ok(Self {
            num_offspring,
            num_offspring_fn,
            max_num_offspring,
            mode,
            cached_param: None,
        })
    }

    /// The active distribution mode.
    pub fn mode(&self) -> FamilySizeMode {
        self.mode
    }

    /// Whether every family has the same, predetermined size.
    pub fn fixed_family_size(&self) -> bool {
        self.mode == FamilySizeMode::Fixed
    }

    /// Clear the per-generation parameter cache. Drivers call this at the
    /// start of every cycle, before any subpopulation is processed.
    pub fn reset(&mut self) {
        self.cached_param = None;
    }

    /// Number of offspring for the next family.
    pub fn num_offspring(
        &mut self,
        gen: Generation,
        rng: &mut dyn RngCore,
    ) -> Result<u64, MatingError> {
        match self.mode {
            FamilySizeMode::Fixed => {
                let n = self.param(gen)?;
                check_param(self.mode, n)?;
                Ok(n as u64)
            }
            FamilySizeMode::PerFamily => {
                let fun = self.num_offspring_fn.as_ref().ok_or_else(|| {
                    MatingError::Config("per-family mode lost its callback".into())
                })?;
                let n = fun(gen)?;
                check_param(self.mode, n)?;
                Ok(n as u64)
            }
            FamilySizeMode::Geometric => {
                let p = self.param(gen)?;
                check_param(self.mode, p)?;
                let dist = Geometric::new(p)
                    .map_err(|e| MatingError::Config(format!("geometric family size: {e}")))?;
                // rand_distr counts failures before the first success; family
                // sizes are 1-based.
                Ok(rng.sample(dist) + 1)
            }
            FamilySizeMode::Poisson => {
                let lambda = self.param(gen)?;
                check_param(self.mode, lambda)?;
                if lambda == 0.0 {
                    return Ok(0);
                }
                let dist = Poisson::new(lambda)
                    .map_err(|e| MatingError::Config(format!("poisson family size: {e}")))?;
                Ok(rng.sample(dist) as u64)
            }
            FamilySizeMode::Binomial => {
                let p = self.param(gen)?;
                check_param(self.mode, p)?;
                let dist = Binomial::new(self.max_num_offspring, p)
                    .map_err(|e| MatingError::Config(format!("binomial family size: {e}")))?;
                Ok(dist.sample(rng))
            }
            FamilySizeMode::UniformRange => {
                let lo = self.param(gen)?.floor().max(0.0) as u64;
                let hi = self.max_num_offspring;
                if hi < lo {
                    return Err(MatingError::Config(format!(
                        "uniform range [{lo}, {hi}] is empty"
                    )));
                }
                Ok(rng.random_range(lo..=hi))
            }
        }
    }

    /// Resolve the numeric parameter, consulting and caching the callback
    /// on the first use each generation.
    fn param(&mut self, gen: Generation) -> Result<f64, MatingError> {
        if let Some(v) = self.cached_param {
            return Ok(v);
        }
        let v = match &self.num_offspring_fn {
            Some(fun) => fun(gen)?,
            None => self.num_offspring,
        };
        self.cached_param = Some(v);
        Ok(v)
    }
}

/// Validate a (possibly callback-supplied) parameter for a mode.
fn check_param(mode: FamilySizeMode, value: f64) -> Result<(), MatingError> {
    let ok = match mode {
        FamilySizeMode::Fixed | FamilySizeMode::PerFamily | FamilySizeMode::UniformRange => {
            value.is_finite() && value >= 0.0
        }
        FamilySizeMode::Geometric => value > 0.0 && value <= 1.0,
        FamilySizeMode::Poisson => value.is_finite() && value >= 0.0,
        FamilySizeMode::Binomial => (0.0..=1.0).contains(&value),
    };
    if ok {
        Ok(())
    } else {
        Err(MatingError::Config(format!(
            "invalid family-size parameter {value} for {mode:?} mode"
        )))
    }
}

/// Next-generation sizing policy. Exactly one source is active, encoded by
/// the variant; absent all of them the current sizes are kept.
#[derive(Clone, Default)]
pub enum SizePolicy {
    /// Preserve current subpopulation sizes.
    #[default]
    Keep,
    /// Fixed target sizes, one per subpopulation.
    Fixed(Vec<usize>),
    /// Expression evaluated against the population's variable environment.
    Expression(String),
    /// Callback `(gen, current_sizes) -> sizes`.
    Callback(SubPopSizeFn),
}

impl fmt::Debug for SizePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => write!(f, "Keep"),
            Self::Fixed(sizes) => f.debug_tuple("Fixed").field(sizes).finish(),
            Self::Expression(expr) => f.debug_tuple("Expression").field(expr).finish(),
            Self::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

impl SizePolicy {
    /// Compute the scratch's subpopulation sizes for the next generation.
    ///
    /// # Errors
    /// Returns whatever the callback or expression evaluation produced, or
    /// a configuration error when the result length does not match the
    /// current subpopulation count.
    pub fn next_sizes(
        &self,
        pop: &Population,
        gen: Generation,
    ) -> Result<Vec<usize>, MatingError> {
        let sizes = match self {
            Self::Keep => pop.subpop_sizes(),
            Self::Fixed(sizes) => sizes.clone(),
            Self::Expression(expr) => pop
                .vars()
                .evaluate_sizes(expr)?
                .into_iter()
                .map(|v| v as usize)
                .collect(),
            Self::Callback(fun) => fun(gen, &pop.subpop_sizes())?,
        };
        if sizes.len() != pop.num_subpops() {
            return Err(MatingError::Config(format!(
                "size policy produced {} sizes for {} subpopulations",
                sizes.len(),
                pop.num_subpops()
            )));
        }
        Ok(sizes)
    }
}

/// Configuration shared by the concrete mating schemes: the family-size
/// model, the sizing policy, and an optional observer.
#[derive(Clone, Default)]
pub struct SchemeConfig {
    pub family_size: FamilySizeModel,
    pub size_policy: SizePolicy,
    pub observer: Option<Arc<dyn MatingObserver>>,
}

impl fmt::Debug for SchemeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeConfig")
            .field("family_size", &self.family_size)
            .field("size_policy", &self.size_policy)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl SchemeConfig {
    /// Create a configuration from a family-size model and sizing policy.
    pub fn new(family_size: FamilySizeModel, size_policy: SizePolicy) -> Self {
        Self {
            family_size,
            size_policy,
            observer: None,
        }
    }

    /// Install an observer.
    pub fn with_observer(mut self, observer: Arc<dyn MatingObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Shape the scratch for the next generation.
    pub(crate) fn prepare_scratch(
        &self,
        pop: &Population,
        scratch: &mut Population,
        gen: Generation,
    ) -> Result<(), MatingError> {
        let sizes = self.size_policy.next_sizes(pop, gen)?;
        scratch.resize_for_scratch(&sizes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::seeded_rng;
    use crate::genome::{GenomeLayout, Individual, Sex};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn small_pop(sizes: &[usize]) -> Population {
        let layout = Arc::new(GenomeLayout::new(2, vec![2], false).unwrap());
        let total: usize = sizes.iter().sum();
        let individuals = (0..total)
            .map(|_| Individual::new(vec![0; layout.genotype_len()], Sex::Male))
            .collect();
        Population::new(layout, individuals, sizes).unwrap()
    }

    #[test]
    fn test_fixed_mode() {
        let mut model = FamilySizeModel::fixed(3);
        let mut rng = seeded_rng(Some(1));
        assert!(model.fixed_family_size());
        assert_eq!(model.num_offspring(0, &mut rng).unwrap(), 3);
    }

    #[test]
    fn test_fixed_mode_callback_cached_per_generation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_seen = Arc::clone(&calls);
        let fun: NumOffspringFn = Arc::new(move |_gen| {
            calls_seen.fetch_add(1, Ordering::SeqCst);
            Ok(4.0)
        });
        let mut model =
            FamilySizeModel::new(0.0, Some(fun), 0, FamilySizeMode::Fixed).unwrap();
        let mut rng = seeded_rng(Some(1));

        for _ in 0..5 {
            assert_eq!(model.num_offspring(0, &mut rng).unwrap(), 4);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        model.reset();
        assert_eq!(model.num_offspring(1, &mut rng).unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_per_family_mode_calls_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_seen = Arc::clone(&calls);
        let fun: NumOffspringFn = Arc::new(move |_gen| {
            Ok(calls_seen.fetch_add(1, Ordering::SeqCst) as f64)
        });
        let mut model =
            FamilySizeModel::new(0.0, Some(fun), 0, FamilySizeMode::PerFamily).unwrap();
        let mut rng = seeded_rng(Some(1));

        assert_eq!(model.num_offspring(0, &mut rng).unwrap(), 0);
        assert_eq!(model.num_offspring(0, &mut rng).unwrap(), 1);
        assert_eq!(model.num_offspring(0, &mut rng).unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_per_family_mode_requires_callback() {
        assert!(FamilySizeModel::new(1.0, None, 0, FamilySizeMode::PerFamily).is_err());
    }

    #[test]
    fn test_geometric_mode_support_starts_at_one() {
        let mut model =
            FamilySizeModel::new(0.9, None, 0, FamilySizeMode::Geometric).unwrap();
        let mut rng = seeded_rng(Some(1));

        for _ in 0..200 {
            assert!(model.num_offspring(0, &mut rng).unwrap() >= 1);
        }
    }

    #[test]
    fn test_geometric_mode_invalid_p() {
        assert!(FamilySizeModel::new(0.0, None, 0, FamilySizeMode::Geometric).is_err());
        assert!(FamilySizeModel::new(1.5, None, 0, FamilySizeMode::Geometric).is_err());
    }

    #[test]
    fn test_poisson_mode_zero_lambda() {
        let mut model = FamilySizeModel::new(0.0, None, 0, FamilySizeMode::Poisson).unwrap();
        let mut rng = seeded_rng(Some(1));
        assert_eq!(model.num_offspring(0, &mut rng).unwrap(), 0);
    }

    #[test]
    fn test_poisson_mode_mean() {
        let mut model = FamilySizeModel::new(2.0, None, 0, FamilySizeMode::Poisson).unwrap();
        let mut rng = seeded_rng(Some(42));

        let n = 5000;
        let total: u64 = (0..n)
            .map(|_| model.num_offspring(0, &mut rng).unwrap())
            .sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 2.0).abs() < 0.1, "Poisson mean off: {mean}");
    }

    #[test]
    fn test_binomial_mode_bounded_by_max() {
        let mut model =
            FamilySizeModel::new(0.5, None, 6, FamilySizeMode::Binomial).unwrap();
        let mut rng = seeded_rng(Some(1));

        for _ in 0..200 {
            assert!(model.num_offspring(0, &mut rng).unwrap() <= 6);
        }
    }

    #[test]
    fn test_binomial_mode_needs_max() {
        assert!(FamilySizeModel::new(0.5, None, 0, FamilySizeMode::Binomial).is_err());
    }

    #[test]
    fn test_uniform_range_mode() {
        let mut model =
            FamilySizeModel::new(2.0, None, 5, FamilySizeMode::UniformRange).unwrap();
        let mut rng = seeded_rng(Some(1));

        for _ in 0..200 {
            let n = model.num_offspring(0, &mut rng).unwrap();
            assert!((2..=5).contains(&n), "uniform draw out of range: {n}");
        }
    }

    #[test]
    fn test_uniform_range_empty_rejected() {
        assert!(FamilySizeModel::new(6.0, None, 5, FamilySizeMode::UniformRange).is_err());
    }

    #[test]
    fn test_callback_error_propagates() {
        let fun: NumOffspringFn =
            Arc::new(|_gen| Err(MatingError::Callback("boom".into())));
        let mut model =
            FamilySizeModel::new(0.0, Some(fun), 0, FamilySizeMode::PerFamily).unwrap();
        let mut rng = seeded_rng(Some(1));
        assert!(matches!(
            model.num_offspring(0, &mut rng),
            Err(MatingError::Callback(_))
        ));
    }

    #[test]
    fn test_size_policy_keep() {
        let pop = small_pop(&[3, 5]);
        assert_eq!(SizePolicy::Keep.next_sizes(&pop, 0).unwrap(), vec![3, 5]);
    }

    #[test]
    fn test_size_policy_fixed() {
        let pop = small_pop(&[3, 5]);
        let policy = SizePolicy::Fixed(vec![4, 4]);
        assert_eq!(policy.next_sizes(&pop, 0).unwrap(), vec![4, 4]);
    }

    #[test]
    fn test_size_policy_fixed_wrong_length() {
        let pop = small_pop(&[3, 5]);
        let policy = SizePolicy::Fixed(vec![8]);
        assert!(policy.next_sizes(&pop, 0).is_err());
    }

    #[test]
    fn test_size_policy_callback() {
        let pop = small_pop(&[3, 5]);
        let policy = SizePolicy::Callback(Arc::new(|gen, current| {
            assert_eq!(gen, 0);
            Ok(current.iter().map(|&s| s * 2).collect())
        }));
        assert_eq!(policy.next_sizes(&pop, 0).unwrap(), vec![6, 10]);
    }

    #[test]
    fn test_size_policy_expression() {
        let mut pop = small_pop(&[3, 5]);
        pop.vars_mut()
            .bind_evaluator(Arc::new(|expr, _env| match expr {
                "subPopSizes" => Ok(vec![2, 2]),
                other => Err(MatingError::Expression(format!("unknown: {other}"))),
            }));
        let policy = SizePolicy::Expression("subPopSizes".into());
        assert_eq!(policy.next_sizes(&pop, 0).unwrap(), vec![2, 2]);
    }

    #[test]
    fn test_prepare_scratch() {
        let pop = small_pop(&[3, 5]);
        let mut scratch = pop.scratch_like();
        let config = SchemeConfig::new(
            FamilySizeModel::fixed(1),
            SizePolicy::Fixed(vec![2, 6]),
        );
        config.prepare_scratch(&pop, &mut scratch, 0).unwrap();
        assert_eq!(scratch.subpop_sizes(), vec![2, 6]);
    }
}
