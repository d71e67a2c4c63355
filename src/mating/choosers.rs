//! Parent choosers.
//!
//! A chooser is prepared once per subpopulation per cycle: it scans the
//! parental generation, builds the weighted samplers it needs, and then
//! hands out parents with replacement for the driver loop. Weights come
//! from the individuals' cached fitness scores when the population's
//! `selection` flag is set; otherwise every parent is equally likely.

use rand::RngCore;
use tracing::warn;

use crate::base::WeightedSampler;
use crate::errors::MatingError;
use crate::genome::Sex;
use crate::mating::MatingObserver;
use crate::population::Population;

/// Fitness-weighted chooser over a whole subpopulation, for asexual schemes.
#[derive(Debug)]
pub struct WeightedParentChooser {
    begin: usize,
    sampler: WeightedSampler,
}

impl WeightedParentChooser {
    /// Scan `subpop` and build the sampler.
    pub fn prepare(pop: &Population, subpop: usize) -> Result<Self, MatingError> {
        let begin = pop.subpop_begin(subpop);
        let end = pop.subpop_end(subpop);
        if begin == end {
            return Err(MatingError::Infeasible(format!(
                "subpopulation {subpop} has no parents"
            )));
        }

        let sampler = if pop.selection_active() {
            let weights: Vec<f64> = pop.individuals()[begin..end]
                .iter()
                .map(|ind| ind.fitness().unwrap_or(1.0))
                .collect();
            WeightedSampler::with_weights(&weights)?
        } else {
            WeightedSampler::uniform(end - begin)?
        };

        Ok(Self { begin, sampler })
    }

    /// Draw one parent (index into the population), with replacement.
    pub fn choose(&self, rng: &mut dyn RngCore) -> usize {
        self.begin + self.sampler.draw(rng)
    }
}

/// Sex-partitioned chooser for sexual schemes.
///
/// The subpopulation is scanned once into male and female index lists with
/// parallel fitness weights. If one sex is missing and `cont_when_uni_sex`
/// is set, a warning is emitted and both parents are drawn from the
/// remaining sex; otherwise preparation fails and the cycle aborts without
/// committing.
#[derive(Debug)]
pub struct SexedParentChooser {
    males: Vec<usize>,
    females: Vec<usize>,
    male_sampler: WeightedSampler,
    female_sampler: WeightedSampler,
    fallback: bool,
}

impl SexedParentChooser {
    /// Scan `subpop`, partition by sex, and build both samplers.
    pub fn prepare(
        pop: &Population,
        subpop: usize,
        cont_when_uni_sex: bool,
        observer: Option<&dyn MatingObserver>,
    ) -> Result<Self, MatingError> {
        let begin = pop.subpop_begin(subpop);
        let end = pop.subpop_end(subpop);
        let selection = pop.selection_active();

        let mut males = Vec::new();
        let mut females = Vec::new();
        let mut male_weights = Vec::new();
        let mut female_weights = Vec::new();

        for index in begin..end {
            let ind = pop.individual(index);
            match ind.sex() {
                Sex::Male => {
                    males.push(index);
                    if selection {
                        male_weights.push(ind.fitness().unwrap_or(1.0));
                    }
                }
                Sex::Female => {
                    females.push(index);
                    if selection {
                        female_weights.push(ind.fitness().unwrap_or(1.0));
                    }
                }
            }
        }

        if males.is_empty() && females.is_empty() {
            return Err(MatingError::Infeasible(format!(
                "subpopulation {subpop} has no parents"
            )));
        }

        let mut fallback = false;
        if males.is_empty() || females.is_empty() {
            if !cont_when_uni_sex {
                let missing = if males.is_empty() { "males" } else { "females" };
                return Err(MatingError::Infeasible(format!(
                    "subpopulation {subpop} has no {missing}"
                )));
            }
            warn!(
                subpop,
                "subpopulation contains a single sex; continuing with same-sex mating"
            );
            if let Some(observer) = observer {
                observer.on_uni_sex_fallback(subpop);
            }
            fallback = true;
            if males.is_empty() {
                males = females.clone();
                male_weights = female_weights.clone();
            } else {
                females = males.clone();
                female_weights = male_weights.clone();
            }
        }

        let male_sampler = if selection {
            WeightedSampler::with_weights(&male_weights)?
        } else {
            WeightedSampler::uniform(males.len())?
        };
        let female_sampler = if selection {
            WeightedSampler::with_weights(&female_weights)?
        } else {
            WeightedSampler::uniform(females.len())?
        };

        Ok(Self {
            males,
            females,
            male_sampler,
            female_sampler,
            fallback,
        })
    }

    /// Draw one father and one mother independently, with replacement.
    /// Returns `(dad, mom)` as indices into the population.
    pub fn choose(&self, rng: &mut dyn RngCore) -> (usize, usize) {
        let dad = self.males[self.male_sampler.draw(rng)];
        let mom = self.females[self.female_sampler.draw(rng)];
        (dad, mom)
    }

    /// Whether the uni-sex fallback was engaged for this subpopulation.
    pub fn fallback_engaged(&self) -> bool {
        self.fallback
    }
}
