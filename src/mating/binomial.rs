//! Asexual binomial random selection.
//!
//! Parents are drawn with replacement from the whole subpopulation,
//! weighted by fitness when selection is active. Each draw founds a family
//! whose size comes from the configured family-size model; offspring are
//! clones of their single parent. Works for haploid and diploid
//! populations; with haploid input this is chromosomal mating.

use std::fmt;

use rand::RngCore;

use crate::errors::MatingError;
use crate::mating::{
    commit_scratch, DuringMatingOperator, MatingScheme, OffspringGenerator, SchemeConfig,
    WeightedParentChooser,
};
use crate::population::Population;

/// Consecutive empty families tolerated before the cycle is declared stuck.
/// Guards against a family-size model that can only produce zeros.
pub(crate) const MAX_EMPTY_FAMILIES: u32 = 1 << 16;

/// Asexual fitness-weighted mating scheme.
#[derive(Debug, Clone)]
pub struct BinomialSelection {
    config: SchemeConfig,
    fam_sizes: Vec<i64>,
}

impl BinomialSelection {
    /// Create the scheme from a shared configuration.
    pub fn new(config: SchemeConfig) -> Self {
        Self {
            config,
            fam_sizes: Vec::new(),
        }
    }
}

impl fmt::Display for BinomialSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binomial random selection")
    }
}

impl MatingScheme for BinomialSelection {
    fn mate(
        &mut self,
        pop: &mut Population,
        scratch: &mut Population,
        ops: &mut [Box<dyn DuringMatingOperator>],
        submit: bool,
        rng: &mut dyn RngCore,
    ) -> Result<(), MatingError> {
        self.config.family_size.reset();
        let gen = pop.generation();
        self.config.prepare_scratch(pop, scratch, gen)?;
        self.fam_sizes.clear();

        let mut generator = OffspringGenerator::new(pop, ops);

        for sp in 0..pop.num_subpops() {
            let end = scratch.subpop_end(sp);
            let mut cursor = scratch.subpop_begin(sp);
            if cursor == end {
                continue;
            }

            let chooser = WeightedParentChooser::prepare(pop, sp)?;
            let mut empty_streak = 0u32;

            while cursor < end {
                let parent = chooser.choose(rng);
                if let Some(observer) = &self.config.observer {
                    observer.on_parents(sp, parent, None);
                }
                let k = self.config.family_size.num_offspring(gen, rng)?;
                let new_cursor = generator
                    .copy_offspring(pop, scratch, parent, k, cursor, end, ops, rng)?;
                let produced = new_cursor - cursor;
                if produced == 0 {
                    empty_streak += 1;
                    if empty_streak > MAX_EMPTY_FAMILIES {
                        return Err(MatingError::Infeasible(format!(
                            "subpopulation {sp} produced {MAX_EMPTY_FAMILIES} empty families in a row"
                        )));
                    }
                    continue;
                }
                empty_streak = 0;
                self.fam_sizes.push(produced as i64);
                if let Some(observer) = &self.config.observer {
                    observer.on_family(sp, produced);
                }
                cursor = new_cursor;
            }
        }

        if submit {
            self.submit_scratch(pop, scratch);
        }
        Ok(())
    }

    fn submit_scratch(&self, pop: &mut Population, scratch: &mut Population) {
        let fam_sizes = self
            .config
            .observer
            .is_some()
            .then_some(self.fam_sizes.as_slice());
        commit_scratch(pop, scratch, fam_sizes);
    }

    fn clone_scheme(&self) -> Box<dyn MatingScheme> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::seeded_rng;
    use crate::genome::{GenomeLayout, Individual, Sex};
    use crate::mating::{FamilySizeModel, SizePolicy};
    use std::sync::Arc;

    fn haploid_pop(alleles: &[u8]) -> Population {
        let layout = Arc::new(GenomeLayout::new(1, vec![1], false).unwrap());
        let individuals = alleles
            .iter()
            .map(|&a| Individual::new(vec![a], Sex::Male))
            .collect();
        Population::new(layout, individuals, &[]).unwrap()
    }

    #[test]
    fn test_mate_fills_scratch_and_commits() {
        let mut pop = haploid_pop(&[1, 2, 3, 4]);
        let mut scratch = pop.scratch_like();
        let mut ops: Vec<Box<dyn DuringMatingOperator>> = Vec::new();
        let mut rng = seeded_rng(Some(42));

        let mut scheme = BinomialSelection::new(SchemeConfig::default());
        scheme
            .mate(&mut pop, &mut scratch, &mut ops, true, &mut rng)
            .unwrap();

        assert_eq!(pop.size(), 4);
        assert!(pop
            .individuals()
            .iter()
            .all(|ind| (1..=4).contains(&ind.genotype()[0])));
        // Scratch was consumed by the commit.
        assert_eq!(scratch.size(), 0);
    }

    #[test]
    fn test_mate_without_submit_leaves_parents() {
        let mut pop = haploid_pop(&[1, 2, 3, 4]);
        let before = pop.individuals().to_vec();
        let mut scratch = pop.scratch_like();
        let mut ops: Vec<Box<dyn DuringMatingOperator>> = Vec::new();
        let mut rng = seeded_rng(Some(42));

        let mut scheme = BinomialSelection::new(SchemeConfig::default());
        scheme
            .mate(&mut pop, &mut scratch, &mut ops, false, &mut rng)
            .unwrap();

        assert_eq!(pop.individuals(), &before[..]);
        assert_eq!(scratch.size(), 4);
    }

    #[test]
    fn test_selection_weights_respected() {
        let mut pop = haploid_pop(&[1, 2, 3]);
        for i in 0..3 {
            pop.individual_mut(i).set_fitness(if i == 1 { 1.0 } else { 0.0 });
        }
        pop.set_bool_var("selection", true);

        let mut scratch = pop.scratch_like();
        let mut ops: Vec<Box<dyn DuringMatingOperator>> = Vec::new();
        let mut rng = seeded_rng(Some(42));

        let mut scheme = BinomialSelection::new(SchemeConfig::default());
        scheme
            .mate(&mut pop, &mut scratch, &mut ops, true, &mut rng)
            .unwrap();

        // Only the fit parent reproduces.
        assert!(pop.individuals().iter().all(|ind| ind.genotype()[0] == 2));
        // The commit cleared the selection flag.
        assert!(!pop.selection_active());
    }

    #[test]
    fn test_resize_during_mating() {
        let mut pop = haploid_pop(&[1, 2, 3, 4]);
        let mut scratch = pop.scratch_like();
        let mut ops: Vec<Box<dyn DuringMatingOperator>> = Vec::new();
        let mut rng = seeded_rng(Some(42));

        let config = SchemeConfig::new(FamilySizeModel::fixed(1), SizePolicy::Fixed(vec![10]));
        let mut scheme = BinomialSelection::new(config);
        scheme
            .mate(&mut pop, &mut scratch, &mut ops, true, &mut rng)
            .unwrap();

        assert_eq!(pop.size(), 10);
    }

    #[test]
    fn test_clone_scheme_display() {
        let scheme = BinomialSelection::new(SchemeConfig::default());
        let cloned = scheme.clone_scheme();
        assert_eq!(cloned.to_string(), "binomial random selection");
    }
}
