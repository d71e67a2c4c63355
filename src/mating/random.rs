//! Sexual random mating.
//!
//! Within each subpopulation, fathers and mothers are drawn independently
//! from fitness-weighted sex partitions; each pairing founds a family whose
//! size comes from the configured family-size model. Offspring genotypes
//! are built by free recombination over whole chromosome copies, with
//! Mendelian sex-chromosome handling when the layout declares one.
//!
//! Requires a diploid population. A subpopulation holding a single sex
//! fails the cycle unless `cont_when_uni_sex` permits same-sex mating.

use std::fmt;

use rand::RngCore;

use crate::errors::MatingError;
use crate::mating::binomial::MAX_EMPTY_FAMILIES;
use crate::mating::{
    commit_scratch, DuringMatingOperator, MatingScheme, OffspringGenerator, SchemeConfig,
    SexedParentChooser,
};
use crate::population::Population;

/// Sexual random mating scheme.
#[derive(Debug, Clone)]
pub struct RandomMating {
    config: SchemeConfig,
    cont_when_uni_sex: bool,
    fam_sizes: Vec<i64>,
}

impl RandomMating {
    /// Create the scheme from a shared configuration.
    pub fn new(config: SchemeConfig, cont_when_uni_sex: bool) -> Self {
        Self {
            config,
            cont_when_uni_sex,
            fam_sizes: Vec::new(),
        }
    }
}

impl fmt::Display for RandomMating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sexual random mating")
    }
}

impl MatingScheme for RandomMating {
    fn is_compatible(&self, pop: &Population) -> Result<(), MatingError> {
        if pop.ploidy() != 2 {
            return Err(MatingError::Incompatible(
                "sexual random mating requires a diploid population".into(),
            ));
        }
        Ok(())
    }

    fn mate(
        &mut self,
        pop: &mut Population,
        scratch: &mut Population,
        ops: &mut [Box<dyn DuringMatingOperator>],
        submit: bool,
        rng: &mut dyn RngCore,
    ) -> Result<(), MatingError> {
        self.is_compatible(pop)?;
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

            let chooser = SexedParentChooser::prepare(
                pop,
                sp,
                self.cont_when_uni_sex,
                self.config.observer.as_deref(),
            )?;
            let mut empty_streak = 0u32;

            while cursor < end {
                let (dad, mom) = chooser.choose(rng);
                if let Some(observer) = &self.config.observer {
                    observer.on_parents(sp, dad, Some(mom));
                }
                let k = self.config.family_size.num_offspring(gen, rng)?;
                let new_cursor = generator
                    .generate_offspring(pop, scratch, dad, mom, k, cursor, end, ops, rng)?;
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
    use std::sync::Arc;

    /// Ten diploid individuals, 5 males (ids 0..5) and 5 females (5..10);
    /// parent `i` carries allele `i` everywhere.
    fn sexed_pop() -> Population {
        let layout = Arc::new(GenomeLayout::new(2, vec![3, 2], false).unwrap());
        let individuals = (0..10u8)
            .map(|i| {
                Individual::new(
                    vec![i; layout.genotype_len()],
                    if i < 5 { Sex::Male } else { Sex::Female },
                )
            })
            .collect();
        Population::new(layout, individuals, &[]).unwrap()
    }

    #[test]
    fn test_incompatible_with_haploid() {
        let layout = Arc::new(GenomeLayout::new(1, vec![2], false).unwrap());
        let pop = Population::new(
            layout.clone(),
            vec![Individual::new(vec![0; 2], Sex::Male)],
            &[],
        )
        .unwrap();

        let scheme = RandomMating::new(SchemeConfig::default(), true);
        assert!(matches!(
            scheme.is_compatible(&pop),
            Err(MatingError::Incompatible(_))
        ));
    }

    #[test]
    fn test_offspring_have_one_parent_of_each_sex() {
        let mut pop = sexed_pop();
        let mut scratch = pop.scratch_like();
        let mut ops: Vec<Box<dyn DuringMatingOperator>> = Vec::new();
        let mut rng = seeded_rng(Some(42));

        let mut scheme = RandomMating::new(SchemeConfig::default(), false);
        scheme.is_compatible(&pop).unwrap();
        scheme
            .mate(&mut pop, &mut scratch, &mut ops, true, &mut rng)
            .unwrap();

        assert_eq!(pop.size(), 10);
        let total = pop.layout().total_loci();
        for ind in pop.individuals() {
            // Copy 0 is maternal (parent ids 5..10), copy 1 paternal (0..5).
            assert!(ind.genotype()[0] >= 5, "maternal copy from a male parent");
            assert!(ind.genotype()[total] < 5, "paternal copy from a female parent");
        }
    }

    #[test]
    fn test_uni_sex_subpop_fails_and_preserves_population() {
        let layout = Arc::new(GenomeLayout::new(2, vec![2], false).unwrap());
        let individuals = (0..4u8)
            .map(|i| Individual::new(vec![i; layout.genotype_len()], Sex::Male))
            .collect();
        let mut pop = Population::new(layout, individuals, &[]).unwrap();
        let before = pop.individuals().to_vec();

        let mut scratch = pop.scratch_like();
        let mut ops: Vec<Box<dyn DuringMatingOperator>> = Vec::new();
        let mut rng = seeded_rng(Some(42));

        let mut scheme = RandomMating::new(SchemeConfig::default(), false);
        let result = scheme.mate(&mut pop, &mut scratch, &mut ops, true, &mut rng);

        assert!(matches!(result, Err(MatingError::Infeasible(_))));
        assert_eq!(pop.individuals(), &before[..]);
    }

    #[test]
    fn test_uni_sex_subpop_continues_with_fallback() {
        let layout = Arc::new(GenomeLayout::new(2, vec![2], false).unwrap());
        let individuals = (0..4u8)
            .map(|i| Individual::new(vec![i; layout.genotype_len()], Sex::Male))
            .collect();
        let mut pop = Population::new(layout, individuals, &[]).unwrap();

        let mut scratch = pop.scratch_like();
        let mut ops: Vec<Box<dyn DuringMatingOperator>> = Vec::new();
        let mut rng = seeded_rng(Some(42));

        let mut scheme = RandomMating::new(SchemeConfig::default(), true);
        scheme
            .mate(&mut pop, &mut scratch, &mut ops, true, &mut rng)
            .unwrap();

        assert_eq!(pop.size(), 4);
    }

    #[test]
    fn test_clone_mates_identically() {
        let pop0 = sexed_pop();

        let mut scheme = RandomMating::new(SchemeConfig::default(), true);
        let mut cloned = scheme.clone_scheme();
        let mut ops: Vec<Box<dyn DuringMatingOperator>> = Vec::new();

        let mut pop1 = pop0.clone();
        let mut scratch1 = pop1.scratch_like();
        let mut rng1 = seeded_rng(Some(42));
        scheme
            .mate(&mut pop1, &mut scratch1, &mut ops, true, &mut rng1)
            .unwrap();

        let mut pop2 = pop0.clone();
        let mut scratch2 = pop2.scratch_like();
        let mut rng2 = seeded_rng(Some(42));
        cloned
            .mate(&mut pop2, &mut scratch2, &mut ops, true, &mut rng2)
            .unwrap();

        assert_eq!(pop1.individuals(), pop2.individuals());
    }
}
