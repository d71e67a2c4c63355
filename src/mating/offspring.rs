//! Offspring construction.
//!
//! [`OffspringGenerator`] turns chosen parents into offspring written into
//! the scratch generation. It is built once per mating cycle: the decision
//! of who fills the genotype (the generator, or a during-mating operator
//! flagged as genotype-forming), the chromosome index ranges, and the
//! sex-chromosome flag are all cached up front, and the Bernoulli trial
//! table for free recombination is drawn in bulk and reused across
//! offspring.

use rand::{Rng, RngCore};

use crate::base::BernoulliTrials;
use crate::errors::MatingError;
use crate::genome::Sex;
use crate::mating::DuringMatingOperator;
use crate::population::Population;
use std::ops::Range;

/// Writes offspring genotypes into scratch slots and runs the during-mating
/// operators on each of them.
#[derive(Debug)]
pub struct OffspringGenerator {
    /// Fair-coin table for free recombination.
    bt: BernoulliTrials,
    /// Whether the generator itself writes the genotype. False when some
    /// operator in the list is genotype-forming; decided once per cycle.
    form_offspring_genotype: bool,
    has_sex_chromosome: bool,
    total_loci: usize,
    /// Chromosome index ranges within one copy, cached from the layout.
    chrom_ranges: Vec<Range<usize>>,
}

impl OffspringGenerator {
    /// Capture layout facts and decide genotype ownership for this cycle.
    pub fn new(pop: &Population, ops: &[Box<dyn DuringMatingOperator>]) -> Self {
        let layout = pop.layout();
        Self {
            bt: BernoulliTrials::new(),
            form_offspring_genotype: !ops.iter().any(|op| op.forms_offspring_genotype()),
            has_sex_chromosome: layout.has_sex_chromosome(),
            total_loci: layout.total_loci(),
            chrom_ranges: layout.chrom_ranges(),
        }
    }

    /// Whether the generator writes offspring genotypes itself.
    pub fn forms_offspring_genotype(&self) -> bool {
        self.form_offspring_genotype
    }

    /// Produce one sexual offspring of `dad` x `mom` into the scratch slot
    /// at `cursor`. Returns whether the offspring was accepted by every
    /// during-mating operator; a rejected offspring leaves the slot free to
    /// be retried.
    pub fn sexual_one(
        &mut self,
        pop: &Population,
        scratch: &mut Population,
        dad: usize,
        mom: usize,
        cursor: usize,
        ops: &mut [Box<dyn DuringMatingOperator>],
        rng: &mut dyn RngCore,
    ) -> Result<bool, MatingError> {
        scratch.individual_mut(cursor).clear_fitness();
        if self.form_offspring_genotype {
            self.transmit(pop, scratch, dad, mom, cursor, rng);
        }
        self.apply_ops(pop, scratch, cursor, Some(dad), Some(mom), ops)
    }

    /// Produce one asexual offspring (a copy of `parent`) into the scratch
    /// slot at `cursor`. For haploid populations this is the direct copy of
    /// the single chromosome copy per chromosome; for diploids the whole
    /// genotype is copied.
    pub fn asexual_one(
        &mut self,
        pop: &Population,
        scratch: &mut Population,
        parent: usize,
        cursor: usize,
        ops: &mut [Box<dyn DuringMatingOperator>],
        _rng: &mut dyn RngCore,
    ) -> Result<bool, MatingError> {
        scratch.individual_mut(cursor).clear_fitness();
        if self.form_offspring_genotype {
            let src = pop.individual(parent);
            let sex = src.sex();
            let slot = scratch.individual_mut(cursor);
            slot.genotype_mut().copy_from_slice(src.genotype());
            slot.set_sex(sex);
        }
        self.apply_ops(pop, scratch, cursor, Some(parent), None, ops)
    }

    /// Write up to `num_off` sexual offspring starting at `cursor`, never
    /// crossing `sp_end`. Operator-rejected offspring consume an attempt
    /// without advancing the cursor. Returns the new cursor.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_offspring(
        &mut self,
        pop: &Population,
        scratch: &mut Population,
        dad: usize,
        mom: usize,
        num_off: u64,
        cursor: usize,
        sp_end: usize,
        ops: &mut [Box<dyn DuringMatingOperator>],
        rng: &mut dyn RngCore,
    ) -> Result<usize, MatingError> {
        let mut cursor = cursor;
        for _ in 0..num_off {
            if cursor >= sp_end {
                break;
            }
            if self.sexual_one(pop, scratch, dad, mom, cursor, ops, rng)? {
                cursor += 1;
            }
        }
        Ok(cursor)
    }

    /// Asexual counterpart of [`generate_offspring`](Self::generate_offspring).
    #[allow(clippy::too_many_arguments)]
    pub fn copy_offspring(
        &mut self,
        pop: &Population,
        scratch: &mut Population,
        parent: usize,
        num_off: u64,
        cursor: usize,
        sp_end: usize,
        ops: &mut [Box<dyn DuringMatingOperator>],
        rng: &mut dyn RngCore,
    ) -> Result<usize, MatingError> {
        let mut cursor = cursor;
        for _ in 0..num_off {
            if cursor >= sp_end {
                break;
            }
            if self.asexual_one(pop, scratch, parent, cursor, ops, rng)? {
                cursor += 1;
            }
        }
        Ok(cursor)
    }

    /// Free-recombination transmission: per chromosome, one parental copy is
    /// drawn with a fair coin and copied whole. The maternal contribution
    /// lands on copy 0, the paternal on copy 1. With a sex chromosome
    /// declared, the father transmits X or Y with equal probability and the
    /// offspring sex follows; otherwise the sex is drawn uniformly.
    fn transmit(
        &mut self,
        pop: &Population,
        scratch: &mut Population,
        dad: usize,
        mom: usize,
        cursor: usize,
        rng: &mut dyn RngCore,
    ) {
        let total = self.total_loci;
        let n_chrom = self.chrom_ranges.len();
        let mut sex = None;

        for c in 0..n_chrom {
            let range = self.chrom_ranges[c].clone();
            let sex_chrom = self.has_sex_chromosome && c == n_chrom - 1;

            // Maternal copy: both of a mother's sex-chromosome copies are X,
            // so the fair coin applies to every chromosome.
            let m_copy = usize::from(self.bt.draw(rng));
            let src = &pop.individual(mom).genotype()
                [m_copy * total + range.start..m_copy * total + range.end];
            scratch.individual_mut(cursor).genotype_mut()[range.start..range.end]
                .copy_from_slice(src);

            // Paternal copy: for the sex chromosome, copy 0 is the X and
            // copy 1 the Y, and the draw decides the offspring sex.
            let p_copy = if sex_chrom {
                let from_y = self.bt.draw(rng);
                sex = Some(if from_y { Sex::Male } else { Sex::Female });
                usize::from(from_y)
            } else {
                usize::from(self.bt.draw(rng))
            };
            let src = &pop.individual(dad).genotype()
                [p_copy * total + range.start..p_copy * total + range.end];
            scratch.individual_mut(cursor).genotype_mut()
                [total + range.start..total + range.end]
                .copy_from_slice(src);
        }

        let sex = sex.unwrap_or_else(|| {
            if rng.random::<f64>() < 0.5 {
                Sex::Male
            } else {
                Sex::Female
            }
        });
        scratch.individual_mut(cursor).set_sex(sex);
    }

    /// Run every during-mating operator on the slot at `cursor`.
    fn apply_ops(
        &self,
        pop: &Population,
        scratch: &mut Population,
        cursor: usize,
        dad: Option<usize>,
        mom: Option<usize>,
        ops: &mut [Box<dyn DuringMatingOperator>],
    ) -> Result<bool, MatingError> {
        let dad_ref = dad.map(|i| pop.individual(i));
        let mom_ref = mom.map(|i| pop.individual(i));
        let offspring = scratch.individual_mut(cursor);
        for op in ops.iter_mut() {
            if !op.apply(pop, offspring, dad_ref, mom_ref)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
