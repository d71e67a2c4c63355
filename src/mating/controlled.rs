//! Frequency-controlled mating.
//!
//! Controlled schemes condition reproduction on allele-frequency targets at
//! chosen loci. A frequency callback is consulted once per generation and
//! returns, per controlled locus, either a lower bound (paired with the
//! spec's half-width `range`) or an explicit `[lo, hi]` pair. Two
//! controllers enforce the resulting intervals:
//!
//! - [`ControlledMating`] wraps any inner scheme and re-runs whole
//!   generations until the realized counts land inside the intervals
//!   (rejection sampling, bounded by an attempt budget).
//! - [`ControlledRandomMating`] steers sexual mating online: candidate
//!   offspring are kept only while per-subpopulation integer targets remain
//!   reachable with the slots left.
//!
//! Controlling several loci at once can take many attempts; budget errors
//! are [`MatingError::Infeasible`] and never commit.

use std::fmt;

use rand::{Rng, RngCore};
use tracing::debug;

use crate::errors::MatingError;
use crate::genome::Allele;
use crate::mating::binomial::MAX_EMPTY_FAMILIES;
use crate::mating::{
    commit_scratch, DuringMatingOperator, FreqFn, Generation, MatingScheme,
    OffspringGenerator, SchemeConfig, SexedParentChooser,
};
use crate::population::Population;

/// Which loci to control, toward which alleles, and how to obtain targets.
#[derive(Clone)]
pub struct ControlSpec {
    loci: Vec<usize>,
    alleles: Vec<Allele>,
    freq_fn: FreqFn,
    /// Interval half-width used when the callback returns one value per
    /// locus: the interval becomes `[v, v + range]`, capped at 1.
    range: f64,
}

impl fmt::Debug for ControlSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSpec")
            .field("loci", &self.loci)
            .field("alleles", &self.alleles)
            .field("range", &self.range)
            .finish()
    }
}

impl ControlSpec {
    /// Create a control specification.
    ///
    /// # Errors
    /// Returns a configuration error when no locus is given, when the
    /// allele list does not match the loci, or when `range` is negative.
    pub fn new(
        loci: Vec<usize>,
        alleles: Vec<Allele>,
        freq_fn: FreqFn,
        range: f64,
    ) -> Result<Self, MatingError> {
        if loci.is_empty() {
            return Err(MatingError::Config(
                "have to specify at least one locus to control".into(),
            ));
        }
        if loci.len() != alleles.len() {
            return Err(MatingError::Config(format!(
                "{} loci but {} target alleles",
                loci.len(),
                alleles.len()
            )));
        }
        if !(range >= 0.0) {
            return Err(MatingError::Config(format!(
                "interval half-width must be non-negative, got {range}"
            )));
        }
        Ok(Self {
            loci,
            alleles,
            freq_fn,
            range,
        })
    }

    /// Controlled locus indices.
    pub fn loci(&self) -> &[usize] {
        &self.loci
    }

    /// Target allele per controlled locus.
    pub fn alleles(&self) -> &[Allele] {
        &self.alleles
    }

    /// Number of controlled loci.
    pub fn num_loci(&self) -> usize {
        self.loci.len()
    }

    /// Check the loci against a population's layout.
    pub(crate) fn check_layout(&self, pop: &Population) -> Result<(), MatingError> {
        let total = pop.layout().total_loci();
        if let Some(&bad) = self.loci.iter().find(|&&locus| locus >= total) {
            return Err(MatingError::Incompatible(format!(
                "controlled locus {bad} out of range for a layout with {total} loci"
            )));
        }
        Ok(())
    }

    /// Resolve the per-locus target frequency intervals for `gen`.
    ///
    /// The callback may return `L` lower bounds (interval `[v, v + range]`)
    /// or `2L` explicit `[lo, hi]` pairs; anything else is a callback error.
    pub(crate) fn intervals(&self, gen: Generation) -> Result<Vec<(f64, f64)>, MatingError> {
        let values = (self.freq_fn)(gen)?;
        let n = self.loci.len();
        let intervals: Vec<(f64, f64)> = if values.len() == n {
            values
                .iter()
                .map(|&v| (v, (v + self.range).min(1.0)))
                .collect()
        } else if values.len() == 2 * n {
            values.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect()
        } else {
            return Err(MatingError::Callback(format!(
                "frequency callback returned {} values for {} controlled loci",
                values.len(),
                n
            )));
        };

        for &(lo, hi) in &intervals {
            if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
                return Err(MatingError::Callback(format!(
                    "invalid target frequency interval [{lo}, {hi}]"
                )));
            }
        }
        Ok(intervals)
    }
}

/// Count the target alleles at the controlled loci over the individuals in
/// `begin..end`, across all ploidy copies.
pub(crate) fn count_alleles(
    pop: &Population,
    begin: usize,
    end: usize,
    loci: &[usize],
    alleles: &[Allele],
) -> Vec<u64> {
    let layout = pop.layout();
    let mut counts = vec![0u64; loci.len()];
    for ind in &pop.individuals()[begin..end] {
        for (count, (&locus, &allele)) in counts.iter_mut().zip(loci.iter().zip(alleles)) {
            for copy in 0..layout.ploidy() {
                if ind.genotype()[layout.locus_index(copy, locus)] == allele {
                    *count += 1;
                }
            }
        }
    }
    counts
}

/// Compute per-subpopulation integer allele targets.
///
/// One frequency per locus is sampled uniformly within its interval; the
/// implied total count (`round(freq * total_copies)`) is apportioned across
/// subpopulations by floor allocation, with the remainder distributed to
/// the lowest-index subpopulations. Returns `targets[subpop][locus]`.
pub(crate) fn expected_alleles(
    scratch: &Population,
    intervals: &[(f64, f64)],
    rng: &mut dyn RngCore,
) -> Vec<Vec<u64>> {
    let ploidy = scratch.ploidy() as u64;
    let total_copies = scratch.size() as u64 * ploidy;
    let num_subpops = scratch.num_subpops();
    let mut targets = vec![vec![0u64; intervals.len()]; num_subpops];

    for (i, &(lo, hi)) in intervals.iter().enumerate() {
        let freq = if hi > lo { rng.random_range(lo..hi) } else { lo };
        let total_target = (freq * total_copies as f64).round() as u64;

        let mut allocated = 0u64;
        for (s, target) in targets.iter_mut().enumerate() {
            let copies = scratch.subpop_size(s) as u64 * ploidy;
            let base = (freq * copies as f64).floor() as u64;
            target[i] = base;
            allocated += base;
        }

        let mut remainder = total_target.saturating_sub(allocated);
        let mut s = 0;
        while remainder > 0 {
            if scratch.subpop_size(s % num_subpops) > 0 {
                targets[s % num_subpops][i] += 1;
                remainder -= 1;
            }
            s += 1;
        }
    }
    targets
}

/// Per-candidate contribution to the controlled allele counts.
fn candidate_delta(
    scratch: &Population,
    cursor: usize,
    loci: &[usize],
    alleles: &[Allele],
    delta: &mut [u64],
) {
    let layout = scratch.layout();
    let candidate = scratch.individual(cursor);
    for (d, (&locus, &allele)) in delta.iter_mut().zip(loci.iter().zip(alleles)) {
        *d = 0;
        for copy in 0..layout.ploidy() {
            if candidate.genotype()[layout.locus_index(copy, locus)] == allele {
                *d += 1;
            }
        }
    }
}

/// Rejection controller: re-runs an inner scheme until allele counts land
/// inside the target intervals, then commits.
///
/// The inner scheme is owned: construction clones it, so the controller
/// outlives the caller's scheme value.
pub struct ControlledMating {
    inner: Box<dyn MatingScheme>,
    control: ControlSpec,
    max_attempts: u32,
}

impl Clone for ControlledMating {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_scheme(),
            control: self.control.clone(),
            max_attempts: self.max_attempts,
        }
    }
}

impl fmt::Debug for ControlledMating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlledMating")
            .field("inner", &self.inner.to_string())
            .field("control", &self.control)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl ControlledMating {
    /// Wrap `inner` (cloned) with a frequency controller.
    ///
    /// # Errors
    /// Returns a configuration error when `max_attempts` is zero.
    pub fn new(
        inner: &dyn MatingScheme,
        control: ControlSpec,
        max_attempts: u32,
    ) -> Result<Self, MatingError> {
        if max_attempts == 0 {
            return Err(MatingError::Config(
                "controller needs at least one attempt".into(),
            ));
        }
        Ok(Self {
            inner: inner.clone_scheme(),
            control,
            max_attempts,
        })
    }
}

impl fmt::Display for ControlledMating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controlled {}", self.inner)
    }
}

impl MatingScheme for ControlledMating {
    fn is_compatible(&self, pop: &Population) -> Result<(), MatingError> {
        self.control.check_layout(pop)?;
        self.inner.is_compatible(pop)
    }

    fn mate(
        &mut self,
        pop: &mut Population,
        scratch: &mut Population,
        ops: &mut [Box<dyn DuringMatingOperator>],
        submit: bool,
        rng: &mut dyn RngCore,
    ) -> Result<(), MatingError> {
        let intervals = self.control.intervals(pop.generation())?;

        for attempt in 1..=self.max_attempts {
            self.inner.mate(pop, scratch, ops, false, rng)?;

            let copies = (scratch.size() * scratch.ploidy()) as f64;
            let counts = count_alleles(
                scratch,
                0,
                scratch.size(),
                self.control.loci(),
                self.control.alleles(),
            );
            let within = counts.iter().zip(&intervals).all(|(&count, &(lo, hi))| {
                count >= (lo * copies).floor() as u64 && count <= (hi * copies).ceil() as u64
            });

            if within {
                debug!(attempt, "allele counts within target intervals");
                if submit {
                    self.inner.submit_scratch(pop, scratch);
                }
                return Ok(());
            }
            debug!(attempt, "allele counts outside target intervals, retrying");
        }

        Err(MatingError::Infeasible(format!(
            "allele-frequency targets not met within {} attempts",
            self.max_attempts
        )))
    }

    fn submit_scratch(&self, pop: &mut Population, scratch: &mut Population) {
        self.inner.submit_scratch(pop, scratch);
    }

    fn clone_scheme(&self) -> Box<dyn MatingScheme> {
        Box::new(self.clone())
    }
}

/// Sexual random mating steered online toward per-subpopulation allele
/// targets.
///
/// Each candidate offspring is placed tentatively; it is kept only while
/// every controlled locus can still reach its target with the remaining
/// slots (`count <= target` and `count + remaining * ploidy >= target`).
/// Rejected candidates free their slot, which is retried with newly drawn
/// parents.
#[derive(Clone)]
pub struct ControlledRandomMating {
    config: SchemeConfig,
    cont_when_uni_sex: bool,
    control: ControlSpec,
    max_attempts: u32,
    fam_sizes: Vec<i64>,
}

impl fmt::Debug for ControlledRandomMating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlledRandomMating")
            .field("config", &self.config)
            .field("cont_when_uni_sex", &self.cont_when_uni_sex)
            .field("control", &self.control)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl ControlledRandomMating {
    /// Create the scheme. `max_attempts` scales the per-subpopulation
    /// rejection budget (`max_attempts * subpop_size` rejected candidates).
    ///
    /// # Errors
    /// Returns a configuration error when `max_attempts` is zero.
    pub fn new(
        config: SchemeConfig,
        cont_when_uni_sex: bool,
        control: ControlSpec,
        max_attempts: u32,
    ) -> Result<Self, MatingError> {
        if max_attempts == 0 {
            return Err(MatingError::Config(
                "controller needs at least one attempt".into(),
            ));
        }
        Ok(Self {
            config,
            cont_when_uni_sex,
            control,
            max_attempts,
            fam_sizes: Vec::new(),
        })
    }
}

impl fmt::Display for ControlledRandomMating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controlled sexual random mating")
    }
}

impl MatingScheme for ControlledRandomMating {
    fn is_compatible(&self, pop: &Population) -> Result<(), MatingError> {
        if pop.ploidy() != 2 {
            return Err(MatingError::Incompatible(
                "controlled sexual random mating requires a diploid population".into(),
            ));
        }
        self.control.check_layout(pop)
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
        let intervals = self.control.intervals(gen)?;
        self.config.prepare_scratch(pop, scratch, gen)?;
        self.fam_sizes.clear();

        let targets = expected_alleles(scratch, &intervals, rng);
        let mut generator = OffspringGenerator::new(pop, ops);
        let ploidy = pop.ploidy() as u64;
        let num_loci = self.control.num_loci();
        let mut delta = vec![0u64; num_loci];

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
            let target = &targets[sp];
            let mut counts = vec![0u64; num_loci];
            let budget = self.max_attempts as u64 * (end - cursor) as u64;
            let mut rejections = 0u64;
            let mut empty_streak = 0u32;

            while cursor < end {
                let (dad, mom) = chooser.choose(rng);
                if let Some(observer) = &self.config.observer {
                    observer.on_parents(sp, dad, Some(mom));
                }
                let k = self.config.family_size.num_offspring(gen, rng)?;
                let mut produced = 0usize;

                for _ in 0..k {
                    if cursor >= end {
                        break;
                    }
                    if !generator.sexual_one(pop, scratch, dad, mom, cursor, ops, rng)? {
                        // Operator rejection consumes one family attempt.
                        continue;
                    }

                    candidate_delta(
                        scratch,
                        cursor,
                        self.control.loci(),
                        self.control.alleles(),
                        &mut delta,
                    );
                    let remaining = (end - cursor - 1) as u64;
                    let feasible = (0..num_loci).all(|i| {
                        let count = counts[i] + delta[i];
                        count <= target[i] && count + remaining * ploidy >= target[i]
                    });

                    if feasible {
                        for (count, d) in counts.iter_mut().zip(&delta) {
                            *count += d;
                        }
                        cursor += 1;
                        produced += 1;
                    } else {
                        rejections += 1;
                        if rejections > budget {
                            return Err(MatingError::Infeasible(format!(
                                "subpopulation {sp} rejected {rejections} candidates \
                                 without reaching its allele targets"
                            )));
                        }
                        // Pop the tentative offspring; retry the slot with
                        // new parents.
                        break;
                    }
                }

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
