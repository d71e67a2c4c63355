//! Mating schemes.
//!
//! A mating scheme produces the next generation from the current one: it
//! sizes a scratch population, chooses parents under fitness, asks the
//! family-size model how many offspring each mating contributes, builds the
//! offspring genotypes, runs the during-mating operators, and finally
//! commits the scratch atomically. The concrete schemes are:
//!
//! - [`BinomialSelection`]: asexual, fitness-weighted draws with
//!   replacement; works for haploid and diploid populations.
//! - [`RandomMating`]: sexual random mating for diploid populations with
//!   independent father/mother draws and Mendelian sex-chromosome handling.
//! - [`ControlledMating`]: wraps any scheme and re-runs it until allele
//!   counts at the controlled loci fall inside externally supplied target
//!   intervals.
//! - [`ControlledRandomMating`]: sexual mating steered online toward
//!   per-subpopulation allele-count targets.
//! - [`CallbackMating`]: delegates the whole cycle to a user callback
//!   (slow; intended for prototyping).
//! - [`NoMating`]: applies during-mating operators in place without
//!   reproduction.
//!
//! Schemes have value semantics: cloning a scheme re-acquires its callback
//! handles, so a clone mates identically to the original and both release
//! their resources independently.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use crate::errors::MatingError;
use crate::genome::Individual;
use crate::population::Population;

pub mod binomial;
pub mod callback;
pub mod choosers;
pub mod config;
pub mod controlled;
pub mod offspring;
pub mod random;

pub use binomial::BinomialSelection;
pub use callback::{CallbackMating, NoMating};
pub use choosers::{SexedParentChooser, WeightedParentChooser};
pub use config::{FamilySizeMode, FamilySizeModel, SchemeConfig, SizePolicy};
pub use controlled::{ControlSpec, ControlledMating, ControlledRandomMating};
pub use offspring::OffspringGenerator;
pub use random::RandomMating;

/// Generation index passed to every user callback.
pub type Generation = u32;

/// Offspring-count callback: `(gen) -> count-or-parameter`.
pub type NumOffspringFn = Arc<dyn Fn(Generation) -> Result<f64, MatingError> + Send + Sync>;

/// Subpopulation-size callback: `(gen, current_sizes) -> sizes`.
pub type SubPopSizeFn =
    Arc<dyn Fn(Generation, &[usize]) -> Result<Vec<usize>, MatingError> + Send + Sync>;

/// Frequency-target callback: `(gen) -> L or 2L boundary values`.
pub type FreqFn = Arc<dyn Fn(Generation) -> Result<Vec<f64>, MatingError> + Send + Sync>;

/// Whole-mating callback: `(pop, scratch, ops) -> success`.
pub type MateFn = Arc<
    dyn Fn(
            &mut Population,
            &mut Population,
            &mut [Box<dyn DuringMatingOperator>],
        ) -> Result<bool, MatingError>
        + Send
        + Sync,
>;

/// An operator applied to every offspring during mating.
///
/// Operators run after the offspring genotype is established (or instead of
/// it, when [`forms_offspring_genotype`](Self::forms_offspring_genotype)
/// returns true for at least one operator in the list). Returning
/// `Ok(false)` discards the offspring; the slot is retried. An `Err` aborts
/// the whole cycle without committing.
pub trait DuringMatingOperator: Send + Sync {
    /// Whether this operator writes the offspring genotype itself. When any
    /// operator in the list does, the offspring generator leaves the slot
    /// genotype untouched.
    fn forms_offspring_genotype(&self) -> bool {
        false
    }

    /// Apply to a freshly produced offspring.
    fn apply(
        &mut self,
        pop: &Population,
        offspring: &mut Individual,
        dad: Option<&Individual>,
        mom: Option<&Individual>,
    ) -> Result<bool, MatingError>;
}

/// Test and instrumentation hook into a mating cycle.
///
/// Replaces build-flag-dependent debug reporting: when an observer is
/// installed the driver reports realized family sizes, chosen parents, and
/// uni-sex fallbacks, and writes the `famSizes` variable on commit.
pub trait MatingObserver: Send + Sync {
    /// A family of `size` accepted offspring was produced in `subpop`.
    fn on_family(&self, _subpop: usize, _size: usize) {}

    /// Parents chosen for the next family (indices into the parental
    /// generation; `mom` is `None` for asexual schemes).
    fn on_parents(&self, _subpop: usize, _dad: usize, _mom: Option<usize>) {}

    /// A uni-sex subpopulation fell back to same-sex mating.
    fn on_uni_sex_fallback(&self, _subpop: usize) {}
}

/// A mating scheme: produces one generation per [`mate`](Self::mate) call.
pub trait MatingScheme: fmt::Display + Send + Sync {
    /// Check that the population satisfies the scheme's requirements.
    /// Called once before a cycle; a failure is fatal to the run.
    fn is_compatible(&self, _pop: &Population) -> Result<(), MatingError> {
        Ok(())
    }

    /// Produce one generation into `scratch`, committing it iff `submit`.
    ///
    /// On any error the parental generation is left untouched; with
    /// `submit == false` a successful scratch is left filled but
    /// uncommitted (used by controllers that inspect it first).
    fn mate(
        &mut self,
        pop: &mut Population,
        scratch: &mut Population,
        ops: &mut [Box<dyn DuringMatingOperator>],
        submit: bool,
        rng: &mut dyn RngCore,
    ) -> Result<(), MatingError>;

    /// Commit the scratch as the new current generation.
    fn submit_scratch(&self, pop: &mut Population, scratch: &mut Population);

    /// Value-semantics clone; callback handles are re-acquired so the clone
    /// outlives the original independently.
    fn clone_scheme(&self) -> Box<dyn MatingScheme>;
}

/// Shared commit step: clear the `selection` flag, swap the scratch in, and
/// report family sizes when an observer asked for them.
pub(crate) fn commit_scratch(
    pop: &mut Population,
    scratch: &mut Population,
    fam_sizes: Option<&[i64]>,
) {
    pop.set_bool_var("selection", false);
    pop.push_and_discard(scratch);
    if let Some(sizes) = fam_sizes {
        pop.set_int_vector_var("famSizes", sizes.to_vec());
    }
}
