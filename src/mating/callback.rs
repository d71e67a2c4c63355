//! Callback-driven mating and the no-mating scheme.

use std::fmt;

use rand::RngCore;

use crate::errors::MatingError;
use crate::mating::{
    commit_scratch, DuringMatingOperator, MateFn, MatingScheme, SizePolicy,
};
use crate::population::Population;

/// Delegates the whole mating cycle to a user callback.
///
/// The callback receives the parental generation, a pre-sized scratch, and
/// the during-mating operator list, and signals success or failure. The
/// commit/abort discipline is the core's: on success the scratch replaces
/// the current generation atomically; on failure or callback error nothing
/// changes. This path is slow and intended for prototyping.
#[derive(Clone)]
pub struct CallbackMating {
    mate_fn: MateFn,
    size_policy: SizePolicy,
}

impl fmt::Debug for CallbackMating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackMating")
            .field("size_policy", &self.size_policy)
            .finish()
    }
}

impl CallbackMating {
    /// Create the scheme; the scratch keeps the current sizes.
    pub fn new(mate_fn: MateFn) -> Self {
        Self {
            mate_fn,
            size_policy: SizePolicy::Keep,
        }
    }

    /// Replace the sizing policy.
    pub fn with_size_policy(mut self, size_policy: SizePolicy) -> Self {
        self.size_policy = size_policy;
        self
    }
}

impl fmt::Display for CallbackMating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback-driven mating")
    }
}

impl MatingScheme for CallbackMating {
    fn mate(
        &mut self,
        pop: &mut Population,
        scratch: &mut Population,
        ops: &mut [Box<dyn DuringMatingOperator>],
        submit: bool,
        _rng: &mut dyn RngCore,
    ) -> Result<(), MatingError> {
        let gen = pop.generation();
        let sizes = self.size_policy.next_sizes(pop, gen)?;
        scratch.resize_for_scratch(&sizes);

        if !(self.mate_fn)(pop, scratch, ops)? {
            return Err(MatingError::Infeasible(
                "mating callback reported failure".into(),
            ));
        }

        if submit {
            self.submit_scratch(pop, scratch);
        }
        Ok(())
    }

    fn submit_scratch(&self, pop: &mut Population, scratch: &mut Population) {
        commit_scratch(pop, scratch, None);
    }

    fn clone_scheme(&self) -> Box<dyn MatingScheme> {
        Box::new(self.clone())
    }
}

/// No mating: during-mating operators run over the current individuals in
/// place, rejection signals are ignored, and no generation is produced.
#[derive(Debug, Clone, Default)]
pub struct NoMating;

impl NoMating {
    /// Create the scheme.
    pub fn new() -> Self {
        Self
    }
}

impl fmt::Display for NoMating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no mating")
    }
}

impl MatingScheme for NoMating {
    fn mate(
        &mut self,
        pop: &mut Population,
        _scratch: &mut Population,
        ops: &mut [Box<dyn DuringMatingOperator>],
        _submit: bool,
        _rng: &mut dyn RngCore,
    ) -> Result<(), MatingError> {
        for index in 0..pop.size() {
            let mut individual = pop.individual(index).clone();
            for op in ops.iter_mut() {
                // The rejection signal is ignored; callback errors still abort.
                op.apply(pop, &mut individual, None, None)?;
            }
            *pop.individual_mut(index) = individual;
        }
        Ok(())
    }

    fn submit_scratch(&self, _pop: &mut Population, _scratch: &mut Population) {}

    fn clone_scheme(&self) -> Box<dyn MatingScheme> {
        Box::new(self.clone())
    }
}
