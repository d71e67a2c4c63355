//! Population container and variable environment.
//!
//! [`Population`] is the ordered collection of individuals the mating core
//! reads parents from and writes offspring into. Individuals are partitioned
//! into subpopulations with cached boundaries; mating never crosses a
//! boundary. The container also carries a [`VarEnv`], the string-keyed
//! variable environment used for the reporting side effects (`selection`,
//! `famSizes`) and for evaluating subpopulation-size expressions.
//!
//! A mating cycle builds the next generation in a second `Population` (the
//! scratch) and commits it atomically with [`Population::push_and_discard`]:
//! observers either see the pre-mating or the post-mating generation, never
//! an intermediate.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::MatingError;
use crate::genome::{GenomeLayout, Individual};

/// Evaluator for subpopulation-size expressions, bound to the variable
/// environment. Injected by the host; the core only forwards the expression
/// string and the environment.
pub type SizeExprEvaluator =
    Arc<dyn Fn(&str, &VarEnv) -> Result<Vec<u64>, MatingError> + Send + Sync>;

/// String-keyed variable environment attached to a population.
#[derive(Clone, Default)]
pub struct VarEnv {
    bools: HashMap<String, bool>,
    int_vectors: HashMap<String, Vec<i64>>,
    evaluator: Option<SizeExprEvaluator>,
}

impl fmt::Debug for VarEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VarEnv")
            .field("bools", &self.bools)
            .field("int_vectors", &self.int_vectors)
            .field("evaluator", &self.evaluator.is_some())
            .finish()
    }
}

impl VarEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a boolean variable.
    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.bools.insert(name.into(), value);
    }

    /// Read a boolean variable.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.bools.get(name).copied()
    }

    /// Set an integer-vector variable.
    pub fn set_int_vector(&mut self, name: impl Into<String>, value: Vec<i64>) {
        self.int_vectors.insert(name.into(), value);
    }

    /// Read an integer-vector variable.
    pub fn get_int_vector(&self, name: &str) -> Option<&[i64]> {
        self.int_vectors.get(name).map(|v| v.as_slice())
    }

    /// Bind the expression evaluator.
    pub fn bind_evaluator(&mut self, evaluator: SizeExprEvaluator) {
        self.evaluator = Some(evaluator);
    }

    /// Evaluate a size expression against this environment.
    ///
    /// # Errors
    /// Returns an expression error when no evaluator is bound, or whatever
    /// error the evaluator itself produces.
    pub fn evaluate_sizes(&self, expr: &str) -> Result<Vec<u64>, MatingError> {
        let evaluator = self.evaluator.clone().ok_or_else(|| {
            MatingError::Expression(format!(
                "no evaluator bound for size expression '{expr}'"
            ))
        })?;
        evaluator(expr, self)
    }
}

/// An ordered collection of individuals partitioned into subpopulations.
#[derive(Debug, Clone)]
pub struct Population {
    layout: Arc<GenomeLayout>,
    individuals: Vec<Individual>,
    /// Cumulative subpopulation end indices; `subpop_ends[s]` is one past the
    /// last individual of subpopulation `s`.
    subpop_ends: Vec<usize>,
    generation: u32,
    vars: VarEnv,
}

impl Population {
    /// Create a population from individuals and subpopulation sizes.
    ///
    /// An empty `subpop_sizes` puts everyone in a single subpopulation.
    ///
    /// # Errors
    /// Returns a configuration error if the sizes do not sum to the number
    /// of individuals or if any genotype does not match the layout.
    pub fn new(
        layout: Arc<GenomeLayout>,
        individuals: Vec<Individual>,
        subpop_sizes: &[usize],
    ) -> Result<Self, MatingError> {
        let sizes: Vec<usize> = if subpop_sizes.is_empty() {
            vec![individuals.len()]
        } else {
            subpop_sizes.to_vec()
        };
        let total: usize = sizes.iter().sum();
        if total != individuals.len() {
            return Err(MatingError::Config(format!(
                "subpopulation sizes sum to {total} but there are {} individuals",
                individuals.len()
            )));
        }
        if let Some(bad) = individuals
            .iter()
            .find(|ind| ind.genotype().len() != layout.genotype_len())
        {
            return Err(MatingError::Config(format!(
                "genotype length {} does not match layout ({})",
                bad.genotype().len(),
                layout.genotype_len()
            )));
        }

        let mut subpop_ends = Vec::with_capacity(sizes.len());
        let mut acc = 0;
        for size in sizes {
            acc += size;
            subpop_ends.push(acc);
        }

        Ok(Self {
            layout,
            individuals,
            subpop_ends,
            generation: 0,
            vars: VarEnv::new(),
        })
    }

    /// Create an empty scratch population sharing this population's layout.
    pub fn scratch_like(&self) -> Self {
        Self {
            layout: Arc::clone(&self.layout),
            individuals: Vec::new(),
            subpop_ends: vec![0],
            generation: self.generation,
            vars: VarEnv::new(),
        }
    }

    /// The shared genome layout.
    #[inline]
    pub fn layout(&self) -> &GenomeLayout {
        &self.layout
    }

    /// Chromosome copies per individual.
    #[inline]
    pub fn ploidy(&self) -> usize {
        self.layout.ploidy()
    }

    /// Total number of individuals.
    #[inline]
    pub fn size(&self) -> usize {
        self.individuals.len()
    }

    /// True when the population has no individuals.
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Number of subpopulations.
    #[inline]
    pub fn num_subpops(&self) -> usize {
        self.subpop_ends.len()
    }

    /// First individual index of subpopulation `subpop`.
    #[inline]
    pub fn subpop_begin(&self, subpop: usize) -> usize {
        if subpop == 0 {
            0
        } else {
            self.subpop_ends[subpop - 1]
        }
    }

    /// One past the last individual index of subpopulation `subpop`.
    #[inline]
    pub fn subpop_end(&self, subpop: usize) -> usize {
        self.subpop_ends[subpop]
    }

    /// Size of subpopulation `subpop`.
    #[inline]
    pub fn subpop_size(&self, subpop: usize) -> usize {
        self.subpop_end(subpop) - self.subpop_begin(subpop)
    }

    /// All subpopulation sizes.
    pub fn subpop_sizes(&self) -> Vec<usize> {
        (0..self.num_subpops()).map(|s| self.subpop_size(s)).collect()
    }

    /// Individual at `index`.
    #[inline]
    pub fn individual(&self, index: usize) -> &Individual {
        &self.individuals[index]
    }

    /// Mutable individual at `index`.
    #[inline]
    pub fn individual_mut(&mut self, index: usize) -> &mut Individual {
        &mut self.individuals[index]
    }

    /// All individuals.
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Mutable access to all individuals.
    pub fn individuals_mut(&mut self) -> &mut [Individual] {
        &mut self.individuals
    }

    /// Current generation index.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Advance the generation counter. The mating core never calls this; it
    /// belongs to the top-level simulation driver.
    pub fn increment_generation(&mut self) {
        self.generation += 1;
    }

    /// The variable environment.
    pub fn vars(&self) -> &VarEnv {
        &self.vars
    }

    /// Mutable access to the variable environment.
    pub fn vars_mut(&mut self) -> &mut VarEnv {
        &mut self.vars
    }

    /// Set a boolean variable on the environment.
    pub fn set_bool_var(&mut self, name: impl Into<String>, value: bool) {
        self.vars.set_bool(name, value);
    }

    /// Set an integer-vector variable on the environment.
    pub fn set_int_vector_var(&mut self, name: impl Into<String>, value: Vec<i64>) {
        self.vars.set_int_vector(name, value);
    }

    /// Whether fitness-weighted selection is active this generation.
    ///
    /// Set by the external selection stage; cleared by every scheme on
    /// commit. When inactive, parent choosers use uniform weights even if
    /// stale fitness scores are present.
    pub fn selection_active(&self) -> bool {
        self.vars.get_bool("selection").unwrap_or(false)
    }

    /// Reshape this population into a scratch of the given subpopulation
    /// sizes, filling every slot with an empty offspring placeholder.
    pub fn resize_for_scratch(&mut self, subpop_sizes: &[usize]) {
        let total: usize = subpop_sizes.iter().sum();
        self.individuals.clear();
        self.individuals
            .resize(total, Individual::placeholder(&self.layout));

        self.subpop_ends.clear();
        let mut acc = 0;
        for &size in subpop_sizes {
            acc += size;
            self.subpop_ends.push(acc);
        }
    }

    /// Atomically replace this generation with the scratch.
    ///
    /// The scratch's individuals and subpopulation boundaries are swapped in
    /// and the previous generation is discarded; the scratch is left empty
    /// and ready for reuse. Variables and the generation counter of this
    /// population are kept.
    pub fn push_and_discard(&mut self, scratch: &mut Population) {
        debug_assert_eq!(*self.layout, *scratch.layout);
        std::mem::swap(&mut self.individuals, &mut scratch.individuals);
        std::mem::swap(&mut self.subpop_ends, &mut scratch.subpop_ends);
        scratch.individuals.clear();
        scratch.subpop_ends.clear();
        scratch.subpop_ends.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Sex;

    fn test_layout() -> Arc<GenomeLayout> {
        Arc::new(GenomeLayout::new(2, vec![3, 2], false).unwrap())
    }

    fn test_population(sizes: &[usize]) -> Population {
        let layout = test_layout();
        let total: usize = sizes.iter().sum();
        let individuals = (0..total)
            .map(|i| {
                Individual::new(
                    vec![i as u8; layout.genotype_len()],
                    if i % 2 == 0 { Sex::Male } else { Sex::Female },
                )
            })
            .collect();
        Population::new(layout, individuals, sizes).unwrap()
    }

    #[test]
    fn test_population_new() {
        let pop = test_population(&[4, 6]);
        assert_eq!(pop.size(), 10);
        assert_eq!(pop.num_subpops(), 2);
        assert_eq!(pop.subpop_size(0), 4);
        assert_eq!(pop.subpop_size(1), 6);
        assert_eq!(pop.subpop_begin(1), 4);
        assert_eq!(pop.subpop_end(1), 10);
        assert_eq!(pop.generation(), 0);
    }

    #[test]
    fn test_population_default_single_subpop() {
        let layout = test_layout();
        let individuals = vec![Individual::placeholder(&layout); 5];
        let pop = Population::new(layout, individuals, &[]).unwrap();
        assert_eq!(pop.num_subpops(), 1);
        assert_eq!(pop.subpop_size(0), 5);
    }

    #[test]
    fn test_population_size_mismatch() {
        let layout = test_layout();
        let individuals = vec![Individual::placeholder(&layout); 5];
        assert!(Population::new(layout, individuals, &[2, 2]).is_err());
    }

    #[test]
    fn test_population_genotype_mismatch() {
        let layout = test_layout();
        let individuals = vec![Individual::new(vec![0; 3], Sex::Male)];
        assert!(Population::new(layout, individuals, &[1]).is_err());
    }

    #[test]
    fn test_resize_for_scratch() {
        let pop = test_population(&[4, 6]);
        let mut scratch = pop.scratch_like();
        scratch.resize_for_scratch(&[3, 7]);

        assert_eq!(scratch.size(), 10);
        assert_eq!(scratch.subpop_sizes(), vec![3, 7]);
        assert!(scratch.individuals().iter().all(|i| i.fitness().is_none()));
    }

    #[test]
    fn test_push_and_discard() {
        let mut pop = test_population(&[4, 6]);
        let mut scratch = pop.scratch_like();
        scratch.resize_for_scratch(&[5, 5]);
        scratch.individual_mut(0).genotype_mut()[0] = 42;

        pop.push_and_discard(&mut scratch);

        assert_eq!(pop.size(), 10);
        assert_eq!(pop.subpop_sizes(), vec![5, 5]);
        assert_eq!(pop.individual(0).genotype()[0], 42);
        // Scratch is drained and reusable.
        assert_eq!(scratch.size(), 0);
        assert_eq!(scratch.num_subpops(), 1);
    }

    #[test]
    fn test_vars_roundtrip() {
        let mut pop = test_population(&[4]);
        assert!(!pop.selection_active());

        pop.set_bool_var("selection", true);
        assert!(pop.selection_active());

        pop.set_int_vector_var("famSizes", vec![1, 2, 3]);
        assert_eq!(pop.vars().get_int_vector("famSizes"), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_evaluate_sizes_unbound() {
        let pop = test_population(&[4]);
        assert!(matches!(
            pop.vars().evaluate_sizes("popSize * 2"),
            Err(MatingError::Expression(_))
        ));
    }

    #[test]
    fn test_evaluate_sizes_bound() {
        let mut pop = test_population(&[4]);
        pop.vars_mut().bind_evaluator(Arc::new(|expr, _env| {
            assert_eq!(expr, "popSize * 2");
            Ok(vec![8])
        }));
        assert_eq!(pop.vars().evaluate_sizes("popSize * 2").unwrap(), vec![8]);
    }
}
