use serde::{Deserialize, Serialize};

use crate::genome::GenomeLayout;

/// Allele state at a single locus. The mating core never interprets allele
/// values; it only copies and compares them.
pub type Allele = u8;

/// Sex attribute of an individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

/// A member of a population.
///
/// The genotype is a flat allele vector holding `ploidy` consecutive copies
/// of the layout's locus range (see [`GenomeLayout`]). Fitness is a cached
/// score written by an external selection stage; `None` means the individual
/// has not been scored this generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    genotype: Vec<Allele>,
    sex: Sex,
    fitness: Option<f64>,
}

impl Individual {
    /// Create a new individual from a genotype and sex.
    pub fn new(genotype: Vec<Allele>, sex: Sex) -> Self {
        Self {
            genotype,
            sex,
            fitness: None,
        }
    }

    /// Create an empty offspring slot for a scratch generation.
    pub fn placeholder(layout: &GenomeLayout) -> Self {
        Self {
            genotype: vec![0; layout.genotype_len()],
            sex: Sex::Female,
            fitness: None,
        }
    }

    /// The individual's sex.
    #[inline]
    pub fn sex(&self) -> Sex {
        self.sex
    }

    /// Set the individual's sex.
    #[inline]
    pub fn set_sex(&mut self, sex: Sex) {
        self.sex = sex;
    }

    /// The cached fitness score, if any.
    #[inline]
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// Set the cached fitness score.
    #[inline]
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    /// Clear the cached fitness score.
    #[inline]
    pub fn clear_fitness(&mut self) {
        self.fitness = None;
    }

    /// The full genotype (all ploidy copies, copy-major).
    #[inline]
    pub fn genotype(&self) -> &[Allele] {
        &self.genotype
    }

    /// Mutable access to the full genotype.
    #[inline]
    pub fn genotype_mut(&mut self) -> &mut [Allele] {
        &mut self.genotype
    }

    /// Allele at `locus` on copy `copy`.
    #[inline]
    pub fn allele(&self, layout: &GenomeLayout, copy: usize, locus: usize) -> Allele {
        self.genotype[layout.locus_index(copy, locus)]
    }
}
