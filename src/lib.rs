//! # broodsim
//!
//! `broodsim` is the mating core of a forward-time population-genetics
//! simulator. Given a parental generation it produces the next one under a
//! family of stochastic reproduction schemes: asexual binomial selection,
//! sexual random mating, callback-driven mating, and controlled variants
//! that condition reproduction on allele-frequency targets at chosen loci.
//!
//! The crate interleaves weighted random parent choice under fitness, an
//! offspring engine that builds genotypes by free recombination over whole
//! chromosome copies, during-mating operator application, subpopulation
//! resizing, per-family offspring-count distributions, and, for the
//! controlled variants, acceptance/rejection loops that drive realized
//! allele counts toward externally supplied targets.
//!
//! All randomness flows through an injected random source, so a fixed seed
//! reproduces a run exactly. A generation is built in a scratch population
//! and committed atomically: on any failure the parental generation is left
//! untouched.

pub mod base;
pub mod errors;
pub mod genome;
pub mod mating;
pub mod population;
pub mod prelude;

pub use errors::MatingError;
pub use genome::{Allele, GenomeLayout, Individual, Sex};
pub use population::Population;
