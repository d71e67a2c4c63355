//! Genome representation consumed by the mating core.
//!
//! The mating schemes do not interpret alleles; they only move whole
//! chromosome copies between generations and count allele matches at
//! controlled loci. The types here are deliberately minimal: a shared
//! [`GenomeLayout`] describing ploidy and chromosome boundaries, and an
//! [`Individual`] carrying a flat genotype, a sex, and an optional fitness
//! score.

mod individual;
mod layout;

pub use individual::{Allele, Individual, Sex};
pub use layout::GenomeLayout;
