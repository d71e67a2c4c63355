//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use broodsim::prelude::*;
//! use std::sync::Arc;
//!
//! let layout = Arc::new(GenomeLayout::new(2, vec![3, 2], false).unwrap());
//! let individuals = (0..10u8)
//!     .map(|i| {
//!         Individual::new(
//!             vec![i; layout.genotype_len()],
//!             if i % 2 == 0 { Sex::Male } else { Sex::Female },
//!         )
//!     })
//!     .collect();
//! let mut pop = Population::new(layout, individuals, &[]).unwrap();
//! let mut scratch = pop.scratch_like();
//!
//! let mut scheme = RandomMating::new(SchemeConfig::default(), true);
//! let mut ops: Vec<Box<dyn DuringMatingOperator>> = Vec::new();
//! let mut rng = seeded_rng(Some(42));
//! scheme.mate(&mut pop, &mut scratch, &mut ops, true, &mut rng).unwrap();
//! assert_eq!(pop.size(), 10);
//! ```

pub use crate::base::{seeded_rng, WeightedSampler};
pub use crate::errors::MatingError;
pub use crate::genome::{Allele, GenomeLayout, Individual, Sex};
pub use crate::mating::{
    BinomialSelection, CallbackMating, ControlSpec, ControlledMating,
    ControlledRandomMating, DuringMatingOperator, FamilySizeMode, FamilySizeModel,
    MatingObserver, MatingScheme, NoMating, RandomMating, SchemeConfig, SizePolicy,
};
pub use crate::population::{Population, VarEnv};
