//! Chromosome and ploidy metadata.

use std::ops::Range;

use crate::errors::MatingError;

/// Genome structure shared by every individual in a population.
///
/// Loci are addressed by a global index `0..total_loci`, laid out chromosome
/// by chromosome. An individual's genotype stores `ploidy` consecutive
/// copies of that index range, so copy `c` of locus `l` lives at
/// `c * total_loci + l`.
///
/// When `sex_chromosome` is set, the last chromosome is the sex pair and the
/// layout must be diploid. The convention for males is that copy 0 of the
/// sex chromosome is the X and copy 1 is the Y; females carry two X copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeLayout {
    ploidy: usize,
    loci_per_chromosome: Vec<usize>,
    sex_chromosome: bool,
    total_loci: usize,
}

impl GenomeLayout {
    /// Create a new layout.
    ///
    /// # Errors
    /// Returns a configuration error if the ploidy is not 1 or 2, if there
    /// are no chromosomes, if any chromosome has no loci, or if a sex
    /// chromosome is declared on a haploid layout.
    pub fn new(
        ploidy: usize,
        loci_per_chromosome: Vec<usize>,
        sex_chromosome: bool,
    ) -> Result<Self, MatingError> {
        if !(1..=2).contains(&ploidy) {
            return Err(MatingError::Config(format!(
                "ploidy must be 1 or 2, got {ploidy}"
            )));
        }
        if loci_per_chromosome.is_empty() {
            return Err(MatingError::Config(
                "layout needs at least one chromosome".into(),
            ));
        }
        if loci_per_chromosome.iter().any(|&n| n == 0) {
            return Err(MatingError::Config(
                "every chromosome needs at least one locus".into(),
            ));
        }
        if sex_chromosome && ploidy != 2 {
            return Err(MatingError::Config(
                "a sex chromosome requires a diploid layout".into(),
            ));
        }

        let total_loci = loci_per_chromosome.iter().sum();
        Ok(Self {
            ploidy,
            loci_per_chromosome,
            sex_chromosome,
            total_loci,
        })
    }

    /// Number of chromosome copies per individual.
    #[inline]
    pub fn ploidy(&self) -> usize {
        self.ploidy
    }

    /// Number of chromosomes per copy.
    #[inline]
    pub fn num_chromosomes(&self) -> usize {
        self.loci_per_chromosome.len()
    }

    /// Total loci per chromosome copy.
    #[inline]
    pub fn total_loci(&self) -> usize {
        self.total_loci
    }

    /// Whether the last chromosome is the sex pair.
    #[inline]
    pub fn has_sex_chromosome(&self) -> bool {
        self.sex_chromosome
    }

    /// Length of a full genotype vector (`ploidy * total_loci`).
    #[inline]
    pub fn genotype_len(&self) -> usize {
        self.ploidy * self.total_loci
    }

    /// Locus index range of chromosome `chrom` within one copy.
    pub fn chrom_range(&self, chrom: usize) -> Range<usize> {
        let begin: usize = self.loci_per_chromosome[..chrom].iter().sum();
        begin..begin + self.loci_per_chromosome[chrom]
    }

    /// Locus index ranges of all chromosomes within one copy.
    pub fn chrom_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::with_capacity(self.num_chromosomes());
        let mut begin = 0;
        for &n in &self.loci_per_chromosome {
            ranges.push(begin..begin + n);
            begin += n;
        }
        ranges
    }

    /// Flat genotype index of `locus` on copy `copy`.
    #[inline]
    pub fn locus_index(&self, copy: usize, locus: usize) -> usize {
        copy * self.total_loci + locus
    }

    /// Flat genotype range of copy `copy`.
    #[inline]
    pub fn copy_range(&self, copy: usize) -> Range<usize> {
        copy * self.total_loci..(copy + 1) * self.total_loci
    }
}
