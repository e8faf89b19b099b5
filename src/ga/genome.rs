//! Genome representation.
//!
//! A [`Genome`] maps locus keys to genes. Keys live in a `BTreeMap`, so
//! iteration order is the key order and crossover cut points are stable
//! for a given key set. Every gene change goes through the genome, which
//! marks itself as needing evaluation; genes never refer back to their
//! owner.

use super::fitness::Fitness;
use super::types::{Gene, Locus};
use crate::error::GeneticError;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One candidate solution: genes keyed by locus plus its fitness scores.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "K: serde::Serialize, G: serde::Serialize",
        deserialize = "K: Ord + serde::Deserialize<'de>, G: serde::Deserialize<'de>"
    ))
)]
pub struct Genome<K, G> {
    genes: BTreeMap<K, G>,
    fitness: Vec<Fitness>,
    evaluation_needed: bool,
}

impl<K: Locus, G: Gene> Default for Genome<K, G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Locus, G: Gene> Genome<K, G> {
    /// An empty, unevaluated genome.
    pub fn new() -> Self {
        Self {
            genes: BTreeMap::new(),
            fitness: Vec::new(),
            evaluation_needed: true,
        }
    }

    /// Builds an unevaluated genome from `(locus, gene)` pairs.
    ///
    /// A repeated locus keeps the last gene.
    pub fn from_genes(genes: impl IntoIterator<Item = (K, G)>) -> Self {
        Self {
            genes: genes.into_iter().collect(),
            fitness: Vec::new(),
            evaluation_needed: true,
        }
    }

    /// Adds a gene at a new locus.
    pub fn insert_gene(&mut self, locus: K, gene: G) -> Result<(), GeneticError> {
        if self.genes.contains_key(&locus) {
            return Err(GeneticError::InvalidArgument(format!(
                "locus {locus:?} already present"
            )));
        }
        self.genes.insert(locus, gene);
        self.evaluation_needed = true;
        Ok(())
    }

    /// Replaces the gene at an existing locus and returns the previous one.
    ///
    /// The genome is only marked dirty when the value actually changes.
    pub fn replace_gene(&mut self, locus: &K, gene: G) -> Result<G, GeneticError> {
        let slot = self
            .genes
            .get_mut(locus)
            .ok_or_else(|| GeneticError::missing_locus(locus))?;
        if *slot != gene {
            self.evaluation_needed = true;
        }
        Ok(std::mem::replace(slot, gene))
    }

    /// Removes the gene at a locus.
    pub fn remove_gene(&mut self, locus: &K) -> Result<G, GeneticError> {
        let gene = self
            .genes
            .remove(locus)
            .ok_or_else(|| GeneticError::missing_locus(locus))?;
        self.evaluation_needed = true;
        Ok(gene)
    }

    pub fn gene(&self, locus: &K) -> Option<&G> {
        self.genes.get(locus)
    }

    pub fn contains_locus(&self, locus: &K) -> bool {
        self.genes.contains_key(locus)
    }

    /// Genes in locus order.
    pub fn genes(&self) -> impl Iterator<Item = (&K, &G)> + '_ {
        self.genes.iter()
    }

    /// Loci in order.
    pub fn loci(&self) -> impl Iterator<Item = &K> + '_ {
        self.genes.keys()
    }

    /// The locus at an ordinal position.
    pub fn locus_at(&self, ordinal: usize) -> Option<&K> {
        self.genes.keys().nth(ordinal)
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// All objective scores; empty until first evaluated.
    pub fn fitness(&self) -> &[Fitness] {
        &self.fitness
    }

    /// The first objective score.
    pub fn primary_fitness(&self) -> Option<&Fitness> {
        self.fitness.first()
    }

    /// Stores evaluated scores and clears the evaluation-needed flag.
    pub fn set_fitness(&mut self, fitness: Vec<Fitness>) {
        self.fitness = fitness;
        self.evaluation_needed = false;
    }

    pub fn is_evaluation_needed(&self) -> bool {
        self.evaluation_needed
    }

    pub fn mark_evaluation_needed(&mut self) {
        self.evaluation_needed = true;
    }

    /// Fraction of loci (over the union of both key sets) holding equal genes.
    ///
    /// Two empty genomes are identical.
    pub fn similarity(&self, other: &Genome<K, G>) -> f64 {
        let union = self.union_len(other);
        if union == 0 {
            return 1.0;
        }
        (union - self.distance(other)) as f64 / union as f64
    }

    /// Number of loci (over the union of both key sets) whose genes differ.
    pub fn distance(&self, other: &Genome<K, G>) -> usize {
        let differing = self
            .genes
            .iter()
            .filter(|(k, g)| other.genes.get(*k) != Some(*g))
            .count();
        let only_other = other
            .genes
            .keys()
            .filter(|k| !self.genes.contains_key(*k))
            .count();
        differing + only_other
    }

    fn union_len(&self, other: &Genome<K, G>) -> usize {
        self.genes.len()
            + other
                .genes
                .keys()
                .filter(|k| !self.genes.contains_key(*k))
                .count()
    }

    /// Total order by fitness where `Greater` means better.
    ///
    /// Unevaluated genomes rank below evaluated ones. Multiple objectives
    /// compare lexicographically, which never ranks a dominated genome
    /// above one that dominates it.
    pub fn compare_fitness(&self, other: &Genome<K, G>) -> Ordering {
        compare_scores(&self.fitness, &other.fitness)
    }
}

/// Anything that carries objective scores.
///
/// Selectors rank through this trait, so they work on owned genomes and on
/// borrowed neighbourhoods (`&[&Genome]`) alike.
pub trait Scored {
    fn scores(&self) -> &[Fitness];

    fn primary_score(&self) -> Option<&Fitness> {
        self.scores().first()
    }
}

impl<K, G> Scored for Genome<K, G> {
    fn scores(&self) -> &[Fitness] {
        &self.fitness
    }
}

impl<T: Scored + ?Sized> Scored for &T {
    fn scores(&self) -> &[Fitness] {
        (**self).scores()
    }
}

/// Orders two score vectors the way [`Genome::compare_fitness`] does.
pub fn compare_scores(a: &[Fitness], b: &[Fitness]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a
            .iter()
            .zip(b)
            .map(|(x, y)| x.cmp(y))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
    }
}

/// Two genomes chosen to mate. Borrows from the population.
pub struct Parents<'a, K, G> {
    pub mom: &'a Genome<K, G>,
    pub dad: &'a Genome<K, G>,
}

impl<K, G> Clone for Parents<'_, K, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, G> Copy for Parents<'_, K, G> {}

impl<K: std::fmt::Debug, G: std::fmt::Debug> std::fmt::Debug for Parents<'_, K, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parents")
            .field("mom", self.mom)
            .field("dad", self.dad)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::testing::letters;

    // ---- Gene mutation API ----

    #[test]
    fn test_new_genome_needs_evaluation() {
        let g: Genome<usize, char> = Genome::new();
        assert!(g.is_evaluation_needed());
        assert!(g.fitness().is_empty());
    }

    #[test]
    fn test_set_fitness_clears_flag() {
        let mut g = letters("ABC");
        g.set_fitness(vec![Fitness::maximizing(1.0)]);
        assert!(!g.is_evaluation_needed());
        assert_eq!(g.primary_fitness().map(Fitness::value), Some(1.0));
    }

    #[test]
    fn test_replace_gene_marks_dirty_only_on_change() {
        let mut g = letters("ABC");
        g.set_fitness(vec![Fitness::maximizing(1.0)]);

        let old = g.replace_gene(&1, 'B').unwrap();
        assert_eq!(old, 'B');
        assert!(!g.is_evaluation_needed(), "same value must not dirty");

        let old = g.replace_gene(&1, 'X').unwrap();
        assert_eq!(old, 'B');
        assert!(g.is_evaluation_needed());
        assert_eq!(g.gene(&1), Some(&'X'));
    }

    #[test]
    fn test_replace_missing_locus_fails() {
        let mut g = letters("AB");
        assert!(matches!(
            g.replace_gene(&5, 'Z'),
            Err(GeneticError::MissingLocus { .. })
        ));
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let mut g = letters("AB");
        assert!(g.insert_gene(0, 'Q').is_err());
        assert!(g.insert_gene(2, 'Q').is_ok());
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn test_remove_gene() {
        let mut g = letters("ABC");
        assert_eq!(g.remove_gene(&0).unwrap(), 'A');
        assert_eq!(g.len(), 2);
        assert!(g.remove_gene(&0).is_err());
    }

    #[test]
    fn test_loci_are_ordered() {
        let g = Genome::from_genes([(3usize, 'D'), (0, 'A'), (2, 'C'), (1, 'B')]);
        let loci: Vec<usize> = g.loci().copied().collect();
        assert_eq!(loci, vec![0, 1, 2, 3]);
        assert_eq!(g.locus_at(2), Some(&2));
    }

    #[test]
    fn test_clone_is_deep() {
        let a = letters("ABC");
        let mut b = a.clone();
        b.replace_gene(&0, 'Z').unwrap();
        assert_eq!(a.gene(&0), Some(&'A'));
    }

    // ---- Distance ----

    #[test]
    fn test_distance_and_similarity() {
        let a = letters("ABCD");
        let b = letters("ABXY");
        assert_eq!(a.distance(&b), 2);
        assert!((a.similarity(&b) - 0.5).abs() < 1e-12);
        assert_eq!(a.distance(&a), 0);
    }

    #[test]
    fn test_distance_counts_missing_loci() {
        let a = letters("AB");
        let b = letters("ABC");
        assert_eq!(a.distance(&b), 1);
        assert_eq!(b.distance(&a), 1);
    }

    // ---- Comparison ----

    #[test]
    fn test_compare_unevaluated_is_worst() {
        let a = letters("A");
        let mut b = letters("B");
        b.set_fitness(vec![Fitness::maximizing(f64::NEG_INFINITY)]);
        assert_eq!(a.compare_fitness(&b), Ordering::Less);
    }

    #[test]
    fn test_compare_multi_objective_respects_dominance() {
        let mut a = letters("A");
        let mut b = letters("B");
        a.set_fitness(vec![Fitness::maximizing(2.0), Fitness::minimizing(1.0)]);
        b.set_fitness(vec![Fitness::maximizing(2.0), Fitness::minimizing(3.0)]);
        assert_eq!(a.compare_fitness(&b), Ordering::Greater);
        assert_eq!(b.compare_fitness(&a), Ordering::Less);
    }
}
