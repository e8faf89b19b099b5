//! Populations of genomes.
//!
//! [`Population`] is the seam between the generation loop and how
//! individuals are stored and paired. It is object-safe so drivers and
//! speciation can work with `Box<dyn Population>`.
//!
//! Aggregates (total fitness, total selection probability) are computed
//! on first request and cached until membership or scores change. Only the
//! orchestrating thread touches them; worker tasks never see the cache.
//!
//! The free functions at the bottom hold the storage-independent work
//! (evaluation, penalties, fitness sharing) so every layout shares it.

use super::genome::{Genome, Parents};
use super::selection::{selection_weights, Selector};
use super::types::{evaluate_with, Breeder, FitnessEvaluator, Gene, Locus};
use crate::error::GeneticError;
use crate::executor::TaskExecutor;
use crate::random::{create_rng, task_seeds};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::OnceLock;

/// An evolving collection of genomes.
pub trait Population<K: Locus, G: Gene>: Send + Sync {
    fn name(&self) -> &'static str;

    /// An empty population of the same kind and selector.
    fn spawn_empty(&self) -> Box<dyn Population<K, G>>;

    fn clear(&mut self);

    fn add(&mut self, genome: Genome<K, G>) -> Result<(), GeneticError>;

    fn add_all(&mut self, genomes: Vec<Genome<K, G>>) -> Result<(), GeneticError> {
        genomes.into_iter().try_for_each(|g| self.add(g))
    }

    fn remove(&mut self, index: usize) -> Option<Genome<K, G>>;

    /// Removes and returns every member, leaving the population empty.
    fn take_all(&mut self) -> Vec<Genome<K, G>>;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn individuals(&self) -> &[Genome<K, G>];

    /// Stable sort ascending by fitness: worst first, elite last.
    fn sort(&mut self);

    /// Sorts and rebuilds the selector's sampling structure.
    fn reindex(&mut self);

    /// Draws up to `count` parent pairs. Fewer pairs come back only when
    /// the population is empty.
    fn select(&self, count: usize, rng: &mut dyn RngCore) -> Vec<Parents<'_, K, G>>;

    /// Evaluates every genome flagged as needing it, concurrently, and
    /// returns how many were evaluated.
    fn evaluate_fitness(
        &mut self,
        evaluator: &dyn FitnessEvaluator<K, G>,
        executor: &TaskExecutor,
    ) -> Result<usize, GeneticError>;

    /// Worsens every score of the member at `index` by `fraction`.
    fn penalize(&mut self, index: usize, fraction: f64);

    /// Replaces every member's scores with its shared scores: each score
    /// is divided among the member's niche, the sum of its genotype
    /// similarity to every member (itself included).
    ///
    /// Scores must be fresh; sharing an already shared score compounds.
    fn share_fitness(&mut self, executor: &TaskExecutor) -> Result<(), GeneticError>;

    /// Whether storage order carries meaning (a spatial layout) that
    /// sorting and speciation must preserve.
    fn is_spatial(&self) -> bool {
        false
    }

    /// Sum of primary scores over evaluated members.
    fn total_fitness(&self) -> f64;

    /// Sum of roulette selection weights.
    fn total_probability(&self) -> f64;

    /// The best member, if any.
    fn best(&self) -> Option<&Genome<K, G>> {
        self.individuals()
            .iter()
            .max_by(|a, b| a.compare_fitness(b))
    }

    /// Breeds `count` fresh genomes, one task per genome.
    fn breed(
        &self,
        count: usize,
        breeder: &dyn Breeder<K, G>,
        executor: &TaskExecutor,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Genome<K, G>>, GeneticError> {
        let seeds = task_seeds(rng, count);
        executor.map(seeds, |seed| Ok(breeder.breed(&mut create_rng(seed))))
    }

    /// Mean per-locus Shannon entropy of the genes.
    fn calculate_entropy(&self) -> f64 {
        population_entropy(self.individuals())
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Aggregates {
    pub total_fitness: f64,
    pub total_probability: f64,
}

impl Aggregates {
    pub(super) fn of<K: Locus, G: Gene>(individuals: &[Genome<K, G>]) -> Self {
        Self {
            total_fitness: individuals
                .iter()
                .filter_map(Genome::primary_fitness)
                .map(|f| f.value())
                .sum(),
            total_probability: selection_weights(individuals).iter().sum(),
        }
    }
}

/// A flat, unstructured population with one selector.
#[derive(Debug, Clone)]
pub struct StandardPopulation<K, G> {
    individuals: Vec<Genome<K, G>>,
    selector: Selector,
    aggregates: OnceLock<Aggregates>,
}

impl<K: Locus, G: Gene> StandardPopulation<K, G> {
    pub fn new(selector: Selector) -> Self {
        Self {
            individuals: Vec::new(),
            selector,
            aggregates: OnceLock::new(),
        }
    }

    pub fn with_individuals(selector: Selector, individuals: Vec<Genome<K, G>>) -> Self {
        Self {
            individuals,
            selector,
            aggregates: OnceLock::new(),
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    fn invalidate(&mut self) {
        self.aggregates.take();
    }

    fn aggregates(&self) -> Aggregates {
        *self
            .aggregates
            .get_or_init(|| Aggregates::of(&self.individuals))
    }
}

impl<K: Locus, G: Gene> Population<K, G> for StandardPopulation<K, G> {
    fn name(&self) -> &'static str {
        "StandardPopulation"
    }

    fn spawn_empty(&self) -> Box<dyn Population<K, G>> {
        let mut selector = self.selector.clone();
        selector.reset();
        Box::new(StandardPopulation::new(selector))
    }

    fn clear(&mut self) {
        self.individuals.clear();
        self.invalidate();
    }

    fn add(&mut self, genome: Genome<K, G>) -> Result<(), GeneticError> {
        self.individuals.push(genome);
        self.invalidate();
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Option<Genome<K, G>> {
        if index >= self.individuals.len() {
            return None;
        }
        self.invalidate();
        Some(self.individuals.remove(index))
    }

    fn take_all(&mut self) -> Vec<Genome<K, G>> {
        self.invalidate();
        std::mem::take(&mut self.individuals)
    }

    fn size(&self) -> usize {
        self.individuals.len()
    }

    fn individuals(&self) -> &[Genome<K, G>] {
        &self.individuals
    }

    fn sort(&mut self) {
        self.individuals.sort_by(|a, b| a.compare_fitness(b));
    }

    fn reindex(&mut self) {
        self.sort();
        self.selector.reindex(&self.individuals);
    }

    fn select(&self, count: usize, rng: &mut dyn RngCore) -> Vec<Parents<'_, K, G>> {
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(mom) = self.selector.next_index(&self.individuals, rng) else {
                break;
            };
            let Some(dad) = self.selector.next_index(&self.individuals, rng) else {
                break;
            };
            pairs.push(Parents {
                mom: &self.individuals[mom],
                dad: &self.individuals[dad],
            });
        }
        pairs
    }

    fn evaluate_fitness(
        &mut self,
        evaluator: &dyn FitnessEvaluator<K, G>,
        executor: &TaskExecutor,
    ) -> Result<usize, GeneticError> {
        let evaluated = evaluate_pending(&mut self.individuals, evaluator, executor)?;
        if evaluated > 0 {
            self.invalidate();
        }
        Ok(evaluated)
    }

    fn penalize(&mut self, index: usize, fraction: f64) {
        if penalize_member(&mut self.individuals, index, fraction) {
            self.invalidate();
        }
    }

    fn share_fitness(&mut self, executor: &TaskExecutor) -> Result<(), GeneticError> {
        self.invalidate();
        share_scores(&mut self.individuals, executor)
    }

    fn total_fitness(&self) -> f64 {
        self.aggregates().total_fitness
    }

    fn total_probability(&self) -> f64 {
        self.aggregates().total_probability
    }
}

/// Evaluates every member flagged as needing it, one task per member.
pub(super) fn evaluate_pending<K: Locus, G: Gene>(
    individuals: &mut [Genome<K, G>],
    evaluator: &dyn FitnessEvaluator<K, G>,
    executor: &TaskExecutor,
) -> Result<usize, GeneticError> {
    let pending = individuals
        .iter()
        .filter(|g| g.is_evaluation_needed())
        .count();
    if pending > 0 {
        executor.for_each_mut(individuals, |genome| {
            if genome.is_evaluation_needed() {
                evaluate_with(evaluator, genome)
            } else {
                Ok(())
            }
        })?;
    }
    Ok(pending)
}

/// Returns whether a member exists at `index`.
pub(super) fn penalize_member<K: Locus, G: Gene>(
    individuals: &mut [Genome<K, G>],
    index: usize,
    fraction: f64,
) -> bool {
    let Some(genome) = individuals.get_mut(index) else {
        return false;
    };
    let penalized = genome
        .fitness()
        .iter()
        .map(|f| f.penalize(fraction))
        .collect();
    genome.set_fitness(penalized);
    true
}

/// Niche counts are computed concurrently; each is `O(n)` similarity
/// checks. Unevaluated members keep their empty score vectors.
pub(super) fn share_scores<K: Locus, G: Gene>(
    individuals: &mut [Genome<K, G>],
    executor: &TaskExecutor,
) -> Result<(), GeneticError> {
    let niches = {
        let members: &[Genome<K, G>] = &*individuals;
        executor.map((0..members.len()).collect(), |i| {
            Ok(members
                .iter()
                .map(|other| members[i].similarity(other))
                .sum::<f64>())
        })?
    };
    for (genome, niche) in individuals.iter_mut().zip(niches) {
        if genome.fitness().is_empty() {
            continue;
        }
        let shared = genome.fitness().iter().map(|f| f.share(niche)).collect();
        genome.set_fitness(shared);
    }
    Ok(())
}

/// Mean over loci of `-Σ p·log_b(p)`, where `p` is the share of the
/// population holding each gene value and `b = max(loci, 2)`.
///
/// Zero for a converged population; grows with diversity.
pub fn population_entropy<K: Locus, G: Gene>(individuals: &[Genome<K, G>]) -> f64 {
    let Some(first) = individuals.first() else {
        return 0.0;
    };
    let loci: Vec<&K> = first.loci().collect();
    if loci.is_empty() {
        return 0.0;
    }

    let n = individuals.len() as f64;
    let log_base = (loci.len().max(2) as f64).ln();
    let mut counts: HashMap<&G, usize> = HashMap::new();
    let mut sum = 0.0;
    for locus in &loci {
        counts.clear();
        for gene in individuals.iter().filter_map(|g| g.gene(locus)) {
            *counts.entry(gene).or_insert(0) += 1;
        }
        let locus_entropy: f64 = counts
            .values()
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.ln() / log_base
            })
            .sum();
        sum += locus_entropy;
    }
    sum / loci.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::fitness::Fitness;
    use crate::ga::testing::{letters, scored, FailingEvaluator, MatchTarget, RandomLetters};
    use crate::random::create_rng;

    fn population_of(values: &[f64]) -> StandardPopulation<usize, char> {
        StandardPopulation::with_individuals(
            Selector::default(),
            values.iter().map(|&v| scored("ABC", v)).collect(),
        )
    }

    // ---- Membership ----

    #[test]
    fn test_add_remove_clear() {
        let mut pop = population_of(&[1.0, 2.0]);
        pop.add(scored("XYZ", 3.0)).unwrap();
        assert_eq!(pop.size(), 3);
        let removed = pop.remove(0).unwrap();
        assert_eq!(removed.fitness()[0].value(), 1.0);
        assert!(pop.remove(10).is_none());
        pop.clear();
        assert!(pop.is_empty());
    }

    #[test]
    fn test_sort_ascending_elite_last() {
        let mut pop = population_of(&[5.0, 1.0, 3.0]);
        pop.sort();
        let values: Vec<f64> = pop.individuals().iter().map(|g| g.fitness()[0].value()).collect();
        assert_eq!(values, vec![1.0, 3.0, 5.0]);
        assert_eq!(pop.best().unwrap().fitness()[0].value(), 5.0);
    }

    // ---- Aggregates ----

    #[test]
    fn test_totals_invalidate_on_membership_change() {
        let mut pop = population_of(&[1.0, 2.0]);
        assert!((pop.total_fitness() - 3.0).abs() < 1e-12);
        assert!((pop.total_probability() - 3.0).abs() < 1e-12);
        pop.add(scored("ABC", 4.0)).unwrap();
        assert!((pop.total_fitness() - 7.0).abs() < 1e-12);
        pop.remove(0);
        assert!((pop.total_fitness() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_penalize() {
        let mut pop = population_of(&[10.0]);
        let before = pop.total_fitness();
        pop.penalize(0, 0.1);
        assert!((pop.individuals()[0].fitness()[0].value() - 9.0).abs() < 1e-12);
        assert!(pop.total_fitness() < before);
    }

    // ---- Fitness sharing ----

    #[test]
    fn test_share_fitness_divides_by_niche() {
        let mut pop = StandardPopulation::with_individuals(
            Selector::Random,
            vec![scored("AAAA", 8.0), scored("AAAA", 8.0), scored("ZZZZ", 8.0)],
        );
        assert!((pop.total_fitness() - 24.0).abs() < 1e-12);
        pop.share_fitness(&TaskExecutor::parallel()).unwrap();
        let values: Vec<f64> = pop.individuals().iter().map(|g| g.fitness()[0].value()).collect();
        assert_eq!(values, vec![4.0, 4.0, 8.0]);
        assert!((pop.total_fitness() - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_share_fitness_partial_similarity_and_minimizing() {
        let mut a = letters("AABB");
        a.set_fitness(vec![Fitness::minimizing(3.0)]);
        let mut b = letters("AAAA");
        b.set_fitness(vec![Fitness::minimizing(3.0)]);
        let mut pop = StandardPopulation::with_individuals(Selector::Random, vec![a, b]);
        pop.share_fitness(&TaskExecutor::sequential()).unwrap();
        for genome in pop.individuals() {
            // Niche 1.5: itself plus half of the other.
            assert!((genome.fitness()[0].value() - 4.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_share_fitness_skips_unevaluated() {
        let mut pop = StandardPopulation::with_individuals(
            Selector::Random,
            vec![letters("ABC"), scored("ABC", 6.0)],
        );
        pop.share_fitness(&TaskExecutor::sequential()).unwrap();
        assert!(pop.individuals()[0].fitness().is_empty());
        assert_eq!(pop.individuals()[1].fitness()[0].value(), 3.0);
    }

    // ---- Selection ----

    #[test]
    fn test_select_returns_requested_pairs() {
        let mut pop = population_of(&[1.0, 2.0, 3.0, 4.0]);
        pop.reindex();
        let pairs = pop.select(10, &mut create_rng(42));
        assert_eq!(pairs.len(), 10);
    }

    #[test]
    fn test_select_empty_returns_no_pairs() {
        let pop: StandardPopulation<usize, char> = StandardPopulation::new(Selector::Random);
        assert!(pop.select(5, &mut create_rng(42)).is_empty());
    }

    // ---- Breeding and evaluation ----

    #[test]
    fn test_breed_is_deterministic_under_parallelism() {
        let pop: StandardPopulation<usize, char> = StandardPopulation::new(Selector::Random);
        let breeder = RandomLetters { length: 12 };
        let a = pop
            .breed(32, &breeder, &TaskExecutor::parallel(), &mut create_rng(9))
            .unwrap();
        let b = pop
            .breed(32, &breeder, &TaskExecutor::sequential(), &mut create_rng(9))
            .unwrap();
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
    }

    #[test]
    fn test_evaluate_only_dirty() {
        let evaluator = MatchTarget::maximizing("ABC");
        let calls = evaluator.calls.clone();
        let mut pop = StandardPopulation::with_individuals(
            Selector::Random,
            vec![letters("ABC"), scored("XYZ", 0.0), letters("ABX")],
        );
        let evaluated = pop
            .evaluate_fitness(&evaluator, &TaskExecutor::parallel())
            .unwrap();
        assert_eq!(evaluated, 2);
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 2);
        assert!(pop.individuals().iter().all(|g| !g.is_evaluation_needed()));
        assert_eq!(pop.individuals()[0].fitness()[0], Fitness::maximizing(3.0));
        assert!((pop.total_fitness() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_error_propagates() {
        let mut pop = StandardPopulation::with_individuals(Selector::Random, vec![letters("A")]);
        let result = pop.evaluate_fitness(&FailingEvaluator, &TaskExecutor::sequential());
        assert!(matches!(result, Err(GeneticError::Evaluation(_))));
    }

    #[test]
    fn test_spawn_empty() {
        let pop = population_of(&[1.0]);
        let empty = pop.spawn_empty();
        assert!(empty.is_empty());
        assert_eq!(empty.name(), "StandardPopulation");
        assert!(!empty.is_spatial());
    }

    // ---- Entropy ----

    #[test]
    fn test_entropy_converged_is_zero() {
        let inds = vec![letters("ABCD"), letters("ABCD"), letters("ABCD")];
        assert_eq!(population_entropy(&inds), 0.0);
    }

    #[test]
    fn test_entropy_grows_with_diversity() {
        let low = vec![letters("ABCD"), letters("ABCD"), letters("ABCE"), letters("ABCD")];
        let high = vec![letters("ABCD"), letters("BCDA"), letters("CDAB"), letters("DABC")];
        let (lo, hi) = (population_entropy(&low), population_entropy(&high));
        assert!(hi > lo, "high {hi} <= low {lo}");
        assert!((hi - 1.0).abs() < 1e-12, "four loci, four equally likely values: {hi}");
    }

    #[test]
    fn test_entropy_empty() {
        let empty: Vec<Genome<usize, char>> = Vec::new();
        assert_eq!(population_entropy(&empty), 0.0);
    }
}
