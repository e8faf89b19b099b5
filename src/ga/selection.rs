//! Parent selection.
//!
//! A [`Selector`] turns a population into parent indices. Selection is a
//! serial phase: the driver calls [`Selector::reindex`] once per
//! generation and then draws indices with [`Selector::next_index`] from a
//! single thread. Selectors only look at scores, so they accept any slice
//! of [`Scored`] items: a whole population or a borrowed neighbourhood.
//!
//! Selecting from an empty population is recoverable: `next_index`
//! returns `None` and logs a warning.
//!
//! # References
//!
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"
//! - Goldberg & Deb (1991), "A Comparative Analysis of Selection Schemes
//!   Used in Genetic Algorithms"

use super::fitness::{convert_from_log_probability, FitnessGoal};
use super::genome::{compare_scores, Scored};
use super::roulette::{cumulative_nodes, BinaryRouletteTree, RouletteNode};
use crate::error::GeneticError;
use rand::Rng;
use std::cmp::Ordering;

/// Precomputed fitness-proportional sampling structure.
#[derive(Debug, Clone, Default)]
pub struct RouletteWheel {
    tree: BinaryRouletteTree,
    total: f64,
    indexed: usize,
}

impl RouletteWheel {
    fn build<S: Scored>(individuals: &[S]) -> Self {
        let (nodes, total) = cumulative_nodes(selection_weights(individuals));
        Self {
            tree: BinaryRouletteTree::from_sorted(&nodes),
            total,
            indexed: individuals.len(),
        }
    }

    fn draw<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> usize {
        if self.tree.is_empty() || self.total <= 0.0 {
            return rng.random_range(0..n);
        }
        let x = rng.random::<f64>() * self.total;
        self.tree
            .find(x)
            .map(RouletteNode::index)
            .unwrap_or_else(|| rng.random_range(0..n))
    }
}

/// Individual indices ordered worst to best.
#[derive(Debug, Clone, Default)]
pub struct TruncationRanking {
    order: Vec<usize>,
}

impl TruncationRanking {
    fn build<S: Scored>(individuals: &[S]) -> Self {
        let mut order: Vec<usize> = (0..individuals.len()).collect();
        order.sort_by(|&a, &b| compare_scores(individuals[a].scores(), individuals[b].scores()));
        Self { order }
    }
}

/// Parent selection strategy.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Uniform pick.
    Random,

    /// Fitness-proportional pick over a [`BinaryRouletteTree`].
    Roulette(RouletteWheel),

    /// Draws `size` competitors at random (repeats allowed), ranks them and
    /// walks from best to worst accepting each with probability
    /// `accuracy`. If none is accepted the weakest competitor wins.
    Tournament { size: usize, accuracy: f64 },

    /// Ranks the population by fitness and picks uniformly among the top
    /// `1 - percentage`. The ranking is built by `reindex`, or on the spot
    /// when the slice size no longer matches it.
    Truncation {
        percentage: f64,
        ranking: TruncationRanking,
    },

    /// Always the best individual; the first one on ties.
    Alpha,
}

impl Default for Selector {
    fn default() -> Self {
        Selector::Tournament {
            size: 3,
            accuracy: 0.9,
        }
    }
}

impl Selector {
    pub fn roulette() -> Self {
        Selector::Roulette(RouletteWheel::default())
    }

    pub fn tournament(size: usize, accuracy: f64) -> Result<Self, GeneticError> {
        if size == 0 {
            return Err(GeneticError::InvalidConfig(
                "tournament_size must be at least 1".into(),
            ));
        }
        check_unit("tournament_selector_accuracy", accuracy)?;
        Ok(Selector::Tournament { size, accuracy })
    }

    pub fn truncation(percentage: f64) -> Result<Self, GeneticError> {
        check_unit("truncation_percentage", percentage)?;
        Ok(Selector::Truncation {
            percentage,
            ranking: TruncationRanking::default(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Selector::Random => "RandomSelector",
            Selector::Roulette(_) => "RouletteSelector",
            Selector::Tournament { .. } => "TournamentSelector",
            Selector::Truncation { .. } => "TruncationSelector",
            Selector::Alpha => "AlphaSelector",
        }
    }

    /// Rebuilds any sampling structure. Call after membership or fitness
    /// changes.
    pub fn reindex<S: Scored>(&mut self, individuals: &[S]) {
        match self {
            Selector::Roulette(wheel) => *wheel = RouletteWheel::build(individuals),
            Selector::Truncation { ranking, .. } => *ranking = TruncationRanking::build(individuals),
            _ => {}
        }
    }

    /// Drops any sampling structure, so the next draws index on the spot.
    pub fn reset(&mut self) {
        match self {
            Selector::Roulette(wheel) => *wheel = RouletteWheel::default(),
            Selector::Truncation { ranking, .. } => *ranking = TruncationRanking::default(),
            _ => {}
        }
    }

    /// Draws one parent index, or `None` if `individuals` is empty.
    ///
    /// No ordering of `individuals` is assumed.
    pub fn next_index<S: Scored, R: Rng + ?Sized>(
        &self,
        individuals: &[S],
        rng: &mut R,
    ) -> Option<usize> {
        let n = individuals.len();
        if n == 0 {
            tracing::warn!(selector = self.name(), "cannot select from an empty population");
            return None;
        }

        let index = match self {
            Selector::Random => rng.random_range(0..n),
            Selector::Roulette(wheel) if wheel.indexed == n => wheel.draw(n, rng),
            Selector::Roulette(_) => RouletteWheel::build(individuals).draw(n, rng),
            Selector::Tournament { size, accuracy } => {
                let competitors: Vec<usize> =
                    (0..(*size).clamp(1, n)).map(|_| rng.random_range(0..n)).collect();
                run_tournament(individuals, competitors, *accuracy, rng)
            }
            Selector::Truncation {
                percentage,
                ranking,
            } => {
                let cutoff = truncation_cutoff(n, *percentage);
                let rank = cutoff + rng.random_range(0..n - cutoff);
                if ranking.order.len() == n {
                    ranking.order[rank]
                } else {
                    TruncationRanking::build(individuals).order[rank]
                }
            }
            Selector::Alpha => (1..n).fold(0, |best, i| {
                match compare_scores(individuals[i].scores(), individuals[best].scores()) {
                    Ordering::Greater => i,
                    _ => best,
                }
            }),
        };
        Some(index)
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), GeneticError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(GeneticError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

/// First index of the truncation slice; always leaves at least one entry.
fn truncation_cutoff(n: usize, percentage: f64) -> usize {
    ((n as f64 * percentage).floor() as usize).min(n - 1)
}

/// Ranks `competitors` best first and walks down accepting each with
/// probability `accuracy`.
fn run_tournament<S: Scored, R: Rng + ?Sized>(
    individuals: &[S],
    mut competitors: Vec<usize>,
    accuracy: f64,
    rng: &mut R,
) -> usize {
    competitors.sort_by(|&a, &b| compare_scores(individuals[b].scores(), individuals[a].scores()));
    for &candidate in &competitors {
        if rng.random_bool(accuracy) {
            return candidate;
        }
    }
    competitors[competitors.len() - 1]
}

/// Non-negative roulette weights, one per individual.
///
/// Maximizing scores go through [`convert_from_log_probability`].
/// Minimizing scores are inverted against the population maximum so the
/// lowest score gets the largest weight. Unevaluated genomes weigh zero.
pub fn selection_weights<S: Scored>(individuals: &[S]) -> Vec<f64> {
    const EPSILON: f64 = 1e-10;

    let minimizing = individuals
        .iter()
        .filter_map(|g| g.primary_score())
        .any(|f| f.goal() == FitnessGoal::Minimize);

    if !minimizing {
        return individuals
            .iter()
            .map(|g| {
                g.primary_score()
                    .map_or(0.0, |f| convert_from_log_probability(f.effective_value()))
            })
            .collect();
    }

    let max = individuals
        .iter()
        .filter_map(|g| g.primary_score())
        .map(|f| f.effective_value())
        .fold(f64::NEG_INFINITY, f64::max);
    individuals
        .iter()
        .map(|g| {
            g.primary_score()
                .map_or(0.0, |f| (max - f.effective_value() + EPSILON).max(EPSILON))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::fitness::Fitness;
    use crate::ga::genome::Genome;
    use crate::ga::testing::{letters, scored};
    use crate::random::create_rng;
    use proptest::prelude::{any, prop_assert, proptest};

    fn sorted_population(n: usize) -> Vec<Genome<usize, char>> {
        (0..n).map(|i| scored("AB", i as f64)).collect()
    }

    fn all_selectors() -> Vec<Selector> {
        vec![
            Selector::Random,
            Selector::roulette(),
            Selector::tournament(3, 0.9).unwrap(),
            Selector::truncation(0.5).unwrap(),
            Selector::Alpha,
        ]
    }

    // ---- Empty input ----

    #[test]
    fn test_empty_population_returns_none() {
        let empty: Vec<Genome<usize, char>> = Vec::new();
        let mut rng = create_rng(42);
        for mut selector in all_selectors() {
            selector.reindex(&empty);
            assert_eq!(selector.next_index(&empty, &mut rng), None, "{}", selector.name());
        }
    }

    // ---- Validation ----

    #[test]
    fn test_out_of_range_parameters_rejected() {
        assert!(Selector::tournament(3, 1.5).is_err());
        assert!(Selector::tournament(3, -0.1).is_err());
        assert!(Selector::tournament(0, 0.5).is_err());
        assert!(Selector::truncation(1.01).is_err());
        assert!(Selector::truncation(1.0).is_ok());
    }

    // ---- Tournament ----

    #[test]
    fn test_tournament_full_accuracy_picks_best_competitor() {
        let pop = sorted_population(10);
        let mut rng = create_rng(42);
        for _ in 0..100 {
            let winner = run_tournament(&pop, vec![2, 9, 4], 1.0, &mut rng);
            assert_eq!(winner, 9);
        }
    }

    #[test]
    fn test_tournament_zero_accuracy_picks_weakest() {
        let pop = sorted_population(10);
        let mut rng = create_rng(42);
        let winner = run_tournament(&pop, vec![5, 1, 8], 0.0, &mut rng);
        assert_eq!(winner, 1);
    }

    #[test]
    fn test_tournament_single_individual() {
        let pop = sorted_population(1);
        let selector = Selector::tournament(5, 0.9).unwrap();
        let mut rng = create_rng(42);
        assert_eq!(selector.next_index(&pop, &mut rng), Some(0));
    }

    #[test]
    fn test_tournament_biases_toward_fitter() {
        let pop = sorted_population(20);
        let selector = Selector::tournament(3, 0.9).unwrap();
        let mut rng = create_rng(42);
        let mean: f64 = (0..2000)
            .map(|_| selector.next_index(&pop, &mut rng).unwrap() as f64)
            .sum::<f64>()
            / 2000.0;
        assert!(mean > 11.0, "tournament mean index {mean} shows no pressure");
    }

    // ---- Roulette ----

    #[test]
    fn test_roulette_proportional() {
        // 20 categories with weights 10..=29, normalized to sum to 1
        let raw: Vec<f64> = (10..30).map(f64::from).collect();
        let sum: f64 = raw.iter().sum();
        let weights: Vec<f64> = raw.iter().map(|w| w / sum).collect();
        let pop: Vec<Genome<usize, char>> = weights.iter().map(|&w| scored("AB", w)).collect();

        let mut selector = Selector::roulette();
        selector.reindex(&pop);
        let mut rng = create_rng(42);
        let draws = 1_000_000;
        let mut counts = vec![0usize; pop.len()];
        for _ in 0..draws {
            counts[selector.next_index(&pop, &mut rng).unwrap()] += 1;
        }

        for (i, &expected) in weights.iter().enumerate() {
            let observed = counts[i] as f64 / draws as f64;
            assert!(
                (observed - expected).abs() < 0.001,
                "category {i}: expected {expected:.4}, observed {observed:.4}"
            );
        }
    }

    #[test]
    fn test_roulette_log_probabilities() {
        let pop = vec![scored("A", 0.1_f64.ln()), scored("B", 0.9_f64.ln())];
        let weights = selection_weights(&pop);
        assert!((weights[0] - 0.1).abs() < 1e-9);
        assert!((weights[1] - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_roulette_never_picks_zero_weight() {
        let pop = vec![scored("A", 0.0), scored("B", 2.0), scored("C", 0.0)];
        let mut selector = Selector::roulette();
        selector.reindex(&pop);
        let mut rng = create_rng(7);
        for _ in 0..1000 {
            assert_eq!(selector.next_index(&pop, &mut rng), Some(1));
        }
    }

    #[test]
    fn test_roulette_all_zero_falls_back_to_uniform() {
        let pop = vec![letters("A"), letters("B")];
        let mut selector = Selector::roulette();
        selector.reindex(&pop);
        let mut rng = create_rng(7);
        let idx = selector.next_index(&pop, &mut rng).unwrap();
        assert!(idx < 2);
    }

    #[test]
    fn test_roulette_minimizing_weights_favor_low() {
        let mut a = letters("A");
        let mut b = letters("B");
        a.set_fitness(vec![Fitness::minimizing(1.0)]);
        b.set_fitness(vec![Fitness::minimizing(5.0)]);
        let weights = selection_weights(&[a, b]);
        assert!(weights[0] > weights[1]);
    }

    #[test]
    fn test_roulette_stale_index_rebuilds() {
        let pop = vec![scored("A", 0.0), scored("B", 1.0)];
        let selector = Selector::roulette();
        let mut rng = create_rng(1);
        assert_eq!(selector.next_index(&pop, &mut rng), Some(1));
    }

    // ---- Truncation ----

    #[test]
    fn test_truncation_ranks_unsorted_input() {
        let values = [7.0, 0.0, 9.0, 3.0, 1.0, 8.0, 2.0, 6.0, 4.0, 5.0];
        let pop: Vec<Genome<usize, char>> = values.iter().map(|&v| scored("AB", v)).collect();
        let selector = Selector::truncation(0.7).unwrap();
        let mut rng = create_rng(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let idx = selector.next_index(&pop, &mut rng).unwrap();
            assert!(values[idx] >= 7.0, "picked {} outside the top 30%", values[idx]);
            seen.insert(idx);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_truncation_reindexed_ranking_matches_on_the_spot() {
        let pop: Vec<Genome<usize, char>> =
            [4.0, 1.0, 3.0, 0.0].iter().map(|&v| scored("AB", v)).collect();
        let mut indexed = Selector::truncation(0.75).unwrap();
        indexed.reindex(&pop);
        let fresh = Selector::truncation(0.75).unwrap();
        let mut rng = create_rng(3);
        for _ in 0..20 {
            assert_eq!(indexed.next_index(&pop, &mut rng), Some(0));
            assert_eq!(fresh.next_index(&pop, &mut rng), Some(0));
        }
    }

    #[test]
    fn test_truncation_full_percentage_picks_last() {
        let pop = sorted_population(10);
        let selector = Selector::truncation(1.0).unwrap();
        let mut rng = create_rng(42);
        assert_eq!(selector.next_index(&pop, &mut rng), Some(9));
    }

    // ---- Alpha ----

    #[test]
    fn test_alpha_picks_best() {
        let pop: Vec<Genome<usize, char>> =
            [2.0, 9.0, 4.0, 9.0, 1.0].iter().map(|&v| scored("AB", v)).collect();
        let mut rng = create_rng(42);
        for _ in 0..10 {
            assert_eq!(Selector::Alpha.next_index(&pop, &mut rng), Some(1));
        }
    }

    #[test]
    fn test_alpha_minimizing_and_borrowed() {
        let mut a = letters("A");
        let mut b = letters("B");
        a.set_fitness(vec![Fitness::minimizing(5.0)]);
        b.set_fitness(vec![Fitness::minimizing(2.0)]);
        let neighbourhood = vec![&a, &b];
        assert_eq!(Selector::Alpha.next_index(&neighbourhood, &mut create_rng(1)), Some(1));
    }

    proptest! {
        #[test]
        fn prop_truncation_bound(n in 1usize..200, pct in 0.0f64..1.0, seed in any::<u64>()) {
            let pop = sorted_population(n);
            let selector = Selector::truncation(pct).unwrap();
            let mut rng = create_rng(seed);
            let idx = selector.next_index(&pop, &mut rng).unwrap();
            let cutoff = (n as f64 * pct).floor() as usize;
            prop_assert!(idx >= cutoff && idx < n, "idx {} outside [{}, {})", idx, cutoff, n);
        }

        #[test]
        fn prop_index_in_range(n in 1usize..100, seed in any::<u64>()) {
            let pop = sorted_population(n);
            let mut rng = create_rng(seed);
            for mut selector in all_selectors() {
                selector.reindex(&pop);
                let idx = selector.next_index(&pop, &mut rng).unwrap();
                prop_assert!(idx < n);
            }
        }
    }
}
