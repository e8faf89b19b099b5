//! Pareto ranking over fitness vectors.
//!
//! Used by the divergent driver to rank sub-populations by their best
//! individuals when genomes carry several objectives. Each [`Fitness`]
//! knows its own direction, so objectives may mix maximizing and
//! minimizing scores.
//!
//! # Algorithms
//!
//! - [`non_dominated_sort`]: Fast non-dominated sorting (Deb et al., 2002)
//! - [`dominates`]: Pairwise Pareto dominance
//!
//! # References
//!
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//! - IEEE Transactions on Evolutionary Computation, 6(2), 182-197

use super::fitness::Fitness;
use std::cmp::Ordering;

/// Result of non-dominated sorting.
///
/// Each element of `ranks` corresponds to the Pareto rank of the solution
/// at the same index. Rank 0 is the Pareto front (non-dominated solutions).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NondominatedSortResult {
    /// Pareto rank for each solution (0 = front).
    pub ranks: Vec<usize>,

    /// Indices grouped by front: `fronts[0]` contains rank-0 indices, etc.
    pub fronts: Vec<Vec<usize>>,
}

/// Whether `a` Pareto-dominates `b`: at least as good in every objective
/// and strictly better in one.
///
/// A scored vector dominates an empty (unevaluated) one. Objectives are
/// paired by position.
pub fn dominates(a: &[Fitness], b: &[Fitness]) -> bool {
    dominance_cmp(a, b) == Dominance::Left
}

/// Fast non-dominated sorting.
///
/// # Complexity
///
/// O(m * n²) where m = number of objectives, n = number of solutions
///
/// # Example
///
/// ```
/// use u_genetic::ga::multi_objective::non_dominated_sort;
/// use u_genetic::ga::Fitness;
///
/// let max = Fitness::maximizing;
/// let scores = vec![
///     vec![max(5.0), max(1.0)],  // A
///     vec![max(3.0), max(3.0)],  // B
///     vec![max(1.0), max(5.0)],  // C
///     vec![max(2.0), max(2.0)],  // D, dominated by B
/// ];
///
/// let result = non_dominated_sort(&scores);
/// assert_eq!(result.ranks, vec![0, 0, 0, 1]);
/// ```
pub fn non_dominated_sort(scores: &[Vec<Fitness>]) -> NondominatedSortResult {
    let n = scores.len();
    let mut domination_count = vec![0usize; n];
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut ranks = vec![0usize; n];

    for i in 0..n {
        for j in (i + 1)..n {
            match dominance_cmp(&scores[i], &scores[j]) {
                Dominance::Left => {
                    dominated_by[i].push(j);
                    domination_count[j] += 1;
                }
                Dominance::Right => {
                    dominated_by[j].push(i);
                    domination_count[i] += 1;
                }
                Dominance::Neither => {}
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    ranks[j] = fronts.len() + 1;
                    next.push(j);
                }
            }
        }
        fronts.push(std::mem::replace(&mut current, next));
    }

    NondominatedSortResult { ranks, fronts }
}

/// Pareto rank of each score vector (0 = non-dominated).
pub fn pareto_ranks(scores: &[Vec<Fitness>]) -> Vec<usize> {
    non_dominated_sort(scores).ranks
}

#[derive(Debug, PartialEq)]
enum Dominance {
    Left,
    Right,
    Neither,
}

fn dominance_cmp(a: &[Fitness], b: &[Fitness]) -> Dominance {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Dominance::Neither,
        (false, true) => return Dominance::Left,
        (true, false) => return Dominance::Right,
        (false, false) => {}
    }

    let mut a_better_in_some = false;
    let mut b_better_in_some = false;
    for (x, y) in a.iter().zip(b) {
        match x.cmp(y) {
            Ordering::Greater => a_better_in_some = true,
            Ordering::Less => b_better_in_some = true,
            Ordering::Equal => {}
        }
    }

    match (a_better_in_some, b_better_in_some) {
        (true, false) => Dominance::Left,
        (false, true) => Dominance::Right,
        _ => Dominance::Neither,
    }
}
