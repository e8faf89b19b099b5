//! Crossover operators over keyed genomes.
//!
//! Every operator clones a parent and copies genes from the other at
//! matching loci. Parents are only read. Copying goes through
//! [`Genome::replace_gene`], so a child whose genes differ from the
//! cloned parent is marked for evaluation and an unchanged child keeps
//! the parent's score.
//!
//! The guaranteed variants call the evaluator themselves and keep a
//! crossover only when it strictly improves on the cloned parent. A
//! rejected attempt puts every copied gene back and restores the parent's
//! scores. Running out of attempts returns the unchanged clone.
//!
//! # References
//!
//! - Syswerda (1989), "Uniform Crossover in Genetic Algorithms"
//! - Spears & De Jong (1991), "On the Virtues of Parameterized Uniform
//!   Crossover"

use super::fitness::Fitness;
use super::genome::{compare_scores, Genome};
use super::mutation::{revert, Displaced};
use super::types::{evaluate_with, FitnessEvaluator, Gene, Locus};
use crate::error::GeneticError;
use rand::seq::index;
use rand::Rng;
use std::cmp::Ordering;

/// How two parents are combined into children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CrossoverOperator {
    /// Cut at a random locus ordinal `k`: loci `0..=k` come from one parent
    /// and the rest from the other. Which parent donates the prefix is a
    /// coin flip. Fails if the donor lacks a locus of the recipient.
    #[default]
    SinglePoint,

    /// Clones the first parent and overwrites loci `0..=k` from the second,
    /// retrying with a fresh cut until the child beats the first parent.
    SinglePointGuaranteed { max_attempts: usize },

    /// Each locus independently takes the second parent's gene with
    /// probability one half, when the second parent has that locus.
    Uniform,

    /// [`Uniform`](Self::Uniform), retried until the child beats the first
    /// parent.
    UniformGuaranteed { max_attempts: usize },

    /// Two children: each locus is swapped between the parents with
    /// probability one half.
    UniformSwap,

    /// [`UniformSwap`](Self::UniformSwap), retried until both children
    /// beat their own parent.
    UniformSwapGuaranteed { max_attempts: usize },

    /// Copies the second parent's gene at one random locus.
    SingleGene,

    /// Copies the second parent's genes at `1..=n` distinct random loci.
    MultipleGene,
}

impl CrossoverOperator {
    pub fn name(&self) -> &'static str {
        match self {
            CrossoverOperator::SinglePoint => "SinglePointCrossover",
            CrossoverOperator::SinglePointGuaranteed { .. } => "SinglePointGuaranteedCrossover",
            CrossoverOperator::Uniform => "UniformCrossover",
            CrossoverOperator::UniformGuaranteed { .. } => "UniformGuaranteedCrossover",
            CrossoverOperator::UniformSwap => "UniformSwapCrossover",
            CrossoverOperator::UniformSwapGuaranteed { .. } => "UniformSwapGuaranteedCrossover",
            CrossoverOperator::SingleGene => "SingleGeneCrossover",
            CrossoverOperator::MultipleGene => "MultipleGeneCrossover",
        }
    }

    /// Children produced per pair of parents.
    pub fn offspring(&self) -> usize {
        match self {
            CrossoverOperator::UniformSwap | CrossoverOperator::UniformSwapGuaranteed { .. } => 2,
            _ => 1,
        }
    }

    /// Whether this operator calls the evaluator itself.
    pub fn evaluates(&self) -> bool {
        matches!(
            self,
            CrossoverOperator::SinglePointGuaranteed { .. }
                | CrossoverOperator::UniformGuaranteed { .. }
                | CrossoverOperator::UniformSwapGuaranteed { .. }
        )
    }

    pub fn validate(&self) -> Result<(), GeneticError> {
        match *self {
            CrossoverOperator::SinglePointGuaranteed { max_attempts }
            | CrossoverOperator::UniformGuaranteed { max_attempts }
            | CrossoverOperator::UniformSwapGuaranteed { max_attempts }
                if max_attempts == 0 =>
            {
                Err(GeneticError::InvalidConfig(
                    "max_crossover_attempts must be at least 1".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Produces [`offspring`](Self::offspring) children from two parents.
    ///
    /// `evaluator` is only called by the guaranteed variants.
    pub fn crossover<K: Locus, G: Gene, R: Rng + ?Sized>(
        &self,
        a: &Genome<K, G>,
        b: &Genome<K, G>,
        evaluator: &dyn FitnessEvaluator<K, G>,
        rng: &mut R,
    ) -> Result<Vec<Genome<K, G>>, GeneticError> {
        match *self {
            CrossoverOperator::SinglePoint => Ok(vec![single_point(a, b, rng)?]),
            CrossoverOperator::SinglePointGuaranteed { max_attempts } => {
                let child = guaranteed(a, evaluator, max_attempts, rng, |child, rng| {
                    if child.is_empty() {
                        return Ok(Vec::new());
                    }
                    let cut = rng.random_range(0..child.len());
                    let loci: Vec<K> = a.loci().take(cut + 1).cloned().collect();
                    let mut displaced = Vec::new();
                    for locus in loci {
                        let gene = b
                            .gene(&locus)
                            .ok_or_else(|| GeneticError::missing_locus(&locus))?;
                        copy_gene(child, locus, gene, &mut displaced)?;
                    }
                    Ok(displaced)
                })?;
                Ok(vec![child])
            }
            CrossoverOperator::Uniform => {
                let mut child = a.clone();
                uniform(&mut child, b, rng)?;
                Ok(vec![child])
            }
            CrossoverOperator::UniformGuaranteed { max_attempts } => {
                let child = guaranteed(a, evaluator, max_attempts, rng, |child, rng| {
                    uniform(child, b, rng)
                })?;
                Ok(vec![child])
            }
            CrossoverOperator::UniformSwap => {
                let (mut first, mut second) = (a.clone(), b.clone());
                swap_loci(&mut first, &mut second, rng)?;
                Ok(vec![first, second])
            }
            CrossoverOperator::UniformSwapGuaranteed { max_attempts } => {
                swap_guaranteed(a, b, evaluator, max_attempts, rng)
            }
            CrossoverOperator::SingleGene => {
                let mut child = a.clone();
                if !a.is_empty() {
                    let ordinal = rng.random_range(0..a.len());
                    if let Some(locus) = a.locus_at(ordinal) {
                        copy_if_present(&mut child, b, locus)?;
                    }
                }
                Ok(vec![child])
            }
            CrossoverOperator::MultipleGene => {
                let mut child = a.clone();
                let n = a.len();
                if n > 0 {
                    let count = rng.random_range(1..=n);
                    let loci: Vec<&K> = a.loci().collect();
                    for ordinal in index::sample(rng, n, count) {
                        copy_if_present(&mut child, b, loci[ordinal])?;
                    }
                }
                Ok(vec![child])
            }
        }
    }
}

fn single_point<K: Locus, G: Gene, R: Rng + ?Sized>(
    a: &Genome<K, G>,
    b: &Genome<K, G>,
    rng: &mut R,
) -> Result<Genome<K, G>, GeneticError> {
    let (recipient, donor) = if rng.random_bool(0.5) { (a, b) } else { (b, a) };
    let mut child = recipient.clone();
    if child.is_empty() {
        return Ok(child);
    }

    let cut = rng.random_range(0..child.len());
    for locus in recipient.loci().take(cut + 1) {
        let gene = donor
            .gene(locus)
            .ok_or_else(|| GeneticError::missing_locus(locus))?;
        child.replace_gene(locus, gene.clone())?;
    }
    Ok(child)
}

/// Coin flip per locus; heads copies the donor's gene when it has one.
fn uniform<K: Locus, G: Gene, R: Rng + ?Sized>(
    child: &mut Genome<K, G>,
    donor: &Genome<K, G>,
    rng: &mut R,
) -> Result<Displaced<K, G>, GeneticError> {
    let loci: Vec<K> = child.loci().cloned().collect();
    let mut displaced = Vec::new();
    for locus in loci {
        if rng.random_bool(0.5) {
            if let Some(gene) = donor.gene(&locus) {
                copy_gene(child, locus, gene, &mut displaced)?;
            }
        }
    }
    Ok(displaced)
}

/// Coin flip per shared locus; heads exchanges the two genes. Returns the
/// genes each side gave up.
fn swap_loci<K: Locus, G: Gene, R: Rng + ?Sized>(
    first: &mut Genome<K, G>,
    second: &mut Genome<K, G>,
    rng: &mut R,
) -> Result<(Displaced<K, G>, Displaced<K, G>), GeneticError> {
    let loci: Vec<K> = first.loci().cloned().collect();
    let (mut first_displaced, mut second_displaced) = (Vec::new(), Vec::new());
    for locus in loci {
        if !rng.random_bool(0.5) {
            continue;
        }
        let (Some(x), Some(y)) = (first.gene(&locus), second.gene(&locus)) else {
            continue;
        };
        if x == y {
            continue;
        }
        let (x, y) = (x.clone(), y.clone());
        first_displaced.push((locus.clone(), first.replace_gene(&locus, y)?));
        let old = second.replace_gene(&locus, x)?;
        second_displaced.push((locus, old));
    }
    Ok((first_displaced, second_displaced))
}

fn copy_gene<K: Locus, G: Gene>(
    child: &mut Genome<K, G>,
    locus: K,
    gene: &G,
    displaced: &mut Displaced<K, G>,
) -> Result<(), GeneticError> {
    if child.gene(&locus) != Some(gene) {
        let old = child.replace_gene(&locus, gene.clone())?;
        displaced.push((locus, old));
    }
    Ok(())
}

fn copy_if_present<K: Locus, G: Gene>(
    child: &mut Genome<K, G>,
    donor: &Genome<K, G>,
    locus: &K,
) -> Result<(), GeneticError> {
    if let Some(gene) = donor.gene(locus) {
        child.replace_gene(locus, gene.clone())?;
    }
    Ok(())
}

/// Scores of `genome`, evaluating it first if needed.
fn baseline<K: Locus, G: Gene>(
    genome: &mut Genome<K, G>,
    evaluator: &dyn FitnessEvaluator<K, G>,
) -> Result<Vec<Fitness>, GeneticError> {
    if genome.is_evaluation_needed() {
        evaluate_with(evaluator, genome)?;
    }
    Ok(genome.fitness().to_vec())
}

fn improves<K: Locus, G: Gene>(genome: &Genome<K, G>, baseline: &[Fitness]) -> bool {
    compare_scores(genome.fitness(), baseline) == Ordering::Greater
}

fn guaranteed<K, G, R, F>(
    parent: &Genome<K, G>,
    evaluator: &dyn FitnessEvaluator<K, G>,
    max_attempts: usize,
    rng: &mut R,
    mut attempt: F,
) -> Result<Genome<K, G>, GeneticError>
where
    K: Locus,
    G: Gene,
    R: Rng + ?Sized,
    F: FnMut(&mut Genome<K, G>, &mut R) -> Result<Displaced<K, G>, GeneticError>,
{
    let mut child = parent.clone();
    let baseline = baseline(&mut child, evaluator)?;

    for _ in 0..max_attempts {
        let displaced = attempt(&mut child, rng)?;
        if displaced.is_empty() {
            continue;
        }
        let evaluated = evaluate_with(evaluator, &mut child);
        if evaluated.is_ok() && improves(&child, &baseline) {
            return Ok(child);
        }
        revert(&mut child, displaced)?;
        child.set_fitness(baseline.clone());
        evaluated?;
    }

    tracing::debug!(max_attempts, "no improving crossover found");
    Ok(child)
}

fn swap_guaranteed<K, G, R>(
    a: &Genome<K, G>,
    b: &Genome<K, G>,
    evaluator: &dyn FitnessEvaluator<K, G>,
    max_attempts: usize,
    rng: &mut R,
) -> Result<Vec<Genome<K, G>>, GeneticError>
where
    K: Locus,
    G: Gene,
    R: Rng + ?Sized,
{
    let (mut first, mut second) = (a.clone(), b.clone());
    let first_baseline = baseline(&mut first, evaluator)?;
    let second_baseline = baseline(&mut second, evaluator)?;

    for _ in 0..max_attempts {
        let (first_displaced, second_displaced) = swap_loci(&mut first, &mut second, rng)?;
        if first_displaced.is_empty() {
            continue;
        }
        let evaluated = evaluate_with(evaluator, &mut first)
            .and_then(|()| evaluate_with(evaluator, &mut second));
        if evaluated.is_ok()
            && improves(&first, &first_baseline)
            && improves(&second, &second_baseline)
        {
            return Ok(vec![first, second]);
        }
        revert(&mut first, first_displaced)?;
        revert(&mut second, second_displaced)?;
        first.set_fitness(first_baseline.clone());
        second.set_fitness(second_baseline.clone());
        evaluated?;
    }

    tracing::debug!(max_attempts, "no improving swap found");
    Ok(vec![first, second])
}
