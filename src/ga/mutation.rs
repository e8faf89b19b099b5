//! Mutation operators.
//!
//! Mutation replaces genes with fresh ones drawn from the [`GeneDao`].
//! `mutate` returns `true` iff at least one gene actually changed value.
//!
//! The guaranteed variants keep a mutation only when it strictly improves
//! fitness. A rejected attempt is fully reverted: every changed gene gets
//! its old value back and the previous scores are restored, so the genome
//! is never left half-mutated or unevaluated. Running out of attempts is a
//! normal outcome and returns `Ok(false)`.

use super::fitness::Fitness;
use super::genome::{compare_scores, Genome};
use super::types::{evaluate_with, FitnessEvaluator, Gene, GeneDao, Locus, Problem};
use crate::error::GeneticError;
use rand::seq::index;
use rand::Rng;
use std::cmp::Ordering;

/// Redraws allowed when a mandatory mutation keeps drawing the current gene.
const MANDATORY_REDRAWS: usize = 32;

/// Distribution of the number of loci a count-based mutation touches.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MutationCount {
    /// Uniform over `1..=max`.
    Uniform { max: usize },
    /// Starts at one locus and keeps adding one until a draw with
    /// probability `stop_probability` succeeds or `max` is reached.
    Geometric { stop_probability: f64, max: usize },
}

impl MutationCount {
    /// Draws a count for a genome of `len` loci. Zero only when `len` is zero.
    pub fn draw<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> usize {
        match *self {
            MutationCount::Uniform { max } => {
                let cap = max.min(len);
                if cap == 0 {
                    0
                } else {
                    rng.random_range(1..=cap)
                }
            }
            MutationCount::Geometric {
                stop_probability,
                max,
            } => {
                let cap = max.min(len);
                if cap == 0 {
                    return 0;
                }
                let mut count = 1;
                while count < cap && !rng.random_bool(stop_probability) {
                    count += 1;
                }
                count
            }
        }
    }

    fn validate(&self) -> Result<(), GeneticError> {
        match *self {
            MutationCount::Uniform { max } | MutationCount::Geometric { max, .. } if max == 0 => {
                Err(GeneticError::InvalidConfig(
                    "max_mutations_per_individual must be at least 1".into(),
                ))
            }
            MutationCount::Geometric {
                stop_probability, ..
            } if !(0.0..=1.0).contains(&stop_probability) => Err(GeneticError::InvalidConfig(
                format!("mutation_stop_probability must be within [0, 1], got {stop_probability}"),
            )),
            _ => Ok(()),
        }
    }
}

/// How a child is perturbed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MutationOperator {
    /// Each locus is redrawn with probability `rate`.
    Standard { rate: f64 },
    /// Exactly one random locus gets a different gene.
    MandatorySingle,
    /// A drawn number of distinct loci are redrawn.
    Multiple { count: MutationCount },
    /// [`Standard`](Self::Standard), retried until fitness improves.
    StandardGuaranteed { rate: f64, max_attempts: usize },
    /// [`Multiple`](Self::Multiple), retried until fitness improves.
    MultipleGuaranteed {
        count: MutationCount,
        max_attempts: usize,
    },
}

impl Default for MutationOperator {
    fn default() -> Self {
        MutationOperator::Standard { rate: 0.1 }
    }
}

/// The collaborators a mutation may call.
pub struct MutationContext<'a, K, G> {
    pub gene_dao: &'a dyn GeneDao<K, G>,
    pub evaluator: &'a dyn FitnessEvaluator<K, G>,
}

impl<'a, K: Locus, G: Gene> MutationContext<'a, K, G> {
    pub fn new(problem: &'a Problem<K, G>) -> Self {
        Self {
            gene_dao: problem.gene_dao.as_ref(),
            evaluator: problem.evaluator.as_ref(),
        }
    }
}

/// Genes displaced by one attempt, in the order they were replaced.
pub(super) type Displaced<K, G> = Vec<(K, G)>;

impl MutationOperator {
    pub fn name(&self) -> &'static str {
        match self {
            MutationOperator::Standard { .. } => "StandardMutation",
            MutationOperator::MandatorySingle => "MandatorySingleMutation",
            MutationOperator::Multiple { .. } => "MultipleMutation",
            MutationOperator::StandardGuaranteed { .. } => "StandardGuaranteedMutation",
            MutationOperator::MultipleGuaranteed { .. } => "MultipleGuaranteedMutation",
        }
    }

    /// Checks rates and counts.
    pub fn validate(&self) -> Result<(), GeneticError> {
        let check_rate = |rate: f64| {
            if (0.0..=1.0).contains(&rate) {
                Ok(())
            } else {
                Err(GeneticError::InvalidConfig(format!(
                    "mutation_rate must be within [0, 1], got {rate}"
                )))
            }
        };
        let check_attempts = |attempts: usize| {
            if attempts == 0 {
                Err(GeneticError::InvalidConfig(
                    "max_mutation_attempts must be at least 1".into(),
                ))
            } else {
                Ok(())
            }
        };
        match *self {
            MutationOperator::Standard { rate } => check_rate(rate),
            MutationOperator::MandatorySingle => Ok(()),
            MutationOperator::Multiple { count } => count.validate(),
            MutationOperator::StandardGuaranteed { rate, max_attempts } => {
                check_rate(rate)?;
                check_attempts(max_attempts)
            }
            MutationOperator::MultipleGuaranteed {
                count,
                max_attempts,
            } => {
                count.validate()?;
                check_attempts(max_attempts)
            }
        }
    }

    /// Whether this operator calls the evaluator itself.
    pub fn evaluates(&self) -> bool {
        matches!(
            self,
            MutationOperator::StandardGuaranteed { .. } | MutationOperator::MultipleGuaranteed { .. }
        )
    }

    /// Mutates `genome` in place.
    pub fn mutate<K: Locus, G: Gene, R: Rng>(
        &self,
        genome: &mut Genome<K, G>,
        ctx: &MutationContext<'_, K, G>,
        rng: &mut R,
    ) -> Result<bool, GeneticError> {
        match *self {
            MutationOperator::Standard { rate } => {
                Ok(!mutate_by_rate(genome, rate, ctx.gene_dao, rng)?.is_empty())
            }
            MutationOperator::MandatorySingle => mandatory_single(genome, ctx.gene_dao, rng),
            MutationOperator::Multiple { count } => {
                let k = count.draw(genome.len(), rng);
                Ok(!mutate_loci(genome, k, ctx.gene_dao, rng)?.is_empty())
            }
            MutationOperator::StandardGuaranteed { rate, max_attempts } => {
                guaranteed(genome, ctx, max_attempts, rng, |g, rng| {
                    mutate_by_rate(g, rate, ctx.gene_dao, rng)
                })
            }
            MutationOperator::MultipleGuaranteed {
                count,
                max_attempts,
            } => guaranteed(genome, ctx, max_attempts, rng, |g, rng| {
                let k = count.draw(g.len(), rng);
                mutate_loci(g, k, ctx.gene_dao, rng)
            }),
        }
    }
}

fn mutate_by_rate<K: Locus, G: Gene, R: Rng>(
    genome: &mut Genome<K, G>,
    rate: f64,
    gene_dao: &dyn GeneDao<K, G>,
    rng: &mut R,
) -> Result<Displaced<K, G>, GeneticError> {
    let loci: Vec<K> = genome.loci().cloned().collect();
    let mut displaced = Vec::new();
    for locus in &loci {
        if rng.random_bool(rate) {
            redraw(genome, locus, gene_dao, rng, &mut displaced)?;
        }
    }
    Ok(displaced)
}

fn mutate_loci<K: Locus, G: Gene, R: Rng>(
    genome: &mut Genome<K, G>,
    count: usize,
    gene_dao: &dyn GeneDao<K, G>,
    rng: &mut R,
) -> Result<Displaced<K, G>, GeneticError> {
    let loci: Vec<K> = genome.loci().cloned().collect();
    let count = count.min(loci.len());
    let mut displaced = Vec::new();
    for ordinal in index::sample(rng, loci.len(), count) {
        redraw(genome, &loci[ordinal], gene_dao, rng, &mut displaced)?;
    }
    Ok(displaced)
}

fn mandatory_single<K: Locus, G: Gene, R: Rng>(
    genome: &mut Genome<K, G>,
    gene_dao: &dyn GeneDao<K, G>,
    rng: &mut R,
) -> Result<bool, GeneticError> {
    if genome.is_empty() {
        return Ok(false);
    }
    let ordinal = rng.random_range(0..genome.len());
    let Some(locus) = genome.locus_at(ordinal).cloned() else {
        return Ok(false);
    };
    let mut displaced = Vec::new();
    for _ in 0..MANDATORY_REDRAWS {
        redraw(genome, &locus, gene_dao, rng, &mut displaced)?;
        if !displaced.is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Replaces the gene at `locus` with a random one, recording the old gene
/// when the value changed.
fn redraw<K: Locus, G: Gene, R: Rng>(
    genome: &mut Genome<K, G>,
    locus: &K,
    gene_dao: &dyn GeneDao<K, G>,
    rng: &mut R,
    displaced: &mut Displaced<K, G>,
) -> Result<(), GeneticError> {
    let gene = gene_dao.random_gene(genome, locus, rng);
    if genome.gene(locus) != Some(&gene) {
        let old = genome.replace_gene(locus, gene)?;
        displaced.push((locus.clone(), old));
    }
    Ok(())
}

fn guaranteed<K, G, R, F>(
    genome: &mut Genome<K, G>,
    ctx: &MutationContext<'_, K, G>,
    max_attempts: usize,
    rng: &mut R,
    mut attempt: F,
) -> Result<bool, GeneticError>
where
    K: Locus,
    G: Gene,
    R: Rng,
    F: FnMut(&mut Genome<K, G>, &mut R) -> Result<Displaced<K, G>, GeneticError>,
{
    if genome.is_evaluation_needed() {
        evaluate_with(ctx.evaluator, genome)?;
    }
    let baseline: Vec<Fitness> = genome.fitness().to_vec();

    for _ in 0..max_attempts {
        let displaced = attempt(genome, rng)?;
        if displaced.is_empty() {
            continue;
        }
        let evaluated = evaluate_with(ctx.evaluator, genome);
        if evaluated.is_ok() && compare_scores(genome.fitness(), &baseline) == Ordering::Greater {
            return Ok(true);
        }
        revert(genome, displaced)?;
        genome.set_fitness(baseline.clone());
        evaluated?;
    }

    tracing::debug!(max_attempts, "no improving mutation found");
    Ok(false)
}

/// Puts displaced genes back, newest first.
pub(super) fn revert<K: Locus, G: Gene>(
    genome: &mut Genome<K, G>,
    displaced: Displaced<K, G>,
) -> Result<(), GeneticError> {
    for (locus, gene) in displaced.into_iter().rev() {
        genome.replace_gene(&locus, gene)?;
    }
    Ok(())
}
