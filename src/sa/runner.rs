//! SA execution loop.
//!
//! Each epoch breeds one genome and sweeps every locus per sampler
//! iteration: a gene is proposed by the [`GeneDao`](crate::ga::GeneDao),
//! the genome is re-scored, and the proposal is kept under the Metropolis
//! criterion. A rejected proposal restores both the old gene and the old
//! score.

use super::config::SaConfig;
use crate::error::GeneticError;
use crate::ga::{Fitness, Gene, Genome, Locus, Problem};
use crate::random::rng_from_seed;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Result of an annealing run.
#[derive(Debug, Clone)]
pub struct SaResult<K, G> {
    /// The best genome over all epochs.
    pub best: Genome<K, G>,

    /// Score of `best`.
    pub best_fitness: Fitness,

    /// Epochs run to completion.
    pub epochs: usize,

    /// Proposals evaluated.
    pub iterations: usize,

    /// Proposals kept, improving or not.
    pub accepted_moves: usize,

    /// Proposals that strictly improved the score.
    pub improving_moves: usize,

    /// Whether cancelled externally.
    pub cancelled: bool,

    /// Best score of each epoch.
    pub fitness_history: Vec<f64>,
}

#[derive(Debug, Default)]
struct Counters {
    iterations: usize,
    accepted_moves: usize,
    improving_moves: usize,
}

/// Executes the annealing optimizer.
pub struct SaRunner;

impl SaRunner {
    /// Runs SA optimization.
    pub fn run<K: Locus, G: Gene>(
        problem: &Problem<K, G>,
        config: &SaConfig,
    ) -> Result<SaResult<K, G>, GeneticError> {
        Self::run_with_cancel(problem, config, None)
    }

    /// Runs SA with an optional cancellation token, checked between
    /// sampler iterations.
    ///
    /// # Errors
    ///
    /// [`GeneticError::UnsupportedObjectives`] if the evaluator returns
    /// more than one objective.
    #[tracing::instrument(skip_all, name = "sa_run")]
    pub fn run_with_cancel<K: Locus, G: Gene>(
        problem: &Problem<K, G>,
        config: &SaConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<SaResult<K, G>, GeneticError> {
        config.validate()?;
        let mut rng = rng_from_seed(config.seed);
        let is_cancelled = || cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed));

        let mut counters = Counters::default();
        let mut best: Option<Genome<K, G>> = None;
        let mut fitness_history = Vec::with_capacity(config.epochs);
        let mut epochs = 0;
        let mut cancelled = false;
        let run_start = Instant::now();

        for epoch in 0..config.epochs {
            if is_cancelled() {
                cancelled = true;
                break;
            }
            let start = Instant::now();
            let mut current = problem.breeder.breed(&mut rng);
            problem.evaluate(&mut current)?;
            single_objective(current.fitness())?;
            let loci: Vec<K> = current.loci().cloned().collect();

            for i in 0..config.sampler_iterations {
                if is_cancelled() {
                    cancelled = true;
                    break;
                }
                let temperature = config.temperature(i);
                for locus in &loci {
                    sample_locus(problem, &mut current, locus, temperature, &mut rng, &mut counters)?;
                }
            }

            let epoch_fitness = single_objective(current.fitness())?;
            fitness_history.push(epoch_fitness.value());
            let improved = best
                .as_ref()
                .map_or(true, |b| current.compare_fitness(b) == std::cmp::Ordering::Greater);
            if improved {
                best = Some(current);
            }
            if cancelled {
                break;
            }
            epochs += 1;
            tracing::debug!(
                epoch = epoch + 1,
                of = config.epochs,
                fitness = epoch_fitness.value(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "annealing epoch completed"
            );
        }

        let best = best.ok_or_else(|| {
            GeneticError::InvalidArgument("annealing cancelled before the first epoch".into())
        })?;
        let best_fitness = single_objective(best.fitness())?;
        if epochs > 0 {
            tracing::info!(
                epochs,
                average_epoch_ms = (run_start.elapsed().as_millis() / epochs as u128) as u64,
                "annealing finished"
            );
        }

        Ok(SaResult {
            best_fitness,
            best,
            epochs,
            iterations: counters.iterations,
            accepted_moves: counters.accepted_moves,
            improving_moves: counters.improving_moves,
            cancelled,
            fitness_history,
        })
    }
}

/// Proposes one gene for `locus` and keeps or reverts it.
fn sample_locus<K: Locus, G: Gene, R: Rng>(
    problem: &Problem<K, G>,
    genome: &mut Genome<K, G>,
    locus: &K,
    temperature: f64,
    rng: &mut R,
    counters: &mut Counters,
) -> Result<(), GeneticError> {
    let proposal = problem.gene_dao.random_gene(genome, locus, rng);
    if genome.gene(locus) == Some(&proposal) {
        return Ok(());
    }

    let previous = single_objective(genome.fitness())?;
    let original = genome.replace_gene(locus, proposal)?;
    problem.evaluate(genome)?;
    let proposed = single_objective(genome.fitness())?;
    counters.iterations += 1;

    if accept(previous, proposed, temperature, rng) {
        counters.accepted_moves += 1;
        if proposed.is_better_than(&previous) {
            counters.improving_moves += 1;
        }
    } else {
        genome.replace_gene(locus, original)?;
        genome.set_fitness(vec![previous]);
    }
    Ok(())
}

/// Metropolis criterion: never-worse proposals are kept; worse ones with
/// probability `exp(-worsening / T)`.
fn accept<R: Rng + ?Sized>(current: Fitness, proposed: Fitness, temperature: f64, rng: &mut R) -> bool {
    if !current.is_better_than(&proposed) {
        return true;
    }
    let worsening = (current.effective_value() - proposed.effective_value()).abs();
    let probability = (-worsening / temperature).exp();
    probability >= 1.0 || rng.random::<f64>() < probability
}

fn single_objective(scores: &[Fitness]) -> Result<Fitness, GeneticError> {
    match scores {
        [fitness] => Ok(*fitness),
        _ => Err(GeneticError::UnsupportedObjectives {
            expected: 1,
            actual: scores.len(),
        }),
    }
}
