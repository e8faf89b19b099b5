//! Speciated genetic algorithm.
//!
//! [`DivergentGeneticAlgorithm`] seeds `min_populations` independent runs,
//! then alternates culling and speciation for `extinction_cycles` rounds:
//!
//! 1. Rank sub-populations by their best individual (Pareto rank first,
//!    then fitness) and keep the `min_populations` best.
//! 2. `speciation_events` times, split every survivor with the configured
//!    [`SpeciationOperator`](super::speciation::SpeciationOperator) and
//!    evolve all species concurrently.
//!
//! The result is the sub-population whose best individual ranks first.

use super::fitness::Fitness;
use super::genome::{compare_scores, Genome};
use super::multi_objective::pareto_ranks;
use super::population::Population;
use super::runner::GeneticAlgorithm;
use super::statistics::ExecutionStatistics;
use super::strategy::Strategy;
use super::types::{Gene, Locus};
use crate::error::GeneticError;
use crate::random::{rng_from_seed, task_seeds};
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of a divergent run.
pub struct DivergentResult<K: Locus, G: Gene> {
    /// Best individual of the winning sub-population.
    pub best: Genome<K, G>,

    /// The winning sub-population.
    pub population: Box<dyn Population<K, G>>,

    /// Number of single-population evolutions performed.
    pub populations_evolved: usize,

    pub cancelled: bool,

    /// One entry per evolution, in completion order.
    pub statistics: Vec<ExecutionStatistics>,
}

/// Multi-population genetic algorithm with periodic culling.
pub struct DivergentGeneticAlgorithm<K: Locus, G: Gene> {
    strategy: Strategy<K, G>,
    rng: StdRng,
    stop: Arc<AtomicBool>,
}

type Evolved<K, G> = (Box<dyn Population<K, G>>, ExecutionStatistics);

impl<K: Locus, G: Gene> DivergentGeneticAlgorithm<K, G> {
    pub fn new(strategy: Strategy<K, G>) -> Self {
        Self {
            rng: rng_from_seed(strategy.config.seed),
            strategy,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag shared with every sub-population run; stops them all at their
    /// next generation boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    #[tracing::instrument(skip_all, name = "divergent_evolve")]
    pub fn evolve(&mut self) -> Result<DivergentResult<K, G>, GeneticError> {
        let config = &self.strategy.config;
        let (keep, cycles, events) = (
            config.min_populations,
            config.extinction_cycles,
            config.speciation_events,
        );
        let factor = config.speciation_factor;
        tracing::info!(
            min_populations = keep,
            extinction_cycles = cycles,
            speciation_events = events,
            speciation_factor = factor,
            speciation = self.strategy.speciation.name(),
            "divergent evolution started"
        );

        let mut statistics = Vec::new();
        let mut populations_evolved = 0;

        let jobs = (0..keep).map(|_| None).collect();
        let mut populations = self.evolve_all(jobs, &mut statistics, &mut populations_evolved)?;

        let mut cancelled = self.stopped();
        'cycles: for cycle in 0..cycles {
            if self.stopped() {
                cancelled = true;
                break;
            }
            cull(&mut populations, keep);
            tracing::debug!(cycle, survivors = populations.len(), "extinction cycle culled");

            for _ in 0..events {
                if self.stopped() {
                    cancelled = true;
                    break 'cycles;
                }
                let mut species = Vec::new();
                for mut population in populations.drain(..) {
                    let factor = factor.min(population.size()).max(1);
                    species.extend(self.strategy.speciation.diverge(factor, population.as_mut())?);
                }
                let jobs = species.into_iter().map(Some).collect();
                populations = self.evolve_all(jobs, &mut statistics, &mut populations_evolved)?;
            }
        }

        cull(&mut populations, 1);
        let population = populations.pop().ok_or_else(|| {
            GeneticError::InvalidArgument("divergent evolution produced no population".into())
        })?;
        let best = population.best().cloned().ok_or_else(|| {
            GeneticError::InvalidArgument("winning population is empty".into())
        })?;
        tracing::info!(
            populations_evolved,
            best = ?best.fitness(),
            "divergent evolution finished"
        );

        Ok(DivergentResult {
            best,
            population,
            populations_evolved,
            cancelled: cancelled || self.stopped(),
            statistics,
        })
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Evolves every job concurrently. `None` breeds a fresh population,
    /// `Some` continues an existing one.
    fn evolve_all(
        &mut self,
        jobs: Vec<Option<Box<dyn Population<K, G>>>>,
        statistics: &mut Vec<ExecutionStatistics>,
        populations_evolved: &mut usize,
    ) -> Result<Vec<Box<dyn Population<K, G>>>, GeneticError> {
        let seeds = task_seeds(&mut self.rng, jobs.len());
        let strategy = &self.strategy;
        let stop = &self.stop;
        let evolved: Vec<Evolved<K, G>> = strategy.executor.map(
            jobs.into_iter().zip(seeds).collect(),
            |(job, seed)| {
                let fresh = job.is_none();
                let mut ga = match job {
                    None => GeneticAlgorithm::new(strategy.clone()),
                    Some(population) => GeneticAlgorithm::with_population(strategy.clone(), population),
                }
                .with_rng_seed(seed)
                .with_stop_handle(Arc::clone(stop));
                let result = if fresh {
                    ga.evolve()?
                } else {
                    ga.evolve_existing()?
                };
                Ok((ga.into_population(), result.statistics))
            },
        )?;

        *populations_evolved += evolved.len();
        let mut populations = Vec::with_capacity(evolved.len());
        for (population, stats) in evolved {
            populations.push(population);
            statistics.push(stats);
        }
        Ok(populations)
    }
}

/// Keeps the `keep` sub-populations whose best individuals rank highest,
/// best last.
fn cull<K: Locus, G: Gene>(populations: &mut Vec<Box<dyn Population<K, G>>>, keep: usize) {
    let scores: Vec<Vec<Fitness>> = populations
        .iter()
        .map(|p| p.best().map(|g| g.fitness().to_vec()).unwrap_or_default())
        .collect();
    let ranks = pareto_ranks(&scores);

    let mut order: Vec<usize> = (0..populations.len()).collect();
    order.sort_by(|&a, &b| {
        ranks[b]
            .cmp(&ranks[a])
            .then_with(|| compare_scores(&scores[a], &scores[b]))
    });

    let mut slots: Vec<Option<Box<dyn Population<K, G>>>> =
        populations.drain(..).map(Some).collect();
    let dropped = order.len().saturating_sub(keep);
    populations.extend(order.into_iter().skip(dropped).filter_map(|i| slots[i].take()));
    if dropped > 0 {
        tracing::debug!(dropped, kept = populations.len(), "sub-populations culled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::config::GaConfig;
    use crate::ga::population::StandardPopulation;
    use crate::ga::selection::Selector;
    use crate::ga::speciation::SpeciationOperator;
    use crate::ga::testing::{scored, target_problem};

    const TARGET: &str = "SPECIATION";

    fn config() -> GaConfig {
        GaConfig::default()
            .with_population_size(20)
            .with_number_of_generations(Some(3))
            .with_min_populations(3)
            .with_extinction_cycles(2)
            .with_speciation_events(1)
            .with_speciation_factor(2)
            .with_seed(42)
    }

    fn population(values: &[f64]) -> Box<dyn Population<usize, char>> {
        Box::new(StandardPopulation::with_individuals(
            Selector::Random,
            values.iter().map(|&v| scored("AB", v)).collect(),
        ))
    }

    fn best_value(p: &dyn Population<usize, char>) -> f64 {
        p.best().unwrap().fitness()[0].value()
    }

    // ---- Culling ----

    #[test]
    fn test_cull_keeps_best_last() {
        let mut pops = vec![
            population(&[1.0, 9.0]),
            population(&[2.0]),
            population(&[5.0, 3.0]),
            population(&[]),
        ];
        cull(&mut pops, 2);
        let kept: Vec<f64> = pops.iter().map(|p| best_value(p.as_ref())).collect();
        assert_eq!(kept, vec![5.0, 9.0]);
    }

    #[test]
    fn test_cull_keeps_all_when_few() {
        let mut pops = vec![population(&[1.0]), population(&[2.0])];
        cull(&mut pops, 5);
        assert_eq!(pops.len(), 2);
        assert_eq!(best_value(pops[1].as_ref()), 2.0);
    }

    #[test]
    fn test_cull_prefers_pareto_front() {
        let multi = |a: f64, b: f64| -> Box<dyn Population<usize, char>> {
            let mut g = scored("AB", 0.0);
            g.set_fitness(vec![Fitness::maximizing(a), Fitness::maximizing(b)]);
            Box::new(StandardPopulation::with_individuals(Selector::Random, vec![g]))
        };
        // (3, 0) is lexicographically ahead of (2, 5) but dominated by (4, 1)
        let mut pops = vec![multi(2.0, 5.0), multi(3.0, 0.0), multi(4.0, 1.0)];
        cull(&mut pops, 2);
        let firsts: Vec<f64> = pops.iter().map(|p| best_value(p.as_ref())).collect();
        assert_eq!(firsts, vec![2.0, 4.0]);
    }

    // ---- End-to-end ----

    #[test]
    fn test_divergent_run() {
        let strategy = Strategy::new(config(), target_problem(TARGET)).unwrap();
        let mut ga = DivergentGeneticAlgorithm::new(strategy);
        let result = ga.evolve().unwrap();

        // 3 seeds, then per cycle 3 survivors split in 2
        assert_eq!(result.populations_evolved, 3 + 6 + 6);
        assert_eq!(result.statistics.len(), 15);
        assert!(!result.cancelled);
        assert_eq!(result.population.size(), 20);
        assert_eq!(
            result.best.fitness(),
            result.population.best().unwrap().fitness()
        );
    }

    #[test]
    fn test_proximity_speciation_run() {
        let config = config()
            .with_speciation(SpeciationOperator::Proximity)
            .with_parallel(false);
        let strategy = Strategy::new(config, target_problem(TARGET)).unwrap();
        let result = DivergentGeneticAlgorithm::new(strategy).evolve().unwrap();
        assert_eq!(result.populations_evolved, 15);
        assert!(!result.best.is_evaluation_needed());
    }

    #[test]
    fn test_lattice_proximity_run() {
        let config = config()
            .with_lattice(4, 5)
            .with_speciation(SpeciationOperator::Proximity);
        let strategy = Strategy::new(config, target_problem(TARGET)).unwrap();
        let result = DivergentGeneticAlgorithm::new(strategy).evolve().unwrap();
        assert_eq!(result.populations_evolved, 15);
        assert_eq!(result.population.name(), "LatticePopulation");
        assert_eq!(result.population.size(), 20);
    }

    #[test]
    fn test_stop_skips_extinction_cycles() {
        let strategy = Strategy::new(config(), target_problem(TARGET)).unwrap();
        let mut ga = DivergentGeneticAlgorithm::new(strategy);
        ga.stop_handle().store(true, Ordering::Relaxed);
        let result = ga.evolve().unwrap();
        assert!(result.cancelled);
        assert_eq!(result.populations_evolved, 3);
    }
}
