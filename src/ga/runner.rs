//! GA evolutionary loop execution.
//!
//! [`GeneticAlgorithm`] drives one population through the generation
//! loop: breed → evaluate → {select → crossover → mutate → replace →
//! evaluate} → repeat. Selection runs on the orchestrating thread;
//! crossover, mutation and evaluation run as one task per individual on
//! the strategy's [`TaskExecutor`](crate::executor::TaskExecutor), and
//! every phase joins before the next starts.
//!
//! With fitness sharing enabled every survivor is re-scored each
//! generation and its scores are then divided among its niche.
//!
//! Cancellation is checked between generations only.

use super::fitness::Fitness;
use super::genome::Genome;
use super::mutation::MutationContext;
use super::population::Population;
use super::statistics::{ExecutionStatistics, GenerationStatistics, PerformanceStatistics};
use super::strategy::Strategy;
use super::types::{Gene, Locus};
use crate::error::GeneticError;
use crate::random::{create_rng, rng_from_seed, task_seeds};
use rand::rngs::StdRng;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Fraction by which invasive individuals are penalized after evaluation.
const INVASIVE_PENALTY: f64 = 0.1;

/// Phase the driver is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GaState {
    #[default]
    Idle,
    SpawningInitial,
    Evaluating,
    Selecting,
    CrossingOver,
    Mutating,
    Replacing,
    Finished,
}

/// Result of a GA run.
#[derive(Debug, Clone)]
pub struct EvolutionResult<K, G> {
    /// The best individual seen during the entire run.
    pub best: Genome<K, G>,

    /// Scores of `best`.
    pub best_fitness: Vec<Fitness>,

    /// Generations executed after the initial population.
    pub generations: usize,

    /// Whether the run was stopped through the stop handle.
    pub cancelled: bool,

    /// Best primary score so far, one entry per generation including the
    /// initial population.
    pub fitness_history: Vec<f64>,

    pub statistics: ExecutionStatistics,
}

/// Single-population genetic algorithm.
///
/// # Usage
///
/// ```ignore
/// let strategy = Strategy::new(GaConfig::default().with_seed(42), problem)?;
/// let mut ga = GeneticAlgorithm::new(strategy);
/// let result = ga.evolve()?;
/// println!("best: {:?}", result.best_fitness);
/// ```
pub struct GeneticAlgorithm<K: Locus, G: Gene> {
    strategy: Strategy<K, G>,
    population: Box<dyn Population<K, G>>,
    rng: StdRng,
    state: GaState,
    statistics: ExecutionStatistics,
    generation: usize,
    best: Option<Genome<K, G>>,
    stop: Arc<AtomicBool>,
}

impl<K: Locus, G: Gene> GeneticAlgorithm<K, G> {
    /// A driver over an empty population of the configured layout.
    pub fn new(strategy: Strategy<K, G>) -> Self {
        let population = strategy.spawn_population();
        Self::with_population(strategy, population)
    }

    /// A driver over an existing population.
    pub fn with_population(strategy: Strategy<K, G>, population: Box<dyn Population<K, G>>) -> Self {
        let config = &strategy.config;
        let statistics = ExecutionStatistics::new(
            config.population_size,
            config.mutation_rate,
            strategy.selector.name(),
            strategy.crossover.name(),
            strategy.mutation.name(),
        );
        Self {
            rng: rng_from_seed(config.seed),
            strategy,
            population,
            state: GaState::Idle,
            statistics,
            generation: 0,
            best: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the seed taken from the config.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = create_rng(seed);
        self
    }

    /// Shares an externally owned stop flag.
    pub fn with_stop_handle(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Flag that stops the run at the next generation boundary when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state(&self) -> GaState {
        self.state
    }

    pub fn strategy(&self) -> &Strategy<K, G> {
        &self.strategy
    }

    pub fn population(&self) -> &dyn Population<K, G> {
        self.population.as_ref()
    }

    pub fn statistics(&self) -> &ExecutionStatistics {
        &self.statistics
    }

    /// Best individual seen so far.
    pub fn best(&self) -> Option<&Genome<K, G>> {
        self.best.as_ref()
    }

    /// Generations completed after the initial population.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn into_population(self) -> Box<dyn Population<K, G>> {
        self.population
    }

    /// Runs a complete evolution from a freshly bred population.
    #[tracing::instrument(skip_all, name = "ga_evolve")]
    pub fn evolve(&mut self) -> Result<EvolutionResult<K, G>, GeneticError> {
        self.log_start();
        self.spawn_initial_population()?;
        self.run_generations()
    }

    /// Runs a complete evolution starting from the current population.
    ///
    /// Pending evaluations are done first (every member, when sharing
    /// fitness); the current members are recorded as generation 0.
    #[tracing::instrument(skip_all, name = "ga_evolve_existing")]
    pub fn evolve_existing(&mut self) -> Result<EvolutionResult<K, G>, GeneticError> {
        self.log_start();
        let started = Instant::now();
        self.generation = 0;
        self.state = GaState::Evaluating;
        if self.strategy.config.share_fitness {
            let mut members = self.population.take_all();
            members.iter_mut().for_each(Genome::mark_evaluation_needed);
            self.population.add_all(members)?;
        }
        let mut performance = PerformanceStatistics::default();
        let evaluations = self.evaluate(&mut performance)?;
        let entropy = self.entropy(&mut performance);
        performance.total = started.elapsed();
        self.record(GenerationStatistics {
            evaluations,
            entropy,
            performance,
            ..Default::default()
        });
        self.run_generations()
    }

    /// Clears the population, breeds `population_size` genomes and
    /// evaluates them as generation 0.
    pub fn spawn_initial_population(&mut self) -> Result<(), GeneticError> {
        let started = Instant::now();
        self.state = GaState::SpawningInitial;
        self.generation = 0;
        self.population.clear();

        let size = self.strategy.config.population_size;
        let genomes = self.population.breed(
            size,
            self.strategy.problem.breeder.as_ref(),
            &self.strategy.executor,
            &mut self.rng,
        )?;
        self.population.add_all(genomes)?;

        let mut performance = PerformanceStatistics::default();
        let entropy = self.entropy(&mut performance);
        self.state = GaState::Evaluating;
        let evaluations = self.evaluate(&mut performance)?;
        performance.total = started.elapsed();

        self.record(GenerationStatistics {
            evaluations,
            entropy,
            performance,
            ..Default::default()
        });
        Ok(())
    }

    /// Runs one generation.
    ///
    /// # Errors
    ///
    /// - [`GeneticError::InvalidConfig`] when elites and invasive
    ///   individuals leave no room in the population.
    /// - [`GeneticError::InsufficientOffspring`] when crossover yields too
    ///   few children to refill the population.
    ///
    /// In both cases the population is left as it was.
    pub fn proceed_with_next_generation(&mut self) -> Result<(), GeneticError> {
        let started = Instant::now();
        let mut performance = PerformanceStatistics::default();
        let population_size = self.strategy.config.population_size;
        let invasive_count = self.strategy.config.invasive_species_count;
        let share_fitness = self.strategy.config.share_fitness;
        let elites = self.strategy.config.elitism.min(self.population.size());
        let children_needed = population_size
            .checked_sub(elites + invasive_count)
            .ok_or_else(|| {
                GeneticError::InvalidConfig(format!(
                    "{elites} elites + {invasive_count} invasive individuals exceed \
                     population_size ({population_size})"
                ))
            })?;
        let crossover = self.strategy.crossover;
        let executor = self.strategy.executor.clone();
        let problem = self.strategy.problem.clone();

        let t = Instant::now();
        let invasive = if invasive_count > 0 {
            self.population
                .breed(invasive_count, problem.breeder.as_ref(), &executor, &mut self.rng)?
        } else {
            Vec::new()
        };
        performance.invasive = t.elapsed();

        self.state = GaState::Selecting;
        let t = Instant::now();
        self.population.reindex();
        let pairs = self
            .population
            .select(children_needed.div_ceil(crossover.offspring()), &mut self.rng);
        performance.selection = t.elapsed();

        self.state = GaState::CrossingOver;
        let t = Instant::now();
        let evaluator = problem.evaluator.as_ref();
        let seeds = task_seeds(&mut self.rng, pairs.len());
        let children: Vec<Genome<K, G>> = executor
            .map(pairs.into_iter().zip(seeds).collect(), |(parents, seed)| {
                crossover.crossover(parents.mom, parents.dad, evaluator, &mut create_rng(seed))
            })?
            .into_iter()
            .flatten()
            .collect();
        performance.crossover = t.elapsed();
        let crossovers = children.len();

        if children.len() + elites + invasive.len() < population_size {
            return Err(GeneticError::InsufficientOffspring {
                children: children.len(),
                elitism: elites,
                invasive: invasive.len(),
                population_size,
            });
        }

        self.state = GaState::Mutating;
        let t = Instant::now();
        let mutation = self.strategy.mutation;
        let seeds = task_seeds(&mut self.rng, children.len());
        let mutated = executor.map(children.into_iter().zip(seeds).collect(), |(mut child, seed)| {
            let ctx = MutationContext::new(&problem);
            let changed = mutation.mutate(&mut child, &ctx, &mut create_rng(seed))?;
            Ok((child, changed))
        })?;
        performance.mutation = t.elapsed();
        let mutations = mutated.iter().filter(|(_, changed)| *changed).count();

        self.state = GaState::Replacing;
        self.population.sort();
        let mut previous = self.population.take_all();
        let mut carried = previous.split_off(previous.len() - elites);
        drop(previous);
        let mut offspring: Vec<Genome<K, G>> = mutated
            .into_iter()
            .map(|(child, _)| child)
            .take(children_needed)
            .collect();
        if share_fitness {
            carried
                .iter_mut()
                .chain(offspring.iter_mut())
                .for_each(Genome::mark_evaluation_needed);
        }
        self.population.add_all(carried)?;
        self.population.add_all(offspring)?;
        let invasive_start = self.population.size();
        let invasive_individuals = invasive.len();
        self.population.add_all(invasive)?;

        let entropy = self.entropy(&mut performance);

        self.state = GaState::Evaluating;
        let evaluations = self.evaluate(&mut performance)?;
        for index in invasive_start..self.population.size() {
            self.population.penalize(index, INVASIVE_PENALTY);
        }

        self.generation += 1;
        performance.total = started.elapsed();
        self.record(GenerationStatistics {
            crossovers,
            mutations,
            evaluations,
            invasive_individuals,
            entropy,
            performance,
            ..Default::default()
        });
        Ok(())
    }

    /// Marks the run as finished and closes its statistics.
    pub fn finish(&mut self) {
        self.state = GaState::Finished;
        self.statistics.finish();
        tracing::info!(
            generations = self.generation,
            average_generation_ms = self.statistics.average_generation_time().as_millis() as u64,
            "evolution finished"
        );
    }

    fn run_generations(&mut self) -> Result<EvolutionResult<K, G>, GeneticError> {
        let mut fitness_history = Vec::new();
        fitness_history.extend(self.best_primary());

        let budget = self.strategy.config.number_of_generations;
        let mut cancelled = false;
        while budget.map_or(true, |n| self.generation < n) {
            if self.stop.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            self.proceed_with_next_generation()?;
            fitness_history.extend(self.best_primary());
        }
        self.finish();

        let best = self.best.clone().ok_or_else(|| {
            GeneticError::InvalidArgument("evolution finished without an individual".into())
        })?;
        Ok(EvolutionResult {
            best_fitness: best.fitness().to_vec(),
            best,
            generations: self.generation,
            cancelled,
            fitness_history,
            statistics: self.statistics.clone(),
        })
    }

    fn log_start(&self) {
        tracing::info!(
            population = self.population.name(),
            population_size = self.strategy.config.population_size,
            selector = self.strategy.selector.name(),
            crossover = self.strategy.crossover.name(),
            mutation = self.strategy.mutation.name(),
            "evolution started"
        );
    }

    fn evaluate(&mut self, performance: &mut PerformanceStatistics) -> Result<usize, GeneticError> {
        let t = Instant::now();
        let evaluations = self.population.evaluate_fitness(
            self.strategy.problem.evaluator.as_ref(),
            &self.strategy.executor,
        )?;
        if self.strategy.config.share_fitness {
            self.population.share_fitness(&self.strategy.executor)?;
        }
        performance.evaluation = t.elapsed();
        Ok(evaluations)
    }

    fn entropy(&self, performance: &mut PerformanceStatistics) -> Option<f64> {
        if !self.strategy.config.calculate_entropy {
            return None;
        }
        let t = Instant::now();
        let entropy = self.population.calculate_entropy();
        performance.entropy = t.elapsed();
        Some(entropy)
    }

    /// Fills in the score fields, tracks the best individual and appends
    /// the generation.
    fn record(&mut self, mut stats: GenerationStatistics) {
        stats.generation = self.generation;
        let current = self.population.best();
        stats.best_fitness = current.and_then(Genome::primary_fitness).map(|f| f.value());
        let scores: Vec<f64> = self
            .population
            .individuals()
            .iter()
            .filter_map(Genome::primary_fitness)
            .map(|f| f.value())
            .collect();
        if !scores.is_empty() {
            stats.average_fitness = Some(scores.iter().sum::<f64>() / scores.len() as f64);
        }

        if let Some(current) = current {
            let improved = self
                .best
                .as_ref()
                .map_or(true, |best| current.compare_fitness(best) == CmpOrdering::Greater);
            if improved {
                self.best = Some(current.clone());
            }
        }

        tracing::info!("{stats}");
        self.statistics.add_generation(stats);
    }

    fn best_primary(&self) -> Option<f64> {
        self.best
            .as_ref()
            .and_then(Genome::primary_fitness)
            .map(|f| f.value())
    }
}
