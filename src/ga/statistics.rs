//! Run telemetry.
//!
//! One [`GenerationStatistics`] is appended per generation (generation 0
//! is the initial population) and never modified afterwards.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Wall-clock time spent in each phase of one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerformanceStatistics {
    pub total: Duration,
    pub invasive: Duration,
    pub selection: Duration,
    pub crossover: Duration,
    pub mutation: Duration,
    pub evaluation: Duration,
    pub entropy: Duration,
}

impl fmt::Display for PerformanceStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[total={}ms, invasive={}ms, selection={}ms, crossover={}ms, mutation={}ms, \
             evaluation={}ms, entropy={}ms]",
            self.total.as_millis(),
            self.invasive.as_millis(),
            self.selection.as_millis(),
            self.crossover.as_millis(),
            self.mutation.as_millis(),
            self.evaluation.as_millis(),
            self.entropy.as_millis(),
        )
    }
}

/// Counters and scores for one generation.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationStatistics {
    pub generation: usize,
    /// Primary score of the best individual.
    pub best_fitness: Option<f64>,
    /// Mean primary score over evaluated individuals.
    pub average_fitness: Option<f64>,
    /// Set only when entropy tracking is enabled.
    pub entropy: Option<f64>,
    pub crossovers: usize,
    pub mutations: usize,
    pub evaluations: usize,
    pub invasive_individuals: usize,
    pub performance: PerformanceStatistics,
}

impl fmt::Display for GenerationStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "generation={}", self.generation)?;
        if let Some(best) = self.best_fitness {
            write!(f, ", bestFitness={best}")?;
        }
        if let Some(avg) = self.average_fitness {
            write!(f, ", averageFitness={avg:.4}")?;
        }
        if let Some(entropy) = self.entropy {
            write!(f, ", entropy={entropy:.4}")?;
        }
        write!(
            f,
            ", crossovers={}, mutations={}, evaluations={}, invasive={}, performance={}",
            self.crossovers,
            self.mutations,
            self.evaluations,
            self.invasive_individuals,
            self.performance
        )
    }
}

/// Whole-run record: settings plus the per-generation series.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecutionStatistics {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub population_size: usize,
    pub mutation_rate: f64,
    pub selector: String,
    pub crossover: String,
    pub mutation: String,
    generations: Vec<GenerationStatistics>,
}

impl ExecutionStatistics {
    pub fn new(
        population_size: usize,
        mutation_rate: f64,
        selector: &str,
        crossover: &str,
        mutation: &str,
    ) -> Self {
        Self {
            started_at: Utc::now(),
            ended_at: None,
            population_size,
            mutation_rate,
            selector: selector.to_string(),
            crossover: crossover.to_string(),
            mutation: mutation.to_string(),
            generations: Vec::new(),
        }
    }

    /// Appends one generation.
    pub fn add_generation(&mut self, stats: GenerationStatistics) {
        self.generations.push(stats);
    }

    pub fn generations(&self) -> &[GenerationStatistics] {
        &self.generations
    }

    pub fn last_generation(&self) -> Option<&GenerationStatistics> {
        self.generations.last()
    }

    /// Marks the run as ended.
    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Mean total time per generation, excluding the initial population.
    pub fn average_generation_time(&self) -> Duration {
        let evolved = self.generations.iter().filter(|g| g.generation > 0);
        let (count, total) = evolved.fold((0u32, Duration::ZERO), |(n, sum), g| {
            (n + 1, sum + g.performance.total)
        });
        if count == 0 {
            Duration::ZERO
        } else {
            total / count
        }
    }
}
