//! Error type shared by every algorithm in the crate.
//!
//! Recoverable outcomes are not errors: selecting from an empty population
//! yields `None`, and a guaranteed mutation that finds no improvement
//! yields `Ok(false)`. Everything below aborts the current run.

/// Errors raised by the evolutionary engine.
#[derive(Debug, thiserror::Error)]
pub enum GeneticError {
    /// A configuration value is out of range or could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation received arguments it cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A genome lacks a locus that its counterpart has.
    #[error("genome shape mismatch: missing locus {locus}")]
    MissingLocus { locus: String },

    /// Crossover produced too few children to refill the population.
    #[error(
        "insufficient offspring: {children} children + {elitism} elites + {invasive} invasive \
         < population size {population_size}"
    )]
    InsufficientOffspring {
        children: usize,
        elitism: usize,
        invasive: usize,
        population_size: usize,
    },

    /// Every cell of a fixed-capacity population is occupied.
    #[error("population is full: capacity {capacity}")]
    PopulationFull { capacity: usize },

    /// The external fitness evaluator failed.
    #[error("evaluation failed: {0}")]
    Evaluation(#[from] anyhow::Error),

    /// A worker task panicked during a concurrent phase.
    #[error("worker task panicked: {0}")]
    TaskPanicked(String),

    /// The algorithm supports a different number of objectives.
    #[error("unsupported objectives: expected {expected}, got {actual}")]
    UnsupportedObjectives { expected: usize, actual: usize },
}

impl GeneticError {
    pub(crate) fn missing_locus<K: std::fmt::Debug>(locus: &K) -> Self {
        GeneticError::MissingLocus {
            locus: format!("{locus:?}"),
        }
    }
}
