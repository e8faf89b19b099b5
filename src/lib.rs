//! Domain-agnostic evolutionary search engine.
//!
//! Built for decipherment search, where a candidate key is a genome of
//! genes addressed by locus and a language model scores the plaintext it
//! produces. The engine itself knows nothing about ciphers:
//!
//! - **Genetic Algorithm (GA)**: Population-based evolutionary search with
//!   pluggable selection, crossover, mutation and speciation, run
//!   concurrently one task per individual.
//! - **Divergent GA**: Several sub-populations evolved independently,
//!   periodically culled and re-speciated.
//! - **Simulated Annealing (SA)**: Single-genome trajectory search over the
//!   same collaborator traits.
//!
//! # Architecture
//!
//! Domain code implements [`ga::FitnessEvaluator`], [`ga::Breeder`] and
//! [`ga::GeneDao`]; everything else (population lifecycle, operators,
//! concurrency, statistics) lives here. Logging goes through `tracing`;
//! install a subscriber in the host application to see it.

pub mod error;
pub mod executor;
pub mod ga;
pub mod random;
pub mod sa;

pub use error::GeneticError;
pub use executor::TaskExecutor;
