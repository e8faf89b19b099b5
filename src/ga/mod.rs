//! Genetic Algorithm engine.
//!
//! A generic, domain-agnostic GA over keyed genomes. The engine never
//! interprets genes: a problem plugs in through three collaborator traits,
//! bundled in a [`Problem`]:
//!
//! - [`FitnessEvaluator`]: scores a genome (one [`Fitness`] per objective)
//! - [`Breeder`]: creates fresh random genomes
//! - [`GeneDao`]: draws random genes for mutation
//!
//! # Key Types
//!
//! - [`GaConfig`]: Algorithm parameters, builder or flat key/value
//! - [`Strategy`]: Validated config bound to a problem and its operators
//! - [`GeneticAlgorithm`]: Single-population generation loop
//! - [`DivergentGeneticAlgorithm`]: Speciated multi-population driver
//! - [`Population`]: Storage and pairing of individuals
//! - [`StandardPopulation`], [`LatticePopulation`]: Unstructured and
//!   spatially structured layouts
//!
//! # Operators
//!
//! - [`Selector`]: Random, Roulette, Tournament, Truncation, Alpha
//! - [`CrossoverOperator`]: Single-point, Uniform and Uniform swap (each
//!   with a fitness-guaranteed variant), Single-gene, Multiple-gene
//! - [`MutationOperator`]: Rate-based, count-based, fitness-guaranteed
//! - [`SpeciationOperator`]: Fitness or genotype-proximity clustering
//!
//! # Submodules
//!
//! - [`roulette`]: Binary weighted-sampling tree and a standalone sampler
//! - [`multi_objective`]: Pareto non-dominated sorting
//!
//! # References
//!
//! - Holland (1975), *Adaptation in Natural and Artificial Systems*
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and Machine Learning*
//! - De Jong (2006), *Evolutionary Computation: A Unified Approach*

mod config;
mod crossover;
mod divergent;
mod fitness;
mod genome;
mod lattice;
pub mod multi_objective;
mod mutation;
mod population;
pub mod roulette;
mod runner;
mod selection;
mod speciation;
mod statistics;
mod strategy;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{CrossoverKind, GaConfig, MutationKind, PopulationKind, SelectorKind};
pub use crossover::CrossoverOperator;
pub use divergent::{DivergentGeneticAlgorithm, DivergentResult};
pub use fitness::{convert_from_log_probability, Fitness, FitnessGoal};
pub use genome::{compare_scores, Genome, Parents, Scored};
pub use lattice::{LatticePopulation, LatticeShape};
pub use mutation::{MutationContext, MutationCount, MutationOperator};
pub use population::{population_entropy, Population, StandardPopulation};
pub use runner::{EvolutionResult, GaState, GeneticAlgorithm};
pub use selection::{selection_weights, RouletteWheel, Selector, TruncationRanking};
pub use speciation::SpeciationOperator;
pub use statistics::{ExecutionStatistics, GenerationStatistics, PerformanceStatistics};
pub use strategy::Strategy;
pub use types::{Breeder, FitnessEvaluator, Gene, GeneDao, Locus, Problem};
