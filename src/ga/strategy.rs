//! A validated configuration bound to its problem and operators.

use super::config::{GaConfig, PopulationKind};
use super::crossover::CrossoverOperator;
use super::lattice::LatticePopulation;
use super::mutation::MutationOperator;
use super::population::{Population, StandardPopulation};
use super::selection::Selector;
use super::speciation::SpeciationOperator;
use super::types::{Gene, Locus, Problem};
use crate::error::GeneticError;
use crate::executor::TaskExecutor;

/// Everything a driver needs to run: the config, the domain collaborators,
/// the resolved operators and the executor for concurrent phases.
///
/// [`Strategy::new`] validates the config and resolves the operators from
/// it. The fields stay public so callers can adjust a strategy after
/// construction; drivers re-check the population arithmetic they depend
/// on and report a violation as [`GeneticError::InvalidConfig`].
#[derive(Debug, Clone)]
pub struct Strategy<K, G> {
    pub config: GaConfig,
    pub problem: Problem<K, G>,
    pub selector: Selector,
    pub crossover: CrossoverOperator,
    pub mutation: MutationOperator,
    pub speciation: SpeciationOperator,
    pub executor: TaskExecutor,
}

impl<K: Locus, G: Gene> Strategy<K, G> {
    pub fn new(config: GaConfig, problem: Problem<K, G>) -> Result<Self, GeneticError> {
        config.validate()?;
        Ok(Self {
            selector: config.build_selector()?,
            crossover: config.build_crossover()?,
            mutation: config.build_mutation()?,
            speciation: config.speciation,
            executor: TaskExecutor::from_options(config.parallel, config.threads)?,
            config,
            problem,
        })
    }

    /// An empty population of the configured layout using the strategy's
    /// selector.
    pub fn spawn_population(&self) -> Box<dyn Population<K, G>> {
        match self.config.population {
            PopulationKind::Standard => Box::new(StandardPopulation::new(self.selector.clone())),
            PopulationKind::Lattice => Box::new(LatticePopulation::new(
                self.config.lattice_shape(),
                self.selector.clone(),
            )),
        }
    }
}
