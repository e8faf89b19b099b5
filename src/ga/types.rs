//! Contracts between the engine and the problem domain.
//!
//! The engine never interprets genes. Everything domain-specific (what a
//! gene is, how a random one is drawn, how a genome is scored) enters
//! through the three collaborator traits below, bundled in a [`Problem`].
//!
//! Collaborators take `&mut dyn RngCore` so they stay object-safe; every
//! concurrent task hands them its own seeded generator.

use super::fitness::Fitness;
use super::genome::Genome;
use crate::error::GeneticError;
use rand::RngCore;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Key addressing a gene within a genome.
pub trait Locus: Clone + Ord + Hash + Debug + Send + Sync + 'static {}

impl<T> Locus for T where T: Clone + Ord + Hash + Debug + Send + Sync + 'static {}

/// Value stored at a locus. Compared by value.
pub trait Gene: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Gene for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Scores a genome.
///
/// Returns one [`Fitness`] per objective. Must be safe to call from several
/// threads at once on different genomes.
pub trait FitnessEvaluator<K, G>: Send + Sync {
    fn evaluate(&self, genome: &Genome<K, G>) -> anyhow::Result<Vec<Fitness>>;
}

/// Creates fresh random individuals.
pub trait Breeder<K, G>: Send + Sync {
    fn breed(&self, rng: &mut dyn RngCore) -> Genome<K, G>;
}

/// Draws random genes for mutation.
pub trait GeneDao<K, G>: Send + Sync {
    /// A random gene for `locus`, given the genome it will be placed in.
    fn random_gene(&self, genome: &Genome<K, G>, locus: &K, rng: &mut dyn RngCore) -> G;
}

/// The domain side of a search: scoring, breeding and gene sampling.
pub struct Problem<K, G> {
    pub evaluator: Arc<dyn FitnessEvaluator<K, G>>,
    pub breeder: Arc<dyn Breeder<K, G>>,
    pub gene_dao: Arc<dyn GeneDao<K, G>>,
}

impl<K, G> Clone for Problem<K, G> {
    fn clone(&self) -> Self {
        Self {
            evaluator: Arc::clone(&self.evaluator),
            breeder: Arc::clone(&self.breeder),
            gene_dao: Arc::clone(&self.gene_dao),
        }
    }
}

impl<K, G> Debug for Problem<K, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem").finish_non_exhaustive()
    }
}

impl<K: Locus, G: Gene> Problem<K, G> {
    pub fn new(
        evaluator: impl FitnessEvaluator<K, G> + 'static,
        breeder: impl Breeder<K, G> + 'static,
        gene_dao: impl GeneDao<K, G> + 'static,
    ) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            breeder: Arc::new(breeder),
            gene_dao: Arc::new(gene_dao),
        }
    }

    /// Scores `genome` and stores the result on it.
    pub fn evaluate(&self, genome: &mut Genome<K, G>) -> Result<(), GeneticError> {
        evaluate_with(self.evaluator.as_ref(), genome)
    }
}

/// Scores `genome` with `evaluator` and stores the result on it.
pub(crate) fn evaluate_with<K: Locus, G: Gene>(
    evaluator: &dyn FitnessEvaluator<K, G>,
    genome: &mut Genome<K, G>,
) -> Result<(), GeneticError> {
    let fitness = evaluator.evaluate(genome)?;
    if fitness.is_empty() {
        return Err(GeneticError::InvalidArgument(
            "evaluator returned no objectives".into(),
        ));
    }
    genome.set_fitness(fitness);
    Ok(())
}
