//! Splitting one population into several species.
//!
//! Both operators cut an ordered population into `factor` contiguous
//! slices of `size / factor` members, the last slice taking the remainder.
//! They differ in the ordering: fitness rank, or genotype distance to the
//! elite. On a spatial population proximity is the layout itself, so
//! Proximity slices it in storage order.

use super::genome::Genome;
use super::population::Population;
use super::types::{Gene, Locus};
use crate::error::GeneticError;

/// How sub-populations are formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpeciationOperator {
    /// Slices of similar fitness.
    #[default]
    Fitness,
    /// Slices of similar genotype, starting with the elite's neighbourhood.
    /// On a lattice, slices of adjacent cells.
    Proximity,
}

impl SpeciationOperator {
    pub fn name(&self) -> &'static str {
        match self {
            SpeciationOperator::Fitness => "FitnessSpeciation",
            SpeciationOperator::Proximity => "ProximitySpeciation",
        }
    }

    /// Drains `population` into `factor` new populations of the same kind.
    pub fn diverge<K: Locus, G: Gene>(
        &self,
        factor: usize,
        population: &mut dyn Population<K, G>,
    ) -> Result<Vec<Box<dyn Population<K, G>>>, GeneticError> {
        let size = population.size();
        if factor == 0 {
            return Err(GeneticError::InvalidArgument(
                "speciation factor must be at least 1".into(),
            ));
        }
        if size == 0 {
            return Err(GeneticError::InvalidArgument(
                "cannot speciate an empty population".into(),
            ));
        }
        if factor > size {
            return Err(GeneticError::InvalidArgument(format!(
                "speciation factor {factor} exceeds population size {size}"
            )));
        }

        let spatial = population.is_spatial();
        let by_layout = *self == SpeciationOperator::Proximity && spatial;
        if !by_layout {
            population.sort();
        }
        let mut individuals = population.take_all();
        if *self == SpeciationOperator::Proximity && !spatial {
            order_by_proximity_to_elite(&mut individuals);
        }

        let chunk = size / factor;
        let mut species = Vec::with_capacity(factor);
        let mut rest = individuals.into_iter();
        for i in 0..factor {
            let take = if i + 1 == factor { usize::MAX } else { chunk };
            let mut sub = population.spawn_empty();
            sub.add_all(rest.by_ref().take(take).collect())?;
            species.push(sub);
        }

        tracing::debug!(
            operator = self.name(),
            factor,
            size,
            "population diverged"
        );
        Ok(species)
    }
}

/// Reorders an ascending-sorted population by distance to its last
/// (elite) member, closest first. Ties keep fitness order.
fn order_by_proximity_to_elite<K: Locus, G: Gene>(individuals: &mut Vec<Genome<K, G>>) {
    let Some(elite) = individuals.last().cloned() else {
        return;
    };
    let mut keyed: Vec<(usize, Genome<K, G>)> = individuals
        .drain(..)
        .map(|g| (g.distance(&elite), g))
        .collect();
    keyed.sort_by_key(|(d, _)| *d);
    individuals.extend(keyed.into_iter().map(|(_, g)| g));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::lattice::{LatticePopulation, LatticeShape};
    use crate::ga::population::StandardPopulation;
    use crate::ga::selection::Selector;
    use crate::ga::testing::scored;

    fn population(entries: &[(&str, f64)]) -> StandardPopulation<usize, char> {
        StandardPopulation::with_individuals(
            Selector::Random,
            entries.iter().map(|(s, v)| scored(s, *v)).collect(),
        )
    }

    fn values(p: &dyn Population<usize, char>) -> Vec<f64> {
        p.individuals().iter().map(|g| g.fitness()[0].value()).collect()
    }

    // ---- Fitness ----

    #[test]
    fn test_fitness_slices_with_remainder_last() {
        let entries: Vec<(&str, f64)> = (0..10).map(|i| ("AB", (9 - i) as f64)).collect();
        let mut pop = population(&entries);
        let species = SpeciationOperator::Fitness.diverge(3, &mut pop).unwrap();

        assert!(pop.is_empty(), "source population must be drained");
        let sizes: Vec<usize> = species.iter().map(|s| s.size()).collect();
        assert_eq!(sizes, vec![3, 3, 4]);
        assert_eq!(values(&*species[0]), vec![0.0, 1.0, 2.0]);
        assert_eq!(values(&*species[2]), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_factor_one_keeps_everything() {
        let mut pop = population(&[("A", 1.0), ("B", 2.0)]);
        let species = SpeciationOperator::Fitness.diverge(1, &mut pop).unwrap();
        assert_eq!(species.len(), 1);
        assert_eq!(species[0].size(), 2);
    }

    // ---- Proximity ----

    #[test]
    fn test_proximity_groups_elite_neighbourhood() {
        let mut pop = population(&[
            ("ZZZZ", 1.0),
            ("AAAB", 2.0),
            ("ZZZY", 3.0),
            ("AAAA", 4.0),
        ]);
        let species = SpeciationOperator::Proximity.diverge(2, &mut pop).unwrap();
        let first: Vec<String> = species[0]
            .individuals()
            .iter()
            .map(|g| g.genes().map(|(_, c)| *c).collect())
            .collect();
        assert!(first.contains(&"AAAA".to_string()));
        assert!(first.contains(&"AAAB".to_string()));
    }

    #[test]
    fn test_proximity_on_lattice_keeps_cell_order() {
        let mut pop = LatticePopulation::new(LatticeShape::new(2, 3), Selector::Random);
        for value in [5.0, 0.0, 3.0, 1.0, 4.0, 2.0] {
            pop.add(scored("ABC", value)).unwrap();
        }
        let species = SpeciationOperator::Proximity.diverge(2, &mut pop).unwrap();
        assert_eq!(values(&*species[0]), vec![5.0, 0.0, 3.0]);
        assert_eq!(values(&*species[1]), vec![1.0, 4.0, 2.0]);
        assert!(species.iter().all(|s| s.name() == "LatticePopulation"));
    }

    #[test]
    fn test_fitness_on_lattice_still_ranks() {
        let mut pop = LatticePopulation::new(LatticeShape::new(2, 2), Selector::Random);
        for value in [3.0, 0.0, 2.0, 1.0] {
            pop.add(scored("ABC", value)).unwrap();
        }
        let species = SpeciationOperator::Fitness.diverge(2, &mut pop).unwrap();
        assert_eq!(values(&*species[0]), vec![0.0, 1.0]);
        assert_eq!(values(&*species[1]), vec![2.0, 3.0]);
    }

    // ---- Errors ----

    #[test]
    fn test_invalid_arguments() {
        let mut pop = population(&[("A", 1.0), ("B", 2.0)]);
        assert!(SpeciationOperator::Fitness.diverge(0, &mut pop).is_err());
        assert!(SpeciationOperator::Fitness.diverge(3, &mut pop).is_err());
        assert_eq!(pop.size(), 2, "failed divergence must not drain");

        let mut empty = population(&[]);
        assert!(SpeciationOperator::Proximity.diverge(1, &mut empty).is_err());
    }
}
