//! Spatially structured population.
//!
//! Members sit on a `rows x columns` grid filled row-major. Parents are
//! always drawn from one neighbourhood: a random occupied cell and every
//! occupied cell within `radius` of it (Chebyshev distance, optionally
//! wrapping around the edges). Good genotypes spread cell by cell instead
//! of taking over the whole population at once.
//!
//! # References
//!
//! - Whitley (1993), "Cellular Genetic Algorithms"
//! - Alba & Dorronsoro (2008), *Cellular Genetic Algorithms*

use super::genome::{Genome, Parents};
use super::population::{evaluate_pending, penalize_member, share_scores, Aggregates, Population};
use super::selection::Selector;
use super::types::{FitnessEvaluator, Gene, Locus};
use crate::error::GeneticError;
use crate::executor::TaskExecutor;
use rand::{Rng, RngCore};
use std::sync::OnceLock;

/// Grid geometry of a [`LatticePopulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatticeShape {
    pub rows: usize,
    pub columns: usize,
    pub wrap_around: bool,
    pub radius: usize,
}

impl LatticeShape {
    /// A wrapping lattice with radius 1.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            wrap_around: true,
            radius: 1,
        }
    }

    pub fn with_wrap_around(mut self, wrap_around: bool) -> Self {
        self.wrap_around = wrap_around;
        self
    }

    pub fn with_radius(mut self, radius: usize) -> Self {
        self.radius = radius;
        self
    }

    pub fn capacity(&self) -> usize {
        self.rows * self.columns
    }

    pub fn validate(&self) -> Result<(), GeneticError> {
        for (name, value) in [
            ("lattice_rows", self.rows),
            ("lattice_columns", self.columns),
            ("lattice_radius", self.radius),
        ] {
            if value == 0 {
                return Err(GeneticError::InvalidConfig(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }

    /// Cells within `radius` of `cell` that are below `occupied`, the
    /// centre first and each cell once.
    pub fn neighbourhood(&self, cell: usize, occupied: usize) -> Vec<usize> {
        let mut cells = vec![cell];
        if self.rows == 0 || self.columns == 0 {
            return cells;
        }
        let (row, column) = (cell / self.columns, cell % self.columns);
        let radius = self.radius as isize;
        for dr in -radius..=radius {
            let Some(r) = self.offset(row, dr, self.rows) else {
                continue;
            };
            for dc in -radius..=radius {
                let Some(c) = self.offset(column, dc, self.columns) else {
                    continue;
                };
                let neighbour = r * self.columns + c;
                if neighbour < occupied && !cells.contains(&neighbour) {
                    cells.push(neighbour);
                }
            }
        }
        cells
    }

    fn offset(&self, at: usize, delta: isize, len: usize) -> Option<usize> {
        let moved = at as isize + delta;
        if self.wrap_around {
            Some(moved.rem_euclid(len as isize) as usize)
        } else if (0..len as isize).contains(&moved) {
            Some(moved as usize)
        } else {
            None
        }
    }
}

/// A fixed-capacity population on a lattice.
///
/// Sorting reorders storage and so reshuffles the grid; the driver only
/// sorts right before it rebuilds the population. [`reindex`] leaves the
/// layout alone, and the selector ranks each neighbourhood as it draws.
///
/// [`reindex`]: Population::reindex
#[derive(Debug, Clone)]
pub struct LatticePopulation<K, G> {
    shape: LatticeShape,
    individuals: Vec<Genome<K, G>>,
    selector: Selector,
    aggregates: OnceLock<Aggregates>,
}

impl<K: Locus, G: Gene> LatticePopulation<K, G> {
    pub fn new(shape: LatticeShape, mut selector: Selector) -> Self {
        selector.reset();
        Self {
            shape,
            individuals: Vec::with_capacity(shape.capacity()),
            selector,
            aggregates: OnceLock::new(),
        }
    }

    pub fn shape(&self) -> LatticeShape {
        self.shape
    }

    /// The member at `(row, column)`, if that cell is occupied.
    pub fn at(&self, row: usize, column: usize) -> Option<&Genome<K, G>> {
        if row >= self.shape.rows || column >= self.shape.columns {
            return None;
        }
        self.individuals.get(row * self.shape.columns + column)
    }

    fn invalidate(&mut self) {
        self.aggregates.take();
    }

    fn aggregates(&self) -> Aggregates {
        *self
            .aggregates
            .get_or_init(|| Aggregates::of(&self.individuals))
    }

    /// Mom and dad from the neighbourhood of a random occupied cell. Dad is
    /// drawn from the neighbourhood without mom, and is mom herself only
    /// when she is alone.
    fn select_pair<'a>(&'a self, rng: &mut dyn RngCore) -> Option<Parents<'a, K, G>> {
        if self.individuals.is_empty() {
            return None;
        }
        let centre = rng.random_range(0..self.individuals.len());
        let mut neighbours: Vec<&Genome<K, G>> = self
            .shape
            .neighbourhood(centre, self.individuals.len())
            .into_iter()
            .map(|cell| &self.individuals[cell])
            .collect();
        neighbours.sort_by(|a, b| a.compare_fitness(b));

        let mom = neighbours.remove(self.selector.next_index(&neighbours, rng)?);
        let dad = if neighbours.is_empty() {
            mom
        } else {
            neighbours[self.selector.next_index(&neighbours, rng)?]
        };
        Some(Parents { mom, dad })
    }
}

impl<K: Locus, G: Gene> Population<K, G> for LatticePopulation<K, G> {
    fn name(&self) -> &'static str {
        "LatticePopulation"
    }

    fn spawn_empty(&self) -> Box<dyn Population<K, G>> {
        Box::new(LatticePopulation::new(self.shape, self.selector.clone()))
    }

    fn clear(&mut self) {
        self.individuals.clear();
        self.invalidate();
    }

    fn add(&mut self, genome: Genome<K, G>) -> Result<(), GeneticError> {
        let capacity = self.shape.capacity();
        if self.individuals.len() >= capacity {
            return Err(GeneticError::PopulationFull { capacity });
        }
        self.individuals.push(genome);
        self.invalidate();
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Option<Genome<K, G>> {
        if index >= self.individuals.len() {
            return None;
        }
        self.invalidate();
        Some(self.individuals.remove(index))
    }

    fn take_all(&mut self) -> Vec<Genome<K, G>> {
        self.invalidate();
        std::mem::take(&mut self.individuals)
    }

    fn size(&self) -> usize {
        self.individuals.len()
    }

    fn individuals(&self) -> &[Genome<K, G>] {
        &self.individuals
    }

    fn sort(&mut self) {
        self.individuals.sort_by(|a, b| a.compare_fitness(b));
    }

    fn reindex(&mut self) {
        self.selector.reset();
    }

    fn select(&self, count: usize, rng: &mut dyn RngCore) -> Vec<Parents<'_, K, G>> {
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(pair) = self.select_pair(rng) else {
                break;
            };
            pairs.push(pair);
        }
        pairs
    }

    fn evaluate_fitness(
        &mut self,
        evaluator: &dyn FitnessEvaluator<K, G>,
        executor: &TaskExecutor,
    ) -> Result<usize, GeneticError> {
        let evaluated = evaluate_pending(&mut self.individuals, evaluator, executor)?;
        if evaluated > 0 {
            self.invalidate();
        }
        Ok(evaluated)
    }

    fn penalize(&mut self, index: usize, fraction: f64) {
        if penalize_member(&mut self.individuals, index, fraction) {
            self.invalidate();
        }
    }

    fn share_fitness(&mut self, executor: &TaskExecutor) -> Result<(), GeneticError> {
        self.invalidate();
        share_scores(&mut self.individuals, executor)
    }

    fn total_fitness(&self) -> f64 {
        self.aggregates().total_fitness
    }

    fn total_probability(&self) -> f64 {
        self.aggregates().total_probability
    }

    fn is_spatial(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::testing::{letters, scored, MatchTarget};
    use crate::random::create_rng;
    use std::collections::HashSet;

    fn sorted(mut cells: Vec<usize>) -> Vec<usize> {
        cells.sort_unstable();
        cells
    }

    /// A full lattice whose member at cell `i` scores `i`.
    fn numbered(shape: LatticeShape, selector: Selector) -> LatticePopulation<usize, char> {
        let mut pop = LatticePopulation::new(shape, selector);
        for i in 0..shape.capacity() {
            pop.add(scored("ABC", i as f64)).unwrap();
        }
        pop
    }

    fn index_of(pop: &LatticePopulation<usize, char>, genome: &Genome<usize, char>) -> usize {
        pop.individuals()
            .iter()
            .position(|g| std::ptr::eq(g, genome))
            .unwrap()
    }

    // ---- Geometry ----

    #[test]
    fn test_neighbourhood_wraps() {
        let shape = LatticeShape::new(4, 4);
        let cells = shape.neighbourhood(0, 16);
        assert_eq!(cells[0], 0);
        assert_eq!(sorted(cells), vec![0, 1, 3, 4, 5, 7, 12, 13, 15]);
    }

    #[test]
    fn test_neighbourhood_without_wrap_clips_edges() {
        let shape = LatticeShape::new(4, 4).with_wrap_around(false);
        assert_eq!(sorted(shape.neighbourhood(0, 16)), vec![0, 1, 4, 5]);
        assert_eq!(sorted(shape.neighbourhood(5, 16)), vec![0, 1, 2, 4, 5, 6, 8, 9, 10]);
    }

    #[test]
    fn test_neighbourhood_visits_each_cell_once() {
        let shape = LatticeShape::new(2, 3).with_radius(3);
        assert_eq!(sorted(shape.neighbourhood(4, 6)), (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_neighbourhood_skips_empty_cells() {
        let shape = LatticeShape::new(3, 3);
        assert_eq!(sorted(shape.neighbourhood(4, 5)), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_shape_validate() {
        assert!(LatticeShape::new(3, 3).validate().is_ok());
        assert!(LatticeShape::new(0, 3).validate().is_err());
        assert!(LatticeShape::new(3, 3).with_radius(0).validate().is_err());
    }

    // ---- Membership ----

    #[test]
    fn test_fills_row_major_and_rejects_overflow() {
        let mut pop = LatticePopulation::new(LatticeShape::new(2, 3), Selector::Random);
        for text in ["A", "B", "C", "D", "E", "F"] {
            pop.add(letters(text)).unwrap();
        }
        assert_eq!(pop.at(1, 0).unwrap().gene(&0), Some(&'D'));
        assert_eq!(pop.at(0, 2).unwrap().gene(&0), Some(&'C'));
        assert!(pop.at(2, 0).is_none());
        assert!(matches!(
            pop.add(letters("G")),
            Err(GeneticError::PopulationFull { capacity: 6 })
        ));
        assert_eq!(pop.size(), 6);
    }

    #[test]
    fn test_spawn_empty_keeps_shape() {
        let pop = numbered(LatticeShape::new(2, 2), Selector::roulette());
        let empty = pop.spawn_empty();
        assert!(empty.is_empty());
        assert!(empty.is_spatial());
        assert_eq!(empty.name(), "LatticePopulation");
    }

    #[test]
    fn test_reindex_keeps_layout() {
        let mut pop = LatticePopulation::new(LatticeShape::new(1, 3), Selector::roulette());
        for value in [5.0, 1.0, 3.0] {
            pop.add(scored("ABC", value)).unwrap();
        }
        pop.reindex();
        let values: Vec<f64> = pop.individuals().iter().map(|g| g.fitness()[0].value()).collect();
        assert_eq!(values, vec![5.0, 1.0, 3.0]);
        pop.sort();
        assert_eq!(pop.best().unwrap().fitness()[0].value(), 5.0);
        assert_eq!(pop.individuals()[2].fitness()[0].value(), 5.0);
    }

    // ---- Selection ----

    #[test]
    fn test_parents_come_from_one_neighbourhood() {
        let shape = LatticeShape::new(5, 5).with_wrap_around(false);
        let pop = numbered(shape, Selector::Random);
        let mut rng = create_rng(42);
        let pairs = pop.select(200, &mut rng);
        assert_eq!(pairs.len(), 200);
        for pair in pairs {
            let (mom, dad) = (index_of(&pop, pair.mom), index_of(&pop, pair.dad));
            assert_ne!(mom, dad);
            let (dr, dc) = ((mom / 5).abs_diff(dad / 5), (mom % 5).abs_diff(dad % 5));
            assert!(dr <= 2 && dc <= 2, "cells {mom} and {dad} are too far apart");
        }
    }

    #[test]
    fn test_alpha_picks_neighbourhood_best() {
        let shape = LatticeShape::new(3, 3).with_wrap_around(false);
        let pop = numbered(shape, Selector::Alpha);
        let mut rng = create_rng(7);
        let mut moms = HashSet::new();
        for pair in pop.select(100, &mut rng) {
            let mom = index_of(&pop, pair.mom);
            let dad = index_of(&pop, pair.dad);
            assert!(dad < mom, "dad {dad} should be the runner-up below mom {mom}");
            moms.insert(mom);
        }
        // Corner neighbourhoods never reach cell 8 from cell 0.
        assert!(moms.len() > 1, "moms {moms:?}");
        assert!(moms.contains(&8));
    }

    #[test]
    fn test_lone_member_pairs_with_itself() {
        let mut pop = LatticePopulation::new(LatticeShape::new(3, 3), Selector::Random);
        pop.add(scored("ABC", 1.0)).unwrap();
        let pairs = pop.select(3, &mut create_rng(1));
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|p| std::ptr::eq(p.mom, p.dad)));
    }

    #[test]
    fn test_empty_lattice_selects_nothing() {
        let pop: LatticePopulation<usize, char> =
            LatticePopulation::new(LatticeShape::new(2, 2), Selector::Random);
        assert!(pop.select(4, &mut create_rng(1)).is_empty());
    }

    // ---- Evaluation ----

    #[test]
    fn test_evaluate_and_totals() {
        let evaluator = MatchTarget::maximizing("AB");
        let mut pop = LatticePopulation::new(LatticeShape::new(1, 3), Selector::Random);
        pop.add_all(vec![letters("AB"), letters("AX"), scored("XX", 0.0)])
            .unwrap();
        let evaluated = pop
            .evaluate_fitness(&evaluator, &TaskExecutor::sequential())
            .unwrap();
        assert_eq!(evaluated, 2);
        assert!((pop.total_fitness() - 3.0).abs() < 1e-12);
        pop.penalize(0, 0.5);
        assert!((pop.total_fitness() - 2.0).abs() < 1e-12);
    }
}
