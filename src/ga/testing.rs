//! Shared fixtures for unit tests: a toy "recover the target text" problem
//! over `usize -> char` genomes.

use super::fitness::{Fitness, FitnessGoal};
use super::genome::Genome;
use super::types::{Breeder, FitnessEvaluator, GeneDao, Problem};
use rand::{Rng, RngCore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A genome whose gene at position `i` is the `i`-th char of `text`.
pub(crate) fn letters(text: &str) -> Genome<usize, char> {
    Genome::from_genes(text.chars().enumerate())
}

/// Like [`letters`], with a maximizing score already assigned.
pub(crate) fn scored(text: &str, value: f64) -> Genome<usize, char> {
    let mut g = letters(text);
    g.set_fitness(vec![Fitness::maximizing(value)]);
    g
}

pub(crate) fn random_letter(rng: &mut dyn RngCore) -> char {
    ALPHABET[rng.random_range(0..ALPHABET.len())] as char
}

/// Scores a genome by how many positions match the target.
pub(crate) struct MatchTarget {
    pub target: Vec<char>,
    pub goal: FitnessGoal,
    pub calls: Arc<AtomicUsize>,
}

impl MatchTarget {
    pub fn maximizing(target: &str) -> Self {
        Self {
            target: target.chars().collect(),
            goal: FitnessGoal::Maximize,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn minimizing(target: &str) -> Self {
        Self {
            goal: FitnessGoal::Minimize,
            ..Self::maximizing(target)
        }
    }
}

impl FitnessEvaluator<usize, char> for MatchTarget {
    fn evaluate(&self, genome: &Genome<usize, char>) -> anyhow::Result<Vec<Fitness>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let matches = self
            .target
            .iter()
            .enumerate()
            .filter(|(i, c)| genome.gene(i) == Some(*c))
            .count() as f64;
        let score = match self.goal {
            FitnessGoal::Maximize => Fitness::maximizing(matches),
            FitnessGoal::Minimize => Fitness::minimizing(self.target.len() as f64 - matches),
        };
        Ok(vec![score])
    }
}

/// Always returns the same score.
pub(crate) struct ConstantEvaluator(pub f64);

impl FitnessEvaluator<usize, char> for ConstantEvaluator {
    fn evaluate(&self, _genome: &Genome<usize, char>) -> anyhow::Result<Vec<Fitness>> {
        Ok(vec![Fitness::maximizing(self.0)])
    }
}

/// Always fails.
pub(crate) struct FailingEvaluator;

impl FitnessEvaluator<usize, char> for FailingEvaluator {
    fn evaluate(&self, _genome: &Genome<usize, char>) -> anyhow::Result<Vec<Fitness>> {
        anyhow::bail!("language model unavailable")
    }
}

/// Panics on every call.
pub(crate) struct PanickingEvaluator;

impl FitnessEvaluator<usize, char> for PanickingEvaluator {
    fn evaluate(&self, _genome: &Genome<usize, char>) -> anyhow::Result<Vec<Fitness>> {
        panic!("evaluator crashed")
    }
}

/// Breeds genomes of random letters.
pub(crate) struct RandomLetters {
    pub length: usize,
}

impl Breeder<usize, char> for RandomLetters {
    fn breed(&self, rng: &mut dyn RngCore) -> Genome<usize, char> {
        Genome::from_genes((0..self.length).map(|i| (i, random_letter(rng))))
    }
}

/// Draws any letter.
pub(crate) struct LetterDao;

impl GeneDao<usize, char> for LetterDao {
    fn random_gene(&self, _genome: &Genome<usize, char>, _locus: &usize, rng: &mut dyn RngCore) -> char {
        random_letter(rng)
    }
}

/// The full toy problem for `target`.
pub(crate) fn target_problem(target: &str) -> Problem<usize, char> {
    Problem::new(
        MatchTarget::maximizing(target),
        RandomLetters {
            length: target.chars().count(),
        },
        LetterDao,
    )
}
