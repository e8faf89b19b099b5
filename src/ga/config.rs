//! GA configuration.
//!
//! [`GaConfig`] holds every parameter of the generation loop and of the
//! divergent driver. It can be built in code with `with_*` methods, parsed
//! from flat `key = value` pairs with [`GaConfig::from_pairs`], or (with
//! the `serde` feature) deserialized.

use super::crossover::CrossoverOperator;
use super::lattice::LatticeShape;
use super::mutation::{MutationCount, MutationOperator};
use super::selection::Selector;
use super::speciation::SpeciationOperator;
use crate::error::GeneticError;
use std::str::FromStr;

/// Selector family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectorKind {
    Random,
    Roulette,
    #[default]
    Tournament,
    Truncation,
    Alpha,
}

/// Crossover family. Attempt limits come from `max_crossover_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CrossoverKind {
    #[default]
    SinglePoint,
    SinglePointGuaranteed,
    Uniform,
    UniformGuaranteed,
    UniformSwap,
    UniformSwapGuaranteed,
    SingleGene,
    MultipleGene,
}

/// Population layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PopulationKind {
    /// Unstructured; any two members may pair.
    #[default]
    Standard,
    /// Toroidal grid; parents come from one neighbourhood.
    Lattice,
}

/// Mutation family. Rates and counts come from the other config fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MutationKind {
    #[default]
    Standard,
    MandatorySingle,
    Multiple,
    StandardGuaranteed,
    MultipleGuaranteed,
}

/// Configuration for the genetic algorithm.
///
/// # Defaults
///
/// ```
/// use u_genetic::ga::GaConfig;
///
/// let config = GaConfig::default();
/// assert_eq!(config.population_size, 100);
/// assert_eq!(config.number_of_generations, Some(50));
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_genetic::ga::{GaConfig, SelectorKind};
///
/// let config = GaConfig::default()
///     .with_population_size(200)
///     .with_selector(SelectorKind::Tournament)
///     .with_tournament_size(5)
///     .with_elitism(2)
///     .with_mutation_rate(0.05);
/// assert!(config.validate().is_ok());
/// ```
///
/// # Flat key/value
///
/// ```
/// use u_genetic::ga::GaConfig;
///
/// let config = GaConfig::from_pairs([
///     ("population_size", "500"),
///     ("number_of_generations", "-1"),
///     ("selector", "truncation"),
///     ("truncation_percentage", "0.8"),
/// ])
/// .unwrap();
/// assert_eq!(config.number_of_generations, None);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GaConfig {
    /// Individuals per population after every replacement.
    pub population_size: usize,

    /// Generations after the initial population. `None` runs until stopped.
    pub number_of_generations: Option<usize>,

    /// Per-locus probability for rate-based mutation (0.0–1.0).
    pub mutation_rate: f64,

    /// Upper bound on loci touched by count-based mutation.
    pub max_mutations_per_individual: usize,

    /// Attempts before a guaranteed mutation gives up.
    pub max_mutation_attempts: usize,

    /// Attempts before a guaranteed crossover gives up.
    pub max_crossover_attempts: usize,

    /// When set, count-based mutation draws its count geometrically with
    /// this stop probability instead of uniformly.
    pub mutation_stop_probability: Option<f64>,

    /// Best individuals carried over unmutated each generation.
    pub elitism: usize,

    /// Freshly bred individuals injected each generation.
    pub invasive_species_count: usize,

    pub tournament_size: usize,

    /// Acceptance probability per tournament rank (0.0–1.0).
    pub tournament_selector_accuracy: f64,

    /// Fraction of a sorted population excluded from truncation selection
    /// (0.0–1.0).
    pub truncation_percentage: f64,

    /// Sub-populations kept after each extinction cycle.
    pub min_populations: usize,

    /// Speciation rounds per extinction cycle.
    pub speciation_events: usize,

    /// Sub-populations produced by splitting one population.
    pub speciation_factor: usize,

    pub extinction_cycles: usize,

    /// Record per-generation gene entropy.
    pub calculate_entropy: bool,

    /// Re-score every survivor each generation and divide its scores by
    /// its niche count.
    pub share_fitness: bool,

    pub selector: SelectorKind,
    pub crossover: CrossoverKind,
    pub mutation: MutationKind,
    pub speciation: SpeciationOperator,
    pub population: PopulationKind,

    /// Lattice rows; `lattice_rows * lattice_columns` must equal
    /// `population_size` for a lattice population.
    pub lattice_rows: usize,
    pub lattice_columns: usize,

    /// Whether lattice neighbourhoods wrap around the edges.
    pub lattice_wrap_around: bool,

    /// Chebyshev radius of a lattice neighbourhood.
    pub lattice_radius: usize,

    /// Run per-individual tasks on a thread pool.
    pub parallel: bool,

    /// Dedicated pool size; `None` uses rayon's global pool.
    pub threads: Option<usize>,

    /// Random seed for reproducibility. `None` uses a random seed.
    pub seed: Option<u64>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            number_of_generations: Some(50),
            mutation_rate: 0.1,
            max_mutations_per_individual: 5,
            max_mutation_attempts: 100,
            max_crossover_attempts: 100,
            mutation_stop_probability: None,
            elitism: 1,
            invasive_species_count: 0,
            tournament_size: 3,
            tournament_selector_accuracy: 0.9,
            truncation_percentage: 0.5,
            min_populations: 3,
            speciation_events: 1,
            speciation_factor: 2,
            extinction_cycles: 2,
            calculate_entropy: false,
            share_fitness: false,
            selector: SelectorKind::default(),
            crossover: CrossoverKind::default(),
            mutation: MutationKind::default(),
            speciation: SpeciationOperator::default(),
            population: PopulationKind::default(),
            lattice_rows: 10,
            lattice_columns: 10,
            lattice_wrap_around: true,
            lattice_radius: 1,
            parallel: true,
            threads: None,
            seed: None,
        }
    }
}

impl GaConfig {
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the generation budget; `None` runs until stopped.
    pub fn with_number_of_generations(mut self, n: Option<usize>) -> Self {
        self.number_of_generations = n;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_max_mutations_per_individual(mut self, n: usize) -> Self {
        self.max_mutations_per_individual = n;
        self
    }

    pub fn with_max_mutation_attempts(mut self, n: usize) -> Self {
        self.max_mutation_attempts = n;
        self
    }

    pub fn with_max_crossover_attempts(mut self, n: usize) -> Self {
        self.max_crossover_attempts = n;
        self
    }

    pub fn with_mutation_stop_probability(mut self, p: f64) -> Self {
        self.mutation_stop_probability = Some(p);
        self
    }

    pub fn with_elitism(mut self, n: usize) -> Self {
        self.elitism = n;
        self
    }

    pub fn with_invasive_species_count(mut self, n: usize) -> Self {
        self.invasive_species_count = n;
        self
    }

    pub fn with_tournament_size(mut self, k: usize) -> Self {
        self.tournament_size = k;
        self
    }

    pub fn with_tournament_selector_accuracy(mut self, accuracy: f64) -> Self {
        self.tournament_selector_accuracy = accuracy;
        self
    }

    pub fn with_truncation_percentage(mut self, pct: f64) -> Self {
        self.truncation_percentage = pct;
        self
    }

    pub fn with_min_populations(mut self, n: usize) -> Self {
        self.min_populations = n;
        self
    }

    pub fn with_speciation_events(mut self, n: usize) -> Self {
        self.speciation_events = n;
        self
    }

    pub fn with_speciation_factor(mut self, n: usize) -> Self {
        self.speciation_factor = n;
        self
    }

    pub fn with_extinction_cycles(mut self, n: usize) -> Self {
        self.extinction_cycles = n;
        self
    }

    pub fn with_calculate_entropy(mut self, enabled: bool) -> Self {
        self.calculate_entropy = enabled;
        self
    }

    pub fn with_share_fitness(mut self, enabled: bool) -> Self {
        self.share_fitness = enabled;
        self
    }

    pub fn with_selector(mut self, kind: SelectorKind) -> Self {
        self.selector = kind;
        self
    }

    pub fn with_crossover(mut self, kind: CrossoverKind) -> Self {
        self.crossover = kind;
        self
    }

    pub fn with_mutation(mut self, kind: MutationKind) -> Self {
        self.mutation = kind;
        self
    }

    pub fn with_speciation(mut self, op: SpeciationOperator) -> Self {
        self.speciation = op;
        self
    }

    /// Switches to a `rows x columns` lattice population and resizes the
    /// population to fill it.
    pub fn with_lattice(mut self, rows: usize, columns: usize) -> Self {
        self.population = PopulationKind::Lattice;
        self.lattice_rows = rows;
        self.lattice_columns = columns;
        self.population_size = rows * columns;
        self
    }

    pub fn with_lattice_wrap_around(mut self, wrap: bool) -> Self {
        self.lattice_wrap_around = wrap;
        self
    }

    pub fn with_lattice_radius(mut self, radius: usize) -> Self {
        self.lattice_radius = radius;
        self
    }

    /// Enables or disables the worker pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the configured selector.
    pub fn build_selector(&self) -> Result<Selector, GeneticError> {
        match self.selector {
            SelectorKind::Random => Ok(Selector::Random),
            SelectorKind::Roulette => Ok(Selector::roulette()),
            SelectorKind::Tournament => {
                Selector::tournament(self.tournament_size, self.tournament_selector_accuracy)
            }
            SelectorKind::Truncation => Selector::truncation(self.truncation_percentage),
            SelectorKind::Alpha => Ok(Selector::Alpha),
        }
    }

    /// Builds the configured crossover operator.
    pub fn build_crossover(&self) -> Result<CrossoverOperator, GeneticError> {
        let max_attempts = self.max_crossover_attempts;
        let op = match self.crossover {
            CrossoverKind::SinglePoint => CrossoverOperator::SinglePoint,
            CrossoverKind::SinglePointGuaranteed => {
                CrossoverOperator::SinglePointGuaranteed { max_attempts }
            }
            CrossoverKind::Uniform => CrossoverOperator::Uniform,
            CrossoverKind::UniformGuaranteed => CrossoverOperator::UniformGuaranteed { max_attempts },
            CrossoverKind::UniformSwap => CrossoverOperator::UniformSwap,
            CrossoverKind::UniformSwapGuaranteed => {
                CrossoverOperator::UniformSwapGuaranteed { max_attempts }
            }
            CrossoverKind::SingleGene => CrossoverOperator::SingleGene,
            CrossoverKind::MultipleGene => CrossoverOperator::MultipleGene,
        };
        op.validate()?;
        Ok(op)
    }

    /// Lattice geometry from the `lattice_*` fields.
    pub fn lattice_shape(&self) -> LatticeShape {
        LatticeShape::new(self.lattice_rows, self.lattice_columns)
            .with_wrap_around(self.lattice_wrap_around)
            .with_radius(self.lattice_radius)
    }

    /// Distribution used by count-based mutation.
    pub fn mutation_count(&self) -> MutationCount {
        let max = self.max_mutations_per_individual;
        match self.mutation_stop_probability {
            Some(stop_probability) => MutationCount::Geometric {
                stop_probability,
                max,
            },
            None => MutationCount::Uniform { max },
        }
    }

    /// Builds the configured mutation operator.
    pub fn build_mutation(&self) -> Result<MutationOperator, GeneticError> {
        let op = match self.mutation {
            MutationKind::Standard => MutationOperator::Standard {
                rate: self.mutation_rate,
            },
            MutationKind::MandatorySingle => MutationOperator::MandatorySingle,
            MutationKind::Multiple => MutationOperator::Multiple {
                count: self.mutation_count(),
            },
            MutationKind::StandardGuaranteed => MutationOperator::StandardGuaranteed {
                rate: self.mutation_rate,
                max_attempts: self.max_mutation_attempts,
            },
            MutationKind::MultipleGuaranteed => MutationOperator::MultipleGuaranteed {
                count: self.mutation_count(),
                max_attempts: self.max_mutation_attempts,
            },
        };
        op.validate()?;
        Ok(op)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), GeneticError> {
        let invalid = |msg: String| Err(GeneticError::InvalidConfig(msg));

        if self.population_size == 0 {
            return invalid("population_size must be at least 1".into());
        }
        if self.elitism + self.invasive_species_count >= self.population_size {
            return invalid(format!(
                "elitism ({}) + invasive_species_count ({}) must be below population_size ({})",
                self.elitism, self.invasive_species_count, self.population_size
            ));
        }
        for (name, value) in [
            ("mutation_rate", self.mutation_rate),
            ("tournament_selector_accuracy", self.tournament_selector_accuracy),
            ("truncation_percentage", self.truncation_percentage),
            (
                "mutation_stop_probability",
                self.mutation_stop_probability.unwrap_or(0.0),
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        for (name, value) in [
            ("tournament_size", self.tournament_size),
            ("max_mutations_per_individual", self.max_mutations_per_individual),
            ("max_mutation_attempts", self.max_mutation_attempts),
            ("max_crossover_attempts", self.max_crossover_attempts),
            ("min_populations", self.min_populations),
            ("speciation_factor", self.speciation_factor),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be at least 1"));
            }
        }
        if self.threads == Some(0) {
            return invalid("threads must be at least 1".into());
        }
        if self.population == PopulationKind::Lattice {
            let shape = self.lattice_shape();
            shape.validate()?;
            if shape.capacity() != self.population_size {
                return invalid(format!(
                    "lattice {}x{} holds {} individuals, population_size is {}",
                    shape.rows,
                    shape.columns,
                    shape.capacity(),
                    self.population_size
                ));
            }
        }
        Ok(())
    }

    /// Parses flat `key = value` pairs over the defaults and validates.
    ///
    /// Unknown keys and unparseable values are configuration errors.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, GeneticError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            config.set(key.as_ref().trim(), value.as_ref().trim())?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets one option by its flat key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), GeneticError> {
        match key {
            "population_size" => self.population_size = parse(key, value)?,
            "number_of_generations" => {
                self.number_of_generations = match parse::<i64>(key, value)? {
                    -1 => None,
                    n if n >= 0 => Some(n as usize),
                    n => {
                        return Err(GeneticError::InvalidConfig(format!(
                            "number_of_generations must be -1 or non-negative, got {n}"
                        )))
                    }
                }
            }
            "mutation_rate" => self.mutation_rate = parse(key, value)?,
            "max_mutations_per_individual" => self.max_mutations_per_individual = parse(key, value)?,
            "max_mutation_attempts" => self.max_mutation_attempts = parse(key, value)?,
            "max_crossover_attempts" => self.max_crossover_attempts = parse(key, value)?,
            "mutation_stop_probability" => self.mutation_stop_probability = Some(parse(key, value)?),
            "elitism" => self.elitism = parse(key, value)?,
            "invasive_species_count" => self.invasive_species_count = parse(key, value)?,
            "tournament_size" => self.tournament_size = parse(key, value)?,
            "tournament_selector_accuracy" => self.tournament_selector_accuracy = parse(key, value)?,
            "truncation_percentage" => self.truncation_percentage = parse(key, value)?,
            "min_populations" => self.min_populations = parse(key, value)?,
            "speciation_events" => self.speciation_events = parse(key, value)?,
            "speciation_factor" => self.speciation_factor = parse(key, value)?,
            "extinction_cycles" => self.extinction_cycles = parse(key, value)?,
            "calculate_entropy" => self.calculate_entropy = parse(key, value)?,
            "share_fitness" => self.share_fitness = parse(key, value)?,
            "population" => self.population = parse(key, value)?,
            "lattice_rows" => self.lattice_rows = parse(key, value)?,
            "lattice_columns" => self.lattice_columns = parse(key, value)?,
            "lattice_wrap_around" => self.lattice_wrap_around = parse(key, value)?,
            "lattice_radius" => self.lattice_radius = parse(key, value)?,
            "selector" => self.selector = parse(key, value)?,
            "crossover" => self.crossover = parse(key, value)?,
            "mutation" => self.mutation = parse(key, value)?,
            "speciation" => self.speciation = parse(key, value)?,
            "parallel" => self.parallel = parse(key, value)?,
            "threads" => self.threads = Some(parse(key, value)?),
            "seed" => self.seed = Some(parse(key, value)?),
            _ => {
                return Err(GeneticError::InvalidConfig(format!(
                    "unknown option '{key}'"
                )))
            }
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, GeneticError> {
    value
        .parse()
        .map_err(|_| GeneticError::InvalidConfig(format!("cannot parse '{value}' for {key}")))
}

/// Normalizes `Single-Point`, `single_point` and `SinglePoint` alike.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for SelectorKind {
    type Err = GeneticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).trim_end_matches("selector") {
            "random" => Ok(SelectorKind::Random),
            "roulette" => Ok(SelectorKind::Roulette),
            "tournament" => Ok(SelectorKind::Tournament),
            "truncation" => Ok(SelectorKind::Truncation),
            "alpha" => Ok(SelectorKind::Alpha),
            _ => Err(GeneticError::InvalidConfig(format!("unknown selector '{s}'"))),
        }
    }
}

impl FromStr for CrossoverKind {
    type Err = GeneticError;

    /// Accepts the "equal opportunity" and "random single point" names as
    /// aliases of the uniform and single-point families.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).trim_end_matches("crossover") {
            "singlepoint" | "randomsinglepoint" => Ok(CrossoverKind::SinglePoint),
            "singlepointguaranteed" | "randomsinglepointguaranteed" => {
                Ok(CrossoverKind::SinglePointGuaranteed)
            }
            "uniform" | "equalopportunity" => Ok(CrossoverKind::Uniform),
            "uniformguaranteed" | "equalopportunityguaranteed" => {
                Ok(CrossoverKind::UniformGuaranteed)
            }
            "uniformswap" | "equalopportunityswap" => Ok(CrossoverKind::UniformSwap),
            "uniformswapguaranteed" | "equalopportunityguaranteedswap" => {
                Ok(CrossoverKind::UniformSwapGuaranteed)
            }
            "singlegene" => Ok(CrossoverKind::SingleGene),
            "multiplegene" => Ok(CrossoverKind::MultipleGene),
            _ => Err(GeneticError::InvalidConfig(format!("unknown crossover '{s}'"))),
        }
    }
}

impl FromStr for PopulationKind {
    type Err = GeneticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).trim_end_matches("population") {
            "standard" => Ok(PopulationKind::Standard),
            "lattice" => Ok(PopulationKind::Lattice),
            _ => Err(GeneticError::InvalidConfig(format!("unknown population '{s}'"))),
        }
    }
}

impl FromStr for MutationKind {
    type Err = GeneticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).trim_end_matches("mutation") {
            "standard" => Ok(MutationKind::Standard),
            "mandatorysingle" => Ok(MutationKind::MandatorySingle),
            "multiple" => Ok(MutationKind::Multiple),
            "standardguaranteed" => Ok(MutationKind::StandardGuaranteed),
            "multipleguaranteed" => Ok(MutationKind::MultipleGuaranteed),
            _ => Err(GeneticError::InvalidConfig(format!("unknown mutation '{s}'"))),
        }
    }
}

impl FromStr for SpeciationOperator {
    type Err = GeneticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).trim_end_matches("speciation") {
            "fitness" => Ok(SpeciationOperator::Fitness),
            "proximity" => Ok(SpeciationOperator::Proximity),
            _ => Err(GeneticError::InvalidConfig(format!("unknown speciation '{s}'"))),
        }
    }
}
