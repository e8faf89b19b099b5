//! Directional fitness scores.
//!
//! A [`Fitness`] is a scalar tagged with whether higher or lower values are
//! better. Its [`Ord`] implementation is a total order in which
//! `Ordering::Greater` always means *better*, so sorting ascending puts the
//! worst individual first and the elite last regardless of direction.
//!
//! Language-model scores are usually log probabilities. Roulette selection
//! needs non-negative weights, so [`convert_from_log_probability`] maps
//! negative values through `exp`.

use std::cmp::Ordering;
use std::fmt;

/// Optimization direction of a fitness objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FitnessGoal {
    /// Higher values are better.
    #[default]
    Maximize,
    /// Lower values are better.
    Minimize,
}

/// A single objective score.
///
/// An optional guard rail caps the score: values beyond it (above it when
/// maximizing, below it when minimizing) compare equal to the guard rail.
/// This stops selection from chasing scores that exceed what a correct
/// solution could plausibly reach.
///
/// Two scores are compared under the goal of the left-hand side; mixing
/// goals within one objective is a caller error.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fitness {
    value: f64,
    goal: FitnessGoal,
    guard_rail: Option<f64>,
}

impl Fitness {
    /// Creates a score with the given direction.
    pub fn new(value: f64, goal: FitnessGoal) -> Self {
        Self {
            value,
            goal,
            guard_rail: None,
        }
    }

    /// A higher-is-better score.
    pub fn maximizing(value: f64) -> Self {
        Self::new(value, FitnessGoal::Maximize)
    }

    /// A lower-is-better score.
    pub fn minimizing(value: f64) -> Self {
        Self::new(value, FitnessGoal::Minimize)
    }

    /// The worst possible score for a direction.
    pub fn worst(goal: FitnessGoal) -> Self {
        match goal {
            FitnessGoal::Maximize => Self::maximizing(f64::NEG_INFINITY),
            FitnessGoal::Minimize => Self::minimizing(f64::INFINITY),
        }
    }

    /// Sets the guard rail.
    pub fn with_guard_rail(mut self, guard_rail: f64) -> Self {
        self.guard_rail = Some(guard_rail);
        self
    }

    /// The raw score.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn goal(&self) -> FitnessGoal {
        self.goal
    }

    pub fn guard_rail(&self) -> Option<f64> {
        self.guard_rail
    }

    /// The score as seen by comparisons, clamped at the guard rail.
    pub fn effective_value(&self) -> f64 {
        match (self.goal, self.guard_rail) {
            (FitnessGoal::Maximize, Some(rail)) => self.value.min(rail),
            (FitnessGoal::Minimize, Some(rail)) => self.value.max(rail),
            (_, None) => self.value,
        }
    }

    /// Whether `self` is strictly better than `other`.
    pub fn is_better_than(&self, other: &Fitness) -> bool {
        self.cmp(other) == Ordering::Greater
    }

    /// Moves the score `fraction` of its magnitude in the worse direction.
    ///
    /// Works for log-probability scores: `-100` maximizing penalized by
    /// `0.1` becomes `-110`.
    pub fn penalize(self, fraction: f64) -> Self {
        let delta = self.value.abs() * fraction;
        let value = match self.goal {
            FitnessGoal::Maximize => self.value - delta,
            FitnessGoal::Minimize => self.value + delta,
        };
        Self { value, ..self }
    }

    /// Divides the score among `niche` similar individuals.
    ///
    /// The score moves towards zero when that is worse and away from it
    /// otherwise, so a crowded niche always scores worse. A niche below 1
    /// is treated as 1.
    pub fn share(self, niche: f64) -> Self {
        let niche = niche.max(1.0);
        let shrink = match self.goal {
            FitnessGoal::Maximize => self.value >= 0.0,
            FitnessGoal::Minimize => self.value < 0.0,
        };
        let value = if shrink {
            self.value / niche
        } else {
            self.value * niche
        };
        Self { value, ..self }
    }
}

/// Converts a log-probability score into a non-negative selection weight.
///
/// Negative values are treated as natural-log probabilities; non-negative
/// values are already weights.
pub fn convert_from_log_probability(value: f64) -> f64 {
    if value < 0.0 {
        value.exp()
    } else {
        value
    }
}

impl Ord for Fitness {
    fn cmp(&self, other: &Self) -> Ordering {
        let ord = self.effective_value().total_cmp(&other.effective_value());
        match self.goal {
            FitnessGoal::Maximize => ord,
            FitnessGoal::Minimize => ord.reverse(),
        }
    }
}

impl PartialOrd for Fitness {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Fitness {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Fitness {}

impl fmt::Display for Fitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.goal {
            FitnessGoal::Maximize => '↑',
            FitnessGoal::Minimize => '↓',
        };
        write!(f, "{}{}", self.value, arrow)
    }
}
