//! SA configuration and cooling schedules.

use crate::error::GeneticError;

/// How the temperature falls across the sampler iterations of one epoch.
///
/// # References
///
/// - Geometric: standard textbook approach
/// - Linear: fixed-duration cooling
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoolingSchedule {
    /// `T_i = (T_max - T_min) * (n - i) / n + T_min`.
    ///
    /// Reaches `T_min` on the last iteration.
    #[default]
    Linear,

    /// Geometric (exponential) cooling: `T_i = T_max * alpha^i`, floored
    /// at `T_min`.
    Geometric {
        /// Cooling factor in (0, 1). Higher = slower cooling.
        alpha: f64,
    },
}

/// Configuration for the annealing optimizer.
///
/// # Examples
///
/// ```
/// use u_genetic::sa::{CoolingSchedule, SaConfig};
///
/// let config = SaConfig::default()
///     .with_epochs(3)
///     .with_sampler_iterations(2000)
///     .with_max_temperature(5.0)
///     .with_min_temperature(0.0275)
///     .with_cooling(CoolingSchedule::Linear);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SaConfig {
    /// Sweeps over every locus per epoch.
    pub sampler_iterations: usize,

    /// Temperature of the first iteration.
    pub max_temperature: f64,

    /// Temperature floor.
    pub min_temperature: f64,

    pub cooling: CoolingSchedule,

    /// Independent restarts from a freshly bred genome.
    pub epochs: usize,

    /// Random seed for reproducibility.
    pub seed: Option<u64>,
}

impl Default for SaConfig {
    fn default() -> Self {
        Self {
            sampler_iterations: 5000,
            max_temperature: 5.0,
            min_temperature: 2.75,
            cooling: CoolingSchedule::default(),
            epochs: 1,
            seed: None,
        }
    }
}

impl SaConfig {
    pub fn with_sampler_iterations(mut self, n: usize) -> Self {
        self.sampler_iterations = n;
        self
    }

    pub fn with_max_temperature(mut self, t: f64) -> Self {
        self.max_temperature = t;
        self
    }

    pub fn with_min_temperature(mut self, t: f64) -> Self {
        self.min_temperature = t;
        self
    }

    pub fn with_cooling(mut self, cooling: CoolingSchedule) -> Self {
        self.cooling = cooling;
        self
    }

    pub fn with_epochs(mut self, n: usize) -> Self {
        self.epochs = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Temperature at sampler iteration `i`.
    pub fn temperature(&self, i: usize) -> f64 {
        match self.cooling {
            CoolingSchedule::Linear => {
                let n = self.sampler_iterations.max(1) as f64;
                let remaining = self.sampler_iterations.saturating_sub(i) as f64;
                (self.max_temperature - self.min_temperature) * (remaining / n) + self.min_temperature
            }
            CoolingSchedule::Geometric { alpha } => {
                let exponent = i32::try_from(i).unwrap_or(i32::MAX);
                (self.max_temperature * alpha.powi(exponent)).max(self.min_temperature)
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), GeneticError> {
        let invalid = |msg: String| Err(GeneticError::InvalidConfig(msg));
        if self.sampler_iterations == 0 {
            return invalid("sampler_iterations must be at least 1".into());
        }
        if self.epochs == 0 {
            return invalid("epochs must be at least 1".into());
        }
        if self.min_temperature <= 0.0 {
            return invalid("min_temperature must be positive".into());
        }
        if self.min_temperature > self.max_temperature {
            return invalid(format!(
                "min_temperature ({}) must not exceed max_temperature ({})",
                self.min_temperature, self.max_temperature
            ));
        }
        if let CoolingSchedule::Geometric { alpha } = self.cooling {
            if alpha <= 0.0 || alpha >= 1.0 {
                return invalid(format!("geometric alpha must be in (0, 1), got {alpha}"));
            }
        }
        Ok(())
    }
}
