//! Simulated Annealing (SA).
//!
//! A single-genome trajectory search over the same collaborators as the
//! GA ([`Problem`](crate::ga::Problem)). Accepts worsening proposals with a
//! probability that decreases with temperature, allowing the search to
//! escape local optima. Supports single-objective scoring only.
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
//! - Cerny (1985), "Thermodynamical Approach to the Travelling Salesman Problem"

mod config;
mod runner;

pub use config::{CoolingSchedule, SaConfig};
pub use runner::{SaResult, SaRunner};
