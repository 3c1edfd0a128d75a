//! Error taxonomy for scenario validation, integration and aggregation.

use thiserror::Error;

/// Invalid scenario parameters. The scenario is never integrated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} must be > 0, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("initial_infected ({infected}) exceeds population ({population})")]
    InfectedExceedsPopulation { infected: f64, population: f64 },

    #[error("initial susceptible would be negative ({susceptible}): population too small for E(0) + I(0)")]
    NegativeSusceptible { susceptible: f64 },

    #[error("horizon_days must be at least 1")]
    EmptyHorizon,

    #[error("horizon of {days} days exceeds the maximum of {max}")]
    HorizonTooLong { days: u32, max: u32 },

    #[error("intervention window needs both start and duration (start={start:?}, duration={duration:?})")]
    PartialIntervention {
        start: Option<i64>,
        duration: Option<i64>,
    },

    #[error("intervention_duration must be >= 0, got {0}")]
    NegativeDuration(i64),

    #[error("intervention window out of range (start={start}, duration={duration})")]
    InterventionOutOfRange { start: i64, duration: i64 },

    #[error("duplicate scenario id")]
    DuplicateId,
}

/// Numerical failure while integrating one scenario.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("step size underflow at t={t} (h={h:e})")]
    StepSizeUnderflow { t: f64, h: f64 },

    #[error("step budget of {max_steps} exhausted between t={from} and t={to}")]
    TooManySteps { max_steps: usize, from: f64, to: f64 },

    #[error("non-finite state at t={t}")]
    NonFinite { t: f64 },

    #[error("wall-clock bound of {limit_secs}s exceeded at t={t}")]
    Timeout { limit_secs: f64, t: f64 },
}

/// Per-scenario failure, either before or during integration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

impl ScenarioError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScenarioError::Config(_) => "configuration",
            ScenarioError::Simulation(_) => "simulation",
        }
    }
}

/// Duplicate (day, scenario) entries were folded together by summation.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[error("scenario {scenario}: {duplicates} duplicate day entries summed (first at day {first_day})")]
pub struct AggregationWarning {
    pub scenario: String,
    pub duplicates: usize,
    pub first_day: i64,
}

/// Raised instead of [`AggregationWarning`] under the strict duplicate policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scenario {scenario}: duplicate entry for day {day}")]
pub struct AggregationError {
    pub scenario: String,
    pub day: i64,
}
