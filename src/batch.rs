//! Runs every scenario of a batch independently and collects the results.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::{ConfigError, ScenarioError};
use crate::model::scenario::ScenarioParameters;
use crate::model::seir::{integrate, IntegratorSettings, Trajectory};

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioFailure {
    pub scenario: String,
    pub error: ScenarioError,
}

/// Successful trajectories and per-scenario failures, both in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub trajectories: Vec<Trajectory>,
    pub failures: Vec<ScenarioFailure>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.trajectories.len() + self.failures.len()
    }

    pub fn trajectory(&self, scenario: &str) -> Option<&Trajectory> {
        self.trajectories.iter().find(|t| t.scenario == scenario)
    }

    pub fn failure(&self, scenario: &str) -> Option<&ScenarioFailure> {
        self.failures.iter().find(|f| f.scenario == scenario)
    }

    pub fn all_failed(&self) -> bool {
        self.trajectories.is_empty() && !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    pub settings: IntegratorSettings,
    pub parallel: bool,
}

impl BatchRunner {
    pub fn new(settings: IntegratorSettings, parallel: bool) -> Self {
        Self { settings, parallel }
    }

    pub fn from_config(cfg: &RunConfig) -> Self {
        Self::new(cfg.integrator_settings(), cfg.parallel)
    }

    /// Integrate every scenario. A failing scenario is recorded and never
    /// affects the others. A repeated id fails every occurrence after the
    /// first.
    pub fn run(&self, scenarios: &[ScenarioParameters]) -> BatchOutcome {
        let mut seen = HashSet::with_capacity(scenarios.len());
        let repeated: Vec<bool> = scenarios.iter().map(|p| !seen.insert(p.id.as_str())).collect();

        let settings = &self.settings;
        let run_one = |(p, repeated): (&ScenarioParameters, &bool)| -> Result<Trajectory, ScenarioFailure> {
            if *repeated {
                return Err(ScenarioFailure { scenario: p.id.clone(), error: ConfigError::DuplicateId.into() });
            }
            integrate(p, settings).map_err(|error| ScenarioFailure { scenario: p.id.clone(), error })
        };

        let results: Vec<Result<Trajectory, ScenarioFailure>> = if self.parallel {
            scenarios.par_iter().zip(repeated.par_iter()).map(run_one).collect()
        } else {
            scenarios.iter().zip(repeated.iter()).map(run_one).collect()
        };

        let mut outcome = BatchOutcome { trajectories: Vec::with_capacity(results.len()), failures: Vec::new() };
        for result in results {
            match result {
                Ok(traj) => outcome.trajectories.push(traj),
                Err(failure) => {
                    warn!(
                        scenario = %failure.scenario,
                        kind = failure.error.kind(),
                        error = %failure.error,
                        "scenario failed"
                    );
                    outcome.failures.push(failure);
                }
            }
        }

        info!(
            scenarios = scenarios.len(),
            succeeded = outcome.trajectories.len(),
            failed = outcome.failures.len(),
            parallel = self.parallel,
            "batch finished"
        );
        outcome
    }
}
