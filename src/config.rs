//! Run configuration: solver, time grid, aggregation and scheduling.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::aggregate::DuplicatePolicy;
use crate::model::grid::TimeGridKind;
use crate::model::scenario::{DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS};
use crate::model::seir::{IntegratorSettings, SolverKind};

/// Environment variable naming a JSON config file used when none is given
/// on the command line.
pub const CONFIG_ENV_VAR: &str = "SEIR_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub solver: SolverKind,
    pub grid: TimeGridKind,
    pub duplicate_policy: DuplicatePolicy,
    pub parallel: bool,
    pub scenario_timeout_secs: Option<f64>,
    pub default_horizon_days: u32,
    pub max_steps_per_interval: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            solver: SolverKind::default(),
            grid: TimeGridKind::default(),
            duplicate_policy: DuplicatePolicy::default(),
            parallel: true,
            scenario_timeout_secs: None,
            default_horizon_days: DEFAULT_HORIZON_DAYS,
            max_steps_per_interval: 100_000,
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let cfg: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        cfg.check()?;
        Ok(cfg)
    }

    pub fn check(&self) -> anyhow::Result<()> {
        match self.solver {
            SolverKind::DormandPrince { rtol, atol } => {
                anyhow::ensure!(rtol > 0.0 && rtol.is_finite(), "rtol must be > 0");
                anyhow::ensure!(atol > 0.0 && atol.is_finite(), "atol must be > 0");
            }
            SolverKind::Rk4 { dt } => {
                anyhow::ensure!(dt > 0.0 && dt.is_finite(), "dt must be > 0");
            }
        }
        anyhow::ensure!(
            (1..=MAX_HORIZON_DAYS).contains(&self.default_horizon_days),
            "default_horizon_days must be between 1 and {}",
            MAX_HORIZON_DAYS
        );
        anyhow::ensure!(self.max_steps_per_interval >= 1, "max_steps_per_interval must be >= 1");
        if let Some(secs) = self.scenario_timeout_secs {
            anyhow::ensure!(secs > 0.0 && secs.is_finite(), "scenario_timeout_secs must be > 0");
        }
        Ok(())
    }

    pub fn integrator_settings(&self) -> IntegratorSettings {
        IntegratorSettings {
            solver: self.solver,
            grid: self.grid,
            default_horizon_days: self.default_horizon_days,
            max_steps_per_interval: self.max_steps_per_interval,
            timeout: self.scenario_timeout_secs.map(Duration::from_secs_f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_json_gives_defaults() {
        let cfg: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RunConfig::default());
        assert!(cfg.check().is_ok());
    }

    #[test]
    fn reads_solver_and_grid_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"solver": {{"method": "rk4", "dt": 0.1}}, "grid": "linspace",
                "duplicate_policy": "reject", "parallel": false, "scenario_timeout_secs": 2.5}}"#
        )
        .unwrap();
        let cfg = RunConfig::from_json_file(f.path()).unwrap();
        assert_eq!(cfg.solver, SolverKind::Rk4 { dt: 0.1 });
        assert_eq!(cfg.grid, TimeGridKind::Linspace);
        assert_eq!(cfg.duplicate_policy, DuplicatePolicy::Reject);
        assert!(!cfg.parallel);
        assert_eq!(cfg.integrator_settings().timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn rejects_non_positive_tolerances() {
        let cfg = RunConfig { solver: SolverKind::DormandPrince { rtol: 0.0, atol: 1e-6 }, ..Default::default() };
        let err = cfg.check().unwrap_err();
        assert_eq!(err.to_string(), "rtol must be > 0");
    }

    #[test]
    fn rejects_unbounded_default_horizon() {
        let cfg = RunConfig { default_horizon_days: u32::MAX, ..Default::default() };
        assert_eq!(cfg.check().unwrap_err().to_string(), "default_horizon_days must be between 1 and 36500");
    }
}
