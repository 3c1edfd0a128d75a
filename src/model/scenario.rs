use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::seir::CompartmentState;
use crate::model::transmission::{Intervention, TransmissionRate};

pub const DEFAULT_HORIZON_DAYS: u32 = 180;

/// Longest projection accepted, one hundred years.
pub const MAX_HORIZON_DAYS: u32 = 36_500;

/// Checked horizon length: at least one day and at most [`MAX_HORIZON_DAYS`].
pub fn check_horizon(days: u32) -> Result<u32, ConfigError> {
    if days == 0 {
        return Err(ConfigError::EmptyHorizon);
    }
    if days > MAX_HORIZON_DAYS {
        return Err(ConfigError::HorizonTooLong { days, max: MAX_HORIZON_DAYS });
    }
    Ok(days)
}

/// Parameters for one locality. Rates are per day.
///
/// Field aliases accept the column names of the legacy locality workbooks,
/// so an exported sheet can be read without renaming headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParameters {
    #[serde(alias = "scenario", alias = "Escenario", alias = "Localidad")]
    pub id: String,
    #[serde(alias = "Poblacion")]
    pub population: f64,
    #[serde(alias = "Inicial")]
    pub initial_infected: f64,
    #[serde(alias = "Gamma")]
    pub gamma: f64,
    #[serde(alias = "Sigma")]
    pub sigma: f64,
    #[serde(alias = "beta", alias = "Beta", alias = "Beta1")]
    pub beta_baseline: f64,
    #[serde(default, alias = "Beta_medidas")]
    pub beta_intervention: Option<f64>,
    #[serde(default, alias = "Inicio_medidas")]
    pub intervention_start: Option<i64>,
    #[serde(default, alias = "Duracion_medidas")]
    pub intervention_duration: Option<i64>,
    #[serde(default, alias = "Dias")]
    pub horizon_days: Option<u32>,
}

impl ScenarioParameters {
    pub fn new(
        id: impl Into<String>,
        population: f64,
        initial_infected: f64,
        gamma: f64,
        sigma: f64,
        beta_baseline: f64,
    ) -> Self {
        Self {
            id: id.into(),
            population,
            initial_infected,
            gamma,
            sigma,
            beta_baseline,
            beta_intervention: None,
            intervention_start: None,
            intervention_duration: None,
            horizon_days: None,
        }
    }

    pub fn with_intervention(mut self, beta: f64, start: i64, duration: i64) -> Self {
        self.beta_intervention = Some(beta);
        self.intervention_start = Some(start);
        self.intervention_duration = Some(duration);
        self
    }

    pub fn with_horizon(mut self, days: u32) -> Self {
        self.horizon_days = Some(days);
        self
    }

    /// Basic reproduction number beta/gamma.
    pub fn r0(&self) -> f64 {
        self.beta_baseline / self.gamma
    }

    pub fn herd_immunity_threshold(&self) -> f64 {
        1.0 - 1.0 / self.r0()
    }

    pub fn horizon(&self, default_days: u32) -> u32 {
        self.horizon_days.unwrap_or(default_days)
    }

    /// The intervention window, if both start and duration are given. A
    /// missing intervention beta falls back to the baseline.
    pub fn intervention(&self) -> Result<Option<Intervention>, ConfigError> {
        match (self.intervention_start, self.intervention_duration) {
            (None, None) => Ok(None),
            (Some(start), Some(duration)) => {
                if duration < 0 {
                    return Err(ConfigError::NegativeDuration(duration));
                }
                if start.checked_sub(1).is_none() || start.checked_add(duration).is_none() {
                    return Err(ConfigError::InterventionOutOfRange { start, duration });
                }
                let beta = self.beta_intervention.unwrap_or(self.beta_baseline);
                Ok(Some(Intervention { beta, start, duration }))
            }
            (start, duration) => Err(ConfigError::PartialIntervention { start, duration }),
        }
    }

    pub fn transmission_rate(&self) -> Result<TransmissionRate, ConfigError> {
        Ok(match self.intervention()? {
            Some(iv) => TransmissionRate::with_intervention(self.beta_baseline, iv),
            None => TransmissionRate::constant(self.beta_baseline),
        })
    }

    /// Initial compartments: E(0) is the reproduction number beta/gamma as a
    /// head-count, independent of I(0). R(0) is zero and S(0) takes the rest.
    pub fn initial_state(&self) -> CompartmentState {
        let e = self.r0();
        let i = self.initial_infected;
        let r = 0.0;
        CompartmentState { s: self.population - e - i - r, e, i, r }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        let finite = [
            ("population", self.population),
            ("initial_infected", self.initial_infected),
            ("gamma", self.gamma),
            ("sigma", self.sigma),
            ("beta_baseline", self.beta_baseline),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if let Some(value) = self.beta_intervention {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field: "beta_intervention", value });
            }
            if value < 0.0 {
                return Err(ConfigError::Negative { field: "beta_intervention", value });
            }
        }

        let positive = [
            ("population", self.population),
            ("gamma", self.gamma),
            ("sigma", self.sigma),
            ("beta_baseline", self.beta_baseline),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        if self.initial_infected < 0.0 {
            return Err(ConfigError::Negative { field: "initial_infected", value: self.initial_infected });
        }
        if self.initial_infected > self.population {
            return Err(ConfigError::InfectedExceedsPopulation {
                infected: self.initial_infected,
                population: self.population,
            });
        }
        if let Some(days) = self.horizon_days {
            check_horizon(days)?;
        }
        self.intervention()?;

        let s0 = self.initial_state().s;
        if s0 < 0.0 {
            return Err(ConfigError::NegativeSusceptible { susceptible: s0 });
        }
        Ok(())
    }
}
