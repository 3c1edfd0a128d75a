use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ScenarioError, SimulationError};
use crate::math::ode::{
    dopri5_integrate, rk4_integrate, AdaptiveOptions, Deadline, DopriWorkspace, Rk4Workspace,
};
use crate::model::grid::{TimeGrid, TimeGridKind};
use crate::model::scenario::{check_horizon, ScenarioParameters, DEFAULT_HORIZON_DAYS};
use crate::model::transmission::TransmissionRate;

// State vector layout: S | E | I | R
const IDX_S: usize = 0;
const IDX_E: usize = 1;
const IDX_I: usize = 2;
const IDX_R: usize = 3;
const STATE_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compartment {
    Susceptible,
    Exposed,
    Infected,
    Recovered,
}

impl Compartment {
    pub const ALL: [Compartment; 4] =
        [Compartment::Susceptible, Compartment::Exposed, Compartment::Infected, Compartment::Recovered];

    /// Compartments written to the output document.
    pub const REPORTED: [Compartment; 3] =
        [Compartment::Infected, Compartment::Recovered, Compartment::Exposed];

    pub fn name(&self) -> &'static str {
        match self {
            Compartment::Susceptible => "susceptible",
            Compartment::Exposed => "exposed",
            Compartment::Infected => "infected",
            Compartment::Recovered => "recovered",
        }
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Head-counts per compartment at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompartmentState {
    pub s: f64,
    pub e: f64,
    pub i: f64,
    pub r: f64,
}

impl CompartmentState {
    pub fn total(&self) -> f64 {
        self.s + self.e + self.i + self.r
    }

    pub fn get(&self, compartment: Compartment) -> f64 {
        match compartment {
            Compartment::Susceptible => self.s,
            Compartment::Exposed => self.e,
            Compartment::Infected => self.i,
            Compartment::Recovered => self.r,
        }
    }

    fn to_array(self) -> [f64; STATE_SIZE] {
        [self.s, self.e, self.i, self.r]
    }

    fn from_slice(y: &[f64]) -> Self {
        Self { s: y[IDX_S], e: y[IDX_E], i: y[IDX_I], r: y[IDX_R] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub day: i64,
    pub state: CompartmentState,
}

/// Reported states of one scenario, in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub scenario: String,
    pub points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn series(&self, compartment: Compartment) -> Vec<f64> {
        self.points.iter().map(|p| p.state.get(compartment)).collect()
    }

    /// First day holding the maximum of `compartment`.
    pub fn peak(&self, compartment: Compartment) -> Option<(i64, f64)> {
        let mut best: Option<(i64, f64)> = None;
        for p in &self.points {
            let v = p.state.get(compartment);
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((p.day, v));
            }
        }
        best
    }

    /// Largest |S+E+I+R - N| / N over all points.
    pub fn max_relative_drift(&self, population: f64) -> f64 {
        self.points
            .iter()
            .map(|p| ((p.state.total() - population) / population).abs())
            .fold(0.0, f64::max)
    }
}

/// Which integrator advances the state between grid days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SolverKind {
    /// Adaptive Dormand-Prince 5(4).
    DormandPrince { rtol: f64, atol: f64 },
    /// Fixed-step classic RK4.
    Rk4 { dt: f64 },
}

pub const DEFAULT_RTOL: f64 = 1e-8;
pub const DEFAULT_ATOL: f64 = 1e-6;
pub const DEFAULT_RK4_DT: f64 = 0.05;

impl Default for SolverKind {
    fn default() -> Self {
        SolverKind::DormandPrince { rtol: DEFAULT_RTOL, atol: DEFAULT_ATOL }
    }
}

/// Everything the integrator needs besides the scenario itself.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorSettings {
    pub solver: SolverKind,
    pub grid: TimeGridKind,
    pub default_horizon_days: u32,
    pub max_steps_per_interval: usize,
    pub timeout: Option<Duration>,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            solver: SolverKind::default(),
            grid: TimeGridKind::default(),
            default_horizon_days: DEFAULT_HORIZON_DAYS,
            max_steps_per_interval: 100_000,
            timeout: None,
        }
    }
}

/// Closed-population SEIR right-hand side.
#[derive(Debug, Clone, Copy)]
pub struct SeirModel {
    pub population: f64,
    pub gamma: f64,
    pub sigma: f64,
    pub rate: TransmissionRate,
}

impl SeirModel {
    pub fn from_scenario(p: &ScenarioParameters) -> Result<Self, ScenarioError> {
        p.check()?;
        Ok(Self { population: p.population, gamma: p.gamma, sigma: p.sigma, rate: p.transmission_rate()? })
    }

    pub fn deriv(&self, t: f64, y: &[f64], dy: &mut [f64]) {
        self.deriv_with_beta(self.rate.at(t), y, dy);
    }

    /// Right-hand side with beta held fixed, for use on a piece of the time
    /// axis where beta(t) is known to be constant.
    pub fn deriv_with_beta(&self, beta: f64, y: &[f64], dy: &mut [f64]) {
        let (s, e, i) = (y[IDX_S], y[IDX_E], y[IDX_I]);
        let infection = beta * s * i / self.population;
        let onset = self.sigma * e;
        let recovery = self.gamma * i;
        dy[IDX_S] = -infection;
        dy[IDX_E] = infection - onset;
        dy[IDX_I] = onset - recovery;
        dy[IDX_R] = recovery;
    }

    /// Advance `y` from `t0` to `t1`, stopping at every point where beta
    /// jumps. Each piece is integrated with beta frozen at its midpoint so no
    /// stage evaluates across the discontinuity.
    fn advance(
        &self,
        y: &mut [f64],
        t0: f64,
        t1: f64,
        stepper: &mut Stepper,
        deadline: Option<&Deadline>,
    ) -> Result<usize, SimulationError> {
        let mut knots = Vec::with_capacity(4);
        knots.push(t0);
        knots.extend(self.rate.breakpoints().into_iter().filter(|&b| b > t0 && b < t1));
        knots.push(t1);

        let mut steps = 0;
        for piece in knots.windows(2) {
            let (a, b) = (piece[0], piece[1]);
            let beta = self.rate.at(0.5 * (a + b));
            steps += stepper.advance(y, a, b, deadline, |_t, y, dy| self.deriv_with_beta(beta, y, dy))?;
        }
        Ok(steps)
    }
}

enum Stepper {
    Dopri { ws: DopriWorkspace, opts: AdaptiveOptions, h: f64 },
    Rk4 { ws: Rk4Workspace, dt: f64, max_steps: usize },
}

impl Stepper {
    fn new(settings: &IntegratorSettings) -> Self {
        match settings.solver {
            SolverKind::DormandPrince { rtol, atol } => Stepper::Dopri {
                ws: DopriWorkspace::new(STATE_SIZE),
                opts: AdaptiveOptions { rtol, atol, max_steps: settings.max_steps_per_interval, ..Default::default() },
                h: 0.0,
            },
            SolverKind::Rk4 { dt } => {
                Stepper::Rk4 { ws: Rk4Workspace::new(STATE_SIZE), dt, max_steps: settings.max_steps_per_interval }
            }
        }
    }

    fn advance<F>(
        &mut self,
        y: &mut [f64],
        t0: f64,
        t1: f64,
        deadline: Option<&Deadline>,
        f: F,
    ) -> Result<usize, SimulationError>
    where
        F: FnMut(f64, &[f64], &mut [f64]),
    {
        match self {
            Stepper::Dopri { ws, opts, h } => dopri5_integrate(y, t0, t1, h, opts, ws, deadline, f),
            Stepper::Rk4 { ws, dt, max_steps } => {
                rk4_integrate(y, t0, t1, *dt, *max_steps, ws, deadline, f)
            }
        }
    }
}

/// Integrate one scenario over its time grid.
///
/// Parameters are validated first; an invalid scenario never reaches the
/// solver. The state is reported at every grid day, including repeated days
/// of a legacy grid (a repeated day reports the same state twice).
pub fn integrate(scenario: &ScenarioParameters, settings: &IntegratorSettings) -> Result<Trajectory, ScenarioError> {
    let model = SeirModel::from_scenario(scenario)?;
    let horizon = check_horizon(scenario.horizon(settings.default_horizon_days))?;
    let grid = TimeGrid::build(settings.grid, horizon);

    let deadline = settings.timeout.map(Deadline::after);
    let mut stepper = Stepper::new(settings);
    let mut y = scenario.initial_state().to_array();
    let mut points = Vec::with_capacity(grid.len());
    let mut t = 0.0;
    let mut steps = 0;

    for &day in grid.days() {
        let target = day as f64;
        steps += model.advance(&mut y, t, target, &mut stepper, deadline.as_ref())?;
        t = target;
        points.push(TrajectoryPoint { day, state: CompartmentState::from_slice(&y) });
    }

    debug!(
        scenario = %scenario.id,
        days = points.len(),
        steps,
        r0 = scenario.r0(),
        "scenario integrated"
    );
    Ok(Trajectory { scenario: scenario.id.clone(), points })
}
