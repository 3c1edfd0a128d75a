//! Explicit Runge-Kutta integrators for systems of ODEs.
//!
//! State and derivative are plain `f64` slices; the right-hand side is any
//! `FnMut(t, y, dy)`. Both integrators take a preallocated workspace so a
//! batch run does not allocate per step.

use std::time::{Duration, Instant};

use crate::error::SimulationError;

/// Wall-clock bound for one integration.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    pub at: Instant,
    pub limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self { at: Instant::now() + limit, limit }
    }

    fn check(&self, t: f64) -> Result<(), SimulationError> {
        if Instant::now() > self.at {
            return Err(SimulationError::Timeout { limit_secs: self.limit.as_secs_f64(), t });
        }
        Ok(())
    }
}

fn check_deadline(deadline: Option<&Deadline>, t: f64) -> Result<(), SimulationError> {
    match deadline {
        Some(d) => d.check(t),
        None => Ok(()),
    }
}

/// Workspace for allocation-free RK4 steps
pub struct Rk4Workspace {
    pub k1: Vec<f64>,
    pub k2: Vec<f64>,
    pub k3: Vec<f64>,
    pub k4: Vec<f64>,
    pub ytmp: Vec<f64>,
}

impl Rk4Workspace {
    pub fn new(n: usize) -> Self {
        Self {
            k1: vec![0.0; n],
            k2: vec![0.0; n],
            k3: vec![0.0; n],
            k4: vec![0.0; n],
            ytmp: vec![0.0; n],
        }
    }

    pub fn resize(&mut self, n: usize) {
        if self.k1.len() != n {
            self.k1.resize(n, 0.0);
            self.k2.resize(n, 0.0);
            self.k3.resize(n, 0.0);
            self.k4.resize(n, 0.0);
            self.ytmp.resize(n, 0.0);
        }
    }
}

/// Single classic RK4 step of size `dt` using a preallocated workspace.
pub fn rk4_step_ws<F>(y: &mut [f64], t: f64, dt: f64, ws: &mut Rk4Workspace, f: &mut F)
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let n = y.len();
    ws.resize(n);

    let (k1, k2, k3, k4, ytmp) = (&mut ws.k1, &mut ws.k2, &mut ws.k3, &mut ws.k4, &mut ws.ytmp);

    f(t, y, k1);

    for i in 0..n {
        ytmp[i] = y[i] + 0.5 * dt * k1[i];
    }
    f(t + 0.5 * dt, ytmp, k2);

    for i in 0..n {
        ytmp[i] = y[i] + 0.5 * dt * k2[i];
    }
    f(t + 0.5 * dt, ytmp, k3);

    for i in 0..n {
        ytmp[i] = y[i] + dt * k3[i];
    }
    f(t + dt, ytmp, k4);

    for i in 0..n {
        y[i] += (dt / 6.0) * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
}

/// Advance `y` from `t0` to `t1` with equal RK4 steps no longer than `dt`.
///
/// The interval is divided into `ceil((t1 - t0) / dt)` steps so the last
/// step lands exactly on `t1`. Fails up front when that exceeds
/// `max_steps`. Returns the number of steps taken.
#[allow(clippy::too_many_arguments)]
pub fn rk4_integrate<F>(
    y: &mut [f64],
    t0: f64,
    t1: f64,
    dt: f64,
    max_steps: usize,
    ws: &mut Rk4Workspace,
    deadline: Option<&Deadline>,
    mut f: F,
) -> Result<usize, SimulationError>
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let span = t1 - t0;
    if span <= 0.0 {
        return Ok(0);
    }
    let steps = (span / dt).ceil().max(1.0);
    if steps.is_nan() || steps > max_steps as f64 {
        return Err(SimulationError::TooManySteps { max_steps, from: t0, to: t1 });
    }
    let steps = steps as usize;
    let h = span / steps as f64;
    for k in 0..steps {
        let t = t0 + k as f64 * h;
        check_deadline(deadline, t)?;
        rk4_step_ws(y, t, h, ws, &mut f);
        if y.iter().any(|v| !v.is_finite()) {
            return Err(SimulationError::NonFinite { t: t + h });
        }
    }
    Ok(steps)
}

// Dormand-Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th order weights (also the last stage row).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between 5th and embedded 4th order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Step control for [`dopri5_integrate`].
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveOptions {
    pub rtol: f64,
    pub atol: f64,
    pub h_min: f64,
    /// Attempted steps (accepted and rejected) allowed per call.
    pub max_steps: usize,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self { rtol: 1e-8, atol: 1e-6, h_min: 1e-10, max_steps: 100_000 }
    }
}

/// Workspace for allocation-free Dormand-Prince steps
pub struct DopriWorkspace {
    k: [Vec<f64>; 7],
    ytmp: Vec<f64>,
    ynew: Vec<f64>,
}

impl DopriWorkspace {
    pub fn new(n: usize) -> Self {
        Self {
            k: std::array::from_fn(|_| vec![0.0; n]),
            ytmp: vec![0.0; n],
            ynew: vec![0.0; n],
        }
    }

    pub fn resize(&mut self, n: usize) {
        if self.ytmp.len() != n {
            for k in self.k.iter_mut() {
                k.resize(n, 0.0);
            }
            self.ytmp.resize(n, 0.0);
            self.ynew.resize(n, 0.0);
        }
    }
}

/// One Dormand-Prince trial step. Leaves the candidate in `ws.ynew` and
/// returns the scaled RMS error estimate (accept when <= 1).
fn dopri5_trial<F>(
    y: &[f64],
    t: f64,
    h: f64,
    opts: &AdaptiveOptions,
    ws: &mut DopriWorkspace,
    f: &mut F,
) -> f64
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let n = y.len();
    let [k1, k2, k3, k4, k5, k6, k7] = &mut ws.k;
    let ytmp = &mut ws.ytmp;
    let ynew = &mut ws.ynew;

    f(t, y, k1);

    for i in 0..n {
        ytmp[i] = y[i] + h * A21 * k1[i];
    }
    f(t + C2 * h, ytmp, k2);

    for i in 0..n {
        ytmp[i] = y[i] + h * (A31 * k1[i] + A32 * k2[i]);
    }
    f(t + C3 * h, ytmp, k3);

    for i in 0..n {
        ytmp[i] = y[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
    }
    f(t + C4 * h, ytmp, k4);

    for i in 0..n {
        ytmp[i] = y[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
    }
    f(t + C5 * h, ytmp, k5);

    for i in 0..n {
        ytmp[i] = y[i] + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
    }
    f(t + h, ytmp, k6);

    for i in 0..n {
        ynew[i] = y[i] + h * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
    }
    f(t + h, ynew, k7);

    let mut sum = 0.0;
    for i in 0..n {
        let err = h
            * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
        let scale = opts.atol + opts.rtol * y[i].abs().max(ynew[i].abs());
        sum += (err / scale).powi(2);
    }
    (sum / n as f64).sqrt()
}

/// Advance `y` from `t0` to `t1` with adaptive Dormand-Prince 5(4) steps.
///
/// `h_hint` carries the step size between calls: it is read as the first
/// trial step (when positive) and overwritten with the last proposal, so
/// consecutive grid intervals do not restart step control from scratch.
/// Returns the number of accepted steps.
#[allow(clippy::too_many_arguments)]
pub fn dopri5_integrate<F>(
    y: &mut [f64],
    t0: f64,
    t1: f64,
    h_hint: &mut f64,
    opts: &AdaptiveOptions,
    ws: &mut DopriWorkspace,
    deadline: Option<&Deadline>,
    mut f: F,
) -> Result<usize, SimulationError>
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let span = t1 - t0;
    if span <= 0.0 {
        return Ok(0);
    }
    ws.resize(y.len());

    let mut t = t0;
    let mut h = if *h_hint > 0.0 { *h_hint } else { (0.01 * span).max(opts.h_min) };
    let mut accepted = 0;
    let mut attempts = 0;

    while t < t1 {
        if attempts >= opts.max_steps {
            return Err(SimulationError::TooManySteps { max_steps: opts.max_steps, from: t0, to: t1 });
        }
        attempts += 1;
        check_deadline(deadline, t)?;

        let remaining = t1 - t;
        let last = h >= remaining;
        let h_step = if last { remaining } else { h };

        let err = dopri5_trial(y, t, h_step, opts, ws, &mut f);
        let accept = err.is_finite() && err <= 1.0;

        if accept {
            y.copy_from_slice(&ws.ynew);
            t = if last { t1 } else { t + h_step };
            accepted += 1;
            if y.iter().any(|v| !v.is_finite()) {
                return Err(SimulationError::NonFinite { t });
            }
        }

        let factor = if !err.is_finite() {
            MIN_FACTOR
        } else if err == 0.0 {
            MAX_FACTOR
        } else {
            (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
        };
        // a step truncated to hit t1 says nothing about the next interval
        h = if accept && last { (h_step * factor).max(h) } else { h_step * factor };
        if t < t1 && h < opts.h_min {
            return Err(SimulationError::StepSizeUnderflow { t, h });
        }
    }

    *h_hint = h;
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decay(_t: f64, y: &[f64], dy: &mut [f64]) {
        dy[0] = -y[0];
    }

    #[test]
    fn rk4_matches_exponential_decay() {
        let mut y = [1.0];
        let mut ws = Rk4Workspace::new(1);
        let steps = rk4_integrate(&mut y, 0.0, 2.0, 0.125, 100, &mut ws, None, decay).unwrap();
        assert_eq!(steps, 16);
        assert_relative_eq!(y[0], (-2.0f64).exp(), max_relative = 1e-5);
    }

    #[test]
    fn rk4_shortens_steps_to_land_on_end() {
        let mut y = [1.0];
        let mut ws = Rk4Workspace::new(1);
        let steps = rk4_integrate(&mut y, 0.0, 1.0, 0.3, 100, &mut ws, None, decay).unwrap();
        assert_eq!(steps, 4);
        assert_relative_eq!(y[0], (-1.0f64).exp(), max_relative = 1e-4);
    }

    #[test]
    fn rk4_refuses_more_steps_than_the_budget() {
        let mut y = [1.0];
        let mut ws = Rk4Workspace::new(1);
        let err = rk4_integrate(&mut y, 0.0, 1.0, 1e-12, 100_000, &mut ws, None, decay).unwrap_err();
        assert_eq!(err, SimulationError::TooManySteps { max_steps: 100_000, from: 0.0, to: 1.0 });
        assert_eq!(y[0], 1.0);

        let steps = rk4_integrate(&mut y, 0.0, 1.0, 0.25, 4, &mut ws, None, decay).unwrap();
        assert_eq!(steps, 4);
    }

    #[test]
    fn dopri_matches_exponential_decay() {
        let mut y = [1.0];
        let mut ws = DopriWorkspace::new(1);
        let mut h = 0.0;
        let opts = AdaptiveOptions { rtol: 1e-10, atol: 1e-12, ..Default::default() };
        dopri5_integrate(&mut y, 0.0, 5.0, &mut h, &opts, &mut ws, None, decay).unwrap();
        assert_relative_eq!(y[0], (-5.0f64).exp(), max_relative = 1e-8);
        assert!(h > 0.0);
    }

    #[test]
    fn dopri_empty_interval_is_a_no_op() {
        let mut y = [3.0];
        let mut ws = DopriWorkspace::new(1);
        let mut h = 0.5;
        let opts = AdaptiveOptions::default();
        let steps = dopri5_integrate(&mut y, 4.0, 4.0, &mut h, &opts, &mut ws, None, decay).unwrap();
        assert_eq!(steps, 0);
        assert_eq!(y[0], 3.0);
        assert_eq!(h, 0.5);
    }

    #[test]
    fn dopri_reports_exhausted_step_budget() {
        let mut y = [1.0];
        let mut ws = DopriWorkspace::new(1);
        let mut h = 1e-3;
        let opts = AdaptiveOptions { max_steps: 3, ..Default::default() };
        let err = dopri5_integrate(&mut y, 0.0, 100.0, &mut h, &opts, &mut ws, None, decay).unwrap_err();
        assert!(matches!(err, SimulationError::TooManySteps { max_steps: 3, .. }));
    }

    #[test]
    fn dopri_reports_blow_up() {
        // y' = y^2 from y=1 blows up at t=1.
        let mut y = [1.0];
        let mut ws = DopriWorkspace::new(1);
        let mut h = 0.0;
        let opts = AdaptiveOptions::default();
        let err = dopri5_integrate(&mut y, 0.0, 2.0, &mut h, &opts, &mut ws, None, |_, y, dy| {
            dy[0] = y[0] * y[0];
        })
        .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::StepSizeUnderflow { .. }
                | SimulationError::TooManySteps { .. }
                | SimulationError::NonFinite { .. }
        ));
    }

    #[test]
    fn expired_deadline_times_out() {
        let mut y = [1.0];
        let mut ws = Rk4Workspace::new(1);
        let past = Instant::now().checked_sub(Duration::from_secs(1)).unwrap_or_else(Instant::now);
        let deadline = Deadline { at: past, limit: Duration::ZERO };
        let err = rk4_integrate(&mut y, 0.0, 1.0, 0.1, 100, &mut ws, Some(&deadline), decay).unwrap_err();
        assert!(matches!(err, SimulationError::Timeout { .. }));
    }
}
