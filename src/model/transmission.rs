use serde::{Deserialize, Serialize};

/// A reduced transmission rate applied over a closed day window.
///
/// The window covers `[start - 1, start + duration]`, both ends inclusive,
/// so it opens one day before `start`. Historical outputs depend on this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub beta: f64,
    pub start: i64,
    pub duration: i64,
}

impl Intervention {
    pub fn window(&self) -> (f64, f64) {
        ((self.start - 1) as f64, (self.start + self.duration) as f64)
    }

    pub fn covers(&self, t: f64) -> bool {
        let (lo, hi) = self.window();
        t >= lo && t <= hi
    }
}

/// Piecewise-constant transmission coefficient beta(t).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionRate {
    pub baseline: f64,
    pub intervention: Option<Intervention>,
}

impl TransmissionRate {
    pub fn constant(baseline: f64) -> Self {
        Self { baseline, intervention: None }
    }

    pub fn with_intervention(baseline: f64, intervention: Intervention) -> Self {
        Self { baseline, intervention: Some(intervention) }
    }

    pub fn is_active(&self, t: f64) -> bool {
        self.intervention.map_or(false, |iv| iv.covers(t))
    }

    pub fn at(&self, t: f64) -> f64 {
        match self.intervention {
            Some(iv) if iv.covers(t) => iv.beta,
            _ => self.baseline,
        }
    }

    /// Times where beta(t) jumps. Empty when there is no intervention or the
    /// intervention keeps the baseline rate.
    pub fn breakpoints(&self) -> Vec<f64> {
        match self.intervention {
            Some(iv) if iv.beta != self.baseline => {
                let (lo, hi) = iv.window();
                vec![lo, hi]
            }
            _ => Vec::new(),
        }
    }
}
