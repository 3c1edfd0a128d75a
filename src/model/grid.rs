use serde::{Deserialize, Serialize};

/// How the evaluation days of a projection are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGridKind {
    /// `0, 1, ..., horizon - 1`.
    #[default]
    Daily,
    /// `horizon` evenly spaced points over `[0, horizon]`, truncated toward
    /// zero. Reproduces legacy outputs; skips a day for most horizons and
    /// ends on `horizon` itself.
    Linspace,
}

/// Non-decreasing integer day labels at which the state is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeGrid {
    days: Vec<i64>,
}

impl TimeGrid {
    pub fn build(kind: TimeGridKind, horizon_days: u32) -> Self {
        let days = match kind {
            TimeGridKind::Daily => (0..horizon_days as i64).collect(),
            TimeGridKind::Linspace => linspace_days(horizon_days),
        };
        Self { days }
    }

    pub fn days(&self) -> &[i64] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Days that appear more than once, in order.
    pub fn duplicated_days(&self) -> Vec<i64> {
        self.days.windows(2).filter(|w| w[0] == w[1]).map(|w| w[0]).collect()
    }
}

fn linspace_days(num: u32) -> Vec<i64> {
    match num {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let stop = num as f64;
            let step = stop / (num - 1) as f64;
            let mut days: Vec<i64> = (0..num).map(|k| (k as f64 * step) as i64).collect();
            // endpoint is pinned, not computed
            if let Some(last) = days.last_mut() {
                *last = num as i64;
            }
            days
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_grid_is_a_unit_step() {
        let grid = TimeGrid::build(TimeGridKind::Daily, 5);
        assert_eq!(grid.days(), &[0, 1, 2, 3, 4]);
        assert!(grid.duplicated_days().is_empty());
    }

    #[test]
    fn linspace_grid_ends_on_horizon_and_skips_a_day() {
        let grid = TimeGrid::build(TimeGridKind::Linspace, 180);
        assert_eq!(grid.len(), 180);
        assert_eq!(grid.days()[0], 0);
        assert_eq!(*grid.days().last().unwrap(), 180);
        assert!(grid.days().windows(2).all(|w| w[0] <= w[1]));
        let skipped = grid.days().windows(2).filter(|w| w[1] - w[0] == 2).count();
        assert_eq!(skipped, 1);
    }

    #[test]
    fn linspace_small_horizons() {
        assert_eq!(TimeGrid::build(TimeGridKind::Linspace, 1).days(), &[0]);
        assert_eq!(TimeGrid::build(TimeGridKind::Linspace, 2).days(), &[0, 2]);
        assert_eq!(TimeGrid::build(TimeGridKind::Linspace, 5).days(), &[0, 1, 2, 3, 5]);
        assert!(TimeGrid::build(TimeGridKind::Linspace, 0).is_empty());
    }
}
