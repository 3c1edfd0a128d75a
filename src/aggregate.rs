//! Day × scenario matrices built from batch trajectories.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AggregationError, AggregationWarning};
use crate::model::seir::{Compartment, Trajectory};

/// What to do when a scenario reports the same day more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Sum the entries and emit one warning per affected scenario.
    #[default]
    Sum,
    /// Fail on the first duplicate.
    Reject,
}

/// One compartment, rows are days (ascending) and columns are scenarios in
/// the order they first appear. A cell is `None` when the scenario has no
/// entry for that day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompartmentMatrix {
    pub compartment: Compartment,
    pub days: Vec<i64>,
    pub scenarios: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CompartmentMatrix {
    pub fn rows(&self) -> usize {
        self.days.len()
    }

    pub fn columns(&self) -> usize {
        self.scenarios.len()
    }

    pub fn get(&self, day: i64, scenario: &str) -> Option<f64> {
        let row = self.days.binary_search(&day).ok()?;
        let col = self.scenarios.iter().position(|s| s == scenario)?;
        self.values[row][col]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub matrices: Vec<CompartmentMatrix>,
    pub warnings: Vec<AggregationWarning>,
}

impl AggregatedResult {
    pub fn matrix(&self, compartment: Compartment) -> Option<&CompartmentMatrix> {
        self.matrices.iter().find(|m| m.compartment == compartment)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    pub policy: DuplicatePolicy,
}

impl ResultAggregator {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    /// Scenarios with repeated (scenario, day) entries. Under
    /// [`DuplicatePolicy::Reject`] the first repeat is an error instead.
    pub fn check_duplicates(&self, trajectories: &[Trajectory]) -> Result<Vec<AggregationWarning>, AggregationError> {
        let mut counts: HashMap<(&str, i64), usize> = HashMap::new();
        for traj in trajectories {
            for p in &traj.points {
                let n = counts.entry((traj.scenario.as_str(), p.day)).or_default();
                *n += 1;
                if *n > 1 && self.policy == DuplicatePolicy::Reject {
                    return Err(AggregationError { scenario: traj.scenario.clone(), day: p.day });
                }
            }
        }

        let mut per_scenario: HashMap<&str, (usize, i64)> = HashMap::new();
        for (&(scenario, day), &n) in &counts {
            if n > 1 {
                let entry = per_scenario.entry(scenario).or_insert((0, day));
                entry.0 += n - 1;
                entry.1 = entry.1.min(day);
            }
        }

        let mut warnings = Vec::with_capacity(per_scenario.len());
        for scenario in column_order(trajectories) {
            if let Some((duplicates, first_day)) = per_scenario.remove(scenario) {
                warnings.push(AggregationWarning { scenario: scenario.to_string(), duplicates, first_day });
            }
        }
        Ok(warnings)
    }

    /// Sum `compartment` over each (day, scenario) group.
    pub fn aggregate(&self, trajectories: &[Trajectory], compartment: Compartment) -> Result<CompartmentMatrix, AggregationError> {
        if self.policy == DuplicatePolicy::Reject {
            self.check_duplicates(trajectories)?;
        }

        let scenarios: Vec<&str> = column_order(trajectories);
        let column: HashMap<&str, usize> = scenarios.iter().enumerate().map(|(i, s)| (*s, i)).collect();

        let mut rows: BTreeMap<i64, Vec<Option<f64>>> = BTreeMap::new();
        for traj in trajectories {
            let col = column[traj.scenario.as_str()];
            for p in &traj.points {
                let row = rows.entry(p.day).or_insert_with(|| vec![None; scenarios.len()]);
                let cell = &mut row[col];
                *cell = Some(cell.unwrap_or(0.0) + p.state.get(compartment));
            }
        }

        let (days, values): (Vec<i64>, Vec<Vec<Option<f64>>>) = rows.into_iter().unzip();
        Ok(CompartmentMatrix {
            compartment,
            days,
            scenarios: scenarios.into_iter().map(str::to_string).collect(),
            values,
        })
    }

    /// Matrices for each of `compartments` plus the duplicate warnings,
    /// which are reported once per scenario rather than once per matrix.
    pub fn aggregate_all(
        &self,
        trajectories: &[Trajectory],
        compartments: &[Compartment],
    ) -> Result<AggregatedResult, AggregationError> {
        let warnings = self.check_duplicates(trajectories)?;
        for w in &warnings {
            warn!(scenario = %w.scenario, duplicates = w.duplicates, first_day = w.first_day, "duplicate days summed");
        }
        let matrices = compartments
            .iter()
            .map(|&c| self.aggregate(trajectories, c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AggregatedResult { matrices, warnings })
    }
}

fn column_order(trajectories: &[Trajectory]) -> Vec<&str> {
    let mut order: Vec<&str> = Vec::with_capacity(trajectories.len());
    for traj in trajectories {
        if !order.contains(&traj.scenario.as_str()) {
            order.push(traj.scenario.as_str());
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::seir::{CompartmentState, TrajectoryPoint};

    fn traj(id: &str, days: &[i64]) -> Trajectory {
        let points = days
            .iter()
            .enumerate()
            .map(|(k, &day)| TrajectoryPoint {
                day,
                state: CompartmentState { s: 100.0 - k as f64, e: 0.5, i: k as f64 + 1.0, r: 0.0 },
            })
            .collect();
        Trajectory { scenario: id.to_string(), points }
    }

    #[test]
    fn one_column_per_scenario_one_row_per_day() {
        let trajs = vec![traj("B", &[0, 1, 2]), traj("A", &[0, 1, 2])];
        let m = ResultAggregator::default().aggregate(&trajs, Compartment::Infected).unwrap();
        assert_eq!(m.scenarios, vec!["B", "A"]);
        assert_eq!(m.days, vec![0, 1, 2]);
        assert_eq!(m.get(2, "A"), Some(3.0));
        assert_eq!(m.get(5, "A"), None);
    }

    #[test]
    fn missing_days_leave_empty_cells() {
        let trajs = vec![traj("A", &[0, 1, 3]), traj("B", &[0, 1, 2])];
        let m = ResultAggregator::default().aggregate(&trajs, Compartment::Exposed).unwrap();
        assert_eq!(m.days, vec![0, 1, 2, 3]);
        assert_eq!(m.values[2], vec![None, Some(0.5)]);
        assert_eq!(m.values[3], vec![Some(0.5), None]);
    }

    #[test]
    fn duplicate_days_are_summed_with_one_warning() {
        let trajs = vec![traj("A", &[0, 1, 1, 2, 2]), traj("B", &[0, 1, 2])];
        let result = ResultAggregator::new(DuplicatePolicy::Sum)
            .aggregate_all(&trajs, &Compartment::REPORTED)
            .unwrap();
        assert_eq!(
            result.warnings,
            vec![AggregationWarning { scenario: "A".into(), duplicates: 2, first_day: 1 }]
        );
        let infected = result.matrix(Compartment::Infected).unwrap();
        assert_eq!(infected.get(1, "A"), Some(2.0 + 3.0));
        assert_eq!(infected.get(2, "A"), Some(4.0 + 5.0));
        assert_eq!(result.matrices.len(), 3);
    }

    #[test]
    fn strict_policy_rejects_duplicates() {
        let trajs = vec![traj("A", &[0, 1, 1])];
        let err = ResultAggregator::new(DuplicatePolicy::Reject)
            .aggregate(&trajs, Compartment::Infected)
            .unwrap_err();
        assert_eq!(err, AggregationError { scenario: "A".into(), day: 1 });
    }
}
