use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::model::scenario::ScenarioParameters;
use crate::model::seir::Trajectory;

/// Plain-text dump of one scenario's parameters and daily compartments.
pub fn render_trajectory_debug_log(scenario: &ScenarioParameters, trajectory: &Trajectory) -> String {
    let mut out = String::new();
    // writes into a String cannot fail
    let _ = writeln!(out, "scenario={}", scenario.id);
    let _ = writeln!(out, "population={:.6}", scenario.population);
    let _ = writeln!(out, "initial_infected={:.6}", scenario.initial_infected);
    let _ = writeln!(out, "gamma={:.6}", scenario.gamma);
    let _ = writeln!(out, "sigma={:.6}", scenario.sigma);
    let _ = writeln!(out, "beta_baseline={:.6}", scenario.beta_baseline);
    let _ = writeln!(out, "r0={:.6}", scenario.r0());
    match scenario.intervention() {
        Ok(Some(iv)) => {
            let (lo, hi) = iv.window();
            let _ = writeln!(out, "intervention=beta {:.6} over [{}, {}]", iv.beta, lo, hi);
        }
        _ => {
            let _ = writeln!(out, "intervention=none");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "day,S,E,I,R,total");

    for p in &trajectory.points {
        let s = p.state;
        let _ = writeln!(out, "{},{:.6},{:.6},{:.6},{:.6},{:.6}", p.day, s.s, s.e, s.i, s.r, s.total());
    }
    out
}

/// Characters outside `[A-Za-z0-9_-]` become `_` so any id yields a valid
/// file name.
fn file_stem(id: &str) -> String {
    let safe_id: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("seir_{}", safe_id)
}

fn write_log(
    out_dir: &Path,
    stem: &str,
    scenario: &ScenarioParameters,
    trajectory: &Trajectory,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir).context("create logs dir failed")?;
    let path = out_dir.join(format!("{}.txt", stem));
    std::fs::write(&path, render_trajectory_debug_log(scenario, trajectory))
        .with_context(|| format!("write debug log file failed (path={:?})", path))?;
    Ok(path)
}

/// Write `seir_<id>.txt` into `out_dir`.
pub fn write_trajectory_debug_log(
    out_dir: impl AsRef<Path>,
    scenario: &ScenarioParameters,
    trajectory: &Trajectory,
) -> anyhow::Result<PathBuf> {
    write_log(out_dir.as_ref(), &file_stem(&scenario.id), scenario, trajectory)
}

/// Write one log per trajectory of a batch. When two ids sanitize to the
/// same name, the later one gets its batch index appended
/// (`seir_<id>_<index>.txt`) so no dump overwrites another.
pub fn write_trajectory_debug_logs(
    out_dir: impl AsRef<Path>,
    scenarios: &[ScenarioParameters],
    trajectories: &[Trajectory],
) -> anyhow::Result<Vec<PathBuf>> {
    let mut used = HashSet::with_capacity(trajectories.len());
    let mut paths = Vec::with_capacity(trajectories.len());
    for traj in trajectories {
        let Some(index) = scenarios.iter().position(|p| p.id == traj.scenario) else {
            continue;
        };
        let scenario = &scenarios[index];
        let mut stem = file_stem(&scenario.id);
        if !used.insert(stem.clone()) {
            stem = format!("{}_{}", stem, index);
            used.insert(stem.clone());
        }
        paths.push(write_log(out_dir.as_ref(), &stem, scenario, traj)?);
    }
    Ok(paths)
}
