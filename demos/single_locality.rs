use seir_projection::{BatchRunner, Compartment, IntegratorSettings, ResultAggregator, ScenarioParameters};

fn main() -> anyhow::Result<()> {
    // R0 = 3.0, 5-day incubation, 10-day infectious period
    let baseline = ScenarioParameters::new("baseline", 1_000_000.0, 10.0, 0.1, 0.2, 0.3).with_horizon(180);

    // beta drops to 0.1 over days 10..=40
    let mut lockdown = baseline.clone().with_intervention(0.1, 11, 29);
    lockdown.id = "lockdown".into();

    let outcome = BatchRunner::new(IntegratorSettings::default(), true).run(&[baseline, lockdown]);
    for failure in &outcome.failures {
        eprintln!("{}: {}", failure.scenario, failure.error);
    }

    let result = ResultAggregator::default().aggregate_all(&outcome.trajectories, &Compartment::REPORTED)?;
    let infected = result
        .matrix(Compartment::Infected)
        .ok_or_else(|| anyhow::anyhow!("no infected matrix"))?;

    print!("day");
    for s in &infected.scenarios {
        print!(",{}", s);
    }
    println!();
    for (day, row) in infected.days.iter().zip(&infected.values) {
        print!("{}", day);
        for v in row {
            print!(",{:.0}", v.unwrap_or(f64::NAN));
        }
        println!();
    }

    for traj in &outcome.trajectories {
        if let Some((day, peak)) = traj.peak(Compartment::Infected) {
            println!("{}: peak of {:.0} infected on day {}", traj.scenario, peak, day);
        }
    }

    Ok(())
}
