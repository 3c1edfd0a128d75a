use seir_projection::io::debug_log::{
    render_trajectory_debug_log, write_trajectory_debug_log, write_trajectory_debug_logs,
};
use seir_projection::model::seir::{CompartmentState, TrajectoryPoint};
use seir_projection::{integrate, BatchRunner, IntegratorSettings, ScenarioParameters, Trajectory};

fn small_scenario() -> ScenarioParameters {
    ScenarioParameters::new("TEST-SMALL", 1000.0, 10.0, 0.5, 0.25, 0.75).with_intervention(0.25, 3, 2)
}

fn point(day: i64, s: f64, e: f64, i: f64, r: f64) -> TrajectoryPoint {
    TrajectoryPoint { day, state: CompartmentState { s, e, i, r } }
}

#[test]
fn seir_debug_log_snapshot_small() {
    let trajectory = Trajectory {
        scenario: "TEST-SMALL".into(),
        points: vec![
            point(0, 988.5, 1.5, 10.0, 0.0),
            point(1, 985.0, 3.25, 8.75, 3.0),
            point(2, 982.125, 4.5, 8.125, 5.25),
        ],
    };

    let s = render_trajectory_debug_log(&small_scenario(), &trajectory);
    insta::assert_snapshot!(s, @r"
    scenario=TEST-SMALL
    population=1000.000000
    initial_infected=10.000000
    gamma=0.500000
    sigma=0.250000
    beta_baseline=0.750000
    r0=1.500000
    intervention=beta 0.250000 over [2, 5]

    day,S,E,I,R,total
    0,988.500000,1.500000,10.000000,0.000000,1000.000000
    1,985.000000,3.250000,8.750000,3.000000,1000.000000
    2,982.125000,4.500000,8.125000,5.250000,1000.000000
    ");
}

#[test]
fn seir_debug_log_written_for_integrated_run() {
    let mut scenario = small_scenario().with_horizon(12);
    scenario.id = "zone 4/b".into();
    let trajectory = integrate(&scenario, &IntegratorSettings::default()).expect("integrate");

    let tmp = tempfile::tempdir().expect("tempdir");
    let path = write_trajectory_debug_log(tmp.path(), &scenario, &trajectory).expect("write debug log");
    assert_eq!(path.file_name().unwrap(), "seir_zone_4_b.txt");

    let s = std::fs::read_to_string(path).expect("read debug log");
    assert_eq!(s, render_trajectory_debug_log(&scenario, &trajectory));
    let rows: Vec<&str> = s.lines().skip_while(|l| !l.starts_with("day,")).skip(1).collect();
    assert_eq!(rows.len(), 12);
    assert!(rows[0].starts_with("0,"));
    assert!(rows[11].starts_with("11,"));
    assert!(rows.iter().all(|r| r.ends_with(",1000.000000")));
}

#[test]
fn seir_debug_logs_keep_ids_that_sanitize_alike() {
    let scenarios = vec![
        small_scenario().with_horizon(4),
        {
            let mut s = small_scenario().with_horizon(4);
            s.id = "a b".into();
            s
        },
        {
            let mut s = small_scenario().with_horizon(4);
            s.id = "a_b".into();
            s.initial_infected = 20.0;
            s
        },
    ];
    let outcome = BatchRunner::default().run(&scenarios);
    assert!(outcome.failures.is_empty());

    let tmp = tempfile::tempdir().expect("tempdir");
    let paths = write_trajectory_debug_logs(tmp.path(), &scenarios, &outcome.trajectories).expect("write debug logs");
    let names: Vec<_> = paths.iter().map(|p| p.file_name().unwrap().to_str().unwrap().to_string()).collect();
    assert_eq!(names, vec!["seir_TEST-SMALL.txt", "seir_a_b.txt", "seir_a_b_2.txt"]);

    let first = std::fs::read_to_string(&paths[1]).expect("read first log");
    let second = std::fs::read_to_string(&paths[2]).expect("read second log");
    assert!(first.starts_with("scenario=a b\n"));
    assert!(second.starts_with("scenario=a_b\n"));
}
