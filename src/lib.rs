pub mod aggregate;
pub mod batch;
pub mod config;
pub mod error;
pub mod io;
pub mod math;
pub mod model;

pub use aggregate::{AggregatedResult, CompartmentMatrix, DuplicatePolicy, ResultAggregator};
pub use batch::{BatchOutcome, BatchRunner, ScenarioFailure};
pub use config::RunConfig;
pub use error::{AggregationError, AggregationWarning, ConfigError, ScenarioError, SimulationError};
pub use model::scenario::ScenarioParameters;
pub use model::seir::{integrate, Compartment, CompartmentState, IntegratorSettings, SolverKind, Trajectory};
