pub mod counting;
pub mod environment;
pub mod pacer;
pub mod winners;

pub use counting::CountingEnvironment;
pub use environment::{Environment, EnvironmentError, Observations, Seat, StepOutcome};
pub use pacer::Pacer;
