mod gate;
mod iteration;
mod pacer;
mod progress;
mod run;
mod schedule;

pub use gate::IterationGate;
pub use iteration::IterationContext;
pub use pacer::ArrivalPacer;
pub use progress::{ProgressFn, ProgressUpdate, ScenarioProgress, StageProgress};
pub use run::{RunTiming, run_scenario};
pub use schedule::{RampingU64Schedule, StageSnapshot};
