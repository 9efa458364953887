pub mod context;
pub mod control;
pub mod run_state;
pub mod status;
pub mod step;
pub mod step_type;

pub use context::{StepContext, StepLog};
pub use control::{Fetch, Pull, Record, RunSummary};
pub use run_state::{AbortHandle, RunFailure, RunState};
pub use status::{EngineStatus, StepStatus};
pub use step::{Dataflow, StepDefinition};
pub use step_type::{Cursor, Ports, StepKind, StepRole, StepType, UNBOUNDED};
