pub mod definition;
pub mod engine_step;
pub mod execution;
pub mod flow_cap;
pub mod graph;
pub mod recorder;

pub use definition::{Engine, EngineBuilder, EngineOptions};
pub use engine_step::EngineStep;
pub use flow_cap::FlowCap;
pub use recorder::{InMemoryRecorder, NoopRecorder, RunRecord, RunRecorder};
