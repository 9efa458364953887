// src/lib.rs

//! Flowline: a pull-based dataflow engine.
//!
//! A dataflow is a directed acyclic graph of named steps. Each step is bound to a
//! pluggable step type and is either a *flow* step, which streams records one at
//! a time, or a *connector* step, which executes once and only gates ordering.
//!
//! Execution is single-threaded and cooperative. Every flow step owns one
//! iterator; calling `next()` on it pulls its upstream first, so records move
//! only when a sink asks for them. The engine drives connector sinks directly and
//! attaches a flow cap to every flow sink to drain it.
//!
//!  - `StepRegistry` resolves each definition's `type` to a `StepType`.
//!  - `Engine::builder(..).build()` validates the graph (acyclic, arity, link kinds).
//!  - `initialise`, `execute`, `finalise` walk the run lifecycle.
//!  - Any step failure aborts the whole run.

pub mod core;
pub mod engine;
pub mod error;
pub mod iterator;
pub mod registry;
pub mod steps;

// --- Re-exports for the Public API ---

pub use crate::core::context::{StepContext, StepLog};
pub use crate::core::control::{Fetch, Pull, Record, RunSummary};
pub use crate::core::run_state::{AbortHandle, RunFailure};
pub use crate::core::status::{EngineStatus, StepStatus};
pub use crate::core::step::{Dataflow, StepDefinition};
pub use crate::core::step_type::{Cursor, Ports, StepKind, StepRole, StepType, UNBOUNDED};

pub use crate::engine::{Engine, EngineBuilder, EngineOptions, InMemoryRecorder, NoopRecorder, RunRecord, RunRecorder};

pub use crate::iterator::{FlowIterator, IterHandle, IteratorWiring, StepIterator};

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::StepRegistry;

pub use crate::steps::{
  Action, ArrayReader, ArrayWriter, Filter, Fork, ManualTrigger, Map, NoopConnector, Output, Passthrough, Zipper,
};
