// flowline/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

use crate::core::status::EngineStatus;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Step '{step_id}' depends on unknown step '{dependency}'")]
  UnknownDependency { step_id: String, dependency: String },

  #[error("Step '{step_id}' has unknown step type '{step_type}'")]
  UnknownStepType { step_id: String, step_type: String },

  #[error("Step id '{step_id}' is defined more than once")]
  DuplicateStep { step_id: String },

  #[error("A dataflow may contain at most one trigger, found {}: {}", .triggers.len(), .triggers.join(", "))]
  TooManyTriggers { triggers: Vec<String> },

  #[error("Step '{step_id}' mixes flow and connector links on its {port}")]
  MixedLinkKinds { step_id: String, port: &'static str },

  #[error("Step '{step_id}' has {actual} {port} link(s), expected between {min} and {max}")]
  ArityViolation {
    step_id: String,
    port: &'static str,
    actual: usize,
    min: usize,
    max: usize,
  },

  #[error("Dataflow is not a DAG, cycle found: {}", .cycle.join(" -> "))]
  NotADag { cycle: Vec<String> },

  #[error("Bad engine status for {operation}: expected {expected}, found {found}")]
  BadStatus {
    operation: &'static str,
    expected: String,
    found: EngineStatus,
  },

  #[error("Cannot change status to {attempted} after the run has concluded ({current})")]
  ChangeStateAfterConcluded {
    current: EngineStatus,
    attempted: EngineStatus,
  },

  #[error("Cannot build an iterator for step '{step_id}' without an input")]
  NullInput { step_id: String },

  #[error("Step '{step_id}' failed. Source: {source}")]
  StepFailed {
    step_id: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Run aborted{}: {reason}", .step_id.as_deref().map(|s| format!(" at step '{s}'")).unwrap_or_default())]
  Aborted { step_id: Option<String>, reason: String },

  #[error("Run stalled after {ticks} tick(s), unfinished sinks: {}", .pending.join(", "))]
  Stalled { ticks: u64, pending: Vec<String> },

  #[error("Configuration error for step '{step_id}': {message}")]
  Configuration { step_id: String, message: String },

  #[error("Internal flowline error: {0}")]
  Internal(String),
}

impl FlowError {
  /// Id of the step the error is attributed to, if any.
  pub fn step_id(&self) -> Option<&str> {
    match self {
      FlowError::UnknownDependency { step_id, .. }
      | FlowError::UnknownStepType { step_id, .. }
      | FlowError::DuplicateStep { step_id }
      | FlowError::MixedLinkKinds { step_id, .. }
      | FlowError::ArityViolation { step_id, .. }
      | FlowError::NullInput { step_id }
      | FlowError::StepFailed { step_id, .. }
      | FlowError::Configuration { step_id, .. } => Some(step_id),
      FlowError::Aborted { step_id, .. } => step_id.as_deref(),
      _ => None,
    }
  }

  /// True for the errors raised while validating the graph, before any run starts.
  pub fn is_construction_error(&self) -> bool {
    matches!(
      self,
      FlowError::UnknownDependency { .. }
        | FlowError::UnknownStepType { .. }
        | FlowError::DuplicateStep { .. }
        | FlowError::TooManyTriggers { .. }
        | FlowError::MixedLinkKinds { .. }
        | FlowError::ArityViolation { .. }
        | FlowError::NotADag { .. }
    )
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
