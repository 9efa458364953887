// flowline/src/core/status.rs

//! Status state machines for the engine and for each engine step.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Run-level status of an [`Engine`](crate::Engine).
///
/// Forward-only: `New → Initialised → Processing → Flowing → Finished → Finalised`.
/// `Aborted` is reachable from any non-terminal state (a finished run included),
/// `Cancelled` only before processing begins. `Finalised` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
  New,
  Initialised,
  Processing,
  Flowing,
  Finished,
  Finalised,
  Aborted,
  Cancelled,
}

impl EngineStatus {
  /// The run has ended one way or another; only finalisation may follow.
  pub fn is_concluded(self) -> bool {
    matches!(
      self,
      EngineStatus::Finished | EngineStatus::Finalised | EngineStatus::Aborted | EngineStatus::Cancelled
    )
  }

  pub fn is_terminal(self) -> bool {
    self == EngineStatus::Finalised
  }

  pub fn can_transition_to(self, next: EngineStatus) -> bool {
    use EngineStatus::*;
    match (self, next) {
      (Finalised, _) => false,
      (New, Initialised) => true,
      (Initialised, Processing) => true,
      (Processing, Flowing) | (Processing, Finished) => true,
      (Flowing, Finished) => true,
      (Finished, Finalised) | (Aborted, Finalised) | (Cancelled, Finalised) => true,
      (New, Cancelled) | (Initialised, Cancelled) => true,
      (Aborted, Aborted) => false,
      (_, Aborted) => true,
      _ => false,
    }
  }
}

impl fmt::Display for EngineStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      EngineStatus::New => "NEW",
      EngineStatus::Initialised => "INITIALISED",
      EngineStatus::Processing => "PROCESSING",
      EngineStatus::Flowing => "FLOWING",
      EngineStatus::Finished => "FINISHED",
      EngineStatus::Finalised => "FINALISED",
      EngineStatus::Aborted => "ABORTED",
      EngineStatus::Cancelled => "CANCELLED",
    };
    f.write_str(label)
  }
}

/// Status of a single engine step within a run.
///
/// `New → Initialised → (Processing ⇄ Waiting/Blocked) → Finished`, or `Aborted`
/// when the run is aborted before the step finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
  New,
  Initialised,
  Processing,
  /// Yielded a value and is waiting to be pulled again.
  Waiting,
  /// Cannot proceed until its connector upstreams finish.
  Blocked,
  Finished,
  Aborted,
}

impl StepStatus {
  pub fn is_done(self) -> bool {
    matches!(self, StepStatus::Finished | StepStatus::Aborted)
  }
}

impl fmt::Display for StepStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      StepStatus::New => "NEW",
      StepStatus::Initialised => "INITIALISED",
      StepStatus::Processing => "PROCESSING",
      StepStatus::Waiting => "WAITING",
      StepStatus::Blocked => "BLOCKED",
      StepStatus::Finished => "FINISHED",
      StepStatus::Aborted => "ABORTED",
    };
    f.write_str(label)
  }
}
