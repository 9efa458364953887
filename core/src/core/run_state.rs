// flowline/src/core/run_state.rs

use crate::core::status::EngineStatus;
use crate::error::{FlowError, FlowResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{event, Level};

/// Why a run was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
  /// The offending step, when the abort came from (or was attributed to) one.
  pub step_id: Option<String>,
  pub message: String,
}

#[derive(Debug)]
struct RunStateInner {
  status: EngineStatus,
  failure: Option<RunFailure>,
}

/// Run-scoped status shared by the engine, its steps and their iterators.
///
/// Cloning is cheap and yields a handle to the same state. Lock guards are held
/// only for the duration of a single read or transition.
#[derive(Debug, Clone)]
pub struct RunState(Arc<RwLock<RunStateInner>>);

impl RunState {
  pub(crate) fn new() -> Self {
    RunState(Arc::new(RwLock::new(RunStateInner {
      status: EngineStatus::New,
      failure: None,
    })))
  }

  pub fn status(&self) -> EngineStatus {
    self.0.read().status
  }

  pub fn is_aborted(&self) -> bool {
    self.0.read().status == EngineStatus::Aborted
  }

  pub fn failure(&self) -> Option<RunFailure> {
    self.0.read().failure.clone()
  }

  /// Moves the run to `next`, returning the previous status.
  pub(crate) fn transition(&self, next: EngineStatus) -> FlowResult<EngineStatus> {
    let mut guard = self.0.write();
    let current = guard.status;
    if current.is_terminal() {
      return Err(FlowError::ChangeStateAfterConcluded {
        current,
        attempted: next,
      });
    }
    if !current.can_transition_to(next) {
      return Err(FlowError::BadStatus {
        operation: "status change",
        expected: format!("a status that may move to {next}"),
        found: current,
      });
    }
    guard.status = next;
    event!(Level::DEBUG, from = %current, to = %next, "Engine status changed.");
    Ok(current)
  }

  /// Marks the run aborted and records the failure. Returns false when the run was
  /// already aborted or finalised, in which case nothing changes.
  pub(crate) fn abort(&self, step_id: Option<&str>, reason: &str) -> bool {
    let mut guard = self.0.write();
    if !guard.status.can_transition_to(EngineStatus::Aborted) {
      event!(
        Level::DEBUG,
        status = %guard.status,
        reason,
        "Abort ignored, run already aborted or finalised."
      );
      return false;
    }
    guard.status = EngineStatus::Aborted;
    guard.failure = Some(RunFailure {
      step_id: step_id.map(str::to_string),
      message: reason.to_string(),
    });
    event!(Level::WARN, step_id = step_id.unwrap_or("-"), reason, "Run aborted.");
    true
  }
}

/// Cloneable, thread-safe handle that lets the owning application force-terminate
/// a run (shutdown signal, watchdog). Iterators observe the abort at the top of
/// their next `next()` call and the driver on its next tick.
#[derive(Debug, Clone)]
pub struct AbortHandle(RunState);

impl AbortHandle {
  pub(crate) fn new(state: RunState) -> Self {
    AbortHandle(state)
  }

  /// Returns true if this call aborted the run.
  pub fn abort(&self, step_id: Option<&str>, reason: impl AsRef<str>) -> bool {
    self.0.abort(step_id, reason.as_ref())
  }

  pub fn is_aborted(&self) -> bool {
    self.0.is_aborted()
  }

  pub fn status(&self) -> EngineStatus {
    self.0.status()
  }
}
