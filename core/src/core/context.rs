// flowline/src/core/context.rs

//! Defines `StepContext`, the run-time view of one step that iterators and step
//! types share, and `StepLog`, its logger.

use crate::core::control::Record;
use crate::core::run_state::RunState;
use crate::core::status::{EngineStatus, StepStatus};
use crate::core::step::StepDefinition;
use crate::core::step_type::{StepKind, StepRole, StepType};
use crate::error::{FlowError, FlowResult};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{event, Level};

/// Per-run state of a step: identity, configuration, status and its step type.
///
/// Shared (`Arc`) between the engine step that owns it and the iterator that
/// executes it.
pub struct StepContext {
  id: String,
  alias: String,
  config: Value,
  step_type: Arc<dyn StepType>,
  status: Mutex<StepStatus>,
  run: RunState,
  dry_run: bool,
  executions: AtomicU64,
}

impl StepContext {
  pub(crate) fn new(definition: &StepDefinition, step_type: Arc<dyn StepType>, run: RunState, dry_run: bool) -> Self {
    Self {
      id: definition.id.clone(),
      alias: definition.display_name().to_string(),
      config: definition.config.clone(),
      step_type,
      status: Mutex::new(StepStatus::New),
      run,
      dry_run,
      executions: AtomicU64::new(0),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn alias(&self) -> &str {
    &self.alias
  }

  pub fn config(&self) -> &Value {
    &self.config
  }

  /// Reads and deserializes one key of the step's JSON config. A missing key is `Ok(None)`.
  pub fn config_value<T: DeserializeOwned>(&self, key: &str) -> FlowResult<Option<T>> {
    match self.config.get(key) {
      None | Some(Value::Null) => Ok(None),
      Some(raw) => serde_json::from_value(raw.clone())
        .map(Some)
        .map_err(|e| FlowError::Configuration {
          step_id: self.id.clone(),
          message: format!("invalid '{key}': {e}"),
        }),
    }
  }

  pub fn step_type(&self) -> &Arc<dyn StepType> {
    &self.step_type
  }

  pub fn kind(&self) -> StepKind {
    self.step_type.kind()
  }

  pub fn role(&self) -> StepRole {
    self.step_type.role()
  }

  pub fn is_dry_run(&self) -> bool {
    self.dry_run
  }

  pub fn status(&self) -> StepStatus {
    *self.status.lock()
  }

  pub fn is_finished(&self) -> bool {
    self.status() == StepStatus::Finished
  }

  pub fn run_status(&self) -> EngineStatus {
    self.run.status()
  }

  pub fn is_run_aborted(&self) -> bool {
    self.run.is_aborted()
  }

  /// Number of successful `execute` calls so far.
  pub fn executions(&self) -> u64 {
    self.executions.load(Ordering::Relaxed)
  }

  pub fn log(&self) -> StepLog<'_> {
    StepLog { step: self }
  }

  /// Finished and aborted are sticky; later updates are ignored.
  pub(crate) fn set_status(&self, next: StepStatus) {
    let mut guard = self.status.lock();
    if guard.is_done() || *guard == next {
      return;
    }
    event!(Level::TRACE, step_id = %self.id, from = %*guard, to = %next, "Step status changed.");
    *guard = next;
  }

  /// Runs the step type's `execute`, containing any failure: it is logged, the run
  /// is aborted and a `StepFailed` error is returned for the caller to propagate.
  pub(crate) fn execute(&self, record: Record) -> FlowResult<Option<Record>> {
    self.set_status(StepStatus::Processing);
    match self.step_type.execute(self, record) {
      Ok(Some(out)) => {
        self.executions.fetch_add(1, Ordering::Relaxed);
        self.set_status(StepStatus::Waiting);
        Ok(Some(out))
      }
      Ok(None) => {
        self.executions.fetch_add(1, Ordering::Relaxed);
        self.log().debug("Step declined the record, no-op.", &Value::Null);
        self.set_status(StepStatus::Waiting);
        Ok(None)
      }
      Err(e) => Err(self.fail(e)),
    }
  }

  /// Converts a failure inside this step into an engine-level abort.
  pub(crate) fn fail(&self, error: anyhow::Error) -> FlowError {
    let message = format!("{error:#}");
    self.log().error("Step execution failed.", &Value::String(message.clone()));
    self.set_status(StepStatus::Aborted);
    self.run.abort(Some(&self.id), &message);
    FlowError::StepFailed {
      step_id: self.id.clone(),
      source: error,
    }
  }
}

impl std::fmt::Debug for StepContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepContext")
      .field("id", &self.id)
      .field("alias", &self.alias)
      .field("kind", &self.kind())
      .field("role", &self.role())
      .field("status", &self.status())
      .field("dry_run", &self.dry_run)
      .finish()
  }
}

/// Step-scoped logger. Events go to whatever `tracing` subscriber the host installed.
pub struct StepLog<'a> {
  step: &'a StepContext,
}

impl StepLog<'_> {
  pub fn info(&self, message: &str, context: &Value) {
    event!(Level::INFO, step_id = %self.step.id, alias = %self.step.alias, context = %context, "{}", message);
  }

  pub fn debug(&self, message: &str, context: &Value) {
    event!(Level::DEBUG, step_id = %self.step.id, alias = %self.step.alias, context = %context, "{}", message);
  }

  pub fn error(&self, message: &str, context: &Value) {
    event!(Level::ERROR, step_id = %self.step.id, alias = %self.step.alias, context = %context, "{}", message);
  }
}
