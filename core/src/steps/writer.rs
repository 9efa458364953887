// flowline/src/steps/writer.rs

use crate::core::context::StepContext;
use crate::core::control::Record;
use crate::core::step_type::{StepKind, StepRole, StepType};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

/// Destination buffer of an [`ArrayWriter`]. Cloning shares the buffer, so the
/// caller keeps a handle to read what the writer collected.
///
/// Only the owning writer's `execute` appends to it during a run.
#[derive(Debug, Clone, Default)]
pub struct Output(Arc<Mutex<Vec<Record>>>);

impl Output {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, record: Record) {
    self.0.lock().push(record);
  }

  pub fn snapshot(&self) -> Vec<Record> {
    self.0.lock().clone()
  }

  pub fn len(&self) -> usize {
    self.0.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.lock().is_empty()
  }

  pub fn clear(&self) {
    self.0.lock().clear();
  }
}

/// Flow writer collecting every record it sees, then passing it on.
#[derive(Debug, Clone, Default)]
pub struct ArrayWriter {
  output: Output,
}

impl ArrayWriter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_output(output: Output) -> Self {
    Self { output }
  }

  pub fn output(&self) -> &Output {
    &self.output
  }
}

impl StepType for ArrayWriter {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Writer
  }

  fn execute(&self, ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    if ctx.is_dry_run() {
      ctx.log().debug("Dry run, record not written.", &json!({ "record": &record }));
    } else {
      self.output.push(record.clone());
    }
    Ok(Some(record))
  }
}
