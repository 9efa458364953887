// flowline/src/steps/connector.rs

//! Connector steps: they run once and carry no records.

use crate::core::context::StepContext;
use crate::core::control::Record;
use crate::core::step_type::{StepKind, StepRole, StepType};
use serde_json::Value;
use std::sync::Arc;

/// Does nothing once all its upstreams have finished. Useful purely for ordering
/// ("run after").
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConnector;

impl StepType for NoopConnector {
  fn kind(&self) -> StepKind {
    StepKind::Connector
  }

  fn role(&self) -> StepRole {
    StepRole::Action
  }

  fn execute(&self, ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    ctx.log().info("Connector reached.", &Value::Null);
    Ok(Some(record))
  }
}

/// Starts a run on demand. At most one trigger is allowed per dataflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualTrigger;

impl StepType for ManualTrigger {
  fn kind(&self) -> StepKind {
    StepKind::Connector
  }

  fn role(&self) -> StepRole {
    StepRole::Trigger
  }

  fn execute(&self, ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    ctx.log().info("Run triggered manually.", &Value::Null);
    Ok(Some(record))
  }
}

pub type ActionFn = Arc<dyn Fn(&StepContext) -> anyhow::Result<()> + Send + Sync>;

/// Connector running a closure once. Programmatic only.
#[derive(Clone)]
pub struct Action {
  f: ActionFn,
}

impl Action {
  pub fn new(f: impl Fn(&StepContext) -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
    Self { f: Arc::new(f) }
  }
}

impl StepType for Action {
  fn kind(&self) -> StepKind {
    StepKind::Connector
  }

  fn role(&self) -> StepRole {
    StepRole::Action
  }

  fn execute(&self, ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    (self.f)(ctx)?;
    Ok(Some(record))
  }
}
