// flowline/src/core/step_type.rs

//! The contract every pluggable step type implements.

use crate::core::context::StepContext;
use crate::core::control::Record;
use crate::error::{FlowError, FlowResult};
use crate::iterator::{FlowIterator, IteratorWiring, StepIterator};
use std::ops::RangeInclusive;

/// Whether a step takes part in the per-record pull chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
  Flow,
  /// Gates or triggers execution; executes once, carries no records.
  Connector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepRole {
  /// Produces records; no flow inputs.
  Reader,
  Transformer,
  Writer,
  /// Initiates a run; no inputs at all.
  Trigger,
  /// One-shot connector side effect ("run after").
  Action,
}

pub const UNBOUNDED: usize = usize::MAX;

/// Declared arity of a step type, split by link kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ports {
  pub inputs_flow: RangeInclusive<usize>,
  pub inputs_connector: RangeInclusive<usize>,
  pub outputs_flow: RangeInclusive<usize>,
  pub outputs_connector: RangeInclusive<usize>,
}

impl Ports {
  pub fn reader() -> Self {
    Self {
      inputs_flow: 0..=0,
      inputs_connector: 0..=UNBOUNDED,
      outputs_flow: 0..=1,
      outputs_connector: 0..=UNBOUNDED,
    }
  }

  pub fn transformer() -> Self {
    Self {
      inputs_flow: 1..=1,
      inputs_connector: 0..=UNBOUNDED,
      outputs_flow: 0..=1,
      outputs_connector: 0..=UNBOUNDED,
    }
  }

  pub fn connector() -> Self {
    Self {
      inputs_flow: 0..=0,
      inputs_connector: 0..=UNBOUNDED,
      outputs_flow: 0..=0,
      outputs_connector: 0..=UNBOUNDED,
    }
  }

  pub fn trigger() -> Self {
    Self {
      inputs_flow: 0..=0,
      inputs_connector: 0..=0,
      outputs_flow: 0..=0,
      outputs_connector: 0..=UNBOUNDED,
    }
  }

  pub fn for_role(kind: StepKind, role: StepRole) -> Self {
    match (kind, role) {
      (_, StepRole::Trigger) => Self::trigger(),
      (StepKind::Connector, _) => Self::connector(),
      (StepKind::Flow, StepRole::Reader) => Self::reader(),
      (StepKind::Flow, _) => Self::transformer(),
    }
  }

  pub fn with_inputs_flow(mut self, range: RangeInclusive<usize>) -> Self {
    self.inputs_flow = range;
    self
  }

  pub fn with_outputs_flow(mut self, range: RangeInclusive<usize>) -> Self {
    self.outputs_flow = range;
    self
  }

  pub fn with_inputs_connector(mut self, range: RangeInclusive<usize>) -> Self {
    self.inputs_connector = range;
    self
  }

  pub fn with_outputs_connector(mut self, range: RangeInclusive<usize>) -> Self {
    self.outputs_connector = range;
    self
  }
}

/// A foreign "has more / current / advance" cursor (an in-memory sequence, a
/// database result set) that a producing iterator adapts.
pub trait Cursor: Send {
  fn has_more(&self) -> bool;
  fn current(&self) -> Option<Record>;
  fn advance(&mut self) -> anyhow::Result<()>;
}

/// Behaviour bound to a step definition.
///
/// Implementations hold no per-run state that the engine depends on; anything a
/// step needs at run time comes through its [`StepContext`].
pub trait StepType: Send + Sync + 'static {
  fn kind(&self) -> StepKind;

  fn role(&self) -> StepRole;

  fn ports(&self) -> Ports {
    Ports::for_role(self.kind(), self.role())
  }

  /// True when this type's iterator generates values itself instead of relaying
  /// a pulled upstream value.
  fn has_producing_iterator(&self) -> bool {
    self.kind() == StepKind::Flow && self.role() == StepRole::Reader
  }

  /// True when the step hands each flow downstream its own buffered copy of every value.
  fn fans_out(&self) -> bool {
    false
  }

  /// Transforms one record. `Ok(None)` declines the record: it is logged as a
  /// no-op and does not abort. Connector steps are executed once with `Record::Null`.
  fn execute(&self, _ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    Ok(Some(record))
  }

  /// Source cursor for producing steps.
  fn open_cursor(&self, _ctx: &StepContext) -> FlowResult<Option<Box<dyn Cursor>>> {
    Ok(None)
  }

  /// Builds the iterator the engine step will own. Producing types wrap their
  /// cursor; everything else relays its single upstream.
  fn get_iterator(&self, wiring: IteratorWiring) -> FlowResult<Box<dyn FlowIterator>> {
    if self.has_producing_iterator() {
      let cursor = self
        .open_cursor(wiring.step())?
        .ok_or_else(|| FlowError::NullInput {
          step_id: wiring.step().id().to_string(),
        })?;
      Ok(Box::new(StepIterator::over_cursor(wiring, cursor)))
    } else {
      Ok(Box::new(StepIterator::over_upstream(wiring)?))
    }
  }
}
