// flowline/src/steps/transform.rs

//! Built-in flow transformers: relay, filter, map, fan-out and merge.

use crate::core::context::StepContext;
use crate::core::control::Record;
use crate::core::step::StepDefinition;
use crate::core::step_type::{Ports, StepKind, StepRole, StepType, UNBOUNDED};
use crate::error::{FlowError, FlowResult};
use crate::iterator::{FlowIterator, IteratorWiring, MergeSource, StepIterator};
use serde_json::Value;
use std::sync::Arc;

/// Relays every record unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl StepType for Passthrough {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Transformer
  }
}

pub type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Drops records for which the predicate is false.
#[derive(Clone)]
pub struct Filter {
  predicate: Predicate,
}

impl Filter {
  pub fn new(predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
    Self {
      predicate: Arc::new(predicate),
    }
  }

  /// Config: `{"equals": value}` compares the whole record, adding `"field": name`
  /// compares that field of an object record.
  pub fn from_definition(definition: &StepDefinition) -> FlowResult<Self> {
    let expected = definition
      .config
      .get("equals")
      .cloned()
      .ok_or_else(|| FlowError::Configuration {
        step_id: definition.id.clone(),
        message: "missing 'equals'".to_string(),
      })?;
    let field = match definition.config.get("field") {
      None | Some(Value::Null) => None,
      Some(Value::String(name)) => Some(name.clone()),
      Some(other) => {
        return Err(FlowError::Configuration {
          step_id: definition.id.clone(),
          message: format!("'field' must be a string, got {other}"),
        })
      }
    };
    Ok(Self::new(move |record| match &field {
      Some(name) => record.get(name) == Some(&expected),
      None => record == &expected,
    }))
  }
}

impl StepType for Filter {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Transformer
  }

  fn execute(&self, _ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    Ok((self.predicate)(&record).then_some(record))
  }
}

pub type MapFn = Arc<dyn Fn(Record) -> anyhow::Result<Record> + Send + Sync>;

/// Applies a function to every record. Programmatic only.
#[derive(Clone)]
pub struct Map {
  f: MapFn,
}

impl Map {
  pub fn new(f: impl Fn(Record) -> anyhow::Result<Record> + Send + Sync + 'static) -> Self {
    Self { f: Arc::new(f) }
  }
}

impl StepType for Map {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Transformer
  }

  fn execute(&self, _ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    (self.f)(record).map(Some)
  }
}

/// Cloning fan-out: every flow downstream receives its own copy of each record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fork;

impl StepType for Fork {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Transformer
  }

  fn ports(&self) -> Ports {
    Ports::transformer().with_outputs_flow(1..=UNBOUNDED)
  }

  fn fans_out(&self) -> bool {
    true
  }
}

/// Alternating merge of two or more inputs, in dependency declaration order.
/// Once an input runs dry the rest keep alternating among themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zipper;

impl StepType for Zipper {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Transformer
  }

  fn ports(&self) -> Ports {
    Ports::transformer().with_inputs_flow(2..=UNBOUNDED)
  }

  fn get_iterator(&self, wiring: IteratorWiring) -> FlowResult<Box<dyn FlowIterator>> {
    let source = MergeSource::new(wiring.step().id(), wiring.upstreams().to_vec())?;
    Ok(Box::new(StepIterator::with_source(wiring, source)))
  }
}
