// flowline/src/steps/reader.rs

use crate::core::context::StepContext;
use crate::core::control::Record;
use crate::core::step::StepDefinition;
use crate::core::step_type::{Cursor, StepKind, StepRole, StepType};
use crate::error::{FlowError, FlowResult};
use crate::iterator::VecCursor;
use serde_json::{json, Value};

/// Flow reader emitting a fixed sequence of records.
///
/// Built from config as `{"values": [...]}`. Without values there is nothing to
/// iterate and initialisation fails with `NullInput`.
#[derive(Debug, Clone, Default)]
pub struct ArrayReader {
  values: Option<Vec<Record>>,
}

impl ArrayReader {
  pub fn new(values: impl IntoIterator<Item = Record>) -> Self {
    Self {
      values: Some(values.into_iter().collect()),
    }
  }

  pub fn from_definition(definition: &StepDefinition) -> FlowResult<Self> {
    match definition.config.get("values") {
      None | Some(Value::Null) => Ok(Self { values: None }),
      Some(Value::Array(values)) => Ok(Self {
        values: Some(values.clone()),
      }),
      Some(other) => Err(FlowError::Configuration {
        step_id: definition.id.clone(),
        message: format!("'values' must be an array, got {other}"),
      }),
    }
  }
}

impl StepType for ArrayReader {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Reader
  }

  fn open_cursor(&self, ctx: &StepContext) -> FlowResult<Option<Box<dyn Cursor>>> {
    Ok(self.values.as_ref().map(|values| {
      ctx.log().debug("Opening array cursor.", &json!({ "count": values.len() }));
      Box::new(VecCursor::new(values.iter().cloned())) as Box<dyn Cursor>
    }))
  }
}
