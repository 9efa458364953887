// flowline/src/core/step.rs

//! Static description of a dataflow: its steps and their declared dependencies.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Definition of a single dataflow step.
///
/// Immutable for the duration of a run; the engine only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
  pub id: String,
  /// Human readable name; defaults to the id.
  #[serde(default)]
  pub alias: String,
  /// Name the step type is registered under.
  #[serde(rename = "type")]
  pub step_type: String,
  #[serde(default)]
  pub config: Value,
  /// Ids of the steps this one depends on, in declaration order.
  #[serde(default, rename = "dependson")]
  pub depends_on: Vec<String>,
}

impl StepDefinition {
  pub fn new(id: impl Into<String>, step_type: impl Into<String>) -> Self {
    let id = id.into();
    Self {
      alias: id.clone(),
      id,
      step_type: step_type.into(),
      config: Value::Null,
      depends_on: Vec::new(),
    }
  }

  pub fn alias(mut self, alias: impl Into<String>) -> Self {
    self.alias = alias.into();
    self
  }

  pub fn config(mut self, config: Value) -> Self {
    self.config = config;
    self
  }

  pub fn depends_on<I, S>(mut self, ids: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.depends_on.extend(ids.into_iter().map(Into::into));
    self
  }

  pub fn dependencies(&self) -> &[String] {
    &self.depends_on
  }

  pub fn display_name(&self) -> &str {
    if self.alias.is_empty() {
      &self.id
    } else {
      &self.alias
    }
  }
}

/// A named graph of step definitions, ordered by declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataflow {
  pub name: String,
  #[serde(with = "step_list")]
  pub steps: IndexMap<String, StepDefinition>,
  /// Definitions whose id was already taken, kept so validation can report them.
  #[serde(skip)]
  pub(crate) duplicates: Vec<String>,
}

impl Dataflow {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      steps: IndexMap::new(),
      duplicates: Vec::new(),
    }
  }

  /// Adds a step. A second definition with an existing id is rejected when the
  /// engine is built.
  pub fn step(mut self, definition: StepDefinition) -> Self {
    self.add_step(definition);
    self
  }

  pub fn add_step(&mut self, definition: StepDefinition) {
    if self.steps.contains_key(&definition.id) {
      self.duplicates.push(definition.id);
      return;
    }
    self.steps.insert(definition.id.clone(), definition);
  }

  pub fn get(&self, id: &str) -> Option<&StepDefinition> {
    self.steps.get(id)
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

// Steps are (de)serialized as a plain list; the map is keyed by each step's id.
mod step_list {
  use super::StepDefinition;
  use indexmap::IndexMap;
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  pub fn serialize<S: Serializer>(steps: &IndexMap<String, StepDefinition>, s: S) -> Result<S::Ok, S::Error> {
    let list: Vec<&StepDefinition> = steps.values().collect();
    list.serialize(s)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<IndexMap<String, StepDefinition>, D::Error> {
    let list = Vec::<StepDefinition>::deserialize(d)?;
    let mut steps = IndexMap::with_capacity(list.len());
    for mut def in list {
      if def.alias.is_empty() {
        def.alias = def.id.clone();
      }
      if steps.contains_key(&def.id) {
        return Err(serde::de::Error::custom(format!("duplicate step id '{}'", def.id)));
      }
      steps.insert(def.id.clone(), def);
    }
    Ok(steps)
  }
}
