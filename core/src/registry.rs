// flowline/src/registry.rs

//! Defines `StepRegistry`, the name-keyed table that resolves a step definition's
//! declared type to a constructible `StepType`.

use crate::core::step::StepDefinition;
use crate::core::step_type::StepType;
use crate::error::{FlowError, FlowResult};
use crate::steps;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Builds a step type for one definition (typically from its `config`).
pub type StepTypeFactory = Arc<dyn Fn(&StepDefinition) -> FlowResult<Arc<dyn StepType>> + Send + Sync>;

/// Registry of step types by name.
pub struct StepRegistry {
  factories: RwLock<HashMap<String, StepTypeFactory>>,
}

impl StepRegistry {
  /// Creates a new, empty registry.
  pub fn new() -> Self {
    Self {
      factories: RwLock::new(HashMap::new()),
    }
  }

  /// A registry pre-loaded with every built-in step type.
  pub fn with_builtins() -> Self {
    let registry = Self::new();
    steps::register_builtins(&registry);
    registry
  }

  /// Registers (or replaces) the factory for `name`.
  pub fn register<F>(&self, name: impl Into<String>, factory: F)
  where
    F: Fn(&StepDefinition) -> FlowResult<Arc<dyn StepType>> + Send + Sync + 'static,
  {
    let name = name.into();
    event!(Level::DEBUG, step_type = %name, "Registering step type.");
    self.factories.write().insert(name, Arc::new(factory));
  }

  /// Registers one shared instance, handed to every definition of that type.
  pub fn register_instance(&self, name: impl Into<String>, step_type: Arc<dyn StepType>) {
    self.register(name, move |_| Ok(Arc::clone(&step_type)));
  }

  pub fn contains(&self, name: &str) -> bool {
    self.factories.read().contains_key(name)
  }

  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
    names.sort();
    names
  }

  /// Resolves the step type declared by `definition`.
  #[instrument(name = "StepRegistry::resolve", skip_all, fields(step_id = %definition.id, step_type = %definition.step_type), err(Display))]
  pub fn resolve(&self, definition: &StepDefinition) -> FlowResult<Arc<dyn StepType>> {
    // The lock must not be held while the factory runs.
    let factory = self
      .factories
      .read()
      .get(&definition.step_type)
      .cloned()
      .ok_or_else(|| FlowError::UnknownStepType {
        step_id: definition.id.clone(),
        step_type: definition.step_type.clone(),
      })?;
    factory(definition)
  }
}

impl Default for StepRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for StepRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepRegistry").field("step_types", &self.names()).finish()
  }
}
