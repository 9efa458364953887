// flowline/src/steps/mod.rs

//! Built-in step types.

pub mod connector;
pub mod reader;
pub mod transform;
pub mod writer;

pub use connector::{Action, ManualTrigger, NoopConnector};
pub use reader::ArrayReader;
pub use transform::{Filter, Fork, Map, Passthrough, Zipper};
pub use writer::{ArrayWriter, Output};

use crate::core::step_type::StepType;
use crate::registry::StepRegistry;
use std::sync::Arc;

pub const READER_ARRAY: &str = "reader_array";
pub const WRITER_ARRAY: &str = "writer_array";
pub const FLOW_PASSTHROUGH: &str = "flow_passthrough";
pub const FLOW_FILTER: &str = "flow_filter";
pub const FLOW_CLONE: &str = "flow_clone";
pub const FLOW_ZIPPER: &str = "flow_zipper";
pub const CONNECTOR_NOOP: &str = "connector_noop";
pub const TRIGGER_MANUAL: &str = "trigger_manual";

pub(crate) fn register_builtins(registry: &StepRegistry) {
  registry.register(READER_ARRAY, |def| Ok(Arc::new(ArrayReader::from_definition(def)?) as Arc<dyn StepType>));
  registry.register(WRITER_ARRAY, |_| Ok(Arc::new(ArrayWriter::new()) as Arc<dyn StepType>));
  registry.register_instance(FLOW_PASSTHROUGH, Arc::new(Passthrough));
  registry.register(FLOW_FILTER, |def| Ok(Arc::new(Filter::from_definition(def)?) as Arc<dyn StepType>));
  registry.register_instance(FLOW_CLONE, Arc::new(Fork));
  registry.register_instance(FLOW_ZIPPER, Arc::new(Zipper));
  registry.register_instance(CONNECTOR_NOOP, Arc::new(NoopConnector));
  registry.register_instance(TRIGGER_MANUAL, Arc::new(ManualTrigger));
}
