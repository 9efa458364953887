// tests/registry_tests.rs
mod common;

use common::*;
use flowline::{
  Dataflow, Engine, FlowError, Output, Passthrough, Record, StepContext, StepDefinition, StepKind, StepRegistry,
  StepRole, StepType,
};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_builtins_are_registered() {
  let registry = StepRegistry::with_builtins();
  assert_eq!(
    registry.names(),
    vec![
      "connector_noop",
      "flow_clone",
      "flow_filter",
      "flow_passthrough",
      "flow_zipper",
      "reader_array",
      "trigger_manual",
      "writer_array",
    ]
  );
  assert!(!StepRegistry::new().contains("reader_array"));
}

#[test]
fn test_resolve_unknown_type() {
  let registry = StepRegistry::new();
  let err = registry.resolve(&StepDefinition::new("x", "nope")).err().expect("unknown type");
  assert!(matches!(err, FlowError::UnknownStepType { .. }));
  assert!(err.is_construction_error());
}

#[test]
fn test_registration_replaces_previous_constructor() {
  let registry = StepRegistry::with_builtins();
  let resolved = registry.resolve(&StepDefinition::new("c", "flow_clone")).unwrap();
  assert!(resolved.fans_out());

  registry.register_instance("flow_clone", Arc::new(Passthrough));
  let resolved = registry.resolve(&StepDefinition::new("c", "flow_clone")).unwrap();
  assert!(!resolved.fans_out());
}

#[test]
fn test_reader_config_must_be_an_array() {
  let registry = StepRegistry::with_builtins();
  let def = StepDefinition::new("reader", "reader_array").config(json!({ "values": "not a list" }));

  match registry.resolve(&def).err() {
    Some(FlowError::Configuration { step_id, message }) => {
      assert_eq!(step_id, "reader");
      assert!(message.contains("'values'"));
    }
    other => panic!("Expected Configuration, got {:?}", other),
  }
}

#[test]
fn test_filter_config_requires_equals() {
  let registry = StepRegistry::with_builtins();
  let def = StepDefinition::new("f", "flow_filter").config(json!({ "field": "n" }));
  assert!(matches!(registry.resolve(&def).err(), Some(FlowError::Configuration { .. })));
}

#[test]
fn test_builtin_roles_and_kinds() {
  let registry = StepRegistry::with_builtins();
  let kinds: Vec<(StepKind, StepRole)> = ["trigger_manual", "connector_noop", "flow_zipper"]
    .iter()
    .map(|name| {
      let t = registry.resolve(&StepDefinition::new("s", *name)).unwrap();
      (t.kind(), t.role())
    })
    .collect();
  assert_eq!(
    kinds,
    vec![
      (StepKind::Connector, StepRole::Trigger),
      (StepKind::Connector, StepRole::Action),
      (StepKind::Flow, StepRole::Transformer),
    ]
  );
}

/// Multiplies numbers by the `factor` read from its step config.
struct Scale;

impl StepType for Scale {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Transformer
  }

  fn execute(&self, ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    let factor: i64 = ctx.config_value("factor")?.unwrap_or(1);
    Ok(record.as_i64().map(|n| json!(n * factor)))
  }
}

#[test]
fn test_custom_step_type_reads_its_config() {
  setup_tracing();
  let out = Output::new();
  let registry = registry_with_outputs(&[("writer", out.clone())]);
  registry.register_instance("scale", Arc::new(Scale));
  let dataflow = Dataflow::new("scaled")
    .step(reader_def("reader", vec![json!(1), json!("skip me"), json!(3)]))
    .step(
      StepDefinition::new("scale", "scale")
        .config(json!({ "factor": 10 }))
        .depends_on(["reader"]),
    )
    .step(StepDefinition::new("writer", "writer_array").depends_on(["scale"]));

  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  engine.initialise().unwrap();
  engine.execute().unwrap();

  assert_eq!(out.snapshot(), vec![json!(10), json!(30)]);
}

#[test]
fn test_bad_config_value_fails_the_step() {
  setup_tracing();
  let registry = registry_with_outputs(&[]);
  registry.register_instance("scale", Arc::new(Scale));
  let dataflow = Dataflow::new("bad-factor")
    .step(reader_def("reader", numbers(1..=2)))
    .step(
      StepDefinition::new("scale", "scale")
        .config(json!({ "factor": "ten" }))
        .depends_on(["reader"]),
    );

  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  engine.initialise().unwrap();
  let err = engine.execute().unwrap_err();

  assert_eq!(err.step_id(), Some("scale"));
  assert!(matches!(err, FlowError::StepFailed { .. }));
  assert!(engine.failure().unwrap().message.contains("invalid 'factor'"));
}
