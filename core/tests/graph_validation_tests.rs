// tests/graph_validation_tests.rs
mod common;

use common::*;
use flowline::{Dataflow, Engine, FlowError, StepDefinition, StepRegistry};

fn build_err(dataflow: &Dataflow) -> FlowError {
  let registry = StepRegistry::with_builtins();
  Engine::new(dataflow, &registry).expect_err("dataflow should be rejected")
}

#[test]
fn test_cycle_is_not_a_dag() {
  setup_tracing();
  let dataflow = Dataflow::new("cyclic")
    .step(StepDefinition::new("a", "flow_passthrough").depends_on(["b"]))
    .step(StepDefinition::new("b", "flow_passthrough").depends_on(["a"]));

  match build_err(&dataflow) {
    FlowError::NotADag { cycle } => assert_eq!(cycle, vec!["a", "b", "a"]),
    other => panic!("Expected NotADag, got {:?}", other),
  }
}

#[test]
fn test_self_dependency_is_not_a_dag() {
  setup_tracing();
  let dataflow = Dataflow::new("self")
    .step(reader_def("reader", numbers(1..=2)))
    .step(StepDefinition::new("loop", "flow_passthrough").depends_on(["loop"]));

  let err = build_err(&dataflow);
  assert!(matches!(err, FlowError::NotADag { ref cycle } if cycle == &vec!["loop".to_string(), "loop".to_string()]));
  assert!(err.is_construction_error());
}

#[test]
fn test_cycle_is_reported_before_arity() {
  setup_tracing();
  // The zipper also has too few inputs, but the cycle wins.
  let dataflow = Dataflow::new("cyclic-zip")
    .step(StepDefinition::new("zip", "flow_zipper").depends_on(["pass"]))
    .step(StepDefinition::new("pass", "flow_passthrough").depends_on(["zip"]));

  assert!(matches!(build_err(&dataflow), FlowError::NotADag { .. }));
}

#[test]
fn test_unknown_dependency() {
  setup_tracing();
  let dataflow = Dataflow::new("dangling-dep")
    .step(reader_def("reader", numbers(1..=2)))
    .step(StepDefinition::new("writer", "writer_array").depends_on(["ghost"]));

  match build_err(&dataflow) {
    FlowError::UnknownDependency { step_id, dependency } => {
      assert_eq!(step_id, "writer");
      assert_eq!(dependency, "ghost");
    }
    other => panic!("Expected UnknownDependency, got {:?}", other),
  }
}

#[test]
fn test_unknown_step_type() {
  setup_tracing();
  let dataflow = Dataflow::new("bad-type").step(StepDefinition::new("reader", "reader_sql"));

  match build_err(&dataflow) {
    FlowError::UnknownStepType { step_id, step_type } => {
      assert_eq!(step_id, "reader");
      assert_eq!(step_type, "reader_sql");
    }
    other => panic!("Expected UnknownStepType, got {:?}", other),
  }
}

#[test]
fn test_duplicate_step_id() {
  setup_tracing();
  let dataflow = Dataflow::new("dupes")
    .step(reader_def("reader", numbers(1..=2)))
    .step(reader_def("reader", numbers(3..=4)));

  assert_eq!(dataflow.len(), 1);
  match build_err(&dataflow) {
    FlowError::DuplicateStep { step_id } => assert_eq!(step_id, "reader"),
    other => panic!("Expected DuplicateStep, got {:?}", other),
  }
}

#[test]
fn test_duplicate_step_id_in_json_is_rejected() {
  let doc = serde_json::json!({
    "name": "dupes",
    "steps": [
      { "id": "reader", "type": "reader_array" },
      { "id": "reader", "type": "writer_array" }
    ]
  });
  let parsed: Result<Dataflow, _> = serde_json::from_value(doc);
  assert!(parsed.unwrap_err().to_string().contains("duplicate step id 'reader'"));
}

#[test]
fn test_more_than_one_trigger() {
  setup_tracing();
  let dataflow = Dataflow::new("two-triggers")
    .step(StepDefinition::new("t1", "trigger_manual"))
    .step(StepDefinition::new("t2", "trigger_manual"));

  match build_err(&dataflow) {
    FlowError::TooManyTriggers { triggers } => assert_eq!(triggers, vec!["t1", "t2"]),
    other => panic!("Expected TooManyTriggers, got {:?}", other),
  }
}

#[test]
fn test_mixed_input_link_kinds() {
  setup_tracing();
  let dataflow = Dataflow::new("mixed-in")
    .step(reader_def("reader", numbers(1..=2)))
    .step(StepDefinition::new("start", "trigger_manual"))
    .step(StepDefinition::new("pass", "flow_passthrough").depends_on(["reader", "start"]))
    .step(StepDefinition::new("writer", "writer_array").depends_on(["pass"]));

  match build_err(&dataflow) {
    FlowError::MixedLinkKinds { step_id, port } => {
      assert_eq!(step_id, "pass");
      assert_eq!(port, "inputs");
    }
    other => panic!("Expected MixedLinkKinds, got {:?}", other),
  }
}

#[test]
fn test_mixed_output_link_kinds() {
  setup_tracing();
  let dataflow = Dataflow::new("mixed-out")
    .step(reader_def("reader", numbers(1..=2)))
    .step(StepDefinition::new("writer", "writer_array").depends_on(["reader"]))
    .step(StepDefinition::new("after", "connector_noop").depends_on(["reader"]));

  match build_err(&dataflow) {
    FlowError::MixedLinkKinds { step_id, port } => {
      assert_eq!(step_id, "reader");
      assert_eq!(port, "outputs");
    }
    other => panic!("Expected MixedLinkKinds, got {:?}", other),
  }
}

#[test]
fn test_transformer_without_input_violates_arity() {
  setup_tracing();
  let dataflow = Dataflow::new("no-input")
    .step(StepDefinition::new("pass", "flow_passthrough"))
    .step(StepDefinition::new("writer", "writer_array").depends_on(["pass"]));

  match build_err(&dataflow) {
    FlowError::ArityViolation {
      step_id,
      port,
      actual,
      min,
      max,
    } => {
      assert_eq!(step_id, "pass");
      assert_eq!(port, "flow input");
      assert_eq!((actual, min, max), (0, 1, 1));
    }
    other => panic!("Expected ArityViolation, got {:?}", other),
  }
}

#[test]
fn test_transformer_with_two_inputs_violates_arity() {
  setup_tracing();
  let dataflow = Dataflow::new("two-inputs")
    .step(reader_def("r1", numbers(1..=2)))
    .step(reader_def("r2", numbers(3..=4)))
    .step(StepDefinition::new("pass", "flow_passthrough").depends_on(["r1", "r2"]));

  assert!(matches!(
    build_err(&dataflow),
    FlowError::ArityViolation { ref step_id, port: "flow input", actual: 2, .. } if step_id == "pass"
  ));
}

#[test]
fn test_branching_without_clone_violates_arity() {
  setup_tracing();
  let dataflow = Dataflow::new("shared-upstream")
    .step(reader_def("reader", numbers(1..=2)))
    .step(StepDefinition::new("w1", "writer_array").depends_on(["reader"]))
    .step(StepDefinition::new("w2", "writer_array").depends_on(["reader"]));

  assert!(matches!(
    build_err(&dataflow),
    FlowError::ArityViolation { ref step_id, port: "flow output", actual: 2, max: 1, .. } if step_id == "reader"
  ));
}

#[test]
fn test_zipper_needs_two_inputs() {
  setup_tracing();
  let dataflow = Dataflow::new("lonely-zip")
    .step(reader_def("reader", numbers(1..=2)))
    .step(StepDefinition::new("zip", "flow_zipper").depends_on(["reader"]));

  assert!(matches!(
    build_err(&dataflow),
    FlowError::ArityViolation { ref step_id, actual: 1, min: 2, .. } if step_id == "zip"
  ));
}

#[test]
fn test_trigger_accepts_no_inputs() {
  setup_tracing();
  let dataflow = Dataflow::new("fed-trigger")
    .step(StepDefinition::new("noop", "connector_noop"))
    .step(StepDefinition::new("start", "trigger_manual").depends_on(["noop"]));

  assert!(matches!(
    build_err(&dataflow),
    FlowError::ArityViolation { ref step_id, port: "connector input", .. } if step_id == "start"
  ));
}

#[test]
fn test_sinks_are_steps_without_flow_consumers() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = Dataflow::new("sinks")
    .step(reader_def("reader", numbers(1..=2)))
    .step(StepDefinition::new("fork", "flow_clone").depends_on(["reader"]))
    .step(StepDefinition::new("w1", "writer_array").depends_on(["fork"]))
    .step(StepDefinition::new("w2", "writer_array").depends_on(["fork"]))
    .step(StepDefinition::new("after", "connector_noop").depends_on(["w1", "w2"]));

  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  assert_eq!(engine.sink_ids(), vec!["w1", "w2", "after"]);
  let fork = engine.step("fork").unwrap();
  assert_eq!(fork.downstream_flow_ids(), ["w1".to_string(), "w2".to_string()]);
  assert!(fork.downstream_connector_ids().is_empty());
  assert_eq!(engine.step("w1").unwrap().downstream_connector_ids(), ["after".to_string()]);
  let downstream: Vec<&str> = engine.downstreams("fork").iter().map(|s| s.id()).collect();
  assert_eq!(downstream, vec!["w1", "w2"]);
  let downstream: Vec<&str> = engine.downstreams("w1").iter().map(|s| s.id()).collect();
  assert_eq!(downstream, vec!["after"]);
  assert!(engine.downstreams("after").is_empty());
  assert!(engine.downstreams("missing").is_empty());

  engine.initialise().unwrap();
  let caps: Vec<&str> = engine.flow_caps().iter().map(|c| c.step_id()).collect();
  assert_eq!(caps, vec!["w1", "w2"]);

  engine.execute().unwrap();
  assert_eq!(engine.step("after").unwrap().context().executions(), 1);
}

#[test]
fn test_deep_chain_validates() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let mut dataflow = Dataflow::new("deep").step(reader_def("step_0", numbers(1..=1)));
  for i in 1..5_000 {
    dataflow = dataflow.step(StepDefinition::new(format!("step_{i}"), "flow_passthrough").depends_on([format!("step_{}", i - 1)]));
  }

  let engine = Engine::new(&dataflow, &registry).unwrap();
  assert_eq!(engine.sink_ids(), vec!["step_4999"]);
}

#[test]
fn test_cycle_found_deep_in_a_long_chain() {
  setup_tracing();
  let mut dataflow = Dataflow::new("deep-cycle").step(StepDefinition::new("step_0", "flow_passthrough").depends_on(["step_4999"]));
  for i in 1..5_000 {
    dataflow = dataflow.step(StepDefinition::new(format!("step_{i}"), "flow_passthrough").depends_on([format!("step_{}", i - 1)]));
  }

  match build_err(&dataflow) {
    FlowError::NotADag { cycle } => {
      assert_eq!(cycle.len(), 5_001);
      assert_eq!(cycle.first(), cycle.last());
    }
    other => panic!("Expected NotADag, got {:?}", other),
  }
}
