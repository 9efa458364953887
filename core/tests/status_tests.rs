// tests/status_tests.rs
mod common;

use common::*;
use flowline::{Dataflow, Engine, EngineStatus, FlowError, StepDefinition, StepRegistry, StepStatus};

fn simple_dataflow() -> Dataflow {
  Dataflow::new("simple")
    .step(reader_def("reader", numbers(1..=3)))
    .step(StepDefinition::new("writer", "writer_array").depends_on(["reader"]))
}

#[test]
fn test_lifecycle_walks_forward() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = simple_dataflow();
  let mut engine = Engine::new(&dataflow, &registry).unwrap();

  assert_eq!(engine.status(), EngineStatus::New);
  for step in engine.steps() {
    assert_eq!(step.status(), StepStatus::New);
  }

  engine.initialise().unwrap();
  assert_eq!(engine.status(), EngineStatus::Initialised);
  for step in engine.steps() {
    assert_eq!(step.status(), StepStatus::Initialised);
  }

  let summary = engine.execute().unwrap();
  assert_eq!(summary.status, EngineStatus::Finished);
  assert!(summary.ticks >= 3);

  engine.finalise().unwrap();
  assert_eq!(engine.status(), EngineStatus::Finalised);
  assert!(engine.flow_caps().is_empty());
  assert!(engine.iterator("writer").is_none());
}

#[test]
fn test_initialise_twice_is_bad_status() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = simple_dataflow();
  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  engine.initialise().unwrap();

  match engine.initialise() {
    Err(FlowError::BadStatus { operation, found, .. }) => {
      assert_eq!(operation, "initialise");
      assert_eq!(found, EngineStatus::Initialised);
    }
    other => panic!("Expected BadStatus, got {:?}", other),
  }
}

#[test]
fn test_execute_requires_initialise() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = simple_dataflow();
  let mut engine = Engine::new(&dataflow, &registry).unwrap();

  let err = engine.execute().unwrap_err();
  assert!(matches!(err, FlowError::BadStatus { operation: "execute", found: EngineStatus::New, .. }));
  assert_eq!(engine.status(), EngineStatus::New);
}

#[test]
fn test_execute_twice_is_bad_status() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = simple_dataflow();
  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  engine.initialise().unwrap();
  engine.execute().unwrap();

  let err = engine.execute().unwrap_err();
  assert!(matches!(err, FlowError::BadStatus { found: EngineStatus::Finished, .. }));
}

#[test]
fn test_no_status_change_after_finalise() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = simple_dataflow();
  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  engine.initialise().unwrap();
  engine.execute().unwrap();
  engine.finalise().unwrap();

  match engine.finalise() {
    Err(FlowError::ChangeStateAfterConcluded { current, attempted }) => {
      assert_eq!(current, EngineStatus::Finalised);
      assert_eq!(attempted, EngineStatus::Finalised);
    }
    other => panic!("Expected ChangeStateAfterConcluded, got {:?}", other),
  }
  assert!(matches!(
    engine.cancel(),
    Err(FlowError::ChangeStateAfterConcluded { attempted: EngineStatus::Cancelled, .. })
  ));
  assert!(!engine.abort(None, "late"));
  assert_eq!(engine.status(), EngineStatus::Finalised);
}

#[test]
fn test_finalise_before_run_concluded_is_rejected() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = simple_dataflow();
  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  engine.initialise().unwrap();

  let err = engine.finalise().unwrap_err();
  assert!(matches!(err, FlowError::BadStatus { found: EngineStatus::Initialised, .. }));
}

#[test]
fn test_cancel_before_processing() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = simple_dataflow();
  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  engine.initialise().unwrap();

  engine.cancel().unwrap();
  assert_eq!(engine.status(), EngineStatus::Cancelled);
  assert!(matches!(engine.execute(), Err(FlowError::BadStatus { found: EngineStatus::Cancelled, .. })));
  engine.finalise().unwrap();
}

#[test]
fn test_cancel_after_finish_is_rejected() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = simple_dataflow();
  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  engine.initialise().unwrap();
  engine.execute().unwrap();

  assert!(matches!(engine.cancel(), Err(FlowError::BadStatus { found: EngineStatus::Finished, .. })));
  assert_eq!(engine.status(), EngineStatus::Finished);
}

#[test]
fn test_reader_without_values_fails_initialise() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = Dataflow::new("empty-reader")
    .step(StepDefinition::new("reader", "reader_array"))
    .step(StepDefinition::new("writer", "writer_array").depends_on(["reader"]));
  let mut engine = Engine::new(&dataflow, &registry).unwrap();

  match engine.initialise() {
    Err(FlowError::NullInput { step_id }) => assert_eq!(step_id, "reader"),
    other => panic!("Expected NullInput, got {:?}", other),
  }
  assert_eq!(engine.status(), EngineStatus::Aborted);
  assert_eq!(engine.failure().unwrap().step_id.as_deref(), Some("reader"));
}

#[test]
fn test_empty_reader_finishes_immediately() {
  setup_tracing();
  let registry = StepRegistry::with_builtins();
  let dataflow = Dataflow::new("nothing")
    .step(reader_def("reader", Vec::new()))
    .step(StepDefinition::new("writer", "writer_array").depends_on(["reader"]));
  let mut engine = Engine::new(&dataflow, &registry).unwrap();
  engine.initialise().unwrap();

  let summary = engine.execute().unwrap();
  assert_eq!(summary.records_drained, 0);
  assert_eq!(engine.step("writer").unwrap().status(), StepStatus::Finished);
}

#[test]
fn test_status_labels() {
  assert_eq!(EngineStatus::Finished.to_string(), "FINISHED");
  assert_eq!(StepStatus::Blocked.to_string(), "BLOCKED");
  assert!(EngineStatus::Aborted.is_concluded());
  assert!(!EngineStatus::Flowing.is_concluded());
  assert!(EngineStatus::Finalised.is_terminal());
  assert!(EngineStatus::Initialised.can_transition_to(EngineStatus::Cancelled));
  assert!(!EngineStatus::Processing.can_transition_to(EngineStatus::Cancelled));
  assert!(EngineStatus::Finished.can_transition_to(EngineStatus::Aborted));
  assert!(EngineStatus::Cancelled.can_transition_to(EngineStatus::Aborted));
  assert!(!EngineStatus::Aborted.can_transition_to(EngineStatus::Aborted));
  assert!(!EngineStatus::Finalised.can_transition_to(EngineStatus::Aborted));
}
