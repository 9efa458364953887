// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use anyhow::anyhow;
use flowline::{
  Dataflow, Engine, FlowResult, Output, Record, StepContext, StepDefinition, StepKind, StepRegistry, StepRole,
  StepType,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;

// --- Helper for Tracing Setup (call once per test run if needed) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Global counter for steps that count executions across a test ---
pub static COUNTER_EXEC_TOTAL: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counters() {
  COUNTER_EXEC_TOTAL.store(0, Ordering::SeqCst);
}

// --- Records ---
pub fn numbers(range: std::ops::RangeInclusive<i64>) -> Vec<Record> {
  range.map(|n| json!(n)).collect()
}

pub fn reader_def(id: &str, values: Vec<Record>) -> StepDefinition {
  StepDefinition::new(id, "reader_array").config(json!({ "values": values }))
}

// --- Registries ---

/// Built-ins, with each `writer_array` step writing to the `Output` registered under its id.
pub fn registry_with_outputs(outputs: &[(&str, Output)]) -> StepRegistry {
  let registry = StepRegistry::with_builtins();
  let outputs: HashMap<String, Output> = outputs.iter().map(|(id, out)| (id.to_string(), out.clone())).collect();
  registry.register("writer_array", move |def| {
    let output = outputs.get(&def.id).cloned().unwrap_or_default();
    Ok(Arc::new(flowline::ArrayWriter::with_output(output)) as Arc<dyn StepType>)
  });
  registry.register_instance("fail_on_3", Arc::new(FailOnNth::new(3)));
  registry.register_instance("counting", Arc::new(Counting));
  registry
}

pub fn build(dataflow: &Dataflow, registry: &StepRegistry) -> FlowResult<Engine> {
  Engine::builder(dataflow, registry).build()
}

// --- Fixture step types ---

/// Flow transformer that fails on its nth record.
pub struct FailOnNth {
  n: u64,
  seen: AtomicU64,
}

impl FailOnNth {
  pub fn new(n: u64) -> Self {
    Self {
      n,
      seen: AtomicU64::new(0),
    }
  }
}

impl StepType for FailOnNth {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Transformer
  }

  fn execute(&self, _ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
    if seen == self.n {
      return Err(anyhow!("refusing record {record} (number {seen})"));
    }
    Ok(Some(record))
  }
}

/// Flow transformer counting its executions in `COUNTER_EXEC_TOTAL`.
pub struct Counting;

impl StepType for Counting {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Transformer
  }

  fn execute(&self, ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    COUNTER_EXEC_TOTAL.fetch_add(1, Ordering::SeqCst);
    ctx.log().debug("Counting step saw a record.", &record);
    Ok(Some(record))
  }
}

/// Shared, ordered log of `"<step>:<record>"` entries.
#[derive(Clone, Default)]
pub struct TraceLog(Arc<Mutex<Vec<String>>>);

impl TraceLog {
  pub fn entries(&self) -> Vec<String> {
    self.0.lock().clone()
  }

  pub fn push(&self, entry: String) {
    self.0.lock().push(entry);
  }
}

/// Flow transformer appending every record it executes to a `TraceLog`.
pub struct Traced {
  pub log: TraceLog,
}

impl StepType for Traced {
  fn kind(&self) -> StepKind {
    StepKind::Flow
  }

  fn role(&self) -> StepRole {
    StepRole::Transformer
  }

  fn execute(&self, ctx: &StepContext, record: Record) -> anyhow::Result<Option<Record>> {
    self.log.push(format!("{}:{}", ctx.id(), record));
    Ok(Some(record))
  }
}
