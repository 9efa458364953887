// flowline/examples/basic_dataflow.rs

use flowline::{Dataflow, Engine, FlowResult, InMemoryRecorder, Map, Output, StepRegistry, StepType};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

fn main() -> FlowResult<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Dataflow Example ---");

  // 1. A registry with the built-in step types, plus two of our own.
  let registry = StepRegistry::with_builtins();
  let archive = Output::new();
  let report = Output::new();
  {
    let archive = archive.clone();
    registry.register("writer_archive", move |_| {
      Ok(Arc::new(flowline::ArrayWriter::with_output(archive.clone())) as Arc<dyn StepType>)
    });
  }
  {
    let report = report.clone();
    registry.register("writer_report", move |_| {
      Ok(Arc::new(flowline::ArrayWriter::with_output(report.clone())) as Arc<dyn StepType>)
    });
  }
  registry.register_instance(
    "flow_total",
    Arc::new(Map::new(|order| {
      let qty = order["qty"].as_i64().unwrap_or(0);
      let price = order["price"].as_i64().unwrap_or(0);
      Ok(json!({ "id": order["id"], "total": qty * price }))
    })),
  );

  // 2. The graph, as a host application would load it.
  let dataflow: Dataflow = serde_json::from_value(json!({
    "name": "orders",
    "steps": [
      { "id": "start", "type": "trigger_manual" },
      { "id": "orders", "type": "reader_array", "dependson": ["start"], "config": { "values": [
        { "id": 1, "qty": 2, "price": 15, "status": "paid" },
        { "id": 2, "qty": 1, "price": 40, "status": "open" },
        { "id": 3, "qty": 5, "price": 3, "status": "paid" }
      ] } },
      { "id": "paid", "type": "flow_filter", "dependson": ["orders"], "config": { "field": "status", "equals": "paid" } },
      { "id": "split", "type": "flow_clone", "dependson": ["paid"] },
      { "id": "archive", "type": "writer_archive", "dependson": ["split"] },
      { "id": "totals", "type": "flow_total", "dependson": ["split"] },
      { "id": "report", "type": "writer_report", "dependson": ["totals"] },
      { "id": "done", "type": "connector_noop", "dependson": ["archive", "report"] }
    ]
  }))
  .map_err(|e| flowline::FlowError::Internal(format!("bad dataflow document: {e}")))?;

  // 3. Build, run and tear down.
  let recorder = Arc::new(InMemoryRecorder::new());
  let mut engine = Engine::builder(&dataflow, &registry).recorder(recorder.clone()).build()?;
  info!(sinks = ?engine.sink_ids(), "Engine built.");

  engine.initialise()?;
  let summary = engine.execute()?;
  info!(?summary, "Run complete.");

  for record in archive.snapshot() {
    info!(%record, "archived");
  }
  for record in report.snapshot() {
    info!(%record, "reported");
  }

  engine.finalise()?;
  info!(records = recorder.records().len(), status = %engine.status(), "Recorder entries.");
  Ok(())
}
