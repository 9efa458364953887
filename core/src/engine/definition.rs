// flowline/src/engine/definition.rs

//! Contains the `Engine` struct, its builder, and every lifecycle operation except
//! the execution driver itself.

use crate::core::context::StepContext;
use crate::core::run_state::{AbortHandle, RunFailure, RunState};
use crate::core::status::EngineStatus;
use crate::core::step::Dataflow;
use crate::core::step_type::{StepKind, StepType};
use crate::engine::engine_step::EngineStep;
use crate::engine::flow_cap::FlowCap;
use crate::engine::graph;
use crate::engine::recorder::{NoopRecorder, RunRecorder};
use crate::error::{FlowError, FlowResult};
use crate::iterator::IterHandle;
use crate::registry::StepRegistry;
use chrono::Utc;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Run-wide switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
  /// Step types with side effects are asked to skip them.
  pub dry_run: bool,
}

/// Runtime driver for one execution of a dataflow.
pub struct Engine {
  pub(crate) name: String,
  /// Definition order.
  pub(crate) steps: IndexMap<String, Arc<EngineStep>>,
  /// Upstreams before downstreams.
  pub(crate) order: Vec<String>,
  pub(crate) sinks: Vec<Arc<EngineStep>>,
  pub(crate) flow_caps: Vec<FlowCap>,
  pub(crate) run: RunState,
  pub(crate) recorder: Arc<dyn RunRecorder>,
  pub(crate) options: EngineOptions,
}

pub struct EngineBuilder<'a> {
  dataflow: &'a Dataflow,
  registry: &'a StepRegistry,
  options: EngineOptions,
  recorder: Arc<dyn RunRecorder>,
}

impl<'a> EngineBuilder<'a> {
  pub fn options(mut self, options: EngineOptions) -> Self {
    self.options = options;
    self
  }

  pub fn dry_run(mut self, dry_run: bool) -> Self {
    self.options.dry_run = dry_run;
    self
  }

  pub fn recorder(mut self, recorder: Arc<dyn RunRecorder>) -> Self {
    self.recorder = recorder;
    self
  }

  /// Resolves step types, validates the graph and wires the engine steps. Nothing
  /// usable is produced unless every construction rule holds.
  #[instrument(name = "Engine::build", skip_all, fields(dataflow = %self.dataflow.name), err(Display))]
  pub fn build(self) -> FlowResult<Engine> {
    let dataflow = self.dataflow;

    let mut types: IndexMap<String, Arc<dyn StepType>> = IndexMap::with_capacity(dataflow.len());
    for (id, def) in &dataflow.steps {
      types.insert(id.clone(), self.registry.resolve(def)?);
    }
    let topology = graph::validate(dataflow, &types)?;

    let run = RunState::new();
    let mut built: IndexMap<String, Arc<EngineStep>> = IndexMap::with_capacity(dataflow.len());
    for id in &topology.order {
      let (def, step_type, links) = match (dataflow.get(id), types.get(id), topology.links.get(id)) {
        (Some(def), Some(step_type), Some(links)) => (def, step_type, links),
        _ => return Err(FlowError::Internal(format!("step '{id}' missing after validation"))),
      };
      let context = Arc::new(StepContext::new(def, Arc::clone(step_type), run.clone(), self.options.dry_run));
      let mut upstreams = IndexMap::with_capacity(def.depends_on.len());
      for up in def.dependencies() {
        if let Some(step) = built.get(up) {
          upstreams.insert(up.clone(), Arc::downgrade(step));
        }
      }
      built.insert(id.clone(), Arc::new(EngineStep::new(context, upstreams, links.clone())));
    }

    // Back to definition order, which is also the scheduling tie-break.
    let mut steps = IndexMap::with_capacity(built.len());
    for id in dataflow.steps.keys() {
      if let Some(step) = built.swap_remove(id) {
        steps.insert(id.clone(), step);
      }
    }

    let sinks: Vec<Arc<EngineStep>> = steps.values().filter(|s| s.is_sink()).cloned().collect();
    event!(
      Level::DEBUG,
      steps = steps.len(),
      sinks = sinks.len(),
      dry_run = self.options.dry_run,
      "Engine built."
    );

    Ok(Engine {
      name: dataflow.name.clone(),
      steps,
      order: topology.order,
      sinks,
      flow_caps: Vec::new(),
      run,
      recorder: self.recorder,
      options: self.options,
    })
  }
}

impl Engine {
  pub fn builder<'a>(dataflow: &'a Dataflow, registry: &'a StepRegistry) -> EngineBuilder<'a> {
    EngineBuilder {
      dataflow,
      registry,
      options: EngineOptions::default(),
      recorder: Arc::new(NoopRecorder),
    }
  }

  /// Builds an engine with default options and no run recording.
  pub fn new(dataflow: &Dataflow, registry: &StepRegistry) -> FlowResult<Self> {
    Self::builder(dataflow, registry).build()
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn status(&self) -> EngineStatus {
    self.run.status()
  }

  pub fn options(&self) -> EngineOptions {
    self.options
  }

  /// Why the run was aborted, if it was.
  pub fn failure(&self) -> Option<RunFailure> {
    self.run.failure()
  }

  pub fn step(&self, id: &str) -> Option<&Arc<EngineStep>> {
    self.steps.get(id)
  }

  /// Downstream engine steps of `id` (flow links first, then connector links).
  /// Steps keep only downstream ids; the engine owns the id to step mapping.
  pub fn downstreams(&self, id: &str) -> Vec<&Arc<EngineStep>> {
    self.steps.get(id).map_or_else(Vec::new, |step| {
      step
        .downstream_flow_ids()
        .iter()
        .chain(step.downstream_connector_ids())
        .filter_map(|down| self.steps.get(down))
        .collect()
    })
  }

  pub fn steps(&self) -> impl Iterator<Item = &Arc<EngineStep>> {
    self.steps.values()
  }

  /// Ids of every step with no downstream flow consumer, in definition order.
  pub fn sink_ids(&self) -> Vec<&str> {
    self.sinks.iter().map(|s| s.id()).collect()
  }

  /// Populated by [`initialise`](Self::initialise).
  pub fn flow_caps(&self) -> &[FlowCap] {
    &self.flow_caps
  }

  /// The iterator owned by step `id`, once initialised.
  pub fn iterator(&self, id: &str) -> Option<IterHandle> {
    self.steps.get(id).and_then(|s| s.iterator())
  }

  pub fn abort_handle(&self) -> AbortHandle {
    AbortHandle::new(self.run.clone())
  }

  /// Builds every iterator, upstreams first, and a flow cap for each flow sink.
  #[instrument(name = "Engine::initialise", skip_all, fields(dataflow = %self.name), err(Display))]
  pub fn initialise(&mut self) -> FlowResult<()> {
    let status = self.status();
    if status != EngineStatus::New {
      return Err(FlowError::BadStatus {
        operation: "initialise",
        expected: EngineStatus::New.to_string(),
        found: status,
      });
    }

    if let Err(e) = self.wire_iterators() {
      event!(Level::ERROR, error = %e, "Engine initialisation failed.");
      self.run.abort(e.step_id(), &e.to_string());
      self.abort_steps();
      return Err(e);
    }

    self.run.transition(EngineStatus::Initialised)?;
    event!(Level::DEBUG, flow_caps = self.flow_caps.len(), "Engine initialised.");
    Ok(())
  }

  fn wire_iterators(&mut self) -> FlowResult<()> {
    for id in &self.order {
      let step = self
        .steps
        .get(id)
        .ok_or_else(|| FlowError::Internal(format!("step '{id}' missing from engine")))?;
      let mut inputs = Vec::with_capacity(step.upstream_flow_ids().len());
      for up_id in step.upstream_flow_ids() {
        let upstream = step
          .upstream(up_id)
          .ok_or_else(|| FlowError::Internal(format!("upstream '{up_id}' of '{id}' missing")))?;
        inputs.push(upstream.outlet_for(id)?);
      }
      step.initialise(inputs)?;
    }

    let mut caps = Vec::new();
    for sink in self.sinks.iter().filter(|s| s.kind() == StepKind::Flow) {
      caps.push(FlowCap::new(sink)?);
    }
    self.flow_caps = caps;
    Ok(())
  }

  /// Force-terminates the run: records the offending step and reason, then
  /// finishes every iterator. A finished run may still be aborted, and the run
  /// recorder is told of the new ending. Returns false when the run was already
  /// aborted or finalised.
  pub fn abort(&self, step_id: Option<&str>, reason: impl AsRef<str>) -> bool {
    let previous = self.status();
    let aborted = self.run.abort(step_id, reason.as_ref());
    if aborted || self.run.is_aborted() {
      self.abort_steps();
    }
    if aborted && previous == EngineStatus::Finished {
      let failure = self.run.failure();
      self
        .recorder
        .record_run_end(&self.name, EngineStatus::Aborted, Utc::now(), failure.as_ref());
    }
    aborted
  }

  pub(crate) fn abort_steps(&self) {
    for step in self.steps.values() {
      step.abort();
    }
  }

  /// Cancels a run that has not started processing.
  pub fn cancel(&mut self) -> FlowResult<()> {
    self.run.transition(EngineStatus::Cancelled)?;
    event!(Level::INFO, dataflow = %self.name, "Run cancelled.");
    Ok(())
  }

  /// Teardown after the run concluded: releases every iterator and flow cap.
  /// No status change is possible afterwards.
  #[instrument(name = "Engine::finalise", skip_all, fields(dataflow = %self.name), err(Display))]
  pub fn finalise(&mut self) -> FlowResult<()> {
    self.run.transition(EngineStatus::Finalised)?;
    self.flow_caps.clear();
    for step in self.steps.values() {
      step.release();
    }
    event!(Level::DEBUG, "Engine finalised.");
    Ok(())
  }
}

impl std::fmt::Debug for Engine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine")
      .field("name", &self.name)
      .field("status", &self.status())
      .field("steps", &self.steps.keys().collect::<Vec<_>>())
      .field("sinks", &self.sink_ids())
      .field("flow_caps", &self.flow_caps.len())
      .field("options", &self.options)
      .finish()
  }
}
