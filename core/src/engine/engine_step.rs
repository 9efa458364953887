// flowline/src/engine/engine_step.rs

//! Runtime wrapper around one step definition inside one engine.

use crate::core::context::StepContext;
use crate::core::control::Record;
use crate::core::status::StepStatus;
use crate::core::step_type::StepKind;
use crate::engine::graph::StepLinks;
use crate::error::{FlowError, FlowResult};
use crate::iterator::{FanOut, Gate, IterHandle, IteratorWiring};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::{Arc, Weak};
use tracing::{event, Level};

/// Where downstream consumers pull this step's values from.
enum Outlet {
  Single(IterHandle),
  FanOut(FanOut),
}

pub struct EngineStep {
  context: Arc<StepContext>,
  /// Lookup only; the engine owns every step.
  upstreams: IndexMap<String, Weak<EngineStep>>,
  links: StepLinks,
  outlet: Mutex<Option<Outlet>>,
}

impl EngineStep {
  pub(crate) fn new(context: Arc<StepContext>, upstreams: IndexMap<String, Weak<EngineStep>>, links: StepLinks) -> Self {
    Self {
      context,
      upstreams,
      links,
      outlet: Mutex::new(None),
    }
  }

  pub fn id(&self) -> &str {
    self.context.id()
  }

  pub fn context(&self) -> &Arc<StepContext> {
    &self.context
  }

  pub fn status(&self) -> StepStatus {
    self.context.status()
  }

  pub fn kind(&self) -> StepKind {
    self.context.kind()
  }

  pub fn upstream(&self, id: &str) -> Option<Arc<EngineStep>> {
    self.upstreams.get(id).and_then(Weak::upgrade)
  }

  pub fn upstream_ids(&self) -> impl Iterator<Item = &str> {
    self.upstreams.keys().map(String::as_str)
  }

  pub fn upstream_flow_ids(&self) -> &[String] {
    &self.links.upstream_flow
  }

  pub fn upstream_connector_ids(&self) -> &[String] {
    &self.links.upstream_connector
  }

  pub fn downstream_flow_ids(&self) -> &[String] {
    &self.links.downstream_flow
  }

  pub fn downstream_connector_ids(&self) -> &[String] {
    &self.links.downstream_connector
  }

  /// A sink has no downstream flow consumer.
  pub fn is_sink(&self) -> bool {
    self.links.downstream_flow.is_empty()
  }

  /// Builds this step's iterator from the outlets of its flow upstreams.
  /// Connector steps have no iterator.
  pub(crate) fn initialise(&self, flow_upstreams: Vec<IterHandle>) -> FlowResult<()> {
    if self.kind() == StepKind::Flow {
      let gate = Gate::new(
        self
          .links
          .upstream_connector
          .iter()
          .filter_map(|id| self.upstreams.get(id).cloned())
          .collect(),
      );
      let wiring = IteratorWiring::new(Arc::clone(&self.context), flow_upstreams, gate);
      let iterator = IterHandle::new(self.context.step_type().get_iterator(wiring)?);
      let outlet = if self.context.step_type().fans_out() {
        Outlet::FanOut(FanOut::new(iterator, self.links.downstream_flow.iter().cloned()))
      } else {
        Outlet::Single(iterator)
      };
      *self.outlet.lock() = Some(outlet);
    }
    self.context.set_status(StepStatus::Initialised);
    event!(Level::TRACE, step_id = %self.id(), kind = ?self.kind(), "Engine step initialised.");
    Ok(())
  }

  /// This step's own iterator.
  pub fn iterator(&self) -> Option<IterHandle> {
    self.outlet.lock().as_ref().map(|outlet| match outlet {
      Outlet::Single(it) => it.clone(),
      Outlet::FanOut(fan) => fan.source().clone(),
    })
  }

  /// The handle `downstream` should pull from. For a cloning step this is the
  /// branch reserved for that downstream.
  pub fn outlet_for(&self, downstream: &str) -> FlowResult<IterHandle> {
    match self.outlet.lock().as_ref() {
      Some(Outlet::Single(it)) => Ok(it.clone()),
      Some(Outlet::FanOut(fan)) => fan.branch(downstream),
      None => Err(FlowError::Internal(format!(
        "step '{}' has no iterator for downstream '{}'",
        self.id(),
        downstream
      ))),
    }
  }

  /// Advances this step if it is a connector, returning whether it is done.
  ///
  /// A connector executes exactly once, after every upstream has finished. Connector
  /// upstreams are driven recursively; flow upstreams only report their status since
  /// their flow caps drive them.
  pub(crate) fn go(&self, caller: &str) -> FlowResult<bool> {
    let status = self.status();
    if status.is_done() {
      return Ok(true);
    }
    if self.kind() == StepKind::Flow {
      return Ok(false);
    }
    if self.context.is_run_aborted() {
      self.context.set_status(StepStatus::Aborted);
      return Ok(true);
    }

    let mut ready = true;
    for (id, weak) in &self.upstreams {
      let upstream = weak
        .upgrade()
        .ok_or_else(|| FlowError::Internal(format!("upstream '{}' of '{}' was dropped", id, self.id())))?;
      if upstream.kind() == StepKind::Connector {
        upstream.go(self.id())?;
      }
      if upstream.status() != StepStatus::Finished {
        ready = false;
      }
    }
    if !ready {
      self.context.set_status(StepStatus::Blocked);
      return Ok(false);
    }

    event!(Level::DEBUG, step_id = %self.id(), caller, "Executing connector step.");
    self.context.execute(Record::Null)?;
    self.context.set_status(StepStatus::Finished);
    self
      .context
      .log()
      .debug("Connector step finished.", &json!({ "caller": caller }));
    Ok(true)
  }

  /// Finishes the iterator(s) immediately; connector steps are marked aborted.
  pub(crate) fn abort(&self) {
    match self.outlet.lock().as_ref() {
      Some(Outlet::Single(it)) => it.abort(),
      Some(Outlet::FanOut(fan)) => fan.abort(),
      None => {}
    }
    self.context.set_status(StepStatus::Aborted);
  }

  /// Drops the iterators so nothing keeps upstream handles alive after the run.
  pub(crate) fn release(&self) {
    self.outlet.lock().take();
  }
}

impl std::fmt::Debug for EngineStep {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EngineStep")
      .field("id", &self.id())
      .field("kind", &self.kind())
      .field("status", &self.status())
      .field("upstreams", &self.upstreams.keys().collect::<Vec<_>>())
      .field("downstream_flow", &self.links.downstream_flow)
      .field("downstream_connector", &self.links.downstream_connector)
      .finish()
  }
}
