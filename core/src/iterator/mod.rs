// flowline/src/iterator/mod.rs

//! The pull-based streaming primitive connecting one step's output to another's input.
//!
//! Every flow step owns exactly one iterator. Calling `next()` on it pulls its
//! upstream forward first, so values move through the graph only as fast as the
//! sinks ask for them. There is no preemption: an iterator "suspends" simply by
//! returning after producing (or declining) one value.

pub mod fanout;
pub mod source;
pub mod step_iterator;

pub use fanout::FanOut;
pub use source::{CursorSource, MergeSource, Source, UpstreamSource, VecCursor};
pub use step_iterator::StepIterator;

use crate::core::context::StepContext;
use crate::core::control::{Pull, Record};
use crate::engine::engine_step::EngineStep;
use crate::error::{FlowError, FlowResult};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Protocol shared by every iterator, whatever its source.
pub trait FlowIterator: Send {
  /// True once no further values will ever be produced.
  fn is_finished(&self) -> bool;

  /// True if calling `next` right now could yield a value.
  fn is_ready(&self) -> bool;

  /// Marks the iterator finished immediately, regardless of upstream state.
  fn abort(&mut self);

  /// Advances one step. `caller` names whoever is pulling, for tracing.
  fn next(&mut self, caller: &str) -> FlowResult<Pull>;

  /// The last value produced.
  fn current(&self) -> Option<&Record>;

  /// Number of values produced so far.
  fn iterations(&self) -> u64;
}

/// Shared handle to an iterator. Downstream iterators, flow caps and the engine
/// all pull through one of these.
#[derive(Clone)]
pub struct IterHandle(Arc<Mutex<Box<dyn FlowIterator>>>);

impl IterHandle {
  pub fn new(iterator: Box<dyn FlowIterator>) -> Self {
    IterHandle(Arc::new(Mutex::new(iterator)))
  }

  pub fn next(&self, caller: &str) -> FlowResult<Pull> {
    self.0.lock().next(caller)
  }

  pub fn is_finished(&self) -> bool {
    self.0.lock().is_finished()
  }

  pub fn is_ready(&self) -> bool {
    self.0.lock().is_ready()
  }

  pub fn abort(&self) {
    self.0.lock().abort()
  }

  pub fn current(&self) -> Option<Record> {
    self.0.lock().current().cloned()
  }

  pub fn iterations(&self) -> u64 {
    self.0.lock().iterations()
  }
}

impl std::fmt::Debug for IterHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.0.try_lock() {
      Some(it) => f
        .debug_struct("IterHandle")
        .field("finished", &it.is_finished())
        .field("iterations", &it.iterations())
        .finish(),
      None => f.write_str("IterHandle(<in use>)"),
    }
  }
}

/// Connector upstreams a flow step must wait for before it may pull.
#[derive(Default)]
pub struct Gate {
  connectors: Vec<Weak<EngineStep>>,
}

impl Gate {
  pub(crate) fn new(connectors: Vec<Weak<EngineStep>>) -> Self {
    Self { connectors }
  }

  pub fn is_empty(&self) -> bool {
    self.connectors.is_empty()
  }

  /// Drives every connector upstream and reports whether all have finished.
  pub(crate) fn open(&self, caller: &str) -> FlowResult<bool> {
    let mut open = true;
    for weak in &self.connectors {
      let step = weak
        .upgrade()
        .ok_or_else(|| FlowError::Internal(format!("connector upstream of '{caller}' was dropped")))?;
      if !step.go(caller)? {
        open = false;
      }
    }
    Ok(open)
  }

  /// Status-only check, without driving anything.
  pub(crate) fn is_satisfied(&self) -> bool {
    self
      .connectors
      .iter()
      .all(|weak| weak.upgrade().map_or(false, |step| step.context().is_finished()))
  }
}

/// Everything a step type needs to build its iterator.
pub struct IteratorWiring {
  step: Arc<StepContext>,
  upstreams: Vec<IterHandle>,
  gate: Gate,
}

impl IteratorWiring {
  pub(crate) fn new(step: Arc<StepContext>, upstreams: Vec<IterHandle>, gate: Gate) -> Self {
    Self { step, upstreams, gate }
  }

  pub fn step(&self) -> &Arc<StepContext> {
    &self.step
  }

  /// Outlets of the flow upstreams, in dependency declaration order.
  pub fn upstreams(&self) -> &[IterHandle] {
    &self.upstreams
  }

  /// The single flow upstream an ordinary relay step pulls from.
  pub fn single_upstream(&self) -> FlowResult<IterHandle> {
    match self.upstreams.as_slice() {
      [] => Err(FlowError::NullInput {
        step_id: self.step.id().to_string(),
      }),
      [only] => Ok(only.clone()),
      many => Err(FlowError::Configuration {
        step_id: self.step.id().to_string(),
        message: format!("expected one flow input, found {}", many.len()),
      }),
    }
  }

  pub(crate) fn into_parts(self) -> (Arc<StepContext>, Gate) {
    (self.step, self.gate)
  }
}
