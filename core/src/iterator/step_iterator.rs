// flowline/src/iterator/step_iterator.rs

use crate::core::context::StepContext;
use crate::core::control::{Fetch, Pull, Record};
use crate::core::status::StepStatus;
use crate::core::step_type::Cursor;
use crate::error::FlowResult;
use crate::iterator::source::{CursorSource, Source, UpstreamSource};
use crate::iterator::{FlowIterator, Gate, IteratorWiring};
use std::sync::Arc;
use tracing::{event, Level};

/// The iterator every flow step owns. The pull algorithm lives here once; the
/// [`Source`] decides what pulling upstream and fetching a value mean.
///
/// `next` pulls upstream synchronously, so one call recurses once per flow step
/// on the path to the producer. Very long flow chains need a thread with a
/// correspondingly large stack.
pub struct StepIterator<S: Source> {
  step: Arc<StepContext>,
  source: S,
  gate: Gate,
  current: Option<Record>,
  finished: bool,
  iterations: u64,
}

impl StepIterator<UpstreamSource> {
  /// Relays the step's single flow upstream.
  pub fn over_upstream(wiring: IteratorWiring) -> FlowResult<Self> {
    let upstream = wiring.single_upstream()?;
    Ok(Self::with_source(wiring, UpstreamSource::new(upstream)))
  }
}

impl StepIterator<CursorSource> {
  pub fn over_cursor(wiring: IteratorWiring, cursor: Box<dyn Cursor>) -> Self {
    let source = CursorSource::new(Arc::clone(wiring.step()), cursor);
    Self::with_source(wiring, source)
  }
}

impl<S: Source> StepIterator<S> {
  pub fn with_source(wiring: IteratorWiring, source: S) -> Self {
    let (step, gate) = wiring.into_parts();
    Self {
      step,
      source,
      gate,
      current: None,
      finished: false,
      iterations: 0,
    }
  }

  pub fn step(&self) -> &StepContext {
    &self.step
  }

  fn finish(&mut self) {
    if !self.finished {
      self.finished = true;
      event!(
        Level::DEBUG,
        step_id = %self.step.id(),
        iterations = self.iterations,
        "Iterator finished."
      );
    }
    self.step.set_status(StepStatus::Finished);
  }

  fn stop(&mut self) {
    self.finished = true;
    self.source.abort();
    self.step.set_status(StepStatus::Aborted);
  }
}

impl<S: Source> FlowIterator for StepIterator<S> {
  fn is_finished(&self) -> bool {
    self.finished || self.step.is_run_aborted()
  }

  fn is_ready(&self) -> bool {
    !self.is_finished() && self.gate.is_satisfied() && self.source.is_ready()
  }

  fn abort(&mut self) {
    if !self.finished {
      event!(Level::DEBUG, step_id = %self.step.id(), "Iterator aborted.");
    }
    self.stop();
  }

  fn next(&mut self, caller: &str) -> FlowResult<Pull> {
    if self.finished {
      return Ok(Pull::Empty);
    }
    if self.step.is_run_aborted() {
      self.stop();
      return Ok(Pull::Empty);
    }
    if !self.gate.open(self.step.id())? {
      self.step.set_status(StepStatus::Blocked);
      return Ok(Pull::Empty);
    }

    event!(Level::TRACE, step_id = %self.step.id(), caller, "Pulling source.");
    let fetched = match self.source.pull(self.step.id()) {
      Ok(fetched) => fetched,
      Err(e) => {
        self.stop();
        return Err(e);
      }
    };
    // The final upstream value is still delivered before finishing.
    let last = self.source.is_exhausted();

    if self.step.is_run_aborted() {
      self.stop();
      return Ok(Pull::Empty);
    }

    let pulled = match fetched {
      Fetch::End => {
        self.finish();
        return Ok(Pull::Empty);
      }
      Fetch::Pending => {
        self.step.set_status(StepStatus::Blocked);
        return Ok(Pull::Empty);
      }
      Fetch::Skip => Pull::Skip,
      Fetch::Value(value) => match self.step.execute(value) {
        Ok(Some(out)) => {
          self.iterations += 1;
          self.current = Some(out.clone());
          Pull::Value(out)
        }
        Ok(None) => Pull::Skip,
        Err(e) => {
          self.finished = true;
          return Err(e);
        }
      },
    };

    if last {
      self.finish();
    }
    Ok(pulled)
  }

  fn current(&self) -> Option<&Record> {
    self.current.as_ref()
  }

  fn iterations(&self) -> u64 {
    self.iterations
  }
}
