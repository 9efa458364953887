// flowline/src/iterator/source.rs

//! What "pull the source forward and fetch its current value" means for each
//! kind of iterator: relaying another iterator, adapting a foreign cursor, or
//! merging several upstreams.

use crate::core::context::StepContext;
use crate::core::control::{Fetch, Pull, Record};
use crate::core::step_type::Cursor;
use crate::error::{FlowError, FlowResult};
use crate::iterator::IterHandle;
use std::collections::VecDeque;
use std::sync::Arc;

pub trait Source: Send {
  /// Advances the source and returns its new current value.
  fn pull(&mut self, caller: &str) -> FlowResult<Fetch>;

  /// No value will follow the one last pulled.
  fn is_exhausted(&self) -> bool;

  fn is_ready(&self) -> bool {
    !self.is_exhausted()
  }

  fn abort(&mut self) {}
}

/// Relays another iterator of this same protocol.
pub struct UpstreamSource {
  upstream: IterHandle,
}

impl UpstreamSource {
  pub fn new(upstream: IterHandle) -> Self {
    Self { upstream }
  }
}

impl Source for UpstreamSource {
  fn pull(&mut self, caller: &str) -> FlowResult<Fetch> {
    Ok(match self.upstream.next(caller)? {
      Pull::Value(v) => Fetch::Value(v),
      Pull::Skip => Fetch::Skip,
      Pull::Empty if self.upstream.is_finished() => Fetch::End,
      Pull::Empty => Fetch::Pending,
    })
  }

  fn is_exhausted(&self) -> bool {
    self.upstream.is_finished()
  }

  fn is_ready(&self) -> bool {
    self.upstream.is_ready()
  }
}

/// Adapts a foreign [`Cursor`] into the iterator protocol.
pub struct CursorSource {
  step: Arc<StepContext>,
  cursor: Box<dyn Cursor>,
}

impl CursorSource {
  pub fn new(step: Arc<StepContext>, cursor: Box<dyn Cursor>) -> Self {
    Self { step, cursor }
  }
}

impl Source for CursorSource {
  fn pull(&mut self, _caller: &str) -> FlowResult<Fetch> {
    if !self.cursor.has_more() {
      return Ok(Fetch::End);
    }
    let Some(value) = self.cursor.current() else {
      return Ok(Fetch::End);
    };
    self.cursor.advance().map_err(|e| self.step.fail(e))?;
    Ok(Fetch::Value(value))
  }

  fn is_exhausted(&self) -> bool {
    !self.cursor.has_more()
  }
}

/// Round-robin over several upstreams in stable (declaration) order, skipping
/// the exhausted ones.
pub struct MergeSource {
  upstreams: Vec<IterHandle>,
  next_index: usize,
}

impl MergeSource {
  pub fn new(step_id: &str, upstreams: Vec<IterHandle>) -> FlowResult<Self> {
    if upstreams.is_empty() {
      return Err(FlowError::NullInput {
        step_id: step_id.to_string(),
      });
    }
    Ok(Self {
      upstreams,
      next_index: 0,
    })
  }
}

impl Source for MergeSource {
  fn pull(&mut self, caller: &str) -> FlowResult<Fetch> {
    let count = self.upstreams.len();
    let mut pending = false;
    for _ in 0..count {
      let upstream = &self.upstreams[self.next_index];
      self.next_index = (self.next_index + 1) % count;
      if upstream.is_finished() {
        continue;
      }
      match upstream.next(caller)? {
        Pull::Value(v) => return Ok(Fetch::Value(v)),
        Pull::Skip => return Ok(Fetch::Skip),
        Pull::Empty => {
          if !upstream.is_finished() {
            pending = true;
          }
        }
      }
    }
    Ok(if pending { Fetch::Pending } else { Fetch::End })
  }

  fn is_exhausted(&self) -> bool {
    self.upstreams.iter().all(IterHandle::is_finished)
  }

  fn is_ready(&self) -> bool {
    self.upstreams.iter().any(IterHandle::is_ready)
  }
}

/// In-memory cursor over a fixed sequence of records.
#[derive(Debug, Clone, Default)]
pub struct VecCursor {
  items: VecDeque<Record>,
}

impl VecCursor {
  pub fn new(items: impl IntoIterator<Item = Record>) -> Self {
    Self {
      items: items.into_iter().collect(),
    }
  }
}

impl Cursor for VecCursor {
  fn has_more(&self) -> bool {
    !self.items.is_empty()
  }

  fn current(&self) -> Option<Record> {
    self.items.front().cloned()
  }

  fn advance(&mut self) -> anyhow::Result<()> {
    self.items.pop_front();
    Ok(())
  }
}
