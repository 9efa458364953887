// flowline/src/iterator/fanout.rs

//! Explicit multi-consumer primitive for cloning steps.
//!
//! The cloning step's own iterator is pulled at most once per value; each
//! downstream branch gets its own queue holding the copies the other branches
//! caused to be pulled.

use crate::core::control::{Pull, Record};
use crate::error::{FlowError, FlowResult};
use crate::iterator::{FlowIterator, IterHandle};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct FanOutState {
  source: IterHandle,
  queues: IndexMap<String, VecDeque<Record>>,
}

/// Per-branch outlets over one shared iterator.
pub struct FanOut {
  source: IterHandle,
  branches: IndexMap<String, IterHandle>,
}

impl FanOut {
  pub fn new<I, S>(source: IterHandle, branch_ids: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let ids: Vec<String> = branch_ids.into_iter().map(Into::into).collect();
    let state = Arc::new(Mutex::new(FanOutState {
      source: source.clone(),
      queues: ids.iter().map(|id| (id.clone(), VecDeque::new())).collect(),
    }));
    let branches = ids
      .into_iter()
      .map(|id| {
        let branch = BranchIterator {
          state: Arc::clone(&state),
          branch: id.clone(),
          current: None,
          finished: false,
          iterations: 0,
        };
        (id, IterHandle::new(Box::new(branch)))
      })
      .collect();
    Self { source, branches }
  }

  pub fn source(&self) -> &IterHandle {
    &self.source
  }

  pub fn branch(&self, id: &str) -> FlowResult<IterHandle> {
    self
      .branches
      .get(id)
      .cloned()
      .ok_or_else(|| FlowError::Internal(format!("no fan-out branch for downstream '{id}'")))
  }

  pub fn branch_ids(&self) -> impl Iterator<Item = &str> {
    self.branches.keys().map(String::as_str)
  }

  pub fn abort(&self) {
    self.source.abort();
    for branch in self.branches.values() {
      branch.abort();
    }
  }
}

struct BranchIterator {
  state: Arc<Mutex<FanOutState>>,
  branch: String,
  current: Option<Record>,
  finished: bool,
  iterations: u64,
}

impl BranchIterator {
  fn deliver(&mut self, value: Record) -> Pull {
    self.iterations += 1;
    self.current = Some(value.clone());
    Pull::Value(value)
  }
}

impl FlowIterator for BranchIterator {
  fn is_finished(&self) -> bool {
    if self.finished {
      return true;
    }
    let state = self.state.lock();
    let drained = state.queues.get(&self.branch).map_or(true, VecDeque::is_empty);
    drained && state.source.is_finished()
  }

  fn is_ready(&self) -> bool {
    if self.finished {
      return false;
    }
    let state = self.state.lock();
    let queued = state.queues.get(&self.branch).map_or(false, |q| !q.is_empty());
    queued || state.source.is_ready()
  }

  fn abort(&mut self) {
    self.finished = true;
    if let Some(queue) = self.state.lock().queues.get_mut(&self.branch) {
      queue.clear();
    }
  }

  fn next(&mut self, caller: &str) -> FlowResult<Pull> {
    if self.finished {
      return Ok(Pull::Empty);
    }
    let mut state = self.state.lock();

    let queued = state.queues.get_mut(&self.branch).and_then(VecDeque::pop_front);
    if let Some(value) = queued {
      let exhausted = state.source.is_finished() && state.queues.get(&self.branch).map_or(true, VecDeque::is_empty);
      drop(state);
      let pulled = self.deliver(value);
      if exhausted {
        self.finished = true;
      }
      return Ok(pulled);
    }

    if state.source.is_finished() {
      self.finished = true;
      return Ok(Pull::Empty);
    }

    let pulled = state.source.next(caller)?;
    if let Pull::Value(value) = &pulled {
      for (id, queue) in state.queues.iter_mut() {
        if id != &self.branch {
          queue.push_back(value.clone());
        }
      }
    }
    let exhausted = state.source.is_finished();
    drop(state);

    let pulled = match pulled {
      Pull::Value(value) => self.deliver(value),
      other => other,
    };
    if exhausted {
      self.finished = true;
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
