// flowline/src/core/control.rs

//! Tagged results passed between iterators, and the outcome of a full run.

use crate::core::status::EngineStatus;
use serde_json::Value;

/// A unit of data moving through the dataflow.
pub type Record = Value;

/// Result of a single `next()` call on a [`FlowIterator`](crate::FlowIterator).
#[derive(Debug, Clone, PartialEq)]
pub enum Pull {
  /// A new value was produced.
  Value(Record),
  /// The no-op sentinel: a value was consumed but declined (filtered). Not an error,
  /// and iteration counters do not advance.
  Skip,
  /// Nothing was produced this call. Either the iterator is finished, or it is
  /// waiting on a gate and may produce later.
  Empty,
}

impl Pull {
  pub fn into_value(self) -> Option<Record> {
    match self {
      Pull::Value(v) => Some(v),
      _ => None,
    }
  }

  pub fn is_value(&self) -> bool {
    matches!(self, Pull::Value(_))
  }
}

/// What a source yields when an iterator pulls it forward.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
  Value(Record),
  /// Upstream declined a value; pass the sentinel through.
  Skip,
  /// No value right now, but the source is not exhausted.
  Pending,
  /// No current value and none will follow.
  End,
}

/// Outcome of a successful [`Engine::execute`](crate::Engine::execute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
  pub status: EngineStatus,
  /// Scheduling ticks the driver took.
  pub ticks: u64,
  /// Values pulled off the end of flow branches by flow caps.
  pub records_drained: u64,
}
