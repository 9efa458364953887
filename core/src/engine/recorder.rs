// flowline/src/engine/recorder.rs

//! Boundary to whatever persists run history. The engine only reports; it never
//! stores anything itself.

use crate::core::run_state::RunFailure;
use crate::core::status::EngineStatus;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub trait RunRecorder: Send + Sync {
  fn record_run_start(&self, dataflow: &str, started_at: DateTime<Utc>);

  /// `failure` is set when the run was aborted.
  fn record_run_end(&self, dataflow: &str, status: EngineStatus, ended_at: DateTime<Utc>, failure: Option<&RunFailure>);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl RunRecorder for NoopRecorder {
  fn record_run_start(&self, _dataflow: &str, _started_at: DateTime<Utc>) {}

  fn record_run_end(&self, _dataflow: &str, _status: EngineStatus, _ended_at: DateTime<Utc>, _failure: Option<&RunFailure>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunRecord {
  Started {
    dataflow: String,
    at: DateTime<Utc>,
  },
  Ended {
    dataflow: String,
    status: EngineStatus,
    at: DateTime<Utc>,
    failure: Option<RunFailure>,
  },
}

/// Keeps every report in memory, in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
  records: Mutex<Vec<RunRecord>>,
}

impl InMemoryRecorder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn records(&self) -> Vec<RunRecord> {
    self.records.lock().clone()
  }

  /// Status and failure of the most recent finished run.
  pub fn last_end(&self) -> Option<(EngineStatus, Option<RunFailure>)> {
    self.records.lock().iter().rev().find_map(|r| match r {
      RunRecord::Ended { status, failure, .. } => Some((*status, failure.clone())),
      RunRecord::Started { .. } => None,
    })
  }
}

impl RunRecorder for InMemoryRecorder {
  fn record_run_start(&self, dataflow: &str, started_at: DateTime<Utc>) {
    self.records.lock().push(RunRecord::Started {
      dataflow: dataflow.to_string(),
      at: started_at,
    });
  }

  fn record_run_end(&self, dataflow: &str, status: EngineStatus, ended_at: DateTime<Utc>, failure: Option<&RunFailure>) {
    self.records.lock().push(RunRecord::Ended {
      dataflow: dataflow.to_string(),
      status,
      at: ended_at,
      failure: failure.cloned(),
    });
  }
}
