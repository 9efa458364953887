// flowline/src/engine/execution.rs

//! Contains `Engine::execute()`, the driver that pulls every sink to completion.

use crate::core::control::{Pull, RunSummary};
use crate::core::status::{EngineStatus, StepStatus};
use crate::core::step_type::StepKind;
use crate::engine::definition::Engine;
use crate::error::{FlowError, FlowResult};
use chrono::Utc;
use tracing::{event, instrument, span, Level};

const DRIVER: &str = "engine";

/// Enough to tell whether a tick moved anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Progress {
  executions: u64,
  done: usize,
}

impl Engine {
  /// Drives every connector sink and flow cap until all are finished or the run
  /// is aborted.
  ///
  /// Each tick visits connector sinks and then flow caps, each in definition order,
  /// and pulls every unfinished flow cap at most once, so branches that share an
  /// upstream advance in lockstep.
  ///
  /// A failing step aborts the run; its `StepFailed` error is returned once every
  /// iterator is finished and the run recorder has been told. An abort from an
  /// [`AbortHandle`](crate::AbortHandle) is returned as `Aborted`.
  #[instrument(
    name = "Engine::execute",
    skip_all,
    fields(dataflow = %self.name, sinks = self.sinks.len(), flow_caps = self.flow_caps.len()),
    err(Display)
  )]
  pub fn execute(&mut self) -> FlowResult<RunSummary> {
    let status = self.status();
    if status != EngineStatus::Initialised {
      return Err(FlowError::BadStatus {
        operation: "execute",
        expected: EngineStatus::Initialised.to_string(),
        found: status,
      });
    }

    self.recorder.record_run_start(&self.name, Utc::now());
    event!(Level::INFO, "Dataflow run starting.");

    let mut ticks = 0;
    let outcome = self
      .run
      .transition(EngineStatus::Processing)
      .and_then(|_| self.drive(&mut ticks));

    match outcome {
      Ok(()) if !self.run.is_aborted() => match self.run.transition(EngineStatus::Finished) {
        Ok(_) => {
          let summary = RunSummary {
            status: EngineStatus::Finished,
            ticks,
            records_drained: self.flow_caps.iter().map(|c| c.drained()).sum(),
          };
          self.recorder.record_run_end(&self.name, EngineStatus::Finished, Utc::now(), None);
          event!(Level::INFO, ticks, records_drained = summary.records_drained, "Dataflow run finished.");
          Ok(summary)
        }
        Err(e) => Err(self.conclude_aborted(e)),
      },
      Ok(()) => {
        let failure = self.run.failure();
        let error = FlowError::Aborted {
          step_id: failure.as_ref().and_then(|f| f.step_id.clone()),
          reason: failure.map(|f| f.message).unwrap_or_else(|| "aborted".to_string()),
        };
        Err(self.conclude_aborted(error))
      }
      Err(e) => Err(self.conclude_aborted(e)),
    }
  }

  /// Makes sure the run is aborted, finishes every iterator and reports the end.
  fn conclude_aborted(&self, error: FlowError) -> FlowError {
    self.run.abort(error.step_id(), &error.to_string());
    self.abort_steps();
    let failure = self.run.failure();
    self
      .recorder
      .record_run_end(&self.name, EngineStatus::Aborted, Utc::now(), failure.as_ref());
    event!(Level::ERROR, error = %error, "Dataflow run aborted.");
    error
  }

  fn drive(&mut self, ticks: &mut u64) -> FlowResult<()> {
    loop {
      if self.run.is_aborted() {
        return Ok(());
      }
      *ticks += 1;
      let tick_span = span!(Level::TRACE, "driver_tick", tick = *ticks);
      let _tick_guard = tick_span.enter();
      let before = self.progress();

      for sink in self.sinks.iter().filter(|s| s.kind() == StepKind::Connector) {
        if !sink.status().is_done() {
          sink.go(DRIVER)?;
        }
      }

      for index in 0..self.flow_caps.len() {
        if self.run.is_aborted() {
          return Ok(());
        }
        if self.flow_caps[index].is_finished() {
          continue;
        }
        if self.run.status() == EngineStatus::Processing {
          if let Err(e) = self.run.transition(EngineStatus::Flowing) {
            // An abort handle may have won the race.
            if self.run.is_aborted() {
              return Ok(());
            }
            return Err(e);
          }
        }
        if let Pull::Value(_) = self.flow_caps[index].pull()? {
          event!(Level::TRACE, sink = %self.flow_caps[index].step_id(), "Flow cap drained a value.");
        }
      }

      let pending = self.pending_sinks();
      if pending.is_empty() {
        return Ok(());
      }
      if self.run.is_aborted() {
        return Ok(());
      }
      if self.progress() == before {
        event!(Level::ERROR, tick = *ticks, ?pending, "No step made progress during a full tick.");
        return Err(FlowError::Stalled { ticks: *ticks, pending });
      }
    }
  }

  fn progress(&self) -> Progress {
    self.steps.values().fold(Progress { executions: 0, done: 0 }, |acc, step| Progress {
      executions: acc.executions + step.context().executions(),
      done: acc.done + usize::from(step.status() == StepStatus::Finished),
    })
  }

  /// Connector sinks not yet done and flow caps not yet finished.
  fn pending_sinks(&self) -> Vec<String> {
    let connectors = self
      .sinks
      .iter()
      .filter(|s| s.kind() == StepKind::Connector && !s.status().is_done())
      .map(|s| s.id().to_string());
    let caps = self
      .flow_caps
      .iter()
      .filter(|c| !c.is_finished())
      .map(|c| c.step_id().to_string());
    connectors.chain(caps).collect()
  }
}
