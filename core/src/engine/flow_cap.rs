// flowline/src/engine/flow_cap.rs

use crate::core::control::Pull;
use crate::engine::engine_step::EngineStep;
use crate::error::FlowResult;
use crate::iterator::IterHandle;

/// Synthetic terminal node that drains a flow sink, so every branch is fully
/// iterated even when nothing consumes its result.
#[derive(Debug)]
pub struct FlowCap {
  step_id: String,
  caller: String,
  iterator: IterHandle,
  drained: u64,
}

impl FlowCap {
  pub(crate) fn new(sink: &EngineStep) -> FlowResult<Self> {
    let caller = format!("flowcap:{}", sink.id());
    let iterator = sink.outlet_for(&caller)?;
    Ok(Self {
      step_id: sink.id().to_string(),
      caller,
      iterator,
      drained: 0,
    })
  }

  /// Id of the sink this cap drains.
  pub fn step_id(&self) -> &str {
    &self.step_id
  }

  pub fn is_finished(&self) -> bool {
    self.iterator.is_finished()
  }

  /// Values pulled and discarded so far.
  pub fn drained(&self) -> u64 {
    self.drained
  }

  /// Pulls the sink once and discards whatever it yields.
  pub(crate) fn pull(&mut self) -> FlowResult<Pull> {
    let pulled = self.iterator.next(&self.caller)?;
    if pulled.is_value() {
      self.drained += 1;
    }
    Ok(pulled)
  }
}
