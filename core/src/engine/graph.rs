// flowline/src/engine/graph.rs

//! Graph construction and validation, done before any engine step exists.

use crate::core::step::Dataflow;
use crate::core::step_type::{StepKind, StepRole, StepType};
use crate::error::{FlowError, FlowResult};
use indexmap::IndexMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{event, Level};

/// Realized links of one step, split by kind, each in a stable order: upstreams in
/// dependency declaration order, downstreams in dataflow definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepLinks {
  pub upstream_flow: Vec<String>,
  pub upstream_connector: Vec<String>,
  pub downstream_flow: Vec<String>,
  pub downstream_connector: Vec<String>,
}

/// Validated shape of a dataflow.
#[derive(Debug, Clone)]
pub struct Topology {
  /// Every step after all of its dependencies; ties broken by definition order.
  pub order: Vec<String>,
  /// Per-step links, in definition order.
  pub links: IndexMap<String, StepLinks>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  InProgress,
  Done,
}

/// An edge `upstream -> downstream` carries records only between two flow steps.
pub fn is_flow_link(upstream: StepKind, downstream: StepKind) -> bool {
  upstream == StepKind::Flow && downstream == StepKind::Flow
}

/// Checks every construction rule and returns the graph's topology.
///
/// `types` must hold the resolved step type of every step in `dataflow`.
pub fn validate(dataflow: &Dataflow, types: &IndexMap<String, Arc<dyn StepType>>) -> FlowResult<Topology> {
  if let Some(step_id) = dataflow.duplicates.first() {
    return Err(FlowError::DuplicateStep {
      step_id: step_id.clone(),
    });
  }

  let deps = resolve_dependencies(dataflow)?;
  let order = topological_order(&deps)?;
  check_triggers(types)?;

  let links = build_links(&deps, types)?;
  for (id, step_links) in &links {
    check_mixed(id, step_links)?;
    let step_type = types
      .get(id)
      .ok_or_else(|| FlowError::Internal(format!("no resolved step type for '{id}'")))?;
    check_arity(id, step_links, step_type.as_ref())?;
  }

  event!(Level::DEBUG, dataflow = %dataflow.name, steps = order.len(), "Dataflow graph validated.");
  Ok(Topology { order, links })
}

/// Dependency ids per step, de-duplicated in declaration order.
fn resolve_dependencies(dataflow: &Dataflow) -> FlowResult<IndexMap<String, Vec<String>>> {
  let mut deps = IndexMap::with_capacity(dataflow.len());
  for (id, def) in &dataflow.steps {
    let mut resolved: Vec<String> = Vec::with_capacity(def.depends_on.len());
    for dep in def.dependencies() {
      if !dataflow.steps.contains_key(dep) {
        return Err(FlowError::UnknownDependency {
          step_id: id.clone(),
          dependency: dep.clone(),
        });
      }
      if !resolved.contains(dep) {
        resolved.push(dep.clone());
      }
    }
    deps.insert(id.clone(), resolved);
  }
  Ok(deps)
}

/// Three-colour depth-first search over dependency edges. A back-edge to an
/// in-progress node is a cycle; post-order yields dependencies first.
///
/// Iterative, so graph depth is not bounded by the thread's stack.
pub(crate) fn topological_order(deps: &IndexMap<String, Vec<String>>) -> FlowResult<Vec<String>> {
  let mut marks: IndexMap<&str, Mark> = deps.keys().map(|id| (id.as_str(), Mark::Unvisited)).collect();
  let mut order = Vec::with_capacity(deps.len());
  // (step, index of its next dependency); the stack is also the current path.
  let mut stack: Vec<(&str, usize)> = Vec::new();

  for root in deps.keys() {
    if marks.get(root.as_str()).copied() != Some(Mark::Unvisited) {
      continue;
    }
    marks.insert(root.as_str(), Mark::InProgress);
    stack.push((root.as_str(), 0));

    while let Some(&(id, next)) = stack.last() {
      let children = deps.get(id).map(Vec::as_slice).unwrap_or_default();
      let Some(dep) = children.get(next) else {
        stack.pop();
        marks.insert(id, Mark::Done);
        order.push(id.to_string());
        continue;
      };
      if let Some(top) = stack.last_mut() {
        top.1 += 1;
      }
      match marks.get(dep.as_str()).copied().unwrap_or(Mark::Unvisited) {
        Mark::Done => {}
        Mark::InProgress => {
          let start = stack.iter().position(|(s, _)| *s == dep.as_str()).unwrap_or(0);
          let mut cycle: Vec<String> = stack[start..].iter().map(|(s, _)| s.to_string()).collect();
          cycle.push(dep.clone());
          return Err(FlowError::NotADag { cycle });
        }
        Mark::Unvisited => {
          marks.insert(dep.as_str(), Mark::InProgress);
          stack.push((dep.as_str(), 0));
        }
      }
    }
  }
  Ok(order)
}

fn check_triggers(types: &IndexMap<String, Arc<dyn StepType>>) -> FlowResult<()> {
  let triggers: Vec<String> = types
    .iter()
    .filter(|(_, t)| t.role() == StepRole::Trigger)
    .map(|(id, _)| id.clone())
    .collect();
  if triggers.len() > 1 {
    return Err(FlowError::TooManyTriggers { triggers });
  }
  Ok(())
}

fn build_links(
  deps: &IndexMap<String, Vec<String>>,
  types: &IndexMap<String, Arc<dyn StepType>>,
) -> FlowResult<IndexMap<String, StepLinks>> {
  let kind_of = |id: &str| -> FlowResult<StepKind> {
    types
      .get(id)
      .map(|t| t.kind())
      .ok_or_else(|| FlowError::Internal(format!("no resolved step type for '{id}'")))
  };

  let mut links: IndexMap<String, StepLinks> = deps.keys().map(|id| (id.clone(), StepLinks::default())).collect();
  for (id, upstreams) in deps {
    let kind = kind_of(id)?;
    for up in upstreams {
      let flow = is_flow_link(kind_of(up)?, kind);
      let this = &mut links[id.as_str()];
      if flow {
        this.upstream_flow.push(up.clone());
      } else {
        this.upstream_connector.push(up.clone());
      }
      let upstream = &mut links[up.as_str()];
      if flow {
        upstream.downstream_flow.push(id.clone());
      } else {
        upstream.downstream_connector.push(id.clone());
      }
    }
  }
  Ok(links)
}

fn check_mixed(id: &str, links: &StepLinks) -> FlowResult<()> {
  if !links.upstream_flow.is_empty() && !links.upstream_connector.is_empty() {
    return Err(FlowError::MixedLinkKinds {
      step_id: id.to_string(),
      port: "inputs",
    });
  }
  if !links.downstream_flow.is_empty() && !links.downstream_connector.is_empty() {
    return Err(FlowError::MixedLinkKinds {
      step_id: id.to_string(),
      port: "outputs",
    });
  }
  Ok(())
}

fn check_arity(id: &str, links: &StepLinks, step_type: &dyn StepType) -> FlowResult<()> {
  let ports = step_type.ports();
  let checks: [(&'static str, usize, &RangeInclusive<usize>); 4] = [
    ("flow input", links.upstream_flow.len(), &ports.inputs_flow),
    ("connector input", links.upstream_connector.len(), &ports.inputs_connector),
    ("flow output", links.downstream_flow.len(), &ports.outputs_flow),
    ("connector output", links.downstream_connector.len(), &ports.outputs_connector),
  ];
  for (port, actual, range) in checks {
    if !range.contains(&actual) {
      return Err(FlowError::ArityViolation {
        step_id: id.to_string(),
        port,
        actual,
        min: *range.start(),
        max: *range.end(),
      });
    }
  }
  Ok(())
}
