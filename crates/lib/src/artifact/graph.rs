//! Artifact dependency graph.
//!
//! Edges run from a dependency to its dependents. Construction rejects
//! duplicate ids, two artifacts writing the same output, dependencies on
//! artifacts that are not in the graph, and cycles, so a graph that exists
//! can always be split into waves.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use super::{Artifact, ArtifactId};

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("duplicate artifact id: {0}")]
  DuplicateId(ArtifactId),

  #[error("artifacts {first} and {second} both write {path}")]
  DuplicateOutput {
    path: PathBuf,
    first: ArtifactId,
    second: ArtifactId,
  },

  #[error("artifact {artifact} depends on unknown artifact {dependency}")]
  UnknownDependency { artifact: ArtifactId, dependency: ArtifactId },

  #[error("dependency cycle detected involving {0}")]
  Cycle(ArtifactId),
}

/// Validated, acyclic set of artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactGraph {
  graph: DiGraph<Artifact, ()>,
  nodes: HashMap<ArtifactId, NodeIndex>,
}

impl ArtifactGraph {
  pub fn new(artifacts: Vec<Artifact>) -> Result<Self, GraphError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    let mut outputs: HashMap<PathBuf, ArtifactId> = HashMap::new();

    for artifact in artifacts {
      if nodes.contains_key(&artifact.id) {
        return Err(GraphError::DuplicateId(artifact.id));
      }
      if let Some(first) = outputs.get(&artifact.output) {
        return Err(GraphError::DuplicateOutput {
          path: artifact.output.clone(),
          first: first.clone(),
          second: artifact.id,
        });
      }
      outputs.insert(artifact.output.clone(), artifact.id.clone());
      let id = artifact.id.clone();
      let idx = graph.add_node(artifact);
      nodes.insert(id, idx);
    }

    let mut edges = Vec::new();
    for idx in graph.node_indices() {
      let artifact = &graph[idx];
      for dep in &artifact.deps {
        let Some(&dep_idx) = nodes.get(dep) else {
          return Err(GraphError::UnknownDependency {
            artifact: artifact.id.clone(),
            dependency: dep.clone(),
          });
        };
        edges.push((dep_idx, idx));
      }
    }
    for (from, to) in edges {
      graph.add_edge(from, to, ());
    }

    toposort(&graph, None).map_err(|cycle| GraphError::Cycle(graph[cycle.node_id()].id.clone()))?;

    Ok(Self { graph, nodes })
  }

  pub fn get(&self, id: &ArtifactId) -> Option<&Artifact> {
    self.nodes.get(id).map(|&idx| &self.graph[idx])
  }

  pub fn contains(&self, id: &str) -> bool {
    self.nodes.contains_key(&ArtifactId::from(id))
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Artifacts in declaration order.
  pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
    self.graph.node_indices().map(|idx| &self.graph[idx])
  }

  /// Artifacts ordered so every dependency precedes its dependents.
  pub fn topological(&self) -> Vec<&Artifact> {
    self.waves().into_iter().flatten().filter_map(|id| self.get(&id)).collect()
  }

  /// Direct dependencies of `id`.
  pub fn dependencies(&self, id: &ArtifactId) -> Vec<ArtifactId> {
    let Some(&idx) = self.nodes.get(id) else {
      return Vec::new();
    };
    let mut deps: Vec<ArtifactId> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.graph[dep].id.clone())
      .collect();
    deps.sort();
    deps
  }

  /// `id` and everything that transitively depends on it.
  pub fn downstream(&self, id: &ArtifactId) -> BTreeSet<ArtifactId> {
    let mut found = BTreeSet::new();
    let Some(&start) = self.nodes.get(id) else {
      return found;
    };

    let mut queue = VecDeque::from([start]);
    while let Some(idx) = queue.pop_front() {
      if found.insert(self.graph[idx].id.clone()) {
        queue.extend(self.graph.neighbors_directed(idx, Direction::Outgoing));
      }
    }
    found
  }

  /// A new graph without the given artifacts.
  ///
  /// Removing an artifact that others still depend on fails with
  /// [`GraphError::UnknownDependency`], so callers remove whole
  /// [`Self::downstream`] sets.
  pub fn without(&self, removed: &BTreeSet<ArtifactId>) -> Result<Self, GraphError> {
    Self::new(self.iter().filter(|a| !removed.contains(&a.id)).cloned().collect())
  }

  /// Group artifacts into waves: every artifact's dependencies lie in
  /// earlier waves. Within a wave, declaration order is kept.
  pub fn waves(&self) -> Vec<Vec<ArtifactId>> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let ready: Vec<NodeIndex> = self
        .graph
        .node_indices()
        .filter(|idx| remaining.contains(idx) && in_degree[idx] == 0)
        .collect();

      // Acyclicity is checked at construction.
      if ready.is_empty() {
        break;
      }

      for &idx in &ready {
        remaining.remove(&idx);
        for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&dependent) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      waves.push(ready.into_iter().map(|idx| self.graph[idx].id.clone()).collect());
    }

    waves
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::artifact::ArtifactKind;
  use crate::util::testutil::noop_planner;

  fn artifact(id: &str, deps: &[&str]) -> Artifact {
    Artifact::new(id, ArtifactKind::Executable, format!("out/{}", id), noop_planner()).depends_on(deps.iter().copied())
  }

  fn ids(wave: &[ArtifactId]) -> Vec<&str> {
    wave.iter().map(|id| id.as_str()).collect()
  }

  #[test]
  fn empty_graph() {
    let graph = ArtifactGraph::new(Vec::new()).unwrap();
    assert!(graph.is_empty());
    assert!(graph.waves().is_empty());
  }

  #[test]
  fn linear_chain() {
    let graph = ArtifactGraph::new(vec![
      artifact("installer", &["stdlib"]),
      artifact("stdlib", &["core"]),
      artifact("core", &[]),
    ])
    .unwrap();

    let waves = graph.waves();
    assert_eq!(waves.len(), 3);
    assert_eq!(ids(&waves[0]), vec!["core"]);
    assert_eq!(ids(&waves[1]), vec!["stdlib"]);
    assert_eq!(ids(&waves[2]), vec!["installer"]);

    let topo: Vec<&str> = graph.topological().iter().map(|a| a.id.as_str()).collect();
    assert_eq!(topo, vec!["core", "stdlib", "installer"]);
  }

  #[test]
  fn n8_artifact_set_waves() {
    let graph = ArtifactGraph::new(vec![
      artifact("core", &[]),
      artifact("n8", &["core"]),
      artifact("stdlib", &["core"]),
      artifact("uninstaller", &[]),
      artifact("installer", &["n8", "stdlib", "uninstaller"]),
    ])
    .unwrap();

    let waves = graph.waves();
    assert_eq!(ids(&waves[0]), vec!["core", "uninstaller"]);
    assert_eq!(ids(&waves[1]), vec!["n8", "stdlib"]);
    assert_eq!(ids(&waves[2]), vec!["installer"]);
    assert_eq!(
      graph.dependencies(&ArtifactId::from("installer")),
      vec![ArtifactId::from("n8"), ArtifactId::from("stdlib"), ArtifactId::from("uninstaller")]
    );
  }

  #[test]
  fn downstream_closure_and_removal() {
    let graph = ArtifactGraph::new(vec![
      artifact("core", &[]),
      artifact("n8", &["core"]),
      artifact("stdlib", &["core"]),
      artifact("package", &["n8", "stdlib"]),
    ])
    .unwrap();

    let down = graph.downstream(&ArtifactId::from("stdlib"));
    assert_eq!(down.iter().map(|id| id.as_str()).collect::<Vec<_>>(), vec!["package", "stdlib"]);

    let pruned = graph.without(&down).unwrap();
    assert_eq!(pruned.len(), 2);
    assert!(pruned.contains("n8"));
    assert!(!pruned.contains("package"));
  }

  #[test]
  fn rejects_cycles() {
    let err = ArtifactGraph::new(vec![artifact("a", &["b"]), artifact("b", &["a"])]).unwrap_err();
    assert!(matches!(err, GraphError::Cycle(_)));
  }

  #[test]
  fn rejects_duplicate_ids() {
    let err = ArtifactGraph::new(vec![artifact("a", &[]), artifact("a", &[])]).unwrap_err();
    assert!(matches!(err, GraphError::DuplicateId(id) if id.as_str() == "a"));
  }

  #[test]
  fn rejects_shared_output_paths() {
    let a = Artifact::new("a", ArtifactKind::Executable, "out/same", noop_planner());
    let b = Artifact::new("b", ArtifactKind::SharedLibrary, "out/same", noop_planner());
    let err = ArtifactGraph::new(vec![a, b]).unwrap_err();
    assert!(matches!(err, GraphError::DuplicateOutput { .. }));
  }

  #[test]
  fn rejects_unknown_dependencies() {
    let err = ArtifactGraph::new(vec![artifact("n8", &["core"])]).unwrap_err();
    assert!(matches!(err, GraphError::UnknownDependency { .. }));
  }
}
