//! Skill prerequisite graph.
//!
//! Edges point from a prerequisite to the skill that needs it. New edges are checked for
//! reachability in the opposite direction before insertion. Stored data is loaded as-is
//! through [`SkillGraph::load`]; a cycle in it only surfaces when [`SkillGraph::order`] is
//! asked to order skills on that cycle.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use thiserror::Error;
use tracing::warn;

use crate::ids::SkillId;
use crate::model::{PrerequisiteEdge, Skill};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown skill: {0}")]
    UnknownSkill(SkillId),

    #[error("prerequisite {from} -> {to} would create a cycle")]
    Cycle { from: SkillId, to: SkillId },
}

#[derive(Debug, Default, Clone)]
pub struct SkillGraph {
    graph: DiGraph<Skill, ()>,
    index: HashMap<SkillId, NodeIndex>,
}

impl SkillGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from stored skills and edges, rejecting edges that close a cycle.
    pub fn from_parts(
        skills: impl IntoIterator<Item = Skill>,
        edges: impl IntoIterator<Item = PrerequisiteEdge>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for skill in skills {
            graph.add_skill(skill);
        }
        for edge in edges {
            graph.add_prerequisite(&edge.from, &edge.to)?;
        }
        Ok(graph)
    }

    /// Build a graph from stored rows without rejecting any of them.
    ///
    /// Edges naming an unknown skill are skipped with a warning. Edges that close a cycle are
    /// kept so the cycle is reported only by operations that need those skills ordered.
    pub fn load(
        skills: impl IntoIterator<Item = Skill>,
        edges: impl IntoIterator<Item = PrerequisiteEdge>,
    ) -> Self {
        let mut graph = Self::new();
        for skill in skills {
            graph.add_skill(skill);
        }
        for edge in edges {
            let (Ok(source), Ok(target)) = (graph.node(&edge.from), graph.node(&edge.to)) else {
                warn!(from = %edge.from, to = %edge.to, "skipping prerequisite edge to an unknown skill");
                continue;
            };
            if graph.would_create_cycle(source, target) {
                warn!(from = %edge.from, to = %edge.to, "stored prerequisite edge closes a cycle");
            }
            if graph.graph.find_edge(source, target).is_none() {
                graph.graph.add_edge(source, target, ());
            }
        }
        graph
    }

    /// Insert or replace a skill node.
    pub fn add_skill(&mut self, skill: Skill) {
        match self.index.get(&skill.id) {
            Some(&idx) => self.graph[idx] = skill,
            None => {
                let id = skill.id.clone();
                let idx = self.graph.add_node(skill);
                self.index.insert(id, idx);
            }
        }
    }

    /// Add `from -> to`. Duplicate edges are ignored.
    pub fn add_prerequisite(&mut self, from: &SkillId, to: &SkillId) -> Result<(), GraphError> {
        let source = self.node(from)?;
        let target = self.node(to)?;

        if self.would_create_cycle(source, target) {
            return Err(GraphError::Cycle {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if self.graph.find_edge(source, target).is_none() {
            self.graph.add_edge(source, target, ());
        }
        Ok(())
    }

    /// Whether inserting `from -> to` would close a cycle.
    pub fn check_prerequisite(&self, from: &SkillId, to: &SkillId) -> Result<(), GraphError> {
        let source = self.node(from)?;
        let target = self.node(to)?;
        if self.would_create_cycle(source, target) {
            return Err(GraphError::Cycle {
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok(())
    }

    fn would_create_cycle(&self, source: NodeIndex, target: NodeIndex) -> bool {
        source == target || self.has_path(target, source)
    }

    fn has_path(&self, from: NodeIndex, to: NodeIndex) -> bool {
        let mut dfs = Dfs::new(&self.graph, from);
        while let Some(node) = dfs.next(&self.graph) {
            if node == to {
                return true;
            }
        }
        false
    }

    fn node(&self, id: &SkillId) -> Result<NodeIndex, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownSkill(id.clone()))
    }

    pub fn skill(&self, id: &SkillId) -> Option<&Skill> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn skills(&self) -> impl Iterator<Item = &Skill> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Resolve a learner-supplied label (id, slug or name).
    pub fn find(&self, label: &str) -> Option<&Skill> {
        self.skills().find(|s| s.matches_label(label))
    }

    /// Direct prerequisites of a skill.
    pub fn prerequisites(&self, id: &SkillId) -> Vec<&Skill> {
        match self.index.get(id) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .map(|n| &self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether `prerequisite` must be learned, directly or transitively, before `skill`.
    pub fn depends_on(&self, skill: &SkillId, prerequisite: &SkillId) -> bool {
        match (self.index.get(prerequisite), self.index.get(skill)) {
            (Some(&from), Some(&to)) => from != to && self.has_path(from, to),
            _ => false,
        }
    }

    /// The targets plus every transitive prerequisite. Unknown ids are skipped.
    pub fn with_prerequisites<'a>(
        &self,
        targets: impl IntoIterator<Item = &'a SkillId>,
    ) -> HashSet<SkillId> {
        let reversed = Reversed(&self.graph);
        let mut closure = HashSet::new();
        for target in targets {
            let Some(&start) = self.index.get(target) else {
                continue;
            };
            let mut dfs = Dfs::new(reversed, start);
            while let Some(node) = dfs.next(reversed) {
                closure.insert(self.graph[node].id.clone());
            }
        }
        closure
    }

    /// Topological order of the subgraph induced by `subset`.
    ///
    /// Ready skills are taken by (level, slug, id) so the order is deterministic.
    pub fn order(&self, subset: &HashSet<SkillId>) -> Result<Vec<Skill>, GraphError> {
        let nodes: Vec<NodeIndex> = subset
            .iter()
            .filter_map(|id| self.index.get(id).copied())
            .collect();
        let members: HashSet<NodeIndex> = nodes.iter().copied().collect();

        let mut in_degree: HashMap<NodeIndex, usize> = nodes
            .iter()
            .map(|&n| {
                let deg = self
                    .graph
                    .neighbors_directed(n, Direction::Incoming)
                    .filter(|p| members.contains(p))
                    .count();
                (n, deg)
            })
            .collect();

        let key = |n: NodeIndex| {
            let skill = &self.graph[n];
            (skill.level, skill.slug.clone(), skill.id.clone(), n)
        };
        let mut ready: BTreeSet<_> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&n, _)| key(n))
            .collect();

        let mut ordered = Vec::with_capacity(nodes.len());
        while let Some(entry) = ready.pop_first() {
            let node = entry.3;
            ordered.push(self.graph[node].clone());
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(key(next));
                    }
                }
            }
        }

        if ordered.len() != nodes.len() {
            let stuck = in_degree
                .iter()
                .find(|&(_, &deg)| deg > 0)
                .map(|(&n, _)| self.graph[n].id.clone());
            if let Some(id) = stuck {
                return Err(GraphError::Cycle {
                    from: id.clone(),
                    to: id,
                });
            }
        }
        Ok(ordered)
    }

    /// Strongly connected components larger than one node.
    pub fn find_cycles(&self) -> Vec<Vec<SkillId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| scc.into_iter().map(|n| self.graph[n].id.clone()).collect())
            .collect()
    }
}
