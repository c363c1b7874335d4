//! In-memory skill graph.
//!
//! Uses `petgraph` for the edge structure and `DashMap` for lookups by id and
//! by lowercase name. Neighbour lists are always returned in
//! `(order_index, id)` order so traversals are deterministic.

use std::collections::HashSet;
use std::sync::RwLock;

use dashmap::DashMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::GraphError;

use super::{Skill, SkillConnection, SkillId};

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Edge payload.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectionData {
    relationship_type: String,
    weight: u32,
}

/// Skill prerequisite graph.
pub struct SkillGraph {
    /// Nodes are skill ids; an edge `a → b` means `a` is a prerequisite of `b`.
    graph: RwLock<DiGraph<SkillId, ConnectionData>>,
    node_index: DashMap<SkillId, NodeIndex>,
    skills: DashMap<SkillId, Skill>,
    /// Lowercase trimmed name → id.
    name_index: DashMap<String, SkillId>,
}

impl SkillGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            skills: DashMap::new(),
            name_index: DashMap::new(),
        }
    }

    /// Add a skill. Ids must be unique.
    pub fn insert_skill(&self, skill: Skill) -> GraphResult<()> {
        if self.skills.contains_key(&skill.id) {
            return Err(GraphError::DuplicateSkill {
                id: skill.id.to_string(),
            });
        }
        let idx = {
            let mut graph = self.graph.write().expect("graph lock poisoned");
            graph.add_node(skill.id.clone())
        };
        self.node_index.insert(skill.id.clone(), idx);
        self.name_index
            .insert(normalize_name(&skill.name), skill.id.clone());
        self.skills.insert(skill.id.clone(), skill);
        Ok(())
    }

    /// Add a prerequisite edge. Returns `false` when the edge already existed.
    pub fn connect(&self, connection: SkillConnection) -> GraphResult<bool> {
        let from = self.index_of(&connection.from_skill)?;
        let to = self.index_of(&connection.to_skill)?;

        let mut graph = self.graph.write().expect("graph lock poisoned");
        if graph.find_edge(from, to).is_some() {
            return Ok(false);
        }
        graph.add_edge(
            from,
            to,
            ConnectionData {
                relationship_type: connection.relationship_type,
                weight: connection.weight,
            },
        );
        Ok(true)
    }

    fn index_of(&self, id: &SkillId) -> GraphResult<NodeIndex> {
        self.node_index
            .get(id)
            .map(|idx| *idx.value())
            .ok_or_else(|| GraphError::SkillNotFound {
                name: id.to_string(),
            })
    }

    /// Look up a skill by id.
    pub fn skill(&self, id: &SkillId) -> Option<Skill> {
        self.skills.get(id).map(|s| s.value().clone())
    }

    /// Look up a skill by name, case-insensitively.
    pub fn skill_by_name(&self, name: &str) -> Option<Skill> {
        let id = self.name_index.get(&normalize_name(name))?.value().clone();
        self.skill(&id)
    }

    /// Resolve user input to a skill: exact name, then id, then the slug of the input.
    pub fn resolve(&self, name_or_id: &str) -> GraphResult<Skill> {
        self.skill_by_name(name_or_id)
            .or_else(|| self.skill(&SkillId::from(name_or_id.trim())))
            .or_else(|| self.skill(&SkillId::from_name(name_or_id)))
            .ok_or_else(|| GraphError::SkillNotFound {
                name: name_or_id.to_string(),
            })
    }

    pub fn contains(&self, id: &SkillId) -> bool {
        self.skills.contains_key(id)
    }

    /// Whether a directed edge `from → to` exists.
    pub fn has_edge(&self, from: &SkillId, to: &SkillId) -> bool {
        let (Ok(a), Ok(b)) = (self.index_of(from), self.index_of(to)) else {
            return false;
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        graph.find_edge(a, b).is_some()
    }

    /// All skills ordered by `order_index`, then name.
    pub fn all_skills(&self) -> Vec<Skill> {
        let mut skills: Vec<Skill> = self.skills.iter().map(|s| s.value().clone()).collect();
        skills.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then_with(|| a.name.cmp(&b.name))
        });
        skills
    }

    /// All edges, ordered by their source then target skill.
    pub fn all_connections(&self) -> Vec<SkillConnection> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let mut connections: Vec<(i64, i64, SkillConnection)> = graph
            .edge_references()
            .map(|e| {
                let from = graph[e.source()].clone();
                let to = graph[e.target()].clone();
                let rank = |id: &SkillId| self.skills.get(id).map_or(0, |s| s.order_index);
                (
                    rank(&from),
                    rank(&to),
                    SkillConnection {
                        from_skill: from,
                        to_skill: to,
                        relationship_type: e.weight().relationship_type.clone(),
                        weight: e.weight().weight,
                    },
                )
            })
            .collect();
        connections.sort_by(|a, b| {
            (a.0, a.1, &a.2.from_skill, &a.2.to_skill).cmp(&(b.0, b.1, &b.2.from_skill, &b.2.to_skill))
        });
        connections.into_iter().map(|(_, _, c)| c).collect()
    }

    /// Direct prerequisites of a skill (incoming edges).
    pub fn prerequisites(&self, id: &SkillId) -> Vec<Skill> {
        self.neighbors_directed(id, Direction::Incoming)
    }

    /// Skills this one unlocks (outgoing edges).
    pub fn next_skills(&self, id: &SkillId) -> Vec<Skill> {
        self.neighbors_directed(id, Direction::Outgoing)
    }

    /// Neighbours in either direction, deduplicated.
    pub fn adjacent(&self, id: &SkillId) -> Vec<Skill> {
        let mut seen = HashSet::new();
        let mut out: Vec<Skill> = self
            .prerequisites(id)
            .into_iter()
            .chain(self.next_skills(id))
            .filter(|s| seen.insert(s.id.clone()))
            .collect();
        sort_for_traversal(&mut out);
        out
    }

    fn neighbors_directed(&self, id: &SkillId, dir: Direction) -> Vec<Skill> {
        let Ok(idx) = self.index_of(id) else {
            return vec![];
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        let mut out: Vec<Skill> = graph
            .neighbors_directed(idx, dir)
            .filter_map(|n| graph.node_weight(n))
            .filter_map(|sid| self.skill(sid))
            .collect();
        sort_for_traversal(&mut out);
        out.dedup_by(|a, b| a.id == b.id);
        out
    }

    /// Case-insensitive substring search over names and descriptions.
    pub fn search(&self, query: &str) -> Vec<Skill> {
        let needle = query.trim().to_lowercase();
        self.all_skills()
            .into_iter()
            .filter(|s| {
                needle.is_empty()
                    || s.name.to_lowercase().contains(&needle)
                    || s.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.read().expect("graph lock poisoned").edge_count()
    }
}

impl Default for SkillGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SkillGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillGraph")
            .field("skills", &self.skill_count())
            .field("connections", &self.connection_count())
            .finish()
    }
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn sort_for_traversal(skills: &mut [Skill]) {
    skills.sort_by(|a, b| (a.order_index, &a.id).cmp(&(b.order_index, &b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_graph() -> SkillGraph {
        let g = SkillGraph::new();
        for (i, name) in ["sql", "python", "data analyst", "data engineer"]
            .into_iter()
            .enumerate()
        {
            g.insert_skill(Skill::new(name, "", i as i64)).unwrap();
        }
        for (a, b) in [
            ("python", "data-analyst"),
            ("sql", "data-analyst"),
            ("data-analyst", "data-engineer"),
            ("python", "data-engineer"),
        ] {
            g.connect(SkillConnection::prerequisite(a.into(), b.into()))
                .unwrap();
        }
        g
    }

    #[test]
    fn insert_and_lookup_by_name() {
        let g = small_graph();
        assert_eq!(g.skill_count(), 4);
        let skill = g.skill_by_name("  Data   ANALYST ").unwrap();
        assert_eq!(skill.id, SkillId::from("data-analyst"));
    }

    #[test]
    fn duplicate_skill_rejected() {
        let g = small_graph();
        let err = g.insert_skill(Skill::new("Python", "", 9)).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateSkill { .. }));
    }

    #[test]
    fn connect_unknown_endpoint_fails() {
        let g = small_graph();
        let err = g
            .connect(SkillConnection::prerequisite("css".into(), "python".into()))
            .unwrap_err();
        assert!(matches!(err, GraphError::SkillNotFound { ref name } if name == "css"));
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let g = small_graph();
        let added = g
            .connect(SkillConnection::prerequisite("sql".into(), "data-analyst".into()))
            .unwrap();
        assert!(!added);
        assert_eq!(g.connection_count(), 4);
    }

    #[test]
    fn prerequisites_and_next_skills_are_ordered() {
        let g = small_graph();
        let prereqs: Vec<_> = g
            .prerequisites(&"data-analyst".into())
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(prereqs, vec!["sql", "python"]);

        let next: Vec<_> = g
            .next_skills(&"python".into())
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(next, vec!["data analyst", "data engineer"]);
    }

    #[test]
    fn adjacent_merges_both_directions() {
        let g = small_graph();
        let adj: Vec<_> = g
            .adjacent(&"data-analyst".into())
            .into_iter()
            .map(|s| s.id.0)
            .collect();
        assert_eq!(adj, vec!["sql", "python", "data-engineer"]);
    }

    #[test]
    fn resolve_accepts_names_and_ids() {
        let g = small_graph();
        assert_eq!(g.resolve("Data Engineer").unwrap().id, SkillId::from("data-engineer"));
        assert_eq!(g.resolve("data-engineer").unwrap().name, "data engineer");
        assert!(g.resolve("cobol").is_err());
    }

    #[test]
    fn search_is_case_insensitive() {
        let g = small_graph();
        let hits: Vec<_> = g.search("DATA").into_iter().map(|s| s.name).collect();
        assert_eq!(hits, vec!["data analyst", "data engineer"]);
    }

    #[test]
    fn connections_sorted_by_source() {
        let g = small_graph();
        let first = &g.all_connections()[0];
        assert_eq!(first.from_skill, SkillId::from("sql"));
        assert!(g.has_edge(&"python".into(), &"data-engineer".into()));
        assert!(!g.has_edge(&"data-engineer".into(), &"python".into()));
    }
}
