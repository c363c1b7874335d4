//! Learning path search.
//!
//! A learning path follows prerequisite edges from a start skill to a target
//! skill. When no directed route exists (the learner already holds a skill that
//! sits on a different branch) the search falls back to the shortest undirected
//! connection, bounded by a hop limit.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::graph::{GraphResult, SkillGraph};
use super::{Skill, SkillId};

/// Default hop limit for the undirected fallback.
pub const DEFAULT_MAX_HOPS: usize = 10;

/// Which search produced a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStrategy {
    /// Followed prerequisite edges in their direction.
    Directed,
    /// Shortest connection ignoring edge direction.
    Undirected,
}

/// An ordered route from a start skill to a target skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    pub skills: Vec<Skill>,
    pub strategy: PathStrategy,
}

impl LearningPath {
    pub fn ids(&self) -> Vec<SkillId> {
        self.skills.iter().map(|s| s.id.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.name.clone()).collect()
    }

    pub fn start(&self) -> Option<&Skill> {
        self.skills.first()
    }

    pub fn target(&self) -> Option<&Skill> {
        self.skills.last()
    }

    pub fn edges(&self) -> Vec<PathEdge> {
        path_edges(&self.skills)
    }
}

/// Visualisation edge between consecutive path skills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEdge {
    pub id: String,
    pub source: SkillId,
    pub target: SkillId,
}

/// Element id of the visual edge from `source` to `target`.
///
/// The visualisation keys edges by this string, so it must match what
/// [`super::elements`] emits.
pub fn edge_id(source: &SkillId, target: &SkillId) -> String {
    format!("{source}-{target}")
}

/// One edge per consecutive pair, in path order.
pub fn path_edges(skills: &[Skill]) -> Vec<PathEdge> {
    skills
        .windows(2)
        .map(|pair| PathEdge {
            id: edge_id(&pair[0].id, &pair[1].id),
            source: pair[0].id.clone(),
            target: pair[1].id.clone(),
        })
        .collect()
}

/// Find a learning path between two skills given by name or id.
///
/// Unknown skills are an error; an unreachable target is `Ok(None)`.
pub fn find_learning_path(
    graph: &SkillGraph,
    start: &str,
    target: &str,
    max_hops: usize,
) -> GraphResult<Option<LearningPath>> {
    let start = graph.resolve(start)?;
    let target = graph.resolve(target)?;

    if start.id == target.id {
        return Ok(Some(LearningPath {
            skills: vec![start],
            strategy: PathStrategy::Directed,
        }));
    }

    if let Some(ids) = bfs(&start.id, &target.id, usize::MAX, |id| graph.next_skills(id)) {
        tracing::debug!(start = %start.id, target = %target.id, hops = ids.len() - 1, "directed path found");
        return Ok(Some(materialize(graph, ids, PathStrategy::Directed)));
    }

    let found = bfs(&start.id, &target.id, max_hops, |id| graph.adjacent(id));
    if found.is_none() {
        tracing::debug!(start = %start.id, target = %target.id, max_hops, "no path within hop limit");
    }
    Ok(found.map(|ids| materialize(graph, ids, PathStrategy::Undirected)))
}

/// Breadth-first search returning the id sequence from `start` to `target`.
fn bfs(
    start: &SkillId,
    target: &SkillId,
    max_hops: usize,
    neighbours: impl Fn(&SkillId) -> Vec<Skill>,
) -> Option<Vec<SkillId>> {
    let mut parent: HashMap<SkillId, SkillId> = HashMap::new();
    let mut queue: VecDeque<(SkillId, usize)> = VecDeque::new();
    parent.insert(start.clone(), start.clone());
    queue.push_back((start.clone(), 0));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_hops {
            continue;
        }
        for next in neighbours(&node) {
            if parent.contains_key(&next.id) {
                continue;
            }
            parent.insert(next.id.clone(), node.clone());
            if &next.id == target {
                return Some(unwind(&parent, start, target));
            }
            queue.push_back((next.id, depth + 1));
        }
    }
    None
}

fn unwind(parent: &HashMap<SkillId, SkillId>, start: &SkillId, target: &SkillId) -> Vec<SkillId> {
    let mut ids = vec![target.clone()];
    let mut current = target;
    while current != start {
        current = &parent[current];
        ids.push(current.clone());
    }
    ids.reverse();
    ids
}

fn materialize(graph: &SkillGraph, ids: Vec<SkillId>, strategy: PathStrategy) -> LearningPath {
    LearningPath {
        skills: ids.iter().filter_map(|id| graph.skill(id)).collect(),
        strategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::SkillConnection;

    fn chain_graph() -> SkillGraph {
        let g = SkillGraph::new();
        for (i, name) in ["a", "b", "c", "d", "x"].into_iter().enumerate() {
            g.insert_skill(Skill::new(name, "", i as i64)).unwrap();
        }
        for (a, b) in [("a", "b"), ("b", "c"), ("c", "d"), ("x", "c")] {
            g.connect(SkillConnection::prerequisite(a.into(), b.into()))
                .unwrap();
        }
        g
    }

    fn ids(path: &LearningPath) -> Vec<&str> {
        path.skills.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn directed_path_follows_prerequisites() {
        let g = chain_graph();
        let path = find_learning_path(&g, "a", "d", DEFAULT_MAX_HOPS)
            .unwrap()
            .unwrap();
        assert_eq!(ids(&path), vec!["a", "b", "c", "d"]);
        assert_eq!(path.strategy, PathStrategy::Directed);
    }

    #[test]
    fn falls_back_to_undirected() {
        let g = chain_graph();
        let path = find_learning_path(&g, "a", "x", DEFAULT_MAX_HOPS)
            .unwrap()
            .unwrap();
        assert_eq!(ids(&path), vec!["a", "b", "c", "x"]);
        assert_eq!(path.strategy, PathStrategy::Undirected);
    }

    #[test]
    fn hop_limit_bounds_the_fallback() {
        let g = chain_graph();
        assert!(find_learning_path(&g, "d", "a", 2).unwrap().is_none());
        assert!(find_learning_path(&g, "d", "a", 3).unwrap().is_some());
    }

    #[test]
    fn same_start_and_target() {
        let g = chain_graph();
        let path = find_learning_path(&g, "B", "b", DEFAULT_MAX_HOPS)
            .unwrap()
            .unwrap();
        assert_eq!(ids(&path), vec!["b"]);
        assert!(path.edges().is_empty());
    }

    #[test]
    fn unknown_skill_is_an_error() {
        let g = chain_graph();
        assert!(find_learning_path(&g, "a", "zz", DEFAULT_MAX_HOPS).is_err());
    }

    #[test]
    fn edges_follow_path_direction() {
        let skills: Vec<Skill> = ["A", "B", "C"]
            .into_iter()
            .enumerate()
            .map(|(i, n)| Skill {
                id: SkillId::from(n),
                name: n.to_string(),
                description: String::new(),
                order_index: i as i64,
            })
            .collect();
        let edges: Vec<String> = path_edges(&skills).into_iter().map(|e| e.id).collect();
        assert_eq!(edges, vec!["A-B", "B-C"]);
    }
}
