//! Graph-visualisation element export.
//!
//! Produces Cytoscape-style `{data: {...}}` elements. Node ids are skill ids
//! and edge ids follow [`edge_id`], which the path highlighter depends on.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::graph::SkillGraph;
use super::path::edge_id;
use super::{Skill, SkillConnection, SkillId, slugify};

pub const FORMAT_VERSION: &str = "1.0";
pub const GENERATED_BY: &str = "skill-atlas";

/// Skills per progression level.
pub const SKILLS_PER_LEVEL: usize = 5;
const LEVEL_X_SPACING: i64 = 400;
const LEVEL_Y_SPACING: i64 = 150;
const LAYOUT_ORIGIN: i64 = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: SkillId,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    pub data: NodeData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub id: String,
    pub source: SkillId,
    pub target: SkillId,
    pub relationship_type: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeElement {
    pub data: EdgeData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Elements {
    pub nodes: Vec<NodeElement>,
    pub edges: Vec<EdgeElement>,
}

/// `/api/roadmap-flat` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRoadmap {
    pub format_version: String,
    pub generated_by: String,
    pub elements: Elements,
    pub total_skills: usize,
    pub total_edges: usize,
}

/// `/api/roadmap-progression` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionRoadmap {
    pub format_version: String,
    pub generated_by: String,
    pub elements: Elements,
    /// Level name → skills in that level.
    pub levels: BTreeMap<String, Vec<Skill>>,
    pub level_names: Vec<String>,
    pub total_skills: usize,
}

fn edge_element(conn: &SkillConnection, classes: Option<&str>) -> EdgeElement {
    EdgeElement {
        data: EdgeData {
            id: edge_id(&conn.from_skill, &conn.to_skill),
            source: conn.from_skill.clone(),
            target: conn.to_skill.clone(),
            relationship_type: conn.relationship_type.clone(),
            weight: conn.weight,
        },
        classes: classes.map(str::to_string),
    }
}

/// Every skill and connection, without positions.
pub fn flat(graph: &SkillGraph) -> FlatRoadmap {
    let nodes: Vec<NodeElement> = graph
        .all_skills()
        .into_iter()
        .map(|s| NodeElement {
            data: NodeData {
                id: s.id,
                name: s.name,
                description: s.description,
                order_index: Some(s.order_index),
                level: None,
                level_index: None,
                skill_index: None,
            },
            position: None,
            classes: None,
        })
        .collect();
    let edges: Vec<EdgeElement> = graph
        .all_connections()
        .iter()
        .map(|c| edge_element(c, None))
        .collect();

    FlatRoadmap {
        format_version: FORMAT_VERSION.into(),
        generated_by: GENERATED_BY.into(),
        total_skills: nodes.len(),
        total_edges: edges.len(),
        elements: Elements { nodes, edges },
    }
}

/// Skills grouped into columns of [`SKILLS_PER_LEVEL`] in order-index order.
pub fn progression(graph: &SkillGraph) -> ProgressionRoadmap {
    let skills = graph.all_skills();
    let mut levels = BTreeMap::new();
    let mut level_names = Vec::new();
    let mut nodes = Vec::with_capacity(skills.len());

    for (level_idx, chunk) in skills.chunks(SKILLS_PER_LEVEL).enumerate() {
        let level_name = format!("Level {}", level_idx + 1);
        let x = level_idx as i64 * LEVEL_X_SPACING + LAYOUT_ORIGIN;

        for (skill_idx, skill) in chunk.iter().enumerate() {
            nodes.push(NodeElement {
                data: NodeData {
                    id: skill.id.clone(),
                    name: skill.name.clone(),
                    description: skill.description.clone(),
                    order_index: None,
                    level: Some(level_name.clone()),
                    level_index: Some(level_idx),
                    skill_index: Some(skill_idx),
                },
                position: Some(Position {
                    x,
                    y: skill_idx as i64 * LEVEL_Y_SPACING + LAYOUT_ORIGIN,
                }),
                classes: Some(format!("level-{level_idx} {}", slugify(&level_name))),
            });
        }
        levels.insert(level_name.clone(), chunk.to_vec());
        level_names.push(level_name);
    }

    let present: HashSet<&SkillId> = nodes.iter().map(|n| &n.data.id).collect();
    let edges = graph
        .all_connections()
        .iter()
        .filter(|c| present.contains(&c.from_skill) && present.contains(&c.to_skill))
        .map(|c| edge_element(c, Some("progression-edge")))
        .collect();

    ProgressionRoadmap {
        format_version: FORMAT_VERSION.into(),
        generated_by: GENERATED_BY.into(),
        total_skills: skills.len(),
        elements: Elements { nodes, edges },
        levels,
        level_names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_export_counts() {
        let g = SkillGraph::bundled().unwrap();
        let roadmap = flat(&g);
        assert_eq!(roadmap.total_skills, 62);
        assert_eq!(roadmap.total_edges, g.connection_count());
        assert_eq!(roadmap.format_version, "1.0");
    }

    #[test]
    fn edge_ids_use_source_dash_target() {
        let g = SkillGraph::bundled().unwrap();
        let roadmap = flat(&g);
        assert!(
            roadmap
                .elements
                .edges
                .iter()
                .any(|e| e.data.id == "data-engineer-aws")
        );
    }

    #[test]
    fn progression_layout_positions() {
        let g = SkillGraph::bundled().unwrap();
        let roadmap = progression(&g);
        assert_eq!(roadmap.level_names.len(), 13);
        assert_eq!(roadmap.level_names[0], "Level 1");

        let python = roadmap
            .elements
            .nodes
            .iter()
            .find(|n| n.data.id.as_str() == "python")
            .unwrap();
        assert_eq!(python.position, Some(Position { x: 200, y: 500 }));
        assert_eq!(python.classes.as_deref(), Some("level-0 level-1"));

        let ai_agents = roadmap
            .elements
            .nodes
            .iter()
            .find(|n| n.data.id.as_str() == "ai-agents")
            .unwrap();
        // index 61 → level 12, slot 1
        assert_eq!(ai_agents.position, Some(Position { x: 12 * 400 + 200, y: 350 }));
    }

    #[test]
    fn flat_nodes_serialise_without_layout_fields() {
        let g = SkillGraph::bundled().unwrap();
        let json = serde_json::to_value(flat(&g)).unwrap();
        let first = &json["elements"]["nodes"][0];
        assert_eq!(first["data"]["id"], "computer-science");
        assert!(first.get("position").is_none());
        assert!(first["data"].get("level").is_none());
    }
}
