//! Skills and the prerequisite graph that connects them.
//!
//! A [`Skill`] is a learnable topic. A [`SkillConnection`] says the `from_skill`
//! is a prerequisite of the `to_skill`. The [`SkillGraph`] owns both and answers
//! lookups; [`path`] finds learning routes through it and [`elements`] exports
//! it for the graph visualisation.

pub mod catalog;
pub mod elements;
pub mod graph;
pub mod path;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use graph::{GraphResult, SkillGraph};
pub use path::{
    DEFAULT_MAX_HOPS, LearningPath, PathEdge, PathStrategy, edge_id, find_learning_path, path_edges,
};

/// Stable identifier of a skill; the slug of its name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(pub String);

impl SkillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the id for a skill name.
    pub fn from_name(name: &str) -> Self {
        Self(slugify(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SkillId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A node of the skill graph.
///
/// Fields default on deserialisation because paths echoed back by clients are
/// not guaranteed to be complete. An empty `name` means the name is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    #[serde(default)]
    pub id: SkillId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order_index: i64,
}

impl Skill {
    pub fn new(name: &str, description: &str, order_index: i64) -> Self {
        Self {
            id: SkillId::from_name(name),
            name: name.to_string(),
            description: description.to_string(),
            order_index,
        }
    }

    /// The name, or `None` when it is blank.
    pub fn display_name(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// A directed prerequisite edge between two skills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillConnection {
    pub from_skill: SkillId,
    pub to_skill: SkillId,
    #[serde(default = "default_relationship")]
    pub relationship_type: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_relationship() -> String {
    "prerequisite".into()
}

fn default_weight() -> u32 {
    1
}

impl SkillConnection {
    pub fn prerequisite(from: SkillId, to: SkillId) -> Self {
        Self {
            from_skill: from,
            to_skill: to,
            relationship_type: default_relationship(),
            weight: default_weight(),
        }
    }
}

/// Lowercase, collapse whitespace runs to `-`, drop everything but ASCII
/// alphanumerics and `-`.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
