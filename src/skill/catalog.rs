//! Skill catalogs: the bundled developer roadmap and JSON catalog files.

use std::path::Path;

use serde::Deserialize;

use crate::error::GraphError;

use super::graph::{GraphResult, SkillGraph};
use super::{Skill, SkillConnection, SkillId};

/// Bundled roadmap, one tier per row. The order index of a skill is its
/// position in the flattened list.
const ROADMAP_TIERS: &[&[&str]] = &[
    &["computer science", "datastructures and algorithms"],
    &["python", "java", "cpp", "javascript"],
    &["git github", "sql"],
    &["frontend", "backend"],
    &["react", "angular", "vue"],
    &["nodejs", "php", "spring boot", "aspnet core"],
    &["full stack", "nextjs"],
    &["typescript", "graphql"],
    &["mongodb", "postgresql dba", "redis"],
    &["android", "ios", "flutter", "react native"],
    &["game developer", "server side game developer"],
    &["design system", "ux design"],
    &["code review", "qa"],
    &["bi analyst", "data analyst"],
    &["data engineer", "aws"],
    &["devops", "docker", "linux"],
    &["kubernetes", "terraform", "cloudflare"],
    &["cyber security", "ai red teaming"],
    &["blockchain", "golang", "rust"],
    &["system design", "software design architecture"],
    &[
        "software architect",
        "engineering manager",
        "product manager",
        "devrel",
        "technical writer",
    ],
    &["machine learning", "prompt engineering"],
    &["mlops", "ai engineer"],
    &["ai data scientist", "ai agents"],
];

/// Prerequisite edges of the bundled roadmap, by skill name.
const ROADMAP_CONNECTIONS: &[(&str, &str)] = &[
    ("computer science", "datastructures and algorithms"),
    ("datastructures and algorithms", "python"),
    ("datastructures and algorithms", "java"),
    ("datastructures and algorithms", "cpp"),
    ("datastructures and algorithms", "javascript"),
    ("python", "git github"),
    ("java", "git github"),
    ("cpp", "git github"),
    ("javascript", "git github"),
    ("git github", "frontend"),
    ("git github", "backend"),
    ("javascript", "frontend"),
    ("javascript", "backend"),
    ("python", "backend"),
    ("java", "backend"),
    ("cpp", "backend"),
    ("frontend", "react"),
    ("frontend", "angular"),
    ("frontend", "vue"),
    ("backend", "sql"),
    ("backend", "nodejs"),
    ("backend", "php"),
    ("backend", "spring boot"),
    ("backend", "aspnet core"),
    ("javascript", "angular"),
    ("javascript", "vue"),
    ("javascript", "react"),
    ("javascript", "nodejs"),
    ("java", "spring boot"),
    ("cpp", "aspnet core"),
    ("frontend", "full stack"),
    ("backend", "full stack"),
    ("react", "full stack"),
    ("nodejs", "full stack"),
    ("full stack", "nextjs"),
    ("javascript", "typescript"),
    ("react", "typescript"),
    ("typescript", "graphql"),
    ("backend", "graphql"),
    ("sql", "mongodb"),
    ("sql", "postgresql dba"),
    ("sql", "redis"),
    ("javascript", "react native"),
    ("react", "react native"),
    ("react native", "ios"),
    ("react native", "android"),
    ("java", "android"),
    ("cpp", "android"),
    ("javascript", "flutter"),
    ("cpp", "game developer"),
    ("cpp", "server side game developer"),
    ("javascript", "game developer"),
    ("frontend", "design system"),
    ("frontend", "ux design"),
    ("css", "design system"),
    ("css", "ux design"),
    ("python", "code review"),
    ("java", "code review"),
    ("javascript", "code review"),
    ("git github", "code review"),
    ("code review", "qa"),
    ("python", "bi analyst"),
    ("python", "data analyst"),
    ("sql", "bi analyst"),
    ("sql", "data analyst"),
    ("data analyst", "data engineer"),
    ("python", "data engineer"),
    ("data engineer", "aws"),
    ("python", "devops"),
    ("java", "devops"),
    ("javascript", "devops"),
    ("devops", "docker"),
    ("devops", "linux"),
    ("docker", "kubernetes"),
    ("kubernetes", "terraform"),
    ("kubernetes", "cloudflare"),
    ("devops", "cyber security"),
    ("python", "cyber security"),
    ("cyber security", "ai red teaming"),
    ("python", "golang"),
    ("python", "rust"),
    ("cpp", "rust"),
    ("golang", "blockchain"),
    ("rust", "blockchain"),
    ("backend", "system design"),
    ("full stack", "system design"),
    ("system design", "software design architecture"),
    ("software design architecture", "software architect"),
    ("software architect", "engineering manager"),
    ("engineering manager", "product manager"),
    ("software architect", "devrel"),
    ("software architect", "technical writer"),
    ("python", "machine learning"),
    ("data analyst", "machine learning"),
    ("machine learning", "prompt engineering"),
    ("machine learning", "mlops"),
    ("python", "mlops"),
    ("devops", "mlops"),
    ("mlops", "ai engineer"),
    ("machine learning", "ai engineer"),
    ("ai engineer", "ai data scientist"),
    ("ai data scientist", "ai agents"),
];

fn default_description(name: &str) -> String {
    format!("Learn {name} skills and concepts")
}

/// On-disk catalog format.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    skills: Vec<CatalogSkill>,
    #[serde(default)]
    connections: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct CatalogSkill {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

impl SkillGraph {
    /// The bundled developer roadmap.
    pub fn bundled() -> GraphResult<Self> {
        let names = ROADMAP_TIERS.iter().flat_map(|tier| tier.iter().copied());
        let skills = names.map(|n| (n.to_string(), None));
        let connections = ROADMAP_CONNECTIONS
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()));
        build(skills, connections)
    }

    /// Load a JSON catalog: `{"skills": [{"name", "description"?}], "connections": [[from, to]]}`.
    pub fn from_catalog_file(path: &Path) -> GraphResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GraphError::CatalogRead {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_catalog_json(&content, &path.display().to_string())
    }

    /// Parse a JSON catalog; `origin` names the source in error messages.
    pub fn from_catalog_json(content: &str, origin: &str) -> GraphResult<Self> {
        let file: CatalogFile =
            serde_json::from_str(content).map_err(|e| GraphError::CatalogParse {
                path: origin.to_string(),
                message: e.to_string(),
            })?;
        build(
            file.skills.into_iter().map(|s| (s.name, s.description)),
            file.connections,
        )
    }

    /// Bundled roadmap, or the catalog at `path` when given.
    pub fn load(path: Option<&Path>) -> GraphResult<Self> {
        match path {
            Some(p) => Self::from_catalog_file(p),
            None => Self::bundled(),
        }
    }
}

fn build(
    skills: impl IntoIterator<Item = (String, Option<String>)>,
    connections: impl IntoIterator<Item = (String, String)>,
) -> GraphResult<SkillGraph> {
    let graph = SkillGraph::new();

    for (order, (name, description)) in skills.into_iter().enumerate() {
        let name = name.trim().to_string();
        let description = description.unwrap_or_else(|| default_description(&name));
        graph.insert_skill(Skill {
            id: SkillId::from_name(&name),
            name,
            description,
            order_index: order as i64,
        })?;
    }

    let mut skipped = 0usize;
    for (from, to) in connections {
        let (Some(a), Some(b)) = (graph.skill_by_name(&from), graph.skill_by_name(&to)) else {
            tracing::warn!(%from, %to, "skipping connection with unknown skill");
            skipped += 1;
            continue;
        };
        graph.connect(SkillConnection::prerequisite(a.id, b.id))?;
    }

    tracing::debug!(
        skills = graph.skill_count(),
        connections = graph.connection_count(),
        skipped,
        "skill catalog loaded"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_shape() {
        let g = SkillGraph::bundled().unwrap();
        assert_eq!(g.skill_count(), 62);
        // The two "css" edges name a skill that is not in the catalog.
        assert_eq!(g.connection_count(), ROADMAP_CONNECTIONS.len() - 2);
    }

    #[test]
    fn order_index_is_flattened_position() {
        let g = SkillGraph::bundled().unwrap();
        assert_eq!(g.skill_by_name("computer science").unwrap().order_index, 0);
        assert_eq!(g.skill_by_name("python").unwrap().order_index, 2);
        assert_eq!(g.skill_by_name("ai agents").unwrap().order_index, 61);
    }

    #[test]
    fn ids_are_slugs() {
        let g = SkillGraph::bundled().unwrap();
        let skill = g.skill(&SkillId::from("data-engineer")).unwrap();
        assert_eq!(skill.name, "data engineer");
        assert_eq!(skill.description, "Learn data engineer skills and concepts");
    }

    #[test]
    fn json_catalog_loads() {
        let json = r#"{
            "skills": [
                {"name": "HTML", "description": "Markup"},
                {"name": "CSS"},
                {"name": "Tailwind"}
            ],
            "connections": [["HTML", "CSS"], ["CSS", "Tailwind"], ["CSS", "Sass"]]
        }"#;
        let g = SkillGraph::from_catalog_json(json, "inline").unwrap();
        assert_eq!(g.skill_count(), 3);
        assert_eq!(g.connection_count(), 2);
        assert_eq!(g.skill(&"html".into()).unwrap().description, "Markup");
    }

    #[test]
    fn malformed_catalog_reports_origin() {
        let err = SkillGraph::from_catalog_json("{\"skills\": 3}", "broken.json").unwrap_err();
        assert!(matches!(err, GraphError::CatalogParse { ref path, .. } if path == "broken.json"));
    }

    #[test]
    fn missing_catalog_file_is_a_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = SkillGraph::from_catalog_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, GraphError::CatalogRead { .. }));
    }
}
