//! Keyword classification and skill-mention extraction.
//!
//! This is the deterministic path used when no LLM is configured, and the
//! safety net when the LLM answers with something unusable.

use std::collections::HashMap;

use regex::Regex;

use crate::skill::{Skill, SkillGraph, SkillId};

use super::QueryCategory;

/// Informal names that map onto catalog skills.
const ALIASES: &[(&str, &str)] = &[
    ("ai agent", "ai-agents"),
    ("data structures", "datastructures-and-algorithms"),
    ("algorithms", "datastructures-and-algorithms"),
    ("node.js", "nodejs"),
    ("next.js", "nextjs"),
    ("git", "git-github"),
    ("github", "git-github"),
    ("ml", "machine-learning"),
    ("k8s", "kubernetes"),
    ("postgresql", "postgresql-dba"),
    ("postgres", "postgresql-dba"),
    ("ux", "ux-design"),
    ("c++", "cpp"),
    ("security", "cyber-security"),
];

const PREREQUISITE_CUES: &[&str] = &[
    "prerequisite",
    "before learning",
    "before i learn",
    "before i start",
    "learn before",
    "need to know before",
    "required for",
    "requirements for",
];

const ROUTE_CUES: &[&str] = &[
    "want to learn",
    "want to become",
    "learning path",
    "path",
    "route",
    "roadmap",
    "become",
    "transition",
    "switch",
    "get to",
    "move to",
    "i know",
    "i am a",
    "i'm a",
];

/// A skill mentioned in a message, with its byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub skill: Skill,
    pub offset: usize,
}

/// Outcome of keyword classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: QueryCategory,
    /// Earliest mentioned skill (the one the user has) for routes.
    pub start: Option<Skill>,
    /// Latest mentioned skill (the one the user wants), or the subject of the question.
    pub target: Option<Skill>,
}

/// Finds skill names in free text.
pub struct SkillMatcher {
    pattern: Option<Regex>,
    /// Lowercase surface form → skill id.
    surfaces: HashMap<String, SkillId>,
}

impl SkillMatcher {
    /// Build a matcher over every skill name in the graph plus the alias table.
    pub fn new(graph: &SkillGraph) -> Self {
        let mut surfaces: HashMap<String, SkillId> = graph
            .all_skills()
            .into_iter()
            .map(|s| (s.name.to_lowercase(), s.id))
            .collect();
        for (alias, id) in ALIASES {
            let id = SkillId::from(*id);
            if graph.contains(&id) {
                surfaces.entry(alias.to_string()).or_insert(id);
            }
        }

        // Longest first so "react native" wins over "react".
        let mut forms: Vec<&String> = surfaces.keys().collect();
        forms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        // `\b` only makes sense next to word characters; "c++" ends in a symbol.
        let alternation = forms
            .iter()
            .map(|f| {
                let left = if f.starts_with(is_word_char) { r"\b" } else { "" };
                let right = if f.ends_with(is_word_char) { r"\b" } else { "" };
                format!("{left}{}{right}", regex::escape(f))
            })
            .collect::<Vec<_>>()
            .join("|");

        let pattern = if alternation.is_empty() {
            None
        } else {
            Regex::new(&format!("(?:{alternation})")).ok()
        };

        Self { pattern, surfaces }
    }

    /// Skills mentioned in `text`, in order of appearance, first mention only.
    pub fn mentions(&self, graph: &SkillGraph, text: &str) -> Vec<Mention> {
        let Some(pattern) = &self.pattern else {
            return vec![];
        };
        let lower = text.to_lowercase();
        let mut seen = Vec::<SkillId>::new();
        let mut out = Vec::new();

        for m in pattern.find_iter(&lower) {
            let Some(id) = self.surfaces.get(m.as_str()) else {
                continue;
            };
            if seen.contains(id) {
                continue;
            }
            if let Some(skill) = graph.skill(id) {
                seen.push(id.clone());
                out.push(Mention {
                    skill,
                    offset: m.start(),
                });
            }
        }
        out
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Classify a message by keyword cues and skill mentions.
///
/// Prerequisite cues win over route cues. A route needs either two distinct
/// skills, or one skill plus a route cue.
pub fn classify(graph: &SkillGraph, matcher: &SkillMatcher, message: &str) -> Classification {
    let lower = message.to_lowercase();
    let mentions = matcher.mentions(graph, message);
    let first = mentions.first().map(|m| m.skill.clone());
    let last = mentions.last().map(|m| m.skill.clone());

    if PREREQUISITE_CUES.iter().any(|cue| lower.contains(cue)) {
        return Classification {
            category: QueryCategory::Prerequisite,
            start: None,
            target: last,
        };
    }

    let has_route_cue = ROUTE_CUES.iter().any(|cue| lower.contains(cue));
    if mentions.len() >= 2 || (mentions.len() == 1 && has_route_cue) {
        let single = mentions.len() == 1;
        return Classification {
            category: QueryCategory::RoutePlanning,
            start: if single { None } else { first },
            target: last,
        };
    }

    Classification {
        category: QueryCategory::General,
        start: None,
        target: last,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (SkillGraph, SkillMatcher) {
        let g = SkillGraph::bundled().unwrap();
        let m = SkillMatcher::new(&g);
        (g, m)
    }

    fn ids(mentions: &[Mention]) -> Vec<&str> {
        mentions.iter().map(|m| m.skill.id.as_str()).collect()
    }

    #[test]
    fn longest_surface_form_wins() {
        let (g, m) = setup();
        let found = m.mentions(&g, "I build React Native apps and some React");
        assert_eq!(ids(&found), vec!["react-native", "react"]);
    }

    #[test]
    fn word_boundaries_respected() {
        let (g, m) = setup();
        let found = m.mentions(&g, "javascript is not java");
        assert_eq!(ids(&found), vec!["javascript", "java"]);
        assert!(m.mentions(&g, "I like gophers").is_empty());
    }

    #[test]
    fn aliases_resolve() {
        let (g, m) = setup();
        let found = m.mentions(&g, "From Node.js to k8s, then C++ and ML.");
        assert_eq!(ids(&found), vec!["nodejs", "kubernetes", "cpp", "machine-learning"]);
    }

    #[test]
    fn repeated_mentions_count_once() {
        let (g, m) = setup();
        let found = m.mentions(&g, "python, python and more python");
        assert_eq!(ids(&found), vec!["python"]);
    }

    #[test]
    fn route_planning_with_two_skills() {
        let (g, m) = setup();
        let c = classify(&g, &m, "I am a data engineer and want to learn AI agents");
        assert_eq!(c.category, QueryCategory::RoutePlanning);
        assert_eq!(c.start.unwrap().id.as_str(), "data-engineer");
        assert_eq!(c.target.unwrap().id.as_str(), "ai-agents");
    }

    #[test]
    fn prerequisite_question() {
        let (g, m) = setup();
        let c = classify(&g, &m, "What are the prerequisites for Python?");
        assert_eq!(c.category, QueryCategory::Prerequisite);
        assert_eq!(c.target.unwrap().id.as_str(), "python");
    }

    #[test]
    fn single_skill_with_route_cue() {
        let (g, m) = setup();
        let c = classify(&g, &m, "I want to learn rust");
        assert_eq!(c.category, QueryCategory::RoutePlanning);
        assert!(c.start.is_none());
        assert_eq!(c.target.unwrap().id.as_str(), "rust");
    }

    #[test]
    fn general_question() {
        let (g, m) = setup();
        let c = classify(&g, &m, "What is docker?");
        assert_eq!(c.category, QueryCategory::General);
        assert_eq!(c.target.unwrap().id.as_str(), "docker");

        let c = classify(&g, &m, "hello there");
        assert_eq!(c.category, QueryCategory::General);
        assert!(c.target.is_none());
    }
}
