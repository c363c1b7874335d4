//! In-process route-planning agent.
//!
//! Pipeline: classify → extract skills → route / prerequisites / general answer.
//! The category and the path depend only on the message and the graph, so the
//! same question always gets the same route. An LLM, when configured, refines
//! otherwise-general messages and phrases the answer text. Its category verdict
//! is remembered per normalised message, so a sampled answer cannot flip the
//! route of a question that was already answered.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::skill::{LearningPath, Skill, SkillGraph, find_learning_path};

use super::classify::{self, Classification, SkillMatcher};
use super::llm::{LlmClient, extract_json_object};
use super::{Agent, AgentReply, AgentRequest, AgentResult, QueryCategory};

const CLASSIFY_SYSTEM: &str = "You classify messages sent to a learning-path assistant. \
Answer with JSON only: {\"category\": \"ROUTE_PLANNING\" | \"PREREQUISITE\" | \"GENERAL_QUERY\"}. \
ROUTE_PLANNING: the user knows one skill and wants to learn another, or asks for a path. \
PREREQUISITE: the user asks what to learn before a skill. \
GENERAL_QUERY: anything else.";

const ANSWER_SYSTEM: &str = "You are a friendly learning-path assistant. \
Answer concisely. Never change, reorder or add to the skills you are given.";

/// Agent that answers from the local skill graph.
pub struct LocalAgent {
    graph: Arc<SkillGraph>,
    matcher: SkillMatcher,
    llm: Option<Arc<dyn LlmClient>>,
    /// LLM category verdicts keyed by normalised message. `None` records an
    /// answer that named no usable category.
    verdicts: DashMap<String, Option<QueryCategory>>,
    max_hops: usize,
}

impl LocalAgent {
    pub fn new(graph: Arc<SkillGraph>) -> Self {
        let matcher = SkillMatcher::new(&graph);
        Self {
            graph,
            matcher,
            llm: None,
            verdicts: DashMap::new(),
            max_hops: crate::skill::path::DEFAULT_MAX_HOPS,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn graph(&self) -> &Arc<SkillGraph> {
        &self.graph
    }

    /// Keyword classification, refined by the LLM for messages the keywords
    /// could not place.
    async fn classify(&self, message: &str) -> Classification {
        let mut result = classify::classify(&self.graph, &self.matcher, message);
        if result.category != QueryCategory::General {
            return result;
        }
        let Some(llm) = &self.llm else {
            return result;
        };

        let key = normalize_message(message);
        let remembered = self.verdicts.get(&key).map(|v| *v);
        let verdict = match remembered {
            Some(verdict) => verdict,
            None => match llm.complete(message, Some(CLASSIFY_SYSTEM)).await {
                Ok(answer) => {
                    let category = extract_json_object(&answer)
                        .and_then(|v| v["category"].as_str().and_then(QueryCategory::parse));
                    if category.is_none() {
                        tracing::debug!(model = llm.model(), "unusable classification answer");
                    }
                    // First answer wins if two requests race on the same message.
                    *self.verdicts.entry(key).or_insert(category)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "LLM classification failed, keeping keyword result");
                    return result;
                }
            },
        };

        match verdict {
            // A route needs a target; without one the keyword verdict stands.
            Some(QueryCategory::RoutePlanning) if result.target.is_some() => {
                result.category = QueryCategory::RoutePlanning;
            }
            Some(QueryCategory::Prerequisite) if result.target.is_some() => {
                result.category = QueryCategory::Prerequisite;
            }
            _ => {}
        }
        result
    }

    /// Ask the LLM to phrase an answer; `None` when there is no LLM or it failed.
    async fn phrase(&self, prompt: String) -> Option<String> {
        let llm = self.llm.as_ref()?;
        match llm.complete(&prompt, Some(ANSWER_SYSTEM)).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "LLM phrasing failed, using template");
                None
            }
        }
    }

    async fn route_planning(&self, c: Classification) -> AgentResult<AgentReply> {
        let Some(target) = c.target else {
            return Ok(AgentReply::text(
                QueryCategory::RoutePlanning,
                "Which skill would you like to learn? Tell me what you know and what you \
                 want to learn, for example \"I know Python and want to learn machine learning\".",
            )
            .with_step("extract_skill_name"));
        };

        let start = match c.start {
            Some(s) => s,
            None => self.entry_point_for(&target),
        };

        let found = find_learning_path(&self.graph, start.id.as_str(), target.id.as_str(), self.max_hops)?;
        let mut reply = AgentReply::text(QueryCategory::RoutePlanning, "").with_step("route_planning");
        reply.start_skill = Some(start.name.clone());
        reply.target_skill = Some(target.name.clone());

        let Some(path) = found else {
            reply.message = format!(
                "I couldn't find a learning route from {} to {} in the roadmap.",
                start.name, target.name
            );
            return Ok(reply);
        };

        let template = route_template(&path);
        let prompt = format!(
            "The learner starts at \"{}\" and wants to reach \"{}\". \
             The roadmap route is: {}. Explain briefly why each step matters.",
            start.name,
            target.name,
            path.names().join(" -> ")
        );
        reply.message = self.phrase(prompt).await.unwrap_or(template);
        reply.path = path.skills;
        Ok(reply)
    }

    /// First root skill (no prerequisites) with a directed route to `target`.
    fn entry_point_for(&self, target: &Skill) -> Skill {
        self.graph
            .all_skills()
            .into_iter()
            .filter(|s| self.graph.prerequisites(&s.id).is_empty())
            .find(|root| {
                matches!(
                    find_learning_path(&self.graph, root.id.as_str(), target.id.as_str(), 0),
                    Ok(Some(_))
                )
            })
            .unwrap_or_else(|| target.clone())
    }

    async fn prerequisite(&self, c: Classification) -> AgentResult<AgentReply> {
        let Some(target) = c.target else {
            return Ok(AgentReply::text(
                QueryCategory::Prerequisite,
                "Which skill do you want the prerequisites for?",
            )
            .with_step("extract_skill_name"));
        };

        let prereqs = self.graph.prerequisites(&target.id);
        let template = if prereqs.is_empty() {
            format!(
                "{} has no prerequisites in the roadmap, so it's a good place to start.",
                target.name
            )
        } else {
            format!(
                "Before learning {}, you should be comfortable with: {}.",
                target.name,
                join_names(&prereqs)
            )
        };
        let prompt = format!(
            "The prerequisites of \"{}\" are: {}. Tell the learner what to study first.",
            target.name,
            if prereqs.is_empty() { "none".to_string() } else { join_names(&prereqs) }
        );

        let mut reply = AgentReply::text(
            QueryCategory::Prerequisite,
            self.phrase(prompt).await.unwrap_or(template),
        )
        .with_step("prerequisite");
        reply.target_skill = Some(target.name);
        Ok(reply)
    }

    async fn general(&self, message: &str, c: Classification) -> AgentResult<AgentReply> {
        let template = match &c.target {
            Some(skill) => describe_skill(&self.graph, skill),
            None => "I can help you plan what to learn next. Tell me a skill you have and one \
                     you want, for example \"I am a data analyst and want to learn machine \
                     learning\", or ask about the prerequisites of a skill."
                .to_string(),
        };
        let text = self.phrase(message.to_string()).await.unwrap_or(template);
        let mut reply = AgentReply::text(QueryCategory::General, text).with_step("general_query");
        reply.target_skill = c.target.map(|s| s.name);
        Ok(reply)
    }
}

#[async_trait]
impl Agent for LocalAgent {
    fn name(&self) -> &str {
        "local"
    }

    async fn respond(&self, request: &AgentRequest) -> AgentResult<AgentReply> {
        let classification = self.classify(&request.message).await;
        tracing::debug!(
            category = %classification.category,
            start = ?classification.start.as_ref().map(|s| &s.id),
            target = ?classification.target.as_ref().map(|s| &s.id),
            "classified message"
        );
        match classification.category {
            QueryCategory::RoutePlanning => self.route_planning(classification).await,
            QueryCategory::Prerequisite => self.prerequisite(classification).await,
            QueryCategory::General | QueryCategory::Error => {
                self.general(&request.message, classification).await
            }
        }
    }
}

/// Lowercase with whitespace runs collapsed.
fn normalize_message(message: &str) -> String {
    message
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_names(skills: &[Skill]) -> String {
    skills
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn route_template(path: &LearningPath) -> String {
    let mut out = match (path.start(), path.target()) {
        (Some(s), Some(t)) if path.skills.len() > 1 => format!(
            "Here's a learning path from {} to {} in {} steps:\n",
            s.name,
            t.name,
            path.skills.len() - 1
        ),
        (Some(s), _) => format!("You already have {}; there is nothing in between.\n", s.name),
        _ => String::new(),
    };
    for (i, skill) in path.skills.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, skill.name));
    }
    out.trim_end().to_string()
}

/// Deterministic summary of a skill and its neighbourhood.
pub fn describe_skill(graph: &SkillGraph, skill: &Skill) -> String {
    let prereqs = graph.prerequisites(&skill.id);
    let next = graph.next_skills(&skill.id);
    let mut text = format!("{}: {}.", skill.name, skill.description.trim_end_matches('.'));
    if !prereqs.is_empty() {
        text.push_str(&format!(" It builds on {}.", join_names(&prereqs)));
    }
    if !next.is_empty() {
        text.push_str(&format!(" It leads on to {}.", join_names(&next)));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::LlmError;

    fn agent() -> LocalAgent {
        LocalAgent::new(Arc::new(SkillGraph::bundled().unwrap()))
    }

    fn ids(reply: &AgentReply) -> Vec<&str> {
        reply.path.iter().map(|s| s.id.as_str()).collect()
    }

    struct CannedLlm(&'static str);

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, _prompt: &str, _system: Option<&str>) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
        fn model(&self) -> &str {
            "canned"
        }
    }

    /// Alternates between two classification answers, like a sampled model.
    struct FlipFlopLlm {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for FlipFlopLlm {
        async fn complete(&self, _prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
            if system != Some(CLASSIFY_SYSTEM) {
                return Ok("Here you go.".into());
            }
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(if n % 2 == 0 {
                r#"{"category": "ROUTE_PLANNING"}"#.into()
            } else {
                r#"{"category": "GENERAL_QUERY"}"#.into()
            })
        }
        fn model(&self) -> &str {
            "flip-flop"
        }
    }

    struct DownLlm;

    #[async_trait]
    impl LlmClient for DownLlm {
        async fn complete(&self, _prompt: &str, _system: Option<&str>) -> Result<String, LlmError> {
            Err(LlmError::Unavailable {
                url: "http://127.0.0.1:1".into(),
            })
        }
        fn model(&self) -> &str {
            "down"
        }
    }

    #[tokio::test]
    async fn data_engineer_to_ai_agents() {
        let reply = agent()
            .respond(&AgentRequest::new("I am a data engineer and want to learn AI agents"))
            .await
            .unwrap();
        assert_eq!(reply.category, QueryCategory::RoutePlanning);
        assert_eq!(
            ids(&reply),
            vec![
                "data-engineer",
                "python",
                "machine-learning",
                "ai-engineer",
                "ai-data-scientist",
                "ai-agents"
            ]
        );
        assert_eq!(reply.start_skill.as_deref(), Some("data engineer"));
        assert!(reply.message.contains("5 steps"));
    }

    #[tokio::test]
    async fn prerequisites_of_python() {
        let reply = agent()
            .respond(&AgentRequest::new("What are the prerequisites for Python?"))
            .await
            .unwrap();
        assert_eq!(reply.category, QueryCategory::Prerequisite);
        assert!(reply.path.is_empty());
        assert!(reply.message.contains("datastructures and algorithms"));
    }

    #[tokio::test]
    async fn single_target_routes_from_a_root() {
        let reply = agent()
            .respond(&AgentRequest::new("I want to learn react"))
            .await
            .unwrap();
        assert_eq!(reply.category, QueryCategory::RoutePlanning);
        assert_eq!(ids(&reply).first(), Some(&"computer-science"));
        assert_eq!(ids(&reply).last(), Some(&"react"));
    }

    #[tokio::test]
    async fn general_without_skills_gets_help_text() {
        let reply = agent().respond(&AgentRequest::new("hello")).await.unwrap();
        assert_eq!(reply.category, QueryCategory::General);
        assert!(reply.path.is_empty());
        assert!(reply.message.contains("plan what to learn"));
    }

    #[tokio::test]
    async fn llm_phrases_but_does_not_change_route() {
        let with_llm = agent().with_llm(Arc::new(CannedLlm("A friendly answer.")));
        let reply = with_llm
            .respond(&AgentRequest::new("I know python and want to learn ai agents"))
            .await
            .unwrap();
        assert_eq!(reply.message, "A friendly answer.");
        assert_eq!(
            ids(&reply),
            vec!["python", "machine-learning", "ai-engineer", "ai-data-scientist", "ai-agents"]
        );
    }

    #[tokio::test]
    async fn llm_can_promote_general_to_prerequisite() {
        let with_llm = agent().with_llm(Arc::new(CannedLlm(r#"{"category": "PREREQUISITE"}"#)));
        let reply = with_llm
            .respond(&AgentRequest::new("docker: what comes first?"))
            .await
            .unwrap();
        assert_eq!(reply.category, QueryCategory::Prerequisite);
        assert_eq!(reply.target_skill.as_deref(), Some("docker"));
    }

    #[tokio::test]
    async fn failing_llm_falls_back_to_templates() {
        let with_llm = agent().with_llm(Arc::new(DownLlm));
        let reply = with_llm
            .respond(&AgentRequest::new("What are the prerequisites for docker?"))
            .await
            .unwrap();
        assert_eq!(reply.message, "Before learning docker, you should be comfortable with: devops.");
    }

    #[tokio::test]
    async fn varying_llm_answers_do_not_change_a_repeated_question() {
        let llm = Arc::new(FlipFlopLlm {
            calls: Default::default(),
        });
        let a = agent().with_llm(llm.clone());

        let first = a.respond(&AgentRequest::new("Tell me about docker")).await.unwrap();
        let second = a.respond(&AgentRequest::new("Tell me about docker")).await.unwrap();
        let third = a.respond(&AgentRequest::new("  tell me ABOUT   docker ")).await.unwrap();

        assert_eq!(first.category, QueryCategory::RoutePlanning);
        assert_eq!(first.category, second.category);
        assert_eq!(first.category, third.category);
        assert!(!first.path.is_empty());
        assert_eq!(first.path, second.path);
        assert_eq!(first.path, third.path);
        assert_eq!(llm.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn identical_messages_identical_routes() {
        let a = agent();
        let msg = AgentRequest::new("from java to kubernetes");
        let first = a.respond(&msg).await.unwrap();
        let second = a.respond(&msg).await.unwrap();
        assert_eq!(first.category, second.category);
        assert_eq!(first.path, second.path);
    }
}
