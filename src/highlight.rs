//! Path highlighting on the graph visualisation.
//!
//! States: `Idle → WaitingForVisualization → Highlighting → Settled`.
//!
//! The visualisation fills in asynchronously and independently of the chat
//! answer, so highlighting polls it: up to `max_attempts` passes, pass *n*
//! running `n × step` after the previous one. A pass that finds no elements
//! changes nothing and schedules the next. Running out of attempts is not an
//! error; the answer text stands on its own.
//!
//! The surface is reached through an injected [`VisualizationHandle`].
//! [`ElementView`] is an in-memory implementation over exported elements.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::agent::QueryCategory;
use crate::chat::ChatResponse;
use crate::config::HighlightConfig;
use crate::skill::elements::Elements;
use crate::skill::{Skill, SkillId, edge_id};

/// Access to a graph visualisation surface.
pub trait VisualizationHandle {
    /// The surface exists and its page has finished loading.
    fn is_mounted(&self) -> bool;
    /// Number of rendered elements (nodes and edges); zero while still initialising.
    fn element_count(&self) -> usize;
    /// Remove every highlight and dim mark.
    fn clear_marks(&mut self);
    /// Mark every element dimmed.
    fn dim_all(&mut self);
    /// Highlight and un-dim the node with this id. `false` if there is no such node.
    fn highlight_node(&mut self, id: &SkillId) -> bool;
    /// Highlight and un-dim the edge with this id. `false` if there is no such edge.
    fn highlight_edge(&mut self, id: &str) -> bool;
    /// Frame the view on exactly the highlighted elements.
    fn fit_to_highlighted(&mut self);
}

/// Bounded linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(cfg: &HighlightConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            step: Duration::from_millis(cfg.step_ms),
        }
    }

    /// Wait before pass `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.step * attempt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotRoutePlanning,
    EmptyPath,
    SurfaceUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Settlement {
    Highlighted,
    Skipped { reason: SkipReason },
    /// The visualisation stayed empty for every attempt.
    Abandoned { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum HighlightState {
    Idle,
    WaitingForVisualization { attempt: u32 },
    Highlighting { attempt: u32 },
    Settled { settlement: Settlement },
}

/// One poll of the visualisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassRecord {
    pub attempt: u32,
    /// Time since the run started.
    #[serde(with = "duration_millis")]
    pub at: Duration,
    pub element_count: usize,
}

mod duration_millis {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }
}

/// What one highlight run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightReport {
    pub transitions: Vec<HighlightState>,
    pub passes: Vec<PassRecord>,
    pub highlighted_nodes: Vec<SkillId>,
    pub highlighted_edges: Vec<String>,
    /// Path ids with no node on the surface.
    pub skipped_nodes: Vec<SkillId>,
    /// Edge ids looked up, in order.
    pub edge_lookups: Vec<String>,
    pub settlement: Settlement,
}

impl HighlightReport {
    fn new() -> Self {
        Self {
            transitions: vec![HighlightState::Idle],
            passes: Vec::new(),
            highlighted_nodes: Vec::new(),
            highlighted_edges: Vec::new(),
            skipped_nodes: Vec::new(),
            edge_lookups: Vec::new(),
            settlement: Settlement::Abandoned { attempts: 0 },
        }
    }

    fn enter(&mut self, state: HighlightState) {
        self.transitions.push(state);
    }

    fn settle(mut self, settlement: Settlement) -> Self {
        self.settlement = settlement;
        self.enter(HighlightState::Settled { settlement });
        self
    }

    pub fn final_state(&self) -> HighlightState {
        HighlightState::Settled {
            settlement: self.settlement,
        }
    }
}

/// Mark `path` on the surface: clear, dim everything, highlight the path's
/// nodes and the edges between consecutive skills, then frame them.
pub fn highlight_pass<H: VisualizationHandle>(handle: &mut H, path: &[Skill], report: &mut HighlightReport) {
    handle.clear_marks();
    handle.dim_all();

    for skill in path {
        if handle.highlight_node(&skill.id) {
            report.highlighted_nodes.push(skill.id.clone());
        } else {
            tracing::debug!(skill = %skill.id, "no node for path skill");
            report.skipped_nodes.push(skill.id.clone());
        }
    }

    for pair in path.windows(2) {
        let id = edge_id(&pair[0].id, &pair[1].id);
        report.edge_lookups.push(id.clone());
        if handle.highlight_edge(&id) {
            report.highlighted_edges.push(id);
        } else {
            tracing::debug!(edge = %id, "no edge for consecutive path skills");
        }
    }

    if !report.highlighted_nodes.is_empty() || !report.highlighted_edges.is_empty() {
        handle.fit_to_highlighted();
    }
}

/// Drives highlighting against one visualisation handle.
pub struct PathHighlighter<H> {
    handle: H,
    policy: RetryPolicy,
}

impl<H: VisualizationHandle> PathHighlighter<H> {
    pub fn new(handle: H, policy: RetryPolicy) -> Self {
        Self { handle, policy }
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    pub fn into_handle(self) -> H {
        self.handle
    }

    /// Highlight the route attached to a chat answer, if any.
    pub async fn run_response(&mut self, response: &ChatResponse) -> HighlightReport {
        let category = response.category().unwrap_or(QueryCategory::General);
        self.run(category, response.path()).await
    }

    pub async fn run(&mut self, category: QueryCategory, path: &[Skill]) -> HighlightReport {
        let report = HighlightReport::new();

        if category != QueryCategory::RoutePlanning {
            return report.settle(Settlement::Skipped {
                reason: SkipReason::NotRoutePlanning,
            });
        }
        if path.is_empty() {
            return report.settle(Settlement::Skipped {
                reason: SkipReason::EmptyPath,
            });
        }
        if !self.handle.is_mounted() {
            tracing::debug!("visualisation not mounted, skipping highlight");
            return report.settle(Settlement::Skipped {
                reason: SkipReason::SurfaceUnavailable,
            });
        }

        self.poll(path, report).await
    }

    async fn poll(&mut self, path: &[Skill], mut report: HighlightReport) -> HighlightReport {
        let started = tokio::time::Instant::now();

        for attempt in 1..=self.policy.max_attempts {
            report.enter(HighlightState::WaitingForVisualization { attempt });
            tokio::time::sleep(self.policy.delay_before(attempt)).await;

            let element_count = self.handle.element_count();
            report.passes.push(PassRecord {
                attempt,
                at: started.elapsed(),
                element_count,
            });
            if element_count == 0 {
                tracing::debug!(attempt, "visualisation still empty");
                continue;
            }

            report.enter(HighlightState::Highlighting { attempt });
            highlight_pass(&mut self.handle, path, &mut report);
            return report.settle(Settlement::Highlighted);
        }

        tracing::debug!(
            attempts = self.policy.max_attempts,
            "visualisation never populated, abandoning highlight"
        );
        let attempts = self.policy.max_attempts;
        report.settle(Settlement::Abandoned { attempts })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Marks {
    highlighted: bool,
    dimmed: bool,
}

/// In-memory visualisation surface.
#[derive(Debug, Clone, Default)]
pub struct ElementView {
    mounted: bool,
    nodes: BTreeMap<String, Marks>,
    edges: BTreeMap<String, Marks>,
    framed: Option<Vec<String>>,
    mutations: usize,
}

impl ElementView {
    /// A mounted surface showing `elements`.
    pub fn from_elements(elements: &Elements) -> Self {
        let mut view = Self::empty();
        view.populate(elements);
        view
    }

    /// A mounted surface with nothing rendered yet.
    pub fn empty() -> Self {
        Self {
            mounted: true,
            ..Default::default()
        }
    }

    /// No surface on the page at all.
    pub fn unmounted() -> Self {
        Self::default()
    }

    /// Render `elements`, replacing what was there.
    pub fn populate(&mut self, elements: &Elements) {
        self.nodes = elements
            .nodes
            .iter()
            .map(|n| (n.data.id.to_string(), Marks::default()))
            .collect();
        self.edges = elements
            .edges
            .iter()
            .map(|e| (e.data.id.clone(), Marks::default()))
            .collect();
        self.framed = None;
    }

    /// Count of state-changing calls made through the handle.
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    pub fn highlighted_nodes(&self) -> Vec<&str> {
        marked(&self.nodes, |m| m.highlighted)
    }

    pub fn highlighted_edges(&self) -> Vec<&str> {
        marked(&self.edges, |m| m.highlighted)
    }

    pub fn is_dimmed(&self, id: &str) -> bool {
        self.nodes
            .get(id)
            .or_else(|| self.edges.get(id))
            .is_some_and(|m| m.dimmed)
    }

    /// Element ids the view was last framed on.
    pub fn framed(&self) -> Option<&[String]> {
        self.framed.as_deref()
    }
}

fn marked(map: &BTreeMap<String, Marks>, pred: impl Fn(&Marks) -> bool) -> Vec<&str> {
    map.iter()
        .filter(|(_, m)| pred(m))
        .map(|(id, _)| id.as_str())
        .collect()
}

fn mark(map: &mut BTreeMap<String, Marks>, id: &str) -> bool {
    match map.get_mut(id) {
        Some(m) => {
            m.highlighted = true;
            m.dimmed = false;
            true
        }
        None => false,
    }
}

impl VisualizationHandle for ElementView {
    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn element_count(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    fn clear_marks(&mut self) {
        self.mutations += 1;
        for m in self.nodes.values_mut().chain(self.edges.values_mut()) {
            *m = Marks::default();
        }
        self.framed = None;
    }

    fn dim_all(&mut self) {
        self.mutations += 1;
        for m in self.nodes.values_mut().chain(self.edges.values_mut()) {
            m.dimmed = true;
        }
    }

    fn highlight_node(&mut self, id: &SkillId) -> bool {
        let found = mark(&mut self.nodes, id.as_str());
        self.mutations += usize::from(found);
        found
    }

    fn highlight_edge(&mut self, id: &str) -> bool {
        let found = mark(&mut self.edges, id);
        self.mutations += usize::from(found);
        found
    }

    fn fit_to_highlighted(&mut self) {
        self.mutations += 1;
        let mut ids: Vec<String> = self.highlighted_nodes().into_iter().map(String::from).collect();
        ids.extend(self.highlighted_edges().into_iter().map(String::from));
        self.framed = Some(ids);
    }
}
