// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # skill-atlas
//!
//! Personalized learning paths over a skill prerequisite graph.
//!
//! A user chats with an assistant that classifies each message, finds the
//! skills it mentions and answers with a route between them, their
//! prerequisites or a description. Routes are highlighted on the roadmap
//! visualisation and can be saved as learning tracks.
//!
//! ## Architecture
//!
//! - **Skill graph** (`skill`): petgraph with DashMap indexes, BFS path search, element export
//! - **Agents** (`agent`): AgentCore client, local agent, fallback chain
//! - **Chat** (`chat`, `session`, `highlight`): response envelope, view-model, highlight state machine
//! - **Tracks** (`track`): redb or PocketBase persistence, start-learning flow
//! - **Notes** (`notes`): per-user notes and tags in redb or PocketBase
//! - **HTTP** (`server`, feature `server`): axum API served by `atlasd`
//!
//! ## Library usage
//!
//! ```no_run
//! use skill_atlas::skill::{SkillGraph, find_learning_path, DEFAULT_MAX_HOPS};
//!
//! let graph = SkillGraph::bundled().unwrap();
//! let path = find_learning_path(&graph, "python", "ai agents", DEFAULT_MAX_HOPS)
//!     .unwrap()
//!     .unwrap();
//! println!("{}", path.names().join(" → "));
//! ```

pub mod agent;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod highlight;
pub mod notes;
pub mod paths;
pub mod pocketbase;
#[cfg(feature = "server")]
pub mod server;
pub mod session;
pub mod skill;
pub mod store;
pub mod track;
