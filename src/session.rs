//! Chat session view-model.
//!
//! Holds what the chat widget shows between messages: a bounded history, the
//! route currently on screen and the skill selected in the side panel. Only
//! one reply may be outstanding at a time; [`ChatSession::begin_send`] refuses
//! a second send until [`ChatSession::receive`] or [`ChatSession::fail_send`]
//! settles the first.

use std::collections::VecDeque;
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::QueryCategory;
use crate::chat::{ChatResponse, PathData, now_timestamp};
use crate::skill::SkillId;

/// Messages kept in history.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("message is empty")]
    #[diagnostic(code(atlas::session::empty_message), help("Type a question before sending."))]
    EmptyMessage,

    #[error("a reply is still pending")]
    #[diagnostic(
        code(atlas::session::reply_pending),
        help("Wait for the current answer before sending another message.")
    )]
    ReplyPending,

    #[error("failed to access chat history {path}")]
    #[diagnostic(
        code(atlas::session::io),
        help("Check permissions on the state directory, or delete the history file.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chat history is not valid JSON: {message}")]
    #[diagnostic(
        code(atlas::session::format),
        help("The history file is only a display cache; it is safe to delete it.")
    )]
    Format { message: String },
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub sender: Sender,
    pub timestamp: String,
}

impl ChatMessage {
    fn now(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender,
            timestamp: now_timestamp(),
        }
    }
}

/// What the widget should do after an answer arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveOutcome {
    /// Run the path highlighter.
    pub highlight: bool,
    /// Show the start-learning button.
    pub offer_start_learning: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    history: VecDeque<ChatMessage>,
    pending: bool,
    current_path: Option<PathData>,
    selected_skill: Option<SkillId>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Route from the last route-planning answer, if it had one.
    pub fn current_path(&self) -> Option<&PathData> {
        self.current_path.as_ref()
    }

    pub fn selected_skill(&self) -> Option<&SkillId> {
        self.selected_skill.as_ref()
    }

    pub fn select_skill(&mut self, id: SkillId) {
        self.selected_skill = Some(id);
    }

    pub fn clear_selection(&mut self) {
        self.selected_skill = None;
    }

    fn push(&mut self, message: ChatMessage) {
        self.history.push_back(message);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Record an outgoing message and mark a reply as pending.
    ///
    /// Returns the trimmed text to send.
    pub fn begin_send(&mut self, text: &str) -> SessionResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.pending {
            return Err(SessionError::ReplyPending);
        }
        self.pending = true;
        self.push(ChatMessage::now(Sender::User, text));
        Ok(text.to_string())
    }

    /// Record an answer. The on-screen route is replaced: a route-planning
    /// answer with a non-empty path becomes current, anything else clears it.
    pub fn receive(&mut self, response: &ChatResponse) -> ReceiveOutcome {
        self.pending = false;
        self.push(ChatMessage::now(Sender::Ai, response.ai_response.clone()));

        let route = response.category() == Some(QueryCategory::RoutePlanning)
            && !response.path().is_empty();
        self.current_path = if route {
            response.path_data.clone()
        } else {
            None
        };

        ReceiveOutcome {
            highlight: route,
            offer_start_learning: route,
        }
    }

    /// The request failed before any answer arrived; show `notice` instead.
    pub fn fail_send(&mut self, notice: &str) {
        self.pending = false;
        self.push(ChatMessage::now(Sender::Ai, notice));
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn to_json(&self) -> SessionResult<String> {
        serde_json::to_string_pretty(&self.history).map_err(|e| SessionError::Format {
            message: e.to_string(),
        })
    }

    /// Restore history, keeping only the most recent [`HISTORY_LIMIT`] entries.
    pub fn from_json(json: &str) -> SessionResult<Self> {
        let messages: Vec<ChatMessage> =
            serde_json::from_str(json).map_err(|e| SessionError::Format {
                message: e.to_string(),
            })?;
        let mut session = Self::new();
        for message in messages {
            session.push(message);
        }
        Ok(session)
    }

    /// Load history from `path`; a missing file is an empty session.
    pub fn load(path: &Path) -> SessionResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(SessionError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> SessionResult<()> {
        let io_err = |source| SessionError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, self.to_json()?).map_err(io_err)
    }
}
