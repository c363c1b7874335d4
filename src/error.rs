//! Rich diagnostic error types for skill-atlas.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so operators know what went wrong and
//! how to fix it. Errors that concern external collaborators (agent, LLM,
//! PocketBase) live next to their clients; the shared ones live here.

use miette::Diagnostic;
use thiserror::Error;

use crate::agent::AgentError;
use crate::agent::llm::LlmError;
use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::notes::NoteError;
use crate::paths::PathError;
use crate::session::SessionError;
use crate::track::TrackError;

/// Top-level error type for skill-atlas.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the CLI.
#[derive(Debug, Error, Diagnostic)]
pub enum AtlasError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Paths(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Notes(#[from] NoteError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("skill not found: \"{name}\"")]
    #[diagnostic(
        code(atlas::graph::skill_not_found),
        help(
            "No skill with this id or name exists in the skill graph. \
             List known skills with `atlas skills` or `atlas skills --search <text>`."
        )
    )]
    SkillNotFound { name: String },

    #[error("duplicate skill id: {id}")]
    #[diagnostic(
        code(atlas::graph::duplicate_skill),
        help("Two catalog entries slugify to the same id. Rename one of them.")
    )]
    DuplicateSkill { id: String },

    #[error("failed to read skill catalog {path}")]
    #[diagnostic(
        code(atlas::graph::catalog_read),
        help("Check that SKILL_CATALOG points at a readable JSON file.")
    )]
    CatalogRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse skill catalog {path}: {message}")]
    #[diagnostic(
        code(atlas::graph::catalog_parse),
        help(
            "The catalog must be a JSON object with `skills` (array of {{name, description?}}) \
             and `connections` (array of [from, to] name pairs)."
        )
    )]
    CatalogParse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(atlas::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(atlas::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption; try a fresh data directory. \
             If the problem persists, file a bug report."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(atlas::store::serde),
        help(
            "Failed to serialize or deserialize a stored record. \
             This usually means the record format changed between versions."
        )
    )]
    Serialization { message: String },
}

/// Convenience alias for functions returning skill-atlas results.
pub type AtlasResult<T> = std::result::Result<T, AtlasError>;
