//! XDG-compliant path resolution for skill-atlas.
//!
//! The daemon keeps its configuration under `$XDG_CONFIG_HOME/skill-atlas/`
//! and the local learning-track and notes databases under
//! `$XDG_DATA_HOME/skill-atlas/`.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(atlas::paths::no_home),
        help("Set the HOME environment variable or pass --data-dir explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(atlas::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

const APP_DIR: &str = "skill-atlas";

/// Global XDG-compliant directories for skill-atlas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasPaths {
    /// `$XDG_CONFIG_HOME/skill-atlas/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/skill-atlas/`
    pub data_dir: PathBuf,
    /// `$XDG_STATE_HOME/skill-atlas/`
    pub state_dir: PathBuf,
}

impl AtlasPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using an arbitrary variable lookup.
    ///
    /// Tests use this instead of mutating the process environment.
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> PathResult<Self> {
        let home = lookup("HOME").map(PathBuf::from).ok_or(PathError::NoHome)?;

        let config_dir = lookup("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".config"))
            .join(APP_DIR);

        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".local/share"))
            .join(APP_DIR);

        let state_dir = lookup("XDG_STATE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".local/state"))
            .join(APP_DIR);

        Ok(Self {
            config_dir,
            data_dir,
            state_dir,
        })
    }

    /// Root all directories under a single explicit data directory.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            state_dir: root.join("state"),
        }
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.state_dir,
            &self.tracks_dir(),
            &self.notes_dir(),
        ] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the global config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directory holding the local learning-track database.
    pub fn tracks_dir(&self) -> PathBuf {
        self.data_dir.join("tracks")
    }

    /// Directory holding the local notes database.
    pub fn notes_dir(&self) -> PathBuf {
        self.data_dir.join("notes")
    }

    /// Chat history persisted by the CLI between `atlas ask` invocations.
    pub fn chat_history_file(&self) -> PathBuf {
        self.state_dir.join("chat-history.json")
    }
}
