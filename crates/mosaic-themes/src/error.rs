//! Error types for the theme engine
//!
//! Every engine operation returns [`Result<T>`]. Validation, conflict, lookup and
//! veto failures are expected outcomes that callers are meant to handle; only the
//! persistence variants describe collaborator failures.
//!
//! # Error Handling Patterns
//!
//! 1. **Validation Errors**: the first failing field is reported with its path,
//!    validation never aggregates.
//!
//! 2. **Hook Vetoes**: a "before" hook that returns `false`, fails or times out
//!    blocks the transition. The veto names the hook and its scope.
//!
//! 3. **Partial Activation**: if the previous theme was deactivated but the
//!    target could not be activated, [`ThemeError::ActivationIncomplete`] is
//!    returned and the system is left with no active theme. Retrying `activate`
//!    is safe.
//!
//! ```ignore
//! match coordinator.activate("aurora").await {
//!     Ok(theme) => println!("Active: {}", theme.name),
//!     Err(ThemeError::HookVeto(veto)) => eprintln!("Blocked by {}", veto.hook),
//!     Err(e) if e.is_persistence() => eprintln!("Retry later: {}", e),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::fmt;

use thiserror::Error;

use crate::hooks::{HookScope, Transition};

/// Errors that can occur in the theme engine
#[derive(Debug, Error)]
pub enum ThemeError {
    /// A configuration document or theme input failed validation
    #[error("Validation failed at `{path}`: {reason}")]
    Validation { path: String, reason: String },

    /// The operation conflicts with the current catalog state
    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    /// An unknown theme id, theme name or component was requested
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A "before" hook blocked the transition
    #[error("{0}")]
    HookVeto(HookVeto),

    /// The persistence collaborator failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The previous active theme was deactivated but the target could not be
    /// activated. No theme is active until `activate` is retried.
    #[error("Theme '{theme}' could not be activated after deactivating the previous theme: {source}")]
    ActivationIncomplete {
        theme: String,
        #[source]
        source: PersistenceError,
    },

    /// IO error while reading a manifest or configuration file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ThemeError {
    /// Create a validation error for a field path
    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error for a theme looked up by id
    pub fn theme_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Theme",
            name: id.into(),
        }
    }

    /// Create a not-found error for a component
    pub fn component_not_found(category: impl fmt::Display, name: &str) -> Self {
        Self::NotFound {
            kind: "Component",
            name: format!("{}/{}", category, name),
        }
    }

    /// True for outcomes the caller is expected to handle without retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Conflict(_) | Self::NotFound { .. } | Self::HookVeto(_)
        )
    }

    /// True when the persistence collaborator failed, including the partial
    /// activation case
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::ActivationIncomplete { .. })
    }
}

/// Why an operation conflicts with the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// A theme with this name is already registered
    DuplicateName(String),
    /// A theme declares the same component twice within one category
    DuplicateComponent { category: String, name: String },
    /// System themes cannot be deleted
    SystemTheme(String),
    /// The active theme cannot be deleted
    ActiveTheme(String),
    /// More than one theme was observed with `is_active = true`
    MultipleActive(Vec<String>),
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "theme '{}' already exists", name),
            Self::DuplicateComponent { category, name } => {
                write!(f, "component {}/{} is declared more than once", category, name)
            }
            Self::SystemTheme(name) => write!(f, "theme '{}' is a system theme", name),
            Self::ActiveTheme(name) => write!(f, "theme '{}' is currently active", name),
            Self::MultipleActive(names) => {
                write!(f, "multiple active themes: {}", names.join(", "))
            }
        }
    }
}

/// Details of a blocked transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookVeto {
    /// The transition that was blocked
    pub transition: Transition,
    /// Name of the theme the transition targeted
    pub theme: String,
    /// Name of the hook set that vetoed
    pub hook: String,
    /// Whether the vetoing hook was global or theme-scoped
    pub scope: HookScope,
    /// How the hook vetoed
    pub reason: VetoReason,
}

impl fmt::Display for HookVeto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hook '{}' vetoed {} of theme '{}': {}",
            self.scope, self.hook, self.transition, self.theme, self.reason
        )
    }
}

/// How a "before" hook vetoed a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VetoReason {
    /// The hook returned `false`
    Rejected,
    /// The hook returned an error
    Failed(String),
    /// The hook did not complete within the configured timeout
    TimedOut { timeout_ms: u64 },
}

impl fmt::Display for VetoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(f, "rejected"),
            Self::Failed(message) => write!(f, "failed: {}", message),
            Self::TimedOut { timeout_ms } => write!(f, "timed out after {}ms", timeout_ms),
        }
    }
}

/// Errors reported by a [`ThemeStore`](crate::store::ThemeStore)
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO failure in a file-backed store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A theme record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backend is unreachable or refused the write
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored record is unreadable
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for theme engine operations
pub type Result<T> = std::result::Result<T, ThemeError>;
