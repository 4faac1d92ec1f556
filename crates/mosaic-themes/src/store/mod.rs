//! Persistence collaborators
//!
//! The engine treats the store as the durable source of truth. It assumes
//! read-after-write consistency per record and no transactions.
//!
//! ```text
//! ThemeRegistry ──► dyn ThemeStore
//!                     ├── InMemoryThemeStore   (tests, development)
//!                     └── DirectoryThemeStore  (one JSON document per theme)
//! ```

pub mod directory;
pub mod memory;

use async_trait::async_trait;

pub use directory::DirectoryThemeStore;
pub use memory::InMemoryThemeStore;

use crate::{
    error::PersistenceError,
    types::{Theme, ThemeId},
};

/// Durable storage for theme records
#[async_trait]
pub trait ThemeStore: Send + Sync {
    /// Load every stored theme
    async fn load_all(&self) -> Result<Vec<Theme>, PersistenceError>;

    /// Insert or replace a theme record
    async fn save(&self, theme: &Theme) -> Result<(), PersistenceError>;

    /// Remove a theme record. Removing an unknown id is not an error.
    async fn remove(&self, id: &ThemeId) -> Result<(), PersistenceError>;
}
