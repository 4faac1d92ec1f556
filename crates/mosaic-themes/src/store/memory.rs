//! In-memory theme store

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::ThemeStore;
use crate::{
    error::PersistenceError,
    types::{Theme, ThemeId},
};

/// Thread-safe in-memory implementation of [`ThemeStore`]
///
/// Stores cloned themes, so callers never share state with the store.
#[derive(Debug, Default)]
pub struct InMemoryThemeStore {
    themes: RwLock<BTreeMap<ThemeId, Theme>>,
}

impl InMemoryThemeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with records, bypassing the registry
    pub fn with_themes(themes: Vec<Theme>) -> Self {
        Self {
            themes: RwLock::new(themes.into_iter().map(|t| (t.id.clone(), t)).collect()),
        }
    }

    /// Write a record directly, as an external edit would
    pub fn put(&self, theme: Theme) {
        self.themes.write().insert(theme.id.clone(), theme);
    }

    pub fn count(&self) -> usize {
        self.themes.read().len()
    }

    pub fn clear(&self) {
        self.themes.write().clear();
    }
}

#[async_trait]
impl ThemeStore for InMemoryThemeStore {
    async fn load_all(&self) -> Result<Vec<Theme>, PersistenceError> {
        Ok(self.themes.read().values().cloned().collect())
    }

    async fn save(&self, theme: &Theme) -> Result<(), PersistenceError> {
        self.themes.write().insert(theme.id.clone(), theme.clone());
        Ok(())
    }

    async fn remove(&self, id: &ThemeId) -> Result<(), PersistenceError> {
        self.themes.write().remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn theme(name: &str) -> Theme {
        Theme {
            id: ThemeId::new(),
            name: name.to_string(),
            display_name: name.to_string(),
            version: "1.0.0".to_string(),
            author: None,
            description: None,
            is_system: false,
            is_active: false,
            config: json!({}),
            config_schema: None,
            components: Vec::new(),
            aliases: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemoryThemeStore::new();
        let t = theme("aurora");
        store.save(&t).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all, vec![t]);
    }

    #[tokio::test]
    async fn test_save_replaces() {
        let store = InMemoryThemeStore::new();
        let mut t = theme("aurora");
        store.save(&t).await.unwrap();
        t.version = "2.0.0".to_string();
        store.save(&t).await.unwrap();

        assert_eq!(store.count(), 1);
        assert_eq!(store.load_all().await.unwrap()[0].version, "2.0.0");
    }

    #[tokio::test]
    async fn test_remove_unknown_is_ok() {
        let store = InMemoryThemeStore::with_themes(vec![theme("a")]);
        store.remove(&ThemeId::from_string("missing")).await.unwrap();
        assert_eq!(store.count(), 1);
    }
}
