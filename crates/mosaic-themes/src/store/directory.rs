//! Directory-backed theme store
//!
//! Each theme is stored as `<id>.json` in one directory. Writes go to a
//! temporary file first and are renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::ThemeStore;
use crate::{
    error::PersistenceError,
    types::{Theme, ThemeId},
};

/// Stores one pretty-printed JSON document per theme
#[derive(Debug, Clone)]
pub struct DirectoryThemeStore {
    root: PathBuf,
}

impl DirectoryThemeStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &ThemeId) -> Result<PathBuf, PersistenceError> {
        let valid = !id.as_str().is_empty()
            && id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::Serialization(format!(
                "theme id '{}' cannot be used as a file name",
                id
            )));
        }
        Ok(self.root.join(format!("{}.json", id)))
    }
}

/// Read one record; a file removed since the listing counts as unreadable
async fn read_record(path: &Path) -> Result<Theme, PersistenceError> {
    let corrupt = |reason: String| PersistenceError::Corrupt {
        id: path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
        reason,
    };
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| corrupt(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))
}

#[async_trait]
impl ThemeStore for DirectoryThemeStore {
    async fn load_all(&self) -> Result<Vec<Theme>, PersistenceError> {
        let mut themes = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path).await {
                Ok(theme) => themes.push(theme),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable theme record");
                }
            }
        }

        debug!(root = %self.root.display(), count = themes.len(), "Loaded theme records");
        Ok(themes)
    }

    async fn save(&self, theme: &Theme) -> Result<(), PersistenceError> {
        let path = self.record_path(&theme.id)?;
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(theme)?;

        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, id: &ThemeId) -> Result<(), PersistenceError> {
        let path = self.record_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::types::{ComponentCategory, ComponentDescriptor};

    fn theme(name: &str) -> Theme {
        Theme {
            id: ThemeId::new(),
            name: name.to_string(),
            display_name: name.to_string(),
            version: "1.0.0".to_string(),
            author: Some("Mosaic".to_string()),
            description: None,
            is_system: false,
            is_active: true,
            config: json!({"mode": "dark"}),
            config_schema: None,
            components: vec![ComponentDescriptor::new(ComponentCategory::Block, "Header", "blocks/header.js")],
            aliases: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryThemeStore::open(dir.path().join("themes")).await.unwrap();
        let t = theme("aurora");

        store.save(&t).await.unwrap();
        let reopened = DirectoryThemeStore::open(dir.path().join("themes")).await.unwrap();
        assert_eq!(reopened.load_all().await.unwrap(), vec![t]);
    }

    #[tokio::test]
    async fn test_remove_record() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryThemeStore::open(dir.path()).await.unwrap();
        let t = theme("aurora");
        store.save(&t).await.unwrap();

        store.remove(&t.id).await.unwrap();
        store.remove(&t.id).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skips_corrupt_records() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryThemeStore::open(dir.path()).await.unwrap();
        store.save(&theme("aurora")).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_skips_records_that_vanish_before_reading() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryThemeStore::open(dir.path()).await.unwrap();
        let t = theme("aurora");
        store.save(&t).await.unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.json"), dir.path().join("vanished.json"))
            .unwrap();

        assert_eq!(store.load_all().await.unwrap(), vec![t]);
    }

    #[tokio::test]
    async fn test_unreadable_record_reports_its_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = read_record(&path).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { ref id, .. } if id == "broken"));
        assert!(matches!(
            read_record(&dir.path().join("missing.json")).await,
            Err(PersistenceError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryThemeStore::open(dir.path()).await.unwrap();
        let mut t = theme("aurora");
        t.id = ThemeId::from_string("../escape");

        assert!(matches!(
            store.save(&t).await,
            Err(PersistenceError::Serialization(_))
        ));
    }
}
