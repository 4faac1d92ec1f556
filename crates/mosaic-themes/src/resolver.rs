//! Component resolution
//!
//! Maps a `(category, name)` pair to the implementation supplied by a theme.
//! Lookups check the theme's declared components first, then its alias table.
//! Loaded components are cached per `(theme id, category, name)` until the
//! owning theme is updated or deleted. Lookups go through a [`ComponentIndex`]
//! built once per theme revision.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Component as PathComponent, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    error::{ConflictReason, Result, ThemeError},
    types::{ComponentAlias, ComponentCategory, ComponentDescriptor, Theme, ThemeId},
};

/// A loaded building block, ready for the rendering layer
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub theme_id: ThemeId,
    pub category: ComponentCategory,
    /// Declared name of the component (aliases resolve to it)
    pub name: String,
    pub entry: String,
    pub label: Option<String>,
    pub props_schema: Option<Value>,
    /// Loaded implementation, if the loader reads one
    pub source: Option<Arc<str>>,
}

impl Component {
    fn from_descriptor(theme: &Theme, descriptor: &ComponentDescriptor, source: Option<Arc<str>>) -> Self {
        Self {
            theme_id: theme.id.clone(),
            category: descriptor.category,
            name: descriptor.name.clone(),
            entry: descriptor.entry.clone(),
            label: descriptor.label.clone(),
            props_schema: descriptor.props_schema.clone(),
            source,
        }
    }
}

/// Loads the implementation behind a component descriptor
#[async_trait]
pub trait ComponentLoader: Send + Sync {
    async fn load(&self, theme: &Theme, descriptor: &ComponentDescriptor) -> Result<Component>;
}

/// Loader that only materializes descriptor metadata
#[derive(Debug, Clone, Default)]
pub struct DescriptorLoader;

#[async_trait]
impl ComponentLoader for DescriptorLoader {
    async fn load(&self, theme: &Theme, descriptor: &ComponentDescriptor) -> Result<Component> {
        Ok(Component::from_descriptor(theme, descriptor, None))
    }
}

/// Loader that reads `<root>/<theme name>/<entry>` from disk
#[derive(Debug, Clone)]
pub struct FileComponentLoader {
    root: PathBuf,
}

impl FileComponentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, theme: &Theme, entry: &str) -> Result<PathBuf> {
        let relative = Path::new(entry);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, PathComponent::Normal(_) | PathComponent::CurDir));
        if escapes {
            return Err(ThemeError::validation(
                "entry",
                format!("component entry '{}' must stay inside the theme directory", entry),
            ));
        }
        Ok(self.root.join(&theme.name).join(relative))
    }
}

#[async_trait]
impl ComponentLoader for FileComponentLoader {
    async fn load(&self, theme: &Theme, descriptor: &ComponentDescriptor) -> Result<Component> {
        let path = self.entry_path(theme, &descriptor.entry)?;
        debug!(theme = %theme.name, path = %path.display(), "Loading component source");
        let source = tokio::fs::read_to_string(&path).await?;
        Ok(Component::from_descriptor(theme, descriptor, Some(Arc::from(source))))
    }
}

/// Typed index of the components and aliases a theme declares
#[derive(Debug, Clone, Default)]
pub struct ComponentIndex {
    declared: BTreeMap<(ComponentCategory, String), usize>,
    aliases: BTreeMap<(ComponentCategory, String), String>,
}

impl ComponentIndex {
    /// Build the index, rejecting duplicate names and dangling aliases
    pub fn build(components: &[ComponentDescriptor], aliases: &[ComponentAlias]) -> Result<Self> {
        let mut index = Self::default();

        for (position, component) in components.iter().enumerate() {
            if component.name.is_empty() {
                return Err(ThemeError::validation(
                    format!("components[{}].name", position),
                    "component name cannot be empty",
                ));
            }
            let key = (component.category, component.name.clone());
            if index.declared.insert(key, position).is_some() {
                return Err(ThemeError::Conflict(ConflictReason::DuplicateComponent {
                    category: component.category.to_string(),
                    name: component.name.clone(),
                }));
            }
        }

        for (position, alias) in aliases.iter().enumerate() {
            let key = (alias.category, alias.alias.clone());
            if index.declared.contains_key(&key) || index.aliases.contains_key(&key) {
                return Err(ThemeError::Conflict(ConflictReason::DuplicateComponent {
                    category: alias.category.to_string(),
                    name: alias.alias.clone(),
                }));
            }
            if !index
                .declared
                .contains_key(&(alias.category, alias.target.clone()))
            {
                return Err(ThemeError::validation(
                    format!("aliases[{}].target", position),
                    format!("alias '{}' points to unknown component '{}'", alias.alias, alias.target),
                ));
            }
            index.aliases.insert(key, alias.target.clone());
        }

        Ok(index)
    }

    /// Position of the descriptor a name resolves to, following one alias hop
    pub fn lookup(&self, category: ComponentCategory, name: &str) -> Option<usize> {
        let key = (category, name.to_string());
        if let Some(position) = self.declared.get(&key) {
            return Some(*position);
        }
        let target = self.aliases.get(&key)?;
        self.declared.get(&(category, target.clone())).copied()
    }
}

type ComponentKey = (ComponentCategory, String);

/// Cached state of one theme revision
struct ThemeCache {
    revision: DateTime<Utc>,
    index: ComponentIndex,
    cells: Mutex<HashMap<ComponentKey, Arc<OnceCell<Arc<Component>>>>>,
}

impl ThemeCache {
    fn build(theme: &Theme) -> Result<Self> {
        Ok(Self {
            revision: theme.updated_at,
            index: ComponentIndex::build(&theme.components, &theme.aliases)?,
            cells: Mutex::new(HashMap::new()),
        })
    }

    fn cell(&self, category: ComponentCategory, name: &str) -> Arc<OnceCell<Arc<Component>>> {
        Arc::clone(
            self.cells
                .lock()
                .entry((category, name.to_string()))
                .or_default(),
        )
    }

    fn loaded(&self) -> usize {
        self.cells
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }
}

/// Resolves and caches component implementations
///
/// Each theme is cached under the `updated_at` of the snapshot that filled it.
/// A newer snapshot replaces the entry; an older one resolves without touching
/// the cache.
pub struct ComponentResolver {
    loader: Arc<dyn ComponentLoader>,
    themes: Mutex<HashMap<ThemeId, Arc<ThemeCache>>>,
}

impl ComponentResolver {
    pub fn new(loader: Arc<dyn ComponentLoader>) -> Self {
        Self {
            loader,
            themes: Mutex::new(HashMap::new()),
        }
    }

    fn theme_cache(&self, theme: &Theme) -> Result<Arc<ThemeCache>> {
        let mut themes = self.themes.lock();
        match themes.get(&theme.id) {
            Some(cached) if cached.revision == theme.updated_at => return Ok(Arc::clone(cached)),
            Some(cached) if cached.revision > theme.updated_at => {
                debug!(theme = %theme.name, "Resolving from an outdated theme snapshot");
                return ThemeCache::build(theme).map(Arc::new);
            }
            _ => {}
        }
        let cache = Arc::new(ThemeCache::build(theme)?);
        themes.insert(theme.id.clone(), Arc::clone(&cache));
        Ok(cache)
    }

    /// Resolve a component of `theme`, loading it on first use
    ///
    /// Only the requested component is loaded. Concurrent requests for the same
    /// key share one load.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::NotFound`] when the theme neither declares nor
    /// aliases the name; the rendering layer treats that as "render nothing".
    /// Loader failures are returned as-is and are not cached.
    pub async fn resolve(
        &self,
        theme: &Theme,
        category: ComponentCategory,
        name: &str,
    ) -> Result<Arc<Component>> {
        let cache = self.theme_cache(theme)?;
        let descriptor = cache
            .index
            .lookup(category, name)
            .and_then(|position| theme.components.get(position))
            .ok_or_else(|| ThemeError::component_not_found(category, name))?;

        let cell = cache.cell(category, name);
        let component = cell
            .get_or_try_init(|| async {
                debug!(theme = %theme.name, %category, component = %name, "Loading component");
                self.loader.load(theme, descriptor).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(component))
    }

    /// Drop every cached component of a theme
    pub fn invalidate_theme(&self, theme_id: &ThemeId) -> usize {
        let removed = self
            .themes
            .lock()
            .remove(theme_id)
            .map_or(0, |cache| cache.cells.lock().len());
        if removed > 0 {
            debug!(theme_id = %theme_id, removed, "Invalidated component cache");
        }
        removed
    }

    /// Number of resolved components currently cached
    pub fn cached_len(&self) -> usize {
        self.themes.lock().values().map(|cache| cache.loaded()).sum()
    }
}

impl std::fmt::Debug for ComponentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentResolver")
            .field("cached", &self.cached_len())
            .finish()
    }
}
