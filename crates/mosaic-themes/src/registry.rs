//! Theme registry
//!
//! The catalog of known themes. Every read goes through the
//! [`ThemeStore`], which stays the source of truth; every successful write
//! notifies the registered observers after the store accepted it.
//!
//! The registry never sets `is_active` on behalf of its callers. Activation
//! flags are written through [`ThemeRegistry::set_active`], which is only
//! visible inside the crate and only called by the
//! [`ActivationCoordinator`](crate::coordinator::ActivationCoordinator).

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{
    error::{ConflictReason, Result, ThemeError},
    hooks::{HookManager, Transition},
    resolver::ComponentIndex,
    store::ThemeStore,
    types::{validate_name, Theme, ThemeCreateInput, ThemeId, ThemePatch},
    validator::ConfigValidator,
};

/// Lock serializing activation writes, shared with the coordinator
pub(crate) type ActivationLock = Arc<tokio::sync::Mutex<()>>;

/// Change notification delivered to registry observers
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Registered(Theme),
    Updated(Theme),
    Deleted(Theme),
    ActivationChanged(Theme),
}

impl RegistryEvent {
    pub fn theme(&self) -> &Theme {
        match self {
            Self::Registered(theme)
            | Self::Updated(theme)
            | Self::Deleted(theme)
            | Self::ActivationChanged(theme) => theme,
        }
    }
}

/// Type alias for registry observers
type RegistryObservers = RwLock<Vec<Arc<dyn Fn(&RegistryEvent) + Send + Sync>>>;

/// Releases a reserved theme name when a registration finishes
struct NameReservation<'a> {
    pending: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for NameReservation<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.name);
    }
}

/// Catalog of installed themes backed by a [`ThemeStore`]
pub struct ThemeRegistry {
    store: Arc<dyn ThemeStore>,
    hooks: Arc<HookManager>,
    observers: RegistryObservers,
    /// Names with a registration in flight
    pending: Mutex<HashSet<String>>,
    activation_lock: ActivationLock,
}

impl ThemeRegistry {
    /// Create a registry over a store, running lifecycle hooks from `hooks`
    pub fn new(store: Arc<dyn ThemeStore>, hooks: Arc<HookManager>) -> Self {
        Self {
            store,
            hooks,
            observers: RwLock::new(Vec::new()),
            pending: Mutex::new(HashSet::new()),
            activation_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn hooks(&self) -> &Arc<HookManager> {
        &self.hooks
    }

    pub(crate) fn activation_lock(&self) -> ActivationLock {
        Arc::clone(&self.activation_lock)
    }

    /// Register an observer called after every successful mutation
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    fn notify(&self, event: RegistryEvent) {
        let observers: Vec<_> = self.observers.read().iter().cloned().collect();
        for observer in observers {
            observer(&event);
        }
    }

    /// All themes, oldest first
    pub async fn list(&self) -> Result<Vec<Theme>> {
        let mut themes = self.store.load_all().await?;
        themes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(themes)
    }

    pub async fn get(&self, id: &ThemeId) -> Result<Option<Theme>> {
        Ok(self.store.load_all().await?.into_iter().find(|t| &t.id == id))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Theme>> {
        Ok(self
            .store
            .load_all()
            .await?
            .into_iter()
            .find(|t| t.name == name))
    }

    /// Themes currently flagged active; normally zero or one
    pub async fn active_themes(&self) -> Result<Vec<Theme>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.is_active)
            .collect())
    }

    /// Register a new theme
    ///
    /// "before register" hooks may reshape the input first; the shaped input is
    /// then validated and persisted. The new theme starts inactive.
    ///
    /// # Errors
    ///
    /// - [`ThemeError::Validation`] for a bad name, config or component table
    /// - [`ThemeError::Conflict`] if the name is taken
    /// - [`ThemeError::Persistence`] if the store rejects the write
    pub async fn register(&self, input: ThemeCreateInput) -> Result<Theme> {
        validate_name(&input.name)?;
        let input = self.hooks.run_before_register(input).await;

        if input.version.trim().is_empty() {
            return Err(ThemeError::validation("version", "version cannot be empty"));
        }
        let config = ConfigValidator::validate_config(input.config_schema.as_ref(), &input.config)?;
        ComponentIndex::build(&input.components, &input.aliases)?;

        if !self.pending.lock().insert(input.name.clone()) {
            return Err(ThemeError::Conflict(ConflictReason::DuplicateName(input.name)));
        }
        let _reservation = NameReservation {
            pending: &self.pending,
            name: input.name.clone(),
        };

        if self.get_by_name(&input.name).await?.is_some() {
            return Err(ThemeError::Conflict(ConflictReason::DuplicateName(input.name)));
        }

        let now = Utc::now();
        let theme = Theme {
            id: ThemeId::new(),
            display_name: input.display_name.unwrap_or_else(|| input.name.clone()),
            name: input.name,
            version: input.version,
            author: input.author,
            description: input.description,
            is_system: input.is_system,
            is_active: false,
            config,
            config_schema: input.config_schema,
            components: input.components,
            aliases: input.aliases,
            created_at: now,
            updated_at: now,
        };

        self.store.save(&theme).await?;
        info!(theme = %theme.name, id = %theme.id, "Theme registered");

        self.notify(RegistryEvent::Registered(theme.clone()));
        self.hooks.run_after(Transition::Register, &theme).await;
        Ok(theme)
    }

    /// Update the non-identity fields of a theme
    ///
    /// A patched config (or schema) is re-validated. The activation flag of the
    /// stored record is preserved.
    ///
    /// # Errors
    ///
    /// - [`ThemeError::NotFound`] for an unknown id
    /// - [`ThemeError::Validation`] if the patched theme is invalid
    /// - [`ThemeError::Persistence`] if the store rejects the write
    pub async fn update(&self, id: &ThemeId, patch: ThemePatch) -> Result<Theme> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| ThemeError::theme_not_found(id.as_str()))?;

        let patch = self.hooks.run_before_update(&current, patch).await;
        let revalidate = patch.config.is_some() || patch.config_schema.is_some();
        let reindex = patch.components.is_some() || patch.aliases.is_some();

        let mut next = current.clone();
        patch.apply_to(&mut next);

        if next.version.trim().is_empty() {
            return Err(ThemeError::validation("version", "version cannot be empty"));
        }
        if revalidate {
            next.config = ConfigValidator::validate_config(next.config_schema.as_ref(), &next.config)?;
        }
        if reindex {
            ComponentIndex::build(&next.components, &next.aliases)?;
        }

        {
            // Activation writes happen under this lock; re-read the flag so a
            // concurrent activate is never overwritten.
            let _guard = self.activation_lock.lock().await;
            let stored = self
                .get(id)
                .await?
                .ok_or_else(|| ThemeError::theme_not_found(id.as_str()))?;
            next.is_active = stored.is_active;
            next.updated_at = Utc::now();
            self.store.save(&next).await?;
        }
        info!(theme = %next.name, id = %next.id, "Theme updated");

        self.notify(RegistryEvent::Updated(next.clone()));
        self.hooks.run_after(Transition::Update, &next).await;
        Ok(next)
    }

    /// Delete a theme
    ///
    /// Takes the activation lock so the theme cannot become active while it is
    /// being removed. Theme-scoped hooks of the deleted theme are dropped.
    ///
    /// # Errors
    ///
    /// - [`ThemeError::NotFound`] for an unknown id
    /// - [`ThemeError::Conflict`] for system themes and the active theme
    /// - [`ThemeError::HookVeto`] if a "before delete" hook blocks it
    /// - [`ThemeError::Persistence`] if the store rejects the removal
    pub async fn delete(&self, id: &ThemeId) -> Result<Theme> {
        let theme = {
            let _guard = self.activation_lock.lock().await;
            let theme = self
                .get(id)
                .await?
                .ok_or_else(|| ThemeError::theme_not_found(id.as_str()))?;

            if theme.is_system {
                return Err(ThemeError::Conflict(ConflictReason::SystemTheme(theme.name)));
            }
            if theme.is_active {
                return Err(ThemeError::Conflict(ConflictReason::ActiveTheme(theme.name)));
            }

            self.hooks.run_veto(Transition::Delete, &theme).await?;
            self.store.remove(&theme.id).await?;
            theme
        };
        info!(theme = %theme.name, id = %theme.id, "Theme deleted");

        self.notify(RegistryEvent::Deleted(theme.clone()));
        self.hooks.run_after(Transition::Delete, &theme).await;
        self.hooks.remove_theme_hooks(&theme.name);
        Ok(theme)
    }

    /// Write the activation flag of a theme. Callers must hold the activation
    /// lock.
    pub(crate) async fn set_active(&self, id: &ThemeId, active: bool) -> Result<Theme> {
        let mut theme = self
            .get(id)
            .await?
            .ok_or_else(|| ThemeError::theme_not_found(id.as_str()))?;
        if theme.is_active == active {
            return Ok(theme);
        }

        theme.is_active = active;
        theme.updated_at = Utc::now();
        self.store.save(&theme).await?;
        debug!(theme = %theme.name, active, "Activation flag written");

        self.notify(RegistryEvent::ActivationChanged(theme.clone()));
        Ok(theme)
    }
}

impl std::fmt::Debug for ThemeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeRegistry")
            .field("observers", &self.observers.read().len())
            .field("hooks", &self.hooks)
            .finish()
    }
}
