//! Theme activation
//!
//! The coordinator owns the single-active-theme invariant. Activation runs in
//! two phases under one lock:
//!
//! ```text
//! activate(name)
//!   ├─ resolve target            NotFound
//!   ├─ before-activate hooks     HookVeto, nothing written
//!   ├─ before-deactivate hooks   HookVeto, nothing written
//!   ├─ Phase A: deactivate every other active theme (+ after-deactivate hooks)
//!   ├─ Phase B: activate target  ActivationIncomplete, no active theme
//!   └─ after-activate hooks, listeners
//! ```
//!
//! The store has no transactions, so a failed Phase B leaves no theme active.
//! The prior theme is not re-activated; callers retry `activate` and the
//! rendering layer falls back in the meantime. If more than one active theme is
//! ever observed, [`ActivationCoordinator::get_active_or_fallback`] keeps the
//! most recently updated one and deactivates the rest.
//!
//! Hooks run while the activation lock is held and must not call back into the
//! coordinator.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::{
    error::{ConflictReason, Result, ThemeError},
    hooks::{HookManager, Transition},
    registry::{ActivationLock, ThemeRegistry},
    resolver::{Component, ComponentResolver},
    types::{ComponentCategory, FallbackTheme, ResolvedTheme, Theme, ThemeId},
};

/// Global activation state as observed in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveState {
    NoneActive,
    OneActive(ThemeId),
    /// Invalid; repaired on the next [`ActivationCoordinator::get_active_or_fallback`]
    ManyActive(Vec<ThemeId>),
}

/// Type alias for active theme listeners
type ActiveThemeListeners = RwLock<Vec<Arc<dyn Fn(Option<&ResolvedTheme>) + Send + Sync>>>;

/// State machine enforcing that at most one theme is active
pub struct ActivationCoordinator {
    registry: Arc<ThemeRegistry>,
    hooks: Arc<HookManager>,
    resolver: Arc<ComponentResolver>,
    fallback: FallbackTheme,
    lock: ActivationLock,
    listeners: ActiveThemeListeners,
    /// Id of the theme most recently announced to listeners
    announced: Mutex<Option<ThemeId>>,
}

impl ActivationCoordinator {
    pub fn new(
        registry: Arc<ThemeRegistry>,
        resolver: Arc<ComponentResolver>,
        fallback: FallbackTheme,
    ) -> Self {
        Self {
            hooks: Arc::clone(registry.hooks()),
            lock: registry.activation_lock(),
            registry,
            resolver,
            fallback,
            listeners: RwLock::new(Vec::new()),
            announced: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<ThemeRegistry> {
        &self.registry
    }

    pub fn fallback(&self) -> &FallbackTheme {
        &self.fallback
    }

    /// Register a listener for changes of the resolved theme
    ///
    /// `None` means no registered theme is active any more; the rendering layer
    /// should resolve again and will receive the fallback theme.
    pub fn on_active_theme_changed<F>(&self, listener: F)
    where
        F: Fn(Option<&ResolvedTheme>) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    fn announce(&self, resolved: Option<&ResolvedTheme>) {
        *self.announced.lock() = resolved.map(|r| r.id().clone());
        let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
        for listener in listeners {
            listener(resolved);
        }
    }

    fn announce_if_changed(&self, resolved: &ResolvedTheme) {
        let changed = self.announced.lock().as_ref() != Some(resolved.id());
        if changed {
            self.announce(Some(resolved));
        }
    }

    /// Make the named theme the only active theme
    ///
    /// Activating the already active theme runs the hooks again but leaves the
    /// stored state unchanged.
    ///
    /// # Errors
    ///
    /// - [`ThemeError::NotFound`] if no theme has this name
    /// - [`ThemeError::HookVeto`] if a before-activate or before-deactivate hook
    ///   blocks the transition; nothing is written
    /// - [`ThemeError::Persistence`] if Phase A fails, or Phase B fails with
    ///   nothing deactivated
    /// - [`ThemeError::ActivationIncomplete`] if Phase B fails after another
    ///   theme was deactivated
    pub async fn activate(&self, name: &str) -> Result<Theme> {
        let _guard = self.lock.lock().await;

        let target = self
            .registry
            .get_by_name(name)
            .await?
            .ok_or_else(|| ThemeError::NotFound {
                kind: "Theme",
                name: name.to_string(),
            })?;

        self.hooks.run_veto(Transition::Activate, &target).await?;

        let others: Vec<Theme> = self
            .registry
            .active_themes()
            .await?
            .into_iter()
            .filter(|t| t.id != target.id)
            .collect();
        for theme in &others {
            self.hooks.run_veto(Transition::Deactivate, theme).await?;
        }

        // Phase A
        let mut deactivated = 0usize;
        for theme in &others {
            match self.registry.set_active(&theme.id, false).await {
                Ok(theme) => {
                    deactivated += 1;
                    self.hooks.run_after(Transition::Deactivate, &theme).await;
                }
                Err(e) => {
                    warn!(theme = %theme.name, error = %e, "Deactivation failed, activation aborted");
                    if deactivated > 0 && !target.is_active {
                        self.announce(None);
                    }
                    return Err(e);
                }
            }
        }

        // Phase B
        let activated = match self.registry.set_active(&target.id, true).await {
            Ok(theme) => theme,
            Err(ThemeError::Persistence(source)) if deactivated > 0 => {
                error!(
                    theme = %target.name,
                    error = %source,
                    deactivated,
                    "Activation failed after deactivating the previous theme; no theme is active"
                );
                self.announce(None);
                return Err(ThemeError::ActivationIncomplete {
                    theme: target.name,
                    source,
                });
            }
            Err(e) => return Err(e),
        };

        self.hooks.run_after(Transition::Activate, &activated).await;
        info!(theme = %activated.name, id = %activated.id, "Theme activated");
        self.announce(Some(&ResolvedTheme::Active(activated.clone())));
        Ok(activated)
    }

    /// Deactivate every active theme, leaving the fallback in effect
    ///
    /// All before-deactivate hooks run before anything is written.
    pub async fn deactivate_all(&self) -> Result<Vec<Theme>> {
        let _guard = self.lock.lock().await;

        let active = self.registry.active_themes().await?;
        for theme in &active {
            self.hooks.run_veto(Transition::Deactivate, theme).await?;
        }

        let mut deactivated = Vec::with_capacity(active.len());
        for theme in active {
            match self.registry.set_active(&theme.id, false).await {
                Ok(theme) => {
                    self.hooks.run_after(Transition::Deactivate, &theme).await;
                    deactivated.push(theme);
                }
                Err(e) => {
                    warn!(
                        theme = %theme.name,
                        error = %e,
                        deactivated = deactivated.len(),
                        "Deactivation failed"
                    );
                    if !deactivated.is_empty() {
                        self.announce(None);
                    }
                    return Err(e);
                }
            }
        }

        if !deactivated.is_empty() {
            info!(count = deactivated.len(), "All themes deactivated");
            self.announce(None);
        }
        Ok(deactivated)
    }

    /// Resolve the theme the rendering layer should use
    ///
    /// Never fails: an empty or unreachable registry yields the fallback theme.
    /// Observing several active themes triggers a repair under the activation
    /// lock.
    pub async fn get_active_or_fallback(&self) -> ResolvedTheme {
        let mut active = match self.registry.active_themes().await {
            Ok(active) => active,
            Err(e) => {
                warn!(error = %e, "Theme store unavailable, using fallback theme");
                return self.use_fallback();
            }
        };

        let resolved = match active.len() {
            0 => {
                debug!(fallback = %self.fallback.name, "No active theme, using fallback");
                ResolvedTheme::Fallback(self.fallback.clone())
            }
            1 => ResolvedTheme::Active(active.remove(0)),
            _ => self.repair().await,
        };
        self.announce_if_changed(&resolved);
        resolved
    }

    fn use_fallback(&self) -> ResolvedTheme {
        let resolved = ResolvedTheme::Fallback(self.fallback.clone());
        self.announce_if_changed(&resolved);
        resolved
    }

    /// Keep the most recently updated active theme and deactivate the others.
    /// Before-deactivate hooks are not consulted; the invariant takes priority.
    async fn repair(&self) -> ResolvedTheme {
        let _guard = self.lock.lock().await;

        let mut active = match self.registry.active_themes().await {
            Ok(active) => active,
            Err(e) => {
                warn!(error = %e, "Theme store unavailable during repair, using fallback theme");
                return ResolvedTheme::Fallback(self.fallback.clone());
            }
        };
        if active.len() <= 1 {
            return match active.pop() {
                Some(theme) => ResolvedTheme::Active(theme),
                None => ResolvedTheme::Fallback(self.fallback.clone()),
            };
        }

        active.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let conflict = ThemeError::Conflict(ConflictReason::MultipleActive(
            active.iter().map(|t| t.name.clone()).collect(),
        ));
        let chosen = active.remove(0);
        error!(error = %conflict, kept = %chosen.name, "Repairing activation state");

        for theme in active {
            match self.registry.set_active(&theme.id, false).await {
                Ok(theme) => self.hooks.run_after(Transition::Deactivate, &theme).await,
                Err(e) => warn!(theme = %theme.name, error = %e, "Failed to deactivate during repair"),
            }
        }

        ResolvedTheme::Active(chosen)
    }

    /// Current activation state, without repairing it
    pub async fn active_state(&self) -> Result<ActiveState> {
        let active = self.registry.active_themes().await?;
        Ok(match active.as_slice() {
            [] => ActiveState::NoneActive,
            [theme] => ActiveState::OneActive(theme.id.clone()),
            many => ActiveState::ManyActive(many.iter().map(|t| t.id.clone()).collect()),
        })
    }

    /// Resolve a component of the current theme for the rendering layer.
    /// Unknown components resolve to `None`.
    pub async fn resolve_component(
        &self,
        category: ComponentCategory,
        name: &str,
    ) -> Option<Arc<Component>> {
        let theme = self.get_active_or_fallback().await.to_theme();
        match self.resolver.resolve(&theme, category, name).await {
            Ok(component) => Some(component),
            Err(e) => {
                debug!(theme = %theme.name, %category, component = %name, error = %e, "Component not resolved");
                None
            }
        }
    }

    /// Delete a theme through the registry, under the activation lock
    pub async fn delete(&self, id: &ThemeId) -> Result<Theme> {
        let theme = self.registry.delete(id).await?;
        self.resolver.invalidate_theme(&theme.id);
        Ok(theme)
    }
}

impl std::fmt::Debug for ActivationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationCoordinator")
            .field("fallback", &self.fallback.name)
            .field("announced", &*self.announced.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hooks::HookSet,
        resolver::DescriptorLoader,
        store::InMemoryThemeStore,
        types::{ComponentDescriptor, ThemeCreateInput},
    };

    fn coordinator() -> (ActivationCoordinator, Arc<InMemoryThemeStore>) {
        let store = Arc::new(InMemoryThemeStore::new());
        let registry = Arc::new(ThemeRegistry::new(store.clone(), Arc::new(HookManager::new())));
        let resolver = Arc::new(ComponentResolver::new(Arc::new(DescriptorLoader)));
        let fallback = FallbackTheme::new("fallback", "themes/fallback")
            .with_component(ComponentDescriptor::new(ComponentCategory::Layout, "Page", "page.html"));
        (ActivationCoordinator::new(registry, resolver, fallback), store)
    }

    async fn active_names(coordinator: &ActivationCoordinator) -> Vec<String> {
        coordinator
            .registry()
            .active_themes()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect()
    }

    #[tokio::test]
    async fn test_activate_switches_active_theme() {
        let (coordinator, _) = coordinator();
        coordinator.registry().register(ThemeCreateInput::new("a")).await.unwrap();
        coordinator.registry().register(ThemeCreateInput::new("b")).await.unwrap();

        coordinator.activate("a").await.unwrap();
        assert_eq!(active_names(&coordinator).await, vec!["a"]);

        coordinator.activate("b").await.unwrap();
        assert_eq!(active_names(&coordinator).await, vec!["b"]);
    }

    #[tokio::test]
    async fn test_activate_unknown_theme() {
        let (coordinator, _) = coordinator();
        let err = coordinator.activate("missing").await.unwrap_err();
        assert!(matches!(err, ThemeError::NotFound { kind: "Theme", .. }));
    }

    #[tokio::test]
    async fn test_deactivate_veto_blocks_switch() {
        let (coordinator, _) = coordinator();
        coordinator.registry().register(ThemeCreateInput::new("a")).await.unwrap();
        coordinator.registry().register(ThemeCreateInput::new("b")).await.unwrap();
        coordinator.activate("a").await.unwrap();
        coordinator
            .registry()
            .hooks()
            .register_for_theme("a", HookSet::new("pin").before_deactivate(|_| async { Ok(false) }));

        let err = coordinator.activate("b").await.unwrap_err();
        assert!(matches!(err, ThemeError::HookVeto(_)));
        assert_eq!(active_names(&coordinator).await, vec!["a"]);
    }

    #[tokio::test]
    async fn test_deactivate_all() {
        let (coordinator, _) = coordinator();
        coordinator.registry().register(ThemeCreateInput::new("a")).await.unwrap();
        coordinator.activate("a").await.unwrap();

        let deactivated = coordinator.deactivate_all().await.unwrap();
        assert_eq!(deactivated.len(), 1);
        assert_eq!(coordinator.active_state().await.unwrap(), ActiveState::NoneActive);
        assert!(coordinator.get_active_or_fallback().await.is_fallback());
    }

    #[tokio::test]
    async fn test_fallback_when_empty() {
        let (coordinator, _) = coordinator();
        let resolved = coordinator.get_active_or_fallback().await;
        assert_eq!(resolved, ResolvedTheme::Fallback(coordinator.fallback().clone()));
    }

    #[tokio::test]
    async fn test_resolve_component_from_fallback() {
        let (coordinator, _) = coordinator();
        let page = coordinator
            .resolve_component(ComponentCategory::Layout, "Page")
            .await
            .unwrap();
        assert_eq!(page.entry, "page.html");
        assert!(coordinator
            .resolve_component(ComponentCategory::Block, "Header")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_listeners_receive_changes() {
        let (coordinator, _) = coordinator();
        coordinator.registry().register(ThemeCreateInput::new("a")).await.unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        coordinator.on_active_theme_changed(move |resolved| {
            sink.lock().push(resolved.map(|r| r.name().to_string()));
        });

        coordinator.get_active_or_fallback().await;
        coordinator.get_active_or_fallback().await;
        coordinator.activate("a").await.unwrap();
        coordinator.get_active_or_fallback().await;
        coordinator.deactivate_all().await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![Some("fallback".to_string()), Some("a".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_delete_through_coordinator() {
        let (coordinator, store) = coordinator();
        let theme = coordinator.registry().register(ThemeCreateInput::new("a")).await.unwrap();
        coordinator.activate("a").await.unwrap();
        assert!(coordinator.delete(&theme.id).await.is_err());

        coordinator.deactivate_all().await.unwrap();
        coordinator.delete(&theme.id).await.unwrap();
        assert_eq!(store.count(), 0);
    }
}
