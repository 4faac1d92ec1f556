//! Engine wiring
//!
//! [`ThemeEngine`] builds the hook manager, store, registry, resolver and
//! coordinator from an [`EngineConfig`] and keeps the resolver cache in step
//! with registry changes.

use std::{path::Path, sync::Arc};

use tracing::{info, warn};

use crate::{
    config::{EngineConfig, StoreConfig},
    coordinator::ActivationCoordinator,
    error::Result,
    hooks::HookManager,
    loader::ManifestLoader,
    registry::{RegistryEvent, ThemeRegistry},
    resolver::{ComponentLoader, ComponentResolver, DescriptorLoader},
    store::{DirectoryThemeStore, InMemoryThemeStore, ThemeStore},
};

/// The assembled theme lifecycle engine
#[derive(Debug)]
pub struct ThemeEngine {
    config: EngineConfig,
    hooks: Arc<HookManager>,
    registry: Arc<ThemeRegistry>,
    resolver: Arc<ComponentResolver>,
    coordinator: Arc<ActivationCoordinator>,
}

impl ThemeEngine {
    /// Assemble an engine over an existing store and component loader
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn ThemeStore>,
        loader: Arc<dyn ComponentLoader>,
    ) -> Self {
        let hooks = Arc::new(HookManager::with_timeout(config.hooks.timeout()));
        let registry = Arc::new(ThemeRegistry::new(store, Arc::clone(&hooks)));
        let resolver = Arc::new(ComponentResolver::new(loader));

        let cache = Arc::clone(&resolver);
        registry.subscribe(move |event| match event {
            RegistryEvent::Updated(theme) | RegistryEvent::Deleted(theme) => {
                cache.invalidate_theme(&theme.id);
            }
            RegistryEvent::Registered(_) | RegistryEvent::ActivationChanged(_) => {}
        });

        let coordinator = Arc::new(ActivationCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&resolver),
            config.fallback.clone(),
        ));

        Self {
            config,
            hooks,
            registry,
            resolver,
            coordinator,
        }
    }

    /// Assemble an engine with the store selected in `config`. Components
    /// resolve to their declared metadata.
    pub async fn from_config(config: EngineConfig) -> Result<Self> {
        let store: Arc<dyn ThemeStore> = match &config.store {
            StoreConfig::Memory => Arc::new(InMemoryThemeStore::new()),
            StoreConfig::Directory { path } => Arc::new(DirectoryThemeStore::open(path).await?),
        };
        info!(store = ?config.store, fallback = %config.fallback.id, "Theme engine configured");
        Ok(Self::new(config, store, Arc::new(DescriptorLoader)))
    }

    /// Register every manifest found in `dir`
    ///
    /// Returns the names of the installed themes. Manifests that fail to
    /// register are logged and skipped.
    pub async fn install_from_directory(&self, dir: &Path) -> Result<Vec<String>> {
        let manifests = ManifestLoader::load_from_directory(dir)?;
        let mut installed = Vec::with_capacity(manifests.len());

        for manifest in manifests {
            let name = manifest.name.clone();
            match self.registry.register(manifest).await {
                Ok(theme) => installed.push(theme.name),
                Err(e) => warn!(theme = %name, error = %e, "Failed to install theme"),
            }
        }

        info!(dir = %dir.display(), count = installed.len(), "Installed themes from directory");
        Ok(installed)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn hooks(&self) -> &Arc<HookManager> {
        &self.hooks
    }

    pub fn registry(&self) -> &Arc<ThemeRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<ComponentResolver> {
        &self.resolver
    }

    pub fn coordinator(&self) -> &Arc<ActivationCoordinator> {
        &self.coordinator
    }
}
