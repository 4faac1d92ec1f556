//! Mosaic Theme Lifecycle Engine
//!
//! Installs, configures, activates and deletes themes, and resolves the UI
//! building blocks (layouts, blocks, widgets) of the current theme for the
//! rendering layer.
//!
//! # Architecture
//!
//! 1. **Theme Registry** (`registry`): catalog of installed themes, backed by a
//!    [`ThemeStore`]
//! 2. **Hook Manager** (`hooks`): global and theme-scoped lifecycle callbacks
//! 3. **Activation Coordinator** (`coordinator`): keeps at most one theme
//!    active and falls back to a static theme otherwise
//! 4. **Component Resolver** (`resolver`): lazy, cached component lookup
//! 5. **Config Validator** (`validator`): JSON-schema-like validation of theme
//!    configuration documents
//!
//! [`ThemeEngine`] wires these together from an [`EngineConfig`].
//!
//! # Quick Start
//!
//! ```
//! use mosaic_themes::{
//!     ComponentCategory, ComponentDescriptor, EngineConfig, ThemeCreateInput, ThemeEngine,
//! };
//!
//! # tokio_test::block_on(async {
//! let engine = ThemeEngine::from_config(EngineConfig::default()).await?;
//!
//! engine
//!     .registry()
//!     .register(ThemeCreateInput::new("aurora").with_component(ComponentDescriptor::new(
//!         ComponentCategory::Layout,
//!         "Page",
//!         "layouts/page.html",
//!     )))
//!     .await?;
//! engine.coordinator().activate("aurora").await?;
//!
//! let page = engine
//!     .coordinator()
//!     .resolve_component(ComponentCategory::Layout, "Page")
//!     .await;
//! assert_eq!(page.map(|c| c.entry.clone()).as_deref(), Some("layouts/page.html"));
//! # Ok::<(), mosaic_themes::ThemeError>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod validator;

pub use config::{EngineConfig, HookSettings, StoreConfig};
pub use coordinator::{ActivationCoordinator, ActiveState};
pub use engine::ThemeEngine;
pub use error::{ConflictReason, HookVeto, PersistenceError, Result, ThemeError, VetoReason};
pub use hooks::{HookManager, HookScope, HookSet, Transition};
pub use loader::ManifestLoader;
pub use registry::{RegistryEvent, ThemeRegistry};
pub use resolver::{
    Component, ComponentIndex, ComponentLoader, ComponentResolver, DescriptorLoader,
    FileComponentLoader,
};
pub use store::{DirectoryThemeStore, InMemoryThemeStore, ThemeStore};
pub use types::{
    ComponentAlias, ComponentCategory, ComponentDescriptor, FallbackTheme, ResolvedTheme, Theme,
    ThemeCreateInput, ThemeId, ThemePatch,
};
pub use validator::{ConfigSchema, ConfigValidator};
