//! Lifecycle hooks
//!
//! A [`HookSet`] is a named bundle of up to ten optional callbacks, one per
//! transition point (`before`/`after` × register, activate, deactivate, delete,
//! update). Hook sets are registered with the [`HookManager`] either globally or
//! for a single theme name.
//!
//! # Examples
//!
//! ```ignore
//! use mosaic_themes::hooks::{HookManager, HookSet};
//!
//! let hooks = HookManager::new();
//! hooks.register_global(
//!     HookSet::new("audit").after_activate(|theme| async move {
//!         tracing::info!(theme = %theme.name, "activated");
//!         Ok(())
//!     }),
//! );
//! hooks.register_for_theme(
//!     "aurora",
//!     HookSet::new("license-check").before_activate(|_theme| async move { Ok(false) }),
//! );
//! ```

pub mod manager;

use std::{fmt, future::Future, sync::Arc};

use futures::future::{BoxFuture, FutureExt};

pub use manager::HookManager;

use crate::types::{Theme, ThemeCreateInput, ThemePatch};

/// A lifecycle transition that hooks can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Register,
    Activate,
    Deactivate,
    Delete,
    Update,
}

impl Transition {
    /// "before" hooks of these transitions can block them
    pub fn is_vetoable(&self) -> bool {
        matches!(self, Self::Activate | Self::Deactivate | Self::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Delete => "delete",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a hook set was registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookScope {
    /// Applies to every theme
    Global,
    /// Applies to one theme
    Theme,
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Theme => f.write_str("theme"),
        }
    }
}

/// "before" callback of a veto-type transition; `Ok(false)` blocks it
pub type VetoHook = Arc<dyn Fn(Theme) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

/// "before register" callback; may return fields replacing the input's
pub type RegisterHook =
    Arc<dyn Fn(ThemeCreateInput) -> BoxFuture<'static, anyhow::Result<Option<ThemePatch>>> + Send + Sync>;

/// "before update" callback; receives the stored theme and the pending patch
pub type UpdateHook =
    Arc<dyn Fn(Theme, ThemePatch) -> BoxFuture<'static, anyhow::Result<Option<ThemePatch>>> + Send + Sync>;

/// "after" callback; errors are logged, never propagated
pub type NotifyHook = Arc<dyn Fn(Theme) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

fn veto_hook<F, Fut>(f: F) -> VetoHook
where
    F: Fn(Theme) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Arc::new(move |theme| f(theme).boxed())
}

fn notify_hook<F, Fut>(f: F) -> NotifyHook
where
    F: Fn(Theme) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |theme| f(theme).boxed())
}

/// A named bundle of optional lifecycle callbacks
#[derive(Clone)]
pub struct HookSet {
    name: String,
    before_register: Option<RegisterHook>,
    after_register: Option<NotifyHook>,
    before_activate: Option<VetoHook>,
    after_activate: Option<NotifyHook>,
    before_deactivate: Option<VetoHook>,
    after_deactivate: Option<NotifyHook>,
    before_delete: Option<VetoHook>,
    after_delete: Option<NotifyHook>,
    before_update: Option<UpdateHook>,
    after_update: Option<NotifyHook>,
}

impl HookSet {
    /// Create an empty hook set
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before_register: None,
            after_register: None,
            before_activate: None,
            after_activate: None,
            before_deactivate: None,
            after_deactivate: None,
            before_delete: None,
            after_delete: None,
            before_update: None,
            after_update: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn before_register<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ThemeCreateInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<ThemePatch>>> + Send + 'static,
    {
        self.before_register = Some(Arc::new(move |input| f(input).boxed()));
        self
    }

    pub fn after_register<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Theme) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.after_register = Some(notify_hook(f));
        self
    }

    pub fn before_activate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Theme) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.before_activate = Some(veto_hook(f));
        self
    }

    pub fn after_activate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Theme) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.after_activate = Some(notify_hook(f));
        self
    }

    pub fn before_deactivate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Theme) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.before_deactivate = Some(veto_hook(f));
        self
    }

    pub fn after_deactivate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Theme) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.after_deactivate = Some(notify_hook(f));
        self
    }

    pub fn before_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Theme) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.before_delete = Some(veto_hook(f));
        self
    }

    pub fn after_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Theme) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.after_delete = Some(notify_hook(f));
        self
    }

    pub fn before_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Theme, ThemePatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<ThemePatch>>> + Send + 'static,
    {
        self.before_update = Some(Arc::new(move |theme, patch| f(theme, patch).boxed()));
        self
    }

    pub fn after_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Theme) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.after_update = Some(notify_hook(f));
        self
    }

    pub(crate) fn register_hook(&self) -> Option<&RegisterHook> {
        self.before_register.as_ref()
    }

    pub(crate) fn update_hook(&self) -> Option<&UpdateHook> {
        self.before_update.as_ref()
    }

    /// The "before" callback of a veto-type transition
    pub(crate) fn veto_hook(&self, transition: Transition) -> Option<&VetoHook> {
        match transition {
            Transition::Activate => self.before_activate.as_ref(),
            Transition::Deactivate => self.before_deactivate.as_ref(),
            Transition::Delete => self.before_delete.as_ref(),
            Transition::Register | Transition::Update => None,
        }
    }

    pub(crate) fn after_hook(&self, transition: Transition) -> Option<&NotifyHook> {
        match transition {
            Transition::Register => self.after_register.as_ref(),
            Transition::Activate => self.after_activate.as_ref(),
            Transition::Deactivate => self.after_deactivate.as_ref(),
            Transition::Delete => self.after_delete.as_ref(),
            Transition::Update => self.after_update.as_ref(),
        }
    }

    /// Number of callbacks set
    pub fn len(&self) -> usize {
        [
            self.before_register.is_some(),
            self.after_register.is_some(),
            self.before_activate.is_some(),
            self.after_activate.is_some(),
            self.before_deactivate.is_some(),
            self.after_deactivate.is_some(),
            self.before_delete.is_some(),
            self.after_delete.is_some(),
            self.before_update.is_some(),
            self.after_update.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("name", &self.name)
            .field("callbacks", &self.len())
            .finish()
    }
}
