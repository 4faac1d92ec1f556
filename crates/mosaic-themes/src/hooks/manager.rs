//! Ordered, cancelable hook execution
//!
//! For a transition on theme `X` the manager runs every global hook set in
//! registration order, then the hook set registered for `X`. Hooks run one at a
//! time and each is awaited before the next starts.

use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{HookScope, HookSet, Transition};
use crate::{
    error::{HookVeto, Result, ThemeError, VetoReason},
    types::{Theme, ThemeCreateInput, ThemePatch},
};

/// Holds global and theme-scoped hook sets and runs them around transitions
#[derive(Debug, Default)]
pub struct HookManager {
    /// Global hook sets in registration order
    global: RwLock<Vec<Arc<HookSet>>>,
    /// At most one hook set per theme name
    themed: RwLock<HashMap<String, Arc<HookSet>>>,
    /// Upper bound for a single hook call; unbounded when `None`
    timeout: Option<Duration>,
}

impl HookManager {
    /// Create a manager without a hook timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that bounds each hook call
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Append a global hook set; it runs after all previously registered ones
    pub fn register_global(&self, hooks: HookSet) {
        debug!(hook = %hooks.name(), callbacks = hooks.len(), "Registering global hooks");
        self.global.write().push(Arc::new(hooks));
    }

    /// Remove every global hook set with this name
    pub fn unregister_global(&self, name: &str) -> bool {
        let mut global = self.global.write();
        let before = global.len();
        global.retain(|hooks| hooks.name() != name);
        before != global.len()
    }

    /// Register the hook set for one theme, returning the one it replaces
    pub fn register_for_theme(&self, theme: &str, hooks: HookSet) -> Option<Arc<HookSet>> {
        debug!(theme = %theme, hook = %hooks.name(), "Registering theme hooks");
        let replaced = self.themed.write().insert(theme.to_string(), Arc::new(hooks));
        if let Some(previous) = &replaced {
            debug!(theme = %theme, hook = %previous.name(), "Replaced theme hooks");
        }
        replaced
    }

    /// Drop the hook set of a theme
    pub fn remove_theme_hooks(&self, theme: &str) -> Option<Arc<HookSet>> {
        self.themed.write().remove(theme)
    }

    pub fn has_theme_hooks(&self, theme: &str) -> bool {
        self.themed.read().contains_key(theme)
    }

    /// Names of the global hook sets in execution order
    pub fn global_hook_names(&self) -> Vec<String> {
        self.global
            .read()
            .iter()
            .map(|hooks| hooks.name().to_string())
            .collect()
    }

    /// Snapshot of the hook sets that apply to a theme, in execution order.
    /// Locks are released before any hook runs.
    fn chain(&self, theme: &str) -> Vec<(HookScope, Arc<HookSet>)> {
        let mut chain: Vec<_> = self
            .global
            .read()
            .iter()
            .map(|hooks| (HookScope::Global, Arc::clone(hooks)))
            .collect();
        if let Some(hooks) = self.themed.read().get(theme) {
            chain.push((HookScope::Theme, Arc::clone(hooks)));
        }
        chain
    }

    /// Await one hook call, applying the timeout and turning panics into failures
    async fn call<T>(&self, fut: BoxFuture<'static, anyhow::Result<T>>) -> std::result::Result<T, VetoReason> {
        let guarded = AssertUnwindSafe(fut).catch_unwind();
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(VetoReason::TimedOut {
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(VetoReason::Failed(format!("{:#}", e))),
            Err(_) => Err(VetoReason::Failed("hook panicked".to_string())),
        }
    }

    /// Run "before register" hooks. Each returned patch is merged into the
    /// input before the next hook sees it. Failing hooks contribute nothing.
    pub async fn run_before_register(&self, mut input: ThemeCreateInput) -> ThemeCreateInput {
        for (scope, hooks) in self.chain(&input.name) {
            let Some(hook) = hooks.register_hook() else {
                continue;
            };
            match self.call(hook(input.clone())).await {
                Ok(Some(patch)) => {
                    debug!(theme = %input.name, hook = %hooks.name(), %scope, "Hook reshaped register input");
                    input.apply(patch);
                }
                Ok(None) => {}
                Err(reason) => {
                    warn!(
                        theme = %input.name,
                        hook = %hooks.name(),
                        %scope,
                        reason = %reason,
                        "before-register hook failed, ignoring its replacement"
                    );
                }
            }
        }
        input
    }

    /// Run "before update" hooks, merging replacements into the patch
    pub async fn run_before_update(&self, theme: &Theme, mut patch: ThemePatch) -> ThemePatch {
        for (scope, hooks) in self.chain(&theme.name) {
            let Some(hook) = hooks.update_hook() else {
                continue;
            };
            match self.call(hook(theme.clone(), patch.clone())).await {
                Ok(Some(replacement)) => {
                    debug!(theme = %theme.name, hook = %hooks.name(), %scope, "Hook reshaped update patch");
                    patch = patch.merge(replacement);
                }
                Ok(None) => {}
                Err(reason) => {
                    warn!(
                        theme = %theme.name,
                        hook = %hooks.name(),
                        %scope,
                        reason = %reason,
                        "before-update hook failed, ignoring its replacement"
                    );
                }
            }
        }
        patch
    }

    /// Run the "before" hooks of a veto-type transition
    ///
    /// Stops at the first hook that returns `false`, fails or times out.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::HookVeto`] naming the vetoing hook.
    pub async fn run_veto(&self, transition: Transition, theme: &Theme) -> Result<()> {
        debug_assert!(transition.is_vetoable());
        for (scope, hooks) in self.chain(&theme.name) {
            let Some(hook) = hooks.veto_hook(transition) else {
                continue;
            };
            let reason = match self.call(hook(theme.clone())).await {
                Ok(true) => continue,
                Ok(false) => VetoReason::Rejected,
                Err(reason) => reason,
            };

            let veto = HookVeto {
                transition,
                theme: theme.name.clone(),
                hook: hooks.name().to_string(),
                scope,
                reason,
            };
            info!(
                theme = %theme.name,
                hook = %veto.hook,
                %scope,
                %transition,
                reason = %veto.reason,
                "Transition vetoed by hook"
            );
            return Err(ThemeError::HookVeto(veto));
        }
        Ok(())
    }

    /// Run the "after" hooks of a transition. Failures are logged and do not
    /// affect the committed mutation.
    pub async fn run_after(&self, transition: Transition, theme: &Theme) {
        for (scope, hooks) in self.chain(&theme.name) {
            let Some(hook) = hooks.after_hook(transition) else {
                continue;
            };
            if let Err(reason) = self.call(hook(theme.clone())).await {
                warn!(
                    theme = %theme.name,
                    hook = %hooks.name(),
                    %scope,
                    %transition,
                    reason = %reason,
                    "after hook failed"
                );
            }
        }
    }
}
