//! Property-based tests for lifecycle hook ordering
//!
//! Global hook sets run before theme-scoped ones, in registration order.
//! Replacement patches merge in that order, later hooks winning on conflicts.
//! Vetoes stop the chain and leave persistent state untouched.

use std::sync::{Arc, Mutex};

use mosaic_themes::{
    EngineConfig, HookScope, HookSet, ThemeCreateInput, ThemeEngine, ThemeError, ThemePatch,
    Transition, VetoReason,
};
use proptest::prelude::*;
use serde_json::json;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("Failed to build runtime")
}

async fn engine() -> ThemeEngine {
    ThemeEngine::from_config(EngineConfig::default())
        .await
        .expect("Failed to build engine")
}

/// Property 1: Global hooks run in registration order, then the theme hook
proptest! {
    #[test]
    fn prop_hooks_run_in_registration_order(global_count in 1usize..6) {
        runtime().block_on(async {
            let engine = engine().await;
            let calls = Arc::new(Mutex::new(Vec::new()));

            for i in 0..global_count {
                let calls = Arc::clone(&calls);
                engine.hooks().register_global(HookSet::new(format!("global-{}", i)).after_activate(
                    move |_| {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.lock().expect("poisoned").push(format!("global-{}", i));
                            Ok(())
                        }
                    },
                ));
            }
            let theme_calls = Arc::clone(&calls);
            engine.hooks().register_for_theme(
                "aurora",
                HookSet::new("own").after_activate(move |_| {
                    let calls = Arc::clone(&theme_calls);
                    async move {
                        calls.lock().expect("poisoned").push("own".to_string());
                        Ok(())
                    }
                }),
            );

            engine.registry().register(ThemeCreateInput::new("aurora")).await.expect("Failed to register");
            engine.coordinator().activate("aurora").await.expect("Failed to activate");

            let mut expected: Vec<String> = (0..global_count).map(|i| format!("global-{}", i)).collect();
            expected.push("own".to_string());
            assert_eq!(*calls.lock().expect("poisoned"), expected);
        });
    }
}

/// Property 2: Later update replacements win key conflicts
proptest! {
    #[test]
    fn prop_update_replacements_merge_in_order(first in 0i64..100, second in 0i64..100) {
        runtime().block_on(async {
            let engine = engine().await;
            engine.hooks().register_global(HookSet::new("first").before_update(move |_, _| async move {
                Ok(Some(ThemePatch::config(json!({ "a": first }))))
            }));
            engine.hooks().register_for_theme(
                "aurora",
                HookSet::new("second").before_update(move |_, _| async move {
                    Ok(Some(ThemePatch::config(json!({ "a": second, "b": 3 }))))
                }),
            );

            let theme = engine.registry().register(ThemeCreateInput::new("aurora")).await.expect("Failed to register");
            let updated = engine
                .registry()
                .update(&theme.id, ThemePatch::config(json!({ "a": -1 })))
                .await
                .expect("Failed to update");

            assert_eq!(updated.config, json!({ "a": second, "b": 3 }));
        });
    }
}

#[tokio::test]
async fn veto_stops_the_chain_and_names_the_hook() {
    let engine = engine().await;
    let later_called = Arc::new(Mutex::new(false));

    engine
        .hooks()
        .register_global(HookSet::new("maintenance").before_activate(|_| async { Ok(false) }));
    let flag = Arc::clone(&later_called);
    engine.hooks().register_for_theme(
        "aurora",
        HookSet::new("own").before_activate(move |_| {
            let flag = Arc::clone(&flag);
            async move {
                *flag.lock().expect("poisoned") = true;
                Ok(true)
            }
        }),
    );

    engine
        .registry()
        .register(ThemeCreateInput::new("aurora"))
        .await
        .expect("Failed to register");
    let err = engine
        .coordinator()
        .activate("aurora")
        .await
        .expect_err("Activation should be vetoed");

    let veto = match err {
        ThemeError::HookVeto(veto) => veto,
        other => panic!("expected a hook veto, got {other:?}"),
    };
    assert_eq!(veto.hook, "maintenance");
    assert_eq!(veto.scope, HookScope::Global);
    assert_eq!(veto.transition, Transition::Activate);
    assert_eq!(veto.reason, VetoReason::Rejected);
    assert!(!*later_called.lock().expect("poisoned"));
    assert!(engine.coordinator().get_active_or_fallback().await.is_fallback());
}

#[tokio::test]
async fn failing_veto_hook_blocks_delete() {
    let engine = engine().await;
    let theme = engine
        .registry()
        .register(ThemeCreateInput::new("aurora"))
        .await
        .expect("Failed to register");
    engine.hooks().register_for_theme(
        "aurora",
        HookSet::new("guard").before_delete(|_| async { Err(anyhow::anyhow!("still referenced")) }),
    );

    let err = engine
        .registry()
        .delete(&theme.id)
        .await
        .expect_err("Delete should be vetoed");
    assert!(matches!(
        err,
        ThemeError::HookVeto(ref veto) if matches!(veto.reason, VetoReason::Failed(_))
    ));
    assert!(engine
        .registry()
        .get(&theme.id)
        .await
        .expect("Failed to read")
        .is_some());
}

#[tokio::test]
async fn failing_after_hook_does_not_undo_the_transition() {
    let engine = engine().await;
    engine.hooks().register_global(
        HookSet::new("flaky").after_activate(|_| async { Err(anyhow::anyhow!("notification failed")) }),
    );
    engine
        .registry()
        .register(ThemeCreateInput::new("aurora"))
        .await
        .expect("Failed to register");

    let theme = engine
        .coordinator()
        .activate("aurora")
        .await
        .expect("Activation should succeed");
    assert!(theme.is_active);
}

#[tokio::test]
async fn register_hooks_run_global_first_and_merge_config() {
    let engine = engine().await;
    let calls = Arc::new(Mutex::new(Vec::new()));

    let global_calls = Arc::clone(&calls);
    engine
        .hooks()
        .register_global(HookSet::new("g").before_register(move |_| {
            let calls = Arc::clone(&global_calls);
            async move {
                calls.lock().expect("poisoned").push("g");
                Ok(Some(ThemePatch::config(json!({ "a": 1 }))))
            }
        }));
    let theme_calls = Arc::clone(&calls);
    engine.hooks().register_for_theme(
        "x",
        HookSet::new("h").before_register(move |input| {
            let calls = Arc::clone(&theme_calls);
            async move {
                assert_eq!(input.config, json!({ "a": 1 }));
                calls.lock().expect("poisoned").push("h");
                Ok(Some(ThemePatch::config(json!({ "a": 2, "b": 3 }))))
            }
        }),
    );

    let theme = engine
        .registry()
        .register(ThemeCreateInput::new("x"))
        .await
        .expect("Failed to register");

    assert_eq!(*calls.lock().expect("poisoned"), vec!["g", "h"]);
    assert_eq!(theme.config, json!({ "a": 2, "b": 3 }));
}
