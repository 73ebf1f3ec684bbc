//! Maintenance Loops
//!
//! Two recurrent background tasks share the request event loop: the decay
//! sweep (fires on boot and then every configured interval) and the weekly
//! waypoint pruner. Each catches and logs its own errors so a failed sweep
//! never halts subsequent sweeps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::hsg::HsgEngine;
use crate::memory::now_ms;

/// Plugin point invoked after every completed decay sweep. Reflection and
/// summarisation live outside the core; this is their trigger.
pub type ReflectionHook = Arc<dyn Fn(&HsgEngine) + Send + Sync>;

/// Spawn the decay and pruning loops; handles are returned so the server
/// can abort them on shutdown
pub fn spawn_maintenance(engine: Arc<HsgEngine>) -> Vec<tokio::task::JoinHandle<()>> {
    spawn_maintenance_with_hook(engine, None)
}

/// Maintenance loops with an optional reflection hook
pub fn spawn_maintenance_with_hook(
    engine: Arc<HsgEngine>,
    hook: Option<ReflectionHook>,
) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        tokio::spawn(decay_loop(engine.clone(), hook)),
        tokio::spawn(prune_loop(engine)),
    ]
}

/// Decay sweep loop; the first tick runs immediately so decay is honoured
/// on boot
async fn decay_loop(engine: Arc<HsgEngine>, hook: Option<ReflectionHook>) {
    let interval_min = engine.config().decay_interval_min.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_min * 60));

    loop {
        ticker.tick().await;
        let started = Instant::now();
        match engine.decay_sweep() {
            Ok(touched) => {
                tracing::info!(
                    rows_touched = touched,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "decay sweep complete"
                );
                if let Some(hook) = &hook {
                    hook(&engine);
                }
            }
            Err(e) => {
                tracing::warn!("decay sweep failed: {e}");
            }
        }
    }
}

/// Weekly waypoint pruner; skips the boot tick when the last run is recent
async fn prune_loop(engine: Arc<HsgEngine>) {
    let interval_min = engine.config().prune_interval_min.max(1);
    let interval_ms = interval_min as i64 * 60 * 1000;
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_min * 60));

    loop {
        ticker.tick().await;

        let due = match engine.store().last_maintenance_run("prune") {
            Ok(Some(last)) => now_ms() - last >= interval_ms,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!("could not read prune history: {e}; running anyway");
                true
            }
        };
        if !due {
            continue;
        }

        let started = Instant::now();
        match engine.prune_waypoints() {
            Ok(summary) => {
                tracing::info!(
                    weak_removed = summary.weak_removed,
                    orphans_removed = summary.orphans_removed,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "waypoint prune complete"
                );
            }
            Err(e) => {
                tracing::warn!("waypoint prune failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embed::HashEmbedder;
    use crate::memory::{MemoryInput, Sector};
    use crate::storage::MemoryStore;

    fn engine() -> Arc<HsgEngine> {
        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        Arc::new(HsgEngine::new(
            store,
            Box::new(HashEmbedder::new(64)),
            Config::default(),
        ))
    }

    #[tokio::test]
    async fn test_reflection_hook_fires_after_sweep() {
        let engine = engine();
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = fired.clone();
        let hook: ReflectionHook = Arc::new(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let handles = spawn_maintenance_with_hook(engine, Some(hook));
        tokio::time::sleep(Duration::from_millis(50)).await;
        for handle in &handles {
            handle.abort();
        }
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_boot_tick_runs_decay_immediately() {
        let engine = engine();
        engine
            .remember(MemoryInput {
                content: "decays on boot".into(),
                tags: vec![],
                meta: serde_json::json!({}),
                user_id: "tester".into(),
                sector: Sector::Emotional,
                salience: 0.5,
            })
            .unwrap();

        let handles = spawn_maintenance(engine.clone());
        // The first interval tick completes immediately
        tokio::time::sleep(Duration::from_millis(50)).await;
        for handle in &handles {
            handle.abort();
        }

        let m = &engine.store().memories_for_user("tester").unwrap()[0];
        assert!(m.salience < 0.5);
        assert!(engine.store().last_maintenance_run("decay").unwrap().is_some());
        assert!(engine.store().last_maintenance_run("prune").unwrap().is_some());
    }
}
