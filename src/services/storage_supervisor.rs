//! Background supervision of the storage backends.
//!
//! Each backend gets its own supervisor task: connect with exponential
//! backoff, install the handle into the shared state, then keep polling its
//! health. A backend that stops answering is given a bounded number of
//! reconnect attempts; when those run out the handle is removed and the
//! supervisor starts over from a fresh connection. While a backend is out
//! the state reports degraded mode and the affected routes answer 503.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{
        blob_store::{BlobError, BlobStore},
        game_store::GameStore,
        storage::StoreError,
    },
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Supervise the game store connection for the lifetime of the process.
pub async fn run_game_store<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StoreError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_game_store(store.clone()).await;
                info!("game store connected");
                delay = INITIAL_DELAY;

                watch_game_store(&state, store).await;

                state.clear_game_store().await;
                warn!("game store lost; reconnecting from scratch");
            }
            Err(err) => {
                warn!(error = %err, "game store connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the installed game store until it is lost for good.
async fn watch_game_store(state: &SharedState, store: Arc<dyn GameStore>) {
    loop {
        if let Err(err) = store.health_check().await {
            warn!(error = %err, "game store health check failed; entering degraded mode");
            state.update_degraded(true);
            if !recover_game_store(state, &store).await {
                return;
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Bounded reconnect attempts against a store that failed its health check.
async fn recover_game_store(state: &SharedState, store: &Arc<dyn GameStore>) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "game store reconnected; leaving degraded mode");
                // Reinstalling recomputes the degraded flag from both slots.
                state.install_game_store(store.clone()).await;
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "game store reconnect attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    warn!("exhausted game store reconnect attempts");
    false
}

/// Supervise the photo store connection for the lifetime of the process.
///
/// The HTTP blob backend has no session to repair, so recovery is simply a
/// fresh connection from the outer loop.
pub async fn run_blob_store<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn BlobStore>, BlobError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_blob_store(store.clone()).await;
                info!("photo store connected");
                delay = INITIAL_DELAY;

                watch_blob_store(&state, store).await;

                state.clear_blob_store().await;
                warn!("photo store lost; reconnecting from scratch");
            }
            Err(err) => {
                warn!(error = %err, "photo store connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the installed photo store until its failures exhaust the budget.
async fn watch_blob_store(state: &SharedState, store: Arc<dyn BlobStore>) {
    let mut failures = 0;

    loop {
        match store.health_check().await {
            Ok(()) => {
                if failures > 0 {
                    info!("photo store healthy again; leaving degraded mode");
                    state.install_blob_store(store.clone()).await;
                }
                failures = 0;
            }
            Err(err) => {
                failures += 1;
                warn!(failures, error = %err, "photo store health check failed");
                if failures == 1 {
                    state.update_degraded(true);
                }
                if failures >= MAX_RECONNECT_ATTEMPTS {
                    return;
                }
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{blob_store::MemoryBlobStore, game_store::memory::MemoryStore},
        oracle::testing::FixedOracle,
        state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn connecting_both_backends_clears_degraded_mode() {
        let state = AppState::new(AppConfig::default(), Arc::new(FixedOracle::matching()));
        let mut watcher = state.degraded_watcher();
        assert!(*watcher.borrow());

        let game = tokio::spawn(run_game_store(state.clone(), || async {
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn GameStore>)
        }));
        let blobs = tokio::spawn(run_blob_store(state.clone(), || async {
            Ok(Arc::new(MemoryBlobStore::new()) as Arc<dyn BlobStore>)
        }));

        watcher.wait_for(|degraded| !degraded).await.unwrap();
        assert!(state.game_store().await.is_some());
        assert!(state.blob_store().await.is_some());

        game.abort();
        blobs.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connections_are_retried_with_backoff() {
        let state = AppState::new(AppConfig::default(), Arc::new(FixedOracle::matching()));
        state
            .install_blob_store(Arc::new(MemoryBlobStore::new()))
            .await;

        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let supervisor = tokio::spawn(run_game_store(state.clone(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::unavailable(
                        "startup failure",
                        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
                    ))
                } else {
                    Ok(Arc::new(MemoryStore::new()) as Arc<dyn GameStore>)
                }
            }
        }));

        let mut watcher = state.degraded_watcher();
        watcher.wait_for(|degraded| !degraded).await.unwrap();
        assert!(attempts.load(Ordering::SeqCst) >= 3);

        supervisor.abort();
    }
}
