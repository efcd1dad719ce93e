use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe both storage backends and report per-backend health.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let database = match state.game_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "game store health check failed");
                false
            }
        },
        None => {
            warn!("game store unavailable (degraded mode)");
            false
        }
    };

    let photos = match state.blob_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "photo store health check failed");
                false
            }
        },
        None => {
            warn!("photo store unavailable (degraded mode)");
            false
        }
    };

    HealthResponse::from_probes(database, photos)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{blob_store::MemoryBlobStore, game_store::memory::MemoryStore},
        oracle::testing::FixedOracle,
        state::AppState,
    };

    #[tokio::test]
    async fn health_reflects_each_backend() {
        let state = AppState::for_tests(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(FixedOracle::matching()),
        )
        .await;

        let healthy = health_status(&state).await;
        assert_eq!(healthy.status, "ok");
        assert!(healthy.database);
        assert!(healthy.photos);

        state.clear_blob_store().await;
        let degraded = health_status(&state).await;
        assert_eq!(degraded.status, "degraded");
        assert!(degraded.database);
        assert!(!degraded.photos);
    }
}
