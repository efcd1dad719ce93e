pub mod phase;
pub mod ring;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    auth::IdentityProvider,
    config::AppConfig,
    dao::{blob_store::BlobStore, game_store::GameStore},
    error::ServiceError,
    oracle::FaceOracle,
};

pub type SharedState = Arc<AppState>;

/// Central application state holding configuration and backend handles.
///
/// Both storage backends are installed by their supervisors after startup and
/// may disappear at runtime. The degraded flag mirrors whether the full set
/// is currently available.
pub struct AppState {
    config: AppConfig,
    identity: IdentityProvider,
    oracle: Arc<dyn FaceOracle>,
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    blob_store: RwLock<Option<Arc<dyn BlobStore>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply.
    ///
    /// The application starts in degraded mode until the storage backends are
    /// installed.
    pub fn new(config: AppConfig, oracle: Arc<dyn FaceOracle>) -> SharedState {
        let identity = IdentityProvider::new(
            &config.token_secret,
            config.credential_ttl,
            config.photo_url_ttl,
        );
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            identity,
            oracle,
            game_store: RwLock::new(None),
            blob_store: RwLock::new(None),
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Token minting and verification handle.
    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    /// Face verification oracle handle.
    pub fn oracle(&self) -> Arc<dyn FaceOracle> {
        self.oracle.clone()
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        self.game_store.read().await.as_ref().cloned()
    }

    /// Obtain the game store or fail with the degraded-mode error.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a game store implementation and recompute the degraded flag.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.refresh_degraded().await;
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.refresh_degraded().await;
    }

    /// Obtain a handle to the current blob store, if one is installed.
    pub async fn blob_store(&self) -> Option<Arc<dyn BlobStore>> {
        self.blob_store.read().await.as_ref().cloned()
    }

    /// Obtain the blob store or fail with the degraded-mode error.
    pub async fn require_blob_store(&self) -> Result<Arc<dyn BlobStore>, ServiceError> {
        self.blob_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a blob store implementation and recompute the degraded flag.
    pub async fn install_blob_store(&self, store: Arc<dyn BlobStore>) {
        {
            let mut guard = self.blob_store.write().await;
            *guard = Some(store);
        }
        self.refresh_degraded().await;
    }

    /// Remove the current blob store and enter degraded mode.
    pub async fn clear_blob_store(&self) {
        {
            let mut guard = self.blob_store.write().await;
            guard.take();
        }
        self.refresh_degraded().await;
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Force the degraded flag, used by supervisors while a backend handle is
    /// still installed but failing its health checks.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_replace(value);
    }

    async fn refresh_degraded(&self) {
        let missing =
            self.game_store.read().await.is_none() || self.blob_store.read().await.is_none();
        self.degraded.send_replace(missing);
    }
}

#[cfg(test)]
impl AppState {
    /// State with explicit backends already installed, for service tests.
    pub(crate) async fn for_tests(
        config: AppConfig,
        store: Arc<dyn GameStore>,
        blob: Arc<dyn BlobStore>,
        oracle: Arc<dyn FaceOracle>,
    ) -> SharedState {
        let state = AppState::new(config, oracle);
        state.install_game_store(store).await;
        state.install_blob_store(blob).await;
        state
    }
}
