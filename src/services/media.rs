//! Photo intake, token-gated serving and expiring URL minting.

use tracing::warn;
use uuid::Uuid;

use crate::{dao::blob_store::StoredBlob, error::ServiceError, state::SharedState};

/// Media types accepted for uploads, with the file extension each maps to.
const ACCEPTED_TYPES: [(&str, &str); 2] = [("image/jpeg", ".jpeg"), ("image/png", ".png")];

/// Checks an upload's media type before any backend is touched.
///
/// Returns the file extension used when minting the blob reference.
pub fn ensure_supported(content_type: &str) -> Result<&'static str, ServiceError> {
    ACCEPTED_TYPES
        .iter()
        .find(|(accepted, _)| *accepted == content_type)
        .map(|(_, extension)| *extension)
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "unsupported media type `{content_type}`, expected image/jpeg or image/png"
            ))
        })
}

/// Stores a fresh photo and returns the reference it was filed under.
///
/// References are `<uuid><extension>`, so they never collide and never leak
/// who the photo belongs to.
pub async fn store_photo(
    state: &SharedState,
    content_type: &str,
    bytes: Vec<u8>,
) -> Result<String, ServiceError> {
    let extension = ensure_supported(content_type)?;
    if bytes.is_empty() {
        return Err(ServiceError::InvalidInput("photo must not be empty".into()));
    }

    let reference = format!("{}{extension}", Uuid::new_v4());
    let blobs = state.require_blob_store().await?;
    blobs
        .store(reference.clone(), content_type.to_string(), bytes)
        .await?;
    Ok(reference)
}

/// Drops a stored photo. Failures are logged and swallowed since the orphaned
/// blob only costs space.
pub async fn discard_photo(state: &SharedState, reference: &str) {
    let Some(blobs) = state.blob_store().await else {
        warn!(reference, "photo store unavailable, leaving stale photo behind");
        return;
    };
    if let Err(err) = blobs.delete(reference.to_string()).await {
        warn!(reference, error = %err, "failed to delete stale photo");
    }
}

/// Mints the expiring URL under which a stored photo can be fetched.
///
/// The URL points back at this service's `/photos` route; the embedded token
/// is scoped to the single reference and carries its own expiry.
pub fn photo_url(state: &SharedState, reference: &str) -> Result<String, ServiceError> {
    let token = state.identity().issue_photo_token(reference)?;
    Ok(format!(
        "{}/photos/{reference}?token={token}",
        state.config().public_base_url
    ))
}

/// Serves a stored photo after checking the access token.
///
/// The token must be valid and minted for exactly this reference.
pub async fn read_photo(
    state: &SharedState,
    reference: &str,
    token: &str,
) -> Result<StoredBlob, ServiceError> {
    let granted = state.identity().verify_photo_token(token)?;
    if granted != reference {
        return Err(ServiceError::Forbidden(
            "token does not grant access to this photo".into(),
        ));
    }

    let blobs = state.require_blob_store().await?;
    let Some(blob) = blobs.read(reference.to_string()).await? else {
        return Err(ServiceError::NotFound(format!(
            "no photo stored under `{reference}`"
        )));
    };
    Ok(blob)
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

    async fn test_state() -> SharedState {
        AppState::for_tests(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(FixedOracle::matching()),
        )
        .await
    }

    #[test]
    fn only_jpeg_and_png_pass_the_whitelist() {
        assert_eq!(ensure_supported("image/jpeg").unwrap(), ".jpeg");
        assert_eq!(ensure_supported("image/png").unwrap(), ".png");
        assert!(ensure_supported("image/gif").is_err());
        assert!(ensure_supported("application/pdf").is_err());
        assert!(ensure_supported("").is_err());
    }

    #[tokio::test]
    async fn stored_photos_round_trip_through_tokenized_urls() {
        let state = test_state().await;

        let reference = store_photo(&state, "image/png", vec![1, 2, 3]).await.unwrap();
        assert!(reference.ends_with(".png"));

        let url = photo_url(&state, &reference).unwrap();
        let prefix = format!(
            "{}/photos/{reference}?token=",
            state.config().public_base_url
        );
        let token = url.strip_prefix(&prefix).expect("url shape");

        let blob = read_photo(&state, &reference, token).await.unwrap();
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(blob.bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn photo_tokens_are_scoped_to_one_reference() {
        let state = test_state().await;

        let first = store_photo(&state, "image/jpeg", vec![1]).await.unwrap();
        let second = store_photo(&state, "image/jpeg", vec![2]).await.unwrap();

        let token = state.identity().issue_photo_token(&first).unwrap();
        let err = read_photo(&state, &second, &token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn garbage_tokens_are_unauthenticated() {
        let state = test_state().await;
        let reference = store_photo(&state, "image/jpeg", vec![1]).await.unwrap();

        let err = read_photo(&state, &reference, "not-a-token").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn empty_uploads_are_rejected() {
        let state = test_state().await;
        let err = store_photo(&state, "image/png", Vec::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
