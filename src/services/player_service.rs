//! Registration and player directory operations.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::models::UserRecord,
    dto::{
        users::{CredentialResponse, UserListResponse, UserView},
        validation::validate_username,
    },
    error::ServiceError,
    services::media,
    state::SharedState,
};

/// Register a new player with their reference portrait.
///
/// The portrait lands in the photo store first so a user row never exists
/// without one; the blob is discarded again when the insert loses a username
/// race.
pub async fn register(
    state: &SharedState,
    username: String,
    content_type: &str,
    photo: Vec<u8>,
) -> Result<CredentialResponse, ServiceError> {
    let username = username.trim().to_string();
    validate_username(&username).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let reference = media::store_photo(state, content_type, photo).await?;

    let user = UserRecord {
        id: Uuid::new_v4(),
        username,
        photo: Some(reference.clone()),
        created_at: OffsetDateTime::now_utc(),
    };

    let store = state.require_game_store().await?;
    if let Err(err) = store.insert_user(user.clone()).await {
        media::discard_photo(state, &reference).await;
        return Err(err.into());
    }

    let credential = state.identity().issue_credential(user.id)?;
    Ok(CredentialResponse {
        credential,
        user: build_view(state, user)?,
    })
}

/// Page through registered players in registration order.
pub async fn list_players(
    state: &SharedState,
    offset: u64,
    limit: u64,
) -> Result<UserListResponse, ServiceError> {
    let store = state.require_game_store().await?;
    let users = store
        .list_users(offset, limit)
        .await?
        .into_iter()
        .map(|user| build_view(state, user))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UserListResponse {
        users,
        offset,
        limit,
    })
}

/// Replace the caller's reference portrait, dropping the previous blob.
pub async fn replace_photo(
    state: &SharedState,
    user: UserRecord,
    content_type: &str,
    photo: Vec<u8>,
) -> Result<UserView, ServiceError> {
    let reference = media::store_photo(state, content_type, photo).await?;

    let store = state.require_game_store().await?;
    let updated = match store.set_user_photo(user.id, reference.clone()).await {
        Ok(updated) => updated,
        Err(err) => {
            media::discard_photo(state, &reference).await;
            return Err(err.into());
        }
    };
    if !updated {
        media::discard_photo(state, &reference).await;
        return Err(ServiceError::NotFound(format!(
            "user `{}` no longer exists",
            user.id
        )));
    }

    if let Some(previous) = &user.photo {
        media::discard_photo(state, previous).await;
    }

    let user = UserRecord {
        photo: Some(reference),
        ..user
    };
    build_view(state, user)
}

/// Projection of a user with a freshly minted photo URL.
pub fn build_view(state: &SharedState, user: UserRecord) -> Result<UserView, ServiceError> {
    let photo_url = match &user.photo {
        Some(reference) => Some(media::photo_url(state, reference)?),
        None => None,
    };
    Ok(UserView::from((user, photo_url)))
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

    async fn test_state() -> (SharedState, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let state = AppState::for_tests(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            blobs.clone(),
            Arc::new(FixedOracle::matching()),
        )
        .await;
        (state, blobs)
    }

    #[tokio::test]
    async fn registration_issues_a_working_credential() {
        let (state, blobs) = test_state().await;

        let response = register(&state, "kira".into(), "image/jpeg", vec![1, 2])
            .await
            .unwrap();

        let authenticated = state.identity().authenticate(&response.credential).unwrap();
        assert_eq!(authenticated, response.user.id);
        assert_eq!(response.user.username, "kira");
        assert!(response.user.photo_url.is_some());
        assert_eq!(blobs.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_usernames_lose_and_leave_no_orphan_blob() {
        let (state, blobs) = test_state().await;

        register(&state, "kira".into(), "image/jpeg", vec![1])
            .await
            .unwrap();
        let err = register(&state, "kira".into(), "image/png", vec![2])
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(blobs.len(), 1);
    }

    #[tokio::test]
    async fn invalid_usernames_never_reach_the_stores() {
        let (state, blobs) = test_state().await;

        let err = register(&state, "k!".into(), "image/jpeg", vec![1])
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(blobs.len(), 0);
    }

    #[tokio::test]
    async fn directory_pages_in_registration_order() {
        let (state, _) = test_state().await;
        for name in ["alpha", "bravo", "charlie"] {
            register(&state, name.into(), "image/jpeg", vec![1])
                .await
                .unwrap();
        }

        let page = list_players(&state, 1, 1).await.unwrap();
        assert_eq!(page.users.len(), 1);
        assert_eq!(page.users[0].username, "bravo");
        assert_eq!(page.offset, 1);
        assert_eq!(page.limit, 1);
    }

    #[tokio::test]
    async fn replacing_the_portrait_drops_the_previous_blob() {
        let (state, blobs) = test_state().await;
        let response = register(&state, "kira".into(), "image/jpeg", vec![1])
            .await
            .unwrap();
        let store = state.require_game_store().await.unwrap();
        let user = store.find_user(response.user.id).await.unwrap().unwrap();
        let previous = user.photo.clone().unwrap();

        let view = replace_photo(&state, user, "image/png", vec![9, 9])
            .await
            .unwrap();

        assert_eq!(blobs.len(), 1);
        let current = store.find_user(view.id).await.unwrap().unwrap();
        let reference = current.photo.unwrap();
        assert_ne!(reference, previous);
        assert!(reference.ends_with(".png"));
    }
}
