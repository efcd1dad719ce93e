//! DTO definitions for registration and the player directory.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{dao::models::UserRecord, dto::format_timestamp};

/// Largest page size the directory will serve in one request.
pub const MAX_PAGE_SIZE: u64 = 100;

const fn default_limit() -> u64 {
    MAX_PAGE_SIZE
}

/// Multipart payload submitted when registering a player.
///
/// The handler reads the parts manually; this type only feeds the OpenAPI
/// document.
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct RegistrationForm {
    /// Unique display name, 3 to 32 characters of letters, digits, `_` or `-`.
    pub username: String,
    /// Reference portrait used to verify eliminations. JPEG or PNG.
    #[schema(value_type = String, format = Binary)]
    pub photo: Vec<u8>,
}

/// Multipart payload for replacing the caller's reference portrait.
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct PhotoForm {
    /// New reference portrait. JPEG or PNG.
    #[schema(value_type = String, format = Binary)]
    pub photo: Vec<u8>,
}

/// Public projection of a registered player.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    /// Expiring URL serving the player's portrait, when one is stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub created_at: String,
}

impl From<(UserRecord, Option<String>)> for UserView {
    fn from((user, photo_url): (UserRecord, Option<String>)) -> Self {
        Self {
            id: user.id,
            username: user.username,
            photo_url,
            created_at: format_timestamp(user.created_at),
        }
    }
}

/// Bearer credential handed out once registration succeeds.
#[derive(Debug, Serialize, ToSchema)]
pub struct CredentialResponse {
    /// Signed credential to present as `Authorization: Bearer <credential>`.
    pub credential: String,
    pub user: UserView,
}

/// Paging window over the player directory.
#[derive(Debug, Deserialize, Validate)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: u64,
}

/// One page of the player directory.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserView>,
    pub offset: u64,
    pub limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults_fill_in() {
        let query: ListUsersQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.offset, 0);
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn list_query_rejects_oversized_limit() {
        let query: ListUsersQuery = serde_json::from_str(r#"{"limit": 101}"#).unwrap();
        assert!(query.validate().is_err());
    }

    #[test]
    fn user_view_formats_timestamp() {
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: "kira".into(),
            photo: Some("ref.jpeg".into()),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let view = UserView::from((user, Some("http://host/photos/ref.jpeg".into())));
        assert_eq!(view.created_at, "1970-01-01T00:00:00Z");
        assert_eq!(view.photo_url.as_deref(), Some("http://host/photos/ref.jpeg"));
    }
}
