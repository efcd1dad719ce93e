pub mod memory;
#[cfg(feature = "postgres-store")]
pub mod postgres;

use futures::future::BoxFuture;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::models::{
    EliminationRecord, SessionRecord, TargetAssignment, TargetSplice, UserRecord,
};
use crate::dao::storage::StoreResult;

/// Abstraction over the persistence layer for users, sessions and eliminations.
///
/// Every session mutation is a conditional write guarded by the session's
/// `version`: the commit succeeds only when the expected version is still
/// current, otherwise the backend returns [`StoreError::VersionConflict`] and
/// leaves the session untouched. Uniqueness constraints (join code, one
/// participant per user and session, one elimination per (eliminator,
/// eliminated) pair) are enforced by the backend so concurrent duplicates lose
/// with a typed error instead of double-mutating the ring.
///
/// [`StoreError::VersionConflict`]: crate::dao::storage::StoreError::VersionConflict
pub trait GameStore: Send + Sync {
    /// Insert a freshly registered user.
    fn insert_user(&self, user: UserRecord) -> BoxFuture<'static, StoreResult<()>>;
    /// Fetch a user by id.
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StoreResult<Option<UserRecord>>>;
    /// Page through registered users in registration order.
    fn list_users(&self, offset: u64, limit: u64)
    -> BoxFuture<'static, StoreResult<Vec<UserRecord>>>;
    /// Replace a user's photo reference. Returns `false` when the user is gone.
    fn set_user_photo(&self, id: Uuid, photo: String) -> BoxFuture<'static, StoreResult<bool>>;

    /// Insert a new session with an empty roster.
    fn insert_session(&self, session: SessionRecord) -> BoxFuture<'static, StoreResult<()>>;
    /// Load the full session aggregate (roster included) by join code.
    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StoreResult<Option<SessionRecord>>>;
    /// Elimination history of a session, oldest first.
    fn list_eliminations(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StoreResult<Vec<EliminationRecord>>>;

    /// Add a participant to the lobby.
    fn add_participant(
        &self,
        session_id: Uuid,
        expected_version: i64,
        participant_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StoreResult<()>>;
    /// Remove a participant from the lobby.
    fn remove_participant(
        &self,
        session_id: Uuid,
        expected_version: i64,
        participant_id: Uuid,
    ) -> BoxFuture<'static, StoreResult<()>>;
    /// Start the game: set `started_at` and install the full ring in one commit.
    fn commit_start(
        &self,
        session_id: Uuid,
        expected_version: i64,
        started_at: OffsetDateTime,
        assignments: Vec<TargetAssignment>,
    ) -> BoxFuture<'static, StoreResult<()>>;
    /// Finish the game: set `ended_at`, leaving the ring as it stands.
    fn commit_finish(
        &self,
        session_id: Uuid,
        expected_version: i64,
        ended_at: OffsetDateTime,
    ) -> BoxFuture<'static, StoreResult<()>>;
    /// Append an elimination record and apply the ring splice in one commit.
    fn commit_elimination(
        &self,
        session_id: Uuid,
        expected_version: i64,
        record: EliminationRecord,
        splice: TargetSplice,
    ) -> BoxFuture<'static, StoreResult<()>>;

    /// Cheap connectivity probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>>;
    /// Attempt to re-establish a dropped backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StoreResult<()>>;
}
