//! In-memory [`GameStore`] backend.
//!
//! Used by tests and by deployments that run without a database. Each session
//! lives behind its own mutex, so mutations are serialized per session while
//! independent sessions proceed concurrently, mirroring the row-scoped
//! isolation the Postgres backend gets from transactions.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::game_store::GameStore;
use crate::dao::models::{
    EliminationRecord, ParticipantRecord, SessionRecord, TargetAssignment, TargetSplice,
    UserRecord,
};
use crate::dao::storage::{StoreError, StoreResult};

/// Session fields other than the roster and history.
#[derive(Debug, Clone)]
struct SessionCore {
    id: Uuid,
    code: String,
    owner_id: Uuid,
    created_at: OffsetDateTime,
    started_at: Option<OffsetDateTime>,
    ended_at: Option<OffsetDateTime>,
    version: i64,
}

/// Normalized roster entry; username and photo are joined in at read time.
#[derive(Debug, Clone)]
struct StoredParticipant {
    user_id: Uuid,
    target_id: Option<Uuid>,
}

/// Everything owned by one session, guarded by one lock.
#[derive(Debug)]
struct SessionSlot {
    core: SessionCore,
    participants: IndexMap<Uuid, StoredParticipant>,
    eliminations: Vec<EliminationRecord>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    users: DashMap<Uuid, UserRecord>,
    usernames: DashMap<String, Uuid>,
    codes: DashMap<String, Uuid>,
    sessions: DashMap<Uuid, Arc<Mutex<SessionSlot>>>,
}

/// Process-local game store backed by concurrent maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, session_id: Uuid) -> Option<Arc<Mutex<SessionSlot>>> {
        self.inner
            .sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
    }

    fn join_participant(&self, id: Uuid, stored: &StoredParticipant) -> ParticipantRecord {
        let (username, photo) = self
            .inner
            .users
            .get(&stored.user_id)
            .map(|user| (user.username.clone(), user.photo.clone()))
            .unwrap_or_default();

        ParticipantRecord {
            id,
            user_id: stored.user_id,
            username,
            photo,
            target_id: stored.target_id,
        }
    }

    fn assemble(&self, slot: &SessionSlot) -> SessionRecord {
        SessionRecord {
            id: slot.core.id,
            code: slot.core.code.clone(),
            owner_id: slot.core.owner_id,
            created_at: slot.core.created_at,
            started_at: slot.core.started_at,
            ended_at: slot.core.ended_at,
            version: slot.core.version,
            participants: slot
                .participants
                .iter()
                .map(|(id, stored)| self.join_participant(*id, stored))
                .collect(),
        }
    }
}

impl GameStore for MemoryStore {
    fn insert_user(&self, user: UserRecord) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            match store.inner.usernames.entry(user.username.clone()) {
                Entry::Occupied(_) => Err(StoreError::UsernameTaken),
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                    store.inner.users.insert(user.id, user);
                    Ok(())
                }
            }
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StoreResult<Option<UserRecord>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.users.get(&id).map(|user| user.clone())) })
    }

    fn list_users(
        &self,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'static, StoreResult<Vec<UserRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut users: Vec<UserRecord> = store
                .inner
                .users
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            users.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.username.cmp(&b.username))
            });
            Ok(users
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        })
    }

    fn set_user_photo(&self, id: Uuid, photo: String) -> BoxFuture<'static, StoreResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            match store.inner.users.get_mut(&id) {
                Some(mut user) => {
                    user.photo = Some(photo);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn insert_session(&self, session: SessionRecord) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            match store.inner.codes.entry(session.code.clone()) {
                Entry::Occupied(_) => Err(StoreError::CodeTaken),
                Entry::Vacant(code_slot) => {
                    code_slot.insert(session.id);
                    let slot = SessionSlot {
                        core: SessionCore {
                            id: session.id,
                            code: session.code,
                            owner_id: session.owner_id,
                            created_at: session.created_at,
                            started_at: session.started_at,
                            ended_at: session.ended_at,
                            version: session.version,
                        },
                        participants: IndexMap::new(),
                        eliminations: Vec::new(),
                    };
                    store
                        .inner
                        .sessions
                        .insert(session.id, Arc::new(Mutex::new(slot)));
                    Ok(())
                }
            }
        })
    }

    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StoreResult<Option<SessionRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(session_id) = store.inner.codes.get(&code).map(|entry| *entry.value()) else {
                return Ok(None);
            };
            let Some(slot) = store.slot(session_id).await else {
                return Ok(None);
            };
            let guard = slot.lock().await;
            Ok(Some(store.assemble(&guard)))
        })
    }

    fn list_eliminations(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StoreResult<Vec<EliminationRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            match store.slot(session_id).await {
                Some(slot) => Ok(slot.lock().await.eliminations.clone()),
                None => Ok(Vec::new()),
            }
        })
    }

    fn add_participant(
        &self,
        session_id: Uuid,
        expected_version: i64,
        participant_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(slot) = store.slot(session_id).await else {
                return Err(StoreError::VersionConflict);
            };
            let mut guard = slot.lock().await;
            if guard.core.version != expected_version {
                return Err(StoreError::VersionConflict);
            }
            if guard
                .participants
                .values()
                .any(|stored| stored.user_id == user_id)
            {
                return Err(StoreError::AlreadyJoined);
            }
            guard.participants.insert(
                participant_id,
                StoredParticipant {
                    user_id,
                    target_id: None,
                },
            );
            guard.core.version += 1;
            Ok(())
        })
    }

    fn remove_participant(
        &self,
        session_id: Uuid,
        expected_version: i64,
        participant_id: Uuid,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(slot) = store.slot(session_id).await else {
                return Err(StoreError::VersionConflict);
            };
            let mut guard = slot.lock().await;
            if guard.core.version != expected_version {
                return Err(StoreError::VersionConflict);
            }
            if guard.participants.shift_remove(&participant_id).is_none() {
                return Err(StoreError::VersionConflict);
            }
            guard.core.version += 1;
            Ok(())
        })
    }

    fn commit_start(
        &self,
        session_id: Uuid,
        expected_version: i64,
        started_at: OffsetDateTime,
        assignments: Vec<TargetAssignment>,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(slot) = store.slot(session_id).await else {
                return Err(StoreError::VersionConflict);
            };
            let mut guard = slot.lock().await;
            if guard.core.version != expected_version {
                return Err(StoreError::VersionConflict);
            }
            if assignments
                .iter()
                .any(|edge| !guard.participants.contains_key(&edge.participant_id))
            {
                return Err(StoreError::VersionConflict);
            }
            for edge in assignments {
                if let Some(stored) = guard.participants.get_mut(&edge.participant_id) {
                    stored.target_id = Some(edge.target_id);
                }
            }
            guard.core.started_at = Some(started_at);
            guard.core.version += 1;
            Ok(())
        })
    }

    fn commit_finish(
        &self,
        session_id: Uuid,
        expected_version: i64,
        ended_at: OffsetDateTime,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(slot) = store.slot(session_id).await else {
                return Err(StoreError::VersionConflict);
            };
            let mut guard = slot.lock().await;
            if guard.core.version != expected_version {
                return Err(StoreError::VersionConflict);
            }
            guard.core.ended_at = Some(ended_at);
            guard.core.version += 1;
            Ok(())
        })
    }

    fn commit_elimination(
        &self,
        session_id: Uuid,
        expected_version: i64,
        record: EliminationRecord,
        splice: TargetSplice,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(slot) = store.slot(session_id).await else {
                return Err(StoreError::VersionConflict);
            };
            let mut guard = slot.lock().await;
            if guard.core.version != expected_version {
                return Err(StoreError::VersionConflict);
            }
            if guard.eliminations.iter().any(|event| {
                event.eliminator_id == record.eliminator_id
                    && event.eliminated_id == record.eliminated_id
            }) {
                return Err(StoreError::DuplicateElimination);
            }
            if !guard.participants.contains_key(&splice.eliminator_id)
                || !guard.participants.contains_key(&splice.eliminated_id)
            {
                return Err(StoreError::VersionConflict);
            }
            if let Some(eliminator) = guard.participants.get_mut(&splice.eliminator_id) {
                eliminator.target_id = Some(splice.inherited_target_id);
            }
            if let Some(eliminated) = guard.participants.get_mut(&splice.eliminated_id) {
                eliminated.target_id = None;
            }
            guard.eliminations.push(record);
            guard.core.version += 1;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: name.into(),
            photo: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn session(code: &str, owner: Uuid) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            code: code.into(),
            owner_id: owner,
            created_at: OffsetDateTime::now_utc(),
            started_at: None,
            ended_at: None,
            version: 0,
            participants: Vec::new(),
        }
    }

    #[tokio::test]
    async fn username_uniqueness_is_enforced() {
        let store = MemoryStore::new();
        store.insert_user(user("mallory")).await.unwrap();
        let err = store.insert_user(user("mallory")).await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken));
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store.insert_session(session("AAAAAA", owner)).await.unwrap();
        let err = store
            .insert_session(session("AAAAAA", owner))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CodeTaken));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let owner = user("owner");
        let owner_id = owner.id;
        store.insert_user(owner).await.unwrap();
        let record = session("RINGED", owner_id);
        let session_id = record.id;
        store.insert_session(record).await.unwrap();

        store
            .add_participant(session_id, 0, Uuid::new_v4(), owner_id)
            .await
            .unwrap();
        // Version moved to 1, so a writer still holding 0 must lose.
        let err = store
            .add_participant(session_id, 0, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict));
    }

    #[tokio::test]
    async fn second_join_of_same_user_conflicts() {
        let store = MemoryStore::new();
        let player = user("dupe");
        let player_id = player.id;
        store.insert_user(player).await.unwrap();
        let record = session("DOUBLE", player_id);
        let session_id = record.id;
        store.insert_session(record).await.unwrap();

        store
            .add_participant(session_id, 0, Uuid::new_v4(), player_id)
            .await
            .unwrap();
        let err = store
            .add_participant(session_id, 1, Uuid::new_v4(), player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyJoined));
    }

    #[tokio::test]
    async fn duplicate_elimination_pair_conflicts() {
        let store = MemoryStore::new();
        let hunter = user("hunter");
        let prey = user("prey");
        let third = user("third");
        let (hunter_id, prey_id, third_id) = (hunter.id, prey.id, third.id);
        for record in [hunter, prey, third] {
            store.insert_user(record).await.unwrap();
        }
        let record = session("TRIPLE", hunter_id);
        let session_id = record.id;
        store.insert_session(record).await.unwrap();

        let (p1, p2, p3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store
            .add_participant(session_id, 0, p1, hunter_id)
            .await
            .unwrap();
        store
            .add_participant(session_id, 1, p2, prey_id)
            .await
            .unwrap();
        store
            .add_participant(session_id, 2, p3, third_id)
            .await
            .unwrap();
        store
            .commit_start(
                session_id,
                3,
                OffsetDateTime::now_utc(),
                vec![
                    TargetAssignment {
                        participant_id: p1,
                        target_id: p2,
                    },
                    TargetAssignment {
                        participant_id: p2,
                        target_id: p3,
                    },
                    TargetAssignment {
                        participant_id: p3,
                        target_id: p1,
                    },
                ],
            )
            .await
            .unwrap();

        let event = EliminationRecord {
            id: Uuid::new_v4(),
            session_id,
            eliminator_id: p1,
            eliminated_id: p2,
            happened_at: OffsetDateTime::now_utc(),
        };
        let splice = TargetSplice {
            eliminator_id: p1,
            eliminated_id: p2,
            inherited_target_id: p3,
        };
        store
            .commit_elimination(session_id, 4, event.clone(), splice)
            .await
            .unwrap();

        let replay = EliminationRecord {
            id: Uuid::new_v4(),
            ..event
        };
        let err = store
            .commit_elimination(session_id, 5, replay, splice)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateElimination));

        let loaded = store
            .find_session_by_code("TRIPLE".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.active_count(), 2);
        assert_eq!(
            loaded.participant(p1).and_then(|entry| entry.target_id),
            Some(p3)
        );
        assert_eq!(loaded.participant(p2).and_then(|entry| entry.target_id), None);
    }
}
