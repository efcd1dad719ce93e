use futures::future::BoxFuture;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{
        EliminationRecord, ParticipantRecord, SessionRecord, TargetAssignment, TargetSplice,
        UserRecord,
    },
    storage::{StoreError, StoreResult},
};

use super::{
    config::PgConfig,
    error::{PgDaoError, PgResult},
};

/// Tables and indexes the store expects. Idempotent so reconnects can replay it.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    username TEXT NOT NULL,
    photo TEXT,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS users_username_key ON users (username);

CREATE TABLE IF NOT EXISTS sessions (
    id UUID PRIMARY KEY,
    code TEXT NOT NULL,
    owner_id UUID NOT NULL REFERENCES users (id),
    created_at TIMESTAMPTZ NOT NULL,
    started_at TIMESTAMPTZ,
    ended_at TIMESTAMPTZ,
    version BIGINT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS sessions_code_key ON sessions (code);

CREATE TABLE IF NOT EXISTS participants (
    id UUID PRIMARY KEY,
    session_id UUID NOT NULL REFERENCES sessions (id),
    user_id UUID NOT NULL REFERENCES users (id),
    target_id UUID,
    seq BIGSERIAL NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS participants_session_user_key
    ON participants (session_id, user_id);

CREATE TABLE IF NOT EXISTS eliminations (
    id UUID PRIMARY KEY,
    session_id UUID NOT NULL REFERENCES sessions (id),
    eliminator_id UUID NOT NULL REFERENCES participants (id),
    eliminated_id UUID NOT NULL REFERENCES participants (id),
    happened_at TIMESTAMPTZ NOT NULL,
    seq BIGSERIAL NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS eliminations_pair_key
    ON eliminations (session_id, eliminator_id, eliminated_id);
";

/// Game store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgGameStore {
    pool: PgPool,
}

impl PgGameStore {
    /// Open the connection pool and ensure the schema exists.
    pub async fn connect(config: PgConfig) -> PgResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|source| PgDaoError::Connect { source })?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> PgResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|source| PgDaoError::Schema { source })?;
        Ok(())
    }

    /// Bump the session version iff the caller still holds the current one.
    async fn guard_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: Uuid,
        expected_version: i64,
    ) -> StoreResult<()> {
        let updated = sqlx::query("UPDATE sessions SET version = version + 1 WHERE id = $1 AND version = $2")
            .bind(session_id)
            .bind(expected_version)
            .execute(&mut **tx)
            .await
            .map_err(|source| PgDaoError::Query {
                operation: "session version guard",
                source,
            })?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::VersionConflict);
        }
        Ok(())
    }
}

/// Fold a unique-constraint violation into its typed variant, everything else
/// into [`StoreError::Unavailable`].
fn map_constraint(operation: &'static str, err: sqlx::Error, taken: StoreError) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return taken;
        }
    }
    PgDaoError::Query {
        operation,
        source: err,
    }
    .into()
}

fn query_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |source| PgDaoError::Query { operation, source }.into()
}

fn tx_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |source| PgDaoError::Transaction { operation, source }.into()
}

impl GameStore for PgGameStore {
    fn insert_user(&self, user: UserRecord) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            sqlx::query("INSERT INTO users (id, username, photo, created_at) VALUES ($1, $2, $3, $4)")
                .bind(user.id)
                .bind(&user.username)
                .bind(&user.photo)
                .bind(user.created_at)
                .execute(&store.pool)
                .await
                .map_err(|err| map_constraint("insert user", err, StoreError::UsernameTaken))?;
            Ok(())
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StoreResult<Option<UserRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let row: Option<(Uuid, String, Option<String>, OffsetDateTime)> =
                sqlx::query_as("SELECT id, username, photo, created_at FROM users WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&store.pool)
                    .await
                    .map_err(query_err("find user"))?;
            Ok(row.map(|(id, username, photo, created_at)| UserRecord {
                id,
                username,
                photo,
                created_at,
            }))
        })
    }

    fn list_users(
        &self,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'static, StoreResult<Vec<UserRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows: Vec<(Uuid, String, Option<String>, OffsetDateTime)> = sqlx::query_as(
                "SELECT id, username, photo, created_at FROM users \
                 ORDER BY created_at, username OFFSET $1 LIMIT $2",
            )
            .bind(offset as i64)
            .bind(limit as i64)
            .fetch_all(&store.pool)
            .await
            .map_err(query_err("list users"))?;
            Ok(rows
                .into_iter()
                .map(|(id, username, photo, created_at)| UserRecord {
                    id,
                    username,
                    photo,
                    created_at,
                })
                .collect())
        })
    }

    fn set_user_photo(&self, id: Uuid, photo: String) -> BoxFuture<'static, StoreResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let updated = sqlx::query("UPDATE users SET photo = $2 WHERE id = $1")
                .bind(id)
                .bind(&photo)
                .execute(&store.pool)
                .await
                .map_err(query_err("set user photo"))?;
            Ok(updated.rows_affected() > 0)
        })
    }

    fn insert_session(&self, session: SessionRecord) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO sessions (id, code, owner_id, created_at, started_at, ended_at, version) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(session.id)
            .bind(&session.code)
            .bind(session.owner_id)
            .bind(session.created_at)
            .bind(session.started_at)
            .bind(session.ended_at)
            .bind(session.version)
            .execute(&store.pool)
            .await
            .map_err(|err| map_constraint("insert session", err, StoreError::CodeTaken))?;
            Ok(())
        })
    }

    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StoreResult<Option<SessionRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let head: Option<(
                Uuid,
                String,
                Uuid,
                OffsetDateTime,
                Option<OffsetDateTime>,
                Option<OffsetDateTime>,
                i64,
            )> = sqlx::query_as(
                "SELECT id, code, owner_id, created_at, started_at, ended_at, version \
                 FROM sessions WHERE code = $1",
            )
            .bind(&code)
            .fetch_optional(&store.pool)
            .await
            .map_err(query_err("load session"))?;

            let Some((id, code, owner_id, created_at, started_at, ended_at, version)) = head
            else {
                return Ok(None);
            };

            let roster: Vec<(Uuid, Uuid, String, Option<String>, Option<Uuid>)> = sqlx::query_as(
                "SELECT p.id, p.user_id, u.username, u.photo, p.target_id \
                 FROM participants p JOIN users u ON u.id = p.user_id \
                 WHERE p.session_id = $1 ORDER BY p.seq",
            )
            .bind(id)
            .fetch_all(&store.pool)
            .await
            .map_err(query_err("load roster"))?;

            Ok(Some(SessionRecord {
                id,
                code,
                owner_id,
                created_at,
                started_at,
                ended_at,
                version,
                participants: roster
                    .into_iter()
                    .map(|(id, user_id, username, photo, target_id)| ParticipantRecord {
                        id,
                        user_id,
                        username,
                        photo,
                        target_id,
                    })
                    .collect(),
            }))
        })
    }

    fn list_eliminations(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StoreResult<Vec<EliminationRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows: Vec<(Uuid, Uuid, Uuid, OffsetDateTime)> = sqlx::query_as(
                "SELECT id, eliminator_id, eliminated_id, happened_at \
                 FROM eliminations WHERE session_id = $1 ORDER BY seq",
            )
            .bind(session_id)
            .fetch_all(&store.pool)
            .await
            .map_err(query_err("list eliminations"))?;
            Ok(rows
                .into_iter()
                .map(|(id, eliminator_id, eliminated_id, happened_at)| EliminationRecord {
                    id,
                    session_id,
                    eliminator_id,
                    eliminated_id,
                    happened_at,
                })
                .collect())
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
            let mut tx = store.pool.begin().await.map_err(tx_err("add participant"))?;
            Self::guard_version(&mut tx, session_id, expected_version).await?;
            sqlx::query("INSERT INTO participants (id, session_id, user_id) VALUES ($1, $2, $3)")
                .bind(participant_id)
                .bind(session_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|err| map_constraint("add participant", err, StoreError::AlreadyJoined))?;
            tx.commit().await.map_err(tx_err("add participant"))?;
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
            let mut tx = store
                .pool
                .begin()
                .await
                .map_err(tx_err("remove participant"))?;
            Self::guard_version(&mut tx, session_id, expected_version).await?;
            let removed =
                sqlx::query("DELETE FROM participants WHERE id = $1 AND session_id = $2")
                    .bind(participant_id)
                    .bind(session_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(query_err("remove participant"))?;
            if removed.rows_affected() == 0 {
                return Err(StoreError::VersionConflict);
            }
            tx.commit().await.map_err(tx_err("remove participant"))?;
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
            let mut tx = store.pool.begin().await.map_err(tx_err("start session"))?;
            Self::guard_version(&mut tx, session_id, expected_version).await?;
            sqlx::query("UPDATE sessions SET started_at = $2 WHERE id = $1")
                .bind(session_id)
                .bind(started_at)
                .execute(&mut *tx)
                .await
                .map_err(query_err("start session"))?;
            for edge in assignments {
                let updated = sqlx::query(
                    "UPDATE participants SET target_id = $3 WHERE id = $1 AND session_id = $2",
                )
                .bind(edge.participant_id)
                .bind(session_id)
                .bind(edge.target_id)
                .execute(&mut *tx)
                .await
                .map_err(query_err("assign target"))?;
                if updated.rows_affected() == 0 {
                    return Err(StoreError::VersionConflict);
                }
            }
            tx.commit().await.map_err(tx_err("start session"))?;
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
            let updated = sqlx::query(
                "UPDATE sessions SET ended_at = $3, version = version + 1 \
                 WHERE id = $1 AND version = $2",
            )
            .bind(session_id)
            .bind(expected_version)
            .bind(ended_at)
            .execute(&store.pool)
            .await
            .map_err(query_err("finish session"))?;
            if updated.rows_affected() == 0 {
                return Err(StoreError::VersionConflict);
            }
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
            let mut tx = store
                .pool
                .begin()
                .await
                .map_err(tx_err("record elimination"))?;
            Self::guard_version(&mut tx, session_id, expected_version).await?;
            sqlx::query(
                "INSERT INTO eliminations (id, session_id, eliminator_id, eliminated_id, happened_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(record.id)
            .bind(record.session_id)
            .bind(record.eliminator_id)
            .bind(record.eliminated_id)
            .bind(record.happened_at)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                map_constraint("record elimination", err, StoreError::DuplicateElimination)
            })?;
            for (participant_id, target_id) in [
                (splice.eliminator_id, Some(splice.inherited_target_id)),
                (splice.eliminated_id, None),
            ] {
                let updated = sqlx::query(
                    "UPDATE participants SET target_id = $3 WHERE id = $1 AND session_id = $2",
                )
                .bind(participant_id)
                .bind(session_id)
                .bind(target_id)
                .execute(&mut *tx)
                .await
                .map_err(query_err("splice targets"))?;
                if updated.rows_affected() == 0 {
                    return Err(StoreError::VersionConflict);
                }
            }
            tx.commit().await.map_err(tx_err("record elimination"))?;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&store.pool)
                .await
                .map_err(query_err("health check"))?;
            Ok(())
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_schema().await.map_err(Into::into) })
    }
}
