//! Session creation, membership and lifecycle operations.

use rand::Rng;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::{
        models::{ParticipantRecord, SessionRecord, UserRecord},
        storage::StoreError,
    },
    dto::{
        sessions::{
            LeaveRequest, SessionCodeResponse, SessionStatusDto, SessionView, TargetView,
            UpdateSessionRequest,
        },
        validation::validate_join_code,
    },
    error::ServiceError,
    services::media,
    state::{
        SharedState,
        phase::{LifecycleEvent, SessionStatus, plan_transition},
        ring::{audit_cycle, build_ring},
    },
};

/// Alphabet join codes are drawn from. Uppercase only so codes survive being
/// read out loud or scribbled on a napkin.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Open a new session owned by the caller.
///
/// The join code is drawn at random and retried on collision a bounded number
/// of times; when every attempt hits an existing code the caller gets a
/// resource exhaustion error instead of an endless loop.
pub async fn create_session(
    state: &SharedState,
    owner: &UserRecord,
) -> Result<SessionCodeResponse, ServiceError> {
    let store = state.require_game_store().await?;
    let attempts = state.config().code_attempts;

    for _ in 0..attempts {
        let code = generate_code(state.config().code_length);
        let session = SessionRecord {
            id: Uuid::new_v4(),
            code: code.clone(),
            owner_id: owner.id,
            created_at: OffsetDateTime::now_utc(),
            started_at: None,
            ended_at: None,
            version: 0,
            participants: Vec::new(),
        };

        match store.insert_session(session).await {
            Ok(()) => return Ok(SessionCodeResponse { code }),
            Err(StoreError::CodeTaken) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::ResourceExhausted(format!(
        "no free join code found in {attempts} attempts"
    )))
}

/// Full session projection for the owner or a joined player.
pub async fn session_view(
    state: &SharedState,
    caller: &UserRecord,
    code: &str,
) -> Result<SessionView, ServiceError> {
    let session = fetch_session(state, code).await?;
    ensure_member(&session, caller)?;
    build_session_view(state, caller, session).await
}

/// Join an open lobby. Returns the session as the new member sees it.
pub async fn join(
    state: &SharedState,
    caller: &UserRecord,
    code: &str,
) -> Result<SessionView, ServiceError> {
    let session = fetch_session(state, code).await?;
    ensure_phase(
        &session,
        SessionStatus::NotStarted,
        "players can only join before the game starts",
    )?;

    let store = state.require_game_store().await?;
    store
        .add_participant(session.id, session.version, Uuid::new_v4(), caller.id)
        .await?;

    let session = fetch_session(state, code).await?;
    build_session_view(state, caller, session).await
}

/// Remove a player from an open lobby.
///
/// The owner moderates and must always name who is removed, themselves
/// included. Everyone else may only remove themselves and does so by leaving
/// the name out (naming themselves is tolerated).
pub async fn leave(
    state: &SharedState,
    caller: &UserRecord,
    code: &str,
    request: LeaveRequest,
) -> Result<(), ServiceError> {
    let session = fetch_session(state, code).await?;
    ensure_phase(
        &session,
        SessionStatus::NotStarted,
        "the roster can only change before the game starts",
    )?;

    let leaving = if session.owner_id == caller.id {
        let Some(username) = request.username.as_deref() else {
            return Err(ServiceError::InvalidInput(
                "the owner must name the player to remove".into(),
            ));
        };
        session
            .participant_named(username)
            .ok_or_else(|| ServiceError::NotFound(format!("`{username}` is not in this lobby")))?
    } else {
        if let Some(username) = request.username.as_deref() {
            if username != caller.username {
                return Err(ServiceError::Forbidden(
                    "only the owner can remove other players".into(),
                ));
            }
        }
        session
            .participant_for_user(caller.id)
            .ok_or_else(|| ServiceError::NotFound("you are not in this lobby".into()))?
    };

    let store = state.require_game_store().await?;
    store
        .remove_participant(session.id, session.version, leaving.id)
        .await?;
    Ok(())
}

/// Move a session forward through its lifecycle. Owner only.
///
/// Starting locks the roster, builds the ring and stamps `started_at` in one
/// commit. Finishing stamps `ended_at` and leaves the ring as it stands.
pub async fn update_status(
    state: &SharedState,
    caller: &UserRecord,
    code: &str,
    request: UpdateSessionRequest,
) -> Result<SessionView, ServiceError> {
    let session = fetch_session(state, code).await?;
    if session.owner_id != caller.id {
        return Err(ServiceError::Forbidden(
            "only the owner can change the session status".into(),
        ));
    }

    let event = match request.status {
        SessionStatusDto::InProgress => LifecycleEvent::Start,
        SessionStatusDto::Finished => LifecycleEvent::Finish,
        SessionStatusDto::NotStarted => {
            return Err(ServiceError::InvalidState(
                "sessions cannot move back to the lobby".into(),
            ));
        }
    };
    let current = SessionStatus::derive(session.started_at, session.ended_at);
    plan_transition(current, event)?;

    let store = state.require_game_store().await?;
    match event {
        LifecycleEvent::Start => {
            let min_players = state.config().min_players;
            if session.participants.len() < min_players {
                return Err(ServiceError::InvalidState(format!(
                    "at least {min_players} players are needed to start, have {}",
                    session.participants.len()
                )));
            }

            let ids = session.participants.iter().map(|entry| entry.id).collect();
            let assignments = build_ring(ids)?;
            audit_cycle(&assignments)?;

            store
                .commit_start(
                    session.id,
                    session.version,
                    OffsetDateTime::now_utc(),
                    assignments,
                )
                .await?;
        }
        LifecycleEvent::Finish => {
            store
                .commit_finish(session.id, session.version, OffsetDateTime::now_utc())
                .await?;
        }
    }

    let session = fetch_session(state, code).await?;
    build_session_view(state, caller, session).await
}

/// Load a session by join code, normalizing user-entered casing first.
pub(crate) async fn fetch_session(
    state: &SharedState,
    code: &str,
) -> Result<SessionRecord, ServiceError> {
    let code = normalize_code(code)?;
    let store = state.require_game_store().await?;
    store
        .find_session_by_code(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{code}` not found")))
}

/// Assemble the member-facing view: history plus the caller's live target.
pub(crate) async fn build_session_view(
    state: &SharedState,
    caller: &UserRecord,
    session: SessionRecord,
) -> Result<SessionView, ServiceError> {
    let store = state.require_game_store().await?;
    let eliminations = store.list_eliminations(session.id).await?;
    let target = current_target(state, caller, &session)?;
    Ok(SessionView::from((session, eliminations, target)))
}

/// Projection of a hunt target with a freshly minted photo URL.
pub(crate) fn build_target_view(
    state: &SharedState,
    target: &ParticipantRecord,
) -> Result<TargetView, ServiceError> {
    let photo_url = match &target.photo {
        Some(reference) => Some(media::photo_url(state, reference)?),
        None => None,
    };
    Ok(TargetView {
        username: target.username.clone(),
        photo_url,
    })
}

fn current_target(
    state: &SharedState,
    caller: &UserRecord,
    session: &SessionRecord,
) -> Result<Option<TargetView>, ServiceError> {
    if SessionStatus::derive(session.started_at, session.ended_at) != SessionStatus::InProgress {
        return Ok(None);
    }
    let Some(me) = session.participant_for_user(caller.id) else {
        return Ok(None);
    };
    let Some(target_id) = me.target_id else {
        return Ok(None);
    };
    let Some(target) = session.participant(target_id) else {
        return Err(ServiceError::Internal(format!(
            "target {target_id} is missing from the roster"
        )));
    };
    Ok(Some(build_target_view(state, target)?))
}

fn ensure_member(session: &SessionRecord, caller: &UserRecord) -> Result<(), ServiceError> {
    if session.owner_id == caller.id || session.participant_for_user(caller.id).is_some() {
        return Ok(());
    }
    Err(ServiceError::Forbidden(
        "only the owner and joined players can view a session".into(),
    ))
}

fn ensure_phase(
    session: &SessionRecord,
    wanted: SessionStatus,
    message: &str,
) -> Result<(), ServiceError> {
    let status = SessionStatus::derive(session.started_at, session.ended_at);
    if status == wanted {
        return Ok(());
    }
    Err(ServiceError::InvalidState(format!(
        "{message} (currently {status})"
    )))
}

fn normalize_code(raw: &str) -> Result<String, ServiceError> {
    let code = raw.trim().to_ascii_uppercase();
    validate_join_code(&code).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    Ok(code)
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
