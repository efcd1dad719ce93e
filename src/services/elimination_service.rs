//! Elimination claims: proof verification, history and ring rewiring.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::models::{EliminationRecord, ParticipantRecord, UserRecord},
    dto::eliminations::{EliminationOutcomeDto, EliminationResponse},
    error::ServiceError,
    services::{media, session_service},
    state::{
        SharedState,
        phase::SessionStatus,
        ring::{SpliceOutcome, plan_splice},
    },
};

/// Claim that the caller has taken out their current target.
///
/// Verification happens before any state is touched, so a rejected or
/// unreachable oracle leaves the session exactly as it was. The final
/// takedown of a two-member ring produces a winner instead of an
/// elimination record.
pub async fn claim(
    state: &SharedState,
    caller: &UserRecord,
    code: &str,
    content_type: &str,
    probe: Vec<u8>,
) -> Result<EliminationResponse, ServiceError> {
    let session = session_service::fetch_session(state, code).await?;

    let me = session
        .participant_for_user(caller.id)
        .ok_or_else(|| ServiceError::NotFound("you are not part of this session".into()))?;

    let status = SessionStatus::derive(session.started_at, session.ended_at);
    if status != SessionStatus::InProgress {
        return Err(ServiceError::InvalidState(format!(
            "eliminations can only be claimed while the game runs (currently {status})"
        )));
    }

    let target_id = me
        .target_id
        .ok_or_else(|| ServiceError::Forbidden("eliminated players can no longer claim".into()))?;
    let victim = session.participant(target_id).ok_or_else(|| {
        ServiceError::Internal(format!("target {target_id} is missing from the roster"))
    })?;

    if state.config().verification_required {
        verify_claim(state, victim, content_type, probe).await?;
    }

    let active = session.active_count();
    let store = state.require_game_store().await?;

    match plan_splice(me, victim)? {
        SpliceOutcome::Winner => {
            if active > 2 {
                return Err(ServiceError::Internal(format!(
                    "ring closed on the eliminator with {active} hunters still active"
                )));
            }
            store
                .commit_finish(session.id, session.version, OffsetDateTime::now_utc())
                .await?;
            Ok(EliminationResponse {
                outcome: EliminationOutcomeDto::Winner,
                next_target: None,
            })
        }
        SpliceOutcome::Continue(splice) => {
            if active <= 2 {
                return Err(ServiceError::Internal(format!(
                    "ring continues past the eliminator with only {active} hunters active"
                )));
            }
            let record = EliminationRecord {
                id: Uuid::new_v4(),
                session_id: session.id,
                eliminator_id: me.id,
                eliminated_id: victim.id,
                happened_at: OffsetDateTime::now_utc(),
            };
            store
                .commit_elimination(session.id, session.version, record, splice)
                .await?;

            let inherited = session.participant(splice.inherited_target_id).ok_or_else(|| {
                ServiceError::Internal(format!(
                    "inherited target {} is missing from the roster",
                    splice.inherited_target_id
                ))
            })?;
            Ok(EliminationResponse {
                outcome: EliminationOutcomeDto::Continue,
                next_target: Some(session_service::build_target_view(state, inherited)?),
            })
        }
    }
}

/// Compare the submitted proof against the victim's reference portrait.
async fn verify_claim(
    state: &SharedState,
    victim: &ParticipantRecord,
    content_type: &str,
    probe: Vec<u8>,
) -> Result<(), ServiceError> {
    media::ensure_supported(content_type)?;
    if probe.is_empty() {
        return Err(ServiceError::InvalidInput(
            "proof photo must not be empty".into(),
        ));
    }

    let Some(reference) = &victim.photo else {
        return Err(ServiceError::Internal(format!(
            "participant {} has no reference portrait",
            victim.id
        )));
    };
    let source_url = media::photo_url(state, reference)?;

    let matched = state
        .oracle()
        .verify(source_url, probe, content_type.to_string())
        .await?;
    if !matched {
        return Err(ServiceError::VerificationFailed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{blob_store::MemoryBlobStore, game_store::memory::MemoryStore},
        dto::sessions::{SessionStatusDto, UpdateSessionRequest},
        oracle::{
            FaceOracle,
            testing::{DownOracle, FixedOracle},
        },
        services::session_service::{create_session, fetch_session, join, session_view, update_status},
        state::AppState,
    };

    async fn state_with(config: AppConfig, oracle: Arc<dyn FaceOracle>) -> SharedState {
        AppState::for_tests(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBlobStore::new()),
            oracle,
        )
        .await
    }

    async fn seed_user(state: &SharedState, name: &str) -> UserRecord {
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: name.into(),
            photo: Some(format!("{name}.jpeg")),
            created_at: OffsetDateTime::now_utc(),
        };
        state
            .require_game_store()
            .await
            .unwrap()
            .insert_user(user.clone())
            .await
            .unwrap();
        user
    }

    /// Create a session, join every named user and start the hunt.
    async fn running_session(state: &SharedState, names: &[&str]) -> (Vec<UserRecord>, String) {
        let owner = seed_user(state, names[0]).await;
        let code = create_session(state, &owner).await.unwrap().code;
        join(state, &owner, &code).await.unwrap();

        let mut users = vec![owner];
        for name in &names[1..] {
            let user = seed_user(state, name).await;
            join(state, &user, &code).await.unwrap();
            users.push(user);
        }

        update_status(
            state,
            &users[0],
            &code,
            UpdateSessionRequest {
                status: SessionStatusDto::InProgress,
            },
        )
        .await
        .unwrap();
        (users, code)
    }

    fn backing_user<'a>(users: &'a [UserRecord], participant: &ParticipantRecord) -> &'a UserRecord {
        users
            .iter()
            .find(|user| user.id == participant.user_id)
            .expect("participant backed by a seeded user")
    }

    #[tokio::test]
    async fn a_three_player_hunt_runs_to_its_winner() {
        let state = state_with(AppConfig::default(), Arc::new(FixedOracle::matching())).await;
        let (users, code) = running_session(&state, &["owner", "blue", "green"]).await;

        let session = fetch_session(&state, &code).await.unwrap();
        let hunter = session.participants[0].clone();
        let victim = session
            .participant(hunter.target_id.unwrap())
            .unwrap()
            .clone();
        let hunter_user = backing_user(&users, &hunter);

        let response = claim(&state, hunter_user, &code, "image/jpeg", vec![1])
            .await
            .unwrap();
        assert_eq!(response.outcome, EliminationOutcomeDto::Continue);
        let next = response.next_target.unwrap();
        assert_ne!(next.username, hunter.username);
        assert_ne!(next.username, victim.username);

        let view = session_view(&state, hunter_user, &code).await.unwrap();
        assert_eq!(view.eliminations.len(), 1);
        assert_eq!(view.eliminations[0].eliminator, hunter.username);
        assert_eq!(view.eliminations[0].eliminated, victim.username);
        let downed = view
            .players
            .iter()
            .find(|p| p.username == victim.username)
            .unwrap();
        assert!(!downed.active);
        assert_eq!(view.target.as_ref().unwrap().username, next.username);

        // The downed player is out of the hunt entirely.
        let downed_user = backing_user(&users, &victim);
        let err = claim(&state, downed_user, &code, "image/jpeg", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // Taking out the last other hunter ends the session with a winner and
        // without a second history entry.
        let response = claim(&state, hunter_user, &code, "image/jpeg", vec![2])
            .await
            .unwrap();
        assert_eq!(response.outcome, EliminationOutcomeDto::Winner);
        assert!(response.next_target.is_none());

        let view = session_view(&state, hunter_user, &code).await.unwrap();
        assert_eq!(view.status, SessionStatusDto::Finished);
        assert!(view.ended_at.is_some());
        assert_eq!(view.eliminations.len(), 1);
        let standing = view.players.iter().filter(|p| p.active).count();
        assert_eq!(standing, 2);

        // Nothing more to claim once the session is over.
        let err = claim(&state, hunter_user, &code, "image/jpeg", vec![3])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn a_two_player_session_ends_on_the_first_takedown() {
        let state = state_with(AppConfig::default(), Arc::new(FixedOracle::matching())).await;
        let (users, code) = running_session(&state, &["owner", "rival"]).await;

        let session = fetch_session(&state, &code).await.unwrap();
        let hunter = session.participants[0].clone();
        let hunter_user = backing_user(&users, &hunter);

        let response = claim(&state, hunter_user, &code, "image/jpeg", vec![1])
            .await
            .unwrap();
        assert_eq!(response.outcome, EliminationOutcomeDto::Winner);

        let view = session_view(&state, hunter_user, &code).await.unwrap();
        assert_eq!(view.status, SessionStatusDto::Finished);
        assert!(view.eliminations.is_empty());
    }

    #[tokio::test]
    async fn rejected_proofs_change_nothing() {
        let state = state_with(AppConfig::default(), Arc::new(FixedOracle::rejecting())).await;
        let (users, code) = running_session(&state, &["owner", "blue", "green"]).await;

        let session = fetch_session(&state, &code).await.unwrap();
        let hunter = session.participants[0].clone();
        let hunter_user = backing_user(&users, &hunter);

        let err = claim(&state, hunter_user, &code, "image/jpeg", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::VerificationFailed));

        let after = fetch_session(&state, &code).await.unwrap();
        assert_eq!(after, session);
        let view = session_view(&state, hunter_user, &code).await.unwrap();
        assert!(view.eliminations.is_empty());
    }

    #[tokio::test]
    async fn an_unreachable_oracle_blocks_the_claim() {
        let state = state_with(AppConfig::default(), Arc::new(DownOracle)).await;
        let (users, code) = running_session(&state, &["owner", "blue", "green"]).await;

        let session = fetch_session(&state, &code).await.unwrap();
        let hunter_user = backing_user(&users, &session.participants[0]);

        let err = claim(&state, hunter_user, &code, "image/jpeg", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::OracleUnavailable(_)));

        let after = fetch_session(&state, &code).await.unwrap();
        assert_eq!(after, session);
    }

    #[tokio::test]
    async fn verification_can_be_waived_by_configuration() {
        let config = AppConfig {
            verification_required: false,
            ..AppConfig::default()
        };
        // The oracle being down must not matter when verification is off.
        let state = state_with(config, Arc::new(DownOracle)).await;
        let (users, code) = running_session(&state, &["owner", "blue", "green"]).await;

        let session = fetch_session(&state, &code).await.unwrap();
        let hunter_user = backing_user(&users, &session.participants[0]);

        let response = claim(&state, hunter_user, &code, "", Vec::new())
            .await
            .unwrap();
        assert_eq!(response.outcome, EliminationOutcomeDto::Continue);
    }

    #[tokio::test]
    async fn outsiders_cannot_claim() {
        let state = state_with(AppConfig::default(), Arc::new(FixedOracle::matching())).await;
        let (_, code) = running_session(&state, &["owner", "blue", "green"]).await;
        let outsider = seed_user(&state, "outsider").await;

        let err = claim(&state, &outsider, &code, "image/jpeg", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn claims_need_a_running_session() {
        let state = state_with(AppConfig::default(), Arc::new(FixedOracle::matching())).await;
        let owner = seed_user(&state, "owner").await;
        let code = create_session(&state, &owner).await.unwrap().code;
        join(&state, &owner, &code).await.unwrap();

        let err = claim(&state, &owner, &code, "image/jpeg", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
