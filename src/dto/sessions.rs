//! DTO definitions for session lifecycle and lobby endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{EliminationRecord, SessionRecord},
    dto::format_timestamp,
    state::phase::SessionStatus,
};

/// Response carrying the join code of a freshly created session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionCodeResponse {
    /// Code other players enter to join the lobby.
    pub code: String,
}

/// Lifecycle phase of a session as exposed over the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatusDto {
    NotStarted,
    InProgress,
    Finished,
}

impl From<SessionStatus> for SessionStatusDto {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::NotStarted => Self::NotStarted,
            SessionStatus::InProgress => Self::InProgress,
            SessionStatus::Finished => Self::Finished,
        }
    }
}

/// Roster entry of a session view.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerView {
    pub username: String,
    /// Whether the player still holds a target in the ring.
    pub active: bool,
}

/// The calling player's current assignment.
#[derive(Debug, Serialize, ToSchema)]
pub struct TargetView {
    pub username: String,
    /// Expiring URL serving the target's reference portrait.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// One entry of a session's elimination history.
#[derive(Debug, Serialize, ToSchema)]
pub struct EliminationView {
    pub eliminator: String,
    pub eliminated: String,
    pub happened_at: String,
}

/// Full projection of a session for its members.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub code: String,
    pub status: SessionStatusDto,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    /// Roster in join order.
    pub players: Vec<PlayerView>,
    /// Confirmed eliminations in chronological order.
    pub eliminations: Vec<EliminationView>,
    /// Present while the calling player is hunting someone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetView>,
}

impl From<(SessionRecord, Vec<EliminationRecord>, Option<TargetView>)> for SessionView {
    fn from(
        (session, eliminations, target): (SessionRecord, Vec<EliminationRecord>, Option<TargetView>),
    ) -> Self {
        let eliminations = eliminations
            .into_iter()
            .map(|event| EliminationView {
                eliminator: participant_name(&session, event.eliminator_id),
                eliminated: participant_name(&session, event.eliminated_id),
                happened_at: format_timestamp(event.happened_at),
            })
            .collect();

        Self {
            code: session.code,
            status: SessionStatus::derive(session.started_at, session.ended_at).into(),
            created_at: format_timestamp(session.created_at),
            started_at: session.started_at.map(format_timestamp),
            ended_at: session.ended_at.map(format_timestamp),
            players: session
                .participants
                .iter()
                .map(|entry| PlayerView {
                    username: entry.username.clone(),
                    active: entry.is_active(),
                })
                .collect(),
            eliminations,
            target,
        }
    }
}

/// Resolves a participant id against the roster. Eliminations only ever
/// reference roster entries, so the id fallback marks corrupt history rather
/// than a reachable path.
fn participant_name(session: &SessionRecord, participant_id: Uuid) -> String {
    session
        .participant(participant_id)
        .map(|entry| entry.username.clone())
        .unwrap_or_else(|| participant_id.to_string())
}

/// Request to move a session to a later lifecycle phase.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSessionRequest {
    pub status: SessionStatusDto,
}

/// Body for leaving a lobby.
///
/// Owners name the player to remove; everyone else omits the field and is
/// removed themselves.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LeaveRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::dao::models::ParticipantRecord;

    fn participant(username: &str, target: Option<Uuid>) -> ParticipantRecord {
        ParticipantRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            username: username.into(),
            photo: None,
            target_id: target,
        }
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionStatusDto::NotStarted).unwrap(),
            r#""not_started""#
        );
        assert_eq!(
            serde_json::to_string(&SessionStatusDto::InProgress).unwrap(),
            r#""in_progress""#
        );
        let parsed: SessionStatusDto = serde_json::from_str(r#""finished""#).unwrap();
        assert_eq!(parsed, SessionStatusDto::Finished);
    }

    #[test]
    fn view_assembles_roster_history_and_status() {
        let hunter = participant("hunter", Some(Uuid::new_v4()));
        let victim = participant("victim", None);
        let event = EliminationRecord {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            eliminator_id: hunter.id,
            eliminated_id: victim.id,
            happened_at: OffsetDateTime::UNIX_EPOCH,
        };
        let session = SessionRecord {
            id: event.session_id,
            code: "A1B2C3".into(),
            owner_id: hunter.user_id,
            created_at: OffsetDateTime::UNIX_EPOCH,
            started_at: Some(OffsetDateTime::UNIX_EPOCH),
            ended_at: None,
            version: 3,
            participants: vec![hunter, victim],
        };

        let view = SessionView::from((session, vec![event], None));

        assert_eq!(view.status, SessionStatusDto::InProgress);
        assert_eq!(view.players.len(), 2);
        assert!(view.players[0].active);
        assert!(!view.players[1].active);
        assert_eq!(view.eliminations.len(), 1);
        assert_eq!(view.eliminations[0].eliminator, "hunter");
        assert_eq!(view.eliminations[0].eliminated, "victim");
        assert_eq!(view.started_at.as_deref(), Some("1970-01-01T00:00:00Z"));
        assert!(view.ended_at.is_none());
    }

    #[test]
    fn leave_request_defaults_to_self_removal() {
        let body: LeaveRequest = serde_json::from_str("{}").unwrap();
        assert!(body.username.is_none());
    }
}
