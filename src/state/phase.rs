//! Session lifecycle phases.
//!
//! Status is never stored. It is derived from the two lifecycle timestamps,
//! and the only legal moves are forward: not started, in progress, finished.

use std::fmt;

use thiserror::Error;
use time::OffsetDateTime;

/// High-level phases a game session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Roster is open; the ring has not been built yet.
    NotStarted,
    /// The ring is live and eliminations are being recorded.
    InProgress,
    /// The session is over, either by a winner or by the owner closing it.
    Finished,
}

impl SessionStatus {
    /// Derive the phase from the lifecycle timestamps. An end timestamp wins
    /// over everything else.
    pub fn derive(
        started_at: Option<OffsetDateTime>,
        ended_at: Option<OffsetDateTime>,
    ) -> Self {
        match (started_at, ended_at) {
            (_, Some(_)) => SessionStatus::Finished,
            (Some(_), None) => SessionStatus::InProgress,
            (None, None) => SessionStatus::NotStarted,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// Events that can be applied to a session's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Owner locks the roster and launches the hunt.
    Start,
    /// Owner closes the session early, or a winner emerges.
    Finish,
}

/// Error returned when attempting an invalid lifecycle move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from}")]
pub struct InvalidTransition {
    /// The phase the session was in when the invalid event was received.
    pub from: SessionStatus,
    /// The event that cannot be applied from this phase.
    pub event: LifecycleEvent,
}

/// Compute the phase an event leads to, if the event is valid right now.
pub fn plan_transition(
    from: SessionStatus,
    event: LifecycleEvent,
) -> Result<SessionStatus, InvalidTransition> {
    match (from, event) {
        (SessionStatus::NotStarted, LifecycleEvent::Start) => Ok(SessionStatus::InProgress),
        (SessionStatus::InProgress, LifecycleEvent::Finish) => Ok(SessionStatus::Finished),
        (from, event) => Err(InvalidTransition { from, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    #[test]
    fn status_derivation_follows_timestamps() {
        assert_eq!(SessionStatus::derive(None, None), SessionStatus::NotStarted);
        assert_eq!(
            SessionStatus::derive(Some(now()), None),
            SessionStatus::InProgress
        );
        assert_eq!(
            SessionStatus::derive(Some(now()), Some(now())),
            SessionStatus::Finished
        );
        // A lone end timestamp still reads as finished.
        assert_eq!(
            SessionStatus::derive(None, Some(now())),
            SessionStatus::Finished
        );
    }

    #[test]
    fn happy_path_is_start_then_finish() {
        let started = plan_transition(SessionStatus::NotStarted, LifecycleEvent::Start).unwrap();
        assert_eq!(started, SessionStatus::InProgress);
        let finished = plan_transition(started, LifecycleEvent::Finish).unwrap();
        assert_eq!(finished, SessionStatus::Finished);
    }

    #[test]
    fn phases_never_move_backwards() {
        let err = plan_transition(SessionStatus::InProgress, LifecycleEvent::Start).unwrap_err();
        assert_eq!(err.from, SessionStatus::InProgress);
        assert_eq!(err.event, LifecycleEvent::Start);

        assert!(plan_transition(SessionStatus::Finished, LifecycleEvent::Start).is_err());
        assert!(plan_transition(SessionStatus::Finished, LifecycleEvent::Finish).is_err());
    }

    #[test]
    fn finish_requires_a_running_session() {
        let err = plan_transition(SessionStatus::NotStarted, LifecycleEvent::Finish).unwrap_err();
        assert_eq!(err.from, SessionStatus::NotStarted);
    }
}
