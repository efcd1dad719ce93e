use time::OffsetDateTime;
use uuid::Uuid;

/// Registered player identity shared across layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Primary key of the user.
    pub id: Uuid,
    /// Unique display name chosen at registration.
    pub username: String,
    /// Reference into the blob store for the registration photo.
    pub photo: Option<String>,
    /// Registration timestamp.
    pub created_at: OffsetDateTime,
}

/// Membership of one user in one game session.
///
/// `username` and `photo` are denormalized from the user at load time so callers
/// get a complete roster in a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    /// Primary key of the participant row.
    pub id: Uuid,
    /// User this participant belongs to. Unique per (user, session).
    pub user_id: Uuid,
    /// Username of the backing user.
    pub username: String,
    /// Photo reference of the backing user.
    pub photo: Option<String>,
    /// Next victim in the ring. `None` before the game starts or once eliminated.
    pub target_id: Option<Uuid>,
}

impl ParticipantRecord {
    /// A participant is active while it still holds a target in the ring.
    pub fn is_active(&self) -> bool {
        self.target_id.is_some()
    }
}

/// Aggregate game session persisted by the storage layer.
///
/// The session is the unit of consistency: `version` increments on every
/// committed mutation and conditional writes are rejected when it moved
/// underneath the caller. Status is never stored; it is derived from the two
/// nullable timestamps (see `state::phase`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Primary key of the session.
    pub id: Uuid,
    /// Human-enterable join code, unique across sessions.
    pub code: String,
    /// User that created the session and moderates its lobby.
    pub owner_id: Uuid,
    /// Creation timestamp, always set.
    pub created_at: OffsetDateTime,
    /// Set once when the lobby transitions into the running game.
    pub started_at: Option<OffsetDateTime>,
    /// Set once when the game reaches its end state.
    pub ended_at: Option<OffsetDateTime>,
    /// Optimistic-concurrency counter bumped by every committed mutation.
    pub version: i64,
    /// Roster in join order.
    pub participants: Vec<ParticipantRecord>,
}

impl SessionRecord {
    /// Find a roster entry by participant id.
    pub fn participant(&self, id: Uuid) -> Option<&ParticipantRecord> {
        self.participants.iter().find(|entry| entry.id == id)
    }

    /// Find the roster entry backed by the given user, if the user joined.
    pub fn participant_for_user(&self, user_id: Uuid) -> Option<&ParticipantRecord> {
        self.participants
            .iter()
            .find(|entry| entry.user_id == user_id)
    }

    /// Find a roster entry by username (owner moderation path).
    pub fn participant_named(&self, username: &str) -> Option<&ParticipantRecord> {
        self.participants
            .iter()
            .find(|entry| entry.username == username)
    }

    /// Number of participants still holding a target.
    pub fn active_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|entry| entry.is_active())
            .count()
    }
}

/// Historical elimination event. Append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationRecord {
    /// Primary key of the event.
    pub id: Uuid,
    /// Session the elimination happened in.
    pub session_id: Uuid,
    /// Participant that performed the elimination.
    pub eliminator_id: Uuid,
    /// Participant that was eliminated.
    pub eliminated_id: Uuid,
    /// When the claim was verified.
    pub happened_at: OffsetDateTime,
}

/// One edge of a freshly built ring: `participant` hunts `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetAssignment {
    /// Hunter side of the edge.
    pub participant_id: Uuid,
    /// Victim side of the edge.
    pub target_id: Uuid,
}

/// Splice committed when a participant leaves the ring: the eliminator
/// inherits the victim's former target and the victim goes inactive
/// (`target = None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSplice {
    /// Participant whose target pointer is rewritten.
    pub eliminator_id: Uuid,
    /// Participant leaving the ring.
    pub eliminated_id: Uuid,
    /// The victim's former target, inherited by the eliminator.
    pub inherited_target_id: Uuid,
}
