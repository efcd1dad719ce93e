//! The target ring.
//!
//! While a session runs, every active participant hunts exactly one other and
//! is hunted by exactly one other: a single directed cycle. Eliminations
//! splice the victim out by handing their target to the eliminator. When the
//! victim's target already was the eliminator, only one hunter remains and
//! the session has its winner.

use std::collections::{HashMap, HashSet};

use rand::{rng, seq::SliceRandom};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{ParticipantRecord, TargetAssignment, TargetSplice};

/// A cycle needs two members to avoid self-hunting.
pub const MIN_RING_SIZE: usize = 2;

/// Failures while building or inspecting a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// Not enough participants to close a cycle.
    #[error("need at least {MIN_RING_SIZE} participants to build a ring, have {have}")]
    TooSmall { have: usize },
    /// An active participant has no live target edge.
    #[error("participant {participant} has no live target")]
    DetachedParticipant { participant: Uuid },
    /// The target edges do not form one cycle over all participants.
    #[error("targets do not form a single cycle")]
    BrokenCycle,
}

/// Outcome of planning the removal of a victim from the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceOutcome {
    /// The victim was the last other hunter standing.
    Winner,
    /// The ring stays live with the given rewiring.
    Continue(TargetSplice),
}

/// Shuffle the participants and link them into one cycle.
pub fn build_ring(mut participant_ids: Vec<Uuid>) -> Result<Vec<TargetAssignment>, RingError> {
    if participant_ids.len() < MIN_RING_SIZE {
        return Err(RingError::TooSmall {
            have: participant_ids.len(),
        });
    }

    participant_ids.shuffle(&mut rng());

    let assignments = participant_ids
        .iter()
        .enumerate()
        .map(|(index, &participant_id)| TargetAssignment {
            participant_id,
            target_id: participant_ids[(index + 1) % participant_ids.len()],
        })
        .collect();
    Ok(assignments)
}

/// Check that the assignments form exactly one cycle visiting every member.
pub fn audit_cycle(assignments: &[TargetAssignment]) -> Result<(), RingError> {
    let Some(first) = assignments.first() else {
        return Err(RingError::TooSmall { have: 0 });
    };
    if assignments.len() < MIN_RING_SIZE {
        return Err(RingError::TooSmall {
            have: assignments.len(),
        });
    }

    let edges: HashMap<Uuid, Uuid> = assignments
        .iter()
        .map(|edge| (edge.participant_id, edge.target_id))
        .collect();
    if edges.len() != assignments.len() {
        return Err(RingError::BrokenCycle);
    }

    let mut visited = HashSet::with_capacity(edges.len());
    let mut cursor = first.participant_id;
    for _ in 0..edges.len() {
        if !visited.insert(cursor) {
            return Err(RingError::BrokenCycle);
        }
        cursor = *edges
            .get(&cursor)
            .ok_or(RingError::DetachedParticipant { participant: cursor })?;
    }

    if cursor == first.participant_id {
        Ok(())
    } else {
        Err(RingError::BrokenCycle)
    }
}

/// Plan the rewiring for an eliminator taking out their current target.
///
/// The caller has already established that `victim` is the eliminator's
/// target and that both are active.
pub fn plan_splice(
    eliminator: &ParticipantRecord,
    victim: &ParticipantRecord,
) -> Result<SpliceOutcome, RingError> {
    let inherited = victim
        .target_id
        .ok_or(RingError::DetachedParticipant {
            participant: victim.id,
        })?;

    if inherited == eliminator.id {
        return Ok(SpliceOutcome::Winner);
    }

    Ok(SpliceOutcome::Continue(TargetSplice {
        eliminator_id: eliminator.id,
        eliminated_id: victim.id,
        inherited_target_id: inherited,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: Uuid, target_id: Option<Uuid>) -> ParticipantRecord {
        ParticipantRecord {
            id,
            user_id: Uuid::new_v4(),
            username: String::new(),
            photo: None,
            target_id,
        }
    }

    #[test]
    fn ring_links_everyone_exactly_once() {
        for size in 2..=6 {
            let ids: Vec<Uuid> = (0..size).map(|_| Uuid::new_v4()).collect();
            let assignments = build_ring(ids.clone()).unwrap();

            assert_eq!(assignments.len(), size);
            audit_cycle(&assignments).unwrap();

            let sources: HashSet<Uuid> =
                assignments.iter().map(|edge| edge.participant_id).collect();
            let targets: HashSet<Uuid> = assignments.iter().map(|edge| edge.target_id).collect();
            assert_eq!(sources, ids.iter().copied().collect());
            assert_eq!(targets, ids.iter().copied().collect());
            assert!(
                assignments
                    .iter()
                    .all(|edge| edge.participant_id != edge.target_id)
            );
        }
    }

    #[test]
    fn ring_needs_two_members() {
        assert_eq!(build_ring(Vec::new()).unwrap_err(), RingError::TooSmall { have: 0 });
        assert_eq!(
            build_ring(vec![Uuid::new_v4()]).unwrap_err(),
            RingError::TooSmall { have: 1 }
        );
    }

    #[test]
    fn audit_rejects_split_cycles() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let two_islands = vec![
            TargetAssignment { participant_id: a, target_id: b },
            TargetAssignment { participant_id: b, target_id: a },
            TargetAssignment { participant_id: c, target_id: d },
            TargetAssignment { participant_id: d, target_id: c },
        ];
        assert_eq!(audit_cycle(&two_islands).unwrap_err(), RingError::BrokenCycle);
    }

    #[test]
    fn audit_rejects_self_hunters() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let selfish = vec![
            TargetAssignment { participant_id: a, target_id: a },
            TargetAssignment { participant_id: b, target_id: b },
        ];
        assert_eq!(audit_cycle(&selfish).unwrap_err(), RingError::BrokenCycle);
    }

    #[test]
    fn splice_hands_the_victim_target_to_the_eliminator() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let eliminator = participant(a, Some(b));
        let victim = participant(b, Some(c));

        let outcome = plan_splice(&eliminator, &victim).unwrap();
        assert_eq!(
            outcome,
            SpliceOutcome::Continue(TargetSplice {
                eliminator_id: a,
                eliminated_id: b,
                inherited_target_id: c,
            })
        );
    }

    #[test]
    fn two_member_ring_collapses_to_a_winner() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let eliminator = participant(a, Some(b));
        let victim = participant(b, Some(a));

        assert_eq!(plan_splice(&eliminator, &victim).unwrap(), SpliceOutcome::Winner);
    }

    #[test]
    fn splicing_a_detached_victim_is_refused() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let eliminator = participant(a, Some(b));
        let victim = participant(b, None);

        assert_eq!(
            plan_splice(&eliminator, &victim).unwrap_err(),
            RingError::DetachedParticipant { participant: b }
        );
    }
}
