//! Shared tournament lifecycle: errors, roster management, and the common
//! state flags every format carries.
//!
//! A tournament moves through three states: not-started (roster mutable, no
//! matches), started (roster frozen, matches generated), and completed
//! (terminal). [`TournamentBase`] holds the state common to every format;
//! the format engines embed it and keep their structural state next to it.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{MatchId, Participant, ParticipantId};

/// Errors raised by tournament operations.
///
/// All failures are synchronous and carry a user-presentable message;
/// callers are expected to surface the message and let the user correct
/// their input.
#[derive(Debug, Error)]
pub enum TournamentError {
    // Lifecycle violations
    #[error("tournament already started")]
    AlreadyStarted,
    #[error("tournament has not started")]
    NotStarted,
    #[error("tournament already completed")]
    AlreadyCompleted,
    #[error("match already completed")]
    MatchAlreadyCompleted,
    #[error("match is not ready to play")]
    MatchNotPlayable,

    // Validation failures
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("participant name must not be empty")]
    EmptyName,
    #[error("participant name already taken: {0}")]
    DuplicateName(String),
    #[error("need at least {needed} participants, have {current}")]
    NotEnoughParticipants { needed: usize, current: usize },

    // Result-shape failures
    #[error("this match requires an explicit winner")]
    WinnerRequired,
    #[error("ties are not allowed in this match")]
    TieNotAllowed,
    #[error("this match requires per-participant scores")]
    ScoresRequired,
    #[error("this match requires a full ranking")]
    RankingRequired,
    #[error("ranking must cover {expected} participants, got {actual}")]
    RankingSizeMismatch { expected: usize, actual: usize },
    #[error("ranking positions must form a contiguous run from 1 to {0}")]
    RankingNotContiguous(usize),
    #[error("ranking lists participant {0} more than once")]
    RankingDuplicate(ParticipantId),
    #[error("participant {0} is not part of this match")]
    NotInMatch(ParticipantId),

    // Referential failures
    #[error("unknown match: {0}")]
    UnknownMatch(MatchId),
    #[error("unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type TournamentResult<T> = Result<T, TournamentError>;

/// State common to every tournament format: identity, timestamps, lifecycle
/// flags, and the participant roster.
///
/// The roster is mutable only before `started` flips; seeds are kept
/// contiguous from 1 across every roster change.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TournamentBase {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started: bool,
    pub completed: bool,
    pub participants: Vec<Participant>,
}

impl TournamentBase {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            started: false,
            completed: false,
            participants: Vec::new(),
        }
    }

    /// Bump the updated-at timestamp. Called on every mutation.
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.touch();
    }

    /// Add a participant to the roster. Only allowed before start; the new
    /// participant receives the next free seed.
    pub fn add_participant(&mut self, name: &str) -> TournamentResult<ParticipantId> {
        self.ensure_not_started()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(TournamentError::EmptyName);
        }
        if self.participants.iter().any(|p| p.name == name) {
            return Err(TournamentError::DuplicateName(name.to_string()));
        }
        let seed = self.participants.len() as u32 + 1;
        let participant = Participant::new(name, seed);
        let id = participant.id;
        self.participants.push(participant);
        self.touch();
        Ok(id)
    }

    /// Remove a participant from the roster. Only allowed before start;
    /// remaining seeds are renumbered contiguously from 1.
    pub fn remove_participant(&mut self, id: ParticipantId) -> TournamentResult<()> {
        self.ensure_not_started()?;
        let index = self
            .participants
            .iter()
            .position(|p| p.id == id)
            .ok_or(TournamentError::UnknownParticipant(id))?;
        self.participants.remove(index);
        self.renumber_seeds();
        self.touch();
        Ok(())
    }

    /// Flag a roster entry as a non-human (stand-in or bot) participant.
    /// Only allowed before start.
    pub fn set_non_human(&mut self, id: ParticipantId, non_human: bool) -> TournamentResult<()> {
        self.ensure_not_started()?;
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(TournamentError::UnknownParticipant(id))?;
        participant.non_human = non_human;
        self.touch();
        Ok(())
    }

    /// Randomly reorder the roster and renumber seeds. Only allowed before
    /// start.
    pub fn shuffle_seeds(&mut self) -> TournamentResult<()> {
        self.ensure_not_started()?;
        self.participants.shuffle(&mut rand::rng());
        self.renumber_seeds();
        self.touch();
        Ok(())
    }

    fn renumber_seeds(&mut self) {
        for (i, p) in self.participants.iter_mut().enumerate() {
            p.seed = i as u32 + 1;
        }
    }

    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Display name for a participant id; empty if the id is unknown.
    #[must_use]
    pub fn participant_name(&self, id: ParticipantId) -> String {
        self.participant(id)
            .map(|p| p.name.clone())
            .unwrap_or_default()
    }

    /// Roster sorted by seed ascending.
    #[must_use]
    pub fn participants_by_seed(&self) -> Vec<Participant> {
        let mut seeded = self.participants.clone();
        seeded.sort_by_key(|p| p.seed);
        seeded
    }

    pub(crate) fn ensure_not_started(&self) -> TournamentResult<()> {
        if self.started {
            return Err(TournamentError::AlreadyStarted);
        }
        Ok(())
    }

    pub(crate) fn ensure_started(&self) -> TournamentResult<()> {
        if !self.started {
            return Err(TournamentError::NotStarted);
        }
        Ok(())
    }

    /// Start precondition: not already started, and at least `minimum`
    /// participants on the roster.
    pub(crate) fn ensure_startable(&self, minimum: usize) -> TournamentResult<()> {
        self.ensure_not_started()?;
        if self.participants.len() < minimum {
            return Err(TournamentError::NotEnoughParticipants {
                needed: minimum,
                current: self.participants.len(),
            });
        }
        Ok(())
    }

    /// Result recording precondition: started and not yet completed.
    pub(crate) fn ensure_recordable(&self) -> TournamentResult<()> {
        self.ensure_started()?;
        if self.completed {
            return Err(TournamentError::AlreadyCompleted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_with(names: &[&str]) -> TournamentBase {
        let mut base = TournamentBase::new("test");
        for name in names {
            base.add_participant(name).unwrap();
        }
        base
    }

    #[test]
    fn test_add_participant_assigns_sequential_seeds() {
        let base = base_with(&["alice", "bob", "carol"]);
        let seeds: Vec<u32> = base.participants.iter().map(|p| p.seed).collect();
        assert_eq!(seeds, vec![1, 2, 3]);
    }

    #[test]
    fn test_add_participant_rejects_duplicates_and_empty_names() {
        let mut base = base_with(&["alice"]);
        assert!(matches!(
            base.add_participant("alice"),
            Err(TournamentError::DuplicateName(_))
        ));
        assert!(matches!(
            base.add_participant("   "),
            Err(TournamentError::EmptyName)
        ));
    }

    #[test]
    fn test_remove_participant_renumbers_seeds() {
        let mut base = base_with(&["alice", "bob", "carol"]);
        let bob = base.participants[1].id;
        base.remove_participant(bob).unwrap();
        let seeds: Vec<u32> = base.participants.iter().map(|p| p.seed).collect();
        assert_eq!(seeds, vec![1, 2]);
        assert_eq!(base.participants[1].name, "carol");
    }

    #[test]
    fn test_roster_frozen_after_start() {
        let mut base = base_with(&["alice", "bob"]);
        base.started = true;
        assert!(matches!(
            base.add_participant("carol"),
            Err(TournamentError::AlreadyStarted)
        ));
        let alice = base.participants[0].id;
        assert!(matches!(
            base.remove_participant(alice),
            Err(TournamentError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_non_human_flag_only_changes_before_start() {
        let mut base = base_with(&["alice", "cpu"]);
        let cpu = base.participants[1].id;
        base.set_non_human(cpu, true).unwrap();
        assert!(base.participants[1].non_human);

        base.started = true;
        assert!(matches!(
            base.set_non_human(cpu, false),
            Err(TournamentError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_shuffle_keeps_seeds_contiguous() {
        let mut base = base_with(&["a", "b", "c", "d", "e"]);
        base.shuffle_seeds().unwrap();
        let mut seeds: Vec<u32> = base.participants.iter().map(|p| p.seed).collect();
        seeds.sort_unstable();
        assert_eq!(seeds, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_ensure_startable_needs_minimum() {
        let base = base_with(&["alice"]);
        assert!(matches!(
            base.ensure_startable(2),
            Err(TournamentError::NotEnoughParticipants {
                needed: 2,
                current: 1
            })
        ));
    }
}
