//! Core tournament entities: participants, matches, results, and standings.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

use crate::lifecycle::{TournamentError, TournamentResult};

/// Participant identifier. Random; ordering is carried by seeds, never by
/// id value.
pub type ParticipantId = Uuid;

/// Match identifier. Random; ordering is carried by round and match-number
/// fields.
pub type MatchId = Uuid;

/// A tournament entrant. Seeds are 1-based and determine initial bracket
/// placement; they are reassigned contiguously whenever the roster changes
/// before start.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub seed: u32,
    #[serde(default)]
    pub non_human: bool,
}

impl Participant {
    #[must_use]
    pub fn new(name: &str, seed: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            seed,
            non_human: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum MatchStatus {
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Pending => "pending",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
        };
        write!(f, "{repr}")
    }
}

/// The recorded outcome of a match.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MatchResult {
    /// Head-to-head outcome: a single winner with an implied loser, or a
    /// tie where the winner field names either side.
    Winner {
        winner: ParticipantId,
        #[serde(default)]
        tie: bool,
    },
    /// Per-participant numeric scores; the winner is derived by comparison.
    Scores { scores: BTreeMap<ParticipantId, f64> },
    /// A full placement list for multi-participant matches. Positions must
    /// be a contiguous 1..K permutation.
    Ranking { ranking: Vec<RankedPlacement> },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RankedPlacement {
    pub participant: ParticipantId,
    pub position: u32,
}

/// A single match. Matches carry 0, 1, or N participants; fewer than 2
/// means the match is not playable (an unfilled slot or a bye).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Match {
    pub id: MatchId,
    pub status: MatchStatus,
    pub participants: Vec<ParticipantId>,
    pub round: Option<u32>,
    pub match_number: Option<u32>,
    pub result: Option<MatchResult>,
}

impl Match {
    #[must_use]
    pub fn new(round: Option<u32>, match_number: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: MatchStatus::Pending,
            participants: Vec::new(),
            round,
            match_number,
            result: None,
        }
    }

    #[must_use]
    pub fn with_participants(mut self, participants: Vec<ParticipantId>) -> Self {
        self.participants = participants;
        self
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    /// A match is playable when it has at least 2 participants and has not
    /// been completed.
    #[must_use]
    pub fn is_playable(&self) -> bool {
        !self.is_completed() && self.participants.len() >= 2
    }

    #[must_use]
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains(&id)
    }

    /// The other participant of a two-participant match.
    #[must_use]
    pub fn opponent_of(&self, id: ParticipantId) -> Option<ParticipantId> {
        if self.participants.len() != 2 || !self.contains(id) {
            return None;
        }
        self.participants.iter().copied().find(|p| *p != id)
    }

    /// Record a result. A match completes exactly once; re-completing is an
    /// error.
    pub(crate) fn complete(&mut self, result: MatchResult) -> TournamentResult<()> {
        if self.is_completed() {
            return Err(TournamentError::MatchAlreadyCompleted);
        }
        self.status = MatchStatus::Completed;
        self.result = Some(result);
        Ok(())
    }

    /// Winner and loser of a completed head-to-head match; `None` for ties,
    /// byes, and unfinished matches.
    #[must_use]
    pub fn decided_outcome(&self) -> Option<(ParticipantId, ParticipantId)> {
        match &self.result {
            Some(MatchResult::Winner { winner, tie }) if !tie => {
                let loser = self.opponent_of(*winner)?;
                Some((*winner, loser))
            }
            _ => None,
        }
    }
}

/// Validate that a ranking covers every match participant exactly once and
/// that its positions form a contiguous 1..K permutation.
pub(crate) fn validate_ranking(m: &Match, ranking: &[RankedPlacement]) -> TournamentResult<()> {
    if ranking.len() != m.participants.len() {
        return Err(TournamentError::RankingSizeMismatch {
            expected: m.participants.len(),
            actual: ranking.len(),
        });
    }
    let mut seen = HashSet::with_capacity(ranking.len());
    for placement in ranking {
        if !m.contains(placement.participant) {
            return Err(TournamentError::NotInMatch(placement.participant));
        }
        if !seen.insert(placement.participant) {
            return Err(TournamentError::RankingDuplicate(placement.participant));
        }
    }
    let mut positions: Vec<u32> = ranking.iter().map(|p| p.position).collect();
    positions.sort_unstable();
    for (i, position) in positions.iter().enumerate() {
        if *position != i as u32 + 1 {
            return Err(TournamentError::RankingNotContiguous(ranking.len()));
        }
    }
    Ok(())
}

/// A computed per-participant summary. Standings are derived on demand from
/// the match history and never persisted.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Standing {
    pub participant: ParticipantId,
    pub name: String,
    /// 1-based rank; 0 means unranked.
    pub rank: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub matches_played: u32,
    pub points: Option<f64>,
    pub games_won: Option<f64>,
    pub games_lost: Option<f64>,
    pub eliminated: Option<bool>,
}

impl Standing {
    #[must_use]
    pub fn new(participant: &Participant) -> Self {
        Self {
            participant: participant.id,
            name: participant.name.clone(),
            rank: 0,
            wins: 0,
            losses: 0,
            ties: 0,
            matches_played: 0,
            points: None,
            games_won: None,
            games_lost: None,
            eliminated: None,
        }
    }
}
