//! Single elimination: one loss and you are out.
//!
//! The bracket is a flat array of `2^ceil(log2 N) - 1` matches. Byes skip
//! round 1 entirely: the top seeds are injected straight into round-2
//! matches, two per match in seed order, while the remaining participants
//! fold-pair into the trailing round-1 slots so that their winners feed the
//! open round-2 seats. Winner advancement is pure index arithmetic over the
//! flat array.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::entities::{Match, MatchId, MatchResult, Participant, ParticipantId, Standing};
use crate::lifecycle::{TournamentBase, TournamentError, TournamentResult};
use crate::options::{SingleEliminationOptions, TournamentKind};

use super::{TournamentFormat, ceil_log2};

/// Build a flat elimination bracket over a seed-ordered field.
///
/// Also used for the winners bracket of double elimination.
pub(crate) fn build_bracket(seeded: &[Participant]) -> Vec<Match> {
    let n = seeded.len();
    let rounds = ceil_log2(n);
    let bracket_size = 1usize << rounds;
    let byes = bracket_size - n;
    let total = bracket_size - 1;

    let mut matches: Vec<Match> = (0..total)
        .map(|i| Match::new(Some(round_of_index(i, bracket_size)), Some(i as u32 + 1)))
        .collect();

    // The playing participants fold-pair (first vs last) into the trailing
    // round-1 slots; the leading slots correspond to the bye positions and
    // stay empty.
    let playing = &seeded[byes..];
    let pairs = playing.len() / 2;
    for k in 0..pairs {
        matches[byes + k].participants = vec![playing[k].id, playing[playing.len() - 1 - k].id];
    }

    // Byes go straight into round 2, two per match, in seed order.
    let round_two_start = bracket_size / 2;
    for (j, bye) in seeded[..byes].iter().enumerate() {
        matches[round_two_start + j / 2].participants.push(bye.id);
    }

    matches
}

/// Round number of a flat bracket index, 1-based.
fn round_of_index(mut index: usize, bracket_size: usize) -> u32 {
    let mut round = 1;
    let mut size = bracket_size / 2;
    while index >= size {
        index -= size;
        size /= 2;
        round += 1;
    }
    round
}

/// Flat index of the match the winner of `index` advances into.
pub(crate) fn advancement_index(index: usize, total: usize) -> usize {
    total - (total - index) / 2
}

/// Validate a head-to-head elimination result: an explicit, tie-free winner
/// drawn from a playable match. Returns the winner and the implied loser.
pub(crate) fn require_winner(
    m: &Match,
    result: &MatchResult,
) -> TournamentResult<(ParticipantId, ParticipantId)> {
    if m.is_completed() {
        return Err(TournamentError::MatchAlreadyCompleted);
    }
    if m.participants.len() < 2 {
        return Err(TournamentError::MatchNotPlayable);
    }
    let MatchResult::Winner { winner, tie } = result else {
        return Err(TournamentError::WinnerRequired);
    };
    if *tie {
        return Err(TournamentError::TieNotAllowed);
    }
    if !m.contains(*winner) {
        return Err(TournamentError::NotInMatch(*winner));
    }
    let loser = m
        .opponent_of(*winner)
        .ok_or(TournamentError::MatchNotPlayable)?;
    Ok((*winner, loser))
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SingleEliminationTournament {
    #[serde(flatten)]
    base: TournamentBase,
    options: SingleEliminationOptions,
    matches: Vec<Match>,
    third_place: Option<Match>,
}

impl SingleEliminationTournament {
    #[must_use]
    pub(crate) fn new(base: TournamentBase, options: SingleEliminationOptions) -> Self {
        Self {
            base,
            options,
            matches: Vec::new(),
            third_place: None,
        }
    }

    fn generate(&mut self) {
        self.matches = build_bracket(&self.base.participants_by_seed());
        self.third_place = None;
    }

    /// Once both semifinals are decided, the 3rd-place match is built from
    /// their losers. Never applicable below 4 playable entrants.
    fn maybe_build_third_place(&mut self) {
        if !self.options.third_place_match || self.third_place.is_some() {
            return;
        }
        let total = self.matches.len();
        if total < 3 {
            return;
        }
        let losers: Vec<ParticipantId> = [&self.matches[total - 3], &self.matches[total - 2]]
            .iter()
            .filter_map(|m| m.decided_outcome().map(|(_, loser)| loser))
            .collect();
        if losers.len() == 2 {
            let round = self.matches[total - 1].round;
            self.third_place =
                Some(Match::new(round, Some(total as u32 + 1)).with_participants(losers));
            debug!("third-place match created");
        }
    }

    fn update_completion(&mut self) {
        let final_done = self.matches.last().is_some_and(Match::is_completed);
        let third_done = self.third_place.as_ref().is_none_or(Match::is_completed);
        if final_done && third_done && !self.base.completed {
            self.base.completed = true;
            info!("single elimination bracket complete");
        }
    }
}

impl TournamentFormat for SingleEliminationTournament {
    fn kind(&self) -> TournamentKind {
        TournamentKind::SingleElimination
    }

    fn base(&self) -> &TournamentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TournamentBase {
        &mut self.base
    }

    fn start(&mut self) -> TournamentResult<()> {
        self.base.ensure_startable(2)?;
        self.generate();
        self.base.started = true;
        self.base.touch();
        info!(
            "started single elimination with {} participants, {} matches",
            self.base.participants.len(),
            self.matches.len()
        );
        Ok(())
    }

    fn record_match_result(
        &mut self,
        match_id: MatchId,
        result: MatchResult,
    ) -> TournamentResult<()> {
        self.base.ensure_recordable()?;

        if self.third_place.as_ref().is_some_and(|m| m.id == match_id) {
            if let Some(third) = self.third_place.as_mut() {
                require_winner(third, &result)?;
                third.complete(result)?;
            }
            self.update_completion();
            self.base.touch();
            return Ok(());
        }

        let index = self
            .matches
            .iter()
            .position(|m| m.id == match_id)
            .ok_or(TournamentError::UnknownMatch(match_id))?;
        let (winner, _loser) = require_winner(&self.matches[index], &result)?;
        self.matches[index].complete(result)?;

        let total = self.matches.len();
        if index + 1 < total {
            let target = advancement_index(index, total);
            self.matches[target].participants.push(winner);
        }
        self.maybe_build_third_place();
        self.update_completion();
        self.base.touch();
        Ok(())
    }

    fn current_matches(&self) -> Vec<Match> {
        let mut current: Vec<Match> = self
            .matches
            .iter()
            .filter(|m| m.is_playable())
            .cloned()
            .collect();
        if let Some(third) = self.third_place.as_ref().filter(|m| m.is_playable()) {
            current.push(third.clone());
        }
        current
    }

    fn all_matches(&self) -> Vec<Match> {
        self.matches
            .iter()
            .chain(self.third_place.iter())
            .cloned()
            .collect()
    }

    fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> =
            self.base.participants.iter().map(Standing::new).collect();
        let index_of: HashMap<ParticipantId, usize> = standings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.participant, i))
            .collect();

        for m in self.matches.iter().chain(self.third_place.iter()) {
            if let Some((winner, loser)) = m.decided_outcome() {
                if let Some(&i) = index_of.get(&winner) {
                    standings[i].wins += 1;
                    standings[i].matches_played += 1;
                }
                if let Some(&i) = index_of.get(&loser) {
                    standings[i].losses += 1;
                    standings[i].matches_played += 1;
                }
            }
        }
        for s in &mut standings {
            s.eliminated = Some(s.losses > 0);
        }

        if let Some(finals) = self.matches.last() {
            if let Some((winner, loser)) = finals.decided_outcome() {
                if let Some(&i) = index_of.get(&winner) {
                    standings[i].rank = 1;
                }
                if let Some(&i) = index_of.get(&loser) {
                    standings[i].rank = 2;
                }
            }
        }
        if let Some(third) = &self.third_place {
            if let Some((winner, loser)) = third.decided_outcome() {
                if let Some(&i) = index_of.get(&winner) {
                    standings[i].rank = 3;
                }
                if let Some(&i) = index_of.get(&loser) {
                    standings[i].rank = 4;
                }
            }
        }

        standings.sort_by(|a, b| match (a.rank, b.rank) {
            (0, 0) => b.wins.cmp(&a.wins).then_with(|| a.name.cmp(&b.name)),
            (0, _) => Ordering::Greater,
            (_, 0) => Ordering::Less,
            (ra, rb) => ra.cmp(&rb),
        });
        standings
    }

    fn reset(&mut self) -> TournamentResult<()> {
        self.base.ensure_started()?;
        self.generate();
        self.base.completed = false;
        self.base.touch();
        info!("single elimination bracket reset");
        Ok(())
    }

    fn rehydrate(&mut self) -> TournamentResult<()> {
        // No derived bookkeeping beyond the matches themselves.
        Ok(())
    }
}
