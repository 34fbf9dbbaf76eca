//! Free-for-all: multi-participant heats that shrink round by round.
//!
//! Each round splits the surviving field into fixed-size groups. Finishers
//! above the advancement threshold move on; everyone else is eliminated.
//! Rounds keep shrinking until the survivors fit a single final match, or
//! until fewer than two remain.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::entities::{
    Match, MatchId, MatchResult, MatchStatus, ParticipantId, RankedPlacement, Standing,
    validate_ranking,
};
use crate::lifecycle::{TournamentBase, TournamentError, TournamentResult};
use crate::options::{FreeForAllOptions, TournamentKind};

use super::{TournamentFormat, assign_shared_ranks};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FreeForAllTournament {
    #[serde(flatten)]
    base: TournamentBase,
    options: FreeForAllOptions,
    rounds: Vec<Vec<Match>>,
    current_round: u32,
    eliminated: HashSet<ParticipantId>,
}

impl FreeForAllTournament {
    #[must_use]
    pub(crate) fn new(base: TournamentBase, options: FreeForAllOptions) -> Self {
        Self {
            base,
            options,
            rounds: Vec::new(),
            current_round: 0,
            eliminated: HashSet::new(),
        }
    }

    fn match_count(&self) -> usize {
        self.rounds.iter().map(Vec::len).sum()
    }

    fn generate_round(&mut self, ids: &[ParticipantId], round: u32) {
        let group = self.options.participants_per_match as usize;
        let mut number = self.match_count() as u32 + 1;
        let mut matches = Vec::new();
        for chunk in ids.chunks(group) {
            let mut m = Match::new(Some(round), Some(number)).with_participants(chunk.to_vec());
            number += 1;
            if chunk.len() == 1 {
                // lone leftover: automatic bye, pre-completed with rank 1
                m.status = MatchStatus::Completed;
                m.result = Some(MatchResult::Ranking {
                    ranking: vec![RankedPlacement {
                        participant: chunk[0],
                        position: 1,
                    }],
                });
                debug!("free-for-all bye in round {round}");
            }
            matches.push(m);
        }
        self.rounds.push(matches);
        self.current_round = round;
    }

    fn locate(&self, match_id: MatchId) -> Option<(usize, usize)> {
        for (ri, round) in self.rounds.iter().enumerate() {
            if let Some(mi) = round.iter().position(|m| m.id == match_id) {
                return Some((ri, mi));
            }
        }
        None
    }

    /// Advancing ids of a fully recorded round, in match order then
    /// placement order.
    fn round_advancers(&self, round_index: usize) -> Vec<ParticipantId> {
        let threshold = self.options.advance_count;
        let mut advancers = Vec::new();
        for m in &self.rounds[round_index] {
            if let Some(MatchResult::Ranking { ranking }) = &m.result {
                let mut placed: Vec<&RankedPlacement> = ranking.iter().collect();
                placed.sort_by_key(|p| p.position);
                advancers.extend(
                    placed
                        .into_iter()
                        .filter(|p| p.position <= threshold)
                        .map(|p| p.participant),
                );
            }
        }
        advancers
    }

    fn after_round_completed(&mut self) {
        let round_index = self.current_round as usize - 1;
        let done = self.rounds[round_index].iter().all(Match::is_completed);
        if !done {
            return;
        }
        if self.rounds[round_index].len() == 1 {
            // the final match has been played
            self.base.completed = true;
            info!("free-for-all complete");
            return;
        }
        let advancers = self.round_advancers(round_index);
        if advancers.len() < 2 {
            self.base.completed = true;
            info!("free-for-all complete");
            return;
        }
        debug!(
            "free-for-all round {} advances {} participants",
            self.current_round,
            advancers.len()
        );
        self.generate_round(&advancers, self.current_round + 1);
    }
}

impl TournamentFormat for FreeForAllTournament {
    fn kind(&self) -> TournamentKind {
        TournamentKind::FreeForAll
    }

    fn base(&self) -> &TournamentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TournamentBase {
        &mut self.base
    }

    fn start(&mut self) -> TournamentResult<()> {
        self.base
            .ensure_startable(self.options.participants_per_match as usize)?;
        self.rounds.clear();
        self.eliminated.clear();
        let ids: Vec<ParticipantId> = self
            .base
            .participants_by_seed()
            .iter()
            .map(|p| p.id)
            .collect();
        self.generate_round(&ids, 1);
        self.base.started = true;
        self.base.touch();
        info!(
            "started free-for-all with {} participants in groups of {}",
            ids.len(),
            self.options.participants_per_match
        );
        Ok(())
    }

    fn record_match_result(
        &mut self,
        match_id: MatchId,
        result: MatchResult,
    ) -> TournamentResult<()> {
        self.base.ensure_recordable()?;
        let (ri, mi) = self
            .locate(match_id)
            .ok_or(TournamentError::UnknownMatch(match_id))?;
        {
            let m = &self.rounds[ri][mi];
            if m.is_completed() {
                return Err(TournamentError::MatchAlreadyCompleted);
            }
            let MatchResult::Ranking { ranking } = &result else {
                return Err(TournamentError::RankingRequired);
            };
            validate_ranking(m, ranking)?;
        }
        self.rounds[ri][mi].complete(result)?;

        // everyone ranked below the advancement threshold is out
        let threshold = self.options.advance_count;
        if let Some(MatchResult::Ranking { ranking }) = &self.rounds[ri][mi].result {
            let out: Vec<ParticipantId> = ranking
                .iter()
                .filter(|p| p.position > threshold)
                .map(|p| p.participant)
                .collect();
            self.eliminated.extend(out);
        }

        self.after_round_completed();
        self.base.touch();
        Ok(())
    }

    fn current_matches(&self) -> Vec<Match> {
        self.rounds
            .iter()
            .flatten()
            .filter(|m| m.is_playable())
            .cloned()
            .collect()
    }

    fn all_matches(&self) -> Vec<Match> {
        self.rounds.iter().flatten().cloned().collect()
    }

    fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> =
            self.base.participants.iter().map(Standing::new).collect();
        let index_of: HashMap<ParticipantId, usize> = standings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.participant, i))
            .collect();
        if self.options.points.is_some() {
            for s in &mut standings {
                s.points = Some(0.0);
            }
        }

        for m in self.rounds.iter().flatten().filter(|m| m.is_completed()) {
            if let Some(MatchResult::Ranking { ranking }) = &m.result {
                let field = ranking.len() as u32;
                for placement in ranking {
                    let Some(&i) = index_of.get(&placement.participant) else {
                        continue;
                    };
                    standings[i].matches_played += 1;
                    if placement.position == 1 {
                        standings[i].wins += 1;
                    }
                    if field > 1 && placement.position == field {
                        standings[i].losses += 1;
                    }
                    if let Some(system) = &self.options.points {
                        *standings[i].points.get_or_insert(0.0) += system
                            .points_for_placement(placement.position as usize, field as usize);
                    }
                }
            }
        }
        for s in &mut standings {
            s.eliminated = Some(self.eliminated.contains(&s.participant));
        }

        // The champion won through to the final round's single match;
        // everyone else sorts by wins, then rounds survived, then name.
        let champion = if self.base.completed {
            self.rounds.last().filter(|round| round.len() == 1).and_then(|round| {
                match &round[0].result {
                    Some(MatchResult::Ranking { ranking }) => ranking
                        .iter()
                        .find(|p| p.position == 1)
                        .map(|p| p.participant),
                    _ => None,
                }
            })
        } else {
            None
        };

        standings.sort_by(|a, b| {
            let a_champion = Some(a.participant) == champion;
            let b_champion = Some(b.participant) == champion;
            b_champion
                .cmp(&a_champion)
                .then_with(|| b.wins.cmp(&a.wins))
                .then_with(|| b.matches_played.cmp(&a.matches_played))
                .then_with(|| a.name.cmp(&b.name))
        });
        assign_shared_ranks(&mut standings, |s| {
            (Some(s.participant) == champion, s.wins, s.matches_played)
        });
        standings
    }

    fn reset(&mut self) -> TournamentResult<()> {
        self.base.ensure_started()?;
        self.rounds.clear();
        self.eliminated.clear();
        let ids: Vec<ParticipantId> = self
            .base
            .participants_by_seed()
            .iter()
            .map(|p| p.id)
            .collect();
        self.generate_round(&ids, 1);
        self.base.completed = false;
        self.base.touch();
        info!("free-for-all rounds reset");
        Ok(())
    }

    fn rehydrate(&mut self) -> TournamentResult<()> {
        // Replay stored rankings to rebuild the eliminated set.
        let threshold = self.options.advance_count;
        let mut eliminated = HashSet::new();
        for m in self.rounds.iter().flatten().filter(|m| m.is_completed()) {
            if let Some(MatchResult::Ranking { ranking }) = &m.result {
                eliminated.extend(
                    ranking
                        .iter()
                        .filter(|p| p.position > threshold)
                        .map(|p| p.participant),
                );
            }
        }
        self.eliminated = eliminated;
        Ok(())
    }
}
