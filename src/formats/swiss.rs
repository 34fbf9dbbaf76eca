//! Swiss system: round-by-round pairing driven by running score.
//!
//! Rounds are generated one at a time, never in advance. Each pairing pass
//! sorts the field by running match points (then game points), pairs the
//! top-ranked participant with the best-ranked opponent they have not yet
//! played, and hands the odd participant out an automatic bye. The running
//! bookkeeping is part of the persisted state because future pairings
//! depend on it; display standings are still re-derived from the stored
//! match results.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::entities::{Match, MatchId, MatchResult, MatchStatus, ParticipantId, Standing};
use crate::lifecycle::{TournamentBase, TournamentError, TournamentResult};
use crate::options::{SwissOptions, TournamentKind};

use super::{TournamentFormat, assign_shared_ranks, ceil_log2};

/// Running pairing bookkeeping for one participant.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PairingRecord {
    pub match_points: f64,
    pub games_won: f64,
    pub games_lost: f64,
    pub opponents: Vec<ParticipantId>,
    pub byes: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SwissTournament {
    #[serde(flatten)]
    base: TournamentBase,
    options: SwissOptions,
    rounds: Vec<Vec<Match>>,
    current_round: u32,
    records: HashMap<ParticipantId, PairingRecord>,
}

impl SwissTournament {
    #[must_use]
    pub(crate) fn new(base: TournamentBase, options: SwissOptions) -> Self {
        Self {
            base,
            options,
            rounds: Vec::new(),
            current_round: 0,
            records: HashMap::new(),
        }
    }

    fn total_rounds(&self) -> u32 {
        self.options
            .rounds
            .unwrap_or_else(|| ceil_log2(self.base.participants.len()).max(1))
    }

    fn match_count(&self) -> usize {
        self.rounds.iter().map(Vec::len).sum()
    }

    fn pairing_key(&self, id: ParticipantId) -> (f64, f64) {
        self.records
            .get(&id)
            .map(|r| (r.match_points, r.games_won))
            .unwrap_or((0.0, 0.0))
    }

    fn record_mut(&mut self, id: ParticipantId) -> &mut PairingRecord {
        self.records.entry(id).or_default()
    }

    fn apply_bye(&mut self, id: ParticipantId) {
        let points = self.options.points_per_bye;
        let record = self.record_mut(id);
        record.match_points += points;
        record.byes += 1;
    }

    fn apply_scores(&mut self, a: ParticipantId, b: ParticipantId, score_a: f64, score_b: f64) {
        let (win, tie) = (self.options.points_per_win, self.options.points_per_tie);
        {
            let record = self.record_mut(a);
            record.opponents.push(b);
            record.games_won += score_a;
            record.games_lost += score_b;
            match score_a.partial_cmp(&score_b).unwrap_or(Ordering::Equal) {
                Ordering::Greater => record.match_points += win,
                Ordering::Equal => record.match_points += tie,
                Ordering::Less => {}
            }
        }
        {
            let record = self.record_mut(b);
            record.opponents.push(a);
            record.games_won += score_b;
            record.games_lost += score_a;
            match score_b.partial_cmp(&score_a).unwrap_or(Ordering::Equal) {
                Ordering::Greater => record.match_points += win,
                Ordering::Equal => record.match_points += tie,
                Ordering::Less => {}
            }
        }
    }

    /// Pair the next round from the running scores. Repeat opponents are
    /// avoided where possible; the odd participant out receives a bye.
    fn generate_round(&mut self, round: u32) {
        let mut order: Vec<ParticipantId> = self
            .base
            .participants_by_seed()
            .iter()
            .map(|p| p.id)
            .collect();
        order.sort_by(|a, b| {
            let (ka, kb) = (self.pairing_key(*a), self.pairing_key(*b));
            kb.partial_cmp(&ka).unwrap_or(Ordering::Equal)
        });

        let mut number = self.match_count() as u32 + 1;
        let mut matches = Vec::new();
        let mut unpaired = order;
        while unpaired.len() >= 2 {
            let first = unpaired.remove(0);
            let history = self
                .records
                .get(&first)
                .map(|r| r.opponents.clone())
                .unwrap_or_default();
            // best-ranked fresh opponent, or the best-ranked repeat when
            // every candidate has been played already
            let pick = unpaired
                .iter()
                .position(|candidate| !history.contains(candidate))
                .unwrap_or(0);
            let second = unpaired.remove(pick);
            matches.push(
                Match::new(Some(round), Some(number)).with_participants(vec![first, second]),
            );
            number += 1;
        }
        if let Some(odd) = unpaired.pop() {
            let mut bye = Match::new(Some(round), Some(number)).with_participants(vec![odd]);
            bye.status = MatchStatus::Completed;
            bye.result = Some(MatchResult::Winner {
                winner: odd,
                tie: false,
            });
            matches.push(bye);
            self.apply_bye(odd);
            debug!("swiss bye awarded in round {round}");
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

    fn round_complete(&self, round: u32) -> bool {
        self.rounds
            .get(round as usize - 1)
            .is_some_and(|matches| matches.iter().all(Match::is_completed))
    }
}

impl TournamentFormat for SwissTournament {
    fn kind(&self) -> TournamentKind {
        TournamentKind::Swiss
    }

    fn base(&self) -> &TournamentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TournamentBase {
        &mut self.base
    }

    fn start(&mut self) -> TournamentResult<()> {
        self.base.ensure_startable(2)?;
        self.rounds.clear();
        self.records = self
            .base
            .participants
            .iter()
            .map(|p| (p.id, PairingRecord::default()))
            .collect();
        self.generate_round(1);
        self.base.started = true;
        self.base.touch();
        info!(
            "started swiss with {} participants over {} rounds",
            self.base.participants.len(),
            self.total_rounds()
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

        let (a, b, score_a, score_b) = {
            let m = &self.rounds[ri][mi];
            if m.is_completed() {
                return Err(TournamentError::MatchAlreadyCompleted);
            }
            let MatchResult::Scores { scores } = &result else {
                return Err(TournamentError::ScoresRequired);
            };
            for id in scores.keys() {
                if !m.contains(*id) {
                    return Err(TournamentError::NotInMatch(*id));
                }
            }
            if scores.len() != m.participants.len() {
                return Err(TournamentError::ScoresRequired);
            }
            let (a, b) = (m.participants[0], m.participants[1]);
            let score_a = scores.get(&a).copied().unwrap_or(0.0);
            let score_b = scores.get(&b).copied().unwrap_or(0.0);
            (a, b, score_a, score_b)
        };
        self.rounds[ri][mi].complete(result)?;
        self.apply_scores(a, b, score_a, score_b);

        if self.round_complete(self.current_round) {
            if self.current_round < self.total_rounds() {
                self.generate_round(self.current_round + 1);
            } else {
                self.base.completed = true;
                info!("swiss complete");
            }
        }
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
        for s in &mut standings {
            s.points = Some(0.0);
            s.games_won = Some(0.0);
            s.games_lost = Some(0.0);
        }

        for m in self.rounds.iter().flatten().filter(|m| m.is_completed()) {
            if m.participants.len() == 1 {
                // bye: a match played with no opponent
                if let Some(&i) = index_of.get(&m.participants[0]) {
                    standings[i].matches_played += 1;
                    standings[i].wins += 1;
                    *standings[i].points.get_or_insert(0.0) += self.options.points_per_bye;
                }
                continue;
            }
            let Some(MatchResult::Scores { scores }) = &m.result else {
                continue;
            };
            let (a, b) = (m.participants[0], m.participants[1]);
            let score_a = scores.get(&a).copied().unwrap_or(0.0);
            let score_b = scores.get(&b).copied().unwrap_or(0.0);
            let (ai, bi) = match (index_of.get(&a), index_of.get(&b)) {
                (Some(&ai), Some(&bi)) => (ai, bi),
                _ => continue,
            };
            standings[ai].matches_played += 1;
            standings[bi].matches_played += 1;
            *standings[ai].games_won.get_or_insert(0.0) += score_a;
            *standings[ai].games_lost.get_or_insert(0.0) += score_b;
            *standings[bi].games_won.get_or_insert(0.0) += score_b;
            *standings[bi].games_lost.get_or_insert(0.0) += score_a;
            match score_a.partial_cmp(&score_b).unwrap_or(Ordering::Equal) {
                Ordering::Greater => {
                    standings[ai].wins += 1;
                    standings[bi].losses += 1;
                    *standings[ai].points.get_or_insert(0.0) += self.options.points_per_win;
                }
                Ordering::Less => {
                    standings[bi].wins += 1;
                    standings[ai].losses += 1;
                    *standings[bi].points.get_or_insert(0.0) += self.options.points_per_win;
                }
                Ordering::Equal => {
                    standings[ai].ties += 1;
                    standings[bi].ties += 1;
                    *standings[ai].points.get_or_insert(0.0) += self.options.points_per_tie;
                    *standings[bi].points.get_or_insert(0.0) += self.options.points_per_tie;
                }
            }
        }

        standings.sort_by(|a, b| {
            b.points
                .partial_cmp(&a.points)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    b.games_won
                        .partial_cmp(&a.games_won)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| {
                    a.games_lost
                        .partial_cmp(&b.games_lost)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.name.cmp(&b.name))
        });
        assign_shared_ranks(&mut standings, |s| (s.points, s.games_won, s.games_lost));
        standings
    }

    fn reset(&mut self) -> TournamentResult<()> {
        self.base.ensure_started()?;
        self.rounds.clear();
        self.records = self
            .base
            .participants
            .iter()
            .map(|p| (p.id, PairingRecord::default()))
            .collect();
        self.generate_round(1);
        self.base.completed = false;
        self.base.touch();
        info!("swiss rounds reset");
        Ok(())
    }

    fn rehydrate(&mut self) -> TournamentResult<()> {
        // Rebuild the running bookkeeping by replaying the stored results.
        self.records = self
            .base
            .participants
            .iter()
            .map(|p| (p.id, PairingRecord::default()))
            .collect();
        let mut replay = Vec::new();
        for m in self.rounds.iter().flatten().filter(|m| m.is_completed()) {
            if m.participants.len() == 1 {
                replay.push((m.participants[0], None));
            } else if let Some(MatchResult::Scores { scores }) = &m.result {
                let (a, b) = (m.participants[0], m.participants[1]);
                let score_a = scores.get(&a).copied().unwrap_or(0.0);
                let score_b = scores.get(&b).copied().unwrap_or(0.0);
                replay.push((a, Some((b, score_a, score_b))));
            }
        }
        for (a, rest) in replay {
            match rest {
                None => self.apply_bye(a),
                Some((b, score_a, score_b)) => self.apply_scores(a, b, score_a, score_b),
            }
        }
        Ok(())
    }
}
