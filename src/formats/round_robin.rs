//! Round robin: everyone plays everyone.
//!
//! Head-to-head mode generates one match per unordered pair for each
//! configured repeat round; all of a round's matches open together once the
//! round counter reaches them. The optional multi-player mode partitions
//! the field into fixed-size groups instead, rotating the grouping each
//! round by a cyclic offset so opponents vary.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::entities::{
    Match, MatchId, MatchResult, MatchStatus, ParticipantId, RankedPlacement, Standing,
    validate_ranking,
};
use crate::lifecycle::{TournamentBase, TournamentError, TournamentResult};
use crate::options::{RankingMode, RoundRobinOptions, TournamentKind};

use super::{TournamentFormat, assign_shared_ranks};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RoundRobinTournament {
    #[serde(flatten)]
    base: TournamentBase,
    options: RoundRobinOptions,
    matches: Vec<Match>,
    current_round: u32,
}

impl RoundRobinTournament {
    #[must_use]
    pub(crate) fn new(base: TournamentBase, options: RoundRobinOptions) -> Self {
        Self {
            base,
            options,
            matches: Vec::new(),
            current_round: 0,
        }
    }

    fn generate(&mut self) {
        let seeded = self.base.participants_by_seed();
        let n = seeded.len();
        self.matches.clear();
        let mut number = 1u32;

        match self.options.players_per_match {
            None => {
                for round in 1..=self.options.rounds {
                    for i in 0..n {
                        for j in (i + 1)..n {
                            self.matches.push(
                                Match::new(Some(round), Some(number))
                                    .with_participants(vec![seeded[i].id, seeded[j].id]),
                            );
                            number += 1;
                        }
                    }
                }
            }
            Some(group) => {
                let group = group as usize;
                for round in 1..=self.options.rounds {
                    // Cyclic rotation so the grouping varies between rounds.
                    let offset = ((round as usize - 1) * (n / 2)) % n;
                    let rotated: Vec<ParticipantId> =
                        (0..n).map(|i| seeded[(i + offset) % n].id).collect();
                    for chunk in rotated.chunks(group) {
                        let mut m = Match::new(Some(round), Some(number))
                            .with_participants(chunk.to_vec());
                        number += 1;
                        if chunk.len() == 1 {
                            // lone leftover: pre-completed bye so the round
                            // can close
                            m.status = MatchStatus::Completed;
                            m.result = Some(MatchResult::Ranking {
                                ranking: vec![RankedPlacement {
                                    participant: chunk[0],
                                    position: 1,
                                }],
                            });
                            debug!("round robin bye in round {round}");
                        }
                        self.matches.push(m);
                    }
                }
            }
        }
        self.current_round = 1;
    }

    fn validate_result(&self, m: &Match, result: &MatchResult) -> TournamentResult<()> {
        if m.is_completed() {
            return Err(TournamentError::MatchAlreadyCompleted);
        }
        if self.options.players_per_match.is_some() {
            let MatchResult::Ranking { ranking } = result else {
                return Err(TournamentError::RankingRequired);
            };
            return validate_ranking(m, ranking);
        }
        match self.options.ranking {
            RankingMode::Wins => {
                let MatchResult::Winner { winner, .. } = result else {
                    return Err(TournamentError::WinnerRequired);
                };
                if !m.contains(*winner) {
                    return Err(TournamentError::NotInMatch(*winner));
                }
            }
            RankingMode::Points => {
                let MatchResult::Scores { scores } = result else {
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
            }
        }
        Ok(())
    }

    /// Advance the round counter past fully recorded rounds; the last
    /// round's completion finishes the tournament.
    fn advance_rounds(&mut self) {
        loop {
            let round_done = self
                .matches
                .iter()
                .filter(|m| m.round == Some(self.current_round))
                .all(Match::is_completed);
            if !round_done {
                break;
            }
            if self.current_round >= self.options.rounds {
                if !self.base.completed {
                    self.base.completed = true;
                    info!("round robin complete");
                }
                break;
            }
            self.current_round += 1;
            debug!("round robin advanced to round {}", self.current_round);
        }
    }

    fn head_to_head_standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> =
            self.base.participants.iter().map(Standing::new).collect();
        let index_of: HashMap<ParticipantId, usize> = standings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.participant, i))
            .collect();
        let points_ranked = self.options.ranking == RankingMode::Points;
        if points_ranked {
            for s in &mut standings {
                s.points = Some(0.0);
            }
        }

        for m in self.matches.iter().filter(|m| m.is_completed()) {
            match &m.result {
                Some(MatchResult::Winner { winner, tie }) => {
                    let Some(loser) = m.opponent_of(*winner) else {
                        continue;
                    };
                    let (wi, li) = match (index_of.get(winner), index_of.get(&loser)) {
                        (Some(&wi), Some(&li)) => (wi, li),
                        _ => continue,
                    };
                    standings[wi].matches_played += 1;
                    standings[li].matches_played += 1;
                    if *tie {
                        standings[wi].ties += 1;
                        standings[li].ties += 1;
                    } else {
                        standings[wi].wins += 1;
                        standings[li].losses += 1;
                    }
                }
                Some(MatchResult::Scores { scores }) => {
                    let (a, b) = (m.participants[0], m.participants[1]);
                    let sa = scores.get(&a).copied().unwrap_or(0.0);
                    let sb = scores.get(&b).copied().unwrap_or(0.0);
                    let (ai, bi) = match (index_of.get(&a), index_of.get(&b)) {
                        (Some(&ai), Some(&bi)) => (ai, bi),
                        _ => continue,
                    };
                    standings[ai].matches_played += 1;
                    standings[bi].matches_played += 1;
                    *standings[ai].points.get_or_insert(0.0) += sa;
                    *standings[bi].points.get_or_insert(0.0) += sb;
                    match sa.partial_cmp(&sb).unwrap_or(Ordering::Equal) {
                        Ordering::Greater => {
                            standings[ai].wins += 1;
                            standings[bi].losses += 1;
                        }
                        Ordering::Less => {
                            standings[bi].wins += 1;
                            standings[ai].losses += 1;
                        }
                        Ordering::Equal => {
                            standings[ai].ties += 1;
                            standings[bi].ties += 1;
                        }
                    }
                }
                _ => {}
            }
        }

        if points_ranked {
            standings.sort_by(|a, b| {
                b.points
                    .partial_cmp(&a.points)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.wins.cmp(&a.wins))
                    .then_with(|| a.name.cmp(&b.name))
            });
            assign_shared_ranks(&mut standings, |s| (s.points, s.wins));
        } else {
            standings.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.name.cmp(&b.name)));
            assign_shared_ranks(&mut standings, |s| s.wins);
        }
        standings
    }

    fn multi_player_standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> =
            self.base.participants.iter().map(Standing::new).collect();
        let index_of: HashMap<ParticipantId, usize> = standings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.participant, i))
            .collect();
        let points_ranked = self.options.ranking == RankingMode::Points;
        if points_ranked {
            for s in &mut standings {
                s.points = Some(0.0);
            }
        }

        for m in self.matches.iter().filter(|m| m.is_completed()) {
            if let Some(MatchResult::Ranking { ranking }) = &m.result {
                let field = ranking.len() as u32;
                for placement in ranking {
                    let Some(&i) = index_of.get(&placement.participant) else {
                        continue;
                    };
                    standings[i].matches_played += 1;
                    // 1st place counts as a win, last place as a loss
                    if placement.position == 1 {
                        standings[i].wins += 1;
                    }
                    if field > 1 && placement.position == field {
                        standings[i].losses += 1;
                    }
                    if points_ranked {
                        if let Some(system) = &self.options.points {
                            *standings[i].points.get_or_insert(0.0) += system
                                .points_for_placement(placement.position as usize, field as usize);
                        }
                    }
                }
            }
        }

        if points_ranked {
            standings.sort_by(|a, b| {
                b.points
                    .partial_cmp(&a.points)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.wins.cmp(&a.wins))
                    .then_with(|| a.name.cmp(&b.name))
            });
            assign_shared_ranks(&mut standings, |s| (s.points, s.wins));
        } else {
            standings.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.name.cmp(&b.name)));
            assign_shared_ranks(&mut standings, |s| s.wins);
        }
        standings
    }
}

impl TournamentFormat for RoundRobinTournament {
    fn kind(&self) -> TournamentKind {
        TournamentKind::RoundRobin
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
            "started round robin with {} participants, {} matches",
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
        let index = self
            .matches
            .iter()
            .position(|m| m.id == match_id)
            .ok_or(TournamentError::UnknownMatch(match_id))?;
        self.validate_result(&self.matches[index], &result)?;
        self.matches[index].complete(result)?;
        self.advance_rounds();
        self.base.touch();
        Ok(())
    }

    fn current_matches(&self) -> Vec<Match> {
        self.matches
            .iter()
            .filter(|m| m.is_playable() && m.round.unwrap_or(1) <= self.current_round)
            .cloned()
            .collect()
    }

    fn all_matches(&self) -> Vec<Match> {
        self.matches.clone()
    }

    fn standings(&self) -> Vec<Standing> {
        if self.options.players_per_match.is_some() {
            self.multi_player_standings()
        } else {
            self.head_to_head_standings()
        }
    }

    fn reset(&mut self) -> TournamentResult<()> {
        self.base.ensure_started()?;
        self.generate();
        self.base.completed = false;
        self.base.touch();
        info!("round robin schedule reset");
        Ok(())
    }

    fn rehydrate(&mut self) -> TournamentResult<()> {
        // The schedule and round counter are the whole state.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};

    fn started(n: usize, options: RoundRobinOptions) -> RoundRobinTournament {
        let mut base = TournamentBase::new("league");
        for i in 0..n {
            base.add_participant(&format!("p{}", i + 1)).unwrap();
        }
        let mut tournament = RoundRobinTournament::new(base, options);
        tournament.start().unwrap();
        tournament
    }

    fn seed_ids(t: &RoundRobinTournament) -> Vec<ParticipantId> {
        t.base.participants_by_seed().iter().map(|p| p.id).collect()
    }

    fn win(t: &mut RoundRobinTournament, match_id: MatchId, winner: ParticipantId) {
        t.record_match_result(
            match_id,
            MatchResult::Winner {
                winner,
                tie: false,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_every_pair_plays_once_per_repeat() {
        for n in [2, 4, 5, 7] {
            for rounds in 1..=3u32 {
                let t = started(
                    n,
                    RoundRobinOptions {
                        rounds,
                        ..RoundRobinOptions::default()
                    },
                );
                assert_eq!(t.matches.len(), rounds as usize * n * (n - 1) / 2);
                for round in 1..=rounds {
                    let mut pairs = HashSet::new();
                    for m in t.matches.iter().filter(|m| m.round == Some(round)) {
                        let mut pair = m.participants.clone();
                        pair.sort();
                        assert!(pairs.insert(pair), "pair repeated within a round");
                    }
                    assert_eq!(pairs.len(), n * (n - 1) / 2);
                }
            }
        }
    }

    #[test]
    fn test_four_participants_wins_ranking_scenario() {
        let mut t = started(4, RoundRobinOptions::default());
        let ids = seed_ids(&t);
        assert_eq!(t.matches.len(), 6);

        // p1 wins all three of theirs; everything else goes to the
        // lower-numbered seed
        for m in t.matches.clone() {
            let winner = if m.contains(ids[0]) {
                ids[0]
            } else {
                m.participants[0]
            };
            win(&mut t, m.id, winner);
        }
        assert!(t.base.completed);

        let standings = t.standings();
        assert_eq!(standings[0].participant, ids[0]);
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[0].wins, 3);
    }

    #[test]
    fn test_rounds_open_one_at_a_time() {
        let mut t = started(
            3,
            RoundRobinOptions {
                rounds: 2,
                ..RoundRobinOptions::default()
            },
        );
        assert_eq!(t.current_matches().len(), 3);

        let first_round: Vec<Match> = t
            .matches
            .iter()
            .filter(|m| m.round == Some(1))
            .cloned()
            .collect();
        for m in &first_round {
            win(&mut t, m.id, m.participants[0]);
        }
        assert_eq!(t.current_round, 2);
        assert!(
            t.current_matches()
                .iter()
                .all(|m| m.round == Some(2))
        );
        assert!(!t.base.completed);
    }

    #[test]
    fn test_points_ranking_sums_scores() {
        let mut t = started(
            2,
            RoundRobinOptions {
                ranking: RankingMode::Points,
                ..RoundRobinOptions::default()
            },
        );
        let ids = seed_ids(&t);
        let m = t.matches[0].id;

        let err = t.record_match_result(
            m,
            MatchResult::Winner {
                winner: ids[0],
                tie: false,
            },
        );
        assert!(matches!(err, Err(TournamentError::ScoresRequired)));

        let scores = BTreeMap::from([(ids[0], 21.0), (ids[1], 15.0)]);
        t.record_match_result(m, MatchResult::Scores { scores })
            .unwrap();

        let standings = t.standings();
        assert_eq!(standings[0].participant, ids[0]);
        assert_eq!(standings[0].points, Some(21.0));
        assert_eq!(standings[0].wins, 1);
        assert_eq!(standings[1].points, Some(15.0));
    }

    #[test]
    fn test_multi_player_rotation_and_byes() {
        let t = started(
            5,
            RoundRobinOptions {
                rounds: 2,
                players_per_match: Some(4),
                ..RoundRobinOptions::default()
            },
        );
        let ids = seed_ids(&t);

        let round_one: Vec<&Match> = t
            .matches
            .iter()
            .filter(|m| m.round == Some(1))
            .collect();
        assert_eq!(round_one.len(), 2);
        assert_eq!(round_one[0].participants, vec![ids[0], ids[1], ids[2], ids[3]]);
        // lone leftover is a pre-completed bye
        assert_eq!(round_one[1].participants, vec![ids[4]]);
        assert!(round_one[1].is_completed());

        // round 2 rotates by floor(5/2) = 2
        let round_two: Vec<&Match> = t
            .matches
            .iter()
            .filter(|m| m.round == Some(2))
            .collect();
        assert_eq!(round_two[0].participants, vec![ids[2], ids[3], ids[4], ids[0]]);
    }

    #[test]
    fn test_multi_player_standings_count_first_and_last_places() {
        let mut t = started(
            4,
            RoundRobinOptions {
                players_per_match: Some(4),
                ranking: RankingMode::Points,
                points: Some(crate::points::PointsSystem::Linear),
                ..RoundRobinOptions::default()
            },
        );
        let ids = seed_ids(&t);
        let m = t.matches[0].id;

        let ranking = ids
            .iter()
            .enumerate()
            .map(|(i, id)| RankedPlacement {
                participant: *id,
                position: i as u32 + 1,
            })
            .collect();
        t.record_match_result(m, MatchResult::Ranking { ranking })
            .unwrap();
        assert!(t.base.completed);

        let standings = t.standings();
        assert_eq!(standings[0].participant, ids[0]);
        assert_eq!(standings[0].wins, 1);
        assert_eq!(standings[0].points, Some(4.0));
        let last = standings.iter().find(|s| s.participant == ids[3]).unwrap();
        assert_eq!(last.losses, 1);
        assert_eq!(last.points, Some(1.0));
    }
}
