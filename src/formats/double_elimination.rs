//! Double elimination: two losses and you are out.
//!
//! The winners bracket is an ordinary elimination bracket. The losers
//! bracket is built incrementally: each loser drops into the first losers
//! match with an open slot, or a fresh match when none has room, so the
//! exact pairing order follows completion order rather than a fixed draw.
//! The winners-bracket champion meets the last losers-bracket survivor in
//! the grand final; if the survivor wins it, a single bracket-reset match
//! decides the title.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::entities::{Match, MatchId, MatchResult, ParticipantId, Standing};
use crate::lifecycle::{TournamentBase, TournamentError, TournamentResult};
use crate::options::{DoubleEliminationOptions, TournamentKind};

use super::single_elimination::{advancement_index, build_bracket, require_winner};
use super::TournamentFormat;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DoubleEliminationTournament {
    #[serde(flatten)]
    base: TournamentBase,
    options: DoubleEliminationOptions,
    winners: Vec<Match>,
    losers: Vec<Match>,
    grand_final: Option<Match>,
    reset_match: Option<Match>,
    next_match_number: u32,
    /// Derived bookkeeping: losses per participant, including the one loss
    /// a split start pre-assigns. Rebuilt on import by replaying results.
    #[serde(skip)]
    losses: HashMap<ParticipantId, u32>,
}

impl DoubleEliminationTournament {
    #[must_use]
    pub(crate) fn new(base: TournamentBase, options: DoubleEliminationOptions) -> Self {
        Self {
            base,
            options,
            winners: Vec::new(),
            losers: Vec::new(),
            grand_final: None,
            reset_match: None,
            next_match_number: 1,
            losses: HashMap::new(),
        }
    }

    fn split_cut(&self) -> Option<usize> {
        let n = self.base.participants.len();
        (self.options.split_start && n >= 4).then(|| n.div_ceil(2))
    }

    fn generate(&mut self) {
        let seeded = self.base.participants_by_seed();
        self.losers.clear();
        self.grand_final = None;
        self.reset_match = None;
        self.losses.clear();

        if let Some(cut) = self.split_cut() {
            let (top, bottom) = seeded.split_at(cut);
            self.winners = build_bracket(top);
            self.next_match_number = self.winners.len() as u32 + 1;
            // The bottom half starts a loss down, fold-paired into an
            // initial losers round.
            let pairs = bottom.len() / 2;
            for k in 0..pairs {
                let m = self.new_match(vec![bottom[k].id, bottom[bottom.len() - 1 - k].id]);
                self.losers.push(m);
            }
            if bottom.len() % 2 == 1 {
                // the odd one out waits for a winners-bracket loser
                let m = self.new_match(vec![bottom[pairs].id]);
                self.losers.push(m);
            }
            for p in bottom {
                self.losses.insert(p.id, 1);
            }
        } else {
            self.winners = build_bracket(&seeded);
            self.next_match_number = self.winners.len() as u32 + 1;
        }
    }

    fn new_match(&mut self, participants: Vec<ParticipantId>) -> Match {
        let number = self.next_match_number;
        self.next_match_number += 1;
        Match::new(None, Some(number)).with_participants(participants)
    }

    fn winners_final_completed(&self) -> bool {
        self.winners.last().is_some_and(Match::is_completed)
    }

    /// Drop a freshly beaten participant into the losers bracket: the first
    /// open incomplete match, or a new one when none has room.
    fn drop_to_losers(&mut self, id: ParticipantId) {
        match self
            .losers
            .iter()
            .position(|m| !m.is_completed() && m.participants.len() < 2)
        {
            Some(i) => self.losers[i].participants.push(id),
            None => {
                let m = self.new_match(vec![id]);
                self.losers.push(m);
            }
        }
    }

    /// Route the winner of a losers-bracket match onward: the next open
    /// losers match, the grand final once the bracket is exhausted, or a
    /// fresh match to wait in while the winners bracket is still running.
    fn route_losers_winner(&mut self, winner: ParticipantId) {
        if let Some(i) = self
            .losers
            .iter()
            .position(|m| !m.is_completed() && m.participants.len() < 2)
        {
            self.losers[i].participants.push(winner);
        } else if self.winners_final_completed() && self.losers.iter().all(Match::is_completed) {
            if let Some(gf) = self.grand_final.as_mut() {
                gf.participants.push(winner);
                debug!("losers-bracket survivor joins the grand final");
            }
        } else {
            let m = self.new_match(vec![winner]);
            self.losers.push(m);
        }
    }

    fn add_loss(&mut self, id: ParticipantId) {
        *self.losses.entry(id).or_insert(0) += 1;
    }
}

impl TournamentFormat for DoubleEliminationTournament {
    fn kind(&self) -> TournamentKind {
        TournamentKind::DoubleElimination
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
            "started double elimination with {} participants",
            self.base.participants.len()
        );
        Ok(())
    }

    fn record_match_result(
        &mut self,
        match_id: MatchId,
        result: MatchResult,
    ) -> TournamentResult<()> {
        self.base.ensure_recordable()?;

        if let Some(i) = self.winners.iter().position(|m| m.id == match_id) {
            let (winner, loser) = require_winner(&self.winners[i], &result)?;
            self.winners[i].complete(result)?;
            self.add_loss(loser);

            let total = self.winners.len();
            if i + 1 < total {
                let target = advancement_index(i, total);
                self.winners[target].participants.push(winner);
                self.drop_to_losers(loser);
            } else {
                // Winners final: the champion side of the grand final is
                // set. The loser drops for one last losers-bracket run,
                // unless nobody is left to play them.
                let mut entrants = vec![winner];
                if self.losers.iter().any(|m| !m.is_completed()) {
                    self.drop_to_losers(loser);
                } else {
                    entrants.push(loser);
                }
                let gf = self.new_match(entrants);
                self.grand_final = Some(gf);
            }
            self.base.touch();
            return Ok(());
        }

        if let Some(i) = self.losers.iter().position(|m| m.id == match_id) {
            let (winner, loser) = require_winner(&self.losers[i], &result)?;
            self.losers[i].complete(result)?;
            self.add_loss(loser);
            self.route_losers_winner(winner);
            self.base.touch();
            return Ok(());
        }

        if self.grand_final.as_ref().is_some_and(|m| m.id == match_id) {
            let (winner, loser, entrants) = match self.grand_final.as_mut() {
                Some(gf) => {
                    let (winner, loser) = require_winner(gf, &result)?;
                    let entrants = gf.participants.clone();
                    gf.complete(result)?;
                    (winner, loser, entrants)
                }
                None => return Err(TournamentError::UnknownMatch(match_id)),
            };
            let winner_losses = self.losses.get(&winner).copied().unwrap_or(0);
            self.add_loss(loser);
            if winner_losses >= 1 {
                // The losers-bracket entrant took the grand final; both
                // sides now stand at one loss, so one decider remains.
                let m = self.new_match(entrants);
                self.reset_match = Some(m);
                info!("grand final reset");
            } else {
                self.base.completed = true;
                info!("double elimination complete");
            }
            self.base.touch();
            return Ok(());
        }

        if self.reset_match.as_ref().is_some_and(|m| m.id == match_id) {
            if let Some(decider) = self.reset_match.as_mut() {
                let (_winner, loser) = require_winner(decider, &result)?;
                decider.complete(result)?;
                self.add_loss(loser);
            }
            self.base.completed = true;
            info!("double elimination complete after bracket reset");
            self.base.touch();
            return Ok(());
        }

        Err(TournamentError::UnknownMatch(match_id))
    }

    fn current_matches(&self) -> Vec<Match> {
        self.winners
            .iter()
            .chain(self.losers.iter())
            .chain(self.grand_final.iter())
            .chain(self.reset_match.iter())
            .filter(|m| m.is_playable())
            .cloned()
            .collect()
    }

    fn all_matches(&self) -> Vec<Match> {
        self.winners
            .iter()
            .chain(self.losers.iter())
            .chain(self.grand_final.iter())
            .chain(self.reset_match.iter())
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

        for m in self
            .winners
            .iter()
            .chain(self.losers.iter())
            .chain(self.grand_final.iter())
            .chain(self.reset_match.iter())
        {
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
            s.eliminated = Some(self.losses.get(&s.participant).copied().unwrap_or(0) >= 2);
        }

        // Champion and runner-up come from the decider: the bracket-reset
        // match when it exists, the grand final otherwise.
        if self.base.completed {
            let decider = self.reset_match.as_ref().or(self.grand_final.as_ref());
            if let Some((winner, loser)) = decider.and_then(Match::decided_outcome) {
                if let Some(&i) = index_of.get(&winner) {
                    standings[i].rank = 1;
                }
                if let Some(&i) = index_of.get(&loser) {
                    standings[i].rank = 2;
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
        info!("double elimination brackets reset");
        Ok(())
    }

    fn rehydrate(&mut self) -> TournamentResult<()> {
        self.losses.clear();
        if self.base.started {
            if let Some(cut) = self.split_cut() {
                for p in &self.base.participants_by_seed()[cut..] {
                    self.losses.insert(p.id, 1);
                }
            }
        }
        let beaten: Vec<ParticipantId> = self
            .winners
            .iter()
            .chain(self.losers.iter())
            .chain(self.grand_final.iter())
            .chain(self.reset_match.iter())
            .filter_map(|m| m.decided_outcome().map(|(_, loser)| loser))
            .collect();
        for loser in beaten {
            self.add_loss(loser);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(n: usize, split_start: bool) -> DoubleEliminationTournament {
        let mut base = TournamentBase::new("double");
        for i in 0..n {
            base.add_participant(&format!("p{}", i + 1)).unwrap();
        }
        let mut tournament =
            DoubleEliminationTournament::new(base, DoubleEliminationOptions { split_start });
        tournament.start().unwrap();
        tournament
    }

    fn seed_ids(t: &DoubleEliminationTournament) -> Vec<ParticipantId> {
        t.base.participants_by_seed().iter().map(|p| p.id).collect()
    }

    fn win(t: &mut DoubleEliminationTournament, match_id: MatchId, winner: ParticipantId) {
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
    fn test_losers_bracket_fills_in_completion_order() {
        let mut t = started(4, false);
        let ids = seed_ids(&t);

        let mid = t.winners[0].id;

        win(&mut t, mid, ids[0]); // seed 4 drops
        assert_eq!(t.losers.len(), 1);
        assert_eq!(t.losers[0].participants, vec![ids[3]]);

        let mid = t.winners[1].id;

        win(&mut t, mid, ids[1]); // seed 3 drops into the open slot
        assert_eq!(t.losers[0].participants, vec![ids[3], ids[2]]);
    }

    #[test]
    fn test_grand_final_outright_win_ends_it() {
        let mut t = started(4, false);
        let ids = seed_ids(&t);

        let mid = t.winners[0].id;

        win(&mut t, mid, ids[0]);
        let mid = t.winners[1].id;
        win(&mut t, mid, ids[1]);
        let mid = t.winners[2].id;
        win(&mut t, mid, ids[0]); // winners final; seed 2 drops
        let mid = t.losers[0].id;
        win(&mut t, mid, ids[3]); // seed 3 out with 2 losses
        let mid = t.losers[1].id;
        win(&mut t, mid, ids[1]); // seed 4 out; seed 2 survives

        let gf = t.grand_final.clone().expect("grand final ready");
        assert_eq!(gf.participants, vec![ids[0], ids[1]]);

        win(&mut t, gf.id, ids[0]);
        assert!(t.base.completed);
        assert!(t.reset_match.is_none());

        let standings = t.standings();
        assert_eq!(standings[0].participant, ids[0]);
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[1].participant, ids[1]);
        assert_eq!(standings[1].rank, 2);
    }

    #[test]
    fn test_grand_final_reset_when_losers_entrant_wins() {
        let mut t = started(4, false);
        let ids = seed_ids(&t);

        let mid = t.winners[0].id;

        win(&mut t, mid, ids[0]);
        let mid = t.winners[1].id;
        win(&mut t, mid, ids[1]);
        let mid = t.winners[2].id;
        win(&mut t, mid, ids[0]);
        let mid = t.losers[0].id;
        win(&mut t, mid, ids[3]);
        let mid = t.losers[1].id;
        win(&mut t, mid, ids[1]);

        let gf = t.grand_final.clone().unwrap();
        win(&mut t, gf.id, ids[1]); // losers-bracket entrant wins
        assert!(!t.base.completed);

        let decider = t.reset_match.clone().expect("bracket reset created");
        assert_eq!(decider.participants, vec![ids[0], ids[1]]);

        win(&mut t, decider.id, ids[1]);
        assert!(t.base.completed);
        assert_eq!(t.standings()[0].participant, ids[1]);
    }

    #[test]
    fn test_no_third_match_after_two_losses() {
        let mut t = started(8, false);

        // Play everything to the end, always letting the listed-first
        // participant win, and watch for a third appearance after 2 losses.
        while !t.base.completed {
            let current = t.current_matches();
            assert!(!current.is_empty(), "bracket stalled");
            for m in current {
                for p in &m.participants {
                    assert!(
                        t.losses.get(p).copied().unwrap_or(0) < 2,
                        "twice-beaten participant offered another match"
                    );
                }
                win(&mut t, m.id, m.participants[0]);
            }
        }
    }

    #[test]
    fn test_two_participant_double_elimination() {
        let mut t = started(2, false);
        let ids = seed_ids(&t);

        let mid = t.winners[0].id;

        win(&mut t, mid, ids[0]);
        // nobody else to play: the loser goes straight to the grand final
        let gf = t.grand_final.clone().unwrap();
        assert_eq!(gf.participants, vec![ids[0], ids[1]]);

        win(&mut t, gf.id, ids[1]);
        let decider = t.reset_match.clone().expect("reset after survivor win");
        win(&mut t, decider.id, ids[0]);
        assert!(t.base.completed);
        assert_eq!(t.standings()[0].participant, ids[0]);
    }

    #[test]
    fn test_split_start_pre_assigns_losses() {
        let t = started(6, true);
        let ids = seed_ids(&t);

        // top 3 seeds in the winners bracket, bottom 3 a loss down
        assert_eq!(t.winners.len(), 3);
        assert_eq!(t.losers.len(), 2);
        assert_eq!(t.losers[0].participants, vec![ids[3], ids[5]]);
        assert_eq!(t.losers[1].participants, vec![ids[4]]);
        for id in &ids[3..] {
            assert_eq!(t.losses.get(id), Some(&1));
        }

        // a single losers-bracket loss eliminates the bottom half
        let mut t = t;
        let mid = t.losers[0].id;
        win(&mut t, mid, ids[3]);
        assert_eq!(t.losses.get(&ids[5]), Some(&2));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut t = started(4, false);
        let ids = seed_ids(&t);
        let mid = t.winners[0].id;
        win(&mut t, mid, ids[0]);
        let mid = t.winners[1].id;
        win(&mut t, mid, ids[1]);

        t.reset().unwrap();
        assert!(t.losers.is_empty());
        assert!(t.grand_final.is_none());
        assert!(t.reset_match.is_none());
        assert!(t.losses.is_empty());
        assert!(t.winners.iter().all(|m| m.result.is_none()));
        assert!(t.base.started);
    }
}
