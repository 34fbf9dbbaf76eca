//! Property-based tests for bracket construction and scoring using proptest
//!
//! These tests verify the structural invariants of the format engines
//! across a wide range of field sizes and play orders.

use proptest::prelude::*;
use std::collections::HashSet;

use matchpoint::{
    MatchResult, PointsSystem, RankedPlacement, Tournament, TournamentFormat, TournamentKind,
    create_tournament, default_options, restore_tournament,
};

fn started(kind: TournamentKind, n: usize) -> Tournament {
    let mut options = default_options(kind);
    options.name = "prop".to_string();
    options.participants = (0..n).map(|i| format!("p{}", i + 1)).collect();
    let mut tournament = create_tournament(options).unwrap();
    tournament.start().unwrap();
    tournament
}

/// Play one currently open match, picking the winner with the next flag.
/// Returns false once nothing is playable.
fn play_one(tournament: &mut Tournament, upset: bool) -> bool {
    let open = tournament.current_matches();
    let Some(m) = open.first() else {
        return false;
    };
    let winner = if upset {
        m.participants[1]
    } else {
        m.participants[0]
    };
    tournament
        .record_match_result(
            m.id,
            MatchResult::Winner {
                winner,
                tie: false,
            },
        )
        .unwrap();
    true
}

proptest! {
    #[test]
    fn test_single_elimination_match_and_bye_counts(n in 2usize..33) {
        let tournament = started(TournamentKind::SingleElimination, n);
        let matches = tournament.all_matches();

        let rounds = (usize::BITS - (n - 1).leading_zeros()) as u32;
        let bracket_size = 1usize << rounds;
        prop_assert_eq!(matches.len(), bracket_size - 1);

        // byes sit out round 1 and surface in round 2
        let byes = bracket_size - n;
        let seeded = tournament.base().participants_by_seed();
        for bye in &seeded[..byes] {
            let first_round = matches
                .iter()
                .filter(|m| m.contains(bye.id))
                .filter_map(|m| m.round)
                .min();
            prop_assert_eq!(first_round, Some(2));
        }

        // the remaining participants all appear somewhere in round 1
        for playing in &seeded[byes..] {
            let in_round_one = matches
                .iter()
                .any(|m| m.round == Some(1) && m.contains(playing.id));
            prop_assert!(in_round_one);
        }
    }

    #[test]
    fn test_single_elimination_playthrough_crowns_one_champion(
        n in 2usize..20,
        upsets in prop::collection::vec(any::<bool>(), 64),
    ) {
        let mut tournament = started(TournamentKind::SingleElimination, n);
        let mut turn = 0;
        while play_one(&mut tournament, upsets[turn % upsets.len()]) {
            turn += 1;
        }
        prop_assert!(tournament.completed());

        let standings = tournament.standings();
        prop_assert_eq!(standings.iter().filter(|s| s.rank == 1).count(), 1);
        prop_assert_eq!(standings[0].rank, 1);
        prop_assert_eq!(standings[0].losses, 0);
    }

    #[test]
    fn test_round_trip_preserves_outputs_mid_play(
        n in 2usize..12,
        plays in 0usize..8,
        upsets in prop::collection::vec(any::<bool>(), 8),
    ) {
        let mut tournament = started(TournamentKind::SingleElimination, n);
        for i in 0..plays {
            if !play_one(&mut tournament, upsets[i]) {
                break;
            }
        }

        let restored = restore_tournament(tournament.export().state).unwrap();
        prop_assert_eq!(restored.all_matches(), tournament.all_matches());
        prop_assert_eq!(restored.current_matches(), tournament.current_matches());
        prop_assert_eq!(restored.standings(), tournament.standings());
    }

    #[test]
    fn test_double_elimination_never_seats_the_twice_beaten(
        n in 2usize..12,
        upsets in prop::collection::vec(any::<bool>(), 128),
    ) {
        let mut tournament = started(TournamentKind::DoubleElimination, n);
        let mut turn = 0;
        loop {
            // nobody flagged eliminated may sit in a playable match
            let out: HashSet<_> = tournament
                .standings()
                .into_iter()
                .filter(|s| s.eliminated == Some(true))
                .map(|s| s.participant)
                .collect();
            for m in tournament.current_matches() {
                for p in &m.participants {
                    prop_assert!(!out.contains(p));
                }
            }
            if !play_one(&mut tournament, upsets[turn % upsets.len()]) {
                break;
            }
            turn += 1;
        }
        prop_assert!(tournament.completed());
    }

    #[test]
    fn test_round_robin_covers_every_pair(n in 2usize..10) {
        let tournament = started(TournamentKind::RoundRobin, n);
        let mut pairs = HashSet::new();
        for m in tournament.all_matches() {
            let mut pair = m.participants.clone();
            pair.sort();
            prop_assert!(pairs.insert(pair));
        }
        prop_assert_eq!(pairs.len(), n * (n - 1) / 2);
    }

    #[test]
    fn test_swiss_odd_fields_get_exactly_one_bye_per_round(n in 3usize..10) {
        let mut tournament = started(TournamentKind::Swiss, n);
        while !tournament.completed() {
            for m in tournament.current_matches() {
                let scores = std::collections::BTreeMap::from([
                    (m.participants[0], 2.0),
                    (m.participants[1], 1.0),
                ]);
                tournament
                    .record_match_result(m.id, MatchResult::Scores { scores })
                    .unwrap();
            }
        }

        let matches = tournament.all_matches();
        let rounds = matches.iter().filter_map(|m| m.round).max().unwrap_or(0);
        for round in 1..=rounds {
            let byes = matches
                .iter()
                .filter(|m| m.round == Some(round) && m.participants.len() == 1)
                .count();
            prop_assert_eq!(byes, n % 2, "round {}", round);
        }
    }

    #[test]
    fn test_free_for_all_eliminations_are_monotone(
        n in 4usize..14,
        rotations in prop::collection::vec(0usize..4, 32),
    ) {
        let mut options = default_options(TournamentKind::FreeForAll);
        options.name = "prop".to_string();
        options.participants = (0..n).map(|i| format!("p{}", i + 1)).collect();
        let mut tournament = create_tournament(options).unwrap();
        tournament.start().unwrap();

        let mut turn = 0;
        let mut seen: HashSet<_> = HashSet::new();
        while !tournament.completed() {
            let open = tournament.current_matches();
            if open.is_empty() {
                break;
            }
            // rotate the finish order so different participants advance
            let mut order = open[0].participants.clone();
            let order_len = order.len();
            order.rotate_left(rotations[turn % rotations.len()] % order_len);
            turn += 1;
            let ranking = order
                .iter()
                .enumerate()
                .map(|(i, id)| RankedPlacement {
                    participant: *id,
                    position: i as u32 + 1,
                })
                .collect();
            tournament
                .record_match_result(open[0].id, MatchResult::Ranking { ranking })
                .unwrap();

            let out: HashSet<_> = tournament
                .standings()
                .into_iter()
                .filter(|s| s.eliminated == Some(true))
                .map(|s| s.participant)
                .collect();
            prop_assert!(seen.is_subset(&out), "eliminated set shrank");
            seen = out;
        }
        prop_assert!(tournament.completed());
    }

    #[test]
    fn test_points_tables_fit_any_field(n in 1usize..40, position in 0usize..60) {
        for system in [
            PointsSystem::FormulaOne,
            PointsSystem::MotoGp,
            PointsSystem::Linear,
            PointsSystem::WinnerWeighted,
            PointsSystem::Custom(vec![9.0, 5.0, 2.0]),
        ] {
            prop_assert_eq!(system.points_table(n).len(), n);
            if position == 0 || position > n {
                prop_assert_eq!(system.points_for_placement(position, n), 0.0);
            }
        }
    }
}
