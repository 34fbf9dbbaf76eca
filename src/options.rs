//! Tournament configuration: per-format options, defaults, and validation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::points::PointsSystem;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentKind {
    SingleElimination,
    DoubleElimination,
    RoundRobin,
    Swiss,
    FreeForAll,
}

impl fmt::Display for TournamentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::SingleElimination => "single elimination",
            Self::DoubleElimination => "double elimination",
            Self::RoundRobin => "round robin",
            Self::Swiss => "swiss",
            Self::FreeForAll => "free for all",
        };
        write!(f, "{repr}")
    }
}

/// How round robin standings order participants.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    #[default]
    Wins,
    Points,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SingleEliminationOptions {
    /// Play a 3rd-place match between the semifinal losers.
    #[serde(default)]
    pub third_place_match: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DoubleEliminationOptions {
    /// Seed the bottom half of the field directly into the losers bracket
    /// with one loss already on the books.
    #[serde(default)]
    pub split_start: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RoundRobinOptions {
    /// How many times each pairing is played (1-3).
    pub rounds: u32,
    pub ranking: RankingMode,
    /// Multi-player mode: participants per match. `None` selects
    /// head-to-head play.
    #[serde(default)]
    pub players_per_match: Option<u32>,
    /// Points system for multi-player placements when points ranking is
    /// selected.
    #[serde(default)]
    pub points: Option<PointsSystem>,
}

impl Default for RoundRobinOptions {
    fn default() -> Self {
        Self {
            rounds: 1,
            ranking: RankingMode::Wins,
            players_per_match: None,
            points: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SwissOptions {
    /// Number of rounds; defaults to ceil(log2 N) when unset.
    #[serde(default)]
    pub rounds: Option<u32>,
    pub points_per_win: f64,
    pub points_per_tie: f64,
    pub points_per_bye: f64,
}

impl Default for SwissOptions {
    fn default() -> Self {
        Self {
            rounds: None,
            points_per_win: 1.0,
            points_per_tie: 0.5,
            points_per_bye: 1.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FreeForAllOptions {
    pub participants_per_match: u32,
    /// Top-N ranks that advance from each match; 1 means winner-only.
    pub advance_count: u32,
    #[serde(default)]
    pub points: Option<PointsSystem>,
}

impl Default for FreeForAllOptions {
    fn default() -> Self {
        Self {
            participants_per_match: 4,
            advance_count: 1,
            points: None,
        }
    }
}

/// Per-format options, tagged by format.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatOptions {
    SingleElimination(SingleEliminationOptions),
    DoubleElimination(DoubleEliminationOptions),
    RoundRobin(RoundRobinOptions),
    Swiss(SwissOptions),
    FreeForAll(FreeForAllOptions),
}

impl FormatOptions {
    #[must_use]
    pub fn kind(&self) -> TournamentKind {
        match self {
            Self::SingleElimination(_) => TournamentKind::SingleElimination,
            Self::DoubleElimination(_) => TournamentKind::DoubleElimination,
            Self::RoundRobin(_) => TournamentKind::RoundRobin,
            Self::Swiss(_) => TournamentKind::Swiss,
            Self::FreeForAll(_) => TournamentKind::FreeForAll,
        }
    }
}

/// Everything needed to create a tournament: a name, the initial roster,
/// and the per-format configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TournamentOptions {
    pub name: String,
    pub participants: Vec<String>,
    pub format: FormatOptions,
}

impl TournamentOptions {
    #[must_use]
    pub fn kind(&self) -> TournamentKind {
        self.format.kind()
    }
}

/// Baseline configuration per format.
#[must_use]
pub fn default_options(kind: TournamentKind) -> TournamentOptions {
    let format = match kind {
        TournamentKind::SingleElimination => {
            FormatOptions::SingleElimination(SingleEliminationOptions::default())
        }
        TournamentKind::DoubleElimination => {
            FormatOptions::DoubleElimination(DoubleEliminationOptions::default())
        }
        TournamentKind::RoundRobin => FormatOptions::RoundRobin(RoundRobinOptions::default()),
        TournamentKind::Swiss => FormatOptions::Swiss(SwissOptions::default()),
        TournamentKind::FreeForAll => FormatOptions::FreeForAll(FreeForAllOptions::default()),
    };
    TournamentOptions {
        name: String::new(),
        participants: Vec::new(),
        format,
    }
}

fn check_points_table(points: &Option<PointsSystem>, problems: &mut Vec<String>) {
    if let Some(PointsSystem::Custom(table)) = points {
        if table.is_empty() {
            problems.push("custom points table must not be empty".to_string());
        }
        if table.iter().any(|p| *p < 0.0) {
            problems.push("custom points table must not contain negative values".to_string());
        }
    }
}

/// Check a set of options and return human-readable problems. An empty
/// list means the options are valid.
#[must_use]
pub fn validate_options(options: &TournamentOptions) -> Vec<String> {
    let mut problems = Vec::new();

    if options.name.trim().is_empty() {
        problems.push("tournament name must not be empty".to_string());
    }

    let roster = options.participants.len();
    if roster < 2 {
        problems.push("at least 2 participants are required".to_string());
    }
    if options.participants.iter().any(|n| n.trim().is_empty()) {
        problems.push("participant names must not be empty".to_string());
    }
    let mut names: Vec<&str> = options.participants.iter().map(|n| n.trim()).collect();
    names.sort_unstable();
    names.dedup();
    if names.len() != roster {
        problems.push("participant names must be unique".to_string());
    }

    match &options.format {
        FormatOptions::SingleElimination(_) => {}
        FormatOptions::DoubleElimination(opts) => {
            if opts.split_start && roster < 4 {
                problems
                    .push("a split start requires at least 4 participants".to_string());
            }
        }
        FormatOptions::RoundRobin(opts) => {
            if !(1..=3).contains(&opts.rounds) {
                problems.push("round robin supports 1 to 3 rounds".to_string());
            }
            if let Some(players) = opts.players_per_match {
                if players < 3 {
                    problems.push(
                        "multi-player round robin needs at least 3 players per match".to_string(),
                    );
                }
                if players as usize > roster {
                    problems.push(
                        "players per match cannot exceed the number of participants".to_string(),
                    );
                }
            }
            check_points_table(&opts.points, &mut problems);
        }
        FormatOptions::Swiss(opts) => {
            if opts.rounds == Some(0) {
                problems.push("swiss needs at least one round".to_string());
            }
            if opts.points_per_win < 0.0
                || opts.points_per_tie < 0.0
                || opts.points_per_bye < 0.0
            {
                problems.push("swiss point values must not be negative".to_string());
            }
        }
        FormatOptions::FreeForAll(opts) => {
            if opts.participants_per_match < 2 || opts.participants_per_match as usize > roster {
                problems.push(
                    "participants per match must be between 2 and the number of participants"
                        .to_string(),
                );
            }
            if opts.advance_count == 0 {
                problems.push("at least one rank must advance from each match".to_string());
            }
            if opts.advance_count >= opts.participants_per_match {
                problems.push(
                    "advancement count must be smaller than participants per match".to_string(),
                );
            }
            check_points_table(&opts.points, &mut problems);
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(options: TournamentOptions, participants: &[&str]) -> TournamentOptions {
        TournamentOptions {
            name: "Friday Night".to_string(),
            participants: participants.iter().map(|s| s.to_string()).collect(),
            ..options
        }
    }

    #[test]
    fn test_defaults_are_valid_once_named_and_filled() {
        for kind in [
            TournamentKind::SingleElimination,
            TournamentKind::DoubleElimination,
            TournamentKind::RoundRobin,
            TournamentKind::Swiss,
            TournamentKind::FreeForAll,
        ] {
            let options = named(default_options(kind), &["a", "b", "c", "d"]);
            assert_eq!(validate_options(&options), Vec::<String>::new());
        }
    }

    #[test]
    fn test_empty_name_and_small_roster_are_rejected() {
        let options = default_options(TournamentKind::SingleElimination);
        let problems = validate_options(&options);
        assert!(problems.iter().any(|p| p.contains("name")));
        assert!(problems.iter().any(|p| p.contains("2 participants")));
    }

    #[test]
    fn test_duplicate_participant_names_are_rejected() {
        let options = named(
            default_options(TournamentKind::SingleElimination),
            &["alice", "alice"],
        );
        let problems = validate_options(&options);
        assert!(problems.iter().any(|p| p.contains("unique")));
    }

    #[test]
    fn test_round_robin_round_range() {
        let mut options = named(
            default_options(TournamentKind::RoundRobin),
            &["a", "b", "c"],
        );
        if let FormatOptions::RoundRobin(opts) = &mut options.format {
            opts.rounds = 4;
        }
        let problems = validate_options(&options);
        assert!(problems.iter().any(|p| p.contains("1 to 3")));
    }

    #[test]
    fn test_multiplayer_size_bounded_by_roster() {
        let mut options = named(
            default_options(TournamentKind::RoundRobin),
            &["a", "b", "c"],
        );
        if let FormatOptions::RoundRobin(opts) = &mut options.format {
            opts.players_per_match = Some(4);
        }
        let problems = validate_options(&options);
        assert!(problems.iter().any(|p| p.contains("cannot exceed")));
    }

    #[test]
    fn test_swiss_point_values_must_be_non_negative() {
        let mut options = named(default_options(TournamentKind::Swiss), &["a", "b", "c"]);
        if let FormatOptions::Swiss(opts) = &mut options.format {
            opts.points_per_bye = -1.0;
        }
        let problems = validate_options(&options);
        assert!(problems.iter().any(|p| p.contains("negative")));
    }

    #[test]
    fn test_free_for_all_constraints() {
        let mut options = named(
            default_options(TournamentKind::FreeForAll),
            &["a", "b", "c"],
        );
        if let FormatOptions::FreeForAll(opts) = &mut options.format {
            opts.participants_per_match = 4;
            opts.advance_count = 4;
        }
        let problems = validate_options(&options);
        assert!(problems.iter().any(|p| p.contains("between 2 and")));
        assert!(problems.iter().any(|p| p.contains("smaller than")));
    }

    #[test]
    fn test_custom_points_table_checks() {
        let mut options = named(
            default_options(TournamentKind::FreeForAll),
            &["a", "b", "c", "d"],
        );
        if let FormatOptions::FreeForAll(opts) = &mut options.format {
            opts.points = Some(PointsSystem::Custom(vec![]));
        }
        let problems = validate_options(&options);
        assert!(problems.iter().any(|p| p.contains("empty")));

        if let FormatOptions::FreeForAll(opts) = &mut options.format {
            opts.points = Some(PointsSystem::Custom(vec![5.0, -1.0]));
        }
        let problems = validate_options(&options);
        assert!(problems.iter().any(|p| p.contains("negative")));
    }
}
