//! # Matchpoint
//!
//! A tournament bracket and schedule library covering five formats:
//! single elimination, double elimination, round robin, Swiss, and
//! free-for-all.
//!
//! Every format implements the same lifecycle contract (start, record
//! results, read current matches and standings, reset, export/import)
//! through the [`formats::TournamentFormat`] trait, dispatched over the
//! closed set of engines with `enum_dispatch`. All state lives in memory;
//! a tournament serializes to a flat, versioned document for persistence
//! and file exchange, and imports back losslessly.
//!
//! ## Core Modules
//!
//! - [`entities`]: participants, matches, results, standings
//! - [`formats`]: the five engines and the factory surface
//! - [`options`]: per-format configuration, defaults, validation
//! - [`points`]: placement-to-points conversion
//!
//! ## Example
//!
//! ```
//! use matchpoint::{MatchResult, TournamentFormat, TournamentKind};
//! use matchpoint::{create_tournament, default_options};
//!
//! let mut options = default_options(TournamentKind::SingleElimination);
//! options.name = "Friday Night Cup".to_string();
//! options.participants = vec!["ada".into(), "brie".into(), "cleo".into()];
//!
//! let mut tournament = create_tournament(options).unwrap();
//! tournament.start().unwrap();
//!
//! let open = tournament.current_matches();
//! let winner = open[0].participants[0];
//! tournament
//!     .record_match_result(open[0].id, MatchResult::Winner { winner, tie: false })
//!     .unwrap();
//! ```

/// Participants, matches, results, and standings.
pub mod entities;
/// The five format engines and the factory surface.
pub mod formats;
/// Errors and the shared lifecycle state.
pub mod lifecycle;
/// Per-format configuration, defaults, and validation.
pub mod options;
/// Placement-to-points conversion.
pub mod points;

pub use entities::{
    Match, MatchId, MatchResult, MatchStatus, Participant, ParticipantId, RankedPlacement,
    Standing,
};
pub use formats::{
    DoubleEliminationTournament, EXPORT_VERSION, ExportDocument, FreeForAllTournament,
    RoundRobinTournament, SingleEliminationTournament, SwissTournament, Tournament,
    TournamentFormat, create_tournament, restore_tournament,
};
pub use lifecycle::{TournamentBase, TournamentError, TournamentResult};
pub use options::{
    DoubleEliminationOptions, FormatOptions, FreeForAllOptions, RankingMode, RoundRobinOptions,
    SingleEliminationOptions, SwissOptions, TournamentKind, TournamentOptions, default_options,
    validate_options,
};
pub use points::PointsSystem;
