//! Format engines and the factory surface.
//!
//! Each tournament format is its own engine type owning its structural
//! state; the closed set of formats is dispatched through
//! [`TournamentFormat`] with `enum_dispatch`, and the same enum doubles as
//! the persisted document (a `format` tag selects the payload shape).

pub mod double_elimination;
pub mod free_for_all;
pub mod round_robin;
pub mod single_elimination;
pub mod swiss;

use chrono::{DateTime, Utc};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Match, MatchId, MatchResult, ParticipantId, Standing};
use crate::lifecycle::{TournamentBase, TournamentError, TournamentResult};
use crate::options::{FormatOptions, TournamentKind, TournamentOptions, validate_options};

pub use double_elimination::DoubleEliminationTournament;
pub use free_for_all::FreeForAllTournament;
pub use round_robin::RoundRobinTournament;
pub use single_elimination::SingleEliminationTournament;
pub use swiss::SwissTournament;

/// The lifecycle contract every format implements.
///
/// Mutation goes through the operations below; `base_mut` exists for the
/// shared roster scaffolding and engine internals.
#[enum_dispatch]
pub trait TournamentFormat {
    fn kind(&self) -> TournamentKind;

    fn base(&self) -> &TournamentBase;

    fn base_mut(&mut self) -> &mut TournamentBase;

    /// Freeze the roster and generate the initial structure. Fails when
    /// already started or when the roster is below the format's minimum.
    fn start(&mut self) -> TournamentResult<()>;

    /// Record the outcome of a playable match and advance the structure.
    fn record_match_result(
        &mut self,
        match_id: MatchId,
        result: MatchResult,
    ) -> TournamentResult<()>;

    /// All matches that are playable now and not completed. Empty before
    /// start.
    fn current_matches(&self) -> Vec<Match>;

    /// Every match in the structure, playable or not, in stored order.
    /// Rendering layers consume this; the engine never hands out mutable
    /// references to its matches.
    fn all_matches(&self) -> Vec<Match>;

    /// Standings recomputed from the full match history; never cached.
    fn standings(&self) -> Vec<Standing>;

    /// Throw away all matches and results and regenerate the initial
    /// structure from the original options. The tournament stays started.
    fn reset(&mut self) -> TournamentResult<()>;

    /// Rebuild derived bookkeeping (loss counters, running score tables)
    /// by replaying the stored match results. Called on import.
    fn rehydrate(&mut self) -> TournamentResult<()>;
}

/// A tournament in one of the five supported formats.
///
/// Serializes to the persisted tournament-state document; the `format` tag
/// discriminates the payload.
#[enum_dispatch(TournamentFormat)]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Tournament {
    SingleElimination(SingleEliminationTournament),
    DoubleElimination(DoubleEliminationTournament),
    RoundRobin(RoundRobinTournament),
    Swiss(SwissTournament),
    FreeForAll(FreeForAllTournament),
}

impl Tournament {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.base().id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.base().name
    }

    #[must_use]
    pub fn started(&self) -> bool {
        self.base().started
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.base().completed
    }

    pub fn rename(&mut self, name: &str) {
        self.base_mut().rename(name);
    }

    /// Add a participant to the roster. Only allowed before start.
    pub fn add_participant(&mut self, name: &str) -> TournamentResult<ParticipantId> {
        self.base_mut().add_participant(name)
    }

    /// Remove a participant from the roster. Only allowed before start.
    pub fn remove_participant(&mut self, id: ParticipantId) -> TournamentResult<()> {
        self.base_mut().remove_participant(id)
    }

    /// Randomize the seed order. Only allowed before start.
    pub fn shuffle_seeds(&mut self) -> TournamentResult<()> {
        self.base_mut().shuffle_seeds()
    }

    /// Flag a participant as non-human. Only allowed before start.
    pub fn set_non_human(
        &mut self,
        id: ParticipantId,
        non_human: bool,
    ) -> TournamentResult<()> {
        self.base_mut().set_non_human(id, non_human)
    }

    /// Snapshot the full tournament state into an export envelope.
    #[must_use]
    pub fn export(&self) -> ExportDocument {
        ExportDocument::new(self.clone())
    }
}

/// Create a fresh, not-started tournament from validated options.
pub fn create_tournament(options: TournamentOptions) -> TournamentResult<Tournament> {
    let problems = validate_options(&options);
    if !problems.is_empty() {
        return Err(TournamentError::InvalidOptions(problems.join("; ")));
    }

    let mut base = TournamentBase::new(options.name.trim());
    for name in &options.participants {
        base.add_participant(name)?;
    }

    let tournament = match options.format {
        FormatOptions::SingleElimination(opts) => {
            Tournament::from(SingleEliminationTournament::new(base, opts))
        }
        FormatOptions::DoubleElimination(opts) => {
            Tournament::from(DoubleEliminationTournament::new(base, opts))
        }
        FormatOptions::RoundRobin(opts) => Tournament::from(RoundRobinTournament::new(base, opts)),
        FormatOptions::Swiss(opts) => Tournament::from(SwissTournament::new(base, opts)),
        FormatOptions::FreeForAll(opts) => {
            Tournament::from(FreeForAllTournament::new(base, opts))
        }
    };
    Ok(tournament)
}

/// Reconstruct an engine from a persisted tournament-state document,
/// replaying stored results to rebuild derived bookkeeping.
pub fn restore_tournament(state: Tournament) -> TournamentResult<Tournament> {
    let mut tournament = state;
    tournament.rehydrate()?;
    Ok(tournament)
}

/// Version stamp written into every export envelope.
pub const EXPORT_VERSION: u32 = 1;

/// The file-exchange envelope: a version, an export timestamp, and exactly
/// the persisted tournament-state document.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExportDocument {
    pub export_version: u32,
    pub export_date: DateTime<Utc>,
    pub state: Tournament,
}

impl ExportDocument {
    #[must_use]
    pub fn new(state: Tournament) -> Self {
        Self {
            export_version: EXPORT_VERSION,
            export_date: Utc::now(),
            state,
        }
    }

    pub fn to_json(&self) -> TournamentResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> TournamentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reconstruct the engine held in this envelope.
    pub fn into_tournament(self) -> TournamentResult<Tournament> {
        restore_tournament(self.state)
    }
}

/// Assign 1-based ranks over an already-sorted standings slice, letting
/// entries with an equal sort key share the rank of the first of their
/// block.
pub(crate) fn assign_shared_ranks<K, F>(standings: &mut [Standing], key: F)
where
    K: PartialEq,
    F: Fn(&Standing) -> K,
{
    let mut previous: Option<(K, u32)> = None;
    for i in 0..standings.len() {
        let k = key(&standings[i]);
        let rank = match &previous {
            Some((pk, rank)) if *pk == k => *rank,
            _ => i as u32 + 1,
        };
        standings[i].rank = rank;
        previous = Some((k, rank));
    }
}

/// Smallest r with 2^r >= n.
pub(crate) fn ceil_log2(n: usize) -> u32 {
    let mut r = 0;
    while (1usize << r) < n {
        r += 1;
    }
    r
}
