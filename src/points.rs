//! Placement-to-points conversion for multi-participant formats.
//!
//! A points system maps a finish position plus a participant count to a
//! score. Pure functions, no state: the resolver is consulted by the round
//! robin (multi-player mode) and free-for-all engines when a points-based
//! ranking is configured.

use log::warn;
use serde::{Deserialize, Serialize};

/// Formula 1 world championship table, 2010 onwards.
pub const FORMULA_ONE_TABLE: [f64; 10] = [25.0, 18.0, 15.0, 12.0, 10.0, 8.0, 6.0, 4.0, 2.0, 1.0];

/// MotoGP world championship table.
pub const MOTO_GP_TABLE: [f64; 15] = [
    25.0, 20.0, 16.0, 13.0, 11.0, 10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0,
];

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsSystem {
    /// Fixed-table preset, truncated or zero-padded to the field size.
    FormulaOne,
    /// Fixed-table preset, truncated or zero-padded to the field size.
    MotoGp,
    /// Descending linear formula: N points for 1st down to 1 for last.
    Linear,
    /// Linear with the winner's share doubled: 2N for 1st, then N-1 down
    /// to 1.
    WinnerWeighted,
    /// Caller-supplied table, 1st place first. Must be non-empty and
    /// non-negative; fitted to the field size like the presets.
    Custom(Vec<f64>),
}

impl PointsSystem {
    /// The points awarded per finish position for a field of
    /// `participant_count`, 1st place first. The output length always
    /// equals `participant_count`.
    #[must_use]
    pub fn points_table(&self, participant_count: usize) -> Vec<f64> {
        let n = participant_count;
        match self {
            Self::FormulaOne => fit(&FORMULA_ONE_TABLE, n),
            Self::MotoGp => fit(&MOTO_GP_TABLE, n),
            Self::Linear => (0..n).map(|i| (n - i) as f64).collect(),
            Self::WinnerWeighted => (0..n)
                .map(|i| if i == 0 { 2.0 * n as f64 } else { (n - i) as f64 })
                .collect(),
            Self::Custom(table) => {
                if table.windows(2).any(|w| w[1] > w[0]) {
                    warn!("custom points table is not descending");
                }
                fit(table, n)
            }
        }
    }

    /// The points for a single finish position (1-based). Out-of-range
    /// positions yield 0, never an error.
    #[must_use]
    pub fn points_for_placement(&self, position: usize, participant_count: usize) -> f64 {
        if position == 0 || position > participant_count {
            return 0.0;
        }
        self.points_table(participant_count)[position - 1]
    }
}

/// Truncate or zero-pad a table to exactly `n` entries.
fn fit(table: &[f64], n: usize) -> Vec<f64> {
    table
        .iter()
        .copied()
        .chain(std::iter::repeat(0.0))
        .take(n)
        .collect()
}
