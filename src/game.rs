use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use crate::error::SolverError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Unknown,
}

impl Outcome {
    #[must_use]
    pub const fn is_win(self) -> bool {
        matches!(self, Self::Win)
    }

    #[must_use]
    pub const fn is_loss(self) -> bool {
        matches!(self, Self::Loss)
    }

    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }

    #[must_use]
    pub const fn to_i8(self) -> i8 {
        match self {
            Self::Win => 1,
            Self::Loss => -1,
            Self::Unknown => 0,
        }
    }

    #[must_use]
    pub const fn from_i8(value: i8) -> Self {
        match value {
            1 => Self::Win,
            -1 => Self::Loss,
            _ => Self::Unknown,
        }
    }
}

/// Capability set required from a concrete game. `Compact` is the canonical
/// representation with a stable string codec; two positions are equal iff
/// their compact forms agree.
pub trait Game: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    type Compact: Clone
        + Eq
        + Ord
        + Hash
        + Debug
        + Display
        + FromStr<Err = SolverError>
        + Send
        + Sync;

    const NORMAL_IMPARTIAL: bool;

    fn from_compact(compact: &Self::Compact) -> Self;
    fn to_compact(&self) -> Self::Compact;
    fn from_subgames(subgames: Vec<Self>) -> Self;

    fn compute_children(&self) -> Vec<Self>;
    fn subgames(&self) -> Vec<Self>;
    fn subgame_count(&self) -> usize;

    fn is_terminal(&self) -> bool;

    fn is_multi_land(&self) -> bool {
        self.subgame_count() > 1
    }

    /// Immediate outcome, only consulted for games that are not
    /// normal-play impartial.
    fn outcome(&self) -> Outcome;

    fn lives(&self) -> u32;
    fn estimate_children(&self) -> usize;
    fn estimate_proof_depth(&self) -> usize;
    fn estimate_disproof_depth(&self) -> usize;
}
