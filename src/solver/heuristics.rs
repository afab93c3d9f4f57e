use std::cmp::Ordering;

use crate::game::Game;
use crate::solver::couple::Couple;
use crate::solver::proof_numbers::{Pn, ProofNumbers};

const NIMBER_WEIGHT: u32 = 4;

/// Orders subgames by ascending lives, then estimated branching, then
/// canonical string.
pub fn game_order<G: Game>(first: &G, second: &G) -> Ordering {
    first
        .lives()
        .cmp(&second.lives())
        .then_with(|| first.estimate_children().cmp(&second.estimate_children()))
        .then_with(|| {
            first
                .to_compact()
                .to_string()
                .cmp(&second.to_compact().to_string())
        })
}

/// Orders couples by `lives + 4 * nimber` ascending; for normal-play
/// impartial games, ties prefer positions with more independent subgames.
pub fn couple_order<G: Game>(first: &Couple<G>, second: &Couple<G>) -> Ordering {
    let first_weight = first.position.lives() + NIMBER_WEIGHT * u32::from(first.nimber.0);
    let second_weight = second.position.lives() + NIMBER_WEIGHT * u32::from(second.nimber.0);
    first_weight
        .cmp(&second_weight)
        .then_with(|| {
            if G::NORMAL_IMPARTIAL {
                second
                    .position
                    .subgame_count()
                    .cmp(&first.position.subgame_count())
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| {
            first
                .position
                .estimate_children()
                .cmp(&second.position.estimate_children())
        })
        .then_with(|| first.to_string().cmp(&second.to_string()))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Estimator {
    /// Every unexplored couple starts at {1, 1}.
    #[default]
    Uniform,
    /// Admissible proof-depth lower bounds as initial proof numbers.
    Depth,
}

impl Estimator {
    #[must_use]
    pub fn estimate<G: Game>(self, couple: &Couple<G>) -> ProofNumbers {
        match self {
            Self::Uniform => ProofNumbers::default(),
            Self::Depth => ProofNumbers::new(
                Pn::new(1 + couple.estimate_proof_depth() as u64),
                Pn::new(1 + couple.estimate_disproof_depth() as u64),
            ),
        }
    }
}
