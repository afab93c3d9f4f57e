use std::fmt;
use std::str::FromStr;

use crate::error::{SolverError, SolverResult};
use crate::game::{Game, Outcome};
use crate::solver::heuristics;
use crate::solver::nimber::Nimber;
use crate::solver::nimber_db::NimberDatabase;

const POSITION_NIMBER_SEPARATOR: char = ' ';

/// Canonical form of a couple, used as the key of every table and tree.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CompactCouple<G: Game> {
    pub position: G::Compact,
    pub nimber: Nimber,
}

impl<G: Game> CompactCouple<G> {
    #[must_use]
    pub const fn new(position: G::Compact, nimber: Nimber) -> Self {
        Self { position, nimber }
    }
}

impl<G: Game> fmt::Display for CompactCouple<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.position, POSITION_NIMBER_SEPARATOR, self.nimber)
    }
}

impl<G: Game> FromStr for CompactCouple<G> {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (position_str, nimber_str) = s
            .split_once(POSITION_NIMBER_SEPARATOR)
            .ok_or_else(|| SolverError::InvalidInput(s.to_string()))?;

        Ok(Self {
            position: position_str.parse()?,
            nimber: nimber_str.trim().parse()?,
        })
    }
}

/// The unit of search state: a game position plus the accumulated nimber of
/// the independent subgames the couple has absorbed.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Couple<G: Game> {
    pub position: G,
    pub nimber: Nimber,
}

pub enum CoupleExpansion<G: Game> {
    Proved(Outcome),
    Children(Vec<Couple<G>>),
}

impl<G: Game> Couple<G> {
    #[must_use]
    pub const fn new(position: G, nimber: Nimber) -> Self {
        Self { position, nimber }
    }

    #[must_use]
    pub fn from_compact(compact: &CompactCouple<G>) -> Self {
        Self {
            position: G::from_compact(&compact.position),
            nimber: compact.nimber,
        }
    }

    pub fn parse(s: &str) -> SolverResult<Self> {
        let compact: CompactCouple<G> = s.parse()?;
        Ok(Self::from_compact(&compact))
    }

    #[must_use]
    pub fn to_compact(&self) -> CompactCouple<G> {
        CompactCouple::new(self.position.to_compact(), self.nimber)
    }

    /// Immediate outcome of the couple, or Unknown when the position is not
    /// terminal.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        if self.position.is_terminal() {
            if G::NORMAL_IMPARTIAL {
                if self.nimber.is_win() {
                    Outcome::Win
                } else {
                    Outcome::Loss
                }
            } else {
                self.position.outcome()
            }
        } else {
            Outcome::Unknown
        }
    }

    #[must_use]
    pub fn estimate_proof_depth(&self) -> usize {
        self.position.estimate_proof_depth() + usize::from(self.nimber.0)
    }

    #[must_use]
    pub fn estimate_disproof_depth(&self) -> usize {
        self.position.estimate_disproof_depth() + usize::from(self.nimber.0)
    }

    /// Computes the children of the couple: one child per smaller nimber of
    /// the same position, plus the game children with already-known subgame
    /// nimbers merged away. A child that reduces to a terminal losing couple
    /// proves this couple an immediate Win.
    #[must_use]
    pub fn compute_children(&self, database: &NimberDatabase<G>) -> CoupleExpansion<G> {
        self.compute_children_impl(Some(database))
    }

    /// Children without database reductions, for callers that only need the
    /// raw move graph.
    #[must_use]
    pub fn compute_raw_children(&self) -> Vec<Couple<G>> {
        match self.compute_children_impl(None) {
            CoupleExpansion::Children(children) => children,
            CoupleExpansion::Proved(_) => Vec::new(),
        }
    }

    fn compute_children_impl(
        &self,
        database: Option<&NimberDatabase<G>>,
    ) -> CoupleExpansion<G> {
        let outcome = self.outcome();
        if !outcome.is_unknown() {
            return CoupleExpansion::Proved(outcome);
        }

        let mut children = Vec::new();
        for nimber_child in 0..self.nimber.0 {
            children.push(Self::new(self.position.clone(), Nimber(nimber_child)));
        }

        for position_child in self.position.compute_children() {
            if let Some(db) = database {
                if !G::NORMAL_IMPARTIAL
                    && !position_child.is_terminal()
                    && db.get(&position_child.to_compact()).is_some()
                {
                    return CoupleExpansion::Proved(Outcome::Win);
                }

                let mut couple_child = Self::new(position_child, self.nimber);
                couple_child.merge_computed_lands(db);
                if couple_child.position.is_terminal() {
                    if couple_child.outcome().is_loss() {
                        return CoupleExpansion::Proved(Outcome::Win);
                    }
                } else {
                    children.push(couple_child);
                }
            } else {
                children.push(Self::new(position_child, self.nimber));
            }
        }

        if children.is_empty() {
            CoupleExpansion::Proved(Outcome::Loss)
        } else {
            children.sort_by(heuristics::couple_order);
            CoupleExpansion::Children(children)
        }
    }

    /// Merges subgames whose nimber is already known into the nimber part,
    /// keeping only the uncomputed subgames in the position. Returns whether
    /// the couple was modified.
    pub fn merge_computed_lands(&mut self, database: &NimberDatabase<G>) -> bool {
        if !G::NORMAL_IMPARTIAL || self.position.is_terminal() {
            return false;
        }

        let mut modified = false;
        let mut uncomputed = Vec::with_capacity(self.position.subgame_count());
        for subgame in self.position.subgames() {
            match database.get(&subgame.to_compact()) {
                Some(stored) => {
                    self.nimber = Nimber::merge(self.nimber, stored);
                    modified = true;
                }
                None => uncomputed.push(subgame),
            }
        }

        self.position = G::from_subgames(uncomputed);
        modified
    }
}

impl<G: Game> fmt::Display for Couple<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_compact())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::kayles::Kayles;

    fn couple(s: &str) -> Couple<Kayles> {
        Couple::parse(s).unwrap()
    }

    fn children_of(c: &Couple<Kayles>, db: &NimberDatabase<Kayles>) -> Vec<String> {
        match c.compute_children(db) {
            CoupleExpansion::Children(children) => {
                children.iter().map(ToString::to_string).collect()
            }
            CoupleExpansion::Proved(_) => panic!("expected open children"),
        }
    }

    #[test]
    fn wire_encoding_round_trips() {
        for s in ["0 0", "3 2", "5+2 7"] {
            let parsed = couple(s);
            assert_eq!(parsed.to_compact().to_string(), s);
            assert_eq!(
                Couple::<Kayles>::parse(&parsed.to_string()).unwrap(),
                parsed
            );
        }

        assert!(Couple::<Kayles>::parse("3").is_err());
        assert!(Couple::<Kayles>::parse("3 x").is_err());
    }

    #[test]
    fn terminal_outcome_follows_the_nim_part() {
        assert_eq!(couple("0 0").outcome(), Outcome::Loss);
        assert_eq!(couple("0 3").outcome(), Outcome::Win);
        assert_eq!(couple("2 0").outcome(), Outcome::Unknown);
    }

    #[test]
    fn nim_children_precede_position_children() {
        let db = NimberDatabase::new(false);
        let children = children_of(&couple("2 2"), &db);
        assert!(children.contains(&"2 0".to_string()));
        assert!(children.contains(&"2 1".to_string()));
        assert!(children.contains(&"1 2".to_string()));
    }

    #[test]
    fn known_subgames_are_absorbed_into_the_nimber() {
        let db: NimberDatabase<Kayles> = NimberDatabase::new(false);
        db.insert("1".parse().unwrap(), Nimber(1));

        // The child ("1", 1) of ("2", 1) absorbs the known row and reduces
        // to the terminal losing couple ("0", 0), proving the parent an
        // immediate Win.
        match couple("2 1").compute_children(&db) {
            CoupleExpansion::Proved(outcome) => assert_eq!(outcome, Outcome::Win),
            CoupleExpansion::Children(_) => panic!("expected an immediate win"),
        }

        // Without the database entry the same couple stays open.
        let empty: NimberDatabase<Kayles> = NimberDatabase::new(false);
        match couple("2 1").compute_children(&empty) {
            CoupleExpansion::Children(children) => assert!(!children.is_empty()),
            CoupleExpansion::Proved(_) => panic!("expected open children"),
        }
    }

    #[test]
    fn merge_computed_lands_reduces_known_rows() {
        let db: NimberDatabase<Kayles> = NimberDatabase::new(false);
        db.insert("2".parse().unwrap(), Nimber(2));

        let mut c = couple("4+2 1");
        assert!(c.merge_computed_lands(&db));
        assert_eq!(c.to_string(), "4 3");
        assert!(!c.merge_computed_lands(&db));
    }

    #[test]
    fn children_are_sorted_by_the_default_couple_order() {
        let db = NimberDatabase::new(false);
        let children = children_of(&couple("3 1"), &db);
        let weights: Vec<u32> = children
            .iter()
            .map(|s| {
                let c = Couple::<Kayles>::parse(s).unwrap();
                c.position.lives() + 4 * u32::from(c.nimber.0)
            })
            .collect();
        let mut sorted = weights.clone();
        sorted.sort_unstable();
        assert_eq!(weights, sorted);
    }
}
