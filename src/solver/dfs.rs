use std::sync::Arc;

use crate::game::{Game, Outcome};
use crate::solver::couple::{Couple, CoupleExpansion};
use crate::solver::heuristics;
use crate::solver::logger::Logger;
use crate::solver::nimber::Nimber;
use crate::solver::nimber_db::NimberDatabase;

/// Plain depth-first solver with alpha-beta-style early exit on a losing
/// child. Extra subgames are resolved by computing their nimbers on the fly,
/// so every result lands in the nimber database. Slow but exact, which makes
/// it the reference oracle of the test suite.
pub struct DfsSolver<G: Game> {
    db: Arc<NimberDatabase<G>>,
    logger: Option<Logger>,
    iterations: usize,
    current_tree_size: usize,
    max_tree_size: usize,
}

impl<G: Game> DfsSolver<G> {
    #[must_use]
    pub fn new(db: Arc<NimberDatabase<G>>, verbose: bool) -> Self {
        Self {
            db,
            logger: verbose.then(Logger::new),
            iterations: 0,
            current_tree_size: 0,
            max_tree_size: 0,
        }
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub fn max_tree_size(&self) -> usize {
        self.max_tree_size
    }

    #[must_use]
    pub fn nimber_database(&self) -> &Arc<NimberDatabase<G>> {
        &self.db
    }

    pub fn solve_couple(&mut self, couple: &Couple<G>) -> Outcome {
        let mut root = couple.clone();
        self.current_tree_size = 0;
        self.max_tree_size = 0;

        let outcome = self.compute_couple_outcome(&mut root);
        if let Some(logger) = &mut self.logger {
            logger.clear_log();
        }

        outcome
    }

    pub fn solve_position(&mut self, position: &G) -> Outcome {
        self.solve_couple(&Couple::new(position.clone(), Nimber::LOSS))
    }

    /// The smallest nimber for which the position is a Loss.
    pub fn compute_nimber(&mut self, position: &G) -> Nimber {
        let db = Arc::clone(&self.db);
        if let Some(stored) = db.get(&position.to_compact()) {
            return stored;
        }

        let mut nimber = Nimber::LOSS;
        loop {
            let mut couple = Couple::new(position.clone(), nimber);
            if self.compute_couple_outcome(&mut couple).is_loss() {
                return nimber;
            }

            nimber = nimber.next();
        }
    }

    fn compute_couple_outcome(&mut self, couple: &mut Couple<G>) -> Outcome {
        let db = Arc::clone(&self.db);
        couple.merge_computed_lands(&db);
        self.compute_and_merge_extra_lands(couple);
        couple.merge_computed_lands(&db);

        let outcome = couple.outcome();
        if !outcome.is_unknown() {
            return outcome;
        }

        self.compute_single_land_outcome(couple)
    }

    /// Reduces a multi-subgame couple to its hardest subgame by computing
    /// the nimbers of all the others.
    fn compute_and_merge_extra_lands(&mut self, couple: &mut Couple<G>) {
        if !couple.position.is_multi_land() {
            return;
        }

        let mut subgames = couple.position.subgames();
        subgames.sort_by(heuristics::game_order);

        if let Some(logger) = &mut self.logger {
            logger.add_node();
        }

        self.iterations += 1;
        let mut merged = couple.nimber;
        let last = subgames.len() - 1;
        for subgame in &subgames[..last] {
            if let Some(logger) = &mut self.logger {
                logger.update_last_node(0, subgames.len(), true);
            }

            merged = Nimber::merge(merged, self.compute_nimber(subgame));
        }

        couple.position = subgames.swap_remove(last);
        couple.nimber = merged;

        if let Some(logger) = &mut self.logger {
            logger.pop_node();
        }
    }

    fn compute_single_land_outcome(&mut self, couple: &Couple<G>) -> Outcome {
        let db = Arc::clone(&self.db);
        let children = match couple.compute_children(&db) {
            CoupleExpansion::Proved(outcome) => {
                if outcome.is_loss() {
                    db.insert(couple.position.to_compact(), couple.nimber);
                }

                return outcome;
            }
            CoupleExpansion::Children(children) => children,
        };

        if let Some(logger) = &mut self.logger {
            logger.add_node();
        }

        self.iterations += 1;
        self.current_tree_size += children.len();
        self.max_tree_size = self.max_tree_size.max(self.current_tree_size);

        let mut outcome = Outcome::Unknown;
        let children_num = children.len();
        for mut child in children {
            if let Some(logger) = &mut self.logger {
                logger.update_last_node(0, children_num, false);
                logger.log();
            }

            outcome = self.compute_couple_outcome(&mut child);
            if outcome.is_loss() {
                break;
            }
        }

        self.current_tree_size -= children_num;
        if let Some(logger) = &mut self.logger {
            logger.pop_node();
        }

        if outcome.is_loss() {
            return Outcome::Win;
        }

        db.insert(couple.position.to_compact(), couple.nimber);
        Outcome::Loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::kayles::Kayles;

    fn solver() -> DfsSolver<Kayles> {
        DfsSolver::new(Arc::new(NimberDatabase::new(false)), false)
    }

    #[test]
    fn kayles_grundy_values_match_the_literature() {
        let expected: [u8; 13] = [0, 1, 2, 3, 1, 4, 3, 2, 1, 4, 2, 6, 4];
        let mut dfs = solver();
        for (pins, &grundy) in expected.iter().enumerate() {
            let position: Kayles = pins.to_string().parse().unwrap();
            assert_eq!(
                dfs.compute_nimber(&position),
                Nimber(grundy),
                "G({pins})"
            );
        }
    }

    #[test]
    fn empty_position_is_a_first_player_loss() {
        let position: Kayles = "0".parse().unwrap();
        assert_eq!(solver().solve_position(&position), Outcome::Loss);
    }

    #[test]
    fn nim_overlay_decides_the_outcome() {
        let position: Kayles = "4".parse().unwrap();
        let mut dfs = solver();
        assert_eq!(
            dfs.solve_couple(&Couple::new(position.clone(), Nimber(1))),
            Outcome::Loss
        );
        assert_eq!(
            dfs.solve_couple(&Couple::new(position, Nimber(2))),
            Outcome::Win
        );
    }

    #[test]
    fn split_positions_reduce_via_xor() {
        // G(4+5) = 1 ^ 4 = 5, so the plain couple is a Win and the couple
        // with nimber 5 is a Loss.
        let position: Kayles = "4+5".parse().unwrap();
        let mut dfs = solver();
        assert_eq!(dfs.solve_position(&position), Outcome::Win);
        assert_eq!(
            dfs.solve_couple(&Couple::new(position, Nimber(5))),
            Outcome::Loss
        );
    }

    #[test]
    fn discovered_nimbers_land_in_the_database() {
        let mut dfs = solver();
        let position: Kayles = "5".parse().unwrap();
        assert_eq!(dfs.compute_nimber(&position), Nimber(4));
        let db = Arc::clone(dfs.nimber_database());
        assert_eq!(db.get(&position.to_compact()), Some(Nimber(4)));
    }
}
