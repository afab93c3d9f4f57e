use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::SolverResult;
use crate::game::Game;
use crate::solver::couple::Couple;
use crate::solver::dfpn::DfpnSolver;
use crate::solver::heuristics::Estimator;
use crate::solver::logger::Logger;
use crate::solver::nimber_db::NimberDatabase;
use crate::solver::node::ExpansionInfo;
use crate::solver::tree::PnsTree;
use crate::solver::{NO_LIMIT, PnsSolver};

const INNER_SOLVE_BUDGET: usize = 100;

/// Best-first proof-number search over an in-memory tree with
/// transpositions. In two-level mode each node expansion delegates to a
/// bounded inner df-pn solve instead of a plain one-ply expansion.
pub struct BasicPnsSolver<G: Game> {
    db: Arc<NimberDatabase<G>>,
    tree: PnsTree<G>,
    inner: Option<Box<DfpnSolver<G>>>,
    rng: Option<StdRng>,
    logger: Option<Logger>,
    iterations: usize,
    max_iterations: usize,
}

impl<G: Game> BasicPnsSolver<G> {
    #[must_use]
    pub fn new(
        db: Arc<NimberDatabase<G>>,
        verbose: bool,
        estimator: Estimator,
        seed: u64,
    ) -> Self {
        Self {
            db,
            tree: PnsTree::new(estimator),
            inner: None,
            rng: (seed > 0).then(|| StdRng::seed_from_u64(seed)),
            logger: verbose.then(Logger::new),
            iterations: 0,
            max_iterations: NO_LIMIT,
        }
    }

    /// Two-level variant: inner node expansions run a bounded df-pn.
    #[must_use]
    pub fn two_level(
        db: Arc<NimberDatabase<G>>,
        verbose: bool,
        estimator: Estimator,
        capacity: usize,
        seed: u64,
    ) -> Self {
        let inner = DfpnSolver::new(Arc::clone(&db), false, estimator, capacity, seed);
        let mut solver = Self::new(db, verbose, estimator, seed);
        solver.inner = Some(Box::new(inner));
        solver
    }

    #[must_use]
    pub fn tree(&self) -> &PnsTree<G> {
        &self.tree
    }

    fn max_iterations_reached(&self) -> bool {
        self.max_iterations != NO_LIMIT && self.iterations >= self.max_iterations
    }
}

impl<G: Game> PnsSolver<G> for BasicPnsSolver<G> {
    fn expand_couple(
        &mut self,
        couple: &Couple<G>,
        max_iterations: usize,
    ) -> SolverResult<ExpansionInfo> {
        self.iterations = 0;
        self.max_iterations = max_iterations;

        let db = Arc::clone(&self.db);
        let root = self.tree.set_root(couple);
        while !self.tree.is_proved() && !self.max_iterations_reached() {
            let Some(mpn) = self
                .tree
                .get_mpn(self.rng.as_mut(), false, self.logger.as_mut())
            else {
                break;
            };

            match &mut self.inner {
                Some(inner) => {
                    let state = Couple::from_compact(&self.tree.state(mpn).compact);
                    let info = inner.expand_couple(&state, INNER_SOLVE_BUDGET)?;
                    self.tree.expand_with_info(mpn, &info)?;
                }
                None => self.tree.expand_node(mpn, &db),
            }

            self.tree.update_paths(mpn, &db)?;
            self.iterations += 1;
        }

        if let Some(logger) = &mut self.logger {
            logger.clear_log();
        }

        Ok(self.tree.expansion_info(root))
    }

    fn clear_tree(&mut self) {
        self.tree.clear();
    }

    fn tree_size(&self) -> usize {
        self.tree.len()
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn nimber_database(&self) -> &Arc<NimberDatabase<G>> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Outcome;
    use crate::games::kayles::Kayles;
    use crate::solver::dfs::DfsSolver;
    use crate::solver::nimber::Nimber;

    fn pns() -> BasicPnsSolver<Kayles> {
        BasicPnsSolver::new(
            Arc::new(NimberDatabase::new(false)),
            false,
            Estimator::Uniform,
            0,
        )
    }

    #[test]
    fn pns_matches_the_dfs_oracle_on_small_positions() {
        let positions = ["0", "1", "3", "5", "6", "2+2", "1+4"];
        for position_str in positions {
            let position: Kayles = position_str.parse().unwrap();
            for nimber in 0..3u8 {
                let couple = Couple::new(position.clone(), Nimber(nimber));
                let expected = DfsSolver::new(Arc::new(NimberDatabase::new(false)), false)
                    .solve_couple(&couple);
                let got = pns().solve_couple(&couple).unwrap();
                assert_eq!(got, expected, "{position_str} nimber {nimber}");
            }
        }
    }

    #[test]
    fn two_level_expansion_agrees_with_plain_pns() {
        let position: Kayles = "7".parse().unwrap();
        let couple = Couple::new(position, Nimber::LOSS);
        let plain = pns().solve_couple(&couple).unwrap();
        let two_level = BasicPnsSolver::two_level(
            Arc::new(NimberDatabase::new(false)),
            false,
            Estimator::Uniform,
            1 << 14,
            0,
        )
        .solve_couple(&couple)
        .unwrap();
        assert_eq!(plain, two_level);
        assert_eq!(plain, Outcome::Win);
    }

    #[test]
    fn depth_estimator_still_proves_correct_outcomes() {
        let position: Kayles = "4+3".parse().unwrap();
        let couple = Couple::new(position, Nimber::LOSS);
        let mut solver = BasicPnsSolver::new(
            Arc::new(NimberDatabase::new(false)),
            false,
            Estimator::Depth,
            7,
        );
        let expected = DfsSolver::new(Arc::new(NimberDatabase::new(false)), false)
            .solve_couple(&couple);
        assert_eq!(solver.solve_couple(&couple).unwrap(), expected);
    }
}
