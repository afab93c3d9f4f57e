use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::SolverResult;
use crate::game::Game;
use crate::solver::couple::Couple;
use crate::solver::heuristics::Estimator;
use crate::solver::logger::Logger;
use crate::solver::nimber_db::NimberDatabase;
use crate::solver::node::{ExpansionInfo, PathNode};
use crate::solver::proof_numbers::{Pn, ProofNumbers};
use crate::solver::tt::{PnsDatabase, StoredNodeInfo};
use crate::solver::{NO_LIMIT, PnsSolver};

const BACKUP_FREQ: Duration = Duration::from_secs(24 * 60 * 60);

/// The quintuple governing each df-pn node. Thresholds guarantee that as
/// long as they hold, the most-proving node stays inside the subtree of the
/// current node, so the search may keep deepening without returning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
    pub proof_th: Pn,
    pub disproof_th: Pn,
    pub p_shift: Pn,
    pub d_shift: Pn,
    pub min_th: Pn,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            proof_th: Pn::INF,
            disproof_th: Pn::INF,
            p_shift: Pn::ZERO,
            d_shift: Pn::ZERO,
            min_th: Pn::INF,
        }
    }
}

impl Thresholds {
    #[must_use]
    pub fn are_holding(&self, pn: ProofNumbers) -> bool {
        let shifted = pn
            .proof
            .saturating_add(self.p_shift.value())
            .min(pn.disproof.saturating_add(self.d_shift.value()));
        pn.proof < self.proof_th && pn.disproof < self.disproof_th && shifted < self.min_th
    }

    /// Pure threshold transition onto the chosen most-proving child.
    pub fn descend(
        &self,
        multi_land: bool,
        children_len: usize,
        parent: ProofNumbers,
        mpn: ProofNumbers,
        switching: Pn,
        epsilon: f32,
    ) -> SolverResult<Self> {
        if multi_land {
            self.descend_lands(children_len, parent, mpn, switching)
        } else {
            self.descend_plain(parent, mpn, switching, epsilon)
        }
    }

    /// All subgames must be disproved to disprove the parent, so a single
    /// min-threshold governs the child while proof and disproof thresholds
    /// stay open.
    fn descend_lands(
        &self,
        children_len: usize,
        parent: ProofNumbers,
        mpn: ProofNumbers,
        switching: Pn,
    ) -> SolverResult<Self> {
        if children_len == 1 {
            return Ok(*self);
        }

        let base = self
            .proof_th
            .min(self.disproof_th)
            .min(self.min_th.sub(self.p_shift.min(self.d_shift))?);
        let min_th = switching.min(
            base.sub(parent.proof)?
                .add(mpn.proof.min(mpn.disproof))?,
        );

        Ok(Self {
            proof_th: Pn::INF,
            disproof_th: Pn::INF,
            p_shift: Pn::ZERO,
            d_shift: Pn::ZERO,
            min_th,
        })
    }

    fn descend_plain(
        &self,
        parent: ProofNumbers,
        mpn: ProofNumbers,
        switching: Pn,
        epsilon: f32,
    ) -> SolverResult<Self> {
        let other_proofs = parent.disproof.sub(mpn.proof)?;
        let proof_th = self.disproof_th.sub(parent.disproof)?.add(mpn.proof)?;

        let disproof_th = if epsilon > 1.0 {
            let widened = if switching.is_inf() {
                Pn::INF
            } else {
                Pn::new(((1.0 + f64::from(epsilon)) * switching.value() as f64) as u64)
            };
            self.proof_th.min(widened)
        } else {
            self.proof_th.min(switching)
        };

        Ok(Self {
            proof_th,
            disproof_th,
            p_shift: self.d_shift.add(other_proofs)?,
            d_shift: self.p_shift,
            min_th: self.min_th,
        })
    }
}

/// Sequential depth-first proof-number search. A single path lives on the
/// call stack; everything learnt is memoised in the transposition table and
/// the nimber database.
pub struct DfpnSolver<G: Game> {
    db: Arc<NimberDatabase<G>>,
    pns_db: PnsDatabase<G>,
    estimator: Estimator,
    epsilon: f32,
    rng: Option<StdRng>,
    logger: Option<Logger>,
    iterations: usize,
    max_iterations: usize,
    current_tree_size: usize,
    max_tree_size: usize,
    last_backup: Instant,
    backup_path: PathBuf,
}

impl<G: Game> DfpnSolver<G> {
    #[must_use]
    pub fn new(
        db: Arc<NimberDatabase<G>>,
        verbose: bool,
        estimator: Estimator,
        capacity: usize,
        seed: u64,
    ) -> Self {
        Self {
            db,
            pns_db: PnsDatabase::new(capacity),
            estimator,
            epsilon: 1.0,
            rng: (seed > 0).then(|| StdRng::seed_from_u64(seed)),
            logger: verbose.then(Logger::new),
            iterations: 0,
            max_iterations: NO_LIMIT,
            current_tree_size: 0,
            max_tree_size: 0,
            last_backup: Instant::now(),
            backup_path: PathBuf::new(),
        }
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon;
    }

    #[must_use]
    pub fn pns_database(&self) -> &PnsDatabase<G> {
        &self.pns_db
    }

    fn max_iterations_reached(&self) -> bool {
        self.max_iterations != NO_LIMIT && self.iterations >= self.max_iterations
    }

    fn make_child(&self, couple: &Couple<G>) -> PathNode<G> {
        match self.pns_db.find(&couple.to_compact()) {
            Some(info) => {
                PathNode::with_info(couple, info.pn, info.iterations, info.thread_ids.len())
            }
            None => PathNode::with_info(couple, self.estimator.estimate(couple), 0, 0),
        }
    }

    fn dfpn(&mut self, node: &mut PathNode<G>, thresholds: &Thresholds) -> SolverResult<usize> {
        let db = Arc::clone(&self.db);
        node.expand(&mut |c| self.make_child(c), &db);
        node.update(&mut |c| self.make_child(c), &db)?;

        let children_num = node.children.len();
        self.current_tree_size += children_num;
        self.max_tree_size = self
            .max_tree_size
            .max(self.current_tree_size + self.pns_db.len());

        if let Some(logger) = &mut self.logger {
            logger.add_node();
        }

        let mut local_iterations = 1usize;
        self.iterations += 1;

        while thresholds.are_holding(node.info.pn) && !self.max_iterations_reached() {
            let (mpn_idx, mpn2_idx) = node.get_mpn_idx(self.rng.as_mut(), false);
            let switching = mpn2_idx
                .map(|idx| node.switching_threshold(mpn_idx, idx))
                .unwrap_or(Pn::INF);
            let child_thresholds = thresholds.descend(
                node.is_multi_land(),
                node.children.len(),
                node.proof_numbers(),
                node.children[mpn_idx].proof_numbers(),
                switching,
                self.epsilon,
            )?;

            if let Some(logger) = &mut self.logger {
                logger.update_last_node(mpn_idx, node.children.len(), node.is_multi_land());
                logger.log();
            }

            let mpn_iterations = self.dfpn(&mut node.children[mpn_idx], &child_thresholds)?;
            local_iterations += mpn_iterations;
            node.update(&mut |c| self.make_child(c), &db)?;
        }

        node.add_iterations(local_iterations);
        self.update_databases(node);
        self.check_backup()?;

        self.current_tree_size -= children_num;
        if let Some(logger) = &mut self.logger {
            logger.pop_node();
        }

        node.close();
        Ok(local_iterations)
    }

    fn update_databases(&mut self, node: &PathNode<G>) {
        let compact = &node.state.compact;
        if node.info.pn.is_loss() && !node.is_multi_land() {
            self.db.insert(compact.position.clone(), compact.nimber);
        }

        self.pns_db.insert(
            compact.clone(),
            StoredNodeInfo::new(node.info.pn, node.info.iterations),
        );
    }

    fn check_backup(&mut self) -> SolverResult<()> {
        if self.last_backup.elapsed() < BACKUP_FREQ {
            return Ok(());
        }

        let start = Instant::now();
        self.db.store(&self.backup_path, true)?;
        self.last_backup = Instant::now();
        println!("数据库已备份，耗时 {} ms", start.elapsed().as_millis());
        Ok(())
    }
}

impl<G: Game> PnsSolver<G> for DfpnSolver<G> {
    fn expand_couple(
        &mut self,
        couple: &Couple<G>,
        max_iterations: usize,
    ) -> SolverResult<ExpansionInfo> {
        self.iterations = 0;
        self.max_iterations = max_iterations;
        self.backup_path = PathBuf::from(format!("{}_backup.spr", couple.position.lives() / 3));
        self.current_tree_size = 0;
        self.max_tree_size = 0;

        let mut root = PathNode::new(couple);
        self.dfpn(&mut root, &Thresholds::default())?;

        if let Some(logger) = &mut self.logger {
            logger.clear_log();
        }

        let db = Arc::clone(&self.db);
        root.expand(&mut |c| self.make_child(c), &db);
        root.update(&mut |c| self.make_child(c), &db)?;
        Ok(root.get_expansion_info())
    }

    fn clear_tree(&mut self) {
        self.pns_db.clear();
    }

    fn tree_size(&self) -> usize {
        self.max_tree_size
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
    use crate::solver::tt::DEFAULT_TABLE_CAPACITY;

    fn dfpn() -> DfpnSolver<Kayles> {
        DfpnSolver::new(
            Arc::new(NimberDatabase::new(false)),
            false,
            Estimator::Uniform,
            1 << 16,
            0,
        )
    }

    #[test]
    fn default_thresholds_hold_until_proof() {
        let thresholds = Thresholds::default();
        assert!(thresholds.are_holding(ProofNumbers::default()));
        assert!(!thresholds.are_holding(ProofNumbers::WIN));
        assert!(!thresholds.are_holding(ProofNumbers::LOSS));
    }

    #[test]
    fn plain_descent_bounds_the_child_by_the_runner_up() {
        let thresholds = Thresholds::default();
        let parent = ProofNumbers::new(Pn::new(2), Pn::new(5));
        let mpn = ProofNumbers::new(Pn::new(2), Pn::new(2));
        let child = thresholds
            .descend(false, 3, parent, mpn, Pn::new(3), 1.0)
            .unwrap();
        assert_eq!(child.disproof_th, Pn::new(3));
        assert_eq!(child.proof_th, Pn::INF);
        assert_eq!(child.p_shift, Pn::new(3));
        assert_eq!(child.d_shift, Pn::ZERO);
        assert_eq!(child.min_th, Pn::INF);
    }

    #[test]
    fn lands_descent_with_one_child_passes_through() {
        let thresholds = Thresholds {
            proof_th: Pn::new(10),
            disproof_th: Pn::new(20),
            p_shift: Pn::new(1),
            d_shift: Pn::new(2),
            min_th: Pn::new(30),
        };
        let child = thresholds
            .descend(
                true,
                1,
                ProofNumbers::default(),
                ProofNumbers::default(),
                Pn::INF,
                1.0,
            )
            .unwrap();
        assert_eq!(child, thresholds);
    }

    #[test]
    fn lands_descent_is_governed_by_the_min_threshold_alone(){
        let thresholds = Thresholds {
            proof_th: Pn::new(10),
            disproof_th: Pn::new(12),
            p_shift: Pn::new(1),
            d_shift: Pn::new(3),
            min_th: Pn::new(9),
        };
        let parent = ProofNumbers::new(Pn::new(4), Pn::new(4));
        let mpn = ProofNumbers::new(Pn::new(3), Pn::new(2));
        let child = thresholds
            .descend(true, 2, parent, mpn, Pn::new(5), 1.0)
            .unwrap();
        // min(switching, min(10, 12, 9 - 1) - 4 + 2) = min(5, 6) = 5
        assert_eq!(child.min_th, Pn::new(5));
        assert_eq!(child.proof_th, Pn::INF);
        assert_eq!(child.disproof_th, Pn::INF);
        assert_eq!(child.p_shift, Pn::ZERO);
        assert_eq!(child.d_shift, Pn::ZERO);
    }

    #[test]
    fn dfpn_matches_the_dfs_oracle_on_small_positions() {
        let positions = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "2+3", "4+4", "1+2+3"];
        for position_str in positions {
            let position: Kayles = position_str.parse().unwrap();
            for nimber in 0..4u8 {
                let couple = Couple::new(position.clone(), Nimber(nimber));
                let expected =
                    DfsSolver::new(Arc::new(NimberDatabase::new(false)), false)
                        .solve_couple(&couple);
                let got = dfpn().solve_couple(&couple).unwrap();
                assert_eq!(got, expected, "{position_str} nimber {nimber}");
            }
        }
    }

    #[test]
    fn iteration_budget_yields_unknown() {
        let position: Kayles = "9".parse().unwrap();
        let mut solver = dfpn();
        let info = solver
            .expand_couple(&Couple::new(position, Nimber::LOSS), 2)
            .unwrap();
        assert_eq!(info.pn.to_outcome(), Outcome::Unknown);
        assert!(solver.iterations() >= 2);
    }

    #[test]
    fn solved_losses_populate_the_nimber_database() {
        let position: Kayles = "6".parse().unwrap();
        let mut solver = dfpn();
        let outcome = solver
            .solve_couple(&Couple::new(position.clone(), Nimber(3)))
            .unwrap();
        assert_eq!(outcome, Outcome::Loss);
        assert_eq!(
            solver.nimber_database().get(&position.to_compact()),
            Some(Nimber(3))
        );
    }

    #[test]
    fn default_capacity_constant_is_large() {
        assert!(DEFAULT_TABLE_CAPACITY >= 1_000_000);
    }
}
