use std::collections::HashMap;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::SolverResult;
use crate::game::{Game, Outcome};
use crate::solver::couple::{CompactCouple, Couple};
use crate::solver::heuristics::Estimator;
use crate::solver::logger::Logger;
use crate::solver::nimber::Nimber;
use crate::solver::nimber_db::NimberDatabase;
use crate::solver::node::ExpansionInfo;
use crate::solver::proof_numbers::ProofNumbers;
use crate::solver::tree::{NodeId, PnsTree};

/// The master best-first tree for distributed solving: hands out locked
/// most-proving couples as jobs, integrates the returned expansions, and
/// propagates nimber discoveries into every transposition of the affected
/// position.
pub struct PnsTreeManager<G: Game> {
    db: NimberDatabase<G>,
    tree: PnsTree<G>,
    iterations: usize,
    logger: Option<Logger>,
    rng: Option<StdRng>,
}

impl<G: Game> PnsTreeManager<G> {
    #[must_use]
    pub fn new(verbose: bool, estimator: Estimator, seed: u64) -> Self {
        Self {
            db: NimberDatabase::new(true),
            tree: PnsTree::new(estimator),
            iterations: 0,
            logger: verbose.then(Logger::new),
            rng: (seed > 0).then(|| StdRng::seed_from_u64(seed)),
        }
    }

    #[must_use]
    pub fn nimbers(&self) -> usize {
        self.db.len()
    }

    #[must_use]
    pub fn tree_size(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub fn is_proved(&self) -> bool {
        self.tree.is_proved()
    }

    #[must_use]
    pub fn root_locked(&self) -> bool {
        self.tree
            .root()
            .is_none_or(|root| self.tree.info(root).locked)
    }

    #[must_use]
    pub fn root_proof_numbers(&self) -> Option<ProofNumbers> {
        self.tree.root().map(|root| self.tree.info(root).pn)
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.root_proof_numbers()
            .map_or(Outcome::Unknown, ProofNumbers::to_outcome)
    }

    #[must_use]
    pub fn locked_nodes_number(&self) -> usize {
        self.tree.locked_nodes_number()
    }

    #[must_use]
    pub fn get_node(&self, compact: &CompactCouple<G>) -> Option<NodeId> {
        self.tree.get_node(compact)
    }

    #[must_use]
    pub fn node_couple(&self, id: NodeId) -> Couple<G> {
        Couple::from_compact(&self.tree.state(id).compact)
    }

    pub fn clear_nimbers(&mut self) {
        self.db.clear();
    }

    pub fn load_nimbers(&mut self, path: &Path) -> SolverResult<usize> {
        self.db.load(path)
    }

    pub fn store_database(&self, path: &Path) -> SolverResult<()> {
        self.db.store(path, true)
    }

    #[must_use]
    pub fn tracked_nimbers(&mut self, clear: bool) -> HashMap<G::Compact, Nimber> {
        self.db.tracked(clear)
    }

    pub fn prune_tree(&mut self) -> usize {
        self.tree.prune_unreachable()
    }

    /// Roots the tree and grows it locally (using only the nimber database)
    /// until it holds `init_size` nodes or the root is proved.
    pub fn init_tree(&mut self, root: &Couple<G>, init_size: usize) -> SolverResult<()> {
        self.iterations = 0;
        self.tree.clear();
        self.tree.set_root(root);

        while !self.tree.is_proved() && init_size > 0 && self.tree.len() < init_size {
            let Some(mpn) = self
                .tree
                .get_mpn(self.rng.as_mut(), true, self.logger.as_mut())
            else {
                break;
            };

            self.tree.expand_node(mpn, &self.db);
            self.tree.update_paths(mpn, &self.db)?;
            self.iterations += 1;
        }

        Ok(())
    }

    /// Locks and returns the current most-proving node, or `None` when no
    /// unlocked MPN exists.
    pub fn get_job(&mut self) -> SolverResult<Option<NodeId>> {
        let Some(mpn) = self
            .tree
            .get_mpn(self.rng.as_mut(), true, self.logger.as_mut())
        else {
            return Ok(None);
        };

        self.tree.lock(mpn);
        self.tree.update_paths(mpn, &self.db)?;
        Ok(Some(mpn))
    }

    /// Accepts a proof for a job without expanding it; used when a job is
    /// reported proved while being reassigned across cycles.
    pub fn update_job(&mut self, id: NodeId, pn: ProofNumbers) -> SolverResult<()> {
        debug_assert!(pn.is_proved());
        self.tree.set_proof_numbers(id, pn);
        self.tree.update_paths(id, &self.db)
    }

    /// Integrates a completed job: expands the node with the reported
    /// children and merged nimber, then unlocks and propagates.
    pub fn submit_job(&mut self, id: NodeId, info: &ExpansionInfo) -> SolverResult<()> {
        self.iterations += 1;
        self.tree.expand_with_info(id, info)?;
        self.close_job(id)
    }

    /// Unlocks a job so it becomes assignable again.
    pub fn close_job(&mut self, id: NodeId) -> SolverResult<()> {
        self.tree.unlock(id);
        self.tree.update_paths(id, &self.db)
    }

    /// Propagates newly-reported nimbers: every tree node over an affected
    /// position is proved by the parity of the reported nimber against its
    /// own, then the entries are bulk-inserted. Returns the number of
    /// actually new entries.
    pub fn add_nimbers(
        &mut self,
        nimbers: HashMap<G::Compact, Nimber>,
    ) -> SolverResult<usize> {
        for (position, nimber) in &nimbers {
            if self.db.get(position).is_some() {
                continue;
            }

            for node in self.tree.nodes_for_position(position) {
                let merged = Nimber::merge(*nimber, self.tree.state(node).compact.nimber);
                if merged.is_win() {
                    self.tree.set_to_win(node);
                } else {
                    self.tree.set_to_loss(node);
                }

                self.tree.update_paths(node, &self.db)?;
            }
        }

        Ok(self.db.add_nimbers(nimbers))
    }
}
