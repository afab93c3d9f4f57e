use std::sync::Arc;

use crate::error::SolverResult;
use crate::game::{Game, Outcome};

pub mod basic_pns;
pub mod couple;
pub mod dfpn;
pub mod dfs;
pub mod heuristics;
pub mod jobs;
pub mod logger;
pub mod mailbox;
pub mod manager;
pub mod master;
pub mod nimber;
pub mod nimber_db;
pub mod node;
pub mod parallel;
pub mod proof_numbers;
pub mod tree;
pub mod tt;

pub use basic_pns::BasicPnsSolver;
pub use couple::{CompactCouple, Couple, CoupleExpansion};
pub use dfpn::{DfpnSolver, Thresholds};
pub use dfs::DfsSolver;
pub use heuristics::Estimator;
pub use jobs::{CompletedJob, JobAssignment};
pub use manager::PnsTreeManager;
pub use master::{MasterConfig, MasterSolver};
pub use nimber::Nimber;
pub use nimber_db::NimberDatabase;
pub use node::ExpansionInfo;
pub use parallel::{GroupConfig, ParallelDfpn, ParallelGroup};
pub use proof_numbers::{Pn, ProofNumbers};
pub use tree::PnsTree;
pub use tt::{BucketTable, PnsDatabase, StoredNodeInfo};

/// Sentinel for an unbounded iteration budget.
pub const NO_LIMIT: usize = 0;

/// Common surface of the proof-number solvers: a bounded expansion of one
/// couple, reported as the resulting expansion info.
pub trait PnsSolver<G: Game> {
    fn expand_couple(
        &mut self,
        couple: &Couple<G>,
        max_iterations: usize,
    ) -> SolverResult<node::ExpansionInfo>;

    fn solve_couple(&mut self, couple: &Couple<G>) -> SolverResult<Outcome> {
        Ok(self.expand_couple(couple, NO_LIMIT)?.pn.to_outcome())
    }

    fn solve_position(&mut self, position: &G) -> SolverResult<Outcome> {
        self.solve_couple(&Couple::new(position.clone(), Nimber::LOSS))
    }

    fn clear_tree(&mut self);
    fn tree_size(&self) -> usize;
    fn iterations(&self) -> usize;

    fn nimber_database(&self) -> &Arc<nimber_db::NimberDatabase<G>>;

    fn clear_nimbers(&self) {
        self.nimber_database().clear();
    }
}
