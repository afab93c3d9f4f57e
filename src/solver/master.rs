use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{SolverError, SolverResult};
use crate::game::{Game, Outcome};
use crate::solver::couple::Couple;
use crate::solver::heuristics::Estimator;
use crate::solver::manager::PnsTreeManager;
use crate::solver::nimber::Nimber;
use crate::solver::nimber_db::NimberDatabase;
use crate::solver::node::ExpansionInfo;
use crate::solver::parallel::{GroupConfig, Job, ParallelGroup};
use crate::solver::tree::NodeId;

pub const INIT_NODES_PER_WORKER: usize = 100;

#[derive(Clone, Debug)]
pub struct MasterConfig {
    /// Total worker slots across all groups.
    pub workers: usize,
    /// Threads per worker solver: 0 selects df-pn, 1 or more a PDFPN.
    pub threads: usize,
    /// Total iteration budget per job.
    pub iterations: usize,
    /// Iteration budget per job cycle.
    pub updates: usize,
    /// Workers per group; each group shares one nimber database.
    pub grouping: usize,
    pub branching_depth: usize,
    pub epsilon: f32,
    pub capacity: usize,
    pub estimator: Estimator,
    pub state_level: u8,
    pub no_sharing: bool,
    pub verbose: bool,
    pub seed: u64,
    pub input_database: Option<PathBuf>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            threads: 0,
            iterations: 100,
            updates: 100,
            grouping: 1,
            branching_depth: 0,
            epsilon: 1.0,
            capacity: 100_000,
            estimator: Estimator::Uniform,
            state_level: 0,
            no_sharing: false,
            verbose: false,
            seed: 0,
            input_database: None,
        }
    }
}

#[derive(Clone, Copy)]
struct OpenJob {
    node: NodeId,
    group: usize,
    cycle: usize,
}

/// The in-process master of the dual-level search: a best-first manager
/// tree dispatches bounded jobs to worker groups, repeats unfinished jobs up
/// to their cycle budget, and relays newly discovered nimbers between
/// groups after every batch.
pub struct MasterSolver<G: Game> {
    manager: PnsTreeManager<G>,
    groups: Vec<ParallelGroup<G>>,
    pending_nimbers: Vec<HashMap<G::Compact, Nimber>>,
    max_cycles: usize,
    updates: usize,
    grouping: usize,
    no_sharing: bool,
    verbose: bool,
    assigned_jobs: usize,
    submitted_jobs: usize,
    updated_jobs: usize,
    closed_jobs: usize,
    received_nimbers: usize,
}

impl<G: Game> MasterSolver<G> {
    pub fn new(config: &MasterConfig) -> SolverResult<Self> {
        let grouping = config.grouping.max(1);
        let group_count = (config.workers / grouping).max(1);

        let mut manager = PnsTreeManager::new(config.verbose, config.estimator, config.seed);
        if let Some(path) = &config.input_database {
            manager.load_nimbers(path)?;
        }

        let group_config = GroupConfig {
            group_size: grouping,
            threads: config.threads,
            branching_depth: config.branching_depth,
            epsilon: config.epsilon,
            estimator: config.estimator,
            capacity: config.capacity,
            state_level: config.state_level,
            seed: config.seed,
        };

        let mut groups = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            let db = Arc::new(NimberDatabase::new(true));
            if let Some(path) = &config.input_database {
                db.load(path)?;
            }

            groups.push(ParallelGroup::with_database(group_config, db));
        }

        Ok(Self {
            manager,
            groups,
            pending_nimbers: vec![HashMap::new(); group_count],
            max_cycles: (config.iterations / config.updates.max(1)).max(1),
            updates: config.updates,
            grouping,
            no_sharing: config.no_sharing,
            verbose: config.verbose,
            assigned_jobs: 0,
            submitted_jobs: 0,
            updated_jobs: 0,
            closed_jobs: 0,
            received_nimbers: 0,
        })
    }

    #[must_use]
    pub fn tree_size(&self) -> usize {
        self.manager.tree_size()
    }

    #[must_use]
    pub fn nimbers(&self) -> usize {
        self.manager.nimbers()
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.manager.outcome()
    }

    #[must_use]
    pub fn total_iterations(&self) -> usize {
        self.groups
            .iter()
            .map(|group| group.iterations().iter().sum::<usize>())
            .sum()
    }

    #[must_use]
    pub fn jobs_assigned(&self) -> usize {
        self.assigned_jobs
    }

    #[must_use]
    pub fn jobs_done(&self) -> usize {
        self.submitted_jobs + self.updated_jobs
    }

    #[must_use]
    pub fn jobs_closed(&self) -> usize {
        self.closed_jobs
    }

    /// Nimbers the master learnt from workers rather than computing itself.
    #[must_use]
    pub fn received_nimbers(&self) -> usize {
        self.received_nimbers
    }

    pub fn store_database(&self, path: &Path) -> SolverResult<()> {
        self.manager.store_database(path)
    }

    pub fn prune_tree(&mut self) -> usize {
        self.manager.prune_tree()
    }

    pub fn solve_position(&mut self, position: &G) -> SolverResult<Outcome> {
        self.solve_couple(&Couple::new(position.clone(), Nimber::LOSS))
    }

    pub fn solve_couple(&mut self, root: &Couple<G>) -> SolverResult<Outcome> {
        let group_count = self.groups.len();
        let init_size = group_count * self.grouping * INIT_NODES_PER_WORKER;
        self.manager.init_tree(root, init_size)?;

        let init_nimbers = self.manager.tracked_nimbers(true);
        if !self.no_sharing && !init_nimbers.is_empty() {
            for pending in &mut self.pending_nimbers {
                pending.extend(init_nimbers.clone());
            }
        }

        let mut open_jobs: HashMap<String, OpenJob> = HashMap::new();
        let mut in_flight = vec![0usize; group_count];

        while !self.manager.is_proved() {
            let assigned = self.assign_jobs(&mut open_jobs, &mut in_flight)?;

            let mut progressed = assigned > 0;
            for group in 0..group_count {
                let (completed, failed) = self.groups[group].drain_completed();
                progressed |= !completed.is_empty() || !failed.is_empty();
                self.process_batch(group, completed, failed, &mut open_jobs, &mut in_flight)?;
            }

            self.share_nimbers()?;

            if self.manager.is_proved() {
                break;
            }

            if !progressed {
                match (0..group_count).find(|&group| in_flight[group] > 0) {
                    Some(group) => {
                        let (completed, failed) = self.groups[group].wait_completed();
                        self.process_batch(
                            group,
                            completed,
                            failed,
                            &mut open_jobs,
                            &mut in_flight,
                        )?;
                        self.share_nimbers()?;
                    }
                    // Nothing running, nothing assignable, nothing open:
                    // the search cannot make further progress.
                    None if open_jobs.is_empty() => break,
                    None => {}
                }
            }
        }

        Ok(self.manager.outcome())
    }

    fn assign_jobs(
        &mut self,
        open_jobs: &mut HashMap<String, OpenJob>,
        in_flight: &mut [usize],
    ) -> SolverResult<usize> {
        let mut assigned = 0;
        for group in 0..self.groups.len() {
            let free = self.grouping.saturating_sub(in_flight[group]);
            if free == 0 {
                continue;
            }

            let mut jobs: Vec<Job<G>> = Vec::new();
            while jobs.len() < free {
                let Some(node) = self.manager.get_job()? else {
                    break;
                };

                let couple = self.manager.node_couple(node);
                open_jobs.insert(
                    couple.to_compact().to_string(),
                    OpenJob {
                        node,
                        group,
                        cycle: 0,
                    },
                );
                jobs.push((couple, self.updates));
                self.assigned_jobs += 1;
            }

            if jobs.is_empty() {
                continue;
            }

            self.push_pending_nimbers(group);
            in_flight[group] += jobs.len();
            assigned += jobs.len();
            self.groups[group].submit(jobs);
        }

        Ok(assigned)
    }

    fn push_pending_nimbers(&mut self, group: usize) {
        if self.no_sharing || self.pending_nimbers[group].is_empty() {
            return;
        }

        let nimbers = std::mem::take(&mut self.pending_nimbers[group]);
        self.groups[group].add_nimbers(nimbers);
    }

    fn process_batch(
        &mut self,
        group: usize,
        completed: Vec<ExpansionInfo>,
        failed: Vec<String>,
        open_jobs: &mut HashMap<String, OpenJob>,
        in_flight: &mut [usize],
    ) -> SolverResult<()> {
        let mut resubmit: Vec<Job<G>> = Vec::new();

        for info in completed {
            in_flight[group] = in_flight[group].saturating_sub(1);
            match self.process_completion(info, open_jobs, &mut resubmit) {
                Ok(()) => {}
                Err(SolverError::JobNotOpen(job)) => {
                    if self.verbose {
                        eprintln!("任务已过期，丢弃: {job}");
                    }
                }
                Err(err) => return Err(err),
            }
        }

        for job in failed {
            in_flight[group] = in_flight[group].saturating_sub(1);
            if let Some(open) = open_jobs.remove(&job) {
                self.manager.close_job(open.node)?;
                self.closed_jobs += 1;
            }
        }

        if !resubmit.is_empty() {
            in_flight[group] += resubmit.len();
            self.push_pending_nimbers(group);
            self.groups[group].submit(resubmit);
        }

        Ok(())
    }

    fn process_completion(
        &mut self,
        info: ExpansionInfo,
        open_jobs: &mut HashMap<String, OpenJob>,
        resubmit: &mut Vec<Job<G>>,
    ) -> SolverResult<()> {
        let Some(open) = open_jobs.get(&info.parent).copied() else {
            return Err(SolverError::JobNotOpen(info.parent));
        };

        let cycle = open.cycle + 1;
        let final_result =
            info.pn.is_proved() || cycle >= self.max_cycles || self.manager.root_locked();

        if final_result {
            open_jobs.remove(&info.parent);
            if info.pn.is_proved() {
                self.manager.update_job(open.node, info.pn)?;
                self.updated_jobs += 1;
            } else {
                self.manager.submit_job(open.node, &info)?;
                self.submitted_jobs += 1;
            }
        } else {
            open_jobs.insert(info.parent.clone(), OpenJob { cycle, ..open });
            resubmit.push((Couple::parse(&info.parent)?, self.updates));
        }

        Ok(())
    }

    fn share_nimbers(&mut self) -> SolverResult<()> {
        if self.no_sharing {
            return Ok(());
        }

        for group in 0..self.groups.len() {
            let new_nimbers = self.groups[group].tracked_nimbers(true);
            if new_nimbers.is_empty() {
                continue;
            }

            self.received_nimbers += self.manager.add_nimbers(new_nimbers.clone())?;
            for other in 0..self.groups.len() {
                if other != group {
                    self.pending_nimbers[other].extend(new_nimbers.clone());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::kayles::Kayles;
    use crate::solver::dfs::DfsSolver;

    fn oracle(couple: &Couple<Kayles>) -> Outcome {
        DfsSolver::new(Arc::new(NimberDatabase::new(false)), false).solve_couple(couple)
    }

    fn config(workers: usize, threads: usize) -> MasterConfig {
        MasterConfig {
            workers,
            threads,
            iterations: 40,
            updates: 10,
            capacity: 1 << 16,
            ..MasterConfig::default()
        }
    }

    #[test]
    fn single_worker_master_matches_the_oracle() {
        let couple = Couple::new("6".parse().unwrap(), Nimber::LOSS);
        let mut master: MasterSolver<Kayles> = MasterSolver::new(&config(1, 0)).unwrap();
        assert_eq!(master.solve_couple(&couple).unwrap(), oracle(&couple));
    }

    #[test]
    fn multi_group_master_matches_the_oracle() {
        for position_str in ["7", "3+4"] {
            let couple = Couple::new(position_str.parse().unwrap(), Nimber::LOSS);
            let mut master: MasterSolver<Kayles> = MasterSolver::new(&config(2, 0)).unwrap();
            assert_eq!(
                master.solve_couple(&couple).unwrap(),
                oracle(&couple),
                "{position_str}"
            );
        }
    }

    #[test]
    fn pdfpn_workers_under_the_master_match_the_oracle() {
        let couple = Couple::new("8".parse().unwrap(), Nimber::LOSS);
        let mut master: MasterSolver<Kayles> = MasterSolver::new(&config(2, 2)).unwrap();
        assert_eq!(master.solve_couple(&couple).unwrap(), oracle(&couple));
    }

    #[test]
    fn nimber_sharing_fills_the_master_database() {
        let couple = Couple::new("7".parse().unwrap(), Nimber::LOSS);
        let mut master: MasterSolver<Kayles> = MasterSolver::new(&config(2, 0)).unwrap();
        master.solve_couple(&couple).unwrap();
        assert!(master.nimbers() > 0);
    }
}
