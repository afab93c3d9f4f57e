use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::error::SolverResult;
use crate::game::Game;
use crate::solver::basic_pns::BasicPnsSolver;
use crate::solver::couple::{CompactCouple, Couple};
use crate::solver::dfpn::DfpnSolver;
use crate::solver::heuristics::Estimator;
use crate::solver::nimber::Nimber;
use crate::solver::nimber_db::NimberDatabase;
use crate::solver::node::ExpansionInfo;
use crate::solver::parallel::ParallelDfpn;
use crate::solver::PnsSolver;

pub type Job<G> = (Couple<G>, usize);

#[derive(Clone, Copy, Debug)]
pub struct GroupConfig {
    pub group_size: usize,
    /// Threads per solver: 0 selects sequential df-pn, 1 or more a PDFPN.
    pub threads: usize,
    pub branching_depth: usize,
    pub epsilon: f32,
    pub estimator: Estimator,
    pub capacity: usize,
    /// 0 keeps all worker state between jobs, 1 drops the transposition
    /// tree, 2 drops the tree and the nimbers.
    pub state_level: u8,
    pub seed: u64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            group_size: 1,
            threads: 0,
            branching_depth: 0,
            epsilon: 1.0,
            estimator: Estimator::Uniform,
            capacity: 100_000,
            state_level: 0,
            seed: 0,
        }
    }
}

struct GroupState<G: Game> {
    unassigned: Vec<Job<G>>,
    assigned: Vec<Option<Job<G>>>,
    completed: Vec<ExpansionInfo>,
    failed: Vec<String>,
    last_roots: Vec<Option<CompactCouple<G>>>,
    jobs_num: Vec<usize>,
    mini_jobs_num: Vec<usize>,
    tree_sizes: Vec<usize>,
    iterations: Vec<usize>,
    working_ms: Vec<u64>,
    waiting_ms: Vec<u64>,
    waiting_start: Vec<Instant>,
    terminate: bool,
}

struct Shared<G: Game> {
    state: Mutex<GroupState<G>>,
    cv: Condvar,
}

fn build_solver<G: Game>(
    config: &GroupConfig,
    db: Arc<NimberDatabase<G>>,
) -> Box<dyn PnsSolver<G> + Send> {
    if config.threads >= 1 {
        Box::new(ParallelDfpn::new(
            config.threads,
            config.branching_depth,
            config.epsilon,
            db,
            config.estimator,
            config.capacity,
            config.seed,
        ))
    } else if config.state_level == 0 {
        Box::new(DfpnSolver::new(
            db,
            false,
            config.estimator,
            config.capacity,
            config.seed,
        ))
    } else {
        Box::new(BasicPnsSolver::new(db, false, config.estimator, config.seed))
    }
}

fn run_worker<G: Game>(
    shared: Arc<Shared<G>>,
    db: Arc<NimberDatabase<G>>,
    config: GroupConfig,
    worker_id: usize,
) {
    let mut solver = build_solver(&config, Arc::clone(&db));
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if state.terminate {
                    return;
                }

                if let Some(job) = state.assigned[worker_id].take() {
                    break job;
                }

                if let Some(job) = state.unassigned.pop() {
                    break job;
                }

                shared.cv.wait(&mut state);
            }
        };

        {
            let mut state = shared.state.lock();
            if state.jobs_num[worker_id] > 0 {
                let waited = state.waiting_start[worker_id].elapsed().as_millis() as u64;
                state.waiting_ms[worker_id] += waited;
            }

            let root = job.0.to_compact();
            if state.jobs_num[worker_id] == 0
                || state.last_roots[worker_id].as_ref() != Some(&root)
            {
                state.last_roots[worker_id] = Some(root);
                state.jobs_num[worker_id] += 1;

                if config.state_level > 1 {
                    solver.clear_nimbers();
                }
                if config.state_level > 0 {
                    solver.clear_tree();
                }
            }
        }

        let start = Instant::now();
        let result = solver.expand_couple(&job.0, job.1);
        let elapsed = start.elapsed();

        let mut state = shared.state.lock();
        match result {
            Ok(info) => state.completed.push(info),
            Err(err) => {
                eprintln!("工作线程 {worker_id} 任务失败: {err}");
                state.failed.push(job.0.to_compact().to_string());
            }
        }

        state.tree_sizes[worker_id] = solver.tree_size();
        state.iterations[worker_id] += solver.iterations();
        state.mini_jobs_num[worker_id] += 1;
        state.working_ms[worker_id] += elapsed.as_millis() as u64;
        state.waiting_start[worker_id] = Instant::now();
        drop(state);
        shared.cv.notify_all();
    }
}

/// A pool of solvers sharing one nimber database and fed a stream of
/// `(couple, iteration budget)` jobs. Jobs whose root matches the couple a
/// worker handled last are routed back to that worker so its transposition
/// table stays warm.
pub struct ParallelGroup<G: Game> {
    shared: Arc<Shared<G>>,
    db: Arc<NimberDatabase<G>>,
    group_size: usize,
    threads: Vec<JoinHandle<()>>,
}

impl<G: Game> ParallelGroup<G> {
    #[must_use]
    pub fn new(config: GroupConfig) -> Self {
        Self::with_database(config, Arc::new(NimberDatabase::new(true)))
    }

    #[must_use]
    pub fn with_database(config: GroupConfig, db: Arc<NimberDatabase<G>>) -> Self {
        let group_size = config.group_size.max(1);
        let state = GroupState {
            unassigned: Vec::new(),
            assigned: vec![None; group_size],
            completed: Vec::new(),
            failed: Vec::new(),
            last_roots: vec![None; group_size],
            jobs_num: vec![0; group_size],
            mini_jobs_num: vec![0; group_size],
            tree_sizes: vec![0; group_size],
            iterations: vec![0; group_size],
            working_ms: vec![0; group_size],
            waiting_ms: vec![0; group_size],
            waiting_start: vec![Instant::now(); group_size],
            terminate: false,
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            cv: Condvar::new(),
        });

        let threads = (0..group_size)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                let db = Arc::clone(&db);
                std::thread::spawn(move || run_worker(shared, db, config, worker_id))
            })
            .collect();

        Self {
            shared,
            db,
            group_size,
            threads,
        }
    }

    #[must_use]
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Queues jobs, preferring the worker whose last root matches.
    pub fn submit(&self, jobs: Vec<Job<G>>) {
        if jobs.is_empty() {
            return;
        }

        let mut state = self.shared.state.lock();
        for job in jobs {
            let root = job.0.to_compact();
            let affine = (0..self.group_size).find(|&i| {
                state.assigned[i].is_none() && state.last_roots[i].as_ref() == Some(&root)
            });

            match affine {
                Some(worker) => state.assigned[worker] = Some(job),
                None => state.unassigned.push(job),
            }
        }

        drop(state);
        self.shared.cv.notify_all();
    }

    /// Non-blocking drain of finished and failed jobs.
    #[must_use]
    pub fn drain_completed(&self) -> (Vec<ExpansionInfo>, Vec<String>) {
        let mut state = self.shared.state.lock();
        (
            std::mem::take(&mut state.completed),
            std::mem::take(&mut state.failed),
        )
    }

    /// Blocks until at least one job finishes, then drains.
    #[must_use]
    pub fn wait_completed(&self) -> (Vec<ExpansionInfo>, Vec<String>) {
        let mut state = self.shared.state.lock();
        self.shared
            .cv
            .wait_while(&mut state, |s| s.completed.is_empty() && s.failed.is_empty());
        (
            std::mem::take(&mut state.completed),
            std::mem::take(&mut state.failed),
        )
    }

    /// Distributes jobs to the group and blocks until at least one of them
    /// completes, returning the finished expansions.
    pub fn expand(&self, jobs: Vec<Job<G>>) -> SolverResult<Vec<ExpansionInfo>> {
        self.submit(jobs);
        let (completed, _failed) = self.wait_completed();
        Ok(completed)
    }

    #[must_use]
    pub fn nimbers(&self) -> usize {
        self.db.len()
    }

    pub fn clear_nimbers(&self) {
        self.db.clear();
    }

    pub fn add_nimbers(&self, nimbers: HashMap<G::Compact, Nimber>) -> usize {
        self.db.add_nimbers(nimbers)
    }

    #[must_use]
    pub fn tracked_nimbers(&self, clear: bool) -> HashMap<G::Compact, Nimber> {
        self.db.tracked(clear)
    }

    pub fn load_nimbers(&self, path: &std::path::Path) -> SolverResult<usize> {
        self.db.load(path)
    }

    pub fn store_database(&self, path: &std::path::Path) -> SolverResult<()> {
        self.db.store(path, false)
    }

    #[must_use]
    pub fn tree_sizes(&self) -> Vec<usize> {
        self.shared.state.lock().tree_sizes.clone()
    }

    #[must_use]
    pub fn iterations(&self) -> Vec<usize> {
        self.shared.state.lock().iterations.clone()
    }

    #[must_use]
    pub fn jobs_num(&self) -> Vec<usize> {
        self.shared.state.lock().jobs_num.clone()
    }

    #[must_use]
    pub fn mini_jobs_num(&self) -> Vec<usize> {
        self.shared.state.lock().mini_jobs_num.clone()
    }

    #[must_use]
    pub fn working_times(&self) -> Vec<u64> {
        self.shared.state.lock().working_ms.clone()
    }

    #[must_use]
    pub fn waiting_times(&self) -> Vec<u64> {
        self.shared.state.lock().waiting_ms.clone()
    }
}

impl<G: Game> Drop for ParallelGroup<G> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.terminate = true;
        }
        self.shared.cv.notify_all();

        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Outcome;
    use crate::games::kayles::Kayles;
    use crate::solver::dfs::DfsSolver;
    use crate::solver::NO_LIMIT;

    fn job(position: &str, nimber: u8) -> Job<Kayles> {
        (
            Couple::new(position.parse().unwrap(), Nimber(nimber)),
            NO_LIMIT,
        )
    }

    #[test]
    fn group_completes_submitted_jobs() {
        let group: ParallelGroup<Kayles> = ParallelGroup::new(GroupConfig {
            group_size: 2,
            ..GroupConfig::default()
        });

        group.submit(vec![job("4", 1), job("5", 0)]);
        let mut done = Vec::new();
        while done.len() < 2 {
            let (completed, failed) = group.wait_completed();
            assert!(failed.is_empty());
            done.extend(completed);
        }

        for info in &done {
            let couple = Couple::<Kayles>::parse(&info.parent).unwrap();
            let expected = DfsSolver::new(Arc::new(NimberDatabase::new(false)), false)
                .solve_couple(&couple);
            assert_eq!(info.pn.to_outcome(), expected, "{}", info.parent);
        }
    }

    #[test]
    fn solved_jobs_feed_the_tracked_overlay() {
        let group: ParallelGroup<Kayles> = ParallelGroup::new(GroupConfig {
            group_size: 1,
            ..GroupConfig::default()
        });

        let completed = group.expand(vec![job("4", 1)]).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].pn.to_outcome(), Outcome::Loss);

        let tracked = group.tracked_nimbers(true);
        assert!(!tracked.is_empty());
        assert!(group.tracked_nimbers(false).is_empty());
    }

    #[test]
    fn pdfpn_workers_in_a_group_agree_with_the_oracle() {
        let group: ParallelGroup<Kayles> = ParallelGroup::new(GroupConfig {
            group_size: 2,
            threads: 2,
            ..GroupConfig::default()
        });

        let completed = group.expand(vec![job("6", 0)]).unwrap();
        assert_eq!(completed[0].pn.to_outcome(), Outcome::Win);
    }
}
