use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use parking_lot::{Condvar, Mutex};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::SolverResult;
use crate::game::Game;
use crate::solver::couple::{CompactCouple, Couple};
use crate::solver::dfpn::Thresholds;
use crate::solver::heuristics::Estimator;
use crate::solver::mailbox::Mailbox;
use crate::solver::nimber_db::NimberDatabase;
use crate::solver::node::{ExpansionInfo, PathNode};
use crate::solver::proof_numbers::Pn;
use crate::solver::tree::{NodeId, PnsTree};
use crate::solver::tt::{PnsDatabase, StoredNodeInfo};
use crate::solver::{NO_LIMIT, PnsSolver};

struct SyncState<G: Game> {
    tree: PnsTree<G>,
    finished: bool,
}

/// Shared-memory parallel df-pn. With `branching_depth == 0` every worker
/// runs an independent df-pn from the same root over the shared
/// transposition table and the first finisher terminates the rest; with a
/// positive depth a small shared sync tree hands out threshold-bounded leaf
/// jobs to the workers.
pub struct ParallelDfpn<G: Game> {
    workers: usize,
    branching_depth: usize,
    epsilon: f32,
    seed: u64,
    db: Arc<NimberDatabase<G>>,
    pns_db: PnsDatabase<G>,
    estimator: Estimator,
    iterations: AtomicUsize,
    max_iterations: usize,
    terminate: AtomicBool,
    sync: Mutex<SyncState<G>>,
    cv: Condvar,
    mailboxes: Vec<Mailbox<G>>,
}

impl<G: Game> ParallelDfpn<G> {
    #[must_use]
    pub fn new(
        workers: usize,
        branching_depth: usize,
        epsilon: f32,
        db: Arc<NimberDatabase<G>>,
        estimator: Estimator,
        capacity: usize,
        seed: u64,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            branching_depth,
            epsilon,
            seed,
            db,
            pns_db: PnsDatabase::new(capacity),
            estimator,
            iterations: AtomicUsize::new(0),
            max_iterations: NO_LIMIT,
            terminate: AtomicBool::new(false),
            sync: Mutex::new(SyncState {
                tree: PnsTree::new(estimator),
                finished: false,
            }),
            cv: Condvar::new(),
            mailboxes: (0..workers).map(|_| Mailbox::new()).collect(),
        }
    }

    fn make_child(&self, couple: &Couple<G>) -> PathNode<G> {
        match self.pns_db.find(&couple.to_compact()) {
            Some(info) => {
                PathNode::with_info(couple, info.pn, info.iterations, info.thread_ids.len())
            }
            None => PathNode::with_info(couple, self.estimator.estimate(couple), 0, 0),
        }
    }

    fn limit_reached(&self, thread_iterations: usize) -> bool {
        self.max_iterations != NO_LIMIT && thread_iterations >= self.max_iterations
    }

    fn open_node(&self, node: &mut PathNode<G>, thread_id: usize) -> SolverResult<()> {
        node.add_iterations(1);

        let db = Arc::clone(&self.db);
        node.expand(&mut |c| self.make_child(c), &db);
        node.update(&mut |c| self.make_child(c), &db)?;
        self.update_databases(node, thread_id);

        self.pns_db.mark(&node.state.compact, thread_id);
        Ok(())
    }

    fn close_node(&self, node: &mut PathNode<G>, thread_id: usize, unexpand: bool) {
        if unexpand {
            node.close();
        }

        self.pns_db.unmark(&node.state.compact, thread_id);
    }

    /// Writes the node back to the shared tables. A transposition that turns
    /// proved here notifies every other thread still marked on it.
    fn update_databases(&self, node: &PathNode<G>, thread_id: usize) {
        let compact = &node.state.compact;
        if node.info.pn.is_loss() && !node.is_multi_land() {
            self.db.insert(compact.position.clone(), compact.nimber);
        }

        let original = self.pns_db.insert(
            compact.clone(),
            StoredNodeInfo::new(node.info.pn, node.info.iterations),
        );

        if let Some(original) = original
            && !original.pn.is_proved()
            && node.info.pn.is_proved()
        {
            for &other in &original.thread_ids {
                if other != thread_id {
                    self.mailboxes[other].notify(compact.clone());
                }
            }
        }
    }

    fn update_children_info(&self, node: &mut PathNode<G>) {
        for child in &mut node.children {
            if let Some(info) = self.pns_db.find(&child.state.compact) {
                child.update_stored_info(info.pn, info.iterations, info.thread_ids.len());
            }
        }
    }

    fn check_mailbox(&self, thread_id: usize, path: &[CompactCouple<G>]) -> Option<usize> {
        let messages = self.mailboxes[thread_id].extract_all();
        if messages.is_empty() {
            return None;
        }

        path.iter().position(|compact| messages.contains(compact))
    }

    /// One df-pn step. Returns the iterations spent below this node plus the
    /// depth of an ancestor to pop back to when a mailbox notification (or a
    /// deeper frame) short-circuited the search.
    #[allow(clippy::too_many_arguments)]
    fn worker_dfpn(
        &self,
        node: &mut PathNode<G>,
        path: &mut Vec<CompactCouple<G>>,
        depth: usize,
        thresholds: &Thresholds,
        remaining: usize,
        thread_id: usize,
        rng: &mut Option<StdRng>,
        land_switching: bool,
        unexpand: bool,
    ) -> SolverResult<(usize, Option<usize>)> {
        if remaining == 0 {
            return Ok((0, None));
        }

        self.open_node(node, thread_id)?;

        let mut local_iterations = 1usize;
        while thresholds.are_holding(node.info.pn)
            && local_iterations < remaining
            && !self.terminate.load(Ordering::Acquire)
        {
            let (mpn_idx, mpn2_idx) = node.get_mpn_idx(rng.as_mut(), land_switching);
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

            path.push(node.children[mpn_idx].state.compact.clone());
            let (child_iterations, child_backtrack) = self.worker_dfpn(
                &mut node.children[mpn_idx],
                path,
                depth + 1,
                &child_thresholds,
                remaining - local_iterations,
                thread_id,
                rng,
                land_switching,
                true,
            )?;
            path.pop();

            local_iterations += child_iterations;
            node.add_iterations(child_iterations);

            if self.workers > 1 {
                self.update_children_info(node);
            }

            let db = Arc::clone(&self.db);
            node.update(&mut |c| self.make_child(c), &db)?;
            self.update_databases(node, thread_id);

            let backtrack = match child_backtrack {
                Some(target) => Some(target),
                None => self.check_mailbox(thread_id, &path[..=depth]),
            };

            if let Some(target) = backtrack {
                self.close_node(node, thread_id, unexpand);
                return Ok((local_iterations, (target < depth).then_some(target)));
            }
        }

        self.close_node(node, thread_id, unexpand);
        Ok((local_iterations, None))
    }

    fn kaneko_pdfpn(
        &self,
        root: &Couple<G>,
        thread_id: usize,
        rng: &mut Option<StdRng>,
        land_switching: bool,
    ) -> SolverResult<()> {
        let mut node = PathNode::new(root);
        let mut path = vec![node.state.compact.clone()];
        let remaining = if self.max_iterations == NO_LIMIT {
            usize::MAX
        } else {
            self.max_iterations
        };

        let (thread_iterations, _) = self.worker_dfpn(
            &mut node,
            &mut path,
            0,
            &Thresholds::default(),
            remaining,
            thread_id,
            rng,
            land_switching,
            true,
        )?;

        self.terminate.store(true, Ordering::Release);
        self.iterations.fetch_add(thread_iterations, Ordering::Relaxed);
        Ok(())
    }

    fn run(&self, root: &Couple<G>, thread_id: usize) -> SolverResult<()> {
        let land_switching = self.workers > 1;
        let mut rng = if self.workers > 1 {
            Some(StdRng::seed_from_u64(
                self.seed.wrapping_add(thread_id as u64),
            ))
        } else {
            (self.seed > 0).then(|| StdRng::seed_from_u64(self.seed))
        };

        if self.branching_depth == 0 {
            return self.kaneko_pdfpn(root, thread_id, &mut rng, land_switching);
        }

        let mut thread_iterations = 0usize;
        loop {
            let mut sync = self.sync.lock();
            if sync.tree.is_proved() || sync.finished || self.limit_reached(thread_iterations) {
                sync.finished = true;
                drop(sync);
                self.cv.notify_all();
                break;
            }

            let root_locked = sync
                .tree
                .root()
                .is_none_or(|id| sync.tree.info(id).locked);
            if root_locked {
                self.cv.wait_while(&mut sync, |state| {
                    let locked = state
                        .tree
                        .root()
                        .is_none_or(|id| state.tree.info(id).locked);
                    locked && !state.tree.is_proved() && !state.finished
                });
                continue;
            }

            let remaining = if self.max_iterations == NO_LIMIT {
                usize::MAX
            } else {
                self.max_iterations - thread_iterations
            };

            let local = self.try_run_job(sync, remaining, thread_id, &mut rng, land_switching)?;
            thread_iterations += local;
            self.iterations.fetch_add(local, Ordering::Relaxed);
        }

        self.terminate.store(true, Ordering::Release);
        Ok(())
    }

    /// Picks a sync-tree leaf whose thresholds still hold, searches it
    /// outside the lock, and writes the result back — expanding the leaf
    /// into the sync tree while it is shallower than the branching depth.
    fn try_run_job(
        &self,
        mut sync: parking_lot::MutexGuard<'_, SyncState<G>>,
        remaining: usize,
        thread_id: usize,
        rng: &mut Option<StdRng>,
        land_switching: bool,
    ) -> SolverResult<usize> {
        let (mpn, thresholds, depth, selection_iterations) =
            self.get_sync_mpn(&mut sync, rng)?;
        let Some(mpn) = mpn else {
            return Ok(selection_iterations);
        };

        sync.tree.lock(mpn);
        sync.tree.update_paths(mpn, &self.db)?;
        let state = Couple::from_compact(&sync.tree.state(mpn).compact);
        drop(sync);

        let mut node = PathNode::new(&state);
        let mut path = vec![node.state.compact.clone()];
        let (job_iterations, _) = self.worker_dfpn(
            &mut node,
            &mut path,
            0,
            &thresholds,
            remaining,
            thread_id,
            rng,
            land_switching,
            false,
        )?;

        let mut sync = self.sync.lock();
        sync.tree.unlock(mpn);

        if depth < self.branching_depth {
            sync.tree.expand_with_info(mpn, &node.get_expansion_info())?;
        } else {
            sync.tree.set_proof_numbers(mpn, node.proof_numbers());
        }

        sync.tree.update_paths(mpn, &self.db)?;
        drop(sync);
        self.cv.notify_all();

        Ok(job_iterations + selection_iterations)
    }

    fn get_sync_mpn(
        &self,
        sync: &mut SyncState<G>,
        rng: &mut Option<StdRng>,
    ) -> SolverResult<(Option<NodeId>, Thresholds, usize, usize)> {
        let none = (None, Thresholds::default(), 0, 0);
        let Some(root) = sync.tree.root() else {
            return Ok(none);
        };
        if sync.tree.info(root).pn.is_proved() || sync.tree.info(root).locked {
            return Ok(none);
        }

        let mut mpn = root;
        let mut expand_mpn = false;
        let mut thresholds = Thresholds::default();
        let mut depth = 0usize;
        let mut iterations = 0usize;

        while sync.tree.info(mpn).expanded || expand_mpn {
            if expand_mpn && !sync.tree.info(mpn).expanded {
                let state = Couple::from_compact(&sync.tree.state(mpn).compact);
                let mut temp = PathNode::new(&state);
                let db = Arc::clone(&self.db);
                temp.expand(&mut |c| self.make_child(c), &db);

                sync.tree.expand_with_info(mpn, &temp.get_expansion_info())?;
                sync.tree.update_paths(mpn, &self.db)?;
                iterations += 1;
            }

            if sync.tree.children(mpn).is_empty()
                || sync.tree.info(mpn).locked
                || !thresholds.are_holding(sync.tree.info(mpn).pn)
            {
                return Ok((None, Thresholds::default(), 0, iterations));
            }

            sync.tree.add_node_iterations(mpn, 1);
            let (mpn_idx, mpn2_idx) = sync.tree.mpn_idx(mpn, rng.as_mut(), true);
            let switching = mpn2_idx
                .map(|idx| sync.tree.switching_threshold(mpn, idx))
                .unwrap_or(Pn::INF);
            let child = sync.tree.children(mpn)[mpn_idx];
            thresholds = thresholds.descend(
                sync.tree.state(mpn).multi_land,
                sync.tree.children(mpn).len(),
                sync.tree.info(mpn).pn,
                sync.tree.info(child).pn,
                switching,
                1.0,
            )?;

            expand_mpn = mpn2_idx.is_none();
            mpn = child;
            depth += 1;
        }

        Ok((Some(mpn), thresholds, depth, iterations))
    }

    fn init_sync_tree(&mut self, root: &Couple<G>) -> SolverResult<()> {
        let root_compact = root.to_compact();
        {
            let sync = self.sync.lock();
            if let Some(existing) = sync.tree.root()
                && sync.tree.state(existing).compact == root_compact
            {
                return Ok(());
            }
        }

        let mut temp = PathNode::new(root);
        let db = Arc::clone(&self.db);
        temp.expand(&mut |c| self.make_child(c), &db);
        let info = temp.get_expansion_info();

        let mut sync = self.sync.lock();
        sync.tree.update_pns_database(&self.pns_db);
        sync.tree.clear();
        let root_id = sync.tree.set_root(root);
        sync.tree.expand_with_info(root_id, &info)?;
        sync.tree.update(root_id, &db)?;
        Ok(())
    }

    #[cfg(test)]
    fn inject_notification(&self, thread_id: usize, compact: CompactCouple<G>) {
        self.mailboxes[thread_id].notify(compact);
    }
}

impl<G: Game> PnsSolver<G> for ParallelDfpn<G> {
    fn expand_couple(
        &mut self,
        couple: &Couple<G>,
        max_iterations: usize,
    ) -> SolverResult<ExpansionInfo> {
        self.max_iterations = max_iterations;
        self.iterations.store(0, Ordering::Relaxed);
        self.terminate.store(false, Ordering::Release);
        for mailbox in &self.mailboxes {
            mailbox.clear();
        }

        if self.branching_depth > 0 {
            self.init_sync_tree(couple)?;
            self.sync.get_mut().finished = false;
        }

        let this = &*self;
        let results: Vec<SolverResult<()>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..this.workers)
                .map(|thread_id| scope.spawn(move || this.run(couple, thread_id)))
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().expect("搜索线程崩溃"))
                .collect()
        });

        for result in results {
            result?;
        }

        if self.branching_depth > 0 {
            let sync = self.sync.lock();
            let root_id = sync.tree.root().expect("同步树缺少根节点");
            Ok(sync.tree.expansion_info(root_id))
        } else {
            let mut root = PathNode::new(couple);
            let db = Arc::clone(&self.db);
            root.expand(&mut |c| self.make_child(c), &db);
            root.update(&mut |c| self.make_child(c), &db)?;
            Ok(root.get_expansion_info())
        }
    }

    fn clear_tree(&mut self) {
        self.pns_db.clear();
    }

    fn tree_size(&self) -> usize {
        self.pns_db.len()
    }

    fn iterations(&self) -> usize {
        self.iterations.load(Ordering::Relaxed)
    }

    fn nimber_database(&self) -> &Arc<NimberDatabase<G>> {
        &self.db
    }
}
