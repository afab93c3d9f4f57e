use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::rngs::StdRng;

use crate::error::SolverResult;
use crate::game::Game;
use crate::solver::couple::{CompactCouple, Couple, CoupleExpansion};
use crate::solver::heuristics::{self, Estimator};
use crate::solver::logger::Logger;
use crate::solver::nimber::Nimber;
use crate::solver::nimber_db::NimberDatabase;
use crate::solver::node::{self, ExpansionInfo, NodeInfo, NodeState};
use crate::solver::proof_numbers::{Pn, ProofNumbers};
use crate::solver::tt::{PnsDatabase, StoredNodeInfo};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(usize);

struct TreeNode<G: Game> {
    state: NodeState<G>,
    info: NodeInfo,
    children: Vec<NodeId>,
    parents: Vec<NodeId>,
    flag: bool,
}

/// Deeper-first ordering for ancestor propagation: the heap pops the node
/// with the fewest lives (and smallest nimber on ties) first, so children
/// are always refreshed before their transposition parents.
#[derive(PartialEq, Eq)]
struct PathEntry {
    lives: u32,
    nimber: u8,
    id: NodeId,
}

impl Ord for PathEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .lives
            .cmp(&self.lives)
            .then_with(|| other.nimber.cmp(&self.nimber))
            .then_with(|| other.id.0.cmp(&self.id.0))
    }
}

impl PartialOrd for PathEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The best-first tree with transpositions: a graph of nodes keyed by
/// compact couple, where children are shared by all their parents and every
/// edge is recorded symmetrically for back-propagation.
pub struct PnsTree<G: Game> {
    nodes: Vec<Option<TreeNode<G>>>,
    free: Vec<usize>,
    index: HashMap<G::Compact, HashMap<Nimber, NodeId>>,
    count: usize,
    root: Option<NodeId>,
    estimator: Estimator,
}

impl<G: Game> PnsTree<G> {
    #[must_use]
    pub fn new(estimator: Estimator) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            count: 0,
            root: None,
            estimator,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.count = 0;
        self.root = None;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[must_use]
    pub fn is_proved(&self) -> bool {
        self.root
            .is_some_and(|root| self.node(root).info.pn.is_proved())
    }

    #[must_use]
    pub fn locked_nodes_number(&self) -> usize {
        self.nodes
            .iter()
            .flatten()
            .filter(|node| node.info.locked)
            .count()
    }

    fn node(&self, id: NodeId) -> &TreeNode<G> {
        self.nodes[id.0].as_ref().expect("stale tree node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TreeNode<G> {
        self.nodes[id.0].as_mut().expect("stale tree node id")
    }

    #[must_use]
    pub fn state(&self, id: NodeId) -> &NodeState<G> {
        &self.node(id).state
    }

    #[must_use]
    pub fn info(&self, id: NodeId) -> &NodeInfo {
        &self.node(id).info
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    #[must_use]
    pub fn get_node(&self, compact: &CompactCouple<G>) -> Option<NodeId> {
        self.index
            .get(&compact.position)
            .and_then(|nimbers| nimbers.get(&compact.nimber))
            .copied()
    }

    #[must_use]
    pub fn nodes_for_position(&self, position: &G::Compact) -> Vec<NodeId> {
        self.index
            .get(position)
            .map(|nimbers| nimbers.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn set_root(&mut self, root: &Couple<G>) -> NodeId {
        let id = self.find_or_create(root, ProofNumbers::default(), 0);
        self.root = Some(id);
        id
    }

    fn find_or_create(
        &mut self,
        couple: &Couple<G>,
        pn: ProofNumbers,
        iterations: usize,
    ) -> NodeId {
        let compact = couple.to_compact();
        if let Some(existing) = self.get_node(&compact) {
            return existing;
        }

        let node = TreeNode {
            state: NodeState::new(couple),
            info: NodeInfo::with_iterations(pn, iterations),
            children: Vec::new(),
            parents: Vec::new(),
            flag: false,
        };

        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        };

        self.index
            .entry(compact.position)
            .or_default()
            .insert(compact.nimber, id);
        self.count += 1;
        id
    }

    fn ensure_child(&mut self, couple: &Couple<G>) -> NodeId {
        if let Some(existing) = self.get_node(&couple.to_compact()) {
            return existing;
        }

        let pn = self.estimator.estimate(couple);
        self.find_or_create(couple, pn, 0)
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parents.push(parent);
    }

    fn drop_parent_link(&mut self, child: NodeId, parent: NodeId) {
        let parents = &mut self.node_mut(child).parents;
        if let Some(pos) = parents.iter().position(|&p| p == parent) {
            parents.swap_remove(pos);
        }
    }

    fn remove_child_at(&mut self, parent: NodeId, idx: usize) {
        let child = self.node_mut(parent).children.remove(idx);
        self.drop_parent_link(child, parent);
    }

    fn replace_child_at(&mut self, parent: NodeId, idx: usize, couple: &Couple<G>) {
        let old = self.node(parent).children[idx];
        self.drop_parent_link(old, parent);

        let new = self.ensure_child(couple);
        self.node_mut(parent).children[idx] = new;
        self.node_mut(new).parents.push(parent);
    }

    pub fn close_node(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.drop_parent_link(child, id);
        }

        let info = &mut self.node_mut(id).info;
        info.expanded = false;
        info.merged_nimber = Nimber::LOSS;
    }

    pub fn set_to_win(&mut self, id: NodeId) {
        self.close_node(id);
        let info = &mut self.node_mut(id).info;
        info.locked = false;
        info.pn = ProofNumbers::WIN;
    }

    pub fn set_to_loss(&mut self, id: NodeId) {
        self.close_node(id);
        let info = &mut self.node_mut(id).info;
        info.locked = false;
        info.pn = ProofNumbers::LOSS;
    }

    pub fn set_proof_numbers(&mut self, id: NodeId, pn: ProofNumbers) {
        if pn.is_win() {
            self.set_to_win(id);
        } else if pn.is_loss() {
            self.set_to_loss(id);
        } else {
            self.node_mut(id).info.pn = pn;
        }
    }

    pub fn lock(&mut self, id: NodeId) {
        self.node_mut(id).info.locked = true;
    }

    pub fn unlock(&mut self, id: NodeId) {
        self.node_mut(id).info.locked = false;
    }

    pub fn set_overestimated(&mut self, id: NodeId) {
        self.node_mut(id).info.overestimated = true;
    }

    #[must_use]
    pub fn child_complexity(&self, id: NodeId, child_idx: usize) -> Pn {
        let node = self.node(id);
        let pn = self.node(node.children[child_idx]).info.pn;
        if node.state.multi_land {
            pn.proof.min(pn.disproof)
        } else {
            pn.disproof
        }
    }

    #[must_use]
    pub fn switching_threshold(&self, id: NodeId, mpn2_idx: usize) -> Pn {
        self.child_complexity(id, mpn2_idx).saturating_add(1)
    }

    #[must_use]
    pub fn mpn_idx(
        &self,
        id: NodeId,
        rng: Option<&mut StdRng>,
        land_switching: bool,
    ) -> (usize, Option<usize>) {
        let node = self.node(id);
        node::select_mpn(
            node.children.len(),
            node.state.multi_land,
            land_switching,
            rng,
            |i| self.child_complexity(id, i),
            |i| self.node(node.children[i]).info.locked,
        )
    }

    /// Best-first descent from the root to the current most-proving leaf,
    /// bumping the iteration counter of every node on the way.
    pub fn get_mpn(
        &mut self,
        mut rng: Option<&mut StdRng>,
        land_switching: bool,
        mut logger: Option<&mut Logger>,
    ) -> Option<NodeId> {
        let root = self.root?;
        if self.node(root).info.pn.is_proved() || self.node(root).info.locked {
            return None;
        }

        let mut mpn = root;
        while self.node(mpn).info.expanded {
            self.node_mut(mpn).info.iterations += 1;
            let (mpn_idx, _) = self.mpn_idx(mpn, rng.as_deref_mut(), land_switching);

            if let Some(logger) = logger.as_deref_mut() {
                let node = self.node(mpn);
                logger.add_visited_node(mpn_idx, node.children.len(), node.state.multi_land);
            }

            mpn = self.node(mpn).children[mpn_idx];
        }

        if let Some(logger) = logger {
            logger.log();
            logger.clear_path();
        }

        Some(mpn)
    }

    /// Expands a node in place, generating its children from the couple.
    pub fn expand_node(&mut self, id: NodeId, database: &NimberDatabase<G>) {
        if self.node(id).info.pn.is_proved() {
            return;
        }

        debug_assert!(!self.node(id).info.expanded);
        self.node_mut(id).info.expanded = true;

        let couple = Couple::from_compact(&self.node(id).state.compact);
        if self.node(id).state.multi_land {
            self.node_mut(id).info.merged_nimber = couple.nimber;

            let mut subgames = couple.position.subgames();
            subgames.sort_by(heuristics::game_order);
            for subgame in subgames {
                let child = self.ensure_child(&Couple::new(subgame, Nimber::LOSS));
                self.link(id, child);
            }
        } else {
            match couple.compute_children(database) {
                CoupleExpansion::Proved(outcome) => {
                    if outcome.is_win() {
                        self.set_to_win(id);
                    } else {
                        self.set_to_loss(id);
                    }
                }
                CoupleExpansion::Children(children) => {
                    for child in &children {
                        let child_id = self.ensure_child(child);
                        self.link(id, child_id);
                    }
                }
            }
        }
    }

    /// Materialises children from an externally produced expansion, reusing
    /// existing tree nodes for transpositions.
    pub fn expand_with_info(&mut self, id: NodeId, info: &ExpansionInfo) -> SolverResult<()> {
        if info.pn.is_win() {
            self.set_to_win(id);
            return Ok(());
        }

        if info.pn.is_loss() {
            self.set_to_loss(id);
            return Ok(());
        }

        debug_assert!(!self.node(id).info.expanded);
        for (child_str, child_pn) in &info.children {
            let compact: CompactCouple<G> = child_str.parse()?;
            let child_id = match self.get_node(&compact) {
                Some(existing) => existing,
                None => self.find_or_create(&Couple::from_compact(&compact), *child_pn, 0),
            };

            self.link(id, child_id);
        }

        let node_info = &mut self.node_mut(id).info;
        node_info.expanded = true;
        node_info.merged_nimber = info.merged_nimber;
        Ok(())
    }

    /// Updates a node from its children; a single-subgame node proved Loss
    /// writes its nimber discovery into the database.
    pub fn update(&mut self, id: NodeId, database: &NimberDatabase<G>) -> SolverResult<()> {
        self.update_children(id, database);
        self.update_info(id)?;

        let node = self.node(id);
        if node.info.pn.is_loss() && !node.state.multi_land {
            database.insert(node.state.compact.position.clone(), node.state.compact.nimber);
        }

        Ok(())
    }

    fn update_children(&mut self, id: NodeId, database: &NimberDatabase<G>) {
        let node = self.node(id);
        if node.info.pn.is_proved() || !node.info.expanded {
            return;
        }

        if node.state.multi_land {
            self.update_lands(id, database);
        } else {
            self.update_single_land_children(id);
        }
    }

    fn update_lands(&mut self, id: NodeId, database: &NimberDatabase<G>) {
        if self.node(id).children.len() > 1 {
            let mut i = 0;
            while i < self.node(id).children.len() {
                let child_id = self.node(id).children[i];
                let compact = self.node(child_id).state.compact.clone();
                let child_pn = self.node(child_id).info.pn;

                if let Some(stored) = database.get(&compact.position) {
                    let merged = &mut self.node_mut(id).info.merged_nimber;
                    *merged = Nimber::merge(*merged, stored);
                    self.remove_child_at(id, i);
                    continue;
                }

                if child_pn.is_loss() {
                    let merged = &mut self.node_mut(id).info.merged_nimber;
                    *merged = Nimber::merge(*merged, compact.nimber);
                    self.remove_child_at(id, i);
                    continue;
                }

                if child_pn.is_win() {
                    let next = Couple::new(
                        G::from_compact(&compact.position),
                        compact.nimber.next(),
                    );
                    self.replace_child_at(id, i, &next);
                    continue;
                }

                i += 1;
            }
        }

        if self.node(id).children.len() == 1 {
            let merged = self.node(id).info.merged_nimber;
            let child_id = self.node(id).children[0];
            if self.node(child_id).state.compact.nimber != merged {
                let coerced = Couple::new(
                    G::from_compact(&self.node(child_id).state.compact.position),
                    merged,
                );
                self.replace_child_at(id, 0, &coerced);
            }

            let pn = self.node(self.node(id).children[0]).info.pn;
            if pn.is_win() {
                self.set_to_win(id);
            } else if pn.is_loss() {
                self.set_to_loss(id);
            }
        } else if self.node(id).children.is_empty() {
            if self.node(id).info.merged_nimber.is_win() {
                self.set_to_win(id);
            } else {
                self.set_to_loss(id);
            }
        }
    }

    fn update_single_land_children(&mut self, id: NodeId) {
        let any_loss = self
            .node(id)
            .children
            .iter()
            .any(|&child| self.node(child).info.pn.is_loss());
        if any_loss {
            self.set_to_win(id);
            return;
        }

        let mut i = 0;
        while i < self.node(id).children.len() {
            let child = self.node(id).children[i];
            if self.node(child).info.pn.is_win() {
                self.remove_child_at(id, i);
            } else {
                i += 1;
            }
        }

        if self.node(id).children.is_empty() {
            self.set_to_loss(id);
        }
    }

    fn update_info(&mut self, id: NodeId) -> SolverResult<()> {
        let node = self.node(id);
        if node.info.pn.is_proved() || !node.info.expanded {
            return Ok(());
        }

        let locked = node
            .children
            .iter()
            .all(|&child| self.node(child).info.locked);
        self.node_mut(id).info.locked = locked;

        let pn = if self.node(id).state.multi_land {
            self.multi_land_pn(id)?
        } else {
            self.single_land_pn(id)?
        };

        self.node_mut(id).info.pn = pn;
        Ok(())
    }

    fn multi_land_pn(&self, id: NodeId) -> SolverResult<ProofNumbers> {
        let node = self.node(id);
        if node.children.len() == 1 {
            return Ok(self.node(node.children[0]).info.pn);
        }

        let mut proof = Pn::ZERO;
        for i in 0..node.children.len() {
            let complexity = self.child_complexity(id, i);
            if node.info.overestimated {
                proof = proof.max(complexity);
            } else {
                proof = proof.add(complexity)?;
            }
        }

        if node.info.overestimated {
            proof = proof.add(Pn::new(node.children.len() as u64 - 1))?;
        }

        Ok(ProofNumbers::new(proof, proof))
    }

    fn single_land_pn(&self, id: NodeId) -> SolverResult<ProofNumbers> {
        let node = self.node(id);
        let locked = node.info.locked;
        let mut proof = if locked { Pn::ZERO } else { Pn::INF };
        let mut disproof = Pn::ZERO;
        for &child_id in &node.children {
            let child = &self.node(child_id).info;
            if node.info.overestimated {
                disproof = disproof.max(child.pn.proof);
            } else {
                disproof = disproof.add(child.pn.proof)?;
            }

            if locked {
                proof = proof.max(child.pn.disproof);
            } else if !child.locked {
                proof = proof.min(child.pn.disproof);
            }
        }

        if node.info.overestimated {
            disproof = disproof.add(Pn::new(node.children.len() as u64 - 1))?;
        }

        Ok(ProofNumbers::new(proof, disproof))
    }

    /// Ancestor propagation from a dirtied node: every node whose
    /// `(proof, disproof, locked)` changed enqueues its parents, deepest
    /// first, de-duplicated by couple.
    pub fn update_paths(&mut self, mpn: NodeId, database: &NimberDatabase<G>) -> SolverResult<()> {
        let mut queued: HashSet<NodeId> = HashSet::from([mpn]);
        let mut heap = BinaryHeap::new();
        heap.push(self.path_entry(mpn));

        while let Some(entry) = heap.pop() {
            let id = entry.id;
            queued.remove(&id);

            let previous = self.node(id).info;
            self.update(id, database)?;
            if self.node(id).info.has_updated(&previous) || id == mpn {
                let parents = self.node(id).parents.clone();
                for parent in parents {
                    if queued.insert(parent) {
                        heap.push(self.path_entry(parent));
                    }
                }
            }
        }

        Ok(())
    }

    fn path_entry(&self, id: NodeId) -> PathEntry {
        let state = &self.node(id).state;
        PathEntry {
            lives: state.lives,
            nimber: state.compact.nimber.0,
            id,
        }
    }

    /// Mark-and-sweep removal of nodes no longer reachable from the root.
    /// Returns the number of removed nodes.
    pub fn prune_unreachable(&mut self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };

        self.node_mut(root).flag = true;
        let mut frontier = vec![root];
        while let Some(id) = frontier.pop() {
            let children = self.node(id).children.clone();
            for child in children {
                if !self.node(child).flag {
                    self.node_mut(child).flag = true;
                    frontier.push(child);
                }
            }
        }

        let ids: Vec<NodeId> = self
            .index
            .values()
            .flat_map(|nimbers| nimbers.values().copied())
            .collect();

        let mut pruned = 0;
        for id in ids {
            if self.node(id).flag {
                self.node_mut(id).flag = false;
                continue;
            }

            let children = self.node(id).children.clone();
            for child in children {
                if self.nodes[child.0].is_some() {
                    self.drop_parent_link(child, id);
                }
            }

            let compact = self.node(id).state.compact.clone();
            if let Some(nimbers) = self.index.get_mut(&compact.position) {
                nimbers.remove(&compact.nimber);
                if nimbers.is_empty() {
                    self.index.remove(&compact.position);
                }
            }

            self.nodes[id.0] = None;
            self.free.push(id.0);
            self.count -= 1;
            pruned += 1;
        }

        pruned
    }

    /// Snapshots every proved or expanded node into the transposition table.
    pub fn update_pns_database(&self, pns_database: &PnsDatabase<G>) {
        for node in self.nodes.iter().flatten() {
            if node.info.pn.is_proved() || node.info.expanded {
                pns_database.insert(
                    node.state.compact.clone(),
                    StoredNodeInfo::new(node.info.pn, node.info.iterations),
                );
            }
        }
    }

    #[must_use]
    pub fn expansion_info(&self, id: NodeId) -> ExpansionInfo {
        let node = self.node(id);
        let mut children = Vec::with_capacity(node.children.len());
        for &child in &node.children {
            let child_node = self.node(child);
            children.push((child_node.state.compact.to_string(), child_node.info.pn));
        }

        ExpansionInfo {
            parent: node.state.compact.to_string(),
            pn: node.info.pn,
            merged_nimber: node.info.merged_nimber,
            children,
        }
    }

    pub fn add_node_iterations(&mut self, id: NodeId, iterations: usize) {
        self.node_mut(id).info.iterations += iterations;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::kayles::Kayles;

    fn couple(position: &str, nimber: u8) -> Couple<Kayles> {
        Couple::new(position.parse().unwrap(), Nimber(nimber))
    }

    fn tree() -> (PnsTree<Kayles>, NimberDatabase<Kayles>) {
        (PnsTree::new(Estimator::Uniform), NimberDatabase::new(false))
    }

    #[test]
    fn expanding_the_root_links_children_both_ways() {
        let (mut tree, db) = tree();
        let root = tree.set_root(&couple("3", 0));
        tree.expand_node(root, &db);

        let children = tree.children(root).to_vec();
        assert_eq!(children.len(), 3);
        for child in children {
            assert!(tree.node(child).parents.contains(&root));
        }
    }

    #[test]
    fn transpositions_share_a_single_node() {
        let (mut tree, db) = tree();
        let root = tree.set_root(&couple("4", 0));
        tree.expand_node(root, &db);

        // Both ("4", 0) and ("3", 0) generate the child ("2", 0); expanding
        // the second parent must reuse the node instead of duplicating it.
        let shared_before = tree.get_node(&couple("2", 0).to_compact()).unwrap();
        let inner = tree.get_node(&couple("3", 0).to_compact()).unwrap();
        tree.expand_node(inner, &db);

        let shared_after = tree.get_node(&couple("2", 0).to_compact()).unwrap();
        assert_eq!(shared_before, shared_after);
        assert!(tree.node(shared_after).parents.contains(&root));
        assert!(tree.node(shared_after).parents.contains(&inner));
    }

    #[test]
    fn expansion_detects_an_immediate_win() {
        let (mut tree, db) = tree();
        let root = tree.set_root(&couple("1", 0));

        // The only move from ("1", 0) reaches the terminal losing couple
        // ("0", 0), so the root proves Win at expansion.
        tree.expand_node(root, &db);
        assert!(tree.info(root).pn.is_win());
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn loss_discoveries_reach_the_nimber_database() {
        let (mut tree, db) = tree();
        let root = tree.set_root(&couple("1", 1));

        // ("1", 1) is a Loss: G(1) = 1. Drive the tree until proved.
        let mut guard = 0;
        while !tree.is_proved() {
            guard += 1;
            assert!(guard < 1000);
            let mpn = tree.get_mpn(None, false, None).unwrap();
            tree.expand_node(mpn, &db);
            tree.update_paths(mpn, &db).unwrap();
        }

        assert!(tree.info(root).pn.is_loss());
        let position: Kayles = "1".parse().unwrap();
        assert_eq!(db.get(&position.to_compact()), Some(Nimber(1)));
    }

    #[test]
    fn prune_removes_nodes_unreachable_from_the_root() {
        let (mut tree, db) = tree();
        let root = tree.set_root(&couple("4", 0));
        tree.expand_node(root, &db);
        let size_before = tree.len();
        assert!(size_before > 1);

        // Closing the root orphans every child.
        tree.close_node(root);
        let pruned = tree.prune_unreachable();
        assert_eq!(pruned, size_before - 1);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), Some(root));
    }

    #[test]
    fn pruned_slots_are_reused() {
        let (mut tree, db) = tree();
        let root = tree.set_root(&couple("4", 0));
        tree.expand_node(root, &db);
        tree.close_node(root);
        tree.prune_unreachable();

        tree.expand_node(root, &db);
        assert!(tree.len() > 1);
        for &child in tree.children(root) {
            assert!(tree.node(child).parents.contains(&root));
        }
    }

    #[test]
    fn expand_with_info_reuses_existing_nodes() {
        let (mut tree, _db) = tree();
        let root = tree.set_root(&couple("5", 0));
        let existing = tree.set_root(&couple("5", 0));
        assert_eq!(root, existing);

        let info = ExpansionInfo {
            parent: "5 0".to_string(),
            pn: ProofNumbers::new(Pn::new(2), Pn::new(3)),
            merged_nimber: Nimber::LOSS,
            children: vec![
                ("4 0".to_string(), ProofNumbers::default()),
                ("1+3 0".to_string(), ProofNumbers::new(Pn::new(2), Pn::new(2))),
            ],
        };
        tree.expand_with_info(root, &info).unwrap();
        assert_eq!(tree.children(root).len(), 2);
        assert!(tree.info(root).expanded);

        let child = tree.get_node(&couple("1+3", 0).to_compact()).unwrap();
        assert_eq!(tree.info(child).pn, ProofNumbers::new(Pn::new(2), Pn::new(2)));
    }

    #[test]
    fn proved_expansion_info_sets_the_node_without_children() {
        let (mut tree, _db) = tree();
        let root = tree.set_root(&couple("2", 0));
        let info = ExpansionInfo {
            parent: "2 0".to_string(),
            pn: ProofNumbers::WIN,
            merged_nimber: Nimber::LOSS,
            children: Vec::new(),
        };
        tree.expand_with_info(root, &info).unwrap();
        assert!(tree.info(root).pn.is_win());
        assert!(!tree.info(root).expanded);
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn locking_a_subtree_redirects_mpn_selection() {
        let (mut tree, db) = tree();
        let root = tree.set_root(&couple("3", 0));
        tree.expand_node(root, &db);
        tree.update_paths(root, &db).unwrap();

        let first = tree.get_mpn(None, false, None).unwrap();
        tree.lock(first);
        tree.update_paths(first, &db).unwrap();

        let second = tree.get_mpn(None, false, None).unwrap();
        assert_ne!(first, second);
    }
}
