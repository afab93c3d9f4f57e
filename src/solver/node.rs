use rand::Rng;
use rand::rngs::StdRng;

use crate::error::SolverResult;
use crate::game::Game;
use crate::solver::couple::{Couple, CoupleExpansion, CompactCouple};
use crate::solver::heuristics;
use crate::solver::nimber::Nimber;
use crate::solver::nimber_db::NimberDatabase;
use crate::solver::proof_numbers::{Pn, ProofNumbers};

#[derive(Clone, Debug)]
pub struct NodeState<G: Game> {
    pub compact: CompactCouple<G>,
    pub lives: u32,
    pub multi_land: bool,
}

impl<G: Game> NodeState<G> {
    #[must_use]
    pub fn new(couple: &Couple<G>) -> Self {
        Self {
            compact: couple.to_compact(),
            lives: couple.position.lives(),
            multi_land: couple.position.is_multi_land(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NodeInfo {
    pub pn: ProofNumbers,
    pub iterations: usize,
    pub locked: bool,
    pub expanded: bool,
    pub overestimated: bool,
    pub merged_nimber: Nimber,
}

impl NodeInfo {
    #[must_use]
    pub fn new(pn: ProofNumbers) -> Self {
        Self::with_iterations(pn, 0)
    }

    #[must_use]
    pub fn with_iterations(pn: ProofNumbers, iterations: usize) -> Self {
        Self {
            pn,
            iterations,
            locked: false,
            expanded: false,
            overestimated: false,
            merged_nimber: Nimber::LOSS,
        }
    }

    #[must_use]
    pub fn has_updated(&self, previous: &Self) -> bool {
        self.pn != previous.pn || self.locked != previous.locked
    }
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self::new(ProofNumbers::default())
    }
}

/// The result of one node expansion, shared between the two levels of the
/// search: the final proof numbers, the merged nimber of absorbed subgames,
/// and the surviving children with their proof numbers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpansionInfo {
    pub parent: String,
    pub pn: ProofNumbers,
    pub merged_nimber: Nimber,
    pub children: Vec<(String, ProofNumbers)>,
}

/// Most-proving child selection shared by the tree and the path nodes: the
/// minimum-complexity non-locked child plus the runner-up, with ties broken
/// uniformly at random when an RNG is given. For a multi-subgame node with
/// `land_switching` off, only the first non-locked child is considered.
pub(crate) fn select_mpn(
    len: usize,
    multi_land: bool,
    land_switching: bool,
    rng: Option<&mut StdRng>,
    complexity: impl Fn(usize) -> Pn,
    locked: impl Fn(usize) -> bool,
) -> (usize, Option<usize>) {
    let mut best_indices: Vec<usize> = Vec::new();
    let mut mpn2_idx: Option<usize> = None;
    let mut best_complexity = Pn::INF;

    for i in 0..len {
        if locked(i) {
            continue;
        }

        let child_complexity = complexity(i);
        if best_indices.is_empty() || child_complexity < best_complexity {
            if let Some(&previous_best) = best_indices.first() {
                mpn2_idx = Some(previous_best);
            }

            best_complexity = child_complexity;
            best_indices.clear();
            best_indices.push(i);
        } else if child_complexity == best_complexity {
            best_indices.push(i);
        } else if mpn2_idx.is_none_or(|idx| child_complexity < complexity(idx)) {
            mpn2_idx = Some(i);
        }

        if !land_switching && multi_land {
            break;
        }
    }

    assert!(!best_indices.is_empty(), "MPN selection on a locked node");

    let mpn_idx = match rng {
        Some(rng) if best_indices.len() > 1 => {
            best_indices[rng.random_range(0..best_indices.len())]
        }
        _ => best_indices[0],
    };

    if best_indices.len() > 1 {
        mpn2_idx = best_indices.iter().copied().find(|&idx| idx != mpn_idx);
    }

    (mpn_idx, mpn2_idx)
}

/// A search node whose children are stored inline, as only a single path is
/// alive at a time in the depth-first solvers. `working_threads` counts the
/// threads currently below this node and acts as a virtual loss during
/// parallel MPN selection.
#[derive(Debug)]
pub struct PathNode<G: Game> {
    pub state: NodeState<G>,
    pub info: NodeInfo,
    pub working_threads: usize,
    pub children: Vec<PathNode<G>>,
}

impl<G: Game> PathNode<G> {
    #[must_use]
    pub fn new(couple: &Couple<G>) -> Self {
        Self::with_info(couple, ProofNumbers::default(), 0, 0)
    }

    #[must_use]
    pub fn with_info(
        couple: &Couple<G>,
        pn: ProofNumbers,
        iterations: usize,
        working_threads: usize,
    ) -> Self {
        Self {
            state: NodeState::new(couple),
            info: NodeInfo::with_iterations(pn, iterations),
            working_threads,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub const fn proof_numbers(&self) -> ProofNumbers {
        self.info.pn
    }

    #[must_use]
    pub const fn is_proved(&self) -> bool {
        self.info.pn.is_proved()
    }

    #[must_use]
    pub const fn is_multi_land(&self) -> bool {
        self.state.multi_land
    }

    /// Base complexity from spec'd proof-number arithmetic: disproof for a
    /// plain node, min(proof, disproof) for a multi-subgame node.
    #[must_use]
    pub fn child_base_complexity(&self, idx: usize) -> Pn {
        let pn = self.children[idx].info.pn;
        if self.state.multi_land {
            pn.proof.min(pn.disproof)
        } else {
            pn.disproof
        }
    }

    /// Effective complexity used for MPN selection: the base complexity plus
    /// the number of threads already working below the child.
    #[must_use]
    pub fn child_complexity(&self, idx: usize) -> Pn {
        self.child_base_complexity(idx)
            .saturating_add(self.children[idx].working_threads as u64)
    }

    #[must_use]
    pub fn switching_threshold(&self, mpn_idx: usize, mpn2_idx: usize) -> Pn {
        let mpn2_complexity = self.child_complexity(mpn2_idx);
        if mpn2_complexity.is_inf() {
            return Pn::INF;
        }

        mpn2_complexity
            .saturating_add(1)
            .saturating_sub(self.children[mpn_idx].working_threads as u64)
    }

    #[must_use]
    pub fn get_mpn_idx(
        &self,
        rng: Option<&mut StdRng>,
        land_switching: bool,
    ) -> (usize, Option<usize>) {
        select_mpn(
            self.children.len(),
            self.state.multi_land,
            land_switching,
            rng,
            |i| self.child_complexity(i),
            |i| self.children[i].info.locked,
        )
    }

    pub fn expand<F>(&mut self, factory: &mut F, database: &NimberDatabase<G>)
    where
        F: FnMut(&Couple<G>) -> Self,
    {
        debug_assert!(!self.info.expanded);

        self.info.expanded = true;
        if self.state.multi_land {
            self.expand_lands(factory);
        } else {
            self.expand_single_land(factory, database);
        }
    }

    fn expand_lands<F>(&mut self, factory: &mut F)
    where
        F: FnMut(&Couple<G>) -> Self,
    {
        let couple = Couple::from_compact(&self.state.compact);
        self.info.merged_nimber = couple.nimber;

        let mut subgames = couple.position.subgames();
        subgames.sort_by(heuristics::game_order);

        for subgame in subgames {
            self.children
                .push(factory(&Couple::new(subgame, Nimber::LOSS)));
        }
    }

    fn expand_single_land<F>(&mut self, factory: &mut F, database: &NimberDatabase<G>)
    where
        F: FnMut(&Couple<G>) -> Self,
    {
        let couple = Couple::from_compact(&self.state.compact);
        match couple.compute_children(database) {
            CoupleExpansion::Proved(outcome) => {
                if outcome.is_win() {
                    self.set_to_win();
                } else {
                    self.set_to_loss();
                }
            }
            CoupleExpansion::Children(children) => {
                for child in &children {
                    self.children.push(factory(child));
                }
            }
        }
    }

    pub fn close(&mut self) {
        self.info.expanded = false;
        self.info.merged_nimber = Nimber::LOSS;
        self.children.clear();
    }

    pub fn set_to_win(&mut self) {
        self.close();
        self.info.locked = false;
        self.info.pn = ProofNumbers::WIN;
    }

    pub fn set_to_loss(&mut self) {
        self.close();
        self.info.locked = false;
        self.info.pn = ProofNumbers::LOSS;
    }

    pub fn set_proof_numbers(&mut self, pn: ProofNumbers) {
        if pn.is_win() {
            self.set_to_win();
        } else if pn.is_loss() {
            self.set_to_loss();
        } else {
            self.info.pn = pn;
        }
    }

    pub fn add_iterations(&mut self, iterations: usize) {
        self.info.iterations += iterations;
    }

    /// Refreshes this node from a transposition-table record.
    pub fn update_stored_info(
        &mut self,
        pn: ProofNumbers,
        iterations: usize,
        working_threads: usize,
    ) {
        self.info.pn = pn;
        self.info.iterations = iterations;
        self.working_threads = working_threads;
    }

    /// Two-phase node update: first reconcile the child set against the
    /// database and proved children, then recompute this node's proof
    /// numbers from the survivors.
    pub fn update<F>(
        &mut self,
        factory: &mut F,
        database: &NimberDatabase<G>,
    ) -> SolverResult<()>
    where
        F: FnMut(&Couple<G>) -> Self,
    {
        self.update_children(factory, database);
        self.update_info()
    }

    fn update_children<F>(&mut self, factory: &mut F, database: &NimberDatabase<G>)
    where
        F: FnMut(&Couple<G>) -> Self,
    {
        if self.is_proved() || !self.info.expanded {
            return;
        }

        if self.state.multi_land {
            self.update_lands(factory, database);
        } else {
            self.update_single_land_children();
        }
    }

    fn update_lands<F>(&mut self, factory: &mut F, database: &NimberDatabase<G>)
    where
        F: FnMut(&Couple<G>) -> Self,
    {
        if self.children.len() > 1 {
            let mut i = 0;
            while i < self.children.len() {
                let compact = self.children[i].state.compact.clone();
                let child_pn = self.children[i].info.pn;

                if let Some(stored) = database.get(&compact.position) {
                    self.info.merged_nimber = Nimber::merge(self.info.merged_nimber, stored);
                    self.children.remove(i);
                    continue;
                }

                if child_pn.is_loss() {
                    self.info.merged_nimber =
                        Nimber::merge(self.info.merged_nimber, compact.nimber);
                    self.children.remove(i);
                    continue;
                }

                if child_pn.is_win() {
                    // The subgame's nimber differs from the couple part, so
                    // search the next candidate nimber in place.
                    let next = Couple::new(
                        G::from_compact(&compact.position),
                        compact.nimber.next(),
                    );
                    self.children[i] = factory(&next);
                    continue;
                }

                i += 1;
            }
        }

        if self.children.len() == 1 {
            if self.children[0].state.compact.nimber != self.info.merged_nimber {
                let coerced = Couple::new(
                    G::from_compact(&self.children[0].state.compact.position),
                    self.info.merged_nimber,
                );
                self.children[0] = factory(&coerced);
            }

            let pn = self.children[0].info.pn;
            if pn.is_win() {
                self.set_to_win();
            } else if pn.is_loss() {
                self.set_to_loss();
            }
        } else if self.children.is_empty() {
            if self.info.merged_nimber.is_win() {
                self.set_to_win();
            } else {
                self.set_to_loss();
            }
        }
    }

    fn update_single_land_children(&mut self) {
        if self.children.iter().any(|child| child.info.pn.is_loss()) {
            self.set_to_win();
            return;
        }

        self.children.retain(|child| !child.info.pn.is_win());
        if self.children.is_empty() {
            self.set_to_loss();
        }
    }

    fn update_info(&mut self) -> SolverResult<()> {
        if self.is_proved() || !self.info.expanded {
            return Ok(());
        }

        self.info.locked = self.children.iter().all(|child| child.info.locked);
        if self.state.multi_land {
            self.update_multi_land_pn()
        } else {
            self.update_single_land_pn()
        }
    }

    fn update_multi_land_pn(&mut self) -> SolverResult<()> {
        if self.children.len() == 1 {
            self.info.pn = self.children[0].info.pn;
            return Ok(());
        }

        let mut proof = Pn::ZERO;
        for i in 0..self.children.len() {
            let complexity = self.child_base_complexity(i);
            if self.info.overestimated {
                proof = proof.max(complexity);
            } else {
                proof = proof.add(complexity)?;
            }
        }

        if self.info.overestimated {
            proof = proof.add(Pn::new(self.children.len() as u64 - 1))?;
        }

        self.info.pn = ProofNumbers::new(proof, proof);
        Ok(())
    }

    fn update_single_land_pn(&mut self) -> SolverResult<()> {
        let mut proof = if self.info.locked { Pn::ZERO } else { Pn::INF };
        let mut disproof = Pn::ZERO;
        for child in &self.children {
            if self.info.overestimated {
                disproof = disproof.max(child.info.pn.proof);
            } else {
                disproof = disproof.add(child.info.pn.proof)?;
            }

            if self.info.locked {
                proof = proof.max(child.info.pn.disproof);
            } else if !child.info.locked {
                proof = proof.min(child.info.pn.disproof);
            }
        }

        if self.info.overestimated {
            disproof = disproof.add(Pn::new(self.children.len() as u64 - 1))?;
        }

        self.info.pn = ProofNumbers::new(proof, disproof);
        Ok(())
    }

    #[must_use]
    pub fn get_expansion_info(&self) -> ExpansionInfo {
        let mut children = Vec::with_capacity(self.children.len());
        for child in &self.children {
            children.push((child.state.compact.to_string(), child.info.pn));
        }

        ExpansionInfo {
            parent: self.state.compact.to_string(),
            pn: self.info.pn,
            merged_nimber: self.info.merged_nimber,
            children,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_mpn_prefers_minimum_complexity() {
        let complexities = [Pn::new(5), Pn::new(2), Pn::new(7)];
        let (mpn, mpn2) = select_mpn(3, false, true, None, |i| complexities[i], |_| false);
        assert_eq!(mpn, 1);
        assert_eq!(mpn2, Some(0));
    }

    #[test]
    fn select_mpn_skips_locked_children() {
        let complexities = [Pn::new(1), Pn::new(2), Pn::new(3)];
        let (mpn, mpn2) = select_mpn(3, false, true, None, |i| complexities[i], |i| i == 0);
        assert_eq!(mpn, 1);
        assert_eq!(mpn2, Some(2));
    }

    #[test]
    fn select_mpn_without_land_switching_stops_at_first_subgame() {
        let complexities = [Pn::new(9), Pn::new(1)];
        let (mpn, mpn2) = select_mpn(2, true, false, None, |i| complexities[i], |_| false);
        assert_eq!(mpn, 0);
        assert_eq!(mpn2, None);
    }

    #[test]
    fn select_mpn_reports_runner_up_among_ties() {
        let complexities = [Pn::new(4), Pn::new(4), Pn::new(6)];
        let (mpn, mpn2) = select_mpn(3, false, true, None, |i| complexities[i], |_| false);
        assert_eq!(mpn, 0);
        assert_eq!(mpn2, Some(1));
    }
}
