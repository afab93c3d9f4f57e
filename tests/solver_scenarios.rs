use std::sync::Arc;

use grundy::game::{Game, Outcome};
use grundy::games::Kayles;
use grundy::solver::master::MasterConfig;
use grundy::solver::{
    BasicPnsSolver, Couple, DfpnSolver, DfsSolver, Estimator, MasterSolver, NO_LIMIT, Nimber,
    NimberDatabase, ParallelDfpn, PnsSolver,
};

fn couple(s: &str) -> Couple<Kayles> {
    Couple::parse(s).unwrap()
}

fn fresh_db() -> Arc<NimberDatabase<Kayles>> {
    Arc::new(NimberDatabase::new(false))
}

fn dfs_outcome(c: &Couple<Kayles>) -> Outcome {
    DfsSolver::new(fresh_db(), false).solve_couple(c)
}

fn dfpn() -> DfpnSolver<Kayles> {
    DfpnSolver::new(fresh_db(), false, Estimator::Uniform, 1 << 16, 0)
}

#[test]
fn terminal_root_is_a_loss() {
    let root = couple("0 0");
    assert_eq!(dfs_outcome(&root), Outcome::Loss);
    assert_eq!(dfpn().solve_couple(&root).unwrap(), Outcome::Loss);
    assert_eq!(
        BasicPnsSolver::new(fresh_db(), false, Estimator::Uniform, 0)
            .solve_couple(&root)
            .unwrap(),
        Outcome::Loss
    );
}

#[test]
fn known_p_position_is_a_first_player_loss() {
    // G(1) ^ G(4) = 1 ^ 1 = 0.
    let root = couple("4+1 0");
    assert_eq!(dfs_outcome(&root), Outcome::Loss);
    assert_eq!(dfpn().solve_couple(&root).unwrap(), Outcome::Loss);
}

#[test]
fn every_algorithm_agrees_on_small_roots() {
    for root_str in ["2 0", "5 0", "6 1", "2+2 0", "3+1 2"] {
        let root = couple(root_str);
        let expected = dfs_outcome(&root);

        assert_eq!(dfpn().solve_couple(&root).unwrap(), expected, "{root_str}");
        assert_eq!(
            BasicPnsSolver::new(fresh_db(), false, Estimator::Uniform, 0)
                .solve_couple(&root)
                .unwrap(),
            expected,
            "{root_str}"
        );
        assert_eq!(
            ParallelDfpn::new(2, 0, 1.0, fresh_db(), Estimator::Uniform, 1 << 16, 0)
                .solve_couple(&root)
                .unwrap(),
            expected,
            "{root_str}"
        );
    }
}

#[test]
fn master_and_sequential_dfpn_agree_and_fill_the_database() {
    let root = couple("10 0");

    let mut sequential = dfpn();
    let sequential_outcome = sequential.solve_couple(&root).unwrap();

    let mut master: MasterSolver<Kayles> = MasterSolver::new(&MasterConfig {
        workers: 4,
        threads: 2,
        grouping: 2,
        iterations: 60,
        updates: 20,
        capacity: 1 << 16,
        ..MasterConfig::default()
    })
    .unwrap();
    let master_outcome = master.solve_couple(&root).unwrap();

    assert_eq!(master_outcome, sequential_outcome);

    // Every nimber discovered by the sequential proof is a true Grundy
    // value of its position.
    let mut oracle = DfsSolver::new(fresh_db(), false);
    let snapshot = sequential.nimber_database().snapshot();
    assert!(!snapshot.is_empty());
    for (position, nimber) in snapshot {
        let position = Kayles::from_compact(&position);
        assert_eq!(oracle.compute_nimber(&position), nimber, "{position}");
    }
}

#[test]
fn computed_nimber_is_the_smallest_losing_overlay() {
    let position: Kayles = "10".parse().unwrap();
    let expected = DfsSolver::new(fresh_db(), false).compute_nimber(&position);

    let mut reported = None;
    for nimber in 0..=u8::MAX {
        let outcome = dfpn()
            .solve_couple(&Couple::new(position.clone(), Nimber(nimber)))
            .unwrap();
        if outcome.is_loss() {
            reported = Some(Nimber(nimber));
            break;
        }
    }

    assert_eq!(reported, Some(expected));
    assert_eq!(expected, Nimber(2));
}

#[test]
fn generated_couples_round_trip_through_their_encoding() {
    let db = fresh_db();
    let mut frontier = vec![couple("5+3 2")];
    let mut visited = 0;
    while let Some(current) = frontier.pop() {
        if visited > 200 {
            break;
        }
        visited += 1;

        let compact = current.to_compact();
        let reparsed = Couple::<Kayles>::parse(&compact.to_string()).unwrap();
        assert_eq!(reparsed.to_compact(), compact);

        if let grundy::solver::CoupleExpansion::Children(children) =
            current.compute_children(&db)
        {
            frontier.extend(children);
        }
    }

    assert!(visited > 50);
}

#[test]
fn bounded_jobs_report_unknown_then_converge() {
    let root = couple("9 0");
    let mut solver = dfpn();
    let bounded = solver.expand_couple(&root, 3).unwrap();
    assert_eq!(bounded.pn.to_outcome(), Outcome::Unknown);

    let full = solver.expand_couple(&root, NO_LIMIT).unwrap();
    assert_eq!(full.pn.to_outcome(), dfs_outcome(&root));
}
