//! End-to-end sequence search scenarios with hand-built chains.

mod common;

use std::time::Duration;

use chainspan::chain::{Jacobian, JacobianChain};
use chainspan::sched::{BranchAndBound, PriorityList};
use chainspan::{dp, opt, Mode};

use common::{assert_fully_accumulated, assert_valid_schedule};

fn solve_exact(chain: &JacobianChain, threads: usize) -> (chainspan::Sequence, opt::SearchStats) {
    let upper_bound = dp::solve(chain).makespan();
    opt::solve(chain, &BranchAndBound, threads, upper_bound, None)
}

#[test]
fn single_link_is_one_accumulation() {
    // one 3x3 factor with 3 DAG edges: tangent accumulation costs 9
    let chain = JacobianChain::from_factors(&[Jacobian::factor(3, 3, 3)]);

    let (best, stats) = solve_exact(&chain, 1);
    assert_eq!(best.makespan(), 9);
    assert_eq!(best.len(), 1);
    assert!(stats.finished_in_time);
    assert_valid_schedule(&best, 1);
}

#[test]
fn two_links_accumulate_in_parallel() {
    // (5x4)(4x3) with tangent accumulation costing 60 per factor; the
    // product costs 5*4*3 = 60 and has to wait for both operands
    let chain = JacobianChain::from_factors(&[
        Jacobian::factor(4, 3, 20),
        Jacobian::factor(5, 4, 15),
    ]);

    let (best, _) = solve_exact(&chain, 2);
    assert_eq!(best.makespan(), 120);
    assert_eq!(best.sequential_makespan(), 180);
    assert_fully_accumulated(&best);
    assert_valid_schedule(&best, 2);
}

#[test]
fn three_links_on_three_processors() {
    // three 1x1 factors, 10 DAG edges each: accumulations cost 10, products
    // cost 1; accumulating all three in parallel and reducing is optimal
    let mut chain = JacobianChain::from_factors(&[
        Jacobian::factor(1, 1, 10),
        Jacobian::factor(1, 1, 10),
        Jacobian::factor(1, 1, 10),
    ]);
    chain.matrix_free = true;

    let (best, _) = solve_exact(&chain, 3);
    assert_eq!(best.makespan(), 12);
    assert_valid_schedule(&best, 3);
}

#[test]
fn four_identical_links_reduce_as_a_tree() {
    // four 8x8 factors with dense DAGs (64 edges): every accumulation,
    // product and elimination step costs 512, so the parallel optimum is
    // one accumulation round plus two product rounds
    let mut chain = JacobianChain::from_factors(&[
        Jacobian::factor(8, 8, 64),
        Jacobian::factor(8, 8, 64),
        Jacobian::factor(8, 8, 64),
        Jacobian::factor(8, 8, 64),
    ]);
    chain.matrix_free = true;

    let (best, stats) = solve_exact(&chain, 4);
    assert_eq!(best.makespan(), 1536);
    assert!(stats.leafs > 0);
    assert_valid_schedule(&best, 4);
}

#[test]
fn matrix_free_beats_full_accumulation_on_narrow_chains() {
    // n_0 = 1 makes tangent sweeps cheap (16 per factor) while dense
    // accumulation of any 4x4 factor alone costs 64
    let factors = [
        Jacobian::factor(4, 1, 4),
        Jacobian::factor(4, 4, 16),
        Jacobian::factor(4, 4, 16),
        Jacobian::factor(4, 4, 16),
        Jacobian::factor(4, 4, 16),
    ];

    let mut matrix_free = JacobianChain::from_factors(&factors);
    matrix_free.matrix_free = true;
    let (mf_best, _) = solve_exact(&matrix_free, 2);
    assert_eq!(mf_best.makespan(), 68);
    assert!(mf_best.iter().any(|op| op.mode == Mode::Tangent));

    let dense = JacobianChain::from_factors(&factors);
    let budget = Some(Duration::from_secs(10));
    let upper_bound = dp::solve(&dense).makespan();
    let (dense_best, _) = opt::solve(&dense, &BranchAndBound, 2, upper_bound, budget);
    // total dense work is 324, so two processors can never get below 162
    assert!(mf_best.makespan() < dense_best.makespan());
    if dense_best.makespan() != usize::MAX {
        assert_fully_accumulated(&dense_best);
        assert_valid_schedule(&dense_best, 2);
    }
}

#[test]
fn memory_gate_suppresses_adjoint_operations() {
    // 2x8 factors: adjoint accumulation (2e) is far cheaper than tangent
    // (8e), so without a cap the search goes adjoint everywhere
    let factors = [
        Jacobian::factor(2, 8, 16),
        Jacobian::factor(2, 2, 12),
        Jacobian::factor(2, 2, 12),
    ];

    let mut ungated = JacobianChain::from_factors(&factors);
    ungated.matrix_free = true;
    let (best, _) = solve_exact(&ungated, 2);
    assert!(best.iter().any(|op| op.mode == Mode::Adjoint));

    let mut gated = JacobianChain::from_factors(&factors);
    gated.matrix_free = true;
    gated.available_memory = 8;
    let (best, _) = solve_exact(&gated, 2);
    // every factor's DAG exceeds the cap: no adjoint op may survive
    assert!(best.iter().all(|op| op.mode != Mode::Adjoint));
    assert_valid_schedule(&best, 2);
}

#[test]
fn best_value_is_deterministic() {
    let mut chain = JacobianChain::from_factors(&[
        Jacobian::factor(8, 8, 64),
        Jacobian::factor(8, 8, 64),
        Jacobian::factor(8, 8, 64),
        Jacobian::factor(8, 8, 64),
    ]);
    chain.matrix_free = true;

    let (first, _) = solve_exact(&chain, 4);
    let (second, _) = solve_exact(&chain, 4);
    assert_eq!(first.makespan(), second.makespan());
}

#[test]
fn exhausted_budget_reports_the_sentinel() {
    let chain = JacobianChain::from_factors(&[
        Jacobian::factor(4, 3, 20),
        Jacobian::factor(5, 4, 15),
    ]);

    let (best, stats) = opt::solve(
        &chain,
        &PriorityList,
        2,
        usize::MAX,
        Some(Duration::ZERO),
    );
    assert_eq!(best.makespan(), usize::MAX);
    assert_eq!(stats.leafs, 0);
    assert!(!stats.finished_in_time);
}

#[test]
fn list_scheduled_search_is_an_upper_bound_for_the_exact_one() {
    let mut chain = JacobianChain::from_factors(&[
        Jacobian::factor(3, 5, 15),
        Jacobian::factor(4, 3, 12),
        Jacobian::factor(2, 4, 8),
    ]);
    chain.matrix_free = true;

    let upper_bound = dp::solve(&chain).makespan();
    let (list_best, _) = opt::solve(&chain, &PriorityList, 2, upper_bound, None);
    let (exact_best, _) = opt::solve(&chain, &BranchAndBound, 2, list_best.makespan(), None);

    assert!(exact_best.makespan() <= list_best.makespan());
    assert_valid_schedule(&exact_best, 2);
    assert_valid_schedule(&list_best, 2);
}
