//! Scheduler variants on fixed elimination sequences.

mod common;

use rstest::*;

use chainspan::sched::{BranchAndBound, BranchAndBoundStack, PriorityList, Scheduler};
use chainspan::{Mode, Op, Sequence};

use common::assert_valid_schedule;

/// Four accumulations (costs 7, 5, 3, 1) reduced by three multiplications
/// (costs 2, 2, 4).
fn reduction_sequence() -> Sequence {
    let mut seq = Sequence::new();
    seq.push(Op::accumulation(Mode::Tangent, 0, 7));
    seq.push(Op::accumulation(Mode::Adjoint, 1, 5));
    seq.push(Op::accumulation(Mode::Tangent, 2, 3));
    seq.push(Op::accumulation(Mode::Adjoint, 3, 1));
    seq.push(Op::multiplication(1, 0, 0, 2));
    seq.push(Op::multiplication(3, 2, 2, 2));
    seq.push(Op::multiplication(3, 1, 0, 4));
    seq
}

#[rstest]
#[case::single(1, 24)]
// zero idle before the final product, e.g.
// t0: ACC0 [0,7) ACC3 [7,8) MUL(1,0) [8,10)
// t1: ACC1 [0,5) ACC2 [5,8) MUL(3,2) [8,10), final MUL [10,14)
#[case::pair(2, 14)]
// critical path: ACC0 + MUL(1,0) + final MUL
#[case::unbounded(0, 13)]
fn bnb_finds_optimal_makespans(#[case] threads: usize, #[case] expected: usize) {
    let mut seq = reduction_sequence();
    let result = BranchAndBound.schedule(&mut seq, threads, usize::MAX, None);

    assert_eq!(result.makespan, expected);
    assert!(result.finished_in_time);
    assert_eq!(seq.makespan(), expected);

    let cap = if threads == 0 { seq.count_accumulations() } else { threads };
    assert_valid_schedule(&seq, cap);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(4)]
fn stack_scheduler_matches_the_recursive_one(#[case] threads: usize) {
    let mut recursive = reduction_sequence();
    let mut iterative = reduction_sequence();

    let expected = BranchAndBound.schedule(&mut recursive, threads, usize::MAX, None);
    let actual = BranchAndBoundStack.schedule(&mut iterative, threads, usize::MAX, None);

    assert_eq!(expected, actual);
    assert_eq!(recursive.makespan(), iterative.makespan());
    assert_valid_schedule(&iterative, threads);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(4)]
fn list_schedule_is_valid_and_bounded(#[case] threads: usize) {
    let mut greedy = reduction_sequence();
    let list = PriorityList.schedule(&mut greedy, threads, usize::MAX, None);
    assert_valid_schedule(&greedy, threads);

    let mut exact = reduction_sequence();
    let optimal = BranchAndBound.schedule(&mut exact, threads, usize::MAX, None);
    assert!(
        optimal.makespan <= list.makespan,
        "list schedule beats the optimum"
    );
}

/// Re-running the exact scheduler with the achieved makespan plus one as the
/// bound must reproduce exactly that makespan.
#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
fn rescheduling_round_trip(#[case] threads: usize) {
    let mut seq = reduction_sequence();
    let first = BranchAndBound.schedule(&mut seq, threads, usize::MAX, None);

    let second = BranchAndBound.schedule(&mut seq, threads, first.makespan + 1, None);
    assert_eq!(second.makespan, first.makespan);
    assert_eq!(seq.makespan(), first.makespan);
}

/// With the bound at the achieved makespan itself, nothing can improve on it
/// and the critical path comes back as a certificate.
#[test]
fn bound_at_the_optimum_returns_a_lower_bound() {
    let mut seq = reduction_sequence();
    let optimal = BranchAndBound.schedule(&mut seq, 2, usize::MAX, None);

    let mut again = reduction_sequence();
    let result = BranchAndBound.schedule(&mut again, 2, optimal.makespan, None);
    assert!(result.makespan <= optimal.makespan);
    assert!(!again.is_fully_scheduled(), "no schedule below the optimum exists");
}
