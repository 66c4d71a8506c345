//! Shared schedule validation for the integration tests.

use chainspan::{Action, Sequence};

/// Asserts every schedule invariant on a complete, scheduled sequence:
///  - producers precede their consumers in sequence order,
///  - no op starts before all of its producers have finished,
///  - ops on the same processor never overlap and stay within `threads`,
///  - the makespan is bracketed by critical path and sequential cost,
///  - no two ops produce the same sub-Jacobian.
pub fn assert_valid_schedule(seq: &Sequence, threads: usize) {
    assert!(seq.is_fully_scheduled(), "unscheduled op in result");

    for u in 0..seq.len() {
        for v in 0..seq.len() {
            if seq[u].depends_on(&seq[v]) {
                assert!(v < u, "producer {v} appears after consumer {u}");
                assert!(
                    seq[u].start_time >= seq[v].end_time(),
                    "op {u} starts at {} before its producer {v} ends at {}",
                    seq[u].start_time,
                    seq[v].end_time(),
                );
            }
            if u != v {
                assert!(
                    !seq[u].same_result(&seq[v]),
                    "ops {u} and {v} both produce jac({}, {})",
                    seq[u].j,
                    seq[u].i,
                );
            }
        }
    }

    for u in 0..seq.len() {
        assert!(seq[u].thread < threads, "op {u} runs on processor {} >= {threads}", seq[u].thread);
        for v in (u + 1)..seq.len() {
            if seq[u].thread == seq[v].thread {
                let disjoint =
                    seq[u].end_time() <= seq[v].start_time || seq[v].end_time() <= seq[u].start_time;
                assert!(disjoint, "ops {u} and {v} overlap on processor {}", seq[u].thread);
            }
        }
    }

    let makespan = seq.makespan();
    let critical_path = {
        let mut unscheduled = seq.clone();
        unscheduled.reset_schedule();
        unscheduled.critical_path()
    };
    assert!(critical_path <= makespan, "makespan beats the critical path");
    assert!(makespan <= seq.sequential_makespan(), "makespan exceeds total work");
}

/// Asserts that the sequence contains no elimination ops.
#[allow(dead_code)]
pub fn assert_fully_accumulated(seq: &Sequence) {
    assert!(
        seq.iter().all(|op| op.action != Action::Elimination),
        "elimination op in a dense-only sequence"
    );
}
