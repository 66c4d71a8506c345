//! Branch-and-bound enumeration of elimination sequences.
//!
//! The search runs in two phases. *Phase A* fixes which factors start out
//! accumulated: for every admissible accumulation count it enumerates all
//! position combinations, each in its cheapest mode. *Phase B* then extends
//! the sequence depth-first with multiplications and (matrix-free)
//! eliminations until the whole chain is reduced, handing every complete
//! sequence to the inner scheduler.
//!
//! Each Phase-A leaf becomes an independent rayon task owning private copies
//! of the sequence, the chain state and the candidate list; tasks only share
//! the best-makespan slot (one atomic plus a mutex-guarded sequence) and the
//! statistics counters. A stale read of the atomic can at worst trigger a
//! redundant scheduling run, never a wrong result, because the installing
//! side re-checks under the lock.
//!
//! Branches whose critical path already reaches the best known makespan (or
//! the caller's upper bound) are cut; the per-depth prune counters make the
//! effect visible in the statistics.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use itertools::Itertools;
use log::debug;

use crate::chain::JacobianChain;
use crate::deadline::{expired, Deadline};
use crate::op::{Mode, Op};
use crate::sched::Scheduler;
use crate::seq::Sequence;

/// The two ways the most recently produced sub-Jacobian can be consumed
/// next: extend it forward (multiplication or tangent elimination) or
/// backward (multiplication or adjoint elimination). Either option may be
/// absent.
type CandidatePair = [Option<Op>; 2];

/// Counters collected during one [`solve`] run.
#[derive(Debug)]
pub struct SearchStats {
    /// Complete sequences handed to the inner scheduler.
    pub leafs: u64,
    /// How many of those improved the best makespan.
    pub updated_makespan: u64,
    /// Branches cut by the critical-path bound, indexed by sequence length.
    pub pruned_branches: Vec<u64>,
    /// `false` iff the outer deadline or any inner scheduler ran out of time.
    pub finished_in_time: bool,
}

impl SearchStats {
    pub fn pruned_total(&self) -> u64 {
        self.pruned_branches.iter().sum()
    }
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Leafs visited (= sequences scheduled): {}", self.leafs)?;
        writeln!(f, "Updated makespan: {}", self.updated_makespan)?;
        writeln!(f, "Pruned branches: {}", self.pruned_total())?;
        writeln!(f, "Pruned branches per sequence length:")?;
        write!(f, "[ ")?;
        for pruned in &self.pruned_branches {
            write!(f, "{pruned} ")?;
        }
        write!(f, "]")
    }
}

/// Searches all feasible elimination sequences of `chain` and returns the one
/// with the smallest makespan under `scheduler`, together with the search
/// statistics.
///
/// `threads` caps the processors of the inner scheduler (`0`: up to the
/// accumulation count). Sequences whose critical path exceeds `upper_bound`
/// are discarded outright. `budget` limits the wall-clock time of the whole
/// search including the inner scheduling runs.
///
/// If no sequence completes under the chain's memory gate, the result is
/// [`Sequence::max`]; callers report such chains as infeasible.
pub fn solve<S: Scheduler + Sync>(
    chain: &JacobianChain,
    scheduler: &S,
    threads: usize,
    upper_bound: usize,
    budget: Option<Duration>,
) -> (Sequence, SearchStats) {
    let sentinel = Sequence::max();
    let search = Search {
        scheduler,
        threads,
        upper_bound,
        deadline: budget.map(Deadline::after),
        best_makespan: AtomicUsize::new(sentinel.makespan()),
        best: Mutex::new(sentinel),
        leafs: AtomicU64::new(0),
        updated_makespan: AtomicU64::new(0),
        pruned_branches: (0..=chain.longest_possible_sequence())
            .map(|_| AtomicU64::new(0))
            .collect(),
        timer_expired: AtomicBool::new(false),
    };

    let length = chain.length();
    let min_accumulations = if chain.matrix_free { 0 } else { length - 1 };

    rayon::scope(|scope| {
        let search = &search;
        for accs in (min_accumulations + 1)..=length {
            for positions in (0..length).combinations(accs) {
                if expired(&search.deadline) {
                    return;
                }

                let mut sequence = Sequence::with_capacity(chain.longest_possible_sequence());
                let mut state = chain.clone();
                let mut candidates: Vec<CandidatePair> =
                    Vec::with_capacity(chain.longest_possible_sequence());

                for &j in &positions {
                    let op = state.cheapest_accumulation(j);
                    let applied = state.apply(&op);
                    debug_assert!(applied, "accumulation of a fresh factor cannot fail");
                    push_possible_eliminations(&state, &mut candidates, op.j, op.i);
                    sequence.push(op);
                }

                scope.spawn(move |_| search.eliminate(&mut sequence, &mut state, &mut candidates, 0));
            }
        }
    });

    let best = search.best.into_inner().expect("search tasks poisoned the best sequence");
    let stats = SearchStats {
        leafs: search.leafs.into_inner(),
        updated_makespan: search.updated_makespan.into_inner(),
        pruned_branches: search
            .pruned_branches
            .into_iter()
            .map(AtomicU64::into_inner)
            .collect(),
        finished_in_time: !search.timer_expired.into_inner() && !expired(&search.deadline),
    };
    debug!(
        "sequence search done: best makespan {}, {} leafs, {} pruned",
        stats_makespan(&best),
        stats.leafs,
        stats.pruned_total()
    );

    (best, stats)
}

fn stats_makespan(best: &Sequence) -> String {
    let makespan = best.makespan();
    if makespan == usize::MAX {
        "infeasible".to_owned()
    } else {
        makespan.to_string()
    }
}

struct Search<'a, S> {
    scheduler: &'a S,
    threads: usize,
    upper_bound: usize,
    deadline: Option<Deadline>,
    best_makespan: AtomicUsize,
    best: Mutex<Sequence>,
    leafs: AtomicU64,
    updated_makespan: AtomicU64,
    pruned_branches: Vec<AtomicU64>,
    timer_expired: AtomicBool,
}

impl<S: Scheduler + Sync> Search<'_, S> {
    /// Phase B body: depth-first extension of `sequence` by the pending
    /// candidates, starting at `elim_idx` (earlier candidates are settled and
    /// never revisited).
    fn eliminate(
        &self,
        sequence: &mut Sequence,
        state: &mut JacobianChain,
        candidates: &mut Vec<CandidatePair>,
        elim_idx: usize,
    ) {
        if expired(&self.deadline) {
            return;
        }

        if state.is_complete() {
            // the op that completed the chain can have no successor
            debug_assert_eq!(elim_idx, candidates.len() - 1);
            debug_assert!(candidates[elim_idx].iter().all(Option::is_none));
            self.schedule_leaf(sequence);
            return;
        }

        let lower_bound = sequence.critical_path();
        if lower_bound >= self.best_makespan.load(Ordering::Relaxed)
            || lower_bound > self.upper_bound
        {
            self.pruned_branches[sequence.len()].fetch_add(1, Ordering::Relaxed);
            return;
        }

        for idx in elim_idx..candidates.len() {
            for pair_idx in 0..2 {
                let Some(op) = candidates[idx][pair_idx] else {
                    continue;
                };
                if !state.apply(&op) {
                    continue;
                }

                push_possible_eliminations(state, candidates, op.j, op.i);
                sequence.push(op);

                self.eliminate(sequence, state, candidates, idx + 1);

                sequence.pop();
                candidates.pop();
                state.revert(&op);
            }
        }
    }

    /// Schedules a complete sequence and installs it if it improves on the
    /// best makespan seen so far.
    fn schedule_leaf(&self, sequence: &Sequence) {
        if expired(&self.deadline) {
            return;
        }

        let mut scheduled = sequence.clone();
        let current_best = self.best_makespan.load(Ordering::Relaxed);
        let result = self
            .scheduler
            .schedule(&mut scheduled, self.threads, current_best, self.deadline);

        if !result.finished_in_time {
            self.timer_expired.store(true, Ordering::Relaxed);
        }
        self.leafs.fetch_add(1, Ordering::Relaxed);

        let mut best = self.best.lock().expect("a search task panicked");
        // re-check under the lock: another task may have installed a better
        // schedule since the relaxed read
        if self.best_makespan.load(Ordering::Relaxed) > result.makespan {
            *best = scheduled;
            self.best_makespan.store(result.makespan, Ordering::Relaxed);
            self.updated_makespan.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Derives the candidate pair opened up by producing `jac(op_j, op_i)`.
///
/// Forward: the largest accumulated, unused `jac(j', op_j + 1)` yields a
/// multiplication; with none available in matrix-free mode the factor
/// `F_{op_j + 1}` can be tangent-eliminated into the new sub-Jacobian.
/// Backward, symmetrically: the smallest accumulated, unused
/// `jac(op_i - 1, i')` yields a multiplication, else `F_{op_i - 1}` can be
/// adjoint-eliminated under the memory gate.
fn push_possible_eliminations(
    state: &JacobianChain,
    candidates: &mut Vec<CandidatePair>,
    op_j: usize,
    op_i: usize,
) {
    let mut pair = CandidatePair::default();
    let length = state.length();

    if op_j < length - 1 {
        let k = op_j;
        let i = op_i;
        let ki = state.jacobian(k, i);

        let multiplicand = ((k + 1)..length).rev().find(|&j| {
            let jk = state.jacobian(j, k + 1);
            jk.is_accumulated && !jk.is_used
        });

        pair[0] = match multiplicand {
            Some(j) => {
                let jk = state.jacobian(j, k + 1);
                Some(Op::multiplication(j, k, i, jk.m * ki.m * ki.n))
            }
            None if state.matrix_free => {
                let factor = state.jacobian(k + 1, k + 1);
                Some(Op::elimination(
                    Mode::Tangent,
                    k + 1,
                    k,
                    i,
                    factor.tangent_fma_seeded(ki.n),
                ))
            }
            None => None,
        };
    }

    if op_i > 0 {
        let k = op_i - 1;
        let j = op_j;
        let jk = state.jacobian(j, k + 1);

        let multiplicand = (0..=k).find(|&i| {
            let ki = state.jacobian(k, i);
            ki.is_accumulated && !ki.is_used
        });

        pair[1] = match multiplicand {
            Some(i) => {
                let ki = state.jacobian(k, i);
                Some(Op::multiplication(j, k, i, jk.m * ki.m * ki.n))
            }
            None if state.matrix_free => {
                let factor = state.jacobian(k, k);
                state.memory_admits(factor.edges_in_dag).then(|| {
                    Op::elimination(Mode::Adjoint, j, k, k, factor.adjoint_fma_seeded(jk.m))
                })
            }
            None => None,
        };
    }

    candidates.push(pair);
}
