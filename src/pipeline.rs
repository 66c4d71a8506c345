//! Solver pipeline: baseline, warm start, exact search.
//!
//! The coordinator chains the solvers so that every stage starts from the
//! best upper bound established by the previous one:
//!
//! 1. dynamic programming gives a sequential baseline,
//! 2. the list and branch-and-bound schedulers parallelise it,
//! 3. the sequence search with the cheap list scheduler tightens the bound,
//! 4. the sequence search with the branch-and-bound scheduler closes in on
//!    the optimum.
//!
//! Every phase runs under its own wall-clock budget from the configuration.

use std::time::{Duration, Instant};

use log::info;

use crate::chain::JacobianChain;
use crate::config::Config;
use crate::deadline::Deadline;
use crate::dp;
use crate::opt;
use crate::opt::SearchStats;
use crate::sched::{BranchAndBound, BranchAndBoundStack, PriorityList, Scheduler};
use crate::seq::Sequence;

/// One pipeline stage and everything needed to report it.
pub struct Phase {
    pub label: &'static str,
    /// Stem of the DOT file this phase is rendered to, if any.
    pub dot_stem: Option<&'static str>,
    pub sequence: Sequence,
    pub makespan: usize,
    pub duration: Duration,
    pub stats: Option<SearchStats>,
}

impl Phase {
    pub fn is_feasible(&self) -> bool {
        self.makespan != usize::MAX
    }
}

/// Full single-chain run.
pub struct SingleReport {
    /// Forward-mode cost of accumulating the whole chain in one sweep.
    pub tangent_reference: usize,
    /// Reverse-mode counterpart.
    pub adjoint_reference: usize,
    pub phases: Vec<Phase>,
}

/// Runs the whole pipeline on one chain.
pub fn run_single(chain: &JacobianChain, config: &Config) -> SingleReport {
    let threads = config.usable_threads;
    let budget = config.phase_budget();
    let whole = chain.jacobian(chain.length() - 1, 0);

    let mut phases = Vec::new();

    // sequential baseline
    let (mut dp_seq, duration) = timed(|| dp::solve(chain));
    phases.push(Phase {
        label: "DP",
        dot_stem: Some("dynamic_programming"),
        sequence: dp_seq.clone(),
        makespan: dp_seq.makespan(),
        duration,
        stats: None,
    });

    // parallelise the baseline sequence
    let (_, duration) = timed(|| {
        PriorityList.schedule(&mut dp_seq, threads, usize::MAX, budget.map(Deadline::after))
    });
    phases.push(Phase {
        label: "DP + list scheduling",
        dot_stem: None,
        sequence: dp_seq.clone(),
        makespan: dp_seq.makespan(),
        duration,
        stats: None,
    });

    let (_, duration) = timed(|| {
        BranchAndBound.schedule(&mut dp_seq, threads, usize::MAX, budget.map(Deadline::after))
    });
    phases.push(Phase {
        label: "DP + B&B scheduling",
        dot_stem: None,
        sequence: dp_seq.clone(),
        makespan: dp_seq.makespan(),
        duration,
        stats: None,
    });

    // sequence search, warm inner scheduler
    let upper_bound = dp_seq.makespan();
    let ((list_seq, list_stats), duration) =
        timed(|| opt::solve(chain, &PriorityList, threads, upper_bound, budget));
    let list_makespan = list_seq.makespan();
    phases.push(Phase {
        label: "B&B + list scheduling",
        dot_stem: Some("branch_and_bound_list"),
        sequence: list_seq,
        makespan: list_makespan,
        duration,
        stats: Some(list_stats),
    });

    // sequence search, exact inner scheduler
    let ((bnb_seq, bnb_stats), duration) =
        timed(|| opt::solve(chain, &BranchAndBound, threads, list_makespan, budget));
    let bnb_makespan = bnb_seq.makespan();
    phases.push(Phase {
        label: "B&B + B&B scheduling",
        dot_stem: Some("branch_and_bound"),
        sequence: bnb_seq,
        makespan: bnb_makespan,
        duration,
        stats: Some(bnb_stats),
    });

    // the stack-based scheduler reproduces the recursive results without
    // recursion; re-scheduling the baseline exercises it end-to-end
    let mut stack_seq = phases[0].sequence.clone();
    let (_, duration) = timed(|| {
        BranchAndBoundStack.schedule(
            &mut stack_seq,
            threads,
            usize::MAX,
            budget.map(Deadline::after),
        )
    });
    phases.push(Phase {
        label: "DP + stack B&B scheduling",
        dot_stem: None,
        sequence: stack_seq.clone(),
        makespan: stack_seq.makespan(),
        duration,
        stats: None,
    });

    for phase in &phases {
        info!(
            "{}: makespan {} in {:?}",
            phase.label,
            phase.makespan,
            phase.duration
        );
    }

    SingleReport {
        tangent_reference: whole.tangent_fma(),
        adjoint_reference: whole.adjoint_fma(),
        phases,
    }
}

/// One batch-mode measurement: every solver combination on one chain with a
/// fixed processor count `t`.
pub struct BatchCell {
    pub finished: bool,
    pub bnb_bnb: usize,
    pub bnb_list: usize,
    pub dp: usize,
    pub dp_bnb: usize,
}

/// Runs all solver combinations for one `(chain, t)` pair. `dp_seq` is the
/// chain's DP baseline (independent of `t`).
pub fn run_batch_cell(
    chain: &JacobianChain,
    dp_seq: &Sequence,
    t: usize,
    budget: Option<Duration>,
) -> BatchCell {
    let dp = dp_seq.makespan();

    let mut dp_scheduled = dp_seq.clone();
    BranchAndBound.schedule(&mut dp_scheduled, t, dp, budget.map(Deadline::after));
    let dp_bnb = dp_scheduled.makespan();

    let (list_seq, _) = opt::solve(chain, &PriorityList, t, dp_bnb, budget);
    let bnb_list = list_seq.makespan();

    let (bnb_seq, stats) = opt::solve(chain, &BranchAndBound, t, bnb_list, budget);

    BatchCell {
        finished: stats.finished_in_time,
        bnb_bnb: bnb_seq.makespan(),
        bnb_list,
        dp,
        dp_bnb,
    }
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}
