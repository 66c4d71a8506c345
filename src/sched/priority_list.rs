//! Priority-list scheduling over in-tree levels.

use std::collections::BinaryHeap;

use crate::deadline::Deadline;
use crate::sched::{ScheduleResult, Scheduler};
use crate::seq::Sequence;

/// Greedy list scheduler.
///
/// Operations are ordered by *descending* in-tree level (accumulations feed
/// the deepest chains and come first), ties broken by descending FMA cost.
/// Because every producer sits strictly deeper than its consumer, popping in
/// this order guarantees that all producers of an op are placed before the
/// op itself; no explicit readiness check is needed.
///
/// Each op goes to the processor where it can start earliest; among equal
/// start times the processor with the least idle insertion wins. One pass,
/// no revisiting. Rather often optimal, and always a valid warm upper bound
/// for the branch-and-bound scheduler.
pub struct PriorityList;

impl Scheduler for PriorityList {
    fn schedule_clamped(
        &self,
        seq: &mut Sequence,
        usable_threads: usize,
        _upper_bound: usize,
        _deadline: Option<Deadline>,
    ) -> ScheduleResult {
        seq.reset_schedule();

        // (level, fma, op index): BinaryHeap pops the deepest level first,
        // then the costliest op; the index makes ties deterministic.
        let mut queue: BinaryHeap<(usize, usize, usize)> = (0..seq.len())
            .map(|op_idx| (seq.level(op_idx), seq[op_idx].fma, op_idx))
            .collect();

        let mut thread_loads = vec![0usize; usable_threads];

        while let Some((_, _, op_idx)) = queue.pop() {
            let earliest_start = seq.earliest_start(op_idx);

            let mut thread = 0;
            let mut start_time = thread_loads[0].max(earliest_start);
            let mut idle = start_time - thread_loads[0];

            for (t, &load) in thread_loads.iter().enumerate().skip(1) {
                let start_on_t = load.max(earliest_start);
                let idle_on_t = start_on_t - load;
                if start_on_t < start_time || (start_on_t == start_time && idle_on_t < idle) {
                    thread = t;
                    start_time = start_on_t;
                    idle = idle_on_t;
                }
            }

            let op = &mut seq[op_idx];
            op.thread = thread;
            op.start_time = start_time;
            op.is_scheduled = true;
            thread_loads[thread] = start_time + op.fma;
        }

        ScheduleResult {
            makespan: seq.makespan(),
            finished_in_time: true,
        }
    }
}
