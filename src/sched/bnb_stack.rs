//! Branch-and-bound scheduling on an explicit stack.
//!
//! Same search tree, same bounds and same results as
//! [`crate::sched::bnb::BranchAndBound`], but the recursion is replaced by a
//! hand-managed frame stack so the variant also works where deep call stacks
//! are unavailable. Frames are reused across descents; nothing allocates
//! inside the search loop.

use crate::deadline::{expired, Deadline};
use crate::sched::{ScheduleResult, Scheduler};
use crate::seq::Sequence;

/// Iterative twin of [`BranchAndBound`](crate::sched::BranchAndBound).
pub struct BranchAndBoundStack;

/// Saved quantities of the assignment a frame currently has in flight.
#[derive(Clone, Copy, Default)]
struct Saved {
    start_time: usize,
    thread_load: usize,
    idling_time: usize,
    makespan: usize,
}

/// One suspended DFS frame.
#[derive(Clone, Copy, Default)]
struct Frame {
    /// Index of the op this frame is currently branching on (or scanning
    /// from).
    op_idx: usize,
    /// Next processor to try for `op_idx`.
    thread: usize,
    /// An empty processor has already been tried; further ones are symmetric.
    tried_empty_processor: bool,
    /// No unscheduled op was seen while scanning; the frame is a leaf.
    everything_scheduled: bool,
    /// Earliest admissible start of `op_idx`.
    earliest_start: usize,
    /// `op_idx` is marked scheduled and the thread loop is active.
    op_selected: bool,
    saved: Saved,
}

impl Scheduler for BranchAndBoundStack {
    fn schedule_clamped(
        &self,
        seq: &mut Sequence,
        usable_threads: usize,
        upper_bound: usize,
        deadline: Option<Deadline>,
    ) -> ScheduleResult {
        let mut working = seq.clone();
        working.reset_schedule();

        let lower_bound = working.critical_path();
        if lower_bound >= upper_bound {
            return ScheduleResult {
                makespan: lower_bound,
                finished_in_time: true,
            };
        }

        let sequential_makespan = seq.sequential_makespan();
        let mut thread_loads = vec![0usize; usable_threads];
        let mut makespan = 0usize;
        let mut idling_time = 0usize;
        let mut best = upper_bound;
        let mut timed_out = false;

        let mut stack: Vec<Frame> = Vec::with_capacity(seq.len() + 1);
        stack.push(Frame::default());
        // a freshly pushed frame "enters"; a popped child "resumes" its parent
        let mut entering = true;

        'search: while let Some(frame_idx) = stack.len().checked_sub(1) {
            if entering {
                if expired(&deadline) {
                    timed_out = true;
                    break 'search;
                }
                stack[frame_idx] = Frame {
                    everything_scheduled: true,
                    ..Frame::default()
                };
            } else {
                // child exhausted: undo the in-flight assignment, move to the
                // next processor
                let frame = stack[frame_idx];
                let t = frame.thread;
                thread_loads[t] = frame.saved.thread_load;
                idling_time = frame.saved.idling_time;
                makespan = frame.saved.makespan;
                working[frame.op_idx].start_time = frame.saved.start_time;
                stack[frame_idx].thread += 1;
            }

            loop {
                let frame = stack[frame_idx];

                if !frame.op_selected {
                    // scan for the next candidate op
                    let mut op_idx = frame.op_idx;
                    let mut everything_scheduled = frame.everything_scheduled;
                    while op_idx < seq.len() {
                        if working[op_idx].is_scheduled {
                            op_idx += 1;
                            continue;
                        }
                        everything_scheduled = false;
                        if !working.is_schedulable(op_idx) {
                            op_idx += 1;
                            continue;
                        }
                        break;
                    }

                    if op_idx >= seq.len() {
                        // frame exhausted; install the schedule at leaves
                        if everything_scheduled && makespan < best {
                            best = makespan;
                            for i in 0..seq.len() {
                                seq[i].thread = working[i].thread;
                                seq[i].start_time = working[i].start_time;
                                seq[i].is_scheduled = true;
                            }
                            if best <= lower_bound {
                                break 'search;
                            }
                        }
                        stack.pop();
                        entering = false;
                        continue 'search;
                    }

                    working[op_idx].is_scheduled = true;
                    stack[frame_idx] = Frame {
                        op_idx,
                        thread: 0,
                        tried_empty_processor: false,
                        everything_scheduled,
                        earliest_start: working.earliest_start(op_idx),
                        op_selected: true,
                        saved: Saved::default(),
                    };
                    continue;
                }

                // thread loop for the selected op
                let op_idx = frame.op_idx;
                let mut advanced = false;
                while stack[frame_idx].thread < usable_threads {
                    let t = stack[frame_idx].thread;

                    if thread_loads[t] == 0 {
                        if stack[frame_idx].tried_empty_processor {
                            break;
                        }
                        stack[frame_idx].tried_empty_processor = true;
                    }

                    let saved = Saved {
                        start_time: working[op_idx].start_time,
                        thread_load: thread_loads[t],
                        idling_time,
                        makespan,
                    };

                    let start_time = thread_loads[t].max(stack[frame_idx].earliest_start);
                    working[op_idx].start_time = start_time;
                    thread_loads[t] = start_time + seq[op_idx].fma;
                    idling_time += start_time - saved.thread_load;
                    makespan = makespan.max(thread_loads[t]);

                    let lb = ((idling_time + sequential_makespan) / usable_threads)
                        .max(working.critical_path());
                    if lb.max(makespan) < best {
                        working[op_idx].thread = t;
                        stack[frame_idx].saved = saved;
                        stack.push(Frame::default());
                        entering = true;
                        advanced = true;
                        break;
                    }

                    // bound failed: restore and try the next processor
                    thread_loads[t] = saved.thread_load;
                    idling_time = saved.idling_time;
                    makespan = saved.makespan;
                    working[op_idx].start_time = saved.start_time;
                    stack[frame_idx].thread += 1;
                }

                if advanced {
                    continue 'search;
                }

                // processors exhausted: release the op, resume scanning
                working[op_idx].is_scheduled = false;
                stack[frame_idx].op_selected = false;
                stack[frame_idx].op_idx = op_idx + 1;
            }
        }

        ScheduleResult {
            makespan: best,
            finished_in_time: !timed_out,
        }
    }
}
