//! Dynamic-programming baseline over contiguous sub-chains.
//!
//! Classic matrix-chain bracketing extended with accumulation modes: for
//! every sub-range `[i, j]` the table holds the cheapest way to materialise
//! `F_j * ... * F_i`, either by splitting at some `k` and multiplying, or
//! (matrix-free) by propagating tangents/adjoints through the whole range.
//! The result is a *sequential* elimination order; its makespan is the sum of
//! its FMA costs and serves as the initial upper bound for the
//! branch-and-bound searches.

use crate::chain::JacobianChain;
use crate::op::{Mode, Op};
use crate::seq::Sequence;

/// How the table materialises a sub-range.
#[derive(Clone, Copy, Debug)]
enum Bracket {
    /// Accumulate the single factor in the given mode.
    Accumulate(Mode),
    /// Accumulate `F_i` forward, then tangent-eliminate up to `F_j`.
    TangentChain,
    /// Accumulate `F_j` in reverse, then adjoint-eliminate down to `F_i`.
    AdjointChain,
    /// Multiply the optimal brackets of `[k+1, j]` and `[i, k]`.
    Split(usize),
}

struct Table {
    length: usize,
    cost: Vec<usize>,
    bracket: Vec<Bracket>,
}

impl Table {
    fn index(&self, j: usize, i: usize) -> usize {
        debug_assert!(i <= j && j < self.length);
        j * (j + 1) / 2 + i
    }

    fn cost(&self, j: usize, i: usize) -> usize {
        self.cost[self.index(j, i)]
    }
}

/// Fills the bracketing table bottom-up (by sub-range width).
fn build_table(chain: &JacobianChain) -> Table {
    let length = chain.length();
    let entries = length * (length + 1) / 2;
    let mut table = Table {
        length,
        cost: vec![usize::MAX; entries],
        bracket: vec![Bracket::Accumulate(Mode::Tangent); entries],
    };

    for j in 0..length {
        let op = chain.cheapest_accumulation(j);
        let idx = table.index(j, j);
        table.cost[idx] = op.fma;
        table.bracket[idx] = Bracket::Accumulate(op.mode);
    }

    for width in 2..=length {
        for i in 0..=(length - width) {
            let j = i + width - 1;
            let jac = chain.jacobian(j, i);

            let mut best = usize::MAX;
            let mut bracket = Bracket::Split(i);

            for k in i..j {
                let product = chain.jacobian(j, k + 1).m * chain.jacobian(k, i).m * jac.n;
                let cost = table.cost(j, k + 1) + table.cost(k, i) + product;
                if cost < best {
                    best = cost;
                    bracket = Bracket::Split(k);
                }
            }

            if chain.matrix_free {
                let tangent = jac.tangent_fma();
                if tangent < best {
                    best = tangent;
                    bracket = Bracket::TangentChain;
                }

                if adjoint_admissible(chain, j, i) {
                    let adjoint = jac.adjoint_fma();
                    if adjoint < best {
                        best = adjoint;
                        bracket = Bracket::AdjointChain;
                    }
                }
            }

            let idx = table.index(j, i);
            table.cost[idx] = best;
            table.bracket[idx] = bracket;
        }
    }

    table
}

/// An adjoint sweep over `[i, j]` touches every factor's DAG, so each one
/// must pass the memory gate.
fn adjoint_admissible(chain: &JacobianChain, j: usize, i: usize) -> bool {
    (i..=j).all(|f| chain.memory_admits(chain.jacobian(f, f).edges_in_dag))
}

/// Emits the operations of the bracket for `[i, j]` in producer-first order.
fn emit(chain: &JacobianChain, table: &Table, j: usize, i: usize, seq: &mut Sequence) {
    match table.bracket[table.index(j, i)] {
        Bracket::Accumulate(mode) => {
            let jac = chain.jacobian(j, j);
            let fma = match mode {
                Mode::Adjoint => jac.adjoint_fma(),
                _ => jac.tangent_fma(),
            };
            seq.push(Op::accumulation(mode, j, fma));
        }
        Bracket::TangentChain => {
            let cols = chain.jacobian(i, i).n;
            seq.push(Op::accumulation(
                Mode::Tangent,
                i,
                chain.jacobian(i, i).tangent_fma(),
            ));
            for f in (i + 1)..=j {
                let fma = chain.jacobian(f, f).tangent_fma_seeded(cols);
                seq.push(Op::elimination(Mode::Tangent, f, f - 1, i, fma));
            }
        }
        Bracket::AdjointChain => {
            let rows = chain.jacobian(j, j).m;
            seq.push(Op::accumulation(
                Mode::Adjoint,
                j,
                chain.jacobian(j, j).adjoint_fma(),
            ));
            for f in (i..j).rev() {
                let fma = chain.jacobian(f, f).adjoint_fma_seeded(rows);
                seq.push(Op::elimination(Mode::Adjoint, j, f, f, fma));
            }
        }
        Bracket::Split(k) => {
            emit(chain, table, j, k + 1, seq);
            emit(chain, table, k, i, seq);
            let fma = chain.jacobian(j, k + 1).m * chain.jacobian(k, i).m * chain.jacobian(k, i).n;
            seq.push(Op::multiplication(j, k, i, fma));
        }
    }
}

/// Optimal sequential bracketing of the whole chain.
///
/// The returned sequence is scheduled back-to-back on processor 0, so its
/// [`makespan`](Sequence::makespan) equals its sequential cost and the
/// sequence can be fed straight into the schedulers or used as an upper
/// bound.
pub fn solve(chain: &JacobianChain) -> Sequence {
    let table = build_table(chain);

    let mut seq = Sequence::with_capacity(chain.longest_possible_sequence());
    emit(chain, &table, chain.length() - 1, 0, &mut seq);

    let mut clock = 0;
    for op in seq.iter_mut() {
        op.thread = 0;
        op.start_time = clock;
        op.is_scheduled = true;
        clock += op.fma;
    }

    seq
}
