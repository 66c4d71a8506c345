//! Jacobian chains and their mutable search state.
//!
//! A [`JacobianChain`] stores one [`Jacobian`] record per sub-range `[i, j]`
//! of the chain `F_{n-1} * ... * F_0` in a triangular table. During the
//! depth-first searches the table doubles as the search state: which
//! sub-Jacobians have been accumulated and which have already been consumed
//! by a multiplication or elimination. [`JacobianChain::apply`] and
//! [`JacobianChain::revert`] are exact inverses, which is what allows the
//! searches to backtrack without copying the chain.

use crate::op::{Action, Mode, Op};

/// Dimensions, DAG size and search state of one sub-Jacobian `F_j * ... * F_i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Jacobian {
    /// Number of rows (`m_j` of the leftmost factor).
    pub m: usize,
    /// Number of columns (`n_i` of the rightmost factor).
    pub n: usize,
    /// Number of edges in the underlying computational DAG. Serves both as
    /// the propagation cost base and as the memory proxy for the adjoint
    /// gate.
    pub edges_in_dag: usize,
    /// The dense sub-Jacobian has been materialised.
    pub is_accumulated: bool,
    /// The sub-Jacobian has been consumed; each one may be used at most once.
    pub is_used: bool,
}

impl Jacobian {
    pub fn factor(m: usize, n: usize, edges_in_dag: usize) -> Self {
        Self {
            m,
            n,
            edges_in_dag,
            ..Self::default()
        }
    }

    /// Cost of propagating `cols` tangents through the DAG.
    #[inline]
    pub fn tangent_fma_seeded(&self, cols: usize) -> usize {
        self.edges_in_dag * cols
    }

    /// Cost of accumulating this Jacobian in forward mode.
    #[inline]
    pub fn tangent_fma(&self) -> usize {
        self.tangent_fma_seeded(self.n)
    }

    /// Cost of propagating `rows` adjoints through the DAG.
    #[inline]
    pub fn adjoint_fma_seeded(&self, rows: usize) -> usize {
        self.edges_in_dag * rows
    }

    /// Cost of accumulating this Jacobian in reverse mode.
    #[inline]
    pub fn adjoint_fma(&self) -> usize {
        self.adjoint_fma_seeded(self.m)
    }
}

/// A chain of `length` factors plus the state of every sub-Jacobian.
///
/// `matrix_free` admits tangent/adjoint eliminations; `available_memory`
/// gates adjoint-mode operations (`0` disables the gate).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JacobianChain {
    length: usize,
    /// Triangular table: `jac(j, i)` for `i <= j` lives at `j*(j+1)/2 + i`.
    jacobians: Vec<Jacobian>,
    pub matrix_free: bool,
    pub available_memory: usize,
}

impl JacobianChain {
    /// Builds the chain from its single factors (`factors[f]` is `F_f`) and
    /// precomputes dimensions and DAG sizes of every sub-range.
    pub fn from_factors(factors: &[Jacobian]) -> Self {
        let length = factors.len();
        assert!(length > 0, "empty Jacobian chain");

        let mut jacobians = Vec::with_capacity(length * (length + 1) / 2);
        for j in 0..length {
            for i in 0..=j {
                let edges_in_dag = factors[i..=j].iter().map(|f| f.edges_in_dag).sum();
                jacobians.push(Jacobian {
                    m: factors[j].m,
                    n: factors[i].n,
                    edges_in_dag,
                    is_accumulated: false,
                    is_used: false,
                });
            }
        }

        Self {
            length,
            jacobians,
            matrix_free: false,
            available_memory: 0,
        }
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    fn index(&self, j: usize, i: usize) -> usize {
        debug_assert!(i <= j && j < self.length);
        j * (j + 1) / 2 + i
    }

    #[inline]
    pub fn jacobian(&self, j: usize, i: usize) -> &Jacobian {
        &self.jacobians[self.index(j, i)]
    }

    #[inline]
    fn jacobian_mut(&mut self, j: usize, i: usize) -> &mut Jacobian {
        let idx = self.index(j, i);
        &mut self.jacobians[idx]
    }

    /// The whole chain has been reduced to a single Jacobian.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.jacobian(self.length - 1, 0).is_accumulated
    }

    /// Adjoint-mode memory gate: a zero cap admits everything.
    #[inline]
    pub fn memory_admits(&self, edges_in_dag: usize) -> bool {
        self.available_memory == 0 || self.available_memory >= edges_in_dag
    }

    /// Upper bound on the length of any elimination sequence for this chain:
    /// `n` accumulations plus `n - 1` merging operations.
    pub fn longest_possible_sequence(&self) -> usize {
        2 * self.length - 1
    }

    /// Accumulation of factor `j` in whichever mode costs fewer FMA; the
    /// adjoint mode competes only when the memory gate admits it. The mode is
    /// fixed here, before any search, and never reconsidered.
    pub fn cheapest_accumulation(&self, j: usize) -> Op {
        let jac = self.jacobian(j, j);
        let mut op = Op::accumulation(Mode::Tangent, j, jac.tangent_fma());

        if self.memory_admits(jac.edges_in_dag) {
            let adjoint_fma = jac.adjoint_fma();
            if adjoint_fma < op.fma {
                op.mode = Mode::Adjoint;
                op.fma = adjoint_fma;
            }
        }

        op
    }

    /// Applies `op` to the chain state. Returns `false` and leaves the state
    /// untouched when a precondition fails:
    ///  - accumulation: target not yet accumulated, memory gate for adjoint;
    ///  - multiplication: both operands accumulated and unused;
    ///  - elimination: matrix-free mode, extended operand accumulated and
    ///    unused, memory gate on the eliminated factor for adjoint.
    pub fn apply(&mut self, op: &Op) -> bool {
        match op.action {
            Action::Accumulation => {
                let jac = self.jacobian(op.j, op.j);
                if jac.is_accumulated {
                    return false;
                }
                if op.mode == Mode::Adjoint && !self.memory_admits(jac.edges_in_dag) {
                    return false;
                }
                self.jacobian_mut(op.j, op.j).is_accumulated = true;
            }
            Action::Multiplication => {
                let left = self.jacobian(op.j, op.k + 1);
                let right = self.jacobian(op.k, op.i);
                if !left.is_accumulated || left.is_used {
                    return false;
                }
                if !right.is_accumulated || right.is_used {
                    return false;
                }
                if self.jacobian(op.j, op.i).is_accumulated {
                    return false;
                }
                self.jacobian_mut(op.j, op.k + 1).is_used = true;
                self.jacobian_mut(op.k, op.i).is_used = true;
                self.jacobian_mut(op.j, op.i).is_accumulated = true;
            }
            Action::Elimination => {
                if !self.matrix_free {
                    return false;
                }
                let (ext_j, ext_i) = match op.mode {
                    // tangent elimination (k+1, k, i) extends jac(k, i)
                    Mode::Tangent => (op.k, op.i),
                    // adjoint elimination (j, k, k) extends jac(j, k+1)
                    Mode::Adjoint => (op.j, op.k + 1),
                    Mode::None => return false,
                };
                let extended = self.jacobian(ext_j, ext_i);
                if !extended.is_accumulated || extended.is_used {
                    return false;
                }
                if op.mode == Mode::Adjoint {
                    let factor = self.jacobian(op.k, op.k);
                    if !self.memory_admits(factor.edges_in_dag) {
                        return false;
                    }
                }
                if self.jacobian(op.j, op.i).is_accumulated {
                    return false;
                }
                self.jacobian_mut(ext_j, ext_i).is_used = true;
                self.jacobian_mut(op.j, op.i).is_accumulated = true;
            }
            Action::None => return false,
        }
        true
    }

    /// Undoes exactly the state bits set by the paired successful [`apply`].
    ///
    /// [`apply`]: JacobianChain::apply
    pub fn revert(&mut self, op: &Op) {
        match op.action {
            Action::Accumulation => {
                self.jacobian_mut(op.j, op.j).is_accumulated = false;
            }
            Action::Multiplication => {
                self.jacobian_mut(op.j, op.k + 1).is_used = false;
                self.jacobian_mut(op.k, op.i).is_used = false;
                self.jacobian_mut(op.j, op.i).is_accumulated = false;
            }
            Action::Elimination => {
                let (ext_j, ext_i) = match op.mode {
                    Mode::Tangent => (op.k, op.i),
                    Mode::Adjoint => (op.j, op.k + 1),
                    Mode::None => unreachable!("elimination without a mode"),
                };
                self.jacobian_mut(ext_j, ext_i).is_used = false;
                self.jacobian_mut(op.j, op.i).is_accumulated = false;
            }
            Action::None => unreachable!("revert of an unset operation"),
        }
    }
}
