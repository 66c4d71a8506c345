//! Operations on a Jacobian chain and their precedence relation.
//!
//! An [`Op`] is a node of the elimination DAG. The partial order between
//! operations is never materialised as a graph; it is a constant-time
//! predicate over the `(j, k, i)` index triples (see [`Op::depends_on`]).

use std::fmt;

/// What an operation does to the chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Action {
    /// Sentinel action of an unset operation (see [`Sequence::max`]).
    ///
    /// [`Sequence::max`]: crate::seq::Sequence::max
    #[default]
    None,
    /// Dense product of two accumulated sub-Jacobians.
    Multiplication,
    /// Materialisation of a single chain factor as a dense matrix.
    Accumulation,
    /// Matrix-free contraction of an adjacent factor into an accumulated
    /// sub-Jacobian.
    Elimination,
}

/// Differentiation mode of accumulations and eliminations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// No mode (multiplications and the sentinel).
    #[default]
    None,
    /// Forward mode.
    Tangent,
    /// Reverse mode.
    Adjoint,
}

/// A single operation together with its (optional) schedule slot.
///
/// The indices satisfy `i <= k <= j` and identify the sub-Jacobians the
/// operation consumes and produces:
///  - an accumulation `(j, j, j)` produces `jac(j, j)`,
///  - a multiplication `(j, k, i)` consumes `jac(j, k+1)` and `jac(k, i)`
///    and produces `jac(j, i)`,
///  - a tangent elimination `(k+1, k, i)` extends `jac(k, i)` forward,
///  - an adjoint elimination `(j, k, k)` extends `jac(j, k+1)` backward.
///
/// `thread`, `start_time` and `is_scheduled` are all zero/false until a
/// scheduler assigns the operation a slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Op {
    pub action: Action,
    pub mode: Mode,
    pub j: usize,
    pub k: usize,
    pub i: usize,
    /// Duration in fused multiply-adds.
    pub fma: usize,
    pub thread: usize,
    pub start_time: usize,
    pub is_scheduled: bool,
}

impl Op {
    pub fn accumulation(mode: Mode, j: usize, fma: usize) -> Self {
        Self {
            action: Action::Accumulation,
            mode,
            j,
            k: j,
            i: j,
            fma,
            ..Self::default()
        }
    }

    pub fn multiplication(j: usize, k: usize, i: usize, fma: usize) -> Self {
        Self {
            action: Action::Multiplication,
            mode: Mode::None,
            j,
            k,
            i,
            fma,
            ..Self::default()
        }
    }

    pub fn elimination(mode: Mode, j: usize, k: usize, i: usize, fma: usize) -> Self {
        Self {
            action: Action::Elimination,
            mode,
            j,
            k,
            i,
            fma,
            ..Self::default()
        }
    }

    /// Whether `self` consumes the sub-Jacobian produced by `producer`.
    ///
    /// Accumulations have no inputs. Otherwise `producer` feeds `self` iff it
    /// produced the right operand `jac(k, i)` or the left operand
    /// `jac(j, k+1)` of `self`.
    #[inline]
    pub fn depends_on(&self, producer: &Op) -> bool {
        debug_assert!(self.action != Action::None);
        debug_assert!(producer.action != Action::None);
        self.action != Action::Accumulation
            && ((self.i == producer.i && self.k == producer.j)
                || (self.j == producer.j && self.k + 1 == producer.i))
    }

    /// Two operations producing the same sub-Jacobian `jac(j, i)` represent
    /// duplicate work; a well-formed sequence never contains such a pair.
    #[inline]
    pub fn same_result(&self, other: &Op) -> bool {
        self.i == other.i && self.j == other.j
    }

    /// Completion time under the current schedule slot.
    #[inline]
    pub fn end_time(&self) -> usize {
        self.start_time + self.fma
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::None => "   ",
            Action::Multiplication => "MUL",
            Action::Accumulation => "ACC",
            Action::Elimination => "ELI",
        })
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::None => "   ",
            Mode::Tangent => "TAN",
            Mode::Adjoint => "ADJ",
        })
    }
}

/// Schedule line format: `<ACTION> <MODE> (i k+1 j+1) [thread: start - end] fma`.
///
/// Accumulations omit the operand slot their mode does not read.
impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.action == Action::Accumulation {
            debug_assert!(self.mode != Mode::None);
            return match self.mode {
                Mode::Adjoint => write!(
                    f,
                    "{} {} (   {:2} {:2}) [{}: {} - {}] {}",
                    self.action,
                    self.mode,
                    self.i,
                    self.j + 1,
                    self.thread,
                    self.start_time,
                    self.end_time(),
                    self.fma
                ),
                _ => write!(
                    f,
                    "{} {} ({:2} {:2}   ) [{}: {} - {}] {}",
                    self.action,
                    self.mode,
                    self.i,
                    self.j + 1,
                    self.thread,
                    self.start_time,
                    self.end_time(),
                    self.fma
                ),
            };
        }

        write!(
            f,
            "{} {} ({:2} {:2} {:2}) [{}: {} - {}] {}",
            self.action,
            self.mode,
            self.i,
            self.k + 1,
            self.j + 1,
            self.thread,
            self.start_time,
            self.end_time(),
            self.fma
        )
    }
}
