use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kernel::term::{Arg, Term, VarIndex};

/// One entry of a substitution: what a variable index maps to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Front {
    /// Replace the index by a term.
    Term(Term),

    /// Renumber the index to another index.
    Bound(VarIndex),
}

impl fmt::Display for Front {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Front::Term(t) => write!(f, "{}", t),
            Front::Bound(i) => write!(f, "x{}", i),
        }
    }
}

/// An explicit substitution: a finite sequence of fronts indexed from 1,
/// plus a shift applied to every index beyond the fronts.
///
/// `lookup(i)` is `fronts[i]` for `i` within the front list and
/// `i - fronts.len() + shift` beyond it. The identity is `shift 0` with no
/// fronts. Capture avoidance falls out of the index representation: applying
/// under a binder leaves small indices alone and shifts fronts as they move
/// inward.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Subst {
    fronts: Vec<Front>,
    shift: VarIndex,
}

impl Subst {
    /// The identity substitution.
    pub fn id() -> Subst {
        Subst {
            fronts: vec![],
            shift: 0,
        }
    }

    /// The substitution sending every index `i` to `i + n`.
    pub fn shift(n: VarIndex) -> Subst {
        Subst {
            fronts: vec![],
            shift: n,
        }
    }

    /// Prepends a front, so the new front answers for index 1 and previous
    /// fronts move up by one.
    pub fn cons(mut self, front: Front) -> Subst {
        self.fronts.insert(0, front);
        self
    }

    pub fn cons_term(self, term: Term) -> Subst {
        self.cons(Front::Term(term))
    }

    /// Extends with a renaming front.
    pub fn cons_bound(self, index: VarIndex) -> Subst {
        self.cons(Front::Bound(index))
    }

    pub fn is_identity(&self) -> bool {
        self.fronts.is_empty() && self.shift == 0
    }

    pub fn num_fronts(&self) -> usize {
        self.fronts.len()
    }

    /// What index `i >= 1` maps to.
    pub fn lookup(&self, i: VarIndex) -> Front {
        let n = self.fronts.len() as VarIndex;
        if i <= n {
            self.fronts[(i - 1) as usize].clone()
        } else {
            Front::Bound(i - n + self.shift)
        }
    }

    /// Composition: `compose(sigma, tau).apply(t) == sigma.apply(&tau.apply(t))`.
    pub fn compose(sigma: &Subst, tau: &Subst) -> Subst {
        let mut fronts: Vec<Front> = tau.fronts.iter().map(|f| sigma.apply_front(f)).collect();
        let k = sigma.fronts.len() as VarIndex;
        let shift = if k > tau.shift {
            fronts.extend(sigma.fronts[tau.shift as usize..].iter().cloned());
            sigma.shift
        } else {
            sigma.shift + (tau.shift - k)
        };
        Subst { fronts, shift }
    }

    fn apply_front(&self, front: &Front) -> Front {
        match front {
            Front::Term(t) => Front::Term(self.apply(t)),
            Front::Bound(j) => self.lookup(*j),
        }
    }

    /// Applies this substitution to a term. A bound index below the binder
    /// depth is untouched; at depth it consumes a front; above the fronts it
    /// is shifted. Term fronts are shifted by the depth as they move under
    /// binders.
    pub fn apply(&self, term: &Term) -> Term {
        if self.is_identity() {
            return term.clone();
        }
        self.apply_at(term, 0)
    }

    fn apply_at(&self, term: &Term, depth: VarIndex) -> Term {
        match term {
            Term::Bound(ty, index) => {
                if *index <= depth {
                    return Term::Bound(ty.clone(), *index);
                }
                match self.lookup(index - depth) {
                    Front::Bound(j) => Term::Bound(ty.clone(), j + depth),
                    Front::Term(t) => t.shifted(depth),
                }
            }
            Term::Symbol(key) => Term::Symbol(*key),
            Term::Abs(ty, body) => Term::abs(ty.clone(), self.apply_at(body, depth + 1)),
            Term::TypeAbs(body) => Term::type_abs(self.apply_at(body, depth)),
            Term::App(head, args) => {
                // The head may expand into an abstraction or another spine;
                // Term::apply keeps the result spine-normal. Redexes are left
                // for the normalizer.
                let head = self.apply_at(head, depth);
                let args = args
                    .iter()
                    .map(|arg| match arg {
                        Arg::Term(t) => Arg::Term(self.apply_at(t, depth)),
                        Arg::Ty(ty) => Arg::Ty(ty.clone()),
                    })
                    .collect();
                head.apply(args)
            }
        }
    }
}

impl fmt::Display for Subst {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, front) in self.fronts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "x{} -> {}", i + 1, front)?;
        }
        write!(f, " | shift {}}}", self.shift)
    }
}
