use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::kernel::fresh::FreshVarGen;
use crate::kernel::huet::{bind, decompose, func, imitate, project, Equation, SolvedPair};
use crate::kernel::normalize::{beta_normalize, to_canonical};
use crate::kernel::substitution::Subst;
use crate::kernel::term::{KernelError, Term};
use crate::signature::Signature;

/// The default bound on flex-rigid branchings along one search path.
/// Without a bound the stream can be infinite.
pub const DEFAULT_MAX_DEPTH: usize = 60;

/// A pre-unifier: a substitution plus the postponed flex-flex residual.
/// Sound, but only fully solved when the residual is empty.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PreUnifier {
    pub subst: Subst,
    pub residual: Vec<Equation>,
}

impl fmt::Display for PreUnifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.subst)?;
        if !self.residual.is_empty() {
            write!(f, " postponing ")?;
            for (i, eq) in self.residual.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", eq)?;
            }
        }
        Ok(())
    }
}

/// One node of the search: the unsolved equations and the solved pairs
/// accumulated on the path to it. Nodes are immutable once enqueued.
#[derive(Clone, Debug)]
struct Configuration {
    unsolved: Vec<Equation>,
    solved: Vec<SolvedPair>,
    depth: usize,
}

impl Configuration {
    /// A child with the partial-binding equation prepended to the parent's
    /// unsolved list.
    fn child(
        binding: Equation,
        unsolved: &[Equation],
        solved: &[SolvedPair],
        depth: usize,
    ) -> Configuration {
        let mut new_unsolved = Vec::with_capacity(unsolved.len() + 1);
        new_unsolved.push(binding);
        new_unsolved.extend_from_slice(unsolved);
        Configuration {
            unsolved: new_unsolved,
            solved: solved.to_vec(),
            depth,
        }
    }
}

/// Computes the composite substitution realizing a solved set: start from a
/// shift past the largest bound index, then cons a front per index downward,
/// renaming indices that have no binding.
pub fn subst_from_solved(solved: &[SolvedPair]) -> Subst {
    let max = solved.iter().map(|pair| pair.index).max().unwrap_or(0);
    let mut subst = Subst::shift(max);
    for index in (1..=max).rev() {
        subst = match solved.iter().find(|pair| pair.index == index) {
            Some(pair) => subst.cons_term(pair.term.clone()),
            None => subst.cons_bound(index),
        };
    }
    subst
}

/// The substitution for one freshly solved pair, used to eliminate the
/// variable from the rest of a configuration.
fn subst_for_pair(pair: &SolvedPair) -> Subst {
    subst_from_solved(std::slice::from_ref(pair))
}

/// Keeps equations involving a rigid side ahead of flex-flex ones, so the
/// head equation tells the driver everything about the rest of the list.
fn sort_unsolved(unsolved: &mut [Equation]) {
    unsolved.sort_by_key(|eq| eq.is_flex_flex());
}

/// Applies Delete, Decompose, Bind and Func to fixpoint, in that priority
/// order. Returns the normalized unsolved list and the grown solved set.
fn exhaust(
    mut unsolved: Vec<Equation>,
    mut solved: Vec<SolvedPair>,
    sig: &mut Signature,
) -> (Vec<Equation>, Vec<SolvedPair>) {
    sort_unsolved(&mut unsolved);
    loop {
        // Delete
        if let Some(pos) = unsolved.iter().position(|eq| eq.left == eq.right) {
            unsolved.remove(pos);
            continue;
        }

        // Decompose
        if let Some((pos, pointwise)) = unsolved
            .iter()
            .enumerate()
            .find_map(|(i, eq)| decompose(eq).map(|new| (i, new)))
        {
            unsolved.remove(pos);
            unsolved.extend(pointwise);
            sort_unsolved(&mut unsolved);
            continue;
        }

        // Bind: move the pair to the solved set and substitute it through
        // everything else. Substitution can expose redexes, hence the
        // renormalization.
        if let Some((pos, pair)) = unsolved
            .iter()
            .enumerate()
            .find_map(|(i, eq)| bind(eq).map(|pair| (i, pair)))
        {
            unsolved.remove(pos);
            let subst = subst_for_pair(&pair);
            for eq in &mut unsolved {
                eq.left = beta_normalize(&subst.apply(&eq.left));
                eq.right = beta_normalize(&subst.apply(&eq.right));
            }
            for earlier in &mut solved {
                earlier.term = beta_normalize(&subst.apply(&earlier.term));
            }
            solved.push(pair);
            sort_unsolved(&mut unsolved);
            continue;
        }

        // Func
        let func_pos = unsolved.iter().position(|eq| match eq.left.typ(sig) {
            Ok(ty) => ty.is_fun(),
            Err(_) => false,
        });
        if let Some(pos) = func_pos {
            if let Some(applied) = func(&unsolved[pos], sig) {
                unsolved[pos] = applied;
                sort_unsolved(&mut unsolved);
                continue;
            }
        }

        break;
    }
    (unsolved, solved)
}

/// The lazy breadth-first search over configurations.
///
/// Pulling the iterator advances the search one configuration at a time;
/// dropping it cancels all remaining work. Emission order is deterministic
/// given the input. An exhausted queue is normal termination, never an error.
pub struct PreUnification<'a> {
    sig: &'a mut Signature,
    fresh: FreshVarGen,
    queue: VecDeque<Configuration>,
    max_depth: usize,
}

impl<'a> PreUnification<'a> {
    pub fn max_depth(mut self, max_depth: usize) -> PreUnification<'a> {
        self.max_depth = max_depth;
        self
    }

    /// The fresh variables allocated so far by this attempt.
    pub fn fresh_vars(&self) -> &FreshVarGen {
        &self.fresh
    }

    /// Processes one configuration; Some means a pre-unifier was emitted.
    fn step(&mut self, config: Configuration) -> Option<PreUnifier> {
        let (unsolved, solved) = exhaust(config.unsolved, config.solved, self.sig);

        if unsolved.is_empty() {
            return Some(PreUnifier {
                subst: subst_from_solved(&solved),
                residual: vec![],
            });
        }

        let head = unsolved[0].clone();
        if head.is_rigid_rigid() {
            // A clash the exhauster could not decompose: dead branch.
            return None;
        }
        if head.is_flex_flex() {
            // By the sort invariant everything remaining is flex-flex;
            // postpone the lot.
            return Some(PreUnifier {
                subst: subst_from_solved(&solved),
                residual: unsolved,
            });
        }

        // Flex-rigid: branch on the partial bindings, imitation first, then
        // the projections left to right. Nodes past the depth bound are
        // discarded without emission.
        if config.depth >= self.max_depth {
            return None;
        }
        let oriented = head.oriented();
        if let Some(binding) = imitate(&oriented, &mut self.fresh, self.sig) {
            self.queue.push_back(Configuration::child(
                binding,
                &unsolved,
                &solved,
                config.depth + 1,
            ));
        }
        for binding in project(&oriented, &mut self.fresh, self.sig) {
            self.queue.push_back(Configuration::child(
                binding,
                &unsolved,
                &solved,
                config.depth + 1,
            ));
        }
        None
    }
}

impl Iterator for PreUnification<'_> {
    type Item = PreUnifier;

    fn next(&mut self) -> Option<PreUnifier> {
        while let Some(config) = self.queue.pop_front() {
            if let Some(result) = self.step(config) {
                return Some(result);
            }
        }
        None
    }
}

/// Starts pre-unification of a list of constraints. Each pair is brought to
/// β-normal η-long form and checked for equal types; mismatched types are
/// fatal to the attempt.
pub fn pre_unify_all(
    sig: &mut Signature,
    constraints: Vec<(Term, Term)>,
) -> Result<PreUnification, KernelError> {
    let mut unsolved = vec![];
    for (left, right) in constraints {
        let left = to_canonical(&left, sig)?;
        let right = to_canonical(&right, sig)?;
        let left_ty = left.typ(sig)?;
        let right_ty = right.typ(sig)?;
        if left_ty != right_ty {
            return Err(KernelError::TypeMismatch {
                expected: left_ty,
                found: right_ty,
            });
        }
        unsolved.push(Equation::new(left, right));
    }
    let fresh = FreshVarGen::above(unsolved.iter().flat_map(|eq| [&eq.left, &eq.right]));
    let initial = Configuration {
        unsolved,
        solved: vec![],
        depth: 0,
    };
    Ok(PreUnification {
        sig,
        fresh,
        queue: VecDeque::from([initial]),
        max_depth: DEFAULT_MAX_DEPTH,
    })
}

/// Pre-unification of a single pair of terms.
pub fn pre_unify(
    sig: &mut Signature,
    left: Term,
    right: Term,
) -> Result<PreUnification, KernelError> {
    pre_unify_all(sig, vec![(left, right)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::types::Type;
    use crate::signature::{Signature, TYPE_I};

    fn ity() -> Type {
        Type::base(TYPE_I)
    }

    /// A signature with c, d : i and f : i > i, g : i > i > i.
    fn test_sig() -> Signature {
        let mut sig = Signature::new();
        sig.add_uninterpreted("c", ity()).unwrap();
        sig.add_uninterpreted("d", ity()).unwrap();
        sig.add_uninterpreted("f", Type::fun1(ity(), ity())).unwrap();
        sig.add_uninterpreted("g", Type::fun(vec![ity(), ity()], ity()))
            .unwrap();
        sig
    }

    fn sym(sig: &Signature, name: &str) -> Term {
        Term::symbol(sig.key_of(name).unwrap())
    }

    #[test]
    fn test_bind_single_variable() {
        let mut sig = test_sig();
        let c = sym(&sig, "c");
        let x = Term::bound(ity(), 1);
        let results: Vec<_> = pre_unify(&mut sig, x.clone(), c.clone()).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].residual.is_empty());
        assert_eq!(results[0].subst.apply(&x), c);
    }

    #[test]
    fn test_identical_terms_give_identity() {
        let mut sig = test_sig();
        let term = sym(&sig, "f").apply_terms(vec![sym(&sig, "c")]);
        let results: Vec<_> = pre_unify(&mut sig, term.clone(), term).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].subst.is_identity());
        assert!(results[0].residual.is_empty());
    }

    #[test]
    fn test_rigid_clash_is_empty_stream() {
        let mut sig = test_sig();
        let left = sym(&sig, "f").apply_terms(vec![sym(&sig, "c")]);
        let right = sym(&sig, "f").apply_terms(vec![sym(&sig, "d")]);
        // f(c) vs f(d) decomposes to the clash c = d.
        let results: Vec<_> = pre_unify(&mut sig, left, right).unwrap().collect();
        assert!(results.is_empty());
    }

    #[test]
    fn test_first_order_decompose_and_bind() {
        let mut sig = test_sig();
        // g(x1, d) = g(c, x2) has the most general unifier
        // {x1 -> c, x2 -> d}.
        let left = sym(&sig, "g").apply_terms(vec![Term::bound(ity(), 1), sym(&sig, "d")]);
        let right = sym(&sig, "g").apply_terms(vec![sym(&sig, "c"), Term::bound(ity(), 2)]);
        let results: Vec<_> = pre_unify(&mut sig, left.clone(), right.clone())
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1);
        let subst = &results[0].subst;
        assert!(results[0].residual.is_empty());
        assert_eq!(subst.apply(&left), subst.apply(&right));
        assert_eq!(subst.apply(&Term::bound(ity(), 1)), sym(&sig, "c"));
        assert_eq!(subst.apply(&Term::bound(ity(), 2)), sym(&sig, "d"));
        // Applying again changes nothing: the closure is idempotent.
        assert_eq!(
            subst.apply(&subst.apply(&left)),
            subst.apply(&left)
        );
    }

    #[test]
    fn test_type_mismatch_is_fatal() {
        let mut sig = test_sig();
        let c = sym(&sig, "c");
        let f = sym(&sig, "f");
        assert!(pre_unify(&mut sig, c, f).is_err());
    }

    #[test]
    fn test_occurs_cycle_exhausts_quietly() {
        let mut sig = test_sig();
        // x1 = f(x1): no finite unifier; the bounded stream just runs dry.
        let x = Term::bound(ity(), 1);
        let fx = sym(&sig, "f").apply_terms(vec![x.clone()]);
        let results: Vec<_> = pre_unify(&mut sig, x, fx)
            .unwrap()
            .max_depth(12)
            .collect();
        assert!(results.is_empty());
    }

    #[test]
    fn test_imitation_before_projection() {
        let mut sig = test_sig();
        // x1(c) = c: both the imitation x1 -> λy. c and the projection
        // x1 -> λy. y solve it; the imitation is emitted first.
        let flex_ty = Type::fun1(ity(), ity());
        let left = Term::bound(flex_ty.clone(), 1).apply_terms(vec![sym(&sig, "c")]);
        let right = sym(&sig, "c");
        let results: Vec<_> = pre_unify(&mut sig, left, right).unwrap().collect();
        assert_eq!(results.len(), 2);

        let imitation = results[0].subst.apply(&Term::bound(flex_ty.clone(), 1));
        assert_eq!(imitation, Term::abs(ity(), sym(&sig, "c")));
        let projection = results[1].subst.apply(&Term::bound(flex_ty, 1));
        assert_eq!(projection, Term::abs(ity(), Term::bound(ity(), 1)));
    }

    #[test]
    fn test_projection_branch_can_fail() {
        let mut sig = test_sig();
        // x1(c) = d: imitation gives λy. d; the projection λy. y leaves
        // c = d, which clashes. Exactly one pre-unifier.
        let flex_ty = Type::fun1(ity(), ity());
        let left = Term::bound(flex_ty.clone(), 1).apply_terms(vec![sym(&sig, "c")]);
        let right = sym(&sig, "d");
        let results: Vec<_> = pre_unify(&mut sig, left, right).unwrap().collect();
        assert_eq!(results.len(), 1);
        let binding = results[0].subst.apply(&Term::bound(flex_ty, 1));
        assert_eq!(binding, Term::abs(ity(), sym(&sig, "d")));
    }

    #[test]
    fn test_flex_flex_postpones() {
        let mut sig = test_sig();
        // x1(c) = x2(d): nothing rigid to work on; postponed whole.
        let flex_ty = Type::fun1(ity(), ity());
        let left = Term::bound(flex_ty.clone(), 1).apply_terms(vec![sym(&sig, "c")]);
        let right = Term::bound(flex_ty, 2).apply_terms(vec![sym(&sig, "d")]);
        let results: Vec<_> = pre_unify(&mut sig, left, right).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].subst.is_identity());
        assert_eq!(results[0].residual.len(), 1);
        assert!(results[0].residual[0].is_flex_flex());
    }

    #[test]
    fn test_functional_equation_uses_skolem() {
        let mut sig = test_sig();
        let before = sig.len();
        // λy. x2 = λy. y forces the loose variable to the skolem witness.
        let left = Term::abs(ity(), Term::bound(ity(), 2));
        let right = Term::abs(ity(), Term::bound(ity(), 1));
        let results: Vec<_> = pre_unify(&mut sig, left, right).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].residual.is_empty());
        // One skolem was registered and x1 is bound to it.
        assert_eq!(sig.len(), before + 1);
        let sk = Term::symbol(crate::kernel::types::SymbolKey::new(before as u32));
        assert_eq!(results[0].subst.apply(&Term::bound(ity(), 1)), sk);
    }

    #[test]
    fn test_emission_order_is_deterministic() {
        let run = || {
            let mut sig = test_sig();
            let flex_ty = Type::fun1(ity(), ity());
            let left = Term::bound(flex_ty.clone(), 1).apply_terms(vec![sym(&sig, "c")]);
            let right = sym(&sig, "c");
            pre_unify(&mut sig, left, right)
                .unwrap()
                .map(|pre| format!("{}", pre))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_solved_set_substitution_layout() {
        // Solved pairs {x1 -> c0, x3 -> c2} produce a substitution that
        // renames the unconstrained x2 to itself.
        let solved = vec![
            SolvedPair {
                index: 1,
                ty: ity(),
                term: Term::parse("c0"),
            },
            SolvedPair {
                index: 3,
                ty: ity(),
                term: Term::parse("c2"),
            },
        ];
        let subst = subst_from_solved(&solved);
        assert_eq!(subst.apply(&Term::parse("x1")), Term::parse("c0"));
        assert_eq!(subst.apply(&Term::parse("x2")), Term::parse("x2"));
        assert_eq!(subst.apply(&Term::parse("x3")), Term::parse("c2"));
        assert_eq!(subst.apply(&Term::parse("x4")), Term::parse("x4"));
        assert!(subst_from_solved(&[]).is_identity());
    }
}
