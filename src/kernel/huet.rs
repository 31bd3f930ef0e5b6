use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kernel::fresh::FreshVarGen;
use crate::kernel::normalize::{beta_normalize, eta_expand};
use crate::kernel::term::{Arg, Term, VarIndex};
use crate::kernel::types::Type;
use crate::signature::Signature;

/// An unsolved equation: two terms of identical type.
/// Terms are kept in β-normal η-long form throughout.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    pub left: Term,
    pub right: Term,
}

impl Equation {
    pub fn new(left: Term, right: Term) -> Equation {
        Equation { left, right }
    }

    /// Orients so that the interesting side is on the left: if only one side
    /// is a bare variable it goes left, otherwise the flex side does.
    /// Collapsing the bare-variable test into the flex test here would break
    /// Bind, which requires strictly a bare variable.
    pub fn oriented(&self) -> Equation {
        let left_bare = self.left.as_bare_variable().is_some();
        let right_bare = self.right.as_bare_variable().is_some();
        if right_bare && !left_bare {
            return Equation::new(self.right.clone(), self.left.clone());
        }
        if !left_bare && !right_bare && self.right.is_flex() && !self.left.is_flex() {
            return Equation::new(self.right.clone(), self.left.clone());
        }
        self.clone()
    }

    pub fn is_flex_flex(&self) -> bool {
        self.left.is_flex() && self.right.is_flex()
    }

    pub fn is_rigid_rigid(&self) -> bool {
        self.left.is_rigid() && self.right.is_rigid()
    }

    pub fn is_flex_rigid(&self) -> bool {
        !self.is_flex_flex() && !self.is_rigid_rigid()
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} =?= {}", self.left, self.right)
    }
}

/// A solved pair: a free variable and the term it is bound to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SolvedPair {
    pub index: VarIndex,
    pub ty: Type,
    pub term: Term,
}

impl fmt::Display for SolvedPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "x{} -> {}", self.index, self.term)
    }
}

/// The transformation rules, as a tagged union. Applicability predicates are
/// total and side-effect-free; the corresponding functions below do the work.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rule {
    Delete,
    Decompose,
    Bind,
    Func,
    Imitate,
    Project,
}

impl Rule {
    pub fn can_apply(&self, eq: &Equation, sig: &Signature) -> bool {
        match self {
            Rule::Delete => eq.left == eq.right,
            Rule::Decompose => decompose(eq).is_some(),
            Rule::Bind => bind(eq).is_some(),
            Rule::Func => match eq.left.typ(sig) {
                Ok(ty) => ty.is_fun(),
                Err(_) => false,
            },
            // Imitate wants a constant rigid head; a bound-variable head
            // simply makes the rule inapplicable.
            Rule::Imitate => {
                eq.is_flex_rigid() && {
                    let oriented = eq.oriented();
                    matches!(oriented.right.head(), Term::Symbol(_))
                }
            }
            // Project fires on any flex-rigid equation Bind does not claim.
            Rule::Project => eq.is_flex_rigid() && bind(eq).is_none(),
        }
    }
}

/// Decompose: both sides are spines with the same rigid head; replace by
/// pointwise equations on the term arguments. Type arguments are ignored.
pub fn decompose(eq: &Equation) -> Option<Vec<Equation>> {
    if eq.left.is_flex() || eq.right.is_flex() {
        return None;
    }
    let (left_head, left_args) = eq.left.spine();
    let (right_head, right_args) = eq.right.spine();
    match (left_head, right_head) {
        (Term::Symbol(a), Term::Symbol(b)) if a == b => {}
        (Term::Bound(_, a), Term::Bound(_, b)) if a == b => {}
        _ => return None,
    }
    let left_terms: Vec<&Term> = left_args.iter().filter_map(Arg::as_term).collect();
    let right_terms: Vec<&Term> = right_args.iter().filter_map(Arg::as_term).collect();
    if left_terms.len() != right_terms.len() {
        return None;
    }
    Some(
        left_terms
            .into_iter()
            .zip(right_terms)
            .map(|(l, r)| Equation::new(l.clone(), r.clone()))
            .collect(),
    )
}

/// Bind: one side is a bare free variable that does not occur in the other.
/// Returns the pair to move into the solved set.
pub fn bind(eq: &Equation) -> Option<SolvedPair> {
    let oriented = eq.oriented();
    let (ty, index) = oriented.left.as_bare_variable()?;
    if oriented.right.occurs_loose(index) {
        return None;
    }
    Some(SolvedPair {
        index,
        ty: ty.clone(),
        term: oriented.right.clone(),
    })
}

/// Func: both sides have function type, so by extensionality they are equal
/// exactly when their applications to a fresh Skolem constant are. Returns
/// the applied, β-normalized equation.
pub fn func(eq: &Equation, sig: &mut Signature) -> Option<Equation> {
    let ty = eq.left.typ(sig).ok()?;
    let Type::Fun(arg_ty, _) = ty else {
        return None;
    };
    let skolem = Term::symbol(sig.fresh_skolem((*arg_ty).clone()));
    let left = beta_normalize(&eq.left.clone().apply_terms(vec![skolem.clone()]));
    let right = beta_normalize(&eq.right.clone().apply_terms(vec![skolem]));
    Some(Equation::new(left, right))
}

/// The variables `y1 ... yn` of a binding λ-prefix, outermost first:
/// `y1` has index n and `yn` has index 1.
fn binder_vars(alphas: &[Type]) -> Vec<Term> {
    let n = alphas.len() as VarIndex;
    alphas
        .iter()
        .enumerate()
        .map(|(k, ty)| Term::bound(ty.clone(), n - k as VarIndex))
        .collect()
}

/// Builds the common partial-binding skeleton: λy1...λyn. head (X1 ȳ) ... (Xm ȳ),
/// where the Xi are fresh variables typed to consume the whole binder.
fn partial_binding(
    alphas: &[Type],
    head: Term,
    leading_args: Vec<Arg>,
    unknown_tys: &[Type],
    gen: &mut FreshVarGen,
    sig: &Signature,
) -> Option<Term> {
    let n = alphas.len() as VarIndex;
    let mut body_args = leading_args;
    for unknown in unknown_tys {
        let fresh_ty = Type::fun(alphas.to_vec(), unknown.clone());
        let fresh_index = gen.fresh(fresh_ty.clone());
        // Inside n binders, the fresh loose variable sits n above its index.
        let fresh_head = Term::bound(fresh_ty, fresh_index + n);
        body_args.push(Arg::Term(fresh_head.apply_terms(binder_vars(alphas))));
    }
    let binding = Term::abstraction(alphas.to_vec(), head.apply(body_args));
    eta_expand(&binding, sig).ok()
}

/// Imitate: flex-rigid with a constant rigid head. Produces the equation
/// binding the flex head to the imitating partial binding; not applicable
/// when the rigid head is a bound variable.
pub fn imitate(eq: &Equation, gen: &mut FreshVarGen, sig: &Signature) -> Option<Equation> {
    let oriented = eq.oriented();
    if !oriented.left.is_flex() || oriented.right.is_flex() {
        return None;
    }
    let (flex_ty, flex_index) = match oriented.left.head() {
        Term::Bound(ty, index) => (ty.clone(), *index),
        _ => return None,
    };
    let (rigid_head, rigid_args) = oriented.right.spine();
    let Term::Symbol(key) = rigid_head else {
        return None;
    };

    // Instantiate the rigid head's type with the spine's leading type
    // arguments, so polymorphic heads imitate at the right instance.
    let mut head_ty = sig.type_of(*key).ok()?;
    let mut leading_args = vec![];
    for arg in rigid_args {
        match arg {
            Arg::Ty(ty) => {
                head_ty = head_ty.instantiate(ty)?;
                leading_args.push(Arg::Ty(ty.clone()));
            }
            Arg::Term(_) => break,
        }
    }

    let alphas = flex_ty.fun_args_owned();
    let gammas = head_ty.fun_args_owned();
    let binding = partial_binding(
        &alphas,
        Term::symbol(*key),
        leading_args,
        &gammas,
        gen,
        sig,
    )?;
    Some(Equation::new(
        Term::bound(flex_ty, flex_index),
        binding,
    ))
}

/// Project: one partial binding per bound parameter of the flex head whose
/// result type matches the equation's result type, left to right.
pub fn project(eq: &Equation, gen: &mut FreshVarGen, sig: &Signature) -> Vec<Equation> {
    let oriented = eq.oriented();
    if !oriented.left.is_flex() {
        return vec![];
    }
    let (flex_ty, flex_index) = match oriented.left.head() {
        Term::Bound(ty, index) => (ty.clone(), *index),
        _ => return vec![],
    };
    let alphas = flex_ty.fun_args_owned();
    let result_ty = flex_ty.fun_result();
    let n = alphas.len() as VarIndex;
    let mut bindings = vec![];
    for (j, alpha) in alphas.iter().enumerate() {
        if alpha.fun_result() != result_ty {
            continue;
        }
        let deltas = alpha.fun_args_owned();
        let parameter = Term::bound(alpha.clone(), n - j as VarIndex);
        if let Some(binding) =
            partial_binding(&alphas, parameter, vec![], &deltas, gen, sig)
        {
            bindings.push(Equation::new(
                Term::bound(flex_ty.clone(), flex_index),
                binding,
            ));
        }
    }
    bindings
}
