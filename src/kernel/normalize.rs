use crate::kernel::substitution::Subst;
use crate::kernel::term::{Arg, KernelError, Term, VarIndex};
use crate::kernel::types::SymbolKey;
use crate::signature::Signature;

/// Definitions unfolding deeper than this are treated as ill-formed input.
/// The signature does not police cycles, so the expander has to.
const MAX_DELTA_DEPTH: usize = 512;

/// Reduces every β-redex. Confluent and terminating on well-typed input.
pub fn beta_normalize(term: &Term) -> Term {
    match term {
        Term::App(head, args) => {
            let head = beta_normalize(head);
            let args = args
                .iter()
                .map(|arg| match arg {
                    Arg::Term(t) => Arg::Term(beta_normalize(t)),
                    Arg::Ty(ty) => Arg::Ty(ty.clone()),
                })
                .collect();
            reduce_spine(head, args)
        }
        Term::Abs(ty, body) => Term::abs(ty.clone(), beta_normalize(body)),
        Term::TypeAbs(body) => Term::type_abs(beta_normalize(body)),
        leaf => leaf.clone(),
    }
}

/// Contracts redexes at the head of a spine whose parts are already normal.
fn reduce_spine(head: Term, mut args: Vec<Arg>) -> Term {
    if args.is_empty() {
        return head;
    }
    match head {
        Term::Abs(_, body) if matches!(args[0], Arg::Term(_)) => {
            let Arg::Term(arg) = args.remove(0) else {
                unreachable!()
            };
            let contracted = Subst::id().cons_term(arg).apply(&body);
            // Substitution can expose new redexes.
            reduce_spine(beta_normalize(&contracted), args)
        }
        Term::TypeAbs(body) if matches!(args[0], Arg::Ty(_)) => {
            let Arg::Ty(ty) = args.remove(0) else {
                unreachable!()
            };
            let contracted = body.instantiate_type(&ty);
            reduce_spine(beta_normalize(&contracted), args)
        }
        head => head.apply(args),
    }
}

/// η-expands so that every subterm of function type is an abstraction.
/// Idempotent; α-equivalence is literal equality in the nameless
/// representation.
pub fn eta_expand(term: &Term, sig: &Signature) -> Result<Term, KernelError> {
    match term {
        Term::Abs(ty, body) => Ok(Term::abs(ty.clone(), eta_expand(body, sig)?)),
        Term::TypeAbs(body) => Ok(Term::type_abs(eta_expand(body, sig)?)),
        _ => {
            let expanded = eta_expand_spine(term, sig)?;
            let ty = expanded.typ(sig)?;
            let arg_tys = ty.fun_args_owned();
            if arg_tys.is_empty() {
                return Ok(expanded);
            }
            // t of type a1 > ... > an > b becomes λy1...λyn. t y1 ... yn,
            // with t lifted past the new binders.
            let n = arg_tys.len() as VarIndex;
            let shifted = expanded.shifted(n);
            let mut args = vec![];
            for (k, aty) in arg_tys.iter().enumerate() {
                let var = Term::bound(aty.clone(), n - k as VarIndex);
                args.push(Arg::Term(eta_expand(&var, sig)?));
            }
            Ok(Term::abstraction(arg_tys, shifted.apply(args)))
        }
    }
}

/// η-expands the arguments of a spine, leaving the head applied as-is.
fn eta_expand_spine(term: &Term, sig: &Signature) -> Result<Term, KernelError> {
    match term {
        Term::App(head, args) => {
            let head = match head.as_ref() {
                Term::Abs(_, _) | Term::TypeAbs(_) => eta_expand(head, sig)?,
                leaf => leaf.clone(),
            };
            let args = args
                .iter()
                .map(|arg| match arg {
                    Arg::Term(t) => Ok(Arg::Term(eta_expand(t, sig)?)),
                    Arg::Ty(ty) => Ok(Arg::Ty(ty.clone())),
                })
                .collect::<Result<Vec<_>, KernelError>>()?;
            Ok(head.apply(args))
        }
        leaf => Ok(leaf.clone()),
    }
}

/// Unfolds defined symbols from the signature until none remain.
/// Used during preprocessing, never inside the unification loop.
pub fn delta_expand(term: &Term, sig: &Signature) -> Result<Term, KernelError> {
    delta(term, sig, 0)
}

fn delta(term: &Term, sig: &Signature, depth: usize) -> Result<Term, KernelError> {
    if depth > MAX_DELTA_DEPTH {
        return Err(KernelError::IllFormed(
            "definition unfolding exceeded the depth limit".to_string(),
        ));
    }
    match term {
        Term::Symbol(key) => match sig.definition_of(*key)? {
            Some(def) => delta(&def.clone(), sig, depth + 1),
            None => Ok(term.clone()),
        },
        Term::Bound(ty, index) => Ok(Term::Bound(ty.clone(), *index)),
        Term::Abs(ty, body) => Ok(Term::abs(ty.clone(), delta(body, sig, depth)?)),
        Term::TypeAbs(body) => Ok(Term::type_abs(delta(body, sig, depth)?)),
        Term::App(head, args) => {
            let head = delta(head, sig, depth)?;
            let args = args
                .iter()
                .map(|arg| match arg {
                    Arg::Term(t) => Ok(Arg::Term(delta(t, sig, depth)?)),
                    Arg::Ty(ty) => Ok(Arg::Ty(ty.clone())),
                })
                .collect::<Result<Vec<_>, KernelError>>()?;
            Ok(head.apply(args))
        }
    }
}

/// The head symbol under the binder prefix and spine, if the head is a
/// constant.
pub fn head_symbol(term: &Term) -> Option<SymbolKey> {
    let (_, body) = term.strip_abs();
    match body.head() {
        Term::Symbol(key) => Some(*key),
        _ => None,
    }
}

/// The canonical form consumed by the unification rules: β-normal η-long.
pub fn to_canonical(term: &Term, sig: &Signature) -> Result<Term, KernelError> {
    Ok(beta_normalize(&eta_expand(term, sig)?))
}
