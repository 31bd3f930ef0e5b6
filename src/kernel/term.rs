use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::kernel::types::{SymbolKey, Type, TypeVarIndex};
use crate::signature::Signature;
use crate::status::Status;

/// The index of a term variable. Indices are de-Bruijn and start at 1:
/// `Bound(ty, 1)` refers to the innermost enclosing abstraction.
///
/// Bound and free variables share one index space. An occurrence whose index
/// exceeds the number of enclosing binders is loose, and a loose variable is
/// what the unifier treats as a free (meta) variable.
pub type VarIndex = u32;

/// A spine argument: terms apply to terms and, for polymorphic heads, to types.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Arg {
    Term(Term),
    Ty(Type),
}

impl Arg {
    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Arg::Term(t) => Some(t),
            Arg::Ty(_) => None,
        }
    }
}

/// A typed λ-term in spine form.
///
/// Heads are never applications; the `apply` constructor flattens nested
/// spines. Types are annotated on variables and abstractions, so computing
/// the type of a term only consults the signature for constants.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// A variable, bound or loose depending on context. The type is the
    /// variable's own type.
    Bound(Type, VarIndex),

    /// A constant, identified by its signature key.
    Symbol(SymbolKey),

    /// A one-parameter abstraction. Nesting builds n-ary λ.
    Abs(Type, Box<Term>),

    /// A type abstraction, for polymorphic terms.
    TypeAbs(Box<Term>),

    /// A spine application: head plus ordered arguments.
    App(Box<Term>, Vec<Arg>),
}

/// Errors raised by the kernel when terms are ill-typed or ill-formed.
/// These are fatal to the current attempt and carry an SZS status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// Two types that were required to be equal are not.
    TypeMismatch { expected: Type, found: Type },

    /// A term argument was applied to a head of non-function type.
    NotAFunction(Type),

    /// A type argument was applied to a head of non-polymorphic type.
    NotPolymorphic(Type),

    /// A symbol key with no signature entry.
    UnknownSymbol(SymbolKey),

    /// A structural violation, e.g. a bound index escaping a context that
    /// claimed to be closed.
    IllFormed(String),
}

impl KernelError {
    pub fn status(&self) -> Status {
        match self {
            KernelError::TypeMismatch { .. }
            | KernelError::NotAFunction(_)
            | KernelError::NotPolymorphic(_) => Status::TypeError,
            KernelError::UnknownSymbol(_) | KernelError::IllFormed(_) => Status::InputError,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            KernelError::NotAFunction(ty) => {
                write!(f, "cannot apply a term of non-function type {}", ty)
            }
            KernelError::NotPolymorphic(ty) => {
                write!(f, "cannot type-apply a term of non-polymorphic type {}", ty)
            }
            KernelError::UnknownSymbol(key) => write!(f, "unknown symbol key {}", key),
            KernelError::IllFormed(msg) => write!(f, "ill-formed term: {}", msg),
        }
    }
}

impl From<KernelError> for String {
    fn from(error: KernelError) -> Self {
        error.to_string()
    }
}

impl Term {
    pub fn bound(ty: Type, index: VarIndex) -> Term {
        Term::Bound(ty, index)
    }

    pub fn symbol(key: SymbolKey) -> Term {
        Term::Symbol(key)
    }

    pub fn abs(ty: Type, body: Term) -> Term {
        Term::Abs(ty, Box::new(body))
    }

    pub fn type_abs(body: Term) -> Term {
        Term::TypeAbs(Box::new(body))
    }

    /// Builds `λa1. λa2. ... λan. body` with `tys[0]` outermost.
    pub fn abstraction(tys: Vec<Type>, body: Term) -> Term {
        let mut term = body;
        for ty in tys.into_iter().rev() {
            term = Term::abs(ty, term);
        }
        term
    }

    /// Applies this term to arguments, flattening so that the head of the
    /// result is never itself an application.
    pub fn apply(self, args: Vec<Arg>) -> Term {
        if args.is_empty() {
            return self;
        }
        match self {
            Term::App(head, mut existing) => {
                existing.extend(args);
                Term::App(head, existing)
            }
            head => Term::App(Box::new(head), args),
        }
    }

    pub fn apply_terms(self, terms: Vec<Term>) -> Term {
        self.apply(terms.into_iter().map(Arg::Term).collect())
    }

    /// The head and arguments of this term's spine.
    /// A non-application is a spine with no arguments.
    pub fn spine(&self) -> (&Term, &[Arg]) {
        match self {
            Term::App(head, args) => (head, args),
            other => (other, &[]),
        }
    }

    pub fn head(&self) -> &Term {
        self.spine().0
    }

    /// Peels the leading λ-binders (skipping type binders), returning the
    /// binder types outermost-first and the body.
    pub fn strip_abs(&self) -> (Vec<&Type>, &Term) {
        let mut binders = vec![];
        let mut body = self;
        loop {
            match body {
                Term::Abs(ty, inner) => {
                    binders.push(ty);
                    body = inner;
                }
                Term::TypeAbs(inner) => {
                    body = inner;
                }
                _ => return (binders, body),
            }
        }
    }

    /// If this term is exactly a variable, with no binders and no arguments,
    /// returns its type and index. This is the test Bind uses; it is strictly
    /// stronger than having a flexible head.
    pub fn as_bare_variable(&self) -> Option<(&Type, VarIndex)> {
        match self {
            Term::Bound(ty, index) => Some((ty, *index)),
            _ => None,
        }
    }

    /// Whether the head of this term, under its λ-prefix, is a loose variable.
    pub fn is_flex(&self) -> bool {
        let mut depth: VarIndex = 0;
        let mut body = self;
        loop {
            match body {
                Term::Abs(_, inner) => {
                    depth += 1;
                    body = inner;
                }
                Term::TypeAbs(inner) => {
                    body = inner;
                }
                _ => break,
            }
        }
        match body.head() {
            Term::Bound(_, index) => *index > depth,
            _ => false,
        }
    }

    pub fn is_rigid(&self) -> bool {
        !self.is_flex()
    }

    /// The set of loose bound indices: variables escaping the binder depth,
    /// expressed relative to the top of this term.
    pub fn loose_bound_vars(&self) -> BTreeSet<VarIndex> {
        let mut vars = BTreeSet::new();
        self.collect_loose(0, &mut vars);
        vars
    }

    fn collect_loose(&self, depth: VarIndex, vars: &mut BTreeSet<VarIndex>) {
        match self {
            Term::Bound(_, index) => {
                if *index > depth {
                    vars.insert(index - depth);
                }
            }
            Term::Symbol(_) => {}
            Term::Abs(_, body) => body.collect_loose(depth + 1, vars),
            Term::TypeAbs(body) => body.collect_loose(depth, vars),
            Term::App(head, args) => {
                head.collect_loose(depth, vars);
                for arg in args {
                    if let Arg::Term(t) = arg {
                        t.collect_loose(depth, vars);
                    }
                }
            }
        }
    }

    /// The occurs check: whether the loose variable `index` appears anywhere
    /// in this term.
    pub fn occurs_loose(&self, index: VarIndex) -> bool {
        self.occurs_at(index, 0)
    }

    fn occurs_at(&self, index: VarIndex, depth: VarIndex) -> bool {
        match self {
            Term::Bound(_, i) => *i > depth && i - depth == index,
            Term::Symbol(_) => false,
            Term::Abs(_, body) => body.occurs_at(index, depth + 1),
            Term::TypeAbs(body) => body.occurs_at(index, depth),
            Term::App(head, args) => {
                head.occurs_at(index, depth)
                    || args.iter().any(|arg| match arg {
                        Arg::Term(t) => t.occurs_at(index, depth),
                        Arg::Ty(_) => false,
                    })
            }
        }
    }

    /// The largest loose index in this term, if any.
    pub fn max_loose_index(&self) -> Option<VarIndex> {
        self.loose_bound_vars().into_iter().next_back()
    }

    /// Lifts every loose index by `n`, as when a term moves under binders.
    pub fn shifted(&self, n: VarIndex) -> Term {
        if n == 0 {
            return self.clone();
        }
        self.shift_above(n, 0)
    }

    fn shift_above(&self, n: VarIndex, depth: VarIndex) -> Term {
        match self {
            Term::Bound(ty, index) => {
                if *index > depth {
                    Term::Bound(ty.clone(), index + n)
                } else {
                    Term::Bound(ty.clone(), *index)
                }
            }
            Term::Symbol(key) => Term::Symbol(*key),
            Term::Abs(ty, body) => Term::abs(ty.clone(), body.shift_above(n, depth + 1)),
            Term::TypeAbs(body) => Term::type_abs(body.shift_above(n, depth)),
            Term::App(head, args) => {
                let head = head.shift_above(n, depth);
                let args = args
                    .iter()
                    .map(|arg| match arg {
                        Arg::Term(t) => Arg::Term(t.shift_above(n, depth)),
                        Arg::Ty(ty) => Arg::Ty(ty.clone()),
                    })
                    .collect();
                head.apply(args)
            }
        }
    }

    /// Substitutes the type `arg` for the type variable bound by the type
    /// binder directly enclosing this term, through every annotation.
    pub fn instantiate_type(&self, arg: &Type) -> Term {
        self.instantiate_type_at(1, arg)
    }

    fn instantiate_type_at(&self, ty_depth: TypeVarIndex, arg: &Type) -> Term {
        match self {
            Term::Bound(ty, index) => Term::Bound(ty.subst_var(ty_depth, arg), *index),
            Term::Symbol(key) => Term::Symbol(*key),
            Term::Abs(ty, body) => Term::abs(
                ty.subst_var(ty_depth, arg),
                body.instantiate_type_at(ty_depth, arg),
            ),
            Term::TypeAbs(body) => Term::type_abs(body.instantiate_type_at(ty_depth + 1, arg)),
            Term::App(head, args) => {
                let head = head.instantiate_type_at(ty_depth, arg);
                let args = args
                    .iter()
                    .map(|a| match a {
                        Arg::Term(t) => Arg::Term(t.instantiate_type_at(ty_depth, arg)),
                        Arg::Ty(ty) => Arg::Ty(ty.subst_var(ty_depth, arg)),
                    })
                    .collect();
                head.apply(args)
            }
        }
    }

    /// Computes the type of this term. Trusts variable annotations; use
    /// `well_typed` for the full consistency check.
    pub fn typ(&self, sig: &Signature) -> Result<Type, KernelError> {
        match self {
            Term::Bound(ty, _) => Ok(ty.clone()),
            Term::Symbol(key) => sig.type_of(*key),
            Term::Abs(ty, body) => Ok(Type::fun1(ty.clone(), body.typ(sig)?)),
            Term::TypeAbs(body) => Ok(Type::forall(body.typ(sig)?)),
            Term::App(head, args) => {
                let mut ty = head.typ(sig)?;
                for arg in args {
                    match arg {
                        Arg::Term(_) => match ty {
                            Type::Fun(_, result) => ty = *result,
                            other => return Err(KernelError::NotAFunction(other)),
                        },
                        Arg::Ty(targ) => match ty.instantiate(targ) {
                            Some(instantiated) => ty = instantiated,
                            None => return Err(KernelError::NotPolymorphic(ty)),
                        },
                    }
                }
                Ok(ty)
            }
        }
    }

    /// The full well-typedness check: annotations on bound occurrences agree
    /// with their binders, and every application is type-correct.
    pub fn well_typed(&self, sig: &Signature) -> bool {
        let mut binders = vec![];
        self.check_typed(sig, &mut binders).is_ok()
    }

    fn check_typed(&self, sig: &Signature, binders: &mut Vec<Type>) -> Result<Type, KernelError> {
        match self {
            Term::Bound(ty, index) => {
                let depth = binders.len() as VarIndex;
                if *index == 0 {
                    return Err(KernelError::IllFormed("variable index 0".to_string()));
                }
                if *index <= depth {
                    let binder = &binders[(depth - index) as usize];
                    if binder != ty {
                        return Err(KernelError::TypeMismatch {
                            expected: binder.clone(),
                            found: ty.clone(),
                        });
                    }
                }
                Ok(ty.clone())
            }
            Term::Symbol(key) => sig.type_of(*key),
            Term::Abs(ty, body) => {
                binders.push(ty.clone());
                let body_ty = body.check_typed(sig, binders)?;
                binders.pop();
                Ok(Type::fun1(ty.clone(), body_ty))
            }
            Term::TypeAbs(body) => Ok(Type::forall(body.check_typed(sig, binders)?)),
            Term::App(head, args) => {
                if matches!(head.as_ref(), Term::App(_, _)) {
                    return Err(KernelError::IllFormed(
                        "spine head is itself an application".to_string(),
                    ));
                }
                let mut ty = head.check_typed(sig, binders)?;
                for arg in args {
                    match arg {
                        Arg::Term(t) => {
                            let arg_ty = t.check_typed(sig, binders)?;
                            match ty {
                                Type::Fun(expected, result) => {
                                    if *expected != arg_ty {
                                        return Err(KernelError::TypeMismatch {
                                            expected: *expected,
                                            found: arg_ty,
                                        });
                                    }
                                    ty = *result;
                                }
                                other => return Err(KernelError::NotAFunction(other)),
                            }
                        }
                        Arg::Ty(targ) => match ty.instantiate(targ) {
                            Some(instantiated) => ty = instantiated,
                            None => return Err(KernelError::NotPolymorphic(ty)),
                        },
                    }
                }
                Ok(ty)
            }
        }
    }

    /// Parses a term like `c0(x1, c2(x1))` for tests. Every atom gets the
    /// individual type, so function symbols come out mistyped; fine for
    /// structural tests, not for anything type-directed.
    /// Variable indices start at 1.
    #[cfg(test)]
    pub fn parse(s: &str) -> Term {
        let s = s.trim();
        let open = match s.find('(') {
            Some(i) => i,
            None => return Term::parse_atom(s),
        };
        assert!(s.ends_with(')'), "unbalanced parens in {}", s);
        let head = Term::parse_atom(&s[..open]);
        let inner = &s[open + 1..s.len() - 1];
        let mut args = vec![];
        let mut level = 0;
        let mut start = 0;
        for (i, c) in inner.char_indices() {
            match c {
                '(' => level += 1,
                ')' => level -= 1,
                ',' if level == 0 => {
                    args.push(Arg::Term(Term::parse(&inner[start..i])));
                    start = i + 1;
                }
                _ => {}
            }
        }
        args.push(Arg::Term(Term::parse(&inner[start..])));
        head.apply(args)
    }

    #[cfg(test)]
    fn parse_atom(s: &str) -> Term {
        use crate::signature::TYPE_I;
        let s = s.trim();
        if let Some(rest) = s.strip_prefix('x') {
            let index: VarIndex = rest.parse().expect("bad variable index");
            assert!(index >= 1, "variable indices start at 1");
            return Term::bound(Type::base(TYPE_I), index);
        }
        if let Some(rest) = s.strip_prefix('c') {
            let key: u32 = rest.parse().expect("bad constant key");
            return Term::symbol(SymbolKey::new(key));
        }
        panic!("cannot parse atom: {}", s);
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", TermFormatter { term: self })
    }
}

/// Formatting terms, kept separate so nested arguments recurse cheaply.
struct TermFormatter<'a> {
    term: &'a Term,
}

impl fmt::Display for TermFormatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.term {
            Term::Bound(_, index) => write!(f, "x{}", index),
            Term::Symbol(key) => write!(f, "c{}", key),
            Term::Abs(ty, body) => {
                write!(f, "(^[{}]. {})", ty, TermFormatter { term: body })
            }
            Term::TypeAbs(body) => write!(f, "(^^. {})", TermFormatter { term: body }),
            Term::App(head, args) => {
                write!(f, "{}(", TermFormatter { term: head })?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match arg {
                        Arg::Term(t) => write!(f, "{}", TermFormatter { term: t })?,
                        Arg::Ty(ty) => write!(f, "<{}>", ty)?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}
