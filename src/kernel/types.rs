use serde::{Deserialize, Serialize};
use std::fmt;

/// A key that uniquely identifies an entry in the signature table.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default,
)]
pub struct SymbolKey(u32);

impl SymbolKey {
    pub const fn new(key: u32) -> SymbolKey {
        SymbolKey(key)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The index of a type variable. Indices are de-Bruijn-like and start at 1:
/// `Var(1)` refers to the innermost enclosing `Forall`.
pub type TypeVarIndex = u32;

/// The kind of a type constructor.
/// Proper types have kind `Star`; an n-ary constructor has kind `* -> ... -> *`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Star,
    Arrow(Box<Kind>, Box<Kind>),
}

impl Kind {
    /// The kind of a type constructor taking `arity` proper-type arguments.
    pub fn constructor(arity: usize) -> Kind {
        let mut kind = Kind::Star;
        for _ in 0..arity {
            kind = Kind::Arrow(Box::new(Kind::Star), Box::new(kind));
        }
        kind
    }

    pub fn arity(&self) -> usize {
        match self {
            Kind::Star => 0,
            Kind::Arrow(_, rest) => 1 + rest.arity(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Kind::Star => write!(f, "*"),
            Kind::Arrow(arg, rest) => write!(f, "({} > {})", arg, rest),
        }
    }
}

/// The type language.
///
/// Base types refer into the signature table by key. Type variables use
/// de-Bruijn-like indices bound by `Forall`. Equality is structural, which is
/// all the unifier needs once terms are normalized.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Type {
    /// A base type, identified by its signature key.
    Base(SymbolKey),

    /// A function type `A -> B`.
    Fun(Box<Type>, Box<Type>),

    /// A product type `A * B`.
    Prod(Box<Type>, Box<Type>),

    /// A sum type `A + B`.
    Sum(Box<Type>, Box<Type>),

    /// A type variable, bound by an enclosing `Forall`.
    Var(TypeVarIndex),

    /// A universally quantified (polymorphic) type.
    Forall(Box<Type>),
}

impl Type {
    pub fn base(key: SymbolKey) -> Type {
        Type::Base(key)
    }

    pub fn fun1(arg: Type, result: Type) -> Type {
        Type::Fun(Box::new(arg), Box::new(result))
    }

    /// Builds `a1 -> a2 -> ... -> an -> result`.
    pub fn fun(args: Vec<Type>, result: Type) -> Type {
        let mut ty = result;
        for arg in args.into_iter().rev() {
            ty = Type::fun1(arg, ty);
        }
        ty
    }

    pub fn prod(left: Type, right: Type) -> Type {
        Type::Prod(Box::new(left), Box::new(right))
    }

    pub fn sum(left: Type, right: Type) -> Type {
        Type::Sum(Box::new(left), Box::new(right))
    }

    pub fn forall(body: Type) -> Type {
        Type::Forall(Box::new(body))
    }

    pub fn is_fun(&self) -> bool {
        matches!(self, Type::Fun(_, _))
    }

    /// Whether this is a polymorphic type, i.e. has a leading `Forall`.
    pub fn is_polymorphic(&self) -> bool {
        matches!(self, Type::Forall(_))
    }

    /// Decomposes a function type into its argument list.
    /// A non-function type has no arguments.
    pub fn fun_args(&self) -> Vec<&Type> {
        let mut args = vec![];
        let mut ty = self;
        while let Type::Fun(arg, result) = ty {
            args.push(arg.as_ref());
            ty = result;
        }
        args
    }

    /// Owned variant of `fun_args`, for binding construction.
    pub fn fun_args_owned(&self) -> Vec<Type> {
        self.fun_args().into_iter().cloned().collect()
    }

    /// The result type after consuming every function argument.
    pub fn fun_result(&self) -> &Type {
        let mut ty = self;
        while let Type::Fun(_, result) = ty {
            ty = result;
        }
        ty
    }

    /// The number of arguments a term of this type can consume.
    pub fn arity(&self) -> usize {
        let mut count = 0;
        let mut ty = self;
        while let Type::Fun(_, result) = ty {
            count += 1;
            ty = result;
        }
        count
    }

    /// Strips every leading `Forall`, returning the body and the count stripped.
    pub fn monomorphic_body(&self) -> (&Type, usize) {
        let mut ty = self;
        let mut count = 0;
        while let Type::Forall(body) = ty {
            ty = body;
            count += 1;
        }
        (ty, count)
    }

    /// Instantiates a leading `Forall` with the given type argument.
    /// Returns None when this type is not polymorphic.
    pub fn instantiate(&self, arg: &Type) -> Option<Type> {
        match self {
            Type::Forall(body) => Some(body.subst_var(1, arg)),
            _ => None,
        }
    }

    /// Substitution of type variables: replaces `Var(index)` with `arg`,
    /// decrementing looser variables, as when an enclosing `Forall` is consumed.
    pub fn subst_var(&self, index: TypeVarIndex, arg: &Type) -> Type {
        match self {
            Type::Base(key) => Type::Base(*key),
            Type::Fun(a, b) => Type::fun1(a.subst_var(index, arg), b.subst_var(index, arg)),
            Type::Prod(a, b) => Type::prod(a.subst_var(index, arg), b.subst_var(index, arg)),
            Type::Sum(a, b) => Type::sum(a.subst_var(index, arg), b.subst_var(index, arg)),
            Type::Var(i) => {
                if *i == index {
                    arg.shift_vars(index - 1)
                } else if *i > index {
                    Type::Var(i - 1)
                } else {
                    Type::Var(*i)
                }
            }
            Type::Forall(body) => Type::forall(body.subst_var(index + 1, arg)),
        }
    }

    /// Lifts every loose type variable by `n`.
    fn shift_vars(&self, n: TypeVarIndex) -> Type {
        self.shift_vars_above(n, 0)
    }

    fn shift_vars_above(&self, n: TypeVarIndex, depth: TypeVarIndex) -> Type {
        match self {
            Type::Base(key) => Type::Base(*key),
            Type::Fun(a, b) => Type::fun1(
                a.shift_vars_above(n, depth),
                b.shift_vars_above(n, depth),
            ),
            Type::Prod(a, b) => Type::prod(
                a.shift_vars_above(n, depth),
                b.shift_vars_above(n, depth),
            ),
            Type::Sum(a, b) => {
                Type::sum(a.shift_vars_above(n, depth), b.shift_vars_above(n, depth))
            }
            Type::Var(i) => {
                if *i > depth {
                    Type::Var(i + n)
                } else {
                    Type::Var(*i)
                }
            }
            Type::Forall(body) => Type::forall(body.shift_vars_above(n, depth + 1)),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Base(key) => write!(f, "t{}", key),
            Type::Fun(a, b) => write!(f, "({} > {})", a, b),
            Type::Prod(a, b) => write!(f, "({} * {})", a, b),
            Type::Sum(a, b) => write!(f, "({} + {})", a, b),
            Type::Var(i) => write!(f, "A{}", i),
            Type::Forall(body) => write!(f, "!>. {}", body),
        }
    }
}
