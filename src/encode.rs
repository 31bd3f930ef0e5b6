use std::fmt;

use crate::clause::{Clause, Literal};
use crate::kernel::normalize::{delta_expand, to_canonical};
use crate::kernel::term::{Arg, KernelError, Term, VarIndex};
use crate::kernel::types::{Kind, Type};
use crate::signature::{
    Signature, SignatureError, AND, EQUALS, EXISTS, FALSE, FORALL, IFF, IMPLIES, NOT, OR, TRUE,
    TYPE_I, TYPE_O,
};
use crate::status::Status;
use crate::syntax::{AnnotatedFormula, BinaryConn, Expr, Language, Quantifier, Role};

/// Errors from lowering parsed statements into the kernel.
#[derive(Debug)]
pub enum EncodeError {
    /// A symbol used but never declared, in a dialect that requires it.
    UnknownSymbol(String),

    /// A formula or type that does not fit where it appears.
    BadType(String),

    /// Syntax we recognize but do not reason about.
    Unsupported(String),

    Kernel(KernelError),
    Signature(SignatureError),
}

impl EncodeError {
    pub fn status(&self) -> Status {
        match self {
            EncodeError::UnknownSymbol(_) => Status::InputError,
            EncodeError::BadType(_) => Status::TypeError,
            EncodeError::Unsupported(_) => Status::Inappropriate,
            EncodeError::Kernel(inner) => inner.status(),
            EncodeError::Signature(_) => Status::InputError,
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncodeError::UnknownSymbol(name) => write!(f, "unknown symbol: {}", name),
            EncodeError::BadType(message) => write!(f, "{}", message),
            EncodeError::Unsupported(what) => write!(f, "unsupported: {}", what),
            EncodeError::Kernel(inner) => write!(f, "{}", inner),
            EncodeError::Signature(inner) => write!(f, "{}", inner),
        }
    }
}

impl From<KernelError> for EncodeError {
    fn from(error: KernelError) -> Self {
        EncodeError::Kernel(error)
    }
}

impl From<SignatureError> for EncodeError {
    fn from(error: SignatureError) -> Self {
        EncodeError::Signature(error)
    }
}

/// Whether an expression is being read as a formula or as a term, which is
/// what decides the result type of symbols the first-order dialects never
/// declare.
#[derive(Clone, Copy, Eq, PartialEq)]
enum Position {
    Formula,
    Term,
}

/// Variable scoping while walking one formula: λ- and quantifier-bound
/// variables innermost-last, undeclared (clause-level) variables in first-use
/// order, and the type variables of polymorphic binders.
#[derive(Default)]
struct VarScope {
    bound: Vec<(String, Type)>,
    frees: Vec<(String, Type)>,
    ty_vars: Vec<String>,
}

impl VarScope {
    /// The de Bruijn index of a named variable at the current depth,
    /// allocating a clause-level free slot on first use.
    fn index_of(&mut self, name: &str) -> (Type, VarIndex) {
        let depth = self.bound.len() as VarIndex;
        if let Some(pos) = self.bound.iter().rposition(|(n, _)| n == name) {
            let ty = self.bound[pos].1.clone();
            return (ty, depth - pos as VarIndex);
        }
        if let Some(pos) = self.frees.iter().position(|(n, _)| n == name) {
            let ty = self.frees[pos].1.clone();
            return (ty, depth + pos as VarIndex + 1);
        }
        let ty = Type::base(TYPE_I);
        self.frees.push((name.to_string(), ty.clone()));
        (ty, depth + self.frees.len() as VarIndex)
    }
}

/// Lowers parsed statements into signature entries and clauses.
pub struct Encoder<'a> {
    sig: &'a mut Signature,
}

impl<'a> Encoder<'a> {
    pub fn new(sig: &'a mut Signature) -> Encoder<'a> {
        Encoder { sig }
    }

    /// Processes one statement in input order. Typings and definitions grow
    /// the signature and yield no clause; everything else becomes a clause.
    pub fn process(&mut self, formula: &AnnotatedFormula) -> Result<Option<Clause>, EncodeError> {
        match formula.role {
            Role::Type => {
                self.declare(&formula.formula)?;
                Ok(None)
            }
            Role::Definition => {
                self.define(&formula.formula)?;
                Ok(None)
            }
            _ => Ok(Some(self.clausify(formula)?)),
        }
    }

    /// `name : type-or-kind` declarations.
    fn declare(&mut self, expr: &Expr) -> Result<(), EncodeError> {
        let Expr::Typed(name, ty) = expr else {
            return Err(EncodeError::BadType(
                "a type statement must have the shape name : type".to_string(),
            ));
        };
        let name = atom_name(name)?;
        if let Some(kind) = as_kind(ty) {
            self.sig.add_type_constructor(&name, kind)?;
            return Ok(());
        }
        let mut scope = VarScope::default();
        let ty = self.encode_type(ty, &mut scope)?;
        self.sig.add_uninterpreted(&name, ty)?;
        Ok(())
    }

    /// `name = body` definitions; the type comes from the body.
    fn define(&mut self, expr: &Expr) -> Result<(), EncodeError> {
        let Expr::Binary(BinaryConn::Equals, lhs, rhs) = expr else {
            return Err(EncodeError::BadType(
                "a definition must have the shape name = body".to_string(),
            ));
        };
        let name = atom_name(lhs)?;
        let mut scope = VarScope::default();
        let body = self.encode_expr(rhs, &mut scope, Position::Term)?;
        let body = to_canonical(&body, self.sig)?;
        let ty = body.typ(self.sig)?;
        self.sig.add_defined(&name, ty, body)?;
        Ok(())
    }

    /// Encodes one statement's formula into a clause. CNF statements split
    /// on their top-level disjunction; the other dialects keep the formula
    /// as one literal.
    fn clausify(&mut self, formula: &AnnotatedFormula) -> Result<Clause, EncodeError> {
        let mut scope = VarScope::default();
        let parts = if formula.language == Language::Cnf {
            disjuncts(&formula.formula)
        } else {
            vec![&formula.formula]
        };
        let mut literals = vec![];
        for part in parts {
            literals.push(self.encode_literal(part, &mut scope)?);
        }
        Ok(Clause::new(&formula.name, formula.role, literals))
    }

    fn encode_literal(&mut self, expr: &Expr, scope: &mut VarScope) -> Result<Literal, EncodeError> {
        match expr {
            Expr::Binary(BinaryConn::Equals, left, right) => {
                let (left, right) = self.encode_equation(left, right, scope)?;
                Ok(Literal::equals(left, right))
            }
            Expr::Binary(BinaryConn::NotEquals, left, right) => {
                let (left, right) = self.encode_equation(left, right, scope)?;
                Ok(Literal::not_equals(left, right))
            }
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Binary(BinaryConn::Equals, left, right) => {
                    let (left, right) = self.encode_equation(left, right, scope)?;
                    Ok(Literal::not_equals(left, right))
                }
                other => Ok(Literal::negative(self.encode_predicate(other, scope)?)),
            },
            other => Ok(Literal::positive(self.encode_predicate(other, scope)?)),
        }
    }

    /// Both sides of an equation, canonicalized, with the type check the
    /// unifier will rely on.
    fn encode_equation(
        &mut self,
        left: &Expr,
        right: &Expr,
        scope: &mut VarScope,
    ) -> Result<(Term, Term), EncodeError> {
        let left = self.encode_expr(left, scope, Position::Term)?;
        let left = self.finish_term(left)?;
        let right = self.encode_expr(right, scope, Position::Term)?;
        let right = self.finish_term(right)?;
        let left_ty = left.typ(self.sig)?;
        let right_ty = right.typ(self.sig)?;
        if left_ty != right_ty {
            return Err(EncodeError::Kernel(KernelError::TypeMismatch {
                expected: left_ty,
                found: right_ty,
            }));
        }
        Ok((left, right))
    }

    /// A formula-position term, canonicalized and checked boolean.
    fn encode_predicate(&mut self, expr: &Expr, scope: &mut VarScope) -> Result<Term, EncodeError> {
        let term = self.encode_expr(expr, scope, Position::Formula)?;
        let term = self.finish_term(term)?;
        let ty = term.typ(self.sig)?;
        if ty != Type::base(TYPE_O) {
            return Err(EncodeError::BadType(format!(
                "a formula must be boolean, found type {}",
                ty
            )));
        }
        Ok(term)
    }

    fn finish_term(&mut self, term: Term) -> Result<Term, EncodeError> {
        let term = delta_expand(&term, self.sig)?;
        Ok(to_canonical(&term, self.sig)?)
    }

    fn encode_expr(
        &mut self,
        expr: &Expr,
        scope: &mut VarScope,
        position: Position,
    ) -> Result<Term, EncodeError> {
        match expr {
            Expr::Atom(name) => {
                let key = self.atom_key(name, 0, position)?;
                Ok(Term::symbol(key))
            }
            Expr::Var(name) => {
                let (ty, index) = scope.index_of(name);
                Ok(Term::bound(ty, index))
            }
            Expr::Defined(word) => match word.as_str() {
                "$true" => Ok(Term::symbol(TRUE)),
                "$false" => Ok(Term::symbol(FALSE)),
                other => Err(EncodeError::Unsupported(format!(
                    "defined word {} in a term",
                    other
                ))),
            },
            Expr::System(word) => {
                let key = self
                    .sig
                    .add_or_get_uninterpreted(word, Type::base(TYPE_I))?;
                Ok(Term::symbol(key))
            }
            Expr::DistinctObject(text) => {
                let name = format!("\"{}\"", text);
                let key = self.sig.add_or_get_uninterpreted(&name, Type::base(TYPE_I))?;
                Ok(Term::symbol(key))
            }
            Expr::Integer(text) | Expr::Rational(text) | Expr::Real(text) => {
                let key = self.sig.add_or_get_uninterpreted(text, Type::base(TYPE_I))?;
                Ok(Term::symbol(key))
            }
            Expr::App(head, args) => self.encode_application(head, args, scope, position),
            Expr::Not(inner) => {
                let inner = self.encode_expr(inner, scope, Position::Formula)?;
                Ok(Term::symbol(NOT).apply_terms(vec![inner]))
            }
            Expr::Binary(conn, left, right) => {
                self.encode_binary(*conn, left, right, scope)
            }
            Expr::Quantified(quantifier, variables, body) => {
                self.encode_quantified(*quantifier, variables, body, scope)
            }
            Expr::Typed(_, _) => Err(EncodeError::BadType(
                "a typing can only appear in a type statement".to_string(),
            )),
            Expr::Tuple(_) => Err(EncodeError::Unsupported("tuple in a term".to_string())),
        }
    }

    fn encode_application(
        &mut self,
        head: &Expr,
        args: &[Expr],
        scope: &mut VarScope,
        position: Position,
    ) -> Result<Term, EncodeError> {
        let encoded_args = args
            .iter()
            .map(|arg| self.encode_expr(arg, scope, Position::Term))
            .collect::<Result<Vec<_>, _>>()?;
        let head = match head {
            Expr::Atom(name) => Term::symbol(self.atom_key(name, args.len(), position)?),
            other => self.encode_expr(other, scope, position)?,
        };
        Ok(head.apply_terms(encoded_args))
    }

    fn encode_binary(
        &mut self,
        conn: BinaryConn,
        left: &Expr,
        right: &Expr,
        scope: &mut VarScope,
    ) -> Result<Term, EncodeError> {
        match conn {
            BinaryConn::Or | BinaryConn::And | BinaryConn::Implies | BinaryConn::Iff => {
                let key = match conn {
                    BinaryConn::Or => OR,
                    BinaryConn::And => AND,
                    BinaryConn::Implies => IMPLIES,
                    _ => IFF,
                };
                let left = self.encode_expr(left, scope, Position::Formula)?;
                let right = self.encode_expr(right, scope, Position::Formula)?;
                Ok(Term::symbol(key).apply_terms(vec![left, right]))
            }
            BinaryConn::If => {
                // p <= q is q => p.
                let left = self.encode_expr(left, scope, Position::Formula)?;
                let right = self.encode_expr(right, scope, Position::Formula)?;
                Ok(Term::symbol(IMPLIES).apply_terms(vec![right, left]))
            }
            BinaryConn::Xor | BinaryConn::Nor | BinaryConn::Nand => {
                let key = match conn {
                    BinaryConn::Xor => IFF,
                    BinaryConn::Nor => OR,
                    _ => AND,
                };
                let left = self.encode_expr(left, scope, Position::Formula)?;
                let right = self.encode_expr(right, scope, Position::Formula)?;
                let inner = Term::symbol(key).apply_terms(vec![left, right]);
                Ok(Term::symbol(NOT).apply_terms(vec![inner]))
            }
            BinaryConn::Equals | BinaryConn::NotEquals => {
                let left = self.encode_expr(left, scope, Position::Term)?;
                let right = self.encode_expr(right, scope, Position::Term)?;
                let ty = left.typ(self.sig)?;
                let equation = Term::symbol(EQUALS).apply(vec![
                    Arg::Ty(ty),
                    Arg::Term(left),
                    Arg::Term(right),
                ]);
                if conn == BinaryConn::Equals {
                    Ok(equation)
                } else {
                    Ok(Term::symbol(NOT).apply_terms(vec![equation]))
                }
            }
            BinaryConn::Arrow | BinaryConn::Star | BinaryConn::Plus => Err(EncodeError::BadType(
                "a type operator cannot appear in a formula".to_string(),
            )),
        }
    }

    fn encode_quantified(
        &mut self,
        quantifier: Quantifier,
        variables: &[(String, Option<Expr>)],
        body: &Expr,
        scope: &mut VarScope,
    ) -> Result<Term, EncodeError> {
        match quantifier {
            Quantifier::Forall | Quantifier::Exists | Quantifier::Lambda => {
                let mut tys = vec![];
                for (name, ty_expr) in variables {
                    let ty = match ty_expr {
                        Some(expr) => self.encode_type(expr, scope)?,
                        None => Type::base(TYPE_I),
                    };
                    scope.bound.push((name.clone(), ty.clone()));
                    tys.push(ty);
                }
                let body_position = if quantifier == Quantifier::Lambda {
                    Position::Term
                } else {
                    Position::Formula
                };
                let mut term = self.encode_expr(body, scope, body_position)?;
                // Innermost binder first on the way back out.
                for ty in tys.into_iter().rev() {
                    scope.bound.pop();
                    term = match quantifier {
                        Quantifier::Lambda => Term::abs(ty, term),
                        Quantifier::Forall => Term::symbol(FORALL)
                            .apply(vec![Arg::Ty(ty.clone()), Arg::Term(Term::abs(ty, term))]),
                        _ => Term::symbol(EXISTS)
                            .apply(vec![Arg::Ty(ty.clone()), Arg::Term(Term::abs(ty, term))]),
                    };
                }
                Ok(term)
            }
            Quantifier::TypeForall => {
                for (name, _) in variables {
                    scope.ty_vars.push(name.clone());
                }
                let mut term = self.encode_expr(body, scope, Position::Term)?;
                for _ in variables {
                    scope.ty_vars.pop();
                    term = Term::type_abs(term);
                }
                Ok(term)
            }
            Quantifier::TypeExists | Quantifier::Choice | Quantifier::Description => Err(
                EncodeError::Unsupported("choice and type-existential binders".to_string()),
            ),
        }
    }

    fn encode_type(&mut self, expr: &Expr, scope: &mut VarScope) -> Result<Type, EncodeError> {
        match expr {
            Expr::Defined(word) => match word.as_str() {
                "$o" => Ok(Type::base(TYPE_O)),
                "$i" => Ok(Type::base(TYPE_I)),
                other => Err(EncodeError::BadType(format!("{} is not a type", other))),
            },
            Expr::Atom(name) => match self.sig.key_of(name) {
                Some(key) => Ok(Type::base(key)),
                None => Err(EncodeError::UnknownSymbol(name.clone())),
            },
            Expr::Var(name) => {
                match scope.ty_vars.iter().rposition(|n| n == name) {
                    Some(pos) => Ok(Type::Var((scope.ty_vars.len() - pos) as u32)),
                    None => Err(EncodeError::UnknownSymbol(name.clone())),
                }
            }
            Expr::Binary(BinaryConn::Arrow, left, right) => Ok(Type::fun1(
                self.encode_type(left, scope)?,
                self.encode_type(right, scope)?,
            )),
            Expr::Binary(BinaryConn::Star, left, right) => Ok(Type::prod(
                self.encode_type(left, scope)?,
                self.encode_type(right, scope)?,
            )),
            Expr::Binary(BinaryConn::Plus, left, right) => Ok(Type::sum(
                self.encode_type(left, scope)?,
                self.encode_type(right, scope)?,
            )),
            Expr::Quantified(Quantifier::TypeForall, variables, body) => {
                for (name, _) in variables {
                    scope.ty_vars.push(name.clone());
                }
                let mut ty = self.encode_type(body, scope)?;
                for _ in variables {
                    scope.ty_vars.pop();
                    ty = Type::forall(ty);
                }
                Ok(ty)
            }
            other => Err(EncodeError::BadType(format!("not a type: {:?}", other))),
        }
    }

    /// Resolves a lower-word head. The typed dialects must declare their
    /// symbols; the first-order ones get them invented with individual
    /// argument types and a result decided by position.
    fn atom_key(
        &mut self,
        name: &str,
        arity: usize,
        position: Position,
    ) -> Result<crate::kernel::types::SymbolKey, EncodeError> {
        if let Some(key) = self.sig.key_of(name) {
            return Ok(key);
        }
        let result = match position {
            Position::Formula => Type::base(TYPE_O),
            Position::Term => Type::base(TYPE_I),
        };
        let args = vec![Type::base(TYPE_I); arity];
        Ok(self.sig.add_or_get_uninterpreted(name, Type::fun(args, result))?)
    }
}

fn atom_name(expr: &Expr) -> Result<String, EncodeError> {
    match expr {
        Expr::Atom(name) => Ok(name.clone()),
        other => Err(EncodeError::BadType(format!(
            "expected a symbol name, found {:?}",
            other
        ))),
    }
}

/// Reads `$tType`-shaped expressions as kinds, for type-constructor
/// declarations.
fn as_kind(expr: &Expr) -> Option<Kind> {
    match expr {
        Expr::Defined(word) if word == "$tType" => Some(Kind::Star),
        Expr::Binary(BinaryConn::Arrow, left, right) => {
            let left = as_kind(left)?;
            let right = as_kind(right)?;
            Some(Kind::Arrow(Box::new(left), Box::new(right)))
        }
        _ => None,
    }
}

/// Flattens a top-level disjunction into its literal expressions.
fn disjuncts(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Binary(BinaryConn::Or, left, right) => {
            let mut parts = disjuncts(left);
            parts.extend(disjuncts(right));
            parts
        }
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_problem;

    fn encode_text(text: &str) -> (Signature, Vec<Clause>) {
        let statements = parse_problem(text).unwrap();
        let mut sig = Signature::new();
        let mut clauses = vec![];
        let mut encoder = Encoder::new(&mut sig);
        for statement in &statements {
            match statement {
                crate::syntax::Statement::Annotated(formula) => {
                    if let Some(clause) = encoder.process(formula).unwrap() {
                        clauses.push(clause);
                    }
                }
                crate::syntax::Statement::Include { .. } => panic!("no includes in tests"),
            }
        }
        (sig, clauses)
    }

    #[test]
    fn test_type_declarations_grow_signature() {
        let (sig, clauses) = encode_text(
            "thf(c_type, type, c: $i).\n\
             thf(q_type, type, q: $i > $o).\n\
             thf(list_type, type, list: $tType > $tType).",
        );
        assert!(clauses.is_empty());
        assert!(sig.exists("c"));
        assert_eq!(sig.type_of(sig.key_of("c").unwrap()).unwrap(), Type::base(TYPE_I));
        assert_eq!(
            sig.type_of(sig.key_of("q").unwrap()).unwrap(),
            Type::fun1(Type::base(TYPE_I), Type::base(TYPE_O))
        );
        assert!(sig.exists("list"));
    }

    #[test]
    fn test_fof_auto_types_symbols() {
        let (sig, clauses) = encode_text("fof(ax, axiom, p(f(X))).");
        assert_eq!(clauses.len(), 1);
        // p was invented as a predicate, f as a function.
        assert_eq!(
            sig.type_of(sig.key_of("p").unwrap()).unwrap(),
            Type::fun1(Type::base(TYPE_I), Type::base(TYPE_O))
        );
        assert_eq!(
            sig.type_of(sig.key_of("f").unwrap()).unwrap(),
            Type::fun1(Type::base(TYPE_I), Type::base(TYPE_I))
        );
        let literal = &clauses[0].literals[0];
        assert!(literal.positive);
        assert!(literal.has_free_vars());
    }

    #[test]
    fn test_cnf_splits_disjunction() {
        let (_, clauses) = encode_text("cnf(cl, axiom, p(X) | ~q(X) | a = b).");
        assert_eq!(clauses.len(), 1);
        let literals = &clauses[0].literals;
        assert_eq!(literals.len(), 3);
        assert!(literals[0].positive);
        assert!(!literals[1].positive);
        assert!(literals[2].positive);
        assert!(!literals[2].is_predicate());
    }

    #[test]
    fn test_equality_literal_sides_canonical() {
        let (sig, clauses) = encode_text(
            "thf(c_type, type, c: $i).\n\
             thf(d_type, type, d: $i).\n\
             thf(ax, axiom, c = d).",
        );
        let literal = &clauses[0].literals[0];
        assert_eq!(literal.left, Term::symbol(sig.key_of("c").unwrap()));
        assert_eq!(literal.right, Term::symbol(sig.key_of("d").unwrap()));
    }

    #[test]
    fn test_definition_role_adds_defined_symbol() {
        let (sig, clauses) = encode_text(
            "thf(c_type, type, c: $i).\n\
             thf(d_def, definition, d = c).",
        );
        assert!(clauses.is_empty());
        let d = sig.key_of("d").unwrap();
        assert_eq!(
            sig.definition_of(d).unwrap(),
            Some(&Term::symbol(sig.key_of("c").unwrap()))
        );
    }

    #[test]
    fn test_quantifier_lowering() {
        let (sig, clauses) = encode_text(
            "thf(q_type, type, q: $i > $o).\n\
             thf(ax, axiom, ![X: $i]: (q @ X)).",
        );
        let literal = &clauses[0].literals[0];
        let q = sig.key_of("q").unwrap();
        let expected = Term::symbol(FORALL).apply(vec![
            Arg::Ty(Type::base(TYPE_I)),
            Arg::Term(Term::abs(
                Type::base(TYPE_I),
                Term::symbol(q).apply_terms(vec![Term::bound(Type::base(TYPE_I), 1)]),
            )),
        ]);
        assert_eq!(literal.left, expected);
    }

    #[test]
    fn test_non_boolean_formula_rejected() {
        let statements = parse_problem(
            "thf(c_type, type, c: $i).\n\
             thf(ax, axiom, c).",
        )
        .unwrap();
        let mut sig = Signature::new();
        let mut encoder = Encoder::new(&mut sig);
        let mut error = None;
        for statement in &statements {
            if let crate::syntax::Statement::Annotated(formula) = statement {
                if let Err(e) = encoder.process(formula) {
                    error = Some(e);
                }
            }
        }
        let error = error.expect("expected a type error");
        assert_eq!(error.status(), Status::TypeError);
    }

    #[test]
    fn test_definition_unfolds_in_formulas() {
        let (sig, clauses) = encode_text(
            "thf(q_type, type, q: $i > $o).\n\
             thf(c_type, type, c: $i).\n\
             thf(d_def, definition, d = c).\n\
             thf(ax, axiom, q @ d).",
        );
        // The axiom's d was δ-expanded to c.
        let literal = &clauses[0].literals[0];
        let q = sig.key_of("q").unwrap();
        let c = sig.key_of("c").unwrap();
        assert_eq!(
            literal.left,
            Term::symbol(q).apply_terms(vec![Term::symbol(c)])
        );
    }
}
