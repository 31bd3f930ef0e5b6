use crate::kernel::term::Term;
use crate::kernel::types::Type;
use crate::signature::{Signature, TYPE_I, TYPE_O};

pub fn ity() -> Type {
    Type::base(TYPE_I)
}

pub fn oty() -> Type {
    Type::base(TYPE_O)
}

/// The shared test signature:
///   a, b, c, d : $i
///   f : $i > $i
///   g : $i > $i > $i
///   p : $i > ($i > $o) > $i
///   q : $i > $o
pub struct Fixture {
    pub sig: Signature,
}

impl Fixture {
    pub fn new() -> Fixture {
        let mut sig = Signature::new();
        for name in ["a", "b", "c", "d"] {
            sig.add_uninterpreted(name, ity()).unwrap();
        }
        sig.add_uninterpreted("f", Type::fun1(ity(), ity())).unwrap();
        sig.add_uninterpreted("g", Type::fun(vec![ity(), ity()], ity()))
            .unwrap();
        sig.add_uninterpreted(
            "p",
            Type::fun(vec![ity(), Type::fun1(ity(), oty())], ity()),
        )
        .unwrap();
        sig.add_uninterpreted("q", Type::fun1(ity(), oty())).unwrap();
        Fixture { sig }
    }

    pub fn sym(&self, name: &str) -> Term {
        Term::symbol(self.sig.key_of(name).expect("fixture symbol"))
    }

    /// The name of the symbol a term's head refers to, if any.
    pub fn name_of(&self, term: &Term) -> Option<String> {
        match term {
            Term::Symbol(key) => Some(self.sig.lookup(*key)?.name.clone()),
            _ => None,
        }
    }
}
