use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::kernel::term::{KernelError, Term};
use crate::kernel::types::{Kind, SymbolKey, Type};

/// Keys of the fixed initial entries. The first two are the base types of
/// object truth and individuals; the rest are the logical constants every
/// problem can use without declaring.
pub const TYPE_O: SymbolKey = SymbolKey::new(0);
pub const TYPE_I: SymbolKey = SymbolKey::new(1);
pub const TRUE: SymbolKey = SymbolKey::new(2);
pub const FALSE: SymbolKey = SymbolKey::new(3);
pub const NOT: SymbolKey = SymbolKey::new(4);
pub const OR: SymbolKey = SymbolKey::new(5);
pub const AND: SymbolKey = SymbolKey::new(6);
pub const IMPLIES: SymbolKey = SymbolKey::new(7);
pub const IFF: SymbolKey = SymbolKey::new(8);
pub const FORALL: SymbolKey = SymbolKey::new(9);
pub const EXISTS: SymbolKey = SymbolKey::new(10);
pub const EQUALS: SymbolKey = SymbolKey::new(11);

/// What sort of entry a signature symbol is.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SymbolKind {
    /// A type constructor with its kind. Base types are nullary constructors.
    TypeConstructor(Kind),

    /// A constant with no attached meaning. Skolems land here too.
    Uninterpreted,

    /// A constant with a definition the δ-expander may unfold.
    Defined,

    /// One of the built-in logical constants.
    Fixed,
}

/// Everything the table records about one symbol.
/// For type constructors the `typ` field is the base type the constructor
/// denotes when nullary; term-level lookups should never reach it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub typ: Type,
    pub definition: Option<Term>,
}

#[derive(Debug)]
pub enum SignatureError {
    /// A name registered twice with incompatible entries.
    Duplicate(String),

    /// A name re-registered with a different type.
    Conflict(String, Type, Type),
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignatureError::Duplicate(name) => write!(f, "duplicate symbol: {}", name),
            SignatureError::Conflict(name, old, new) => {
                write!(f, "symbol {} re-declared: {} vs {}", name, old, new)
            }
        }
    }
}

impl From<SignatureError> for String {
    fn from(error: SignatureError) -> Self {
        error.to_string()
    }
}

/// The symbol registry: a mapping from opaque keys to constant metadata.
///
/// Keys are assigned densely in registration order, so the fixed entries
/// always occupy the low keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Signature {
    entries: Vec<SymbolInfo>,
    by_name: HashMap<String, SymbolKey>,
    next_skolem: u32,
}

impl Signature {
    pub fn new() -> Signature {
        let mut sig = Signature {
            entries: vec![],
            by_name: HashMap::new(),
            next_skolem: 0,
        };
        let o = Type::base(TYPE_O);
        let oo = Type::fun1(o.clone(), o.clone());
        let ooo = Type::fun(vec![o.clone(), o.clone()], o.clone());
        // The polymorphic quantifier type: !>. (A1 > $o) > $o.
        let quant = Type::forall(Type::fun1(Type::fun1(Type::Var(1), o.clone()), o.clone()));
        let equality = Type::forall(Type::fun(vec![Type::Var(1), Type::Var(1)], o.clone()));

        sig.push_fixed("$o", SymbolKind::TypeConstructor(Kind::Star), Type::base(TYPE_O));
        sig.push_fixed("$i", SymbolKind::TypeConstructor(Kind::Star), Type::base(TYPE_I));
        sig.push_fixed("$true", SymbolKind::Fixed, o.clone());
        sig.push_fixed("$false", SymbolKind::Fixed, o);
        sig.push_fixed("~", SymbolKind::Fixed, oo);
        sig.push_fixed("|", SymbolKind::Fixed, ooo.clone());
        sig.push_fixed("&", SymbolKind::Fixed, ooo.clone());
        sig.push_fixed("=>", SymbolKind::Fixed, ooo.clone());
        sig.push_fixed("<=>", SymbolKind::Fixed, ooo);
        sig.push_fixed("!", SymbolKind::Fixed, quant.clone());
        sig.push_fixed("?", SymbolKind::Fixed, quant);
        sig.push_fixed("=", SymbolKind::Fixed, equality);
        sig
    }

    fn push_fixed(&mut self, name: &str, kind: SymbolKind, typ: Type) {
        let key = SymbolKey::new(self.entries.len() as u32);
        self.entries.push(SymbolInfo {
            name: name.to_string(),
            kind,
            typ,
            definition: None,
        });
        self.by_name.insert(name.to_string(), key);
    }

    fn add(&mut self, info: SymbolInfo) -> Result<SymbolKey, SignatureError> {
        if self.by_name.contains_key(&info.name) {
            return Err(SignatureError::Duplicate(info.name));
        }
        let key = SymbolKey::new(self.entries.len() as u32);
        self.by_name.insert(info.name.clone(), key);
        self.entries.push(info);
        Ok(key)
    }

    pub fn add_type_constructor(
        &mut self,
        name: &str,
        kind: Kind,
    ) -> Result<SymbolKey, SignatureError> {
        let key = SymbolKey::new(self.entries.len() as u32);
        self.add(SymbolInfo {
            name: name.to_string(),
            kind: SymbolKind::TypeConstructor(kind),
            typ: Type::base(key),
            definition: None,
        })
    }

    pub fn add_uninterpreted(&mut self, name: &str, typ: Type) -> Result<SymbolKey, SignatureError> {
        self.add(SymbolInfo {
            name: name.to_string(),
            kind: SymbolKind::Uninterpreted,
            typ,
            definition: None,
        })
    }

    pub fn add_defined(
        &mut self,
        name: &str,
        typ: Type,
        definition: Term,
    ) -> Result<SymbolKey, SignatureError> {
        self.add(SymbolInfo {
            name: name.to_string(),
            kind: SymbolKind::Defined,
            typ,
            definition: Some(definition),
        })
    }

    /// Re-registering an uninterpreted symbol with the same type is fine and
    /// returns the existing key. The encoder leans on this for undeclared
    /// first-order symbols and interned literals.
    pub fn add_or_get_uninterpreted(
        &mut self,
        name: &str,
        typ: Type,
    ) -> Result<SymbolKey, SignatureError> {
        if let Some(key) = self.key_of(name) {
            let existing = &self.entries[key.as_u32() as usize];
            if existing.typ != typ {
                return Err(SignatureError::Conflict(
                    name.to_string(),
                    existing.typ.clone(),
                    typ,
                ));
            }
            return Ok(key);
        }
        self.add_uninterpreted(name, typ)
    }

    /// Registers a fresh Skolem constant of the given type, with an
    /// auto-assigned key and a name no input symbol can collide with.
    pub fn fresh_skolem(&mut self, typ: Type) -> SymbolKey {
        loop {
            let name = format!("sk{}", self.next_skolem);
            self.next_skolem += 1;
            if !self.exists(&name) {
                return self
                    .add_uninterpreted(&name, typ)
                    .expect("skolem name collision after exists check");
            }
        }
    }

    pub fn lookup(&self, key: SymbolKey) -> Option<&SymbolInfo> {
        self.entries.get(key.as_u32() as usize)
    }

    pub fn get(&self, key: SymbolKey) -> Result<&SymbolInfo, KernelError> {
        self.lookup(key).ok_or(KernelError::UnknownSymbol(key))
    }

    pub fn type_of(&self, key: SymbolKey) -> Result<Type, KernelError> {
        Ok(self.get(key)?.typ.clone())
    }

    pub fn definition_of(&self, key: SymbolKey) -> Result<Option<&Term>, KernelError> {
        Ok(self.get(key)?.definition.as_ref())
    }

    pub fn key_of(&self, name: &str) -> Option<SymbolKey> {
        self.by_name.get(name).copied()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_entries() {
        let sig = Signature::new();
        assert_eq!(sig.key_of("$o"), Some(TYPE_O));
        assert_eq!(sig.key_of("$i"), Some(TYPE_I));
        assert!(sig.exists("$true"));
        assert!(sig.exists("="));
        assert!(!sig.exists("zebra"));
        // The quantifiers are polymorphic.
        assert!(sig.type_of(FORALL).unwrap().is_polymorphic());
        assert!(sig.type_of(EQUALS).unwrap().is_polymorphic());
    }

    #[test]
    fn test_add_and_lookup() {
        let mut sig = Signature::new();
        let i = Type::base(TYPE_I);
        let key = sig.add_uninterpreted("c", i.clone()).unwrap();
        assert_eq!(sig.type_of(key).unwrap(), i);
        assert_eq!(sig.key_of("c"), Some(key));
        assert!(sig.lookup(key).unwrap().definition.is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut sig = Signature::new();
        let i = Type::base(TYPE_I);
        sig.add_uninterpreted("c", i.clone()).unwrap();
        assert!(sig.add_uninterpreted("c", i).is_err());
    }

    #[test]
    fn test_add_or_get() {
        let mut sig = Signature::new();
        let i = Type::base(TYPE_I);
        let key = sig.add_or_get_uninterpreted("c", i.clone()).unwrap();
        assert_eq!(sig.add_or_get_uninterpreted("c", i).unwrap(), key);
        let o = Type::base(TYPE_O);
        assert!(sig.add_or_get_uninterpreted("c", o).is_err());
    }

    #[test]
    fn test_skolems_are_distinct() {
        let mut sig = Signature::new();
        let i = Type::base(TYPE_I);
        let a = sig.fresh_skolem(i.clone());
        let b = sig.fresh_skolem(i);
        assert_ne!(a, b);
        assert_ne!(sig.lookup(a).unwrap().name, sig.lookup(b).unwrap().name);
    }

    #[test]
    fn test_definition_storage() {
        let mut sig = Signature::new();
        let i = Type::base(TYPE_I);
        let c = sig.add_uninterpreted("c", i.clone()).unwrap();
        let d = sig.add_defined("d", i, Term::symbol(c)).unwrap();
        assert_eq!(sig.definition_of(d).unwrap(), Some(&Term::symbol(c)));
        assert_eq!(sig.definition_of(c).unwrap(), None);
    }
}
