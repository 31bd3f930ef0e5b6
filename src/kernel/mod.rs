pub mod fresh;
pub mod huet;
pub mod normalize;
pub mod substitution;
pub mod term;
pub mod types;
pub mod unifier;

pub use huet::{Equation, Rule, SolvedPair};
pub use substitution::{Front, Subst};
pub use term::{Arg, KernelError, Term, VarIndex};
pub use types::{Kind, SymbolKey, Type};
pub use unifier::{pre_unify, pre_unify_all, PreUnification, PreUnifier};
