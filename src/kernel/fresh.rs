use crate::kernel::term::{Term, VarIndex};
use crate::kernel::types::Type;

/// Allocates free-variable indices disjoint from everything already in use.
///
/// One generator is owned by one unification attempt; sharing a generator
/// across attempts would let variable names leak between them. There is no
/// de-allocation.
#[derive(Clone, Debug)]
pub struct FreshVarGen {
    next: VarIndex,
    created: Vec<(VarIndex, Type)>,
}

impl FreshVarGen {
    /// A generator whose first index is `start`.
    pub fn new(start: VarIndex) -> FreshVarGen {
        FreshVarGen {
            next: start.max(1),
            created: vec![],
        }
    }

    /// A generator allocating above every loose variable of the given terms.
    pub fn above<'a>(terms: impl IntoIterator<Item = &'a Term>) -> FreshVarGen {
        let mut start = 1;
        for term in terms {
            if let Some(max) = term.max_loose_index() {
                start = start.max(max + 1);
            }
        }
        FreshVarGen::new(start)
    }

    /// Allocates a new free variable of the given type.
    pub fn fresh(&mut self, ty: Type) -> VarIndex {
        let index = self.next;
        self.next += 1;
        self.created.push((index, ty));
        index
    }

    /// Every variable this generator has allocated, with its type.
    pub fn existing(&self) -> &[(VarIndex, Type)] {
        &self.created
    }

    pub fn next_index(&self) -> VarIndex {
        self.next
    }
}
