//! Lexical scopes stored in an arena. A scope is only ever appended to while
//! it is the innermost scope, and a child never touches its parent, so every
//! scope id handed out stays valid for the whole analysis.

use hashbrown::HashMap;

use crate::{
    frontend::intern::InternedSymbol,
    index::IndexVec,
    middle::{
        hir::{FunctionId, VariableId},
        stdlib::Intrinsic,
    },
    simple_index,
};

simple_index! {
    pub struct ScopeId;
}

/// Anything a name can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Variable(VariableId),
    Function(FunctionId),
    Intrinsic(Intrinsic),
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    bindings: HashMap<InternedSymbol, Entity>,
    in_loop: bool,
    function: Option<FunctionId>,
}

#[derive(Debug)]
pub struct ScopeTree {
    scopes: IndexVec<ScopeId, Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        let mut scopes = IndexVec::new();
        scopes.push(Scope {
            parent: None,
            bindings: HashMap::new(),
            in_loop: false,
            function: None,
        });

        Self { scopes }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// A plain nested block, inheriting the loop and function context
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        let in_loop = self.scopes[parent].in_loop;
        let function = self.scopes[parent].function;

        self.push(parent, in_loop, function)
    }

    pub fn enter_loop(&mut self, parent: ScopeId) -> ScopeId {
        let function = self.scopes[parent].function;

        self.push(parent, true, function)
    }

    /// A function body. `break` does not cross function boundaries.
    pub fn enter_function(&mut self, parent: ScopeId, function: FunctionId) -> ScopeId {
        self.push(parent, false, Some(function))
    }

    fn push(&mut self, parent: ScopeId, in_loop: bool, function: Option<FunctionId>) -> ScopeId {
        self.scopes.push(Scope {
            parent: Some(parent),
            bindings: HashMap::new(),
            in_loop,
            function,
        })
    }

    /// Binds `name` in `scope`, handing back the existing entity if the name
    /// is already bound in that same scope. Shadowing an outer binding is fine.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: InternedSymbol,
        entity: Entity,
    ) -> Result<(), Entity> {
        let bindings = &mut self.scopes[scope].bindings;

        if let Some(existing) = bindings.get(&name) {
            return Err(*existing);
        }

        bindings.insert(name, entity);
        Ok(())
    }

    /// Resolves `name` from `scope` outwards
    pub fn lookup(&self, scope: ScopeId, name: InternedSymbol) -> Option<Entity> {
        let mut current = Some(scope);

        while let Some(id) = current {
            let scope = &self.scopes[id];

            if let Some(entity) = scope.bindings.get(&name) {
                return Some(*entity);
            }

            current = scope.parent;
        }

        None
    }

    pub fn in_loop(&self, scope: ScopeId) -> bool {
        self.scopes[scope].in_loop
    }

    pub fn function(&self, scope: ScopeId) -> Option<FunctionId> {
        self.scopes[scope].function
    }
}
