use crate::types::Type;
use indexmap::IndexMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: Rc<Type>,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn new(name: String, ty: Rc<Type>, kind: SymbolKind) -> Self {
        Symbol { name, ty, kind }
    }
}

/// Stack of lexical environments. The outermost environment is the
/// persistent global scope and is never popped.
pub struct Scope {
    envs: Vec<IndexMap<String, Symbol>>,
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            envs: vec![IndexMap::new()],
        }
    }

    pub fn enter(&mut self) {
        self.envs.push(IndexMap::new());
    }

    pub fn exit(&mut self) {
        if self.envs.len() > 1 {
            self.envs.pop();
        }
    }

    /// Define a symbol in the current scope; false on a duplicate name.
    pub fn define(&mut self, name: String, ty: Rc<Type>, kind: SymbolKind) -> bool {
        let env = self.envs.last_mut().unwrap();
        if env.contains_key(&name) {
            return false;
        }
        env.insert(name.clone(), Symbol::new(name, ty, kind));
        true
    }

    /// Look a name up from the innermost scope outward.
    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.envs.iter().rev().find_map(|env| env.get(name))
    }

    pub fn find_in_current(&self, name: &str) -> Option<&Symbol> {
        self.envs.last().unwrap().get(name)
    }

    pub fn depth(&self) -> usize {
        self.envs.len()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
