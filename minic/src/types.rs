use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Resolved type of a declaration or expression. Types are shared via
/// `Rc`; `int` and `void` are singletons handed out by the `TypeCache`.
#[derive(Debug)]
pub enum Type {
    Int,
    Void,
    Pointer(Rc<Type>),
    Array(Rc<Type>, usize),
    Struct(StructType),
    Function(FunctionType),
}

#[derive(Debug)]
pub struct StructType {
    pub name: String,
    pub members: Vec<(String, Rc<Type>)>,
    slots: usize,
}

#[derive(Debug)]
pub struct FunctionType {
    pub ret: Rc<Type>,
    pub params: Vec<(Rc<Type>, String)>,
}

impl StructType {
    /// Struct definitions are closed before any use, so the total width
    /// is fixed at construction.
    pub fn new(name: String, members: Vec<(String, Rc<Type>)>) -> Self {
        let slots = members.iter().map(|(_, ty)| ty.slot_count()).sum();
        StructType { name, members, slots }
    }

    /// Offset of a member = sum of the widths of the members before it.
    pub fn member_offset(&self, member: &str) -> Option<usize> {
        let mut offset = 0;
        for (name, ty) in &self.members {
            if name == member {
                return Some(offset);
            }
            offset += ty.slot_count();
        }
        None
    }

    pub fn member_type(&self, member: &str) -> Option<Rc<Type>> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, ty)| ty.clone())
    }
}

impl Type {
    /// Footprint in machine slots (one slot = one 32-bit cell).
    pub fn slot_count(&self) -> usize {
        match self {
            Type::Int | Type::Pointer(_) => 1,
            // RET always writes one return slot, so void occupies one in
            // call frames.
            Type::Void => 1,
            Type::Array(elem, len) => elem.slot_count() * len,
            Type::Struct(st) => st.slots,
            Type::Function(_) => 0,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int)
    }
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }
    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }
    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct(_))
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            Type::Struct(st) => Some(st),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(fty) => Some(fty),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Void => write!(f, "void"),
            Type::Pointer(base) => write!(f, "{}*", base),
            Type::Array(elem, len) => write!(f, "{}[{}]", elem, len),
            Type::Struct(st) => write!(f, "struct {}", st.name),
            Type::Function(fty) => write!(
                f,
                "{}({})",
                fty.ret,
                fty.params.iter().map(|(ty, _)| ty.to_string()).join(", ")
            ),
        }
    }
}

/// Structural sharing for resolved type specifiers: `int**` resolves to
/// the same `Rc` every time, struct types are canonical by name.
pub struct TypeCache {
    int: Rc<Type>,
    void: Rc<Type>,
    cache: HashMap<String, Rc<Type>>,
}

impl TypeCache {
    pub fn new() -> Self {
        TypeCache {
            int: Rc::new(Type::Int),
            void: Rc::new(Type::Void),
            cache: HashMap::new(),
        }
    }

    pub fn int(&self) -> Rc<Type> {
        self.int.clone()
    }

    pub fn void(&self) -> Rc<Type> {
        self.void.clone()
    }

    /// Resolve a type specifier string: `int`, `void`, `T*` (any depth),
    /// `struct NAME` (optionally followed by `*`).
    pub fn resolve(
        &mut self,
        spec: &str,
        structs: &IndexMap<String, Rc<Type>>,
    ) -> Option<Rc<Type>> {
        if let Some(ty) = self.cache.get(spec) {
            return Some(ty.clone());
        }
        let ty = if spec == "int" {
            self.int()
        } else if spec == "void" {
            self.void()
        } else if let Some(base) = spec.strip_suffix('*') {
            Rc::new(Type::Pointer(self.resolve(base.trim_end(), structs)?))
        } else if let Some(name) = spec.strip_prefix("struct ") {
            structs.get(name.trim())?.clone()
        } else {
            return None;
        };
        self.cache.insert(spec.to_string(), ty.clone());
        Some(ty)
    }
}

impl Default for TypeCache {
    fn default() -> Self {
        Self::new()
    }
}
