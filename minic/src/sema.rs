use crate::error::{Diagnostic, SemaError};
use crate::grammer::ast::{
    BinOp, DeclKind, Expr, ExprKind, FuncDecl, Program, Stmt, StructDecl, UnOp, VarDecl,
};
use crate::scope::{Scope, Symbol, SymbolKind};
use crate::types::{FunctionType, StructType, Type, TypeCache};
use indexmap::IndexMap;
use std::rc::Rc;

/// Semantic analyzer: validates the tree and decorates every expression
/// and declaration with its resolved type. Diagnostics are collected
/// without aborting so independent errors all surface in one run.
pub struct Sema {
    scope: Scope,
    types: TypeCache,
    struct_types: IndexMap<String, Rc<Type>>,
    globals: IndexMap<String, Symbol>,
    current_ret: Option<Rc<Type>>,
    errors: Vec<Diagnostic>,
}

impl Sema {
    pub fn new() -> Self {
        Sema {
            scope: Scope::new(),
            types: TypeCache::new(),
            struct_types: IndexMap::new(),
            globals: IndexMap::new(),
            current_ret: None,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    fn error(&mut self, error: SemaError, line: usize) {
        self.errors.push(Diagnostic { error, line });
    }

    fn resolve_spec(&mut self, spec: &str) -> Option<Rc<Type>> {
        self.types.resolve(spec, &self.struct_types)
    }

    /// Returns true when the program is well-formed. On failure the tree
    /// may be partially decorated and must not reach the code generator.
    pub fn analyze(&mut self, program: &mut Program) -> bool {
        // Struct pass, source order
        for decl in &program.structs {
            self.analyze_struct(decl);
        }

        // Globals and functions in declaration order, so that a use
        // before its declaration is reported correctly.
        let order = program.order.clone();
        let mut next_global = 0;
        let mut next_function = 0;
        for kind in order {
            match kind {
                DeclKind::Struct => {}
                DeclKind::Global => {
                    self.analyze_global(&mut program.globals[next_global]);
                    next_global += 1;
                }
                DeclKind::Function => {
                    self.analyze_function(&mut program.functions[next_function]);
                    next_function += 1;
                }
            }
        }

        self.errors.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Declarations
// ----------------------------------------------------------------------------

impl Sema {
    fn analyze_struct(&mut self, decl: &StructDecl) {
        if self.struct_types.contains_key(&decl.name) {
            self.error(SemaError::DuplicateDeclaration(decl.name.clone()), decl.line);
            return;
        }

        let mut members = Vec::new();
        for member in &decl.members {
            let Some(base) = self.resolve_spec(&member.type_spec) else {
                self.error(SemaError::UnknownType(member.type_spec.clone()), member.line);
                continue;
            };
            if base.is_void() {
                self.error(SemaError::VoidVariable(member.name.clone()), member.line);
                continue;
            }
            let ty = self.wrap_dims(base, &member.dims, &member.name, member.line);
            members.push((member.name.clone(), ty));
        }

        let ty = Rc::new(Type::Struct(StructType::new(decl.name.clone(), members)));
        self.struct_types.insert(decl.name.clone(), ty);
    }

    /// Wrap a base type in nested arrays, built right-to-left so that
    /// `int arr[3][4]` becomes Array(Array(int, 4), 3).
    fn wrap_dims(&mut self, base: Rc<Type>, dims: &[usize], name: &str, line: usize) -> Rc<Type> {
        let mut ty = base;
        for &dim in dims.iter().rev() {
            if dim == 0 {
                self.error(SemaError::ArraySizeNotPositive(name.to_string()), line);
            }
            ty = Rc::new(Type::Array(ty, dim));
        }
        ty
    }

    fn analyze_global(&mut self, decl: &mut VarDecl) {
        let Some(base) = self.resolve_spec(&decl.type_spec) else {
            self.error(SemaError::UnknownType(decl.type_spec.clone()), decl.line);
            return;
        };
        if base.is_void() {
            self.error(SemaError::VoidVariable(decl.name.clone()), decl.line);
            return;
        }
        if self.globals.contains_key(&decl.name) {
            self.error(SemaError::DuplicateDeclaration(decl.name.clone()), decl.line);
            return;
        }

        let ty = self.wrap_dims(base, &decl.dims, &decl.name, decl.line);
        decl.ty = Some(ty.clone());
        self.globals.insert(
            decl.name.clone(),
            Symbol::new(decl.name.clone(), ty.clone(), SymbolKind::Variable),
        );

        if let Some(init) = &mut decl.init {
            if matches!(init.kind, ExprKind::InitList(_)) {
                self.analyze_init_list(init, &ty, &decl.name, true);
            } else {
                let init_ty = self.analyze_expr(init);
                if !self.is_constant(init) {
                    self.error(
                        SemaError::NonConstantGlobalInitializer(decl.name.clone()),
                        decl.line,
                    );
                }
                if !compatible(&ty, &init_ty) {
                    self.error(
                        SemaError::TypeMismatch {
                            expected: ty.to_string(),
                            found: init_ty.to_string(),
                        },
                        decl.line,
                    );
                }
            }
        }
    }

    fn analyze_function(&mut self, func: &mut FuncDecl) {
        let Some(ret) = self.resolve_spec(&func.ret_spec) else {
            self.error(SemaError::UnknownType(func.ret_spec.clone()), func.line);
            return;
        };
        func.ret_ty = Some(ret.clone());

        let mut params = Vec::new();
        for param in &mut func.params {
            match self.resolve_spec(&param.type_spec) {
                Some(ty) if ty.is_void() => {
                    self.error(SemaError::VoidVariable(param.name.clone()), func.line);
                    return;
                }
                Some(ty) => {
                    param.ty = Some(ty.clone());
                    params.push((ty, param.name.clone()));
                }
                None => {
                    self.error(SemaError::UnknownType(param.type_spec.clone()), func.line);
                    return;
                }
            }
        }

        if self.scope.find_in_current(&func.name).is_some() {
            self.error(SemaError::DuplicateDeclaration(func.name.clone()), func.line);
            return;
        }
        let fty = Rc::new(Type::Function(FunctionType {
            ret: ret.clone(),
            params: params.clone(),
        }));
        self.scope.define(func.name.clone(), fty, SymbolKind::Function);

        self.scope.enter();
        self.current_ret = Some(ret);
        for (ty, name) in params {
            if !self.scope.define(name.clone(), ty, SymbolKind::Parameter) {
                self.error(SemaError::DuplicateDeclaration(name), func.line);
            }
        }
        for stmt in &mut func.body {
            self.analyze_stmt(stmt);
        }
        self.current_ret = None;
        self.scope.exit();
    }
}

// ----------------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------------

impl Sema {
    fn analyze_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Block(stmts) => {
                self.scope.enter();
                for s in stmts {
                    self.analyze_stmt(s);
                }
                self.scope.exit();
            }

            Stmt::VarDecl(decl) => self.analyze_var_decl(decl),

            Stmt::Return(expr, line) => {
                let line = *line;
                let Some(ret) = self.current_ret.clone() else {
                    self.error(SemaError::ReturnOutsideFunction, line);
                    return;
                };
                match expr {
                    Some(e) => {
                        let ty = self.analyze_expr(e);
                        if ret.is_void() {
                            self.error(SemaError::VoidReturnsValue, line);
                        } else if !compatible(&ret, &ty) {
                            self.error(
                                SemaError::TypeMismatch {
                                    expected: ret.to_string(),
                                    found: ty.to_string(),
                                },
                                line,
                            );
                        }
                    }
                    None => {
                        if !ret.is_void() {
                            self.error(SemaError::MissingReturnValue, line);
                        }
                    }
                }
            }

            Stmt::If(ifs) => {
                self.analyze_expr(&mut ifs.cond);
                self.analyze_stmt(&mut ifs.then);
                for (cond, body) in &mut ifs.else_ifs {
                    self.analyze_expr(cond);
                    self.analyze_stmt(body);
                }
                if let Some(els) = &mut ifs.els {
                    self.analyze_stmt(els);
                }
            }

            Stmt::While(cond, body) => {
                self.analyze_expr(cond);
                self.analyze_stmt(body);
            }

            Stmt::DoWhile(body, cond) => {
                self.analyze_stmt(body);
                self.analyze_expr(cond);
            }

            // The for header gets its own scope so an int-introducing
            // init stays local to the loop.
            Stmt::For(f) => {
                self.scope.enter();
                if let Some(init) = &mut f.init {
                    self.analyze_stmt(init);
                }
                if let Some(cond) = &mut f.cond {
                    self.analyze_expr(cond);
                }
                if let Some(step) = &mut f.step {
                    self.analyze_expr(step);
                }
                self.analyze_stmt(&mut f.body);
                self.scope.exit();
            }

            Stmt::Expr(expr) => {
                self.analyze_expr(expr);
            }

            Stmt::Break | Stmt::Continue | Stmt::Empty => {}
        }
    }

    fn analyze_var_decl(&mut self, decl: &mut VarDecl) {
        let Some(base) = self.resolve_spec(&decl.type_spec) else {
            self.error(SemaError::UnknownType(decl.type_spec.clone()), decl.line);
            return;
        };
        if base.is_void() {
            self.error(SemaError::VoidVariable(decl.name.clone()), decl.line);
            return;
        }
        if self.scope.find_in_current(&decl.name).is_some() {
            self.error(SemaError::DuplicateDeclaration(decl.name.clone()), decl.line);
            return;
        }

        let ty = self.wrap_dims(base, &decl.dims, &decl.name, decl.line);
        decl.ty = Some(ty.clone());
        self.scope
            .define(decl.name.clone(), ty.clone(), SymbolKind::Variable);

        if let Some(init) = &mut decl.init {
            if matches!(init.kind, ExprKind::InitList(_)) {
                self.analyze_init_list(init, &ty, &decl.name, false);
            } else {
                let init_ty = self.analyze_expr(init);
                if init_ty.is_void() {
                    self.error(SemaError::VoidInExpression, decl.line);
                } else if !compatible(&ty, &init_ty) {
                    self.error(
                        SemaError::TypeMismatch {
                            expected: ty.to_string(),
                            found: init_ty.to_string(),
                        },
                        decl.line,
                    );
                }
            }
        }
    }

    /// Shape-check an initializer list against an aggregate (or, for a
    /// single-element list, a scalar) target.
    fn analyze_init_list(&mut self, list: &mut Expr, target: &Rc<Type>, name: &str, global: bool) {
        let line = list.line;
        let ExprKind::InitList(elements) = &mut list.kind else {
            return;
        };

        match &**target {
            Type::Array(elem_ty, len) => {
                if elements.len() > *len {
                    self.error(
                        SemaError::InitializerShapeMismatch(
                            name.to_string(),
                            format!("{} elements for an array of {}", elements.len(), len),
                        ),
                        line,
                    );
                }
                let elem_ty = elem_ty.clone();
                for element in elements.iter_mut() {
                    if matches!(element.kind, ExprKind::InitList(_)) {
                        self.error(
                            SemaError::InitializerShapeMismatch(
                                name.to_string(),
                                "nested initializer lists are not supported".to_string(),
                            ),
                            element.line,
                        );
                        continue;
                    }
                    let ty = self.analyze_expr(element);
                    if !compatible(&elem_ty, &ty) {
                        self.error(
                            SemaError::TypeMismatch {
                                expected: elem_ty.to_string(),
                                found: ty.to_string(),
                            },
                            element.line,
                        );
                    }
                    if global && !self.is_constant(element) {
                        self.error(
                            SemaError::NonConstantGlobalInitializer(name.to_string()),
                            element.line,
                        );
                    }
                }
            }

            Type::Struct(st) => {
                if elements.len() > st.members.len() {
                    self.error(
                        SemaError::InitializerShapeMismatch(
                            name.to_string(),
                            format!(
                                "{} elements for a struct with {} members",
                                elements.len(),
                                st.members.len()
                            ),
                        ),
                        line,
                    );
                }
                let member_types: Vec<Rc<Type>> =
                    st.members.iter().map(|(_, ty)| ty.clone()).collect();
                for (element, member_ty) in elements.iter_mut().zip(member_types) {
                    if matches!(element.kind, ExprKind::InitList(_)) {
                        self.error(
                            SemaError::InitializerShapeMismatch(
                                name.to_string(),
                                "nested initializer lists are not supported".to_string(),
                            ),
                            element.line,
                        );
                        continue;
                    }
                    let ty = self.analyze_expr(element);
                    if !compatible(&member_ty, &ty) {
                        self.error(
                            SemaError::TypeMismatch {
                                expected: member_ty.to_string(),
                                found: ty.to_string(),
                            },
                            element.line,
                        );
                    }
                    if global && !self.is_constant(element) {
                        self.error(
                            SemaError::NonConstantGlobalInitializer(name.to_string()),
                            element.line,
                        );
                    }
                }
            }

            _ => {
                // Scalar target takes a list of exactly one element.
                if elements.len() != 1 {
                    self.error(
                        SemaError::InitializerShapeMismatch(
                            name.to_string(),
                            format!("{} elements for a scalar", elements.len()),
                        ),
                        line,
                    );
                }
                let target = target.clone();
                for element in elements.iter_mut() {
                    let ty = self.analyze_expr(element);
                    if !compatible(&target, &ty) {
                        self.error(
                            SemaError::TypeMismatch {
                                expected: target.to_string(),
                                found: ty.to_string(),
                            },
                            element.line,
                        );
                    }
                    if global && !self.is_constant(element) {
                        self.error(
                            SemaError::NonConstantGlobalInitializer(name.to_string()),
                            element.line,
                        );
                    }
                }
            }
        }

        list.ty = Some(target.clone());
    }
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

impl Sema {
    /// Analyze an expression, store its resolved type on the node, and
    /// return it. Errors resolve to int so analysis can continue.
    fn analyze_expr(&mut self, expr: &mut Expr) -> Rc<Type> {
        let line = expr.line;
        let ty = match &mut expr.kind {
            ExprKind::Number(_) => self.types.int(),
            ExprKind::Variable(name) => {
                let name = name.clone();
                self.analyze_variable(&name, line)
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let op = *op;
                self.analyze_binary(op, lhs, rhs, line)
            }
            ExprKind::Unary(op, operand) => {
                let op = *op;
                self.analyze_unary(op, operand, line)
            }
            ExprKind::Call(name, args) => {
                let name = name.clone();
                self.analyze_call(&name, args, line)
            }
            ExprKind::Index(base, index) => self.analyze_index(base, index, line),
            ExprKind::Member(object, member) => {
                let member = member.clone();
                self.analyze_member(object, &member, line)
            }
            ExprKind::InitList(_) => {
                self.error(SemaError::StrayInitializerList, line);
                self.types.int()
            }
        };
        expr.ty = Some(ty.clone());
        ty
    }

    fn analyze_variable(&mut self, name: &str, line: usize) -> Rc<Type> {
        if let Some(symbol) = self.scope.find(name) {
            return symbol.ty.clone();
        }
        if let Some(symbol) = self.globals.get(name) {
            return symbol.ty.clone();
        }
        self.error(SemaError::UndeclaredName(name.to_string()), line);
        self.types.int()
    }

    /// All binary operators resolve to int; pointer arithmetic is not
    /// modeled.
    fn analyze_binary(&mut self, op: BinOp, lhs: &mut Expr, rhs: &mut Expr, line: usize) -> Rc<Type> {
        let lty = self.analyze_expr(lhs);
        let rty = self.analyze_expr(rhs);

        match op {
            BinOp::Assign => {
                if !is_lvalue(lhs) {
                    self.error(SemaError::InvalidLvalue, line);
                }
                if rty.is_void() {
                    self.error(SemaError::VoidInExpression, line);
                } else if !compatible(&lty, &rty) {
                    self.error(
                        SemaError::TypeMismatch {
                            expected: lty.to_string(),
                            found: rty.to_string(),
                        },
                        line,
                    );
                }
            }
            BinOp::Mod => {
                if !lty.is_int() || !rty.is_int() {
                    let found = if lty.is_int() { &rty } else { &lty };
                    self.error(
                        SemaError::TypeMismatch {
                            expected: "int".to_string(),
                            found: found.to_string(),
                        },
                        line,
                    );
                }
            }
            _ => {
                if lty.is_void() || rty.is_void() {
                    self.error(SemaError::VoidInExpression, line);
                }
            }
        }

        self.types.int()
    }

    fn analyze_unary(&mut self, op: UnOp, operand: &mut Expr, line: usize) -> Rc<Type> {
        let ty = self.analyze_expr(operand);
        if ty.is_void() {
            self.error(SemaError::VoidInExpression, line);
            return self.types.int();
        }

        match op {
            UnOp::Ref => {
                if !is_lvalue(operand) {
                    self.error(SemaError::AddressOfNonLvalue, line);
                }
                Rc::new(Type::Pointer(ty))
            }
            UnOp::Deref => match &*ty {
                Type::Pointer(base) => base.clone(),
                _ => {
                    self.error(SemaError::InvalidDereference(ty.to_string()), line);
                    self.types.int()
                }
            },
            UnOp::Pos | UnOp::Neg => {
                if !ty.is_int() {
                    self.error(
                        SemaError::TypeMismatch {
                            expected: "int".to_string(),
                            found: ty.to_string(),
                        },
                        line,
                    );
                }
                self.types.int()
            }
            UnOp::Not => self.types.int(),
        }
    }

    fn analyze_call(&mut self, name: &str, args: &mut [Expr], line: usize) -> Rc<Type> {
        let Some(symbol) = self.scope.find(name).cloned() else {
            self.error(SemaError::UndeclaredName(name.to_string()), line);
            for arg in args.iter_mut() {
                self.analyze_expr(arg);
            }
            return self.types.int();
        };

        let Some(fty) = symbol.ty.as_function() else {
            self.error(SemaError::NotAFunction(name.to_string()), line);
            for arg in args.iter_mut() {
                self.analyze_expr(arg);
            }
            return self.types.int();
        };

        if args.len() != fty.params.len() {
            self.error(
                SemaError::ArgumentCountMismatch {
                    name: name.to_string(),
                    expected: fty.params.len(),
                    found: args.len(),
                },
                line,
            );
        }

        for (arg, (param_ty, _)) in args.iter_mut().zip(&fty.params) {
            let ty = self.analyze_expr(arg);
            if !compatible(param_ty, &ty) {
                self.error(
                    SemaError::TypeMismatch {
                        expected: param_ty.to_string(),
                        found: ty.to_string(),
                    },
                    arg.line,
                );
            }
        }
        for arg in args.iter_mut().skip(fty.params.len()) {
            self.analyze_expr(arg);
        }

        fty.ret.clone()
    }

    fn analyze_index(&mut self, base: &mut Expr, index: &mut Expr, line: usize) -> Rc<Type> {
        let base_ty = self.analyze_expr(base);
        self.analyze_expr(index);
        match &*base_ty {
            Type::Array(elem, _) => elem.clone(),
            Type::Pointer(pointee) => pointee.clone(),
            _ => {
                self.error(SemaError::NotIndexable(base_ty.to_string()), line);
                self.types.int()
            }
        }
    }

    fn analyze_member(&mut self, object: &mut Expr, member: &str, line: usize) -> Rc<Type> {
        let object_ty = self.analyze_expr(object);
        let Some(st) = object_ty.as_struct() else {
            self.error(SemaError::NonStructMemberAccess(object_ty.to_string()), line);
            return self.types.int();
        };
        match st.member_type(member) {
            Some(ty) => ty,
            None => {
                let name = st.name.clone();
                self.error(
                    SemaError::UnknownMember(name, member.to_string()),
                    line,
                );
                self.types.int()
            }
        }
    }

    /// Constant expression predicate for global initializers: literals,
    /// binary/unary folding over constants, and the address of a global.
    fn is_constant(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Number(_) => true,
            ExprKind::Binary(_, lhs, rhs) => self.is_constant(lhs) && self.is_constant(rhs),
            ExprKind::Unary(UnOp::Neg, operand) | ExprKind::Unary(UnOp::Not, operand) => {
                self.is_constant(operand)
            }
            ExprKind::Unary(UnOp::Ref, operand) => {
                matches!(&operand.kind, ExprKind::Variable(name) if self.globals.contains_key(name))
            }
            _ => false,
        }
    }
}

/// An lvalue evaluates to an address: variables, array accesses, member
/// accesses, and pointer dereferences.
fn is_lvalue(expr: &Expr) -> bool {
    matches!(
        &expr.kind,
        ExprKind::Variable(_)
            | ExprKind::Index(..)
            | ExprKind::Member(..)
            | ExprKind::Unary(UnOp::Deref, _)
    )
}

/// Type compatibility, symmetric: ints match, pointers match when their
/// bases match, arrays match when their elements match (length is not
/// part of compatibility), structs match by name.
pub fn compatible(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Int, Type::Int) => true,
        (Type::Void, Type::Void) => true,
        (Type::Pointer(x), Type::Pointer(y)) => compatible(x, y),
        (Type::Array(x, _), Type::Array(y, _)) => compatible(x, y),
        (Type::Struct(x), Type::Struct(y)) => x.name == y.name,
        _ => false,
    }
}

impl Default for Sema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammer::lexer::Lexer;
    use crate::grammer::parsercore::Parser;

    fn analyze(code: &str) -> (Program, Sema, bool) {
        let tokens = Lexer::new(code).parse();
        let (mut program, errors) = Parser::new(tokens.into_iter()).parse();
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        let mut sema = Sema::new();
        let ok = sema.analyze(&mut program);
        (program, sema, ok)
    }

    fn assert_error(code: &str, check: impl Fn(&SemaError) -> bool) {
        let (_, sema, ok) = analyze(code);
        assert!(!ok);
        assert!(
            sema.errors().iter().any(|d| check(&d.error)),
            "expected error not found in {:?}",
            sema.errors()
        );
    }

    #[test]
    fn test_well_formed_program() {
        let (_, sema, ok) = analyze(
            "struct Point { int x; int y; };\n\
             int g = 2 + 3;\n\
             int add(int a, int b) { return a + b; }\n\
             int main() { struct Point p; p.x = add(1, g); return p.x; }",
        );
        assert!(ok, "unexpected errors: {:?}", sema.errors());
    }

    #[test]
    fn test_every_expression_is_annotated() {
        let (program, _, ok) = analyze(
            "int main() { int x = 1; int* p = &x; return *p + x * 2; }",
        );
        assert!(ok);
        fn walk(expr: &Expr) {
            assert!(expr.ty.is_some(), "unannotated expression: {:?}", expr.kind);
            match &expr.kind {
                ExprKind::Binary(_, l, r) => {
                    walk(l);
                    walk(r);
                }
                ExprKind::Unary(_, e) => walk(e),
                ExprKind::Call(_, args) => args.iter().for_each(walk),
                ExprKind::Index(b, i) => {
                    walk(b);
                    walk(i);
                }
                ExprKind::Member(o, _) => walk(o),
                ExprKind::InitList(es) => es.iter().for_each(walk),
                ExprKind::Number(_) | ExprKind::Variable(_) => {}
            }
        }
        for func in &program.functions {
            for stmt in &func.body {
                if let Stmt::VarDecl(decl) = stmt {
                    assert!(decl.ty.is_some());
                    if let Some(init) = &decl.init {
                        walk(init);
                    }
                }
                if let Stmt::Return(Some(expr), _) = stmt {
                    walk(expr);
                }
            }
        }
    }

    #[test]
    fn test_duplicate_struct() {
        assert_error(
            "struct S { int a; };\nstruct S { int b; };\nint main() { return 0; }",
            |e| matches!(e, SemaError::DuplicateDeclaration(name) if name == "S"),
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_error("struct Missing x;\nint main() { return 0; }", |e| {
            matches!(e, SemaError::UnknownType(_))
        });
    }

    #[test]
    fn test_undeclared_variable() {
        assert_error("int main() { return nope; }", |e| {
            matches!(e, SemaError::UndeclaredName(name) if name == "nope")
        });
    }

    #[test]
    fn test_global_used_before_declaration() {
        assert_error("int main() { return g; }\nint g = 1;", |e| {
            matches!(e, SemaError::UndeclaredName(name) if name == "g")
        });
    }

    #[test]
    fn test_void_variable() {
        assert_error("int main() { void x; return 0; }", |e| {
            matches!(e, SemaError::VoidVariable(_))
        });
    }

    #[test]
    fn test_argument_count_mismatch() {
        assert_error(
            "int f(int a) { return a; }\nint main() { return f(1, 2); }",
            |e| matches!(e, SemaError::ArgumentCountMismatch { .. }),
        );
    }

    #[test]
    fn test_assignment_needs_lvalue() {
        assert_error("int main() { 1 = 2; return 0; }", |e| {
            matches!(e, SemaError::InvalidLvalue)
        });
    }

    #[test]
    fn test_deref_requires_pointer() {
        assert_error("int main() { int x; return *x; }", |e| {
            matches!(e, SemaError::InvalidDereference(_))
        });
    }

    #[test]
    fn test_non_constant_global_initializer() {
        assert_error("int a = 1;\nint b = a;\nint main() { return 0; }", |e| {
            matches!(e, SemaError::NonConstantGlobalInitializer(_))
        });
    }

    #[test]
    fn test_address_of_global_is_constant() {
        let (_, sema, ok) = analyze("int a = 1;\nint* p = &a;\nint main() { return 0; }");
        assert!(ok, "unexpected errors: {:?}", sema.errors());
    }

    #[test]
    fn test_initializer_list_too_long() {
        assert_error("int arr[2] = {1, 2, 3};\nint main() { return 0; }", |e| {
            matches!(e, SemaError::InitializerShapeMismatch(..))
        });
    }

    #[test]
    fn test_nested_initializer_list_rejected() {
        assert_error(
            "int main() { int arr[4] = {{1, 2}, 3}; return 0; }",
            |e| matches!(e, SemaError::InitializerShapeMismatch(..)),
        );
    }

    #[test]
    fn test_struct_initializer_order() {
        assert_error(
            "struct S { int a; int* p; };\n\
             int main() { struct S s = {1, 2}; return 0; }",
            |e| matches!(e, SemaError::TypeMismatch { .. }),
        );
    }

    #[test]
    fn test_unknown_member() {
        assert_error(
            "struct P { int x; };\nint main() { struct P p; return p.z; }",
            |e| matches!(e, SemaError::UnknownMember(..)),
        );
    }

    #[test]
    fn test_member_access_on_non_struct() {
        assert_error("int main() { int x; return x.y; }", |e| {
            matches!(e, SemaError::NonStructMemberAccess(_))
        });
    }

    #[test]
    fn test_int_assigned_to_pointer() {
        assert_error("int main() { int* p = 42; return 0; }", |e| {
            matches!(e, SemaError::TypeMismatch { .. })
        });
    }

    #[test]
    fn test_pointer_assigned_to_int() {
        assert_error(
            "int main() { int y; int* p = &y; int x = p; return 0; }",
            |e| matches!(e, SemaError::TypeMismatch { .. }),
        );
    }

    #[test]
    fn test_pointer_level_mismatch() {
        assert_error(
            "int main() { int y; int* p = &y; int** pp = p; return 0; }",
            |e| matches!(e, SemaError::TypeMismatch { .. }),
        );
    }

    #[test]
    fn test_struct_pointer_type_mismatch() {
        assert_error(
            "struct Point { int x; int y; };\n\
             struct Rectangle { int w; int h; };\n\
             int main() { struct Rectangle r; struct Point* p = &r; return 0; }",
            |e| matches!(e, SemaError::TypeMismatch { .. }),
        );
    }

    #[test]
    fn test_cross_struct_type_mismatch() {
        assert_error(
            "struct Point { int x; int y; };\n\
             struct Rectangle { int w; int h; };\n\
             int main() { struct Point p; struct Rectangle r; p = r; return 0; }",
            |e| matches!(e, SemaError::TypeMismatch { .. }),
        );
    }

    #[test]
    fn test_arrow_on_non_pointer() {
        // p->x on a plain struct dereferences a non-pointer
        assert_error(
            "struct Point { int x; int y; };\n\
             int main() { struct Point p; return p->x; }",
            |e| matches!(e, SemaError::InvalidDereference(_)),
        );
    }

    #[test]
    fn test_arrow_on_non_struct_pointer() {
        assert_error(
            "int main() { int v; int* ip = &v; return ip->x; }",
            |e| matches!(e, SemaError::NonStructMemberAccess(_)),
        );
    }

    #[test]
    fn test_address_of_literal_rejected() {
        assert_error("int main() { int* p = &10; return 0; }", |e| {
            matches!(e, SemaError::AddressOfNonLvalue)
        });
    }

    #[test]
    fn test_void_return_mismatches() {
        assert_error("void f() { return 1; }\nint main() { return 0; }", |e| {
            matches!(e, SemaError::VoidReturnsValue)
        });
        assert_error("int f() { return; }\nint main() { return 0; }", |e| {
            matches!(e, SemaError::MissingReturnValue)
        });
    }

    #[test]
    fn test_array_size_must_be_positive() {
        assert_error("int main() { int arr[0]; return 0; }", |e| {
            matches!(e, SemaError::ArraySizeNotPositive(_))
        });
    }

    #[test]
    fn test_array_length_not_part_of_compatibility() {
        // Deliberate relaxation: int[2] and int[3] are compatible.
        let (_, sema, ok) = analyze(
            "int main() { int a[2]; int b[3]; a = b; return 0; }",
        );
        assert!(ok, "unexpected errors: {:?}", sema.errors());
    }

    #[test]
    fn test_errors_are_collected_not_aborted() {
        let (_, sema, ok) = analyze(
            "int main() { int x = nope1; int y = nope2; return 0; }",
        );
        assert!(!ok);
        assert!(sema.errors().len() >= 2);
    }

    #[test]
    fn test_shadowing_in_nested_blocks() {
        let (_, sema, ok) = analyze(
            "int main() { int x = 1; { int x = 2; { int x = 3; } } return x; }",
        );
        assert!(ok, "unexpected errors: {:?}", sema.errors());
    }

    #[test]
    fn test_for_init_is_scoped_to_loop() {
        assert_error(
            "int main() { for (int i = 0; i < 3; i = i + 1) {} return i; }",
            |e| matches!(e, SemaError::UndeclaredName(name) if name == "i"),
        );
    }
}
