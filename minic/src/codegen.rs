use crate::error::CodegenError;
use crate::grammer::ast::{
    BinOp, Expr, ExprKind, ForStmt, FuncDecl, IfStmt, Program, Stmt, UnOp, VarDecl,
};
use crate::types::Type;
use bytecode::{GlobalVarInit, Op, Program as Bytecode, GLOBAL_BASE};
use indexmap::IndexMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
struct VarInfo {
    offset: i32,
    slots: usize,
    is_param: bool,
}

/// Lowers an analyzed tree to the instruction stream. Unlike the
/// analyzer, any inconsistency here is fatal.
pub struct CodeGen {
    code: Bytecode,
    locals: IndexMap<String, VarInfo>,
    globals: IndexMap<String, VarInfo>,
    next_local: i32,
    next_global: i32,
    current_param_slots: usize,
    break_targets: Vec<usize>,
    continue_targets: Vec<usize>,
    loop_bases: Vec<i32>,
}

impl CodeGen {
    pub fn generate(program: &Program) -> Result<Bytecode, CodegenError> {
        let mut gen = CodeGen {
            code: Bytecode::new(),
            locals: IndexMap::new(),
            globals: IndexMap::new(),
            next_local: 0,
            next_global: 0,
            current_param_slots: 0,
            break_targets: Vec::new(),
            continue_targets: Vec::new(),
            loop_bases: Vec::new(),
        };
        gen.run(program)?;
        Ok(gen.code)
    }

    fn run(&mut self, program: &Program) -> Result<(), CodegenError> {
        // 1. Allocate a contiguous run of slots for every global
        for decl in &program.globals {
            let ty = resolved_decl(decl)?;
            let slots = ty.slot_count();
            self.globals.insert(
                decl.name.clone(),
                VarInfo {
                    offset: self.next_global,
                    slots,
                    is_param: false,
                },
            );
            self.next_global += slots as i32;
        }

        // 2. Fold each initializer into its data vector; the VM
        //    zero-fills the rest
        for decl in &program.globals {
            let info = self
                .globals
                .get(&decl.name)
                .cloned()
                .ok_or_else(|| CodegenError::UnknownVariable(decl.name.clone()))?;
            let mut data = Vec::new();
            if let Some(init) = &decl.init {
                match &init.kind {
                    ExprKind::InitList(elements) => {
                        for element in elements {
                            data.push(self.const_eval(element).map_err(|e| match e {
                                CodegenError::ConstDivisionByZero => e,
                                _ => CodegenError::NonConstantInitializer(decl.name.clone()),
                            })?);
                        }
                    }
                    _ => {
                        data.push(self.const_eval(init).map_err(|e| match e {
                            CodegenError::ConstDivisionByZero => e,
                            _ => CodegenError::NonConstantInitializer(decl.name.clone()),
                        })?);
                    }
                }
            }
            self.code.globals.push(GlobalVarInit {
                name: decl.name.clone(),
                offset: info.offset as usize,
                slots: info.slots,
                data,
            });
        }

        // 3. Generate the functions and resolve the entry point
        for func in &program.functions {
            self.gen_function(func)?;
        }
        self.code.entry = self.code.functions.get("main").copied();
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Compile-time constant evaluation for global initializers
// ----------------------------------------------------------------------------

impl CodeGen {
    fn const_eval(&self, expr: &Expr) -> Result<i32, CodegenError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(*n),

            ExprKind::Binary(op, lhs, rhs) => {
                let l = self.const_eval(lhs)?;
                let r = self.const_eval(rhs)?;
                match op {
                    BinOp::Add => Ok(l.wrapping_add(r)),
                    BinOp::Sub => Ok(l.wrapping_sub(r)),
                    BinOp::Mul => Ok(l.wrapping_mul(r)),
                    BinOp::Div => match r {
                        0 => Err(CodegenError::ConstDivisionByZero),
                        r => Ok(l.wrapping_div(r)),
                    },
                    BinOp::Mod => match r {
                        0 => Err(CodegenError::ConstDivisionByZero),
                        r => Ok(l.wrapping_rem(r)),
                    },
                    BinOp::Eq => Ok((l == r) as i32),
                    BinOp::Ne => Ok((l != r) as i32),
                    BinOp::Lt => Ok((l < r) as i32),
                    BinOp::Le => Ok((l <= r) as i32),
                    BinOp::Gt => Ok((l > r) as i32),
                    BinOp::Ge => Ok((l >= r) as i32),
                    BinOp::And => Ok((l != 0 && r != 0) as i32),
                    BinOp::Or => Ok((l != 0 || r != 0) as i32),
                    BinOp::Assign => Err(CodegenError::NonConstantInitializer(String::new())),
                }
            }

            ExprKind::Unary(UnOp::Neg, operand) => Ok(self.const_eval(operand)?.wrapping_neg()),
            ExprKind::Unary(UnOp::Not, operand) => {
                Ok((self.const_eval(operand)? == 0) as i32)
            }

            // &global is an address constant: GLOBAL_BASE + offset
            ExprKind::Unary(UnOp::Ref, operand) => match &operand.kind {
                ExprKind::Variable(name) => {
                    let info = self
                        .globals
                        .get(name)
                        .ok_or_else(|| CodegenError::UnknownVariable(name.clone()))?;
                    Ok(GLOBAL_BASE + info.offset)
                }
                _ => Err(CodegenError::NonConstantInitializer(String::new())),
            },

            _ => Err(CodegenError::NonConstantInitializer(String::new())),
        }
    }
}

// ----------------------------------------------------------------------------
// Functions and statements
// ----------------------------------------------------------------------------

impl CodeGen {
    fn ret_slot_offset(&self) -> i32 {
        -3 - self.current_param_slots as i32
    }

    fn gen_function(&mut self, func: &FuncDecl) -> Result<(), CodegenError> {
        let entry = self.code.here();
        self.code.functions.insert(func.name.clone(), entry);

        self.locals.clear();
        self.next_local = 0;

        self.current_param_slots = 0;
        for param in &func.params {
            let ty = param
                .ty
                .as_ref()
                .ok_or_else(|| CodegenError::UnresolvedType(param.name.clone()))?;
            self.current_param_slots += ty.slot_count();
        }

        // Frame layout inside the callee:
        //   [ret_slot]   fp - 3 - param_slots - (ret_slots - 1) ..
        //   [param_k]    ...
        //   [param_1]    fp - 3
        //   [ret_addr]   fp - 2
        //   [old_fp]     fp - 1
        //   [locals]     fp + 0, fp + 1, ...
        // Multi-slot parameters end at the lower address so that member 0
        // sits lowest.
        let mut param_offset = -3i32;
        for param in &func.params {
            let ty = param
                .ty
                .as_ref()
                .ok_or_else(|| CodegenError::UnresolvedType(param.name.clone()))?;
            let slots = ty.slot_count();
            let offset = param_offset - slots as i32 + 1;
            self.locals.insert(
                param.name.clone(),
                VarInfo {
                    offset,
                    slots,
                    is_param: true,
                },
            );
            param_offset -= slots as i32;
        }

        self.gen_block(&func.body)?;

        // Implicit `return 0` when the body does not end in a return
        if !matches!(self.code.code.last(), Some(Op::RET(_))) {
            self.code.emit(Op::PUSH(0));
            self.code.emit(Op::RET(self.ret_slot_offset()));
        }
        Ok(())
    }

    /// Block scope: locals allocated inside are retracted with ADJSP on
    /// exit and the variable table is restored.
    fn gen_block(&mut self, stmts: &[Stmt]) -> Result<(), CodegenError> {
        let saved_offset = self.next_local;
        let saved_locals = self.locals.clone();

        for stmt in stmts {
            self.gen_stmt(stmt)?;
        }

        let to_pop = self.next_local - saved_offset;
        if to_pop > 0 {
            self.code.emit(Op::ADJSP(to_pop));
        }
        self.next_local = saved_offset;
        self.locals = saved_locals;
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::Block(stmts) => self.gen_block(stmts)?,
            Stmt::VarDecl(decl) => self.gen_var_decl(decl)?,
            Stmt::If(ifs) => self.gen_if(ifs)?,
            Stmt::While(cond, body) => self.gen_while(cond, body)?,
            Stmt::For(f) => self.gen_for(f)?,
            Stmt::DoWhile(body, cond) => self.gen_do_while(body, cond)?,
            Stmt::Return(expr, _) => self.gen_return(expr.as_ref())?,

            Stmt::Expr(expr) => self.gen_expr_stmt(expr)?,

            Stmt::Break => {
                self.unwind_to_loop_base();
                let at = self.code.here();
                self.code.emit(Op::JMP(0));
                self.break_targets.push(at);
            }

            Stmt::Continue => {
                self.unwind_to_loop_base();
                let at = self.code.here();
                self.code.emit(Op::JMP(0));
                self.continue_targets.push(at);
            }

            Stmt::Empty => {}
        }
        Ok(())
    }

    /// Evaluate an expression for effect and discard its value. A
    /// record-valued expression leaves `slot_count` slots to retract.
    fn gen_expr_stmt(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        self.gen_expr(expr)?;
        if expr_is_struct(expr) {
            let slots = expr_ty(expr)?.slot_count();
            self.code.emit(Op::ADJSP(slots as i32));
        } else {
            self.code.emit(Op::POP);
        }
        Ok(())
    }

    /// break/continue jump over the block-exit ADJSPs, so retract any
    /// slots allocated since the loop body began here instead.
    fn unwind_to_loop_base(&mut self) {
        if let Some(&base) = self.loop_bases.last() {
            let depth = self.next_local - base;
            if depth > 0 {
                self.code.emit(Op::ADJSP(depth));
            }
        }
    }

    fn gen_var_decl(&mut self, decl: &VarDecl) -> Result<(), CodegenError> {
        let ty = resolved_decl(decl)?;
        let slots = ty.slot_count();
        let offset = self.next_local;
        self.next_local += slots as i32;
        self.locals.insert(
            decl.name.clone(),
            VarInfo {
                offset,
                slots,
                is_param: false,
            },
        );

        // The freshly pushed slots are the variable's storage.
        match &decl.init {
            Some(init) => match &init.kind {
                ExprKind::InitList(elements) => {
                    for element in elements {
                        self.gen_expr(element)?;
                    }
                    for _ in elements.len()..slots {
                        self.code.emit(Op::PUSH(0));
                    }
                }
                _ => self.gen_expr(init)?,
            },
            None => {
                for _ in 0..slots {
                    self.code.emit(Op::PUSH(0));
                }
            }
        }
        Ok(())
    }

    fn gen_if(&mut self, ifs: &IfStmt) -> Result<(), CodegenError> {
        self.gen_expr(&ifs.cond)?;
        let jz = self.code.here();
        self.code.emit(Op::JZ(0));

        self.gen_stmt(&ifs.then)?;

        if ifs.else_ifs.is_empty() && ifs.els.is_none() {
            let end = self.code.here();
            self.code.patch(jz, end);
            return Ok(());
        }

        let mut jmp_ends = vec![self.code.here()];
        self.code.emit(Op::JMP(0));
        let next = self.code.here();
        self.code.patch(jz, next);

        for (cond, body) in &ifs.else_ifs {
            self.gen_expr(cond)?;
            let jz = self.code.here();
            self.code.emit(Op::JZ(0));
            self.gen_stmt(body)?;
            jmp_ends.push(self.code.here());
            self.code.emit(Op::JMP(0));
            let next = self.code.here();
            self.code.patch(jz, next);
        }

        if let Some(els) = &ifs.els {
            self.gen_stmt(els)?;
        }

        let end = self.code.here();
        for at in jmp_ends {
            self.code.patch(at, end);
        }
        Ok(())
    }

    fn gen_while(&mut self, cond: &Expr, body: &Stmt) -> Result<(), CodegenError> {
        let loop_start = self.code.here();
        self.gen_expr(cond)?;
        let jz = self.code.here();
        self.code.emit(Op::JZ(0));

        let break_start = self.break_targets.len();
        let continue_start = self.continue_targets.len();
        self.loop_bases.push(self.next_local);
        self.gen_stmt(body)?;
        self.loop_bases.pop();

        // continue re-checks the condition
        for at in self.continue_targets.split_off(continue_start) {
            self.code.patch(at, loop_start);
        }

        self.code.emit(Op::JMP(loop_start as i32));
        let end = self.code.here();
        self.code.patch(jz, end);

        for at in self.break_targets.split_off(break_start) {
            self.code.patch(at, end);
        }
        Ok(())
    }

    fn gen_for(&mut self, f: &ForStmt) -> Result<(), CodegenError> {
        if let Some(init) = &f.init {
            self.gen_stmt(init)?;
        }

        let loop_start = self.code.here();
        let jz = match &f.cond {
            Some(cond) => {
                self.gen_expr(cond)?;
                let at = self.code.here();
                self.code.emit(Op::JZ(0));
                Some(at)
            }
            None => None,
        };

        let break_start = self.break_targets.len();
        let continue_start = self.continue_targets.len();
        self.loop_bases.push(self.next_local);
        self.gen_stmt(&f.body)?;
        self.loop_bases.pop();

        // continue runs the increment first
        let increment = self.code.here();
        for at in self.continue_targets.split_off(continue_start) {
            self.code.patch(at, increment);
        }

        if let Some(step) = &f.step {
            self.gen_expr_stmt(step)?;
        }
        self.code.emit(Op::JMP(loop_start as i32));

        let end = self.code.here();
        if let Some(at) = jz {
            self.code.patch(at, end);
        }
        for at in self.break_targets.split_off(break_start) {
            self.code.patch(at, end);
        }
        Ok(())
    }

    fn gen_do_while(&mut self, body: &Stmt, cond: &Expr) -> Result<(), CodegenError> {
        let loop_start = self.code.here();

        let break_start = self.break_targets.len();
        let continue_start = self.continue_targets.len();
        self.loop_bases.push(self.next_local);
        self.gen_stmt(body)?;
        self.loop_bases.pop();

        let cond_addr = self.code.here();
        for at in self.continue_targets.split_off(continue_start) {
            self.code.patch(at, cond_addr);
        }

        self.gen_expr(cond)?;
        self.code.emit(Op::JNZ(loop_start as i32));

        let end = self.code.here();
        for at in self.break_targets.split_off(break_start) {
            self.code.patch(at, end);
        }
        Ok(())
    }

    fn gen_return(&mut self, expr: Option<&Expr>) -> Result<(), CodegenError> {
        match expr {
            Some(expr) if expr_is_struct(expr) => {
                // Record return: write the slots into the caller-owned
                // return slot (high to low), then leave a copy of the
                // top slot for RET to rewrite.
                let slots = expr_ty(expr)?.slot_count();
                let base = self.ret_slot_offset() - (slots as i32 - 1);
                self.gen_expr(expr)?;
                for i in (0..slots as i32).rev() {
                    self.code.emit(Op::STORE(base + i));
                }
                self.code.emit(Op::LOAD(self.ret_slot_offset()));
            }
            Some(expr) => self.gen_expr(expr)?,
            None => self.code.emit(Op::PUSH(0)),
        }
        self.code.emit(Op::RET(self.ret_slot_offset()));
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

impl CodeGen {
    fn find_var(&self, name: &str) -> Result<(VarInfo, bool), CodegenError> {
        if let Some(info) = self.locals.get(name) {
            return Ok((info.clone(), false));
        }
        if let Some(info) = self.globals.get(name) {
            return Ok((info.clone(), true));
        }
        Err(CodegenError::UnknownVariable(name.to_string()))
    }

    /// Every expression leaves its value on the stack: one slot for
    /// scalars and pointers, `slot_count` contiguous slots (low to high)
    /// for records.
    fn gen_expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        match &expr.kind {
            ExprKind::Number(n) => self.code.emit(Op::PUSH(*n)),

            ExprKind::Variable(name) => {
                let (info, global) = self.find_var(name)?;
                let slots = if expr_is_struct(expr) { info.slots } else { 1 };
                for i in 0..slots as i32 {
                    self.code.emit(if global {
                        Op::LOADG(info.offset + i)
                    } else {
                        Op::LOAD(info.offset + i)
                    });
                }
            }

            ExprKind::Binary(BinOp::Assign, lhs, rhs) => self.gen_assign(lhs, rhs)?,

            ExprKind::Binary(op, lhs, rhs) => {
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                self.code.emit(binop_code(*op));
            }

            ExprKind::Unary(op, operand) => match op {
                UnOp::Ref => self.gen_addr(operand)?,
                UnOp::Deref => {
                    self.gen_expr(operand)?;
                    self.code.emit(Op::LOADM);
                }
                UnOp::Pos => self.gen_expr(operand)?,
                UnOp::Neg => {
                    self.gen_expr(operand)?;
                    self.code.emit(Op::NEG);
                }
                UnOp::Not => {
                    self.gen_expr(operand)?;
                    self.code.emit(Op::NOT);
                }
            },

            ExprKind::Call(name, args) => self.gen_call(name, args, expr)?,

            ExprKind::Index(..) | ExprKind::Member(..) => {
                let slots = expr_ty(expr)?.slot_count();
                if expr_is_struct(expr) {
                    for i in 0..slots as i32 {
                        self.gen_addr(expr)?;
                        if i > 0 {
                            self.code.emit(Op::ADDPTR(i));
                        }
                        self.code.emit(Op::LOADM);
                    }
                } else {
                    self.gen_addr(expr)?;
                    self.code.emit(Op::LOADM);
                }
            }

            ExprKind::InitList(_) => return Err(CodegenError::StrayInitializerList),
        }
        Ok(())
    }

    /// Materialize the address of an lvalue on the stack.
    fn gen_addr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        match &expr.kind {
            ExprKind::Variable(name) => {
                let (info, global) = self.find_var(name)?;
                self.code.emit(if global {
                    Op::LEAG(info.offset)
                } else {
                    Op::LEA(info.offset)
                });
            }

            ExprKind::Index(base, index) => {
                let base_ty = expr_ty(base)?;
                let elem_slots = match &**base_ty {
                    Type::Array(elem, _) => elem.slot_count(),
                    Type::Pointer(pointee) => pointee.slot_count(),
                    _ => 1,
                };
                self.gen_expr(index)?;
                if base_ty.is_pointer() {
                    // The pointer's value is the element-0 address
                    self.gen_expr(base)?;
                } else {
                    self.gen_addr(base)?;
                }
                self.code.emit(Op::ADDPTRD(elem_slots as i32));
            }

            ExprKind::Member(object, member) => {
                let object_ty = expr_ty(object)?;
                let st = object_ty
                    .as_struct()
                    .ok_or(CodegenError::InvalidMemberAccess)?;
                let member_offset = st
                    .member_offset(member)
                    .ok_or(CodegenError::InvalidMemberAccess)? as i32;

                match &object.kind {
                    ExprKind::Variable(name) => {
                        let (info, global) = self.find_var(name)?;
                        self.code.emit(if global {
                            Op::LEAG(info.offset + member_offset)
                        } else {
                            Op::LEA(info.offset + member_offset)
                        });
                    }
                    // a.b.c and arr[i].m compose address additions
                    ExprKind::Member(..) | ExprKind::Index(..) => {
                        self.gen_addr(object)?;
                        if member_offset != 0 {
                            self.code.emit(Op::ADDPTR(member_offset));
                        }
                    }
                    // (*p).m: the pointer's value plus the member offset
                    ExprKind::Unary(UnOp::Deref, pointer) => {
                        self.gen_expr(pointer)?;
                        if member_offset != 0 {
                            self.code.emit(Op::ADDPTR(member_offset));
                        }
                    }
                    _ => return Err(CodegenError::InvalidMemberAccess),
                }
            }

            ExprKind::Unary(UnOp::Deref, pointer) => self.gen_expr(pointer)?,

            _ => return Err(CodegenError::InvalidAssignmentTarget),
        }
        Ok(())
    }

    /// Assignment leaves the assigned value on the stack.
    fn gen_assign(&mut self, lhs: &Expr, rhs: &Expr) -> Result<(), CodegenError> {
        let lty = expr_ty(lhs)?.clone();

        // Pointer-dereference assignment is always scalar.
        if lty.is_struct() && !matches!(lhs.kind, ExprKind::Unary(UnOp::Deref, _)) {
            return self.gen_struct_assign(lhs, rhs, lty.slot_count());
        }

        match &lhs.kind {
            ExprKind::Variable(name) => {
                self.gen_expr(rhs)?;
                let (info, global) = self.find_var(name)?;
                if global {
                    self.code.emit(Op::STOREG(info.offset));
                    self.code.emit(Op::LOADG(info.offset));
                } else {
                    self.code.emit(Op::STORE(info.offset));
                    self.code.emit(Op::LOAD(info.offset));
                }
            }

            ExprKind::Index(..) | ExprKind::Member(..) | ExprKind::Unary(UnOp::Deref, _) => {
                self.gen_expr(rhs)?;
                self.gen_addr(lhs)?;
                self.code.emit(Op::STOREM);
                self.gen_addr(lhs)?;
                self.code.emit(Op::LOADM);
            }

            _ => return Err(CodegenError::InvalidAssignmentTarget),
        }
        Ok(())
    }

    fn gen_struct_assign(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        slots: usize,
    ) -> Result<(), CodegenError> {
        match &rhs.kind {
            // A call's return slots are already on the stack; store them
            // out element-wise, high to low.
            ExprKind::Call(..) => {
                self.gen_expr(rhs)?;
                match &lhs.kind {
                    ExprKind::Variable(name) => {
                        let (info, global) = self.find_var(name)?;
                        for i in (0..slots as i32).rev() {
                            self.code.emit(if global {
                                Op::STOREG(info.offset + i)
                            } else {
                                Op::STORE(info.offset + i)
                            });
                        }
                        self.code.emit(if global {
                            Op::LOADG(info.offset)
                        } else {
                            Op::LOAD(info.offset)
                        });
                    }
                    _ => {
                        for i in (0..slots as i32).rev() {
                            self.gen_addr(lhs)?;
                            if i > 0 {
                                self.code.emit(Op::ADDPTR(i));
                            }
                            self.code.emit(Op::STOREM);
                        }
                        self.gen_addr(lhs)?;
                        self.code.emit(Op::LOADM);
                    }
                }
            }

            // Addressable source: one block move.
            ExprKind::Variable(_) | ExprKind::Member(..) | ExprKind::Index(..) => {
                self.gen_addr(rhs)?;
                self.gen_addr(lhs)?;
                self.code.emit(Op::MEMCPY(slots as i32));
                self.gen_addr(lhs)?;
                self.code.emit(Op::LOADM);
            }

            _ => return Err(CodegenError::UnsupportedStructSource),
        }
        Ok(())
    }

    /// Calling convention: the caller pre-allocates the return slot(s),
    /// pushes arguments in reverse order, and retracts the arguments
    /// afterwards so only the return value remains.
    fn gen_call(&mut self, name: &str, args: &[Expr], expr: &Expr) -> Result<(), CodegenError> {
        let ret_slots = expr_ty(expr)?.slot_count();
        for _ in 0..ret_slots {
            self.code.emit(Op::PUSH(0));
        }

        let mut param_slots = 0usize;
        for arg in args.iter().rev() {
            let arg_ty = expr_ty(arg)?;
            if arg_ty.is_struct() {
                let slots = arg_ty.slot_count();
                param_slots += slots;
                match &arg.kind {
                    ExprKind::Variable(name) => {
                        let (info, global) = self.find_var(name)?;
                        for i in 0..slots as i32 {
                            self.code.emit(if global {
                                Op::LOADG(info.offset + i)
                            } else {
                                Op::LOAD(info.offset + i)
                            });
                        }
                    }
                    ExprKind::Member(..) | ExprKind::Index(..) => {
                        for i in 0..slots as i32 {
                            self.gen_addr(arg)?;
                            if i > 0 {
                                self.code.emit(Op::ADDPTR(i));
                            }
                            self.code.emit(Op::LOADM);
                        }
                    }
                    _ => return Err(CodegenError::UnsupportedStructArgument),
                }
            } else {
                self.gen_expr(arg)?;
                param_slots += 1;
            }
        }

        let entry = self
            .code
            .functions
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnknownFunction(name.to_string()))?;
        self.code.emit(Op::CALL(entry as i32));

        if param_slots > 0 {
            self.code.emit(Op::ADJSP(param_slots as i32));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn resolved_decl(decl: &VarDecl) -> Result<&Rc<Type>, CodegenError> {
    decl.ty
        .as_ref()
        .ok_or_else(|| CodegenError::UnresolvedType(decl.name.clone()))
}

fn expr_ty(expr: &Expr) -> Result<&Rc<Type>, CodegenError> {
    expr.ty
        .as_ref()
        .ok_or_else(|| CodegenError::UnresolvedType("expression".to_string()))
}

fn expr_is_struct(expr: &Expr) -> bool {
    expr.ty.as_ref().map(|ty| ty.is_struct()).unwrap_or(false)
}

fn binop_code(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::ADD,
        BinOp::Sub => Op::SUB,
        BinOp::Mul => Op::MUL,
        BinOp::Div => Op::DIV,
        BinOp::Mod => Op::MOD,
        BinOp::Eq => Op::EQ,
        BinOp::Ne => Op::NE,
        BinOp::Lt => Op::LT,
        BinOp::Le => Op::LE,
        BinOp::Gt => Op::GT,
        BinOp::Ge => Op::GE,
        BinOp::And => Op::AND,
        BinOp::Or => Op::OR,
        BinOp::Assign => unreachable!("assignment is lowered separately"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammer::lexer::Lexer;
    use crate::grammer::parsercore::Parser;
    use crate::sema::Sema;

    fn compile(code: &str) -> Bytecode {
        let tokens = Lexer::new(code).parse();
        let (mut program, errors) = Parser::new(tokens.into_iter()).parse();
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        let mut sema = Sema::new();
        assert!(sema.analyze(&mut program), "sema errors: {:?}", sema.errors());
        CodeGen::generate(&program).expect("codegen failed")
    }

    #[test]
    fn test_entry_point_is_main() {
        let code = compile("int before() { return 1; }\nint main() { return 0; }");
        assert_eq!(code.entry, code.functions.get("main").copied());
        assert!(code.entry.is_some());
    }

    #[test]
    fn test_global_constant_folding() {
        let code = compile(
            "int a = (10 + 5) * 2 - 3;\n\
             int b = 10 < 20;\n\
             int c = -(10 + 5);\n\
             int d = !(0);\n\
             int main() { return 0; }",
        );
        assert_eq!(code.globals[0].data, vec![27]);
        assert_eq!(code.globals[1].data, vec![1]);
        assert_eq!(code.globals[2].data, vec![-15]);
        assert_eq!(code.globals[3].data, vec![1]);
    }

    #[test]
    fn test_global_address_constant() {
        let code = compile("int target = 9;\nint* p = &target;\nint main() { return 0; }");
        assert_eq!(code.globals[0].offset, 0);
        assert_eq!(code.globals[1].data, vec![GLOBAL_BASE]);
    }

    #[test]
    fn test_global_array_layout() {
        let code = compile(
            "int arr[3] = {1, 2};\nint after = 7;\nint main() { return 0; }",
        );
        // arr occupies slots 0..3, the next global starts at 3, and the
        // VM zero-fills the missing third element.
        assert_eq!(code.globals[0].slots, 3);
        assert_eq!(code.globals[0].data, vec![1, 2]);
        assert_eq!(code.globals[1].offset, 3);
    }

    #[test]
    fn test_const_division_by_zero_is_fatal() {
        let tokens = Lexer::new("int bad = 1 / 0;\nint main() { return 0; }").parse();
        let (mut program, _) = Parser::new(tokens.into_iter()).parse();
        let mut sema = Sema::new();
        assert!(sema.analyze(&mut program));
        let err = CodeGen::generate(&program).unwrap_err();
        assert!(matches!(err, CodegenError::ConstDivisionByZero));
    }

    #[test]
    fn test_uninitialized_locals_are_zero_pushed() {
        let code = compile("int main() { int x; return x; }");
        assert!(code.code.contains(&Op::PUSH(0)));
    }

    #[test]
    fn test_block_exit_retracts_locals() {
        let code = compile("int main() { { int a = 1; int b = 2; } return 0; }");
        assert!(code.code.contains(&Op::ADJSP(2)));
    }

    #[test]
    fn test_struct_copy_uses_memcpy() {
        let code = compile(
            "struct P { int x; int y; };\n\
             int main() { struct P a; struct P b; b = a; return 0; }",
        );
        assert!(code.code.contains(&Op::MEMCPY(2)));
    }

    #[test]
    fn test_array_access_uses_scaled_index() {
        let code = compile(
            "struct P { int x; int y; };\n\
             int main() { struct P ps[4]; return ps[1].y; }",
        );
        // Element width 2 for the index step, member offset 1 for .y
        assert!(code.code.contains(&Op::ADDPTRD(2)));
        assert!(code.code.contains(&Op::ADDPTR(1)));
    }
}
