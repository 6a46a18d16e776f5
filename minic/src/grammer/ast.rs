use crate::types::Type;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Assign, // =
    Add,    // +
    Sub,    // -
    Mul,    // *
    Div,    // /
    Mod,    // %
    Eq,     // ==
    Ne,     // !=
    Lt,     // <
    Le,     // <=
    Gt,     // >
    Ge,     // >=
    And,    // &&
    Or,     // ||
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Pos,   // unary plus (+expr)
    Neg,   // unary minus (-expr)
    Not,   // logical not (!expr)
    Deref, // pointer dereference (*expr)
    Ref,   // address-of (&expr)
}

/// Expression node. `ty` starts empty and is filled in by the analyzer.
#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
    pub ty: Option<Rc<Type>>,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize) -> Self {
        Expr { kind, line, ty: None }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    Number(i32),                          // integer literal
    Variable(String),                     // identifier reference
    Binary(BinOp, Box<Expr>, Box<Expr>),  // lhs op rhs
    Unary(UnOp, Box<Expr>),               // op operand
    Call(String, Vec<Expr>),              // name(arg1, arg2, ...)
    Index(Box<Expr>, Box<Expr>),          // base[index]
    Member(Box<Expr>, String),            // base.field
    InitList(Vec<Expr>),                  // { e0, e1, ... }
}

/// Variable declaration, shared by globals and block-scoped locals.
#[derive(Debug)]
pub struct VarDecl {
    pub type_spec: String, // "int", "int*", "struct Point", ...
    pub name: String,
    pub dims: Vec<usize>, // array dimensions in source order
    pub init: Option<Expr>,
    pub line: usize,
    pub ty: Option<Rc<Type>>,
}

#[derive(Debug)]
pub enum Stmt {
    Block(Vec<Stmt>),            // { stmt* }
    VarDecl(VarDecl),            // type name[dims] [= init] ;
    Return(Option<Expr>, usize), // return [expr] ;
    If(Box<IfStmt>),             // if / else if / else chain
    While(Expr, Box<Stmt>),      // while (cond) body
    DoWhile(Box<Stmt>, Expr),    // do body while (cond) ;
    For(Box<ForStmt>),           // for (init; cond; step) body
    Break,
    Continue,
    Empty, // ;
    Expr(Expr),
}

#[derive(Debug)]
pub struct IfStmt {
    pub cond: Expr,
    pub then: Stmt,
    pub else_ifs: Vec<(Expr, Stmt)>,
    pub els: Option<Stmt>,
}

#[derive(Debug)]
pub struct ForStmt {
    pub init: Option<Stmt>,
    pub cond: Option<Expr>,
    pub step: Option<Expr>,
    pub body: Stmt,
}

#[derive(Debug)]
pub struct MemberDecl {
    pub type_spec: String,
    pub name: String,
    pub dims: Vec<usize>,
    pub line: usize,
}

#[derive(Debug)]
pub struct StructDecl {
    pub name: String,
    pub members: Vec<MemberDecl>,
    pub line: usize,
}

#[derive(Debug)]
pub struct Param {
    pub type_spec: String,
    pub name: String,
    pub ty: Option<Rc<Type>>,
}

#[derive(Debug)]
pub struct FuncDecl {
    pub ret_spec: String,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub line: usize,
    pub ret_ty: Option<Rc<Type>>,
}

/// Top-level declaration kind, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Struct,
    Global,
    Function,
}

#[derive(Debug, Default)]
pub struct Program {
    pub structs: Vec<StructDecl>,
    pub globals: Vec<VarDecl>,
    pub functions: Vec<FuncDecl>,
    pub order: Vec<DeclKind>,
}
