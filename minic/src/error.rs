use std::fmt;
use thiserror::Error;

// Main error type for the pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Runtime(#[from] vm::RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Parse errors
#[derive(Debug, Error, Clone)]
pub enum ParseError {
    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("line {1}: unexpected token `{0}`")]
    UnexpectedToken(String, usize),
}

// Semantic errors, collected as diagnostics without aborting
#[derive(Debug, Error, Clone)]
pub enum SemaError {
    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("duplicate declaration: {0}")]
    DuplicateDeclaration(String),

    #[error("undeclared name: {0}")]
    UndeclaredName(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("function `{name}` expects {expected} arguments, got {found}")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("`{0}` is not a function")]
    NotAFunction(String),

    #[error("assignment target must be a variable, array element, member access, or dereference")]
    InvalidLvalue,

    #[error("address-of requires an lvalue operand")]
    AddressOfNonLvalue,

    #[error("cannot dereference non-pointer type {0}")]
    InvalidDereference(String),

    #[error("initializer of global `{0}` is not a constant expression")]
    NonConstantGlobalInitializer(String),

    #[error("initializer for `{0}` does not fit its type: {1}")]
    InitializerShapeMismatch(String, String),

    #[error("void value used in expression")]
    VoidInExpression,

    #[error("variable `{0}` declared void")]
    VoidVariable(String),

    #[error("member access on non-struct type {0}")]
    NonStructMemberAccess(String),

    #[error("struct {0} has no member named {1}")]
    UnknownMember(String, String),

    #[error("type {0} cannot be indexed")]
    NotIndexable(String),

    #[error("array size must be positive for `{0}`")]
    ArraySizeNotPositive(String),

    #[error("return statement outside of a function")]
    ReturnOutsideFunction,

    #[error("void function returns a value")]
    VoidReturnsValue,

    #[error("non-void function returns no value")]
    MissingReturnValue,

    #[error("initializer list is only allowed in a variable declaration")]
    StrayInitializerList,
}

/// One collected semantic error with its source line (0 = unknown).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub error: SemaError,
    pub line: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "line {}: {}", self.line, self.error)
        } else {
            write!(f, "{}", self.error)
        }
    }
}

// Code generation errors, always fatal
#[derive(Debug, Error, Clone)]
pub enum CodegenError {
    #[error("type of `{0}` was not resolved")]
    UnresolvedType(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("division by zero in constant expression")]
    ConstDivisionByZero,

    #[error("global initializer for `{0}` is not a compile-time constant")]
    NonConstantInitializer(String),

    #[error("invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("invalid member access")]
    InvalidMemberAccess,

    #[error("struct-valued argument must be an addressable variable, member, or array element")]
    UnsupportedStructArgument,

    #[error("struct assignment source must be addressable or a function call")]
    UnsupportedStructSource,

    #[error("initializer list outside a variable declaration")]
    StrayInitializerList,
}
