pub mod codegen;
pub mod error;
pub mod grammer;
pub mod scope;
pub mod sema;
pub mod types;

pub use codegen::CodeGen;
pub use error::Error;
pub use grammer::lexer::Lexer;
pub use grammer::parsercore::Parser;
pub use sema::Sema;
