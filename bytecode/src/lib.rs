mod op;
mod program;

pub use op::Op;
pub use program::{GlobalVarInit, Program, GLOBAL_BASE};
