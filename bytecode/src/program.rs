use crate::op::Op;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Addresses at or above this value refer to the globals segment:
/// `globals[addr - GLOBAL_BASE]`. Everything below is a stack slot.
pub const GLOBAL_BASE: i32 = 0x4000_0000;

/// Initialization record for one global variable. The VM appends
/// `data` and zero-fills the remainder up to `slots`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalVarInit {
    pub name: String,
    pub offset: usize,
    pub slots: usize,
    pub data: Vec<i32>,
}

/// A compiled program: the instruction stream, the function entry
/// table, the global initialization records, and the entry point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub code: Vec<Op>,
    pub functions: IndexMap<String, usize>,
    pub globals: Vec<GlobalVarInit>,
    pub entry: Option<usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, op: Op) {
        self.code.push(op);
    }

    /// Address of the next instruction to be emitted.
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Back-patch a forward jump emitted with a placeholder operand.
    pub fn patch(&mut self, at: usize, target: usize) {
        match &mut self.code[at] {
            Op::JMP(t) | Op::JZ(t) | Op::JNZ(t) => *t = target as i32,
            other => unreachable!("patch target {} is not a jump: {}", at, other),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, addr) in &self.functions {
            writeln!(f, "; {} @ {}", name, addr)?;
        }
        for (i, op) in self.code.iter().enumerate() {
            writeln!(f, "{}:\t{}", i, op)?;
        }
        Ok(())
    }
}
