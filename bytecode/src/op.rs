use serde::{Deserialize, Serialize};
use std::fmt;

/// One instruction of the stack machine. One slot = one 32-bit signed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    // stack
    PUSH(i32), // push literal
    POP,       // discard top

    // frame-relative variables
    LOAD(i32),  // push stack[fp + k]
    STORE(i32), // stack[fp + k] = pop()

    // tagged-address memory (stack below GLOBAL_BASE, globals above)
    LOADM,  // addr = pop(); push mem[addr]
    STOREM, // addr = pop(); v = pop(); mem[addr] = v

    // globals segment
    LOADG(i32),  // push globals[k]
    STOREG(i32), // globals[k] = pop()

    // address materialization
    LEA(i32),     // push fp + k
    LEAG(i32),    // push GLOBAL_BASE + k
    ADDPTR(i32),  // addr = pop(); push addr + k
    ADDPTRD(i32), // base = pop(); idx = pop(); push base + idx * k

    // arithmetic
    ADD,
    SUB,
    MUL,
    DIV,
    MOD,
    NEG,

    // comparison (result 1 or 0)
    EQ,
    NE,
    LT,
    LE,
    GT,
    GE,

    // logic (result 1 or 0)
    AND,
    OR,
    NOT,

    // control flow
    JMP(i32),
    JZ(i32),
    JNZ(i32),

    // calls
    CALL(i32), // push pc; push fp; fp = sp; pc = entry
    RET(i32),  // operand is the frame-relative return slot offset

    // stack adjustment and block copy
    ADJSP(i32),  // sp -= k
    MEMCPY(i32), // dst = pop(); src = pop(); copy k slots
    HALT,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::PUSH(n) => write!(f, "PUSH {}", n),
            Op::POP => write!(f, "POP"),
            Op::LOAD(k) => write!(f, "LOAD {}", k),
            Op::STORE(k) => write!(f, "STORE {}", k),
            Op::LOADM => write!(f, "LOADM"),
            Op::STOREM => write!(f, "STOREM"),
            Op::LOADG(k) => write!(f, "LOADG {}", k),
            Op::STOREG(k) => write!(f, "STOREG {}", k),
            Op::LEA(k) => write!(f, "LEA {}", k),
            Op::LEAG(k) => write!(f, "LEAG {}", k),
            Op::ADDPTR(k) => write!(f, "ADDPTR {}", k),
            Op::ADDPTRD(k) => write!(f, "ADDPTRD {}", k),
            Op::ADD => write!(f, "ADD"),
            Op::SUB => write!(f, "SUB"),
            Op::MUL => write!(f, "MUL"),
            Op::DIV => write!(f, "DIV"),
            Op::MOD => write!(f, "MOD"),
            Op::NEG => write!(f, "NEG"),
            Op::EQ => write!(f, "EQ"),
            Op::NE => write!(f, "NE"),
            Op::LT => write!(f, "LT"),
            Op::LE => write!(f, "LE"),
            Op::GT => write!(f, "GT"),
            Op::GE => write!(f, "GE"),
            Op::AND => write!(f, "AND"),
            Op::OR => write!(f, "OR"),
            Op::NOT => write!(f, "NOT"),
            Op::JMP(k) => write!(f, "JMP {}", k),
            Op::JZ(k) => write!(f, "JZ {}", k),
            Op::JNZ(k) => write!(f, "JNZ {}", k),
            Op::CALL(k) => write!(f, "CALL {}", k),
            Op::RET(k) => write!(f, "RET {}", k),
            Op::ADJSP(k) => write!(f, "ADJSP {}", k),
            Op::MEMCPY(k) => write!(f, "MEMCPY {}", k),
            Op::HALT => write!(f, "HALT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_operand() {
        assert_eq!(Op::PUSH(42).to_string(), "PUSH 42");
        assert_eq!(Op::RET(-3).to_string(), "RET -3");
        assert_eq!(Op::ADDPTRD(2).to_string(), "ADDPTRD 2");
    }

    #[test]
    fn test_display_without_operand() {
        assert_eq!(Op::ADD.to_string(), "ADD");
        assert_eq!(Op::MEMCPY(4).to_string(), "MEMCPY 4");
        assert_eq!(Op::HALT.to_string(), "HALT");
    }
}
