use bytecode::{Op, Program, GLOBAL_BASE};
use thiserror::Error;

pub const STACK_SIZE: usize = 4096;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("out of bounds memory access at address {0:#x}")]
    OutOfBounds(i32),

    #[error("no entry point (main function)")]
    NoEntryPoint,

    #[error("program counter out of range: {0}")]
    PcOutOfRange(usize),
}

/// The stack machine. `stack[sp]` is the next free slot; `fp` points one
/// past the saved frame pointer of the current activation record.
pub struct Vm {
    stack: Vec<i32>,
    globals: Vec<i32>,
    sp: usize,
    fp: usize,
    pc: usize,
    running: bool,
    debug: bool,
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            stack: vec![0; STACK_SIZE],
            globals: Vec::new(),
            sp: 0,
            fp: 0,
            pc: 0,
            running: false,
            debug: false,
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }
}

// Memory access
impl Vm {
    fn push(&mut self, val: i32) -> Result<(), RuntimeError> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = val;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<i32, RuntimeError> {
        if self.sp == 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }

    fn frame_slot(&self, offset: i32) -> Result<usize, RuntimeError> {
        let idx = self.fp as i32 + offset;
        if idx < 0 || idx as usize >= STACK_SIZE {
            return Err(RuntimeError::OutOfBounds(idx));
        }
        Ok(idx as usize)
    }

    /// Tagged-address read used by LOADM and MEMCPY.
    fn read(&self, addr: i32) -> Result<i32, RuntimeError> {
        if addr >= GLOBAL_BASE {
            let idx = (addr - GLOBAL_BASE) as usize;
            self.globals
                .get(idx)
                .copied()
                .ok_or(RuntimeError::OutOfBounds(addr))
        } else if addr >= 0 && (addr as usize) < STACK_SIZE {
            Ok(self.stack[addr as usize])
        } else {
            Err(RuntimeError::OutOfBounds(addr))
        }
    }

    /// Tagged-address write used by STOREM and MEMCPY.
    fn write(&mut self, addr: i32, val: i32) -> Result<(), RuntimeError> {
        if addr >= GLOBAL_BASE {
            let idx = (addr - GLOBAL_BASE) as usize;
            match self.globals.get_mut(idx) {
                Some(slot) => *slot = val,
                None => return Err(RuntimeError::OutOfBounds(addr)),
            }
        } else if addr >= 0 && (addr as usize) < STACK_SIZE {
            self.stack[addr as usize] = val;
        } else {
            return Err(RuntimeError::OutOfBounds(addr));
        }
        Ok(())
    }
}

impl Vm {
    /// Execute a program from its entry point and return the exit value.
    pub fn run(&mut self, program: &Program) -> Result<i32, RuntimeError> {
        let entry = program.entry.ok_or(RuntimeError::NoEntryPoint)?;

        // Globals segment: explicit words first, zero-fill up to each width.
        self.globals.clear();
        for init in &program.globals {
            self.globals.resize(init.offset, 0);
            self.globals.extend_from_slice(&init.data);
            self.globals.resize(init.offset + init.slots, 0);
        }

        // Synthetic outer frame calling main: return slot, sentinel
        // return address, saved fp.
        self.sp = 0;
        self.push(0)?;
        self.push(-1)?;
        self.push(0)?;
        self.fp = self.sp;
        self.pc = entry;
        self.running = true;

        while self.running {
            if self.pc >= program.code.len() {
                return Err(RuntimeError::PcOutOfRange(self.pc));
            }
            let op = program.code[self.pc];

            if self.debug {
                eprintln!(
                    "[{:>4}] {:<12} sp={} fp={}",
                    self.pc,
                    op.to_string(),
                    self.sp,
                    self.fp
                );
            }

            self.pc += 1;
            self.step(op)?;
        }

        Ok(if self.sp > 0 { self.stack[self.sp - 1] } else { 0 })
    }

    fn step(&mut self, op: Op) -> Result<(), RuntimeError> {
        match op {
            Op::PUSH(n) => self.push(n)?,
            Op::POP => {
                self.pop()?;
            }

            Op::LOAD(k) => {
                let v = self.stack[self.frame_slot(k)?];
                self.push(v)?;
            }
            Op::STORE(k) => {
                let idx = self.frame_slot(k)?;
                self.stack[idx] = self.pop()?;
            }

            Op::LOADM => {
                let addr = self.pop()?;
                let v = self.read(addr)?;
                self.push(v)?;
            }
            Op::STOREM => {
                let addr = self.pop()?;
                let v = self.pop()?;
                self.write(addr, v)?;
            }

            Op::LOADG(k) => {
                let v = self.read(GLOBAL_BASE + k)?;
                self.push(v)?;
            }
            Op::STOREG(k) => {
                let v = self.pop()?;
                self.write(GLOBAL_BASE + k, v)?;
            }

            Op::LEA(k) => {
                let addr = self.fp as i32 + k;
                self.push(addr)?;
            }
            Op::LEAG(k) => self.push(GLOBAL_BASE + k)?,
            Op::ADDPTR(k) => {
                let addr = self.pop()?;
                self.push(addr + k)?;
            }
            Op::ADDPTRD(k) => {
                let base = self.pop()?;
                let idx = self.pop()?;
                self.push(base + idx * k)?;
            }

            Op::ADD => self.binary(|a, b| a.wrapping_add(b))?,
            Op::SUB => self.binary(|a, b| a.wrapping_sub(b))?,
            Op::MUL => self.binary(|a, b| a.wrapping_mul(b))?,
            Op::DIV => {
                let b = self.pop()?;
                let a = self.pop()?;
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                self.push(a.wrapping_div(b))?;
            }
            Op::MOD => {
                let b = self.pop()?;
                let a = self.pop()?;
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                self.push(a.wrapping_rem(b))?;
            }
            Op::NEG => {
                let v = self.pop()?;
                self.push(v.wrapping_neg())?;
            }

            Op::EQ => self.binary(|a, b| (a == b) as i32)?,
            Op::NE => self.binary(|a, b| (a != b) as i32)?,
            Op::LT => self.binary(|a, b| (a < b) as i32)?,
            Op::LE => self.binary(|a, b| (a <= b) as i32)?,
            Op::GT => self.binary(|a, b| (a > b) as i32)?,
            Op::GE => self.binary(|a, b| (a >= b) as i32)?,

            Op::AND => self.binary(|a, b| (a != 0 && b != 0) as i32)?,
            Op::OR => self.binary(|a, b| (a != 0 || b != 0) as i32)?,
            Op::NOT => {
                let v = self.pop()?;
                self.push((v == 0) as i32)?;
            }

            Op::JMP(k) => self.pc = k as usize,
            Op::JZ(k) => {
                if self.pop()? == 0 {
                    self.pc = k as usize;
                }
            }
            Op::JNZ(k) => {
                if self.pop()? != 0 {
                    self.pc = k as usize;
                }
            }

            Op::CALL(entry) => {
                self.push(self.pc as i32)?;
                self.push(self.fp as i32)?;
                self.fp = self.sp;
                self.pc = entry as usize;
            }

            Op::RET(ret_slot_offset) => {
                let v = if self.sp > self.fp { self.pop()? } else { 0 };
                let idx = self.frame_slot(ret_slot_offset)?;
                self.stack[idx] = v;

                self.sp = self.fp;
                self.fp = self.pop()? as usize;
                let ret_addr = self.pop()?;
                if ret_addr == -1 {
                    self.running = false;
                } else {
                    self.pc = ret_addr as usize;
                }
            }

            Op::ADJSP(k) => {
                let new_sp = self.sp as i32 - k;
                if new_sp < 0 {
                    return Err(RuntimeError::StackUnderflow);
                }
                if new_sp as usize > STACK_SIZE {
                    return Err(RuntimeError::StackOverflow);
                }
                self.sp = new_sp as usize;
            }

            Op::MEMCPY(k) => {
                let dst = self.pop()?;
                let src = self.pop()?;
                for i in 0..k {
                    let v = self.read(src + i)?;
                    self.write(dst + i, v)?;
                }
            }

            Op::HALT => self.running = false,
        }
        Ok(())
    }

    fn binary(&mut self, f: impl Fn(i32, i32) -> i32) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b))
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::GlobalVarInit;

    fn program(code: Vec<Op>) -> Program {
        let mut prog = Program::new();
        prog.code = code;
        prog.functions.insert("main".to_string(), 0);
        prog.entry = Some(0);
        prog
    }

    fn run(code: Vec<Op>) -> Result<i32, RuntimeError> {
        Vm::new().run(&program(code))
    }

    #[test]
    fn test_push_ret() {
        assert_eq!(run(vec![Op::PUSH(42), Op::RET(-3)]), Ok(42));
    }

    #[test]
    fn test_arithmetic() {
        let result = run(vec![
            Op::PUSH(10),
            Op::PUSH(3),
            Op::SUB,
            Op::PUSH(2),
            Op::MUL,
            Op::RET(-3),
        ]);
        assert_eq!(result, Ok(14));
    }

    #[test]
    fn test_modulo() {
        assert_eq!(run(vec![Op::PUSH(17), Op::PUSH(5), Op::MOD, Op::RET(-3)]), Ok(2));
    }

    #[test]
    fn test_division_by_zero() {
        let result = run(vec![Op::PUSH(1), Op::PUSH(0), Op::DIV, Op::RET(-3)]);
        assert_eq!(result, Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_no_entry_point() {
        let mut prog = Program::new();
        prog.code = vec![Op::HALT];
        assert_eq!(Vm::new().run(&prog), Err(RuntimeError::NoEntryPoint));
    }

    #[test]
    fn test_pc_out_of_range() {
        // Running off the end of the code vector is a bug, not a halt.
        let result = run(vec![Op::PUSH(1)]);
        assert_eq!(result, Err(RuntimeError::PcOutOfRange(1)));
    }

    #[test]
    fn test_stack_underflow() {
        // The synthetic frame leaves three slots; a fourth POP underflows.
        let result = run(vec![Op::POP, Op::POP, Op::POP, Op::POP, Op::RET(-3)]);
        assert_eq!(result, Err(RuntimeError::StackUnderflow));
    }

    #[test]
    fn test_stack_overflow() {
        // PUSH forever.
        let result = run(vec![Op::PUSH(1), Op::JMP(0)]);
        assert_eq!(result, Err(RuntimeError::StackOverflow));
    }

    #[test]
    fn test_globals_zero_fill() {
        let mut prog = program(vec![Op::LOADG(2), Op::RET(-3)]);
        prog.globals.push(GlobalVarInit {
            name: "arr".to_string(),
            offset: 0,
            slots: 3,
            data: vec![7],
        });
        assert_eq!(Vm::new().run(&prog), Ok(0));

        prog.code = vec![Op::LOADG(0), Op::RET(-3)];
        assert_eq!(Vm::new().run(&prog), Ok(7));
    }

    #[test]
    fn test_loadm_storem_global_tag() {
        // Write through a tagged global address, read it back with LOADG.
        let mut prog = program(vec![
            Op::PUSH(99),
            Op::LEAG(1),
            Op::STOREM,
            Op::LOADG(1),
            Op::RET(-3),
        ]);
        prog.globals.push(GlobalVarInit {
            name: "g".to_string(),
            offset: 0,
            slots: 2,
            data: vec![],
        });
        assert_eq!(Vm::new().run(&prog), Ok(99));
    }

    #[test]
    fn test_memcpy_stack_to_stack() {
        let result = run(vec![
            Op::PUSH(1),
            Op::PUSH(2), // locals at fp+0, fp+1
            Op::PUSH(0),
            Op::PUSH(0), // destination at fp+2, fp+3
            Op::LEA(0),
            Op::LEA(2),
            Op::MEMCPY(2),
            Op::LOAD(2),
            Op::LOAD(3),
            Op::ADD,
            Op::RET(-3),
        ]);
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_memcpy_stack_to_globals_and_back() {
        let mut prog = program(vec![
            Op::PUSH(5),
            Op::PUSH(6),
            Op::LEA(0),
            Op::LEAG(0),
            Op::MEMCPY(2), // stack -> globals
            Op::PUSH(0),
            Op::PUSH(0),
            Op::LEAG(0),
            Op::LEA(2),
            Op::MEMCPY(2), // globals -> stack
            Op::LOAD(2),
            Op::LOAD(3),
            Op::ADD,
            Op::RET(-3),
        ]);
        prog.globals.push(GlobalVarInit {
            name: "pair".to_string(),
            offset: 0,
            slots: 2,
            data: vec![],
        });
        assert_eq!(Vm::new().run(&prog), Ok(11));
    }

    #[test]
    fn test_memcpy_globals_to_globals() {
        let mut prog = program(vec![
            Op::LEAG(0),
            Op::LEAG(2),
            Op::MEMCPY(2),
            Op::LOADG(2),
            Op::LOADG(3),
            Op::ADD,
            Op::RET(-3),
        ]);
        prog.globals.push(GlobalVarInit {
            name: "a".to_string(),
            offset: 0,
            slots: 2,
            data: vec![20, 30],
        });
        prog.globals.push(GlobalVarInit {
            name: "b".to_string(),
            offset: 2,
            slots: 2,
            data: vec![],
        });
        assert_eq!(Vm::new().run(&prog), Ok(50));
    }

    #[test]
    fn test_memcpy_out_of_bounds() {
        let result = run(vec![
            Op::LEAG(0), // no globals allocated
            Op::LEA(0),
            Op::MEMCPY(1),
            Op::RET(-3),
        ]);
        assert_eq!(result, Err(RuntimeError::OutOfBounds(GLOBAL_BASE)));
    }

    #[test]
    fn test_call_ret_frame_discipline() {
        // main: push ret slot, call f, clean no params, return f's value.
        // f: return 5 into the caller-reserved slot.
        let code = vec![
            // main @ 0
            Op::PUSH(0),  // ret slot for f
            Op::CALL(4),  // call f
            Op::RET(-3),  // f's value is on top
            Op::HALT,     // unreachable
            // f @ 4
            Op::PUSH(5),
            Op::RET(-3),
        ];
        assert_eq!(run(code), Ok(5));
    }

    #[test]
    fn test_main_cleanup_leaves_return_slot_only() {
        let mut vm = Vm::new();
        let prog = program(vec![Op::PUSH(3), Op::PUSH(4), Op::ADD, Op::RET(-3)]);
        assert_eq!(vm.run(&prog), Ok(7));
        // After main returns, only the outer return slot remains.
        assert_eq!(vm.sp, 1);
    }
}
