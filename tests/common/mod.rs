// Shared helpers for the integration tests. Besides compiling sources and checking the IR
// text for patterns, this module contains a small interpreter for the IR model so tests can
// check what a compiled program computes without an LLVM toolchain. Memory is one flat byte
// vector: globals and strings are laid out first, followed by a fixed stack region in which
// slots are carved downward from the top and never freed. Addresses start at BASE so that small integers are never valid pointers. Functions
// get addresses in a separate range. A few runtime functions (printf, putchar, char) are
// built in and append to an output buffer.

//! Test helpers and a reference interpreter for compiled modules.

#![allow(dead_code)]

use blang::ir::{BinaryOp, BlockId, Callee, Constant, Function, GlobalInit, Instr, Module, Operand, Predicate, Terminator};
use blang::{CompilationSession, CompileError, CompileOptions};
use hashbrown::HashMap;

const BASE: i64 = 0x1_0000;
const FUNCTION_BASE: i64 = 0x7000_0000;
const FUEL: usize = 1_000_000;
const STACK_SIZE: usize = 1 << 20;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compile a source, panicking with the error message on failure.
pub fn compile(source: &str) -> Module {
    init_logging();
    let mut session = CompilationSession::new(CompileOptions::default());
    session
        .compile_source("test.b", source)
        .unwrap_or_else(|e| panic!("compilation failed: {e}\nsource:\n{source}"));
    session.finish()
}

/// Compile a source that must fail and return the error without its location.
pub fn compile_error(source: &str) -> CompileError {
    init_logging();
    let mut session = CompilationSession::new(CompileOptions::default());
    match session.compile_source("test.b", source) {
        Ok(()) => panic!("compilation unexpectedly succeeded:\n{source}"),
        Err(CompileError::Located { error, .. }) => *error,
        Err(e) => e,
    }
}

/// Helper to check if output contains expected patterns
pub fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Output missing expected pattern: '{pattern}'\nFull output:\n{output}"
        );
    }
}

/// Every block of every defined function ends in exactly one terminator whose targets
/// exist and are not the entry block.
pub fn assert_all_blocks_terminated(module: &Module) {
    for f in module.functions().iter().filter(|f| !f.is_declaration()) {
        for block in &f.blocks {
            let Some(term) = &block.terminator else {
                panic!("block '{}' of '{}' has no terminator\n{module}", block.name, f.name);
            };
            for target in term.successors() {
                assert!(
                    (target.0 as usize) < f.blocks.len() && target != BlockId(0),
                    "block '{}' of '{}' branches to invalid block {target:?}\n{module}",
                    block.name,
                    f.name
                );
            }
        }
    }
}

/// Run `main` of a source and return its result.
pub fn run_main(source: &str) -> i64 {
    run_main_with_output(source).0
}

/// Run `main` of a source and return its result and everything it printed.
pub fn run_main_with_output(source: &str) -> (i64, String) {
    let module = compile(source);
    assert_all_blocks_terminated(&module);
    let mut machine = Machine::new(&module);
    let result = machine.call("main", &[]);
    (result, machine.output)
}

pub struct Machine<'m> {
    module: &'m Module,
    memory: Vec<u8>,
    stack_pointer: i64,
    stack_limit: i64,
    symbols: HashMap<String, i64>,
    functions: HashMap<i64, &'m Function>,
    fuel: usize,
    pub output: String,
}

impl<'m> Machine<'m> {
    pub fn new(module: &'m Module) -> Self {
        let mut machine = Self {
            module,
            memory: Vec::new(),
            stack_pointer: 0,
            stack_limit: 0,
            symbols: HashMap::new(),
            functions: HashMap::new(),
            fuel: FUEL,
            output: String::new(),
        };
        machine.load_module();
        machine
    }

    fn word_bytes(&self) -> i64 {
        i64::from(self.module.word_bits / 8)
    }

    fn alloc(&mut self, bytes: usize) -> i64 {
        let addr = BASE + self.memory.len() as i64;
        let rounded = (bytes.max(1) + 7) & !7;
        self.memory.resize(self.memory.len() + rounded, 0);
        addr
    }

    /// Stack slot below the previous one, like a downward-growing frame.
    fn push_stack(&mut self, bytes: usize) -> i64 {
        let rounded = ((bytes.max(1) + 7) & !7) as i64;
        self.stack_pointer -= rounded;
        assert!(self.stack_pointer >= self.stack_limit, "stack overflow");
        self.stack_pointer
    }

    fn load_module(&mut self) {
        let module = self.module;
        let w = self.word_bytes() as usize;
        for (i, f) in module.functions().iter().enumerate() {
            let addr = FUNCTION_BASE + 16 * i as i64;
            self.symbols.insert(f.name.clone(), addr);
            self.functions.insert(addr, f);
        }
        for s in module.strings() {
            let addr = self.alloc(s.bytes.len() + 1);
            let start = (addr - BASE) as usize;
            self.memory[start..start + s.bytes.len()].copy_from_slice(&s.bytes);
            self.symbols.insert(s.name.clone(), addr);
        }
        for g in module.globals() {
            let words = match &g.init {
                GlobalInit::Word(_) | GlobalInit::Placeholder => 1,
                GlobalInit::Words(values) => values.len(),
                GlobalInit::Buffer { len, .. } => *len as usize,
            };
            let addr = self.alloc(words * w);
            self.symbols.insert(g.name.clone(), addr);
        }
        for g in module.globals() {
            let base = self.symbols[&g.name];
            let values: Vec<Constant> = match &g.init {
                GlobalInit::Word(c) => vec![c.clone()],
                GlobalInit::Words(values) | GlobalInit::Buffer { values, .. } => values.clone(),
                GlobalInit::Placeholder => Vec::new(),
            };
            for (i, c) in values.iter().enumerate() {
                let v = match c {
                    Constant::Word(v) => *v,
                    Constant::Address(name) => self.symbols[name],
                };
                self.store(base + (i * w) as i64, v);
            }
        }
        self.stack_limit = self.alloc(STACK_SIZE);
        self.stack_pointer = self.stack_limit + STACK_SIZE as i64;
    }

    fn index(&self, addr: i64, len: usize) -> usize {
        let start = addr - BASE;
        assert!(
            start >= 0 && start as usize + len <= self.memory.len(),
            "memory access out of bounds at {addr:#x}"
        );
        start as usize
    }

    pub fn load(&self, addr: i64) -> i64 {
        let start = self.index(addr, 8);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.memory[start..start + 8]);
        i64::from_le_bytes(bytes)
    }

    pub fn store(&mut self, addr: i64, value: i64) {
        let start = self.index(addr, 8);
        self.memory[start..start + 8].copy_from_slice(&value.to_le_bytes());
    }

    fn load_byte(&self, addr: i64) -> u8 {
        self.memory[self.index(addr, 1)]
    }

    pub fn c_string(&self, mut addr: i64) -> String {
        let mut out = String::new();
        loop {
            let b = self.load_byte(addr);
            if b == 0 {
                return out;
            }
            out.push(b as char);
            addr += 1;
        }
    }

    /// Address of a global or string symbol.
    pub fn symbol(&self, name: &str) -> i64 {
        self.symbols[name]
    }

    pub fn call(&mut self, name: &str, args: &[i64]) -> i64 {
        let addr = *self
            .symbols
            .get(name)
            .unwrap_or_else(|| panic!("no function '{name}'"));
        self.call_address(addr, args)
    }

    fn call_address(&mut self, addr: i64, args: &[i64]) -> i64 {
        let f = *self
            .functions
            .get(&addr)
            .unwrap_or_else(|| panic!("call through non-function address {addr:#x}"));
        if f.is_declaration() {
            self.runtime(&f.name, args)
        } else {
            self.run(f, args)
        }
    }

    fn runtime(&mut self, name: &str, args: &[i64]) -> i64 {
        let arg = |i: usize| args.get(i).copied().unwrap_or(0);
        match name {
            "putchar" => {
                self.output.push(arg(0) as u8 as char);
                arg(0)
            }
            "char" => i64::from(self.load_byte(arg(0) + arg(1))),
            "printf" => {
                let format = self.c_string(arg(0));
                let mut next = 1;
                let mut chars = format.chars();
                while let Some(c) = chars.next() {
                    if c != '%' {
                        self.output.push(c);
                        continue;
                    }
                    match chars.next() {
                        Some('d') => {
                            self.output.push_str(&arg(next).to_string());
                            next += 1;
                        }
                        Some('c') => {
                            self.output.push(arg(next) as u8 as char);
                            next += 1;
                        }
                        Some('s') => {
                            let s = self.c_string(arg(next));
                            self.output.push_str(&s);
                            next += 1;
                        }
                        Some(other) => self.output.push(other),
                        None => {}
                    }
                }
                0
            }
            other => panic!("unknown runtime function '{other}'"),
        }
    }

    fn run(&mut self, f: &'m Function, args: &[i64]) -> i64 {
        let mut values: HashMap<u32, i64> = HashMap::new();
        let params: HashMap<&str, i64> = f
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), args.get(i).copied().unwrap_or(0)))
            .collect();
        let mut current = BlockId(0);
        let mut previous: Option<BlockId> = None;
        loop {
            self.fuel = self
                .fuel
                .checked_sub(1)
                .unwrap_or_else(|| panic!("out of fuel in '{}'", f.name));
            let block = f.block(current);
            for instr in &block.instrs {
                self.step(f, instr, &mut values, &params, previous);
            }
            let eval = |op: &Operand, values: &HashMap<u32, i64>| self.operand(op, values, &params);
            let next = match block.terminator.as_ref() {
                Some(Terminator::Br(target)) => *target,
                Some(Terminator::CondBr { cond, then_block, else_block }) => {
                    if eval(cond, &values) != 0 {
                        *then_block
                    } else {
                        *else_block
                    }
                }
                Some(Terminator::Switch { value, default, cases }) => {
                    let v = eval(value, &values);
                    cases
                        .iter()
                        .find(|(c, _)| *c == v)
                        .map_or(*default, |(_, b)| *b)
                }
                Some(Terminator::Ret(value)) => return eval(value, &values),
                None => panic!("fell off block '{}' in '{}'", block.name, f.name),
            };
            previous = Some(current);
            current = next;
        }
    }

    fn operand(&self, op: &Operand, values: &HashMap<u32, i64>, params: &HashMap<&str, i64>) -> i64 {
        match op {
            Operand::Const(c) => *c,
            Operand::Value(v) => *values
                .get(v)
                .unwrap_or_else(|| panic!("use of undefined value %v{v}")),
            Operand::Param(name) => params[name.as_str()],
            Operand::Symbol(name) => *self
                .symbols
                .get(name)
                .unwrap_or_else(|| panic!("unknown symbol @{name}")),
        }
    }

    fn step(
        &mut self,
        f: &'m Function,
        instr: &Instr,
        values: &mut HashMap<u32, i64>,
        params: &HashMap<&str, i64>,
        previous: Option<BlockId>,
    ) {
        let w = self.word_bytes();
        let (dst, value) = match instr {
            Instr::Alloca { dst, words } => {
                let words = words.unwrap_or(1) as usize;
                (*dst, self.push_stack(words * w as usize))
            }
            Instr::Load { dst, addr } => (*dst, self.load(self.operand(addr, values, params))),
            Instr::Store { value, addr } => {
                let v = self.operand(value, values, params);
                let a = self.operand(addr, values, params);
                self.store(a, v);
                return;
            }
            Instr::Binary { dst, op, lhs, rhs } => {
                let l = self.operand(lhs, values, params);
                let r = self.operand(rhs, values, params);
                let v = match op {
                    BinaryOp::Add => l.wrapping_add(r),
                    BinaryOp::Sub => l.wrapping_sub(r),
                    BinaryOp::Mul => l.wrapping_mul(r),
                    BinaryOp::Div => l.wrapping_div(r),
                    BinaryOp::Rem => l.wrapping_rem(r),
                    BinaryOp::Shl => l.wrapping_shl(r as u32),
                    BinaryOp::Shr => l.wrapping_shr(r as u32),
                    BinaryOp::And => l & r,
                    BinaryOp::Or => l | r,
                };
                (*dst, v)
            }
            Instr::Compare { dst, pred, lhs, rhs } => {
                let l = self.operand(lhs, values, params);
                let r = self.operand(rhs, values, params);
                let v = match pred {
                    Predicate::Eq => l == r,
                    Predicate::Ne => l != r,
                    Predicate::Lt => l < r,
                    Predicate::Le => l <= r,
                    Predicate::Gt => l > r,
                    Predicate::Ge => l >= r,
                };
                (*dst, i64::from(v))
            }
            Instr::ZeroExtend { dst, src }
            | Instr::IntToPtr { dst, src }
            | Instr::PtrToInt { dst, src } => (*dst, self.operand(src, values, params)),
            Instr::ElementPtr { dst, base, index } => {
                let b = self.operand(base, values, params);
                let i = self.operand(index, values, params);
                (*dst, b.wrapping_add(i.wrapping_mul(w)))
            }
            Instr::ArrayElementPtr { dst, base, index, .. } => {
                let b = self.operand(base, values, params);
                (*dst, b + *index as i64 * w)
            }
            Instr::Call { dst, callee, args } => {
                let args: Vec<i64> = args.iter().map(|a| self.operand(a, values, params)).collect();
                let v = match callee {
                    Callee::Direct(name) => self.call(name, &args),
                    Callee::Indirect(ptr) => {
                        let addr = self.operand(ptr, values, params);
                        self.call_address(addr, &args)
                    }
                };
                (*dst, v)
            }
            Instr::Phi { dst, incoming } => {
                let from = previous.unwrap_or_else(|| panic!("phi in entry block of '{}'", f.name));
                let (v, _) = incoming
                    .iter()
                    .find(|(_, b)| *b == from)
                    .unwrap_or_else(|| panic!("phi without incoming value for {from:?}"));
                (*dst, self.operand(v, values, params))
            }
        };
        values.insert(dst, value);
    }
}
