// This module defines the in-memory IR that the B code generator builds and the printer
// turns into LLVM assembly. The model is deliberately small because B has one type, the
// word: instructions operate on words or on pointers derived from words, and every value
// an instruction produces is numbered per function. A Module owns the functions, globals
// and string constants of a whole compilation. Functions own their blocks in an arena
// indexed by BlockId; a block holds its instructions and at most one terminator, and the
// Function API refuses to terminate a block twice. Stack slots are hoisted into the entry
// block so they dominate every use regardless of where the declaration appeared.

//! Word-typed control-flow-graph IR.

pub mod printer;

use crate::core::{CompileError, CompileResult};
use hashbrown::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub u32);

/// Instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Constant word.
    Const(i64),
    /// Result of an instruction in the current function.
    Value(u32),
    /// Incoming parameter by name.
    Param(String),
    /// Address of a global, string constant or function.
    Symbol(String),
}

impl Operand {
    pub fn symbol(name: impl Into<String>) -> Self {
        Operand::Symbol(name.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// Function of the module, by name.
    Direct(String),
    /// Pointer operand produced by `inttoptr`.
    Indirect(Operand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// Stack slot of `words` words; `None` is a single word.
    Alloca { dst: u32, words: Option<u64> },
    Load { dst: u32, addr: Operand },
    Store { value: Operand, addr: Operand },
    Binary { dst: u32, op: BinaryOp, lhs: Operand, rhs: Operand },
    /// Comparison producing an `i1`.
    Compare { dst: u32, pred: Predicate, lhs: Operand, rhs: Operand },
    /// Widen an `i1` to a word.
    ZeroExtend { dst: u32, src: Operand },
    IntToPtr { dst: u32, src: Operand },
    PtrToInt { dst: u32, src: Operand },
    /// Address of word `index` counted from `base`.
    ElementPtr { dst: u32, base: Operand, index: Operand },
    /// Address of word `index` inside a `[len x word]` stack array.
    ArrayElementPtr { dst: u32, base: Operand, len: u64, index: u64 },
    Call { dst: u32, callee: Callee, args: Vec<Operand> },
    Phi { dst: u32, incoming: Vec<(Operand, BlockId)> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Br(BlockId),
    CondBr { cond: Operand, then_block: BlockId, else_block: BlockId },
    Switch { value: Operand, default: BlockId, cases: Vec<(i64, BlockId)> },
    Ret(Operand),
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr { then_block, else_block, .. } => vec![*then_block, *else_block],
            Terminator::Switch { default, cases, .. } => {
                let mut succ = vec![*default];
                succ.extend(cases.iter().map(|(_, b)| *b));
                succ
            }
            Terminator::Ret(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub instrs: Vec<Instr>,
    pub terminator: Option<Terminator>,
}

impl Block {
    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    /// Empty for external declarations.
    pub blocks: Vec<Block>,
    next_value: u32,
    allocas: usize,
}

impl Function {
    fn new(name: &str, params: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            params,
            blocks: Vec::new(),
            next_value: 0,
            allocas: 0,
        }
    }

    /// External declarations have no body and accept any number of words.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_by_name(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.instrs.len() + usize::from(b.is_terminated()))
            .sum()
    }

    pub fn add_block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            name: name.into(),
            instrs: Vec::new(),
            terminator: None,
        });
        id
    }

    pub fn next_value(&mut self) -> u32 {
        let v = self.next_value;
        self.next_value += 1;
        v
    }

    pub fn push(&mut self, block: BlockId, instr: Instr) {
        self.blocks[block.0 as usize].instrs.push(instr);
    }

    /// Insert a stack slot after the previous ones at the top of the entry block.
    pub fn push_alloca(&mut self, words: Option<u64>) -> Operand {
        let dst = self.next_value();
        let at = self.allocas;
        self.blocks[0].instrs.insert(at, Instr::Alloca { dst, words });
        self.allocas += 1;
        Operand::Value(dst)
    }

    pub fn terminate(&mut self, block: BlockId, term: Terminator) -> CompileResult<()> {
        let b = &mut self.blocks[block.0 as usize];
        if b.terminator.is_some() {
            return Err(CompileError::Internal {
                reason: format!("block '{}' terminated twice", b.name),
            });
        }
        b.terminator = Some(term);
        Ok(())
    }
}

/// Compile-time constant used in global initializers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Word(i64),
    /// Address of a global or string constant converted to a word.
    Address(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalInit {
    /// One word.
    Word(Constant),
    /// `[n x word]` with explicit values.
    Words(Vec<Constant>),
    /// `[len x word]` buffer, zero-padded after `values`.
    Buffer { len: u64, values: Vec<Constant> },
    /// Zero word with common linkage, created by `extrn` for unknown names.
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub init: GlobalInit,
}

#[derive(Debug, Clone)]
pub struct StringConstant {
    pub name: String,
    /// Contents without the terminating NUL.
    pub bytes: Vec<u8>,
}

/// A whole compilation: functions, globals and strings.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub word_bits: u32,
    functions: Vec<Function>,
    function_index: HashMap<String, FuncId>,
    globals: Vec<Global>,
    global_index: HashMap<String, GlobalId>,
    strings: Vec<StringConstant>,
}

impl Module {
    pub fn new(name: &str, word_bits: u32) -> Self {
        Self {
            name: name.to_string(),
            word_bits,
            functions: Vec::new(),
            function_index: HashMap::new(),
            globals: Vec::new(),
            global_index: HashMap::new(),
            strings: Vec::new(),
        }
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    pub fn strings(&self) -> &[StringConstant] {
        &self.strings
    }

    pub fn function_id(&self, name: &str) -> Option<FuncId> {
        self.function_index.get(name).copied()
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.function_id(name).map(|id| &self.functions[id.0 as usize])
    }

    pub fn function_by_id(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.global_index
            .get(name)
            .map(|id| &self.globals[id.0 as usize])
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.global_index.contains_key(name)
    }

    /// Create or replace a function definition with an empty `entry` block.
    pub fn define_function(&mut self, name: &str, params: Vec<String>) -> CompileResult<FuncId> {
        if self.has_global(name) {
            return Err(CompileError::SymbolConflict(name.to_string(), "global"));
        }
        let mut function = Function::new(name, params);
        function.add_block("entry");
        Ok(self.insert_function(function))
    }

    /// Declare an external variadic function unless the name is already known.
    pub fn declare_function(&mut self, name: &str) -> FuncId {
        if let Some(id) = self.function_id(name) {
            return id;
        }
        self.insert_function(Function::new(name, Vec::new()))
    }

    fn insert_function(&mut self, function: Function) -> FuncId {
        if let Some(&id) = self.function_index.get(&function.name) {
            self.functions[id.0 as usize] = function;
            return id;
        }
        let id = FuncId(self.functions.len() as u32);
        self.function_index.insert(function.name.clone(), id);
        self.functions.push(function);
        id
    }

    /// Create or replace a global.
    pub fn define_global(&mut self, name: &str, init: GlobalInit) -> CompileResult<GlobalId> {
        if self.function_index.contains_key(name) {
            return Err(CompileError::SymbolConflict(name.to_string(), "function"));
        }
        let global = Global {
            name: name.to_string(),
            init,
        };
        if let Some(&id) = self.global_index.get(name) {
            self.globals[id.0 as usize] = global;
            return Ok(id);
        }
        let id = GlobalId(self.globals.len() as u32);
        self.global_index.insert(name.to_string(), id);
        self.globals.push(global);
        Ok(id)
    }

    /// Add a string constant and return its symbol name. Equal contents are not merged.
    pub fn add_string(&mut self, text: &str) -> String {
        let name = format!(".str.{}", self.strings.len());
        self.strings.push(StringConstant {
            name: name.clone(),
            bytes: text.as_bytes().to_vec(),
        });
        name
    }
}
