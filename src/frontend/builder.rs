// This module implements the per-function half of code generation. A FunctionBuilder is
// created when the declaration compiler meets a function definition and lives until the
// closing statement has been compiled. It owns the insertion point, the local symbol table,
// the label table and the counter used to make control-flow block names unique. Every
// instruction goes through emit, which first makes sure the insertion block is still
// open: code that follows a return or goto lands in a fresh unreachable block instead of
// after a terminator. Name resolution lives here because locals shadow everything else.

//! Function builder: insertion point, locals, labels and instruction emission.

use super::context::CompilationContext;
use crate::core::{CompileError, CompileResult};
use crate::ir::{
    BinaryOp, BlockId, Callee, FuncId, Function, Instr, Operand, Predicate, Terminator,
};
use hashbrown::HashMap;
use log::{debug, info, trace};

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Plain word.
    Value(Operand),
    /// Pointer to a word; an lvalue.
    Address(Operand),
    /// Module function named directly.
    Function(String),
}

#[derive(Debug, Clone, Copy)]
struct LabelSlot {
    block: BlockId,
    defined: bool,
}

pub struct FunctionBuilder<'c> {
    ctx: &'c mut CompilationContext,
    id: FuncId,
    current: BlockId,
    locals: HashMap<String, Operand>,
    labels: HashMap<String, LabelSlot>,
    next_id: u32,
}

impl<'c> FunctionBuilder<'c> {
    /// Define `name`, open its entry block and spill every parameter to a stack slot.
    pub fn start(
        ctx: &'c mut CompilationContext,
        name: &str,
        params: Vec<String>,
    ) -> CompileResult<Self> {
        info!("function '{name}' with {} params", params.len());
        let id = ctx.module_mut().define_function(name, params.clone())?;
        let mut builder = Self {
            ctx,
            id,
            current: BlockId(0),
            locals: HashMap::new(),
            labels: HashMap::new(),
            next_id: 0,
        };
        for param in params {
            let slot = builder.alloca_local(&param, None)?;
            builder.store(Operand::Param(param), slot);
        }
        Ok(builder)
    }

    /// Check labels and close the last block with `ret 0` if it is still open.
    pub fn finish(mut self) -> CompileResult<FuncId> {
        let mut undefined: Vec<&String> = self
            .labels
            .iter()
            .filter(|(_, slot)| !slot.defined)
            .map(|(name, _)| name)
            .collect();
        undefined.sort();
        if let Some(name) = undefined.first() {
            return Err(CompileError::UndefinedLabel(name.to_string()));
        }
        if self.is_open() {
            self.ret(Operand::Const(0))?;
        }
        let id = self.id;
        let func = self.func();
        trace!(
            "function '{}' done: {} blocks, {} instructions",
            func.name,
            func.blocks.len(),
            func.instruction_count()
        );
        Ok(id)
    }

    fn func(&mut self) -> &mut Function {
        self.ctx.module_mut().function_mut(self.id)
    }

    /// Fresh number for a group of control-flow blocks.
    pub fn fresh_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn new_block(&mut self, name: impl Into<String>) -> BlockId {
        let name = name.into();
        trace!("  new block {name}");
        self.func().add_block(name)
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Move the insertion point to the end of `block`.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn is_open(&mut self) -> bool {
        let current = self.current;
        !self.func().block(current).is_terminated()
    }

    fn ensure_open(&mut self) {
        if !self.is_open() {
            let id = self.fresh_id();
            let block = self.new_block(format!("dead.{id}"));
            self.switch_to(block);
        }
    }

    fn emit(&mut self, make: impl FnOnce(u32) -> Instr) -> Operand {
        self.ensure_open();
        let current = self.current;
        let func = self.func();
        let dst = func.next_value();
        let instr = make(dst);
        trace!("  {instr:?}");
        func.push(current, instr);
        Operand::Value(dst)
    }

    pub fn terminate(&mut self, term: Terminator) -> CompileResult<()> {
        self.ensure_open();
        let current = self.current;
        trace!("  {term:?}");
        self.func().terminate(current, term)
    }

    pub fn branch(&mut self, target: BlockId) -> CompileResult<()> {
        self.terminate(Terminator::Br(target))
    }

    /// Fall through into `target` unless the current block already ended.
    pub fn branch_if_open(&mut self, target: BlockId) -> CompileResult<()> {
        if self.is_open() {
            self.branch(target)?;
        }
        Ok(())
    }

    /// Branch on `word != 0`.
    pub fn cond_branch(
        &mut self,
        word: Operand,
        then_block: BlockId,
        else_block: BlockId,
    ) -> CompileResult<()> {
        let cond = self.emit(|dst| Instr::Compare {
            dst,
            pred: Predicate::Ne,
            lhs: word,
            rhs: Operand::Const(0),
        });
        self.terminate(Terminator::CondBr { cond, then_block, else_block })
    }

    pub fn ret(&mut self, value: Operand) -> CompileResult<()> {
        self.terminate(Terminator::Ret(value))
    }

    pub fn load(&mut self, addr: Operand) -> Operand {
        self.emit(|dst| Instr::Load { dst, addr })
    }

    pub fn store(&mut self, value: Operand, addr: Operand) {
        self.ensure_open();
        let current = self.current;
        trace!("  store {value:?} -> {addr:?}");
        self.func().push(current, Instr::Store { value, addr });
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand) -> Operand {
        self.emit(|dst| Instr::Binary { dst, op, lhs, rhs })
    }

    /// Comparison widened to a word holding 0 or 1.
    pub fn compare(&mut self, pred: Predicate, lhs: Operand, rhs: Operand) -> Operand {
        let bit = self.emit(|dst| Instr::Compare { dst, pred, lhs, rhs });
        self.emit(|dst| Instr::ZeroExtend { dst, src: bit })
    }

    pub fn int_to_ptr(&mut self, src: Operand) -> Operand {
        self.emit(|dst| Instr::IntToPtr { dst, src })
    }

    pub fn ptr_to_int(&mut self, src: Operand) -> Operand {
        self.emit(|dst| Instr::PtrToInt { dst, src })
    }

    /// Address of the word `index` words after `base`.
    pub fn element_ptr(&mut self, base: Operand, index: Operand) -> Operand {
        self.emit(|dst| Instr::ElementPtr { dst, base, index })
    }

    pub fn call(&mut self, callee: Callee, args: Vec<Operand>) -> Operand {
        self.emit(|dst| Instr::Call { dst, callee, args })
    }

    pub fn phi(&mut self, incoming: Vec<(Operand, BlockId)>) -> Operand {
        self.emit(|dst| Instr::Phi { dst, incoming })
    }

    /// Address of a new string constant as a word.
    pub fn string(&mut self, text: &str) -> Operand {
        let name = self.ctx.intern_string(text);
        self.ptr_to_int(Operand::Symbol(name))
    }

    fn alloca_local(&mut self, name: &str, words: Option<u64>) -> CompileResult<Operand> {
        if self.locals.contains_key(name) {
            return Err(CompileError::Redeclared(name.to_string()));
        }
        let slot = self.func().push_alloca(words);
        self.locals.insert(name.to_string(), slot.clone());
        Ok(slot)
    }

    /// Zero-initialized word on the stack.
    pub fn declare_local(&mut self, name: &str) -> CompileResult<()> {
        let slot = self.alloca_local(name, None)?;
        self.store(Operand::Const(0), slot);
        Ok(())
    }

    /// `size` data words preceded by a slot holding the address of the first one.
    pub fn declare_local_array(&mut self, name: &str, size: u64) -> CompileResult<()> {
        let len = size.max(1) + 1;
        let slot = self.alloca_local(name, Some(len))?;
        let first = self.emit(|dst| Instr::ArrayElementPtr {
            dst,
            base: slot.clone(),
            len,
            index: 1,
        });
        let word = self.ptr_to_int(first);
        self.store(word, slot);
        Ok(())
    }

    /// Resolve a name used as a value: locals, then functions, then extrn-bound globals.
    pub fn resolve(&mut self, name: &str) -> CompileResult<Expr> {
        if let Some(slot) = self.locals.get(name) {
            return Ok(Expr::Address(slot.clone()));
        }
        if self.ctx.module().function_id(name).is_some() {
            let addr = self.ptr_to_int(Operand::symbol(name));
            return Ok(Expr::Value(addr));
        }
        if self.ctx.is_bound(name) {
            return Ok(Expr::Address(Operand::symbol(name)));
        }
        Err(CompileError::UndefinedIdentifier(name.to_string()))
    }

    /// Resolve a name used as a callee. Names holding a word (locals and globals) are
    /// called through that word; unknown names become external functions.
    pub fn resolve_callee(&mut self, name: &str) -> Expr {
        if let Some(slot) = self.locals.get(name) {
            return Expr::Address(slot.clone());
        }
        if self.ctx.module().function_id(name).is_some() {
            return Expr::Function(name.to_string());
        }
        if self.ctx.is_bound(name) || self.ctx.module().has_global(name) {
            return Expr::Address(Operand::symbol(name));
        }
        debug!("auto-declaring external function '{name}'");
        self.ctx.module_mut().declare_function(name);
        Expr::Function(name.to_string())
    }

    pub fn declare_extrn(&mut self, name: &str) -> CompileResult<()> {
        self.ctx.declare_extrn(name)
    }

    /// Block of a user label, created on first mention.
    pub fn label_block(&mut self, name: &str) -> BlockId {
        if let Some(slot) = self.labels.get(name) {
            return slot.block;
        }
        let block = self.new_block(format!("label.{name}"));
        self.labels.insert(
            name.to_string(),
            LabelSlot {
                block,
                defined: false,
            },
        );
        block
    }

    /// Mark a label as defined here and return its block.
    pub fn define_label(&mut self, name: &str) -> CompileResult<BlockId> {
        let block = self.label_block(name);
        match self.labels.get_mut(name) {
            Some(slot) if slot.defined => Err(CompileError::DuplicateLabel(name.to_string())),
            Some(slot) => {
                slot.defined = true;
                Ok(block)
            }
            None => Err(CompileError::Internal {
                reason: format!("label '{name}' vanished"),
            }),
        }
    }
}
