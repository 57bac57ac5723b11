// This module renders the IR as LLVM assembly text. Words print as iN with N taken from the
// module, pointers are opaque. Values are named %vN, parameters %p.NAME, globals, strings and
// functions @NAME. Direct calls to external declarations use the variadic call form so any
// number of words can be passed; calls to defined functions use the exact argument list.
// Module layout: header, string constants, globals, external declarations, definitions.

//! LLVM IR text printer.

use super::*;
use std::fmt::{self, Display, Formatter, Write as _};

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(c) => write!(f, "{c}"),
            Operand::Value(v) => write!(f, "%v{v}"),
            Operand::Param(name) => write!(f, "%p.{name}"),
            Operand::Symbol(name) => write!(f, "@{name}"),
        }
    }
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "sdiv",
            BinaryOp::Rem => "srem",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "ashr",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl Predicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Predicate::Eq => "eq",
            Predicate::Ne => "ne",
            Predicate::Lt => "slt",
            Predicate::Le => "sle",
            Predicate::Gt => "sgt",
            Predicate::Ge => "sge",
        }
    }
}

/// Escape bytes for a `c"..."` literal.
fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (b.is_ascii_graphic() && b != b'"' && b != b'\\') || b == b' ' {
            out.push(b as char);
        } else {
            let _ = write!(out, "\\{b:02X}");
        }
    }
    out
}

struct Printer<'a, 'f> {
    module: &'a Module,
    word: String,
    out: &'a mut Formatter<'f>,
}

impl<'a, 'f> Printer<'a, 'f> {
    fn constant(&self, c: &Constant) -> String {
        match c {
            Constant::Word(v) => v.to_string(),
            Constant::Address(name) => format!("ptrtoint (ptr @{name} to {})", self.word),
        }
    }

    fn constant_list(&self, values: &[Constant], len: u64) -> String {
        let mut items: Vec<String> = values
            .iter()
            .map(|c| format!("{} {}", self.word, self.constant(c)))
            .collect();
        while (items.len() as u64) < len {
            items.push(format!("{} 0", self.word));
        }
        items.join(", ")
    }

    fn global(&mut self, g: &Global) -> fmt::Result {
        let w = &self.word;
        let line = match &g.init {
            GlobalInit::Word(c) => format!("global {w} {}", self.constant(c)),
            GlobalInit::Placeholder => format!("common global {w} 0"),
            GlobalInit::Words(values) => format!(
                "global [{} x {w}] [{}]",
                values.len(),
                self.constant_list(values, 0)
            ),
            GlobalInit::Buffer { len, values } if values.is_empty() => {
                format!("global [{len} x {w}] zeroinitializer")
            }
            GlobalInit::Buffer { len, values } => format!(
                "global [{len} x {w}] [{}]",
                self.constant_list(values, *len)
            ),
        };
        writeln!(self.out, "@{} = {line}", g.name)
    }

    fn callee(&self, callee: &Callee) -> String {
        match callee {
            Callee::Direct(name) => match self.module.function(name) {
                Some(f) if !f.is_declaration() => format!("@{name}"),
                _ => format!("(...) @{name}"),
            },
            Callee::Indirect(ptr) => format!("(...) {ptr}"),
        }
    }

    fn instr(&mut self, func: &Function, instr: &Instr) -> fmt::Result {
        let w = self.word.clone();
        let callee = match instr {
            Instr::Call { callee, .. } => self.callee(callee),
            _ => String::new(),
        };
        let out = &mut *self.out;
        match instr {
            Instr::Alloca { dst, words: None } => writeln!(out, "  %v{dst} = alloca {w}"),
            Instr::Alloca { dst, words: Some(n) } => {
                writeln!(out, "  %v{dst} = alloca [{n} x {w}]")
            }
            Instr::Load { dst, addr } => writeln!(out, "  %v{dst} = load {w}, ptr {addr}"),
            Instr::Store { value, addr } => writeln!(out, "  store {w} {value}, ptr {addr}"),
            Instr::Binary { dst, op, lhs, rhs } => {
                writeln!(out, "  %v{dst} = {} {w} {lhs}, {rhs}", op.mnemonic())
            }
            Instr::Compare { dst, pred, lhs, rhs } => {
                writeln!(out, "  %v{dst} = icmp {} {w} {lhs}, {rhs}", pred.mnemonic())
            }
            Instr::ZeroExtend { dst, src } => writeln!(out, "  %v{dst} = zext i1 {src} to {w}"),
            Instr::IntToPtr { dst, src } => writeln!(out, "  %v{dst} = inttoptr {w} {src} to ptr"),
            Instr::PtrToInt { dst, src } => writeln!(out, "  %v{dst} = ptrtoint ptr {src} to {w}"),
            Instr::ElementPtr { dst, base, index } => {
                writeln!(out, "  %v{dst} = getelementptr {w}, ptr {base}, {w} {index}")
            }
            Instr::ArrayElementPtr { dst, base, len, index } => writeln!(
                out,
                "  %v{dst} = getelementptr [{len} x {w}], ptr {base}, {w} 0, {w} {index}"
            ),
            Instr::Call { dst, args, .. } => {
                let args: Vec<String> = args.iter().map(|a| format!("{w} {a}")).collect();
                writeln!(out, "  %v{dst} = call {w} {callee}({})", args.join(", "))
            }
            Instr::Phi { dst, incoming } => {
                let arms: Vec<String> = incoming
                    .iter()
                    .map(|(v, b)| format!("[ {v}, %{} ]", func.block(*b).name))
                    .collect();
                writeln!(out, "  %v{dst} = phi {w} {}", arms.join(", "))
            }
        }
    }

    fn terminator(&mut self, func: &Function, term: &Terminator) -> fmt::Result {
        let w = &self.word;
        let name = |b: BlockId| func.block(b).name.as_str();
        match term {
            Terminator::Br(target) => writeln!(self.out, "  br label %{}", name(*target)),
            Terminator::CondBr { cond, then_block, else_block } => writeln!(
                self.out,
                "  br i1 {cond}, label %{}, label %{}",
                name(*then_block),
                name(*else_block)
            ),
            Terminator::Switch { value, default, cases } => {
                writeln!(self.out, "  switch {w} {value}, label %{} [", name(*default))?;
                for (v, b) in cases {
                    writeln!(self.out, "    {w} {v}, label %{}", name(*b))?;
                }
                writeln!(self.out, "  ]")
            }
            Terminator::Ret(value) => writeln!(self.out, "  ret {w} {value}"),
        }
    }

    fn function(&mut self, func: &Function) -> fmt::Result {
        let w = self.word.clone();
        let params: Vec<String> = func.params.iter().map(|p| format!("{w} %p.{p}")).collect();
        writeln!(self.out, "define {w} @{}({}) {{", func.name, params.join(", "))?;
        for (i, block) in func.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(self.out)?;
            }
            writeln!(self.out, "{}:", block.name)?;
            for instr in &block.instrs {
                self.instr(func, instr)?;
            }
            match &block.terminator {
                Some(term) => self.terminator(func, term)?,
                None => writeln!(self.out, "  unreachable")?,
            }
        }
        writeln!(self.out, "}}")
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut p = Printer {
            module: self,
            word: format!("i{}", self.word_bits),
            out: f,
        };
        writeln!(p.out, "; ModuleID = '{}'", self.name)?;
        writeln!(p.out, "source_filename = \"{}\"", escape_bytes(self.name.as_bytes()))?;

        if !self.strings.is_empty() {
            writeln!(p.out)?;
        }
        for s in &self.strings {
            writeln!(
                p.out,
                "@{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
                s.name,
                s.bytes.len() + 1,
                escape_bytes(&s.bytes)
            )?;
        }

        if !self.globals.is_empty() {
            writeln!(p.out)?;
        }
        for g in &self.globals {
            p.global(g)?;
        }

        let declarations: Vec<&Function> =
            self.functions.iter().filter(|f| f.is_declaration()).collect();
        if !declarations.is_empty() {
            writeln!(p.out)?;
        }
        for func in declarations {
            writeln!(p.out, "declare {} @{}(...)", p.word, func.name)?;
        }

        for func in self.functions.iter().filter(|f| !f.is_declaration()) {
            writeln!(p.out)?;
            p.function(func)?;
        }
        Ok(())
    }
}
