// This module implements the recursive-descent statement compiler. Each statement form
// builds its part of the control-flow graph as it is parsed: if, while and switch allocate
// a numbered group of blocks and leave the insertion point in their end block, goto and
// labels share lazily created label blocks, and case labels record their block in the
// enclosing SwitchContext so the switch can emit its dispatch once the body is done.
// Falling into a block only happens when the current block is still open, which keeps
// every block at exactly one terminator.

//! Statement compiler.

use super::builder::FunctionBuilder;
use super::lexer::{is_identifier_start, Lexer};
use crate::core::{CompileError, CompileResult, Found};
use crate::ir::{BlockId, Operand, Terminator};
use log::trace;

/// Cases collected while compiling the body of one switch.
#[derive(Debug)]
pub struct SwitchContext {
    id: u32,
    cases: Vec<(i64, BlockId)>,
}

impl<'c> FunctionBuilder<'c> {
    /// Compile one statement. `switch` is the innermost enclosing switch, if any.
    pub fn statement(
        &mut self,
        lx: &mut Lexer<'_>,
        mut switch: Option<&mut SwitchContext>,
    ) -> CompileResult<()> {
        lx.whitespace()?;
        match lx.peek_char() {
            None => Err(CompileError::expected("statement", Found::EndOfFile)),
            Some('{') => {
                lx.read_char();
                loop {
                    if lx.try_read('}')? {
                        return Ok(());
                    }
                    if lx.is_eof() {
                        return Err(CompileError::expected("'}' to close block", Found::EndOfFile));
                    }
                    self.statement(lx, switch.as_deref_mut())?;
                }
            }
            Some(';') => {
                lx.read_char();
                Ok(())
            }
            Some(c) if is_identifier_start(c) => {
                let word = lx.identifier()?;
                match word.as_str() {
                    "if" => self.if_statement(lx, switch),
                    "while" => self.while_statement(lx, switch),
                    "switch" => self.switch_statement(lx),
                    "case" => self.case_statement(lx, switch),
                    "goto" => self.goto_statement(lx),
                    "auto" => self.auto_statement(lx),
                    "extrn" => self.extrn_statement(lx),
                    "return" => self.return_statement(lx),
                    _ if lx.try_read(':')? => self.label_statement(lx, &word, switch),
                    _ => {
                        lx.unread_str(&word);
                        self.expression_statement(lx)
                    }
                }
            }
            Some(_) => self.expression_statement(lx),
        }
    }

    /// Statement following a label, which may be omitted right before `}`.
    fn labelled_statement(
        &mut self,
        lx: &mut Lexer<'_>,
        switch: Option<&mut SwitchContext>,
    ) -> CompileResult<()> {
        lx.whitespace()?;
        if lx.peek_char() == Some('}') {
            return Ok(());
        }
        self.statement(lx, switch)
    }

    fn expression_statement(&mut self, lx: &mut Lexer<'_>) -> CompileResult<()> {
        self.expression(lx)?;
        lx.expect(';', "after expression statement")
    }

    fn if_statement(
        &mut self,
        lx: &mut Lexer<'_>,
        mut switch: Option<&mut SwitchContext>,
    ) -> CompileResult<()> {
        lx.expect('(', "after 'if'")?;
        let cond = self.expression(lx)?;
        lx.expect(')', "after if condition")?;

        let id = self.fresh_id();
        let then_block = self.new_block(format!("if.{id}.then"));
        let else_block = self.new_block(format!("if.{id}.else"));
        let end_block = self.new_block(format!("if.{id}.end"));
        self.cond_branch(cond, then_block, else_block)?;

        self.switch_to(then_block);
        self.statement(lx, switch.as_deref_mut())?;
        self.branch_if_open(end_block)?;

        self.switch_to(else_block);
        if lx.try_keyword("else")? {
            self.statement(lx, switch)?;
        }
        self.branch_if_open(end_block)?;

        self.switch_to(end_block);
        Ok(())
    }

    fn while_statement(
        &mut self,
        lx: &mut Lexer<'_>,
        switch: Option<&mut SwitchContext>,
    ) -> CompileResult<()> {
        let id = self.fresh_id();
        let cond_block = self.new_block(format!("while.{id}.cond"));
        let body_block = self.new_block(format!("while.{id}.body"));
        let end_block = self.new_block(format!("while.{id}.end"));
        self.branch_if_open(cond_block)?;

        self.switch_to(cond_block);
        lx.expect('(', "after 'while'")?;
        let cond = self.expression(lx)?;
        lx.expect(')', "after while condition")?;
        self.cond_branch(cond, body_block, end_block)?;

        self.switch_to(body_block);
        self.statement(lx, switch)?;
        self.branch_if_open(cond_block)?;

        self.switch_to(end_block);
        Ok(())
    }

    /// The block before the switch enters the dispatch block; the body is compiled
    /// into its own block and reached only through case labels.
    fn switch_statement(&mut self, lx: &mut Lexer<'_>) -> CompileResult<()> {
        let value = self.expression(lx)?;
        let id = self.fresh_id();
        let stmts_block = self.new_block(format!("switch.{id}.stmts"));
        let cmp_block = self.new_block(format!("switch.{id}.cmp"));
        let end_block = self.new_block(format!("switch.{id}.end"));
        self.branch_if_open(cmp_block)?;

        self.switch_to(stmts_block);
        let mut cases = SwitchContext {
            id,
            cases: Vec::new(),
        };
        self.statement(lx, Some(&mut cases))?;
        self.branch_if_open(end_block)?;

        self.switch_to(cmp_block);
        trace!("switch.{id}: {} cases", cases.cases.len());
        if cases.cases.is_empty() {
            self.branch(end_block)?;
        } else {
            self.terminate(Terminator::Switch {
                value,
                default: end_block,
                cases: cases.cases,
            })?;
        }

        self.switch_to(end_block);
        Ok(())
    }

    fn case_statement(
        &mut self,
        lx: &mut Lexer<'_>,
        switch: Option<&mut SwitchContext>,
    ) -> CompileResult<()> {
        let Some(ctx) = switch else {
            return Err(CompileError::CaseOutsideSwitch);
        };
        lx.whitespace()?;
        let value = match lx.read_char() {
            Some('\'') => lx.character()?,
            Some(c) if c.is_ascii_digit() => {
                lx.unread_char(c);
                lx.number()?
            }
            found => return Err(CompileError::expected("constant after 'case'", found)),
        };
        lx.expect(':', "after case constant")?;
        if ctx.cases.iter().any(|(v, _)| *v == value) {
            return Err(CompileError::DuplicateCase(value));
        }

        let block = self.new_block(format!("case.{}.{}", ctx.id, value));
        self.branch_if_open(block)?;
        self.switch_to(block);
        ctx.cases.push((value, block));
        self.labelled_statement(lx, Some(ctx))
    }

    fn goto_statement(&mut self, lx: &mut Lexer<'_>) -> CompileResult<()> {
        let name = lx.identifier()?;
        if name.is_empty() {
            let found = lx.peek_char();
            return Err(CompileError::expected("label name after 'goto'", found));
        }
        let target = self.label_block(&name);
        self.branch_if_open(target)?;

        let id = self.fresh_id();
        let rest = self.new_block(format!("unreachable.{id}"));
        self.switch_to(rest);
        lx.expect(';', "after goto")
    }

    fn label_statement(
        &mut self,
        lx: &mut Lexer<'_>,
        name: &str,
        switch: Option<&mut SwitchContext>,
    ) -> CompileResult<()> {
        let block = self.define_label(name)?;
        self.branch_if_open(block)?;
        self.switch_to(block);
        self.labelled_statement(lx, switch)
    }

    fn auto_statement(&mut self, lx: &mut Lexer<'_>) -> CompileResult<()> {
        loop {
            let name = lx.identifier()?;
            if name.is_empty() {
                let found = lx.peek_char();
                return Err(CompileError::expected("name in auto declaration", found));
            }
            if lx.try_read('[')? {
                let size = if lx.try_read(']')? {
                    0
                } else {
                    let size = if lx.try_read('\'')? {
                        lx.character()?
                    } else {
                        lx.number()?
                    };
                    lx.expect(']', "after array size")?;
                    size
                };
                self.declare_local_array(&name, size.max(0) as u64)?;
            } else {
                self.declare_local(&name)?;
            }
            lx.whitespace()?;
            match lx.read_char() {
                Some(',') => continue,
                Some(';') => return Ok(()),
                found => {
                    return Err(CompileError::expected("',' or ';' in auto declaration", found))
                }
            }
        }
    }

    fn extrn_statement(&mut self, lx: &mut Lexer<'_>) -> CompileResult<()> {
        loop {
            let name = lx.identifier()?;
            if name.is_empty() {
                let found = lx.peek_char();
                return Err(CompileError::expected("name in extrn declaration", found));
            }
            self.declare_extrn(&name)?;
            lx.whitespace()?;
            match lx.read_char() {
                Some(',') => continue,
                Some(';') => return Ok(()),
                found => {
                    return Err(CompileError::expected("',' or ';' in extrn declaration", found))
                }
            }
        }
    }

    fn return_statement(&mut self, lx: &mut Lexer<'_>) -> CompileResult<()> {
        lx.whitespace()?;
        match lx.read_char() {
            Some(';') => self.ret(Operand::Const(0)),
            Some('(') => {
                let value = self.expression(lx)?;
                lx.expect(')', "after return value")?;
                lx.expect(';', "after return")?;
                self.ret(value)
            }
            found => Err(CompileError::expected("'(' or ';' after 'return'", found)),
        }
    }
}
