// This module is the top-level driver of the single pass. A B program is a sequence of
// declarations, each starting with a name: a '(' makes it a function definition, a '['
// an array global, anything else a scalar global with zero or more constant initializers.
// Initializers are limited to numbers, character literals and strings; a name is refused
// because there is no constant folding of addresses. After every declaration the extrn
// scope is cleared so bindings never carry over to the next one.

//! Declaration compiler.

use super::builder::FunctionBuilder;
use super::context::CompilationContext;
use super::lexer::{is_identifier_start, Lexer};
use crate::core::{CompileError, CompileResult};
use crate::ir::Constant;
use log::debug;

/// Compile every declaration until the end of the input.
pub fn compile_declarations(ctx: &mut CompilationContext, lx: &mut Lexer<'_>) -> CompileResult<()> {
    loop {
        let name = lx.identifier()?;
        if name.is_empty() {
            if lx.is_eof() {
                return Ok(());
            }
            let found = lx.peek_char();
            return Err(CompileError::expected("declaration name", found));
        }
        lx.whitespace()?;
        match lx.peek_char() {
            Some('(') => {
                lx.read_char();
                function(ctx, lx, &name)?;
            }
            Some('[') => {
                lx.read_char();
                array(ctx, lx, &name)?;
            }
            _ => scalar(ctx, lx, &name)?,
        }
        ctx.clear_declaration_scope();
    }
}

fn function(ctx: &mut CompilationContext, lx: &mut Lexer<'_>, name: &str) -> CompileResult<()> {
    let mut params = Vec::new();
    if !lx.try_read(')')? {
        loop {
            let param = lx.identifier()?;
            if param.is_empty() {
                let found = lx.peek_char();
                return Err(CompileError::expected("parameter name", found));
            }
            params.push(param);
            lx.whitespace()?;
            match lx.read_char() {
                Some(',') => continue,
                Some(')') => break,
                found => return Err(CompileError::expected("',' or ')' in parameter list", found)),
            }
        }
    }
    let mut builder = FunctionBuilder::start(ctx, name, params)?;
    builder.statement(lx, None)?;
    builder.finish()?;
    Ok(())
}

fn array(ctx: &mut CompilationContext, lx: &mut Lexer<'_>, name: &str) -> CompileResult<()> {
    let size = if lx.try_read(']')? {
        0
    } else {
        let size = lx.number()?;
        lx.expect(']', "after array size")?;
        size
    };
    let values = initializers(ctx, lx)?;
    ctx.declare_global_array(name, size.max(0) as u64, values)
}

fn scalar(ctx: &mut CompilationContext, lx: &mut Lexer<'_>, name: &str) -> CompileResult<()> {
    let mut values = initializers(ctx, lx)?;
    match values.len() {
        0 => ctx.declare_global(name, None),
        1 => ctx.declare_global(name, values.pop()),
        _ => ctx.declare_global_words(name, values),
    }
}

/// Comma-separated constants up to and including the closing `;`.
fn initializers(ctx: &mut CompilationContext, lx: &mut Lexer<'_>) -> CompileResult<Vec<Constant>> {
    let mut values = Vec::new();
    if lx.try_read(';')? {
        return Ok(values);
    }
    loop {
        values.push(initializer(ctx, lx)?);
        lx.whitespace()?;
        match lx.read_char() {
            Some(',') => continue,
            Some(';') => break,
            found => return Err(CompileError::expected("',' or ';' after initializer", found)),
        }
    }
    debug!("{} initializers", values.len());
    Ok(values)
}

fn initializer(ctx: &mut CompilationContext, lx: &mut Lexer<'_>) -> CompileResult<Constant> {
    lx.whitespace()?;
    match lx.read_char() {
        Some('\'') => Ok(Constant::Word(lx.character()?)),
        Some('"') => {
            let text = lx.string()?;
            Ok(Constant::Address(ctx.intern_string(&text)))
        }
        Some('-') => Ok(Constant::Word(lx.number()?.wrapping_neg())),
        Some(c) if c.is_ascii_digit() => {
            lx.unread_char(c);
            Ok(Constant::Word(lx.number()?))
        }
        Some(c) if is_identifier_start(c) => {
            lx.unread_char(c);
            let name = lx.identifier()?;
            Err(CompileError::UnsupportedInitializer(name))
        }
        found => Err(CompileError::expected("constant initializer", found)),
    }
}
