//! blang - a single-pass B compiler emitting LLVM IR.
//!
//! B has one type, the machine word. blang reads B source one character at a
//! time and emits a control-flow graph of basic blocks while it parses, with no
//! syntax tree in between. The result is an LLVM IR module in text form that
//! `llc`/`clang` can turn into an object file.
//!
//! # Primary Usage
//!
//! ```
//! use blang::{CompilationSession, CompileOptions};
//!
//! let mut session = CompilationSession::new(CompileOptions::default());
//! session.compile_source("hello.b", "main() { return (42); }")?;
//! let ir = session.finish().to_string();
//! assert!(ir.contains("define i64 @main()"));
//! # Ok::<(), blang::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`frontend`] - lexer, declaration/statement/expression compilers
//! - [`ir`] - word-typed CFG model and the LLVM text printer
//! - [`core`] - errors and the compilation session

pub mod core;
pub mod frontend;
pub mod ir;

pub use crate::core::{
    CompilationSession, CompileError, CompileOptions, CompileResult, SessionStats,
};
pub use crate::ir::Module;

/// Compile a single source with default options.
pub fn compile_source(source: &str) -> CompileResult<Module> {
    let mut session = CompilationSession::new(CompileOptions::default());
    session.compile_source("<input>", source)?;
    Ok(session.finish())
}

/// Compile a single source and return the LLVM IR text.
pub fn compile_to_ir(source: &str) -> CompileResult<String> {
    compile_source(source).map(|module| module.to_string())
}
