// This module gathers the infrastructure shared by the whole compiler: the error type every
// stage returns and the compilation session that drives the front end over source files,
// owns the options and collects statistics about the generated module.

//! Core blang infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - `CompileError`, one variant per lexical, syntactic, semantic or I/O failure
//! - File and line attached to errors raised inside a source
//!
//! ## Session (`session`)
//! - `CompileOptions` (word size, module name)
//! - `CompilationSession` compiling several sources into one module
//! - `SessionStats` describing what was generated

pub mod error;
pub mod session;

pub use error::{CompileError, CompileResult, Found};
pub use session::{CompilationSession, CompileOptions, SessionStats};
