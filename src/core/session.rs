// This module provides the compilation session that drives blang over one or more source
// files. CompilationSession owns the options, the CompilationContext holding the module
// under construction, and the statistics gathered along the way. Sources are compiled in
// the order they are added, all into the same module, so functions defined in one file can
// be called from the next. Errors raised inside a file are tagged with the file name and
// the line the lexer had reached. Once every file is compiled the session hands back the
// finished module, whose Display implementation is the LLVM IR text.

//! Compilation session and statistics.

use super::error::{CompileError, CompileResult};
use crate::frontend::{compile_declarations, CompilationContext, Lexer};
use crate::ir::Module;
use log::{debug, info};
use std::fmt;
use std::path::Path;

/// Options that shape the generated module.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Bytes per word; words are `i{8 * word_size}` in the IR.
    pub word_size: usize,
    /// Name recorded as the module id.
    pub module_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            word_size: 8,
            module_name: "b".to_string(),
        }
    }
}

/// Compilation session over any number of sources.
pub struct CompilationSession {
    options: CompileOptions,
    context: CompilationContext,
    stats: SessionStats,
}

impl CompilationSession {
    pub fn new(options: CompileOptions) -> Self {
        let context = CompilationContext::new(&options.module_name, options.word_size);
        Self {
            options,
            context,
            stats: SessionStats::default(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile B source text; `name` is used in error messages.
    pub fn compile_source(&mut self, name: &str, source: &str) -> CompileResult<()> {
        info!("Compiling {name}");
        let functions_before = self.defined_functions();
        let mut lexer = Lexer::new(source, self.options.word_size);
        compile_declarations(&mut self.context, &mut lexer)
            .map_err(|e| e.located(name, lexer.line()))?;

        self.stats.files_compiled += 1;
        self.stats.lines_read += lexer.line();
        debug!(
            "{name}: {} new functions",
            self.defined_functions() - functions_before
        );
        Ok(())
    }

    /// Read and compile a source file.
    pub fn compile_file(&mut self, path: &Path) -> CompileResult<()> {
        let source = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile_source(&path.display().to_string(), &source)
    }

    fn defined_functions(&self) -> usize {
        self.context
            .module()
            .functions()
            .iter()
            .filter(|f| !f.is_declaration())
            .count()
    }

    pub fn module(&self) -> &Module {
        self.context.module()
    }

    /// Statistics including the current shape of the module.
    pub fn stats(&self) -> SessionStats {
        let module = self.context.module();
        let mut stats = self.stats.clone();
        stats.functions_defined = 0;
        stats.functions_declared = 0;
        for f in module.functions() {
            if f.is_declaration() {
                stats.functions_declared += 1;
            } else {
                stats.functions_defined += 1;
                stats.blocks += f.blocks.len();
                stats.instructions += f.instruction_count();
                if f.instruction_count() > stats.largest_function_size {
                    stats.largest_function_size = f.instruction_count();
                    stats.largest_function_name = f.name.clone();
                }
            }
        }
        stats.globals = module.globals().len();
        stats.strings = module.strings().len();
        stats
    }

    /// Finish the session and return the module.
    pub fn finish(self) -> Module {
        info!("{}", self.stats().summary());
        self.context.into_module()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Source files (or strings) compiled.
    pub files_compiled: usize,

    /// Source lines read.
    pub lines_read: usize,

    /// Functions with a body.
    pub functions_defined: usize,

    /// External functions declared automatically.
    pub functions_declared: usize,

    pub globals: usize,
    pub strings: usize,
    pub blocks: usize,

    /// Instructions including terminators.
    pub instructions: usize,

    /// Largest function by instruction count.
    pub largest_function_size: usize,
    pub largest_function_name: String,
}

impl SessionStats {
    fn summary(&self) -> String {
        format!(
            "{} files, {} functions, {} globals, {} instructions",
            self.files_compiled, self.functions_defined, self.globals, self.instructions
        )
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Files compiled: {}", self.files_compiled)?;
        writeln!(f, "  Lines read: {}", self.lines_read)?;
        writeln!(f, "  Functions defined: {}", self.functions_defined)?;
        writeln!(f, "  External functions: {}", self.functions_declared)?;
        writeln!(f, "  Globals: {}", self.globals)?;
        writeln!(f, "  Strings: {}", self.strings)?;
        writeln!(f, "  Blocks: {}", self.blocks)?;
        writeln!(f, "  Instructions: {}", self.instructions)?;
        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} instructions)",
                self.largest_function_name, self.largest_function_size
            )?;
        }
        Ok(())
    }
}
