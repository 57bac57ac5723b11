// This module holds the module-level compilation state shared by every declaration: the IR
// module being built and the per-declaration scope of names bound by
// extrn. The scope is transient: the declaration compiler clears it after each top-level
// declaration so a name bound in one function does not leak into the next. Globals are
// created here in their three shapes (single word, consecutive words, pointer-prefixed
// buffer) plus the zero placeholder extrn creates for names the module does not know.

//! Module-level compilation context and global symbols.

use crate::core::{CompileError, CompileResult};
use crate::ir::{Constant, GlobalInit, Module};
use hashbrown::HashSet;
use log::debug;

pub struct CompilationContext {
    module: Module,
    scope: HashSet<String>,
}

impl CompilationContext {
    pub fn new(module_name: &str, word_size: usize) -> Self {
        Self {
            module: Module::new(module_name, (word_size * 8) as u32),
            scope: HashSet::new(),
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    /// Forget the extrn bindings of the declaration just compiled.
    pub fn clear_declaration_scope(&mut self) {
        self.scope.clear();
    }

    /// True when `name` was bound by extrn in the current declaration.
    pub fn is_bound(&self, name: &str) -> bool {
        self.scope.contains(name)
    }

    /// Bind `name` to external storage for the rest of the declaration. Function names
    /// need no binding; unknown names get a zero placeholder global.
    pub fn declare_extrn(&mut self, name: &str) -> CompileResult<()> {
        if self.scope.contains(name) || self.module.function_id(name).is_some() {
            return Ok(());
        }
        if !self.module.has_global(name) {
            debug!("extrn '{name}': creating placeholder global");
            self.module.define_global(name, GlobalInit::Placeholder)?;
        }
        self.scope.insert(name.to_string());
        Ok(())
    }

    /// Single-word global, zero when there is no initializer.
    pub fn declare_global(&mut self, name: &str, init: Option<Constant>) -> CompileResult<()> {
        debug!("global '{name}'");
        let init = init.unwrap_or(Constant::Word(0));
        self.module.define_global(name, GlobalInit::Word(init))?;
        Ok(())
    }

    /// Scalar global with several initializers laid out as consecutive words.
    pub fn declare_global_words(&mut self, name: &str, values: Vec<Constant>) -> CompileResult<()> {
        debug!("global '{name}' with {} words", values.len());
        self.module.define_global(name, GlobalInit::Words(values))?;
        Ok(())
    }

    /// Array global: a `NAME.data` buffer and the word `NAME` holding its address.
    /// The buffer holds at least `size` words and grows to fit the initializers.
    pub fn declare_global_array(
        &mut self,
        name: &str,
        size: u64,
        values: Vec<Constant>,
    ) -> CompileResult<()> {
        let len = size.max(values.len() as u64).max(1);
        debug!("global array '{name}' of {len} words");
        if self.module.function_id(name).is_some() {
            return Err(CompileError::SymbolConflict(name.to_string(), "function"));
        }
        let data = format!("{name}.data");
        self.module
            .define_global(&data, GlobalInit::Buffer { len, values })?;
        self.module
            .define_global(name, GlobalInit::Word(Constant::Address(data)))?;
        Ok(())
    }

    /// Add a string constant and return its symbol name.
    pub fn intern_string(&mut self, text: &str) -> String {
        self.module.add_string(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extrn_creates_placeholder_once() {
        let mut ctx = CompilationContext::new("t", 8);
        ctx.declare_extrn("x").unwrap();
        ctx.declare_extrn("x").unwrap();
        assert!(ctx.is_bound("x"));
        assert_eq!(ctx.module().globals().len(), 1);
        assert_eq!(ctx.module().global("x").unwrap().init, GlobalInit::Placeholder);
        ctx.clear_declaration_scope();
        assert!(!ctx.is_bound("x"));
    }

    #[test]
    fn extrn_keeps_real_globals() {
        let mut ctx = CompilationContext::new("t", 8);
        ctx.declare_global("g", Some(Constant::Word(3))).unwrap();
        ctx.declare_extrn("g").unwrap();
        assert_eq!(
            ctx.module().global("g").unwrap().init,
            GlobalInit::Word(Constant::Word(3))
        );
    }

    #[test]
    fn array_buffer_grows_to_fit_initializers() {
        let mut ctx = CompilationContext::new("t", 8);
        ctx.declare_global_array("c", 2, vec![Constant::Word(1); 4]).unwrap();
        match &ctx.module().global("c.data").unwrap().init {
            GlobalInit::Buffer { len, .. } => assert_eq!(*len, 4),
            other => panic!("unexpected init {other:?}"),
        }
        assert_eq!(
            ctx.module().global("c").unwrap().init,
            GlobalInit::Word(Constant::Address("c.data".into()))
        );
    }
}
