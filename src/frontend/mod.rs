// This module is the single-pass front end: the lexer reads characters, the declaration,
// statement and expression compilers parse them and emit IR through the function builder
// as they go, and the compilation context holds the module and the extrn scope.

//! Syntax-directed code generation for B.

pub mod builder;
pub mod context;
pub mod declarations;
pub mod expressions;
pub mod lexer;
pub mod statements;

pub use builder::{Expr, FunctionBuilder};
pub use context::CompilationContext;
pub use declarations::compile_declarations;
pub use lexer::Lexer;
pub use statements::SwitchContext;
