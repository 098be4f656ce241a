pub mod ast;
pub mod capabilities;
pub mod codegen;
pub mod config;
pub mod diagnostic;
pub mod interpreter;
pub mod ir;
pub mod lexer;
pub mod oracle;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod span;
pub mod stdlib;
pub mod typechecker;
