pub mod context;
pub mod engine;
pub mod english;
pub mod entities;
pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod sequence;
pub mod transforms;
pub mod visitor;
