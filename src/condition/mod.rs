//! Rule parsing and evaluation module
//!
//! This module handles parsing rule strings like
//! "age > 30 AND status == 'active'" and evaluating them against a Record.

mod ast;
pub mod cache;
mod evaluator;
pub mod parser;


pub use ast::*;
pub use cache::*;
pub use evaluator::*;
pub use parser::*;
