//! Rule engine module

mod handle;
mod rule_engine;


pub use handle::*;
pub use rule_engine::*;
