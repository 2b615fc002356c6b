//! # Script Abstract Syntax Tree
//!
//! Types shared between the external parser and the code generator: the
//! parsed tree, static types, literal values, and the engine definitions a
//! script is compiled against.
//!
//! ## Conventions
//!
//! - Sizes are counted in stack slots; every scalar takes one slot.
//! - The tree is handed over fully parsed; nothing here reads source text.

pub mod data_type;
pub mod engine;
pub mod identifier;
pub mod node;
pub mod program;
pub mod value;
