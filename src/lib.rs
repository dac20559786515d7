//! Compiler for the Glyph language. Source text is parsed into an AST,
//! checked and lowered into a typed HIR, optimized, and finally emitted as
//! JavaScript.

pub mod backend;
pub mod driver;
pub mod frontend;
pub mod index;
pub mod middle;
