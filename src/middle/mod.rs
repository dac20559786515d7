//! Names and types are resolved here and the AST is turned into HIR, which
//! is then simplified by constant folding and dead branch removal before it
//! reaches the backend.

pub mod analyze;
pub mod hir;
pub mod optimize;
pub mod primitive;
pub mod stdlib;
pub mod ty;
