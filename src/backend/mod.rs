//! The backend turns the validated (and usually optimized) HIR into target
//! source text. JavaScript is the only target: every Glyph construct maps
//! onto an expression or statement form of the language, with pointers
//! emulated by single-field boxes.

pub mod js;
