//! triage-text
//!
//! Lexical side of hybrid retrieval: a tantivy analyzer and the sparse
//! term-weight encoder built on it.

pub mod sparse;
pub mod tantivy_utils;

pub use sparse::LexicalEncoder;
