//! Address handling: syntactic validation and lexical extraction from text.

pub mod extractor;
pub mod validator;

pub use extractor::extract;
pub use validator::{canonicalize, validate};
