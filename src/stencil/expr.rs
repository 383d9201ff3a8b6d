//! Expression translation
//!
//! Everything needed to turn a recognized expression fragment into directive
//! call syntax:
//! 1. `tokens` — the logos tokenizer
//! 2. `parser` — the chumsky expression grammar behind `ExpressionParser`
//! 3. `ast` — the node shapes shared by parser and emitter
//! 4. `emit` — the AST walk producing call syntax
//! 5. `translate` — the guard/normalize/parse/emit/restore pipeline

pub mod ast;
pub mod emit;
pub mod parser;
pub mod tokens;
pub mod translate;

pub use ast::{BinaryOp, ExprError, ExprNode, Literal, UnaryOp};
pub use parser::{DefaultExpressionParser, ExpressionParser};
pub use translate::{translate_expr, TranslateMode};
