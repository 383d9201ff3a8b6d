//! The declarative rewrite-rule library
//!
//! 1. `fragments` — composable named pattern pieces and the ordered
//!    expression character classes
//! 2. `ruleset` — the declaration-ordered rule table and per-rule parsers
//! 3. `compiler` — binding the table to a delimiter set, with the
//!    process-wide compiled-rule cache

pub mod compiler;
pub mod fragments;
pub mod ruleset;

pub use compiler::{CompiledAction, CompiledRule, CompiledRuleSet, RuleCache};
pub use ruleset::{PatternRule, RuleAction, RuleContext, RuleParser, RULES};
