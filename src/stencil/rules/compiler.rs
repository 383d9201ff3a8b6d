//! Rule compilation and the process-wide compiled-rule cache
//!
//! Compilation binds the declared rule table to one delimiter set: delimiter
//! tokens and named fragments are textually expanded, and any rule carrying
//! the generic expression placeholder fans out into one concrete variant per
//! expression character class (most permissive first, which is the only
//! variant that keeps the fallback parser).
//!
//! Compiled sets are cached per delimiter set for the process lifetime.
//! Population is synchronized; entries are never mutated after insert, so a
//! cache hit returns the same `Arc` every time.
//!
//! Malformed fragment composition is a programming-time defect: compilation
//! panics, it never returns a runtime error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::stencil::delimiters::DelimiterSet;
use crate::stencil::rules::fragments::{EXPRESSION_CLASSES, FRAGMENTS};
use crate::stencil::rules::ruleset::{RuleAction, RuleParser, RULES};

/// A rule bound to a concrete delimiter set
pub struct CompiledRule {
    pub name: String,
    pub regex: Regex,
    pub action: CompiledAction,
}

/// The bound counterpart of `RuleAction`
pub enum CompiledAction {
    Substitute(String),
    Parse(RuleParser),
    ParseWithFallback(RuleParser, RuleParser),
}

/// Every declared rule expanded against one delimiter set, in order
pub struct CompiledRuleSet {
    pub delimiters: DelimiterSet,
    pub rules: Vec<CompiledRule>,
}

/// Detects fragment names left unexpanded after compilation
static LEFTOVER_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[a-z]+(?:-[a-z]+)+>").unwrap());

/// Process-wide cache of compiled rule sets, keyed by delimiter set.
///
/// Tests construct isolated instances with `RuleCache::new`; production
/// callers share `RuleCache::global`.
#[derive(Default)]
pub struct RuleCache {
    sets: Mutex<HashMap<DelimiterSet, Arc<CompiledRuleSet>>>,
}

impl RuleCache {
    pub fn new() -> Self {
        RuleCache::default()
    }

    /// The shared process-wide cache
    pub fn global() -> Arc<RuleCache> {
        static CACHE: OnceLock<Arc<RuleCache>> = OnceLock::new();
        CACHE.get_or_init(|| Arc::new(RuleCache::new())).clone()
    }

    /// Compile (or fetch) the rule set for one delimiter set.
    ///
    /// First use compiles and inserts under the lock; every later call with
    /// an equal delimiter set returns the same `Arc`.
    pub fn compile(&self, delimiters: &DelimiterSet) -> Arc<CompiledRuleSet> {
        let mut sets = self.sets.lock().unwrap();
        if let Some(existing) = sets.get(delimiters) {
            return existing.clone();
        }
        let compiled = Arc::new(compile_rule_set(delimiters));
        sets.insert(delimiters.clone(), compiled.clone());
        compiled
    }

    /// Number of delimiter sets compiled so far
    pub fn len(&self) -> usize {
        self.sets.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expand every declared rule against one delimiter set
fn compile_rule_set(delimiters: &DelimiterSet) -> CompiledRuleSet {
    let mut rules = Vec::new();
    for rule in RULES {
        if rule.pattern.contains("<expr-class>") {
            for (index, class) in EXPRESSION_CLASSES.iter().enumerate() {
                let pattern = rule.pattern.replace("<expr-class>", class);
                let action = variant_action(&rule.action, index);
                rules.push(compile_rule(
                    &format!("{}#{}", rule.name, index),
                    &pattern,
                    action,
                    delimiters,
                ));
            }
        } else {
            rules.push(compile_rule(
                rule.name,
                rule.pattern,
                bound_action(&rule.action, delimiters),
                delimiters,
            ));
        }
    }
    CompiledRuleSet {
        delimiters: delimiters.clone(),
        rules,
    }
}

/// The fallback parser rides only on the first (most permissive) variant
fn variant_action(action: &RuleAction, index: usize) -> CompiledAction {
    match action {
        RuleAction::Substitute(template) => CompiledAction::Substitute((*template).to_string()),
        RuleAction::Parse(parser) => CompiledAction::Parse(*parser),
        RuleAction::ParseWithFallback(parser, fallback) => {
            if index == 0 {
                CompiledAction::ParseWithFallback(*parser, *fallback)
            } else {
                CompiledAction::Parse(*parser)
            }
        }
    }
}

fn bound_action(action: &RuleAction, delimiters: &DelimiterSet) -> CompiledAction {
    match action {
        RuleAction::Substitute(template) => {
            CompiledAction::Substitute(expand_replacement(template, delimiters))
        }
        RuleAction::Parse(parser) => CompiledAction::Parse(*parser),
        RuleAction::ParseWithFallback(parser, fallback) => {
            CompiledAction::ParseWithFallback(*parser, *fallback)
        }
    }
}

fn compile_rule(
    name: &str,
    pattern: &str,
    action: CompiledAction,
    delimiters: &DelimiterSet,
) -> CompiledRule {
    let expanded = expand_pattern(pattern, delimiters);
    let regex = Regex::new(&expanded).unwrap_or_else(|err| {
        panic!(
            "rule compilation defect in {}: {} (pattern: {})",
            name, err, expanded
        )
    });
    CompiledRule {
        name: name.to_string(),
        regex,
        action,
    }
}

/// Substitute delimiter tokens (escaped) and named fragments into a pattern
fn expand_pattern(pattern: &str, delimiters: &DelimiterSet) -> String {
    let mut expanded = pattern
        .replace("<marker-tok>", &regex::escape(&delimiters.marker))
        .replace("<open-tok>", &regex::escape(&delimiters.open))
        .replace("<close-tok>", &regex::escape(&delimiters.close));
    loop {
        let mut changed = false;
        for (name, body) in FRAGMENTS {
            if expanded.contains(name) {
                expanded = expanded.replace(name, body);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    if let Some(leftover) = LEFTOVER_FRAGMENT.find(&expanded) {
        panic!(
            "rule compilation defect: unknown fragment {} in pattern {}",
            leftover.as_str(),
            pattern
        );
    }
    expanded
}

/// Substitute delimiter tokens (verbatim) into a replacement template
fn expand_replacement(template: &str, delimiters: &DelimiterSet) -> String {
    let expanded = template
        .replace("<marker-tok>", &delimiters.marker)
        .replace("<open-tok>", &delimiters.open)
        .replace("<close-tok>", &delimiters.close);
    if let Some(leftover) = LEFTOVER_FRAGMENT.find(&expanded) {
        panic!(
            "rule compilation defect: unknown fragment {} in replacement {}",
            leftover.as_str(),
            template
        );
    }
    expanded
}
