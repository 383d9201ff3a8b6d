//! The rewrite engine
//!
//! Applies a compiled rule set to guarded text, rule by rule, in order.
//! Substitution rules interpolate named capture groups into their template;
//! parser rules hand every match to the rule's parser and splice the result
//! in place. A parser failure leaves that match untouched so a later, more
//! specific rule can claim it — the cascade fails soft, never hard.
//!
//! Replacements are computed over the original match text of each pass
//! (one `replace_all` per rule), so an earlier match's output never feeds a
//! later match of the same rule. After the last rule, residual call markers
//! are stripped.

use regex::Captures;

use crate::stencil::guard::CALL_MARKER;
use crate::stencil::rules::compiler::{CompiledAction, CompiledRuleSet};
use crate::stencil::rules::ruleset::RuleContext;

/// Run the full cascade over `text`
pub fn rewrite(text: &str, rules: &CompiledRuleSet) -> String {
    let context = RuleContext {
        delimiters: &rules.delimiters,
    };
    let mut current = text.to_string();
    for rule in &rules.rules {
        let next = match &rule.action {
            CompiledAction::Substitute(template) => rule
                .regex
                .replace_all(&current, template.as_str())
                .into_owned(),
            CompiledAction::Parse(parser) => rule
                .regex
                .replace_all(&current, |caps: &Captures| {
                    parser(caps, &context).unwrap_or_else(|_| caps[0].to_string())
                })
                .into_owned(),
            CompiledAction::ParseWithFallback(parser, fallback) => rule
                .regex
                .replace_all(&current, |caps: &Captures| {
                    parser(caps, &context)
                        .or_else(|_| fallback(caps, &context))
                        .unwrap_or_else(|_| caps[0].to_string())
                })
                .into_owned(),
        };
        current = next;
    }
    strip_call_markers(&current)
}

/// Remove the internal markers that suppressed re-matching of translated
/// call names
pub fn strip_call_markers(text: &str) -> String {
    if text.contains(CALL_MARKER) {
        text.replace(CALL_MARKER, "")
    } else {
        text.to_string()
    }
}
