//! The shorthand rule cascade
//!
//! Every shorthand construct is one `PatternRule` in the table below. Rules
//! are applied in declaration order and later rules depend on text produced
//! by earlier ones — comment stripping must precede the command rules, the
//! command rules must precede the function-call rule, and the undelimited
//! inline-expression rule runs last. That ordering is a correctness
//! invariant, not an optimization.

use regex::Captures;

use crate::stencil::delimiters::DelimiterSet;
use crate::stencil::expr::ast::ExprError;
use crate::stencil::expr::translate::{translate_expr, TranslateMode};
use once_cell::sync::Lazy;
use regex::Regex;

/// Context handed to rule parsers for every match
pub struct RuleContext<'a> {
    pub delimiters: &'a DelimiterSet,
}

/// A rule-specific parser callback: receives one match, returns the text
/// that replaces it
pub type RuleParser = fn(&Captures<'_>, &RuleContext<'_>) -> Result<String, ExprError>;

/// What a rule does with each match
pub enum RuleAction {
    /// Substitute named capture groups into a replacement template
    Substitute(&'static str),
    /// Delegate the match to a parser; on failure the match is left as-is
    Parse(RuleParser),
    /// Delegate to a parser, consulting the fallback before giving up
    ParseWithFallback(RuleParser, RuleParser),
}

/// One declared rewrite rule, before delimiter binding
pub struct PatternRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub action: RuleAction,
}

/// The cascade, in application order
pub const RULES: &[PatternRule] = &[
    // Comments are stripped before anything else can see their contents.
    PatternRule {
        name: "line_comment",
        pattern: r"<marker-tok>//[^\r\n]*",
        action: RuleAction::Substitute(""),
    },
    PatternRule {
        name: "block_comment",
        pattern: r"(?s)<marker-tok>/\*.*?\*/",
        action: RuleAction::Substitute(""),
    },
    // A user-written doubled marker collapses to one literal marker; the
    // kind swap is what tells restoration to halve it.
    PatternRule {
        name: "unescape_marker",
        pattern: "\u{e000}e(?P<num>[0-9]+)\u{e001}",
        action: RuleAction::Substitute("\u{e000}u${num}\u{e001}"),
    },
    PatternRule {
        name: "else_if_command",
        pattern: r"<marker-tok>else<opt-space>if<opt-space>\((?P<cond><call-args>)\)",
        action: RuleAction::Parse(parse_else_if),
    },
    PatternRule {
        name: "if_command",
        pattern: r"<marker-tok>if<opt-space>\((?P<cond><call-args>)\)",
        action: RuleAction::Parse(parse_if),
    },
    PatternRule {
        name: "else_command",
        pattern: r"<marker-tok>else\b",
        action: RuleAction::Substitute("<open-tok> else <close-tok>"),
    },
    PatternRule {
        name: "range_command",
        pattern: r"<marker-tok>(?:range|foreach|for)<opt-space>\((?P<loopargs><call-args>)\)",
        action: RuleAction::Parse(parse_loop),
    },
    PatternRule {
        name: "with_command",
        pattern: r"<marker-tok>with<opt-space>\((?P<cond><call-args>)\)",
        action: RuleAction::Parse(parse_with),
    },
    PatternRule {
        name: "define_command",
        pattern: r#"<marker-tok>define<opt-space>\(<opt-space>"(?P<tname>[^"]*)"<opt-space>\)"#,
        action: RuleAction::Substitute(r#"<open-tok> define "${tname}" <close-tok>"#),
    },
    PatternRule {
        name: "block_command",
        pattern: r#"<marker-tok>block<opt-space>\(<opt-space>"(?P<tname>[^"]*)"(?:<opt-space>,<opt-space>(?P<value><call-args>))?<opt-space>\)"#,
        action: RuleAction::Parse(parse_block),
    },
    PatternRule {
        name: "end_command",
        pattern: r"<marker-tok>end(?:if|foreach|for|range|with|define|block)?\b",
        action: RuleAction::Substitute("<open-tok> end <close-tok>"),
    },
    PatternRule {
        name: "assignment",
        pattern: r"<marker-tok>\{?<opt-space>\$?(?P<target><id-name>)<opt-space>\}?<opt-space>:=<opt-space>(?P<value><to-eol>)",
        action: RuleAction::Parse(parse_assign),
    },
    // A full-line `$name := expr` needs no marker.
    PatternRule {
        name: "assignment_line",
        pattern: r"(?m)^<opt-space>\$(?P<target><id-name>)<opt-space>:=<opt-space>(?P<value><to-eol>)",
        action: RuleAction::Parse(parse_assign),
    },
    PatternRule {
        name: "function_call",
        pattern: r"<marker-tok>(?P<fname><id-name>)\((?P<fargs><call-args>)\)",
        action: RuleAction::Parse(parse_call),
    },
    PatternRule {
        name: "braced_expression",
        pattern: r"<marker-tok>\{(?P<value>[^{}\r\n]*)\}",
        action: RuleAction::Parse(parse_braced),
    },
    // The generic inline expression; compiled into one variant per
    // expression character class, most permissive first.
    PatternRule {
        name: "inline_expression",
        pattern: r"<marker-tok>(?P<value><expr-class>)",
        action: RuleAction::ParseWithFallback(parse_inline, parse_inline_path),
    },
];

fn wrap(ctx: &RuleContext<'_>, body: &str) -> String {
    format!("{} {} {}", ctx.delimiters.open, body, ctx.delimiters.close)
}

fn parse_if(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let cond = translate_expr(&caps["cond"], TranslateMode::Lenient)?;
    Ok(wrap(ctx, &format!("if {}", cond)))
}

fn parse_else_if(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let cond = translate_expr(&caps["cond"], TranslateMode::Lenient)?;
    Ok(wrap(ctx, &format!("else if {}", cond)))
}

fn parse_with(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let value = translate_expr(&caps["cond"], TranslateMode::Lenient)?;
    Ok(wrap(ctx, &format!("with {}", value)))
}

/// Loop binding forms: `seq`, `v := seq`, `k, v := seq`
static LOOP_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<key>[\p{L}_][\p{L}\p{N}_]*)[ \t]*,[ \t]*)?(?P<val>[\p{L}_][\p{L}\p{N}_]*)[ \t]*:=[ \t]*(?P<seq>.+)$",
    )
    .unwrap()
});

fn parse_loop(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let args = caps["loopargs"].trim().to_string();
    let body = match LOOP_BINDING.captures(&args) {
        Some(binding) => {
            let seq = translate_expr(&binding["seq"], TranslateMode::Lenient)?;
            match binding.name("key") {
                Some(key) => format!(
                    "range ${}, ${} := {}",
                    key.as_str(),
                    &binding["val"],
                    seq
                ),
                None => format!("range ${} := {}", &binding["val"], seq),
            }
        }
        None => format!("range {}", translate_expr(&args, TranslateMode::Lenient)?),
    };
    Ok(wrap(ctx, &body))
}

fn parse_block(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let value = match caps.name("value") {
        Some(value) => translate_expr(value.as_str(), TranslateMode::Lenient)?,
        None => ".".to_string(),
    };
    Ok(wrap(ctx, &format!("block \"{}\" {}", &caps["tname"], value)))
}

fn parse_assign(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let value = translate_expr(caps["value"].trim(), TranslateMode::Lenient)?;
    Ok(format!(
        "{}- ${} := {} {}",
        ctx.delimiters.open, &caps["target"], value, ctx.delimiters.close
    ))
}

fn parse_call(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let expression = format!("{}({})", &caps["fname"], &caps["fargs"]);
    let call = translate_expr(&expression, TranslateMode::Strict)?;
    Ok(wrap(ctx, &call))
}

fn parse_braced(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let value = translate_expr(&caps["value"], TranslateMode::Lenient)?;
    Ok(wrap(ctx, &value))
}

fn parse_inline(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let value = translate_expr(&caps["value"], TranslateMode::Strict)?;
    Ok(wrap(ctx, &value))
}

/// Cheap fallback for the permissive inline variant: accept a plain dotted
/// path without invoking the grammar at all.
static PLAIN_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$?[\p{L}_][\p{L}\p{N}_]*(?:\.[\p{L}\p{N}_]+)*$").unwrap());

fn parse_inline_path(caps: &Captures<'_>, ctx: &RuleContext<'_>) -> Result<String, ExprError> {
    let value = &caps["value"];
    if !PLAIN_PATH.is_match(value) {
        return Err(ExprError::new(format!("not a plain path: {}", value)));
    }
    let body = if value.starts_with('$') {
        value.to_string()
    } else {
        format!("$.{}", value)
    };
    Ok(wrap(ctx, &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_order_is_the_contract() {
        let names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        // Comments strip before any command can fire.
        assert_eq!(names[0], "line_comment");
        assert_eq!(names[1], "block_comment");
        // `else if` must be tried before `if` and before bare `else`.
        let else_if = names.iter().position(|n| *n == "else_if_command").unwrap();
        let if_pos = names.iter().position(|n| *n == "if_command").unwrap();
        let else_pos = names.iter().position(|n| *n == "else_command").unwrap();
        assert!(else_if < if_pos);
        assert!(else_if < else_pos);
        // Keyword commands come before the generic function-call rule.
        let call = names.iter().position(|n| *n == "function_call").unwrap();
        assert!(if_pos < call);
        // The generic inline expression is always last.
        assert_eq!(*names.last().unwrap(), "inline_expression");
    }

    #[test]
    fn test_only_inline_rule_has_expression_placeholder() {
        for rule in RULES {
            let has_placeholder = rule.pattern.contains("<expr-class>");
            assert_eq!(
                has_placeholder,
                rule.name == "inline_expression",
                "unexpected placeholder usage in {}",
                rule.name
            );
        }
    }

    #[test]
    fn test_loop_binding_forms() {
        let caps = LOOP_BINDING.captures("v := items").unwrap();
        assert!(caps.name("key").is_none());
        assert_eq!(&caps["val"], "v");
        assert_eq!(&caps["seq"], "items");

        let caps = LOOP_BINDING.captures("i, v := list[2:]").unwrap();
        assert_eq!(&caps["key"], "i");
        assert_eq!(&caps["val"], "v");
        assert_eq!(&caps["seq"], "list[2:]");

        assert!(LOOP_BINDING.captures("items").is_none());
    }

    #[test]
    fn test_plain_path_fallback_shapes() {
        assert!(PLAIN_PATH.is_match("name"));
        assert!(PLAIN_PATH.is_match("a.b.c"));
        assert!(PLAIN_PATH.is_match("$var"));
        assert!(!PLAIN_PATH.is_match("a+b"));
        assert!(!PLAIN_PATH.is_match("f(x)"));
    }
}
