//! Composable pattern fragments
//!
//! Rule patterns are written with named fragments (`<opt-space>`,
//! `<id-name>`, …) that are textually expanded during compilation. Fragment
//! names always contain a dash so they can never collide with a named
//! capture group (`(?P<cond>…)` — capture names cannot contain dashes).
//!
//! The delimiter fragments (`<marker-tok>`, `<open-tok>`, `<close-tok>`)
//! and the expression placeholder (`<expr-class>`) are not in this table;
//! the compiler substitutes those itself because they depend on the
//! delimiter set and on the variant being generated.

/// Named fragments expanded into rule patterns, in no particular order
/// (expansion repeats until a fixpoint, so fragments may reference others)
pub const FRAGMENTS: &[(&str, &str)] = &[
    ("<opt-space>", r"[ \t]*"),
    ("<some-space>", r"[ \t]+"),
    ("<id-name>", r"[\p{L}_][\p{L}\p{N}_]*"),
    ("<to-eol>", r"[^\r\n]+"),
    // Call arguments: anything but parentheses, plus one nested level
    ("<call-args>", r"(?:[^()\r\n]|\([^()\r\n]*\))*"),
];

/// Sub-expression character classes for the generic expression placeholder,
/// ordered from the most permissive to the most restrictive. Each class
/// becomes its own compiled rule variant; the first (most permissive) one
/// carries the fallback parser.
pub const EXPRESSION_CLASSES: &[&str] = &[
    // Operators, calls, indexes, quoted strings
    r#"[\w.$+\-*/%!<>=&|^\[\]()'"]+"#,
    // Paths with calls and indexes
    r"[\w.$()\[\]]+",
    // Dotted paths
    r"[\w.$]+",
    // Bare identifiers
    r"\w+",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_names_all_carry_a_dash() {
        for (name, _) in FRAGMENTS {
            assert!(
                name.starts_with('<') && name.ends_with('>') && name.contains('-'),
                "fragment name {} must be dash-separated inside angle brackets",
                name
            );
        }
    }

    #[test]
    fn test_fragments_are_valid_regex() {
        for (name, body) in FRAGMENTS {
            assert!(
                regex::Regex::new(body).is_ok(),
                "fragment {} has an invalid body",
                name
            );
        }
    }

    #[test]
    fn test_expression_classes_are_valid_and_ordered() {
        for class in EXPRESSION_CLASSES {
            assert!(regex::Regex::new(class).is_ok());
        }
        // The most permissive class must accept everything the most
        // restrictive one does.
        let loosest = regex::Regex::new(&format!("^{}$", EXPRESSION_CLASSES[0])).unwrap();
        let strictest =
            regex::Regex::new(&format!("^{}$", EXPRESSION_CLASSES.last().unwrap())).unwrap();
        for sample in ["name", "a1", "x_y"] {
            assert!(strictest.is_match(sample));
            assert!(loosest.is_match(sample));
        }
        assert!(loosest.is_match("a+b*(c.d)"));
        assert!(!strictest.is_match("a+b"));
    }
}
