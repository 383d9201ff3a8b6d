//! AST walk producing directive call syntax
//!
//! The walk turns operator trees into named function calls (`a + b` becomes
//! `add $.a $.b`), indexes into `extract`, ranges into `slice`, and keeps
//! the scope distinction: bare identifiers refer to the global context and
//! take the `$.` prefix, `.field` stays a current-scope selector, `$var`
//! stays a declared variable.

use crate::stencil::expr::ast::{BinaryOp, ExprError, ExprNode, Literal, UnaryOp};
use crate::stencil::guard::CALL_MARKER;

/// Emit a node as top-level directive call syntax (no outer parentheses)
pub fn emit(node: &ExprNode) -> Result<String, ExprError> {
    match node {
        ExprNode::Literal(lit) => Ok(emit_literal(lit)),

        ExprNode::Ident(name) => Ok(emit_ident(name)),

        ExprNode::Current => Ok(".".to_string()),

        ExprNode::Selector { target, field } => {
            let target = emit(target)?;
            // A stray global marker on the right-hand identifier is dropped;
            // only the base of a path carries scope.
            let field = field.trim_start_matches("$.").trim_start_matches('$');
            if target == "." {
                Ok(format!(".{}", field))
            } else {
                Ok(format!("{}.{}", target, field))
            }
        }

        ExprNode::Unary { op, operand } => emit_unary(*op, operand),

        ExprNode::Binary { op, lhs, rhs } => emit_binary(*op, lhs, rhs),

        ExprNode::Call {
            callee,
            args,
            variadic,
        } => emit_call(callee, args, *variadic),

        ExprNode::Index { target, indices } => {
            let mut out = format!("extract {}", emit_arg(target)?);
            for index in indices {
                out.push(' ');
                out.push_str(&emit_arg(index)?);
            }
            Ok(out)
        }

        ExprNode::Slice {
            target,
            lower,
            upper,
        } => {
            // Open bounds normalize to the full range: missing lower is 0,
            // missing upper is -1 (end of sequence).
            let lower = match lower {
                Some(node) => emit_arg(node)?,
                None => "0".to_string(),
            };
            let upper = match upper {
                Some(node) => emit_arg(node)?,
                None => "-1".to_string(),
            };
            Ok(format!("slice {} {} {}", emit_arg(target)?, lower, upper))
        }
    }
}

/// Emit a node in argument position, parenthesizing compound forms
pub fn emit_arg(node: &ExprNode) -> Result<String, ExprError> {
    if is_compound(node) {
        Ok(format!("({})", emit(node)?))
    } else {
        emit(node)
    }
}

fn emit_literal(lit: &Literal) -> String {
    match lit {
        Literal::Number(n) => n.clone(),
        Literal::Str(s) => s.clone(),
        Literal::Bool(b) => b.to_string(),
        Literal::Nil => "nil".to_string(),
    }
}

fn emit_ident(name: &str) -> String {
    // Declared variables keep their `$`; everything else is a lookup in the
    // global context. Reserved-word sentinels count as globals too and get
    // their spelling back after the prefix is attached.
    if name.starts_with('$') {
        name.to_string()
    } else {
        format!("$.{}", name)
    }
}

fn emit_unary(op: UnaryOp, operand: &ExprNode) -> Result<String, ExprError> {
    match op {
        UnaryOp::Not => Ok(format!("not {}", emit_arg(operand)?)),
        UnaryOp::Neg => {
            // The target call syntax has no unary minus; only numeric
            // literals keep the bare sign.
            if let ExprNode::Literal(Literal::Number(n)) = operand {
                Ok(format!("-{}", n))
            } else {
                Ok(format!("sub 0 {}", emit_arg(operand)?))
            }
        }
        // A bare prefix star dissolves; it only matters as the right-hand
        // side of a multiplication (exponent disambiguation).
        UnaryOp::Deref => emit(operand),
    }
}

fn emit_binary(op: BinaryOp, lhs: &ExprNode, rhs: &ExprNode) -> Result<String, ExprError> {
    // `x * *y` is `x ** y` in source spelling: a `*` whose right operand
    // still shows a `*` in its infix rendering is exponentiation, since the
    // grammar has no `**` operator of its own. The check is textual on
    // purpose and is known to misfire on shapes like `(a*b)*(c*d)`; that
    // behavior is load-bearing for compatibility.
    if op == BinaryOp::Mul && infix_text(rhs).contains('*') {
        let exponent = match rhs {
            ExprNode::Unary {
                op: UnaryOp::Deref,
                operand,
            } => operand.as_ref(),
            other => other,
        };
        return Ok(format!("pow {} {}", emit_arg(lhs)?, emit_arg(exponent)?));
    }
    Ok(format!(
        "{} {} {}",
        op.func_name(),
        emit_arg(lhs)?,
        emit_arg(rhs)?
    ))
}

fn emit_call(callee: &ExprNode, args: &[ExprNode], variadic: bool) -> Result<String, ExprError> {
    let name = match callee {
        ExprNode::Ident(name) => name.clone(),
        other => {
            return Err(ExprError::new(format!(
                "only named functions are callable, got {:?}",
                other
            )))
        }
    };
    let mut rendered = Vec::with_capacity(args.len());
    for arg in args {
        rendered.push(emit_arg(arg)?);
    }
    let mut out = if variadic {
        // Variadic expansion routes through the ellipsis wrapper, which
        // receives the function name as data.
        format!("ellipsis{} \"{}\"", CALL_MARKER, name)
    } else {
        format!("{}{}", name, CALL_MARKER)
    };
    for arg in &rendered {
        out.push(' ');
        out.push_str(arg);
    }
    Ok(out)
}

fn is_compound(node: &ExprNode) -> bool {
    match node {
        ExprNode::Binary { .. }
        | ExprNode::Call { .. }
        | ExprNode::Index { .. }
        | ExprNode::Slice { .. } => true,
        ExprNode::Unary { op, operand } => match op {
            UnaryOp::Not => true,
            // `-2` stays an atom; `-x` becomes a `sub` call
            UnaryOp::Neg => !matches!(**operand, ExprNode::Literal(Literal::Number(_))),
            UnaryOp::Deref => is_compound(operand),
        },
        ExprNode::Ident(_)
        | ExprNode::Literal(_)
        | ExprNode::Current
        | ExprNode::Selector { .. } => false,
    }
}

/// Reconstruct an approximate infix rendering of a node.
///
/// Used only by the exponent disambiguation; parenthesization from the
/// original source is not preserved, which is exactly what keeps the
/// documented `(a*b)*(c*d)` misfire behavior intact.
pub fn infix_text(node: &ExprNode) -> String {
    match node {
        ExprNode::Literal(lit) => emit_literal(lit),
        ExprNode::Ident(name) => name.clone(),
        ExprNode::Current => ".".to_string(),
        ExprNode::Selector { target, field } => format!("{}.{}", infix_text(target), field),
        ExprNode::Unary { op, operand } => {
            let symbol = match op {
                UnaryOp::Not => "!",
                UnaryOp::Neg => "-",
                UnaryOp::Deref => "*",
            };
            format!("{}{}", symbol, infix_text(operand))
        }
        ExprNode::Binary { op, lhs, rhs } => {
            format!("{}{}{}", infix_text(lhs), op.symbol(), infix_text(rhs))
        }
        ExprNode::Call {
            callee,
            args,
            variadic,
        } => {
            let args: Vec<_> = args.iter().map(infix_text).collect();
            let suffix = if *variadic { "..." } else { "" };
            format!("{}({}{})", infix_text(callee), args.join(","), suffix)
        }
        ExprNode::Index { target, indices } => {
            let indices: Vec<_> = indices.iter().map(infix_text).collect();
            format!("{}[{}]", infix_text(target), indices.join(","))
        }
        ExprNode::Slice {
            target,
            lower,
            upper,
        } => {
            let lower = lower.as_deref().map(infix_text).unwrap_or_default();
            let upper = upper.as_deref().map(infix_text).unwrap_or_default();
            format!("{}[{}:{}]", infix_text(target), lower, upper)
        }
    }
}
