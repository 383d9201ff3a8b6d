//! The general-purpose expression grammar
//!
//! A chumsky parser over the token stream produced by `tokens::lex`. The
//! grammar is a conventional arithmetic/call/index grammar: it knows nothing
//! about the directive language, only about expressions. Consumers depend on
//! it solely through the `ExpressionParser` trait and the `ExprNode` shapes.

use chumsky::prelude::*;

use crate::stencil::expr::ast::{BinaryOp, ExprError, ExprNode, Literal, UnaryOp};
use crate::stencil::expr::tokens::{lex, Token};

/// A pluggable expression parser.
///
/// The emit walk assumes only the `ExprNode` variant shapes, so an
/// alternative grammar can be swapped in behind this trait.
pub trait ExpressionParser {
    fn parse(&self, text: &str) -> Result<ExprNode, ExprError>;
}

/// The built-in grammar: logos tokens fed to a chumsky recursive parser
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExpressionParser;

impl ExpressionParser for DefaultExpressionParser {
    fn parse(&self, text: &str) -> Result<ExprNode, ExprError> {
        let tokens = lex(text)?;
        if tokens.is_empty() {
            return Err(ExprError::new("empty expression"));
        }
        expression()
            .then_ignore(end())
            .parse(tokens)
            .map_err(|errors| {
                let first = errors
                    .first()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "parse failed".to_string());
                ExprError::new(first)
            })
    }
}

/// One step applied to the left of it in the postfix chain
#[derive(Clone)]
enum Postfix {
    Field(String),
    Call(Vec<ExprNode>, bool),
    Index(Vec<ExprNode>),
    Slice(Option<ExprNode>, Option<ExprNode>),
}

fn binary_node(lhs: ExprNode, (op, rhs): (BinaryOp, ExprNode)) -> ExprNode {
    ExprNode::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn apply_postfix(target: ExprNode, op: Postfix) -> ExprNode {
    match op {
        Postfix::Field(field) => ExprNode::Selector {
            target: Box::new(target),
            field,
        },
        Postfix::Call(args, variadic) => ExprNode::Call {
            callee: Box::new(target),
            args,
            variadic,
        },
        Postfix::Index(indices) => ExprNode::Index {
            target: Box::new(target),
            indices,
        },
        Postfix::Slice(lower, upper) => ExprNode::Slice {
            target: Box::new(target),
            lower: lower.map(Box::new),
            upper: upper.map(Box::new),
        },
    }
}

fn expression() -> impl Parser<Token, ExprNode, Error = Simple<Token>> {
    recursive(|expr| {
        let ident_name = filter_map(|span, token| match token {
            Token::Ident(name) => Ok(name),
            other => Err(Simple::expected_input_found(span, None, Some(other))),
        });

        let value = filter_map(|span, token| match token {
            Token::Number(n) => Ok(ExprNode::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(ExprNode::Literal(Literal::Str(s))),
            Token::True => Ok(ExprNode::Literal(Literal::Bool(true))),
            Token::False => Ok(ExprNode::Literal(Literal::Bool(false))),
            Token::Nil => Ok(ExprNode::Literal(Literal::Nil)),
            Token::Var(v) => Ok(ExprNode::Ident(v)),
            Token::Ident(name) => Ok(ExprNode::Ident(name)),
            other => Err(Simple::expected_input_found(span, None, Some(other))),
        });

        // `.field` selects from the current scope; a bare `.` is the scope
        // value itself.
        let scoped = just(Token::Dot)
            .ignore_then(ident_name.clone().or_not())
            .map(|field| match field {
                Some(field) => ExprNode::Selector {
                    target: Box::new(ExprNode::Current),
                    field,
                },
                None => ExprNode::Current,
            });

        let atom = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .or(scoped)
            .or(value)
            .boxed();

        let field = just(Token::Dot)
            .ignore_then(ident_name)
            .map(Postfix::Field);

        let call = expr
            .clone()
            .separated_by(just(Token::Comma))
            .then(just(Token::Ellipsis).or_not())
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(|(args, ellipsis)| Postfix::Call(args, ellipsis.is_some()));

        let slice = expr
            .clone()
            .or_not()
            .then_ignore(just(Token::Colon))
            .then(expr.clone().or_not())
            .map(|(lower, upper)| Postfix::Slice(lower, upper));

        let index = expr
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .map(Postfix::Index);

        let bracket = slice
            .or(index)
            .delimited_by(just(Token::LBracket), just(Token::RBracket));

        let postfix = atom
            .then(field.or(call).or(bracket).repeated())
            .foldl(apply_postfix)
            .boxed();

        let unary_op = just(Token::Bang)
            .to(UnaryOp::Not)
            .or(just(Token::Minus).to(UnaryOp::Neg))
            .or(just(Token::Star).to(UnaryOp::Deref));

        let unary = unary_op
            .repeated()
            .then(postfix)
            .foldr(|op, operand| ExprNode::Unary {
                op,
                operand: Box::new(operand),
            })
            .boxed();

        let product_op = just(Token::Star)
            .to(BinaryOp::Mul)
            .or(just(Token::Slash).to(BinaryOp::Div))
            .or(just(Token::Percent).to(BinaryOp::Mod));
        let product = unary
            .clone()
            .then(product_op.then(unary).repeated())
            .foldl(binary_node)
            .boxed();

        let sum_op = just(Token::Plus)
            .to(BinaryOp::Add)
            .or(just(Token::Minus).to(BinaryOp::Sub));
        let sum = product
            .clone()
            .then(sum_op.then(product).repeated())
            .foldl(binary_node)
            .boxed();

        let shift_op = just(Token::Shl)
            .to(BinaryOp::Shl)
            .or(just(Token::Shr).to(BinaryOp::Shr));
        let shift = sum
            .clone()
            .then(shift_op.then(sum).repeated())
            .foldl(binary_node)
            .boxed();

        let compare_op = just(Token::Le)
            .to(BinaryOp::Le)
            .or(just(Token::Ge).to(BinaryOp::Ge))
            .or(just(Token::Lt).to(BinaryOp::Lt))
            .or(just(Token::Gt).to(BinaryOp::Gt));
        let compare = shift
            .clone()
            .then(compare_op.then(shift).repeated())
            .foldl(binary_node)
            .boxed();

        let equality_op = just(Token::EqEq)
            .to(BinaryOp::Eq)
            .or(just(Token::NotEq).to(BinaryOp::Ne));
        let equality = compare
            .clone()
            .then(equality_op.then(compare).repeated())
            .foldl(binary_node)
            .boxed();

        let bit_and = equality
            .clone()
            .then(just(Token::Amp).to(BinaryOp::BitAnd).then(equality).repeated())
            .foldl(binary_node)
            .boxed();

        let bit_xor = bit_and
            .clone()
            .then(just(Token::Caret).to(BinaryOp::BitXor).then(bit_and).repeated())
            .foldl(binary_node)
            .boxed();

        let bit_or = bit_xor
            .clone()
            .then(just(Token::Pipe).to(BinaryOp::BitOr).then(bit_xor).repeated())
            .foldl(binary_node)
            .boxed();

        let logical_and = bit_or
            .clone()
            .then(just(Token::AndAnd).to(BinaryOp::And).then(bit_or).repeated())
            .foldl(binary_node)
            .boxed();

        logical_and
            .clone()
            .then(just(Token::OrOr).to(BinaryOp::Or).then(logical_and).repeated())
            .foldl(binary_node)
            .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ExprNode {
        DefaultExpressionParser
            .parse(text)
            .unwrap_or_else(|e| panic!("failed to parse {:?}: {}", text, e))
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let node = parse("a + b * c");
        match node {
            ExprNode::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => {
                assert!(matches!(
                    *rhs,
                    ExprNode::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("expected add at root, got {:?}", other),
        }
    }

    #[test]
    fn test_left_associative_mul() {
        let node = parse("a * b * c");
        match node {
            ExprNode::Binary {
                op: BinaryOp::Mul,
                lhs,
                rhs,
            } => {
                assert!(matches!(
                    *lhs,
                    ExprNode::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
                assert!(matches!(*rhs, ExprNode::Ident(ref n) if n == "c"));
            }
            other => panic!("expected mul at root, got {:?}", other),
        }
    }

    #[test]
    fn test_double_star_parses_as_deref() {
        let node = parse("x ** y");
        match node {
            ExprNode::Binary {
                op: BinaryOp::Mul,
                rhs,
                ..
            } => {
                assert!(matches!(
                    *rhs,
                    ExprNode::Unary {
                        op: UnaryOp::Deref,
                        ..
                    }
                ));
            }
            other => panic!("expected mul at root, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_grouping() {
        let node = parse("(a + b) * c");
        assert!(matches!(
            node,
            ExprNode::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_selector_chain() {
        let node = parse("a.b.c");
        match node {
            ExprNode::Selector { target, field } => {
                assert_eq!(field, "c");
                assert!(matches!(*target, ExprNode::Selector { .. }));
            }
            other => panic!("expected selector, got {:?}", other),
        }
    }

    #[test]
    fn test_scoped_reference() {
        let node = parse(".name");
        match node {
            ExprNode::Selector { target, field } => {
                assert_eq!(field, "name");
                assert!(matches!(*target, ExprNode::Current));
            }
            other => panic!("expected current-scope selector, got {:?}", other),
        }
    }

    #[test]
    fn test_call_with_args() {
        let node = parse("f(a, 2)");
        match node {
            ExprNode::Call {
                callee,
                args,
                variadic,
            } => {
                assert!(matches!(*callee, ExprNode::Ident(ref n) if n == "f"));
                assert_eq!(args.len(), 2);
                assert!(!variadic);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_variadic_call() {
        let node = parse("f(a, rest...)");
        assert!(matches!(node, ExprNode::Call { variadic: true, .. }));
    }

    #[test]
    fn test_zero_arg_call() {
        let node = parse("now()");
        match node {
            ExprNode::Call { args, .. } => assert!(args.is_empty()),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_single_index() {
        let node = parse("x[1]");
        match node {
            ExprNode::Index { indices, .. } => assert_eq!(indices.len(), 1),
            other => panic!("expected index, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_index() {
        let node = parse("x[a, b]");
        match node {
            ExprNode::Index { indices, .. } => assert_eq!(indices.len(), 2),
            other => panic!("expected index, got {:?}", other),
        }
    }

    #[test]
    fn test_full_slice() {
        let node = parse("x[:]");
        assert!(matches!(
            node,
            ExprNode::Slice {
                lower: None,
                upper: None,
                ..
            }
        ));
    }

    #[test]
    fn test_open_upper_slice() {
        let node = parse("x[-1:]");
        match node {
            ExprNode::Slice { lower, upper, .. } => {
                assert!(lower.is_some());
                assert!(upper.is_none());
            }
            other => panic!("expected slice, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        assert!(DefaultExpressionParser.parse("a +").is_err());
        assert!(DefaultExpressionParser.parse("(a").is_err());
        assert!(DefaultExpressionParser.parse("a b").is_err());
    }
}
