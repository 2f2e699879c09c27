use crate::ast::{Leaf, Node};
use crate::error::{AstError, AstResult};
use crate::lexer::Lexer;
use crate::token::Token;

/// Parses a WHERE-clause expression into an [`Node`] tree using the
/// shunting-yard algorithm: tokens are rewritten into postfix order against
/// an operator stack, then the postfix stream is folded onto an operand
/// stack to build the tree.
pub fn parse_expression(src: &str) -> AstResult<Node> {
    let tokens = Lexer::tokenize(src)?;
    if tokens.is_empty() {
        return Err(AstError::EmptyExpression);
    }
    let postfix = to_postfix(tokens)?;
    build_tree(postfix)
}

fn to_postfix(tokens: Vec<Token>) -> AstResult<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut ops: Vec<Token> = Vec::new();

    for tok in tokens {
        match tok {
            Token::Int(_) | Token::Float(_) | Token::Str(_) | Token::Ident(_) => {
                output.push(tok);
            }
            Token::LParen => ops.push(tok),
            Token::RParen => {
                loop {
                    match ops.pop() {
                        Some(Token::LParen) => break,
                        Some(op) => output.push(op),
                        None => return Err(AstError::MismatchedParentheses),
                    }
                }
            }
            Token::Not | Token::BinOp(_) => {
                // Binary operators are left-associative, so an operator
                // already on the stack at the same precedence is popped
                // before pushing this one. NOT is a right-associative
                // prefix operator, so an equal-precedence NOT already on
                // the stack must stay put; popping it early would starve
                // it of its operand once it is finally applied, breaking
                // chains like `NOT NOT active`.
                let pop_while_ge = !matches!(tok, Token::Not);
                while let Some(top) = ops.last() {
                    match top {
                        Token::LParen => break,
                        _ if pop_while_ge && top.precedence() >= tok.precedence() => {
                            output.push(ops.pop().unwrap());
                        }
                        _ if !pop_while_ge && top.precedence() > tok.precedence() => {
                            output.push(ops.pop().unwrap());
                        }
                        _ => break,
                    }
                }
                ops.push(tok);
            }
        }
    }

    while let Some(op) = ops.pop() {
        if matches!(op, Token::LParen) {
            return Err(AstError::MismatchedParentheses);
        }
        output.push(op);
    }

    Ok(output)
}

fn build_tree(postfix: Vec<Token>) -> AstResult<Node> {
    let mut stack: Vec<Node> = Vec::new();

    for tok in postfix {
        match tok {
            Token::Int(v) => stack.push(Node::leaf(Leaf::IntLit(v))),
            Token::Float(v) => stack.push(Node::leaf(Leaf::FloatLit(v))),
            Token::Str(v) => stack.push(Node::leaf(Leaf::StrLit(v))),
            Token::Ident(v) => stack.push(Node::leaf(Leaf::Ident(v))),
            Token::Not => {
                let operand = stack
                    .pop()
                    .ok_or_else(|| AstError::InvalidExpression("NOT missing operand".into()))?;
                stack.push(Node::Not(Box::new(operand)));
            }
            Token::BinOp(op) => {
                let right = stack.pop().ok_or_else(|| {
                    AstError::InvalidExpression(format!("{op} missing right operand"))
                })?;
                let left = stack.pop().ok_or_else(|| {
                    AstError::InvalidExpression(format!("{op} missing left operand"))
                })?;
                stack.push(Node::Binary(op, Box::new(left), Box::new(right)));
            }
            Token::LParen | Token::RParen => unreachable!("parentheses consumed during infix->postfix conversion"),
        }
    }

    if stack.len() != 1 {
        return Err(AstError::InvalidExpression(
            "expression does not reduce to a single tree".into(),
        ));
    }
    Ok(stack.pop().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::BinOp;

    #[test]
    fn simple_comparison() {
        let node = parse_expression("salary >= 1000").unwrap();
        assert_eq!(
            node,
            Node::Binary(
                BinOp::GtEq,
                Box::new(Node::leaf(Leaf::Ident("salary".into()))),
                Box::new(Node::leaf(Leaf::IntLit(1000))),
            )
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // a OR b AND c  =>  a OR (b AND c)
        let node = parse_expression("a OR b AND c").unwrap();
        match node {
            Node::Binary(BinOp::Or, left, right) => {
                assert_eq!(*left, Node::leaf(Leaf::Ident("a".into())));
                assert!(matches!(*right, Node::Binary(BinOp::And, _, _)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parentheses_override_precedence() {
        let node = parse_expression("(a OR b) AND c").unwrap();
        match node {
            Node::Binary(BinOp::And, left, _) => {
                assert!(matches!(*left, Node::Binary(BinOp::Or, _, _)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn not_applies_to_single_operand() {
        let node = parse_expression("NOT active").unwrap();
        assert_eq!(node, Node::Not(Box::new(Node::leaf(Leaf::Ident("active".into())))));
    }

    #[test]
    fn double_not_is_right_associative() {
        // NOT NOT active => NOT (NOT active), not a malformed stack.
        let node = parse_expression("NOT NOT active").unwrap();
        assert_eq!(
            node,
            Node::Not(Box::new(Node::Not(Box::new(Node::leaf(Leaf::Ident(
                "active".into()
            ))))))
        );
    }

    #[test]
    fn mismatched_parens_detected() {
        assert_eq!(parse_expression("(a AND b"), Err(AstError::MismatchedParentheses));
        assert_eq!(parse_expression("a AND b)"), Err(AstError::MismatchedParentheses));
    }

    #[test]
    fn short_circuit_left_associative_chain() {
        let node = parse_expression("id * 2 > 5").unwrap();
        match node {
            Node::Binary(BinOp::Gt, left, right) => {
                assert!(matches!(*left, Node::Binary(BinOp::Mul, _, _)));
                assert_eq!(*right, Node::leaf(Leaf::IntLit(5)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn arithmetic_left_associativity() {
        // a - b - c => (a - b) - c
        let node = parse_expression("a - b - c").unwrap();
        match node {
            Node::Binary(BinOp::Sub, left, right) => {
                assert!(matches!(*left, Node::Binary(BinOp::Sub, _, _)));
                assert_eq!(*right, Node::leaf(Leaf::Ident("c".into())));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }
}
