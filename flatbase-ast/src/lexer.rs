use std::iter::Peekable;
use std::str::Chars;

use crate::error::{AstError, AstResult};
use crate::token::{BinOp, Token};

/// Tokenises a WHERE-clause expression string.
///
/// Identifiers extend over letters, digits, `_`, `.` and `-` so that
/// dotted (`table.column`) and hyphenated identifiers lex as a single
/// token; `AND`/`OR`/`NOT` are recognised case-insensitively inside that
/// same identifier scan and reclassified as keywords.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            chars: src.chars().peekable(),
        }
    }

    pub fn tokenize(src: &'a str) -> AstResult<Vec<Token>> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        while let Some(tok) = lexer.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> AstResult<Option<Token>> {
        self.skip_whitespace();
        let c = match self.chars.peek().copied() {
            Some(c) => c,
            None => return Ok(None),
        };

        let tok = match c {
            '(' => {
                self.chars.next();
                Token::LParen
            }
            ')' => {
                self.chars.next();
                Token::RParen
            }
            '\'' | '"' => self.lex_string(c)?,
            '=' => {
                self.chars.next();
                Token::BinOp(BinOp::Eq)
            }
            '!' => {
                self.chars.next();
                self.expect('=')?;
                Token::BinOp(BinOp::NotEq)
            }
            '<' => {
                self.chars.next();
                match self.chars.peek() {
                    Some('=') => {
                        self.chars.next();
                        Token::BinOp(BinOp::LtEq)
                    }
                    Some('>') => {
                        self.chars.next();
                        Token::BinOp(BinOp::NotEq)
                    }
                    _ => Token::BinOp(BinOp::Lt),
                }
            }
            '>' => {
                self.chars.next();
                match self.chars.peek() {
                    Some('=') => {
                        self.chars.next();
                        Token::BinOp(BinOp::GtEq)
                    }
                    _ => Token::BinOp(BinOp::Gt),
                }
            }
            '+' => {
                self.chars.next();
                Token::BinOp(BinOp::Add)
            }
            '-' => {
                self.chars.next();
                Token::BinOp(BinOp::Sub)
            }
            '*' => {
                self.chars.next();
                Token::BinOp(BinOp::Mul)
            }
            '/' => {
                self.chars.next();
                Token::BinOp(BinOp::Div)
            }
            '%' => {
                self.chars.next();
                Token::BinOp(BinOp::Mod)
            }
            c if c.is_ascii_digit() => self.lex_number(),
            c if c.is_alphabetic() || c == '_' => self.lex_word(),
            other => return Err(AstError::UnexpectedCharacter(other)),
        };
        Ok(Some(tok))
    }

    fn expect(&mut self, want: char) -> AstResult<()> {
        match self.chars.next() {
            Some(c) if c == want => Ok(()),
            Some(other) => Err(AstError::UnexpectedCharacter(other)),
            None => Err(AstError::InvalidExpression(format!(
                "expected '{want}' at end of expression"
            ))),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn lex_string(&mut self, quote: char) -> AstResult<Token> {
        self.chars.next();
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote => return Ok(Token::Str(s)),
                Some('\\') => {
                    if let Some(escaped) = self.chars.next() {
                        s.push(escaped);
                    } else {
                        return Err(AstError::UnterminatedString);
                    }
                }
                Some(c) => s.push(c),
                None => return Err(AstError::UnterminatedString),
            }
        }
    }

    fn lex_number(&mut self) -> Token {
        let mut s = String::new();
        let mut is_float = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.chars.next();
            } else if c == '.' && !is_float {
                is_float = true;
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if is_float {
            Token::Float(s.parse().unwrap_or(0.0))
        } else {
            Token::Int(s.parse().unwrap_or(0))
        }
    }

    fn lex_word(&mut self) -> Token {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match s.to_ascii_uppercase().as_str() {
            "AND" => Token::BinOp(BinOp::And),
            "OR" => Token::BinOp(BinOp::Or),
            "NOT" => Token::Not,
            _ => Token::Ident(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_comparison() {
        let toks = Lexer::tokenize("salary >= 1000 AND id <> 3").unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Ident("salary".into()),
                Token::BinOp(BinOp::GtEq),
                Token::Int(1000),
                Token::BinOp(BinOp::And),
                Token::Ident("id".into()),
                Token::BinOp(BinOp::NotEq),
                Token::Int(3),
            ]
        );
    }

    #[test]
    fn tokenizes_quoted_string_either_quote_style() {
        let toks = Lexer::tokenize("name = 'Ana'").unwrap();
        assert_eq!(toks[2], Token::Str("Ana".into()));
        let toks = Lexer::tokenize("name = \"Ana\"").unwrap();
        assert_eq!(toks[2], Token::Str("Ana".into()));
    }

    #[test]
    fn unterminated_string_errors() {
        assert_eq!(
            Lexer::tokenize("name = 'Ana"),
            Err(AstError::UnterminatedString)
        );
    }

    #[test]
    fn dotted_identifier_lexes_as_one_token() {
        let toks = Lexer::tokenize("employees.salary > 1").unwrap();
        assert_eq!(toks[0], Token::Ident("employees.salary".into()));
    }

    #[test]
    fn float_literal() {
        let toks = Lexer::tokenize("salary > 99.5").unwrap();
        assert_eq!(toks[2], Token::Float(99.5));
    }
}
