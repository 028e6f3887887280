//! Tokenizer for path expressions.
//!
//! Operator names (`and`, `or`, `div`, `mod`) and `*` are not disambiguated
//! here; the parser decides from position whether a name is an operator or a
//! name test.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char, digit0, digit1};
use nom::combinator::{map, map_res, opt, recognize, value};
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;

use super::ast::QName;
use super::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    DoubleColon,
    Pipe,
    Plus,
    Minus,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Star,
    Literal(String),
    Number(f64),
    Variable(String),
    Name(QName),
    PrefixWildcard(String),
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

fn ncname(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_name_start), take_while(is_name_char)))(input)
}

fn literal(input: &str) -> IResult<&str, Token> {
    map(
        alt((
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        )),
        |s: &str| Token::Literal(s.to_string()),
    )(input)
}

fn number(input: &str) -> IResult<&str, Token> {
    map_res(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        |s: &str| s.parse::<f64>().map(Token::Number),
    )(input)
}

fn variable(input: &str) -> IResult<&str, Token> {
    map(preceded(char('$'), ncname), |s: &str| {
        Token::Variable(s.to_string())
    })(input)
}

/// `NCName`, `prefix:local` or `prefix:*`. A `::` after the first name is
/// left for the axis separator.
fn name(input: &str) -> IResult<&str, Token> {
    let (rest, first) = ncname(input)?;
    if let Some(after_colon) = rest.strip_prefix(':') {
        if !after_colon.starts_with(':') {
            if let Some(after_star) = after_colon.strip_prefix('*') {
                return Ok((after_star, Token::PrefixWildcard(first.to_string())));
            }
            if let Ok((after_local, local)) = ncname(after_colon) {
                return Ok((after_local, Token::Name(QName::prefixed(first, local))));
            }
        }
    }
    Ok((rest, Token::Name(QName::local(first))))
}

fn symbol(input: &str) -> IResult<&str, Token> {
    alt((
        alt((
            value(Token::DoubleSlash, tag("//")),
            value(Token::Slash, tag("/")),
            value(Token::DoubleColon, tag("::")),
            value(Token::DotDot, tag("..")),
            value(Token::Dot, tag(".")),
            value(Token::NotEqual, tag("!=")),
            value(Token::LessEqual, tag("<=")),
            value(Token::GreaterEqual, tag(">=")),
        )),
        alt((
            value(Token::LParen, char('(')),
            value(Token::RParen, char(')')),
            value(Token::LBracket, char('[')),
            value(Token::RBracket, char(']')),
            value(Token::At, char('@')),
            value(Token::Comma, char(',')),
            value(Token::Pipe, char('|')),
            value(Token::Plus, char('+')),
            value(Token::Minus, char('-')),
            value(Token::Equal, char('=')),
            value(Token::Less, char('<')),
            value(Token::Greater, char('>')),
            value(Token::Star, char('*')),
        )),
    ))(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((literal, number, variable, name, symbol))(input)
}

/// Split `expression` into tokens.
pub(crate) fn tokenize(expression: &str) -> Result<Vec<Spanned>, XPathError> {
    let mut tokens = Vec::new();
    let mut rest = expression.trim_start();

    while !rest.is_empty() {
        let offset = expression.len() - rest.len();
        match token(rest) {
            Ok((next, token)) => {
                tokens.push(Spanned { token, offset });
                rest = next.trim_start();
            }
            Err(_) => {
                let found = rest.chars().next().map_or(String::new(), String::from);
                let message = if found == "\"" || found == "'" {
                    "unterminated string literal".to_string()
                } else {
                    format!("unexpected character '{found}'")
                };
                return Err(XPathError::Syntax {
                    expression: expression.to_string(),
                    offset,
                    message,
                });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expression: &str) -> Vec<Token> {
        tokenize(expression)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_path_tokens() {
        assert_eq!(
            kinds("//dc:title[@xml:lang='en']"),
            vec![
                Token::DoubleSlash,
                Token::Name(QName::prefixed("dc", "title")),
                Token::LBracket,
                Token::At,
                Token::Name(QName::prefixed("xml", "lang")),
                Token::Equal,
                Token::Literal("en".to_string()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_axis_separator_not_a_prefix() {
        assert_eq!(
            kinds("child::cmd:*"),
            vec![
                Token::Name(QName::local("child")),
                Token::DoubleColon,
                Token::PrefixWildcard("cmd".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers_and_dots() {
        assert_eq!(
            kinds("../x[.5 + 1.]"),
            vec![
                Token::DotDot,
                Token::Slash,
                Token::Name(QName::local("x")),
                Token::LBracket,
                Token::Number(0.5),
                Token::Plus,
                Token::Number(1.0),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_hyphenated_names() {
        assert_eq!(
            kinds("string-join($a, \"-\")"),
            vec![
                Token::Name(QName::local("string-join")),
                Token::LParen,
                Token::Variable("a".to_string()),
                Token::Comma,
                Token::Literal("-".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_offsets() {
        let tokens = tokenize("  a  |  b").unwrap();
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![2, 5, 8]);
    }

    #[test]
    fn test_errors() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(
            err,
            XPathError::Syntax {
                expression: "a # b".to_string(),
                offset: 2,
                message: "unexpected character '#'".to_string(),
            }
        );
        assert!(matches!(
            tokenize("'unterminated"),
            Err(XPathError::Syntax { offset: 0, .. })
        ));
    }
}
