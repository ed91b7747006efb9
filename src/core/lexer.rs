/// Markup tokenizer — the first half of the syntax front end.

use logos::Logos;
use std::ops::Range;

use crate::core::parser::TransformCall;

/// All tokens of the markup notation.
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    /// `$name` — the sigil is stripped.
    #[regex(r"\$[A-Za-z0-9_][A-Za-z0-9_-]*", |lex| lex.slice()[1..].to_string())]
    Symbol(String),

    /// `.name()` or `.name(args)`.
    #[regex(r"\.[A-Za-z_][A-Za-z0-9_]*\([^()]*\)", transform_call)]
    Transform(TransformCall),

    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token("|")]
    Pipe,
    #[token("=")]
    Equals,

    /// A period that does not start a transform call.
    #[token(".")]
    Dot,

    #[regex(r"\s+")]
    Whitespace,

    /// Text content (catch-all for non-special characters)
    #[regex(r"[^\s$().\[\]{}|=]+")]
    Text,
}

fn transform_call(lex: &mut logos::Lexer<Token>) -> TransformCall {
    let body = &lex.slice()[1..];
    let open = body.find('(').unwrap_or(body.len());
    let name = body[..open].to_string();
    let inner = body
        .get(open + 1..body.len().saturating_sub(1))
        .unwrap_or("");
    let args = inner
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    TransformCall { name, args }
}

/// A token together with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

/// Failure to classify a character sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub position: usize,
    pub message: String,
}

/// Tokenize a markup string.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, LexError> {
    let mut lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push(Spanned { token, span }),
            Err(()) => {
                return Err(LexError {
                    position: span.start,
                    message: format!("unrecognized input '{}'", lexer.slice()),
                })
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn symbol_strips_sigil() {
        assert_eq!(
            kinds("$noun_phrase"),
            vec![Token::Symbol("noun_phrase".to_string())]
        );
        assert_eq!(kinds("$a-b"), vec![Token::Symbol("a-b".to_string())]);
    }

    #[test]
    fn alternation_tokens() {
        assert_eq!(
            kinds("(a|b)"),
            vec![
                Token::OpenParen,
                Token::Text,
                Token::Pipe,
                Token::Text,
                Token::CloseParen
            ]
        );
    }

    #[test]
    fn transform_with_and_without_args() {
        assert_eq!(
            kinds("$pet.capitalize()"),
            vec![
                Token::Symbol("pet".to_string()),
                Token::Transform(TransformCall {
                    name: "capitalize".to_string(),
                    args: vec![],
                }),
            ]
        );
        assert_eq!(
            kinds(".pick(a, b )"),
            vec![Token::Transform(TransformCall {
                name: "pick".to_string(),
                args: vec!["a".to_string(), "b".to_string()],
            })]
        );
    }

    #[test]
    fn sentence_period_is_a_dot() {
        assert_eq!(
            kinds("shoots."),
            vec![Token::Text, Token::Dot]
        );
        assert_eq!(
            kinds("a.b"),
            vec![Token::Text, Token::Dot, Token::Text]
        );
    }

    #[test]
    fn entities_stay_in_text() {
        assert_eq!(
            kinds("hello &#124; name"),
            vec![
                Token::Text,
                Token::Whitespace,
                Token::Text,
                Token::Whitespace,
                Token::Text
            ]
        );
    }

    #[test]
    fn assignment_tokens() {
        assert_eq!(
            kinds("[$x = a]"),
            vec![
                Token::OpenBracket,
                Token::Symbol("x".to_string()),
                Token::Whitespace,
                Token::Equals,
                Token::Whitespace,
                Token::Text,
                Token::CloseBracket
            ]
        );
    }

    #[test]
    fn spans_point_into_source() {
        let tokens = tokenize("hi $you").unwrap();
        assert_eq!(tokens[2].span, 3..7);
    }

    #[test]
    fn lone_sigil_is_an_error() {
        let err = tokenize("costs $ 5").unwrap_err();
        assert_eq!(err.position, 6);
    }
}
