/// Markup parser — turns a token stream into the parse tree for one pass.
///
/// Grammar:
/// - `expr := seq ('|' seq)*`
/// - `seq := atom*`
/// - `$name` → `Node::Symbol`
/// - `( expr )` → `Node::Choice`
/// - `[$name = expr]` → `Node::Assign` (emits its value)
/// - `{$name = expr}` → `Node::Assign` (silent)
/// - `[n]` → weight of the enclosing alternative
/// - `.name(args)` → transform call on the preceding symbol, choice or assignment
/// - Everything else → `Node::Text`

use std::fmt;

use crate::core::lexer::{tokenize, LexError, Spanned, Token};

/// One `.name(args)` call in a transform chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformCall {
    pub name: String,
    pub args: Vec<String>,
}

impl fmt::Display for TransformCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}({})", self.name, self.args.join(","))
    }
}

/// One alternative of an expression, with its optional `[n]` weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub nodes: Vec<Node>,
    pub weight: Option<f64>,
}

impl Alternative {
    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// A `|`-separated expression. A single alternative is a plain sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub alternatives: Vec<Alternative>,
    /// Source text of the expression, used to key sequencing state.
    pub source: String,
}

impl Expr {
    pub fn is_alternation(&self) -> bool {
        self.alternatives.len() > 1
    }
}

/// A node of the parse tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text, emitted as-is.
    Text(String),
    /// `$name` with its transform chain; `source` is the verbatim markup.
    Symbol {
        name: String,
        transforms: Vec<TransformCall>,
        source: String,
    },
    /// `( … | … )` with its transform chain.
    Choice {
        expr: Expr,
        transforms: Vec<TransformCall>,
    },
    /// `[$name = expr]` or `{$name = expr}`.
    Assign {
        name: String,
        value: Expr,
        transforms: Vec<TransformCall>,
        silent: bool,
    },
    /// A transform chain with nothing before it, applied to the empty string.
    Transforms(Vec<TransformCall>),
}

/// The parse tree for one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub root: Expr,
}

/// A front-end failure: either the tokenizer or the parser rejected the input.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxError {
    Lexer(LexError),
    Parser { position: usize, message: String },
}

/// Tokenize and parse a markup string.
pub fn parse(input: &str) -> Result<Script, SyntaxError> {
    let tokens = tokenize(input).map_err(SyntaxError::Lexer)?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
    };
    let root = parser.expr(None, 0)?;
    if let Some(tok) = parser.peek() {
        return Err(parser.error_at(
            tok.span.start,
            format!("unexpected '{}'", &input[tok.span.clone()]),
        ));
    }
    Ok(Script { root })
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn end_offset(&self) -> usize {
        self.peek().map_or(self.input.len(), |t| t.span.start)
    }

    fn error_at(&self, position: usize, message: String) -> SyntaxError {
        SyntaxError::Parser { position, message }
    }

    /// Parse alternatives until `close` (not consumed) or end of input.
    fn expr(&mut self, close: Option<Token>, start: usize) -> Result<Expr, SyntaxError> {
        let mut alternatives = vec![self.seq(close.as_ref())?];
        while matches!(self.peek_token(0), Some(Token::Pipe)) {
            self.pos += 1;
            alternatives.push(self.seq(close.as_ref())?);
        }
        let end = self.end_offset();
        Ok(Expr {
            alternatives,
            source: self.input[start..end].to_string(),
        })
    }

    fn seq(&mut self, close: Option<&Token>) -> Result<Alternative, SyntaxError> {
        let mut nodes = Vec::new();
        let mut weight = None;

        while let Some(spanned) = self.peek().cloned() {
            let token = spanned.token;
            let span = spanned.span;
            if close == Some(&token) {
                break;
            }
            match token {
                Token::Pipe => break,
                Token::Symbol(name) => {
                    self.pos += 1;
                    let transforms = self.transforms();
                    let source = self.input[span.start..self.end_offset()].to_string();
                    nodes.push(Node::Symbol {
                        name,
                        transforms,
                        source,
                    });
                }
                Token::OpenParen => {
                    self.pos += 1;
                    let expr = self.expr(Some(Token::CloseParen), span.start + 1)?;
                    self.expect(&Token::CloseParen, span.start, "unclosed '('")?;
                    let transforms = self.transforms();
                    nodes.push(Node::Choice { expr, transforms });
                }
                Token::OpenBracket => {
                    if self.assignment_ahead() {
                        nodes.push(self.assignment(span.start, false)?);
                    } else if let Some(w) = self.weight_ahead() {
                        weight = Some(w);
                    } else {
                        self.pos += 1;
                        push_text(&mut nodes, "[");
                    }
                }
                Token::OpenBrace => {
                    if !self.assignment_ahead() {
                        return Err(self.error_at(
                            span.start,
                            "'{' must open a silent assignment like {$name = value}".to_string(),
                        ));
                    }
                    nodes.push(self.assignment(span.start, true)?);
                }
                Token::Transform(_) => {
                    let transforms = self.transforms();
                    nodes.push(Node::Transforms(transforms));
                }
                Token::CloseParen | Token::CloseBrace => {
                    return Err(self.error_at(
                        span.start,
                        format!("unexpected '{}'", &self.input[span]),
                    ));
                }
                Token::CloseBracket => {
                    self.pos += 1;
                    push_text(&mut nodes, "]");
                }
                _ => {
                    self.pos += 1;
                    push_text(&mut nodes, &self.input[span]);
                }
            }
        }
        Ok(Alternative { nodes, weight })
    }

    fn transforms(&mut self) -> Vec<TransformCall> {
        let mut calls = Vec::new();
        while let Some(Token::Transform(call)) = self.peek_token(0) {
            calls.push(call.clone());
            self.pos += 1;
        }
        calls
    }

    fn expect(&mut self, token: &Token, opened_at: usize, message: &str) -> Result<(), SyntaxError> {
        if self.peek_token(0) == Some(token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error_at(opened_at, message.to_string()))
        }
    }

    /// Index of the next non-whitespace token, starting `offset` tokens ahead.
    fn skip_ws(&self, mut offset: usize) -> usize {
        while matches!(self.peek_token(offset), Some(Token::Whitespace)) {
            offset += 1;
        }
        offset
    }

    /// `[` or `{` followed by `$name =`.
    fn assignment_ahead(&self) -> bool {
        let sym = self.skip_ws(1);
        if !matches!(self.peek_token(sym), Some(Token::Symbol(_))) {
            return false;
        }
        let eq = self.skip_ws(sym + 1);
        matches!(self.peek_token(eq), Some(Token::Equals))
    }

    fn assignment(&mut self, start: usize, silent: bool) -> Result<Node, SyntaxError> {
        let (close, message) = if silent {
            (Token::CloseBrace, "unclosed '{'")
        } else {
            (Token::CloseBracket, "unclosed '['")
        };
        let sym = self.skip_ws(1);
        let name = match self.peek_token(sym) {
            Some(Token::Symbol(name)) => name.clone(),
            _ => return Err(self.error_at(start, "expected a symbol".to_string())),
        };
        let eq = self.skip_ws(sym + 1);
        self.pos += eq + 1;
        let value_start = self.end_offset();
        let value = self.expr(Some(close.clone()), value_start)?;
        self.expect(&close, start, message)?;
        let transforms = if silent { Vec::new() } else { self.transforms() };
        Ok(Node::Assign {
            name,
            value,
            transforms,
            silent,
        })
    }

    /// `[ 2.5 ]`: consumes the annotation and returns the weight if it is one.
    fn weight_ahead(&mut self) -> Option<f64> {
        let mut offset = self.skip_ws(1);
        let mut number = String::new();
        while let Some(spanned) = self.tokens.get(self.pos + offset) {
            match spanned.token {
                Token::Text | Token::Dot => {
                    number.push_str(&self.input[spanned.span.clone()]);
                    offset += 1;
                }
                _ => break,
            }
        }
        let close = self.skip_ws(offset);
        if self.peek_token(close) != Some(&Token::CloseBracket) {
            return None;
        }
        let weight: f64 = number.parse().ok()?;
        if !weight.is_finite() || weight < 0.0 {
            return None;
        }
        self.pos += close + 1;
        Some(weight)
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(prev)) = nodes.last_mut() {
        prev.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &str) -> Vec<Node> {
        let script = parse(input).unwrap();
        assert_eq!(script.root.alternatives.len(), 1);
        script.root.alternatives[0].nodes.clone()
    }

    #[test]
    fn literal_text_is_merged() {
        assert_eq!(
            single("Hello, world."),
            vec![Node::Text("Hello, world.".to_string())]
        );
    }

    #[test]
    fn symbol_with_transforms() {
        let nodes = single("$pet.capitalize().uc() runs");
        match &nodes[0] {
            Node::Symbol {
                name,
                transforms,
                source,
            } => {
                assert_eq!(name, "pet");
                assert_eq!(transforms.len(), 2);
                assert_eq!(transforms[1].name, "uc");
                assert_eq!(source, "$pet.capitalize().uc()");
            }
            other => panic!("expected symbol, got {:?}", other),
        }
        assert_eq!(nodes[1], Node::Text(" runs".to_string()));
    }

    #[test]
    fn choice_with_weights() {
        let nodes = single("($bird [9] | $mammal)");
        let Node::Choice { expr, transforms } = &nodes[0] else {
            panic!("expected choice");
        };
        assert!(transforms.is_empty());
        assert_eq!(expr.alternatives.len(), 2);
        assert_eq!(expr.alternatives[0].weight, Some(9.0));
        assert_eq!(expr.alternatives[1].weight(), 1.0);
        assert_eq!(expr.source, "$bird [9] | $mammal");
    }

    #[test]
    fn decimal_weight() {
        let nodes = single("(a [0.5] | b)");
        let Node::Choice { expr, .. } = &nodes[0] else {
            panic!("expected choice");
        };
        assert_eq!(expr.alternatives[0].weight, Some(0.5));
    }

    #[test]
    fn top_level_alternation() {
        let script = parse("hello | name").unwrap();
        assert!(script.root.is_alternation());
    }

    #[test]
    fn inline_assignment() {
        let nodes = single("[$chosen = $person] talks to $chosen.");
        let Node::Assign {
            name,
            value,
            silent,
            ..
        } = &nodes[0]
        else {
            panic!("expected assignment");
        };
        assert_eq!(name, "chosen");
        assert!(!silent);
        assert!(matches!(&value.alternatives[0].nodes[0], Node::Symbol { name, .. } if name == "person"));
    }

    #[test]
    fn silent_assignment() {
        let nodes = single("{$x = (a|b)}$x");
        assert!(matches!(&nodes[0], Node::Assign { silent: true, .. }));
        assert!(matches!(&nodes[1], Node::Symbol { .. }));
    }

    #[test]
    fn bare_transform_chain() {
        let nodes = single(".randomPosition().");
        assert!(matches!(&nodes[0], Node::Transforms(calls) if calls[0].name == "randomPosition"));
        assert_eq!(nodes[1], Node::Text(".".to_string()));
    }

    #[test]
    fn brackets_without_meaning_are_text() {
        assert_eq!(single("see [note]"), vec![Node::Text("see [note]".to_string())]);
    }

    #[test]
    fn unclosed_paren_is_error() {
        let err = parse("(a | b").unwrap_err();
        assert!(matches!(err, SyntaxError::Parser { position: 0, .. }));
    }

    #[test]
    fn stray_close_is_error() {
        assert!(matches!(parse("a ) b"), Err(SyntaxError::Parser { position: 2, .. })));
        assert!(matches!(parse("a } b"), Err(SyntaxError::Parser { .. })));
    }

    #[test]
    fn brace_without_assignment_is_error() {
        assert!(matches!(parse("{ plain }"), Err(SyntaxError::Parser { .. })));
    }

    #[test]
    fn lexer_errors_surface() {
        assert!(matches!(parse("a $ b"), Err(SyntaxError::Lexer(_))));
    }
}
