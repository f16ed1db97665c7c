//! Parser for the user-facing query language
//!
//! Supported syntax:
//!
//! - bare terms and quoted phrases: `cancer`, `"gene therapy"`
//! - fielded terms: `author:Smith`, `title:"deep learning"`, `title:(rna OR dna)`
//! - ranges: `year:[2018 TO 2021]`, `*` for an open bound
//! - operators `AND`/`&&`, `OR`/`||`, `NOT`/`!`, a leading `-` and parentheses
//!
//! Adjacent terms are joined with AND. AND binds tighter than OR.

use super::QueryNode;
use crate::error::{MedlineError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Phrase(String),
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

/// Parse query text into a tree
///
/// Blank input yields [`QueryNode::empty`], which no provider can translate.
///
/// ```
/// use medline_fetcher::query::{QueryNode, parse_query};
///
/// let tree = parse_query("author:Smith year:2018").unwrap();
/// assert_eq!(
///     tree,
///     QueryNode::and(vec![
///         QueryNode::field("author", "Smith"),
///         QueryNode::field("year", "2018"),
///     ])
/// );
/// ```
pub fn parse_query(input: &str) -> Result<QueryNode> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(QueryNode::empty());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = parser.parse_or()?;

    match parser.peek() {
        None => Ok(node),
        Some(token) => Err(invalid(format!("Unexpected {}", describe(token)))),
    }
}

fn invalid(message: String) -> MedlineError {
    MedlineError::InvalidQuery(message)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Word(word) => format!("'{}'", word),
        Token::Phrase(phrase) => format!("\"{}\"", phrase),
        Token::Colon => "':'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | '[' | ']' | ':' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    _ => Token::Colon,
                });
            }
            '"' => {
                chars.next();
                let mut phrase = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                phrase.push(escaped);
                            }
                        }
                        _ => phrase.push(c),
                    }
                }
                if !closed {
                    return Err(invalid("Unterminated quoted phrase".to_string()));
                }
                tokens.push(Token::Phrase(phrase));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | ':' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operator {
    And,
    Or,
    Not,
}

fn operator(token: &Token) -> Option<Operator> {
    match token {
        Token::Word(word) => match word.as_str() {
            "AND" | "&&" => Some(Operator::And),
            "OR" | "||" => Some(Operator::Or),
            "NOT" | "!" => Some(Operator::Not),
            _ => None,
        },
        _ => None,
    }
}

/// Maximum nesting of groups and negations
const MAX_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_operator(&self) -> Option<Operator> {
        self.peek().and_then(operator)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(invalid(format!(
                "Expected {} but found {}",
                describe(&expected),
                describe(&token)
            ))),
            None => Err(invalid(format!(
                "Expected {} at end of query",
                describe(&expected)
            ))),
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(invalid("Query is nested too deeply".to_string()));
        }
        Ok(())
    }

    fn parse_group(&mut self) -> Result<QueryNode> {
        self.descend()?;
        let inner = self.parse_or()?;
        self.expect(Token::RParen)?;
        self.depth -= 1;
        Ok(inner)
    }

    fn parse_or(&mut self) -> Result<QueryNode> {
        let mut children = vec![self.parse_and()?];
        while self.peek_operator() == Some(Operator::Or) {
            self.pos += 1;
            children.push(self.parse_and()?);
        }
        Ok(collapse(children, QueryNode::Or))
    }

    fn parse_and(&mut self) -> Result<QueryNode> {
        let mut children = vec![self.parse_unary()?];
        loop {
            match self.peek_operator() {
                Some(Operator::And) => {
                    self.pos += 1;
                    children.push(self.parse_unary()?);
                }
                Some(Operator::Or) => break,
                Some(Operator::Not) => children.push(self.parse_unary()?),
                None => match self.peek() {
                    None | Some(Token::RParen) => break,
                    Some(_) => children.push(self.parse_unary()?),
                },
            }
        }
        Ok(collapse(children, QueryNode::And))
    }

    fn parse_unary(&mut self) -> Result<QueryNode> {
        if self.peek_operator() == Some(Operator::Not) {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(QueryNode::negate(inner));
        }

        let stripped = match self.peek() {
            Some(Token::Word(word))
                if word.len() > 1 && (word.starts_with('-') || word.starts_with('!')) =>
            {
                Some(word[1..].to_string())
            }
            _ => None,
        };
        if let Some(rest) = stripped {
            self.tokens[self.pos] = Token::Word(rest);
            return Ok(QueryNode::negate(self.parse_primary()?));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<QueryNode> {
        match self.advance() {
            Some(Token::LParen) => self.parse_group(),
            Some(Token::Phrase(phrase)) => Ok(QueryNode::Unfielded(phrase)),
            Some(Token::Word(word)) => {
                if let Some(op) = operator(&Token::Word(word.clone())) {
                    return Err(invalid(format!("Operator {:?} is missing an operand", op)));
                }
                if self.peek() == Some(&Token::Colon) {
                    self.pos += 1;
                    return self.parse_field_value(word);
                }
                Ok(QueryNode::Unfielded(word))
            }
            Some(token) => Err(invalid(format!("Unexpected {}", describe(&token)))),
            None => Err(invalid("Unexpected end of query".to_string())),
        }
    }

    fn parse_field_value(&mut self, field: String) -> Result<QueryNode> {
        match self.advance() {
            Some(Token::Phrase(value)) => Ok(QueryNode::Field { field, value }),
            Some(Token::Word(word)) => {
                // values such as DOIs or URLs may contain further colons
                let mut value = word;
                while self.peek() == Some(&Token::Colon) {
                    match self.tokens.get(self.pos + 1) {
                        Some(Token::Word(next)) => {
                            value.push(':');
                            value.push_str(next);
                            self.pos += 2;
                        }
                        _ => break,
                    }
                }
                Ok(QueryNode::Field { field, value })
            }
            Some(Token::LBracket) => {
                let lower = self.parse_range_bound()?;
                match self.advance() {
                    Some(Token::Word(to)) if to.eq_ignore_ascii_case("TO") => {}
                    _ => return Err(invalid(format!("Range on '{}' is missing TO", field))),
                }
                let upper = self.parse_range_bound()?;
                self.expect(Token::RBracket)?;
                Ok(QueryNode::Range {
                    field,
                    lower,
                    upper,
                })
            }
            Some(Token::LParen) => {
                let inner = self.parse_group()?;
                Ok(apply_field(inner, &field))
            }
            _ => Err(invalid(format!("Field '{}' has no value", field))),
        }
    }

    fn parse_range_bound(&mut self) -> Result<Option<String>> {
        match self.advance() {
            Some(Token::Word(word)) if word == "*" => Ok(None),
            Some(Token::Word(word)) | Some(Token::Phrase(word)) => Ok(Some(word)),
            Some(token) => Err(invalid(format!(
                "Unexpected {} in range",
                describe(&token)
            ))),
            None => Err(invalid("Unterminated range".to_string())),
        }
    }
}

fn collapse(mut children: Vec<QueryNode>, combine: fn(Vec<QueryNode>) -> QueryNode) -> QueryNode {
    if children.len() == 1 {
        children.remove(0)
    } else {
        combine(children)
    }
}

/// Push a group-level field (`title:(a OR b)`) down onto its bare terms
fn apply_field(node: QueryNode, field: &str) -> QueryNode {
    match node {
        QueryNode::Unfielded(value) => QueryNode::Field {
            field: field.to_string(),
            value,
        },
        QueryNode::And(children) => QueryNode::And(
            children
                .into_iter()
                .map(|child| apply_field(child, field))
                .collect(),
        ),
        QueryNode::Or(children) => QueryNode::Or(
            children
                .into_iter()
                .map(|child| apply_field(child, field))
                .collect(),
        ),
        QueryNode::Not(child) => QueryNode::Not(Box::new(apply_field(*child, field))),
        fielded @ (QueryNode::Field { .. } | QueryNode::Range { .. }) => fielded,
    }
}
