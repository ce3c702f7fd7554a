//! Expression syntax tree and parser.
//!
//! The grammar is deliberately small:
//!
//! ```text
//! expr     := or ( '?' expr ':' expr )?
//! or       := and ( '||' and )*
//! and      := equality ( '&&' equality )*
//! equality := concat ( ('==' | '!=') concat )*
//! concat   := unary ( '+' unary )*
//! unary    := '!' unary | primary
//! primary  := string | number | 'true' | 'false' | 'null'
//!           | ident ( '.' ident )* | '(' expr ')'
//! ```
//!
//! `===` and `!==` are accepted as spellings of `==` and `!=`.

use super::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A parsed template expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Field path into the data object, e.g. `cta.label`
    Field(Vec<String>),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Concat(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Num(f64),
    Ident(String),
    Dot,
    Question,
    Colon,
    Plus,
    Bang,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, EvalError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let syntax = |message: String, offset: usize| EvalError::Syntax { message, offset };

    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let peek = chars.get(i + 1).map(|&(_, c)| c);
        let peek2 = chars.get(i + 2).map(|&(_, c)| c);
        match c {
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    let Some(&(_, ch)) = chars.get(i) else {
                        return Err(syntax("unterminated string".into(), pos));
                    };
                    i += 1;
                    match ch {
                        '\\' => {
                            let Some(&(_, esc)) = chars.get(i) else {
                                return Err(syntax("unterminated string".into(), pos));
                            };
                            i += 1;
                            value.push(match esc {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                        ch if ch == quote => break,
                        ch => value.push(ch),
                    }
                }
                tokens.push((Token::Str(value), pos));
                continue;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| syntax(format!("invalid number '{}'", text), pos))?;
                tokens.push((Token::Num(num), pos));
                continue;
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '$')
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                tokens.push((Token::Ident(ident), pos));
                continue;
            }
            '.' => tokens.push((Token::Dot, pos)),
            '?' => tokens.push((Token::Question, pos)),
            ':' => tokens.push((Token::Colon, pos)),
            '+' => tokens.push((Token::Plus, pos)),
            '(' => tokens.push((Token::LParen, pos)),
            ')' => tokens.push((Token::RParen, pos)),
            '!' if peek == Some('=') => {
                i += if peek2 == Some('=') { 2 } else { 1 };
                tokens.push((Token::NotEq, pos));
            }
            '!' => tokens.push((Token::Bang, pos)),
            '=' if peek == Some('=') => {
                i += if peek2 == Some('=') { 2 } else { 1 };
                tokens.push((Token::EqEq, pos));
            }
            '&' if peek == Some('&') => {
                i += 1;
                tokens.push((Token::AndAnd, pos));
            }
            '|' if peek == Some('|') => {
                i += 1;
                tokens.push((Token::OrOr, pos));
            }
            other => return Err(syntax(format!("unexpected character '{}'", other), pos)),
        }
        i += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    depth_limit: usize,
    end_offset: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|&(_, o)| o)
            .unwrap_or(self.end_offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), EvalError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(EvalError::Syntax {
                message: format!("expected {}", what),
                offset: self.offset(),
            })
        }
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > self.depth_limit {
            return Err(EvalError::DepthLimit(self.depth_limit));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, EvalError> {
        self.enter()?;
        let cond = self.or()?;
        let result = if self.eat(&Token::Question) {
            let then = self.expr()?;
            self.expect(&Token::Colon, "':' in conditional")?;
            let otherwise = self.expr()?;
            Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            }
        } else {
            cond
        };
        self.depth -= 1;
        Ok(result)
    }

    // Each binary node in a chain nests its left operand one level deeper,
    // so chains count against the depth limit like parentheses do.
    fn leave_chain(&mut self, links: usize) {
        self.depth -= links;
    }

    fn or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.and()?;
        let mut links = 0;
        while self.eat(&Token::OrOr) {
            self.enter()?;
            links += 1;
            let rhs = self.and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.leave_chain(links);
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.equality()?;
        let mut links = 0;
        while self.eat(&Token::AndAnd) {
            self.enter()?;
            links += 1;
            let rhs = self.equality()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.leave_chain(links);
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.concat()?;
        let mut links = 0;
        loop {
            let op = if self.eat(&Token::EqEq) {
                CompareOp::Eq
            } else if self.eat(&Token::NotEq) {
                CompareOp::Ne
            } else {
                break;
            };
            self.enter()?;
            links += 1;
            let rhs = self.concat()?;
            lhs = Expr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.leave_chain(links);
        Ok(lhs)
    }

    fn concat(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.unary()?;
        let mut links = 0;
        while self.eat(&Token::Plus) {
            self.enter()?;
            links += 1;
            let rhs = self.unary()?;
            lhs = Expr::Concat(Box::new(lhs), Box::new(rhs));
        }
        self.leave_chain(links);
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Bang) {
            self.enter()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let offset = self.offset();
        let Some((token, _)) = self.tokens.get(self.pos).cloned() else {
            return Err(EvalError::Syntax {
                message: "unexpected end of expression".into(),
                offset,
            });
        };
        self.pos += 1;
        match token {
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Num(n) => Ok(Expr::Literal(Literal::Num(n))),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" | "undefined" => Ok(Expr::Literal(Literal::Null)),
                _ => {
                    let mut path = vec![name];
                    while self.eat(&Token::Dot) {
                        match self.tokens.get(self.pos).cloned() {
                            Some((Token::Ident(seg), _)) => {
                                self.pos += 1;
                                path.push(seg);
                            }
                            _ => {
                                return Err(EvalError::Syntax {
                                    message: "expected field name after '.'".into(),
                                    offset: self.offset(),
                                })
                            }
                        }
                    }
                    Ok(Expr::Field(path))
                }
            },
            other => Err(EvalError::Syntax {
                message: format!("unexpected token {:?}", other),
                offset,
            }),
        }
    }
}

/// Parse one expression, rejecting trailing input and nesting beyond `depth_limit`.
pub fn parse_expression(src: &str, depth_limit: usize) -> Result<Expr, EvalError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        depth_limit,
        end_offset: src.len(),
    };
    let expr = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(EvalError::Syntax {
            message: "unexpected trailing input".into(),
            offset: parser.offset(),
        });
    }
    Ok(expr)
}
