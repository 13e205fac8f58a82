//! Parser that consumes the lexer and builds the declarations and functions
//! of one script file.

use super::ast::*;
use super::lexer::{Lexeme, Lexer, Token};
use crate::error::SyntaxError;

/// Top-level content of one script, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedScript {
    pub declarations: Vec<Declaration>,
    pub functions: Vec<Function>,
}

/// Parses a whole script. On error nothing of the script is usable.
pub fn parse_script(src: &str) -> Result<ParsedScript, SyntaxError> {
    Parser::new(src).parse()
}

struct Parser<'a> {
    lex: std::iter::Peekable<Lexer<'a>>,
    line: usize,
}

/// Binding power of binary operators, higher binds tighter.
fn binary_op(token: &Token) -> Option<(BinOp, u8)> {
    let op = match token {
        Token::OrOr => (BinOp::Or, 1),
        Token::AndAnd => (BinOp::And, 2),
        Token::EqEq => (BinOp::Eq, 3),
        Token::NotEq => (BinOp::Ne, 3),
        Token::Lt => (BinOp::Lt, 4),
        Token::Le => (BinOp::Le, 4),
        Token::Gt => (BinOp::Gt, 4),
        Token::Ge => (BinOp::Ge, 4),
        Token::Plus => (BinOp::Add, 5),
        Token::Minus => (BinOp::Sub, 5),
        Token::Star => (BinOp::Mul, 6),
        Token::Slash => (BinOp::Div, 6),
        Token::Percent => (BinOp::Mod, 6),
        _ => return None,
    };
    Some(op)
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            lex: Lexer::new(src).peekable(),
            line: 1,
        }
    }

    fn parse(&mut self) -> Result<ParsedScript, SyntaxError> {
        let mut script = ParsedScript::default();
        loop {
            match self.peek()? {
                Token::Eof => return Ok(script),
                Token::Const => {
                    self.next()?;
                    let (name, value) = self.parse_const()?;
                    script.declarations.push(Declaration::constant(name, value));
                }
                Token::Function | Token::Inline => {
                    script.functions.push(self.parse_function()?);
                }
                t => return Err(self.error(format!("expected `const` or `function`, found {t:?}"))),
            }
        }
    }

    fn peek(&mut self) -> Result<Token, SyntaxError> {
        match self.lex.peek() {
            Some(Ok(lexeme)) => Ok(lexeme.token.clone()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(Token::Eof),
        }
    }

    fn peek_line(&mut self) -> usize {
        match self.lex.peek() {
            Some(Ok(lexeme)) => lexeme.line,
            _ => self.line,
        }
    }

    fn next(&mut self) -> Result<Lexeme, SyntaxError> {
        match self.lex.next() {
            Some(Ok(lexeme)) => {
                self.line = lexeme.line;
                Ok(lexeme)
            }
            Some(Err(e)) => Err(e),
            None => Ok(Lexeme {
                token: Token::Eof,
                line: self.line,
            }),
        }
    }

    fn error(&mut self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.peek_line(), message)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), SyntaxError> {
        let found = self.peek()?;
        if found != expected {
            return Err(self.error(format!("expected {what}, found {found:?}")));
        }
        self.next()?;
        Ok(())
    }

    fn ident(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek()? {
            Token::Ident(name) => {
                self.next()?;
                Ok(name)
            }
            found => Err(self.error(format!("expected {what}, found {found:?}"))),
        }
    }

    /// `NAME = [-]INT ;` – the `const` keyword is already consumed.
    fn parse_const(&mut self) -> Result<(String, i32), SyntaxError> {
        let name = self.ident("constant name")?;
        self.expect(Token::Assign, "`=`")?;
        let negative = self.peek()? == Token::Minus;
        if negative {
            self.next()?;
        }
        let value = match self.peek()? {
            Token::Number(n) => {
                self.next()?;
                if negative { -n } else { n }
            }
            found => return Err(self.error(format!("expected integer constant, found {found:?}"))),
        };
        self.expect(Token::Semicolon, "`;`")?;
        Ok((name, value))
    }

    fn parse_function(&mut self) -> Result<Function, SyntaxError> {
        let line = self.peek_line();
        let kind = if self.peek()? == Token::Inline {
            self.next()?;
            FunctionKind::Inlined
        } else {
            FunctionKind::Normal
        };
        self.expect(Token::Function, "`function`")?;
        let name = self.ident("function name")?;
        self.expect(Token::LParen, "`(`")?;
        self.expect(Token::RParen, "`)`, functions take no parameters")?;
        let body = self.parse_block()?;
        Ok(Function::new(kind, name, body, line))
    }

    fn parse_block(&mut self) -> Result<Stmt, SyntaxError> {
        let line = self.peek_line();
        self.expect(Token::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        loop {
            match self.peek()? {
                Token::RBrace => {
                    self.next()?;
                    return Ok(Stmt::new(line, StmtKind::Block(stmts)));
                }
                Token::Eof => return Err(self.error("unexpected end of script, missing `}`")),
                _ => stmts.push(self.parse_stmt()?),
            }
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let line = self.peek_line();
        let kind = match self.peek()? {
            Token::LBrace => return self.parse_block(),
            Token::Semicolon => {
                self.next()?;
                StmtKind::Block(Vec::new())
            }
            Token::Const => {
                self.next()?;
                let (name, value) = self.parse_const()?;
                StmtKind::Const { name, value }
            }
            Token::If => {
                self.next()?;
                let cond = self.parse_condition()?;
                let then = Box::new(self.parse_stmt()?);
                let otherwise = if self.peek()? == Token::Else {
                    self.next()?;
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                StmtKind::If {
                    cond,
                    then,
                    otherwise,
                }
            }
            Token::While => {
                self.next()?;
                let cond = self.parse_condition()?;
                let body = Box::new(self.parse_stmt()?);
                StmtKind::While { cond, body }
            }
            Token::For => {
                self.next()?;
                return self.parse_for(line);
            }
            Token::Break | Token::Continue | Token::Return => {
                let kind = match self.next()?.token {
                    Token::Break => StmtKind::Break,
                    Token::Continue => StmtKind::Continue,
                    _ => StmtKind::Return,
                };
                self.expect(Token::Semicolon, "`;`")?;
                kind
            }
            Token::Function | Token::Inline => {
                return Err(self.error("functions can't be nested"));
            }
            _ => {
                let stmt = self.parse_simple()?;
                self.expect(Token::Semicolon, "`;`")?;
                return Ok(stmt);
            }
        };
        Ok(Stmt::new(line, kind))
    }

    fn parse_condition(&mut self) -> Result<Expr, SyntaxError> {
        self.expect(Token::LParen, "`(`")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, "`)`")?;
        Ok(cond)
    }

    /// `( [init] ; [cond] ; [step] ) body` – the `for` keyword is already consumed.
    fn parse_for(&mut self, line: usize) -> Result<Stmt, SyntaxError> {
        self.expect(Token::LParen, "`(`")?;
        let init = match self.peek()? {
            Token::Semicolon => None,
            _ => Some(Box::new(self.parse_simple()?)),
        };
        self.expect(Token::Semicolon, "`;`")?;
        let cond = match self.peek()? {
            Token::Semicolon => None,
            _ => Some(self.parse_expr()?),
        };
        self.expect(Token::Semicolon, "`;`")?;
        let step = match self.peek()? {
            Token::RParen => None,
            _ => Some(Box::new(self.parse_simple()?)),
        };
        self.expect(Token::RParen, "`)`")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::new(
            line,
            StmtKind::For {
                init,
                cond,
                step,
                body,
            },
        ))
    }

    /// Variable declaration, assignment or bare expression, without the `;`.
    fn parse_simple(&mut self) -> Result<Stmt, SyntaxError> {
        let line = self.peek_line();
        if self.peek()? == Token::Var {
            self.next()?;
            let name = self.ident("variable name")?;
            let init = if self.peek()? == Token::Assign {
                self.next()?;
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(Stmt::new(line, StmtKind::Var { name, init }));
        }

        let expr = self.parse_expr()?;
        if self.peek()? != Token::Assign {
            return Ok(Stmt::new(line, StmtKind::Expr(expr)));
        }
        let name = match expr {
            Expr::Ident(name) => name,
            _ => return Err(self.error("invalid assignment target")),
        };
        self.next()?;
        let value = self.parse_expr()?;
        Ok(Stmt::new(line, StmtKind::Assign { name, value }))
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = binary_op(&self.peek()?) {
            if prec < min_prec {
                break;
            }
            self.next()?;
            let rhs = self.parse_binary(prec + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek()? {
            Token::Minus => UnOp::Neg,
            Token::Bang => UnOp::Not,
            _ => return self.parse_primary(),
        };
        self.next()?;
        // `-32768` has to stay a single word literal
        if let (UnOp::Neg, Token::Number(n)) = (op, self.peek()?) {
            self.next()?;
            return Ok(Expr::Int(-n));
        }
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let found = self.peek()?;
        let expr = match found {
            Token::Number(n) => Expr::Int(n),
            Token::Str(s) => Expr::Str(s),
            Token::Ident(name) => {
                self.next()?;
                if self.peek()? != Token::LParen {
                    return Ok(Expr::Ident(name));
                }
                self.next()?;
                let args = self.parse_args()?;
                return Ok(Expr::Call { name, args });
            }
            Token::LParen => {
                self.next()?;
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "`)`")?;
                return Ok(inner);
            }
            t => return Err(self.error(format!("expected expression, found {t:?}"))),
        };
        self.next()?;
        Ok(expr)
    }

    /// Call arguments up to and including the closing `)`.
    fn parse_args(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = Vec::new();
        if self.peek()? == Token::RParen {
            self.next()?;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.peek()? {
                Token::Comma => {
                    self.next()?;
                }
                Token::RParen => {
                    self.next()?;
                    return Ok(args);
                }
                t => return Err(self.error(format!("expected `,` or `)`, found {t:?}"))),
            }
        }
    }
}
