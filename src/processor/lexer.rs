//! Hand-written lexer for the room script language.
//
//  Lexical items:
//
//      Ident    ::= [A-Za-z_][A-Za-z0-9_]*     (keywords are recognised here)
//      Number   ::= [0-9]+                     (fits in i32)
//      Str      ::= '"' ( [^"\\] | '\' ["\\n] )* '"'
//      Symbols  ::= ( ) { } , ; = == != < <= > >= + - * / % && || !
//      Whitespace, `// …` and `/* … */` comments are discarded.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::SyntaxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Number(i32),
    Str(String),

    // keywords
    Function,
    Inline,
    Const,
    Var,
    If,
    Else,
    While,
    For,
    Break,
    Continue,
    Return,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Eof,
}

/// A token and the line it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
            line: 1,
            finished: false,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.next_char();
            true
        } else {
            false
        }
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F, buf: &mut String) {
        while let Some(c) = self.peek_char() {
            if pred(c) {
                buf.push(c);
                self.next_char();
            } else {
                break;
            }
        }
    }

    /// Skips whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.next_char();
                }
                Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.peek() {
                        Some('/') => {
                            while let Some(c) = self.next_char() {
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            let start = self.line;
                            self.next_char();
                            self.next_char();
                            let mut prev = '\0';
                            loop {
                                match self.next_char() {
                                    Some('/') if prev == '*' => break,
                                    Some(c) => prev = c,
                                    None => {
                                        return Err(SyntaxError::new(start, "unterminated comment"));
                                    }
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_word(&mut self, first: char) -> Token {
        let mut word = String::new();
        word.push(first);
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_', &mut word);
        match word.as_str() {
            "function" => Token::Function,
            "inline" => Token::Inline,
            "const" => Token::Const,
            "var" => Token::Var,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "for" => Token::For,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "return" => Token::Return,
            _ => Token::Ident(word),
        }
    }

    fn read_number(&mut self, first: char) -> Result<i32, SyntaxError> {
        let mut num = String::new();
        num.push(first);
        self.consume_while(|c| c.is_ascii_digit(), &mut num);
        num.parse::<i32>()
            .map_err(|_| SyntaxError::new(self.line, format!("number too large: {num}")))
    }

    fn read_string(&mut self) -> Result<String, SyntaxError> {
        let start = self.line;
        let mut txt = String::new();
        while let Some(c) = self.next_char() {
            match c {
                '"' => return Ok(txt),
                '\\' => match self.next_char() {
                    Some('n') => txt.push('\n'),
                    Some('"') => txt.push('"'),
                    Some('\\') => txt.push('\\'),
                    Some(other) => {
                        return Err(SyntaxError::new(
                            self.line,
                            format!("unknown escape sequence \\{other}"),
                        ));
                    }
                    None => break,
                },
                c => txt.push(c),
            }
        }
        Err(SyntaxError::new(start, "no closing \" found"))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Lexeme, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if let Err(e) = self.skip_trivia() {
            self.finished = true;
            return Some(Err(e));
        }

        let line = self.line;
        let ch = match self.next_char() {
            Some(c) => c,
            None => {
                self.finished = true;
                return Some(Ok(Lexeme {
                    token: Token::Eof,
                    line,
                }));
            }
        };

        let tok_res = match ch {
            '(' => Ok(Token::LParen),
            ')' => Ok(Token::RParen),
            '{' => Ok(Token::LBrace),
            '}' => Ok(Token::RBrace),
            ',' => Ok(Token::Comma),
            ';' => Ok(Token::Semicolon),
            '+' => Ok(Token::Plus),
            '-' => Ok(Token::Minus),
            '*' => Ok(Token::Star),
            '/' => Ok(Token::Slash),
            '%' => Ok(Token::Percent),
            '=' if self.eat('=') => Ok(Token::EqEq),
            '=' => Ok(Token::Assign),
            '!' if self.eat('=') => Ok(Token::NotEq),
            '!' => Ok(Token::Bang),
            '<' if self.eat('=') => Ok(Token::Le),
            '<' => Ok(Token::Lt),
            '>' if self.eat('=') => Ok(Token::Ge),
            '>' => Ok(Token::Gt),
            '&' if self.eat('&') => Ok(Token::AndAnd),
            '|' if self.eat('|') => Ok(Token::OrOr),
            '"' => self.read_string().map(Token::Str),
            c if c.is_ascii_digit() => self.read_number(c).map(Token::Number),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_word(c)),
            e => Err(SyntaxError::new(line, format!("unexpected character `{e}`"))),
        };

        Some(tok_res.map(|token| Lexeme { token, line }))
    }
}
