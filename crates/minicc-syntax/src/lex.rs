//! Hand-written lexer producing a flat token stream.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fmt;

/// Keywords of the supported subset.
static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let source = "void _Bool char short int long float double signed unsigned
    struct union enum typedef static extern auto register const volatile
    restrict if else while for do switch case default break continue goto
    return sizeof";
    source.split_whitespace().collect()
});

/// A C token.
#[derive(Clone, PartialEq)]
pub enum Token {
    Keyword(String),
    Identifier(String),
    Integer(i64),
    CharLiteral(u8),
    StringLiteral(String),
    Punct(Punct),
}

impl Token {
    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, Token::Keyword(s) if s == kw)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;
        match self {
            Keyword(s) => write!(f, "Kw({})", s),
            Identifier(s) => write!(f, "Id({})", s),
            Integer(i) => write!(f, "Int({})", i),
            CharLiteral(c) => write!(f, "Chr({:?})", *c as char),
            StringLiteral(s) => write!(f, "Str({:?})", s),
            Punct(p) => write!(f, "Pun({})", p),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(s) | Token::Identifier(s) => f.write_str(s),
            Token::Integer(i) => write!(f, "{}", i),
            Token::CharLiteral(c) => write!(f, "{:?}", *c as char),
            Token::StringLiteral(s) => write!(f, "{:?}", s),
            Token::Punct(p) => write!(f, "{}", p),
        }
    }
}

impl From<Punct> for Token {
    fn from(p: Punct) -> Self {
        Token::Punct(p)
    }
}

/// Punctuators, including the multi-character operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Assign,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    BangEqual,
    AmpAmp,
    PipePipe,
    ShiftLeft,
    ShiftRight,
    PlusPlus,
    MinusMinus,
    Arrow,
    Dot,
    Ellipsis,
    Comma,
    Semicolon,
    Colon,
    Question,
    ParenOpen,
    ParenClose,
    CurlyOpen,
    CurlyClose,
    SquareOpen,
    SquareClose,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
}

impl fmt::Display for Punct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Punct::*;
        let s = match self {
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Ampersand => "&",
            Pipe => "|",
            Caret => "^",
            Tilde => "~",
            Bang => "!",
            Assign => "=",
            Less => "<",
            Greater => ">",
            LessEqual => "<=",
            GreaterEqual => ">=",
            EqualEqual => "==",
            BangEqual => "!=",
            AmpAmp => "&&",
            PipePipe => "||",
            ShiftLeft => "<<",
            ShiftRight => ">>",
            PlusPlus => "++",
            MinusMinus => "--",
            Arrow => "->",
            Dot => ".",
            Ellipsis => "...",
            Comma => ",",
            Semicolon => ";",
            Colon => ":",
            Question => "?",
            ParenOpen => "(",
            ParenClose => ")",
            CurlyOpen => "{",
            CurlyClose => "}",
            SquareOpen => "[",
            SquareClose => "]",
            PlusAssign => "+=",
            MinusAssign => "-=",
            StarAssign => "*=",
            SlashAssign => "/=",
            PercentAssign => "%=",
            ShiftLeftAssign => "<<=",
            ShiftRightAssign => ">>=",
            AmpAssign => "&=",
            PipeAssign => "|=",
            CaretAssign => "^=",
        };
        f.write_str(s)
    }
}

/// A token together with the 1-based source line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub line: u32,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LexError {}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
}

/// Tokenize a whole translation unit.
pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, LexError> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
    };
    let mut out = Vec::new();
    while let Some(lexeme) = lexer.next_lexeme()? {
        out.push(lexeme);
    }
    log::debug!("lexed {} tokens", out.len());
    Ok(out)
}

impl<'a> Lexer<'a> {
    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            line: self.line,
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    // Look ahead without consuming the slash on a miss.
                    let mut probe = self.chars.clone();
                    probe.next();
                    match probe.peek() {
                        Some('/') => {
                            while let Some(c) = self.bump() {
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            self.bump();
                            self.bump();
                            let mut prev = '\0';
                            loop {
                                match self.bump() {
                                    Some('/') if prev == '*' => break,
                                    Some(c) => prev = c,
                                    None => {
                                        return Err(self.error("unterminated block comment"))
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

    fn next_lexeme(&mut self) -> Result<Option<Lexeme>, LexError> {
        self.skip_trivia()?;
        let line = self.line;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = if c.is_ascii_alphabetic() || c == '_' {
            self.lex_word()
        } else if c.is_ascii_digit() {
            self.lex_number()?
        } else if c == '\'' {
            self.lex_char()?
        } else if c == '"' {
            self.lex_string()?
        } else {
            self.lex_punct()?
        };

        Ok(Some(Lexeme { token, line }))
    }

    fn lex_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if KEYWORDS.contains(word.as_str()) {
            Token::Keyword(word)
        } else {
            Token::Identifier(word)
        }
    }

    fn lex_number(&mut self) -> Result<Token, LexError> {
        let mut digits = String::new();
        let radix;
        if self.peek() == Some('0') {
            self.bump();
            if self.eat('x') || self.eat('X') {
                radix = 16;
            } else if matches!(self.peek(), Some(c) if c.is_digit(8)) {
                radix = 8;
            } else {
                radix = 10;
                digits.push('0');
            }
        } else {
            radix = 10;
        }
        while let Some(c) = self.peek() {
            if c.is_digit(radix) {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        // Integer suffixes are accepted and ignored.
        while matches!(self.peek(), Some('u') | Some('U') | Some('l') | Some('L')) {
            self.bump();
        }
        if digits.is_empty() {
            return Err(self.error("malformed integer literal"));
        }
        i64::from_str_radix(&digits, radix)
            .map(Token::Integer)
            .map_err(|_| self.error(format!("integer literal out of range: {}", digits)))
    }

    fn lex_escape(&mut self) -> Result<u8, LexError> {
        match self.bump() {
            Some('n') => Ok(b'\n'),
            Some('t') => Ok(b'\t'),
            Some('r') => Ok(b'\r'),
            Some('0') => Ok(0),
            Some('\\') => Ok(b'\\'),
            Some('\'') => Ok(b'\''),
            Some('"') => Ok(b'"'),
            Some('x') => {
                let mut value: u32 = 0;
                let mut seen = false;
                while let Some(c) = self.peek() {
                    match c.to_digit(16) {
                        Some(d) => {
                            value = value * 16 + d;
                            seen = true;
                            self.bump();
                        }
                        None => break,
                    }
                }
                if !seen {
                    return Err(self.error("\\x escape with no hex digits"));
                }
                Ok(value as u8)
            }
            Some(other) => Err(self.error(format!("unknown escape: \\{}", other))),
            None => Err(self.error("unterminated escape sequence")),
        }
    }

    fn lex_char(&mut self) -> Result<Token, LexError> {
        self.bump(); // opening quote
        let value = match self.bump() {
            Some('\\') => self.lex_escape()?,
            Some('\'') => return Err(self.error("empty character constant")),
            Some(c) => c as u8,
            None => return Err(self.error("unterminated character constant")),
        };
        if !self.eat('\'') {
            return Err(self.error("unterminated character constant"));
        }
        Ok(Token::CharLiteral(value))
    }

    fn lex_string(&mut self) -> Result<Token, LexError> {
        self.bump(); // opening quote
        let mut content = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => content.push(self.lex_escape()? as char),
                Some('\n') | None => return Err(self.error("unterminated string literal")),
                Some(c) => content.push(c),
            }
        }
        Ok(Token::StringLiteral(content))
    }

    fn lex_punct(&mut self) -> Result<Token, LexError> {
        use Punct::*;
        let c = self.bump().expect("peeked before call");
        let p = match c {
            '+' => {
                if self.eat('+') {
                    PlusPlus
                } else if self.eat('=') {
                    PlusAssign
                } else {
                    Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    MinusMinus
                } else if self.eat('=') {
                    MinusAssign
                } else if self.eat('>') {
                    Arrow
                } else {
                    Minus
                }
            }
            '*' => {
                if self.eat('=') {
                    StarAssign
                } else {
                    Star
                }
            }
            '/' => {
                if self.eat('=') {
                    SlashAssign
                } else {
                    Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    PercentAssign
                } else {
                    Percent
                }
            }
            '&' => {
                if self.eat('&') {
                    AmpAmp
                } else if self.eat('=') {
                    AmpAssign
                } else {
                    Ampersand
                }
            }
            '|' => {
                if self.eat('|') {
                    PipePipe
                } else if self.eat('=') {
                    PipeAssign
                } else {
                    Pipe
                }
            }
            '^' => {
                if self.eat('=') {
                    CaretAssign
                } else {
                    Caret
                }
            }
            '~' => Tilde,
            '!' => {
                if self.eat('=') {
                    BangEqual
                } else {
                    Bang
                }
            }
            '=' => {
                if self.eat('=') {
                    EqualEqual
                } else {
                    Assign
                }
            }
            '<' => {
                if self.eat('<') {
                    if self.eat('=') {
                        ShiftLeftAssign
                    } else {
                        ShiftLeft
                    }
                } else if self.eat('=') {
                    LessEqual
                } else {
                    Less
                }
            }
            '>' => {
                if self.eat('>') {
                    if self.eat('=') {
                        ShiftRightAssign
                    } else {
                        ShiftRight
                    }
                } else if self.eat('=') {
                    GreaterEqual
                } else {
                    Greater
                }
            }
            '.' => {
                if self.peek() == Some('.') {
                    let mut probe = self.chars.clone();
                    probe.next();
                    if probe.peek() == Some(&'.') {
                        self.bump();
                        self.bump();
                        Ellipsis
                    } else {
                        Dot
                    }
                } else {
                    Dot
                }
            }
            ',' => Comma,
            ';' => Semicolon,
            ':' => Colon,
            '?' => Question,
            '(' => ParenOpen,
            ')' => ParenClose,
            '{' => CurlyOpen,
            '}' => CurlyClose,
            '[' => SquareOpen,
            ']' => SquareClose,
            other => return Err(self.error(format!("unexpected character: {:?}", other))),
        };
        Ok(Token::Punct(p))
    }
}
