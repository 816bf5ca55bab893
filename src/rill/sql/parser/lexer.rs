//! Scanner for streaming SQL text.
//!
//! The [`Scanner`] turns query text into `(Token, literal)` pairs one at a time. It
//! keeps character-level pushback only; token-level lookahead is the parser's job.
//!
//! Whitespace and comments come back as [`Token::Ws`] and [`Token::Comment`] so the
//! parser can decide to skip them. Keywords are matched case-insensitively, while
//! identifier literals keep their original case. Words that are only meaningful inside
//! stream definitions (`CREATE`, `WITH`, type names, option keys) are left as
//! identifiers and matched by the statement parser, so they stay usable as column names.

use std::fmt;

const EOF_CHAR: char = '\0';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // Special tokens
    Illegal,
    Eof,
    Ws,
    Comment,
    As,

    // Literals
    Ident,
    Integer,
    Number,
    String,
    BadString,

    // Operators
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Subset,
    Arrow,
    In,
    Not,
    Between,
    Like,

    // Misc characters
    Asterisk,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Hash,
    Dot,
    Colon,
    Semicolon,

    // Keywords
    Select,
    From,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Cross,
    On,
    Where,
    Group,
    Order,
    Having,
    By,
    Asc,
    Desc,
    Filter,
    Case,
    When,
    Then,
    Else,
    End,
    Over,
    Partition,
    True,
    False,

    // Time units
    Dd,
    Hh,
    Mi,
    Ss,
    Ms,
}

impl Token {
    pub fn as_str(&self) -> &'static str {
        match self {
            Token::Illegal => "ILLEGAL",
            Token::Eof => "EOF",
            Token::Ws => "WS",
            Token::Comment => "COMMENT",
            Token::As => "AS",
            Token::Ident => "IDENT",
            Token::Integer => "INTEGER",
            Token::Number => "NUMBER",
            Token::String => "STRING",
            Token::BadString => "BADSTRING",
            Token::Add => "+",
            Token::Sub => "-",
            Token::Mul => "*",
            Token::Div => "/",
            Token::Mod => "%",
            Token::BitAnd => "&",
            Token::BitOr => "|",
            Token::BitXor => "^",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Eq => "=",
            Token::Neq => "!=",
            Token::Lt => "<",
            Token::Lte => "<=",
            Token::Gt => ">",
            Token::Gte => ">=",
            Token::Subset => "[]",
            Token::Arrow => "->",
            Token::In => "IN",
            Token::Not => "NOT",
            Token::Between => "BETWEEN",
            Token::Like => "LIKE",
            Token::Asterisk => "*",
            Token::Comma => ",",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Hash => "#",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::Semicolon => ";",
            Token::Select => "SELECT",
            Token::From => "FROM",
            Token::Join => "JOIN",
            Token::Inner => "INNER",
            Token::Left => "LEFT",
            Token::Right => "RIGHT",
            Token::Full => "FULL",
            Token::Cross => "CROSS",
            Token::On => "ON",
            Token::Where => "WHERE",
            Token::Group => "GROUP",
            Token::Order => "ORDER",
            Token::Having => "HAVING",
            Token::By => "BY",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::Filter => "FILTER",
            Token::Case => "CASE",
            Token::When => "WHEN",
            Token::Then => "THEN",
            Token::Else => "ELSE",
            Token::End => "END",
            Token::Over => "OVER",
            Token::Partition => "PARTITION",
            Token::True => "TRUE",
            Token::False => "FALSE",
            Token::Dd => "DD",
            Token::Hh => "HH",
            Token::Mi => "MI",
            Token::Ss => "SS",
            Token::Ms => "MS",
        }
    }

    /// Tokens that may continue an expression as a binary operator.
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::Add
                | Token::Sub
                | Token::Mul
                | Token::Div
                | Token::Mod
                | Token::BitAnd
                | Token::BitOr
                | Token::BitXor
                | Token::And
                | Token::Or
                | Token::Eq
                | Token::Neq
                | Token::Lt
                | Token::Lte
                | Token::Gt
                | Token::Gte
                | Token::Subset
                | Token::Arrow
                | Token::In
                | Token::Not
                | Token::Between
                | Token::Like
                | Token::Asterisk
                | Token::LBracket
                | Token::Dot
        )
    }

    pub fn is_time_literal(&self) -> bool {
        matches!(
            self,
            Token::Dd | Token::Hh | Token::Mi | Token::Ss | Token::Ms
        )
    }

    /// Tokens allowed inside a source name. `/`, `#` and `+` support MQTT topic patterns.
    pub fn is_source_token(&self) -> bool {
        matches!(self, Token::Ident | Token::Div | Token::Hash | Token::Add)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn keyword(upper: &str) -> Option<Token> {
    let tok = match upper {
        "SELECT" => Token::Select,
        "AS" => Token::As,
        "FROM" => Token::From,
        "WHERE" => Token::Where,
        "AND" => Token::And,
        "OR" => Token::Or,
        "GROUP" => Token::Group,
        "HAVING" => Token::Having,
        "ORDER" => Token::Order,
        "BY" => Token::By,
        "DESC" => Token::Desc,
        "ASC" => Token::Asc,
        "FILTER" => Token::Filter,
        "INNER" => Token::Inner,
        "LEFT" => Token::Left,
        "RIGHT" => Token::Right,
        "FULL" => Token::Full,
        "CROSS" => Token::Cross,
        "JOIN" => Token::Join,
        "ON" => Token::On,
        "CASE" => Token::Case,
        "WHEN" => Token::When,
        "THEN" => Token::Then,
        "ELSE" => Token::Else,
        "END" => Token::End,
        "IN" => Token::In,
        "NOT" => Token::Not,
        "BETWEEN" => Token::Between,
        "LIKE" => Token::Like,
        "OVER" => Token::Over,
        "PARTITION" => Token::Partition,
        "TRUE" => Token::True,
        "FALSE" => Token::False,
        "DD" => Token::Dd,
        "HH" => Token::Hh,
        "MI" => Token::Mi,
        "SS" => Token::Ss,
        "MS" => Token::Ms,
        _ => return None,
    };
    Some(tok)
}

/// Character-level scanner with unlimited single-step pushback.
pub struct Scanner {
    chars: Vec<char>,
    /// May run past the end; reads there return EOF and unread stays symmetric
    pos: usize,
    token_start: usize,
}

impl Scanner {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            token_start: 0,
        }
    }

    /// Character offset where the most recently scanned token started.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    pub fn scan(&mut self) -> (Token, String) {
        self.token_start = self.pos.min(self.chars.len());
        let ch = self.read();
        if is_whitespace(ch) {
            return self.scan_whitespace();
        } else if is_letter(ch) {
            self.unread();
            return self.scan_ident();
        } else if ch == '"' {
            self.unread();
            return self.scan_string();
        } else if is_digit(ch) {
            self.unread();
            return self.scan_number(false, false);
        } else if ch == '`' {
            return self.scan_backquote_ident();
        }

        match ch {
            EOF_CHAR => (Token::Eof, String::new()),
            '=' => simple(Token::Eq),
            '!' => {
                self.scan_whitespace();
                if self.read() == '=' {
                    return simple(Token::Neq);
                }
                self.unread();
                simple(Token::Eq)
            }
            '<' => {
                self.scan_whitespace();
                if self.read() == '=' {
                    return simple(Token::Lte);
                }
                self.unread();
                simple(Token::Lt)
            }
            '>' => {
                self.scan_whitespace();
                if self.read() == '=' {
                    return simple(Token::Gte);
                }
                self.unread();
                simple(Token::Gt)
            }
            '+' => simple(Token::Add),
            '-' => self.scan_minus(),
            '/' => {
                let mark = self.pos;
                self.scan_whitespace();
                if self.read() == '*' {
                    if !self.skip_until_end_comment() {
                        return (Token::Illegal, String::new());
                    }
                    return (Token::Comment, String::new());
                }
                self.pos = mark;
                simple(Token::Div)
            }
            '.' => {
                if is_digit(self.read()) {
                    self.unread();
                    return self.scan_number(true, false);
                }
                self.unread();
                simple(Token::Dot)
            }
            '%' => simple(Token::Mod),
            '&' => simple(Token::BitAnd),
            '|' => simple(Token::BitOr),
            '^' => simple(Token::BitXor),
            '*' => simple(Token::Asterisk),
            ',' => simple(Token::Comma),
            '(' => simple(Token::LParen),
            ')' => simple(Token::RParen),
            '[' => simple(Token::LBracket),
            ']' => simple(Token::RBracket),
            ':' => simple(Token::Colon),
            '#' => simple(Token::Hash),
            ';' => simple(Token::Semicolon),
            _ => (Token::Illegal, ch.to_string()),
        }
    }

    fn scan_minus(&mut self) -> (Token, String) {
        let mark = self.pos;
        self.scan_whitespace();
        match self.read() {
            '-' => {
                self.skip_until_newline();
                (Token::Comment, String::new())
            }
            '>' => simple(Token::Arrow),
            '.' => {
                self.scan_whitespace();
                if is_digit(self.read()) {
                    self.unread();
                    return self.scan_number(true, true);
                }
                self.pos = mark;
                simple(Token::Sub)
            }
            _ => {
                self.pos = mark;
                simple(Token::Sub)
            }
        }
    }

    pub fn scan_ident(&mut self) -> (Token, String) {
        let mut buf = String::new();
        buf.push(self.read());
        loop {
            let ch = self.read();
            if ch == EOF_CHAR {
                break;
            } else if !is_letter(ch) && !is_digit(ch) && ch != '_' {
                self.unread();
                break;
            }
            buf.push(ch);
        }

        let upper = buf.to_uppercase();
        match keyword(&upper) {
            Some(tok) => (tok, upper),
            None => (Token::Ident, buf),
        }
    }

    pub fn scan_string(&mut self) -> (Token, String) {
        let mut buf = String::new();
        buf.push(self.read());
        let mut escape = false;
        loop {
            let ch = self.read();
            if ch == '"' && !escape {
                buf.push(ch);
                break;
            } else if ch == EOF_CHAR {
                return (Token::BadString, buf);
            } else if ch == '\\' && !escape {
                escape = true;
                buf.push(ch);
            } else {
                escape = false;
                buf.push(ch);
            }
        }
        match unquote(&buf) {
            Some(s) => (Token::String, s),
            None => (Token::Illegal, format!("invalid string: {}", buf)),
        }
    }

    /// Scan a numeric literal. The caller has already consumed a leading `-` or `.`.
    pub fn scan_number(&mut self, start_with_dot: bool, is_neg: bool) -> (Token, String) {
        let mut buf = String::new();
        if is_neg {
            buf.push('-');
        }
        if start_with_dot {
            buf.push('.');
        }
        buf.push(self.read());

        let mut is_num = false;
        loop {
            let ch = self.read();
            if is_digit(ch) {
                buf.push(ch);
            } else if ch == '.' {
                is_num = true;
                buf.push(ch);
            } else {
                self.unread();
                break;
            }
        }
        if is_num || start_with_dot {
            (Token::Number, buf)
        } else {
            (Token::Integer, buf)
        }
    }

    fn scan_backquote_ident(&mut self) -> (Token, String) {
        let mut buf = String::new();
        loop {
            let ch = self.read();
            if ch == '`' || ch == EOF_CHAR {
                break;
            }
            buf.push(ch);
        }
        (Token::Ident, buf)
    }

    pub fn scan_whitespace(&mut self) -> (Token, String) {
        let mut buf = String::new();
        loop {
            let ch = self.read();
            if ch == EOF_CHAR {
                break;
            } else if !is_whitespace(ch) {
                self.unread();
                break;
            }
            buf.push(ch);
        }
        (Token::Ws, buf)
    }

    fn skip_until_newline(&mut self) {
        loop {
            let ch = self.read();
            if ch == '\n' || ch == EOF_CHAR {
                return;
            }
        }
    }

    /// Returns false when the input ends before `*/`.
    fn skip_until_end_comment(&mut self) -> bool {
        loop {
            match self.read() {
                '*' => loop {
                    match self.read() {
                        '/' => return true,
                        '*' => continue,
                        EOF_CHAR => return false,
                        _ => break,
                    }
                },
                EOF_CHAR => return false,
                _ => {}
            }
        }
    }

    pub fn read(&mut self) -> char {
        let ch = self.chars.get(self.pos).copied().unwrap_or(EOF_CHAR);
        self.pos += 1;
        ch
    }

    pub fn unread(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }
}

fn simple(tok: Token) -> (Token, String) {
    (tok, tok.as_str().to_string())
}

pub fn is_whitespace(ch: char) -> bool {
    ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n'
}

pub fn is_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic()
}

pub fn is_digit(ch: char) -> bool {
    ch.is_ascii_digit()
}

/// Remove the surrounding double quotes and resolve backslash escapes.
fn unquote(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '/' => out.push('/'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}
