//! Token buffer and shared state of the recursive-descent parser.

use super::lexer::{is_digit, Scanner, Token};
use crate::rill::config::EngineConfig;
use crate::rill::sql::error::SqlError;
use crate::rill::sql::execution::functions::FunctionResolver;

const LOOKAHEAD: usize = 3;

/// Clause currently being parsed. Drives contextual errors and the placement rules of
/// column-producing functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    None,
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    OrderBy,
}

#[derive(Debug, Clone)]
struct Buffered {
    tok: Token,
    lit: String,
    pos: usize,
}

/// Parser state for one SQL text.
///
/// Token pushback is a ring of the last three significant tokens: `unscan` steps back
/// through it and `scan` replays from it before asking the scanner for more.
pub(crate) struct Parser<'a> {
    pub(crate) s: Scanner,
    buf: [Buffered; LOOKAHEAD],
    /// Slot of the most recently scanned token
    i: usize,
    /// Number of tokens pushed back
    n: usize,
    /// Function whose arguments are being parsed, empty outside calls
    pub(crate) in_func: String,
    /// Counter for synthetic field names
    pub(crate) f: usize,
    /// Counter for call ids, unique per statement
    pub(crate) func_id: usize,
    pub(crate) clause: Clause,
    pub(crate) config: &'a EngineConfig,
    pub(crate) resolver: &'a FunctionResolver,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(sql: &str, config: &'a EngineConfig, resolver: &'a FunctionResolver) -> Self {
        let empty = Buffered {
            tok: Token::Eof,
            lit: String::new(),
            pos: 0,
        };
        Self {
            s: Scanner::new(sql),
            buf: [empty.clone(), empty.clone(), empty],
            i: 0,
            n: 0,
            in_func: String::new(),
            f: 0,
            func_id: 0,
            clause: Clause::None,
            config,
            resolver,
        }
    }

    pub(crate) fn scan(&mut self) -> (Token, String) {
        if self.n > 0 {
            self.n -= 1;
            return self.curr();
        }

        let (tok, lit) = self.s.scan();
        if tok != Token::Ws && tok != Token::Comment {
            self.i = (self.i + 1) % LOOKAHEAD;
            self.buf[self.i] = Buffered {
                tok,
                lit: lit.clone(),
                pos: self.s.token_start(),
            };
        }
        (tok, lit)
    }

    fn curr(&self) -> (Token, String) {
        let b = &self.buf[self.slot()];
        (b.tok, b.lit.clone())
    }

    fn slot(&self) -> usize {
        (self.i + LOOKAHEAD - self.n) % LOOKAHEAD
    }

    pub(crate) fn scan_ignore_whitespace(&mut self) -> (Token, String) {
        loop {
            let (tok, lit) = self.scan();
            if tok != Token::Ws && tok != Token::Comment {
                return (tok, lit);
            }
        }
    }

    pub(crate) fn unscan(&mut self) {
        self.n += 1;
    }

    /// Like [`Self::scan_ignore_whitespace`], but a `-` directly followed by digits is
    /// read as a negative number. Only possible when the `-` is the newest scanned token,
    /// since the scanner must still be positioned right after it.
    pub(crate) fn scan_with_negative_num(&mut self) -> (Token, String) {
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::Sub || self.n != 0 {
            return (tok, lit);
        }
        self.s.scan_whitespace();
        if is_digit(self.s.read()) {
            self.s.unread();
            let (ntok, nlit) = self.s.scan_number(false, true);
            let slot = self.i;
            self.buf[slot].tok = ntok;
            self.buf[slot].lit = nlit.clone();
            return (ntok, nlit);
        }
        self.s.unread();
        (tok, lit)
    }

    /// Position of the token most recently returned by `scan`.
    pub(crate) fn position(&self) -> usize {
        self.buf[self.slot()].pos
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> SqlError {
        SqlError::parse_error(message, Some(self.position()))
    }

    pub(crate) fn next_id(&mut self) -> usize {
        let id = self.func_id;
        self.func_id += 1;
        id
    }

    pub(crate) fn in_meta(&self) -> bool {
        self.in_func == "meta" || self.in_func == "mqtt"
    }

    /// Consume the next token if it is the identifier `word` (case-insensitive).
    pub(crate) fn accept_word(&mut self, word: &str) -> bool {
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok == Token::Ident && lit.eq_ignore_ascii_case(word) {
            return true;
        }
        self.unscan();
        false
    }
}

/// Go-style quoting of a lexeme for error messages.
pub(crate) fn quote(lit: &str) -> String {
    format!("{:?}", lit)
}
