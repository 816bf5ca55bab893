/*!
# Streaming SQL Parser

Recursive-descent parser producing the [`ast`](crate::rill::sql::ast) types.

## Supported Statements

- `SELECT ... FROM ... [JOIN ...] [WHERE ...] [GROUP BY ...] [HAVING ...] [ORDER BY ...]`
- `CREATE STREAM|TABLE name (fields) WITH (options)`
- `SHOW STREAMS|TABLES`, `DESCRIBE|EXPLAIN|DROP STREAM|TABLE name`

## Structure

- [`lexer`]: tokens and the character scanner
- `common`: token pushback buffer and parser state
- `expressions`: precedence climbing, brackets, CASE
- `functions`: calls, windows, FILTER and OVER
- `select`: SELECT clauses
- `commands`: stream definition and catalog statements
- [`validator`]: aggregate placement checks and alias binding

Parsing stops at the first error. Function names are resolved through the
[`FunctionResolver`] given to the parser, so independently configured parsers can
coexist in one process.

## Example

```rust
use rillstream::rill::sql::parser::StreamingSqlParser;

let parser = StreamingSqlParser::new();
let stmt = parser
    .parse("SELECT deviceId, avg(temp) AS t FROM demo GROUP BY deviceId, TUMBLINGWINDOW(ss, 10)")
    .unwrap();
assert_eq!(stmt.fields.len(), 2);
assert!(stmt.window().is_some());
```
*/

mod commands;
mod common;
mod expressions;
mod functions;
pub mod lexer;
mod select;
pub mod validator;

use crate::rill::config::EngineConfig;
use crate::rill::sql::ast::{SelectStatement, Statement};
use crate::rill::sql::error::{SqlError, SqlResult};
use crate::rill::sql::execution::functions::FunctionResolver;
use common::{quote, Parser};
use lexer::Token;
use std::sync::Arc;

pub use validator::{bind_statement, is_aggregate, validate};

/// Entry point for parsing streaming SQL.
#[derive(Clone)]
pub struct StreamingSqlParser {
    config: EngineConfig,
    resolver: Arc<FunctionResolver>,
}

impl Default for StreamingSqlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingSqlParser {
    /// Parser with default configuration and the built-in functions.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_resolver(config, Arc::new(FunctionResolver::new()))
    }

    pub fn with_resolver(config: EngineConfig, resolver: Arc<FunctionResolver>) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<FunctionResolver> {
        &self.resolver
    }

    /// Parse a single SELECT statement. Anything after a terminating `;` is ignored.
    pub fn parse(&self, sql: &str) -> SqlResult<SelectStatement> {
        let mut p = Parser::new(sql, &self.config, &self.resolver);
        match self.next_select(&mut p)? {
            Some(stmt) => Ok(stmt),
            None => Err(SqlError::parse_error("Found \"\", Expected SELECT.", Some(0))),
        }
    }

    /// Parse a `;` separated batch of SELECT statements. Empty statements are skipped.
    pub fn parse_queries(&self, sql: &str) -> SqlResult<Vec<SelectStatement>> {
        let mut p = Parser::new(sql, &self.config, &self.resolver);
        let mut stmts = Vec::new();
        loop {
            if let Some(stmt) = self.next_select(&mut p)? {
                stmts.push(stmt);
            }
            let (tok, lit) = p.scan_ignore_whitespace();
            match tok {
                Token::Semicolon => continue,
                Token::Eof => break,
                _ => return Err(p.error(format!("found {}, expected semicolon or EOF.", quote(&lit)))),
            }
        }
        Ok(stmts)
    }

    /// Parse any single statement, dispatching on its leading keyword.
    pub fn parse_statement(&self, sql: &str) -> SqlResult<Statement> {
        let mut p = Parser::new(sql, &self.config, &self.resolver);
        match self.next_statement(&mut p)? {
            Some(stmt) => Ok(stmt),
            None => Err(SqlError::parse_error("empty statement", Some(0))),
        }
    }

    /// Parse a `;` separated batch of statements of any kind.
    pub fn parse_statements(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        let mut p = Parser::new(sql, &self.config, &self.resolver);
        let mut stmts = Vec::new();
        loop {
            if let Some(stmt) = self.next_statement(&mut p)? {
                stmts.push(stmt);
            }
            let (tok, lit) = p.scan_ignore_whitespace();
            match tok {
                Token::Semicolon => continue,
                Token::Eof => break,
                _ => return Err(p.error(format!("found {}, expected semicolon or EOF.", quote(&lit)))),
            }
        }
        Ok(stmts)
    }

    fn next_select(&self, p: &mut Parser<'_>) -> SqlResult<Option<SelectStatement>> {
        let mut stmt = match p.parse_select()? {
            Some(stmt) => stmt,
            None => return Ok(None),
        };
        validate(&stmt, &self.config)?;
        bind_statement(&mut stmt)?;
        log::debug!(
            "Parsed SELECT with {} fields from {:?}",
            stmt.fields.len(),
            stmt.sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );
        Ok(Some(stmt))
    }

    fn next_statement(&self, p: &mut Parser<'_>) -> SqlResult<Option<Statement>> {
        let (tok, lit) = p.scan_ignore_whitespace();
        let stmt = match tok {
            Token::Eof | Token::Semicolon => {
                p.unscan();
                return Ok(None);
            }
            Token::Select => {
                p.unscan();
                return Ok(self.next_select(p)?.map(|s| Statement::Select(Box::new(s))));
            }
            Token::Ident => match lit.to_uppercase().as_str() {
                "CREATE" => p.parse_create_stmt()?,
                "SHOW" => p.parse_show_stmt()?,
                verb @ ("DESCRIBE" | "EXPLAIN" | "DROP") => p.parse_named_stmt(verb)?,
                _ => return Err(unknown_statement(p, &lit)),
            },
            _ => return Err(unknown_statement(p, &lit)),
        };
        log::debug!("Parsed {} statement", stmt.kind());
        Ok(Some(stmt))
    }
}

fn unknown_statement(p: &Parser<'_>, lit: &str) -> SqlError {
    p.error(format!(
        "found {}, expected SELECT, CREATE, DROP, DESCRIBE, EXPLAIN or SHOW.",
        quote(lit)
    ))
}
