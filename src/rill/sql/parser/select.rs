//! SELECT statement clauses.

use super::common::{quote, Clause, Parser};
use super::functions::name_expr;
use super::lexer::Token;
use crate::rill::sql::ast::{
    Dimension, Expr, Field, FieldRef, Join, JoinType, SelectStatement, SortField, StreamName,
    Table, Wildcard, COLUMN_SEPARATOR,
};
use crate::rill::sql::error::{SqlError, SqlResult};

impl<'a> Parser<'a> {
    /// Parse one SELECT statement. Returns `None` at end of input or on an empty statement.
    ///
    /// The statement must be followed by `;` (left unconsumed) or end of input.
    pub(crate) fn parse_select(&mut self) -> SqlResult<Option<SelectStatement>> {
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok == Token::Eof {
            return Ok(None);
        } else if tok == Token::Semicolon {
            self.unscan();
            return Ok(None);
        } else if tok != Token::Select {
            return Err(self.error(format!("Found {}, Expected SELECT.", quote(&lit))));
        }
        self.func_id = 0;

        let mut stmt = SelectStatement::default();
        self.clause = Clause::Select;
        stmt.fields = self.parse_fields()?;
        self.clause = Clause::From;
        stmt.sources = self.parse_source()?;
        self.clause = Clause::Join;
        stmt.joins = self.parse_joins()?;
        self.clause = Clause::Where;
        stmt.condition = self.parse_condition(Token::Where)?;
        self.clause = Clause::GroupBy;
        stmt.dimensions = self.parse_dimensions()?;
        self.clause = Clause::Having;
        stmt.having = self.parse_condition(Token::Having)?;
        self.clause = Clause::OrderBy;
        stmt.sort_fields = self.parse_sorts()?;
        self.clause = Clause::None;

        let (tok, lit) = self.scan_ignore_whitespace();
        if tok == Token::Semicolon {
            self.unscan();
        } else if tok != Token::Eof {
            return Err(self.error(format!("found {}, expected EOF.", quote(&lit))));
        }
        Ok(Some(stmt))
    }

    fn parse_condition(&mut self, keyword: Token) -> SqlResult<Option<Expr>> {
        let (tok, _) = self.scan_ignore_whitespace();
        if tok != keyword {
            self.unscan();
            return Ok(None);
        }
        Ok(Some(self.parse_expr()?))
    }

    fn parse_fields(&mut self) -> SqlResult<Vec<Field>> {
        let mut fields = Vec::new();
        loop {
            fields.push(self.parse_field()?);
            let (tok, _) = self.scan_ignore_whitespace();
            if tok != Token::Comma {
                self.unscan();
                break;
            }
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> SqlResult<Field> {
        let (tok, _) = self.scan_ignore_whitespace();
        if tok == Token::Asterisk {
            let wildcard = self.parse_wildcard_modifiers(None)?;
            self.reject_wildcard_alias()?;
            return Ok(Field {
                name: "*".to_string(),
                alias: None,
                expr: Expr::Wildcard(wildcard),
            });
        }
        self.unscan();

        let expr = self.parse_expr()?;
        if let Expr::Wildcard(w) = expr {
            let wildcard = self.parse_wildcard_modifiers(w.stream)?;
            self.reject_wildcard_alias()?;
            return Ok(Field {
                name: "*".to_string(),
                alias: None,
                expr: Expr::Wildcard(wildcard),
            });
        }

        let mut field = Field {
            name: name_expr(&expr),
            alias: self.parse_alias()?,
            expr,
        };
        if field.name.is_empty() && field.alias.is_none() {
            field.name = format!("{}{}", self.config.default_field_prefix, self.f);
            self.f += 1;
        }
        Ok(field)
    }

    fn reject_wildcard_alias(&mut self) -> SqlResult<()> {
        let (tok, _) = self.scan_ignore_whitespace();
        if tok == Token::As {
            return Err(self.error("wildcard field * cannot have an alias."));
        }
        self.unscan();
        Ok(())
    }

    /// Optional `EXCEPT(a, b)` and `REPLACE(expr AS c, ...)` after a wildcard.
    fn parse_wildcard_modifiers(&mut self, stream: Option<String>) -> SqlResult<Wildcard> {
        let mut wildcard = Wildcard {
            stream,
            ..Wildcard::default()
        };
        if self.accept_word("EXCEPT") {
            self.expect(Token::LParen, "EXCEPT")?;
            loop {
                let (tok, lit) = self.scan_ignore_whitespace();
                if tok != Token::Ident {
                    return Err(self.error(format!(
                        "found {}, expected column name in EXCEPT.",
                        quote(&lit)
                    )));
                }
                wildcard.except.push(lit);
                if !self.list_continues("EXCEPT")? {
                    break;
                }
            }
        }
        if self.accept_word("REPLACE") {
            self.expect(Token::LParen, "REPLACE")?;
            loop {
                let expr = self.parse_expr()?;
                let alias = match self.parse_alias()? {
                    Some(a) => a,
                    None => {
                        return Err(self.error("replace field in REPLACE must have an alias."));
                    }
                };
                wildcard.replace.push(Field {
                    name: name_expr(&expr),
                    alias: Some(alias),
                    expr,
                });
                if !self.list_continues("REPLACE")? {
                    break;
                }
            }
        }
        Ok(wildcard)
    }

    fn expect(&mut self, expected: Token, after: &str) -> SqlResult<()> {
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != expected {
            return Err(self.error(format!(
                "found {}, expected {} after {}.",
                quote(&lit),
                expected,
                after
            )));
        }
        Ok(())
    }

    /// After a list item: true on `,`, false on `)`.
    fn list_continues(&mut self, what: &str) -> SqlResult<bool> {
        let (tok, lit) = self.scan_ignore_whitespace();
        match tok {
            Token::Comma => Ok(true),
            Token::RParen => Ok(false),
            _ => Err(self.error(format!(
                "found {}, expected comma or right paren in {}.",
                quote(&lit),
                what
            ))),
        }
    }

    pub(crate) fn parse_alias(&mut self) -> SqlResult<Option<String>> {
        let (tok, _) = self.scan_ignore_whitespace();
        if tok == Token::As {
            let (tok, lit) = self.scan_ignore_whitespace();
            if tok != Token::Ident {
                return Err(self.error(format!("found {}, expected as alias.", quote(&lit))));
            }
            return Ok(Some(lit));
        }
        self.unscan();
        Ok(None)
    }

    fn parse_source(&mut self) -> SqlResult<Vec<Table>> {
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::From {
            return Err(self.error(format!("found {}, expected FROM.", quote(&lit))));
        }
        let (name, alias) = self.parse_source_literal()?;
        if name.is_empty() {
            let (_, lit) = self.scan_ignore_whitespace();
            return Err(self.error(format!("found {}, expected source name.", quote(&lit))));
        }
        Ok(vec![Table { name, alias }])
    }

    /// Source names may contain `/`, `#` and `+` so MQTT topic patterns can be used.
    fn parse_source_literal(&mut self) -> SqlResult<(String, Option<String>)> {
        let mut segments: Vec<String> = Vec::new();
        let mut alias = None;
        loop {
            let (tok, lit) = self.scan_ignore_whitespace();
            if !tok.is_source_token() {
                self.unscan();
                break;
            }
            segments.push(lit);
            let (tok1, lit1) = self.scan_ignore_whitespace();
            if tok1 == Token::As {
                let (tok2, lit2) = self.scan_ignore_whitespace();
                if tok2 != Token::Ident {
                    return Err(self.error(format!("found {}, expected source alias.", quote(&lit2))));
                }
                alias = Some(lit2);
                break;
            } else if tok1.is_source_token() {
                segments.push(lit1);
            } else {
                self.unscan();
                break;
            }
        }
        Ok((segments.concat(), alias))
    }

    fn parse_joins(&mut self) -> SqlResult<Vec<Join>> {
        let mut joins = Vec::new();
        loop {
            let (tok, lit) = self.scan_ignore_whitespace();
            let join_type = match tok {
                Token::Inner => JoinType::Inner,
                Token::Left => JoinType::Left,
                Token::Right => JoinType::Right,
                Token::Full => JoinType::Full,
                Token::Cross => JoinType::Cross,
                _ => {
                    self.unscan();
                    return Ok(joins);
                }
            };
            let (tok1, _) = self.scan_ignore_whitespace();
            if tok1 != Token::Join {
                return Err(self.error(format!("found {}, expected JOIN key word.", quote(&lit))));
            }
            joins.push(self.parse_join(join_type)?);
        }
    }

    fn parse_join(&mut self, join_type: JoinType) -> SqlResult<Join> {
        let (name, alias) = self.parse_source_literal()?;
        let mut join = Join {
            name,
            alias,
            join_type,
            expr: None,
        };
        let (tok, _) = self.scan_ignore_whitespace();
        if tok == Token::On {
            if join_type == JoinType::Cross {
                return Err(SqlError::validation_error(
                    "On expression is not required for cross join type.",
                ));
            }
            join.expr = Some(self.parse_expr()?);
        } else {
            self.unscan();
        }
        Ok(join)
    }

    fn parse_dimensions(&mut self) -> SqlResult<Vec<Dimension>> {
        let mut dims = Vec::new();
        let (tok, _) = self.scan_ignore_whitespace();
        if tok != Token::Group {
            self.unscan();
            return Ok(dims);
        }
        let (tok1, lit1) = self.scan_ignore_whitespace();
        if tok1 != Token::By {
            return Err(self.error(format!("found {}, expected BY statement.", quote(&lit1))));
        }
        loop {
            dims.push(Dimension {
                expr: self.parse_expr()?,
            });
            let (tok, _) = self.scan_ignore_whitespace();
            if tok != Token::Comma {
                self.unscan();
                break;
            }
        }
        Ok(dims)
    }

    fn parse_sorts(&mut self) -> SqlResult<Vec<SortField>> {
        let mut sorts = Vec::new();
        let (tok, _) = self.scan_ignore_whitespace();
        if tok != Token::Order {
            self.unscan();
            return Ok(sorts);
        }
        let (tok1, lit1) = self.scan_ignore_whitespace();
        if tok1 != Token::By {
            return Err(self.error(format!("found {}, expected BY keyword.", quote(&lit1))));
        }
        loop {
            let (tok, _) = self.scan_ignore_whitespace();
            match tok {
                Token::Ident => {
                    self.unscan();
                    let sections = self.parse_field_name_sections(true)?;
                    let mut sort = sort_field(&sections);
                    let (dir, _) = self.scan_ignore_whitespace();
                    match dir {
                        Token::Desc => sort.ascending = false,
                        Token::Asc => {}
                        _ => self.unscan(),
                    }
                    sorts.push(sort);
                }
                Token::Comma => continue,
                _ => {
                    self.unscan();
                    break;
                }
            }
        }
        Ok(sorts)
    }
}

fn sort_field(sections: &[String]) -> SortField {
    let (stream, name) = match sections {
        [stream, name] => (Some(stream.clone()), name.clone()),
        [name] => (None, name.clone()),
        _ => (None, String::new()),
    };
    let field_ref = match &stream {
        Some(s) => FieldRef::qualified(s.clone(), name.clone()),
        None => FieldRef {
            stream: StreamName::Default,
            name: name.clone(),
            alias: None,
        },
    };
    SortField {
        uname: sections.join(COLUMN_SEPARATOR),
        name,
        stream,
        ascending: true,
        field_expr: Expr::FieldRef(field_ref),
    }
}
