//! Expression parsing: precedence climbing over binary operators, unary atoms,
//! bracket/JSON navigation and CASE.

use super::common::{quote, Parser};
use super::lexer::Token;
use crate::rill::sql::ast::{
    BetweenExpr, BinaryOperator, CaseExpr, Expr, FieldRef, LikePattern, LikeRegex, MetaRef,
    StreamName, TimeUnit, ValueSetExpr, WhenClause, Wildcard,
};
use crate::rill::sql::error::SqlResult;

impl<'a> Parser<'a> {
    pub(crate) fn parse_expr(&mut self) -> SqlResult<Expr> {
        self.parse_binary(1)
    }

    /// Parse operators binding at least as tightly as `min_prec`. Operators of equal
    /// precedence associate to the left.
    pub(crate) fn parse_binary(&mut self, min_prec: u8) -> SqlResult<Expr> {
        let mut lhs = self.parse_unary_expr(false)?;
        loop {
            let (tok, _) = self.scan_ignore_whitespace();
            if !tok.is_operator() {
                self.unscan();
                return Ok(lhs);
            }
            let (op, consumed) = match self.binary_operator(tok)? {
                Some(found) => found,
                None => {
                    self.unscan();
                    return Ok(lhs);
                }
            };
            let postfix = matches!(
                op,
                BinaryOperator::Subset | BinaryOperator::Arrow | BinaryOperator::Dot
            );
            // navigation always binds to the atom on its left
            if op.precedence() < min_prec && !postfix {
                for _ in 0..consumed {
                    self.unscan();
                }
                return Ok(lhs);
            }
            if op == BinaryOperator::Subset {
                // re-enter through the bracket path
                self.unscan();
            }

            let rhs = match op {
                BinaryOperator::Subset => self.parse_unary_expr(false)?,
                BinaryOperator::Arrow | BinaryOperator::Dot => self.parse_unary_expr(true)?,
                BinaryOperator::In | BinaryOperator::NotIn => self.parse_value_set()?,
                BinaryOperator::Between | BinaryOperator::NotBetween => self.parse_between()?,
                BinaryOperator::Like | BinaryOperator::NotLike => self.parse_like_pattern()?,
                _ => self.parse_binary(op.precedence() + 1)?,
            };
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    /// Map an operator token to a binary operator. `NOT` must be followed by IN, BETWEEN or
    /// LIKE. Returns the operator and the number of tokens consumed.
    fn binary_operator(&mut self, tok: Token) -> SqlResult<Option<(BinaryOperator, usize)>> {
        let op = match tok {
            Token::Add => BinaryOperator::Add,
            Token::Sub => BinaryOperator::Sub,
            Token::Mul | Token::Asterisk => BinaryOperator::Mul,
            Token::Div => BinaryOperator::Div,
            Token::Mod => BinaryOperator::Mod,
            Token::BitAnd => BinaryOperator::BitAnd,
            Token::BitOr => BinaryOperator::BitOr,
            Token::BitXor => BinaryOperator::BitXor,
            Token::And => BinaryOperator::And,
            Token::Or => BinaryOperator::Or,
            Token::Eq => BinaryOperator::Eq,
            Token::Neq => BinaryOperator::Neq,
            Token::Lt => BinaryOperator::Lt,
            Token::Lte => BinaryOperator::Lte,
            Token::Gt => BinaryOperator::Gt,
            Token::Gte => BinaryOperator::Gte,
            Token::Subset | Token::LBracket => BinaryOperator::Subset,
            Token::Arrow => BinaryOperator::Arrow,
            Token::Dot => BinaryOperator::Dot,
            Token::In => BinaryOperator::In,
            Token::Between => BinaryOperator::Between,
            Token::Like => BinaryOperator::Like,
            Token::Not => {
                let (next, lit) = self.scan_ignore_whitespace();
                let op = match next {
                    Token::In => BinaryOperator::NotIn,
                    Token::Between => BinaryOperator::NotBetween,
                    Token::Like => BinaryOperator::NotLike,
                    _ => {
                        return Err(self.error(format!(
                            "found {}, expected IN, BETWEEN or LIKE after NOT.",
                            quote(&lit)
                        )))
                    }
                };
                return Ok(Some((op, 2)));
            }
            _ => return Ok(None),
        };
        Ok(Some((op, 1)))
    }

    /// Parse an atom. With `is_sub_field` a bare identifier becomes a JSON field name
    /// (right side of `->` or `.`).
    pub(crate) fn parse_unary_expr(&mut self, is_sub_field: bool) -> SqlResult<Expr> {
        let (tok1, _) = self.scan_ignore_whitespace();
        if tok1 == Token::LParen {
            let expr = self.parse_expr()?;
            let (tok2, lit2) = self.scan_ignore_whitespace();
            if tok2 != Token::RParen {
                return Err(self.error(format!("found {}, expected right paren.", quote(&lit2))));
            }
            return Ok(Expr::Paren(Box::new(expr)));
        } else if tok1 == Token::LBracket {
            return self.parse_bracket_expr();
        }
        self.unscan();

        let (tok, lit) = self.scan_with_negative_num();
        match tok {
            Token::Case => self.parse_case_expr(),
            Token::Ident => {
                let (next, _) = self.scan_ignore_whitespace();
                if next == Token::LParen {
                    return self.parse_call(&lit);
                }
                self.unscan();
                if is_sub_field {
                    return Ok(Expr::JsonFieldRef(lit));
                }
                self.unscan();
                let sections = self.parse_field_name_sections(false)?;
                Ok(self.field_from_sections(sections))
            }
            Token::String => Ok(Expr::String(lit)),
            Token::Integer => match lit.parse::<i64>() {
                Ok(v) => Ok(Expr::Integer(v)),
                Err(_) => Err(self.error(format!("found {}, invalid integer value.", quote(&lit)))),
            },
            Token::Number => match lit.parse::<f64>() {
                Ok(v) => Ok(Expr::Number(v)),
                Err(_) => Err(self.error(format!("found {}, invalid number value.", quote(&lit)))),
            },
            Token::True => Ok(Expr::Boolean(true)),
            Token::False => Ok(Expr::Boolean(false)),
            Token::Dd => Ok(Expr::Time(TimeUnit::Day)),
            Token::Hh => Ok(Expr::Time(TimeUnit::Hour)),
            Token::Mi => Ok(Expr::Time(TimeUnit::Minute)),
            Token::Ss => Ok(Expr::Time(TimeUnit::Second)),
            Token::Ms => Ok(Expr::Time(TimeUnit::Millisecond)),
            Token::Asterisk => self.parse_asterisk(),
            _ => Err(self.error(format!("found {}, expected expression.", quote(&lit)))),
        }
    }

    fn field_from_sections(&self, mut sections: Vec<String>) -> Expr {
        if sections.len() == 2 {
            let name = sections.pop().unwrap_or_default();
            let stream = sections.pop().unwrap_or_default();
            if name == "*" && !self.in_meta() {
                return Expr::Wildcard(Wildcard {
                    stream: Some(stream),
                    ..Wildcard::default()
                });
            }
            if self.in_meta() {
                return Expr::MetaRef(MetaRef {
                    stream: StreamName::Named(stream),
                    name,
                });
            }
            return Expr::FieldRef(FieldRef::qualified(stream, name));
        }
        let name = sections.pop().unwrap_or_default();
        if self.in_meta() {
            Expr::MetaRef(MetaRef {
                stream: StreamName::Default,
                name,
            })
        } else {
            Expr::FieldRef(FieldRef::new(name))
        }
    }

    /// Read `name` or `stream.name`. A further `.` is left for struct navigation unless
    /// `strict`, in which case it is an error.
    pub(crate) fn parse_field_name_sections(&mut self, strict: bool) -> SqlResult<Vec<String>> {
        let mut sections: Vec<String> = Vec::new();
        loop {
            let (tok, lit) = self.scan_ignore_whitespace();
            let accepted =
                tok == Token::Ident || (tok == Token::Asterisk && !sections.is_empty());
            if !accepted {
                self.unscan();
                if !sections.is_empty() {
                    return Err(self.error(format!(
                        "found {}, expected field name after dot.",
                        quote(&lit)
                    )));
                }
                break;
            }
            sections.push(lit);
            if tok == Token::Asterisk {
                break;
            }
            let (tok1, _) = self.scan_ignore_whitespace();
            if tok1 != Token::Dot {
                self.unscan();
                break;
            }
            if sections.len() == 2 {
                if strict {
                    return Err(self.error(
                        "Too many field names. Please use -> to reference keys in struct.",
                    ));
                }
                self.unscan();
                break;
            }
        }
        if sections.is_empty() {
            return Err(self.error("Cannot find any field name."));
        }
        Ok(sections)
    }

    pub(crate) fn parse_bracket_expr(&mut self) -> SqlResult<Expr> {
        let (tok2, lit2) = self.scan_with_negative_num();
        match tok2 {
            Token::RBracket => Ok(Expr::Colon {
                start: Box::new(Expr::Integer(0)),
                end: Box::new(Expr::Integer(Expr::OPEN_END)),
            }),
            Token::Integer => {
                let start = lit2.parse::<i64>().map_err(|_| {
                    self.error(format!(
                        "The start index {} is not an int value in bracket expression.",
                        lit2
                    ))
                })?;
                let (tok3, _) = self.scan_ignore_whitespace();
                match tok3 {
                    Token::RBracket => Ok(Expr::Index(Box::new(Expr::Integer(start)))),
                    Token::Colon => self.parse_colon_expr(Expr::Integer(start)),
                    _ => Err(self.error(format!(
                        "Unexpected token {}. when parsing bracket expressions.",
                        quote(&lit2)
                    ))),
                }
            }
            Token::Colon => self.parse_colon_expr(Expr::Integer(0)),
            _ => {
                self.unscan();
                let start = self.parse_expr().map_err(|_| {
                    self.error(format!(
                        "The start index {} is invalid in bracket expression.",
                        lit2
                    ))
                })?;
                let (tok3, _) = self.scan_ignore_whitespace();
                match tok3 {
                    Token::RBracket => Ok(Expr::Index(Box::new(start))),
                    Token::Colon => self.parse_colon_expr(start),
                    _ => Err(self.error(format!(
                        "Unexpected token {}. when parsing bracket expressions.",
                        quote(&lit2)
                    ))),
                }
            }
        }
    }

    fn parse_colon_expr(&mut self, start: Expr) -> SqlResult<Expr> {
        let (tok, lit) = self.scan_with_negative_num();
        let end = match tok {
            Token::RBracket => {
                return Ok(Expr::Colon {
                    start: Box::new(start),
                    end: Box::new(Expr::Integer(Expr::OPEN_END)),
                })
            }
            Token::Integer => lit.parse::<i64>().map(Expr::Integer).map_err(|_| {
                self.error(format!(
                    "The end index {} is not an int value in bracket expression.",
                    lit
                ))
            })?,
            _ => {
                self.unscan();
                self.parse_expr()?
            }
        };
        let (tok1, lit1) = self.scan_ignore_whitespace();
        if tok1 != Token::RBracket {
            return Err(self.error(format!("Found {}, expected right bracket.", quote(&lit1))));
        }
        Ok(Expr::Colon {
            start: Box::new(start),
            end: Box::new(end),
        })
    }

    fn parse_value_set(&mut self) -> SqlResult<Expr> {
        let (tok, _) = self.scan_ignore_whitespace();
        if tok != Token::LParen {
            self.unscan();
            let array = self.parse_binary(BinaryOperator::Add.precedence())?;
            return Ok(Expr::ValueSet(ValueSetExpr {
                literal_exprs: Vec::new(),
                array_expr: Some(Box::new(array)),
            }));
        }
        let mut exprs = Vec::new();
        let (first, _) = self.scan_ignore_whitespace();
        if first != Token::RParen {
            self.unscan();
            loop {
                exprs.push(self.parse_expr()?);
                let (sep, lit) = self.scan_ignore_whitespace();
                match sep {
                    Token::Comma => continue,
                    Token::RParen => break,
                    _ => {
                        return Err(self.error(format!(
                            "found {}, expected comma or right paren in value set.",
                            quote(&lit)
                        )))
                    }
                }
            }
        }
        Ok(Expr::ValueSet(ValueSetExpr {
            literal_exprs: exprs,
            array_expr: None,
        }))
    }

    fn parse_between(&mut self) -> SqlResult<Expr> {
        let lower = self.parse_binary(BinaryOperator::Add.precedence())?;
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::And {
            return Err(self.error(format!(
                "found {}, expected AND in between expression.",
                quote(&lit)
            )));
        }
        let higher = self.parse_binary(BinaryOperator::Add.precedence())?;
        Ok(Expr::Between(BetweenExpr {
            lower: Box::new(lower),
            higher: Box::new(higher),
        }))
    }

    fn parse_like_pattern(&mut self) -> SqlResult<Expr> {
        let expr = self.parse_binary(BinaryOperator::Add.precedence())?;
        let pattern = match &expr {
            Expr::String(s) => Some(
                LikeRegex::compile(s)
                    .map_err(|e| self.error(format!("invalid LIKE pattern {}: {}", quote(s), e)))?,
            ),
            _ => None,
        };
        Ok(Expr::Like(LikePattern {
            expr: Box::new(expr),
            pattern,
        }))
    }

    pub(crate) fn parse_case_expr(&mut self) -> SqlResult<Expr> {
        let mut case = CaseExpr {
            value: None,
            when_clauses: Vec::new(),
            else_clause: None,
        };
        let (tok, _) = self.scan_ignore_whitespace();
        self.unscan();
        if tok != Token::When {
            case.value = Some(Box::new(self.parse_expr()?));
        }

        loop {
            let (tok, _) = self.scan_ignore_whitespace();
            match tok {
                Token::When => {
                    let expr = self.parse_expr()?;
                    if case.value.is_none() && !expr.is_boolean() {
                        return Err(self.error(
                            "invalid CASE expression, WHEN expression must be a bool condition",
                        ));
                    }
                    let (then, _) = self.scan_ignore_whitespace();
                    if then != Token::Then {
                        return Err(self.error("invalid CASE expression, THEN expected after WHEN"));
                    }
                    let result = self.parse_expr()?;
                    case.when_clauses.push(WhenClause { expr, result });
                }
                Token::Else => {
                    if case.when_clauses.is_empty() {
                        return Err(self.error("invalid CASE expression, WHEN expected before ELSE"));
                    }
                    case.else_clause = Some(Box::new(self.parse_expr()?));
                }
                Token::End => {
                    if case.when_clauses.is_empty() {
                        return Err(self.error("invalid CASE expression, WHEN expected before END"));
                    }
                    break;
                }
                _ => return Err(self.error("invalid CASE expression, END expected")),
            }
        }
        Ok(Expr::Case(case))
    }

    fn parse_asterisk(&mut self) -> SqlResult<Expr> {
        if self.in_meta() {
            return Ok(Expr::MetaRef(MetaRef {
                stream: StreamName::Default,
                name: "*".to_string(),
            }));
        }
        if self.in_func.is_empty() {
            return Err(self.error(
                "unsupported * expression, it must be used inside fields or function parameters.",
            ));
        }
        Ok(Expr::Wildcard(Wildcard::default()))
    }
}
