//! Function calls, window descriptors, FILTER and OVER clauses.

use super::common::{quote, Clause, Parser};
use super::lexer::Token;
use crate::rill::sql::ast::{
    Call, ColFuncField, Expr, FuncType, PartitionExpr, Window, WindowType, Wildcard,
};
use crate::rill::sql::error::{SqlError, SqlResult};

/// Name of the column or function an expression reads, used to name select fields.
pub(crate) fn name_expr(expr: &Expr) -> String {
    match expr {
        Expr::FieldRef(f) => f.name.clone(),
        Expr::Call(c) => c.name.clone(),
        _ => String::new(),
    }
}

impl<'a> Parser<'a> {
    /// Parse the arguments of `name(` up to the closing paren and build a call or window.
    pub(crate) fn parse_call(&mut self, n: &str) -> SqlResult<Expr> {
        let lower = n.to_lowercase();
        let window_type = WindowType::from_func_name(&lower);
        let (name, func_type) = match window_type {
            Some(_) => (lower, None),
            None => {
                let name = self
                    .resolver
                    .conv_name(n)
                    .ok_or_else(|| SqlError::not_found("function", n))?;
                let ft = self.resolver.func_type(&name);
                (name, ft)
            }
        };
        if func_type == Some(FuncType::Cols) && self.clause != Clause::Select {
            return Err(SqlError::validation_error(format!(
                "function {} can only be used inside the select clause",
                n
            )));
        }

        let outer = std::mem::replace(&mut self.in_func, name.clone());
        let args = self.parse_call_args(&name, func_type);
        self.in_func = outer;
        let mut args = args?;

        if let Some(wt) = window_type {
            validate_window(&name, wt, &args)?;
            let mut window = convert_to_window(wt, &args)?;
            window.filter = self.parse_filter()?.map(Box::new);
            return Ok(Expr::Window(window));
        }

        let func_type = func_type.unwrap_or(FuncType::Scalar);
        self.resolver.validate(&name, &args)?;
        if name == "deduplicate" {
            args.insert(0, Expr::Wildcard(Wildcard::default()));
        }
        let mut call = Call::new(name, func_type, args);
        call.func_id = self.next_id();
        if func_type == FuncType::Analytic {
            call.cached_field = Some(format!("$$a_{}_{}", call.name, call.func_id));
        }
        self.parse_over(&mut call)?;
        Ok(Expr::Call(call))
    }

    fn parse_call_args(&mut self, name: &str, func_type: Option<FuncType>) -> SqlResult<Vec<Expr>> {
        let mut args = Vec::new();
        let (tok, _) = self.scan_ignore_whitespace();
        if tok == Token::RParen {
            return Ok(args);
        }
        self.unscan();

        loop {
            let expr = self.parse_expr()?;
            if func_type == Some(FuncType::Cols) {
                args.push(Expr::ColFuncField(ColFuncField {
                    name: name_expr(&expr),
                    expr: Box::new(expr),
                }));
            } else {
                args.push(expr);
            }
            let (tok, _) = self.scan_ignore_whitespace();
            if tok != Token::Comma {
                self.unscan();
                break;
            }
        }

        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::RParen {
            return Err(self.error(format!(
                "found function call {}, expected ), but with {}.",
                quote(name),
                quote(&lit)
            )));
        }
        Ok(args)
    }

    /// `FILTER (WHERE expr)` after a window.
    pub(crate) fn parse_filter(&mut self) -> SqlResult<Option<Expr>> {
        let (tok, _) = self.scan_ignore_whitespace();
        if tok != Token::Filter {
            self.unscan();
            return Ok(None);
        }
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::LParen {
            return Err(self.error(format!(
                "Found {} after FILTER, expect parentheses.",
                quote(&lit)
            )));
        }
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::Where {
            return Err(self.error(format!("Found {} after FILTER(, expect WHERE.", quote(&lit))));
        }
        let expr = self.parse_expr()?;
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::RParen {
            return Err(self.error(format!(
                "Found {} after FILTER, expect right parentheses.",
                quote(&lit)
            )));
        }
        Ok(Some(expr))
    }

    /// `OVER ([PARTITION BY e, ...] [WHEN cond])` after an analytic call.
    fn parse_over(&mut self, call: &mut Call) -> SqlResult<()> {
        let (tok, _) = self.scan_ignore_whitespace();
        if tok != Token::Over {
            self.unscan();
            return Ok(());
        }
        if call.func_type != FuncType::Analytic {
            return Err(SqlError::validation_error(format!(
                "Found OVER after non analytic function {}",
                call.name
            )));
        }
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::LParen {
            return Err(self.error(format!("found {}, expected ( after OVER.", quote(&lit))));
        }

        let (tok, _) = self.scan_ignore_whitespace();
        if tok == Token::Partition {
            let (by, lit) = self.scan_ignore_whitespace();
            if by != Token::By {
                return Err(self.error(format!("found {}, expected BY after PARTITION.", quote(&lit))));
            }
            let mut exprs = Vec::new();
            loop {
                exprs.push(self.parse_expr()?);
                let (sep, _) = self.scan_ignore_whitespace();
                if sep != Token::Comma {
                    self.unscan();
                    break;
                }
            }
            call.partition = Some(PartitionExpr { exprs });
        } else {
            self.unscan();
        }

        let (tok, _) = self.scan_ignore_whitespace();
        if tok == Token::When {
            call.when_expr = Some(Box::new(self.parse_expr()?));
        } else {
            self.unscan();
        }

        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::RParen {
            return Err(self.error(format!(
                "found {}, expected ) to close OVER clause.",
                quote(&lit)
            )));
        }
        Ok(())
    }
}

fn validate_window(name: &str, wt: WindowType, args: &[Expr]) -> SqlResult<()> {
    match wt {
        WindowType::Tumbling | WindowType::Sliding => validate_time_window(name, 2, args),
        WindowType::Hopping | WindowType::Session => validate_time_window(name, 3, args),
        WindowType::Count => match args {
            [Expr::Integer(length)] if *length > 0 => Ok(()),
            [arg] => Err(SqlError::validation_error(format!(
                "Invalid parameter value {}.",
                arg
            ))),
            [Expr::Integer(length), Expr::Integer(interval)] => {
                if length < interval {
                    Err(SqlError::validation_error(format!(
                        "The second parameter value {} should be less than the first parameter {}.",
                        interval, length
                    )))
                } else {
                    Ok(())
                }
            }
            [a, b] => Err(SqlError::validation_error(format!(
                "Invalid parameter value {}, {}.",
                a, b
            ))),
            _ => Err(SqlError::validation_error("Invalid parameter count.")),
        },
    }
}

fn validate_time_window(name: &str, expect: usize, args: &[Expr]) -> SqlResult<()> {
    if args.len() != expect {
        return Err(SqlError::validation_error(format!(
            "The arguments for {} should be {}.",
            name, expect
        )));
    }
    if !args[0].is_time_literal() {
        return Err(SqlError::validation_error(format!(
            "The 1st argument for {} is expecting timer literal expression. One value of [dd|hh|mi|ss|ms].",
            name
        )));
    }
    for (i, arg) in args.iter().enumerate().skip(1) {
        if !matches!(arg, Expr::Integer(_)) {
            return Err(SqlError::validation_error(format!(
                "The {} argument for {} is expecting interger literal expression.",
                i, name
            )));
        }
    }
    Ok(())
}

/// Build the window descriptor from validated arguments. Time lengths become milliseconds.
fn convert_to_window(wt: WindowType, args: &[Expr]) -> SqlResult<Window> {
    let int_arg = |i: usize| -> SqlResult<i64> {
        match args.get(i) {
            Some(Expr::Integer(v)) => Ok(*v),
            other => Err(SqlError::validation_error(format!(
                "Invalid window argument {:?}",
                other
            ))),
        }
    };
    if wt == WindowType::Count {
        let interval = if args.len() == 2 { Some(int_arg(1)?) } else { None };
        return Ok(Window {
            window_type: wt,
            length: int_arg(0)?,
            interval,
            filter: None,
        });
    }
    let unit = match args.first() {
        Some(Expr::Time(t)) => t.millis(),
        other => {
            return Err(SqlError::validation_error(format!(
                "Invalid timeliteral {:?}",
                other
            )))
        }
    };
    let interval = if args.len() > 2 { int_arg(2)? * unit } else { 0 };
    Ok(Window {
        window_type: wt,
        length: int_arg(1)? * unit,
        interval: Some(interval),
        filter: None,
    })
}
