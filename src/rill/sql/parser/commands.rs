//! Stream definition and catalog statements:
//! `CREATE STREAM|TABLE`, `SHOW`, `DESCRIBE`, `EXPLAIN` and `DROP`.
//!
//! The words these statements use (`CREATE`, `STREAM`, `WITH`, type names, option keys)
//! are not reserved; they are recognised here from identifier literals.

use super::common::{quote, Parser};
use super::lexer::Token;
use crate::rill::sql::ast::{
    DataType, FieldType, Statement, StreamField, StreamOptions, StreamStmt, StreamType,
};
use crate::rill::sql::error::{SqlError, SqlResult};

const OPTION_KEYS: &str =
    "DATASOURCE|FORMAT|KEY|CONF_KEY|SHARED|STRICT_VALIDATION|TYPE|TIMESTAMP|TIMESTAMP_FORMAT|RETAIN_SIZE|SCHEMAID|KIND";

fn is_word(tok: Token, lit: &str, word: &str) -> bool {
    tok == Token::Ident && lit.eq_ignore_ascii_case(word)
}

/// Type keyword of a stream field. Keywords come through as identifiers.
fn data_type(tok: Token, lit: &str) -> DataType {
    if tok != Token::Ident {
        return DataType::Unknown;
    }
    DataType::from_keyword(lit)
}

impl<'a> Parser<'a> {
    /// `CREATE STREAM|TABLE name (fields) WITH (options)`.
    pub(crate) fn parse_create_stmt(&mut self) -> SqlResult<Statement> {
        let (tok1, lit1) = self.scan_ignore_whitespace();
        let stream_type = if is_word(tok1, &lit1, "STREAM") {
            StreamType::Stream
        } else if is_word(tok1, &lit1, "TABLE") {
            StreamType::Table
        } else {
            return Err(self.error(format!(
                "found {}, expected keyword stream or table.",
                quote(&lit1)
            )));
        };

        let (tok2, lit2) = self.scan_ignore_whitespace();
        if tok2 != Token::Ident {
            return Err(self.error(format!("found {}, expected stream name.", quote(&lit2))));
        }
        let fields = self.parse_stream_fields()?;
        let options = self.parse_stream_options()?;
        let (tok3, lit3) = self.scan_ignore_whitespace();
        if tok3 == Token::Semicolon {
            self.unscan();
        } else if tok3 != Token::Eof {
            return Err(self.error(format!("found {}, expected semicolon or EOF.", quote(&lit3))));
        }

        let stmt = StreamStmt {
            name: lit2,
            fields,
            options,
            stream_type,
        };
        validate_stream(&stmt)?;
        Ok(Statement::CreateStream(stmt))
    }

    /// `SHOW STREAMS|TABLES`.
    pub(crate) fn parse_show_stmt(&mut self) -> SqlResult<Statement> {
        let (tok1, lit1) = self.scan_ignore_whitespace();
        let stmt = if is_word(tok1, &lit1, "STREAMS") {
            Statement::ShowStreams
        } else if is_word(tok1, &lit1, "TABLES") {
            Statement::ShowTables
        } else {
            return Err(self.error(format!(
                "found {}, expected keyword streams or tables.",
                quote(&lit1)
            )));
        };
        let (tok2, lit2) = self.scan_ignore_whitespace();
        match tok2 {
            Token::Eof => Ok(stmt),
            Token::Semicolon => {
                self.unscan();
                Ok(stmt)
            }
            _ => Err(self.error(format!("found {}, expected semecolon or EOF.", quote(&lit2)))),
        }
    }

    /// `DESCRIBE|EXPLAIN|DROP STREAM|TABLE name`. `verb` is the upper-cased leading keyword.
    pub(crate) fn parse_named_stmt(&mut self, verb: &str) -> SqlResult<Statement> {
        let (tok1, lit1) = self.scan_ignore_whitespace();
        let is_table = if is_word(tok1, &lit1, "STREAM") {
            false
        } else if is_word(tok1, &lit1, "TABLE") {
            true
        } else {
            return Err(self.error(format!(
                "found {}, expected keyword stream or table.",
                quote(&lit1)
            )));
        };
        let (tok2, lit2) = self.scan_ignore_whitespace();
        if tok2 != Token::Ident {
            let what = if is_table { "table" } else { "stream" };
            return Err(self.error(format!("found {}, expected {} name.", quote(&lit2), what)));
        }
        let stmt = match (verb, is_table) {
            ("DESCRIBE", false) => Statement::DescribeStream(lit2),
            ("DESCRIBE", true) => Statement::DescribeTable(lit2),
            ("EXPLAIN", false) => Statement::ExplainStream(lit2),
            ("EXPLAIN", true) => Statement::ExplainTable(lit2),
            ("DROP", false) => Statement::DropStream(lit2),
            ("DROP", true) => Statement::DropTable(lit2),
            _ => return Err(self.error(format!("unsupported statement {}", verb))),
        };
        let (tok3, lit3) = self.scan_ignore_whitespace();
        match tok3 {
            Token::Eof => Ok(stmt),
            Token::Semicolon => {
                self.unscan();
                Ok(stmt)
            }
            _ => Err(self.error(format!("found {}, expected semicolon or EOF.", quote(&lit3)))),
        }
    }

    /// Field list in parentheses, terminated by `WITH` at the top level. Nested struct
    /// lists recurse and end at their own closing paren.
    fn parse_stream_fields(&mut self) -> SqlResult<Vec<StreamField>> {
        self.parse_stream_field_list(true)
    }

    fn parse_stream_field_list(&mut self, top_level: bool) -> SqlResult<Vec<StreamField>> {
        let mut fields = Vec::new();
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::LParen {
            return Err(self.error(format!(
                "found {}, expected lparen after stream name.",
                quote(&lit)
            )));
        }

        loop {
            let (tok1, _) = self.scan_ignore_whitespace();
            if tok1 == Token::RParen {
                // schema-less: `CREATE STREAM demo () WITH (...)`
                if top_level {
                    self.expect_with()?;
                }
                return Ok(fields);
            }
            self.unscan();

            fields.push(self.parse_stream_field()?);

            let (tok1, _) = self.scan_ignore_whitespace();
            if tok1 != Token::RParen {
                self.unscan();
                continue;
            }
            if top_level {
                self.expect_with()?;
            }
            return Ok(fields);
        }
    }

    fn expect_with(&mut self) -> SqlResult<()> {
        let (tok, lit) = self.scan_ignore_whitespace();
        if !is_word(tok, &lit, "WITH") {
            return Err(self.error(format!("found {}, expected is with.", quote(&lit))));
        }
        Ok(())
    }

    fn parse_stream_field(&mut self) -> SqlResult<StreamField> {
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::Ident {
            return Err(self.error(format!("found {}, expect stream field name.", quote(&lit))));
        }
        let name = lit;
        let (tok1, lit1) = self.scan_ignore_whitespace();
        let field_type = match data_type(tok1, &lit1) {
            t if t.is_simple() => FieldType::Basic(t),
            DataType::Array => self.parse_stream_array_type()?,
            DataType::Struct => FieldType::Rec(self.parse_stream_field_list(false)?),
            _ => {
                return Err(self.error(format!(
                    "found {}, expect valid stream field types(BIGINT | FLOAT | STRINGS | DATETIME | BOOLEAN | BYTEA | ARRAY | STRUCT).",
                    quote(&lit1)
                )))
            }
        };

        let (tok2, lit2) = self.scan_ignore_whitespace();
        match tok2 {
            Token::Comma => {}
            Token::RParen => self.unscan(),
            _ => {
                return Err(self.error(format!("found {}, expect comma or rparen.", quote(&lit2))))
            }
        }
        Ok(StreamField { name, field_type })
    }

    /// `ARRAY(simple)` or `ARRAY(STRUCT(...))`.
    fn parse_stream_array_type(&mut self) -> SqlResult<FieldType> {
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::LParen {
            return Err(self.error(format!(
                "found {}, expect lparen in array type definition.",
                quote(&lit)
            )));
        }
        let (tok1, lit1) = self.scan_ignore_whitespace();
        let element = match data_type(tok1, &lit1) {
            t if t.is_simple() => FieldType::Basic(t),
            DataType::Struct => FieldType::Rec(self.parse_stream_field_list(false)?),
            _ => {
                return Err(self.error(format!("found {}, expect stream data types.", quote(&lit1))))
            }
        };
        let (tok2, lit2) = self.scan_ignore_whitespace();
        if tok2 != Token::RParen {
            return Err(self.error(format!(
                "found {}, expect rparen in array type definition.",
                quote(&lit2)
            )));
        }
        Ok(FieldType::Array(Box::new(element)))
    }

    fn parse_stream_options(&mut self) -> SqlResult<StreamOptions> {
        let mut opts = StreamOptions::default();
        let (tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::LParen {
            return Err(self.error(format!("found {}, expect stream options.", quote(&lit))));
        }
        loop {
            let (tok1, lit1) = self.scan_ignore_whitespace();
            match tok1 {
                Token::Comma => continue,
                Token::RParen => return Ok(opts),
                Token::Ident if is_option_key(&lit1) => {
                    let (tok2, lit2) = self.scan_ignore_whitespace();
                    if tok2 != Token::Eq {
                        return Err(self.error(format!(
                            "found {}, expect equals(=) in options.",
                            quote(&lit2)
                        )));
                    }
                    let (tok3, lit3) = self.scan_ignore_whitespace();
                    if tok3 != Token::String {
                        return Err(self.error(format!(
                            "found {}, expect string value in option.",
                            quote(&lit3)
                        )));
                    }
                    self.set_option(&mut opts, &lit1.to_uppercase(), lit3)?;
                }
                _ => {
                    return Err(self.error(format!(
                        "found {}, unknown option keys({}).",
                        quote(&lit1),
                        OPTION_KEYS
                    )))
                }
            }
        }
    }

    fn set_option(&self, opts: &mut StreamOptions, key: &str, value: String) -> SqlResult<()> {
        match key {
            "DATASOURCE" => opts.datasource = value,
            "KEY" => opts.key = value,
            "FORMAT" => opts.format = value,
            "CONF_KEY" => opts.conf_key = value,
            "TYPE" => opts.type_ = value,
            "TIMESTAMP" => opts.timestamp = value,
            "TIMESTAMP_FORMAT" => opts.timestamp_format = value,
            "SCHEMAID" => opts.schema_id = value,
            "KIND" => opts.kind = value,
            "STRICT_VALIDATION" => opts.strict_validation = self.bool_option(key, &value)?,
            "SHARED" => opts.shared = self.bool_option(key, &value)?,
            "RETAIN_SIZE" => {
                opts.retain_size = value.parse::<i64>().map_err(|_| {
                    self.error(format!(
                        "found {}, expect number value in {} option.",
                        quote(&value),
                        key
                    ))
                })?
            }
            _ => return Err(self.error(format!("invalid field {}.", key))),
        }
        Ok(())
    }

    fn bool_option(&self, key: &str, value: &str) -> SqlResult<bool> {
        match value.to_uppercase().as_str() {
            "TRUE" => Ok(true),
            "FALSE" => Ok(false),
            _ => Err(self.error(format!(
                "found {}, expect TRUE/FALSE value in {} option.",
                quote(value),
                key
            ))),
        }
    }
}

fn is_option_key(lit: &str) -> bool {
    OPTION_KEYS
        .split('|')
        .any(|k| k.eq_ignore_ascii_case(lit))
}

/// Format restrictions: `json` (default) or `binary`; binary streams carry at most one
/// `bytea` field and are not allowed for tables.
pub(crate) fn validate_stream(stmt: &StreamStmt) -> SqlResult<()> {
    let format = if stmt.options.format.is_empty() {
        "json".to_string()
    } else {
        stmt.options.format.to_lowercase()
    };
    match format.as_str() {
        "json" => Ok(()),
        "binary" => {
            if stmt.stream_type == StreamType::Table {
                return Err(SqlError::validation_error(
                    "'binary' format is not supported for table",
                ));
            }
            match stmt.fields.as_slice() {
                [] => Ok(()),
                [field] if field.field_type == FieldType::Basic(DataType::Bytea) => Ok(()),
                [_] => Err(SqlError::validation_error(
                    "'binary' format stream can have only 'bytea' type field",
                )),
                _ => Err(SqlError::validation_error(
                    "'binary' format stream can have only one field",
                )),
            }
        }
        _ => Err(SqlError::validation_error(format!(
            "option 'format={}' is invalid",
            stmt.options.format
        ))),
    }
}
