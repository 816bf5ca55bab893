//! Rillstream SQL Validator
//!
//! Parses and validates streaming SQL statements from files or the command line and
//! reports one result per statement. Exits with status 1 when any statement fails.

use clap::{Parser, ValueEnum};
use log::{debug, info};
use rillstream::rill::config::EngineConfig;
use rillstream::rill::sql::parser::lexer::{Scanner, Token};
use rillstream::rill::sql::StreamingSqlParser;
use serde::Serialize;
use std::fs;
use std::process;

#[derive(Parser)]
#[command(name = "rill-sql-validator")]
#[command(about = "Parse and validate Rillstream SQL statements")]
#[command(version)]
struct Cli {
    /// SQL files to validate
    #[arg(required_unless_present = "query")]
    files: Vec<String>,

    /// Validate this SQL text instead of files
    #[arg(short, long, conflicts_with = "files")]
    query: Option<String>,

    /// Engine configuration (YAML)
    #[arg(short, long)]
    config: Option<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Validation result for a single statement
#[derive(Debug, Serialize)]
struct StatementResult {
    source: String,
    index: usize,
    statement: String,
    kind: Option<String>,
    is_valid: bool,
    error: Option<String>,
}

/// Split `sql` on top-level semicolons using the SQL scanner, so separators inside
/// strings and comments are ignored.
fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut scanner = Scanner::new(sql);
    let mut statements = Vec::new();
    let mut start = 0;
    loop {
        let (tok, _) = scanner.scan();
        match tok {
            Token::Semicolon | Token::Eof => {
                let end = scanner.token_start().min(chars.len());
                let text: String = chars[start.min(end)..end].iter().collect();
                if !text.trim().is_empty() {
                    statements.push(text.trim().to_string());
                }
                if tok == Token::Eof {
                    break;
                }
                start = end + 1;
            }
            _ => {}
        }
    }
    statements
}

fn validate_source(parser: &StreamingSqlParser, source: &str, sql: &str) -> Vec<StatementResult> {
    split_statements(sql)
        .into_iter()
        .enumerate()
        .map(|(index, statement)| {
            debug!("Validating statement {} of {}", index + 1, source);
            match parser.parse_statement(&statement) {
                Ok(stmt) => StatementResult {
                    source: source.to_string(),
                    index: index + 1,
                    statement,
                    kind: Some(stmt.kind().to_string()),
                    is_valid: true,
                    error: None,
                },
                Err(e) => StatementResult {
                    source: source.to_string(),
                    index: index + 1,
                    statement,
                    kind: None,
                    is_valid: false,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect()
}

fn run(cli: &Cli) -> Result<Vec<StatementResult>, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides()?;
    let parser = StreamingSqlParser::with_config(config);

    let mut results = Vec::new();
    if let Some(query) = &cli.query {
        results.extend(validate_source(&parser, "<query>", query));
    }
    for file in &cli.files {
        info!("Validating {}", file);
        let sql = fs::read_to_string(file).map_err(|e| format!("cannot read {}: {}", file, e))?;
        results.extend(validate_source(&parser, file, &sql));
    }
    Ok(results)
}

fn print_text(results: &[StatementResult]) {
    for r in results {
        match &r.error {
            None => println!(
                "✅ {}#{} {}",
                r.source,
                r.index,
                r.kind.as_deref().unwrap_or_default()
            ),
            Some(e) => {
                println!("❌ {}#{} {}", r.source, r.index, e);
                println!("   {}", r.statement);
            }
        }
    }
    let valid = results.iter().filter(|r| r.is_valid).count();
    println!("{} of {} statements valid", valid, results.len());
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let results = match run(&cli) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(2);
        }
    };

    match cli.format {
        OutputFormat::Text => print_text(&results),
        OutputFormat::Json => match serde_json::to_string_pretty(&results) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("❌ {}", e);
                process::exit(2);
            }
        },
    }

    if results.iter().any(|r| !r.is_valid) {
        process::exit(1);
    }
}
