use anyhow::{Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use spandsl::SqlOptions;
use std::path::PathBuf;
use tracing::{error, warn};

mod display;

/// Span DSL to SQL compiler
#[derive(Parser, Debug)]
#[command(name = "spandsl")]
#[command(about = "Compile Span coverage queries to SQL", long_about = None)]
struct Args {
    /// Compile a single query and exit
    #[arg(short, long)]
    exec: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Year used when the query has no FOR clause
    #[arg(short, long)]
    year: Option<i32>,

    /// Prefix for data file paths
    #[arg(short, long)]
    data_path: Option<String>,

    /// Print the token stream instead of SQL (with --exec)
    #[arg(long)]
    tokens: bool,

    /// Print the parsed query instead of SQL (with --exec)
    #[arg(long)]
    ast: bool,
}

/// What to print for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Sql,
    Tokens,
    Ast,
}

fn main() -> Result<()> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
                .add_directive("rustyline=error".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = config::Config::load(args.config.as_deref())?;
    config.validate().context("Invalid configuration")?;

    let mut options = config.compiler.sql_options();
    if let Some(year) = args.year {
        options.year = Some(year);
    }
    if let Some(data_path) = args.data_path {
        options.data_path = Some(data_path);
    }

    // If --exec flag is provided, compile the query and exit
    if let Some(query) = args.exec {
        let output = if args.tokens {
            Output::Tokens
        } else if args.ast {
            Output::Ast
        } else {
            Output::Sql
        };
        let result = render(&query, output, &options)?;
        println!("{}", result);
        return Ok(());
    }

    println!("Span REPL");
    println!("Type 'exit' or 'quit' to exit, '\\h' for help\n");

    let history_file = get_history_file_path();
    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;

    if history_file.exists() {
        rl.load_history(&history_file)
            .context("Failed to load history file")?;
    }

    loop {
        let readline = rl.readline("span> ");
        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                    save_history(&mut rl, &history_file);
                    println!("Goodbye!");
                    break;
                }

                if line == "\\h" {
                    print_help();
                    continue;
                }

                let (output, query) = split_command(line);
                match render(query, output, &options) {
                    Ok(result) => println!("{}", result),
                    Err(e) => {
                        error!("Compilation failed: {}", e);
                        eprintln!("Error: {}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                save_history(&mut rl, &history_file);
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                save_history(&mut rl, &history_file);
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                save_history(&mut rl, &history_file);
                error!("Readline error: {:?}", err);
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Split a REPL line into its output mode and the query text
fn split_command(line: &str) -> (Output, &str) {
    if let Some(rest) = line.strip_prefix("\\t") {
        (Output::Tokens, rest.trim_start())
    } else if let Some(rest) = line.strip_prefix("\\a") {
        (Output::Ast, rest.trim_start())
    } else {
        (Output::Sql, line)
    }
}

fn render(query: &str, output: Output, options: &SqlOptions) -> Result<String> {
    let rendered = match output {
        Output::Tokens => display::format_tokens(&spandsl::tokenize(query)?),
        Output::Ast => format!("{:#?}", spandsl::parse_str(query)?),
        Output::Sql => spandsl::compile(query, options)?,
    };
    Ok(rendered)
}

fn get_history_file_path() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        home.join(".spandsl_history")
    } else {
        PathBuf::from(".spandsl_history")
    }
}

fn save_history(rl: &mut DefaultEditor, history_file: &PathBuf) {
    rl.save_history(history_file)
        .context("Failed to save history file")
        .unwrap_or_else(|e| {
            warn!("Could not save history: {}", e);
            eprintln!("Warning: Could not save history: {}", e);
        });
}

fn print_help() {
    println!("Span REPL Help:");
    println!("  exit, quit    - Exit the REPL");
    println!("  \\h            - Show this help message");
    println!("  \\t <query>    - Show the tokens of a query");
    println!("  \\a <query>    - Show the parsed query");
    println!("  <query>       - Compile a Span query to SQL");
    println!("\nExample queries:");
    println!("  HAS fiber COUNT hus BY fylke");
    println!("  HAS ANY(fiber, 5g) IN tett COUNT hus SORT andel DESC TOP 5 FOR (2023, 2024)");
    println!("  HAS nedhast >= 100 IN privat COUNT ab BY tilb");
    println!("  HAS kabel COUNT hus FOR 2018");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command() {
        assert_eq!(
            split_command("\\t HAS fiber COUNT hus"),
            (Output::Tokens, "HAS fiber COUNT hus")
        );
        assert_eq!(split_command("\\a HAS fiber"), (Output::Ast, "HAS fiber"));
        assert_eq!(split_command("HAS fiber"), (Output::Sql, "HAS fiber"));
    }

    #[test]
    fn test_render_sql() {
        let options = SqlOptions::new().with_year(2024);
        let sql = render("HAS fiber COUNT hus", Output::Sql, &options).unwrap();
        assert!(sql.starts_with("WITH "));

        let ast = render("HAS fiber COUNT hus", Output::Ast, &options).unwrap();
        assert!(ast.contains("SpanQuery"));

        assert!(render("HAS fiber", Output::Sql, &options).is_err());
    }
}
