//! text2sql: ask SolidData's text2sql service a question from the shell.
//!
//!   text2sql ask "How many users signed up last month?"
//!   echo "Revenue by region in 2024" | text2sql ask --transport rest
//!   text2sql auth           # credential exchange only
//!   text2sql tools          # list the MCP server's tools
//!   text2sql check-rest     # contract check of the REST face
//!
//! Configuration comes from the environment (a `.env` file is loaded first)
//! and an optional TOML overlay; see `.env.example`.
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use text2sql_core::config::TransportKind;
use text2sql_core::{
    telemetry, McpTransport, Text2SqlClient, Text2SqlConfig, Text2SqlError, TokenExchange,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Question used by `check-rest`
const SAMPLE_QUESTION: &str = "How much revenue was generated in 2024 by product category?";

#[derive(Parser)]
#[command(name = "text2sql")]
#[command(about = "Natural-language questions to SQL via SolidData text2sql (REST or MCP)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question and print the generated SQL and explanation
    Ask {
        /// Question words; read one line from stdin when omitted
        question: Vec<String>,

        /// Override TEXT2SQL_TRANSPORT
        #[arg(long, value_name = "mcp|rest")]
        transport: Option<TransportKind>,
    },
    /// Exchange the management key for a bearer token and report the outcome
    Auth,
    /// Connect to the MCP server and list its tools
    Tools,
    /// Validate the REST face end to end with a sample question
    CheckRest,
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let dotenv = dotenvy::dotenv();
    let _ = telemetry::init_tracing();
    if let Ok(path) = dotenv {
        debug!(target: "text2sql", path = %path.display(), "Loaded .env");
    }

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), Text2SqlError> {
    let mut config = Text2SqlConfig::load()?;

    match command {
        Command::Ask {
            question,
            transport,
        } => {
            if let Some(kind) = transport {
                config.transport = kind;
            }
            let question = if question.is_empty() {
                read_stdin_line().await?
            } else {
                question.join(" ")
            };
            let client = Text2SqlClient::new(config)?;
            let answer = client.ask(&question).await?;
            println!("{}", answer);
        }
        Command::Auth => {
            let auth = TokenExchange::new(&config)?;
            let token = auth.exchange(&config.management_key).await?;
            println!(
                "OK: bearer token obtained from {} ({} chars)",
                auth.endpoint(),
                token.len()
            );
        }
        Command::Tools => {
            let token = TokenExchange::new(&config)?
                .exchange(&config.management_key)
                .await?;
            let transport = McpTransport::new(&config)?;
            let tools = transport.list_tools(&token).await?;
            info!(target: "text2sql", count = tools.len(), "MCP tools listed");
            for tool in tools {
                match tool.description {
                    Some(desc) => println!("{}: {}", tool.name, desc),
                    None => println!("{}", tool.name),
                }
            }
        }
        Command::CheckRest => {
            config.transport = TransportKind::Rest;
            let client = Text2SqlClient::new(config)?;
            let answer = client.ask(SAMPLE_QUESTION).await?;
            println!("{}", answer);
            println!("OK: auth and text2sql (REST) succeeded; contract validated.");
        }
    }
    Ok(())
}

async fn read_stdin_line() -> Result<String, Text2SqlError> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|e| Text2SqlError::InvalidInput(format!("Failed to read question from stdin: {e}")))?;
    Ok(line.trim().to_string())
}
