mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mcp::Locator;
use runtime::{Agent, Backend, GeminiBackend, McpToolHost, ToolHost};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "toolchat.toml";
const API_KEY_VAR: &str = "GEMINI_API_KEY";
const DEFAULT_QUERY: &str = "What is (5 + 3)*8?";

#[derive(Parser)]
#[command(name = "toolchat")]
#[command(about = "Answer questions with Gemini and MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ./toolchat.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tool server: an http(s) SSE URL, or a script or executable to launch
    #[arg(short, long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question (default: "What is (5 + 3)*8?")
        query: Vec<String>,
    },
    /// Start an interactive session
    Chat,
    /// List the server's tools
    Tools,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e}");
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let api_key = std::env::var(API_KEY_VAR)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or(Error::MissingCredential)?;

    let config = load_config(cli.config.as_deref())?;
    let locator: Locator = cli
        .server
        .as_deref()
        .unwrap_or(config.server.locator.as_str())
        .parse()?;

    let host = McpToolHost::connect(&locator, config.tool_timeout()).await?;
    println!("Connected to server with tools: {:?}", host.tool_names());

    let mut backend = GeminiBackend::builder(api_key, &config.model.name);
    if let Some(max) = config.model.max_output_tokens {
        backend = backend.max_output_tokens(max);
    }
    let mut agent = Agent::new(backend.build(), host, config.agent_config());

    let outcome = match cli.command {
        Some(Commands::Ask { query }) => cmd_ask(&mut agent, &query).await,
        Some(Commands::Chat) => cmd_chat(&mut agent).await,
        Some(Commands::Tools) => {
            cmd_tools(agent.host());
            Ok(())
        }
        None => cmd_ask(&mut agent, &[]).await,
    };

    // Release the server whether or not the command succeeded.
    if let Err(e) = agent.into_host().close().await {
        warn!("failed to close tool server connection: {e}");
    }
    outcome
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(CONFIG_FILE).exists() => Ok(Config::load(CONFIG_FILE)?),
        None => Ok(Config::default()),
    }
}

async fn cmd_ask<B: Backend, H: ToolHost>(
    agent: &mut Agent<B, H>,
    words: &[String],
) -> Result<()> {
    let query = if words.is_empty() {
        DEFAULT_QUERY.to_string()
    } else {
        words.join(" ")
    };
    println!("Query: {query}");

    let resolution = agent.resolve(&query).await?;
    println!("\n{}", resolution.answer.trim());
    Ok(())
}

async fn cmd_chat<B: Backend, H: ToolHost>(agent: &mut Agent<B, H>) -> Result<()> {
    println!("toolchat v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match agent.resolve(input).await {
            Ok(resolution) => println!("\n{}\n", resolution.answer.trim()),
            Err(e @ runtime::Error::Connection(_)) => return Err(e.into()),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    println!("\nSession ended.");
    Ok(())
}

fn cmd_tools(host: &impl ToolHost) {
    if host.specs().is_empty() {
        println!("No tools found.");
        return;
    }
    for spec in host.specs() {
        println!("{:<12}  {}", spec.name, spec.description);
    }
}
