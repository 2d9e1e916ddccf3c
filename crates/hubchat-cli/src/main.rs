//! hubchat: chat with the hub assistant from the terminal.

mod turn;

use anyhow::{Context, Result};
use clap::Parser;
use hubchat_api::ChatClient;
use hubchat_config::{ChatConfig, CliOverrides};
use std::io::{self, BufRead, Write};
use turn::{Conversation, TurnEnd, run_turn};

#[derive(Parser)]
#[command(name = "hubchat", version, about = "Chat with the hub assistant")]
struct Cli {
    /// Send a single message and print the reply (non-interactive)
    #[arg(short, long)]
    print: Option<String>,

    /// Hub base URL (overrides HUBCHAT_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// API key (overrides HUBCHAT_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Show the assistant's reasoning on stderr
    #[arg(long)]
    show_reasoning: bool,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ChatConfig::load(CliOverrides {
        base_url: cli.base_url,
        api_key: cli.api_key,
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let client = ChatClient::with_options(&config.base_url, config.client_options())
        .context("Failed to create chat client")?;

    if let Some(message) = cli.print {
        let request = Conversation::new().request(&message);
        let outcome = run_turn(&client, request, cli.show_reasoning).await;
        return match outcome.end {
            TurnEnd::Done => Ok(()),
            TurnEnd::Failed(e) => Err(anyhow::anyhow!("{e}")),
            TurnEnd::Interrupted => std::process::exit(130),
        };
    }

    repl(&client, &config, cli.show_reasoning).await
}

async fn repl(client: &ChatClient, config: &ChatConfig, show_reasoning: bool) -> Result<()> {
    let mut conversation = Conversation::new();

    eprintln!("hubchat v{} ({})", env!("CARGO_PKG_VERSION"), client.stream_url());
    tracing::debug!("config dir: {}", config.config_dir.display());
    eprintln!("Type your message. Press Ctrl+C to stop a reply, Ctrl+D to exit.\n");

    let stdin = io::stdin();
    loop {
        eprint!("> ");
        io::stderr().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // Ctrl+D
            eprintln!();
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match handle_slash_command(input, &mut conversation) {
            Some(SlashResult::Continue) => continue,
            Some(SlashResult::Break) => break,
            Some(SlashResult::Unknown) => {
                eprintln!("Unknown command: {input}. Type /help for available commands.");
                continue;
            }
            None => {}
        }

        let outcome = run_turn(client, conversation.request(input), show_reasoning).await;
        if let TurnEnd::Failed(e) = &outcome.end {
            tracing::debug!("turn failed: {e:?}");
        }
        conversation.record(input, &outcome);
        eprintln!();
    }

    Ok(())
}

enum SlashResult {
    Continue,
    Break,
    Unknown,
}

fn handle_slash_command(input: &str, conversation: &mut Conversation) -> Option<SlashResult> {
    match input {
        "/quit" | "/exit" => Some(SlashResult::Break),
        "/clear" => {
            let dropped = conversation.len();
            conversation.clear();
            eprintln!("Conversation cleared ({dropped} history entries dropped).");
            Some(SlashResult::Continue)
        }
        "/help" => {
            print_help();
            Some(SlashResult::Continue)
        }
        _ if input.starts_with('/') => Some(SlashResult::Unknown),
        _ => None,
    }
}

fn print_help() {
    eprintln!("Available commands:");
    eprintln!("  /help   Show this help");
    eprintln!("  /clear  Forget the conversation so far");
    eprintln!("  /quit   Exit");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --show-reasoning  Show the assistant's reasoning as it streams");
}
