//! weather-chatbot - ask about the weather anywhere from the terminal
//!
//! # Subcommands
//! - `chat` (default) - interactive conversation on stdin/stdout
//! - `ask <question>` - answer a single question and exit

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use weather_chatbot::{ChatbotConfig, OpenMeteoAssistant, logging};

const GOODBYE: &str = "Exiting the Weather App. Goodbye!";
const RESET_COMMAND: &str = "/reset";

#[derive(Debug, Parser)]
#[command(
    name = "weather-chatbot",
    version,
    about = "Conversational weather assistant backed by Open-Meteo"
)]
struct Cli {
    /// Configuration file (defaults to <config dir>/weather-chatbot/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Chat interactively; type "exit" to leave or "/reset" to start over
    Chat,

    /// Ask a single question
    Ask {
        /// The question, e.g. "What's the weather in Paris?"
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ChatbotConfig::load_from_path(cli.config.clone())
        .context("Failed to load configuration")?;
    logging::init(&config.logging, cli.verbose)?;
    info!(version = weather_chatbot::VERSION, "weather-chatbot starting");

    let assistant = OpenMeteoAssistant::from_config(&config)?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Ask { question } => ask(&assistant, &question.join(" ")).await,
        Commands::Chat => chat(&assistant).await,
    }
}

async fn ask(assistant: &OpenMeteoAssistant, question: &str) -> Result<()> {
    let mut session = assistant.new_session();
    let outcome = assistant.submit(&mut session, question).await;
    println!("{}", outcome.response);
    Ok(())
}

async fn chat(assistant: &OpenMeteoAssistant) -> Result<()> {
    let mut session = assistant.new_session();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Ask me about the weather anywhere. Type \"exit\" to leave or \"/reset\" to start over.\n")
        .await?;

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            stdout.write_all(format!("{GOODBYE}\n").as_bytes()).await?;
            stdout.flush().await?;
            return Ok(());
        }
        if input == RESET_COMMAND {
            let id = session.reset();
            info!(session = %id, "Session reset");
            stdout.write_all(b"Started a new conversation.\n").await?;
            continue;
        }

        let outcome = assistant.submit(&mut session, input).await;
        stdout
            .write_all(format!("\nAssistant: {}\n", outcome.response).as_bytes())
            .await?;
    }

    stdout.write_all(format!("\n{GOODBYE}\n").as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
